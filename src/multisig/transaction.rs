//! Proposed transactions and their store
//!
//! Transactions are appended in submission order and never removed. The
//! store owns every record; callers refer to transactions by index only.

use crate::crypto::encoding::hex_payload;
use crate::crypto::sha256_hex;
use crate::multisig::executor::Call;
use crate::multisig::owners::Owner;
use crate::multisig::wallet::MultisigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a transaction
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Collecting confirmations
    Pending,
    /// Dispatched through the execution sink (terminal)
    Executed,
}

/// A proposed outgoing operation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Position in submission order
    pub index: usize,
    /// Destination of the operation
    pub target: String,
    /// Amount to move out of the holding pool
    pub value: u128,
    /// Opaque operation data
    #[serde(with = "hex_payload")]
    pub payload: Vec<u8>,
    /// Number of distinct owners that confirmed
    pub confirmations: usize,
    /// Set once, when the sink reports success
    pub executed: bool,
    /// Owner who submitted the transaction
    pub submitted_by: Owner,
    pub submitted_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn status(&self) -> TransactionStatus {
        if self.executed {
            TransactionStatus::Executed
        } else {
            TransactionStatus::Pending
        }
    }

    /// Hex SHA-256 over `index || target || 0x00 || value || payload`
    pub fn digest(&self) -> String {
        let mut data = (self.index as u64).to_be_bytes().to_vec();
        data.extend_from_slice(self.target.as_bytes());
        data.push(0);
        data.extend_from_slice(&self.value.to_be_bytes());
        data.extend_from_slice(&self.payload);
        sha256_hex(&data)
    }

    /// The call handed to the execution sink
    pub fn call(&self) -> Call {
        Call {
            index: self.index,
            target: self.target.clone(),
            value: self.value,
            payload: self.payload.clone(),
        }
    }
}

/// Append-only collection of transactions
#[derive(Clone, Debug, Default)]
pub struct TransactionStore {
    transactions: Vec<Transaction>,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
        }
    }

    /// Append a new pending transaction and return its index
    pub fn append(
        &mut self,
        submitted_by: Owner,
        target: String,
        value: u128,
        payload: Vec<u8>,
    ) -> usize {
        let index = self.transactions.len();
        self.transactions.push(Transaction {
            index,
            target,
            value,
            payload,
            confirmations: 0,
            executed: false,
            submitted_by,
            submitted_at: Utc::now(),
            executed_at: None,
        });
        index
    }

    pub fn get(&self, index: usize) -> Result<&Transaction, MultisigError> {
        self.transactions
            .get(index)
            .ok_or(MultisigError::TransactionNotFound(index))
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Transaction, MultisigError> {
        self.transactions
            .get_mut(index)
            .ok_or(MultisigError::TransactionNotFound(index))
    }

    /// Total transactions ever submitted
    pub fn count(&self) -> usize {
        self.transactions.len()
    }

    /// Flip the executed flag; the wallet calls this once per index, under its lock
    pub fn mark_executed(&mut self, index: usize) -> Result<(), MultisigError> {
        let tx = self.get_mut(index)?;
        tx.executed = true;
        tx.executed_at = Some(Utc::now());
        Ok(())
    }

    /// Update the cached confirmation count
    pub fn set_confirmation_count(&mut self, index: usize, count: usize) -> Result<(), MultisigError> {
        self.get_mut(index)?.confirmations = count;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Indices of transactions still collecting confirmations
    pub fn pending_indices(&self) -> Vec<usize> {
        self.transactions
            .iter()
            .filter(|tx| !tx.executed)
            .map(|tx| tx.index)
            .collect()
    }

    /// Rebuild a store from persisted records
    ///
    /// Records must be ordered with `index` equal to their position.
    pub(crate) fn from_transactions(transactions: Vec<Transaction>) -> Option<Self> {
        if transactions.iter().enumerate().any(|(i, tx)| tx.index != i) {
            return None;
        }
        Some(Self { transactions })
    }
}
