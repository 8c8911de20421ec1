//! Multi-signature vault
//!
//! [`MultisigWallet`] is the authorization state machine: owners submit
//! transactions, confirm or revoke them, and execute them once the quorum
//! is met. All mutable state sits behind one lock, so no two operations
//! interleave and no transaction is ever dispatched twice.

use crate::multisig::confirmation::ConfirmationTracker;
use crate::multisig::events::{EventSink, NullEventSink, WalletEvent};
use crate::multisig::executor::{ExecutionError, ExecutionSink, RetryPolicy};
use crate::multisig::owners::{Owner, OwnerRegistry, WalletConfig};
use crate::multisig::transaction::{Transaction, TransactionStore};
use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("not owner: {0}")]
    NotOwner(String),
    #[error("tx does not exist: {0}")]
    TransactionNotFound(usize),
    #[error("tx already executed: {0}")]
    AlreadyExecuted(usize),
    #[error("tx already confirmed: {0}")]
    AlreadyConfirmed(usize),
    #[error("tx not confirmed: {0}")]
    NotConfirmed(usize),
    #[error("cannot execute tx: have {have} confirmations, need {need}")]
    InsufficientConfirmations { have: usize, need: usize },
    #[error("tx failed: {0}")]
    ExecutionFailed(#[from] ExecutionError),
    #[error("Owner index {index} out of range (owners: {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Deposit of {amount} would overflow balance {balance}")]
    BalanceOverflow { balance: u128, amount: u128 },
}

/// Everything the lock guards
#[derive(Debug, Default)]
struct WalletState {
    store: TransactionStore,
    tracker: ConfirmationTracker,
    balance: u128,
    /// Bumped by every accepted change
    version: u64,
}

/// Serializable image of a wallet
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub config: WalletConfig,
    pub address: String,
    pub balance: u128,
    pub transactions: Vec<Transaction>,
    /// Per transaction, the owner positions that confirmed it
    pub confirmations: Vec<Vec<usize>>,
    pub created_at: DateTime<Utc>,
    /// Number of changes applied when the snapshot was taken
    #[serde(default)]
    pub version: u64,
}

/// An M-of-N multi-signature vault
pub struct MultisigWallet {
    registry: OwnerRegistry,
    label: Option<String>,
    address: String,
    created_at: DateTime<Utc>,
    state: RwLock<WalletState>,
    sink: Arc<dyn ExecutionSink>,
    events: Arc<dyn EventSink>,
    retry: RetryPolicy,
}

impl fmt::Debug for MultisigWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultisigWallet")
            .field("address", &self.address)
            .field("description", &self.registry.description())
            .field("label", &self.label)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl MultisigWallet {
    /// Create a wallet from a configuration
    ///
    /// # Errors
    /// `InvalidConfig` if the owner list or quorum is invalid; no wallet
    /// is constructed in that case.
    pub fn new(config: WalletConfig, sink: Arc<dyn ExecutionSink>) -> Result<Self, MultisigError> {
        let registry = OwnerRegistry::from_config(&config)?;
        Ok(Self::with_registry(registry, config.label, sink))
    }

    /// Create a wallet around an already validated registry
    pub fn with_registry(
        registry: OwnerRegistry,
        label: Option<String>,
        sink: Arc<dyn ExecutionSink>,
    ) -> Self {
        let address = registry.address();
        log::info!(
            "Multisig wallet {} created ({})",
            address,
            registry.description()
        );

        Self {
            registry,
            label,
            address,
            created_at: Utc::now(),
            state: RwLock::new(WalletState::default()),
            sink,
            events: Arc::new(NullEventSink),
            retry: RetryPolicy::default(),
        }
    }

    /// Route events to `events`
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Retry transient sink failures according to `retry`
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // Checks run before any mutation, so a panic while the lock is held
    // never leaves a half-applied update behind it.
    fn read_state(&self) -> RwLockReadGuard<'_, WalletState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, WalletState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the caller to an owner position
    fn authorize(&self, caller: &str) -> Result<usize, MultisigError> {
        self.registry.position_of(caller).ok_or_else(|| {
            log::warn!("Rejected call from non-owner {}", caller);
            MultisigError::NotOwner(caller.to_string())
        })
    }

    fn owner(&self, position: usize) -> Result<Owner, MultisigError> {
        self.registry.owner_at(position).cloned()
    }

    // =========================================================================
    // Registry accessors
    // =========================================================================

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get human-readable description like "2-of-3"
    pub fn description(&self) -> String {
        self.registry.description()
    }

    /// Owners in registration order
    pub fn owners(&self) -> &[Owner] {
        self.registry.owners()
    }

    pub fn owner_at(&self, index: usize) -> Result<&Owner, MultisigError> {
        self.registry.owner_at(index)
    }

    pub fn is_owner(&self, principal: &str) -> bool {
        self.registry.is_owner(principal)
    }

    /// Confirmations required before execution
    pub fn quorum(&self) -> usize {
        self.registry.quorum()
    }

    pub fn registry(&self) -> &OwnerRegistry {
        &self.registry
    }

    // =========================================================================
    // Holding pool
    // =========================================================================

    /// Current pool balance
    pub fn balance(&self) -> u128 {
        self.read_state().balance
    }

    /// Accept value into the pool from anyone and return the new balance
    pub fn deposit(&self, sender: &str, amount: u128) -> Result<u128, MultisigError> {
        let mut state = self.write_state();

        let balance = state
            .balance
            .checked_add(amount)
            .ok_or(MultisigError::BalanceOverflow {
                balance: state.balance,
                amount,
            })?;
        state.balance = balance;
        state.version += 1;

        log::info!("Deposit of {} from {} (balance {})", amount, sender, balance);
        self.events.emit(&WalletEvent::Deposit {
            sender: sender.to_string(),
            amount,
            balance,
            timestamp: Utc::now(),
        });

        Ok(balance)
    }

    // =========================================================================
    // Transaction lifecycle
    // =========================================================================

    /// Propose a transaction and return its index
    ///
    /// Submitting does not confirm; the submitter confirms separately.
    pub fn submit_transaction(
        &self,
        caller: &str,
        target: &str,
        value: u128,
        payload: Vec<u8>,
    ) -> Result<usize, MultisigError> {
        let owner = self.owner(self.authorize(caller)?)?;
        let mut state = self.write_state();

        let index = state
            .store
            .append(owner.clone(), target.to_string(), value, payload.clone());
        state.version += 1;

        log::info!(
            "Transaction #{} submitted by {}: {} -> {}",
            index,
            owner,
            value,
            target
        );
        self.events.emit(&WalletEvent::SubmitTransaction {
            owner,
            index,
            target: target.to_string(),
            value,
            payload,
            timestamp: Utc::now(),
        });

        Ok(index)
    }

    /// Record the caller's approval of a pending transaction
    pub fn confirm_transaction(&self, caller: &str, index: usize) -> Result<(), MultisigError> {
        let position = self.authorize(caller)?;
        let owner = self.owner(position)?;
        let mut state = self.write_state();

        if state.store.get(index)?.executed {
            return Err(MultisigError::AlreadyExecuted(index));
        }

        let count = state.tracker.set_confirmed(index, position)?;
        state.store.set_confirmation_count(index, count)?;
        state.version += 1;

        log::info!(
            "Transaction #{} confirmed by {} ({}/{})",
            index,
            owner,
            count,
            self.registry.quorum()
        );
        self.events.emit(&WalletEvent::ConfirmTransaction {
            owner,
            index,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Withdraw the caller's approval
    ///
    /// Executed transactions are final: revoking after execution fails
    /// with `AlreadyExecuted` so the confirmation record stays as it was
    /// when the transaction went out.
    pub fn revoke_confirmation(&self, caller: &str, index: usize) -> Result<(), MultisigError> {
        let position = self.authorize(caller)?;
        let owner = self.owner(position)?;
        let mut state = self.write_state();

        if state.store.get(index)?.executed {
            return Err(MultisigError::AlreadyExecuted(index));
        }

        let count = state.tracker.clear_confirmed(index, position)?;
        state.store.set_confirmation_count(index, count)?;
        state.version += 1;

        log::info!(
            "Confirmation of transaction #{} revoked by {} ({}/{})",
            index,
            owner,
            count,
            self.registry.quorum()
        );
        self.events.emit(&WalletEvent::RevokeConfirmation {
            owner,
            index,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Dispatch a transaction that has reached quorum
    ///
    /// The write lock is held from the "not executed" check through the
    /// sink call to the executed flag, so concurrent callers cannot both
    /// dispatch the same index. A sink failure leaves the transaction
    /// pending and is returned as `ExecutionFailed`; execute may be
    /// called again.
    pub fn execute_transaction(&self, caller: &str, index: usize) -> Result<(), MultisigError> {
        let owner = self.owner(self.authorize(caller)?)?;
        let mut state = self.write_state();

        let tx = state.store.get(index)?;
        if tx.executed {
            return Err(MultisigError::AlreadyExecuted(index));
        }

        let need = self.registry.quorum();
        if tx.confirmations < need {
            log::warn!(
                "Transaction #{} not executable: {}/{} confirmations",
                index,
                tx.confirmations,
                need
            );
            return Err(MultisigError::InsufficientConfirmations {
                have: tx.confirmations,
                need,
            });
        }

        if tx.value > state.balance {
            let err = ExecutionError::InsufficientFunds {
                have: state.balance,
                need: tx.value,
            };
            log::warn!("Transaction #{} not executable: {}", index, err);
            return Err(err.into());
        }

        let call = tx.call();
        let attempts = self.retry.run(self.sink.as_ref(), &call).map_err(|e| {
            log::warn!("Transaction #{} failed: {}", index, e);
            MultisigError::ExecutionFailed(e)
        })?;

        state.balance -= call.value;
        state.store.mark_executed(index)?;
        state.version += 1;

        log::info!(
            "Transaction #{} executed by {} after {} attempt(s)",
            index,
            owner,
            attempts
        );
        self.events.emit(&WalletEvent::ExecuteTransaction {
            owner,
            index,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Copy of the transaction at `index`
    pub fn get_transaction(&self, index: usize) -> Result<Transaction, MultisigError> {
        self.read_state().store.get(index).cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.read_state().store.count()
    }

    /// All transactions in submission order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.read_state().store.iter().cloned().collect()
    }

    /// Indices of transactions not yet executed
    pub fn pending_indices(&self) -> Vec<usize> {
        self.read_state().store.pending_indices()
    }

    /// Whether `owner` currently confirms transaction `index`
    ///
    /// Unknown owners and unknown transactions report `false`.
    pub fn is_confirmed(&self, index: usize, owner: &str) -> bool {
        match self.registry.position_of(owner) {
            Some(position) => self.read_state().tracker.has_confirmed(index, position),
            None => false,
        }
    }

    /// Owners that currently confirm `index`, in registry order
    pub fn confirmations_of(&self, index: usize) -> Result<Vec<Owner>, MultisigError> {
        let state = self.read_state();
        state.store.get(index)?;

        state
            .tracker
            .confirmed_positions(index)
            .into_iter()
            .map(|position| self.owner(position))
            .collect()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Consistent image of the wallet for storage
    pub fn snapshot(&self) -> WalletSnapshot {
        let state = self.read_state();
        let transactions: Vec<Transaction> = state.store.iter().cloned().collect();
        let confirmations = transactions
            .iter()
            .map(|tx| state.tracker.confirmed_positions(tx.index))
            .collect();

        WalletSnapshot {
            config: self.registry.to_config(self.label.clone()),
            address: self.address.clone(),
            balance: state.balance,
            transactions,
            confirmations,
            created_at: self.created_at,
            version: state.version,
        }
    }

    /// Rebuild a wallet from a snapshot, re-checking every invariant
    pub fn restore(
        snapshot: WalletSnapshot,
        sink: Arc<dyn ExecutionSink>,
    ) -> Result<Self, StorageError> {
        let registry = OwnerRegistry::from_config(&snapshot.config)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;

        if registry.address() != snapshot.address {
            return Err(StorageError::InvalidData(format!(
                "address mismatch: snapshot {}, owners derive {}",
                snapshot.address,
                registry.address()
            )));
        }

        if snapshot.confirmations.len() != snapshot.transactions.len() {
            return Err(StorageError::InvalidData(format!(
                "{} confirmation sets for {} transactions",
                snapshot.confirmations.len(),
                snapshot.transactions.len()
            )));
        }

        // Index order first: the tracker is sized by these indices
        let store = TransactionStore::from_transactions(snapshot.transactions).ok_or_else(|| {
            StorageError::InvalidData("transactions out of order".to_string())
        })?;

        let quorum = registry.quorum();
        let mut tracker = ConfirmationTracker::new();
        for (tx, positions) in store.iter().zip(&snapshot.confirmations) {
            for &position in positions {
                if position >= registry.len() {
                    return Err(StorageError::InvalidData(format!(
                        "tx #{} confirmed by unknown owner position {}",
                        tx.index, position
                    )));
                }
                tracker.set_confirmed(tx.index, position).map_err(|_| {
                    StorageError::InvalidData(format!(
                        "tx #{} confirmed twice by owner position {}",
                        tx.index, position
                    ))
                })?;
            }

            if tracker.count_for(tx.index) != tx.confirmations {
                return Err(StorageError::InvalidData(format!(
                    "tx #{} records {} confirmations but {} owners confirmed",
                    tx.index,
                    tx.confirmations,
                    tracker.count_for(tx.index)
                )));
            }

            if tx.executed && tx.confirmations < quorum {
                return Err(StorageError::InvalidData(format!(
                    "tx #{} executed with {}/{} confirmations",
                    tx.index, tx.confirmations, quorum
                )));
            }

            if tx.executed != tx.executed_at.is_some() {
                return Err(StorageError::InvalidData(format!(
                    "tx #{} executed flag disagrees with its execution time",
                    tx.index
                )));
            }
        }

        let wallet = Self::with_registry(registry, snapshot.config.label, sink);
        {
            let mut state = wallet.write_state();
            state.store = store;
            state.tracker = tracker;
            state.balance = snapshot.balance;
            state.version = snapshot.version;
        }

        Ok(Self {
            created_at: snapshot.created_at,
            ..wallet
        })
    }
}
