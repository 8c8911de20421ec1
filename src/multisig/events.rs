//! Wallet events
//!
//! Every accepted state change emits one [`WalletEvent`] to the wallet's
//! [`EventSink`], in the order the operations were accepted.

use crate::crypto::encoding::hex_payload;
use crate::multisig::owners::Owner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Observable state change
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "args")]
pub enum WalletEvent {
    /// Value was received into the holding pool
    Deposit {
        sender: String,
        amount: u128,
        balance: u128,
        timestamp: DateTime<Utc>,
    },
    SubmitTransaction {
        owner: Owner,
        index: usize,
        target: String,
        value: u128,
        #[serde(with = "hex_payload")]
        payload: Vec<u8>,
        timestamp: DateTime<Utc>,
    },
    ConfirmTransaction {
        owner: Owner,
        index: usize,
        timestamp: DateTime<Utc>,
    },
    RevokeConfirmation {
        owner: Owner,
        index: usize,
        timestamp: DateTime<Utc>,
    },
    ExecuteTransaction {
        owner: Owner,
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

impl WalletEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WalletEvent::Deposit { .. } => "Deposit",
            WalletEvent::SubmitTransaction { .. } => "SubmitTransaction",
            WalletEvent::ConfirmTransaction { .. } => "ConfirmTransaction",
            WalletEvent::RevokeConfirmation { .. } => "RevokeConfirmation",
            WalletEvent::ExecuteTransaction { .. } => "ExecuteTransaction",
        }
    }

    /// Transaction index the event refers to (none for deposits)
    pub fn index(&self) -> Option<usize> {
        match self {
            WalletEvent::Deposit { .. } => None,
            WalletEvent::SubmitTransaction { index, .. }
            | WalletEvent::ConfirmTransaction { index, .. }
            | WalletEvent::RevokeConfirmation { index, .. }
            | WalletEvent::ExecuteTransaction { index, .. } => Some(*index),
        }
    }

    /// Owner that triggered the event (none for deposits)
    pub fn owner(&self) -> Option<&Owner> {
        match self {
            WalletEvent::Deposit { .. } => None,
            WalletEvent::SubmitTransaction { owner, .. }
            | WalletEvent::ConfirmTransaction { owner, .. }
            | WalletEvent::RevokeConfirmation { owner, .. }
            | WalletEvent::ExecuteTransaction { owner, .. } => Some(owner),
        }
    }
}

/// Receiver of wallet events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WalletEvent);
}

/// Discards every event
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: &WalletEvent) {}
}

/// In-memory, ordered event history
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<WalletEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event recorded so far
    pub fn events(&self) -> Vec<WalletEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return the recorded events
    pub fn drain(&self) -> Vec<WalletEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent event, if any
    pub fn last(&self) -> Option<WalletEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &WalletEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
