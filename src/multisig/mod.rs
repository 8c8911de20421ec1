//! Multi-signature vault
//!
//! An M-of-N vault: a fixed set of owners proposes outgoing transactions,
//! and a transaction is dispatched only after `quorum` distinct owners
//! have confirmed it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quorum_vault::multisig::{LoggingSink, MultisigWallet, WalletConfig};
//!
//! // Create a 2-of-3 vault
//! let config = WalletConfig::new(
//!     vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
//!     2,
//!     None,
//! );
//! let wallet = MultisigWallet::new(config, Arc::new(LoggingSink)).unwrap();
//!
//! // Propose a transaction
//! let index = wallet.submit_transaction("alice", "dave", 0, vec![0x01, 0x23]).unwrap();
//!
//! // Collect confirmations
//! wallet.confirm_transaction("alice", index).unwrap();
//! wallet.confirm_transaction("bob", index).unwrap();
//!
//! // Quorum reached, dispatch it
//! wallet.execute_transaction("carol", index).unwrap();
//! assert!(wallet.get_transaction(index).unwrap().executed);
//! ```

pub mod confirmation;
pub mod events;
pub mod executor;
pub mod owners;
pub mod transaction;
pub mod wallet;

pub use confirmation::{ConfirmationSet, ConfirmationTracker, MAX_OWNERS};
pub use events::{EventLog, EventSink, NullEventSink, WalletEvent};
pub use executor::{Call, ExecutionError, ExecutionSink, LoggingSink, RetryPolicy};
pub use owners::{Owner, OwnerRegistry, WalletConfig};
pub use transaction::{Transaction, TransactionStatus, TransactionStore};
pub use wallet::{MultisigError, MultisigWallet, WalletSnapshot};
