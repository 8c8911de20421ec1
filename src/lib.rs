//! Quorum Vault: an M-of-N multi-signature vault in Rust
//!
//! This crate provides:
//! - A fixed owner set with a confirmation quorum
//! - Append-only transaction proposals with per-owner confirmations
//! - Exactly-once execution through an injected execution sink
//! - Ordered event emission for every accepted state change
//! - JSON persistence with backups
//! - A CLI and a REST/WebSocket API
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quorum_vault::multisig::{EventLog, LoggingSink, MultisigWallet, WalletConfig};
//!
//! let config = WalletConfig::new(
//!     vec!["alice".to_string(), "bob".to_string()],
//!     2,
//!     Some("treasury".to_string()),
//! );
//! let events = Arc::new(EventLog::new());
//! let wallet = MultisigWallet::new(config, Arc::new(LoggingSink))
//!     .unwrap()
//!     .with_event_sink(events.clone());
//! println!("Address: {}", wallet.address());
//!
//! wallet.deposit("anyone", 100).unwrap();
//! let index = wallet.submit_transaction("alice", "dave", 40, vec![]).unwrap();
//! wallet.confirm_transaction("alice", index).unwrap();
//! wallet.confirm_transaction("bob", index).unwrap();
//! wallet.execute_transaction("bob", index).unwrap();
//!
//! assert_eq!(wallet.balance(), 60);
//! assert_eq!(events.len(), 5);
//! ```

pub mod api;
pub mod cli;
pub mod crypto;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use multisig::{
    EventSink, ExecutionError, ExecutionSink, LoggingSink, MultisigError, MultisigWallet,
    RetryPolicy, Transaction, WalletConfig, WalletEvent,
};
pub use storage::{Storage, StorageConfig};
