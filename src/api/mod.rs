//! REST API module
//!
//! Provides HTTP REST API for programmatic access to the vault. The
//! calling owner is taken from the `owner` field of the request body.
//!
//! # Endpoints
//!
//! ## Wallet
//! - `GET /api/wallet` - Address, owners, quorum, balance, pending indices
//! - `GET /api/wallet/owners` - Owners in registration order
//! - `POST /api/wallet/deposit` - Add value to the holding pool
//!
//! ## Transactions
//! - `GET /api/transactions` - List transactions
//! - `POST /api/transactions` - Submit a transaction
//! - `GET /api/transactions/:index` - Get transaction
//! - `POST /api/transactions/:index/confirm` - Confirm
//! - `POST /api/transactions/:index/revoke` - Revoke a confirmation
//! - `POST /api/transactions/:index/execute` - Execute once quorum is met
//! - `GET /api/transactions/:index/confirmations/:owner` - Confirmation status
//!
//! ## WebSocket
//! - `GET /ws` - Real-time wallet events

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
pub use websocket::WsBroadcaster;
