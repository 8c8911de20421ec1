//! REST API handlers for vault operations

use crate::api::websocket::WsBroadcaster;
use crate::crypto::{decode_payload, encode_payload};
use crate::multisig::{MultisigError, MultisigWallet, Transaction};
use crate::storage::Storage;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub wallet: Arc<MultisigWallet>,
    pub storage: Arc<Storage>,
    pub ws_broadcaster: Arc<WsBroadcaster>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub label: Option<String>,
    pub description: String,
    pub owners: Vec<String>,
    pub quorum: usize,
    pub balance: u128,
    pub transaction_count: usize,
    pub pending: Vec<usize>,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TransactionInfo {
    pub index: usize,
    pub to: String,
    pub value: u128,
    pub data: String,
    pub confirmations: usize,
    pub confirmations_required: usize,
    pub confirmed_by: Vec<String>,
    pub executed: bool,
    pub status: String,
    pub digest: String,
    pub submitted_by: String,
    pub submitted_at: String,
    pub executed_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DepositResponse {
    pub sender: String,
    pub amount: u128,
    pub balance: u128,
}

#[derive(Debug, Serialize)]
pub struct ConfirmationStatus {
    pub index: usize,
    pub owner: String,
    pub confirmed: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct DepositRequest {
    pub sender: String,
    pub amount: u128,
}

#[derive(Deserialize)]
pub struct SubmitTransactionRequest {
    pub owner: String,
    pub to: String,
    #[serde(default)]
    pub value: u128,
    /// Hex payload, `0x` prefix optional
    #[serde(default)]
    pub data: String,
}

/// Body of confirm / revoke / execute: the calling owner
#[derive(Deserialize)]
pub struct OwnerRequest {
    pub owner: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn bad_request(error: String) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { error }))
}

/// Map a wallet error to an HTTP status
fn error_response(e: MultisigError) -> (StatusCode, Json<ApiError>) {
    let status = match &e {
        MultisigError::NotOwner(_) => StatusCode::FORBIDDEN,
        MultisigError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
        MultisigError::AlreadyExecuted(_)
        | MultisigError::AlreadyConfirmed(_)
        | MultisigError::NotConfirmed(_)
        | MultisigError::InsufficientConfirmations { .. } => StatusCode::CONFLICT,
        MultisigError::ExecutionFailed(_) => StatusCode::BAD_GATEWAY,
        MultisigError::InvalidConfig(_)
        | MultisigError::IndexOutOfRange { .. }
        | MultisigError::BalanceOverflow { .. } => StatusCode::BAD_REQUEST,
    };

    (
        status,
        Json(ApiError {
            error: e.to_string(),
        }),
    )
}

fn transaction_info(wallet: &MultisigWallet, tx: &Transaction) -> TransactionInfo {
    let confirmed_by = wallet
        .confirmations_of(tx.index)
        .map(|owners| owners.iter().map(|o| o.to_string()).collect())
        .unwrap_or_default();

    TransactionInfo {
        index: tx.index,
        to: tx.target.clone(),
        value: tx.value,
        data: encode_payload(&tx.payload),
        confirmations: tx.confirmations,
        confirmations_required: wallet.quorum(),
        confirmed_by,
        executed: tx.executed,
        status: format!("{:?}", tx.status()),
        digest: tx.digest(),
        submitted_by: tx.submitted_by.to_string(),
        submitted_at: tx.submitted_at.to_rfc3339(),
        executed_at: tx.executed_at.map(|t| t.to_rfc3339()),
    }
}

fn load_transaction(state: &ApiState, index: usize) -> ApiResult<TransactionInfo> {
    let tx = state.wallet.get_transaction(index).map_err(error_response)?;
    Ok(Json(transaction_info(&state.wallet, &tx)))
}

/// Save the wallet after an accepted change
///
/// The change is already applied in memory; a failed save is reported as
/// 500 so the caller knows it is not durable.
fn persist(state: &ApiState) -> Result<(), (StatusCode, Json<ApiError>)> {
    state
        .storage
        .save(&state.wallet.snapshot())
        .map(|_| ())
        .map_err(|e| {
            log::error!("Failed to save wallet: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: format!("change applied but not saved: {}", e),
                }),
            )
        })
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/wallet - Vault summary
pub async fn get_wallet(State(state): State<ApiState>) -> Json<WalletInfo> {
    let wallet = &state.wallet;

    Json(WalletInfo {
        address: wallet.address().to_string(),
        label: wallet.label().map(str::to_string),
        description: wallet.description(),
        owners: wallet.owners().iter().map(|o| o.to_string()).collect(),
        quorum: wallet.quorum(),
        balance: wallet.balance(),
        transaction_count: wallet.transaction_count(),
        pending: wallet.pending_indices(),
        created_at: wallet.created_at().to_rfc3339(),
    })
}

/// GET /api/wallet/owners - Owners in registration order
pub async fn get_owners(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(
        state
            .wallet
            .owners()
            .iter()
            .map(|o| o.to_string())
            .collect(),
    )
}

/// POST /api/wallet/deposit - Add value to the holding pool
pub async fn deposit(
    State(state): State<ApiState>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<DepositResponse> {
    let balance = state
        .wallet
        .deposit(&req.sender, req.amount)
        .map_err(error_response)?;
    persist(&state)?;

    Ok(Json(DepositResponse {
        sender: req.sender,
        amount: req.amount,
        balance,
    }))
}

/// GET /api/transactions - All transactions in submission order
pub async fn list_transactions(State(state): State<ApiState>) -> Json<Vec<TransactionInfo>> {
    let infos = state
        .wallet
        .transactions()
        .iter()
        .map(|tx| transaction_info(&state.wallet, tx))
        .collect();

    Json(infos)
}

/// POST /api/transactions - Submit a transaction
pub async fn submit_transaction(
    State(state): State<ApiState>,
    Json(req): Json<SubmitTransactionRequest>,
) -> ApiResult<TransactionInfo> {
    let payload = decode_payload(&req.data)
        .map_err(|e| bad_request(format!("Invalid data: {}", e)))?;

    let index = state
        .wallet
        .submit_transaction(&req.owner, &req.to, req.value, payload)
        .map_err(error_response)?;
    persist(&state)?;

    load_transaction(&state, index)
}

/// GET /api/transactions/{index}
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(index): Path<usize>,
) -> ApiResult<TransactionInfo> {
    load_transaction(&state, index)
}

/// POST /api/transactions/{index}/confirm
pub async fn confirm_transaction(
    State(state): State<ApiState>,
    Path(index): Path<usize>,
    Json(req): Json<OwnerRequest>,
) -> ApiResult<TransactionInfo> {
    state
        .wallet
        .confirm_transaction(&req.owner, index)
        .map_err(error_response)?;
    persist(&state)?;

    load_transaction(&state, index)
}

/// POST /api/transactions/{index}/revoke
pub async fn revoke_confirmation(
    State(state): State<ApiState>,
    Path(index): Path<usize>,
    Json(req): Json<OwnerRequest>,
) -> ApiResult<TransactionInfo> {
    state
        .wallet
        .revoke_confirmation(&req.owner, index)
        .map_err(error_response)?;
    persist(&state)?;

    load_transaction(&state, index)
}

/// POST /api/transactions/{index}/execute
///
/// The sink call may block, so it runs on the blocking pool.
pub async fn execute_transaction(
    State(state): State<ApiState>,
    Path(index): Path<usize>,
    Json(req): Json<OwnerRequest>,
) -> ApiResult<TransactionInfo> {
    let wallet = state.wallet.clone();
    tokio::task::spawn_blocking(move || wallet.execute_transaction(&req.owner, index))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: format!("Execution task failed: {}", e),
                }),
            )
        })?
        .map_err(error_response)?;
    persist(&state)?;

    load_transaction(&state, index)
}

/// GET /api/transactions/{index}/confirmations/{owner}
pub async fn is_confirmed(
    State(state): State<ApiState>,
    Path((index, owner)): Path<(usize, String)>,
) -> Json<ConfirmationStatus> {
    let confirmed = state.wallet.is_confirmed(index, &owner);
    Json(ConfirmationStatus {
        index,
        owner,
        confirmed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::{LoggingSink, WalletConfig};
    use crate::storage::StorageConfig;

    fn test_state(dir: &std::path::Path) -> ApiState {
        let broadcaster = Arc::new(WsBroadcaster::new());
        let config = WalletConfig::new(
            vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
            2,
            None,
        );
        let wallet = MultisigWallet::new(config, Arc::new(LoggingSink))
            .unwrap()
            .with_event_sink(broadcaster.clone());
        let storage = Storage::new(StorageConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        ApiState {
            wallet: Arc::new(wallet),
            storage: Arc::new(storage),
            ws_broadcaster: broadcaster,
        }
    }

    fn submit_request(owner: &str) -> SubmitTransactionRequest {
        SubmitTransactionRequest {
            owner: owner.to_string(),
            to: "dave".to_string(),
            value: 0,
            data: "0x0123".to_string(),
        }
    }

    fn owner(owner: &str) -> Json<OwnerRequest> {
        Json(OwnerRequest {
            owner: owner.to_string(),
        })
    }

    #[tokio::test]
    async fn test_full_flow() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let Json(tx) = submit_transaction(State(state.clone()), Json(submit_request("alice")))
            .await
            .unwrap();
        assert_eq!(tx.index, 0);
        assert_eq!(tx.data, "0x0123");
        assert_eq!(tx.confirmations, 0);
        assert_eq!(tx.status, "Pending");

        confirm_transaction(State(state.clone()), Path(0), owner("alice"))
            .await
            .unwrap();
        let Json(tx) = confirm_transaction(State(state.clone()), Path(0), owner("bob"))
            .await
            .unwrap();
        assert_eq!(tx.confirmations, 2);
        assert_eq!(tx.confirmed_by, vec!["alice", "bob"]);

        let Json(tx) = execute_transaction(State(state.clone()), Path(0), owner("alice"))
            .await
            .unwrap();
        assert!(tx.executed);
        assert_eq!(tx.status, "Executed");

        let err = execute_transaction(State(state.clone()), Path(0), owner("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);

        // Every accepted change was persisted
        assert!(state.storage.load().unwrap().transactions[0].executed);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let err = submit_transaction(State(state.clone()), Json(submit_request("mallory")))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::FORBIDDEN);

        let err = get_transaction(State(state.clone()), Path(5))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        submit_transaction(State(state.clone()), Json(submit_request("alice")))
            .await
            .unwrap();
        let err = execute_transaction(State(state.clone()), Path(0), owner("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::CONFLICT);

        let mut bad = submit_request("alice");
        bad.data = "0xnothex".to_string();
        let err = submit_transaction(State(state.clone()), Json(bad))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_execution_failure_maps_to_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let mut request = submit_request("alice");
        request.value = 10;
        submit_transaction(State(state.clone()), Json(request))
            .await
            .unwrap();
        confirm_transaction(State(state.clone()), Path(0), owner("alice"))
            .await
            .unwrap();
        confirm_transaction(State(state.clone()), Path(0), owner("carol"))
            .await
            .unwrap();

        // Empty pool
        let err = execute_transaction(State(state.clone()), Path(0), owner("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_GATEWAY);

        deposit(
            State(state.clone()),
            Json(DepositRequest {
                sender: "anyone".to_string(),
                amount: 10,
            }),
        )
        .await
        .unwrap();
        let Json(tx) = execute_transaction(State(state.clone()), Path(0), owner("bob"))
            .await
            .unwrap();
        assert!(tx.executed);
    }

    #[tokio::test]
    async fn test_failed_save_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("vault");
        let state = test_state(&data_dir);
        std::fs::remove_dir_all(&data_dir).unwrap();

        let err = deposit(
            State(state.clone()),
            Json(DepositRequest {
                sender: "anyone".to_string(),
                amount: 3,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.1.error.contains("not saved"));
        // Applied in memory all the same
        assert_eq!(state.wallet.balance(), 3);
    }

    #[tokio::test]
    async fn test_persisted_file_follows_latest_change() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        submit_transaction(State(state.clone()), Json(submit_request("alice")))
            .await
            .unwrap();
        confirm_transaction(State(state.clone()), Path(0), owner("alice"))
            .await
            .unwrap();
        confirm_transaction(State(state.clone()), Path(0), owner("bob"))
            .await
            .unwrap();
        let before_execute = state.wallet.snapshot();
        execute_transaction(State(state.clone()), Path(0), owner("carol"))
            .await
            .unwrap();

        // An image taken before the execute cannot roll the file back
        assert!(!state.storage.save(&before_execute).unwrap());
        let saved = state.storage.load().unwrap();
        assert!(saved.transactions[0].executed);
        assert_eq!(saved.version, state.wallet.snapshot().version);
    }

    #[tokio::test]
    async fn test_wallet_and_confirmation_reads() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let Json(dep) = deposit(
            State(state.clone()),
            Json(DepositRequest {
                sender: "anyone".to_string(),
                amount: 7,
            }),
        )
        .await
        .unwrap();
        assert_eq!(dep.balance, 7);

        submit_transaction(State(state.clone()), Json(submit_request("bob")))
            .await
            .unwrap();
        confirm_transaction(State(state.clone()), Path(0), owner("carol"))
            .await
            .unwrap();
        let Json(tx) = revoke_confirmation(State(state.clone()), Path(0), owner("carol"))
            .await
            .unwrap();
        assert_eq!(tx.confirmations, 0);

        let Json(status) = is_confirmed(State(state.clone()), Path((0, "carol".to_string()))).await;
        assert!(!status.confirmed);

        let Json(info) = get_wallet(State(state.clone())).await;
        assert_eq!(info.description, "2-of-3");
        assert_eq!(info.balance, 7);
        assert_eq!(info.pending, vec![0]);

        let Json(owners) = get_owners(State(state.clone())).await;
        assert_eq!(owners, vec!["alice", "bob", "carol"]);

        let Json(list) = list_transactions(State(state)).await;
        assert_eq!(list.len(), 1);
    }
}
