//! CLI commands for the vault
//!
//! Implements all command handlers for the CLI interface. Every mutating
//! command loads the persisted wallet, applies one operation, prints the
//! events it emitted and saves the result.

use crate::crypto::{decode_payload, encode_payload};
use crate::multisig::{
    EventLog, LoggingSink, MultisigWallet, RetryPolicy, Transaction, WalletConfig, WalletEvent,
    WalletSnapshot,
};
use crate::storage::{load_from_file, save_to_file, Storage, StorageConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub wallet: MultisigWallet,
    pub storage: Storage,
    pub events: Arc<EventLog>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load the vault stored under `data_dir`
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let storage = open_storage(&data_dir)?;

        if !storage.exists() {
            return Err(format!(
                "No vault found at {:?}. Create one with: vault init",
                data_dir
            )
            .into());
        }

        let snapshot = storage.load()?;
        let events = Arc::new(EventLog::new());
        let wallet =
            MultisigWallet::restore(snapshot, Arc::new(LoggingSink))?.with_event_sink(events.clone());

        Ok(Self {
            wallet,
            storage,
            events,
            data_dir,
        })
    }

    /// Retry transient sink failures on execute
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.wallet = self.wallet.with_retry_policy(retry);
        self
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.wallet.snapshot())?;
        Ok(())
    }

    /// Print and forget the events emitted since the last call
    fn report_events(&self) {
        for event in self.events.drain() {
            println!("   📣 {}", describe_event(&event));
        }
    }
}

fn open_storage(data_dir: &Path) -> CliResult<Storage> {
    let storage_config = StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    };
    Ok(Storage::new(storage_config)?)
}

/// One-line rendering of an event
pub fn describe_event(event: &WalletEvent) -> String {
    match event {
        WalletEvent::Deposit {
            sender,
            amount,
            balance,
            ..
        } => format!("Deposit: {} from {} (balance {})", amount, sender, balance),
        WalletEvent::SubmitTransaction {
            owner,
            index,
            target,
            value,
            payload,
            ..
        } => format!(
            "SubmitTransaction: #{} by {} -> {} value {} data {}",
            index,
            owner,
            target,
            value,
            encode_payload(payload)
        ),
        WalletEvent::ConfirmTransaction { owner, index, .. }
        | WalletEvent::RevokeConfirmation { owner, index, .. }
        | WalletEvent::ExecuteTransaction { owner, index, .. } => {
            format!("{}: #{} by {}", event.name(), index, owner)
        }
    }
}

fn print_transaction(state: &AppState, tx: &Transaction) -> CliResult<()> {
    let confirmed_by: Vec<String> = state
        .wallet
        .confirmations_of(tx.index)?
        .iter()
        .map(|o| o.to_string())
        .collect();

    println!("📄 Transaction #{}", tx.index);
    println!("   ├─ Status: {:?}", tx.status());
    println!("   ├─ To: {}", tx.target);
    println!("   ├─ Value: {}", tx.value);
    println!("   ├─ Data: {}", encode_payload(&tx.payload));
    println!(
        "   ├─ Confirmations: {}/{}",
        tx.confirmations,
        state.wallet.quorum()
    );
    println!("   ├─ Confirmed by: {}", confirmed_by.join(", "));
    println!("   ├─ Submitted by: {}", tx.submitted_by);
    println!(
        "   ├─ Submitted at: {}",
        tx.submitted_at.format("%Y-%m-%d %H:%M:%S")
    );
    match tx.executed_at {
        Some(at) => println!("   └─ Executed at: {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("   └─ Digest: {}", tx.digest()),
    }

    Ok(())
}

/// Initialize a new vault
pub fn cmd_init(data_dir: &Path, config: WalletConfig, force: bool) -> CliResult<()> {
    let storage = open_storage(data_dir)?;

    if storage.exists() && !force {
        println!("⚠️  Vault already exists at {:?}", data_dir);
        println!("   Use --force to reinitialize (this will delete existing data)");
        return Ok(());
    }

    let wallet = MultisigWallet::new(config, Arc::new(LoggingSink))?;
    if force {
        storage.delete()?;
    }
    storage.save(&wallet.snapshot())?;

    println!("✅ Vault initialized!");
    println!("   📁 Data directory: {:?}", data_dir);
    println!("   📍 Address: {}", wallet.address());
    println!("   🔐 Policy: {}", wallet.description());
    if let Some(label) = wallet.label() {
        println!("   🏷️  Label: {}", label);
    }

    Ok(())
}

/// Add value to the holding pool
pub fn cmd_deposit(state: &mut AppState, from: &str, amount: u128) -> CliResult<()> {
    let balance = state.wallet.deposit(from, amount)?;
    state.report_events();
    state.save()?;

    println!("💰 Deposited {} from {}", amount, from);
    println!("   Balance: {}", balance);
    Ok(())
}

/// Propose a new transaction
pub fn cmd_submit(
    state: &mut AppState,
    owner: &str,
    to: &str,
    value: u128,
    data: Option<&str>,
) -> CliResult<()> {
    let payload = match data {
        Some(text) => decode_payload(text)?,
        None => Vec::new(),
    };

    let index = state.wallet.submit_transaction(owner, to, value, payload)?;
    state.report_events();
    state.save()?;

    println!("📤 Transaction #{} submitted", index);
    println!(
        "   Needs {} confirmation(s) before it can be executed",
        state.wallet.quorum()
    );
    Ok(())
}

/// Confirm a pending transaction
pub fn cmd_confirm(state: &mut AppState, owner: &str, index: usize) -> CliResult<()> {
    state.wallet.confirm_transaction(owner, index)?;
    state.report_events();
    state.save()?;

    let tx = state.wallet.get_transaction(index)?;
    println!(
        "✅ {} confirmed #{} ({}/{})",
        owner,
        index,
        tx.confirmations,
        state.wallet.quorum()
    );
    Ok(())
}

/// Withdraw a confirmation
pub fn cmd_revoke(state: &mut AppState, owner: &str, index: usize) -> CliResult<()> {
    state.wallet.revoke_confirmation(owner, index)?;
    state.report_events();
    state.save()?;

    let tx = state.wallet.get_transaction(index)?;
    println!(
        "↩️  {} revoked #{} ({}/{})",
        owner,
        index,
        tx.confirmations,
        state.wallet.quorum()
    );
    Ok(())
}

/// Dispatch a transaction that reached quorum
pub fn cmd_execute(state: &mut AppState, owner: &str, index: usize) -> CliResult<()> {
    state.wallet.execute_transaction(owner, index)?;
    state.report_events();
    state.save()?;

    println!("🚀 Transaction #{} executed", index);
    println!("   Balance: {}", state.wallet.balance());
    Ok(())
}

/// Show one transaction
pub fn cmd_show(state: &AppState, index: usize) -> CliResult<()> {
    let tx = state.wallet.get_transaction(index)?;
    print_transaction(state, &tx)
}

/// List every transaction
pub fn cmd_list(state: &AppState) -> CliResult<()> {
    let transactions = state.wallet.transactions();

    if transactions.is_empty() {
        println!("📭 No transactions yet. Propose one with: vault submit");
        return Ok(());
    }

    println!("📋 Transactions ({}):", transactions.len());
    for tx in &transactions {
        println!(
            "   #{} | {:?} | {} -> {} | {}/{} confirmations",
            tx.index,
            tx.status(),
            tx.value,
            tx.target,
            tx.confirmations,
            state.wallet.quorum()
        );
    }

    Ok(())
}

/// Show the owner set and vault summary
pub fn cmd_owners(state: &AppState) -> CliResult<()> {
    println!("🔐 Vault {}", state.wallet.address());
    println!("   ├─ Policy: {}", state.wallet.description());
    println!("   ├─ Balance: {}", state.wallet.balance());
    println!(
        "   ├─ Transactions: {} ({} pending)",
        state.wallet.transaction_count(),
        state.wallet.pending_indices().len()
    );
    println!("   └─ Owners:");
    for (position, owner) in state.wallet.owners().iter().enumerate() {
        println!("      {}. {}", position, owner);
    }

    Ok(())
}

/// Check a snapshot by restoring it, then make it the current vault
fn install_snapshot(storage: &Storage, snapshot: WalletSnapshot) -> CliResult<MultisigWallet> {
    let wallet = MultisigWallet::restore(snapshot, Arc::new(LoggingSink))?;
    storage.save(&wallet.snapshot())?;
    Ok(wallet)
}

/// List saved backups
pub fn cmd_backup_list(data_dir: &Path) -> CliResult<()> {
    let storage = open_storage(data_dir)?;
    let stats = storage.stats()?;

    println!("💾 Storage at {:?}", storage.data_dir());
    println!("   Vault file: {} bytes", stats.file_size);

    let backups = storage.list_backups();
    if backups.is_empty() {
        println!("   No backups yet.");
        return Ok(());
    }

    println!("   Backups ({}):", stats.backup_count);
    for index in backups {
        let snapshot = storage.restore_backup(index)?;
        println!(
            "   └─ #{} | version {} | {} transaction(s) | balance {}",
            index,
            snapshot.version,
            snapshot.transactions.len(),
            snapshot.balance
        );
    }

    Ok(())
}

/// Replace the vault with backup `index`
pub fn cmd_backup_restore(data_dir: &Path, index: usize) -> CliResult<()> {
    let storage = open_storage(data_dir)?;
    let snapshot = storage.restore_backup(index)?;
    let wallet = install_snapshot(&storage, snapshot)?;

    println!("♻️  Restored backup #{}", index);
    println!("   📍 Address: {}", wallet.address());
    println!("   Transactions: {}", wallet.transaction_count());
    Ok(())
}

/// Export the vault to a file
pub fn cmd_export(state: &AppState, path: &Path) -> CliResult<()> {
    save_to_file(&state.wallet.snapshot(), path)?;
    println!("📦 Vault exported to {:?}", path);
    Ok(())
}

/// Import a vault from a file, replacing the current one
pub fn cmd_import(data_dir: &Path, path: &Path) -> CliResult<()> {
    let storage = open_storage(data_dir)?;
    let snapshot = load_from_file(path)?;
    let wallet = install_snapshot(&storage, snapshot)?;

    println!("📥 Vault imported from {:?}", path);
    println!("   📍 Address: {}", wallet.address());
    println!("   Transactions: {}", wallet.transaction_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config() -> WalletConfig {
        WalletConfig::new(
            vec!["alice".to_string(), "bob".to_string(), "carol".to_string()],
            2,
            Some("treasury".to_string()),
        )
    }

    #[test]
    fn test_state_requires_init() {
        let dir = tempdir().unwrap();
        assert!(AppState::new(dir.path().to_path_buf()).is_err());
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempdir().unwrap();
        cmd_init(dir.path(), config(), false).unwrap();

        let mut state = AppState::new(dir.path().to_path_buf()).unwrap();
        cmd_deposit(&mut state, "anyone", 10).unwrap();

        // Without --force the existing vault is kept
        cmd_init(dir.path(), config(), false).unwrap();
        let state = AppState::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.wallet.balance(), 10);

        cmd_init(dir.path(), config(), true).unwrap();
        let state = AppState::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.wallet.balance(), 0);
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let dir = tempdir().unwrap();
        let bad = WalletConfig::new(vec!["alice".to_string()], 2, None);
        assert!(cmd_init(dir.path(), bad, false).is_err());
        assert!(AppState::new(dir.path().to_path_buf()).is_err());
    }

    #[test]
    fn test_flow_persists_between_commands() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().to_path_buf();
        cmd_init(&data_dir, config(), false).unwrap();

        let mut state = AppState::new(data_dir.clone()).unwrap();
        cmd_deposit(&mut state, "anyone", 50).unwrap();
        cmd_submit(&mut state, "alice", "dave", 20, Some("0x0123")).unwrap();
        cmd_confirm(&mut state, "alice", 0).unwrap();

        // Each command starts from what the previous one saved
        let mut state = AppState::new(data_dir.clone()).unwrap();
        cmd_confirm(&mut state, "bob", 0).unwrap();
        cmd_revoke(&mut state, "bob", 0).unwrap();
        assert!(cmd_execute(&mut state, "carol", 0).is_err());
        cmd_confirm(&mut state, "bob", 0).unwrap();

        let mut state = AppState::new(data_dir.clone()).unwrap();
        cmd_execute(&mut state, "carol", 0).unwrap();

        let state = AppState::new(data_dir).unwrap();
        let tx = state.wallet.get_transaction(0).unwrap();
        assert!(tx.executed);
        assert_eq!(tx.payload, vec![0x01, 0x23]);
        assert_eq!(state.wallet.balance(), 30);
        assert!(state.events.is_empty());

        cmd_show(&state, 0).unwrap();
        cmd_list(&state).unwrap();
        cmd_owners(&state).unwrap();
    }

    #[test]
    fn test_rejected_command_is_not_saved() {
        let dir = tempdir().unwrap();
        cmd_init(dir.path(), config(), false).unwrap();

        let mut state = AppState::new(dir.path().to_path_buf()).unwrap();
        assert!(cmd_submit(&mut state, "mallory", "dave", 0, None).is_err());
        assert!(cmd_submit(&mut state, "alice", "dave", 0, Some("0xzz")).is_err());
        assert!(cmd_show(&state, 0).is_err());

        let state = AppState::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.wallet.transaction_count(), 0);
    }

    #[test]
    fn test_backup_restore_rolls_back_vault() {
        let dir = tempdir().unwrap();
        cmd_init(dir.path(), config(), false).unwrap();

        let mut state = AppState::new(dir.path().to_path_buf()).unwrap();
        cmd_deposit(&mut state, "anyone", 5).unwrap();
        cmd_deposit(&mut state, "anyone", 7).unwrap();
        cmd_backup_list(dir.path()).unwrap();

        // Backup 0 holds the vault as it was before the last deposit
        cmd_backup_restore(dir.path(), 0).unwrap();
        let state = AppState::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(state.wallet.balance(), 5);

        assert!(cmd_backup_restore(dir.path(), 4).is_err());
    }

    #[test]
    fn test_export_import() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let file = source.path().join("export.json");
        cmd_init(source.path(), config(), false).unwrap();

        let mut state = AppState::new(source.path().to_path_buf()).unwrap();
        cmd_submit(&mut state, "alice", "dave", 0, None).unwrap();
        cmd_confirm(&mut state, "bob", 0).unwrap();
        cmd_export(&state, &file).unwrap();

        cmd_import(target.path(), &file).unwrap();
        let imported = AppState::new(target.path().to_path_buf()).unwrap();
        assert_eq!(imported.wallet.address(), state.wallet.address());
        assert!(imported.wallet.is_confirmed(0, "bob"));
    }

    #[test]
    fn test_import_rejects_invalid_snapshot() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let file = source.path().join("export.json");
        cmd_init(source.path(), config(), false).unwrap();

        let state = AppState::new(source.path().to_path_buf()).unwrap();
        let mut snapshot = state.wallet.snapshot();
        snapshot.balance = 1;
        snapshot.address = "tampered".to_string();
        save_to_file(&snapshot, &file).unwrap();

        assert!(cmd_import(target.path(), &file).is_err());
        assert!(AppState::new(target.path().to_path_buf()).is_err());
    }

    #[test]
    fn test_describe_event() {
        let dir = tempdir().unwrap();
        cmd_init(dir.path(), config(), false).unwrap();
        let state = AppState::new(dir.path().to_path_buf()).unwrap();

        state
            .wallet
            .submit_transaction("alice", "dave", 5, vec![0xAB])
            .unwrap();
        state.wallet.confirm_transaction("bob", 0).unwrap();

        let lines: Vec<String> = state.events.events().iter().map(describe_event).collect();
        assert_eq!(
            lines,
            vec![
                "SubmitTransaction: #0 by alice -> dave value 5 data 0xab".to_string(),
                "ConfirmTransaction: #0 by bob".to_string(),
            ]
        );
    }
}
