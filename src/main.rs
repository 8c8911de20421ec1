//! Quorum Vault CLI Application
//!
//! A command-line interface for an M-of-N multi-signature vault.

use clap::{Parser, Subcommand};
use quorum_vault::api::{create_router, ApiState, WsBroadcaster};
use quorum_vault::cli::{self, AppState};
use quorum_vault::multisig::{LoggingSink, MultisigWallet, RetryPolicy, WalletConfig};
use quorum_vault::storage::{Storage, StorageConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "vault")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "An M-of-N multi-signature vault in Rust", long_about = None)]
struct Cli {
    /// Data directory for vault storage
    #[arg(short, long, default_value = ".vault_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new vault
    Init {
        /// Owners (comma-separated)
        #[arg(short, long, required_unless_present = "config")]
        owners: Option<String>,

        /// Confirmations required to execute
        #[arg(short, long, required_unless_present = "config")]
        quorum: Option<usize>,

        /// Optional label for the vault
        #[arg(short, long)]
        label: Option<String>,

        /// Read owners and quorum from a JSON file instead
        #[arg(short, long, conflicts_with_all = ["owners", "quorum"])]
        config: Option<PathBuf>,

        /// Replace an existing vault
        #[arg(long)]
        force: bool,
    },

    /// Add value to the holding pool
    Deposit {
        /// Sender (any principal)
        #[arg(short, long)]
        from: String,

        /// Amount to deposit
        #[arg(short, long)]
        amount: u128,
    },

    /// Propose a transaction
    Submit {
        /// Submitting owner
        #[arg(short, long)]
        owner: String,

        /// Destination
        #[arg(short, long)]
        to: String,

        /// Value to send
        #[arg(short, long, default_value = "0")]
        value: u128,

        /// Hex payload (0x-prefixed)
        #[arg(long)]
        data: Option<String>,
    },

    /// Confirm a transaction
    Confirm {
        #[arg(short, long)]
        owner: String,

        #[arg(short, long)]
        index: usize,
    },

    /// Revoke a confirmation
    Revoke {
        #[arg(short, long)]
        owner: String,

        #[arg(short, long)]
        index: usize,
    },

    /// Execute a transaction that reached quorum
    Execute {
        #[arg(short, long)]
        owner: String,

        #[arg(short, long)]
        index: usize,

        /// Attempts allowed when the sink is unavailable
        #[arg(long, default_value = "1")]
        retries: u32,
    },

    /// Show a transaction
    Show {
        #[arg(short, long)]
        index: usize,
    },

    /// List transactions
    List,

    /// Show owners and vault summary
    Owners,

    /// Saved backups of the vault file
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },

    /// Export the vault to a file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the vault with one read from a file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Attempts allowed when the sink is unavailable
        #[arg(long, default_value = "1")]
        retries: u32,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List backups, newest first
    List,

    /// Replace the vault with a backup
    Restore {
        /// Backup number (0 is the newest)
        #[arg(short, long)]
        index: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            owners,
            quorum,
            label,
            config,
            force,
        } => {
            let config = match config {
                Some(path) => {
                    let mut config = WalletConfig::from_file(path)?;
                    if label.is_some() {
                        config.label = label;
                    }
                    config
                }
                None => {
                    let owners = owners
                        .unwrap_or_default()
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .collect();
                    WalletConfig::new(owners, quorum.unwrap_or_default(), label)
                }
            };
            cli::cmd_init(&cli.data_dir, config, force)?;
        }

        Commands::Serve { port, retries } => {
            run_server(&cli.data_dir, port, retries)?;
        }

        Commands::Deposit { from, amount } => {
            let mut state = AppState::new(cli.data_dir)?;
            cli::cmd_deposit(&mut state, &from, amount)?;
        }

        Commands::Submit {
            owner,
            to,
            value,
            data,
        } => {
            let mut state = AppState::new(cli.data_dir)?;
            cli::cmd_submit(&mut state, &owner, &to, value, data.as_deref())?;
        }

        Commands::Confirm { owner, index } => {
            let mut state = AppState::new(cli.data_dir)?;
            cli::cmd_confirm(&mut state, &owner, index)?;
        }

        Commands::Revoke { owner, index } => {
            let mut state = AppState::new(cli.data_dir)?;
            cli::cmd_revoke(&mut state, &owner, index)?;
        }

        Commands::Execute {
            owner,
            index,
            retries,
        } => {
            let mut state = AppState::new(cli.data_dir)?.with_retry_policy(retry_policy(retries));
            cli::cmd_execute(&mut state, &owner, index)?;
        }

        Commands::Show { index } => {
            cli::cmd_show(&AppState::new(cli.data_dir)?, index)?;
        }

        Commands::List => {
            cli::cmd_list(&AppState::new(cli.data_dir)?)?;
        }

        Commands::Owners => {
            cli::cmd_owners(&AppState::new(cli.data_dir)?)?;
        }

        Commands::Backup { action } => match action {
            BackupCommands::List => {
                cli::cmd_backup_list(&cli.data_dir)?;
            }
            BackupCommands::Restore { index } => {
                cli::cmd_backup_restore(&cli.data_dir, index)?;
            }
        },

        Commands::Export { output } => {
            cli::cmd_export(&AppState::new(cli.data_dir)?, &output)?;
        }

        Commands::Import { input } => {
            cli::cmd_import(&cli.data_dir, &input)?;
        }
    }

    Ok(())
}

fn retry_policy(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::from_millis(200))
}

fn run_server(data_dir: &Path, port: u16, retries: u32) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize storage
    let storage_config = StorageConfig {
        data_dir: data_dir.to_path_buf(),
        ..Default::default()
    };
    let storage = Arc::new(Storage::new(storage_config)?);

    if !storage.exists() {
        return Err(format!(
            "No vault found at {:?}. Create one with: vault init",
            data_dir
        )
        .into());
    }

    println!("📂 Loading vault...");
    let snapshot = storage.load()?;

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        // Create WebSocket broadcaster; it doubles as the wallet's event sink
        let ws_broadcaster = Arc::new(WsBroadcaster::new());

        let wallet = MultisigWallet::restore(snapshot, Arc::new(LoggingSink))?
            .with_event_sink(ws_broadcaster.clone())
            .with_retry_policy(retry_policy(retries));
        let wallet = Arc::new(wallet);

        // Create API state
        let state = ApiState {
            wallet: wallet.clone(),
            storage: storage.clone(),
            ws_broadcaster,
        };

        // Create router
        let app = create_router(state);

        // Start server
        let addr = format!("0.0.0.0:{}", port);
        println!("🚀 REST API server starting on http://localhost:{}", port);
        println!("   🔐 Vault {} ({})", wallet.address(), wallet.description());

        println!();
        println!("📖 Available endpoints:");
        println!("   GET  /health                                   - Health check");
        println!("   GET  /ws                                       - WebSocket updates");
        println!("   GET  /api/wallet                               - Vault info");
        println!("   GET  /api/wallet/owners                        - Owners");
        println!("   POST /api/wallet/deposit                       - Deposit");
        println!("   GET  /api/transactions                         - List transactions");
        println!("   POST /api/transactions                         - Submit transaction");
        println!("   GET  /api/transactions/{{index}}                 - Get transaction");
        println!("   POST /api/transactions/{{index}}/confirm         - Confirm");
        println!("   POST /api/transactions/{{index}}/revoke          - Revoke");
        println!("   POST /api/transactions/{{index}}/execute         - Execute");
        println!("   GET  /api/transactions/{{index}}/confirmations/{{owner}} - Confirmed?");
        println!();

        // Handle Ctrl+C with graceful shutdown
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            println!("\n📴 Shutting down API server...");

            println!("💾 Saving data...");
            match storage.save(&wallet.snapshot()) {
                Ok(_) => println!("✅ Data saved successfully!"),
                Err(e) => log::error!("Failed to save vault: {}", e),
            }
            std::process::exit(0);
        });

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
