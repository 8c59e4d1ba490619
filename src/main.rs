use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wallet_ledger::application::engine::LedgerEngine;
use wallet_ledger::config::LedgerConfig;
use wallet_ledger::domain::ports::WalletStoreRef;
use wallet_ledger::domain::wallet::WalletId;
use wallet_ledger::error::LedgerError;
use wallet_ledger::infrastructure::in_memory::InMemoryWalletStore;
use wallet_ledger::interfaces::csv::balance_writer::BalanceWriter;
use wallet_ledger::interfaces::csv::operation_reader::OperationReader;
use wallet_ledger::interfaces::http;
use wallet_ledger::interfaces::replay::replay;
use wallet_ledger::interfaces::response::{Response, exit_code};
use wallet_ledger::telemetry;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "WALLET_DB_PATH", global = true, conflicts_with = "database_url")]
    db_path: Option<PathBuf>,

    /// PostgreSQL connection URL (optional). If provided, uses PostgreSQL.
    #[arg(long, env = "WALLET_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Upper bound for a create/apply transaction, lock wait included.
    #[arg(long, env = "WALLET_TX_TIMEOUT_MS", default_value_t = 5000, global = true)]
    tx_timeout_ms: u64,

    /// Upper bound for a balance read.
    #[arg(long, env = "WALLET_READ_TIMEOUT_MS", default_value_t = 3000, global = true)]
    read_timeout_ms: u64,

    /// Fresh ids tried when a new wallet id collides with an existing one.
    #[arg(long, default_value_t = 3, global = true)]
    create_attempts: u32,

    /// PostgreSQL pool size.
    #[arg(long, default_value_t = 32, global = true)]
    max_connections: u32,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a wallet with a zero balance
    Create,
    /// Apply a DEPOSIT or WITHDRAW to a wallet
    Apply {
        wallet_id: String,
        kind: String,
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Print the balance of a wallet
    Balance { wallet_id: String },
    /// Apply every `wallet, kind, amount` row of a CSV file concurrently
    Replay {
        /// Input operations CSV file
        input: PathBuf,
    },
    /// Serve the HTTP API over one long-lived engine
    Serve {
        /// Address to listen on
        #[arg(long, env = "WALLET_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        addr: SocketAddr,
    },
}

impl Command {
    /// One-shot commands whose wallets only matter if the store outlives the process.
    fn is_one_shot(&self) -> bool {
        matches!(
            self,
            Command::Create | Command::Apply { .. } | Command::Balance { .. }
        )
    }
}

impl Cli {
    fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig::default()
            .with_transaction_timeout(Duration::from_millis(self.tx_timeout_ms))
            .with_read_timeout(Duration::from_millis(self.read_timeout_ms))
            .with_create_attempts(self.create_attempts)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let config = cli.ledger_config();
    config.validate()?;

    let store = match open_store(&cli, &config).await {
        Ok(store) => store,
        Err(err) => return Ok(respond(Err(err))),
    };
    let engine = LedgerEngine::new(store, config);

    let outcome = match cli.command {
        Command::Create => engine.create().await.map(Response::created),
        Command::Apply {
            wallet_id,
            kind,
            amount,
        } => engine
            .apply_request(&wallet_id, &kind, amount)
            .await
            .map(Response::balance),
        Command::Balance { wallet_id } => match wallet_id.parse::<WalletId>() {
            Ok(id) => engine.balance(&id).await.map(Response::balance),
            Err(err) => Err(err),
        },
        Command::Replay { input } => return run_replay(&engine, input).await,
        Command::Serve { addr } => {
            return Ok(match http::serve(engine, addr).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => respond(Err(err)),
            });
        }
    };

    Ok(respond(outcome))
}

fn respond(outcome: std::result::Result<Response, LedgerError>) -> ExitCode {
    match outcome {
        Ok(response) => {
            println!("{}", response.to_json());
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", Response::failure(&err).to_json());
            ExitCode::from(exit_code(err.kind()))
        }
    }
}

async fn run_replay(engine: &LedgerEngine, input: PathBuf) -> Result<ExitCode> {
    let file = File::open(input).into_diagnostic()?;
    let reader = OperationReader::new(file);

    let mut records = Vec::new();
    for record in reader.operations() {
        match record {
            Ok(record) => records.push(record),
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    let summary = replay(engine, records).await?;

    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_balances(summary.wallets)?;

    eprintln!(
        "applied={} rejected={} failed={}",
        summary.applied, summary.rejected, summary.failed
    );
    Ok(ExitCode::SUCCESS)
}

async fn open_store(
    cli: &Cli,
    config: &LedgerConfig,
) -> std::result::Result<WalletStoreRef, LedgerError> {
    if let Some(url) = &cli.database_url {
        return open_postgres(url, cli.max_connections, config).await;
    }
    if let Some(path) = &cli.db_path {
        return open_rocksdb(path);
    }
    if cli.command.is_one_shot() {
        warn!("using in-memory wallet store; wallets are discarded when this command exits");
    } else {
        info!("using in-memory wallet store");
    }
    Ok(Arc::new(InMemoryWalletStore::new()))
}

#[cfg(feature = "storage-rocksdb")]
fn open_rocksdb(path: &std::path::Path) -> std::result::Result<WalletStoreRef, LedgerError> {
    use wallet_ledger::infrastructure::rocksdb::RocksDbWalletStore;
    Ok(Arc::new(RocksDbWalletStore::open(path)?))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_rocksdb(_path: &std::path::Path) -> std::result::Result<WalletStoreRef, LedgerError> {
    Err(LedgerError::store(
        "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled",
    ))
}

#[cfg(feature = "storage-postgres")]
async fn open_postgres(
    url: &str,
    max_connections: u32,
    config: &LedgerConfig,
) -> std::result::Result<WalletStoreRef, LedgerError> {
    use wallet_ledger::infrastructure::postgres::PostgresWalletStore;
    let store =
        PostgresWalletStore::connect(url, max_connections, config.transaction_timeout).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "storage-postgres"))]
async fn open_postgres(
    _url: &str,
    _max_connections: u32,
    _config: &LedgerConfig,
) -> std::result::Result<WalletStoreRef, LedgerError> {
    Err(LedgerError::store(
        "PostgreSQL requested via --database-url, but the 'storage-postgres' feature is not enabled",
    ))
}
