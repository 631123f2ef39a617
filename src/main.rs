//! FLASHVOL: flash-swap volume agent for fixed-curve Sui pools
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the accounts and runs the requested subcommand: a trading batch
//! (default), the account summary, or a yield claim.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use flashvol::account::ranking::{HttpVolumeRanking, NoRanking, VolumeRanking};
use flashvol::account::summary::{render_table, summarize};
use flashvol::account::{select_accounts, Account, AccountSelection, TokenPairJob};
use flashvol::config::AppConfig;
use flashvol::engine::batch::{BatchOptions, BatchOrchestrator};
use flashvol::engine::cycle::TradeCycleEngine;
use flashvol::engine::events::TracingSink;
use flashvol::engine::pacing::RandomPacer;
use flashvol::engine::yield_claim::claim_pending_yield;
use flashvol::ledger::rpc::SuiRpcClient;
use flashvol::ledger::Ledger;

const BANNER: &str = r#"
  FLASHVOL
  flash-swap volume agent for fixed-curve Sui pools
  v0.1.0
"#;

#[derive(Debug, Parser)]
#[command(name = "flashvol", version, about = "Flash-swap volume agent for Sui pools")]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run round trips for the configured accounts (default).
    Run(RunArgs),
    /// Print balances, volume ranking and last swap per account.
    Summary,
    /// Collect pending pool rewards and fees.
    Claim {
        /// 1-based account index; all accounts when omitted.
        #[arg(long)]
        account: Option<usize>,
    },
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Only trade this account (1-based, as listed by `summary`).
    #[arg(long)]
    account: Option<usize>,
    /// Replace the account's jobs with one job on this pool.
    #[arg(long, requires = "account")]
    pool: Option<String>,
    /// Per-swap amount for the override job; full balance when omitted.
    #[arg(long, requires = "pool")]
    amount: Option<Decimal>,
    /// Rounds for the override job (default 1).
    #[arg(long, requires = "pool")]
    rounds: Option<u32>,
}

impl RunArgs {
    fn selection(&self) -> Result<Option<AccountSelection>> {
        let Some(index) = self.account else {
            return Ok(None);
        };
        let job = match &self.pool {
            Some(pool) => Some(TokenPairJob::new(pool, self.amount, self.rounds.unwrap_or(1))?),
            None => None,
        };
        Ok(Some(AccountSelection { index, job }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    let cfg = AppConfig::load(&cli.config)?;

    println!("{BANNER}");
    info!(
        config = %cli.config,
        rpc = %cfg.rpc.url,
        accounts = cfg.accounts.len(),
        "FLASHVOL starting up"
    );

    let accounts = cfg
        .accounts
        .iter()
        .map(Account::from_config)
        .collect::<Result<Vec<_>>>()?;

    let ledger: Arc<dyn Ledger> = Arc::new(SuiRpcClient::new(
        &cfg.rpc.url,
        cfg.rpc.timeout(),
        cfg.rpc.max_retries,
    )?);

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run(&cfg, ledger, &accounts, &args).await,
        Command::Summary => summary(&cfg, ledger.as_ref(), &accounts).await,
        Command::Claim { account } => claim(ledger.as_ref(), &accounts, account).await,
    }
}

/// Run a batch until it finishes or Ctrl+C is pressed.
async fn run(cfg: &AppConfig, ledger: Arc<dyn Ledger>, accounts: &[Account], args: &RunArgs) -> Result<()> {
    let selected = select_accounts(accounts, args.selection()?.as_ref())?;
    if selected.is_empty() {
        warn!("No accounts configured, nothing to do");
        return Ok(());
    }

    let pacer = Arc::new(RandomPacer);
    let events = Arc::new(TracingSink);
    let engine = TradeCycleEngine::new(ledger, pacer.clone(), events.clone(), cfg.pacing.leg_window()?);
    let orchestrator = BatchOrchestrator::new(
        engine,
        pacer,
        events,
        BatchOptions {
            shuffle_accounts: cfg.shuffle_accounts,
            shuffle_token_pairs: cfg.shuffle_token_pairs,
            cycle_delay: cfg.pacing.cycle_window()?,
        },
    );

    info!(accounts = selected.len(), "Starting batch. Press Ctrl+C to stop.");

    tokio::select! {
        report = orchestrator.run_batch(&selected) => {
            info!(
                completed = report.cycles_completed,
                failed = report.cycles_failed,
                skipped = report.cycles_skipped,
                "FLASHVOL finished."
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}

async fn summary(cfg: &AppConfig, ledger: &dyn Ledger, accounts: &[Account]) -> Result<()> {
    let ranking: Box<dyn VolumeRanking> = match &cfg.ranking {
        Some(r) => Box::new(HttpVolumeRanking::new(&r.url, cfg.rpc.timeout())?),
        None => Box::new(NoRanking),
    };

    let rows = summarize(ledger, ranking.as_ref(), accounts)
        .await
        .context("Failed to build account summary")?;
    println!("{}", render_table(&rows));
    Ok(())
}

/// Claim for one account or all of them; one failure does not stop the rest.
async fn claim(ledger: &dyn Ledger, accounts: &[Account], index: Option<usize>) -> Result<()> {
    let selection = index.map(|index| AccountSelection { index, job: None });
    for account in select_accounts(accounts, selection.as_ref())? {
        match claim_pending_yield(ledger, account.signer.as_ref()).await {
            Ok(receipt) => info!(
                account = %account.label(),
                digest = %receipt.digest,
                "Claim submitted"
            ),
            Err(e) => error!(account = %account.label(), error = %e, "Claim failed"),
        }
    }
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("flashvol=info"));

    let json_logging = std::env::var("FLASHVOL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
