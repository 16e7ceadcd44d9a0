use std::fs;
use std::sync::Arc;

use clap::Parser;
use ed25519_dalek::SigningKey;

use cycler_keeper::{Keeper, KeeperConfig, KeeperError, KeeperResult, JsonRpcLedger};

#[derive(Parser, Debug)]
#[command(name = "cycler-keeper")]
#[command(about = "Autonomous position cycling service for concentrated liquidity pools")]
struct Args {
    /// Path to keeper configuration file
    #[arg(short, long, default_value = "keeper.toml")]
    config: String,

    /// Operator signing key file path (overrides config)
    #[arg(short, long)]
    keypair: Option<String>,

    /// Ledger JSON-RPC URL (overrides config)
    #[arg(short, long)]
    rpc_url: Option<String>,

    /// Poll interval in seconds (overrides config)
    #[arg(short, long)]
    interval: Option<u64>,

    /// Dry run mode - decide and compose but don't submit
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Operator key: 32 hex-encoded bytes, optionally 0x-prefixed
fn load_signing_key(path: &str) -> KeeperResult<SigningKey> {
    let content = fs::read_to_string(path)
        .map_err(|e| KeeperError::Config(format!("failed to read key file {path}: {e}")))?;
    let stripped = content.trim().trim_start_matches("0x");
    let raw = hex::decode(stripped)
        .map_err(|_| KeeperError::Config(format!("key file {path} is not valid hex")))?;
    let bytes: [u8; 32] = raw
        .try_into()
        .map_err(|_| KeeperError::Config(format!("key file {path} must hold exactly 32 bytes")))?;
    Ok(SigningKey::from_bytes(&bytes))
}

#[tokio::main]
async fn main() -> KeeperResult<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .init();

    log::info!("Starting position cycler keeper");

    let mut config = KeeperConfig::load(&args.config)?;
    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = rpc_url;
    }
    if let Some(interval) = args.interval {
        config.poll_interval_secs = interval;
    }
    config.validate()?;

    // The CLI flag can force a dry run but never un-dry a configured one
    let dry_run = args.dry_run || config.dry_run;
    if dry_run {
        log::warn!("Running in DRY RUN mode - no blocks will be submitted");
    }

    let keypair_path = args.keypair.or_else(|| config.keypair_path.clone());
    let signer = match keypair_path {
        Some(path) => load_signing_key(&path)?,
        None if dry_run => {
            log::warn!("No keypair provided, using a random key (dry run only)");
            SigningKey::generate(&mut rand::rngs::OsRng)
        }
        None => {
            return Err(KeeperError::Config(
                "an operator keypair is required outside dry-run mode".to_string(),
            ));
        }
    };

    let ledger = Arc::new(JsonRpcLedger::new(config.rpc_url.clone(), signer));
    let operator = ledger.operator();
    log::info!("Operator account: {operator}");
    log::info!("RPC URL: {}", config.rpc_url);
    log::info!("Poll interval: {}s", config.poll_interval_secs);

    let mut keeper = Keeper::new(ledger, &config, operator, dry_run);
    log::info!("Keeper initialized in {} mode", keeper.flavor_name());

    // Registered once for the whole process; a signal that lands mid-sweep
    // still stops the loop at the next sweep boundary
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested, stopping between sweeps");
            let _ = stop_tx.send(true);
        }
    });

    keeper.run_loop(config.poll_interval_secs, stop_rx).await
}
