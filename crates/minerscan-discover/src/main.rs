//! CLI entry point for the minerscan endpoint scanner.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use minerscan_core::Host;
use minerscan_store::{OutcomeStore, StoreConfig};

use minerscan_discover::config::ScanConfig;
use minerscan_discover::prober::HttpProber;
use minerscan_discover::scanner::{scan_single, Scanner};
use minerscan_discover::targets::TargetSource;

#[derive(Parser)]
#[command(name = "minerscan")]
#[command(about = "Discover miner management endpoints and record one outcome per host")]
struct Cli {
    /// Scan a single address and print its outcome before saving it.
    #[arg(long, conflicts_with_all = ["cidr", "hosts_file", "summary"])]
    ip: Option<String>,

    /// Scan every host address in a network instead of the workers table.
    #[arg(long, conflicts_with_all = ["hosts_file", "summary"])]
    cidr: Option<String>,

    /// Scan addresses listed in a file (one per line) instead of the workers table.
    #[arg(long, conflicts_with = "summary")]
    hosts_file: Option<PathBuf>,

    /// Print stored outcome counts and recent runs, then exit.
    #[arg(long)]
    summary: bool,

    /// Config file prefix (default: minerscan).
    #[arg(short, long, default_value = "minerscan")]
    config: String,

    /// Override the database path.
    #[arg(long)]
    db: Option<String>,

    /// Override the maximum number of probes in flight.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Override the per-request timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.json_logs {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    let scan_config = load_scan_config(&cli)?;
    scan_config.validate()?;

    let store = OutcomeStore::open(&StoreConfig::new(&scan_config.database_path))?;
    tracing::info!(path = %scan_config.database_path, "Outcome store ready");

    if cli.summary {
        return print_summary(&store);
    }

    let prober = HttpProber::new(&scan_config)?;

    if let Some(raw) = cli.ip.as_deref() {
        let host = Host::parse(raw).ok_or_else(|| anyhow::anyhow!("--ip must not be empty"))?;
        scan_single(&prober, &store, host, |outcome| {
            match serde_json::to_string_pretty(outcome) {
                Ok(json) => println!("{json}"),
                Err(e) => tracing::error!(error = %e, "Failed to render outcome"),
            }
        })
        .await?;
        return Ok(());
    }

    let source = if let Some(cidr) = cli.cidr.clone() {
        TargetSource::Cidr(cidr)
    } else if let Some(path) = cli.hosts_file.clone() {
        TargetSource::File(path)
    } else {
        TargetSource::Workers
    };

    let hosts = source.resolve(&store)?;
    tracing::info!(count = hosts.len(), source = ?source, "Hosts to scan");
    if hosts.is_empty() {
        tracing::warn!("No hosts to scan");
        return Ok(());
    }

    let scanner = Scanner::from_config(&scan_config);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let record = scanner.run(Arc::new(prober), &store, hosts, shutdown).await;
    if record.interrupted {
        anyhow::bail!(
            "Scan interrupted after {} of {} hosts",
            record.processed(),
            record.total
        );
    }

    tracing::info!("Scan completed");
    Ok(())
}

fn print_summary(store: &OutcomeStore) -> anyhow::Result<()> {
    let summary = store.status_summary()?;
    println!(
        "outcomes: {} total, {} success, {} failed",
        summary.total(),
        summary.success,
        summary.failed
    );

    for run in store.recent_runs(10)? {
        println!(
            "{}  {:<6}  {}  total={} success={} failed={} persist_failures={}{}",
            run.run_id,
            run.mode.as_str(),
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.total,
            run.succeeded,
            run.failed,
            run.persist_failures,
            if run.interrupted { " (interrupted)" } else { "" }
        );
    }
    Ok(())
}

fn load_scan_config(cli: &Cli) -> anyhow::Result<ScanConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(&cli.config).required(false))
        .add_source(
            config::Environment::with_prefix("MINERSCAN")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut scan_config = match cfg.get::<ScanConfig>("scan") {
        Ok(c) => c,
        Err(config::ConfigError::NotFound(_)) => ScanConfig::default(),
        Err(e) => return Err(e.into()),
    };

    if let Some(db) = &cli.db {
        scan_config.database_path = db.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        scan_config.concurrency = concurrency;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        scan_config.timeout_ms = timeout_ms;
    }

    Ok(scan_config)
}
