use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser};
use proxyra::{
    input,
    proxy::{EngineConfig, ValidationEngine, ValidationTarget},
    EngineError,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Validate proxies by fetching a URL through each one
///
/// Proxies are read one per line from stdin, or from --list when nothing is
/// piped. Addresses without a scheme are treated as socks5. Every proxy whose
/// response matches --regex is printed to stdout as soon as it passes.
#[derive(Parser)]
#[command(name = "proxyra", version)]
struct Cli {
    /// Target URL (required)
    #[arg(short, long)]
    url: String,

    /// Timeout in seconds for each proxy (fractions allowed)
    #[arg(short, long, default_value_t = 5.0)]
    timeout: f64,

    /// Number of concurrent threads
    #[arg(short = 'n', long, default_value_t = 10)]
    threads: usize,

    /// File with list of proxies
    #[arg(short, long)]
    list: Option<PathBuf>,

    /// Regex to match response
    #[arg(short, long, default_value = ".*")]
    regex: String,

    /// Verify the target's TLS certificate instead of accepting any
    #[arg(long)]
    verify_tls: bool,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timeout = parse_timeout(cli.timeout)?;
    let target = ValidationTarget::builder(cli.url)
        .pattern(cli.regex)
        .timeout(timeout)
        .accept_invalid_certs(!cli.verify_tls)
        .build()?;
    let engine =
        ValidationEngine::with_config(target, EngineConfig::new().with_concurrency(cli.threads))?;

    let mut proxies = input::read_stdin()?;
    if proxies.is_empty() {
        if let Some(list) = &cli.list {
            proxies = input::read_file(list)?;
        }
    }
    let proxies = input::unique(proxies);

    let mut validation = engine.spawn(proxies)?;
    info!(
        "Checking {} proxies with {} threads, timeout: {:?}",
        validation.total(),
        validation.workers(),
        timeout
    );

    while let Some(proxy) = validation.next_passed().await {
        writeln!(std::io::stdout(), "{}", proxy)?;
    }

    let summary = validation.finish().await;
    info!(
        "Results: {} good, {} bad out of {}",
        summary.passed, summary.failed, summary.total
    );

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("proxyra={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_timeout(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(EngineError::InvalidTimeout.into());
    }
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow!("invalid timeout {}: {}", secs, e))
}
