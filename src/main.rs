use anyhow::Result;
use aurena_monitor::api_client::PROBE_LIMITS;
use aurena_monitor::logger::init_tracing;
use aurena_monitor::{AuctionApiClient, AuctionMonitor, Config, Logger};
use clap::Parser;
use dotenvy::dotenv;

#[derive(Parser)]
#[command(name = "aurena-monitor")]
#[command(about = "Fetch the Aurena catalog and list auctions matching bid and closing-time filters")]
struct Args {
    /// Only check how many items the API returns for several page sizes
    #[arg(long)]
    probe: bool,

    /// Page sizes to try with --probe (comma-separated)
    #[arg(long, value_delimiter = ',')]
    limits: Vec<usize>,

    /// Do not write result files, regardless of SAVE_RESULTS
    #[arg(long)]
    no_save: bool,
}

async fn run(args: Args) -> Result<()> {
    let config = Config::from_env()?;
    let logger = Logger::new();
    let client = AuctionApiClient::new(logger.clone(), config.api_url.as_str());
    let monitor = AuctionMonitor::new(&config, client, logger);

    if args.probe {
        let limits = if args.limits.is_empty() {
            PROBE_LIMITS.to_vec()
        } else {
            args.limits
        };
        monitor.probe(&limits).await;
        return Ok(());
    }

    monitor.run(config.save_results && !args.no_save).await?;
    Ok(())
}

// ==================== ENTRY POINT ====================
#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("\nFatal error: {}", e);
        std::process::exit(1);
    }
}
