use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};

use polymarket_activity_tracker::api::{HttpFeedClient, PageOptions};
use polymarket_activity_tracker::config::{AppConfig, CONFIG_PATH};
use polymarket_activity_tracker::layout::render_heatmap;
use polymarket_activity_tracker::reporter::{self, AccountReport};
use polymarket_activity_tracker::state::TrackerSession;
use polymarket_activity_tracker::types::{ContainerSize, TimeRange};

#[derive(Parser)]
#[command(name = "activity-tracker", about = "Polymarket wallet activity heatmap")]
struct Args {
    /// Wallet (proxy) address to look up
    #[arg(long)]
    address: String,

    /// Heatmap range; defaults to the shortest range covering the account's history
    #[arg(long, value_enum)]
    range: Option<TimeRange>,

    /// Container width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Container height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Config file path
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let address = args.address.trim();
    if address.is_empty() {
        anyhow::bail!("--address must not be empty");
    }

    let config = AppConfig::load_or_default(&args.config)?;
    info!("Using config from {}", args.config.display());

    let client = HttpFeedClient::new(&config.api)?;
    let session = TrackerSession::new(client, PageOptions::from(&config.api));

    let profile = match session.client().fetch_profile(address).await {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!("Failed to fetch profile: {e}");
            None
        }
    };

    info!("Fetching activity for wallet {address}");
    let loaded = session.load(address).await?;

    let range = args.range.unwrap_or(loaded.default_range);
    let container = ContainerSize {
        width_px: args.width.unwrap_or(config.display.default_width_px),
        height_px: args.height.unwrap_or(config.display.default_height_px),
    };
    let heatmap = render_heatmap(
        &loaded.summary.stats.activity_by_date,
        range,
        container,
        Local::now().date_naive(),
    );
    info!(
        "Layout: {} columns x {} rows, {}px tiles",
        heatmap.layout.columns, heatmap.layout.rows, heatmap.layout.tile_size_px
    );

    let report = AccountReport::new(
        &loaded.address,
        profile.as_ref(),
        &loaded.summary.stats,
        loaded.summary.recent(config.display.history_limit),
        &heatmap,
    );
    if args.json {
        reporter::report_json(&report);
    } else {
        reporter::report_text(&report);
    }
    Ok(())
}
