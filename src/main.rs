//! flanco-price-tracker entry point
//!
//! Waits for the browser hub, opens one session, runs the requested mode and
//! always closes the session before exiting.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use flanco_price_tracker::cli::Cli;
use flanco_price_tracker::crawling::{CrawlOrchestrator, CrawlSession, CrawlSettings};
use flanco_price_tracker::infrastructure::logging::{init_logging_with_config, level_for_verbosity};
use flanco_price_tracker::infrastructure::{
    AppConfig, CsvRecordSink, ReadinessProbe, WebDriverSession,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.logging.level = level_for_verbosity(cli.verbose, &config.logging.level);
    config.validate().context("Invalid configuration")?;

    init_logging_with_config(&config.logging)?;

    let mode = cli.run_mode();
    let settings = CrawlSettings::from_config(&config).context("Failed to set up crawl")?;
    info!("Run mode: {}, max entries: {:?}", mode, cli.max_entries);

    ReadinessProbe::new(&config.webdriver, &config.timing)?
        .wait()
        .await
        .context("Browser hub never became ready, aborting")?;

    let sink = CsvRecordSink::create(&config.output.csv_dir).context("Failed to prepare CSV output")?;
    let session = CrawlSession::new(
        sink.directory(),
        cli.max_entries,
        config.output.progress_log_interval,
    );

    info!("Getting browser session on {}", config.webdriver.host);
    let browser = WebDriverSession::connect(&config.webdriver)
        .await
        .context("Failed to create browser session")?;

    let mut orchestrator = CrawlOrchestrator::new(browser, sink, session, settings);

    let outcome = orchestrator.run(&mode).await;
    let (_sink, closed) = orchestrator.shutdown().await;
    if let Err(e) = closed {
        error!("Failed to close browser session: {}", e);
    }

    let summary = outcome.context("Crawl aborted")?;
    info!(
        run_id = %summary.run_id,
        "Run finished: {} categories, {} pages, {} records written, {} duplicates skipped, {} entries failed",
        summary.categories_visited,
        summary.pages_visited,
        summary.records_written,
        summary.duplicates_skipped,
        summary.entries_failed
    );
    if let Some(stop) = &summary.stopped {
        info!("Stopped early: {}", stop);
    }

    Ok(())
}
