//! scraperank entry point.
//!
//! Initializes logging, wires the transport, worker pool, consumer, and
//! heartbeat together, and runs until interrupted.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scraperank::config::Config;
use scraperank::consumer::Consumer;
use scraperank::heartbeat::Heartbeat;
use scraperank::publish::QueuePublisher;
use scraperank::queue::Transport;
use scraperank::scoring::{BackgroundCorpus, ScoringEngine};
use scraperank::scrape::HttpScraper;
use scraperank::worker::{WorkItem, WorkerPool};

#[derive(Parser, Debug)]
#[command(name = "scraperank", about = "Scrape-and-score enrichment worker")]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --log-level arg > default "info"
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone());

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)))
        .init();

    run().await
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    info!(
        scrape_queue = %config.scrape_queue,
        scraped_queue = %config.scraped_queue,
        num_workers = config.num_workers,
        "starting scraperank"
    );

    let transport = Transport::connect(
        &config.redis_url,
        &config.scrape_queue,
        &config.scraped_queue,
    )
    .await?;

    let engine = Arc::new(ScoringEngine::new(Arc::new(BackgroundCorpus::embedded()))?);
    let scraper = Arc::new(HttpScraper::new(config.scrape_timeout)?);
    let publisher = Arc::new(QueuePublisher::new(transport.clone()));

    // Signals the consumer and heartbeat; the pool carries its own channel.
    let (shutdown_tx, _) = broadcast::channel(1);

    let heartbeat = Heartbeat::new(
        transport.clone(),
        config.heartbeat_file.clone(),
        config.heartbeat_interval,
    );
    let heartbeat_handle = heartbeat.spawn(shutdown_tx.subscribe());

    // Channel sized to the pool: a full pool blocks the dispatch loop
    let (tx, rx) = mpsc::channel::<WorkItem>(config.num_workers);

    let mut pool = WorkerPool::new(
        config.num_workers,
        config.scrape_timeout,
        scraper,
        engine,
        publisher,
    );
    pool.start(rx);

    let consumer = Consumer::new(
        Arc::new(transport),
        config.poll_interval,
        tx,
        shutdown_tx.subscribe(),
    );
    let mut consumer_handle = tokio::spawn(consumer.run());

    let consumer_result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(());
            consumer_handle.await?
        }
        result = &mut consumer_handle => {
            let _ = shutdown_tx.send(());
            result?
        }
    };

    // Consumer is gone, its sender dropped: workers drain and exit.
    pool.shutdown().await;
    let _ = heartbeat_handle.await;

    consumer_result?;
    info!("scraperank stopped");
    Ok(())
}
