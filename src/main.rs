use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::watch;

use feedcrawler::config::Config;
use feedcrawler::feed::{self, FeedFetcher};
use feedcrawler::poller::Poller;
use feedcrawler::storage::{DatabaseError, StoreGateway};

#[derive(Parser, Debug)]
#[command(
    name = "feedcrawler",
    version,
    about = "Polls RSS/Atom feeds and stores sanitized entries in SQLite"
)]
struct Args {
    /// OPML file to import. Imports its subscriptions and exits.
    #[arg(value_name = "OPML", conflicts_with_all = ["recent", "show"])]
    opml: Option<PathBuf>,

    /// Config file (default: ~/.config/feedcrawler/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file, overriding `database_path` from the config
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// Print the N most recent entries and exit
    #[arg(long, value_name = "N", conflicts_with = "show")]
    recent: Option<u32>,

    /// Print one entry, content included, and exit
    #[arg(long, value_name = "ID")]
    show: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => Config::default(),
    };

    let db_path = args.db.clone().unwrap_or_else(|| config.database_path.clone());
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let gateway = match StoreGateway::open(db_path_str).await {
        Ok(gateway) => gateway,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    if let Some(opml) = &args.opml {
        let opml_str = opml
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in OPML path"))?;
        let report = feed::import_file(&gateway, opml_str)
            .await
            .context("Failed to import OPML file")?;
        println!(
            "Imported {} subscriptions ({} skipped)",
            report.inserted, report.skipped
        );
        return Ok(());
    }

    if let Some(limit) = args.recent {
        let entries = gateway
            .recent_entries(limit)
            .await
            .context("Failed to load entries")?;
        for entry in entries {
            println!(
                "{}  {}  {}  {}\n    {}",
                entry.created, entry.id, entry.site, entry.title, entry.url
            );
        }
        return Ok(());
    }

    if let Some(id) = &args.show {
        match gateway.entry_by_id(id).await.context("Failed to load entry")? {
            Some(entry) => {
                println!(
                    "{}\n{}\n{} | {}\n",
                    entry.title, entry.url, entry.site, entry.created
                );
                println!("{}", entry.content);
            }
            None => {
                eprintln!("Error: No entry with id {}", id);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")?;
    let fetcher = FeedFetcher::new(client)
        .with_timeout(config.request_timeout())
        .with_max_feed_bytes(config.max_feed_bytes);
    let poller = Poller::new(gateway, fetcher, config.poll_settings());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for shutdown signals"),
        }
        // A dropped sender also stops the poller, so keep it alive
        std::future::pending::<()>().await;
    });

    poller.run(shutdown_rx).await;
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down gracefully"),
        _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down gracefully"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C, shutting down gracefully");
    Ok(())
}
