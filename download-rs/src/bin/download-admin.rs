//! CLI tool for inspecting download quotas and secrets
//!
//! Operates directly on the SQLite key-value store.
//!
//! # Usage
//!
//! ```bash
//! # Show monthly usage for an identity
//! download-admin usage 42 --db sqlite://download.db
//!
//! # Record a download
//! download-admin record 42 book42 --token session-token
//!
//! # Issue a download secret for chapters 1, 2 and 3
//! download-admin issue 42 session-token book42 1 2 3
//!
//! # Check a download secret
//! download-admin verify 42 session-token 5f0c...
//!
//! # Remove expired secrets
//! download-admin purge
//! ```

use clap::{Parser, Subcommand};
use download_rs::audit::SqliteAuditLog;
use download_rs::kv::{KvStore, SqliteKv};
use download_rs::{Credential, DownloadConfig, DownloadQuota, DownloadSecrets};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "download-admin")]
#[command(about = "Inspect download quotas and secrets", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL, overrides the configuration (e.g., sqlite://download.db)
    #[arg(short, long)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show monthly usage for an identity
    Usage {
        /// Identity
        vid: i64,
    },
    /// Record one download
    Record {
        /// Identity
        vid: i64,
        /// Downloaded book
        book_id: String,
        /// Session token
        #[arg(long, default_value = "")]
        token: String,
    },
    /// Issue a download secret
    Issue {
        /// Identity
        vid: i64,
        /// Session token the secret is bound to
        token: String,
        /// Book to authorize
        book_id: String,
        /// Chapters to authorize
        chapter_uids: Vec<i64>,
    },
    /// Check a download secret
    Verify {
        /// Identity
        vid: i64,
        /// Session token the secret was issued to
        token: String,
        /// The secret
        secret: String,
    },
    /// Remove expired entries
    Purge,
}

fn init_logging(config: &DownloadConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("download_rs={}", config.logging.level).into());

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DownloadConfig::from_file(path)?,
        None => DownloadConfig::default(),
    };
    if let Some(db) = cli.db {
        config.storage.database_url = db;
    }

    init_logging(&config);

    let store = Arc::new(SqliteKv::connect(&config.storage.database_url).await?);
    info!(
        "Using {} store at {}",
        store.backend_name(),
        config.storage.database_url
    );

    match cli.command {
        Commands::Usage { vid } => {
            let quota = DownloadQuota::new(store.clone(), &config);
            let usage = quota.usage(&Credential::new(vid, "")).await?;

            println!("{:<12} {:<10} {:<10} {:<10}", "VID", "Used", "Limit", "Remaining");
            println!("{:-<45}", "");
            println!(
                "{:<12} {:<10} {:<10} {:<10}",
                usage.vid,
                usage.count,
                usage.limit,
                usage.remaining()
            );
        }
        Commands::Record {
            vid,
            book_id,
            token,
        } => {
            let audit_log = SqliteAuditLog::new(store.pool().clone());
            audit_log.init_db().await?;

            let quota =
                DownloadQuota::new(store.clone(), &config).with_audit_sink(Arc::new(audit_log));
            let credential = Credential::new(vid, token);

            if !quota.check_allowance(&credential).await? {
                eprintln!(
                    "Warning: vid {} is already at its monthly limit of {}",
                    vid,
                    quota.max_downloads()
                );
            }

            // The audit write must land before the runtime shuts down
            if let Some(audit) = quota.record_consumption_tracked(&credential, &book_id).await? {
                audit.await?;
            }

            let usage = quota.usage(&credential).await?;
            println!("✓ Recorded {} for vid {} ({}/{})", book_id, vid, usage.count, usage.limit);
        }
        Commands::Issue {
            vid,
            token,
            book_id,
            chapter_uids,
        } => {
            let secrets = DownloadSecrets::new(store.clone(), &config);
            let secret = secrets
                .issue(&Credential::new(vid, token), &book_id, &chapter_uids)
                .await?;

            println!("{}", secret);
            eprintln!("Valid for {}s", secrets.ttl().as_secs());
        }
        Commands::Verify { vid, token, secret } => {
            let secrets = DownloadSecrets::new(store.clone(), &config);

            match secrets.lookup(&Credential::new(vid, token), &secret).await? {
                Some(payload) => {
                    println!("✓ Valid secret");
                    println!("  Book:     {}", payload.book_id);
                    println!("  Chapters: {:?}", payload.chapter_uids);
                }
                None => {
                    println!("✗ Unknown or expired secret");
                    std::process::exit(1);
                }
            }
        }
        Commands::Purge => {
            let removed = store.purge_expired().await?;
            println!("✓ Removed {} expired entries", removed);
        }
    }

    Ok(())
}
