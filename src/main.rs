use clap::{Parser, Subcommand};
use std::path::PathBuf;

use glbackup::config::{Config, SinkKind};
use glbackup::db;
use glbackup::error::BackupError;
use glbackup::services::gitlab_client::GitLabClient;
use glbackup::services::snapshot::{CompositeSink, DatabaseSink, FileSink, SnapshotSink};
use glbackup::services::sync_engine::{SyncEngine, SyncSummary};

#[derive(Parser)]
#[command(name = "glbackup")]
#[command(about = "Mirror a self-hosted GitLab instance to local storage")]
#[command(version)]
struct Cli {
    /// Config file path (default: ~/.config/glbackup/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full backup: users, projects, repository mirrors, pipelines
    Sync {
        /// Override the configured snapshot sink
        #[arg(long, value_enum)]
        sink: Option<SinkKind>,

        /// Override the configured number of concurrent project workers
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Validate the configured token and print the authenticated account
    Check,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BackupError> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync { sink, concurrency } => {
            if let Some(sink) = sink {
                config.backup.sink = sink;
            }
            if let Some(concurrency) = concurrency {
                if concurrency == 0 {
                    return Err(BackupError::config("--concurrency must be at least 1"));
                }
                config.backup.concurrency = concurrency;
            }
            run_sync(&config).await
        }
        Commands::Check => run_check(&config).await,
    }
}

async fn run_sync(config: &Config) -> Result<(), BackupError> {
    let client = GitLabClient::new(&config.gitlab)?;
    let sink = build_sink(config).await?;
    let engine = SyncEngine::new(client, sink, config);

    let summary = engine.run().await?;
    print_summary(&summary);

    // Per-project failures are enumerated above but do not fail the
    // process; only catalog-level errors do.
    Ok(())
}

async fn run_check(config: &Config) -> Result<(), BackupError> {
    let client = GitLabClient::new(&config.gitlab)?;
    let user = client.validate_token().await?;
    println!(
        "Authenticated against {} as {} ({})",
        config.gitlab.base_url, user.username, user.name
    );
    Ok(())
}

async fn build_sink(config: &Config) -> Result<Box<dyn SnapshotSink>, BackupError> {
    match config.backup.sink {
        SinkKind::File => Ok(Box::new(FileSink::new(config.backup_dir()))),
        SinkKind::Database => {
            let pool = db::initialize(&config.db_path()).await?;
            Ok(Box::new(DatabaseSink::new(pool)))
        }
        SinkKind::Both => {
            let pool = db::initialize(&config.db_path()).await?;
            Ok(Box::new(CompositeSink::new(vec![
                Box::new(FileSink::new(config.backup_dir())),
                Box::new(DatabaseSink::new(pool)),
            ])))
        }
    }
}

fn print_summary(summary: &SyncSummary) {
    eprintln!(
        "[sync] Completed at {} in {}ms: {} users, {} projects, {} mirrored, {} pipeline records",
        summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.duration_ms,
        summary.users,
        summary.projects,
        summary.mirrored,
        summary.pipelines,
    );

    if summary.is_clean() {
        eprintln!("[sync] All projects mirrored and synced");
    } else {
        eprintln!("[sync] {} step(s) failed:", summary.failures.len());
        for failure in &summary.failures {
            eprintln!(
                "[sync]   {} ({}): {}",
                failure.project, failure.stage, failure.message
            );
        }
    }
}
