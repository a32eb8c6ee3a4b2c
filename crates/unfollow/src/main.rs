mod cli;

use std::io;

use clap::Parser;
use snafu::{ResultExt as _, Snafu};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use unfollow::{RunError, Tracker};
use unfollow_client::{ApiError, AttributeResolver, ClientConfig, ConfigError, TwitterClient};
use unfollow_core::Timestamp;
use unfollow_db::{Database, DbError};

use crate::cli::{Mode, Opts};

const LOG_TARGET: &str = "unfollow::cli";

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },
    #[snafu(display("Client initialization error: {source}"))]
    Client { source: ApiError },
    #[snafu(display("Could not create database directory: {source}"))]
    DataDir { source: io::Error },
    #[snafu(display("Database error: {source}"))]
    Database { source: DbError },
    #[snafu(display("Run failed: {source}"))]
    Run { source: RunError },
    #[snafu(display("Could not render output: {source}"))]
    Output { source: serde_json::Error },
    #[snafu(display("Logging initialization failed"))]
    Logging,
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging()?;

    let opts = Opts::parse();

    let value = handle_cmd(opts).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context(OutputSnafu)?
    );

    Ok(())
}

async fn handle_cmd(opts: Opts) -> CliResult<serde_json::Value> {
    match opts.mode() {
        Mode::Dump(bucket) => {
            let db = open_db(&opts).await?;
            let records = db.read_bucket(bucket).await.context(DatabaseSnafu)?;
            info!(target: LOG_TARGET, %bucket, count = records.len(), "Read bucket");
            serde_json::to_value(records).context(OutputSnafu)
        }
        Mode::Reconcile => {
            let config = ClientConfig::load(&opts.conf).await.context(ConfigSnafu)?;
            info!(target: LOG_TARGET, ?config, "Loaded config");

            let db = open_db(&opts).await?;
            let batch_size = config.batch_size;
            let client = TwitterClient::builder(config)
                .maybe_audit_dir(opts.dump_dir.clone())
                .build()
                .context(ClientSnafu)?;

            let resolver = AttributeResolver::new(&client, batch_size);
            let report = Tracker::new(&db, &client, resolver)
                .run(Timestamp::now())
                .await
                .context(RunSnafu)?;

            info!(
                target: LOG_TARGET,
                newcomers = report.newcomers.len(),
                departed = report.departed.len(),
                delta = report.delta,
                "Run complete"
            );
            serde_json::to_value(report).context(OutputSnafu)
        }
    }
}

async fn open_db(opts: &Opts) -> CliResult<Database> {
    let path = opts.db_path();
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.context(DataDirSnafu)?;
    }
    Database::open(path).await.context(DatabaseSnafu)
}

pub fn init_logging() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| CliError::Logging)?;

    Ok(())
}
