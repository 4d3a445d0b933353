//! workitem-agent CLI: run the agent, or push workitems for it to drain.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use workitem_agent::agent::Agent;
use workitem_agent::client::QueueClient;
use workitem_agent::client::memory::MemoryQueueClient;
use workitem_agent::client::pgmq::{PgmqConfig, PgmqQueueClient};
use workitem_agent::config::Config;
use workitem_agent::db::Db;
use workitem_agent::model::Workitem;
use workitem_agent::processor::HelloProcessor;
use workitem_agent::telemetry::{TelemetryConfig, init_telemetry};

use secrecy::{ExposeSecret, SecretString};

#[derive(Parser)]
#[command(name = "workitem-agent", about = "Drain a work-item queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// In-process queues (set DUMMY_WORKITEM=1 to seed one item)
    Local,
    /// Postgres + pgmq (needs DATABASE_URL)
    Pgmq,
}

#[derive(Subcommand)]
enum Command {
    /// Connect and consume the configured queue
    Run {
        /// Queue backend
        #[arg(long, value_enum, default_value_t = Backend::Pgmq)]
        backend: Backend,
        /// Working directory (overrides WORK_DIR)
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
    /// Push a workitem onto a pgmq queue
    Push {
        /// Work-item queue (defaults to the configured wiq)
        #[arg(long)]
        wiq: Option<String>,
        /// Display name
        #[arg(long, default_value = "workitem")]
        name: String,
        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { backend, work_dir } => cmd_run(backend, work_dir).await,
        Command::Push { wiq, name, payload } => cmd_push(wiq, name, payload).await,
    }
}

/// Log a fatal startup error. The process still exits 0; the host restarts it.
fn startup_failed(e: impl std::fmt::Display) -> anyhow::Result<()> {
    error!("startup failed: {e}");
    Ok(())
}

async fn cmd_run(backend: Backend, work_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::from_env();
    let log_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    let endpoint = config.as_ref().ok().and_then(|c| c.otel_endpoint.clone());

    let _guard = match init_telemetry(TelemetryConfig {
        endpoint,
        service_name: "workitem-agent".to_string(),
        default_filter: log_level,
    }) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("startup failed: {e}");
            return Ok(());
        }
    };

    let mut config = match config {
        Ok(config) => config,
        Err(e) => return startup_failed(e),
    };
    if let Some(dir) = work_dir {
        config.work_dir = dir;
    }

    let mut local = None;
    let client: Arc<dyn QueueClient> = match backend {
        Backend::Local => {
            let client = Arc::new(MemoryQueueClient::new());
            if config.dummy_workitem {
                client.seed_dummy(&config.wiq);
            }
            local = Some(Arc::clone(&client));
            client as Arc<dyn QueueClient>
        }
        Backend::Pgmq => {
            let url = match config.require_database_url() {
                Ok(url) => SecretString::from(url.expose_secret()),
                Err(e) => return startup_failed(e),
            };
            Arc::new(PgmqQueueClient::new(url, PgmqConfig::new(&config.wiq)))
        }
    };

    info!(
        wiq = %config.wiq,
        queue = %config.queue,
        work_dir = %config.work_dir.display(),
        ephemeral = config.is_ephemeral(),
        "starting workitem agent"
    );

    let agent = Agent::new(client, Arc::new(HelloProcessor::default()), &config);
    if let Err(e) = agent.start().await {
        return startup_failed(e);
    }

    // Nothing sends messages to the local backend, so deliver one for the seed.
    if let Some(local) = local {
        if !config.is_ephemeral() && local.pending(&config.wiq) > 0 {
            local.deliver(&config.queue);
        }
    }

    let shutdown = agent.shutdown_signal();
    tokio::select! {
        _ = shutdown.notified() => info!("agent finished, exiting"),
        _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
    }
    Ok(())
}

async fn cmd_push(
    wiq: Option<String>,
    name: String,
    payload: Option<String>,
) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let wiq = wiq.unwrap_or_else(|| config.wiq.clone());
    let payload: serde_json::Value = match payload {
        Some(json) => serde_json::from_str(&json)?,
        None => serde_json::json!({}),
    };

    let db = Db::connect(config.require_database_url()?.expose_secret()).await?;
    db.ensure_schema().await?;
    db.create_queue(&wiq).await?;

    let item = Workitem::new(name, payload);
    let msg_id = db
        .send_to_queue(&wiq, &serde_json::to_value(&item)?, 0)
        .await?;
    db.notify_ready(&config.queue).await?;

    println!("Pushed: {} to {wiq} (msg {msg_id})", item.id);
    Ok(())
}
