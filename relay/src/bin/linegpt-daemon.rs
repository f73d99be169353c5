use clap::Parser;
use linegpt_core::config::{get_default_database_path, RelayConfig};
use linegpt_core::CompletionClient;
use linegpt_relay::history::{HistoryStoreRef, InMemoryHistoryStore, SqliteHistoryStore};
use linegpt_relay::http_server::{self, AppState};
use linegpt_relay::reply::LineReplyClient;
use linegpt_relay::{RelayContext, TurnOrchestrator};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "linegpt-daemon", about = "LINE webhook relay to a chat completion endpoint")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// System prompt to use
    #[arg(short, long)]
    system_prompt: Option<String>,

    /// Completion API key
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Completion model to use
    #[arg(short = 'o', long)]
    model: Option<String>,

    /// Number of prior records sent with each message
    #[arg(short = 'l', long)]
    history_limit: Option<String>,

    /// Path to the history database
    #[arg(long)]
    database: Option<PathBuf>,

    /// Keep history in memory only
    #[arg(long)]
    in_memory: bool,

    /// HTTP server address
    #[arg(long, default_value = "127.0.0.1:8080")]
    http_addr: SocketAddr,
}

impl Args {
    fn overrides(&self) -> RelayConfig {
        RelayConfig {
            api_key: self.api_key.clone(),
            system_prompt: self.system_prompt.clone(),
            history_limit: self
                .history_limit
                .clone()
                .map(linegpt_core::HistoryLimitSetting::Text),
            model_name: self.model.clone(),
            database_path: self.database.clone(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine. Loaded first so RUST_LOG from it applies.
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    // File, then environment, then command line
    let file_config = match RelayConfig::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };
    let config = match file_config.merge(&args.overrides()).validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };
    info!(
        model = %config.completion.model,
        history_limit = ?config.history_limit,
        webhook_path = %config.webhook_path,
        "Loaded configuration"
    );

    let history: HistoryStoreRef = if args.in_memory {
        info!("Keeping history in memory");
        Arc::new(InMemoryHistoryStore::new())
    } else {
        let path = match config.database_path.clone() {
            Some(path) => path,
            None => get_default_database_path()?,
        };
        Arc::new(
            SqliteHistoryStore::open(&path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open history database: {}", e))?,
        )
    };

    let completion = Arc::new(CompletionClient::new(config.completion.clone()));
    let reply = Arc::new(LineReplyClient::new(config.channel_access_token.clone()));
    let orchestrator =
        TurnOrchestrator::new(RelayContext::from(&config), history, completion, reply);

    let app = http_server::router(
        AppState::new(orchestrator, &config.channel_secret),
        &config.webhook_path,
    );

    let result = http_server::run_server(app, args.http_addr).await;
    if let Err(e) = &result {
        error!(error = %e, "HTTP server failed");
    }

    info!("linegpt daemon shutting down");
    result
}
