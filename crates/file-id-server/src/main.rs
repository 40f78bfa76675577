mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use file_id_index::{Config, FileIdIndex};
use tower_http::cors::{Any, CorsLayer};

use state::AppState;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Local,
    Arbitrary,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum JournalModeArg {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl From<JournalModeArg> for file_id_index::store::JournalMode {
    fn from(value: JournalModeArg) -> Self {
        use file_id_index::store::JournalMode::*;
        match value {
            JournalModeArg::Delete => Delete,
            JournalModeArg::Truncate => Truncate,
            JournalModeArg::Persist => Persist,
            JournalModeArg::Memory => Memory,
            JournalModeArg::Wal => Wal,
            JournalModeArg::Off => Off,
        }
    }
}

/// Serves the file identity lookup API over HTTP.
#[derive(Debug, Parser)]
#[command(name = "file-id-server")]
struct Args {
    /// Which index backend to run.
    #[arg(long, env = "FILE_ID_BACKEND", value_enum, default_value = "arbitrary")]
    backend: BackendArg,

    /// Root directory (local backend: absolute OS path; arbitrary: any string).
    #[arg(long, env = "FILE_ID_ROOT_DIR", default_value = "")]
    root_dir: String,

    /// Path to the SQLite store, or ":memory:".
    #[arg(long, env = "FILE_ID_DB_PATH", default_value = ":memory:")]
    db_path: String,

    /// SQLite journaling mode.
    #[arg(long, env = "FILE_ID_JOURNAL_MODE", value_enum)]
    journal_mode: Option<JournalModeArg>,

    /// Local backend only: autosync rate limit for get_path, in seconds.
    #[arg(long, env = "FILE_ID_AUTOSYNC_INTERVAL_SECS")]
    autosync_interval_secs: Option<i64>,

    /// Address to listen on.
    #[arg(long, env = "FILE_ID_LISTEN_ADDR", default_value = "127.0.0.1:8910")]
    listen_addr: SocketAddr,

    /// tracing-subscriber EnvFilter directive string.
    #[arg(long, env = "FILE_ID_LOG_FILTER", default_value = "info")]
    log_filter: String,
}

fn init_tracing(filter: &str) {
    let format = tracing_subscriber::fmt::format().with_target(false).compact();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .event_format(format)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &Args) -> file_id_index::Result<Config> {
    let mut config = match args.backend {
        BackendArg::Local => Config::local(args.root_dir.clone(), args.db_path.clone())?,
        BackendArg::Arbitrary => Config::arbitrary(args.root_dir.clone(), args.db_path.clone())?,
    };
    if let Some(mode) = args.journal_mode {
        config = config.with_journal_mode(mode.into());
    }
    if let Some(secs) = args.autosync_interval_secs {
        config = config.with_autosync_interval_secs(secs);
    }
    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_filter);

    let config = build_config(&args).unwrap_or_else(|error| {
        tracing::error!(%error, "invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(backend = ?args.backend, root_dir = %config.root_dir, "starting file-id-server");

    let index = FileIdIndex::open(config).unwrap_or_else(|error| {
        tracing::error!(%error, "failed to open index");
        std::process::exit(1);
    });

    let state = AppState { index: Arc::new(index) };
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = routes::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(args.listen_addr)
        .await
        .unwrap_or_else(|error| {
            tracing::error!(%error, addr = %args.listen_addr, "failed to bind");
            std::process::exit(1);
        });
    tracing::info!(addr = %args.listen_addr, "listening");
    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(%error, "server exited with error");
    }
}
