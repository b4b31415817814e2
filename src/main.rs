//! # Quintro Server
//!
//! Entry point for the multiplayer Quintro game server. Loads the TOML
//! configuration, applies command-line overrides, picks a game store and serves
//! the newline-delimited JSON protocol over TCP.
//!
//! ## Usage
//! ```text
//! quintro-server --config quintro.toml --bind 0.0.0.0:7878 --data-dir ./games
//! ```

use anyhow::Context;
use clap::Parser;
use quintro::server::serve;
use quintro::{AppConfig, GameStore, JsonDirStore, MemoryGameStore, SessionCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when it does not exist.
    #[clap(short, long, default_value = "quintro.toml")]
    config: PathBuf,

    /// Address to listen on, overriding `server.bind`.
    #[clap(short, long)]
    bind: Option<String>,

    /// Directory for JSON game files, overriding `server.data_dir`.
    #[clap(short, long)]
    data_dir: Option<PathBuf>,

    /// Tokio worker threads (0 = one per CPU), overriding `server.worker_threads`.
    #[clap(short = 'w', long)]
    worker_threads: Option<usize>,

    /// trace, debug, info, warn or error.
    #[clap(short, long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    let mut config = AppConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(dir) = args.data_dir {
        config.server.data_dir = Some(dir);
    }
    if let Some(threads) = args.worker_threads {
        config.server.worker_threads = threads;
    }

    let worker_threads = match config.server.worker_threads {
        0 => num_cpus::get(),
        n => n,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    info!(worker_threads, "runtime ready");

    runtime.block_on(async move {
        match config.server.data_dir.clone() {
            Some(dir) => {
                let store = JsonDirStore::open(&dir)
                    .await
                    .with_context(|| format!("opening data directory {}", dir.display()))?;
                info!(dir = %dir.display(), "storing games as JSON files");
                run(store, config).await
            }
            None => {
                info!("storing games in memory");
                run(MemoryGameStore::new(), config).await
            }
        }
    })
}

async fn run<S: GameStore>(store: S, config: AppConfig) -> anyhow::Result<()> {
    let coordinator = SessionCoordinator::new(Arc::new(store), &config);
    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    serve(listener, coordinator).await?;
    Ok(())
}
