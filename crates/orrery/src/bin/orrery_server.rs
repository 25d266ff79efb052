//! # ORRERY Server
//!
//! Postgres-backed universe generation service.
//!
//! ## Usage
//!
//! ```bash
//! orrery_server --config orrery.toml
//! RUST_LOG=orrery=debug orrery_server --bind 127.0.0.1:8080
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use orrery::security::HttpExchange;
use orrery::shared::{Error, Result, SystemClock};
use orrery::store::PgStore;
use orrery::{serve, AppState, OrreryConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<PathBuf>,
    bind: Option<String>,
}

enum Command {
    Run(Args),
    Help,
}

fn parse_args() -> std::result::Result<Command, String> {
    let mut args = Args {
        config: None,
        bind: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = iter.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--bind" | "-b" => {
                args.bind = Some(iter.next().ok_or("--bind needs an address")?);
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(format!("unknown argument '{other}'")),
        }
    }
    Ok(Command::Run(args))
}

fn print_help() {
    println!("Usage: orrery_server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>    TOML configuration file");
    println!("  -b, --bind <ADDR>      Listen address (overrides [server] bind)");
    println!("  -h, --help             Show this help");
    println!();
    println!("Environment:");
    println!("  ORRERY_DATABASE_URL    Overrides [database] url");
    println!("  ORRERY_ADMIN_TOKEN     Overrides [auth] admin_token");
    println!("  RUST_LOG               Log filter (default: info)");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().init();
}

async fn run(args: Args) -> Result<()> {
    let mut config = OrreryConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if config.auth.admin_token.is_empty() {
        tracing::warn!("no admin token configured, POST /admin/runs will reject every request");
    }

    let store = PgStore::connect(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;
    tracing::info!(providers = config.auth.providers.len(), "database ready");

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .map_err(|e| Error::internal(format!("cannot bind {}", config.server.bind)).with_cause(e))?;
    tracing::info!(bind = %config.server.bind, production = config.server.production, "listening");

    let exchange = Arc::new(HttpExchange::new()?);
    let state = AppState::new(config, Arc::new(store), Arc::new(SystemClock), exchange);
    let sweepers = state.spawn_sweepers();

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(err) => tracing::error!(error = %err, "cannot listen for ctrl-c, shutting down"),
        }
        shutdown.cancel();
    });

    serve(listener, state).await?;

    for sweeper in sweepers {
        if let Err(err) = sweeper.await {
            tracing::warn!(error = %err, "sweeper task failed");
        }
    }
    tracing::info!("server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{message}");
            print_help();
            return ExitCode::from(2);
        }
    };

    init_tracing();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(kind = %err.kind(), error = ?err, "fatal");
            ExitCode::FAILURE
        }
    }
}
