//! Bookshelf host
//!
//! Resolves configuration, composes the service provider, migrates and seeds
//! the store, then serves HTTP until Ctrl+C.
//!
//! # Architecture Overview
//!
//! ```text
//!   appsettings*.json ─┐
//!   environment vars ──┼─▶ config ─▶ Settings ──┐
//!   --set overrides ───┘                        │
//!                                               ▼
//!   content root ─▶ hosting ─▶ HostEnvironment ─▶ composition ─▶ ServiceProvider
//!   (git branch)                                 (native + module)      │
//!                                                                       ▼
//!                                   lifecycle::startup: acquire handle ─▶ migrate ─▶ seed
//!                                                                       │
//!                                                                       ▼
//!   Client ◀──────────────────────────────────────────── http (scope per request)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use bookshelf_host::config::{ConfigResolver, LiveSettings, SettingsWatcher};
use bookshelf_host::hosting::{environment::DEVELOPMENT, environment_name_from_process, HostEnvironment};
use bookshelf_host::http::HttpServer;
use bookshelf_host::lifecycle::{self, spawn_ctrl_c_handler, Shutdown};
use bookshelf_host::observability::{default_directive, init_tracing, LogLevelReloader};
use bookshelf_host::storage::InMemoryStore;

#[derive(Parser)]
#[command(name = "bookshelf-host")]
#[command(about = "Bookshelf web host", long_about = None)]
struct Cli {
    /// Directory holding appsettings*.json and wwwroot.
    #[arg(long, default_value = ".")]
    content_root: PathBuf,

    /// Environment name. Defaults to $APP_ENVIRONMENT, then Production.
    #[arg(long)]
    environment: Option<String>,

    #[arg(long, default_value = "127.0.0.1:5000")]
    bind: String,

    /// Configuration override, highest precedence. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let environment_name = cli
        .environment
        .clone()
        .unwrap_or_else(environment_name_from_process);
    let is_development = environment_name.eq_ignore_ascii_case(DEVELOPMENT);

    let resolver = ConfigResolver::new(&cli.content_root, &environment_name)
        .with_overrides(cli.set.iter().cloned());

    let settings = match resolver.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(is_development, &default_directive(None));
            tracing::error!(error = %e, "Configuration could not be loaded");
            return ExitCode::FAILURE;
        }
    };
    let log_reloader = init_tracing(is_development, &default_directive(Some(&settings)));

    tracing::info!("bookshelf-host v{} starting", env!("CARGO_PKG_VERSION"));

    let environment = Arc::new(HostEnvironment::detect(&environment_name, &cli.content_root));
    let connector = Arc::new(InMemoryStore::new());

    let host = match lifecycle::start_with(&settings, environment, connector) {
        Ok(host) => host,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    match serve(&cli, resolver, host, log_reloader).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Host terminated");
            ExitCode::FAILURE
        }
    }
}

async fn serve(
    cli: &Cli,
    resolver: ConfigResolver,
    host: lifecycle::ReadyHost,
    log_reloader: Option<LogLevelReloader>,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Arc::new(Shutdown::new());
    spawn_ctrl_c_handler(shutdown.clone());

    // Reloads publish to LiveSettings and re-apply the log level.
    let live = host.provider().get::<LiveSettings>()?;
    let (watcher, updates) = SettingsWatcher::new(resolver);
    let _watcher = match watcher.run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Settings watcher unavailable, reload disabled");
            None
        }
    };
    tokio::spawn(live.follow(updates, move |settings| {
        let Some(reloader) = &log_reloader else { return };
        if let Err(e) = reloader.apply(settings) {
            tracing::warn!(error = %e, "Log level not reloaded");
        }
    }));

    let server = HttpServer::new(&host)?;
    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener, shutdown.subscribe()).await?;
    Ok(())
}
