use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::Notify;

use dose::config::{self, AppState, Config};
use dose::error::StartupError;
use dose::logger;
use dose::server;

/// Environment variable naming the config file (without extension)
const CONFIG_ENV: &str = "DOSE_CONFIG";

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::log_error(&format!("[FATAL] {e}"));
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), StartupError> {
    // Config path: first argument, then DOSE_CONFIG, then ./config.toml
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());

    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Create the Tokio runtime, sizing it from the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("[CONFIG] Using {workers} worker threads"));
    } else {
        logger::log_info("[CONFIG] Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), StartupError> {
    let addr = cfg.get_socket_addr()?;
    let state = Arc::new(AppState::new(cfg)?);
    let listener = server::create_listener(addr)?;

    logger::log_server_start(&addr, state.dispatcher.base_dir(), &state.config);

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown));

    server::run_server(listener, state, shutdown, server::SHUTDOWN_GRACE_PERIOD).await;
    Ok(())
}
