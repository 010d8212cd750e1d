use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::Notify;

mod api;
mod config;
mod handler;
mod http;
mod logger;
mod server;
mod store;
mod upload;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // First argument is the config file path (without extension)
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let state = match config::AppState::open(&cfg).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            logger::log_error(&format!("Failed to open storage: {e}"));
            return Err(e);
        }
    };

    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &state, state.store.len().await);

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown));

    // Connections are served with spawn_local
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::run_server(
            listener,
            state,
            Arc::new(AtomicUsize::new(0)),
            shutdown,
        ))
        .await;

    Ok(())
}
