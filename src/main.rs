use std::sync::Arc;

mod config;
mod handler;
mod http;
mod logger;
mod model;
mod relay;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // REPLICATE_API_TOKEN usually lives in .env
    dotenvy::dotenv().ok();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Build the Tokio runtime, sized by the workers setting
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
    let state = Arc::new(config::AppState::new(&cfg).await?);
    let listener = server::create_listener(addr, cfg.performance.backlog)?;

    server::start_signal_handler(state.shutdown.clone())?;
    logger::log_server_start(&addr, &cfg);

    server::start_server_loop(listener, state).await;
    Ok(())
}
