use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use env_logger::Env;
use log::info;
use tokio::signal::{
    self,
    unix::{signal, SignalKind},
};

use gift_auction::configuration::{get_matches, Configuration};
use gift_auction::engine::Engine;
use gift_auction::register::Register;
use gift_auction::{http, metrics};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = get_matches();
    let config_file = matches.value_of("config-file").unwrap_or("./Config.toml");
    let config = Configuration::new(config_file)?;

    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level())).init();
    info!("starting gift_auction");

    let register = Arc::new(Register::new(config.clone()).await?);

    let stopped = Arc::new(AtomicBool::new(false));
    let engine = Engine::new(register.store.clone(), register.engine_owner_id.clone(), config.poll_interval_ms());
    tokio::spawn(engine.run(stopped.clone()));

    metrics::spawn(register.store.clone(), &config.prometheus_exporter_bind_address())?;

    let app = http::router(register.clone());
    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("http server listening on {}", bind_address);

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                log::error!("http server error: {}", e);
            }
        }
        _ = wait_termination() => {
            info!("shutdown signal received");
        }
    }

    stopped.store(true, Ordering::SeqCst);
    register.store.release_engine_lock(&register.engine_owner_id, chrono::Utc::now()).await?;
    info!("shutting down gift_auction");
    Ok(())
}

async fn wait_termination() {
    let mut term = signal(SignalKind::terminate()).unwrap();
    let mut inter = signal(SignalKind::interrupt()).unwrap();

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("ctrl-c pressed");
        },
        _ = term.recv() => {
            info!("terminate signal received");
        },
        _ = inter.recv() => {
            info!("interrupt signal received");
        },
    }
}
