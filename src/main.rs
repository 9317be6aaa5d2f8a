mod config;
mod coordinator;
mod decoder;
mod entities;
mod error;
mod forecast;
mod http;
mod models;
mod mqtt;
mod power;
mod restore;
mod util;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use coordinator::{Coordinator, CoordinatorEvent, CoordinatorHandle};
use entities::EntityViews;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("ONEMETER_CONFIG").unwrap_or_else(|_| "config.json".to_string());
    let config = config::Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    info!(
        device_id = %config.device_id,
        subscribe_topic = %config.subscribe_topic,
        "configuration loaded"
    );

    // The channel is created up front so the MQTT transport task (which
    // needs a handle to forward inbound pulses) and the coordinator task
    // (which needs the matching receiver) can both be wired without a
    // chicken-and-egg ordering problem.
    let (coordinator_handle, receiver) = CoordinatorHandle::channel();
    let mqtt_client = mqtt::connect(&config, coordinator_handle.clone());
    let published_rx = Coordinator::spawn(config.clone(), mqtt_client, receiver);

    // Periodic forecast tick (spec §4.7, default one hour).
    let tick_handle = coordinator_handle.clone();
    let tick_seconds = config.forecast_tick_seconds.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(tick_seconds));
        loop {
            interval.tick().await;
            let _ = tick_handle.send(CoordinatorEvent::ForecastTick);
        }
    });

    let entity_views = EntityViews::new(config.device_id.clone(), published_rx);
    let app = http::router(entity_views);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!(%addr, "http observability surface listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind http listener on {addr}"))?;
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "http server error");
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received, detaching"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }

    coordinator_handle.detach().await;
    server.abort();
    Ok(())
}
