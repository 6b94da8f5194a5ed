//! VeloZ gateway: the HTTP/SSE front end over the engine bridge (C11–C13).

mod auth;
mod audit;
mod bridge_client;
mod dispatcher;
mod error;
mod handlers;
mod metrics;
mod middleware;
mod rate_limiter;
mod state;

use bridge_client::EngineBridge;
use common::config::CoreConfig;
use common::constants::{DEFAULT_BROADCAST_HISTORY, DEFAULT_SUBSCRIBER_BUFFER};
use state::{AppState, Caches};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use veloz_broadcaster::Broadcaster;

const SERVICE_NAME: &str = "veloz-gateway";

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("{}=info", SERVICE_NAME.replace('-', "_")).into()
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "starting {SERVICE_NAME}");
    metrics::install();

    let config = match CoreConfig::load(std::env::var("VELOZ_CONFIG_FILE").ok().as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::from(2);
        }
    };

    let caches = Arc::new(Caches::default());
    let broadcaster = Arc::new(Broadcaster::new(DEFAULT_BROADCAST_HISTORY, DEFAULT_SUBSCRIBER_BUFFER));

    let engine_bin = std::env::var("VELOZ_ENGINE_BIN").unwrap_or_else(|_| "veloz-engine".to_string());
    let bridge = match EngineBridge::spawn(&engine_bin, caches.clone(), broadcaster.clone()) {
        Ok(bridge) => Arc::new(bridge),
        Err(err) => {
            error!(error = %err, bin = %engine_bin, "failed to start engine bridge");
            return ExitCode::from(1);
        }
    };

    let audit: Arc<dyn audit::AuditSink> = Arc::new(audit::FileAuditSink::new(config.audit.dir.clone()));
    let authenticator: Arc<dyn auth::Authenticator> = Arc::new(auth::HeaderKeyAuthenticator);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config, bridge, broadcaster, caches, audit, authenticator);

    let app = axum::Router::new()
        .fallback(middleware::entry)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .with_state(app_state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, addr = %bind_addr, "failed to bind gateway listener");
            return ExitCode::from(1);
        }
    };
    info!(addr = %bind_addr, "gateway listening");

    let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    match result {
        Ok(()) => {
            info!("gateway shut down cleanly");
            ExitCode::from(0)
        }
        Err(err) => {
            error!(error = %err, "gateway server error");
            ExitCode::from(1)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received, draining in-flight requests");
}
