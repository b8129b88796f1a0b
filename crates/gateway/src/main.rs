use std::sync::Arc;

use dashboard_gateway::app::build_router;
use dashboard_gateway::config::GatewayConfig;
use dashboard_gateway::state::GateState;
use dashboard_gateway::ResultExt;
use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[ctor::ctor]
fn init() {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dashboard_gateway=debug,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_target(true),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::load().log("Failed to load gateway configuration")?;
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let public_url = config.server.public_url.clone();
    let upstream = config.upstream.base_url.clone();

    let state = Arc::new(GateState::from_config(config));
    tracing::info!(
        session_cookie = state.cookies.name(),
        login = state.routes.login_path(),
        "Session gate configured"
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .log("Failed to bind to address")?;
    tracing::info!(%addr, %upstream, "starting dashboard gateway {}", public_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .log("Failed to serve app")?;

    tracing::info!("Gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
