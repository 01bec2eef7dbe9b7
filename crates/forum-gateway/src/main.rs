//! Forum API Gateway
//!
//! This is the main entry point for the gateway service. Configuration comes
//! from the environment (a `.env` file in the working directory is loaded
//! first if present).
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` and set `DEV_MODE=true` to use a mock
//! token validator instead of the shared secret.
//! Use tokens in format: `test-token:<user_id>:<role>[:verified]`

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "dev-mode")]
use forum_auth::MockJwtValidator;
use forum_auth::SecretValidator;
use forum_gateway::{create_router, GatewayConfig, GatewayState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,forum_gateway=debug,forum_auth=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Forum API Gateway");

    let config = GatewayConfig::from_env();
    let listen_addr = config.listen_addr.clone();

    tracing::info!(
        listen_addr = %listen_addr,
        algorithm = %config.jwt_algorithm,
        upstream_timeout_seconds = config.upstream_timeout_seconds,
        max_body_bytes = config.max_body_bytes,
        cors_origins = ?config.cors_origins,
        "Gateway configuration loaded"
    );

    #[cfg(feature = "dev-mode")]
    if std::env::var("DEV_MODE").is_ok_and(|v| v == "true") {
        tracing::warn!("DEV MODE ENABLED - using mock token validator");
        tracing::warn!("Use tokens in format: test-token:<user_id>:<role>[:verified]");
        let state = GatewayState::new(Arc::new(MockJwtValidator), config)?;
        return serve(create_router(state), &listen_addr).await;
    }

    let jwt_validator = Arc::new(SecretValidator::new(&config.auth_config()?));
    tracing::info!("Token validator initialized");

    let state = GatewayState::new(jwt_validator, config)?;
    if state.routes.is_empty() {
        tracing::warn!("No upstream services configured - every request will 404");
    }

    let app = create_router(state);
    tracing::info!("Router configured");

    serve(app, &listen_addr).await
}

async fn serve(app: axum::Router, listen_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
