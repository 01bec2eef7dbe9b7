//! HTTP gateway for the forum services.
//!
//! This crate is the single entry point for all client traffic. It handles:
//!
//! - Bearer token authentication with per-route bypass rules
//! - Path-prefix routing to the downstream services
//! - Identity header injection (`X-User-ID`, `X-User-Role`, `X-User-Verified`)
//! - Streaming request/response forwarding
//! - A uniform error envelope for gateway-originated failures
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      forum-gateway                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Route     │ │   Auth      │ │    Forwarder        │    │
//! │  │   Table     │ │   Filter    │ │    (reqwest)        │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!     ┌──────────┬──────────┬──┴───────┬──────────┬──────────┐
//!     ▼          ▼          ▼          ▼          ▼          ▼
//!  ┌──────┐  ┌──────┐  ┌────────┐  ┌────────┐  ┌──────┐  ┌──────┐
//!  │ user │  │ post │  │ reply  │  │message │  │ auth │  │ ...  │
//!  └──────┘  └──────┘  └────────┘  └────────┘  └──────┘  └──────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use forum_auth::SecretValidator;
//! use forum_gateway::{create_router, GatewayConfig, GatewayState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::from_env();
//! let jwt_validator = Arc::new(SecretValidator::new(&config.auth_config()?));
//!
//! // Create gateway state
//! let listen_addr = config.listen_addr.clone();
//! let state = GatewayState::new(jwt_validator, config)?;
//!
//! // Create router
//! let app = create_router(state);
//!
//! // Run server
//! let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod proxy;
pub mod route_table;
pub mod routes;
pub mod state;

pub use config::{GatewayConfig, ServiceUrls};
pub use error::{ApiError, GatewayError};
pub use route_table::{RouteEntry, RouteTable};
pub use routes::create_router;
pub use state::GatewayState;
