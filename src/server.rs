// ABOUTME: HTTP server assembly and lifecycle for the Parley API
// ABOUTME: Builds the router with tower-http layers and serves it until a shutdown signal
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # HTTP Server
//!
//! [`build_router`] produces the complete application (health routes plus the
//! authenticated API) wrapped in request-id, tracing, CORS and timeout layers.
//! [`ParleyServer::run`] binds it and shuts down gracefully on Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::error_handling::HandleErrorLayer;
use axum::http::{HeaderName, Request};
use axum::{BoxError, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tower::timeout::{error::Elapsed, TimeoutLayer};
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::database_plugins::DatabaseProvider;
use crate::errors::{AppError, AppResult};
use crate::middleware::{create_request_span, setup_cors, RequestIdGenerator, REQUEST_ID_HEADER};
use crate::resources::ServerResources;
use crate::routes::{api_routes, HealthRoutes};

/// Build the complete application router
#[must_use]
pub fn build_router(resources: &Arc<ServerResources>) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let timeout_secs = resources.config.request_timeout_secs;

    Router::new()
        .merge(HealthRoutes::routes(Arc::clone(resources)))
        .merge(api_routes(resources))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                    layer_error(&err, timeout_secs)
                }))
                .layer(TimeoutLayer::new(Duration::from_secs(timeout_secs))),
        )
        .layer(setup_cors(&resources.config.cors))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| create_request_span(request)),
        )
        .layer(SetRequestIdLayer::new(request_id, RequestIdGenerator))
}

/// Render middleware failures in the standard error envelope
fn layer_error(err: &BoxError, timeout_secs: u64) -> AppError {
    if err.is::<Elapsed>() {
        warn!(timeout_secs, "Request timed out");
        AppError::request_timeout(timeout_secs)
    } else {
        AppError::internal("Request processing failed")
            .with_source(std::io::Error::other(err.to_string()))
    }
}

/// The Parley HTTP server
pub struct ParleyServer {
    resources: Arc<ServerResources>,
}

impl ParleyServer {
    /// Create a server over fully assembled resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Bind and serve until Ctrl-C or SIGTERM, then close the database pool
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server fails
    pub async fn run(self) -> AppResult<()> {
        let config = &self.resources.config;
        let addr = format!("{}:{}", config.host, config.http_port);

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            AppError::internal(format!("Failed to bind {addr}")).with_source(e)
        })?;
        info!(address = %addr, "HTTP server listening");

        let app = build_router(&self.resources);
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        info!("Closing database pool");
        self.resources.database.close().await;

        served.map_err(|e| AppError::internal("HTTP server failed").with_source(e))?;
        info!("Server shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, starting graceful shutdown");
}
