//! Request logging

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use tracing::info;

/// Log every request except health probes
pub async fn log_request(request: Request, next: Next) -> Response {
    if request.uri().path() != "/healthz" {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        info!(
            remote_addr = %remote_addr,
            method = %request.method(),
            url = %request.uri(),
            "request"
        );
    }

    next.run(request).await
}
