//! HTTP request handlers.

use super::AppState;
use crate::metrics::encode;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, TextEncoder};

pub async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match encode(&state.registry) {
        Ok(body) => {
            let content_type = TextEncoder::new().format_type().to_string();
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn handle_healthz() -> StatusCode {
    StatusCode::OK
}
