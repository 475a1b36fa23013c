//! Liveness and render readiness.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Framed codes, the default, fail without a frame.
    frame_configured: bool,
    font_available: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        frame_configured: state.assets.frame().is_some(),
        font_available: state.assets.has_font(),
    })
}
