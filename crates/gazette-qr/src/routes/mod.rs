//! Route definitions for the QR service.
//!
//! ## Routes
//!
//! - `GET /health` - Health check (JSON)
//! - `GET /qrcode` - Follow QR code (PNG)
//! - `GET /follow` - Resolved follow target (JSON)

mod follow;
mod health;
mod qr;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

/// Build the complete router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/qrcode", get(qr::qr_handler))
        .route("/follow", get(follow::follow_handler))
        .with_state(state)
}
