//! QR code route handler.
//!
//! Handles `GET /qrcode`: resolve the follow target, build its destination
//! URL and render it as PNG.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::analytics::AnalyticsEvent;
use crate::error::FollowError;
use crate::payload::destination_url;
use crate::render::{QrRenderRequest, render_qr};
use crate::resolve::{FollowParams, FollowType, resolve_follow};
use crate::state::AppState;

/// Rendering parameters. Follow parameters are parsed separately.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderParams {
    /// Side of a plain code in pixels.
    #[serde(default)]
    pub size: Option<u32>,
    /// Composite onto the frame (default: true).
    #[serde(default)]
    pub frame: Option<bool>,
}

/// Handle a QR code request.
pub async fn qr_handler(
    State(state): State<AppState>,
    follow: Result<Query<FollowParams>, QueryRejection>,
    render: Result<Query<RenderParams>, QueryRejection>,
) -> Result<Response, FollowError> {
    match build_qr(&state, follow, render).await {
        Ok((follow_type, png)) => {
            state.analytics.emit(AnalyticsEvent::rendered(follow_type));
            Ok(png_response(png))
        }
        Err(err) => {
            state
                .analytics
                .emit(AnalyticsEvent::failed(err.is_client_error()));
            Err(err)
        }
    }
}

async fn build_qr(
    state: &AppState,
    follow: Result<Query<FollowParams>, QueryRejection>,
    render: Result<Query<RenderParams>, QueryRejection>,
) -> Result<(FollowType, Vec<u8>), FollowError> {
    let Query(follow) = follow.map_err(|e| FollowError::InvalidQuery(e.body_text()))?;
    let Query(render) = render.map_err(|e| FollowError::InvalidQuery(e.body_text()))?;

    // Reject bad render options before touching the index
    let mut request =
        QrRenderRequest::new(String::new(), render.size, render.frame.unwrap_or(true), None)?;

    let target = resolve_follow(&state.index, &follow).await?;
    request.destination_url = destination_url(&state.config.app_url, &target);
    request.label = Some(target.canonical_label);

    tracing::debug!(
        follow_type = ?target.follow_type,
        destination = %request.destination_url,
        frame = request.frame_enabled,
        "rendering qr code"
    );

    let assets = state.assets.clone();
    let png = tokio::task::spawn_blocking(move || render_qr(&request, &assets))
        .await
        .map_err(|e| FollowError::Internal(e.into()))??;

    Ok((target.follow_type, png))
}

/// Build an HTTP response with PNG content, cache headers and an ETag.
fn png_response(png: Vec<u8>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );

    let hash = xxhash_rust::xxh3::xxh3_64(&png);
    let etag = format!("\"{}\"", hex_fmt::HexFmt(&hash.to_be_bytes()));
    if let Ok(val) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, val);
    }

    (StatusCode::OK, headers, png).into_response()
}
