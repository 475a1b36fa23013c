//! Follow target lookup.
//!
//! `GET /follow` resolves the same parameters as `/qrcode` and returns what
//! the code would point to, as JSON.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::Serialize;

use crate::analytics::AnalyticsEvent;
use crate::error::FollowError;
use crate::payload::{destination_url, follow_command};
use crate::resolve::{FollowParams, FollowType, resolve_follow};
use crate::state::AppState;

/// Resolved follow target with its derived payloads.
#[derive(Debug, Clone, Serialize)]
pub struct FollowSummary {
    follow_type: FollowType,
    argument: String,
    label: String,
    destination_url: String,
    command: String,
}

/// Handle `GET /follow`.
pub async fn follow_handler(
    State(state): State<AppState>,
    params: Result<Query<FollowParams>, QueryRejection>,
) -> Result<Json<FollowSummary>, FollowError> {
    let result = async {
        let Query(params) = params.map_err(|e| FollowError::InvalidQuery(e.body_text()))?;
        let target = resolve_follow(&state.index, &params).await?;
        Ok::<_, FollowError>(FollowSummary {
            follow_type: target.follow_type,
            destination_url: destination_url(&state.config.app_url, &target),
            command: follow_command(&target),
            argument: target.raw_argument,
            label: target.canonical_label,
        })
    }
    .await;

    match result {
        Ok(summary) => {
            state.analytics.emit(AnalyticsEvent::FollowLookup);
            Ok(Json(summary))
        }
        Err(err) => {
            state
                .analytics
                .emit(AnalyticsEvent::failed(err.is_client_error()));
            Err(err)
        }
    }
}
