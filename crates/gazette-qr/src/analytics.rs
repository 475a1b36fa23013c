//! Fire-and-forget analytics events.
//!
//! Every emitted event is logged. When an endpoint is configured, the event
//! is also POSTed from a detached task; delivery failures are swallowed.

use serde::Serialize;

use crate::resolve::FollowType;

/// Request outcome categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEvent {
    /// QR code rendered for a person.
    QrPerson,
    /// QR code rendered for an organisation.
    QrOrganisation,
    /// QR code rendered for a function tag.
    QrFunctionTag,
    /// Follow target resolved through `/follow`.
    FollowLookup,
    /// Request rejected for invalid input.
    ValidationError,
    /// Request failed internally.
    InternalError,
}

impl AnalyticsEvent {
    /// Event emitted for a successful render.
    pub fn rendered(follow_type: FollowType) -> Self {
        match follow_type {
            FollowType::Person => Self::QrPerson,
            FollowType::Organisation => Self::QrOrganisation,
            FollowType::RoleTag => Self::QrFunctionTag,
        }
    }

    /// Event emitted for a failed request.
    pub fn failed(client_error: bool) -> Self {
        if client_error {
            Self::ValidationError
        } else {
            Self::InternalError
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QrPerson => "qr_person",
            Self::QrOrganisation => "qr_organisation",
            Self::QrFunctionTag => "qr_function_tag",
            Self::FollowLookup => "follow_lookup",
            Self::ValidationError => "validation_error",
            Self::InternalError => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct EventPayload {
    event: AnalyticsEvent,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Analytics emitter.
#[derive(Debug, Clone)]
pub struct Analytics {
    http: reqwest::Client,
    endpoint: Option<String>,
}

impl Analytics {
    /// Create an emitter posting to `endpoint`, or logging only when `None`.
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Record an event without waiting for delivery.
    pub fn emit(&self, event: AnalyticsEvent) {
        tracing::info!(event = event.as_str(), "analytics event");

        let Some(endpoint) = self.endpoint.clone() else {
            return;
        };
        let http = self.http.clone();
        let payload = EventPayload {
            event,
            timestamp: chrono::Utc::now(),
        };
        tokio::spawn(async move {
            let result = http
                .post(&endpoint)
                .json(&payload)
                .send()
                .await
                .and_then(|r| r.error_for_status());
            if let Err(err) = result {
                tracing::debug!(event = event.as_str(), error = %err, "analytics delivery failed");
            }
        });
    }
}
