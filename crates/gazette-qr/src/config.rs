//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    /// Public base URL of the follow application. QR codes point here.
    pub app_url: String,

    /// Base URL of the gazette index.
    pub search_url: String,

    /// Request timeout for gazette index calls.
    pub search_timeout: Duration,

    /// PNG used as the background of framed QR codes.
    pub frame_path: Option<PathBuf>,

    /// Font used for the caption of framed QR codes.
    pub font_path: Option<PathBuf>,

    /// Endpoint receiving analytics events, if any.
    pub analytics_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `GAZETTE_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `GAZETTE_APP_URL`: Follow application URL (default: "http://localhost:8080")
    /// - `GAZETTE_SEARCH_URL`: Gazette index URL (default: "https://jorfsearch.steinertriples.ch")
    /// - `GAZETTE_SEARCH_TIMEOUT_SECS`: Index request timeout (default: 10)
    /// - `GAZETTE_FRAME_PATH`: Frame PNG for framed codes
    /// - `GAZETTE_FONT_PATH`: Caption font (TTF/OTF)
    /// - `GAZETTE_ANALYTICS_URL`: Analytics event sink
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("GAZETTE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let app_url = std::env::var("GAZETTE_APP_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let search_url = std::env::var("GAZETTE_SEARCH_URL")
            .unwrap_or_else(|_| "https://jorfsearch.steinertriples.ch".to_string())
            .trim_end_matches('/')
            .to_string();

        let search_timeout = match std::env::var("GAZETTE_SEARCH_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("invalid GAZETTE_SEARCH_TIMEOUT_SECS: {raw}"))?,
            ),
            Err(_) => Duration::from_secs(10),
        };

        let frame_path = non_empty_var("GAZETTE_FRAME_PATH").map(PathBuf::from);
        let font_path = non_empty_var("GAZETTE_FONT_PATH").map(PathBuf::from);
        let analytics_url = non_empty_var("GAZETTE_ANALYTICS_URL");

        tracing::info!(
            bind_addr = %bind_addr,
            app_url = %app_url,
            search_url = %search_url,
            search_timeout_secs = search_timeout.as_secs(),
            frame = frame_path.is_some(),
            font = font_path.is_some(),
            analytics = analytics_url.is_some(),
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            app_url,
            search_url,
            search_timeout,
            frame_path,
            font_path,
            analytics_url,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
