//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::analytics::Analytics;
use crate::config::Config;
use crate::render::RenderAssets;
use crate::search::SearchClient;

/// Shared application state available to all request handlers.
///
/// Everything here is built before serving starts and is read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,

    /// Gazette index client.
    pub index: SearchClient,

    /// Frame and font used for framed codes.
    pub assets: Arc<RenderAssets>,

    /// Outcome event emitter.
    pub analytics: Analytics,
}

impl AppState {
    /// Assemble state around assets loaded by the caller.
    pub fn new(config: Config, assets: RenderAssets) -> anyhow::Result<Self> {
        let index = SearchClient::new(&config.search_url, config.search_timeout)?;
        let analytics = Analytics::new(config.analytics_url.clone());

        tracing::info!(
            search_url = %config.search_url,
            frame = assets.frame().is_some(),
            "application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            index,
            assets: Arc::new(assets),
            analytics,
        })
    }
}
