//! Gazette QR - follow codes for the official appointments gazette.
//!
//! This crate serves QR codes that subscribe their reader to a person, an
//! organisation or a function tag published in the official gazette.
//!
//! # Architecture
//!
//! - **Search**: Client for the gazette index, normalizing its reply shapes
//! - **Resolve**: Picks the follow type, validates it and settles the label
//! - **Payload**: Builds the URL encoded in the code and the follow command
//! - **Render**: Rasterizes the code, optionally composited onto a frame
//!
//! # URL Pattern
//!
//! ```text
//! GET /qrcode?name=Jean%20Dupont&verify=true
//! GET /qrcode?organisation=Q42
//! GET /qrcode?function_tag=ambassadeur&frame=false&size=300
//! GET /follow?name=Jean%20Dupont
//! ```

pub mod analytics;
pub mod config;
pub mod error;
pub mod normalize;
pub mod payload;
pub mod render;
pub mod resolve;
pub mod routes;
pub mod search;
pub mod state;

pub use config::Config;
pub use routes::router;
pub use state::AppState;
