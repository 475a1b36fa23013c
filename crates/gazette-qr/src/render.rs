//! QR code rasterization and frame compositing.
//!
//! Everything is drawn as SVG and rasterized with resvg:
//! - Plain codes: black modules on white, 1-module quiet zone, scaled to the
//!   requested pixel size
//! - Framed codes: the frame PNG as background at its own dimensions, the code
//!   centered with its top edge at 45% of the height, and the caption centered
//!   at 35% of the height

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use maud::{Markup, html};
use qrcode::{Color, QrCode};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};

use crate::config::Config;
use crate::error::FollowError;

/// Pixel size used when the caller does not ask for one.
pub const DEFAULT_QR_SIZE: u32 = 512;

/// Largest accepted pixel size.
pub const MAX_QR_SIZE: u32 = 4096;

/// Quiet zone around the code, in modules.
const QUIET_ZONE: usize = 1;

/// Framed layout, as fractions of the frame dimensions.
const FRAME_QR_WIDTH_RATIO: f32 = 0.5;
const FRAME_QR_TOP_RATIO: f32 = 0.45;
const FRAME_LABEL_BASELINE_RATIO: f32 = 0.35;

/// Caption style.
const LABEL_COLOR: &str = "#000091";
const LABEL_FONT_SIZE: u32 = 48;
/// Family named when no font face is available at all; nothing is drawn then.
const FALLBACK_FONT_FAMILY: &str = "sans-serif";

/// Failure while producing a PNG.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The payload does not fit in a QR code.
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),

    /// The generated SVG was rejected.
    #[error("SVG parse error: {0}")]
    Svg(#[from] usvg::Error),

    /// The target pixmap could not be allocated.
    #[error("failed to create {0}x{1} pixmap")]
    Pixmap(u32, u32),

    /// PNG encoding failed.
    #[error("PNG encode error: {0}")]
    Png(String),

    /// A framed code was requested but no frame is configured.
    #[error("frame image not configured")]
    FrameUnavailable,
}

/// A validated render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrRenderRequest {
    /// Text encoded in the code.
    pub destination_url: String,
    /// Side of the plain code in pixels. Unused when framed.
    pub pixel_size: u32,
    /// Composite onto the frame.
    pub frame_enabled: bool,
    /// Caption for framed codes.
    pub label: Option<String>,
}

impl QrRenderRequest {
    /// Validate render options. An explicit size cannot be combined with a
    /// frame, whose layout is fixed.
    pub fn new(
        destination_url: String,
        size: Option<u32>,
        frame_enabled: bool,
        label: Option<String>,
    ) -> Result<Self, FollowError> {
        if frame_enabled && size.is_some() {
            return Err(FollowError::InvalidRenderOptions(
                "size cannot be combined with a frame; pass frame=false".to_string(),
            ));
        }

        let pixel_size = size.unwrap_or(DEFAULT_QR_SIZE);
        if pixel_size == 0 || pixel_size > MAX_QR_SIZE {
            return Err(FollowError::InvalidRenderOptions(format!(
                "size must be between 1 and {MAX_QR_SIZE}"
            )));
        }

        Ok(Self {
            destination_url,
            pixel_size,
            frame_enabled,
            label,
        })
    }
}

/// Decoded frame, ready to be embedded in SVG.
#[derive(Debug, Clone)]
pub struct FrameImage {
    data_uri: String,
    width: u32,
    height: u32,
}

impl FrameImage {
    /// Decode a PNG frame.
    pub fn from_png(bytes: &[u8]) -> anyhow::Result<Self> {
        let pixmap = Pixmap::decode_png(bytes).context("frame is not a valid PNG")?;
        let b64 = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
        Ok(Self {
            data_uri: format!("data:image/png;base64,{b64}"),
            width: pixmap.width(),
            height: pixmap.height(),
        })
    }

    /// Frame dimensions in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Frame and font, loaded once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct RenderAssets {
    frame: Option<FrameImage>,
    fontdb: Arc<fontdb::Database>,
    font_family: String,
}

impl RenderAssets {
    /// Build assets from in-memory frame and font data.
    pub fn new(frame_png: Option<&[u8]>, font: Option<Vec<u8>>) -> anyhow::Result<Self> {
        let frame = frame_png.map(FrameImage::from_png).transpose()?;

        let mut db = fontdb::Database::new();
        match font {
            Some(font) => db.load_font_data(font),
            None => db.load_system_fonts(),
        }
        let font_family = match db.faces().next().and_then(|face| face.families.first()) {
            Some((family, _)) => family.clone(),
            None => {
                tracing::warn!("no font available, captions will not be drawn");
                FALLBACK_FONT_FAMILY.to_string()
            }
        };

        Ok(Self {
            frame,
            fontdb: Arc::new(db),
            font_family,
        })
    }

    /// Read the configured frame and font files.
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let frame = config.frame_path.as_deref().map(read_asset).transpose()?;
        let font = config.font_path.as_deref().map(read_asset).transpose()?;

        let assets = Self::new(frame.as_deref(), font)?;
        tracing::info!(
            frame = ?assets.frame.as_ref().map(FrameImage::dimensions),
            font_family = %assets.font_family,
            "render assets loaded"
        );
        Ok(assets)
    }

    /// Whether a caption can actually be drawn.
    pub fn has_font(&self) -> bool {
        self.fontdb.len() > 0
    }

    /// The configured frame, if any.
    pub fn frame(&self) -> Option<&FrameImage> {
        self.frame.as_ref()
    }
}

fn read_asset(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Render a QR code as PNG.
pub fn render_qr(request: &QrRenderRequest, assets: &RenderAssets) -> Result<Vec<u8>, RenderError> {
    let code = QrCode::new(request.destination_url.as_bytes())?;
    let modules = QrModules::from_code(&code);

    if request.frame_enabled {
        let frame = assets.frame.as_ref().ok_or(RenderError::FrameUnavailable)?;
        let svg = framed_svg(&modules, frame, request.label.as_deref(), &assets.font_family);
        rasterize(&svg, frame.width, frame.height, assets)
    } else {
        let svg = plain_svg(&modules, request.pixel_size);
        rasterize(&svg, request.pixel_size, request.pixel_size, assets)
    }
}

/// Dark modules of a code as an SVG path, in module units.
struct QrModules {
    /// Side in modules, quiet zone included.
    side: usize,
    path: String,
}

impl QrModules {
    fn from_code(code: &QrCode) -> Self {
        let width = code.width();
        let mut path = String::new();
        for (i, color) in code.to_colors().iter().enumerate() {
            if matches!(color, Color::Dark) {
                let x = i % width + QUIET_ZONE;
                let y = i / width + QUIET_ZONE;
                path.push_str(&format!("M{x} {y}h1v1h-1z"));
            }
        }
        Self {
            side: width + 2 * QUIET_ZONE,
            path,
        }
    }

    /// Nested SVG drawing the code in a `size` square at (`x`, `y`).
    fn to_svg(&self, x: f32, y: f32, size: f32) -> String {
        format!(
            r##"<svg x="{x}" y="{y}" width="{size}" height="{size}" viewBox="0 0 {n} {n}"><rect width="{n}" height="{n}" fill="#fff"/><path d="{path}" fill="#000" shape-rendering="crispEdges"/></svg>"##,
            n = self.side,
            path = self.path,
        )
    }
}

fn plain_svg(modules: &QrModules, size: u32) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">{qr}</svg>"##,
        qr = modules.to_svg(0.0, 0.0, size as f32),
    )
}

fn framed_svg(
    modules: &QrModules,
    frame: &FrameImage,
    label: Option<&str>,
    font_family: &str,
) -> String {
    let w = frame.width as f32;
    let h = frame.height as f32;
    let qr_size = (w * FRAME_QR_WIDTH_RATIO).round();
    let qr_x = ((w - qr_size) / 2.0).round();
    let qr_y = (h * FRAME_QR_TOP_RATIO).round();
    let label_y = (h * FRAME_LABEL_BASELINE_RATIO).round();

    let mut svg = String::with_capacity(frame.data_uri.len() + modules.path.len() + 1024);
    svg.push_str(&format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##,
        w = frame.width,
        h = frame.height,
    ));
    svg.push_str(&format!(
        r##"<image href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"##,
        uri = frame.data_uri,
        w = frame.width,
        h = frame.height,
    ));
    svg.push_str(&modules.to_svg(qr_x, qr_y, qr_size));
    svg.push_str(&caption(w / 2.0, label_y, label.unwrap_or_default(), font_family).into_string());
    svg.push_str("</svg>");
    svg
}

fn rasterize(
    svg: &str,
    width: u32,
    height: u32,
    assets: &RenderAssets,
) -> Result<Vec<u8>, RenderError> {
    let mut options = usvg::Options::default();
    options.fontdb = assets.fontdb.clone();
    let tree = usvg::Tree::from_str(svg, &options)?;

    let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Pixmap(width, height))?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|e| RenderError::Png(e.to_string()))
}

/// Caption text node. maud escapes the label and font family.
fn caption(x: f32, y: f32, label: &str, font_family: &str) -> Markup {
    html! {
        text x=(x) y=(y) text-anchor="middle" font-family=(font_family)
            font-size=(LABEL_FONT_SIZE) fill=(LABEL_COLOR) { (label) }
    }
}
