//! Loading and decoding of icon, border and background artwork.
//!
//! Raster PNG data is decoded directly by tiny-skia; anything else is parsed
//! as SVG with usvg and rasterized at its intrinsic size with resvg.

use crate::types::NodeType;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tiny_skia::{Pixmap, Transform};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Resolves an artwork location into its raw bytes.
///
/// Implementations decide what a location means (local path, cache key,
/// remote object); the export pipeline only needs the bytes.
pub trait ImageSource {
    /// Fetches the bytes behind `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Reads artwork from the local filesystem.
///
/// Accepts plain paths and `file://` urls. Relative paths resolve against
/// `base_dir`.
#[derive(Debug, Clone, Default)]
pub struct FileImageSource {
    base_dir: Option<PathBuf>,
}

impl FileImageSource {
    /// Creates a source resolving relative paths against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, url: &str) -> Result<PathBuf> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(anyhow!("remote artwork is not available offline: {url}"));
        }
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        Ok(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

impl ImageSource for FileImageSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let path = self.resolve(url)?;
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
    }
}

/// Decodes PNG or SVG bytes into a pixmap.
pub fn decode_image(bytes: &[u8]) -> Result<Pixmap> {
    if bytes.starts_with(PNG_SIGNATURE) {
        return Pixmap::decode_png(bytes).map_err(|e| anyhow!("failed to decode PNG: {e}"));
    }
    rasterize_svg(bytes)
}

/// Rasterizes SVG data at its intrinsic size.
pub fn rasterize_svg(data: &[u8]) -> Result<Pixmap> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_data(data, &opt)
        .map_err(|e| anyhow!("failed to parse SVG: {e}"))?;

    let size = tree.size();
    let width = size.width().ceil().max(1.0) as u32;
    let height = size.height().ceil().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate {width}x{height} pixmap"))?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
    Ok(pixmap)
}

/// Fetches and decodes one piece of artwork.
pub fn load_image(source: &dyn ImageSource, url: &str) -> Result<Pixmap> {
    let bytes = source.fetch(url)?;
    decode_image(&bytes).with_context(|| format!("unreadable artwork at {url}"))
}

/// SVG markup of the built-in border ring for a node type.
pub fn default_border_svg(node_type: NodeType) -> String {
    let (stroke, width) = match node_type {
        NodeType::Small => ("#8a7b5a", 8),
        NodeType::Large => ("#b89a5c", 7),
        NodeType::Master => ("#e0c06a", 6),
    };
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="128" height="128" viewBox="0 0 128 128"><circle cx="64" cy="64" r="{r}" fill="none" stroke="{stroke}" stroke-width="{width}"/><circle cx="64" cy="64" r="{inner}" fill="none" stroke="#202020" stroke-width="2"/></svg>"##,
        r = 64 - width / 2 - 1,
        inner = 64 - width - 2,
    )
}

/// Rasterizes the built-in border ring for a node type.
pub fn default_border(node_type: NodeType) -> Result<Pixmap> {
    rasterize_svg(default_border_svg(node_type).as_bytes())
}
