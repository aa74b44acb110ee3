//! Texture atlas packing for node sprites.
//!
//! Sprites are grouped by node type, since the type fixes a square footprint,
//! and each group is shelf-packed into its own horizontal band, largest
//! footprint first. Rendering draws the optional icon clipped to a circle and
//! then the border ring stretched over the whole cell.

use crate::constants;
use crate::images;
use crate::types::NodeType;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pattern, Pixmap, PixmapPaint, SpreadMode,
    Transform,
};

/// Tunables of the packer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasOptions {
    /// Gap between sprites and around the sheet, before scaling
    pub padding: f64,
    /// Widest sheet before rows wrap, before scaling
    pub max_width: f64,
    /// Resolution multiplier applied to every footprint, padding and width
    pub scale_factor: f64,
    /// Share of the node radius covered by the circular icon
    pub icon_size_percent: f64,
}

impl Default for AtlasOptions {
    fn default() -> Self {
        Self {
            padding: constants::ATLAS_PADDING,
            max_width: constants::ATLAS_MAX_WIDTH,
            scale_factor: constants::ATLAS_SCALE_FACTOR,
            icon_size_percent: constants::NODE_ICON_SIZE_PERCENT,
        }
    }
}

/// Where a sprite lives inside the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtlasRect {
    /// Left edge in sheet pixels
    pub x: f64,
    /// Top edge in sheet pixels
    pub y: f64,
    /// Width in sheet pixels
    pub width: f64,
    /// Height in sheet pixels
    pub height: f64,
}

/// Result of the layout pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtlasLayout {
    /// Sprite id to sheet rectangle
    pub rects: HashMap<String, AtlasRect>,
    /// Sheet width
    pub width: f64,
    /// Sheet height
    pub height: f64,
}

/// Unscaled square footprint of a node type: its diameter grown by the border scale.
pub fn node_atlas_size(node_type: NodeType) -> f64 {
    (node_type.radius() * 2.0 * constants::ATLAS_BORDER_SCALE).ceil()
}

/// Computes sprite rectangles without drawing anything.
///
/// Groups are laid out largest footprint first; inside a group sprites keep
/// their input order. A row wraps when the next sprite would cross
/// `max_width`, and every group closes its last row before the next begins.
pub fn pack_layout<'a>(
    sprites: impl IntoIterator<Item = (&'a str, NodeType)>,
    options: &AtlasOptions,
) -> AtlasLayout {
    let mut groups: HashMap<NodeType, Vec<&str>> = HashMap::new();
    for (id, node_type) in sprites {
        groups.entry(node_type).or_default().push(id);
    }

    let mut order: Vec<NodeType> = NodeType::ALL
        .into_iter()
        .filter(|t| groups.contains_key(t))
        .collect();
    order.sort_by(|a, b| node_atlas_size(*b).total_cmp(&node_atlas_size(*a)));

    let padding = options.padding * options.scale_factor;
    let max_width = options.max_width * options.scale_factor;

    let mut rects = HashMap::new();
    let mut y = padding;
    let mut used_width: f64 = 0.0;

    for node_type in order {
        let size = node_atlas_size(node_type) * options.scale_factor;
        let mut x = padding;

        for id in groups.get(&node_type).into_iter().flatten() {
            if x + size > max_width && x > padding {
                x = padding;
                y += size + padding;
            }
            rects.insert(
                (*id).to_string(),
                AtlasRect {
                    x,
                    y,
                    width: size,
                    height: size,
                },
            );
            x += size + padding;
            used_width = used_width.max(x);
        }

        y += size + padding;
    }

    if rects.is_empty() {
        return AtlasLayout::default();
    }
    AtlasLayout {
        rects,
        width: used_width.min(max_width),
        height: y,
    }
}

/// One node to place on the sheet.
#[derive(Debug, Clone)]
pub struct AtlasSprite {
    /// Node id the rectangle is reported under
    pub id: String,
    /// Size class
    pub node_type: NodeType,
    /// Decoded icon; `None` draws only the border
    pub icon: Option<Pixmap>,
}

/// Border artwork for every node type.
#[derive(Debug, Clone)]
pub struct BorderSet {
    borders: HashMap<NodeType, Pixmap>,
}

impl BorderSet {
    /// Rasterizes the built-in border rings.
    pub fn builtin() -> Result<Self> {
        let mut borders = HashMap::new();
        for node_type in NodeType::ALL {
            borders.insert(node_type, images::default_border(node_type)?);
        }
        Ok(Self { borders })
    }

    /// Replaces the border used for one node type.
    pub fn set(&mut self, node_type: NodeType, border: Pixmap) {
        self.borders.insert(node_type, border);
    }

    /// Border for a node type.
    pub fn get(&self, node_type: NodeType) -> Option<&Pixmap> {
        self.borders.get(&node_type)
    }
}

/// A rendered sheet plus the sprite lookup.
#[derive(Debug, Clone)]
pub struct TextureAtlas {
    /// Composited sheet
    pub pixmap: Pixmap,
    /// Sprite rectangles and sheet dimensions
    pub layout: AtlasLayout,
}

impl TextureAtlas {
    /// Encodes the sheet as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        self.pixmap
            .encode_png()
            .map_err(|e| anyhow!("failed to encode atlas PNG: {e}"))
    }
}

/// Lays out and draws every sprite into one sheet.
///
/// An empty sprite list yields a 1x1 transparent sheet with no rectangles.
pub fn pack_texture_atlas(
    sprites: &[AtlasSprite],
    borders: &BorderSet,
    options: &AtlasOptions,
) -> Result<TextureAtlas> {
    let layout = pack_layout(
        sprites.iter().map(|s| (s.id.as_str(), s.node_type)),
        options,
    );

    let width = layout.width.ceil().max(1.0) as u32;
    let height = layout.height.ceil().max(1.0) as u32;
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate {width}x{height} atlas"))?;

    for sprite in sprites {
        let Some(rect) = layout.rects.get(&sprite.id) else {
            continue;
        };
        let radius = sprite.node_type.radius() * options.scale_factor;
        let center_x = (rect.x + rect.width / 2.0) as f32;
        let center_y = (rect.y + rect.height / 2.0) as f32;

        if let Some(icon) = &sprite.icon {
            let icon_radius = (radius * options.icon_size_percent) as f32;
            draw_circular_icon(&mut pixmap, icon, center_x, center_y, icon_radius);
        }

        let border = borders
            .get(sprite.node_type)
            .ok_or_else(|| anyhow!("no border artwork for {:?}", sprite.node_type))?;
        let transform = Transform::from_row(
            rect.width as f32 / border.width() as f32,
            0.0,
            0.0,
            rect.height as f32 / border.height() as f32,
            rect.x as f32,
            rect.y as f32,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(0, 0, border.as_ref(), &paint, transform, None);
    }

    Ok(TextureAtlas { pixmap, layout })
}

fn draw_circular_icon(target: &mut Pixmap, icon: &Pixmap, cx: f32, cy: f32, radius: f32) {
    let Some(circle) = PathBuilder::from_circle(cx, cy, radius) else {
        return;
    };
    let diameter = radius * 2.0;
    let pattern_transform = Transform::from_row(
        diameter / icon.width() as f32,
        0.0,
        0.0,
        diameter / icon.height() as f32,
        cx - radius,
        cy - radius,
    );
    let paint = Paint {
        shader: Pattern::new(
            icon.as_ref(),
            SpreadMode::Pad,
            FilterQuality::Bicubic,
            1.0,
            pattern_transform,
        ),
        anti_alias: true,
        ..Paint::default()
    };
    target.fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);
}
