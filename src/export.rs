//! Export pipeline: validation, bounds, the game data document and the
//! bundle of files the game runtime consumes.
//!
//! The bundle consists of:
//! - `game-data.json`: nodes keyed by perk id with coordinates relative to the
//!   exported bounds and their sprite rectangle in the atlas
//! - `node-icons.png`: the packed node sprite sheet
//! - `background-{n}.png`: each background image rasterized at its size
//! - `editor-data.json`: a snapshot that can be imported back into the editor

use crate::atlas::{pack_texture_atlas, AtlasOptions, AtlasRect, AtlasSprite, BorderSet};
use crate::constants;
use crate::images::{self, ImageSource};
use crate::perks::PerkCatalog;
use crate::types::*;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, Transform};

/// File name of the game data document inside a bundle.
pub const GAME_DATA_FILE: &str = "game-data.json";
/// File name of the sprite sheet inside a bundle.
pub const ATLAS_FILE: &str = "node-icons.png";
/// File name of the editor snapshot inside a bundle.
pub const EDITOR_DATA_FILE: &str = "editor-data.json";

/// Problems that block an export. Each entry is one readable message.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(pub Vec<String>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "export blocked by {} problem(s)", self.0.len())?;
        for message in &self.0 {
            write!(f, "\n  - {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// First characters of an id, enough to recognise it in a message.
fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn node_label(id: &str, node: &Node) -> String {
    let title = if node.title.is_empty() {
        "untitled"
    } else {
        node.title.as_str()
    };
    format!("[{title}] ({})", short_id(id))
}

fn sorted<V>(map: &HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Checks that a document can be exported for the game.
///
/// Reports nodes without a perk, with a perk missing from `catalog`, or
/// without a title; perks bound to more than one node; and images without
/// a url. An empty result means the export may proceed.
pub fn validate_for_export(doc: &EditorDocument, catalog: &PerkCatalog) -> Vec<String> {
    let mut errors = Vec::new();
    let nodes = sorted(&doc.nodes);

    for (id, node) in &nodes {
        let mut problems = Vec::new();
        if node.perk_id.is_empty() {
            problems.push("no perk selected".to_string());
        } else if !catalog.contains(&node.perk_id) {
            problems.push(format!("perk \"{}\" does not exist", node.perk_id));
        }
        if node.title.is_empty() {
            problems.push("no title".to_string());
        }
        if !problems.is_empty() {
            errors.push(format!("Node {}: {}", node_label(id, node), problems.join(", ")));
        }
    }

    let mut by_perk: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (id, node) in &nodes {
        if !node.perk_id.is_empty() {
            by_perk.entry(node.perk_id.as_str()).or_default().push(id.as_str());
        }
    }
    for (perk_id, ids) in by_perk {
        if ids.len() > 1 {
            let labels: Vec<String> = ids
                .iter()
                .map(|id| node_label(id, &doc.nodes[*id]))
                .collect();
            errors.push(format!(
                "Perk \"{perk_id}\" is used by several nodes: {}",
                labels.join(", ")
            ));
        }
    }

    for (id, image) in sorted(&doc.images) {
        if image.image_url.is_empty() {
            errors.push(format!("Image {}: no image url", short_id(id)));
        }
    }

    errors
}

/// Checks a document about to be imported against the current perk catalog.
///
/// Returns one message per node bound to a perk the catalog does not know.
pub fn validate_import(doc: &EditorDocument, catalog: &PerkCatalog) -> Vec<String> {
    sorted(&doc.nodes)
        .into_iter()
        .filter(|(_, node)| !node.perk_id.is_empty() && !catalog.contains(&node.perk_id))
        .map(|(id, node)| format!("Node {}: perk \"{}\" not found", short_id(id), node.perk_id))
        .collect()
}

/// World-space rectangle covered by an export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

/// Smallest rectangle holding every node circle and image rectangle, grown
/// by the export padding on each side.
///
/// An empty document yields a zero-sized box at the origin plus padding.
pub fn calculate_bounds(doc: &EditorDocument) -> Bounds {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for node in doc.nodes.values() {
        let radius = node.radius();
        min_x = min_x.min(node.x - radius);
        min_y = min_y.min(node.y - radius);
        max_x = max_x.max(node.x + radius);
        max_y = max_y.max(node.y + radius);
    }

    for image in doc.images.values() {
        min_x = min_x.min(image.x);
        min_y = min_y.min(image.y);
        max_x = max_x.max(image.x + image.width);
        max_y = max_y.max(image.y + image.height);
    }

    // Nothing to frame
    if !min_x.is_finite() || !min_y.is_finite() {
        min_x = 0.0;
        min_y = 0.0;
        max_x = 0.0;
        max_y = 0.0;
    }

    let padding = constants::EXPORT_BOUNDS_PADDING;
    Bounds {
        x: min_x - padding,
        y: min_y - padding,
        width: max_x - min_x + padding * 2.0,
        height: max_y - min_y + padding * 2.0,
    }
}

/// A node as the game reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNode {
    /// Size class
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Perk this node unlocks, same as its key in [`GameExport::nodes`]
    pub perk_id: String,
    /// Display title
    pub title: String,
    /// Display description
    pub description: String,
    /// Unlock requirement text
    pub req_description: String,
    /// Search keywords
    pub keywords: Vec<String>,
    /// Horizontal position relative to the bounds
    pub x: f64,
    /// Vertical position relative to the bounds
    pub y: f64,
    /// Sprite rectangle in `node-icons.png`
    pub texture: AtlasRect,
}

/// A background image placed in the game scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBackground {
    /// File name inside the bundle
    pub filename: String,
    /// Left edge relative to the bounds
    pub x: f64,
    /// Top edge relative to the bounds
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// Rotation in degrees, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

/// The game data document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameExport {
    /// Width of the exported bounds
    pub width: f64,
    /// Height of the exported bounds
    pub height: f64,
    /// Nodes keyed by perk id
    pub nodes: BTreeMap<String, ExportNode>,
    /// Connections keyed by connection id, endpoints given as perk ids
    pub connections: BTreeMap<ConnectionId, Connection>,
    /// Background images in drawing order
    #[serde(default)]
    pub background_images: Vec<ExportBackground>,
}

impl GameExport {
    /// Serialize to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Assembles the game data document.
///
/// Nodes without a sprite rectangle are left out. Connections whose endpoints
/// do not resolve to a bound perk are left out with a warning.
pub fn build_game_export(
    doc: &EditorDocument,
    bounds: &Bounds,
    atlas_rects: &HashMap<String, AtlasRect>,
    background_images: Vec<ExportBackground>,
) -> GameExport {
    let mut nodes = BTreeMap::new();
    for (id, node) in sorted(&doc.nodes) {
        let Some(texture) = atlas_rects.get(id) else {
            log::warn!("No texture rect for node {id}; leaving it out");
            continue;
        };
        nodes.insert(
            node.perk_id.clone(),
            ExportNode {
                node_type: node.node_type,
                perk_id: node.perk_id.clone(),
                title: node.title.clone(),
                description: node.description.clone(),
                req_description: node.requirement_description.clone(),
                keywords: node.keywords.clone(),
                x: node.x - bounds.x,
                y: node.y - bounds.y,
                texture: *texture,
            },
        );
    }

    let perk_of = |node_id: &str| {
        doc.nodes
            .get(node_id)
            .map(|n| n.perk_id.as_str())
            .filter(|perk| !perk.is_empty())
    };
    let mut connections = BTreeMap::new();
    for (id, conn) in &doc.connections {
        match (perk_of(&conn.from_id), perk_of(&conn.to_id)) {
            (Some(from), Some(to)) => {
                connections.insert(
                    id.clone(),
                    Connection {
                        from_id: from.to_owned(),
                        to_id: to.to_owned(),
                        curvature: conn.curvature,
                    },
                );
            }
            _ => log::warn!("Connection {id} references invalid node ids; skipping"),
        }
    }

    GameExport {
        width: bounds.width,
        height: bounds.height,
        nodes,
        connections,
        background_images,
    }
}

/// Settings of a bundle export.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Atlas packing options
    pub atlas: AtlasOptions,
    /// Border artwork; the built-in rings when `None`
    pub borders: Option<BorderSet>,
}

/// Everything a game export produces, held in memory.
#[derive(Debug, Clone)]
pub struct GameBundle {
    /// The game data document
    pub game: GameExport,
    /// PNG bytes of the sprite sheet
    pub atlas_png: Vec<u8>,
    /// File name and PNG bytes of each background image
    pub backgrounds: Vec<(String, Vec<u8>)>,
    /// Editor snapshot JSON
    pub editor_json: String,
}

impl GameBundle {
    /// Writes every file of the bundle into `dir`, creating it if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let game_json = self.game.to_json()?;
        write_file(&dir.join(GAME_DATA_FILE), game_json.as_bytes())?;
        write_file(&dir.join(ATLAS_FILE), &self.atlas_png)?;
        for (filename, png) in &self.backgrounds {
            write_file(&dir.join(filename), png)?;
        }
        write_file(&dir.join(EDITOR_DATA_FILE), self.editor_json.as_bytes())?;

        log::info!(
            "Wrote {} nodes, {} connections and {} backgrounds to {}",
            self.game.nodes.len(),
            self.game.connections.len(),
            self.backgrounds.len(),
            dir.display()
        );
        Ok(())
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

/// Runs the complete export.
///
/// Validation problems abort with [`ValidationErrors`] before any artwork is
/// loaded. Icons and backgrounds that fail to load are logged and skipped:
/// the node keeps its border-only sprite, the background is left out.
pub fn export_game_bundle(
    doc: &EditorDocument,
    catalog: &PerkCatalog,
    source: &dyn ImageSource,
    options: &ExportOptions,
) -> Result<GameBundle> {
    let errors = validate_for_export(doc, catalog);
    if !errors.is_empty() {
        return Err(ValidationErrors(errors).into());
    }

    let bounds = calculate_bounds(doc);

    let sprites: Vec<AtlasSprite> = sorted(&doc.nodes)
        .into_iter()
        .map(|(id, node)| AtlasSprite {
            id: id.clone(),
            node_type: node.node_type,
            icon: load_icon(source, id, node),
        })
        .collect();
    let borders = match &options.borders {
        Some(borders) => borders.clone(),
        None => BorderSet::builtin()?,
    };
    let atlas = pack_texture_atlas(&sprites, &borders, &options.atlas)?;
    let atlas_png = atlas.encode_png()?;

    let mut backgrounds = Vec::new();
    let mut placements = Vec::new();
    for (id, image) in sorted(&doc.images) {
        let png = match render_background(source, image) {
            Ok(png) => png,
            Err(e) => {
                log::warn!("Skipping background {id}: {e:#}");
                continue;
            }
        };
        let filename = format!("background-{}.png", backgrounds.len());
        placements.push(ExportBackground {
            filename: filename.clone(),
            x: image.x - bounds.x,
            y: image.y - bounds.y,
            width: image.width,
            height: image.height,
            rotation: image.rotation,
        });
        backgrounds.push((filename, png));
    }

    let game = build_game_export(doc, &bounds, &atlas.layout.rects, placements);
    let editor_json = doc.to_json().context("failed to serialize editor data")?;

    Ok(GameBundle {
        game,
        atlas_png,
        backgrounds,
        editor_json,
    })
}

fn load_icon(source: &dyn ImageSource, id: &str, node: &Node) -> Option<Pixmap> {
    if node.icon_url.is_empty() {
        return None;
    }
    match images::load_image(source, &node.icon_url) {
        Ok(icon) => Some(icon),
        Err(e) => {
            log::warn!("Icon of node {id} not loaded, drawing border only: {e:#}");
            None
        }
    }
}

/// Draws an image stretched to its placed size with its opacity, as PNG.
fn render_background(source: &dyn ImageSource, image: &BackgroundImage) -> Result<Vec<u8>> {
    let artwork = images::load_image(source, &image.image_url)?;
    let width = image.width.round().max(1.0) as u32;
    let height = image.height.round().max(1.0) as u32;
    let mut canvas = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate {width}x{height} background"))?;

    let paint = PixmapPaint {
        opacity: image.effective_opacity() as f32,
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    let transform = Transform::from_scale(
        width as f32 / artwork.width() as f32,
        height as f32 / artwork.height() as f32,
    );
    canvas.draw_pixmap(0, 0, artwork.as_ref(), &paint, transform, None);
    canvas
        .encode_png()
        .map_err(|e| anyhow!("failed to encode background PNG: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perks::GamePerk;
    use pretty_assertions::assert_eq;

    fn catalog(ids: &[&str]) -> PerkCatalog {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    GamePerk {
                        name: format!("Perk {id}"),
                        description: String::new(),
                    },
                )
            })
            .collect()
    }

    fn bound_node(perk: &str, title: &str, x: f64, y: f64) -> Node {
        Node {
            perk_id: perk.into(),
            title: title.into(),
            ..Node::new(x, y)
        }
    }

    #[test]
    fn test_validation_reports_each_problem() {
        let mut doc = EditorDocument::new();
        doc.nodes.insert("aaaaaaaaaaaa".into(), Node::new(0.0, 0.0));
        doc.nodes.insert("bbbbbbbbbbbb".into(), bound_node("ghost", "Ghost", 0.0, 0.0));
        doc.nodes.insert("cccccccccccc".into(), bound_node("p1", "One", 0.0, 0.0));
        doc.nodes.insert("dddddddddddd".into(), bound_node("p1", "", 0.0, 0.0));
        doc.images.insert("eeeeeeeeeeee".into(), BackgroundImage::new(0.0, 0.0));

        let errors = validate_for_export(&doc, &catalog(&["p1"]));

        assert_eq!(
            errors,
            vec![
                "Node [untitled] (aaaaaaaa): no perk selected, no title".to_string(),
                "Node [Ghost] (bbbbbbbb): perk \"ghost\" does not exist".to_string(),
                "Node [untitled] (dddddddd): no title".to_string(),
                "Perk \"p1\" is used by several nodes: [One] (cccccccc), [untitled] (dddddddd)"
                    .to_string(),
                "Image eeeeeeee: no image url".to_string(),
            ]
        );
    }

    #[test]
    fn test_valid_document_passes() {
        let mut doc = EditorDocument::new();
        doc.nodes.insert("a".into(), bound_node("p1", "One", 0.0, 0.0));
        doc.nodes.insert("b".into(), bound_node("p2", "Two", 0.0, 0.0));

        assert!(validate_for_export(&doc, &catalog(&["p1", "p2"])).is_empty());
    }

    #[test]
    fn test_import_validation_flags_unknown_perks_only() {
        let mut doc = EditorDocument::new();
        doc.nodes.insert("a".into(), bound_node("known", "", 0.0, 0.0));
        doc.nodes.insert("b".into(), bound_node("stale", "", 0.0, 0.0));
        doc.nodes.insert("c".into(), Node::new(0.0, 0.0));

        assert_eq!(
            validate_import(&doc, &catalog(&["known"])),
            vec!["Node b: perk \"stale\" not found".to_string()]
        );
    }

    #[test]
    fn test_bounds_cover_nodes_and_images() {
        let mut doc = EditorDocument::new();
        doc.nodes.insert(
            "m".into(),
            Node {
                node_type: NodeType::Master,
                ..Node::new(0.0, 0.0)
            },
        );
        doc.images.insert(
            "i".into(),
            BackgroundImage {
                width: 100.0,
                height: 50.0,
                ..BackgroundImage::new(100.0, 100.0)
            },
        );

        let bounds = calculate_bounds(&doc);

        assert_eq!(
            bounds,
            Bounds {
                x: -90.0,
                y: -90.0,
                width: 340.0,
                height: 290.0,
            }
        );
    }

    #[test]
    fn test_empty_document_bounds_are_padding_only() {
        assert_eq!(
            calculate_bounds(&EditorDocument::new()),
            Bounds {
                x: -50.0,
                y: -50.0,
                width: 100.0,
                height: 100.0,
            }
        );
    }

    #[test]
    fn test_game_export_rekeys_by_perk() {
        let mut doc = EditorDocument::new();
        doc.nodes.insert("n1".into(), bound_node("p1", "One", 0.0, 0.0));
        doc.nodes.insert("n2".into(), bound_node("p2", "Two", 100.0, 0.0));
        doc.nodes.insert("n3".into(), Node::new(50.0, 50.0));
        doc.connections.insert(
            "c1".into(),
            Connection {
                curvature: 25.0,
                ..Connection::new("n1", "n2")
            },
        );
        doc.connections.insert("c2".into(), Connection::new("n1", "n3"));
        doc.connections.insert("c3".into(), Connection::new("n2", "gone"));
        let rect = AtlasRect {
            x: 8.0,
            y: 8.0,
            width: 92.0,
            height: 92.0,
        };
        let rects: HashMap<String, AtlasRect> =
            [("n1".to_string(), rect), ("n2".to_string(), rect)].into_iter().collect();
        let bounds = calculate_bounds(&doc);

        let game = build_game_export(&doc, &bounds, &rects, Vec::new());

        assert_eq!(game.nodes.keys().collect::<Vec<_>>(), vec!["p1", "p2"]);
        assert_eq!(game.nodes["p1"].x, 70.0);
        assert_eq!(game.nodes["p2"].y, 70.0);
        assert_eq!(game.nodes["p2"].perk_id, "p2");
        let value: serde_json::Value = serde_json::from_str(&game.to_json().unwrap()).unwrap();
        assert_eq!(value["nodes"]["p1"]["perkId"], "p1");
        assert_eq!(game.connections.len(), 1);
        assert_eq!(game.connections["c1"], Connection {
            from_id: "p1".into(),
            to_id: "p2".into(),
            curvature: 25.0,
        });
        assert_eq!(game.width, bounds.width);
    }

    #[test]
    fn test_game_export_json_shape() {
        let game = GameExport {
            width: 10.0,
            height: 20.0,
            nodes: BTreeMap::new(),
            connections: BTreeMap::new(),
            background_images: vec![ExportBackground {
                filename: "background-0.png".into(),
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
                rotation: None,
            }],
        };

        let value: serde_json::Value = serde_json::from_str(&game.to_json().unwrap()).unwrap();

        assert_eq!(value["backgroundImages"][0]["filename"], "background-0.png");
        assert!(value["backgroundImages"][0].get("rotation").is_none());
        assert_eq!(GameExport::from_json(&game.to_json().unwrap()).unwrap(), game);
    }

    #[test]
    fn test_invalid_document_blocks_bundle() {
        struct NoImages;
        impl ImageSource for NoImages {
            fn fetch(&self, url: &str) -> Result<Vec<u8>> {
                Err(anyhow!("unexpected fetch of {url}"))
            }
        }
        let mut doc = EditorDocument::new();
        doc.nodes.insert("a".into(), Node::new(0.0, 0.0));

        let err = export_game_bundle(&doc, &PerkCatalog::default(), &NoImages, &ExportOptions::default())
            .unwrap_err();

        let validation = err.downcast_ref::<ValidationErrors>().unwrap();
        assert_eq!(validation.0.len(), 1);
        assert!(err.to_string().contains("1 problem"));
    }
}
