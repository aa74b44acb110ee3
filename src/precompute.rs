//! Read-only tree viewer data.
//!
//! The viewer draws a finished tree with a handful of SVG paths instead of
//! one element per node. Everything it needs (radius per node, the merged
//! connection path, the merged circle path and a hit-test index) is derived
//! once from the tree document.

use crate::constants;
use crate::export::GameExport;
use crate::spatial::{NodeWithRadius, SpatialIndex};
use crate::types::NodeType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

/// A node as the viewer reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Raw size class; values the editor does not produce fall back to the small radius
    #[serde(rename = "type")]
    pub node_type: u8,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Display description
    #[serde(default)]
    pub description: String,
    /// Character level needed to unlock
    #[serde(default)]
    pub required_level: u32,
    /// Identifier of the perk in the game
    #[serde(default)]
    pub game_id: String,
    /// Search keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Horizontal center
    pub x: f64,
    /// Vertical center
    pub y: f64,
    /// Ids of neighbouring nodes
    #[serde(default)]
    pub connections: Vec<String>,
}

impl TreeNode {
    /// Render radius of the node.
    pub fn radius(&self) -> f64 {
        NodeType::try_from(self.node_type)
            .map(NodeType::radius)
            .unwrap_or(constants::NODE_RADIUS_SMALL)
    }
}

/// The viewer's tree document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeDocument {
    /// Width of the drawing
    pub width: f64,
    /// Height of the drawing
    pub height: f64,
    /// Nodes keyed by id
    pub nodes: BTreeMap<String, TreeNode>,
}

impl TreeDocument {
    /// Deserialize a tree from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Builds the viewer document from a game export.
    ///
    /// Nodes keep their perk id as id. Every connection is listed on both
    /// endpoints.
    pub fn from_game_export(game: &GameExport) -> Self {
        let mut nodes: BTreeMap<String, TreeNode> = game
            .nodes
            .iter()
            .map(|(perk_id, node)| {
                (
                    perk_id.clone(),
                    TreeNode {
                        node_type: node.node_type.into(),
                        title: node.title.clone(),
                        description: node.description.clone(),
                        required_level: 0,
                        game_id: perk_id.clone(),
                        keywords: node.keywords.clone(),
                        x: node.x,
                        y: node.y,
                        connections: Vec::new(),
                    },
                )
            })
            .collect();

        for conn in game.connections.values() {
            for (from, to) in [(&conn.from_id, &conn.to_id), (&conn.to_id, &conn.from_id)] {
                if let Some(node) = nodes.get_mut(from) {
                    if !node.connections.contains(to) {
                        node.connections.push(to.clone());
                    }
                }
            }
        }

        Self {
            width: game.width,
            height: game.height,
            nodes,
        }
    }
}

/// Everything the viewer derives from a tree.
#[derive(Debug, Clone)]
pub struct PrecomputedTree {
    /// One `M x,y L x,y` segment per connected pair
    pub lines_path: String,
    /// Two arcs per node forming its circle
    pub circles_path: String,
    /// Hit-test index over the nodes
    pub spatial_index: SpatialIndex,
    /// Nodes with their radius, in id order
    pub nodes_with_radius: Vec<NodeWithRadius>,
}

impl PrecomputedTree {
    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&NodeWithRadius> {
        self.nodes_with_radius.iter().find(|n| n.id == id)
    }
}

/// Derives the viewer data from a tree.
pub fn precompute_tree_data(tree: &TreeDocument) -> PrecomputedTree {
    let nodes_with_radius: Vec<NodeWithRadius> = tree
        .nodes
        .iter()
        .map(|(id, node)| NodeWithRadius {
            id: id.clone(),
            x: node.x,
            y: node.y,
            radius: node.radius(),
        })
        .collect();

    let lines_path = lines_path(tree);
    let circles_path = circles_path(&nodes_with_radius);
    let spatial_index =
        SpatialIndex::build(constants::SPATIAL_CELL_SIZE, nodes_with_radius.iter().cloned());

    PrecomputedTree {
        lines_path,
        circles_path,
        spatial_index,
        nodes_with_radius,
    }
}

/// Key identifying an undirected pair regardless of direction.
fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}-{b}")
    } else {
        format!("{b}-{a}")
    }
}

fn lines_path(tree: &TreeDocument) -> String {
    let mut path = String::new();
    let mut seen = HashSet::new();

    for (id, node) in &tree.nodes {
        for other_id in &node.connections {
            let key = pair_key(id, other_id);
            if seen.contains(&key) {
                continue;
            }
            let Some(other) = tree.nodes.get(other_id) else {
                continue;
            };
            let _ = write!(path, "M{},{}L{},{}", node.x, node.y, other.x, other.y);
            seen.insert(key);
        }
    }
    path
}

fn circles_path(nodes: &[NodeWithRadius]) -> String {
    let mut path = String::new();
    for node in nodes {
        let r = node.radius;
        let _ = write!(
            path,
            "M{},{}a{r},{r} 0 1,0 {},0a{r},{r} 0 1,0 -{},0",
            node.x - r,
            node.y,
            r * 2.0,
            r * 2.0
        );
    }
    path
}

/// Viewer state: the tree, its derived data once initialized, and the
/// hovered and selected nodes.
#[derive(Debug, Clone, Default)]
pub struct TreeViewer {
    tree: TreeDocument,
    precomputed: Option<PrecomputedTree>,
    hovered: Option<String>,
    selected: Option<String>,
}

impl TreeViewer {
    /// Creates a viewer for `tree`. Nothing is derived until
    /// [`TreeViewer::initialize_precomputed`] runs.
    pub fn new(tree: TreeDocument) -> Self {
        Self {
            tree,
            ..Self::default()
        }
    }

    /// The tree being viewed.
    pub fn tree(&self) -> &TreeDocument {
        &self.tree
    }

    /// Derives the viewer data. Later calls do nothing.
    pub fn initialize_precomputed(&mut self) {
        if self.precomputed.is_some() {
            return;
        }
        self.precomputed = Some(precompute_tree_data(&self.tree));
        log::debug!("Precomputed viewer data for {} nodes", self.tree.nodes.len());
    }

    /// Derived data, once initialized.
    pub fn precomputed(&self) -> Option<&PrecomputedTree> {
        self.precomputed.as_ref()
    }

    /// Updates the hovered node for a pointer at tree coordinates `(x, y)`.
    ///
    /// Returns true if the hovered node changed.
    pub fn hover_at(&mut self, x: f64, y: f64) -> bool {
        let Some(precomputed) = &self.precomputed else {
            return false;
        };
        let found = precomputed
            .spatial_index
            .find_node_at(x, y)
            .map(|n| n.id.clone());
        if found == self.hovered {
            return false;
        }
        self.hovered = found;
        true
    }

    /// Clears the hover, e.g. when the pointer leaves the drawing.
    pub fn clear_hover(&mut self) {
        self.hovered = None;
    }

    /// The hovered node id.
    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    /// Selects the node under `(x, y)`. Clicking empty space keeps the selection.
    pub fn select_at(&mut self, x: f64, y: f64) -> Option<&str> {
        let found = self
            .precomputed
            .as_ref()
            .and_then(|p| p.spatial_index.find_node_at(x, y))
            .map(|n| n.id.clone());
        if let Some(id) = found {
            log::debug!("Selected node {id}");
            self.selected = Some(id);
        }
        self.selected.as_deref()
    }

    /// The selected node id.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Maps a pointer position on a drawing shown at `display_size` to tree coordinates.
    pub fn to_tree_coords(&self, client: (f64, f64), display_size: (f64, f64)) -> (f64, f64) {
        let (w, h) = display_size;
        if w <= 0.0 || h <= 0.0 {
            return client;
        }
        (client.0 / w * self.tree.width, client.1 / h * self.tree.height)
    }

    /// Renders the tree as a standalone SVG, with the atlas image laid over
    /// the whole drawing when `atlas_href` is given.
    ///
    /// Returns `None` before initialization.
    pub fn render_svg(&self, atlas_href: Option<&str>) -> Option<String> {
        let p = self.precomputed.as_ref()?;
        let (w, h) = (self.tree.width, self.tree.height);

        let mut out = String::new();
        let _ = write!(
            out,
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##
        );
        let _ = write!(out, r##"<rect width="{w}" height="{h}" fill="#080B10"/>"##);
        let _ = write!(
            out,
            r##"<path d="{}" stroke="#404040" stroke-width="6" fill="none"/>"##,
            p.lines_path
        );
        let _ = write!(
            out,
            r##"<path d="{}" stroke="#404040" stroke-width="8" fill="none"/>"##,
            p.circles_path
        );
        if let Some(href) = atlas_href {
            let _ = write!(
                out,
                r#"<image href="{}" width="{w}" height="{h}"/>"#,
                escape_xml(href)
            );
        }
        let _ = write!(
            out,
            r##"<path d="{}" fill="#080B10" opacity="0.7"/>"##,
            p.circles_path
        );

        let highlights = [(self.hovered(), "#4A9EFF", 3), (self.selected(), "#FFD700", 4)];
        for (id, color, width) in highlights {
            if let Some(node) = id.and_then(|id| p.node(id)) {
                let _ = write!(
                    out,
                    r#"<circle cx="{}" cy="{}" r="{}" fill="none" stroke="{color}" stroke-width="{width}"/>"#,
                    node.x, node.y, node.radius
                );
            }
        }
        for (id, node) in &self.tree.nodes {
            let _ = write!(
                out,
                r#"<title id="{}">{}</title>"#,
                escape_xml(id),
                escape_xml(&node.title)
            );
        }
        out.push_str("</svg>");
        Some(out)
    }
}

fn escape_xml(input: &str) -> String {
    let mut s = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => s.push_str("&amp;"),
            '<' => s.push_str("&lt;"),
            '>' => s.push_str("&gt;"),
            '"' => s.push_str("&quot;"),
            '\'' => s.push_str("&apos;"),
            _ => s.push(ch),
        }
    }
    s
}
