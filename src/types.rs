//! Core data types and structures for the skill tree editor.
//!
//! This module defines the document model shared by the store, the geometry
//! helpers and the export pipeline: nodes, connections, background images,
//! orbit guides, overlay settings and the persisted document itself.

use crate::constants;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for skill nodes.
pub type NodeId = String;

/// Unique identifier for connections.
pub type ConnectionId = String;

/// Unique identifier for background images.
pub type ImageId = String;

/// Unique identifier for orbit guides.
pub type OrbitId = String;

/// A position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Creates a point from its coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Size class of a node. Determines the render radius and the atlas footprint.
///
/// Serialized as the integers `0`, `1` and `2`; any other value is rejected
/// when a document is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeType {
    /// Regular passive node
    #[default]
    Small,
    /// Notable node
    Large,
    /// Keystone node
    Master,
}

impl NodeType {
    /// Every node type, smallest first.
    pub const ALL: [NodeType; 3] = [NodeType::Small, NodeType::Large, NodeType::Master];

    /// Render radius in world units.
    pub fn radius(self) -> f64 {
        match self {
            NodeType::Small => constants::NODE_RADIUS_SMALL,
            NodeType::Large => constants::NODE_RADIUS_LARGE,
            NodeType::Master => constants::NODE_RADIUS_MASTER,
        }
    }
}

impl TryFrom<u8> for NodeType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeType::Small),
            1 => Ok(NodeType::Large),
            2 => Ok(NodeType::Master),
            other => Err(format!("unknown node type {other}, expected 0, 1 or 2")),
        }
    }
}

impl From<NodeType> for u8 {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Small => 0,
            NodeType::Large => 1,
            NodeType::Master => 2,
        }
    }
}

/// A placeable skill entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Size class of the node
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Key into the external perk catalog; unique across nodes on export
    #[serde(default)]
    pub perk_id: String,
    /// Location of the icon drawn inside the node
    #[serde(default)]
    pub icon_url: String,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Display description
    #[serde(default)]
    pub description: String,
    /// Human readable unlock requirement
    #[serde(default, rename = "reqDescription", alias = "requirementDescription")]
    pub requirement_description: String,
    /// Search keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Horizontal world position of the center
    pub x: f64,
    /// Vertical world position of the center
    pub y: f64,
}

impl Node {
    /// Creates a small node with empty fields at the given position.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            node_type: NodeType::Small,
            perk_id: String::new(),
            icon_url: String::new(),
            title: String::new(),
            description: String::new(),
            requirement_description: String::new(),
            keywords: Vec::new(),
            x,
            y,
        }
    }

    /// Center of the node.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Render radius derived from the node type.
    pub fn radius(&self) -> f64 {
        self.node_type.radius()
    }
}

/// An undirected edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// One endpoint
    pub from_id: NodeId,
    /// The other endpoint
    pub to_id: NodeId,
    /// Perpendicular control point offset of the quadratic curve; 0 is straight
    #[serde(default)]
    pub curvature: f64,
}

impl Connection {
    /// Creates a straight connection between two nodes.
    pub fn new(from_id: impl Into<NodeId>, to_id: impl Into<NodeId>) -> Self {
        Self {
            from_id: from_id.into(),
            to_id: to_id.into(),
            curvature: 0.0,
        }
    }

    /// True if this connection joins `a` and `b` in either direction.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.from_id == a && self.to_id == b) || (self.from_id == b && self.to_id == a)
    }

    /// True if either endpoint is `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.from_id == node_id || self.to_id == node_id
    }
}

/// A rectangle of artwork placed behind the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundImage {
    /// Left edge in world units
    pub x: f64,
    /// Top edge in world units
    pub y: f64,
    /// Width in world units
    pub width: f64,
    /// Height in world units
    pub height: f64,
    /// Location of the artwork
    #[serde(default)]
    pub image_url: String,
    /// Opacity in 0..=1; absent means fully opaque
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    /// Rotation in degrees about the rectangle center; absent means 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl BackgroundImage {
    /// Creates an empty image with the default size at the given position.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            width: constants::IMAGE_DEFAULT_WIDTH,
            height: constants::IMAGE_DEFAULT_HEIGHT,
            image_url: String::new(),
            opacity: None,
            rotation: None,
        }
    }

    /// Opacity with the default applied.
    pub fn effective_opacity(&self) -> f64 {
        self.opacity.unwrap_or(1.0).clamp(0.0, 1.0)
    }
}

/// A radial snapping guide: a center plus evenly spaced ring points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionOrbit {
    /// Horizontal center
    pub x: f64,
    /// Vertical center
    pub y: f64,
    /// Distance from the center to the ring points
    pub radius: f64,
    /// Number of ring points
    pub point_count: u32,
    /// Rotation of the first ring point in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl PositionOrbit {
    /// Creates an orbit with default radius and point count.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            radius: constants::ORBIT_DEFAULT_RADIUS,
            point_count: constants::ORBIT_DEFAULT_POINTS,
            rotation: None,
        }
    }
}

/// Camera transform of the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Horizontal stage offset
    pub x: f64,
    /// Vertical stage offset
    pub y: f64,
    /// Zoom factor
    pub scale: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

/// Snapping grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSettings {
    /// Whether dragging snaps to the grid
    pub enabled: bool,
    /// Cell size in world units
    pub size: f64,
    /// Grid rotation in degrees
    pub rotation: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            size: constants::GRID_DEFAULT_SIZE,
            rotation: 0.0,
        }
    }
}

/// Decorative radial "web" sketch overlay. Never used for snapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSettings {
    /// Whether the overlay is shown
    pub enabled: bool,
    /// Outer radius
    pub size: f64,
    /// Number of spokes
    pub spokes: u32,
    /// Rotation of the first spoke in degrees
    pub rotation: f64,
    /// Radius of the empty inner circle
    pub inner_radius: f64,
    /// Rings drawn between the inner and outer circles
    pub concentric_circles: u32,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            size: constants::WEB_DEFAULT_SIZE,
            spokes: constants::WEB_DEFAULT_SPOKES,
            rotation: 0.0,
            inner_radius: constants::WEB_DEFAULT_INNER_RADIUS,
            concentric_circles: constants::WEB_DEFAULT_CONCENTRIC_CIRCLES,
        }
    }
}

/// The persisted editor document. Also the import/export-for-editing format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorDocument {
    /// All nodes keyed by id
    pub nodes: HashMap<NodeId, Node>,
    /// All background images keyed by id
    #[serde(default)]
    pub images: HashMap<ImageId, BackgroundImage>,
    /// All orbit guides keyed by id
    #[serde(default)]
    pub orbits: HashMap<OrbitId, PositionOrbit>,
    /// All connections keyed by id
    #[serde(default)]
    pub connections: HashMap<ConnectionId, Connection>,
    /// Saved camera framing
    #[serde(default)]
    pub viewport: ViewportState,
    /// Snapping grid configuration
    #[serde(default)]
    pub grid_settings: GridSettings,
    /// Decorative web overlay configuration
    #[serde(default)]
    pub web_settings: WebSettings,
}

impl EditorDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the document to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Finds the connection joining `a` and `b` in either direction.
    pub fn connection_between(&self, a: &str, b: &str) -> Option<&ConnectionId> {
        self.connections
            .iter()
            .find(|(_, conn)| conn.joins(a, b))
            .map(|(id, _)| id)
    }
}

/// Generates a partial-update struct for an entity.
///
/// Every field of the patch is `Some` only when the update touches it. The
/// same shape stores undo pre-images: `capture` records the current values
/// of exactly the fields a patch is about to overwrite.
macro_rules! entity_patch {
    (
        $(#[$meta:meta])*
        $patch:ident for $entity:ty {
            $($(#[$fmeta:meta])* $field:ident: $ty:ty),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $patch {
            $($(#[$fmeta])* pub $field: Option<$ty>,)+
        }

        impl $patch {
            /// True when the patch touches no field.
            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())+
            }

            /// Writes every field present in the patch onto `target`.
            pub fn apply(&self, target: &mut $entity) {
                $(
                    if let Some(value) = &self.$field {
                        target.$field = value.clone();
                    }
                )+
            }

            /// Current values in `source` of exactly the fields this patch touches.
            pub fn capture(&self, source: &$entity) -> Self {
                Self {
                    $($field: self.$field.as_ref().map(|_| source.$field.clone()),)+
                }
            }
        }
    };
}

entity_patch! {
    /// Partial update of a [`Node`].
    NodePatch for Node {
        /// New size class
        node_type: NodeType,
        /// New perk binding
        perk_id: String,
        /// New icon location
        icon_url: String,
        /// New title
        title: String,
        /// New description
        description: String,
        /// New requirement text
        requirement_description: String,
        /// New keyword list
        keywords: Vec<String>,
        /// New horizontal position
        x: f64,
        /// New vertical position
        y: f64,
    }
}

entity_patch! {
    /// Partial update of a [`Connection`].
    ConnectionPatch for Connection {
        /// New first endpoint
        from_id: NodeId,
        /// New second endpoint
        to_id: NodeId,
        /// New curvature
        curvature: f64,
    }
}

entity_patch! {
    /// Partial update of a [`BackgroundImage`].
    ImagePatch for BackgroundImage {
        /// New left edge
        x: f64,
        /// New top edge
        y: f64,
        /// New width
        width: f64,
        /// New height
        height: f64,
        /// New artwork location
        image_url: String,
        /// New opacity; `Some(None)` resets to the default
        opacity: Option<f64>,
        /// New rotation; `Some(None)` resets to the default
        rotation: Option<f64>,
    }
}

entity_patch! {
    /// Partial update of a [`PositionOrbit`].
    OrbitPatch for PositionOrbit {
        /// New horizontal center
        x: f64,
        /// New vertical center
        y: f64,
        /// New ring radius
        radius: f64,
        /// New ring point count
        point_count: u32,
        /// New rotation; `Some(None)` resets to the default
        rotation: Option<f64>,
    }
}

impl NodePatch {
    /// Patch that moves a node.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}

impl ImagePatch {
    /// Patch that moves an image.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}

impl OrbitPatch {
    /// Patch that moves an orbit center.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }
}

impl ConnectionPatch {
    /// Patch that only changes the curvature.
    pub fn curvature(curvature: f64) -> Self {
        Self {
            curvature: Some(curvature),
            ..Self::default()
        }
    }
}
