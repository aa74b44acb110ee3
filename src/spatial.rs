//! Uniform grid spatial index for point-in-node hit testing.
//!
//! Every node is registered in each cell its bounding circle overlaps, so a
//! query only looks at the one cell containing the query point. The index is
//! built once per layout and rebuilt wholesale when the node set changes.

use crate::constants;
use std::collections::HashMap;

/// A node reduced to what hit testing needs.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeWithRadius {
    /// Node id
    pub id: String,
    /// Center x
    pub x: f64,
    /// Center y
    pub y: f64,
    /// Hit radius
    pub radius: f64,
}

/// Grid of square cells mapping to the nodes that overlap them.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    grid: HashMap<(i64, i64), Vec<usize>>,
    nodes: Vec<NodeWithRadius>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(constants::SPATIAL_CELL_SIZE)
    }
}

impl SpatialIndex {
    /// Creates an empty index with the given cell side length.
    ///
    /// Non-positive sizes fall back to the default cell size.
    pub fn new(cell_size: f64) -> Self {
        let cell_size = if cell_size > 0.0 {
            cell_size
        } else {
            constants::SPATIAL_CELL_SIZE
        };
        Self {
            cell_size,
            grid: HashMap::new(),
            nodes: Vec::new(),
        }
    }

    /// Builds an index from a list of nodes, preserving their order.
    pub fn build(cell_size: f64, nodes: impl IntoIterator<Item = NodeWithRadius>) -> Self {
        let mut index = Self::new(cell_size);
        for node in nodes {
            index.add_node(node);
        }
        index
    }

    fn cell_of(&self, value: f64) -> i64 {
        (value / self.cell_size).floor() as i64
    }

    /// Registers a node in every cell its bounding circle overlaps.
    pub fn add_node(&mut self, node: NodeWithRadius) {
        let slot = self.nodes.len();
        let min_x = self.cell_of(node.x - node.radius);
        let max_x = self.cell_of(node.x + node.radius);
        let min_y = self.cell_of(node.y - node.radius);
        let max_y = self.cell_of(node.y + node.radius);

        for cell_x in min_x..=max_x {
            for cell_y in min_y..=max_y {
                self.grid.entry((cell_x, cell_y)).or_default().push(slot);
            }
        }
        self.nodes.push(node);
    }

    /// Returns the first node, in insertion order, whose circle contains `(x, y)`.
    pub fn find_node_at(&self, x: f64, y: f64) -> Option<&NodeWithRadius> {
        let cell = self.grid.get(&(self.cell_of(x), self.cell_of(y)))?;
        cell.iter().map(|&slot| &self.nodes[slot]).find(|node| {
            let dx = x - node.x;
            let dy = y - node.y;
            dx * dx + dy * dy <= node.radius * node.radius
        })
    }

    /// Every indexed node, in insertion order.
    pub fn nodes(&self) -> &[NodeWithRadius] {
        &self.nodes
    }

    /// Cell side length.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no nodes are indexed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
