//! Shared application-wide constants.
//! Centralizes tweakable values used by the store, snapping, packing and export.

// Node dimensions
/// Render radius of a small node in world units.
pub const NODE_RADIUS_SMALL: f64 = 20.0;
/// Render radius of a large node in world units.
pub const NODE_RADIUS_LARGE: f64 = 30.0;
/// Render radius of a master node in world units.
pub const NODE_RADIUS_MASTER: f64 = 40.0;

// Connections
/// Lowest accepted connection curvature.
pub const CONNECTION_MIN_CURVATURE: f64 = -300.0;
/// Highest accepted connection curvature.
pub const CONNECTION_MAX_CURVATURE: f64 = 300.0;

// Background images
/// Width of a freshly placed background image.
pub const IMAGE_DEFAULT_WIDTH: f64 = 200.0;
/// Height of a freshly placed background image.
pub const IMAGE_DEFAULT_HEIGHT: f64 = 200.0;

// Orbits
/// Smallest orbit radius.
pub const ORBIT_MIN_RADIUS: f64 = 50.0;
/// Largest orbit radius.
pub const ORBIT_MAX_RADIUS: f64 = 500.0;
/// Radius of a freshly placed orbit.
pub const ORBIT_DEFAULT_RADIUS: f64 = 150.0;
/// Fewest ring points an orbit may carry.
pub const ORBIT_MIN_POINTS: u32 = 3;
/// Most ring points an orbit may carry.
pub const ORBIT_MAX_POINTS: u32 = 18;
/// Ring points of a freshly placed orbit.
pub const ORBIT_DEFAULT_POINTS: u32 = 8;
/// Distance (world units) within which a dragged node snaps onto an orbit point.
pub const ORBIT_SNAP_THRESHOLD: f64 = 30.0;

// Grid / web overlay
/// Default grid cell size in world units.
pub const GRID_DEFAULT_SIZE: f64 = 100.0;
/// Default outer radius of the web overlay.
pub const WEB_DEFAULT_SIZE: f64 = 5000.0;
/// Default spoke count of the web overlay.
pub const WEB_DEFAULT_SPOKES: u32 = 12;
/// Default inner (empty) radius of the web overlay.
pub const WEB_DEFAULT_INNER_RADIUS: f64 = 500.0;
/// Default number of rings between the inner and outer web circles.
pub const WEB_DEFAULT_CONCENTRIC_CIRCLES: u32 = 8;

// Spatial index
/// Cell side length of the hit-test grid.
pub const SPATIAL_CELL_SIZE: f64 = 100.0;

// Texture atlas
/// Border sprites are drawn this much larger than the node diameter.
pub const ATLAS_BORDER_SCALE: f64 = 1.15;
/// Gap between packed sprites.
pub const ATLAS_PADDING: f64 = 4.0;
/// Widest atlas sheet before rows wrap.
pub const ATLAS_MAX_WIDTH: f64 = 2048.0;
/// Resolution multiplier applied to exported atlases.
pub const ATLAS_SCALE_FACTOR: f64 = 2.0;
/// Share of the node radius covered by the circular icon.
pub const NODE_ICON_SIZE_PERCENT: f64 = 0.85;

// Export
/// Padding added around the exported bounding box.
pub const EXPORT_BOUNDS_PADDING: f64 = 50.0;

// Undo/redo
/// Maximum number of undo history entries to retain.
pub const MAX_UNDO_HISTORY: usize = 100;

// Persistence
/// Quiet period after the last mutation before the snapshot is written.
pub const PERSIST_DEBOUNCE_MS: u64 = 300;
