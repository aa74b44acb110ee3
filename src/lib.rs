//! # Skill Tree Editor
//!
//! Headless engine of a node-graph skill tree editor. Nodes come in three
//! sizes and are joined by curved connections; background images and radial
//! orbit guides help compose the tree, which is finally exported for the
//! game together with a packed sprite sheet of node icons.
//!
//! ## Features
//! - Editable document with single and multi-selection
//! - Bounded undo/redo log covering every mutation
//! - Grid, rotated-grid and orbit snapping
//! - Uniform-grid hit testing
//! - Shelf-packed texture atlas rendered with tiny-skia
//! - Debounced snapshot persistence
//! - Game export bundle and a read-only viewer precomputation

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod atlas;
pub mod config;
pub mod constants;
pub mod editor;
pub mod export;
pub mod geometry;
pub mod ids;
pub mod images;
pub mod perks;
pub mod precompute;
pub mod spatial;
mod types;

// Re-export public types and functions
pub use config::{load_config, EditorConfig};
pub use editor::{EditorStore, ElementKind, ElementRef, ElementUpdate, Selection};
pub use export::{export_game_bundle, ExportOptions, GameBundle, GameExport, ValidationErrors};
pub use perks::{GamePerk, PerkCatalog};
pub use precompute::{precompute_tree_data, TreeDocument, TreeViewer};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_default() {
        let doc = EditorDocument::default();
        assert!(doc.nodes.is_empty());
        assert!(doc.connections.is_empty());
        assert_eq!(doc.viewport.scale, 1.0);
        assert!(!doc.grid_settings.enabled);
    }

    #[test]
    fn test_store_starts_empty() {
        let store = EditorStore::in_memory();
        assert!(store.document().nodes.is_empty());
        assert!(!store.can_undo());
        assert!(store.selection().is_empty());
    }
}
