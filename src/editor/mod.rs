//! The graph document store.
//!
//! [`EditorStore`] owns the editable document, the current selection and the
//! undo/redo history. Every mutating call is one synchronous transition that
//! records exactly one [`UndoAction`], clears the redo stack and marks the
//! document dirty for debounced persistence.
//!
//! Calls referring to unknown ids are silent no-ops and record nothing.

mod persistence;
mod state;
mod undo;

pub use persistence::{FileStorage, MemoryStorage, Persistence, Storage};
pub use state::{ElementKind, ElementRef, ElementUpdate, Selection};
pub use undo::{UndoAction, UndoHistory, UndoableDocument};

use crate::config::EditorConfig;
use crate::constants;
use crate::geometry;
use crate::ids::generate_id;
use crate::perks::PerkCatalog;
use crate::spatial::{NodeWithRadius, SpatialIndex};
use crate::types::*;
use std::cell::OnceCell;
use std::time::Instant;

/// Editable skill tree state with undo/redo and debounced persistence.
pub struct EditorStore {
    document: EditorDocument,
    selection: Selection,
    history: UndoHistory,
    persistence: Persistence,
    config: EditorConfig,
    /// Hit-test index over the nodes, built on first use after a change
    spatial: OnceCell<SpatialIndex>,
    warnings: Vec<String>,
    /// Storage operation that failed last and has not succeeded since
    failing_storage: Option<&'static str>,
}

impl EditorStore {
    /// Creates a store and restores the snapshot held by `storage`, if any.
    ///
    /// A snapshot that cannot be read is logged and ignored; the store then
    /// starts from an empty document.
    pub fn new(config: EditorConfig, storage: Box<dyn Storage>) -> Self {
        let persistence = Persistence::new(storage, config.persist_debounce());
        let mut warnings = Vec::new();
        let document = match persistence.load() {
            Ok(Some(doc)) => {
                log::info!(
                    "Restored document with {} nodes and {} connections",
                    doc.nodes.len(),
                    doc.connections.len()
                );
                doc
            }
            Ok(None) => EditorDocument::new(),
            Err(e) => {
                log::warn!("Ignoring stored document: {e:#}");
                warnings.push(format!("stored document ignored: {e:#}"));
                EditorDocument::new()
            }
        };

        Self {
            document,
            selection: Selection::None,
            history: UndoHistory::new(config.undo_history_cap),
            persistence,
            config,
            spatial: OnceCell::new(),
            warnings,
            failing_storage: None,
        }
    }

    /// Creates a store with default settings backed by a fresh [`MemoryStorage`].
    pub fn in_memory() -> Self {
        Self::new(EditorConfig::default(), Box::new(MemoryStorage::new()))
    }

    /// The current document.
    pub fn document(&self) -> &EditorDocument {
        &self.document
    }

    /// Looks up a node.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.document.nodes.get(id)
    }

    /// Looks up a connection.
    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.document.connections.get(id)
    }

    /// Looks up a background image.
    pub fn image(&self, id: &str) -> Option<&BackgroundImage> {
        self.document.images.get(id)
    }

    /// Looks up an orbit.
    pub fn orbit(&self, id: &str) -> Option<&PositionOrbit> {
        self.document.orbits.get(id)
    }

    /// The current selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Settings the store was created with.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The undo/redo history.
    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    /// Non-fatal problems collected so far, mostly storage failures.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Returns and clears the collected warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    // Nodes

    /// Creates a default node at `(x, y)` and returns its id.
    pub fn add_node(&mut self, x: f64, y: f64) -> NodeId {
        let id = generate_id();
        self.document.nodes.insert(id.clone(), Node::new(x, y));
        self.commit(UndoAction::NodeAdded { id: id.clone() });
        id
    }

    /// Merges `patch` into a node.
    pub fn update_node(&mut self, id: &str, patch: NodePatch) {
        if let Some(action) = self.patch_node(id, patch) {
            self.commit(action);
        }
    }

    /// Deletes a node together with every connection touching it.
    pub fn delete_node(&mut self, id: &str) {
        let Some(node) = self.document.nodes.remove(id) else {
            log::debug!("delete_node: unknown node {id}");
            return;
        };
        let connections = undo::take_connections_of(&mut self.document, id);
        self.commit(UndoAction::NodeDeleted {
            id: id.to_owned(),
            node,
            connections,
        });
    }

    /// Binds a node to a perk and copies its title and description.
    ///
    /// Perks unknown to `catalog` are still bound; the title is left alone
    /// and export validation reports the binding.
    pub fn assign_perk(&mut self, node_id: &str, perk_id: &str, catalog: &PerkCatalog) {
        let mut patch = NodePatch {
            perk_id: Some(perk_id.to_owned()),
            ..NodePatch::default()
        };
        match catalog.get(perk_id) {
            Some(perk) => {
                patch.title = Some(perk.name.clone());
                patch.description = Some(perk.description.clone());
            }
            None => log::warn!("Perk {perk_id} is not in the catalog"),
        }
        self.update_node(node_id, patch);
    }

    // Connections

    /// Connects two nodes.
    ///
    /// Returns `None` without recording anything if either node is missing,
    /// both ids are equal, or the pair is already connected in either
    /// direction.
    pub fn add_connection(&mut self, from_id: &str, to_id: &str) -> Option<ConnectionId> {
        if from_id == to_id {
            log::debug!("add_connection: refusing self-connection on {from_id}");
            return None;
        }
        if !self.document.nodes.contains_key(from_id) || !self.document.nodes.contains_key(to_id) {
            log::debug!("add_connection: unknown endpoint {from_id} or {to_id}");
            return None;
        }
        if self.document.connection_between(from_id, to_id).is_some() {
            log::debug!("add_connection: {from_id} and {to_id} already connected");
            return None;
        }

        let id = generate_id();
        self.document
            .connections
            .insert(id.clone(), Connection::new(from_id, to_id));
        self.commit(UndoAction::ConnectionAdded { id: id.clone() });
        Some(id)
    }

    /// Removes one connection.
    pub fn remove_connection(&mut self, id: &str) {
        let Some(connection) = self.document.connections.remove(id) else {
            log::debug!("remove_connection: unknown connection {id}");
            return;
        };
        self.commit(UndoAction::ConnectionRemoved {
            id: id.to_owned(),
            connection,
        });
    }

    /// Merges `patch` into a connection. Curvature is clamped to its range.
    ///
    /// Endpoint changes that would point at a missing node, create a
    /// self-connection or duplicate an existing pair are rejected as a whole.
    pub fn update_connection(&mut self, id: &str, mut patch: ConnectionPatch) {
        let Some(current) = self.document.connections.get(id) else {
            log::debug!("update_connection: unknown connection {id}");
            return;
        };
        if let Some(curvature) = patch.curvature.as_mut() {
            *curvature = curvature.clamp(
                constants::CONNECTION_MIN_CURVATURE,
                constants::CONNECTION_MAX_CURVATURE,
            );
        }
        if patch.from_id.is_some() || patch.to_id.is_some() {
            let from = patch.from_id.as_deref().unwrap_or(&current.from_id);
            let to = patch.to_id.as_deref().unwrap_or(&current.to_id);
            let duplicate = self
                .document
                .connections
                .iter()
                .any(|(other, conn)| other != id && conn.joins(from, to));
            let known =
                self.document.nodes.contains_key(from) && self.document.nodes.contains_key(to);
            if !known || from == to || duplicate {
                log::debug!("update_connection: rejecting endpoints {from} -> {to}");
                return;
            }
        }
        if patch.is_empty() {
            return;
        }

        let Some(connection) = self.document.connections.get_mut(id) else {
            return;
        };
        let before = patch.capture(connection);
        patch.apply(connection);
        self.commit(UndoAction::ConnectionUpdated {
            id: id.to_owned(),
            before,
        });
    }

    /// Removes every connection touching `node_id` as one undoable step.
    pub fn remove_all_connections(&mut self, node_id: &str) {
        let connections = undo::take_connections_of(&mut self.document, node_id);
        if connections.is_empty() {
            log::debug!("remove_all_connections: {node_id} has no connections");
            return;
        }
        self.commit(UndoAction::ConnectionsCleared {
            node_id: node_id.to_owned(),
            connections,
        });
    }

    // Background images

    /// Creates a default-sized empty image at `(x, y)` and returns its id.
    pub fn add_image(&mut self, x: f64, y: f64) -> ImageId {
        let id = generate_id();
        self.document
            .images
            .insert(id.clone(), BackgroundImage::new(x, y));
        self.commit(UndoAction::ImageAdded { id: id.clone() });
        id
    }

    /// Merges `patch` into an image. Opacity is clamped to 0..=1.
    pub fn update_image(&mut self, id: &str, patch: ImagePatch) {
        if let Some(action) = self.patch_image(id, patch) {
            self.commit(action);
        }
    }

    /// Deletes an image.
    pub fn delete_image(&mut self, id: &str) {
        let Some(image) = self.document.images.remove(id) else {
            log::debug!("delete_image: unknown image {id}");
            return;
        };
        self.commit(UndoAction::ImageDeleted {
            id: id.to_owned(),
            image,
        });
    }

    // Orbits

    /// Creates an orbit with the default radius and point count at `(x, y)`.
    pub fn add_orbit(&mut self, x: f64, y: f64) -> OrbitId {
        let id = generate_id();
        self.document
            .orbits
            .insert(id.clone(), PositionOrbit::new(x, y));
        self.commit(UndoAction::OrbitAdded { id: id.clone() });
        id
    }

    /// Merges `patch` into an orbit. Radius and point count are clamped.
    pub fn update_orbit(&mut self, id: &str, patch: OrbitPatch) {
        if let Some(action) = self.patch_orbit(id, patch) {
            self.commit(action);
        }
    }

    /// Deletes an orbit.
    pub fn delete_orbit(&mut self, id: &str) {
        let Some(orbit) = self.document.orbits.remove(id) else {
            log::debug!("delete_orbit: unknown orbit {id}");
            return;
        };
        self.commit(UndoAction::OrbitDeleted {
            id: id.to_owned(),
            orbit,
        });
    }

    // Bulk updates

    /// Applies several updates as one step with a single undo entry.
    ///
    /// Updates naming unknown ids are skipped. Nothing is recorded when no
    /// update applied.
    pub fn update_multiple_elements(&mut self, updates: Vec<ElementUpdate>) {
        let actions: Vec<UndoAction> = updates
            .into_iter()
            .filter_map(|update| match update {
                ElementUpdate::Node { id, patch } => self.patch_node(&id, patch),
                ElementUpdate::Image { id, patch } => self.patch_image(&id, patch),
                ElementUpdate::Orbit { id, patch } => self.patch_orbit(&id, patch),
            })
            .collect();
        if actions.is_empty() {
            return;
        }
        self.commit(UndoAction::Batch(actions));
    }

    /// Moves every selected node, image and orbit by `(dx, dy)` as one step.
    pub fn move_selection_by(&mut self, dx: f64, dy: f64) {
        let updates: Vec<ElementUpdate> = self
            .selection
            .elements()
            .iter()
            .filter_map(|element| {
                let (x, y) = match element.kind {
                    ElementKind::Node => self.node(&element.id).map(|n| (n.x, n.y))?,
                    ElementKind::Image => self.image(&element.id).map(|i| (i.x, i.y))?,
                    ElementKind::Orbit => self.orbit(&element.id).map(|o| (o.x, o.y))?,
                    ElementKind::Connection => return None,
                };
                ElementUpdate::move_to(element, x + dx, y + dy)
            })
            .collect();
        self.update_multiple_elements(updates);
    }

    // Selection

    /// Replaces the selection with exactly `element`.
    pub fn select_element(&mut self, element: ElementRef) {
        self.selection = Selection::Single(element);
    }

    /// Clears both single and multi-selection.
    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    /// Adds `element` to the multi-selection, or removes it if present.
    ///
    /// A single selection is dropped when the multi-selection starts.
    /// Connections cannot be multi-selected and are ignored.
    pub fn toggle_element_selection(&mut self, element: ElementRef) {
        if element.kind == ElementKind::Connection {
            log::debug!("toggle_element_selection: connections are single-select only");
            return;
        }
        let mut elements = match std::mem::take(&mut self.selection) {
            Selection::Multi(elements) => elements,
            Selection::None | Selection::Single(_) => Vec::new(),
        };
        if let Some(pos) = elements.iter().position(|e| *e == element) {
            elements.remove(pos);
        } else {
            elements.push(element);
        }
        self.selection = if elements.is_empty() {
            Selection::None
        } else {
            Selection::Multi(elements)
        };
    }

    // History

    /// Reverses the most recent mutation. Returns true if anything changed.
    pub fn undo(&mut self) -> bool {
        let Some(action) = self.history.pop_undo() else {
            return false;
        };
        match self.document.apply_undo(&action) {
            Some(redo_action) => {
                self.history.push_redo(redo_action);
                self.touch();
                true
            }
            None => {
                log::debug!("undo: stale action dropped");
                false
            }
        }
    }

    /// True if [`EditorStore::undo`] has something to reverse.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Reapplies the most recently undone mutation.
    pub fn redo(&mut self) -> bool {
        let Some(action) = self.history.pop_redo() else {
            return false;
        };
        match self.document.apply_undo(&action) {
            Some(undo_action) => {
                // push_action would clear the redo stack
                self.history.push_undo(undo_action);
                self.touch();
                true
            }
            None => {
                log::debug!("redo: stale action dropped");
                false
            }
        }
    }

    /// True if [`EditorStore::redo`] has something to reapply.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // Whole-document operations

    /// Replaces the document, e.g. after loading an editor export.
    ///
    /// History and selection are reset; the new document is persisted.
    pub fn import_data(&mut self, document: EditorDocument) {
        self.document = document;
        self.history.clear();
        self.selection = Selection::None;
        self.touch();
    }

    /// A copy of the full document for saving or export.
    pub fn export_data(&self) -> EditorDocument {
        self.document.clone()
    }

    /// Resets to an empty document and removes the stored snapshot.
    pub fn clear_all(&mut self) {
        self.document = EditorDocument::new();
        self.history.clear();
        self.selection = Selection::None;
        self.spatial = OnceCell::new();
        match self.persistence.clear() {
            Ok(()) => self.storage_recovered("clear"),
            Err(e) => self.warn_storage("clear", e),
        }
    }

    /// Stores the camera framing. Not undoable.
    pub fn set_viewport(&mut self, viewport: ViewportState) {
        self.document.viewport = viewport;
        self.persistence.mark_dirty(Instant::now());
    }

    /// Stores the grid configuration. Not undoable.
    pub fn update_grid_settings(&mut self, settings: GridSettings) {
        self.document.grid_settings = settings;
        self.persistence.mark_dirty(Instant::now());
    }

    /// Stores the web overlay configuration. Not undoable.
    pub fn update_web_settings(&mut self, settings: WebSettings) {
        self.document.web_settings = settings;
        self.persistence.mark_dirty(Instant::now());
    }

    // Geometry

    /// Where a node dragged to `position` comes to rest.
    pub fn snap_drag_position(&self, position: Point) -> Point {
        geometry::snap_drag_position(
            position,
            self.document.orbits.values(),
            &self.document.grid_settings,
            self.config.orbit_snap_threshold,
        )
    }

    /// Drops a dragged node at `position` after snapping.
    pub fn drop_node(&mut self, id: &str, position: Point) {
        let snapped = self.snap_drag_position(position);
        self.update_node(id, NodePatch::position(snapped.x, snapped.y));
    }

    /// The node whose circle contains `(x, y)`.
    pub fn node_at(&self, x: f64, y: f64) -> Option<&NodeId> {
        self.spatial_index().find_node_at(x, y).map(|n| &n.id)
    }

    /// Hit-test index over the current nodes.
    pub fn spatial_index(&self) -> &SpatialIndex {
        self.spatial.get_or_init(|| {
            SpatialIndex::build(
                self.config.spatial_cell_size,
                self.document.nodes.iter().map(|(id, node)| NodeWithRadius {
                    id: id.clone(),
                    x: node.x,
                    y: node.y,
                    radius: node.radius(),
                }),
            )
        })
    }

    // Persistence

    /// Writes the snapshot if the debounce window has passed since the last change.
    ///
    /// Returns true if a write happened.
    pub fn poll_persistence(&mut self, now: Instant) -> bool {
        match self.persistence.poll(now, &self.document) {
            Ok(written) => {
                if written {
                    self.storage_recovered("save");
                }
                written
            }
            Err(e) => {
                self.warn_storage("save", e);
                false
            }
        }
    }

    /// Writes any pending change immediately.
    pub fn flush(&mut self) -> bool {
        match self.persistence.flush(&self.document) {
            Ok(written) => {
                if written {
                    self.storage_recovered("save");
                }
                written
            }
            Err(e) => {
                self.warn_storage("save", e);
                false
            }
        }
    }

    /// True if a change is waiting to be written.
    pub fn has_pending_changes(&self) -> bool {
        self.persistence.is_pending()
    }

    // Internals

    fn commit(&mut self, action: UndoAction) {
        self.history.push_action(action);
        self.touch();
    }

    fn touch(&mut self) {
        self.spatial = OnceCell::new();
        self.prune_selection();
        self.persistence.mark_dirty(Instant::now());
    }

    /// Drops selection references to entities that no longer exist.
    fn prune_selection(&mut self) {
        let doc = &self.document;
        self.selection.retain(|element| match element.kind {
            ElementKind::Node => doc.nodes.contains_key(&element.id),
            ElementKind::Image => doc.images.contains_key(&element.id),
            ElementKind::Orbit => doc.orbits.contains_key(&element.id),
            ElementKind::Connection => doc.connections.contains_key(&element.id),
        });
    }

    fn patch_node(&mut self, id: &str, patch: NodePatch) -> Option<UndoAction> {
        let Some(node) = self.document.nodes.get_mut(id) else {
            log::debug!("update_node: unknown node {id}");
            return None;
        };
        if patch.is_empty() {
            return None;
        }
        let before = patch.capture(node);
        patch.apply(node);
        Some(UndoAction::NodeUpdated {
            id: id.to_owned(),
            before,
        })
    }

    fn patch_image(&mut self, id: &str, mut patch: ImagePatch) -> Option<UndoAction> {
        let Some(image) = self.document.images.get_mut(id) else {
            log::debug!("update_image: unknown image {id}");
            return None;
        };
        if patch.is_empty() {
            return None;
        }
        if let Some(Some(opacity)) = patch.opacity.as_mut() {
            *opacity = opacity.clamp(0.0, 1.0);
        }
        let before = patch.capture(image);
        patch.apply(image);
        Some(UndoAction::ImageUpdated {
            id: id.to_owned(),
            before,
        })
    }

    fn patch_orbit(&mut self, id: &str, mut patch: OrbitPatch) -> Option<UndoAction> {
        let Some(orbit) = self.document.orbits.get_mut(id) else {
            log::debug!("update_orbit: unknown orbit {id}");
            return None;
        };
        if patch.is_empty() {
            return None;
        }
        if let Some(radius) = patch.radius.as_mut() {
            *radius = radius.clamp(constants::ORBIT_MIN_RADIUS, constants::ORBIT_MAX_RADIUS);
        }
        if let Some(count) = patch.point_count.as_mut() {
            *count = (*count).clamp(constants::ORBIT_MIN_POINTS, constants::ORBIT_MAX_POINTS);
        }
        let before = patch.capture(orbit);
        patch.apply(orbit);
        Some(UndoAction::OrbitUpdated {
            id: id.to_owned(),
            before,
        })
    }

    /// Reports a storage failure once per run of failures of the same operation.
    fn warn_storage(&mut self, operation: &'static str, error: anyhow::Error) {
        if self.failing_storage == Some(operation) {
            log::debug!("Storage {operation} still failing: {error:#}");
            return;
        }
        log::error!("Storage {operation} failed: {error:#}");
        self.warnings.push(format!("storage {operation} failed: {error:#}"));
        self.failing_storage = Some(operation);
    }

    fn storage_recovered(&mut self, operation: &'static str) {
        if self.failing_storage == Some(operation) {
            log::info!("Storage {operation} succeeded again");
            self.failing_storage = None;
        }
    }
}

impl Drop for EditorStore {
    fn drop(&mut self) {
        if let Err(e) = self.persistence.flush(&self.document) {
            log::error!("Failed to persist document on shutdown: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests;
