//! Undo/redo functionality for tracking and reversing document mutations.
//!
//! Every mutating store call records one [`UndoAction`] holding just enough
//! state to reverse it. Reversing an action yields its own inverse, which is
//! what the redo stack stores.

use crate::types::*;
use std::collections::VecDeque;

/// Represents different types of mutations that can be undone.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    /// A node was created
    NodeAdded {
        id: NodeId,
    },
    /// A node was deleted together with every connection touching it
    NodeDeleted {
        id: NodeId,
        node: Node,
        connections: Vec<(ConnectionId, Connection)>,
    },
    /// Some node fields changed; `before` holds their previous values
    NodeUpdated {
        id: NodeId,
        before: NodePatch,
    },
    /// A connection was created
    ConnectionAdded {
        id: ConnectionId,
    },
    /// A connection was removed
    ConnectionRemoved {
        id: ConnectionId,
        connection: Connection,
    },
    /// Some connection fields changed
    ConnectionUpdated {
        id: ConnectionId,
        before: ConnectionPatch,
    },
    /// Every connection of a node was removed at once
    ConnectionsCleared {
        node_id: NodeId,
        connections: Vec<(ConnectionId, Connection)>,
    },
    /// A background image was created
    ImageAdded {
        id: ImageId,
    },
    /// A background image was deleted
    ImageDeleted {
        id: ImageId,
        image: BackgroundImage,
    },
    /// Some image fields changed
    ImageUpdated {
        id: ImageId,
        before: ImagePatch,
    },
    /// An orbit was created
    OrbitAdded {
        id: OrbitId,
    },
    /// An orbit was deleted
    OrbitDeleted {
        id: OrbitId,
        orbit: PositionOrbit,
    },
    /// Some orbit fields changed
    OrbitUpdated {
        id: OrbitId,
        before: OrbitPatch,
    },
    /// Several mutations applied as one step, in application order
    Batch(Vec<UndoAction>),
}

/// Manages undo/redo history for the editor.
///
/// The undo stack is bounded: pushing beyond `max_depth` evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    undo_stack: VecDeque<UndoAction>,
    redo_stack: Vec<UndoAction>,
    max_depth: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(crate::constants::MAX_UNDO_HISTORY)
    }
}

impl UndoHistory {
    /// Creates an empty history keeping at most `max_depth` undo entries.
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_depth.min(1024)),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Records a new mutation.
    ///
    /// This clears the redo stack since a new action invalidates any previously undone actions.
    pub fn push_action(&mut self, action: UndoAction) {
        self.push_undo(action);
        self.redo_stack.clear();
    }

    /// Pushes onto the undo stack without touching the redo stack (used by redo).
    pub fn push_undo(&mut self, action: UndoAction) {
        self.undo_stack.push_back(action);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Returns true if there are actions that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if there are actions that can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pops the most recent action from the undo stack.
    pub fn pop_undo(&mut self) -> Option<UndoAction> {
        self.undo_stack.pop_back()
    }

    /// Pops the most recent action from the redo stack.
    pub fn pop_redo(&mut self) -> Option<UndoAction> {
        self.redo_stack.pop()
    }

    /// Pushes an action that was just undone.
    pub fn push_redo(&mut self, action: UndoAction) {
        self.redo_stack.push(action);
    }

    /// Number of entries on the undo stack.
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Entries on the undo stack, oldest first.
    pub fn undo_entries(&self) -> impl Iterator<Item = &UndoAction> {
        self.undo_stack.iter()
    }

    /// Clears all undo and redo history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Extension methods for reversing recorded actions on a document.
pub trait UndoableDocument {
    /// Reverses `action` and returns the action that would reverse it again.
    ///
    /// Returns `None` when nothing could be applied, e.g. the entity is gone.
    fn apply_undo(&mut self, action: &UndoAction) -> Option<UndoAction>;
}

impl UndoableDocument for EditorDocument {
    fn apply_undo(&mut self, action: &UndoAction) -> Option<UndoAction> {
        match action {
            UndoAction::NodeAdded { id } => {
                let node = self.nodes.remove(id)?;
                let connections = take_connections_of(self, id);
                Some(UndoAction::NodeDeleted {
                    id: id.clone(),
                    node,
                    connections,
                })
            }
            UndoAction::NodeDeleted {
                id,
                node,
                connections,
            } => {
                self.nodes.insert(id.clone(), node.clone());
                for (conn_id, conn) in connections {
                    self.connections.insert(conn_id.clone(), conn.clone());
                }
                Some(UndoAction::NodeAdded { id: id.clone() })
            }
            UndoAction::NodeUpdated { id, before } => {
                let node = self.nodes.get_mut(id)?;
                let after = before.capture(node);
                before.apply(node);
                Some(UndoAction::NodeUpdated {
                    id: id.clone(),
                    before: after,
                })
            }
            UndoAction::ConnectionAdded { id } => {
                let connection = self.connections.remove(id)?;
                Some(UndoAction::ConnectionRemoved {
                    id: id.clone(),
                    connection,
                })
            }
            UndoAction::ConnectionRemoved { id, connection } => {
                self.connections.insert(id.clone(), connection.clone());
                Some(UndoAction::ConnectionAdded { id: id.clone() })
            }
            UndoAction::ConnectionUpdated { id, before } => {
                let connection = self.connections.get_mut(id)?;
                let after = before.capture(connection);
                before.apply(connection);
                Some(UndoAction::ConnectionUpdated {
                    id: id.clone(),
                    before: after,
                })
            }
            UndoAction::ConnectionsCleared { connections, .. } => {
                let mut restored = Vec::with_capacity(connections.len());
                for (conn_id, conn) in connections {
                    self.connections.insert(conn_id.clone(), conn.clone());
                    restored.push(UndoAction::ConnectionAdded { id: conn_id.clone() });
                }
                Some(UndoAction::Batch(restored))
            }
            UndoAction::ImageAdded { id } => {
                let image = self.images.remove(id)?;
                Some(UndoAction::ImageDeleted {
                    id: id.clone(),
                    image,
                })
            }
            UndoAction::ImageDeleted { id, image } => {
                self.images.insert(id.clone(), image.clone());
                Some(UndoAction::ImageAdded { id: id.clone() })
            }
            UndoAction::ImageUpdated { id, before } => {
                let image = self.images.get_mut(id)?;
                let after = before.capture(image);
                before.apply(image);
                Some(UndoAction::ImageUpdated {
                    id: id.clone(),
                    before: after,
                })
            }
            UndoAction::OrbitAdded { id } => {
                let orbit = self.orbits.remove(id)?;
                Some(UndoAction::OrbitDeleted {
                    id: id.clone(),
                    orbit,
                })
            }
            UndoAction::OrbitDeleted { id, orbit } => {
                self.orbits.insert(id.clone(), orbit.clone());
                Some(UndoAction::OrbitAdded { id: id.clone() })
            }
            UndoAction::OrbitUpdated { id, before } => {
                let orbit = self.orbits.get_mut(id)?;
                let after = before.capture(orbit);
                before.apply(orbit);
                Some(UndoAction::OrbitUpdated {
                    id: id.clone(),
                    before: after,
                })
            }
            UndoAction::Batch(actions) => {
                // Reverse in the opposite order; the collected inverses then
                // replay in the original order.
                let inverses: Vec<UndoAction> = actions
                    .iter()
                    .rev()
                    .filter_map(|a| self.apply_undo(a))
                    .collect();
                if inverses.is_empty() {
                    None
                } else {
                    Some(UndoAction::Batch(inverses))
                }
            }
        }
    }
}

/// Removes and returns every connection touching `node_id`.
pub(crate) fn take_connections_of(
    doc: &mut EditorDocument,
    node_id: &str,
) -> Vec<(ConnectionId, Connection)> {
    let ids: Vec<ConnectionId> = doc
        .connections
        .iter()
        .filter(|(_, conn)| conn.touches(node_id))
        .map(|(id, _)| id.clone())
        .collect();
    ids.into_iter()
        .filter_map(|id| doc.connections.remove(&id).map(|conn| (id, conn)))
        .collect()
}
