//! Selection state and bulk update descriptions.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// Kinds of entity that can be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A skill node
    Node,
    /// A background image
    Image,
    /// An orbit guide
    Orbit,
    /// A connection; single selection only
    Connection,
}

/// Reference to one selectable entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    /// Entity id
    pub id: String,
    /// Entity kind
    pub kind: ElementKind,
}

impl ElementRef {
    /// Creates a reference.
    pub fn new(id: impl Into<String>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Reference to a node.
    pub fn node(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Node)
    }

    /// Reference to a background image.
    pub fn image(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Image)
    }

    /// Reference to an orbit.
    pub fn orbit(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Orbit)
    }

    /// Reference to a connection.
    pub fn connection(id: impl Into<String>) -> Self {
        Self::new(id, ElementKind::Connection)
    }
}

/// What the user has selected.
///
/// Single selection and multi-selection are mutually exclusive. A
/// multi-selection is never empty and holds each reference once, in the
/// order it was added.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    /// Nothing selected
    #[default]
    None,
    /// One element selected by a plain click
    Single(ElementRef),
    /// Elements collected by modifier clicks
    Multi(Vec<ElementRef>),
}

impl Selection {
    /// True when nothing is selected.
    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::None)
    }

    /// The single selection, if that is the current mode.
    pub fn single(&self) -> Option<&ElementRef> {
        match self {
            Selection::Single(element) => Some(element),
            _ => None,
        }
    }

    /// All selected elements.
    pub fn elements(&self) -> &[ElementRef] {
        match self {
            Selection::None => &[],
            Selection::Single(element) => std::slice::from_ref(element),
            Selection::Multi(elements) => elements,
        }
    }

    /// True if `id` is selected in either mode.
    pub fn contains(&self, id: &str) -> bool {
        self.elements().iter().any(|e| e.id == id)
    }

    /// Drops references for which `exists` returns false.
    pub(crate) fn retain(&mut self, mut exists: impl FnMut(&ElementRef) -> bool) {
        match self {
            Selection::None => {}
            Selection::Single(element) => {
                if !exists(element) {
                    *self = Selection::None;
                }
            }
            Selection::Multi(elements) => {
                elements.retain(|e| exists(e));
                if elements.is_empty() {
                    *self = Selection::None;
                }
            }
        }
    }
}

/// One entry of a bulk update such as a multi-drag.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementUpdate {
    /// Update of a node
    Node {
        /// Target node
        id: NodeId,
        /// Fields to change
        patch: NodePatch,
    },
    /// Update of a background image
    Image {
        /// Target image
        id: ImageId,
        /// Fields to change
        patch: ImagePatch,
    },
    /// Update of an orbit
    Orbit {
        /// Target orbit
        id: OrbitId,
        /// Fields to change
        patch: OrbitPatch,
    },
}

impl ElementUpdate {
    /// Moves the referenced element to `(x, y)`; connections cannot be moved.
    pub fn move_to(element: &ElementRef, x: f64, y: f64) -> Option<Self> {
        let id = element.id.clone();
        match element.kind {
            ElementKind::Node => Some(ElementUpdate::Node {
                id,
                patch: NodePatch::position(x, y),
            }),
            ElementKind::Image => Some(ElementUpdate::Image {
                id,
                patch: ImagePatch::position(x, y),
            }),
            ElementKind::Orbit => Some(ElementUpdate::Orbit {
                id,
                patch: OrbitPatch::position(x, y),
            }),
            ElementKind::Connection => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_collapses_empty_multi_selection() {
        let mut selection = Selection::Multi(vec![ElementRef::node("a"), ElementRef::image("b")]);

        selection.retain(|e| e.id == "b");
        assert_eq!(selection.elements(), &[ElementRef::image("b")]);

        selection.retain(|_| false);
        assert_eq!(selection, Selection::None);
    }

    #[test]
    fn test_connections_cannot_be_moved() {
        assert!(ElementUpdate::move_to(&ElementRef::connection("c"), 1.0, 2.0).is_none());
        assert_eq!(
            ElementUpdate::move_to(&ElementRef::orbit("o"), 1.0, 2.0),
            Some(ElementUpdate::Orbit {
                id: "o".into(),
                patch: OrbitPatch::position(1.0, 2.0)
            })
        );
    }
}
