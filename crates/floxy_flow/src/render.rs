// SPDX-License-Identifier: MIT OR Apache-2.0
//! Retained render targets.
//!
//! The engine never draws. Components render themselves into a [`Layer`], a
//! named container of elements that the host paints (see [`crate::ui`]).
//! Nodes go into a [`LayerKind::Nodes`] layer, connection paths into a
//! [`LayerKind::Paths`] layer; rendering into the wrong kind is a programming
//! error reported as [`RenderError::WrongContainer`].

use crate::connection::{ConnectionId, ConnectionStyle};
use crate::geometry::{Point, Rect};
use crate::node::NodeId;
use crate::path::PathDescription;
use crate::port::PortDirection;
use indexmap::IndexMap;
use std::fmt;

/// Kind of content a layer accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Node bodies
    Nodes,
    /// Connection paths
    Paths,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes => f.write_str("nodes"),
            Self::Paths => f.write_str("paths"),
        }
    }
}

/// Error raised when a component is given an unusable render target
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// Container holds a different kind of content
    #[error("Container '{container}' is a {found} layer, expected a {expected} layer")]
    WrongContainer {
        /// Container id
        container: String,
        /// Kind the component needs
        expected: LayerKind,
        /// Kind the container has
        found: LayerKind,
    },

    /// Container id is empty
    #[error("Render target has no id")]
    MissingContainer,
}

/// Outline drawn for a node body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    /// Rounded card
    Card,
    /// Ellipse inscribed in the bounds
    Ellipse,
}

/// A port circle on a node element
#[derive(Debug, Clone, PartialEq)]
pub struct PortElement {
    /// Input or output
    pub direction: PortDirection,
    /// Port index
    pub index: usize,
    /// Center in canvas space
    pub center: Point,
}

/// Rendered node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeElement {
    /// Node id
    pub node_id: NodeId,
    /// View that produced the element
    pub view: &'static str,
    /// Body outline
    pub shape: NodeShape,
    /// Bounds in canvas space
    pub bounds: Rect,
    /// Displayed label
    pub label: String,
    /// Area that starts a label edit
    pub label_rect: Rect,
    /// Resize handle, present only for resizable views
    pub resize_handle: Option<Rect>,
    /// Port circles
    pub ports: Vec<PortElement>,
    /// Selection highlight
    pub selected: bool,
    /// Label is being edited
    pub editing_label: bool,
}

/// Rendered connection
#[derive(Debug, Clone, PartialEq)]
pub struct PathElement {
    /// Connection id
    pub connection_id: ConnectionId,
    /// Route
    pub path: PathDescription,
    /// Stroke style and semantic flags
    pub style: ConnectionStyle,
}

/// Anything a layer can hold
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Node body
    Node(NodeElement),
    /// Connection path
    Path(PathElement),
}

/// Named element container
#[derive(Debug, Clone)]
pub struct Layer {
    id: String,
    kind: LayerKind,
    elements: IndexMap<String, Element>,
}

impl Layer {
    /// Create an empty layer
    pub fn new(id: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            kind,
            elements: IndexMap::new(),
        }
    }

    /// Layer id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Layer kind
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Check that this layer can host content of `expected` kind
    pub fn expect_kind(&self, expected: LayerKind) -> Result<(), RenderError> {
        if self.id.is_empty() {
            return Err(RenderError::MissingContainer);
        }
        if self.kind != expected {
            return Err(RenderError::WrongContainer {
                container: self.id.clone(),
                expected,
                found: self.kind,
            });
        }
        Ok(())
    }

    /// Insert or replace an element
    pub fn insert(&mut self, key: impl Into<String>, element: Element) {
        self.elements.insert(key.into(), element);
    }

    /// Remove an element
    pub fn remove(&mut self, key: &str) -> Option<Element> {
        self.elements.shift_remove(key)
    }

    /// Get an element
    pub fn get(&self, key: &str) -> Option<&Element> {
        self.elements.get(key)
    }

    /// Get a mutable element
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Element> {
        self.elements.get_mut(key)
    }

    /// Iterate elements in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Element)> {
        self.elements.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate node elements
    pub fn nodes(&self) -> impl Iterator<Item = &NodeElement> {
        self.elements.values().filter_map(|e| match e {
            Element::Node(n) => Some(n),
            Element::Path(_) => None,
        })
    }

    /// Iterate path elements
    pub fn paths(&self) -> impl Iterator<Item = &PathElement> {
        self.elements.values().filter_map(|e| match e {
            Element::Path(p) => Some(p),
            Element::Node(_) => None,
        })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the layer is empty
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Remove every element
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

/// Construction contract shared by nodes and connections
pub trait Component {
    /// Attach the component's element to `container`
    fn render_into(&mut self, container: &mut Layer) -> Result<(), RenderError>;

    /// Called exactly once after the element is attached
    fn init(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_kind() {
        let nodes = Layer::new("flow-canvas", LayerKind::Nodes);
        assert!(nodes.expect_kind(LayerKind::Nodes).is_ok());
        assert_eq!(
            nodes.expect_kind(LayerKind::Paths),
            Err(RenderError::WrongContainer {
                container: "flow-canvas".to_string(),
                expected: LayerKind::Paths,
                found: LayerKind::Nodes,
            })
        );
        assert_eq!(
            Layer::new("", LayerKind::Paths).expect_kind(LayerKind::Paths),
            Err(RenderError::MissingContainer)
        );
    }
}
