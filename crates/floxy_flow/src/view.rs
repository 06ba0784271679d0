// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node views.
//!
//! A view decides what a node looks like and which interactive operations its
//! body supports. Behaviors never assume an operation exists: they probe the
//! view through the `as_*` accessors and skip themselves when the probe
//! returns `None`.

use crate::geometry::{Point, Rect, Size};
use crate::node::{NodeRecord, TypeTriple};
use crate::port::PortDirection;
use crate::render::{NodeElement, NodeShape, PortElement};
use indexmap::IndexMap;
use std::fmt;
use tracing::warn;

/// Height of the label strip at the top of a card
const LABEL_HEIGHT: f64 = 28.0;
/// Side length of the square resize handle
const HANDLE_SIZE: f64 = 12.0;
/// Radius used when hit testing ports
pub const PORT_RADIUS: f64 = 6.0;

/// View supports being dragged
pub trait MovableView {
    /// Area that starts a drag
    fn drag_area(&self, record: &NodeRecord) -> Rect {
        record.bounds()
    }
}

/// View supports being resized
pub trait ResizableView {
    /// Handle that starts a resize
    fn resize_handle(&self, record: &NodeRecord) -> Rect {
        let b = record.bounds();
        Rect::from_origin_size(
            Point::new(b.right() - HANDLE_SIZE, b.bottom() - HANDLE_SIZE),
            Size::new(HANDLE_SIZE, HANDLE_SIZE),
        )
    }
}

/// View exposes an editable label
pub trait LabelView {
    /// Area holding the label text
    fn label_rect(&self, record: &NodeRecord) -> Rect;
}

/// View can draw a selection highlight
pub trait SelectableView {
    /// Outline drawn while selected
    fn selection_outline(&self, record: &NodeRecord) -> Rect {
        let b = record.bounds();
        Rect {
            x: b.x - 2.0,
            y: b.y - 2.0,
            w: b.w + 4.0,
            h: b.h + 4.0,
        }
    }
}

/// Model values a view supplies when the node config leaves them out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewDefaults {
    /// Body size
    pub size: Option<Size>,
    /// Input port count
    pub inputs: Option<usize>,
    /// Output port count
    pub outputs: Option<usize>,
    /// Label
    pub label: Option<String>,
    /// Capability list
    pub capabilities: Option<Vec<String>>,
}

/// Transient per-node render state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeState {
    /// Node is the active selection
    pub selected: bool,
    /// Label editor is open
    pub editing_label: bool,
}

/// Rendering strategy for a node body
pub trait NodeView: fmt::Debug {
    /// Stable view name
    fn type_name(&self) -> &'static str;

    /// Outline of the body
    fn shape(&self) -> NodeShape;

    /// Defaults merged into the node config
    fn model_defaults(&self) -> ViewDefaults {
        ViewDefaults::default()
    }

    /// Center of a port in canvas space.
    ///
    /// Inputs sit on the left edge and outputs on the right edge, spread
    /// evenly over the body height.
    fn port_position(&self, record: &NodeRecord, direction: PortDirection, index: usize) -> Point {
        let b = record.bounds();
        let count = match direction {
            PortDirection::Input => record.inputs,
            PortDirection::Output => record.outputs,
        };
        let y = b.y + b.h * (index as f64 + 1.0) / (count as f64 + 1.0);
        match direction {
            PortDirection::Input => Point::new(b.x, y),
            PortDirection::Output => Point::new(b.right(), y),
        }
    }

    /// Produce the node's element
    fn render(&self, record: &NodeRecord, state: NodeState) -> NodeElement {
        let ports = (0..record.inputs)
            .map(|i| (PortDirection::Input, i))
            .chain((0..record.outputs).map(|i| (PortDirection::Output, i)))
            .map(|(direction, index)| PortElement {
                direction,
                index,
                center: self.port_position(record, direction, index),
            })
            .collect();
        NodeElement {
            node_id: record.id,
            view: self.type_name(),
            shape: self.shape(),
            bounds: record.bounds(),
            label: record.label.clone(),
            label_rect: self
                .as_label_editable()
                .map_or_else(|| record.bounds(), |l| l.label_rect(record)),
            resize_handle: self.as_resizable().map(|r| r.resize_handle(record)),
            ports,
            selected: state.selected && self.as_selectable().is_some(),
            editing_label: state.editing_label,
        }
    }

    /// Probe for drag support
    fn as_movable(&self) -> Option<&dyn MovableView> {
        None
    }

    /// Probe for resize support
    fn as_resizable(&self) -> Option<&dyn ResizableView> {
        None
    }

    /// Probe for label editing support
    fn as_label_editable(&self) -> Option<&dyn LabelView> {
        None
    }

    /// Probe for selection support
    fn as_selectable(&self) -> Option<&dyn SelectableView> {
        None
    }
}

/// Card view used when no specific view is registered
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultView;

impl MovableView for DefaultView {}
impl ResizableView for DefaultView {}
impl SelectableView for DefaultView {}

impl LabelView for DefaultView {
    fn label_rect(&self, record: &NodeRecord) -> Rect {
        let b = record.bounds();
        Rect::from_origin_size(b.origin(), Size::new(b.w, LABEL_HEIGHT.min(b.h)))
    }
}

impl NodeView for DefaultView {
    fn type_name(&self) -> &'static str {
        "default-node-view"
    }

    fn shape(&self) -> NodeShape {
        NodeShape::Card
    }

    fn as_movable(&self) -> Option<&dyn MovableView> {
        Some(self)
    }

    fn as_resizable(&self) -> Option<&dyn ResizableView> {
        Some(self)
    }

    fn as_label_editable(&self) -> Option<&dyn LabelView> {
        Some(self)
    }

    fn as_selectable(&self) -> Option<&dyn SelectableView> {
        Some(self)
    }
}

/// Ellipse-shaped action node. Cannot be resized.
#[derive(Debug, Clone, Copy, Default)]
pub struct EllipseView;

impl MovableView for EllipseView {}
impl SelectableView for EllipseView {}

impl LabelView for EllipseView {
    fn label_rect(&self, record: &NodeRecord) -> Rect {
        let b = record.bounds();
        let h = LABEL_HEIGHT.min(b.h);
        Rect::from_origin_size(
            Point::new(b.x + b.w / 4.0, b.center().y - h / 2.0),
            Size::new(b.w / 2.0, h),
        )
    }
}

impl NodeView for EllipseView {
    fn type_name(&self) -> &'static str {
        "ellipse-node-view"
    }

    fn shape(&self) -> NodeShape {
        NodeShape::Ellipse
    }

    fn model_defaults(&self) -> ViewDefaults {
        ViewDefaults {
            size: Some(Size::new(200.0, 150.0)),
            inputs: Some(1),
            outputs: Some(1),
            label: Some("Action".to_string()),
            capabilities: Some(
                ["movable", "selectable", "editable-label", "removable"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
        }
    }

    fn as_movable(&self) -> Option<&dyn MovableView> {
        Some(self)
    }

    fn as_label_editable(&self) -> Option<&dyn LabelView> {
        Some(self)
    }

    fn as_selectable(&self) -> Option<&dyn SelectableView> {
        Some(self)
    }
}

/// Constructor stored in the registry
pub type ViewFactory = fn() -> Box<dyn NodeView>;

fn default_view() -> Box<dyn NodeView> {
    Box::new(DefaultView)
}

fn ellipse_view() -> Box<dyn NodeView> {
    Box::new(EllipseView)
}

/// Registry of views keyed by type triple
#[derive(Debug, Clone)]
pub struct ViewRegistry {
    views: IndexMap<TypeTriple, ViewFactory>,
}

impl ViewRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            views: IndexMap::new(),
        }
    }

    /// Registry with the built-in views
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TypeTriple::new("default", "default", "default"), default_view);
        registry.register(TypeTriple::new("diagram", "workflow", "action"), ellipse_view);
        registry
    }

    /// Register a view
    pub fn register(&mut self, triple: TypeTriple, factory: ViewFactory) {
        self.views.insert(triple, factory);
    }

    /// Whether a view is registered for `triple`
    pub fn contains(&self, triple: &TypeTriple) -> bool {
        self.views.contains_key(triple)
    }

    /// Build the view for `triple`, falling back to [`DefaultView`]
    pub fn resolve(&self, triple: &TypeTriple) -> Box<dyn NodeView> {
        match self.views.get(triple) {
            Some(factory) => factory(),
            None => {
                warn!("No view registered for {}, using the default view", triple);
                default_view()
            }
        }
    }

    /// Registered triples
    pub fn triples(&self) -> impl Iterator<Item = &TypeTriple> {
        self.views.keys()
    }
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeConfig, NodeId};

    fn record(w: f64, h: f64, inputs: usize, outputs: usize) -> NodeRecord {
        let mut config = NodeConfig::new("default");
        config.x = 100.0;
        config.y = 50.0;
        config.w = Some(w);
        config.h = Some(h);
        config.inputs = Some(inputs);
        config.outputs = Some(outputs);
        NodeRecord::from_config(NodeId(1), &config)
    }

    #[test]
    fn test_ports_spread_over_edges() {
        let r = record(200.0, 100.0, 1, 3);
        let view = DefaultView;
        assert_eq!(view.port_position(&r, PortDirection::Input, 0), Point::new(100.0, 100.0));
        assert_eq!(view.port_position(&r, PortDirection::Output, 0), Point::new(300.0, 75.0));
        assert_eq!(view.port_position(&r, PortDirection::Output, 2), Point::new(300.0, 125.0));
    }

    #[test]
    fn test_ellipse_is_not_resizable() {
        let r = record(200.0, 150.0, 1, 1);
        assert!(EllipseView.as_resizable().is_none());
        assert!(EllipseView.as_movable().is_some());
        let element = EllipseView.render(&r, NodeState::default());
        assert_eq!(element.shape, NodeShape::Ellipse);
        assert!(element.resize_handle.is_none());
        assert_eq!(element.ports.len(), 2);

        let card = DefaultView.render(&r, NodeState { selected: true, editing_label: false });
        assert!(card.selected);
        assert_eq!(card.resize_handle.map(|h| h.right()), Some(300.0));
    }

    #[test]
    fn test_registry_falls_back() {
        let registry = ViewRegistry::with_defaults();
        let view = registry.resolve(&TypeTriple::new("diagram", "workflow", "action"));
        assert_eq!(view.type_name(), "ellipse-node-view");
        let view = registry.resolve(&TypeTriple::new("x", "y", "z"));
        assert_eq!(view.type_name(), "default-node-view");
    }
}
