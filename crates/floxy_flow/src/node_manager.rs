// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node lifecycle and id space.

use crate::behavior::{BehaviorOptions, NodeAction};
use crate::capability::CapabilityRegistry;
use crate::config::NodeOptions;
use crate::drag::ZoomHandle;
use crate::events::{Emitter, ListenerId};
use crate::geometry::{Point, Size};
use crate::input::{HitTarget, InputEvent};
use crate::node::{Node, NodeConfig, NodeId, NodeRecord};
use crate::port::PortDirection;
use crate::render::{Component, Layer, LayerKind, RenderError};
use crate::view::{NodeView, ViewRegistry, PORT_RADIUS};
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::{debug, error, warn};

/// Node lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// Node created
    Added(NodeId),
    /// Node destroyed
    Removed(NodeId),
    /// Node moved to a new top-left corner
    Moved {
        /// Node id
        id: NodeId,
        /// New position
        position: Point,
    },
    /// Node resized
    Resized {
        /// Node id
        id: NodeId,
        /// New size
        size: Size,
    },
    /// Label committed
    LabelUpdated {
        /// Node id
        id: NodeId,
        /// New label
        label: String,
    },
    /// Label editor opened
    LabelEditStarted(NodeId),
    /// A behavior asked for the node to become the selection
    SelectRequested(NodeId),
}

/// Owns every node, its element and its behaviors
pub struct NodeManager {
    nodes: IndexMap<NodeId, Node>,
    next_id: u64,
    layer: Layer,
    views: ViewRegistry,
    registry: Rc<CapabilityRegistry>,
    options: NodeOptions,
    behavior_options: BehaviorOptions,
    events: Emitter<NodeEvent>,
}

impl NodeManager {
    /// Create a manager rendering into `layer`, which must be a nodes layer
    pub fn new(
        layer: Layer,
        registry: Rc<CapabilityRegistry>,
        options: NodeOptions,
        zoom: ZoomHandle,
    ) -> Result<Self, RenderError> {
        layer.expect_kind(LayerKind::Nodes)?;
        let behavior_options = BehaviorOptions {
            zoom,
            min_size: Size::new(options.min_width, options.min_height),
        };
        Ok(Self {
            nodes: IndexMap::new(),
            next_id: 1,
            layer,
            views: ViewRegistry::with_defaults(),
            registry,
            options,
            behavior_options,
            events: Emitter::new(),
        })
    }

    /// Replace the view registry
    pub fn with_views(mut self, views: ViewRegistry) -> Self {
        self.views = views;
        self
    }

    /// View registry, for registering custom views
    pub fn views_mut(&mut self) -> &mut ViewRegistry {
        &mut self.views
    }

    /// Replace the capability registry used for nodes created from now on
    pub fn set_registry(&mut self, registry: Rc<CapabilityRegistry>) {
        self.registry = registry;
    }

    /// Node defaults
    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    /// Create a node. Returns its id.
    pub fn add_node(&mut self, config: NodeConfig) -> NodeId {
        self.insert(config, false)
    }

    /// Create a node from a drop gesture. The drop point becomes the node's
    /// center, converted to logical units.
    pub fn drop_node(&mut self, config: NodeConfig) -> NodeId {
        self.insert(config, true)
    }

    fn insert(&mut self, mut config: NodeConfig, recenter: bool) -> NodeId {
        let id = self.claim_id(config.id);
        let view = self.views.resolve(&config.triple());
        self.merge_defaults(&mut config, view.as_ref());

        if recenter {
            let zoom = self.behavior_options.zoom.get();
            let w = config.w.unwrap_or(self.options.width);
            let h = config.h.unwrap_or(self.options.height);
            config.x = (config.x - w / 2.0) / zoom;
            config.y = (config.y - h / 2.0) / zoom;
        }

        let record = NodeRecord::from_config(id, &config);
        let behaviors = self
            .registry
            .resolve_node_behaviors(&record.capabilities, &self.behavior_options);
        let mut node = Node::new(record, view, behaviors);
        render(&mut self.layer, &mut node);
        node.init();
        debug!(
            "Node {} added ({} behaviors attached)",
            id,
            node.behaviors().attached().count()
        );
        self.nodes.insert(id, node);
        self.events.emit(NodeEvent::Added(id));
        id
    }

    fn claim_id(&mut self, requested: Option<NodeId>) -> NodeId {
        match requested {
            Some(id) if !self.nodes.contains_key(&id) => {
                self.next_id = self.next_id.max(id.0 + 1);
                id
            }
            other => {
                if let Some(taken) = other {
                    warn!("Node id {} already in use, assigning a new one", taken);
                }
                let id = NodeId(self.next_id);
                self.next_id += 1;
                id
            }
        }
    }

    fn merge_defaults(&self, config: &mut NodeConfig, view: &dyn NodeView) {
        let defaults = view.model_defaults();
        config.w = config
            .w
            .or(defaults.size.map(|s| s.w))
            .or(Some(self.options.width));
        config.h = config
            .h
            .or(defaults.size.map(|s| s.h))
            .or(Some(self.options.height));
        config.inputs = config.inputs.or(defaults.inputs);
        config.outputs = config.outputs.or(defaults.outputs);
        config.label = config.label.take().or(defaults.label);
        config.capabilities = config
            .capabilities
            .take()
            .or(defaults.capabilities)
            .or_else(|| Some(self.options.capabilities.clone()));
    }

    /// Destroy a node. Unknown ids are ignored.
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let Some(mut node) = self.nodes.shift_remove(&id) else {
            return false;
        };
        node.destroy(&mut self.layer);
        debug!("Node {} removed", id);
        self.events.emit(NodeEvent::Removed(id));
        true
    }

    /// Move a node's top-left corner
    pub fn move_node(&mut self, id: NodeId, position: Point) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.record_mut().position = position;
        render(&mut self.layer, node);
        self.events.emit(NodeEvent::Moved { id, position });
        true
    }

    /// Resize a node
    pub fn resize_node(&mut self, id: NodeId, size: Size) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.record_mut().size = size;
        render(&mut self.layer, node);
        self.events.emit(NodeEvent::Resized { id, size });
        true
    }

    /// Replace a node's label
    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        let label = label.into();
        node.record_mut().label = label.clone();
        node.set_editing_label(false);
        render(&mut self.layer, node);
        self.events.emit(NodeEvent::LabelUpdated { id, label });
        true
    }

    /// Toggle the selection highlight
    pub fn set_selected(&mut self, id: NodeId, selected: bool) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.set_selected(selected);
        render(&mut self.layer, node);
        true
    }

    /// Node being edited, if any
    pub fn editing_label(&self) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|n| n.state().editing_label)
            .map(Node::id)
    }

    /// Close any open label editor without committing
    pub fn cancel_label_edit(&mut self) {
        for node in self.nodes.values_mut() {
            if node.state().editing_label {
                node.set_editing_label(false);
                render(&mut self.layer, node);
            }
        }
    }

    /// Route input to one node's behaviors and apply what they request
    pub fn dispatch(&mut self, id: NodeId, event: &InputEvent) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let actions = node.dispatch(event);
        self.apply(id, actions);
    }

    /// Advance per-frame behavior work on every node
    pub fn frame(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            let actions = node.frame();
            self.apply(id, actions);
        }
    }

    fn apply(&mut self, id: NodeId, actions: Vec<NodeAction>) {
        for action in actions {
            match action {
                NodeAction::Move(position) => {
                    self.move_node(id, position);
                }
                NodeAction::Resize(size) => {
                    self.resize_node(id, size);
                }
                NodeAction::Select => self.events.emit(NodeEvent::SelectRequested(id)),
                NodeAction::Rename(label) => {
                    self.set_label(id, label);
                }
                NodeAction::BeginLabelEdit => {
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.set_editing_label(true);
                        render(&mut self.layer, node);
                        self.events.emit(NodeEvent::LabelEditStarted(id));
                    }
                }
            }
        }
    }

    /// Destroy every node and restart ids at 1
    pub fn reset(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.remove_node(id);
        }
        self.next_id = 1;
    }

    /// Topmost node element under a logical point
    pub fn hit_test(&self, p: Point) -> Option<HitTarget> {
        for node in self.nodes.values().rev() {
            let record = node.record();
            let view = node.view();
            let id = record.id;

            for direction in [PortDirection::Output, PortDirection::Input] {
                for port in 0..record.port_count(direction) {
                    let center = view.port_position(record, direction, port);
                    if center.distance(p) <= PORT_RADIUS {
                        return Some(match direction {
                            PortDirection::Output => HitTarget::OutputPort { node_id: id, port },
                            PortDirection::Input => HitTarget::InputPort { node_id: id, port },
                        });
                    }
                }
            }

            if node.behaviors().is_attached("resizable") {
                if let Some(handle) = view.as_resizable().map(|r| r.resize_handle(record)) {
                    if handle.contains(p) {
                        return Some(HitTarget::ResizeHandle(id));
                    }
                }
            }
            if let Some(label) = view.as_label_editable().map(|l| l.label_rect(record)) {
                if label.contains(p) {
                    return Some(HitTarget::Label(id));
                }
            }
            if record.bounds().contains(p) {
                return Some(HitTarget::Node(id));
            }
        }
        None
    }

    /// Absolute position of a port
    pub fn port_position(&self, id: NodeId, direction: PortDirection, index: usize) -> Option<Point> {
        self.nodes.get(&id)?.port_position(direction, index)
    }

    /// Get a node
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a node's plain data
    pub fn record(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id).map(Node::record)
    }

    /// Whether a node exists
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Node ids in creation order
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Rendered node elements
    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    /// Subscribe to node events
    pub fn on(&mut self, listener: impl FnMut(&NodeEvent) + 'static) -> ListenerId {
        self.events.on(listener)
    }

    /// Unsubscribe
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Take queued events
    pub fn drain_events(&mut self) -> Vec<NodeEvent> {
        self.events.drain()
    }
}

fn render(layer: &mut Layer, node: &mut Node) {
    if let Err(err) = node.render_into(layer) {
        error!("Failed to render node {}: {}", node.id(), err);
    }
}
