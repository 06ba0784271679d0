// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node records and the node component.

use crate::behavior::{BehaviorSet, NodeAction, NodeBehavior};
use crate::config::DEFAULT_NODE_CAPABILITIES;
use crate::geometry::{Point, Rect, Size};
use crate::input::InputEvent;
use crate::port::PortDirection;
use crate::render::{Component, Element, Layer, LayerKind, RenderError};
use crate::view::{NodeState, NodeView};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default body width
pub const DEFAULT_WIDTH: f64 = 200.0;
/// Default body height
pub const DEFAULT_HEIGHT: f64 = 100.0;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(module, group, name)` key selecting a node's view
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TypeTriple {
    /// Module
    pub module: String,
    /// Group inside the module
    pub group: String,
    /// Name inside the group
    pub name: String,
}

impl TypeTriple {
    /// Create a triple
    pub fn new(module: impl Into<String>, group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            group: group.into(),
            name: name.into(),
        }
    }

    /// Whether any part is empty
    pub fn is_incomplete(&self) -> bool {
        self.module.is_empty() || self.group.is_empty() || self.name.is_empty()
    }
}

impl fmt::Display for TypeTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.module, self.group, self.name)
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

fn empty_data() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Node description accepted by `add_node` and stored in documents.
///
/// Every field except `name` may be left out; missing values come from the
/// node's view and then from the flow options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Requested id, honored when free
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// View name inside the group
    pub name: String,
    /// Displayed label, defaults to the name
    #[serde(default)]
    pub label: Option<String>,
    /// Left edge
    #[serde(default)]
    pub x: f64,
    /// Top edge
    #[serde(default)]
    pub y: f64,
    /// Width
    #[serde(default)]
    pub w: Option<f64>,
    /// Height
    #[serde(default)]
    pub h: Option<f64>,
    /// Input port count
    #[serde(default)]
    pub inputs: Option<usize>,
    /// Output port count
    #[serde(default)]
    pub outputs: Option<usize>,
    /// View module
    #[serde(default = "default_namespace")]
    pub module: String,
    /// View group
    #[serde(default = "default_namespace")]
    pub group: String,
    /// Declared capabilities
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    /// Opaque host payload
    #[serde(default = "empty_data")]
    pub data: serde_json::Value,
}

impl NodeConfig {
    /// Config for a node of view `name` in the default module and group
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            label: None,
            x: 0.0,
            y: 0.0,
            w: None,
            h: None,
            inputs: None,
            outputs: None,
            module: default_namespace(),
            group: default_namespace(),
            capabilities: None,
            data: empty_data(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the size
    pub fn with_size(mut self, w: f64, h: f64) -> Self {
        self.w = Some(w);
        self.h = Some(h);
        self
    }

    /// Set the port counts
    pub fn with_ports(mut self, inputs: usize, outputs: usize) -> Self {
        self.inputs = Some(inputs);
        self.outputs = Some(outputs);
        self
    }

    /// Set the label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the view module and group
    pub fn with_namespace(mut self, module: impl Into<String>, group: impl Into<String>) -> Self {
        self.module = module.into();
        self.group = group.into();
        self
    }

    /// Declare capabilities
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    /// Request a specific id
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    /// View key
    pub fn triple(&self) -> TypeTriple {
        TypeTriple::new(&self.module, &self.group, &self.name)
    }
}

/// Plain node data
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Id
    pub id: NodeId,
    /// View name
    pub name: String,
    /// Displayed label
    pub label: String,
    /// Top-left corner
    pub position: Point,
    /// Body size
    pub size: Size,
    /// Input port count
    pub inputs: usize,
    /// Output port count
    pub outputs: usize,
    /// View module
    pub module: String,
    /// View group
    pub group: String,
    /// Declared capabilities
    pub capabilities: IndexSet<String>,
    /// Opaque host payload
    pub data: serde_json::Value,
}

impl NodeRecord {
    /// Build a record from a fully merged config
    pub fn from_config(id: NodeId, config: &NodeConfig) -> Self {
        let capabilities = match &config.capabilities {
            Some(caps) => caps.iter().cloned().collect(),
            None => DEFAULT_NODE_CAPABILITIES.iter().map(|s| s.to_string()).collect(),
        };
        Self {
            id,
            name: config.name.clone(),
            label: config.label.clone().unwrap_or_else(|| config.name.clone()),
            position: Point::new(config.x, config.y),
            size: Size::new(
                config.w.unwrap_or(DEFAULT_WIDTH),
                config.h.unwrap_or(DEFAULT_HEIGHT),
            ),
            inputs: config.inputs.unwrap_or(1),
            outputs: config.outputs.unwrap_or(1),
            module: config.module.clone(),
            group: config.group.clone(),
            capabilities,
            data: config.data.clone(),
        }
    }

    /// Bounds in canvas space
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.size)
    }

    /// View key
    pub fn triple(&self) -> TypeTriple {
        TypeTriple::new(&self.module, &self.group, &self.name)
    }

    /// Whether the node declares `tag`
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.contains(tag)
    }

    /// Number of ports in `direction`
    pub fn port_count(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::Input => self.inputs,
            PortDirection::Output => self.outputs,
        }
    }

    /// Export as a config with every field filled
    pub fn to_config(&self) -> NodeConfig {
        NodeConfig {
            id: Some(self.id),
            name: self.name.clone(),
            label: Some(self.label.clone()),
            x: self.position.x,
            y: self.position.y,
            w: Some(self.size.w),
            h: Some(self.size.h),
            inputs: Some(self.inputs),
            outputs: Some(self.outputs),
            module: self.module.clone(),
            group: self.group.clone(),
            capabilities: Some(self.capabilities.iter().cloned().collect()),
            data: self.data.clone(),
        }
    }
}

/// A live node: record, view and attached behaviors
pub struct Node {
    record: NodeRecord,
    view: Box<dyn NodeView>,
    behaviors: BehaviorSet<dyn NodeBehavior>,
    state: NodeState,
}

impl Node {
    /// Assemble a node. Behaviors stay detached until [`Component::init`].
    pub fn new(record: NodeRecord, view: Box<dyn NodeView>, behaviors: BehaviorSet<dyn NodeBehavior>) -> Self {
        Self {
            record,
            view,
            behaviors,
            state: NodeState::default(),
        }
    }

    /// Node id
    pub fn id(&self) -> NodeId {
        self.record.id
    }

    /// Plain data
    pub fn record(&self) -> &NodeRecord {
        &self.record
    }

    /// Mutable plain data. Callers re-render afterwards.
    pub(crate) fn record_mut(&mut self) -> &mut NodeRecord {
        &mut self.record
    }

    /// Rendering strategy
    pub fn view(&self) -> &dyn NodeView {
        self.view.as_ref()
    }

    /// Transient render state
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Highlight or clear the selection outline
    pub fn set_selected(&mut self, selected: bool) {
        self.state.selected = selected;
    }

    /// Open or close the label editor
    pub fn set_editing_label(&mut self, editing: bool) {
        self.state.editing_label = editing;
    }

    /// Capabilities of the attached behaviors
    pub fn behaviors(&self) -> &BehaviorSet<dyn NodeBehavior> {
        &self.behaviors
    }

    /// Absolute position of a port, if it exists
    pub fn port_position(&self, direction: PortDirection, index: usize) -> Option<Point> {
        (index < self.record.port_count(direction))
            .then(|| self.view.port_position(&self.record, direction, index))
    }

    /// Route an input event through the attached behaviors
    pub fn dispatch(&mut self, event: &InputEvent) -> Vec<NodeAction> {
        let mut actions = Vec::new();
        for behavior in self.behaviors.attached_mut() {
            behavior.on_input(event, &self.record, self.view.as_ref(), &mut actions);
        }
        actions
    }

    /// Advance per-frame behavior work
    pub fn frame(&mut self) -> Vec<NodeAction> {
        let mut actions = Vec::new();
        for behavior in self.behaviors.attached_mut() {
            behavior.on_frame(&self.record, &mut actions);
        }
        actions
    }

    /// Detach behaviors and drop the element from `container`
    pub fn destroy(&mut self, container: &mut Layer) {
        self.behaviors.detach_all();
        container.remove(&element_key(self.record.id));
    }
}

impl Component for Node {
    fn render_into(&mut self, container: &mut Layer) -> Result<(), RenderError> {
        container.expect_kind(LayerKind::Nodes)?;
        let element = self.view.render(&self.record, self.state);
        container.insert(element_key(self.record.id), Element::Node(element));
        Ok(())
    }

    fn init(&mut self) {
        let Self {
            record,
            view,
            behaviors,
            ..
        } = self;
        let record: &NodeRecord = record;
        let view: &dyn NodeView = &**view;
        behaviors.attach_all(&record.capabilities, |b| b.guard(record, view));
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("record", &self.record)
            .field("view", &self.view.type_name())
            .field("behaviors", &self.behaviors)
            .finish()
    }
}

/// Key of a node's element in its layer
pub fn element_key(id: NodeId) -> String {
    format!("node-{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_json() {
        let config: NodeConfig = serde_json::from_str(r#"{"name": "task", "x": 5}"#).unwrap();
        assert_eq!(config.module, "default");
        assert_eq!(config.group, "default");
        assert_eq!(config.triple(), TypeTriple::new("default", "default", "task"));

        let record = NodeRecord::from_config(NodeId(4), &config);
        assert_eq!(record.label, "task");
        assert_eq!(record.size, Size::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));
        assert_eq!(record.position, Point::new(5.0, 0.0));
        assert!(record.has_capability("movable"));
    }

    #[test]
    fn test_to_config_fills_every_field() {
        let config = NodeConfig::new("task")
            .with_position(10.0, 20.0)
            .with_size(120.0, 60.0)
            .with_ports(2, 1)
            .with_capabilities(["selectable"]);
        let record = NodeRecord::from_config(NodeId(7), &config);
        let exported = record.to_config();
        assert_eq!(exported.id, Some(NodeId(7)));
        assert_eq!(exported.label.as_deref(), Some("task"));
        assert_eq!(exported.inputs, Some(2));
        assert_eq!(exported.capabilities, Some(vec!["selectable".to_string()]));

        let json = serde_json::to_value(&exported).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["w"], 120.0);
    }
}
