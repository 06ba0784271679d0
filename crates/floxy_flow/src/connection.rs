// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) records, style and the connection component.

use crate::behavior::{BehaviorSet, ConnectionAction, ConnectionBehavior};
use crate::config::{ConnectionOptions, DEFAULT_CONNECTION_CAPABILITIES};
use crate::geometry::Point;
use crate::input::InputEvent;
use crate::node::NodeId;
use crate::path::{PathDescription, PathMeta, PathRegistry};
use crate::port::Endpoint;
use crate::render::{Component, Element, Layer, LayerKind, PathElement, RenderError};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Path type used when a requested one is not registered
pub const FALLBACK_PATH_TYPE: &str = "orthogonal";

const TEMP_ID: &str = "temp";

/// Identifier for a connection.
///
/// Committed connections derive their id from their endpoints, so adding the
/// same tuple twice always lands on the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Id of the committed connection `source -> target`
    pub fn between(source: Endpoint, target: Endpoint) -> Self {
        Self(format!("{}-{}", source, target))
    }

    /// Sentinel id of the transient connection
    pub fn temp() -> Self {
        Self(TEMP_ID.to_string())
    }

    /// Whether this is the transient connection
    pub fn is_temp(&self) -> bool {
        self.0 == TEMP_ID
    }

    /// Raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visual style plus semantic state flags
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStyle {
    /// Stroke color, host-defined
    pub stroke: Option<String>,
    /// Stroke width
    pub width: f64,
    /// Dash pattern
    pub dash: Option<String>,
    /// Animated stroke
    pub animated: bool,
    /// Registered path strategy name
    pub path_type: String,
    /// Arrow head at the source
    pub arrow_start: bool,
    /// Arrow head at the target
    pub arrow_end: bool,
    /// Rejected by a validator
    pub bad: bool,
    /// Under the pointer
    pub hover: bool,
    /// Active selection
    pub selected: bool,
    /// Transient drawing connection
    pub temp: bool,
}

impl ConnectionStyle {
    /// Style from options. Unknown path types fall back to orthogonal.
    pub fn from_options(options: &ConnectionOptions, paths: &PathRegistry) -> Self {
        Self {
            stroke: options.stroke.clone(),
            width: options.width,
            dash: options.dash.clone(),
            animated: options.animated,
            path_type: resolve_path_type(&options.path_type, paths),
            arrow_start: options.arrow_start,
            arrow_end: options.arrow_end,
            bad: false,
            hover: false,
            selected: false,
            temp: false,
        }
    }
}

impl Default for ConnectionStyle {
    fn default() -> Self {
        Self::from_options(&ConnectionOptions::default(), &PathRegistry::with_defaults())
    }
}

fn resolve_path_type(requested: &str, paths: &PathRegistry) -> String {
    if paths.contains(requested) {
        requested.to_string()
    } else {
        warn!("Path {} not found. Defaulting to {}.", requested, FALLBACK_PATH_TYPE);
        FALLBACK_PATH_TYPE.to_string()
    }
}

/// Plain connection data
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    /// Id
    pub id: ConnectionId,
    /// Output side
    pub source: Endpoint,
    /// Input side, absent while the connection is still being drawn
    pub target: Option<Endpoint>,
    /// Declared capabilities
    pub capabilities: IndexSet<String>,
}

impl ConnectionRecord {
    /// Committed connection between two endpoints
    pub fn committed(source: Endpoint, target: Endpoint, capabilities: &[String]) -> Self {
        Self {
            id: ConnectionId::between(source, target),
            source,
            target: Some(target),
            capabilities: capabilities.iter().cloned().collect(),
        }
    }

    /// Transient connection anchored at `source`
    pub fn temp(source: Endpoint) -> Self {
        Self {
            id: ConnectionId::temp(),
            source,
            target: None,
            capabilities: IndexSet::new(),
        }
    }

    /// Whether either end sits on `node_id`
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source.node_id == node_id || self.target.is_some_and(|t| t.node_id == node_id)
    }

    /// Whether the connection declares `tag`
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.contains(tag)
    }
}

/// Capabilities committed connections get when options list none
pub fn default_connection_capabilities() -> Vec<String> {
    DEFAULT_CONNECTION_CAPABILITIES.iter().map(|s| s.to_string()).collect()
}

/// A live connection: record, style, route and behaviors
pub struct Connection {
    record: ConnectionRecord,
    style: ConnectionStyle,
    path: PathDescription,
    behaviors: BehaviorSet<dyn ConnectionBehavior>,
}

impl Connection {
    /// Assemble a connection with an empty route
    pub fn new(
        record: ConnectionRecord,
        style: ConnectionStyle,
        behaviors: BehaviorSet<dyn ConnectionBehavior>,
    ) -> Self {
        Self {
            record,
            style,
            path: PathDescription::default(),
            behaviors,
        }
    }

    /// Connection id
    pub fn id(&self) -> &ConnectionId {
        &self.record.id
    }

    /// Plain data
    pub fn record(&self) -> &ConnectionRecord {
        &self.record
    }

    /// Current style
    pub fn style(&self) -> &ConnectionStyle {
        &self.style
    }

    /// Mutable style. Callers re-render afterwards.
    pub(crate) fn style_mut(&mut self) -> &mut ConnectionStyle {
        &mut self.style
    }

    /// Current route
    pub fn path(&self) -> &PathDescription {
        &self.path
    }

    /// Attached behaviors
    pub fn behaviors(&self) -> &BehaviorSet<dyn ConnectionBehavior> {
        &self.behaviors
    }

    /// Recompute the route between `p1` and `p2`
    pub fn reroute(&mut self, paths: &PathRegistry, p1: Point, p2: Point, meta: &PathMeta) {
        let route = paths
            .route(&self.style.path_type, p1, p2, meta)
            .or_else(|| paths.route(FALLBACK_PATH_TYPE, p1, p2, meta));
        self.path = route.unwrap_or_else(|| PathDescription::starting_at(p1).line_to(p2));
    }

    /// Switch path strategy. Unknown names fall back to orthogonal.
    pub fn set_path_type(&mut self, path_type: &str, paths: &PathRegistry) {
        self.style.path_type = resolve_path_type(path_type, paths);
    }

    /// Route an input event through the attached behaviors
    pub fn dispatch(&mut self, event: &InputEvent) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        for behavior in self.behaviors.attached_mut() {
            behavior.on_input(event, &self.record, &mut actions);
        }
        actions
    }

    /// Detach behaviors and drop the element from `container`
    pub fn destroy(&mut self, container: &mut Layer) {
        self.behaviors.detach_all();
        container.remove(self.record.id.as_str());
    }
}

impl Component for Connection {
    fn render_into(&mut self, container: &mut Layer) -> Result<(), RenderError> {
        container.expect_kind(LayerKind::Paths)?;
        let element = PathElement {
            connection_id: self.record.id.clone(),
            path: self.path.clone(),
            style: self.style.clone(),
        };
        container.insert(self.record.id.as_str(), Element::Path(element));
        Ok(())
    }

    fn init(&mut self) {
        let Self {
            record, behaviors, ..
        } = self;
        let record: &ConnectionRecord = record;
        behaviors.attach_all(&record.capabilities, |b| b.guard(record));
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("record", &self.record)
            .field("style", &self.style)
            .field("behaviors", &self.behaviors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_endpoints() {
        let id = ConnectionId::between(Endpoint::new(NodeId(1), 0), Endpoint::new(NodeId(2), 0));
        assert_eq!(id.as_str(), "1:0-2:0");
        assert!(!id.is_temp());
        assert!(ConnectionId::temp().is_temp());
    }

    #[test]
    fn test_style_defaults() {
        let style = ConnectionStyle::default();
        assert_eq!(style.width, 2.0);
        assert!(style.arrow_end);
        assert!(!style.arrow_start);
        assert_eq!(style.path_type, "orthogonal");
        assert!(!style.bad && !style.hover && !style.selected && !style.temp);
    }

    #[test]
    fn test_unknown_path_type_falls_back() {
        let options = ConnectionOptions {
            path_type: "spline".to_string(),
            ..ConnectionOptions::default()
        };
        let style = ConnectionStyle::from_options(&options, &PathRegistry::with_defaults());
        assert_eq!(style.path_type, FALLBACK_PATH_TYPE);
    }

    #[test]
    fn test_involves_node() {
        let record = ConnectionRecord::committed(
            Endpoint::new(NodeId(1), 0),
            Endpoint::new(NodeId(2), 1),
            &default_connection_capabilities(),
        );
        assert!(record.involves_node(NodeId(1)));
        assert!(record.involves_node(NodeId(2)));
        assert!(!record.involves_node(NodeId(3)));
        assert!(record.has_capability("path:bezier"));
        assert!(!ConnectionRecord::temp(Endpoint::new(NodeId(3), 0)).involves_node(NodeId(2)));
    }
}
