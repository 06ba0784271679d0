// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection lifecycle, the transient drawing connection and bad-path marks.

use crate::behavior::{BehaviorOptions, BehaviorSet, ConnectionAction};
use crate::capability::CapabilityRegistry;
use crate::config::ConnectionOptions;
use crate::connection::{Connection, ConnectionId, ConnectionRecord, ConnectionStyle};
use crate::drag::ZoomHandle;
use crate::events::{Emitter, ListenerId};
use crate::geometry::{distance_to_segment, Point, Size};
use crate::input::InputEvent;
use crate::node::NodeId;
use crate::node_manager::NodeManager;
use crate::path::{PathMeta, PathRegistry};
use crate::port::{Endpoint, PortDirection};
use crate::render::{Component, Layer, LayerKind, RenderError};
use indexmap::{IndexMap, IndexSet};
use std::rc::Rc;
use tracing::{debug, error};

/// Samples per curve when hit testing paths
const HIT_CURVE_SEGMENTS: usize = 16;

/// Connection lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Committed connection created
    Created {
        /// Connection id
        id: ConnectionId,
        /// Output side
        source: Endpoint,
        /// Input side
        target: Endpoint,
    },
    /// Committed connection destroyed
    Removed {
        /// Connection id
        id: ConnectionId,
        /// Output side
        source: Endpoint,
        /// Input side
        target: Endpoint,
    },
    /// Path strategy changed
    PathChanged {
        /// Connection id
        id: ConnectionId,
        /// New path type
        path_type: String,
    },
    /// A behavior asked for the connection to become the selection
    SelectRequested(ConnectionId),
}

/// Result of [`ConnectionManager::add_connection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new connection was committed
    Created(ConnectionId),
    /// The tuple was already connected; nothing changed
    Existing(ConnectionId),
}

impl AddOutcome {
    /// Id of the stored connection
    pub fn id(&self) -> &ConnectionId {
        match self {
            Self::Created(id) | Self::Existing(id) => id,
        }
    }
}

/// Owns every committed connection and the single temp connection
pub struct ConnectionManager {
    connections: IndexMap<ConnectionId, Connection>,
    temp: Option<Connection>,
    temp_end: Point,
    bad: IndexSet<ConnectionId>,
    layer: Layer,
    paths: PathRegistry,
    registry: Rc<CapabilityRegistry>,
    options: ConnectionOptions,
    behavior_options: BehaviorOptions,
    events: Emitter<ConnectionEvent>,
}

impl ConnectionManager {
    /// Create a manager rendering into `layer`, which must be a paths layer
    pub fn new(
        layer: Layer,
        registry: Rc<CapabilityRegistry>,
        options: ConnectionOptions,
        zoom: ZoomHandle,
    ) -> Result<Self, RenderError> {
        layer.expect_kind(LayerKind::Paths)?;
        Ok(Self {
            connections: IndexMap::new(),
            temp: None,
            temp_end: Point::ZERO,
            bad: IndexSet::new(),
            layer,
            paths: PathRegistry::with_defaults(),
            registry,
            options,
            behavior_options: BehaviorOptions {
                zoom,
                min_size: Size::default(),
            },
            events: Emitter::new(),
        })
    }

    /// Replace the path table
    pub fn with_paths(mut self, paths: PathRegistry) -> Self {
        self.paths = paths;
        self
    }

    /// Path table
    pub fn paths(&self) -> &PathRegistry {
        &self.paths
    }

    /// Path table, for registering custom strategies
    pub fn paths_mut(&mut self) -> &mut PathRegistry {
        &mut self.paths
    }

    /// Replace the capability registry used for connections created from now on
    pub fn set_registry(&mut self, registry: Rc<CapabilityRegistry>) {
        self.registry = registry;
    }

    /// Connection defaults
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Commit `source -> target`.
    ///
    /// Returns `None` when either endpoint does not resolve to an existing
    /// port. Adding a tuple that is already connected returns the existing id
    /// and emits nothing.
    pub fn add_connection(&mut self, nodes: &NodeManager, source: Endpoint, target: Endpoint) -> Option<AddOutcome> {
        nodes.port_position(source.node_id, PortDirection::Output, source.port)?;
        nodes.port_position(target.node_id, PortDirection::Input, target.port)?;

        let id = ConnectionId::between(source, target);
        if self.connections.contains_key(&id) {
            return Some(AddOutcome::Existing(id));
        }

        let record = ConnectionRecord::committed(source, target, &self.options.capabilities);
        let style = ConnectionStyle::from_options(&self.options, &self.paths);
        let behaviors = self
            .registry
            .resolve_connection_behaviors(&record.capabilities, &self.behavior_options);
        let mut connection = Connection::new(record, style, behaviors);
        route(&mut connection, &self.paths, &self.options, nodes, None);
        render(&mut self.layer, &mut connection);
        connection.init();

        debug!("Connection {} created", id);
        self.connections.insert(id.clone(), connection);
        self.events.emit(ConnectionEvent::Created {
            id: id.clone(),
            source,
            target,
        });
        Some(AddOutcome::Created(id))
    }

    /// Start the transient connection at an output port. Returns false when
    /// one already exists or the port does not resolve.
    pub fn begin_temp_connection(&mut self, nodes: &NodeManager, source: Endpoint) -> bool {
        if self.temp.is_some() {
            debug!("Temp connection already active, ignoring begin at {}", source);
            return false;
        }
        let Some(start) = nodes.port_position(source.node_id, PortDirection::Output, source.port) else {
            return false;
        };
        let mut style = ConnectionStyle::from_options(&self.options, &self.paths);
        style.temp = true;
        let mut temp = Connection::new(ConnectionRecord::temp(source), style, BehaviorSet::empty());
        self.temp_end = start;
        route(&mut temp, &self.paths, &self.options, nodes, Some(start));
        render(&mut self.layer, &mut temp);
        temp.init();
        self.temp = Some(temp);
        true
    }

    /// Move the free end of the temp connection. Clears bad marks first.
    pub fn update_temp_connection(&mut self, nodes: &NodeManager, end: Point) -> bool {
        self.clear_bad_paths();
        let Some(temp) = self.temp.as_mut() else {
            return false;
        };
        self.temp_end = end;
        route(temp, &self.paths, &self.options, nodes, Some(end));
        render(&mut self.layer, temp);
        true
    }

    /// Flag the temp connection as rejected
    pub fn mark_temp_bad(&mut self) {
        if let Some(temp) = self.temp.as_mut() {
            temp.style_mut().bad = true;
            render(&mut self.layer, temp);
        }
    }

    /// Discard the temp connection and every bad mark
    pub fn end_temp_connection(&mut self) {
        self.clear_bad_paths();
        if let Some(mut temp) = self.temp.take() {
            temp.destroy(&mut self.layer);
        }
    }

    /// The temp connection, if a drawing session is active
    pub fn temp(&self) -> Option<&Connection> {
        self.temp.as_ref()
    }

    /// Free end of the temp connection
    pub fn temp_end(&self) -> Option<Point> {
        self.temp.as_ref().map(|_| self.temp_end)
    }

    /// Destroy a committed connection. Unknown ids are ignored.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        let Some(mut connection) = self.connections.shift_remove(id) else {
            return false;
        };
        self.bad.shift_remove(id);
        connection.destroy(&mut self.layer);
        let record = connection.record();
        if let Some(target) = record.target {
            debug!("Connection {} removed", id);
            self.events.emit(ConnectionEvent::Removed {
                id: id.clone(),
                source: record.source,
                target,
            });
        }
        true
    }

    /// Destroy every connection touching `node_id`, in either direction
    pub fn remove_related_connections(&mut self, node_id: NodeId) -> Vec<ConnectionId> {
        let related: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| c.record().involves_node(node_id))
            .map(|c| c.id().clone())
            .collect();
        for id in &related {
            self.remove_connection(id);
        }
        related
    }

    /// Re-route every connection attached to `node_id`
    pub fn update_connections(&mut self, nodes: &NodeManager, node_id: NodeId) {
        for connection in self.connections.values_mut() {
            if connection.record().involves_node(node_id) {
                route(connection, &self.paths, &self.options, nodes, None);
                render(&mut self.layer, connection);
            }
        }
        if let Some(temp) = self.temp.as_mut() {
            if temp.record().involves_node(node_id) {
                route(temp, &self.paths, &self.options, nodes, Some(self.temp_end));
                render(&mut self.layer, temp);
            }
        }
    }

    /// Flag a committed connection as part of a rejected path
    pub fn mark_path_bad(&mut self, id: &ConnectionId) -> bool {
        let Some(connection) = self.connections.get_mut(id) else {
            return false;
        };
        connection.style_mut().bad = true;
        render(&mut self.layer, connection);
        self.bad.insert(id.clone());
        true
    }

    /// Flag every committed connection joining consecutive nodes of `stack`.
    /// Returns how many were flagged.
    pub fn mark_stack_bad(&mut self, stack: &[NodeId]) -> usize {
        let pairs: Vec<(NodeId, NodeId)> = stack.windows(2).map(|w| (w[0], w[1])).collect();
        let matching: Vec<ConnectionId> = self
            .connections
            .values()
            .filter(|c| {
                let record = c.record();
                record
                    .target
                    .is_some_and(|t| pairs.contains(&(record.source.node_id, t.node_id)))
            })
            .map(|c| c.id().clone())
            .collect();
        for id in &matching {
            self.mark_path_bad(id);
        }
        matching.len()
    }

    /// Clear every bad mark, temp included
    pub fn clear_bad_paths(&mut self) {
        for id in std::mem::take(&mut self.bad) {
            if let Some(connection) = self.connections.get_mut(&id) {
                connection.style_mut().bad = false;
                render(&mut self.layer, connection);
            }
        }
        if let Some(temp) = self.temp.as_mut() {
            if temp.style().bad {
                temp.style_mut().bad = false;
                render(&mut self.layer, temp);
            }
        }
    }

    /// Whether a connection is flagged bad
    pub fn is_bad(&self, id: &ConnectionId) -> bool {
        self.bad.contains(id)
    }

    /// Connections flagged bad
    pub fn bad_paths(&self) -> impl Iterator<Item = &ConnectionId> {
        self.bad.iter()
    }

    /// Toggle the selection flag
    pub fn set_selected(&mut self, id: &ConnectionId, selected: bool) -> bool {
        let Some(connection) = self.connections.get_mut(id) else {
            return false;
        };
        connection.style_mut().selected = selected;
        render(&mut self.layer, connection);
        true
    }

    /// Toggle the hover flag
    pub fn set_hover(&mut self, id: &ConnectionId, hover: bool) -> bool {
        let Some(connection) = self.connections.get_mut(id) else {
            return false;
        };
        connection.style_mut().hover = hover;
        render(&mut self.layer, connection);
        true
    }

    /// Switch a connection's path strategy and re-route it
    pub fn set_path_type(&mut self, nodes: &NodeManager, id: &ConnectionId, path_type: &str) -> bool {
        let Some(connection) = self.connections.get_mut(id) else {
            return false;
        };
        connection.set_path_type(path_type, &self.paths);
        route(connection, &self.paths, &self.options, nodes, None);
        render(&mut self.layer, connection);
        let path_type = connection.style().path_type.clone();
        self.events.emit(ConnectionEvent::PathChanged {
            id: id.clone(),
            path_type,
        });
        true
    }

    /// Route input to one connection's behaviors and apply what they request
    pub fn dispatch(&mut self, id: &ConnectionId, event: &InputEvent) {
        let Some(connection) = self.connections.get_mut(id) else {
            return;
        };
        for action in connection.dispatch(event) {
            match action {
                ConnectionAction::Select => self.events.emit(ConnectionEvent::SelectRequested(id.clone())),
                ConnectionAction::Hover(hover) => {
                    self.set_hover(id, hover);
                }
            }
        }
    }

    /// Topmost committed connection within `tolerance` of a logical point
    pub fn hit_test(&self, p: Point, tolerance: f64) -> Option<ConnectionId> {
        self.connections
            .values()
            .rev()
            .find(|c| {
                c.path()
                    .flatten(HIT_CURVE_SEGMENTS)
                    .windows(2)
                    .any(|w| distance_to_segment(p, w[0], w[1]) <= tolerance)
            })
            .map(|c| c.id().clone())
    }

    /// Destroy every connection, emitting a removal for each
    pub fn reset(&mut self) {
        self.end_temp_connection();
        let ids: Vec<ConnectionId> = self.connections.keys().cloned().collect();
        for id in &ids {
            self.remove_connection(id);
        }
    }

    /// Get a connection
    pub fn get(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Whether a committed connection exists
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Committed connections in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Number of committed connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether there are no committed connections
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Rendered path elements
    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    /// Subscribe to connection events
    pub fn on(&mut self, listener: impl FnMut(&ConnectionEvent) + 'static) -> ListenerId {
        self.events.on(listener)
    }

    /// Unsubscribe
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Take queued events
    pub fn drain_events(&mut self) -> Vec<ConnectionEvent> {
        self.events.drain()
    }
}

/// Recompute a connection's route from current node geometry. The temp
/// connection passes its free end instead of a target port.
fn route(
    connection: &mut Connection,
    paths: &PathRegistry,
    options: &ConnectionOptions,
    nodes: &NodeManager,
    free_end: Option<Point>,
) {
    let record = connection.record();
    let source = record.source;
    let target = record.target;
    let Some(p1) = nodes.port_position(source.node_id, PortDirection::Output, source.port) else {
        return;
    };
    let p2 = match (free_end, target) {
        (Some(end), _) => Some(end),
        (None, Some(t)) => nodes.port_position(t.node_id, PortDirection::Input, t.port),
        (None, None) => None,
    };
    let Some(p2) = p2 else {
        return;
    };
    let meta = PathMeta {
        source_bounds: nodes.record(source.node_id).map(|r| r.bounds()),
        target_bounds: target.and_then(|t| nodes.record(t.node_id)).map(|r| r.bounds()),
        curvature: options.curvature,
        clearance: options.clearance,
        vertical: options.vertical,
        ..PathMeta::default()
    };
    connection.reroute(paths, p1, p2, &meta);
}

fn render(layer: &mut Layer, connection: &mut Connection) {
    if let Err(err) = connection.render_into(layer) {
        error!("Failed to render connection {}: {}", connection.id(), err);
    }
}
