// SPDX-License-Identifier: MIT OR Apache-2.0
//! The orchestrator.
//!
//! [`Flow`] owns the canvas, both managers, the validators and the selection.
//! Hosts feed it pointer, keyboard and wheel input in container-relative
//! screen coordinates and call [`Flow::frame`] once per display refresh.
//! Component events are drained after every operation and routed to the
//! parts that depend on them before being re-emitted as [`FlowEvent`]s.

use crate::canvas::{Canvas, CanvasEvent, DropPayload};
use crate::capability::{CapabilityRegistry, EntityKind};
use crate::command::Command;
use crate::config::FlowOptions;
use crate::connection::ConnectionId;
use crate::connection_manager::{ConnectionEvent, ConnectionManager};
use crate::drag::ZoomHandle;
use crate::error::{ConnectError, FlowError};
use crate::events::{Emitter, ListenerId};
use crate::geometry::{Point, Size};
use crate::input::{HitTarget, InputEvent, Key, PointerButton, PointerInput};
use crate::node::{NodeConfig, NodeId};
use crate::node_manager::{NodeEvent, NodeManager};
use crate::notification::{LogNotifier, Notifier};
use crate::path::PathRegistry;
use crate::port::{Endpoint, PortDirection};
use crate::render::{Layer, LayerKind};
use crate::selection::{SelectionManager, SelectionTarget};
use crate::validator::{CycleValidator, Validator};
use crate::view::ViewRegistry;
use std::rc::Rc;
use tracing::debug;

/// Distance in screen pixels within which a click hits a connection
pub const CONNECTION_HIT_TOLERANCE: f64 = 6.0;

/// Connection-drawing session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawingState {
    /// No temp connection
    #[default]
    Idle,
    /// A temp connection follows the pointer
    Drawing {
        /// Output port the gesture started from
        source: Endpoint,
    },
}

/// Everything the orchestrator reports to its host
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Forwarded node event
    Node(NodeEvent),
    /// Forwarded connection event
    Connection(ConnectionEvent),
    /// Forwarded canvas event
    Canvas(CanvasEvent),
    /// Selection replaced or cleared
    SelectionChanged(Option<SelectionTarget>),
    /// A drawing session started at an output port
    DrawingStarted(Endpoint),
    /// The drawing session ended
    DrawingEnded,
    /// A validator vetoed an edge
    ConnectionRejected {
        /// Output side
        output: Endpoint,
        /// Input side
        input: Endpoint,
        /// User-facing reason
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Node(NodeId),
    Canvas,
}

/// Diagram orchestrator
pub struct Flow {
    options: FlowOptions,
    registry: Rc<CapabilityRegistry>,
    canvas: Canvas,
    nodes: NodeManager,
    connections: ConnectionManager,
    validators: Vec<Box<dyn Validator>>,
    selection: SelectionManager,
    notifier: Box<dyn Notifier>,
    drawing: DrawingState,
    pending_temp_end: Option<Point>,
    captured: Option<Capture>,
    hovered: Option<ConnectionId>,
    events: Emitter<FlowEvent>,
}

impl Flow {
    /// Create a flow with its own node and path layers
    pub fn new(options: FlowOptions) -> Result<Self, FlowError> {
        Self::with_layers(
            options,
            Layer::new("flow-nodes", LayerKind::Nodes),
            Layer::new("flow-paths", LayerKind::Paths),
        )
    }

    /// Create a flow rendering into the given containers
    pub fn with_layers(options: FlowOptions, node_layer: Layer, path_layer: Layer) -> Result<Self, FlowError> {
        options.validate()?;
        let registry = Rc::new(CapabilityRegistry::with_defaults());
        let zoom = ZoomHandle::default();
        let canvas = Canvas::new(&options, zoom.clone());
        let nodes = NodeManager::new(node_layer, Rc::clone(&registry), options.node.clone(), zoom.clone())?;
        let connections = ConnectionManager::new(path_layer, Rc::clone(&registry), options.connection.clone(), zoom)?;

        let mut validators: Vec<Box<dyn Validator>> = Vec::new();
        if options.cycle_validation {
            validators.push(Box::new(CycleValidator::new()));
        }

        Ok(Self {
            options,
            registry,
            canvas,
            nodes,
            connections,
            validators,
            selection: SelectionManager::new(),
            notifier: Box::new(LogNotifier),
            drawing: DrawingState::Idle,
            pending_temp_end: None,
            captured: None,
            hovered: None,
            events: Emitter::listeners_only(),
        })
    }

    /// Add a validator consulted before every new edge
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.add_validator(validator);
        self
    }

    /// Route user-facing messages to `notifier`
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// Use a custom capability registry for entities created from now on
    pub fn with_registry(mut self, registry: CapabilityRegistry) -> Self {
        let registry = Rc::new(registry);
        self.nodes.set_registry(Rc::clone(&registry));
        self.connections.set_registry(Rc::clone(&registry));
        self.registry = registry;
        self
    }

    /// Add a validator consulted before every new edge
    pub fn add_validator(&mut self, validator: impl Validator + 'static) {
        self.validators.push(Box::new(validator));
    }

    // ---- Accessors ----

    /// Options the flow was built from
    pub fn options(&self) -> &FlowOptions {
        &self.options
    }

    /// Capability registry
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Canvas state
    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Current zoom
    pub fn zoom(&self) -> f64 {
        self.canvas.zoom()
    }

    /// Current pan offset
    pub fn pan(&self) -> Point {
        self.canvas.pan()
    }

    /// Node manager
    pub fn nodes(&self) -> &NodeManager {
        &self.nodes
    }

    /// Connection manager
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// View registry, for registering custom node views
    pub fn views_mut(&mut self) -> &mut ViewRegistry {
        self.nodes.views_mut()
    }

    /// Path table, for registering custom strategies
    pub fn paths_mut(&mut self) -> &mut PathRegistry {
        self.connections.paths_mut()
    }

    /// Installed validators
    pub fn validators(&self) -> impl Iterator<Item = &dyn Validator> {
        self.validators.iter().map(|v| &**v)
    }

    /// Current selection
    pub fn selection(&self) -> Option<&SelectionTarget> {
        self.selection.active()
    }

    /// Drawing session state
    pub fn drawing(&self) -> DrawingState {
        self.drawing
    }

    /// Whether a drawing session is active
    pub fn is_drawing(&self) -> bool {
        matches!(self.drawing, DrawingState::Drawing { .. })
    }

    // ---- Entities ----

    /// Create a node
    pub fn add_node(&mut self, config: NodeConfig) -> NodeId {
        let id = self.nodes.add_node(config);
        self.pump();
        id
    }

    /// Destroy a node and every connection touching it
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let removed = self.nodes.remove_node(id);
        self.pump();
        removed
    }

    /// Move a node's top-left corner
    pub fn move_node(&mut self, id: NodeId, position: Point) -> bool {
        let moved = self.nodes.move_node(id, position);
        self.pump();
        moved
    }

    /// Resize a node
    pub fn resize_node(&mut self, id: NodeId, size: Size) -> bool {
        let resized = self.nodes.resize_node(id, size);
        self.pump();
        resized
    }

    /// Replace a node's label
    pub fn set_label(&mut self, id: NodeId, label: impl Into<String>) -> bool {
        let updated = self.nodes.set_label(id, label);
        self.pump();
        updated
    }

    /// Commit an edge after every validator accepts it.
    ///
    /// An already connected tuple returns its id without consulting the
    /// validators.
    pub fn add_connection(&mut self, output: Endpoint, input: Endpoint) -> Result<ConnectionId, ConnectError> {
        let id = ConnectionId::between(output, input);
        if self.connections.contains(&id) {
            return Ok(id);
        }
        let resolves = self
            .nodes
            .port_position(output.node_id, PortDirection::Output, output.port)
            .is_some()
            && self
                .nodes
                .port_position(input.node_id, PortDirection::Input, input.port)
                .is_some();
        if !resolves {
            return Err(ConnectError::UnknownEndpoint { output, input });
        }

        for validator in &mut self.validators {
            let result = validator.on_connection_attempt(output.node_id, input.node_id);
            if !result.valid {
                let message = result
                    .message
                    .unwrap_or_else(|| format!("Connection {} -> {} rejected", output, input));
                self.notifier.warning(&message);
                self.events.emit(FlowEvent::ConnectionRejected {
                    output,
                    input,
                    message: message.clone(),
                });
                return Err(ConnectError::Rejected {
                    validator: validator.name().to_string(),
                    message,
                    stack: result.stack,
                });
            }
        }

        let outcome = self.connections.add_connection(&self.nodes, output, input);
        self.pump();
        outcome
            .map(|o| o.id().clone())
            .ok_or(ConnectError::UnknownEndpoint { output, input })
    }

    /// Destroy a committed connection
    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        let removed = self.connections.remove_connection(id);
        self.pump();
        removed
    }

    /// Switch a connection's path strategy
    pub fn set_path_type(&mut self, id: &ConnectionId, path_type: &str) -> bool {
        let changed = self.connections.set_path_type(&self.nodes, id, path_type);
        self.pump();
        changed
    }

    /// Destroy everything. Validators see every removal.
    pub fn reset(&mut self) {
        self.clear_selection();
        self.end_drawing();
        self.captured = None;
        self.hovered = None;
        self.connections.reset();
        self.nodes.reset();
        self.pump();
    }

    /// Set zoom, clamped to the configured bounds
    pub fn set_zoom(&mut self, zoom: f64) {
        self.canvas.set_zoom(zoom);
        self.pump();
    }

    /// Set the pan offset
    pub fn set_pan(&mut self, pan: Point) {
        self.canvas.set_pan(pan);
        self.pump();
    }

    // ---- Selection and commands ----

    /// Make `target` the selection. Returns false when it does not exist.
    pub fn select(&mut self, target: SelectionTarget) -> bool {
        if self.selection.is_selected(&target) {
            return true;
        }
        let commands = match &target {
            SelectionTarget::Node(id) => self
                .nodes
                .record(*id)
                .map(|r| self.registry.resolve_commands(EntityKind::Node, &r.capabilities)),
            SelectionTarget::Connection(id) => self
                .connections
                .get(id)
                .map(|c| self.registry.resolve_commands(EntityKind::Connection, &c.record().capabilities)),
        };
        let Some(commands) = commands else {
            return false;
        };
        if let Some(previous) = self.selection.select(target.clone(), commands) {
            self.highlight(&previous, false);
        }
        self.highlight(&target, true);
        debug!("Selected {:?}", target);
        self.events.emit(FlowEvent::SelectionChanged(Some(target)));
        true
    }

    /// Drop the selection
    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.selection.clear() {
            self.highlight(&previous, false);
            self.events.emit(FlowEvent::SelectionChanged(None));
        }
    }

    fn highlight(&mut self, target: &SelectionTarget, selected: bool) {
        match target {
            SelectionTarget::Node(id) => {
                self.nodes.set_selected(*id, selected);
            }
            SelectionTarget::Connection(id) => {
                self.connections.set_selected(id, selected);
            }
        }
    }

    /// Commands the current selection supports, ordered for display
    pub fn available_commands(&self) -> &[Rc<dyn Command>] {
        self.selection.commands()
    }

    /// Run the selection's command for `tag`. Failures are reported through
    /// the notifier.
    pub fn execute(&mut self, tag: &str) -> bool {
        let Some(target) = self.selection.active().cloned() else {
            self.notifier.error("Nothing selected");
            return false;
        };
        let Some(command) = self.selection.command(tag) else {
            self.notifier.error(&format!("`{}` is not supported", tag));
            return false;
        };
        let done = command.execute(self, &target);
        if done && command.clear_selection() {
            self.clear_selection();
        }
        done
    }

    // ---- Input ----

    /// Element under a container-relative point
    pub fn hit_test(&self, screen: Point) -> HitTarget {
        let p = self.canvas.screen_to_logical(screen);
        if let Some(target) = self.nodes.hit_test(p) {
            return target;
        }
        let tolerance = CONNECTION_HIT_TOLERANCE / self.canvas.zoom();
        if let Some(id) = self.connections.hit_test(p, tolerance) {
            return HitTarget::Connection(id);
        }
        HitTarget::Canvas
    }

    /// Pointer pressed
    pub fn pointer_down(&mut self, button: PointerButton, screen: Point) {
        let target = self.hit_test(screen);
        let input = PointerInput {
            button,
            screen,
            target: target.clone(),
        };
        match &target {
            HitTarget::OutputPort { node_id, port } if button == PointerButton::Primary => {
                self.begin_drawing(Endpoint::new(*node_id, *port));
            }
            HitTarget::Canvas => {
                self.clear_selection();
                if self.canvas.press(button, screen) {
                    self.captured = Some(Capture::Canvas);
                }
            }
            HitTarget::Connection(id) => {
                self.connections.dispatch(id, &InputEvent::PointerDown(input));
            }
            other => {
                if let Some(id) = other.node_id() {
                    self.captured = Some(Capture::Node(id));
                    self.nodes.dispatch(id, &InputEvent::PointerDown(input));
                }
            }
        }
        self.pump();
    }

    /// Pointer moved
    pub fn pointer_move(&mut self, button: PointerButton, screen: Point) {
        let target = self.hit_test(screen);
        if self.is_drawing() {
            self.pending_temp_end = Some(self.canvas.screen_to_logical(screen));
        }
        let input = PointerInput { button, screen, target };
        match self.captured {
            Some(Capture::Node(id)) => self.nodes.dispatch(id, &InputEvent::PointerMove(input.clone())),
            Some(Capture::Canvas) => self.canvas.pointer_move(button, screen),
            None => {}
        }
        self.update_hover(input);
        self.pump();
    }

    fn update_hover(&mut self, input: PointerInput) {
        let hovered = match &input.target {
            HitTarget::Connection(id) => Some(id.clone()),
            _ => None,
        };
        let event = InputEvent::PointerMove(input);
        if let Some(previous) = self.hovered.take() {
            if Some(&previous) != hovered.as_ref() {
                self.connections.dispatch(&previous, &event);
            }
        }
        if let Some(id) = &hovered {
            self.connections.dispatch(id, &event);
        }
        self.hovered = hovered;
    }

    /// Pointer released
    pub fn pointer_up(&mut self, button: PointerButton, screen: Point) {
        let target = self.hit_test(screen);
        if self.is_drawing() && button == PointerButton::Primary {
            self.finish_drawing(&target);
        }
        let input = PointerInput { button, screen, target };
        match self.captured.take() {
            Some(Capture::Node(id)) => self.nodes.dispatch(id, &InputEvent::PointerUp(input)),
            Some(Capture::Canvas) => self.canvas.release(button),
            None => {}
        }
        self.pump();
    }

    /// Double click, opens label editors
    pub fn double_click(&mut self, screen: Point) {
        let target = self.hit_test(screen);
        if let Some(id) = target.node_id() {
            let input = PointerInput::primary(screen, target);
            self.nodes.dispatch(id, &InputEvent::DoubleClick(input));
        }
        self.pump();
    }

    /// Commit the text of an open label editor
    pub fn commit_label(&mut self, id: NodeId, text: impl Into<String>) {
        let event = InputEvent::LabelCommit {
            node_id: id,
            text: text.into(),
        };
        self.nodes.dispatch(id, &event);
        self.pump();
    }

    /// Key pressed. Escape cancels drawing and label editing.
    pub fn key_down(&mut self, key: Key) {
        if key == Key::Escape {
            self.end_drawing();
            self.nodes.cancel_label_edit();
        }
        self.pump();
    }

    /// Wheel notch. Returns the new zoom.
    pub fn wheel(&mut self, delta_y: f64) -> f64 {
        let zoom = self.canvas.wheel(delta_y);
        self.pump();
        zoom
    }

    /// Palette drop at a container-relative point
    pub fn drop_payload(&mut self, payload: &DropPayload, screen: Point) -> bool {
        let dropped = self.canvas.drop_payload(payload, screen);
        self.pump();
        dropped
    }

    /// Advance drags, the pan and the temp connection by one display frame
    pub fn frame(&mut self) {
        self.canvas.frame();
        self.nodes.frame();
        if let Some(end) = self.pending_temp_end.take() {
            if self.is_drawing() {
                self.connections.update_temp_connection(&self.nodes, end);
            }
        }
        self.pump();
    }

    // ---- Drawing ----

    fn begin_drawing(&mut self, source: Endpoint) -> bool {
        if self.is_drawing() {
            debug!("Drawing already active, ignoring start at {}", source);
            return false;
        }
        if !self.connections.begin_temp_connection(&self.nodes, source) {
            return false;
        }
        self.drawing = DrawingState::Drawing { source };
        self.events.emit(FlowEvent::DrawingStarted(source));
        true
    }

    fn finish_drawing(&mut self, target: &HitTarget) {
        let DrawingState::Drawing { source } = self.drawing else {
            return;
        };
        let HitTarget::InputPort { node_id, port } = *target else {
            self.end_drawing();
            return;
        };
        match self.add_connection(source, Endpoint::new(node_id, port)) {
            Ok(_) | Err(ConnectError::UnknownEndpoint { .. }) => self.end_drawing(),
            Err(ConnectError::Rejected { stack, .. }) => {
                self.connections.mark_temp_bad();
                if let Some(stack) = stack {
                    self.connections.mark_stack_bad(&stack);
                }
            }
        }
    }

    /// Discard the temp connection and every bad mark. Safe to call at any time.
    fn end_drawing(&mut self) {
        self.connections.end_temp_connection();
        self.pending_temp_end = None;
        if self.is_drawing() {
            self.drawing = DrawingState::Idle;
            self.events.emit(FlowEvent::DrawingEnded);
        }
    }

    // ---- Event routing ----

    fn pump(&mut self) {
        loop {
            let canvas_events = self.canvas.drain_events();
            let node_events = self.nodes.drain_events();
            let connection_events = self.connections.drain_events();
            if canvas_events.is_empty() && node_events.is_empty() && connection_events.is_empty() {
                break;
            }
            for event in canvas_events {
                self.on_canvas_event(event);
            }
            for event in node_events {
                self.on_node_event(event);
            }
            for event in connection_events {
                self.on_connection_event(event);
            }
        }
    }

    fn on_canvas_event(&mut self, event: CanvasEvent) {
        if let CanvasEvent::NodeDropped(config) = &event {
            self.nodes.drop_node(config.clone());
        }
        self.events.emit(FlowEvent::Canvas(event));
    }

    fn on_node_event(&mut self, event: NodeEvent) {
        match &event {
            NodeEvent::Moved { id, .. } | NodeEvent::Resized { id, .. } => {
                self.connections.update_connections(&self.nodes, *id);
            }
            NodeEvent::Removed(id) => {
                let id = *id;
                self.connections.remove_related_connections(id);
                if self.selection.is_selected(&SelectionTarget::Node(id)) {
                    self.selection.clear();
                    self.events.emit(FlowEvent::SelectionChanged(None));
                }
                if matches!(self.drawing, DrawingState::Drawing { source } if source.node_id == id) {
                    self.end_drawing();
                }
                if self.captured == Some(Capture::Node(id)) {
                    self.captured = None;
                }
            }
            NodeEvent::SelectRequested(id) => {
                self.select(SelectionTarget::Node(*id));
            }
            NodeEvent::Added(_) | NodeEvent::LabelUpdated { .. } | NodeEvent::LabelEditStarted(_) => {}
        }
        self.events.emit(FlowEvent::Node(event));
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::Created { source, target, .. } => {
                for validator in &mut self.validators {
                    validator.on_connection_added(source.node_id, target.node_id);
                }
            }
            ConnectionEvent::Removed { id, source, target } => {
                // Validators track node pairs, so keep the pair while another port edge joins it
                let pair_remains = self.connections.iter().any(|c| {
                    let record = c.record();
                    record.source.node_id == source.node_id
                        && record.target.is_some_and(|t| t.node_id == target.node_id)
                });
                if !pair_remains {
                    for validator in &mut self.validators {
                        validator.on_connection_removed(source.node_id, target.node_id);
                    }
                }
                if self.selection.is_selected(&SelectionTarget::Connection(id.clone())) {
                    self.selection.clear();
                    self.events.emit(FlowEvent::SelectionChanged(None));
                }
                if self.hovered.as_ref() == Some(id) {
                    self.hovered = None;
                }
            }
            ConnectionEvent::SelectRequested(id) => {
                self.select(SelectionTarget::Connection(id.clone()));
            }
            ConnectionEvent::PathChanged { .. } => {}
        }
        self.events.emit(FlowEvent::Connection(event));
    }

    // ---- Events ----

    /// Subscribe to flow events
    pub fn on(&mut self, listener: impl FnMut(&FlowEvent) + 'static) -> ListenerId {
        self.events.on(listener)
    }

    /// Unsubscribe
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Queue flow events for [`Flow::drain_events`] as well as passing them
    /// to listeners. Off by default; turning it off drops anything queued.
    pub fn queue_events(&mut self, enabled: bool) {
        self.events.set_queueing(enabled);
    }

    /// Take queued events. Always empty unless [`Flow::queue_events`] is on.
    pub fn drain_events(&mut self) -> Vec<FlowEvent> {
        self.events.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::notification::{MemoryNotifier, NoticeLevel};
    use crate::validator::CYCLE_MESSAGE;
    use std::cell::RefCell;

    fn ep(node: u64, port: usize) -> Endpoint {
        Endpoint::new(NodeId(node), port)
    }

    /// Four default nodes in a row: ports of node n sit at
    /// input (100 + 300(n-1), 150) and output (300 + 300(n-1), 150).
    fn flow_with_row(options: FlowOptions) -> (Flow, MemoryNotifier) {
        let notifier = MemoryNotifier::new();
        let mut flow = Flow::new(options).unwrap().with_notifier(notifier.clone());
        for i in 0..4 {
            flow.add_node(NodeConfig::new("default").with_position(100.0 + 300.0 * i as f64, 100.0));
        }
        (flow, notifier)
    }

    fn click(flow: &mut Flow, at: Point) {
        flow.pointer_down(PointerButton::Primary, at);
        flow.pointer_up(PointerButton::Primary, at);
    }

    fn draw(flow: &mut Flow, from: Point, to: Point) {
        flow.pointer_down(PointerButton::Primary, from);
        flow.pointer_move(PointerButton::Primary, to);
        flow.frame();
        flow.pointer_up(PointerButton::Primary, to);
    }

    #[test]
    fn test_wrong_layer_is_construction_error() {
        let result = Flow::with_layers(
            FlowOptions::default(),
            Layer::new("paths", LayerKind::Paths),
            Layer::new("paths", LayerKind::Paths),
        );
        assert!(matches!(result, Err(FlowError::Render(_))));
    }

    #[test]
    fn test_add_connection_between_two_nodes() {
        let mut flow = Flow::new(FlowOptions::default()).unwrap();
        flow.add_node(NodeConfig::new("default").with_position(100.0, 100.0));
        flow.add_node(NodeConfig::new("default").with_position(400.0, 100.0));
        let id = flow.add_connection(ep(1, 0), ep(2, 0)).unwrap();
        assert_eq!(id.as_str(), "1:0-2:0");
        assert_eq!(flow.add_connection(ep(1, 0), ep(2, 0)), Ok(id));
        assert_eq!(flow.connections().len(), 1);
        assert!(matches!(
            flow.add_connection(ep(1, 0), ep(5, 0)),
            Err(ConnectError::UnknownEndpoint { .. })
        ));
    }

    #[test]
    fn test_cycle_rejected_through_add_connection() {
        let (mut flow, notifier) = flow_with_row(FlowOptions::default());
        flow.add_connection(ep(1, 0), ep(2, 0)).unwrap();
        flow.add_connection(ep(2, 0), ep(3, 0)).unwrap();
        match flow.add_connection(ep(3, 0), ep(1, 0)) {
            Err(ConnectError::Rejected { validator, stack, .. }) => {
                assert_eq!(validator, "cycle");
                assert!(stack.is_some_and(|s| !s.is_empty()));
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(flow.add_connection(ep(3, 0), ep(4, 0)).is_ok());
        assert_eq!(notifier.messages(NoticeLevel::Warning), vec![CYCLE_MESSAGE.to_string()]);

        // Removing A->B frees B->A
        flow.remove_connection(&ConnectionId::between(ep(1, 0), ep(2, 0)));
        assert!(flow.add_connection(ep(2, 0), ep(1, 0)).is_ok());
    }

    #[test]
    fn test_cycle_validation_can_be_disabled() {
        let options = FlowOptions {
            cycle_validation: false,
            ..FlowOptions::default()
        };
        let (mut flow, _) = flow_with_row(options);
        flow.add_connection(ep(1, 0), ep(2, 0)).unwrap();
        assert!(flow.add_connection(ep(2, 0), ep(1, 0)).is_ok());
    }

    #[test]
    fn test_draw_connection_gesture_commits() {
        let (mut flow, _) = flow_with_row(FlowOptions::default());
        flow.pointer_down(PointerButton::Primary, Point::new(300.0, 150.0));
        assert_eq!(flow.drawing(), DrawingState::Drawing { source: ep(1, 0) });
        assert!(flow.connections().temp().is_some());

        flow.pointer_move(PointerButton::Primary, Point::new(350.0, 120.0));
        assert_eq!(flow.connections().temp_end(), Some(Point::new(300.0, 150.0)));
        flow.frame();
        assert_eq!(flow.connections().temp_end(), Some(Point::new(350.0, 120.0)));

        flow.pointer_up(PointerButton::Primary, Point::new(400.0, 150.0));
        assert!(!flow.is_drawing());
        assert!(flow.connections().temp().is_none());
        assert!(flow.connections().contains(&ConnectionId::between(ep(1, 0), ep(2, 0))));
    }

    #[test]
    fn test_draw_released_on_canvas_cancels() {
        let (mut flow, _) = flow_with_row(FlowOptions::default());
        draw(&mut flow, Point::new(300.0, 150.0), Point::new(350.0, 400.0));
        assert!(!flow.is_drawing());
        assert!(flow.connections().temp().is_none());
        assert!(flow.connections().is_empty());
        assert!(flow.connections().layer().is_empty());
    }

    #[test]
    fn test_rejected_draw_marks_cycle_until_escape() {
        let (mut flow, notifier) = flow_with_row(FlowOptions::default());
        flow.add_connection(ep(1, 0), ep(2, 0)).unwrap();
        flow.add_connection(ep(2, 0), ep(3, 0)).unwrap();
        flow.add_connection(ep(3, 0), ep(4, 0)).unwrap();

        // D -> B
        draw(&mut flow, Point::new(1200.0, 150.0), Point::new(400.0, 150.0));
        assert!(flow.is_drawing());
        assert!(flow.connections().temp().is_some_and(|t| t.style().bad));
        let bc = ConnectionId::between(ep(2, 0), ep(3, 0));
        let cd = ConnectionId::between(ep(3, 0), ep(4, 0));
        assert!(flow.connections().is_bad(&bc));
        assert!(flow.connections().is_bad(&cd));
        assert!(!flow.connections().is_bad(&ConnectionId::between(ep(1, 0), ep(2, 0))));
        assert_eq!(notifier.messages(NoticeLevel::Warning), vec![CYCLE_MESSAGE.to_string()]);

        flow.key_down(Key::Escape);
        assert!(!flow.is_drawing());
        assert!(flow.connections().temp().is_none());
        assert_eq!(flow.connections().bad_paths().count(), 0);
        assert_eq!(flow.connections().len(), 3);
        assert_eq!(flow.connections().layer().paths().filter(|p| p.style.bad).count(), 0);

        // Escape again is harmless
        flow.key_down(Key::Escape);
        assert_eq!(flow.connections().len(), 3);
    }

    #[test]
    fn test_second_draw_start_ignored() {
        let (mut flow, _) = flow_with_row(FlowOptions::default());
        flow.pointer_down(PointerButton::Primary, Point::new(300.0, 150.0));
        flow.pointer_down(PointerButton::Primary, Point::new(600.0, 150.0));
        assert_eq!(flow.drawing(), DrawingState::Drawing { source: ep(1, 0) });
        assert_eq!(flow.connections().layer().len(), 1);
    }

    #[test]
    fn test_remove_node_cascades() {
        let (mut flow, _) = flow_with_row(FlowOptions::default());
        flow.add_connection(ep(1, 0), ep(2, 0)).unwrap();
        flow.add_connection(ep(2, 0), ep(3, 0)).unwrap();
        flow.add_connection(ep(3, 0), ep(4, 0)).unwrap();
        assert!(flow.select(SelectionTarget::Node(NodeId(2))));

        assert!(flow.remove_node(NodeId(2)));
        assert_eq!(flow.connections().len(), 1);
        assert_eq!(flow.selection(), None);
        assert!(!flow.remove_node(NodeId(2)));

        // The validator forgot the removed edges
        assert!(flow.add_connection(ep(3, 0), ep(1, 0)).is_ok());
    }

    #[test]
    fn test_drag_node_at_zoom_reroutes() {
        let options = FlowOptions {
            zoom: 2.0,
            ..FlowOptions::default()
        };
        let (mut flow, _) = flow_with_row(options);
        flow.add_connection(ep(1, 0), ep(2, 0)).unwrap();

        // Body of node 1 at logical (150, 170)
        flow.pointer_down(PointerButton::Primary, Point::new(300.0, 340.0));
        flow.pointer_move(PointerButton::Primary, Point::new(340.0, 380.0));
        flow.pointer_up(PointerButton::Primary, Point::new(340.0, 380.0));
        flow.frame();

        assert_eq!(flow.nodes().record(NodeId(1)).map(|r| r.position), Some(Point::new(120.0, 120.0)));
        let path = flow
            .connections()
            .get(&ConnectionId::between(ep(1, 0), ep(2, 0)))
            .and_then(|c| c.path().flatten(1).first().copied());
        assert_eq!(path, Some(Point::new(320.0, 170.0)));
        assert_eq!(flow.selection(), Some(&SelectionTarget::Node(NodeId(1))));
    }

    #[test]
    fn test_canvas_click_clears_selection_and_pans() {
        let (mut flow, _) = flow_with_row(FlowOptions::default());
        click(&mut flow, Point::new(150.0, 170.0));
        assert_eq!(flow.selection(), Some(&SelectionTarget::Node(NodeId(1))));
        assert!(flow.nodes().layer().nodes().any(|n| n.selected));

        flow.pointer_down(PointerButton::Primary, Point::new(50.0, 500.0));
        assert_eq!(flow.selection(), None);
        assert!(!flow.nodes().layer().nodes().any(|n| n.selected));
        flow.pointer_move(PointerButton::Primary, Point::new(80.0, 520.0));
        flow.pointer_up(PointerButton::Primary, Point::new(80.0, 520.0));
        flow.frame();
        assert_eq!(flow.pan(), Point::new(30.0, 20.0));
        assert_eq!(flow.hit_test(Point::new(180.0, 190.0)), HitTarget::Node(NodeId(1)));
    }

    #[test]
    fn test_execute_commands() {
        let (mut flow, notifier) = flow_with_row(FlowOptions::default());
        let id = flow.add_connection(ep(1, 0), ep(2, 0)).unwrap();
        assert!(!flow.execute("removable"));
        assert!(flow.select(SelectionTarget::Connection(id.clone())));

        let tags: Vec<String> = flow
            .available_commands()
            .iter()
            .map(|c| c.capability().to_string())
            .collect();
        assert_eq!(
            tags,
            ["path:bezier", "path:straight", "path:orthogonal", "path:step", "removable"]
        );

        assert!(flow.execute("path:bezier"));
        assert_eq!(flow.connections().get(&id).map(|c| c.style().path_type.as_str()), Some("bezier"));
        assert!(flow.selection().is_some());

        assert!(!flow.execute("resizable"));
        assert_eq!(
            notifier.messages(NoticeLevel::Error).last().map(String::as_str),
            Some("`resizable` is not supported")
        );

        assert!(flow.execute("removable"));
        assert!(flow.connections().is_empty());
        assert_eq!(flow.selection(), None);
    }

    #[test]
    fn test_label_edit_roundtrip() {
        let (mut flow, _) = flow_with_row(FlowOptions::default());
        flow.double_click(Point::new(150.0, 110.0));
        assert_eq!(flow.nodes().editing_label(), Some(NodeId(1)));
        flow.commit_label(NodeId(1), "  Fetch  ");
        assert_eq!(flow.nodes().record(NodeId(1)).map(|r| r.label.as_str()), Some("Fetch"));
        assert_eq!(flow.nodes().editing_label(), None);
    }

    #[test]
    fn test_wheel_and_drop() {
        let mut flow = Flow::new(FlowOptions::default()).unwrap();
        assert!((flow.wheel(-120.0) - 1.1).abs() < 1e-9);
        flow.set_zoom(1.0);
        let payload = DropPayload {
            module: "diagram".to_string(),
            group: "workflow".to_string(),
            name: "action".to_string(),
            ..DropPayload::default()
        };
        assert!(flow.drop_payload(&payload, Point::new(300.0, 300.0)));
        let record = flow.nodes().record(NodeId(1)).cloned().unwrap();
        assert_eq!(record.position, Point::new(200.0, 225.0));
        assert_eq!(record.label, "Action");
    }

    #[test]
    fn test_events_forwarded_to_listeners() {
        let mut flow = Flow::new(FlowOptions::default()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        flow.on(move |e| sink.borrow_mut().push(e.clone()));
        let id = flow.add_node(NodeConfig::new("default"));
        flow.remove_node(id);
        assert_eq!(
            *seen.borrow(),
            vec![
                FlowEvent::Node(NodeEvent::Added(id)),
                FlowEvent::Node(NodeEvent::Removed(id)),
            ]
        );
    }

    #[test]
    fn test_invalid_zoom_bounds_fail_construction() {
        let options = FlowOptions {
            min_zoom: 3.0,
            max_zoom: 0.5,
            ..FlowOptions::default()
        };
        assert!(matches!(
            Flow::new(options),
            Err(FlowError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn test_listeners_alone_leave_no_backlog() {
        let mut flow = Flow::new(FlowOptions::default()).unwrap();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        flow.on(move |_| *sink.borrow_mut() += 1);
        for _ in 0..500 {
            let id = flow.add_node(NodeConfig::new("default"));
            flow.remove_node(id);
        }
        assert_eq!(*count.borrow(), 1000);
        assert!(!flow.events.has_pending());
        assert!(flow.drain_events().is_empty());

        flow.queue_events(true);
        let id = flow.add_node(NodeConfig::new("default"));
        assert_eq!(flow.drain_events(), vec![FlowEvent::Node(NodeEvent::Added(id))]);
    }

    #[test]
    fn test_set_zoom_notifies_listeners() {
        let mut flow = Flow::new(FlowOptions::default()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        flow.on(move |e| sink.borrow_mut().push(e.clone()));
        flow.set_zoom(10.0);
        assert_eq!(flow.zoom(), 3.0);
        assert_eq!(
            *seen.borrow(),
            vec![FlowEvent::Canvas(CanvasEvent::Zoomed {
                zoom: 3.0,
                x: 0.0,
                y: 0.0,
                delta: 0.0
            })]
        );
    }

    #[test]
    fn test_reset_restarts_ids_and_validators() {
        let (mut flow, _) = flow_with_row(FlowOptions::default());
        flow.add_connection(ep(1, 0), ep(2, 0)).unwrap();
        flow.reset();
        assert!(flow.nodes().is_empty());
        assert!(flow.connections().is_empty());
        assert_eq!(flow.add_node(NodeConfig::new("default")), NodeId(1));
        flow.add_node(NodeConfig::new("default").with_position(400.0, 0.0));
        assert!(flow.add_connection(ep(2, 0), ep(1, 0)).is_ok());
    }
}
