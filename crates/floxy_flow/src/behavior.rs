// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capability-gated behaviors.
//!
//! A behavior is created per entity from the capability registry and attached
//! once the entity has been rendered. Attachment needs two things: the entity
//! still declares the behavior's capability, and the behavior's guard accepts
//! the entity (usually a probe on the node view). Behaviors never mutate their
//! entity directly; they push actions that the owning manager applies.

use crate::drag::{DragController, ZoomHandle};
use crate::geometry::{Point, Size};
use crate::input::{HitTarget, InputEvent, PointerButton};
use crate::connection::ConnectionRecord;
use crate::node::NodeRecord;
use crate::view::NodeView;
use indexmap::IndexSet;
use std::fmt;
use tracing::warn;

/// Ambient values handed to every behavior constructor
#[derive(Debug, Clone)]
pub struct BehaviorOptions {
    /// Live zoom factor
    pub zoom: ZoomHandle,
    /// Smallest size reachable by resizing
    pub min_size: Size,
}

impl Default for BehaviorOptions {
    fn default() -> Self {
        Self {
            zoom: ZoomHandle::default(),
            min_size: Size::new(80.0, 40.0),
        }
    }
}

/// Change requested by a node behavior
#[derive(Debug, Clone, PartialEq)]
pub enum NodeAction {
    /// Move to an absolute logical position
    Move(Point),
    /// Resize to an absolute size
    Resize(Size),
    /// Become the active selection
    Select,
    /// Replace the label
    Rename(String),
    /// Open the label editor
    BeginLabelEdit,
}

/// Change requested by a connection behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Become the active selection
    Select,
    /// Set the hover flag
    Hover(bool),
}

/// Attach/detach lifecycle shared by all behaviors
pub trait Behavior {
    /// Capability tag this behavior implements
    fn capability(&self) -> &'static str;

    /// Whether the behavior is live
    fn is_attached(&self) -> bool;

    /// Start reacting to input
    fn attach(&mut self);

    /// Stop reacting to input and release session state
    fn detach(&mut self);
}

/// Behavior bound to a node
pub trait NodeBehavior: Behavior {
    /// Whether the node can support this behavior
    fn guard(&self, _record: &NodeRecord, _view: &dyn NodeView) -> bool {
        true
    }

    /// React to input
    fn on_input(
        &mut self,
        _event: &InputEvent,
        _record: &NodeRecord,
        _view: &dyn NodeView,
        _actions: &mut Vec<NodeAction>,
    ) {
    }

    /// Per-frame work
    fn on_frame(&mut self, _record: &NodeRecord, _actions: &mut Vec<NodeAction>) {}
}

/// Behavior bound to a committed connection
pub trait ConnectionBehavior: Behavior {
    /// Whether the connection can support this behavior
    fn guard(&self, _record: &ConnectionRecord) -> bool {
        true
    }

    /// React to input
    fn on_input(
        &mut self,
        _event: &InputEvent,
        _record: &ConnectionRecord,
        _actions: &mut Vec<ConnectionAction>,
    ) {
    }
}

/// The behaviors resolved for one entity.
///
/// Dropping the set detaches whatever is still attached.
pub struct BehaviorSet<B: ?Sized + Behavior> {
    behaviors: Vec<Box<B>>,
}

impl<B: ?Sized + Behavior> BehaviorSet<B> {
    /// Wrap resolved, still detached behaviors
    pub fn new(behaviors: Vec<Box<B>>) -> Self {
        Self { behaviors }
    }

    /// Set with no behaviors
    pub fn empty() -> Self {
        Self {
            behaviors: Vec::new(),
        }
    }

    /// Attach every behavior whose capability is declared and whose guard
    /// passes. Returns how many were attached.
    pub fn attach_all(&mut self, declared: &IndexSet<String>, mut guard: impl FnMut(&B) -> bool) -> usize {
        let mut attached = 0;
        for behavior in &mut self.behaviors {
            if behavior.is_attached() || !declared.contains(behavior.capability()) {
                continue;
            }
            if !guard(&**behavior) {
                warn!(
                    "Behavior '{}' not supported by this entity, skipping",
                    behavior.capability()
                );
                continue;
            }
            behavior.attach();
            attached += 1;
        }
        attached
    }

    /// Detach everything
    pub fn detach_all(&mut self) {
        for behavior in &mut self.behaviors {
            if behavior.is_attached() {
                behavior.detach();
            }
        }
    }

    /// Attached behaviors
    pub fn attached_mut(&mut self) -> impl Iterator<Item = &mut B> + '_ {
        self.behaviors
            .iter_mut()
            .filter(|b| b.is_attached())
            .map(|b| &mut **b)
    }

    /// Capabilities of the attached behaviors
    pub fn attached(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.behaviors
            .iter()
            .filter(|b| b.is_attached())
            .map(|b| b.capability())
    }

    /// Whether the behavior for `capability` is attached
    pub fn is_attached(&self, capability: &str) -> bool {
        self.attached().any(|c| c == capability)
    }

    /// Number of resolved behaviors, attached or not
    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    /// Whether no behaviors were resolved
    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

impl<B: ?Sized + Behavior> Drop for BehaviorSet<B> {
    fn drop(&mut self) {
        self.detach_all();
    }
}

impl<B: ?Sized + Behavior> fmt::Debug for BehaviorSet<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.behaviors.iter().map(|b| (b.capability(), b.is_attached())))
            .finish()
    }
}

fn pressed_on(target: &HitTarget, record: &NodeRecord) -> bool {
    matches!(target, HitTarget::Node(id) | HitTarget::Label(id) if *id == record.id)
}

/// Drags the node body (`movable`)
#[derive(Debug)]
pub struct DraggableBehavior {
    zoom: ZoomHandle,
    drag: Option<DragController>,
}

impl DraggableBehavior {
    /// Create a detached behavior
    pub fn new(options: &BehaviorOptions) -> Self {
        Self {
            zoom: options.zoom.clone(),
            drag: None,
        }
    }

    /// Registry constructor
    pub fn factory(options: &BehaviorOptions) -> Box<dyn NodeBehavior> {
        Box::new(Self::new(options))
    }
}

impl Behavior for DraggableBehavior {
    fn capability(&self) -> &'static str {
        "movable"
    }

    fn is_attached(&self) -> bool {
        self.drag.is_some()
    }

    fn attach(&mut self) {
        self.drag = Some(DragController::new(Point::ZERO, self.zoom.clone()));
    }

    fn detach(&mut self) {
        if let Some(mut drag) = self.drag.take() {
            drag.destroy();
        }
    }
}

impl NodeBehavior for DraggableBehavior {
    fn guard(&self, _record: &NodeRecord, view: &dyn NodeView) -> bool {
        view.as_movable().is_some()
    }

    fn on_input(
        &mut self,
        event: &InputEvent,
        record: &NodeRecord,
        _view: &dyn NodeView,
        _actions: &mut Vec<NodeAction>,
    ) {
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        match event {
            InputEvent::PointerDown(p) if pressed_on(&p.target, record) => {
                drag.press(p.button, p.screen, record.position);
            }
            InputEvent::PointerMove(p) => drag.pointer_move(p.button, p.screen),
            InputEvent::PointerUp(p) => drag.release(p.button),
            _ => {}
        }
    }

    fn on_frame(&mut self, _record: &NodeRecord, actions: &mut Vec<NodeAction>) {
        if let Some(position) = self.drag.as_mut().and_then(DragController::frame) {
            actions.push(NodeAction::Move(position));
        }
    }
}

/// Selects the node on press (`selectable`)
#[derive(Debug, Default)]
pub struct SelectableBehavior {
    attached: bool,
}

impl SelectableBehavior {
    /// Registry constructor
    pub fn factory(_options: &BehaviorOptions) -> Box<dyn NodeBehavior> {
        Box::<Self>::default()
    }
}

impl Behavior for SelectableBehavior {
    fn capability(&self) -> &'static str {
        "selectable"
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
    }
}

impl NodeBehavior for SelectableBehavior {
    fn guard(&self, _record: &NodeRecord, view: &dyn NodeView) -> bool {
        view.as_selectable().is_some()
    }

    fn on_input(
        &mut self,
        event: &InputEvent,
        record: &NodeRecord,
        _view: &dyn NodeView,
        actions: &mut Vec<NodeAction>,
    ) {
        if let InputEvent::PointerDown(p) = event {
            let on_node = matches!(
                p.target,
                HitTarget::Node(id) | HitTarget::Label(id) | HitTarget::ResizeHandle(id) if id == record.id
            );
            if on_node && p.button == PointerButton::Primary {
                actions.push(NodeAction::Select);
            }
        }
    }
}

/// Renames the node through an inline editor (`editable-label`)
#[derive(Debug, Default)]
pub struct EditableLabelBehavior {
    attached: bool,
    editing: bool,
}

impl EditableLabelBehavior {
    /// Registry constructor
    pub fn factory(_options: &BehaviorOptions) -> Box<dyn NodeBehavior> {
        Box::<Self>::default()
    }
}

impl Behavior for EditableLabelBehavior {
    fn capability(&self) -> &'static str {
        "editable-label"
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.editing = false;
    }
}

impl NodeBehavior for EditableLabelBehavior {
    fn guard(&self, _record: &NodeRecord, view: &dyn NodeView) -> bool {
        view.as_label_editable().is_some()
    }

    fn on_input(
        &mut self,
        event: &InputEvent,
        record: &NodeRecord,
        _view: &dyn NodeView,
        actions: &mut Vec<NodeAction>,
    ) {
        match event {
            InputEvent::DoubleClick(p) if p.target == HitTarget::Label(record.id) => {
                self.editing = true;
                actions.push(NodeAction::BeginLabelEdit);
            }
            InputEvent::LabelCommit { node_id, text } if *node_id == record.id && self.editing => {
                self.editing = false;
                actions.push(NodeAction::Rename(text.trim().to_string()));
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ResizeSession {
    press: Point,
    start: Size,
}

/// Resizes the node from its corner handle (`resizable`)
#[derive(Debug)]
pub struct ResizableBehavior {
    zoom: ZoomHandle,
    min_size: Size,
    attached: bool,
    session: Option<ResizeSession>,
}

impl ResizableBehavior {
    /// Create a detached behavior
    pub fn new(options: &BehaviorOptions) -> Self {
        Self {
            zoom: options.zoom.clone(),
            min_size: options.min_size,
            attached: false,
            session: None,
        }
    }

    /// Registry constructor
    pub fn factory(options: &BehaviorOptions) -> Box<dyn NodeBehavior> {
        Box::new(Self::new(options))
    }
}

impl Behavior for ResizableBehavior {
    fn capability(&self) -> &'static str {
        "resizable"
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.session = None;
    }
}

impl NodeBehavior for ResizableBehavior {
    fn guard(&self, _record: &NodeRecord, view: &dyn NodeView) -> bool {
        view.as_resizable().is_some()
    }

    fn on_input(
        &mut self,
        event: &InputEvent,
        record: &NodeRecord,
        _view: &dyn NodeView,
        actions: &mut Vec<NodeAction>,
    ) {
        match event {
            InputEvent::PointerDown(p)
                if p.button == PointerButton::Primary && p.target == HitTarget::ResizeHandle(record.id) =>
            {
                self.session = Some(ResizeSession {
                    press: p.screen,
                    start: record.size,
                });
            }
            InputEvent::PointerMove(p) => {
                if let Some(session) = self.session {
                    let delta = (p.screen - session.press).scale_down(self.zoom.get());
                    actions.push(NodeAction::Resize(Size::new(
                        (session.start.w + delta.x).max(self.min_size.w),
                        (session.start.h + delta.y).max(self.min_size.h),
                    )));
                }
            }
            InputEvent::PointerUp(_) => self.session = None,
            _ => {}
        }
    }
}

/// Selects the connection on click (`selectable`)
#[derive(Debug, Default)]
pub struct SelectableConnectionBehavior {
    attached: bool,
}

impl SelectableConnectionBehavior {
    /// Registry constructor
    pub fn factory(_options: &BehaviorOptions) -> Box<dyn ConnectionBehavior> {
        Box::<Self>::default()
    }
}

impl Behavior for SelectableConnectionBehavior {
    fn capability(&self) -> &'static str {
        "selectable"
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
    }
}

impl ConnectionBehavior for SelectableConnectionBehavior {
    fn on_input(
        &mut self,
        event: &InputEvent,
        record: &ConnectionRecord,
        actions: &mut Vec<ConnectionAction>,
    ) {
        if let InputEvent::PointerDown(p) = event {
            if p.button == PointerButton::Primary && p.target == HitTarget::Connection(record.id.clone()) {
                actions.push(ConnectionAction::Select);
            }
        }
    }
}

/// Tracks whether the pointer is over the connection (`hoverable`)
#[derive(Debug, Default)]
pub struct HoverBehavior {
    attached: bool,
    hovering: bool,
}

impl HoverBehavior {
    /// Registry constructor
    pub fn factory(_options: &BehaviorOptions) -> Box<dyn ConnectionBehavior> {
        Box::<Self>::default()
    }
}

impl Behavior for HoverBehavior {
    fn capability(&self) -> &'static str {
        "hoverable"
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.hovering = false;
    }
}

impl ConnectionBehavior for HoverBehavior {
    fn on_input(
        &mut self,
        event: &InputEvent,
        record: &ConnectionRecord,
        actions: &mut Vec<ConnectionAction>,
    ) {
        if let InputEvent::PointerMove(p) = event {
            let over = matches!(&p.target, HitTarget::Connection(id) if *id == record.id);
            if over != self.hovering {
                self.hovering = over;
                actions.push(ConnectionAction::Hover(over));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PointerInput;
    use crate::node::{NodeConfig, NodeId};
    use crate::view::{DefaultView, EllipseView};

    fn record() -> NodeRecord {
        NodeRecord::from_config(NodeId(1), &NodeConfig::new("task").with_position(10.0, 10.0))
    }

    fn node_set(options: &BehaviorOptions) -> BehaviorSet<dyn NodeBehavior> {
        BehaviorSet::new(vec![
            DraggableBehavior::factory(options),
            SelectableBehavior::factory(options),
            EditableLabelBehavior::factory(options),
            ResizableBehavior::factory(options),
        ])
    }

    #[test]
    fn test_attach_is_two_gated() {
        let r = record();
        let options = BehaviorOptions::default();

        let mut set = node_set(&options);
        let declared: IndexSet<String> = ["movable", "resizable"].iter().map(|s| s.to_string()).collect();
        assert_eq!(set.attach_all(&declared, |b| b.guard(&r, &DefaultView)), 2);
        assert!(set.is_attached("movable"));
        assert!(!set.is_attached("selectable"));

        // Ellipse cannot resize: the guard downgrades silently
        let mut set = node_set(&options);
        assert_eq!(set.attach_all(&r.capabilities, |b| b.guard(&r, &EllipseView)), 3);
        assert!(!set.is_attached("resizable"));

        set.detach_all();
        assert_eq!(set.attached().count(), 0);
    }

    #[test]
    fn test_drag_moves_node() {
        let r = record();
        let options = BehaviorOptions::default();
        options.zoom.set(2.0);
        let mut drag = DraggableBehavior::new(&options);
        drag.attach();

        let mut actions = Vec::new();
        let down = InputEvent::PointerDown(PointerInput::primary(Point::new(0.0, 0.0), HitTarget::Node(NodeId(1))));
        let moved = InputEvent::PointerMove(PointerInput::primary(Point::new(20.0, 40.0), HitTarget::Canvas));
        drag.on_input(&down, &r, &DefaultView, &mut actions);
        drag.on_input(&moved, &r, &DefaultView, &mut actions);
        drag.on_frame(&r, &mut actions);
        assert_eq!(actions, vec![NodeAction::Move(Point::new(20.0, 30.0))]);
    }

    #[test]
    fn test_label_commit_trims_after_double_click() {
        let r = record();
        let mut label = EditableLabelBehavior::default();
        label.attach();
        let mut actions = Vec::new();
        let commit = InputEvent::LabelCommit {
            node_id: NodeId(1),
            text: "  Renamed ".to_string(),
        };
        label.on_input(&commit, &r, &DefaultView, &mut actions);
        assert!(actions.is_empty());

        let dbl = InputEvent::DoubleClick(PointerInput::primary(Point::ZERO, HitTarget::Label(NodeId(1))));
        label.on_input(&dbl, &r, &DefaultView, &mut actions);
        label.on_input(&commit, &r, &DefaultView, &mut actions);
        assert_eq!(
            actions,
            vec![NodeAction::BeginLabelEdit, NodeAction::Rename("Renamed".to_string())]
        );
    }

    #[test]
    fn test_resize_respects_minimum() {
        let r = record();
        let mut resize = ResizableBehavior::new(&BehaviorOptions::default());
        resize.attach();
        let mut actions = Vec::new();
        let down = InputEvent::PointerDown(PointerInput::primary(Point::ZERO, HitTarget::ResizeHandle(NodeId(1))));
        let shrink = InputEvent::PointerMove(PointerInput::primary(Point::new(-500.0, 10.0), HitTarget::Canvas));
        resize.on_input(&down, &r, &DefaultView, &mut actions);
        resize.on_input(&shrink, &r, &DefaultView, &mut actions);
        assert_eq!(actions, vec![NodeAction::Resize(Size::new(80.0, 110.0))]);
    }

    #[test]
    fn test_hover_toggles_once() {
        use crate::port::Endpoint;
        let record = ConnectionRecord::committed(Endpoint::new(NodeId(1), 0), Endpoint::new(NodeId(2), 0), &[]);
        let mut hover = HoverBehavior::default();
        hover.attach();
        let mut actions = Vec::new();
        let over = InputEvent::PointerMove(PointerInput::primary(Point::ZERO, HitTarget::Connection(record.id.clone())));
        let away = InputEvent::PointerMove(PointerInput::primary(Point::ZERO, HitTarget::Canvas));
        hover.on_input(&over, &record, &mut actions);
        hover.on_input(&over, &record, &mut actions);
        hover.on_input(&away, &record, &mut actions);
        assert_eq!(actions, vec![ConnectionAction::Hover(true), ConnectionAction::Hover(false)]);
    }
}
