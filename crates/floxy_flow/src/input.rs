// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host input forwarded to the engine.
//!
//! Screen coordinates are relative to the flow container's top-left corner.

use crate::connection::ConnectionId;
use crate::geometry::Point;
use crate::node::NodeId;

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    /// Left button
    #[default]
    Primary,
    /// Right button, reserved for context gestures
    Secondary,
    /// Wheel button
    Middle,
}

/// What the pointer is over
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HitTarget {
    /// Empty canvas
    #[default]
    Canvas,
    /// Node body
    Node(NodeId),
    /// Node label area
    Label(NodeId),
    /// Node resize handle
    ResizeHandle(NodeId),
    /// Output port
    OutputPort {
        /// Owning node
        node_id: NodeId,
        /// Port index
        port: usize,
    },
    /// Input port
    InputPort {
        /// Owning node
        node_id: NodeId,
        /// Port index
        port: usize,
    },
    /// Committed connection
    Connection(ConnectionId),
}

impl HitTarget {
    /// Node this target belongs to, if any
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) | Self::Label(id) | Self::ResizeHandle(id) => Some(*id),
            Self::OutputPort { node_id, .. } | Self::InputPort { node_id, .. } => Some(*node_id),
            Self::Canvas | Self::Connection(_) => None,
        }
    }
}

/// A pointer sample
#[derive(Debug, Clone, PartialEq)]
pub struct PointerInput {
    /// Button involved
    pub button: PointerButton,
    /// Position relative to the container
    pub screen: Point,
    /// Element under the pointer
    pub target: HitTarget,
}

impl PointerInput {
    /// Primary-button sample
    pub fn primary(screen: Point, target: HitTarget) -> Self {
        Self {
            button: PointerButton::Primary,
            screen,
            target,
        }
    }
}

/// Keyboard keys the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Cancels a drawing session
    Escape,
    /// Anything else
    Other,
}

/// Input dispatched to behaviors
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Button pressed
    PointerDown(PointerInput),
    /// Pointer moved
    PointerMove(PointerInput),
    /// Button released
    PointerUp(PointerInput),
    /// Double click
    DoubleClick(PointerInput),
    /// Label editor committed its text
    LabelCommit {
        /// Edited node
        node_id: NodeId,
        /// New text, untrimmed
        text: String,
    },
}

impl InputEvent {
    /// Pointer sample carried by the event
    pub fn pointer(&self) -> Option<&PointerInput> {
        match self {
            Self::PointerDown(p) | Self::PointerMove(p) | Self::PointerUp(p) | Self::DoubleClick(p) => Some(p),
            Self::LabelCommit { .. } => None,
        }
    }
}
