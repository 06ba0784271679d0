// SPDX-License-Identifier: MIT OR Apache-2.0
//! Selection-scoped commands.

use crate::flow::Flow;
use crate::selection::SelectionTarget;
use std::fmt;

/// Stateless operation run against the current selection
pub trait Command: fmt::Debug {
    /// Capability tag gating the command
    fn capability(&self) -> &str;

    /// Toolbar label
    fn label(&self) -> &str;

    /// Toolbar sort key, lower first
    fn order(&self) -> i32 {
        0
    }

    /// Toolbar group
    fn group(&self) -> &str {
        "default"
    }

    /// Whether a successful run clears the selection
    fn clear_selection(&self) -> bool {
        false
    }

    /// Run against `target`. Returns whether anything happened.
    fn execute(&self, flow: &mut Flow, target: &SelectionTarget) -> bool;
}

/// Deletes the selected node or connection (`removable`)
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveCommand;

impl Command for RemoveCommand {
    fn capability(&self) -> &str {
        "removable"
    }

    fn label(&self) -> &str {
        "Delete"
    }

    fn order(&self) -> i32 {
        100
    }

    fn clear_selection(&self) -> bool {
        true
    }

    fn execute(&self, flow: &mut Flow, target: &SelectionTarget) -> bool {
        match target {
            SelectionTarget::Node(id) => flow.remove_node(*id),
            SelectionTarget::Connection(id) => flow.remove_connection(id),
        }
    }
}

/// Switches the selected connection's path strategy (`path:<name>`)
#[derive(Debug, Clone)]
pub struct SetPathCommand {
    path_type: &'static str,
    capability: String,
    label: &'static str,
    order: i32,
}

impl SetPathCommand {
    /// Command for a registered path type
    pub fn new(path_type: &'static str, label: &'static str, order: i32) -> Self {
        Self {
            path_type,
            capability: format!("path:{}", path_type),
            label,
            order,
        }
    }

    /// The built-in path commands
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("bezier", "Bezier", 10),
            Self::new("straight", "Line", 20),
            Self::new("orthogonal", "Orthogonal", 30),
            Self::new("step", "Step", 40),
        ]
    }

    /// Path type applied by this command
    pub fn path_type(&self) -> &str {
        self.path_type
    }
}

impl Command for SetPathCommand {
    fn capability(&self) -> &str {
        &self.capability
    }

    fn label(&self) -> &str {
        self.label
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn group(&self) -> &str {
        "path"
    }

    fn execute(&self, flow: &mut Flow, target: &SelectionTarget) -> bool {
        match target {
            SelectionTarget::Connection(id) => flow.set_path_type(id, self.path_type),
            SelectionTarget::Node(_) => false,
        }
    }
}
