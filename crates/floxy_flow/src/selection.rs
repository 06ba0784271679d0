// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-item selection.

use crate::capability::EntityKind;
use crate::command::Command;
use crate::connection::ConnectionId;
use crate::node::NodeId;
use std::rc::Rc;

/// What is selected
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectionTarget {
    /// A node
    Node(NodeId),
    /// A committed connection
    Connection(ConnectionId),
}

impl SelectionTarget {
    /// Which manager owns the target
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Connection(_) => EntityKind::Connection,
        }
    }
}

/// Holds at most one selected component and the commands it supports
#[derive(Debug, Default)]
pub struct SelectionManager {
    active: Option<SelectionTarget>,
    commands: Vec<Rc<dyn Command>>,
}

impl SelectionManager {
    /// Empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection. Returns the previous target.
    pub fn select(&mut self, target: SelectionTarget, commands: Vec<Rc<dyn Command>>) -> Option<SelectionTarget> {
        self.commands = commands;
        self.active.replace(target)
    }

    /// Clear the selection. Returns the previous target.
    pub fn clear(&mut self) -> Option<SelectionTarget> {
        self.commands.clear();
        self.active.take()
    }

    /// Current target
    pub fn active(&self) -> Option<&SelectionTarget> {
        self.active.as_ref()
    }

    /// Whether `target` is the current selection
    pub fn is_selected(&self, target: &SelectionTarget) -> bool {
        self.active.as_ref() == Some(target)
    }

    /// Commands resolved for the current target
    pub fn commands(&self) -> &[Rc<dyn Command>] {
        &self.commands
    }

    /// Find a resolved command by capability tag
    pub fn command(&self, tag: &str) -> Option<Rc<dyn Command>> {
        self.commands.iter().find(|c| c.capability() == tag).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RemoveCommand;

    #[test]
    fn test_select_replaces_previous() {
        let mut selection = SelectionManager::new();
        assert_eq!(selection.select(SelectionTarget::Node(NodeId(1)), Vec::new()), None);
        let previous = selection.select(
            SelectionTarget::Node(NodeId(2)),
            vec![Rc::new(RemoveCommand) as Rc<dyn Command>],
        );
        assert_eq!(previous, Some(SelectionTarget::Node(NodeId(1))));
        assert!(selection.is_selected(&SelectionTarget::Node(NodeId(2))));
        assert!(selection.command("removable").is_some());

        assert_eq!(selection.clear(), Some(SelectionTarget::Node(NodeId(2))));
        assert!(selection.commands().is_empty());
        assert_eq!(selection.active(), None);
    }
}
