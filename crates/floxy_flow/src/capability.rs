// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capability registry.
//!
//! Maps `(entity kind, capability tag)` to either a behavior constructor or a
//! shared command. Resolution walks an entity's declared capabilities in
//! order and skips tags nothing is registered for.

use crate::behavior::{
    BehaviorOptions, BehaviorSet, ConnectionBehavior, DraggableBehavior, EditableLabelBehavior,
    HoverBehavior, NodeBehavior, ResizableBehavior, SelectableBehavior,
    SelectableConnectionBehavior,
};
use crate::command::{Command, RemoveCommand, SetPathCommand};
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::rc::Rc;

/// Kind of entity a capability applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Nodes
    Node,
    /// Committed connections
    Connection,
}

/// Node behavior constructor
pub type NodeBehaviorFactory = fn(&BehaviorOptions) -> Box<dyn NodeBehavior>;

/// Connection behavior constructor
pub type ConnectionBehaviorFactory = fn(&BehaviorOptions) -> Box<dyn ConnectionBehavior>;

/// What a capability tag resolves to
#[derive(Clone)]
pub enum Registration {
    /// Per-node behavior
    NodeBehavior(NodeBehaviorFactory),
    /// Per-connection behavior
    ConnectionBehavior(ConnectionBehaviorFactory),
    /// Shared command
    Command(Rc<dyn Command>),
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeBehavior(_) => f.write_str("NodeBehavior"),
            Self::ConnectionBehavior(_) => f.write_str("ConnectionBehavior"),
            Self::Command(command) => write!(f, "Command({:?})", command),
        }
    }
}

/// Registry of behaviors and commands
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: IndexMap<(EntityKind, String), Registration>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in behavior and command
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_node_behavior("movable", DraggableBehavior::factory);
        registry.register_node_behavior("selectable", SelectableBehavior::factory);
        registry.register_node_behavior("editable-label", EditableLabelBehavior::factory);
        registry.register_node_behavior("resizable", ResizableBehavior::factory);
        registry.register_command(EntityKind::Node, Rc::new(RemoveCommand));

        registry.register_connection_behavior("selectable", SelectableConnectionBehavior::factory);
        registry.register_connection_behavior("hoverable", HoverBehavior::factory);
        registry.register_command(EntityKind::Connection, Rc::new(RemoveCommand));
        for command in SetPathCommand::defaults() {
            registry.register_command(EntityKind::Connection, Rc::new(command));
        }
        registry
    }

    /// Register a node behavior under `tag`
    pub fn register_node_behavior(&mut self, tag: impl Into<String>, factory: NodeBehaviorFactory) {
        self.entries
            .insert((EntityKind::Node, tag.into()), Registration::NodeBehavior(factory));
    }

    /// Register a connection behavior under `tag`
    pub fn register_connection_behavior(&mut self, tag: impl Into<String>, factory: ConnectionBehaviorFactory) {
        self.entries.insert(
            (EntityKind::Connection, tag.into()),
            Registration::ConnectionBehavior(factory),
        );
    }

    /// Register a command under its own capability tag
    pub fn register_command(&mut self, kind: EntityKind, command: Rc<dyn Command>) {
        let tag = command.capability().to_string();
        self.entries.insert((kind, tag), Registration::Command(command));
    }

    /// Look up a registration
    pub fn get(&self, kind: EntityKind, tag: &str) -> Option<&Registration> {
        self.entries.get(&(kind, tag.to_string()))
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Instantiate the node behaviors for a capability list
    pub fn resolve_node_behaviors(
        &self,
        capabilities: &IndexSet<String>,
        options: &BehaviorOptions,
    ) -> BehaviorSet<dyn NodeBehavior> {
        let behaviors = capabilities
            .iter()
            .filter_map(|tag| match self.get(EntityKind::Node, tag) {
                Some(Registration::NodeBehavior(factory)) => Some(factory(options)),
                _ => None,
            })
            .collect();
        BehaviorSet::new(behaviors)
    }

    /// Instantiate the connection behaviors for a capability list
    pub fn resolve_connection_behaviors(
        &self,
        capabilities: &IndexSet<String>,
        options: &BehaviorOptions,
    ) -> BehaviorSet<dyn ConnectionBehavior> {
        let behaviors = capabilities
            .iter()
            .filter_map(|tag| match self.get(EntityKind::Connection, tag) {
                Some(Registration::ConnectionBehavior(factory)) => Some(factory(options)),
                _ => None,
            })
            .collect();
        BehaviorSet::new(behaviors)
    }

    /// Commands available for a capability list, sorted by order
    pub fn resolve_commands(&self, kind: EntityKind, capabilities: &IndexSet<String>) -> Vec<Rc<dyn Command>> {
        let mut commands: Vec<Rc<dyn Command>> = capabilities
            .iter()
            .filter_map(|tag| match self.get(kind, tag) {
                Some(Registration::Command(command)) => Some(Rc::clone(command)),
                _ => None,
            })
            .collect();
        commands.sort_by_key(|c| c.order());
        commands
    }

    /// Find a command by tag
    pub fn command(&self, kind: EntityKind, tag: &str) -> Option<Rc<dyn Command>> {
        match self.get(kind, tag) {
            Some(Registration::Command(command)) => Some(Rc::clone(command)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(tags: &[&str]) -> IndexSet<String> {
        tags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_by_kind() {
        let registry = CapabilityRegistry::with_defaults();
        let options = BehaviorOptions::default();

        let node = registry.resolve_node_behaviors(&caps(&["movable", "selectable", "removable", "bogus"]), &options);
        assert_eq!(node.len(), 2);

        let connection = registry.resolve_connection_behaviors(&caps(&["selectable", "hoverable", "movable"]), &options);
        assert_eq!(connection.len(), 2);
    }

    #[test]
    fn test_commands_sorted() {
        let registry = CapabilityRegistry::with_defaults();
        let commands = registry.resolve_commands(
            EntityKind::Connection,
            &caps(&["removable", "path:step", "path:bezier", "selectable"]),
        );
        let tags: Vec<&str> = commands.iter().map(|c| c.capability()).collect();
        assert_eq!(tags, ["path:bezier", "path:step", "removable"]);
        assert!(registry.command(EntityKind::Node, "path:bezier").is_none());
        assert!(registry.command(EntityKind::Node, "removable").is_some());
    }
}
