// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection validators.
//!
//! Every validator is asked before an edge is committed and told about every
//! edge that is added or removed afterwards.

use crate::node::NodeId;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Message attached to cycle rejections
pub const CYCLE_MESSAGE: &str = "This connection will create cyclic flow.";

/// Outcome of a connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the edge may exist
    pub valid: bool,
    /// User-facing reason for a rejection
    pub message: Option<String>,
    /// Nodes along the offending path, first and last equal for a cycle
    pub stack: Option<Vec<NodeId>>,
}

impl ValidationResult {
    /// Accept the edge
    pub fn accept() -> Self {
        Self {
            valid: true,
            message: None,
            stack: None,
        }
    }

    /// Reject the edge
    pub fn reject(message: impl Into<String>, stack: Option<Vec<NodeId>>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
            stack,
        }
    }
}

/// Plugin vetoing or approving candidate edges
pub trait Validator: fmt::Debug {
    /// Name used in logs and rejection reports
    fn name(&self) -> &str;

    /// May `out_node -> in_node` exist?
    fn on_connection_attempt(&mut self, out_node: NodeId, in_node: NodeId) -> ValidationResult;

    /// An edge was committed
    fn on_connection_added(&mut self, _out_node: NodeId, _in_node: NodeId) {}

    /// An edge was removed
    fn on_connection_removed(&mut self, _out_node: NodeId, _in_node: NodeId) {}
}

/// Incremental directed-cycle detector.
///
/// Accept and reject decisions are memoized per ordered node pair. Adding an
/// edge caches it as acyclic; removing any edge forgets every cached
/// rejection, since the removal may have broken the cycle.
#[derive(Debug, Clone)]
pub struct CycleValidator {
    enabled: bool,
    adjacency: IndexMap<NodeId, IndexSet<NodeId>>,
    /// `false` means "not cyclic"; read inverted
    confirmed_acyclic: HashMap<(NodeId, NodeId), bool>,
    confirmed_cyclic: HashMap<(NodeId, NodeId), Vec<NodeId>>,
}

impl CycleValidator {
    /// Create an enabled validator
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// Create a validator, possibly disabled
    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            adjacency: IndexMap::new(),
            confirmed_acyclic: HashMap::new(),
            confirmed_cyclic: HashMap::new(),
        }
    }

    /// Whether attempts are checked
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle checking
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Successors of `node`
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.get(&node).into_iter().flatten().copied()
    }

    /// Number of cached rejections
    pub fn cached_rejections(&self) -> usize {
        self.confirmed_cyclic.len()
    }
}

impl Default for CycleValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth-first search from `node`. `stack` holds the current recursion path
/// and ends with the repeated node when a cycle is found.
fn is_cyclic(
    adjacency: &IndexMap<NodeId, IndexSet<NodeId>>,
    node: NodeId,
    visited: &mut HashSet<NodeId>,
    stack: &mut Vec<NodeId>,
) -> bool {
    if stack.contains(&node) {
        stack.push(node);
        return true;
    }
    if !visited.insert(node) {
        return false;
    }
    stack.push(node);
    if let Some(neighbors) = adjacency.get(&node) {
        for &next in neighbors {
            if is_cyclic(adjacency, next, visited, stack) {
                return true;
            }
        }
    }
    stack.pop();
    false
}

impl Validator for CycleValidator {
    fn name(&self) -> &str {
        "cycle"
    }

    fn on_connection_attempt(&mut self, out_node: NodeId, in_node: NodeId) -> ValidationResult {
        if !self.enabled {
            return ValidationResult::accept();
        }
        let key = (out_node, in_node);
        if let Some(&cyclic) = self.confirmed_acyclic.get(&key) {
            return ValidationResult {
                valid: !cyclic,
                message: None,
                stack: None,
            };
        }
        if let Some(stack) = self.confirmed_cyclic.get(&key) {
            return ValidationResult::reject(CYCLE_MESSAGE, Some(stack.clone()));
        }

        let mut virtual_neighbors: IndexSet<NodeId> = self.neighbors(out_node).collect();
        virtual_neighbors.insert(in_node);

        let mut visited = HashSet::from([out_node]);
        let mut stack = vec![out_node];
        for next in virtual_neighbors {
            if is_cyclic(&self.adjacency, next, &mut visited, &mut stack) {
                self.confirmed_cyclic.insert(key, stack.clone());
                return ValidationResult::reject(CYCLE_MESSAGE, Some(stack));
            }
        }
        ValidationResult::accept()
    }

    fn on_connection_added(&mut self, out_node: NodeId, in_node: NodeId) {
        self.adjacency.entry(out_node).or_default().insert(in_node);
        self.confirmed_acyclic.insert((out_node, in_node), false);
        self.confirmed_cyclic.remove(&(out_node, in_node));
    }

    fn on_connection_removed(&mut self, out_node: NodeId, in_node: NodeId) {
        if let Some(neighbors) = self.adjacency.get_mut(&out_node) {
            neighbors.shift_remove(&in_node);
        }
        self.confirmed_acyclic.remove(&(out_node, in_node));
        self.confirmed_cyclic.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NodeId = NodeId(1);
    const B: NodeId = NodeId(2);
    const C: NodeId = NodeId(3);
    const D: NodeId = NodeId(4);

    fn chain(edges: &[(NodeId, NodeId)]) -> CycleValidator {
        let mut validator = CycleValidator::new();
        for &(out, inn) in edges {
            assert!(validator.on_connection_attempt(out, inn).valid);
            validator.on_connection_added(out, inn);
        }
        validator
    }

    #[test]
    fn test_closing_edge_rejected_with_stack() {
        let mut validator = chain(&[(A, B), (B, C)]);
        let result = validator.on_connection_attempt(C, A);
        assert!(!result.valid);
        assert_eq!(result.message.as_deref(), Some(CYCLE_MESSAGE));
        assert_eq!(result.stack, Some(vec![C, A, B, C]));

        assert!(validator.on_connection_attempt(C, D).valid);
    }

    #[test]
    fn test_rejection_is_cached_until_removal() {
        let mut validator = chain(&[(A, B), (B, C)]);
        assert!(!validator.on_connection_attempt(C, A).valid);
        assert_eq!(validator.cached_rejections(), 1);
        assert!(!validator.on_connection_attempt(C, A).valid);

        validator.on_connection_removed(A, B);
        assert_eq!(validator.cached_rejections(), 0);
        assert!(validator.on_connection_attempt(C, A).valid);
    }

    #[test]
    fn test_reverse_allowed_after_removal() {
        let mut validator = chain(&[(A, B)]);
        assert!(!validator.on_connection_attempt(B, A).valid);
        validator.on_connection_removed(A, B);
        assert!(validator.on_connection_attempt(B, A).valid);
    }

    #[test]
    fn test_self_loop_and_known_edge() {
        let mut validator = chain(&[(A, B)]);
        let result = validator.on_connection_attempt(C, C);
        assert_eq!(result.stack, Some(vec![C, C]));
        // Already committed edges hit the acyclic cache
        assert_eq!(validator.on_connection_attempt(A, B), ValidationResult {
            valid: true,
            message: None,
            stack: None,
        });
    }

    #[test]
    fn test_disabled_accepts_everything() {
        let mut validator = CycleValidator::with_enabled(false);
        validator.on_connection_added(A, B);
        assert!(validator.on_connection_attempt(B, A).valid);
        validator.set_enabled(true);
        assert!(!validator.on_connection_attempt(B, A).valid);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut validator = chain(&[(A, B), (A, C), (B, D)]);
        assert!(validator.on_connection_attempt(C, D).valid);
        assert_eq!(validator.neighbors(A).collect::<Vec<_>>(), vec![B, C]);
    }
}
