// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port addressing.
//!
//! Ports are not stored as objects: a node only declares how many inputs and
//! outputs it has, and a port is addressed by `(node, index)`.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port (connection target)
    Input,
    /// Output port (connection source)
    Output,
}

impl PortDirection {
    /// Lowercase name, as used in element classes
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// One end of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Owning node
    pub node_id: NodeId,
    /// Port index on that node
    pub port: usize,
}

impl Endpoint {
    /// Create an endpoint
    pub fn new(node_id: NodeId, port: usize) -> Self {
        Self { node_id, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_id, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new(NodeId(3), 1).to_string(), "3:1");
        assert_eq!(PortDirection::Output.as_str(), "output");
    }
}
