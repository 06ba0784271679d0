// SPDX-License-Identifier: MIT OR Apache-2.0
//! Export and import of whole diagrams.
//!
//! The JSON layout is
//!
//! ```json
//! {
//!   "zoom": 1.0,
//!   "canvas": { "x": 0.0, "y": 0.0 },
//!   "nodes": [ { "id": 1, "name": "default", "x": 100.0, "y": 100.0 } ],
//!   "connections": [ { "outNodeId": 1, "outPort": 0, "inNodeId": 2, "inPort": 0 } ]
//! }
//! ```

use crate::error::{ConnectError, FlowError};
use crate::flow::Flow;
use crate::geometry::Point;
use crate::node::{NodeConfig, NodeId};
use crate::port::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// One committed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEntry {
    /// Source node
    pub out_node_id: NodeId,
    /// Source output port
    pub out_port: usize,
    /// Target node
    pub in_node_id: NodeId,
    /// Target input port
    pub in_port: usize,
}

impl ConnectionEntry {
    /// Output side
    pub fn output(&self) -> Endpoint {
        Endpoint::new(self.out_node_id, self.out_port)
    }

    /// Input side
    pub fn input(&self) -> Endpoint {
        Endpoint::new(self.in_node_id, self.in_port)
    }
}

/// Serializable snapshot of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowDocument {
    /// Zoom factor
    pub zoom: f64,
    /// Pan offset
    pub canvas: Point,
    /// Nodes in creation order
    pub nodes: Vec<NodeConfig>,
    /// Committed edges in creation order
    pub connections: Vec<ConnectionEntry>,
}

impl Default for FlowDocument {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            canvas: Point::ZERO,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl FlowDocument {
    /// Parse a document
    pub fn from_json(text: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Pretty JSON
    pub fn to_json(&self) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a document file
    pub fn load(path: &Path) -> Result<Self, FlowError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write a document file
    pub fn save(&self, path: &Path) -> Result<(), FlowError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// An edge the import could not recreate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedConnection {
    /// The edge as written in the document
    pub entry: ConnectionEntry,
    /// Why it was refused
    pub error: ConnectError,
}

/// Outcome of [`Flow::import`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Nodes created
    pub nodes: usize,
    /// Edges committed
    pub connections: usize,
    /// Edges refused by validators or pointing at missing ports
    pub rejected: Vec<RejectedConnection>,
}

impl ImportReport {
    /// Whether every edge was recreated
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl Flow {
    /// Snapshot every live node and committed connection with the pan and zoom
    pub fn export(&self) -> FlowDocument {
        FlowDocument {
            zoom: self.zoom(),
            canvas: self.pan(),
            nodes: self.nodes().iter().map(|n| n.record().to_config()).collect(),
            connections: self
                .connections()
                .iter()
                .filter_map(|c| {
                    let record = c.record();
                    let target = record.target?;
                    Some(ConnectionEntry {
                        out_node_id: record.source.node_id,
                        out_port: record.source.port,
                        in_node_id: target.node_id,
                        in_port: target.port,
                    })
                })
                .collect(),
        }
    }

    /// Replace the whole diagram with `document`.
    ///
    /// Nodes keep their document ids so connection endpoints resolve. Edges
    /// go through the validators like any other and refusals are reported
    /// instead of aborting the import.
    pub fn import(&mut self, document: &FlowDocument) -> ImportReport {
        self.reset();
        self.set_zoom(document.zoom);
        self.set_pan(document.canvas);

        let mut report = ImportReport::default();
        for config in &document.nodes {
            self.add_node(config.clone());
            report.nodes += 1;
        }
        for entry in &document.connections {
            match self.add_connection(entry.output(), entry.input()) {
                Ok(_) => report.connections += 1,
                Err(error) => {
                    warn!("Skipping connection {} -> {}: {}", entry.output(), entry.input(), error);
                    report.rejected.push(RejectedConnection { entry: *entry, error });
                }
            }
        }
        info!(
            "Imported {} nodes and {} connections ({} rejected)",
            report.nodes,
            report.connections,
            report.rejected.len()
        );
        report
    }

    /// Export as pretty JSON
    pub fn export_json(&self) -> Result<String, FlowError> {
        self.export().to_json()
    }

    /// Import from JSON text
    pub fn import_json(&mut self, text: &str) -> Result<ImportReport, FlowError> {
        let document = FlowDocument::from_json(text)?;
        Ok(self.import(&document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowOptions;
    use crate::connection::ConnectionId;

    fn sample() -> Flow {
        let mut flow = Flow::new(FlowOptions::default()).unwrap();
        flow.add_node(NodeConfig::new("default").with_position(100.0, 100.0).with_label("Start"));
        flow.add_node(
            NodeConfig::new("action")
                .with_namespace("diagram", "workflow")
                .with_position(400.0, 80.0),
        );
        flow.add_node(NodeConfig::new("default").with_position(700.0, 100.0).with_ports(2, 1));
        flow.add_connection(Endpoint::new(NodeId(1), 0), Endpoint::new(NodeId(2), 0))
            .unwrap();
        flow.add_connection(Endpoint::new(NodeId(2), 0), Endpoint::new(NodeId(3), 1))
            .unwrap();
        flow.set_zoom(1.5);
        flow.set_pan(Point::new(-20.0, 35.0));
        flow
    }

    #[test]
    fn test_export_import_reproduces_graph() {
        let source = sample();
        let document = source.export();
        assert_eq!(document.nodes.len(), 3);
        assert_eq!(document.connections.len(), 2);

        let mut copy = Flow::new(FlowOptions::default()).unwrap();
        copy.add_node(NodeConfig::new("default"));
        let report = copy.import(&document);
        assert!(report.is_complete());
        assert_eq!((report.nodes, report.connections), (3, 2));
        assert_eq!(copy.export(), document);
        assert!(copy
            .connections()
            .contains(&ConnectionId::between(Endpoint::new(NodeId(2), 0), Endpoint::new(NodeId(3), 1))));
    }

    #[test]
    fn test_json_field_names() {
        let json = sample().export_json().unwrap();
        assert!(json.contains("\"outNodeId\""));
        assert!(json.contains("\"inPort\""));
        assert!(json.contains("\"canvas\""));

        let mut copy = Flow::new(FlowOptions::default()).unwrap();
        let report = copy.import_json(&json).unwrap();
        assert_eq!(report.connections, 2);
        assert_eq!(copy.zoom(), 1.5);
        assert_eq!(copy.pan(), Point::new(-20.0, 35.0));
    }

    #[test]
    fn test_import_reports_rejected_edges() {
        let json = r#"{
            "nodes": [
                { "id": 1, "name": "default", "x": 0, "y": 0 },
                { "id": 2, "name": "default", "x": 300, "y": 0 }
            ],
            "connections": [
                { "outNodeId": 1, "outPort": 0, "inNodeId": 2, "inPort": 0 },
                { "outNodeId": 2, "outPort": 0, "inNodeId": 1, "inPort": 0 },
                { "outNodeId": 2, "outPort": 0, "inNodeId": 9, "inPort": 0 }
            ]
        }"#;
        let mut flow = Flow::new(FlowOptions::default()).unwrap();
        let report = flow.import_json(json).unwrap();
        assert_eq!(report.connections, 1);
        assert_eq!(report.rejected.len(), 2);
        assert!(matches!(report.rejected[0].error, ConnectError::Rejected { .. }));
        assert!(matches!(report.rejected[1].error, ConnectError::UnknownEndpoint { .. }));
        assert_eq!(flow.zoom(), 1.0);
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let mut flow = Flow::new(FlowOptions::default()).unwrap();
        assert!(matches!(flow.import_json("{ nodes: "), Err(FlowError::Document(_))));
    }
}
