// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types surfaced by the orchestrator.

use crate::config::ConfigError;
use crate::node::NodeId;
use crate::port::Endpoint;
use crate::render::RenderError;

/// Error building a flow or loading a document
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A manager was handed the wrong container
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Options could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Document JSON could not be parsed or written
    #[error("Invalid document: {0}")]
    Document(#[from] serde_json::Error),

    /// Document file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why [`Flow::add_connection`](crate::flow::Flow::add_connection) refused an edge
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// One of the endpoints is not an existing port
    #[error("Connection {output} -> {input} does not resolve to existing ports")]
    UnknownEndpoint {
        /// Output side
        output: Endpoint,
        /// Input side
        input: Endpoint,
    },

    /// A validator vetoed the edge
    #[error("{validator}: {message}")]
    Rejected {
        /// Name of the vetoing validator
        validator: String,
        /// User-facing reason
        message: String,
        /// Offending path, when the validator reports one
        stack: Option<Vec<NodeId>>,
    },
}
