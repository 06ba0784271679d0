// SPDX-License-Identifier: MIT OR Apache-2.0
//! Diagram orchestration engine for Floxy.
//!
//! This crate provides the headless core of a node/connection diagram editor:
//! - Node and connection lifecycles with retained render layers
//! - Capability-gated behaviors (drag, select, rename, resize, hover)
//! - Selection-scoped commands (delete, path switching)
//! - Pluggable path strategies and connection validators
//! - Export/import of whole diagrams as JSON
//!
//! ## Architecture
//!
//! [`Flow`] is the only entry point a host needs. It owns the canvas, the
//! node and connection managers, the validators and the selection, and it
//! routes component events between them. The [`ui`] module paints a flow
//! with egui; any other host can read the node and path layers directly.

pub mod behavior;
pub mod canvas;
pub mod capability;
pub mod command;
pub mod config;
pub mod connection;
pub mod connection_manager;
pub mod document;
pub mod drag;
pub mod error;
pub mod events;
pub mod flow;
pub mod geometry;
pub mod input;
pub mod node;
pub mod node_manager;
pub mod notification;
pub mod path;
pub mod port;
pub mod render;
pub mod selection;
pub mod ui;
pub mod validator;
pub mod view;

pub use canvas::DropPayload;
pub use capability::CapabilityRegistry;
pub use config::FlowOptions;
pub use connection::ConnectionId;
pub use document::{FlowDocument, ImportReport};
pub use error::{ConnectError, FlowError};
pub use flow::{Flow, FlowEvent};
pub use geometry::{Point, Rect, Size};
pub use node::{NodeConfig, NodeId};
pub use port::{Endpoint, PortDirection};
pub use render::{Layer, LayerKind, RenderError};
pub use selection::SelectionTarget;
pub use validator::{CycleValidator, ValidationResult, Validator};
