// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph core for Lattice.
//!
//! A directed graph of typed nodes connected by typed edges, where a node's
//! ports can be generated from its data and its live connections, and where
//! subgraphs can be flattened into a single graph for execution.
//!
//! ## Architecture
//!
//! - [`Graph`] owns nodes and edges and keeps both sides of every edge consistent
//! - node types declare members; each member materializes into ports,
//!   statically or through a behavior function
//! - port changes propagate along edges through an explicit worklist
//! - [`TypeRegistry`] decides which port types may be connected
//! - [`Graph::realize`] inlines subgraph nodes
//! - assets persist graphs as RON with ID-based edge records

mod id;

pub mod annotation;
pub mod asset;
pub mod compat;
pub mod context;
pub mod edge;
pub mod evaluation;
pub mod events;
pub mod graph;
pub mod materialize;
pub mod node;
pub mod nodes;
pub mod parameter;
pub mod port;
pub mod realize;
pub mod settings;

pub use asset::{AssetError, GraphAsset, LoadReport};
pub use compat::{TypeAdapter, TypeRegistry};
pub use context::{GraphContext, GraphLibrary};
pub use edge::{Edge, EdgeId, PortRef};
pub use events::{GraphChange, GraphEvent};
pub use graph::{ConnectError, Graph};
pub use node::{MemberDecl, Node, NodeId, NodeRegistry, NodeType};
pub use parameter::{ExposedParameter, ParameterDirection, ParameterId};
pub use port::{Port, PortDirection, PortId, PortType, PortValue};
pub use realize::{GraphError, RealizeReport};
pub use settings::GraphSettings;
