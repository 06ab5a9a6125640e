// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subgraph inlining.
//!
//! [`Graph::realize`] replaces every subgraph node with a copy of the graph
//! it references. Nested subgraphs are flattened first, then the copy's
//! nodes and internal edges move into the host and edges through the
//! copy's parameter handles are reconnected to the host edges that ended
//! at the subgraph node.

use crate::asset::{DroppedEdge, LoadReport};
use crate::edge::{Edge, PortRef};
use crate::events::GraphChange;
use crate::graph::{ConnectError, Graph};
use crate::node::{MessageSeverity, NodeData, NodeId};
use crate::nodes::SUBGRAPH_NODE;
use crate::parameter::{missing_handle_message, ParameterId};
use crate::port::PortDirection;
use std::collections::HashMap;
use thiserror::Error;

/// Graph-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Subgraphs nest deeper than the configured limit
    #[error("Subgraph nesting exceeds {0} levels")]
    RealizeDepthExceeded(usize),

    /// The operation needs live ports
    #[error("Graph '{0}' is disabled")]
    Disabled(String),
}

/// Summary of a realize run, nested levels included
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealizeReport {
    /// Subgraph nodes replaced by their contents
    pub inlined: usize,
    /// Subgraph nodes whose child was missing or empty
    pub skipped: Vec<NodeId>,
    /// Nodes copied into the host
    pub inserted_nodes: usize,
    /// Boundary edges reconnected
    pub rewired_edges: usize,
    /// Boundary edges that could not be reconnected
    pub failed_rewires: usize,
    /// Internal edges that did not survive the copy
    pub dropped_edges: Vec<DroppedEdge>,
}

impl RealizeReport {
    fn absorb(&mut self, nested: RealizeReport) {
        self.inlined += nested.inlined;
        self.skipped.extend(nested.skipped);
        self.inserted_nodes += nested.inserted_nodes;
        self.rewired_edges += nested.rewired_edges;
        self.failed_rewires += nested.failed_rewires;
        self.dropped_edges.extend(nested.dropped_edges);
    }
}

impl Graph {
    /// Create a subgraph node referencing `asset` in the library
    pub fn create_subgraph_node(&mut self, asset: impl Into<String>, position: [f32; 2]) -> Option<NodeId> {
        let mut node = self.context().nodes().create_node(SUBGRAPH_NODE)?;
        node.position = position;
        node.data = NodeData::Subgraph {
            asset: Some(asset.into()),
        };
        let id = self.add_node(node);
        self.refresh_subgraph_diagnostics(id);
        Some(id)
    }

    /// Point a subgraph node at another asset. Its ports follow.
    pub fn set_subgraph_asset(&mut self, node_id: NodeId, asset: Option<String>) -> bool {
        let stale = self.missing_handle_messages(node_id);
        match self.node_mut(node_id) {
            Some(node) if node.is_subgraph() => node.data = NodeData::Subgraph { asset },
            _ => return false,
        }
        for text in stale {
            self.remove_message(node_id, &text);
        }
        self.notify_node_changed(node_id);
        self.refresh_subgraph_diagnostics(node_id);
        true
    }

    /// Nodes referencing a child graph
    pub fn subgraph_nodes(&self) -> Vec<NodeId> {
        self.nodes().filter(|n| n.is_subgraph()).map(|n| n.id).collect()
    }

    /// Inline every subgraph node, recursively.
    ///
    /// A graph without subgraph nodes is left untouched. On error the graph
    /// is left as it was before the call.
    pub fn realize(&mut self) -> Result<RealizeReport, GraphError> {
        if self.subgraph_nodes().is_empty() {
            return Ok(RealizeReport::default());
        }
        let mut staged = self.clone();
        let report = staged.realize_at_depth(0)?;
        *self = staged;
        if report.inlined > 0 || !report.skipped.is_empty() {
            tracing::info!(
                "Realized '{}': {} subgraphs inlined, {} skipped, {} nodes inserted, {} edges rewired",
                self.name,
                report.inlined,
                report.skipped.len(),
                report.inserted_nodes,
                report.rewired_edges
            );
        }
        Ok(report)
    }

    fn realize_at_depth(&mut self, depth: usize) -> Result<RealizeReport, GraphError> {
        let mut report = RealizeReport::default();
        let references = self.subgraph_nodes();
        if references.is_empty() {
            return Ok(report);
        }
        if !self.is_enabled() {
            return Err(GraphError::Disabled(self.name.clone()));
        }
        let max_depth = self.settings().max_realize_depth;
        if depth >= max_depth {
            return Err(GraphError::RealizeDepthExceeded(max_depth));
        }

        for reference in &references {
            let asset = match self.node(*reference).map(|n| &n.data) {
                Some(NodeData::Subgraph { asset }) => asset.clone(),
                _ => continue,
            };
            let child = asset
                .as_deref()
                .and_then(|name| self.context().subgraph(name))
                .filter(|child| !child.is_empty());
            let Some(child) = child else {
                let name = asset.unwrap_or_default();
                tracing::warn!("Subgraph '{}' referenced by node {} is missing or empty", name, reference);
                self.disconnect_node(*reference);
                self.add_message(
                    *reference,
                    format!("Subgraph '{name}' is missing or empty"),
                    MessageSeverity::Error,
                );
                report.skipped.push(*reference);
                continue;
            };

            let mut copy = child.duplicate_in(self.context().clone());
            copy.enable();
            report.absorb(copy.realize_at_depth(depth + 1)?);
            self.inline_copy(*reference, copy, &mut report);
            report.inlined += 1;
        }

        for reference in references {
            self.remove_node(reference);
        }
        Ok(report)
    }

    fn disconnect_node(&mut self, node_id: NodeId) {
        let attached: Vec<_> = self.edges_for_node(node_id).map(|e| e.id).collect();
        for edge_id in attached {
            self.disconnect(edge_id);
        }
    }

    fn inline_copy(&mut self, reference: NodeId, copy: Graph, report: &mut RealizeReport) {
        let offset = self.node(reference).map_or([0.0, 0.0], |n| n.position);
        let incoming: Vec<Edge> = self.edges().filter(|e| e.to.node == reference).cloned().collect();
        let outgoing: Vec<Edge> = self.edges().filter(|e| e.from.node == reference).cloned().collect();

        let Graph {
            nodes,
            edges,
            parameters,
            ..
        } = copy;
        let handles: HashMap<NodeId, ParameterId> = nodes
            .values()
            .filter_map(|n| n.parameter().map(|p| (n.id, p)))
            .collect();

        // Host edges on a parameter the copy has no handle for have nowhere to go
        for parameter in &parameters {
            if handles.values().any(|p| *p == parameter.id) {
                continue;
            }
            let stranded = host_endpoints(&incoming, PortDirection::Input, parameter.id).len()
                + host_endpoints(&outgoing, PortDirection::Output, parameter.id).len();
            if stranded == 0 {
                continue;
            }
            tracing::warn!(
                "Parameter '{}' of node {} has no handle, {} edges not rewired",
                parameter.name,
                reference,
                stranded
            );
            self.add_message(reference, missing_handle_message(&parameter.name), MessageSeverity::Warning);
            report.failed_rewires += stranded;
        }

        let mut inserted = Vec::new();
        for (id, mut node) in nodes {
            if handles.contains_key(&id) {
                continue;
            }
            node.clear_ports();
            node.position = [node.position[0] + offset[0], node.position[1] + offset[1]];
            self.nodes.insert(id, node);
            self.emit(GraphChange::AddedNode(id));
            inserted.push(id);
        }
        report.inserted_nodes += inserted.len();

        let mut boundary = Vec::new();
        for (id, edge) in edges {
            if handles.contains_key(&edge.from.node) || handles.contains_key(&edge.to.node) {
                boundary.push(edge);
            } else {
                self.edges.insert(id, edge);
                self.emit(GraphChange::AddedEdge(id));
            }
        }

        let mut load = LoadReport::default();
        self.rebuild_ports(&inserted, &mut load);
        report.dropped_edges.extend(load.dropped_edges);

        for edge in boundary {
            let producers: Vec<PortRef> = match handles.get(&edge.from.node) {
                Some(parameter) => host_endpoints(&incoming, PortDirection::Input, *parameter),
                None => vec![edge.from.clone()],
            };
            let consumers: Vec<PortRef> = match handles.get(&edge.to.node) {
                Some(parameter) => host_endpoints(&outgoing, PortDirection::Output, *parameter),
                None => vec![edge.to.clone()],
            };
            for producer in &producers {
                for consumer in &consumers {
                    match self.connect(producer.clone(), consumer.clone(), false) {
                        Ok(_) => report.rewired_edges += 1,
                        Err(ConnectError::AlreadyConnected(_)) => {}
                        Err(err) => {
                            tracing::warn!("Could not rewire {} -> {}: {}", producer.port, consumer.port, err);
                            report.failed_rewires += 1;
                        }
                    }
                }
            }
        }
    }
}

/// Far ends of the host edges attached to a parameter's port on the
/// subgraph node. `side` is the subgraph node's side of those edges.
fn host_endpoints(host_edges: &[Edge], side: PortDirection, parameter: ParameterId) -> Vec<PortRef> {
    let member = match side {
        PortDirection::Input => "inputs",
        PortDirection::Output => "outputs",
    };
    let identifier = parameter.to_string();
    host_edges
        .iter()
        .filter(|e| {
            let near = &e.endpoint(side).port;
            near.member == member && near.identifier == identifier
        })
        .map(|e| e.endpoint(side.opposite()).clone())
        .collect()
}
