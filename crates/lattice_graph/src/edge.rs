// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.
//!
//! Edges never hold live references: both endpoints are stored as
//! `(node, member, identifier)` and resolved through the owning graph.

use crate::id::define_id;
use crate::node::NodeId;
use crate::port::{PortDirection, PortId, PortType};
use serde::{Deserialize, Serialize};

define_id!(
    /// Unique identifier for an edge
    EdgeId
);

/// A port addressed from outside its node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    /// Owning node
    pub node: NodeId,
    /// Port within the node
    pub port: PortId,
}

impl PortRef {
    /// Reference a port by node, member and identifier
    pub fn new(node: NodeId, member: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            node,
            port: PortId::new(member, identifier),
        }
    }

    /// Reference the single port of a simple member
    pub fn member(node: NodeId, member: impl Into<String>) -> Self {
        Self::new(node, member, "")
    }
}

/// A directed edge from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge ID
    pub id: EdgeId,
    /// Producing output port
    pub from: PortRef,
    /// Consuming input port
    pub to: PortRef,
}

impl Edge {
    /// Create a new edge
    pub fn new(from: PortRef, to: PortRef) -> Self {
        Self {
            id: EdgeId::new(),
            from,
            to,
        }
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }

    /// Check if this edge attaches to a specific port
    pub fn involves_port(&self, port: &PortRef) -> bool {
        self.from == *port || self.to == *port
    }

    /// The endpoint on the given side of the edge
    pub fn endpoint(&self, direction: PortDirection) -> &PortRef {
        match direction {
            PortDirection::Output => &self.from,
            PortDirection::Input => &self.to,
        }
    }

    /// Whether the edge touches `member` of `node`, returning the local side
    pub fn side_for_member(&self, node: NodeId, member: &str) -> Option<PortDirection> {
        if self.to.node == node && self.to.port.member == member {
            Some(PortDirection::Input)
        } else if self.from.node == node && self.from.port.member == member {
            Some(PortDirection::Output)
        } else {
            None
        }
    }
}

/// Flat persisted form of an edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Edge ID
    pub id: EdgeId,
    /// Producing node
    pub from_node: NodeId,
    /// Producing member
    pub from_member: String,
    /// Producing port identifier
    #[serde(default)]
    pub from_identifier: String,
    /// Consuming node
    pub to_node: NodeId,
    /// Consuming member
    pub to_member: String,
    /// Consuming port identifier
    #[serde(default)]
    pub to_identifier: String,
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id,
            from_node: edge.from.node,
            from_member: edge.from.port.member.clone(),
            from_identifier: edge.from.port.identifier.clone(),
            to_node: edge.to.node,
            to_member: edge.to.port.member.clone(),
            to_identifier: edge.to.port.identifier.clone(),
        }
    }
}

impl From<EdgeRecord> for Edge {
    fn from(record: EdgeRecord) -> Self {
        Self {
            id: record.id,
            from: PortRef::new(record.from_node, record.from_member, record.from_identifier),
            to: PortRef::new(record.to_node, record.to_member, record.to_identifier),
        }
    }
}

/// An edge as seen from one of its endpoints, handed to port behaviors
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeView {
    /// The edge
    pub edge: EdgeId,
    /// Which side of the edge the viewing node is on
    pub side: PortDirection,
    /// Port on the viewing node
    pub local: PortId,
    /// Port on the other node
    pub remote: PortRef,
    /// Current type of the remote port
    pub remote_type: PortType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_identifiers() {
        let a = NodeId::new();
        let b = NodeId::new();
        let edge = Edge::new(PortRef::member(a, "out"), PortRef::new(b, "inputs", "1"));

        let record = EdgeRecord::from(&edge);
        assert_eq!(record.from_identifier, "");
        assert_eq!(record.to_identifier, "1");
        assert_eq!(Edge::from(record), edge);
    }

    #[test]
    fn test_side_for_member() {
        let a = NodeId::new();
        let b = NodeId::new();
        let edge = Edge::new(PortRef::member(a, "out"), PortRef::member(b, "in"));

        assert_eq!(edge.side_for_member(a, "out"), Some(PortDirection::Output));
        assert_eq!(edge.side_for_member(b, "in"), Some(PortDirection::Input));
        assert_eq!(edge.side_for_member(a, "in"), None);
        assert!(edge.involves_node(b));
    }
}
