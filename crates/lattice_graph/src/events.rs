// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications raised by graph mutations.
//!
//! Events are queued on the graph and drained by the editor with
//! [`Graph::drain_events`](crate::Graph::drain_events).

use crate::annotation::{GroupId, NoteId, StackId};
use crate::edge::EdgeId;
use crate::node::{NodeId, NodeMessage};
use crate::parameter::ParameterId;

/// Structural change to a graph. Exactly one payload per change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphChange {
    /// A node was added
    AddedNode(NodeId),
    /// A node was removed
    RemovedNode(NodeId),
    /// An edge was added
    AddedEdge(EdgeId),
    /// An edge was removed
    RemovedEdge(EdgeId),
    /// A node's values or data changed
    NodeChanged(NodeId),
    /// A group was added
    AddedGroup(GroupId),
    /// A group was removed
    RemovedGroup(GroupId),
    /// A stack was added
    AddedStack(StackId),
    /// A stack was removed
    RemovedStack(StackId),
    /// A sticky note was added
    AddedNote(NoteId),
    /// A sticky note was removed
    RemovedNote(NoteId),
    /// A boundary parameter was added
    AddedParameter(ParameterId),
    /// A boundary parameter was removed
    RemovedParameter(ParameterId),
    /// A boundary parameter was renamed or retyped
    ModifiedParameter(ParameterId),
}

/// Notification raised by a graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// The graph structure changed
    Changed(GraphChange),
    /// The ports of a node member were rebuilt
    PortsUpdated {
        /// Node whose ports changed
        node: NodeId,
        /// Member whose ports changed
        member: String,
    },
    /// A diagnostic was attached to a node
    MessageAdded {
        /// Target node
        node: NodeId,
        /// The message
        message: NodeMessage,
    },
    /// A diagnostic was removed from a node
    MessageRemoved {
        /// Target node
        node: NodeId,
        /// The message
        message: NodeMessage,
    },
}

impl GraphEvent {
    /// The structural change carried by this event, if any
    pub fn change(&self) -> Option<GraphChange> {
        match self {
            Self::Changed(change) => Some(*change),
            _ => None,
        }
    }
}

impl From<GraphChange> for GraphEvent {
    fn from(change: GraphChange) -> Self {
        Self::Changed(change)
    }
}
