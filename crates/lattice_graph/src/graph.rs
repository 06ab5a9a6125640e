// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and edges.
//!
//! The graph owns every node and edge. Edges refer to their endpoints by
//! ID; ports keep the list of attached edge IDs. Every mutation leaves both
//! sides consistent and queues [`GraphEvent`]s for the editor.

use crate::annotation::{Group, GroupId, NoteId, StackId, StackNode, StickyNote};
use crate::asset::{DropReason, DroppedEdge, LoadReport};
use crate::compat::TypeRegistry;
use crate::context::GraphContext;
use crate::edge::{Edge, EdgeId, EdgeRecord, PortRef};
use crate::events::{GraphChange, GraphEvent};
use crate::node::{MessageSeverity, Node, NodeId, NodeMessage};
use crate::parameter::ExposedParameter;
use crate::port::{Port, PortDirection, PortType, PortValue};
use crate::settings::GraphSettings;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// A node graph
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    pub(crate) nodes: IndexMap<NodeId, Node>,
    /// Edges between nodes
    pub(crate) edges: IndexMap<EdgeId, Edge>,
    pub(crate) parameters: Vec<ExposedParameter>,
    pub(crate) groups: IndexMap<GroupId, Group>,
    pub(crate) stacks: IndexMap<StackId, StackNode>,
    pub(crate) notes: IndexMap<NoteId, StickyNote>,
    ctx: GraphContext,
    enabled: bool,
    events: Vec<GraphEvent>,
}

impl Graph {
    /// Create a new empty, enabled graph
    pub fn new(name: impl Into<String>, ctx: GraphContext) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            parameters: Vec::new(),
            groups: IndexMap::new(),
            stacks: IndexMap::new(),
            notes: IndexMap::new(),
            ctx,
            enabled: true,
            events: Vec::new(),
        }
    }

    /// Create a disabled graph, used while assembling loaded content
    pub(crate) fn new_disabled(name: impl Into<String>, ctx: GraphContext) -> Self {
        let mut graph = Self::new(name, ctx);
        graph.enabled = false;
        graph
    }

    /// Registries, library and settings
    pub fn context(&self) -> &GraphContext {
        &self.ctx
    }

    /// Move the graph to another context. Live ports are left as they are.
    pub(crate) fn set_context(&mut self, ctx: GraphContext) {
        self.ctx = ctx;
    }

    /// Type compatibility registry
    pub fn types(&self) -> &TypeRegistry {
        self.ctx.types()
    }

    /// Settings
    pub fn settings(&self) -> &GraphSettings {
        self.ctx.settings()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Whether ports are live
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Materialize all ports and attach every edge. Edges that no longer
    /// resolve are dropped and reported.
    pub fn enable(&mut self) -> LoadReport {
        let mut report = LoadReport::default();
        if self.enabled {
            return report;
        }
        self.enabled = true;
        for node in self.nodes.values_mut() {
            node.clear_ports();
        }
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        self.rebuild_ports(&ids, &mut report);
        report
    }

    /// Drop all live ports. Nodes, edges and parameters are kept.
    pub fn disable(&mut self) {
        self.enabled = false;
        for node in self.nodes.values_mut() {
            node.clear_ports();
        }
    }

    /// Materialize ports of freshly inserted nodes, attach the edges that
    /// touch them and let the result settle through propagation.
    pub(crate) fn rebuild_ports(&mut self, ids: &[NodeId], report: &mut LoadReport) {
        for id in ids {
            for member in self.member_order(*id) {
                self.materialize_member(*id, &member);
            }
        }

        let touched: HashSet<NodeId> = ids.iter().copied().collect();
        let candidates: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| touched.contains(&e.from.node) || touched.contains(&e.to.node))
            .map(|e| e.id)
            .collect();
        for edge_id in candidates {
            self.attach_loaded_edge(edge_id, report);
        }

        for id in ids {
            self.update_all_ports(*id);
        }
    }

    fn attach_loaded_edge(&mut self, edge_id: EdgeId, report: &mut LoadReport) {
        let Some(edge) = self.edges.get(&edge_id).cloned() else {
            return;
        };
        let from = self.port(&edge.from).map(|p| (p.direction, p.port_type.clone()));
        let to = self.port(&edge.to).map(|p| (p.direction, p.port_type.clone()));

        let reason = match (from, to) {
            (Some((PortDirection::Output, from_type)), Some((PortDirection::Input, to_type))) => {
                if self.settings().drop_incompatible_edges_on_load
                    && !self.types().can_connect(&from_type, &to_type)
                {
                    Some(DropReason::Incompatible {
                        from: from_type,
                        to: to_type,
                    })
                } else {
                    None
                }
            }
            (Some((PortDirection::Output, _)), _) => Some(DropReason::MissingPort(edge.to.clone())),
            _ => Some(DropReason::MissingPort(edge.from.clone())),
        };

        match reason {
            None => {
                for end in [&edge.from, &edge.to] {
                    if let Some(port) = self.port_mut(end) {
                        port.attach(edge_id);
                    }
                }
            }
            Some(reason) => {
                self.edges.shift_remove(&edge_id);
                tracing::warn!("Dropping edge {}: {}", edge_id, reason);
                report.dropped_edges.push(DroppedEdge {
                    edge: EdgeRecord::from(&edge),
                    reason,
                });
            }
        }
    }

    /// Independent copy with fresh node and edge IDs
    pub fn duplicate(&self) -> Graph {
        self.duplicate_in(self.ctx.clone())
    }

    /// [`duplicate`](Self::duplicate) into another context
    pub(crate) fn duplicate_in(&self, ctx: GraphContext) -> Graph {
        let mut copy = Graph::new_disabled(self.name.clone(), ctx);
        copy.parameters = self.parameters.clone();

        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        for node in self.nodes.values() {
            let mut clone = node.clone();
            clone.id = NodeId::new();
            clone.clear_ports();
            clone.messages.clear();
            mapping.insert(node.id, clone.id);
            copy.nodes.insert(clone.id, clone);
        }
        for edge in self.edges.values() {
            let (Some(from), Some(to)) = (mapping.get(&edge.from.node), mapping.get(&edge.to.node))
            else {
                continue;
            };
            let clone = Edge::new(
                PortRef { node: *from, port: edge.from.port.clone() },
                PortRef { node: *to, port: edge.to.port.clone() },
            );
            copy.edges.insert(clone.id, clone);
        }
        let remap = |nodes: &[NodeId]| -> Vec<NodeId> {
            nodes.iter().filter_map(|n| mapping.get(n).copied()).collect()
        };
        for group in self.groups.values() {
            let mut clone = group.clone();
            clone.id = GroupId::new();
            clone.nodes = remap(&group.nodes);
            copy.groups.insert(clone.id, clone);
        }
        for stack in self.stacks.values() {
            let mut clone = stack.clone();
            clone.id = StackId::new();
            clone.nodes = remap(&stack.nodes);
            copy.stacks.insert(clone.id, clone);
        }
        for note in self.notes.values() {
            let mut clone = note.clone();
            clone.id = NoteId::new();
            copy.notes.insert(clone.id, clone);
        }

        if self.enabled {
            copy.enable();
        }
        copy
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node to the graph and materialize its ports.
    /// Adding a node whose ID is already present is a no-op.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            tracing::warn!("Node {} is already in graph '{}'", id, self.name);
            return id;
        }
        if self.ctx.nodes().get(&node.node_type).is_none() {
            tracing::warn!("Node {} has unknown type '{}'", id, node.node_type);
        }
        node.clear_ports();
        self.nodes.insert(id, node);
        self.emit(GraphChange::AddedNode(id));
        if self.enabled {
            self.update_all_ports(id);
        }
        id
    }

    /// Create a node through the registry factory and add it
    pub fn create_node(&mut self, type_id: &str, position: [f32; 2]) -> Option<NodeId> {
        let mut node = self.ctx.nodes().create_node(type_id)?;
        node.position = position;
        Some(self.add_node(node))
    }

    /// Remove a node, disconnecting all its edges first
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        if !self.nodes.contains_key(&node_id) {
            return None;
        }

        let attached: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.involves_node(node_id))
            .map(|e| e.id)
            .collect();
        let mut neighbors = Vec::new();
        for edge_id in attached {
            if let Some(edge) = self.detach_edge(edge_id) {
                let other = if edge.from.node == node_id { edge.to.node } else { edge.from.node };
                if other != node_id && !neighbors.contains(&other) {
                    neighbors.push(other);
                }
            }
        }

        let mut node = self.nodes.shift_remove(&node_id)?;
        if let Some(on_remove) = self.ctx.nodes().get(&node.node_type).and_then(|t| t.on_remove) {
            on_remove(&mut node);
        }
        self.forget_node_in_annotations(node_id);
        self.emit(GraphChange::RemovedNode(node_id));

        for neighbor in neighbors {
            self.update_all_ports(neighbor);
        }
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID. Call [`Graph::notify_node_changed`] after
    /// changing anything ports depend on.
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Rebuild a node's ports after its data changed
    pub fn notify_node_changed(&mut self, node_id: NodeId) {
        if !self.nodes.contains_key(&node_id) {
            return;
        }
        self.emit(GraphChange::NodeChanged(node_id));
        self.update_all_ports(node_id);
    }

    /// Set a member's value slot
    pub fn set_value(&mut self, node_id: NodeId, member: &str, value: PortValue) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        node.values.insert(member.to_string(), value);
        self.notify_node_changed(node_id);
        true
    }

    // ------------------------------------------------------------------
    // Ports and edges
    // ------------------------------------------------------------------

    /// Resolve a port
    pub fn port(&self, port: &PortRef) -> Option<&Port> {
        self.nodes.get(&port.node)?.port(&port.port)
    }

    pub(crate) fn port_mut(&mut self, port: &PortRef) -> Option<&mut Port> {
        self.nodes.get_mut(&port.node)?.port_mut(&port.port)
    }

    /// Connect an output port to an input port.
    ///
    /// With `auto_disconnect_singular`, edges already attached to a
    /// single-connection endpoint are removed first. On error the graph is
    /// left unchanged and no event is raised.
    pub fn connect(
        &mut self,
        from: PortRef,
        to: PortRef,
        auto_disconnect_singular: bool,
    ) -> Result<EdgeId, ConnectError> {
        if !self.enabled {
            return Err(ConnectError::Disabled);
        }
        for end in [&from, &to] {
            if !self.nodes.contains_key(&end.node) {
                return Err(ConnectError::NodeNotFound(end.node));
            }
        }
        if from.node == to.node {
            return Err(ConnectError::SelfLoop(from.node));
        }

        let (from_type, from_multi) = self.endpoint_shape(&from, PortDirection::Output)?;
        let (to_type, to_multi) = self.endpoint_shape(&to, PortDirection::Input)?;
        if !self.types().can_connect(&from_type, &to_type) {
            tracing::debug!("Rejecting edge {} -> {}: {} into {}", from.port, to.port, from_type, to_type);
            return Err(ConnectError::IncompatibleTypes {
                from: from_type,
                to: to_type,
            });
        }
        if let Some(existing) = self.edges.values().find(|e| e.from == from && e.to == to) {
            return Err(ConnectError::AlreadyConnected(existing.id));
        }

        if auto_disconnect_singular {
            if !to_multi {
                self.disconnect_port(&to);
            }
            if !from_multi {
                self.disconnect_port(&from);
            }
            // Disconnecting may have reshaped dynamic ports
            self.endpoint_shape(&from, PortDirection::Output)?;
            self.endpoint_shape(&to, PortDirection::Input)?;
        }

        let edge = Edge::new(from, to);
        let id = edge.id;
        for end in [&edge.from, &edge.to] {
            if let Some(port) = self.port_mut(end) {
                port.attach(id);
            }
        }
        let (to_node, from_node) = (edge.to.node, edge.from.node);
        self.edges.insert(id, edge);

        self.update_all_ports(to_node);
        self.update_all_ports(from_node);
        self.emit(GraphChange::AddedEdge(id));
        Ok(id)
    }

    fn endpoint_shape(
        &self,
        port: &PortRef,
        expected: PortDirection,
    ) -> Result<(PortType, bool), ConnectError> {
        let resolved = self
            .port(port)
            .ok_or_else(|| ConnectError::PortNotFound(port.clone()))?;
        if resolved.direction != expected {
            return Err(ConnectError::WrongDirection(port.clone()));
        }
        Ok((resolved.port_type.clone(), resolved.multi_connect))
    }

    /// Remove an edge and let both endpoints re-materialize
    pub fn disconnect(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let edge = self.detach_edge(edge_id)?;
        self.update_all_ports(edge.to.node);
        self.update_all_ports(edge.from.node);
        Some(edge)
    }

    /// Remove every edge attached to a port. Returns how many were removed.
    pub fn disconnect_port(&mut self, port: &PortRef) -> usize {
        let attached: Vec<EdgeId> = self
            .port(port)
            .map(|p| p.edges().to_vec())
            .unwrap_or_default();
        attached
            .into_iter()
            .filter(|id| self.disconnect(*id).is_some())
            .count()
    }

    /// Remove an edge without re-materializing its endpoints.
    ///
    /// Resets the consumer's value slot when nothing else feeds its member.
    pub(crate) fn detach_edge(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let edge = self.edges.shift_remove(&edge_id)?;
        for end in [&edge.from, &edge.to] {
            if let Some(port) = self.port_mut(end) {
                port.detach(edge_id);
            }
        }
        self.reset_input_value(&edge.to);
        self.emit(GraphChange::RemovedEdge(edge_id));
        Some(edge)
    }

    fn reset_input_value(&mut self, to: &PortRef) {
        if !self.settings().reset_inputs_on_disconnect {
            return;
        }
        let member = &to.port.member;
        let still_fed = self
            .edges
            .values()
            .any(|e| e.to.node == to.node && e.to.port.member == *member);
        if still_fed {
            return;
        }
        let default = self
            .nodes
            .get(&to.node)
            .and_then(|n| self.ctx.nodes().get(&n.node_type))
            .and_then(|t| t.member(member))
            .filter(|m| m.reset_on_disconnect)
            .and_then(|m| m.default_value.clone());
        if let (Some(default), Some(node)) = (default, self.nodes.get_mut(&to.node)) {
            node.values.insert(member.clone(), default);
        }
    }

    /// Get an edge by ID
    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.get(&edge_id)
    }

    /// Get all edges
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Get edges leaving a specific port
    pub fn edges_from<'a>(&'a self, port: &'a PortRef) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter(move |e| e.from == *port)
    }

    /// Get edges arriving at a specific port
    pub fn edges_to<'a>(&'a self, port: &'a PortRef) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.values().filter(move |e| e.to == *port)
    }

    /// Get edges involving a node
    pub fn edges_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(move |e| e.involves_node(node_id))
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get nodes in topological order (for evaluation)
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut visited = HashSet::new();
        let mut temp_mark = HashSet::new();
        let mut order = Vec::new();

        for node_id in self.nodes.keys() {
            if !visited.contains(node_id) {
                self.visit(*node_id, &mut visited, &mut temp_mark, &mut order)?;
            }
        }

        Ok(order)
    }

    fn visit(
        &self,
        node_id: NodeId,
        visited: &mut HashSet<NodeId>,
        temp_mark: &mut HashSet<NodeId>,
        order: &mut Vec<NodeId>,
    ) -> Result<(), CycleError> {
        if temp_mark.contains(&node_id) {
            return Err(CycleError);
        }
        if visited.contains(&node_id) {
            return Ok(());
        }

        temp_mark.insert(node_id);

        // Visit all nodes that this node depends on
        let producers: Vec<NodeId> = self
            .edges
            .values()
            .filter(|e| e.to.node == node_id)
            .map(|e| e.from.node)
            .collect();
        for producer in producers {
            self.visit(producer, visited, temp_mark, order)?;
        }

        temp_mark.remove(&node_id);
        visited.insert(node_id);
        order.push(node_id);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Diagnostics and events
    // ------------------------------------------------------------------

    /// Attach a diagnostic to a node. Identical messages are not repeated.
    pub fn add_message(
        &mut self,
        node_id: NodeId,
        text: impl Into<String>,
        severity: MessageSeverity,
    ) -> bool {
        let message = NodeMessage {
            text: text.into(),
            severity,
        };
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        if node.messages.contains(&message) {
            return false;
        }
        node.messages.push(message.clone());
        self.emit(GraphEvent::MessageAdded {
            node: node_id,
            message,
        });
        true
    }

    /// Remove diagnostics with the given text from a node
    pub fn remove_message(&mut self, node_id: NodeId, text: &str) -> bool {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return false;
        };
        let (removed, kept): (Vec<_>, Vec<_>) =
            node.messages.drain(..).partition(|m| m.text == text);
        node.messages = kept;
        let any = !removed.is_empty();
        for message in removed {
            self.emit(GraphEvent::MessageRemoved {
                node: node_id,
                message,
            });
        }
        any
    }

    /// Remove every diagnostic from a node
    pub fn clear_messages(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return;
        };
        let removed = std::mem::take(&mut node.messages);
        for message in removed {
            self.emit(GraphEvent::MessageRemoved {
                node: node_id,
                message,
            });
        }
    }

    pub(crate) fn emit(&mut self, event: impl Into<GraphEvent>) {
        self.events.push(event.into());
    }

    /// Pending events, oldest first
    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    /// Take all pending events
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled", GraphContext::standard())
    }
}

/// Error when creating an edge
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {} on node {}", .0.port, .0.node)]
    PortNotFound(PortRef),

    /// Port exists but faces the wrong way
    #[error("Port {} on node {} has the wrong direction", .0.port, .0.node)]
    WrongDirection(PortRef),

    /// Incompatible port types
    #[error("Incompatible port types: {from} cannot flow into {to}")]
    IncompatibleTypes {
        /// Producer type
        from: PortType,
        /// Consumer type
        to: PortType,
    },

    /// The same two ports are already connected
    #[error("Ports already connected by edge {0}")]
    AlreadyConnected(EdgeId),

    /// Self-loop not allowed
    #[error("Self-loop not allowed on node {0}")]
    SelfLoop(NodeId),

    /// Graph ports are not live
    #[error("Graph is disabled")]
    Disabled,
}

/// Error when graph contains a cycle
#[derive(Debug, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::create_standard_registry;
    use crate::port::PortId;
    use std::sync::Arc;

    fn graph() -> Graph {
        Graph::new("test", GraphContext::standard())
    }

    fn port_snapshot(graph: &Graph) -> Vec<(NodeId, Vec<(PortId, Vec<EdgeId>)>)> {
        graph
            .nodes()
            .map(|n| (n.id, n.ports().map(|p| (p.id.clone(), p.edges().to_vec())).collect()))
            .collect()
    }

    #[test]
    fn test_connect_and_disconnect_round_trip() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let sum = graph.create_node("sum", [200.0, 0.0]).unwrap();
        let relay = graph.create_node("relay", [100.0, 0.0]).unwrap();

        let before = port_snapshot(&graph);
        let edges_before = graph.edge_count();

        let edge = graph
            .connect(PortRef::member(a, "value"), PortRef::new(sum, "values", "0"), true)
            .unwrap();
        assert_ne!(port_snapshot(&graph), before, "sum grows a free port");
        graph.disconnect(edge).unwrap();
        assert_eq!(port_snapshot(&graph), before);
        assert_eq!(graph.edge_count(), edges_before);

        let edge = graph
            .connect(PortRef::member(a, "value"), PortRef::member(relay, "input"), true)
            .unwrap();
        graph.disconnect(edge).unwrap();
        assert_eq!(port_snapshot(&graph), before);
    }

    #[test]
    fn test_connect_errors_leave_graph_unchanged() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let b = graph.create_node("add", [100.0, 0.0]).unwrap();
        let ghost = NodeId::new();
        graph.drain_events();

        assert_eq!(
            graph.connect(PortRef::member(ghost, "value"), PortRef::member(b, "a"), true),
            Err(ConnectError::NodeNotFound(ghost))
        );
        assert!(matches!(
            graph.connect(PortRef::member(a, "nope"), PortRef::member(b, "a"), true),
            Err(ConnectError::PortNotFound(_))
        ));
        assert!(matches!(
            graph.connect(PortRef::member(b, "a"), PortRef::member(a, "value"), true),
            Err(ConnectError::WrongDirection(_))
        ));
        assert!(matches!(
            graph.connect(PortRef::member(b, "result"), PortRef::member(b, "a"), true),
            Err(ConnectError::SelfLoop(_))
        ));
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.drain_events().is_empty());
    }

    #[test]
    fn test_incompatible_pair_never_connects() {
        let types = TypeRegistry::builder()
            .with_defaults()
            .with_incompatible(PortType::Int, PortType::Float)
            .build();
        let ctx = GraphContext::new(Arc::new(types), create_standard_registry());
        let mut graph = Graph::new("test", ctx);
        let int = graph.create_node("int_constant", [0.0, 0.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        let relay = graph.create_node("relay", [50.0, 0.0]).unwrap();
        graph.drain_events();

        // The conversion table knows int -> float, but the override wins
        let result = graph.connect(PortRef::member(int, "value"), PortRef::member(add, "a"), true);
        assert!(matches!(result, Err(ConnectError::IncompatibleTypes { .. })));
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph
            .drain_events()
            .iter()
            .any(|e| matches!(e.change(), Some(GraphChange::AddedEdge(_)))));

        // A relay typed by its input cannot smuggle the value through either
        graph
            .connect(PortRef::member(int, "value"), PortRef::member(relay, "input"), true)
            .unwrap();
        let result = graph.connect(PortRef::member(relay, "output"), PortRef::member(add, "a"), true);
        assert!(result.is_err());
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_single_input_replaces_previous_edge() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let b = graph.create_node("float_constant", [0.0, 100.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();

        let first = graph
            .connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true)
            .unwrap();
        let second = graph
            .connect(PortRef::member(b, "value"), PortRef::member(add, "a"), true)
            .unwrap();
        assert!(graph.edge(first).is_none());
        assert!(graph.edge(second).is_some());
        assert_eq!(graph.port(&PortRef::member(add, "a")).unwrap().edges(), [second]);

        // Without auto-disconnect the previous edge stays, fan-in is preserved
        let third = graph
            .connect(PortRef::member(a, "value"), PortRef::member(add, "a"), false)
            .unwrap();
        assert_eq!(graph.port(&PortRef::member(add, "a")).unwrap().edges(), [second, third]);
    }

    #[test]
    fn test_duplicate_edge_is_rejected() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        let edge = graph
            .connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true)
            .unwrap();
        assert_eq!(
            graph.connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true),
            Err(ConnectError::AlreadyConnected(edge))
        );
    }

    #[test]
    fn test_remove_node_drops_all_its_edges() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let b = graph.create_node("float_constant", [0.0, 100.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        let sink1 = graph.create_node("to_string", [200.0, 0.0]).unwrap();
        let sink2 = graph.create_node("to_string", [200.0, 100.0]).unwrap();
        let sink3 = graph.create_node("add", [200.0, 200.0]).unwrap();
        let other = graph.create_node("add", [300.0, 0.0]).unwrap();

        graph.connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true).unwrap();
        graph.connect(PortRef::member(b, "value"), PortRef::member(add, "b"), true).unwrap();
        for sink in [sink1, sink2] {
            graph.connect(PortRef::member(add, "result"), PortRef::member(sink, "value"), true).unwrap();
        }
        graph.connect(PortRef::member(add, "result"), PortRef::member(sink3, "a"), true).unwrap();
        graph.connect(PortRef::member(a, "value"), PortRef::member(other, "a"), true).unwrap();

        let (nodes, edges) = (graph.node_count(), graph.edge_count());
        assert!(graph.remove_node(add).is_some());
        assert_eq!(graph.node_count(), nodes - 1);
        assert_eq!(graph.edge_count(), edges - 5);
        assert!(graph.edges().all(|e| !e.involves_node(add)));
        assert!(graph.ports_are_consistent());

        // Removing again is a no-op
        assert!(graph.remove_node(add).is_none());
        assert_eq!(graph.edge_count(), edges - 5);
    }

    #[test]
    fn test_disconnect_resets_input_value() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        graph.set_value(add, "a", PortValue::Float(5.0));
        let edge = graph
            .connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true)
            .unwrap();
        assert_eq!(graph.node(add).unwrap().value("a"), Some(&PortValue::Float(5.0)));

        graph.disconnect(edge);
        assert_eq!(graph.node(add).unwrap().value("a"), Some(&PortValue::Float(0.0)));
        assert!(graph.disconnect(edge).is_none());
    }

    #[test]
    fn test_disconnect_keeps_value_when_member_opts_out() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let divide = graph.create_node("divide", [100.0, 0.0]).unwrap();
        graph.set_value(divide, "a", PortValue::Float(8.0));
        graph.set_value(divide, "b", PortValue::Float(4.0));
        let into_a = graph
            .connect(PortRef::member(a, "value"), PortRef::member(divide, "a"), true)
            .unwrap();
        let into_b = graph
            .connect(PortRef::member(a, "value"), PortRef::member(divide, "b"), true)
            .unwrap();

        graph.disconnect(into_a);
        graph.disconnect(into_b);
        let node = graph.node(divide).unwrap();
        assert_eq!(node.value("a"), Some(&PortValue::Float(0.0)));
        assert_eq!(node.value("b"), Some(&PortValue::Float(4.0)));
        assert!(graph.port(&PortRef::member(divide, "b")).unwrap().tooltip.is_some());
    }

    #[test]
    fn test_added_edge_follows_port_updates() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let sum = graph.create_node("sum", [100.0, 0.0]).unwrap();
        graph.drain_events();

        let edge = graph
            .connect(PortRef::member(a, "value"), PortRef::new(sum, "values", "0"), true)
            .unwrap();
        let events = graph.drain_events();
        let updated = events
            .iter()
            .position(|e| matches!(e, GraphEvent::PortsUpdated { node, .. } if *node == sum))
            .unwrap();
        let added = events
            .iter()
            .position(|e| e.change() == Some(GraphChange::AddedEdge(edge)))
            .unwrap();
        assert!(updated < added);
        assert_eq!(added, events.len() - 1);
    }

    #[test]
    fn test_events_for_node_and_edge() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        let edge = graph
            .connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true)
            .unwrap();
        graph.remove_node(add);

        let changes: Vec<GraphChange> = graph.drain_events().iter().filter_map(GraphEvent::change).collect();
        assert_eq!(
            changes,
            vec![
                GraphChange::AddedNode(a),
                GraphChange::AddedNode(add),
                GraphChange::AddedEdge(edge),
                GraphChange::RemovedEdge(edge),
                GraphChange::RemovedNode(add),
            ]
        );
        assert!(graph.events().is_empty());
    }

    #[test]
    fn test_messages() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        assert!(graph.add_message(a, "check me", MessageSeverity::Warning));
        assert!(!graph.add_message(a, "check me", MessageSeverity::Warning));
        assert_eq!(graph.node(a).unwrap().messages().len(), 1);
        assert!(graph.remove_message(a, "check me"));
        assert!(!graph.remove_message(a, "check me"));
        assert!(!graph.add_message(NodeId::new(), "nobody", MessageSeverity::Info));
    }

    #[test]
    fn test_duplicate_uses_fresh_ids() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        graph.connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true).unwrap();

        let copy = graph.duplicate();
        assert_eq!(copy.node_count(), 2);
        assert_eq!(copy.edge_count(), 1);
        assert!(copy.node(a).is_none());
        assert!(copy.edges().all(|e| graph.edge(e.id).is_none()));
        assert!(copy.ports_are_consistent());
    }

    #[test]
    fn test_disconnected_graph_refuses_edges() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        graph.disable();
        assert!(graph.node(a).unwrap().ports().next().is_none());
        assert_eq!(
            graph.connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true),
            Err(ConnectError::Disabled)
        );
        graph.enable();
        assert!(graph
            .connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true)
            .is_ok());
    }

    #[test]
    fn test_topological_order() {
        let mut graph = graph();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        graph.connect(PortRef::member(a, "value"), PortRef::member(add, "a"), true).unwrap();

        assert_eq!(graph.topological_order().unwrap(), vec![a, add]);
    }
}
