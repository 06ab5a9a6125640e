// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port materialization and propagation.
//!
//! A member's ports are recomputed from its declaration (static) or its
//! behavior function (dynamic). Ports that survive keep their attached
//! edges; ports that vanish, and edges whose remote end no longer fits the
//! new type, are disconnected. When a member's ports change, every node on
//! the other end of its edges gets its dynamic members re-evaluated, until
//! the graph is stable.

use crate::compat::TypeRegistry;
use crate::edge::{EdgeId, EdgeView, PortRef};
use crate::events::GraphEvent;
use crate::graph::Graph;
use crate::node::{BehaviorContext, NodeId, PortBehavior};
use crate::port::{Port, PortDescriptor, PortDirection, PortType};
use std::collections::HashSet;

/// Outcome of one propagation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Propagation {
    /// Whether any member's ports changed
    pub changed: bool,
    /// `(node, members)` pairs processed, in order
    pub visited: Vec<(NodeId, Vec<String>)>,
}

#[derive(Debug, Default)]
pub(crate) struct MemberOutcome {
    pub(crate) changed: bool,
    pub(crate) detached_neighbors: Vec<NodeId>,
}

impl Graph {
    /// Re-materialize every member of a node, in member order, propagating
    /// changes to neighbors. Returns whether any port changed.
    pub fn update_all_ports(&mut self, node_id: NodeId) -> bool {
        let mut changed = false;
        for member in self.member_order(node_id) {
            changed |= self.update_ports_for_member(node_id, &member);
        }
        changed
    }

    /// Re-materialize one member, propagating changes to neighbors
    pub fn update_ports_for_member(&mut self, node_id: NodeId, member: &str) -> bool {
        self.propagate(node_id, vec![member.to_string()]).changed
    }

    /// Run the propagation worklist starting at `(node, members)`.
    ///
    /// A `(node, members)` pair is processed at most once per run, so
    /// cycles through dynamic members terminate.
    pub fn propagate(&mut self, node_id: NodeId, members: Vec<String>) -> Propagation {
        let mut result = Propagation::default();
        if !self.is_enabled() {
            return result;
        }

        let mut worklist = vec![(node_id, members)];
        let mut processed: HashSet<(NodeId, Vec<String>)> = HashSet::new();

        while let Some((node_id, members)) = worklist.pop() {
            if !self.nodes.contains_key(&node_id) || !processed.insert((node_id, members.clone())) {
                continue;
            }
            result.visited.push((node_id, members.clone()));

            for member in &members {
                let outcome = self.materialize_member(node_id, member);
                for neighbor in outcome.detached_neighbors {
                    self.schedule_dynamic(neighbor, &mut worklist);
                }
                if !outcome.changed {
                    continue;
                }
                result.changed = true;
                self.emit(GraphEvent::PortsUpdated {
                    node: node_id,
                    member: member.clone(),
                });
                for neighbor in self.member_neighbors(node_id, member) {
                    self.schedule_dynamic(neighbor, &mut worklist);
                }
            }
        }

        result
    }

    fn schedule_dynamic(&self, node_id: NodeId, worklist: &mut Vec<(NodeId, Vec<String>)>) {
        let members = self.dynamic_members(node_id);
        if !members.is_empty() {
            worklist.push((node_id, members));
        }
    }

    /// Nodes on the far end of the edges attached to a member's ports
    fn member_neighbors(&self, node_id: NodeId, member: &str) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&node_id) else {
            return Vec::new();
        };
        let mut neighbors = Vec::new();
        for edge_id in node.member_ports(member).flat_map(|p| p.edges().iter()) {
            let Some(edge) = self.edges.get(edge_id) else {
                continue;
            };
            let other = if edge.from.node == node_id { edge.to.node } else { edge.from.node };
            if other != node_id && !neighbors.contains(&other) {
                neighbors.push(other);
            }
        }
        neighbors
    }

    /// Member names of a node in materialization order
    pub(crate) fn member_order(&self, node_id: NodeId) -> Vec<String> {
        self.nodes
            .get(&node_id)
            .and_then(|n| self.context().nodes().get(&n.node_type))
            .map(|t| t.ordered_members().into_iter().map(|m| m.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Names of a node's dynamic members
    pub fn dynamic_members(&self, node_id: NodeId) -> Vec<String> {
        self.nodes
            .get(&node_id)
            .and_then(|n| self.context().nodes().get(&n.node_type))
            .map(|t| t.dynamic_members())
            .unwrap_or_default()
    }

    /// Edges touching a member, as seen from that member.
    ///
    /// Looks at the graph's edge table rather than port edge lists, so
    /// behaviors also see edges that are not attached yet during loading.
    pub fn edge_views(&self, node_id: NodeId, member: &str) -> Vec<EdgeView> {
        self.edges
            .values()
            .filter_map(|edge| {
                let side = edge.side_for_member(node_id, member)?;
                let remote = edge.endpoint(side.opposite()).clone();
                Some(EdgeView {
                    edge: edge.id,
                    side,
                    local: edge.endpoint(side).port.clone(),
                    remote_type: self.port_type_hint(&remote),
                    remote,
                })
            })
            .collect()
    }

    /// Live type of a port, falling back to its member's declared type
    pub(crate) fn port_type_hint(&self, port: &PortRef) -> PortType {
        if let Some(resolved) = self.port(port) {
            return resolved.port_type.clone();
        }
        self.nodes
            .get(&port.node)
            .and_then(|n| self.context().nodes().get(&n.node_type))
            .and_then(|t| t.member(&port.port.member))
            .map(|m| m.port_type.clone())
            .unwrap_or(PortType::Any)
    }

    pub(crate) fn materialize_member(&mut self, node_id: NodeId, member: &str) -> MemberOutcome {
        let registry = self.context().nodes_arc();
        let types = self.context().types_arc();
        let Some(node) = self.nodes.get(&node_id) else {
            return MemberOutcome::default();
        };
        let Some(node_type) = registry.get(&node.node_type) else {
            return MemberOutcome::default();
        };
        let Some(decl) = node_type.member(member) else {
            return MemberOutcome::default();
        };
        let direction = decl.direction;

        let desired = match decl.behavior {
            PortBehavior::Static => vec![decl.static_descriptor()],
            PortBehavior::Dynamic(behavior) => {
                let views = self.edge_views(node_id, member);
                behavior(&BehaviorContext {
                    graph: self,
                    node,
                    member: decl,
                    edges: &views,
                })
            }
        };
        let mut seen = HashSet::new();
        let desired: Vec<PortDescriptor> = desired
            .into_iter()
            .filter(|d| {
                let fresh = seen.insert(d.identifier.clone());
                if !fresh {
                    tracing::warn!(
                        "Node {} member '{}' produced port '{}' twice",
                        node_id,
                        member,
                        d.identifier
                    );
                }
                fresh
            })
            .collect();

        let existing: Vec<Port> = node.member_ports(member).cloned().collect();
        let mut changed = existing.len() != desired.len()
            || existing
                .iter()
                .zip(&desired)
                .any(|(port, d)| port.id.identifier != d.identifier);

        let mut rebuilt = Vec::with_capacity(desired.len());
        let mut doomed: Vec<EdgeId> = Vec::new();
        for descriptor in &desired {
            let port_type = descriptor
                .port_type
                .clone()
                .unwrap_or_else(|| decl.port_type.clone());
            match existing.iter().find(|p| p.id.identifier == descriptor.identifier) {
                None => {
                    rebuilt.push(Port::from_descriptor(member, direction, descriptor, port_type));
                }
                Some(old) => {
                    if old.port_type != port_type {
                        if types.can_connect(&old.port_type, &port_type) {
                            doomed.extend(self.edges_rejecting(old, &port_type, &types));
                        } else {
                            doomed.extend(old.edges().iter().copied());
                        }
                    }
                    let mut port = old.clone();
                    changed |= port.apply(descriptor, &port_type);
                    rebuilt.push(port);
                }
            }
        }
        for old in &existing {
            if !desired.iter().any(|d| d.identifier == old.id.identifier) {
                doomed.extend(old.edges().iter().copied());
            }
        }

        let mut detached_neighbors = Vec::new();
        doomed.sort();
        doomed.dedup();
        for edge_id in doomed {
            if let Some(edge) = self.detach_edge(edge_id) {
                let other = if edge.from.node == node_id { edge.to.node } else { edge.from.node };
                if other != node_id && !detached_neighbors.contains(&other) {
                    detached_neighbors.push(other);
                }
            }
        }
        for port in &mut rebuilt {
            port.retain_edges(|e| self.edges.contains_key(&e));
        }

        let order: Vec<&str> = node_type
            .ordered_members()
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        if let Some(node) = self.nodes.get_mut(&node_id) {
            let ports = node.ports_mut(direction);
            ports.retain(|p| p.id.member != member);
            ports.extend(rebuilt);
            ports.sort_by_key(|p| order.iter().position(|m| *m == p.id.member).unwrap_or(usize::MAX));
        }

        if changed {
            tracing::trace!("Ports of {}.{} changed", node_id, member);
        }
        MemberOutcome {
            changed,
            detached_neighbors,
        }
    }

    /// Edges on `port` whose remote end cannot work with `new_type`
    fn edges_rejecting(&self, port: &Port, new_type: &PortType, types: &TypeRegistry) -> Vec<EdgeId> {
        port.edges()
            .iter()
            .copied()
            .filter(|edge_id| {
                let Some(edge) = self.edges.get(edge_id) else {
                    return false;
                };
                let remote = edge.endpoint(port.direction.opposite());
                let Some(remote_type) = self.port(remote).map(|p| &p.port_type) else {
                    return false;
                };
                match port.direction {
                    PortDirection::Input => !types.can_connect(remote_type, new_type),
                    PortDirection::Output => !types.can_connect(new_type, remote_type),
                }
            })
            .collect()
    }

    /// Check that every edge is listed by both endpoint ports, and every
    /// port lists only edges that exist and attach to it.
    pub fn ports_are_consistent(&self) -> bool {
        let edges_ok = self.edges.values().all(|edge| {
            [&edge.from, &edge.to]
                .into_iter()
                .all(|end| self.port(end).is_some_and(|p| p.edges().contains(&edge.id)))
        });
        let ports_ok = self.nodes.values().all(|node| {
            node.ports().all(|port| {
                let here = PortRef {
                    node: node.id,
                    port: port.id.clone(),
                };
                port.edges()
                    .iter()
                    .all(|id| self.edges.get(id).is_some_and(|e| e.involves_port(&here)))
            })
        });
        edges_ok && ports_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphContext;
    use crate::events::GraphChange;
    use crate::port::PortId;

    fn graph() -> Graph {
        Graph::new("test", GraphContext::standard())
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let relay = graph.create_node("relay", [100.0, 0.0]).unwrap();
        let sum = graph.create_node("sum", [200.0, 0.0]).unwrap();
        graph.connect(PortRef::member(a, "value"), PortRef::member(relay, "input"), true).unwrap();
        graph
            .connect(PortRef::member(relay, "output"), PortRef::new(sum, "values", "0"), true)
            .unwrap();
        graph.drain_events();

        for node in [a, relay, sum] {
            assert!(!graph.update_all_ports(node));
        }
        assert!(graph.drain_events().is_empty());
    }

    #[test]
    fn test_relay_chain_adopts_producer_type() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let r1 = graph.create_node("relay", [100.0, 0.0]).unwrap();
        let r2 = graph.create_node("relay", [200.0, 0.0]).unwrap();
        graph.connect(PortRef::member(r1, "output"), PortRef::member(r2, "input"), true).unwrap();
        let output_type = |g: &Graph, n| g.port(&PortRef::member(n, "output")).unwrap().port_type.clone();
        assert_eq!(output_type(&graph, r2), PortType::Any);

        let edge = graph.connect(PortRef::member(a, "value"), PortRef::member(r1, "input"), true).unwrap();
        assert_eq!(output_type(&graph, r1), PortType::Float);
        assert_eq!(output_type(&graph, r2), PortType::Float);

        graph.disconnect(edge);
        assert_eq!(output_type(&graph, r2), PortType::Any);
    }

    #[test]
    fn test_relay_cycle_terminates() {
        let mut graph = graph();
        let r1 = graph.create_node("relay", [0.0, 0.0]).unwrap();
        let r2 = graph.create_node("relay", [100.0, 0.0]).unwrap();
        graph.connect(PortRef::member(r1, "output"), PortRef::member(r2, "input"), true).unwrap();
        graph.connect(PortRef::member(r2, "output"), PortRef::member(r1, "input"), true).unwrap();

        let run = graph.propagate(r1, graph.dynamic_members(r1));
        let mut seen = HashSet::new();
        assert!(run.visited.iter().all(|pair| seen.insert(pair.clone())));
        assert!(graph.ports_are_consistent());
    }

    #[test]
    fn test_sum_keeps_one_free_port() {
        let mut graph = graph();
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let b = graph.create_node("float_constant", [0.0, 100.0]).unwrap();
        let sum = graph.create_node("sum", [200.0, 0.0]).unwrap();
        let identifiers = |g: &Graph| -> Vec<String> {
            g.node(sum).unwrap().inputs().iter().map(|p| p.id.identifier.clone()).collect()
        };
        assert_eq!(identifiers(&graph), ["0"]);

        graph.connect(PortRef::member(a, "value"), PortRef::new(sum, "values", "0"), true).unwrap();
        let second = graph
            .connect(PortRef::member(b, "value"), PortRef::new(sum, "values", "1"), true)
            .unwrap();
        assert_eq!(identifiers(&graph), ["0", "1", "2"]);

        graph.disconnect(second);
        assert_eq!(identifiers(&graph), ["0", "1"]);
        assert!(graph
            .drain_events()
            .iter()
            .any(|e| matches!(e, GraphEvent::PortsUpdated { node, .. } if *node == sum)));
    }

    #[test]
    fn test_vanishing_port_drops_its_edges() {
        let mut graph = graph();
        let id = graph.add_parameter("In", PortType::Float, crate::parameter::ParameterDirection::Input);
        let handle = graph.add_parameter_node(id, [0.0, 0.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        let edge = graph
            .connect(PortRef::member(handle, "output"), PortRef::member(add, "a"), true)
            .unwrap();
        graph.drain_events();

        // Turning the parameter around moves the handle's port to the other side
        graph.parameters[0].direction = crate::parameter::ParameterDirection::Output;
        graph.update_all_ports(handle);

        assert!(graph.node(handle).unwrap().port(&PortId::member("output")).is_none());
        assert!(graph.edge(edge).is_none());
        assert!(graph
            .drain_events()
            .contains(&GraphEvent::Changed(GraphChange::RemovedEdge(edge))));
        assert!(graph.ports_are_consistent());
    }

    #[test]
    fn test_edge_views_report_remote_type() {
        let mut graph = graph();
        let a = graph.create_node("int_constant", [0.0, 0.0]).unwrap();
        let relay = graph.create_node("relay", [100.0, 0.0]).unwrap();
        graph.connect(PortRef::member(a, "value"), PortRef::member(relay, "input"), true).unwrap();

        let views = graph.edge_views(relay, "input");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].side, PortDirection::Input);
        assert_eq!(views[0].remote, PortRef::member(a, "value"));
        assert_eq!(views[0].remote_type, PortType::Int);
    }
}
