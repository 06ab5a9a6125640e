// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference to a child graph in the library.
//!
//! The node shows one port per boundary parameter of the child, identified
//! by the parameter ID. Input ports infer whether they are required and
//! whether they accept several producers from what the parameter feeds
//! inside the child.

use super::SUBGRAPH_NODE;
use crate::graph::Graph;
use crate::node::{BehaviorContext, MemberDecl, NodeCategory, NodeData, NodeId, NodeType};
use crate::parameter::{ParameterDirection, ParameterId};
use crate::port::{PortDescriptor, PortType};
use std::collections::HashSet;
use std::sync::Arc;

/// Subgraph reference node type
pub fn subgraph_type() -> NodeType {
    NodeType::new(SUBGRAPH_NODE, "Subgraph", NodeCategory::Flow)
        .with_description("Uses another graph through its boundary parameters")
        .with_on_create(|node| node.data = NodeData::Subgraph { asset: None })
        .with_member(MemberDecl::input("inputs", PortType::Any).dynamic(input_ports))
        .with_member(MemberDecl::output("outputs", PortType::Any).dynamic(output_ports))
}

fn child_graph(ctx: &BehaviorContext<'_>) -> Option<Arc<Graph>> {
    match &ctx.node.data {
        NodeData::Subgraph { asset: Some(asset) } => ctx.context().subgraph(asset),
        _ => None,
    }
}

fn input_ports(ctx: &BehaviorContext<'_>) -> Vec<PortDescriptor> {
    let Some(child) = child_graph(ctx) else {
        return Vec::new();
    };
    let max_depth = ctx.context().settings().max_boundary_walk_depth;
    child
        .parameters()
        .iter()
        .filter(|p| p.direction == ParameterDirection::Input)
        .map(|p| {
            let shape = boundary_shape(&child, p.id, max_depth);
            PortDescriptor::new(p.port_identifier(), p.name.clone())
                .with_type(p.port_type.clone())
                .with_required(shape.required)
                .with_multi_connect(shape.multi_connect)
        })
        .collect()
}

fn output_ports(ctx: &BehaviorContext<'_>) -> Vec<PortDescriptor> {
    let Some(child) = child_graph(ctx) else {
        return Vec::new();
    };
    child
        .parameters()
        .iter()
        .filter(|p| p.direction == ParameterDirection::Output)
        .map(|p| {
            PortDescriptor::new(p.port_identifier(), p.name.clone())
                .with_type(p.port_type.clone())
                .with_multi_connect(true)
        })
        .collect()
}

/// Connection policy of an input parameter as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundaryShape {
    /// Some consumer inside the child requires the value
    pub required: bool,
    /// Consumers were found and all of them accept several producers
    pub multi_connect: bool,
}

/// Walk from the handles of `parameter` through relay nodes to the real
/// consumers, following the child's edge records.
pub fn boundary_shape(child: &Graph, parameter: ParameterId, max_depth: usize) -> BoundaryShape {
    let registry = child.context().nodes();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut pending: Vec<(NodeId, usize)> = child
        .parameter_nodes(parameter)
        .into_iter()
        .map(|n| (n, 0))
        .collect();

    let mut reached = false;
    let mut shape = BoundaryShape {
        required: false,
        multi_connect: true,
    };

    while let Some((node_id, depth)) = pending.pop() {
        if !visited.insert(node_id) {
            continue;
        }
        if depth > max_depth {
            tracing::warn!(
                "Stopped walking parameter {} in '{}' at depth {}",
                parameter,
                child.name,
                max_depth
            );
            continue;
        }
        for edge in child.edges().filter(|e| e.from.node == node_id) {
            let Some(consumer) = child.node(edge.to.node) else {
                continue;
            };
            let Some(consumer_type) = registry.get(&consumer.node_type) else {
                continue;
            };
            if consumer_type.relay {
                pending.push((consumer.id, depth + 1));
                continue;
            }
            let Some(member) = consumer_type.member(&edge.to.port.member) else {
                continue;
            };
            reached = true;
            shape.required |= member.required;
            shape.multi_connect &= member.multi_connect;
        }
    }

    shape.multi_connect &= reached;
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphContext;
    use crate::edge::PortRef;
    use crate::port::PortId;

    fn child_with_parameter(ctx: &GraphContext) -> (Graph, ParameterId, NodeId) {
        let mut child = Graph::new("child", ctx.clone());
        let id = child.add_parameter("Value", PortType::Float, ParameterDirection::Input);
        let handle = child.add_parameter_node(id, [0.0, 0.0]).unwrap();
        (child, id, handle)
    }

    #[test]
    fn test_shape_through_relays() {
        let ctx = GraphContext::standard();
        let (mut child, id, handle) = child_with_parameter(&ctx);
        let relay = child.create_node("relay", [50.0, 0.0]).unwrap();
        let sum = child.create_node("sum", [100.0, 0.0]).unwrap();
        let text = child.create_node("to_string", [100.0, 100.0]).unwrap();
        child.connect(PortRef::member(handle, "output"), PortRef::member(relay, "input"), true).unwrap();
        child.connect(PortRef::member(relay, "output"), PortRef::new(sum, "values", "0"), true).unwrap();

        let shape = boundary_shape(&child, id, 64);
        assert_eq!(shape, BoundaryShape { required: false, multi_connect: false });

        child.connect(PortRef::member(relay, "output"), PortRef::member(text, "value"), true).unwrap();
        assert!(boundary_shape(&child, id, 64).required);
    }

    #[test]
    fn test_shape_survives_relay_cycle() {
        let ctx = GraphContext::standard();
        let (mut child, id, handle) = child_with_parameter(&ctx);
        let r1 = child.create_node("relay", [50.0, 0.0]).unwrap();
        let r2 = child.create_node("relay", [100.0, 0.0]).unwrap();
        child.connect(PortRef::member(handle, "output"), PortRef::member(r1, "input"), false).unwrap();
        child.connect(PortRef::member(r1, "output"), PortRef::member(r2, "input"), true).unwrap();
        child.connect(PortRef::member(r2, "output"), PortRef::member(r1, "input"), false).unwrap();

        assert_eq!(boundary_shape(&child, id, 64), BoundaryShape::default());
    }

    #[test]
    fn test_node_ports_follow_child_parameters() {
        let ctx = GraphContext::standard();
        let (mut child, id, handle) = child_with_parameter(&ctx);
        let text = child.create_node("to_string", [100.0, 0.0]).unwrap();
        child.connect(PortRef::member(handle, "output"), PortRef::member(text, "value"), true).unwrap();
        let out = child.add_parameter("Text", PortType::String, ParameterDirection::Output);
        ctx.register_graph("child", child);

        let mut host = Graph::new("host", ctx.clone());
        let node = host.create_subgraph_node("child", [0.0, 0.0]).unwrap();
        let node = host.node(node).unwrap();

        let input = node.port(&PortId::new("inputs", id.to_string())).unwrap();
        assert_eq!(input.port_type, PortType::Float);
        assert!(input.required);
        assert!(!input.multi_connect);
        let output = node.port(&PortId::new("outputs", out.to_string())).unwrap();
        assert_eq!(output.port_type, PortType::String);
        assert!(output.multi_connect);
    }

    #[test]
    fn test_unknown_asset_has_no_ports() {
        let mut host = Graph::new("host", GraphContext::standard());
        let node = host.create_subgraph_node("nowhere", [0.0, 0.0]).unwrap();
        assert_eq!(host.node(node).unwrap().ports().count(), 0);
    }
}
