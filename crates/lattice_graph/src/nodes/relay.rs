// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pass-through node. Both ports take the type of whatever feeds the input.

use super::RELAY_NODE;
use crate::evaluation::{EvaluationError, NodeInputs, NodeOutput};
use crate::node::{BehaviorContext, MemberDecl, Node, NodeCategory, NodeType};
use crate::port::{PortDescriptor, PortDirection, PortId, PortType};

/// Relay node type
pub fn relay_type() -> NodeType {
    NodeType::new(RELAY_NODE, "Relay", NodeCategory::Flow)
        .with_description("Routes a value without changing it")
        .as_relay()
        .with_member(MemberDecl::input("input", PortType::Any).dynamic(input_ports))
        .with_member(MemberDecl::output("output", PortType::Any).dynamic(output_ports))
        .with_process(pass_through)
}

fn input_ports(ctx: &BehaviorContext<'_>) -> Vec<PortDescriptor> {
    let port_type = ctx
        .edges
        .iter()
        .find(|e| e.side == PortDirection::Input)
        .map_or(PortType::Any, |e| e.remote_type.clone());
    vec![PortDescriptor::new("", ctx.member.display_name.clone())
        .with_type(port_type)
        .with_multi_connect(ctx.member.multi_connect)]
}

fn output_ports(ctx: &BehaviorContext<'_>) -> Vec<PortDescriptor> {
    let port_type = ctx
        .node
        .port(&PortId::member("input"))
        .map_or(PortType::Any, |p| p.port_type.clone());
    vec![PortDescriptor::new("", ctx.member.display_name.clone())
        .with_type(port_type)
        .with_multi_connect(ctx.member.multi_connect)]
}

fn pass_through(_node: &Node, inputs: &NodeInputs) -> Result<NodeOutput, EvaluationError> {
    let value = inputs
        .first("input")
        .cloned()
        .ok_or_else(|| EvaluationError::MissingInput(PortId::member("input")))?;
    let mut output = NodeOutput::new();
    output.set(PortId::member("output"), value);
    Ok(output)
}
