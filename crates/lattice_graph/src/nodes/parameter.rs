// SPDX-License-Identifier: MIT OR Apache-2.0
//! Boundary parameter handle.
//!
//! An input parameter's handle has a single output (the value entering the
//! graph); an output parameter's handle has a single input. Both take the
//! parameter's name and type.

use super::PARAMETER_NODE;
use crate::node::{BehaviorContext, MemberDecl, NodeCategory, NodeType};
use crate::parameter::ParameterDirection;
use crate::port::{PortDescriptor, PortType};

/// Parameter handle node type
pub fn parameter_type() -> NodeType {
    NodeType::new(PARAMETER_NODE, "Parameter", NodeCategory::Input)
        .with_description("Stands in for a boundary parameter of the graph")
        .with_member(MemberDecl::input("input", PortType::Any).dynamic(input_ports))
        .with_member(MemberDecl::output("output", PortType::Any).dynamic(output_ports))
}

fn input_ports(ctx: &BehaviorContext<'_>) -> Vec<PortDescriptor> {
    handle_port(ctx, ParameterDirection::Output)
}

fn output_ports(ctx: &BehaviorContext<'_>) -> Vec<PortDescriptor> {
    handle_port(ctx, ParameterDirection::Input)
}

fn handle_port(ctx: &BehaviorContext<'_>, wanted: ParameterDirection) -> Vec<PortDescriptor> {
    let Some(parameter) = ctx.node.parameter().and_then(|id| ctx.graph.parameter(id)) else {
        return Vec::new();
    };
    if parameter.direction != wanted {
        return Vec::new();
    }
    vec![PortDescriptor::new("", parameter.name.clone())
        .with_type(parameter.port_type.clone())
        .with_multi_connect(ctx.member.multi_connect)]
}
