// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constants and arithmetic.

use crate::evaluation::{EvaluationError, NodeInputs, NodeOutput};
use crate::node::{BehaviorContext, MemberDecl, Node, NodeCategory, NodeType};
use crate::port::{PortDescriptor, PortDirection, PortId, PortType, PortValue};

/// All math node types
pub fn math_types() -> Vec<NodeType> {
    vec![
        NodeType::new("float_constant", "Float", NodeCategory::Input)
            .with_description("Constant float value")
            .with_member(
                MemberDecl::output("value", PortType::Float)
                    .with_display_name("Value")
                    .with_default(PortValue::Float(0.0)),
            )
            .with_process(constant),
        NodeType::new("int_constant", "Integer", NodeCategory::Input)
            .with_description("Constant integer value")
            .with_member(
                MemberDecl::output("value", PortType::Int)
                    .with_display_name("Value")
                    .with_default(PortValue::Int(0)),
            )
            .with_process(constant),
        NodeType::new("add", "Add", NodeCategory::Math)
            .with_description("Add two values")
            .with_member(MemberDecl::input("a", PortType::Float).with_display_name("A").with_default(PortValue::Float(0.0)))
            .with_member(MemberDecl::input("b", PortType::Float).with_display_name("B").with_default(PortValue::Float(0.0)))
            .with_member(MemberDecl::output("result", PortType::Float).with_display_name("Result"))
            .with_process(add),
        NodeType::new("divide", "Divide", NodeCategory::Math)
            .with_description("Divide one value by another")
            .with_member(
                MemberDecl::input("a", PortType::Float)
                    .with_display_name("A")
                    .with_default(PortValue::Float(0.0)),
            )
            .with_member(
                MemberDecl::input("b", PortType::Float)
                    .with_display_name("B")
                    .with_default(PortValue::Float(1.0))
                    .with_tooltip("Divisor, kept when its edge is removed")
                    .keep_value_on_disconnect(),
            )
            .with_member(MemberDecl::output("result", PortType::Float).with_display_name("Result"))
            .with_process(divide),
        NodeType::new("sum", "Sum", NodeCategory::Math)
            .with_description("Add any number of values")
            .with_member(
                MemberDecl::input("values", PortType::Float)
                    .with_display_name("Value")
                    .dynamic(sum_inputs),
            )
            .with_member(MemberDecl::output("result", PortType::Float).with_display_name("Result"))
            .with_process(sum),
        NodeType::new("to_string", "To String", NodeCategory::Utility)
            .with_description("Format any value as text")
            .with_member(MemberDecl::input("value", PortType::Any).with_display_name("Value").required())
            .with_member(MemberDecl::output("text", PortType::String).with_display_name("Text"))
            .with_process(to_string),
    ]
}

/// One port per connected identifier plus one free port
fn sum_inputs(ctx: &BehaviorContext<'_>) -> Vec<PortDescriptor> {
    let mut used: Vec<&str> = ctx
        .edges
        .iter()
        .filter(|e| e.side == PortDirection::Input)
        .map(|e| e.local.identifier.as_str())
        .collect();
    used.sort_by_key(|id| (id.parse::<usize>().unwrap_or(usize::MAX), *id));
    used.dedup();

    let free = (0..).find(|n: &usize| !used.contains(&n.to_string().as_str())).unwrap_or(0);
    used.iter()
        .map(|id| id.to_string())
        .chain(std::iter::once(free.to_string()))
        .map(|id| {
            let name = format!("{} {}", ctx.member.display_name, id);
            PortDescriptor::new(id, name).with_tooltip("Connect a value to add another input")
        })
        .collect()
}

fn constant(node: &Node, _inputs: &NodeInputs) -> Result<NodeOutput, EvaluationError> {
    let value = node
        .value("value")
        .cloned()
        .ok_or_else(|| EvaluationError::MissingInput(PortId::member("value")))?;
    let mut output = NodeOutput::new();
    output.set(PortId::member("value"), value);
    Ok(output)
}

fn add(_node: &Node, inputs: &NodeInputs) -> Result<NodeOutput, EvaluationError> {
    let a = inputs.float("a").ok_or_else(|| EvaluationError::MissingInput(PortId::member("a")))?;
    let b = inputs.float("b").ok_or_else(|| EvaluationError::MissingInput(PortId::member("b")))?;
    let mut output = NodeOutput::new();
    output.set(PortId::member("result"), PortValue::Float(a + b));
    Ok(output)
}

fn divide(_node: &Node, inputs: &NodeInputs) -> Result<NodeOutput, EvaluationError> {
    let a = inputs.float("a").ok_or_else(|| EvaluationError::MissingInput(PortId::member("a")))?;
    let b = inputs.float("b").ok_or_else(|| EvaluationError::MissingInput(PortId::member("b")))?;
    if b == 0.0 {
        return Err(EvaluationError::Custom("Division by zero".to_string()));
    }
    let mut output = NodeOutput::new();
    output.set(PortId::member("result"), PortValue::Float(a / b));
    Ok(output)
}

fn sum(_node: &Node, inputs: &NodeInputs) -> Result<NodeOutput, EvaluationError> {
    let total: f32 = inputs.all("values").iter().filter_map(PortValue::as_float).sum();
    let mut output = NodeOutput::new();
    output.set(PortId::member("result"), PortValue::Float(total));
    Ok(output)
}

fn to_string(_node: &Node, inputs: &NodeInputs) -> Result<NodeOutput, EvaluationError> {
    let value = inputs
        .first("value")
        .ok_or_else(|| EvaluationError::MissingInput(PortId::member("value")))?;
    let mut output = NodeOutput::new();
    output.set(PortId::member("text"), PortValue::String(value.to_string()));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_process() {
        let add_type = math_types().into_iter().find(|t| t.id == "add").unwrap();
        let node = Node::new(&add_type);
        let mut inputs = NodeInputs::new();
        inputs.push("a", PortValue::Float(2.0));
        inputs.push("b", PortValue::Int(3));

        let output = (add_type.process.unwrap())(&node, &inputs).unwrap();
        assert_eq!(output.get(&PortId::member("result")), Some(&PortValue::Float(5.0)));
    }

    #[test]
    fn test_divide_by_zero_is_reported() {
        let divide_type = math_types().into_iter().find(|t| t.id == "divide").unwrap();
        let node = Node::new(&divide_type);
        let process = divide_type.process.unwrap();

        let mut inputs = NodeInputs::new();
        inputs.push("a", PortValue::Float(3.0));
        inputs.push("b", PortValue::Float(2.0));
        let output = process(&node, &inputs).unwrap();
        assert_eq!(output.get(&PortId::member("result")), Some(&PortValue::Float(1.5)));

        let mut inputs = NodeInputs::new();
        inputs.push("a", PortValue::Float(3.0));
        inputs.push("b", PortValue::Float(0.0));
        let result = process(&node, &inputs);
        assert!(matches!(result, Err(EvaluationError::Custom(message)) if message == "Division by zero"));
    }

    #[test]
    fn test_to_string_requires_value() {
        let text_type = math_types().into_iter().find(|t| t.id == "to_string").unwrap();
        let node = Node::new(&text_type);
        let result = (text_type.process.unwrap())(&node, &NodeInputs::new());
        assert!(matches!(result, Err(EvaluationError::MissingInput(_))));
    }
}
