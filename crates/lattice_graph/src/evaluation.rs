// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation and execution.
//!
//! Evaluation runs on realized graphs: subgraph nodes must be inlined first.

use crate::graph::Graph;
use crate::node::NodeId;
use crate::parameter::{ParameterDirection, ParameterId};
use crate::port::{PortDirection, PortId, PortType, PortValue};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Values arriving at a node, grouped by member
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    values: IndexMap<String, Vec<PortValue>>,
}

impl NodeInputs {
    /// Create empty inputs
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value arriving at `member`
    pub fn push(&mut self, member: impl Into<String>, value: PortValue) {
        self.values.entry(member.into()).or_default().push(value);
    }

    /// First value arriving at `member`
    pub fn first(&self, member: &str) -> Option<&PortValue> {
        self.values.get(member).and_then(|v| v.first())
    }

    /// Every value arriving at `member`, in port order
    pub fn all(&self, member: &str) -> &[PortValue] {
        self.values.get(member).map_or(&[], Vec::as_slice)
    }

    /// First value of `member` as a float
    pub fn float(&self, member: &str) -> Option<f32> {
        self.first(member).and_then(PortValue::as_float)
    }
}

/// Result of evaluating a node
#[derive(Debug, Clone)]
pub struct NodeOutput {
    /// Output values by port ID
    pub values: HashMap<PortId, PortValue>,
}

impl NodeOutput {
    /// Create a new empty output
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set an output value
    pub fn set(&mut self, port_id: PortId, value: PortValue) {
        self.values.insert(port_id, value);
    }

    /// Get an output value
    pub fn get(&self, port_id: &PortId) -> Option<&PortValue> {
        self.values.get(port_id)
    }
}

impl Default for NodeOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Context for graph evaluation
pub struct EvaluationContext<'a> {
    /// The graph being evaluated
    pub graph: &'a Graph,
    /// Cached node outputs
    outputs: HashMap<NodeId, NodeOutput>,
    /// Evaluation order
    order: Vec<NodeId>,
    /// Values supplied for input parameters
    arguments: HashMap<ParameterId, PortValue>,
    /// Values collected by output parameters
    results: IndexMap<ParameterId, PortValue>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(graph: &'a Graph) -> Result<Self, EvaluationError> {
        let order = graph
            .topological_order()
            .map_err(|_| EvaluationError::CycleDetected)?;

        Ok(Self {
            graph,
            outputs: HashMap::new(),
            order,
            arguments: HashMap::new(),
            results: IndexMap::new(),
        })
    }

    /// Supply the value of an input parameter
    pub fn with_argument(mut self, parameter: ParameterId, value: PortValue) -> Self {
        self.arguments.insert(parameter, value);
        self
    }

    /// Value of an input parameter: the supplied one, else its default
    pub fn argument(&self, parameter: ParameterId) -> Option<&PortValue> {
        self.arguments.get(&parameter).or_else(|| {
            self.graph
                .parameter(parameter)
                .and_then(|p| p.default_value.as_ref())
        })
    }

    /// Gather every value arriving at a node's inputs.
    ///
    /// Connected ports take their producers' outputs, converted to the
    /// port's type. Unconnected single ports fall back to the value slot.
    pub fn gather_inputs(&self, node_id: NodeId) -> Result<NodeInputs, EvaluationError> {
        let node = self
            .graph
            .node(node_id)
            .ok_or(EvaluationError::NodeNotFound(node_id))?;
        let mut inputs = NodeInputs::new();

        for port in node.inputs() {
            let mut fed = false;
            for edge_id in port.edges() {
                let Some(edge) = self.graph.edge(*edge_id) else {
                    continue;
                };
                let Some(value) = self
                    .outputs
                    .get(&edge.from.node)
                    .and_then(|o| o.get(&edge.from.port))
                else {
                    continue;
                };
                let from = self
                    .graph
                    .port(&edge.from)
                    .map_or(PortType::Any, |p| p.port_type.clone());
                let converted = self
                    .graph
                    .types()
                    .convert(value, &from, &port.port_type)
                    .ok_or_else(|| EvaluationError::TypeMismatch {
                        from: from.clone(),
                        to: port.port_type.clone(),
                    })?;
                inputs.push(port.id.member.clone(), converted);
                fed = true;
            }
            if !fed && port.id.identifier.is_empty() {
                if let Some(value) = node.value(&port.id.member) {
                    inputs.push(port.id.member.clone(), value.clone());
                    fed = true;
                }
            }
            if !fed && port.required {
                return Err(EvaluationError::MissingInput(port.id.clone()));
            }
        }

        Ok(inputs)
    }

    /// Set the output for a node
    pub fn set_output(&mut self, node_id: NodeId, output: NodeOutput) {
        self.outputs.insert(node_id, output);
    }

    /// Record the value leaving through an output parameter
    pub fn record_result(&mut self, parameter: ParameterId, value: PortValue) {
        self.results.insert(parameter, value);
    }

    /// Get the evaluation order
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Get all outputs
    pub fn outputs(&self) -> &HashMap<NodeId, NodeOutput> {
        &self.outputs
    }

    /// Values collected by output parameters
    pub fn results(&self) -> &IndexMap<ParameterId, PortValue> {
        &self.results
    }

    /// Evaluate every node in order
    pub fn run(&mut self, evaluator: &dyn NodeEvaluator) -> Result<(), EvaluationError> {
        for node_id in self.order.clone() {
            let output = evaluator.evaluate(node_id, self)?;
            self.set_output(node_id, output);
        }
        Ok(())
    }
}

/// Trait for evaluating nodes
pub trait NodeEvaluator {
    /// Evaluate a node and produce outputs
    fn evaluate(&self, node_id: NodeId, ctx: &mut EvaluationContext) -> Result<NodeOutput, EvaluationError>;
}

/// Evaluates nodes through the `process` hooks of their registered types
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphProcessor;

impl GraphProcessor {
    /// Evaluate a realized graph with the given input parameter values and
    /// return the values of its output parameters.
    pub fn process(
        graph: &Graph,
        arguments: impl IntoIterator<Item = (ParameterId, PortValue)>,
    ) -> Result<IndexMap<ParameterId, PortValue>, EvaluationError> {
        let mut ctx = EvaluationContext::new(graph)?;
        for (parameter, value) in arguments {
            ctx = ctx.with_argument(parameter, value);
        }
        ctx.run(&GraphProcessor)?;
        tracing::debug!("Evaluated {} nodes of '{}'", ctx.order().len(), graph.name);
        Ok(ctx.results)
    }
}

impl NodeEvaluator for GraphProcessor {
    fn evaluate(&self, node_id: NodeId, ctx: &mut EvaluationContext) -> Result<NodeOutput, EvaluationError> {
        let graph = ctx.graph;
        let node = graph.node(node_id).ok_or(EvaluationError::NodeNotFound(node_id))?;

        if node.is_subgraph() {
            return Err(EvaluationError::NotSupported(format!(
                "subgraph node {node_id} must be realized before evaluation"
            )));
        }

        if let Some(id) = node.parameter() {
            let parameter = graph
                .parameter(id)
                .ok_or(EvaluationError::MissingParameter(id))?;
            let mut output = NodeOutput::new();
            match parameter.direction {
                ParameterDirection::Input => {
                    let value = ctx
                        .argument(id)
                        .cloned()
                        .ok_or(EvaluationError::MissingParameter(id))?;
                    output.set(PortId::member("output"), value);
                }
                ParameterDirection::Output => {
                    let inputs = ctx.gather_inputs(node_id)?;
                    if let Some(value) = inputs.first("input") {
                        ctx.record_result(id, value.clone());
                    }
                }
            }
            return Ok(output);
        }

        let process = graph
            .context()
            .nodes()
            .get(&node.node_type)
            .and_then(|t| t.process)
            .ok_or_else(|| EvaluationError::NotSupported(format!("node type '{}' cannot be evaluated", node.node_type)))?;
        let inputs = ctx.gather_inputs(node_id)?;
        let output = process(node, &inputs)?;

        // Only keep values for ports the node actually has
        let mut kept = NodeOutput::new();
        for (port_id, value) in output.values {
            match node.port(&port_id) {
                Some(port) if port.direction == PortDirection::Output => kept.set(port_id, value),
                _ => tracing::debug!("Node {} produced a value for unknown port {}", node_id, port_id),
            }
        }
        Ok(kept)
    }
}

/// Error during evaluation
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// Graph contains a cycle
    #[error("Graph contains a cycle")]
    CycleDetected,

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(PortId),

    /// No value for a boundary parameter
    #[error("No value for parameter {0}")]
    MissingParameter(ParameterId),

    /// A value could not be converted for its consumer
    #[error("Type mismatch: cannot convert {from} into {to}")]
    TypeMismatch {
        /// Producer type
        from: PortType,
        /// Consumer type
        to: PortType,
    },

    /// The node cannot be evaluated
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}
