// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph framework.
//!
//! A [`NodeType`] is a static table of members. Each [`MemberDecl`] says
//! whether it becomes an input or output, its declared type, and how it
//! turns into ports: a single implicit port ([`PortBehavior::Static`]) or a
//! function computing zero or more ports from the node and its attached
//! edges ([`PortBehavior::Dynamic`]).

use crate::context::GraphContext;
use crate::edge::EdgeView;
use crate::evaluation::{EvaluationError, NodeInputs, NodeOutput};
use crate::graph::Graph;
use crate::id::define_id;
use crate::parameter::ParameterId;
use crate::port::{Port, PortDescriptor, PortDirection, PortId, PortType, PortValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

define_id!(
    /// Unique identifier for a node
    NodeId
);

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Output nodes
    Output,
    /// Math operations
    Math,
    /// Logic/flow control
    Logic,
    /// Routing nodes (relays, subgraphs)
    Flow,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Everything a dynamic port behavior may look at
pub struct BehaviorContext<'a> {
    /// Graph owning the node
    pub graph: &'a Graph,
    /// The node being materialized
    pub node: &'a Node,
    /// The member being materialized
    pub member: &'a MemberDecl,
    /// Edges currently attached to the member's ports
    pub edges: &'a [EdgeView],
}

impl<'a> BehaviorContext<'a> {
    /// Registries and settings of the owning graph
    pub fn context(&self) -> &'a GraphContext {
        self.graph.context()
    }
}

/// Computes the ports of a dynamic member
pub type BehaviorFn = fn(&BehaviorContext<'_>) -> Vec<PortDescriptor>;

/// Hook run on a node at creation or removal
pub type NodeHook = fn(&mut Node);

/// Evaluates a node given its gathered inputs
pub type ProcessFn = fn(&Node, &NodeInputs) -> Result<NodeOutput, EvaluationError>;

/// How a member becomes ports
#[derive(Debug, Clone, Copy)]
pub enum PortBehavior {
    /// Exactly one port described by the declaration
    Static,
    /// Ports computed from the node state and attached edges
    Dynamic(BehaviorFn),
}

/// Declaration of one port-producing member of a node type
#[derive(Debug, Clone)]
pub struct MemberDecl {
    /// Member name, unique within the node type
    pub name: String,
    /// Display name of the implicit port
    pub display_name: String,
    /// Input or output
    pub direction: PortDirection,
    /// Declared value type
    pub port_type: PortType,
    /// Whether the implicit port accepts multiple edges
    pub multi_connect: bool,
    /// Whether the implicit port must be connected
    pub required: bool,
    /// Initial value of the member's value slot
    pub default_value: Option<PortValue>,
    /// Reset the value slot to its default once nothing feeds the member
    pub reset_on_disconnect: bool,
    /// Names this member was previously known as
    pub formerly: Vec<String>,
    /// Port behavior
    pub behavior: PortBehavior,
    /// Inheritance depth of the declaring type
    pub depth: u32,
    /// Optional tooltip
    pub tooltip: Option<String>,
}

impl MemberDecl {
    /// Declare a member
    pub fn new(name: impl Into<String>, direction: PortDirection, port_type: PortType) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            direction,
            port_type,
            multi_connect: direction == PortDirection::Output,
            required: false,
            default_value: None,
            reset_on_disconnect: true,
            formerly: Vec::new(),
            behavior: PortBehavior::Static,
            depth: 0,
            tooltip: None,
        }
    }

    /// Declare an input member
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(name, PortDirection::Input, port_type)
    }

    /// Declare an output member (multi-connect by default)
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(name, PortDirection::Output, port_type)
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Set the default value
    pub fn with_default(mut self, value: PortValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set whether multiple edges may attach
    pub fn with_multi_connect(mut self, multi_connect: bool) -> Self {
        self.multi_connect = multi_connect;
        self
    }

    /// Keep the value slot when the last edge is removed
    pub fn keep_value_on_disconnect(mut self) -> Self {
        self.reset_on_disconnect = false;
        self
    }

    /// Record a former name, used to resolve edges saved before a rename
    pub fn formerly(mut self, old_name: impl Into<String>) -> Self {
        self.formerly.push(old_name.into());
        self
    }

    /// Compute ports with a dynamic behavior
    pub fn dynamic(mut self, behavior: BehaviorFn) -> Self {
        self.behavior = PortBehavior::Dynamic(behavior);
        self
    }

    /// Set the tooltip
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Whether ports are computed by a dynamic behavior
    pub fn is_dynamic(&self) -> bool {
        matches!(self.behavior, PortBehavior::Dynamic(_))
    }

    /// The implicit descriptor of a static member
    pub fn static_descriptor(&self) -> PortDescriptor {
        PortDescriptor {
            identifier: String::new(),
            display_name: self.display_name.clone(),
            port_type: None,
            multi_connect: self.multi_connect,
            required: self.required,
            tooltip: self.tooltip.clone(),
        }
    }
}

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Whether the node passes its single input through to its single output
    pub relay: bool,
    /// Run once when a node is created by the factory
    pub on_create: Option<NodeHook>,
    /// Run when a node is removed from a graph
    pub on_remove: Option<NodeHook>,
    /// Evaluation function
    pub process: Option<ProcessFn>,
    members: Vec<MemberDecl>,
    depth: u32,
}

impl NodeType {
    /// Create an empty node type
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            relay: false,
            on_create: None,
            on_remove: None,
            process: None,
            members: Vec::new(),
            depth: 0,
        }
    }

    /// Derive a new type from `base`. Members added afterwards are declared
    /// one level deeper and replace base members of the same name.
    pub fn inherit(base: &NodeType, id: impl Into<String>, name: impl Into<String>) -> Self {
        let mut derived = base.clone();
        derived.id = id.into();
        derived.name = name.into();
        derived.depth = base.depth + 1;
        derived
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a member
    pub fn with_member(mut self, mut member: MemberDecl) -> Self {
        member.depth = self.depth;
        self.members.retain(|m| m.name != member.name);
        self.members.push(member);
        self
    }

    /// Mark as a pass-through relay
    pub fn as_relay(mut self) -> Self {
        self.relay = true;
        self
    }

    /// Set the creation hook
    pub fn with_on_create(mut self, hook: NodeHook) -> Self {
        self.on_create = Some(hook);
        self
    }

    /// Set the removal hook
    pub fn with_on_remove(mut self, hook: NodeHook) -> Self {
        self.on_remove = Some(hook);
        self
    }

    /// Set the evaluation function
    pub fn with_process(mut self, process: ProcessFn) -> Self {
        self.process = Some(process);
        self
    }

    /// Members in declaration order
    pub fn members(&self) -> &[MemberDecl] {
        &self.members
    }

    /// Find a member by name
    pub fn member(&self, name: &str) -> Option<&MemberDecl> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Find the member that used to be called `old_name`
    pub fn member_by_alias(&self, old_name: &str) -> Option<&MemberDecl> {
        self.members
            .iter()
            .find(|m| m.formerly.iter().any(|alias| alias == old_name))
    }

    /// Members sorted by declaration depth, then declaration order
    pub fn ordered_members(&self) -> Vec<&MemberDecl> {
        let mut members: Vec<&MemberDecl> = self.members.iter().collect();
        members.sort_by_key(|m| m.depth);
        members
    }

    /// Names of members with a dynamic behavior
    pub fn dynamic_members(&self) -> Vec<String> {
        self.ordered_members()
            .into_iter()
            .filter(|m| m.is_dynamic())
            .map(|m| m.name.clone())
            .collect()
    }
}

/// Kind-specific state of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum NodeData {
    /// No extra state
    #[default]
    None,
    /// Handle standing in for a boundary parameter of the owning graph
    Parameter {
        /// The parameter this handle represents
        parameter: ParameterId,
    },
    /// Reference to a child graph in the library
    Subgraph {
        /// Library asset name of the child graph
        asset: Option<String>,
    },
}

/// Severity of a node diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageSeverity {
    /// Informational
    Info,
    /// Something looks wrong but the node works
    Warning,
    /// The node cannot work as configured
    Error,
}

/// Diagnostic badge attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeMessage {
    /// Message text
    pub text: String,
    /// Severity
    pub severity: MessageSeverity,
}

impl fmt::Display for NodeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.text)
    }
}

/// A node instance in the graph
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Custom display name
    pub name: Option<String>,
    /// Position in the editor, opaque to the core
    pub position: [f32; 2],
    /// Value slots by member name
    pub values: IndexMap<String, PortValue>,
    /// Kind-specific state
    pub data: NodeData,
    pub(crate) inputs: Vec<Port>,
    pub(crate) outputs: Vec<Port>,
    pub(crate) messages: Vec<NodeMessage>,
}

impl Node {
    /// Create a new node from a type definition, seeding default values.
    /// Does not run the creation hook; see [`NodeRegistry::create_node`].
    pub fn new(node_type: &NodeType) -> Self {
        let values = node_type
            .members()
            .iter()
            .filter_map(|m| m.default_value.clone().map(|v| (m.name.clone(), v)))
            .collect();
        Self {
            id: NodeId::new(),
            node_type: node_type.id.clone(),
            name: None,
            position: [0.0, 0.0],
            values,
            data: NodeData::None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Set the kind-specific state
    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    /// Input ports, grouped by member in materialization order
    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    /// Output ports, grouped by member in materialization order
    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    /// Get an input port by index
    pub fn input(&self, index: usize) -> Option<&Port> {
        self.inputs.get(index)
    }

    /// Get an output port by index
    pub fn output(&self, index: usize) -> Option<&Port> {
        self.outputs.get(index)
    }

    /// Get a port by ID
    pub fn port(&self, port_id: &PortId) -> Option<&Port> {
        self.inputs
            .iter()
            .find(|p| p.id == *port_id)
            .or_else(|| self.outputs.iter().find(|p| p.id == *port_id))
    }

    pub(crate) fn port_mut(&mut self, port_id: &PortId) -> Option<&mut Port> {
        match self.inputs.iter().position(|p| p.id == *port_id) {
            Some(index) => self.inputs.get_mut(index),
            None => self.outputs.iter_mut().find(|p| p.id == *port_id),
        }
    }

    /// Get all ports
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Ports generated by one member
    pub fn member_ports<'a>(&'a self, member: &'a str) -> impl Iterator<Item = &'a Port> + 'a {
        self.ports().filter(move |p| p.id.member == member)
    }

    pub(crate) fn ports_mut(&mut self, direction: PortDirection) -> &mut Vec<Port> {
        match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        }
    }

    pub(crate) fn clear_ports(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }

    /// Diagnostics currently attached
    pub fn messages(&self) -> &[NodeMessage] {
        &self.messages
    }

    /// Value slot of a member
    pub fn value(&self, member: &str) -> Option<&PortValue> {
        self.values.get(member)
    }

    /// The boundary parameter handled by this node, if it is a parameter handle
    pub fn parameter(&self) -> Option<ParameterId> {
        match self.data {
            NodeData::Parameter { parameter } => Some(parameter),
            _ => None,
        }
    }

    /// Whether this node references a child graph
    pub fn is_subgraph(&self) -> bool {
        matches!(self.data, NodeData::Subgraph { .. })
    }
}

/// Registry of available node types
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a type ID, running its creation hook
    pub fn create_node(&self, type_id: &str) -> Option<Node> {
        let node_type = self.get(type_id)?;
        let mut node = Node::new(node_type);
        if let Some(on_create) = node_type.on_create {
            on_create(&mut node);
        }
        Some(node)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
