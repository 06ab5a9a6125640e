// SPDX-License-Identifier: MIT OR Apache-2.0
//! Boundary parameters: the named, typed input/output interface that lets a
//! graph be used as a subgraph.
//!
//! Inside the graph each parameter is reached through parameter handle
//! nodes (`NodeData::Parameter`). Outside, a subgraph node exposes one
//! port per parameter, identified by the parameter ID.

use crate::events::GraphChange;
use crate::graph::Graph;
use crate::id::define_id;
use crate::node::{MessageSeverity, NodeData, NodeId};
use crate::nodes::PARAMETER_NODE;
use crate::port::{PortType, PortValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

define_id!(
    /// Unique identifier for a boundary parameter
    ParameterId
);

/// Which way a parameter carries values across the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterDirection {
    /// Value enters the graph
    Input,
    /// Value leaves the graph
    Output,
}

/// A boundary parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ExposedParameter {
    /// Parameter ID, unique within the graph
    pub id: ParameterId,
    /// Display name
    pub name: String,
    /// Direction
    pub direction: ParameterDirection,
    /// Value type
    pub port_type: PortType,
    /// Value used when nothing is supplied
    pub default_value: Option<PortValue>,
}

impl ExposedParameter {
    /// Create a parameter with a fresh ID
    pub fn new(name: impl Into<String>, port_type: PortType, direction: ParameterDirection) -> Self {
        Self {
            id: ParameterId::new(),
            name: name.into(),
            direction,
            port_type,
            default_value: None,
        }
    }

    /// The port identifier used for this parameter on subgraph nodes
    pub fn port_identifier(&self) -> String {
        self.id.to_string()
    }
}

impl Graph {
    /// Add a boundary parameter
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        port_type: PortType,
        direction: ParameterDirection,
    ) -> ParameterId {
        self.insert_parameter(ExposedParameter::new(name, port_type, direction))
    }

    /// Add a fully described parameter. A parameter whose ID is already in
    /// use gets a fresh ID.
    pub fn insert_parameter(&mut self, mut parameter: ExposedParameter) -> ParameterId {
        if self.parameter(parameter.id).is_some() {
            parameter.id = ParameterId::new();
        }
        let id = parameter.id;
        self.parameters.push(parameter);
        self.emit(GraphChange::AddedParameter(id));
        id
    }

    /// Remove a parameter together with its handle nodes
    pub fn remove_parameter(&mut self, id: ParameterId) -> Option<ExposedParameter> {
        let index = self.parameters.iter().position(|p| p.id == id)?;
        for handle in self.parameter_nodes(id) {
            self.remove_node(handle);
        }
        let parameter = self.parameters.remove(index);
        self.emit(GraphChange::RemovedParameter(id));
        Some(parameter)
    }

    /// Rename a parameter. Returns `false` if it does not exist.
    pub fn rename_parameter(&mut self, id: ParameterId, name: impl Into<String>) -> bool {
        let name = name.into();
        let Some(parameter) = self.parameters.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if parameter.name == name {
            return true;
        }
        parameter.name = name;
        self.emit(GraphChange::ModifiedParameter(id));
        self.refresh_parameter_handles(id);
        true
    }

    /// Change a parameter's type; handles re-materialize and propagate.
    pub fn set_parameter_type(&mut self, id: ParameterId, port_type: PortType) -> bool {
        let Some(parameter) = self.parameters.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if parameter.port_type == port_type {
            return true;
        }
        parameter.port_type = port_type;
        self.emit(GraphChange::ModifiedParameter(id));
        self.refresh_parameter_handles(id);
        true
    }

    /// Get a parameter
    pub fn parameter(&self, id: ParameterId) -> Option<&ExposedParameter> {
        self.parameters.iter().find(|p| p.id == id)
    }

    /// Find a parameter by name
    pub fn parameter_by_name(&self, name: &str) -> Option<&ExposedParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// All parameters in declaration order
    pub fn parameters(&self) -> &[ExposedParameter] {
        &self.parameters
    }

    /// Handle nodes standing in for a parameter
    pub fn parameter_nodes(&self, id: ParameterId) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.parameter() == Some(id))
            .map(|n| n.id)
            .collect()
    }

    /// Create a handle node for a parameter
    pub fn add_parameter_node(&mut self, id: ParameterId, position: [f32; 2]) -> Option<NodeId> {
        self.parameter(id)?;
        let mut node = self.context().nodes().create_node(PARAMETER_NODE)?;
        node.position = position;
        node.data = NodeData::Parameter { parameter: id };
        Some(self.add_node(node))
    }

    fn refresh_parameter_handles(&mut self, id: ParameterId) {
        for handle in self.parameter_nodes(id) {
            self.update_all_ports(handle);
        }
    }

    /// Parameter IDs declared more than once
    pub fn duplicate_parameter_ids(&self) -> Vec<ParameterId> {
        let mut counts: HashMap<ParameterId, usize> = HashMap::new();
        for parameter in &self.parameters {
            *counts.entry(parameter.id).or_default() += 1;
        }
        let mut duplicates: Vec<_> = self
            .parameters
            .iter()
            .map(|p| p.id)
            .filter(|id| counts[id] > 1)
            .collect();
        duplicates.dedup();
        duplicates
    }

    /// Attach diagnostics for boundary inconsistencies. Nothing is repaired.
    ///
    /// - handles of duplicated parameter IDs get a warning
    /// - handles whose parameter no longer exists get an error
    /// - subgraph nodes whose child declares a parameter without a handle get a warning
    pub fn refresh_parameter_diagnostics(&mut self) {
        let duplicates = self.duplicate_parameter_ids();
        let mut messages: Vec<(NodeId, String, MessageSeverity)> = Vec::new();

        for node in self.nodes() {
            if let Some(id) = node.parameter() {
                if duplicates.contains(&id) {
                    messages.push((
                        node.id,
                        format!("Parameter {id} is declared more than once"),
                        MessageSeverity::Warning,
                    ));
                } else if self.parameter(id).is_none() {
                    messages.push((
                        node.id,
                        format!("Parameter {id} does not exist"),
                        MessageSeverity::Error,
                    ));
                }
            }
            for text in self.missing_handle_messages(node.id) {
                messages.push((node.id, text, MessageSeverity::Warning));
            }
        }

        for (node, text, severity) in messages {
            self.add_message(node, text, severity);
        }
    }

    /// Warn on a subgraph node for each child parameter without a handle
    pub fn refresh_subgraph_diagnostics(&mut self, node_id: NodeId) {
        for text in self.missing_handle_messages(node_id) {
            self.add_message(node_id, text, MessageSeverity::Warning);
        }
    }

    pub(crate) fn missing_handle_messages(&self, node_id: NodeId) -> Vec<String> {
        let Some(NodeData::Subgraph { asset: Some(asset) }) = self.node(node_id).map(|n| &n.data) else {
            return Vec::new();
        };
        let Some(child) = self.context().subgraph(asset) else {
            return Vec::new();
        };
        child
            .parameters()
            .iter()
            .filter(|p| child.parameter_nodes(p.id).is_empty())
            .map(|p| missing_handle_message(&p.name))
            .collect()
    }
}

pub(crate) fn missing_handle_message(parameter: &str) -> String {
    format!("Parameter '{parameter}' is missing a matching handle")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GraphContext;
    use crate::edge::PortRef;
    use crate::events::GraphEvent;
    use crate::port::PortId;

    fn graph() -> Graph {
        Graph::new("params", GraphContext::standard())
    }

    #[test]
    fn test_handle_ports_follow_parameter() {
        let mut graph = graph();
        let id = graph.add_parameter("Speed", PortType::Float, ParameterDirection::Input);
        let handle = graph.add_parameter_node(id, [0.0, 0.0]).unwrap();

        let port = graph.node(handle).unwrap().port(&PortId::member("output")).unwrap();
        assert_eq!(port.port_type, PortType::Float);
        assert_eq!(port.display_name, "Speed");
        assert!(graph.node(handle).unwrap().inputs().is_empty());

        assert!(graph.rename_parameter(id, "Velocity"));
        let port = graph.node(handle).unwrap().port(&PortId::member("output")).unwrap();
        assert_eq!(port.display_name, "Velocity");
    }

    #[test]
    fn test_retype_drops_incompatible_edges() {
        let mut graph = graph();
        let id = graph.add_parameter("Speed", PortType::Float, ParameterDirection::Input);
        let handle = graph.add_parameter_node(id, [0.0, 0.0]).unwrap();
        let add = graph.create_node("add", [100.0, 0.0]).unwrap();
        graph
            .connect(PortRef::member(handle, "output"), PortRef::member(add, "a"), true)
            .unwrap();

        assert!(graph.set_parameter_type(id, PortType::Int));
        assert_eq!(graph.edge_count(), 1, "int still converts to float");

        assert!(graph.set_parameter_type(id, PortType::Exec));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_remove_parameter_removes_handles() {
        let mut graph = graph();
        let id = graph.add_parameter("Out", PortType::Float, ParameterDirection::Output);
        let handle = graph.add_parameter_node(id, [0.0, 0.0]).unwrap();
        assert!(graph.node(handle).unwrap().port(&PortId::member("input")).is_some());

        graph.drain_events();
        assert!(graph.remove_parameter(id).is_some());
        assert!(graph.node(handle).is_none());
        assert!(graph.parameters().is_empty());
        assert!(graph
            .drain_events()
            .contains(&GraphEvent::Changed(GraphChange::RemovedParameter(id))));
        assert!(graph.remove_parameter(id).is_none());
    }

    #[test]
    fn test_insert_parameter_keeps_ids_unique() {
        let mut graph = graph();
        let first = ExposedParameter::new("A", PortType::Float, ParameterDirection::Input);
        let mut second = ExposedParameter::new("B", PortType::Float, ParameterDirection::Input);
        second.id = first.id;

        let a = graph.insert_parameter(first);
        let b = graph.insert_parameter(second);
        assert_ne!(a, b);
        assert!(graph.duplicate_parameter_ids().is_empty());
    }

    #[test]
    fn test_orphan_handle_is_reported() {
        let mut graph = graph();
        let mut node = graph.context().nodes().create_node(PARAMETER_NODE).unwrap();
        node.data = NodeData::Parameter { parameter: ParameterId::new() };
        let handle = graph.add_node(node);

        graph.refresh_parameter_diagnostics();
        let messages = graph.node(handle).unwrap().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, MessageSeverity::Error);
    }
}
