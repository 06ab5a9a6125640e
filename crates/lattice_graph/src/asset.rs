// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted graph representation.
//!
//! Assets store nodes as registry-keyed records and edges as flat
//! `(node, member, identifier)` pairs, never as live references. Loading
//! resolves everything through the graph, drops what no longer resolves and
//! reports it in a [`LoadReport`].

use crate::annotation::{Group, StackNode, StickyNote};
use crate::context::GraphContext;
use crate::edge::{Edge, EdgeRecord, PortRef};
use crate::graph::Graph;
use crate::node::{Node, NodeData, NodeId};
use crate::parameter::{ExposedParameter, ParameterDirection, ParameterId};
use crate::port::{PortType, PortValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Current asset format version
pub const ASSET_FORMAT_VERSION: u32 = 1;

/// Asset errors
#[derive(Debug, Error)]
pub enum AssetError {
    /// File could not be read or written
    #[error("Asset I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid graph asset
    #[error("Invalid graph asset: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Graph could not be encoded
    #[error("Failed to encode graph asset: {0}")]
    Encode(#[from] ron::Error),

    /// Asset was written by a newer format
    #[error("Unsupported asset version {found} (expected at most {supported})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

/// Result type for asset operations
pub type Result<T> = std::result::Result<T, AssetError>;

/// Persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID
    pub id: NodeId,
    /// Registry key of the node type
    pub node_type: String,
    /// Custom display name
    #[serde(default)]
    pub name: Option<String>,
    /// Editor position
    #[serde(default)]
    pub position: [f32; 2],
    /// Value slots
    #[serde(default)]
    pub values: IndexMap<String, PortValue>,
    /// Kind-specific state
    #[serde(default)]
    pub data: NodeData,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            node_type: node.node_type.clone(),
            name: node.name.clone(),
            position: node.position,
            values: node.values.clone(),
            data: node.data.clone(),
        }
    }
}

/// Persisted boundary parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    /// Parameter ID
    pub id: ParameterId,
    /// Display name
    pub name: String,
    /// Direction
    pub direction: ParameterDirection,
    /// Serialized type name, see [`PortType::type_name`]
    pub type_name: String,
    /// Value used when nothing is supplied
    #[serde(default)]
    pub default_value: Option<PortValue>,
}

impl From<&ExposedParameter> for ParameterRecord {
    fn from(parameter: &ExposedParameter) -> Self {
        Self {
            id: parameter.id,
            name: parameter.name.clone(),
            direction: parameter.direction,
            type_name: parameter.port_type.type_name(),
            default_value: parameter.default_value.clone(),
        }
    }
}

impl From<ParameterRecord> for ExposedParameter {
    fn from(record: ParameterRecord) -> Self {
        let port_type = record.type_name.parse().unwrap_or(PortType::Any);
        Self {
            id: record.id,
            name: record.name,
            direction: record.direction,
            port_type,
            default_value: record.default_value,
        }
    }
}

fn default_version() -> u32 {
    ASSET_FORMAT_VERSION
}

/// Persisted graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAsset {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Graph name
    pub name: String,
    /// Nodes
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Edges
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    /// Boundary parameters
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
    /// Groups
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Stacks
    #[serde(default)]
    pub stacks: Vec<StackNode>,
    /// Sticky notes
    #[serde(default)]
    pub notes: Vec<StickyNote>,
}

impl GraphAsset {
    /// Parse an asset from RON
    pub fn from_ron(text: &str) -> Result<Self> {
        let asset: Self = ron::from_str(text)?;
        if asset.version > ASSET_FORMAT_VERSION {
            return Err(AssetError::UnsupportedVersion {
                found: asset.version,
                supported: ASSET_FORMAT_VERSION,
            });
        }
        Ok(asset)
    }

    /// Encode the asset as pretty RON
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Read an asset file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Write an asset file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

/// Why a persisted edge was dropped
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// An endpoint node does not exist
    MissingNode(NodeId),
    /// An endpoint port does not exist, even through member aliases
    MissingPort(PortRef),
    /// The endpoint types can no longer be connected
    Incompatible {
        /// Producer type
        from: PortType,
        /// Consumer type
        to: PortType,
    },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingNode(node) => write!(f, "node {node} does not exist"),
            Self::MissingPort(port) => write!(f, "port {} on node {} does not exist", port.port, port.node),
            Self::Incompatible { from, to } => write!(f, "{from} cannot flow into {to}"),
        }
    }
}

/// A persisted edge that did not survive loading
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedEdge {
    /// The edge as it was stored
    pub edge: EdgeRecord,
    /// Why it was dropped
    pub reason: DropReason,
}

/// Everything loading had to skip or reinterpret
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Edges that could not be restored
    pub dropped_edges: Vec<DroppedEdge>,
    /// Nodes whose type is not registered
    pub skipped_nodes: Vec<NodeRecord>,
    /// `(node, old member, new member)` resolved through `formerly` aliases
    pub renamed_members: Vec<(NodeId, String, String)>,
    /// Parameter IDs declared more than once
    pub duplicate_parameters: Vec<ParameterId>,
}

impl LoadReport {
    /// Whether the graph loaded without losses
    pub fn is_clean(&self) -> bool {
        self.dropped_edges.is_empty()
            && self.skipped_nodes.is_empty()
            && self.duplicate_parameters.is_empty()
    }
}

impl Graph {
    /// Snapshot the graph in its persisted form
    pub fn to_asset(&self) -> GraphAsset {
        GraphAsset {
            version: ASSET_FORMAT_VERSION,
            name: self.name.clone(),
            nodes: self.nodes().map(NodeRecord::from).collect(),
            edges: self.edges().map(EdgeRecord::from).collect(),
            parameters: self.parameters().iter().map(ParameterRecord::from).collect(),
            groups: self.groups().cloned().collect(),
            stacks: self.stacks().cloned().collect(),
            notes: self.notes().cloned().collect(),
        }
    }

    /// Rebuild a graph from its persisted form.
    ///
    /// Nothing here fails: unknown nodes and unresolvable edges are skipped
    /// and listed in the report. The returned graph is enabled and has no
    /// pending events.
    pub fn from_asset(asset: GraphAsset, ctx: GraphContext) -> (Graph, LoadReport) {
        let mut report = LoadReport::default();
        let mut graph = Graph::new_disabled(asset.name, ctx);
        let registry = graph.context().nodes_arc();

        for record in asset.nodes {
            let Some(node_type) = registry.get(&record.node_type) else {
                tracing::warn!("Skipping node {}: unknown type '{}'", record.id, record.node_type);
                report.skipped_nodes.push(record);
                continue;
            };
            if graph.nodes.contains_key(&record.id) {
                tracing::warn!("Skipping node {}: ID already used", record.id);
                report.skipped_nodes.push(record);
                continue;
            }
            let mut node = Node::new(node_type);
            node.id = record.id;
            node.name = record.name;
            node.position = record.position;
            node.values.extend(record.values);
            node.data = record.data;
            graph.nodes.insert(node.id, node);
        }

        graph.parameters = asset.parameters.into_iter().map(ExposedParameter::from).collect();

        for record in asset.edges {
            let mut edge = Edge::from(record.clone());
            let mut missing = None;
            for end in [&mut edge.from, &mut edge.to] {
                let Some(node) = graph.nodes.get(&end.node) else {
                    missing = Some(end.node);
                    break;
                };
                let Some(node_type) = registry.get(&node.node_type) else {
                    continue;
                };
                if node_type.member(&end.port.member).is_none() {
                    if let Some(renamed) = node_type.member_by_alias(&end.port.member) {
                        tracing::debug!(
                            "Node {}: member '{}' is now '{}'",
                            end.node,
                            end.port.member,
                            renamed.name
                        );
                        report
                            .renamed_members
                            .push((end.node, end.port.member.clone(), renamed.name.clone()));
                        end.port.member.clone_from(&renamed.name);
                    }
                }
            }
            if let Some(node) = missing {
                tracing::warn!("Dropping edge {}: node {} does not exist", record.id, node);
                report.dropped_edges.push(DroppedEdge {
                    edge: record,
                    reason: DropReason::MissingNode(node),
                });
                continue;
            }
            if graph.edges.contains_key(&edge.id) {
                tracing::warn!("Skipping edge {}: ID already used", edge.id);
                continue;
            }
            graph.edges.insert(edge.id, edge);
        }

        for group in asset.groups {
            graph.groups.insert(group.id, group);
        }
        for stack in asset.stacks {
            graph.stacks.insert(stack.id, stack);
        }
        for note in asset.notes {
            graph.notes.insert(note.id, note);
        }

        let attached = graph.enable();
        report.dropped_edges.extend(attached.dropped_edges);

        report.duplicate_parameters = graph.duplicate_parameter_ids();
        if !report.duplicate_parameters.is_empty() {
            tracing::warn!(
                "Graph '{}' declares {} parameter IDs more than once",
                graph.name,
                report.duplicate_parameters.len()
            );
        }
        graph.refresh_parameter_diagnostics();
        graph.drain_events();

        (graph, report)
    }

    /// Load a graph asset file
    pub fn load(path: &Path, ctx: GraphContext) -> Result<(Graph, LoadReport)> {
        let asset = GraphAsset::load(path)?;
        Ok(Graph::from_asset(asset, ctx))
    }

    /// Save the graph as an asset file
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_asset().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::TypeRegistry;
    use crate::node::{MemberDecl, MessageSeverity, NodeCategory, NodeType};
    use crate::nodes::create_standard_registry;
    use crate::port::PortId;

    fn scale_type(member: MemberDecl) -> NodeType {
        NodeType::new("scale", "Scale", NodeCategory::Math)
            .with_member(member)
            .with_member(MemberDecl::output("result", PortType::Float))
    }

    fn context_with(node_type: NodeType) -> GraphContext {
        let mut registry = create_standard_registry();
        registry.register(node_type);
        GraphContext::new(TypeRegistry::global(), registry)
    }

    #[test]
    fn test_save_and_load_through_ron() {
        let ctx = GraphContext::standard();
        let mut graph = Graph::new("roundtrip", ctx.clone());
        let a = graph.create_node("float_constant", [10.0, 20.0]).unwrap();
        let sum = graph.create_node("sum", [100.0, 0.0]).unwrap();
        graph.set_value(a, "value", PortValue::Float(3.5));
        graph.connect(PortRef::member(a, "value"), PortRef::new(sum, "values", "0"), true).unwrap();
        graph.add_parameter("Gain", PortType::Float, ParameterDirection::Input);
        graph.add_note(StickyNote::new("Note", "text", [0.0, 0.0]));

        let text = graph.to_asset().to_ron().unwrap();
        let asset = GraphAsset::from_ron(&text).unwrap();
        let (loaded, report) = Graph::from_asset(asset, ctx);

        assert!(report.is_clean());
        assert_eq!(loaded.to_asset(), graph.to_asset());
        assert_eq!(loaded.node(a).unwrap().value("value"), Some(&PortValue::Float(3.5)));
        assert_eq!(loaded.node(sum).unwrap().inputs().len(), 2);
        assert!(loaded.ports_are_consistent());
        assert!(loaded.events().is_empty());
    }

    #[test]
    fn test_renamed_member_resolves_through_alias() {
        let old_ctx = context_with(scale_type(MemberDecl::input("value", PortType::Float)));
        let mut graph = Graph::new("old", old_ctx);
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let s = graph.create_node("scale", [100.0, 0.0]).unwrap();
        graph.connect(PortRef::member(a, "value"), PortRef::member(s, "value"), true).unwrap();
        let asset = graph.to_asset();

        let new_ctx = context_with(scale_type(MemberDecl::input("amount", PortType::Float).formerly("value")));
        let (loaded, report) = Graph::from_asset(asset, new_ctx);

        assert!(report.dropped_edges.is_empty());
        assert_eq!(report.renamed_members, vec![(s, "value".to_string(), "amount".to_string())]);
        let edge = loaded.edges().next().unwrap();
        assert_eq!(edge.to.port, PortId::member("amount"));
        assert_eq!(loaded.port(&edge.to).unwrap().edges(), [edge.id]);
    }

    #[test]
    fn test_unresolvable_edges_are_dropped() {
        let ctx = GraphContext::standard();
        let mut graph = Graph::new("broken", ctx.clone());
        let a = graph.create_node("float_constant", [0.0, 0.0]).unwrap();
        let b = graph.create_node("add", [100.0, 0.0]).unwrap();
        graph.connect(PortRef::member(a, "value"), PortRef::member(b, "a"), true).unwrap();

        let mut asset = graph.to_asset();
        let ghost = NodeId::new();
        asset.edges.push(EdgeRecord {
            id: crate::edge::EdgeId::new(),
            from_node: ghost,
            from_member: "value".to_string(),
            from_identifier: String::new(),
            to_node: b,
            to_member: "b".to_string(),
            to_identifier: String::new(),
        });
        asset.edges.push(EdgeRecord {
            id: crate::edge::EdgeId::new(),
            from_node: a,
            from_member: "value".to_string(),
            from_identifier: String::new(),
            to_node: b,
            to_member: "gone".to_string(),
            to_identifier: String::new(),
        });
        asset.nodes.push(NodeRecord {
            id: NodeId::new(),
            node_type: "retired_node".to_string(),
            name: None,
            position: [0.0, 0.0],
            values: IndexMap::new(),
            data: NodeData::None,
        });

        let (loaded, report) = Graph::from_asset(asset, ctx);
        assert_eq!(loaded.edge_count(), 1);
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(report.skipped_nodes.len(), 1);
        let reasons: Vec<_> = report.dropped_edges.iter().map(|d| d.reason.clone()).collect();
        assert_eq!(
            reasons,
            vec![
                DropReason::MissingNode(ghost),
                DropReason::MissingPort(PortRef::member(b, "gone")),
            ]
        );
        assert!(loaded.ports_are_consistent());
    }

    #[test]
    fn test_duplicate_parameter_ids_are_reported() {
        let ctx = GraphContext::standard();
        let mut graph = Graph::new("dupes", ctx.clone());
        let id = graph.add_parameter("A", PortType::Float, ParameterDirection::Input);
        let handle = graph.add_parameter_node(id, [0.0, 0.0]).unwrap();

        let mut asset = graph.to_asset();
        let mut copy = asset.parameters[0].clone();
        copy.name = "B".to_string();
        asset.parameters.push(copy);

        let (loaded, report) = Graph::from_asset(asset, ctx);
        assert_eq!(report.duplicate_parameters, vec![id]);
        assert_eq!(loaded.parameters().len(), 2);
        let messages = loaded.node(handle).unwrap().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, MessageSeverity::Warning);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let text = "(version: 99, name: \"future\")";
        assert!(matches!(
            GraphAsset::from_ron(text),
            Err(AssetError::UnsupportedVersion { found: 99, .. })
        ));
    }
}
