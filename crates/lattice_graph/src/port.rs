// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.
//!
//! A port is addressed by the member that declares it plus an identifier.
//! The empty identifier names "the one port" of a simple member; dynamic
//! members generate one port per identifier they return.

use crate::edge::EdgeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address of a port within its node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId {
    /// Declaring member name
    pub member: String,
    /// Identifier within the member (empty for single-port members)
    pub identifier: String,
}

impl PortId {
    /// Create a port ID from a member name and an identifier
    pub fn new(member: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            member: member.into(),
            identifier: identifier.into(),
        }
    }

    /// The single port of a simple member
    pub fn member(member: impl Into<String>) -> Self {
        Self::new(member, "")
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.identifier.is_empty() {
            write!(f, "{}", self.member)
        } else {
            write!(f, "{}#{}", self.member, self.identifier)
        }
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

impl PortDirection {
    /// The direction on the other end of an edge
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Execution flow
    Exec,
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// Matrix 4x4
    Mat4,
    /// Texture reference
    Texture,
    /// String value
    String,
    /// Any type (for generic and pass-through nodes)
    Any,
    /// Homogeneous list of another type
    List(Box<PortType>),
    /// Named user type, related to others through declared supertypes
    Custom(String),
}

impl PortType {
    /// Serialized type name, parsed back by [`FromStr`]
    pub fn type_name(&self) -> String {
        match self {
            Self::Exec => "exec".to_string(),
            Self::Bool => "bool".to_string(),
            Self::Int => "int".to_string(),
            Self::Float => "float".to_string(),
            Self::Vector2 => "vec2".to_string(),
            Self::Vector3 => "vec3".to_string(),
            Self::Vector4 => "vec4".to_string(),
            Self::Color => "color".to_string(),
            Self::Mat4 => "mat4".to_string(),
            Self::Texture => "texture".to_string(),
            Self::String => "string".to_string(),
            Self::Any => "any".to_string(),
            Self::List(inner) => format!("list<{}>", inner.type_name()),
            Self::Custom(name) => name.clone(),
        }
    }

    /// Whether this is the wildcard type
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

impl FromStr for PortType {
    type Err = std::convert::Infallible;

    /// Unknown names become [`PortType::Custom`], so parsing never fails.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s {
            "exec" => Self::Exec,
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "vec2" => Self::Vector2,
            "vec3" => Self::Vector3,
            "vec4" => Self::Vector4,
            "color" => Self::Color,
            "mat4" => Self::Mat4,
            "texture" => Self::Texture,
            "string" => Self::String,
            "any" => Self::Any,
            _ => match s.strip_prefix("list<").and_then(|rest| rest.strip_suffix('>')) {
                Some(inner) => Self::List(Box::new(inner.parse()?)),
                None => Self::Custom(s.to_string()),
            },
        };
        Ok(parsed)
    }
}

/// Value that can be stored in a node's value slot or carried by an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// String
    String(String),
    /// List of values
    List(Vec<PortValue>),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::Vector4(_) => PortType::Vector4,
            Self::Color(_) => PortType::Color,
            Self::String(_) => PortType::String,
            Self::List(items) => PortType::List(Box::new(
                items.first().map_or(PortType::Any, Self::port_type),
            )),
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Vector2(v) => write!(f, "({}, {})", v[0], v[1]),
            Self::Vector3(v) => write!(f, "({}, {}, {})", v[0], v[1], v[2]),
            Self::Vector4(v) | Self::Color(v) => {
                write!(f, "({}, {}, {}, {})", v[0], v[1], v[2], v[3])
            }
            Self::String(v) => f.write_str(v),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Desired shape of one port, as produced by a member's port behavior
#[derive(Debug, Clone, PartialEq)]
pub struct PortDescriptor {
    /// Identifier within the member
    pub identifier: String,
    /// Display name
    pub display_name: String,
    /// Overrides the member's declared type when set
    pub port_type: Option<PortType>,
    /// Whether multiple edges may attach
    pub multi_connect: bool,
    /// Whether the port must be connected for the node to be valid
    pub required: bool,
    /// Optional tooltip
    pub tooltip: Option<String>,
}

impl PortDescriptor {
    /// Create a descriptor with the member's declared type and single connection
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            port_type: None,
            multi_connect: false,
            required: false,
            tooltip: None,
        }
    }

    /// Override the value type
    pub fn with_type(mut self, port_type: PortType) -> Self {
        self.port_type = Some(port_type);
        self
    }

    /// Set whether multiple edges may attach
    pub fn with_multi_connect(mut self, multi_connect: bool) -> Self {
        self.multi_connect = multi_connect;
        self
    }

    /// Set whether the port is required
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set the tooltip
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

/// A live port on a node
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    /// Address within the node
    pub id: PortId,
    /// Display name
    pub display_name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Resolved value type
    pub port_type: PortType,
    /// Whether this port is required
    pub required: bool,
    /// Whether multiple connections are allowed
    pub multi_connect: bool,
    /// Optional tooltip
    pub tooltip: Option<String>,
    /// Edges currently attached
    edges: Vec<EdgeId>,
}

impl Port {
    /// Build a port from a descriptor, using `port_type` when the descriptor
    /// has no override
    pub fn from_descriptor(
        member: &str,
        direction: PortDirection,
        descriptor: &PortDescriptor,
        port_type: PortType,
    ) -> Self {
        Self {
            id: PortId::new(member, descriptor.identifier.clone()),
            display_name: descriptor.display_name.clone(),
            direction,
            port_type,
            required: descriptor.required,
            multi_connect: descriptor.multi_connect,
            tooltip: descriptor.tooltip.clone(),
            edges: Vec::new(),
        }
    }

    /// Edges currently attached to this port
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    /// Whether any edge is attached
    pub fn is_connected(&self) -> bool {
        !self.edges.is_empty()
    }

    /// Copy the descriptor's fields into this port. Returns whether anything changed.
    pub(crate) fn apply(&mut self, descriptor: &PortDescriptor, port_type: &PortType) -> bool {
        let changed = self.display_name != descriptor.display_name
            || self.port_type != *port_type
            || self.required != descriptor.required
            || self.multi_connect != descriptor.multi_connect
            || self.tooltip != descriptor.tooltip;
        if changed {
            self.display_name.clone_from(&descriptor.display_name);
            self.port_type = port_type.clone();
            self.required = descriptor.required;
            self.multi_connect = descriptor.multi_connect;
            self.tooltip.clone_from(&descriptor.tooltip);
        }
        changed
    }

    pub(crate) fn attach(&mut self, edge: EdgeId) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub(crate) fn detach(&mut self, edge: EdgeId) {
        self.edges.retain(|e| *e != edge);
    }

    pub(crate) fn retain_edges(&mut self, mut keep: impl FnMut(EdgeId) -> bool) {
        self.edges.retain(|e| keep(*e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_parse_back() {
        let types = [
            PortType::Float,
            PortType::Exec,
            PortType::List(Box::new(PortType::Vector3)),
            PortType::Custom("Texture2D".to_string()),
        ];
        for ty in types {
            let parsed: PortType = ty.type_name().parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn test_port_id_display() {
        assert_eq!(PortId::member("value").to_string(), "value");
        assert_eq!(PortId::new("inputs", "2").to_string(), "inputs#2");
    }

    #[test]
    fn test_apply_reports_changes_once() {
        let descriptor = PortDescriptor::new("", "Value").with_required(true);
        let mut port = Port::from_descriptor("value", PortDirection::Input, &descriptor, PortType::Float);
        assert!(!port.apply(&descriptor, &PortType::Float));

        let renamed = PortDescriptor::new("", "Amount").with_required(true);
        assert!(port.apply(&renamed, &PortType::Float));
        assert_eq!(port.display_name, "Amount");
        assert!(!port.apply(&renamed, &PortType::Float));
    }

    #[test]
    fn test_list_value_type() {
        let value = PortValue::List(vec![PortValue::Int(1), PortValue::Int(2)]);
        assert_eq!(value.port_type(), PortType::List(Box::new(PortType::Int)));
        assert_eq!(value.to_string(), "[1, 2]");
    }
}
