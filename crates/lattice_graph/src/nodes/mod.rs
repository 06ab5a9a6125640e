// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node types.
//!
//! The routing nodes (`relay`, `parameter`, `subgraph`) are required by the
//! core itself; the math nodes give graphs something to compute.

pub mod math;
pub mod parameter;
pub mod relay;
pub mod subgraph;

use crate::node::NodeRegistry;

/// Type key of the pass-through node
pub const RELAY_NODE: &str = "relay";

/// Type key of boundary parameter handles
pub const PARAMETER_NODE: &str = "parameter";

/// Type key of subgraph references
pub const SUBGRAPH_NODE: &str = "subgraph";

/// Create the node registry with all built-in node types
pub fn create_standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    // ========================================================================
    // Routing
    // ========================================================================

    registry.register(relay::relay_type());
    registry.register(parameter::parameter_type());
    registry.register(subgraph::subgraph_type());

    // ========================================================================
    // Math
    // ========================================================================

    for node_type in math::math_types() {
        registry.register(node_type);
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeCategory;

    #[test]
    fn test_standard_registry_contents() {
        let registry = create_standard_registry();
        for key in [
            RELAY_NODE,
            PARAMETER_NODE,
            SUBGRAPH_NODE,
            "float_constant",
            "int_constant",
            "add",
            "divide",
            "sum",
            "to_string",
        ] {
            assert!(registry.get(key).is_some(), "missing {key}");
        }
        let flow: Vec<&str> = registry
            .types_in_category(NodeCategory::Flow)
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(flow, [RELAY_NODE, SUBGRAPH_NODE]);
        assert_eq!(registry.get(PARAMETER_NODE).unwrap().category, NodeCategory::Input);
        assert!(registry.get(RELAY_NODE).unwrap().relay);
    }
}
