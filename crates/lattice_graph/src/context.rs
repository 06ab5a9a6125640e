// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared environment of a graph: registries, child graph library and settings.

use crate::compat::TypeRegistry;
use crate::graph::Graph;
use crate::node::NodeRegistry;
use crate::nodes::create_standard_registry;
use crate::settings::GraphSettings;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Named graphs that subgraph nodes may reference
#[derive(Debug, Default)]
pub struct GraphLibrary {
    graphs: IndexMap<String, Arc<Graph>>,
}

impl GraphLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a graph under `name`
    pub fn insert(&mut self, name: impl Into<String>, graph: Graph) -> Arc<Graph> {
        let graph = Arc::new(graph);
        self.graphs.insert(name.into(), Arc::clone(&graph));
        graph
    }

    /// Look up a graph
    pub fn get(&self, name: &str) -> Option<Arc<Graph>> {
        self.graphs.get(name).cloned()
    }

    /// Remove a graph
    pub fn remove(&mut self, name: &str) -> Option<Arc<Graph>> {
        self.graphs.shift_remove(name)
    }

    /// Registered asset names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.graphs.keys().map(String::as_str)
    }

    /// Number of registered graphs
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

/// Registries, library and settings shared by related graphs.
///
/// Cloning is cheap; clones share the same registries and library.
#[derive(Clone)]
pub struct GraphContext {
    types: Arc<TypeRegistry>,
    nodes: Arc<NodeRegistry>,
    library: Arc<RwLock<GraphLibrary>>,
    settings: Arc<GraphSettings>,
}

impl GraphContext {
    /// Create a context from explicit registries
    pub fn new(types: Arc<TypeRegistry>, nodes: NodeRegistry) -> Self {
        Self {
            types,
            nodes: Arc::new(nodes),
            library: Arc::new(RwLock::new(GraphLibrary::new())),
            settings: Arc::new(GraphSettings::default()),
        }
    }

    /// The global type registry with the standard node library
    pub fn standard() -> Self {
        Self::new(TypeRegistry::global(), create_standard_registry())
    }

    /// Replace the settings
    pub fn with_settings(mut self, settings: GraphSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    /// Type compatibility registry
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Shared handle to the type registry
    pub fn types_arc(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.types)
    }

    /// Node type registry
    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    /// Shared handle to the node registry
    pub fn nodes_arc(&self) -> Arc<NodeRegistry> {
        Arc::clone(&self.nodes)
    }

    /// Settings
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// Same registries and settings with an empty library of its own
    pub fn detached(&self) -> Self {
        Self {
            types: Arc::clone(&self.types),
            nodes: Arc::clone(&self.nodes),
            library: Arc::new(RwLock::new(GraphLibrary::new())),
            settings: Arc::clone(&self.settings),
        }
    }

    /// Register a graph in the shared library.
    ///
    /// The stored graph keeps its ports but is moved to a [`detached`]
    /// context, so library entries never hold the library they live in.
    /// Realize copies them back into the host's context.
    ///
    /// [`detached`]: Self::detached
    pub fn register_graph(&self, name: impl Into<String>, mut graph: Graph) -> Arc<Graph> {
        graph.set_context(self.detached());
        self.library.write().insert(name, graph)
    }

    /// Look up a graph in the shared library
    pub fn subgraph(&self, name: &str) -> Option<Arc<Graph>> {
        self.library.read().get(name)
    }

    /// Shared library handle
    pub fn library(&self) -> &RwLock<GraphLibrary> {
        &self.library
    }
}

impl Default for GraphContext {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContext")
            .field("types", &self.types)
            .field("node_types", &self.nodes.types().count())
            .field("library", &self.library.read().names().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish()
    }
}
