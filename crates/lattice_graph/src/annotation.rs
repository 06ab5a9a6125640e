// SPDX-License-Identifier: MIT OR Apache-2.0
//! Visual groupings and notes. Opaque to the core apart from keeping node
//! membership consistent when nodes are removed.

use crate::events::GraphChange;
use crate::graph::Graph;
use crate::id::define_id;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};

define_id!(
    /// Unique identifier for a group
    GroupId
);
define_id!(
    /// Unique identifier for a stack
    StackId
);
define_id!(
    /// Unique identifier for a sticky note
    NoteId
);

/// Titled frame around a set of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Group ID
    pub id: GroupId,
    /// Title
    pub title: String,
    /// Position
    pub position: [f32; 2],
    /// Size
    pub size: [f32; 2],
    /// Optional color
    #[serde(default)]
    pub color: Option<[u8; 3]>,
    /// Contained nodes
    #[serde(default)]
    pub nodes: Vec<NodeId>,
}

impl Group {
    /// Create an empty group
    pub fn new(title: impl Into<String>, position: [f32; 2], size: [f32; 2]) -> Self {
        Self {
            id: GroupId::new(),
            title: title.into(),
            position,
            size,
            color: None,
            nodes: Vec::new(),
        }
    }
}

/// Vertical, ordered container of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackNode {
    /// Stack ID
    pub id: StackId,
    /// Title
    pub title: String,
    /// Position
    pub position: [f32; 2],
    /// Contained nodes, top to bottom
    #[serde(default)]
    pub nodes: Vec<NodeId>,
}

impl StackNode {
    /// Create an empty stack
    pub fn new(title: impl Into<String>, position: [f32; 2]) -> Self {
        Self {
            id: StackId::new(),
            title: title.into(),
            position,
            nodes: Vec::new(),
        }
    }
}

/// Free-floating text note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
    /// Note ID
    pub id: NoteId,
    /// Title
    pub title: String,
    /// Body text
    pub contents: String,
    /// Position
    pub position: [f32; 2],
    /// Size
    pub size: [f32; 2],
}

impl StickyNote {
    /// Create a note
    pub fn new(title: impl Into<String>, contents: impl Into<String>, position: [f32; 2]) -> Self {
        Self {
            id: NoteId::new(),
            title: title.into(),
            contents: contents.into(),
            position,
            size: [200.0, 100.0],
        }
    }
}

impl Graph {
    /// Add a group
    pub fn add_group(&mut self, group: Group) -> GroupId {
        let id = group.id;
        self.groups.insert(id, group);
        self.emit(GraphChange::AddedGroup(id));
        id
    }

    /// Remove a group, leaving its nodes in place
    pub fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        let group = self.groups.shift_remove(&id)?;
        self.emit(GraphChange::RemovedGroup(id));
        Some(group)
    }

    /// Get a group
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// All groups
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Add a stack
    pub fn add_stack(&mut self, stack: StackNode) -> StackId {
        let id = stack.id;
        self.stacks.insert(id, stack);
        self.emit(GraphChange::AddedStack(id));
        id
    }

    /// Remove a stack, leaving its nodes in place
    pub fn remove_stack(&mut self, id: StackId) -> Option<StackNode> {
        let stack = self.stacks.shift_remove(&id)?;
        self.emit(GraphChange::RemovedStack(id));
        Some(stack)
    }

    /// All stacks
    pub fn stacks(&self) -> impl Iterator<Item = &StackNode> {
        self.stacks.values()
    }

    /// Add a sticky note
    pub fn add_note(&mut self, note: StickyNote) -> NoteId {
        let id = note.id;
        self.notes.insert(id, note);
        self.emit(GraphChange::AddedNote(id));
        id
    }

    /// Remove a sticky note
    pub fn remove_note(&mut self, id: NoteId) -> Option<StickyNote> {
        let note = self.notes.shift_remove(&id)?;
        self.emit(GraphChange::RemovedNote(id));
        Some(note)
    }

    /// All sticky notes
    pub fn notes(&self) -> impl Iterator<Item = &StickyNote> {
        self.notes.values()
    }

    /// Forget a node in every group and stack
    pub(crate) fn forget_node_in_annotations(&mut self, node: NodeId) {
        for group in self.groups.values_mut() {
            group.nodes.retain(|n| *n != node);
        }
        for stack in self.stacks.values_mut() {
            stack.nodes.retain(|n| *n != node);
        }
    }
}
