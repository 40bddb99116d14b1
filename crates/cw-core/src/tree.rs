//! The project item tree installed into the presentation layer.
//!
//! [`ItemTree`] is an index-based arena: nodes are stored in a `Vec` and
//! addressed by [`NodeId`], giving O(1) parent and child navigation without
//! reference cycles. The tree is acyclic by construction - a child id is
//! always freshly allocated, so no node can become its own ancestor.
//!
//! Invariants maintained by the API:
//!
//! - exactly one root node, created with the tree
//! - a node's path is unique among its siblings (duplicate inserts rejected)
//! - parent links always point at an existing node
//!
//! The tree is pure data. Once the orchestrator installs it into the view
//! it is shared read-only (`Arc<ItemTree>`); mutation happens only while
//! the parser owns it.
//!
//! # Examples
//!
//! ```
//! use cw_core::{ItemTree, NodeKind};
//! use camino::Utf8Path;
//!
//! let mut tree = ItemTree::new("demo", Utf8Path::new("/proj"));
//! let root = tree.root_id();
//! let dir = tree.add_child(root, "src", Utf8Path::new("/proj/src"), NodeKind::Directory)?;
//! tree.add_child(dir, "main.c", Utf8Path::new("/proj/src/main.c"), NodeKind::File)?;
//!
//! assert_eq!(tree.len(), 3);
//! assert_eq!(tree.children(root).count(), 1);
//! # Ok::<(), cw_core::TreeError>(())
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Index of a node within an [`ItemTree`].
///
/// Ids are only meaningful for the tree that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The kind of a project node.
///
/// This is a closed set: the original dynamic tag-based typing collapses
/// into four fixed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The single root of a configured project.
    Root,
    /// A directory grouping files and targets.
    Directory,
    /// A source or descriptor file.
    File,
    /// A buildable target (executable, library, custom target).
    Target,
}

impl NodeKind {
    /// Returns `true` for kinds that may own children.
    #[inline]
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Root | Self::Directory | Self::Target)
    }
}

/// A single node in the item tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Display name shown in the project view.
    pub name: String,
    /// Absolute path of the item this node represents.
    pub path: Utf8PathBuf,
    /// Node kind.
    pub kind: NodeKind,
    /// Parent node, `None` only for the root.
    pub parent: Option<NodeId>,
    /// Ordered child ids.
    pub children: Vec<NodeId>,
}

/// Errors from tree construction.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The referenced node id does not exist in this tree.
    #[error("node id {0} does not exist in this tree")]
    InvalidNode(u32),

    /// A sibling with the same path already exists under the parent.
    #[error("duplicate sibling path: {0}")]
    DuplicateSiblingPath(Utf8PathBuf),

    /// The parent node kind cannot own children.
    #[error("node kind {0:?} cannot have children")]
    NotAContainer(NodeKind),
}

/// Arena-backed ownership tree of project nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTree {
    nodes: Vec<Node>,
}

impl ItemTree {
    /// Creates a tree containing a single root node.
    #[must_use]
    pub fn new(name: impl Into<String>, path: &Utf8Path) -> Self {
        Self {
            nodes: vec![Node {
                name: name.into(),
                path: path.to_owned(),
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Returns the id of the root node.
    #[inline]
    #[must_use]
    pub const fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    /// Returns the root node.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Returns the node for `id`, if it exists.
    #[inline]
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Returns the parent id of `id`, `None` for the root or unknown ids.
    #[inline]
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Total number of nodes, root included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree holds only the root.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Appends a child under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidNode`] for an unknown parent,
    /// [`TreeError::NotAContainer`] if the parent is a file node, and
    /// [`TreeError::DuplicateSiblingPath`] if a sibling already carries
    /// the same path.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        path: &Utf8Path,
        kind: NodeKind,
    ) -> Result<NodeId, TreeError> {
        let parent_node = self
            .nodes
            .get(parent.index())
            .ok_or(TreeError::InvalidNode(parent.0))?;

        if !parent_node.kind.is_container() {
            return Err(TreeError::NotAContainer(parent_node.kind));
        }

        let duplicate = parent_node
            .children
            .iter()
            .any(|&c| self.nodes[c.index()].path == path);
        if duplicate {
            return Err(TreeError::DuplicateSiblingPath(path.to_owned()));
        }

        let id = NodeId(u32::try_from(self.nodes.len()).map_err(|_| TreeError::InvalidNode(u32::MAX))?);
        self.nodes.push(Node {
            name: name.into(),
            path: path.to_owned(),
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        Ok(id)
    }

    /// Returns an iterator over the direct children of `id`.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }

    /// Preorder traversal of all node ids, root first.
    pub fn preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![self.root_id()];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            if let Some(node) = self.node(id) {
                // push in reverse so children pop in order
                stack.extend(node.children.iter().rev().copied());
            }
            Some(id)
        })
    }

    /// Depth of `id` below the root (root is depth 0).
    #[must_use]
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Finds the first node (preorder) with the given path.
    #[must_use]
    pub fn find_by_path(&self, path: &Utf8Path) -> Option<NodeId> {
        self.preorder()
            .find(|&id| self.nodes[id.index()].path == path)
    }

    /// Returns the paths of all file nodes, in preorder.
    ///
    /// These are the paths the watch keeper registers for the tree.
    #[must_use]
    pub fn file_paths(&self) -> Vec<Utf8PathBuf> {
        self.preorder()
            .filter(|&id| self.nodes[id.index()].kind == NodeKind::File)
            .map(|id| self.nodes[id.index()].path.clone())
            .collect()
    }
}
