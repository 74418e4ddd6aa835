mod builder;
mod node;

pub use builder::TreeBuilder;
pub use node::{LeafNodes, NodeMetadata, SelectedData, TreeNode, ROOT_LABEL};

use crate::criteria::SplitValue;
use crate::custom::{CustomStore, CustomValue, SELECTED_FLAG};
use crate::error::{Result, TreeError};
use crate::record::{EpochId, EpochStore};
use crate::selection::SelectionController;
use log::info;

/// Handle to a node of one particular build of an [`EpochTree`].
///
/// A rebuild bumps the tree generation; handles from an older generation
/// are rejected with [`TreeError::StaleNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u64,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NodeData {
    pub(crate) split_key: Option<String>,
    pub(crate) split_value: Option<SplitValue>,
    pub(crate) children: Vec<usize>,
    pub(crate) epochs: Vec<EpochId>,
    pub(crate) parent: Option<usize>,
    pub(crate) depth: usize,
    pub(crate) custom: CustomStore,
}

impl NodeData {
    pub(crate) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Node arena of one build. Index 0 is the root; children always sit at
/// higher indices than their parent.
#[derive(Debug, Clone, Default)]
pub(crate) struct Hierarchy {
    pub(crate) nodes: Vec<NodeData>,
}

/// An [`EpochStore`] together with the hierarchy built over it.
#[derive(Debug, Clone)]
pub struct EpochTree {
    pub(crate) store: EpochStore,
    pub(crate) hierarchy: Hierarchy,
    split_keys: Vec<String>,
    generation: u64,
}

impl EpochTree {
    pub fn build(store: EpochStore, builder: &TreeBuilder) -> Result<Self> {
        let hierarchy = builder.build(&store)?;
        let tree = Self {
            store,
            hierarchy,
            split_keys: builder.split_keys(),
            generation: 0,
        };
        info!(
            "built tree over {} epochs: {} nodes, {} leaves",
            tree.store.len(),
            tree.node_count(),
            tree.root().leaf_nodes().count()
        );
        Ok(tree)
    }

    /// Regroup the same store with new criteria.
    ///
    /// The old hierarchy, its custom annotations and every outstanding
    /// [`NodeId`] are invalidated. On error the previous hierarchy is kept.
    pub fn rebuild(&mut self, builder: &TreeBuilder) -> Result<()> {
        let hierarchy = builder.build(&self.store)?;
        self.hierarchy = hierarchy;
        self.split_keys = builder.split_keys();
        self.generation += 1;
        info!(
            "rebuilt tree (generation {}) by [{}]: {} nodes",
            self.generation,
            self.split_keys.join(", "),
            self.node_count()
        );
        Ok(())
    }

    pub fn store(&self) -> &EpochStore {
        &self.store
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn split_keys(&self) -> &[String] {
        &self.split_keys
    }

    pub fn node_count(&self) -> usize {
        self.hierarchy.nodes.len()
    }

    pub fn root(&self) -> TreeNode<'_> {
        TreeNode::new(self, 0)
    }

    pub fn root_id(&self) -> NodeId {
        self.id_for(0)
    }

    pub fn node(&self, id: NodeId) -> Result<TreeNode<'_>> {
        let index = self.check(id)?;
        Ok(TreeNode::new(self, index))
    }

    pub fn selection(&mut self) -> SelectionController<'_> {
        SelectionController::new(self)
    }

    /// Shorthand for [`SelectionController::set_selected`].
    pub fn set_selected(&mut self, id: NodeId, value: bool, recursive: bool) -> Result<usize> {
        self.selection().set_selected(id, value, recursive)
    }

    pub fn put_custom(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<CustomValue>,
    ) -> Result<Option<CustomValue>> {
        let index = self.check(id)?;
        Ok(self.hierarchy.nodes[index].custom.put(key, value))
    }

    pub fn remove_custom(&mut self, id: NodeId, key: &str) -> Result<Option<CustomValue>> {
        let index = self.check(id)?;
        Ok(self.hierarchy.nodes[index].custom.remove(key))
    }

    pub(crate) fn id_for(&self, index: usize) -> NodeId {
        NodeId {
            index,
            generation: self.generation,
        }
    }

    pub(crate) fn check(&self, id: NodeId) -> Result<usize> {
        if id.generation != self.generation {
            return Err(TreeError::StaleNode {
                handle: id.generation,
                current: self.generation,
            });
        }
        if id.index >= self.hierarchy.nodes.len() {
            return Err(TreeError::UnknownNode(id.index));
        }
        Ok(id.index)
    }

    pub(crate) fn data(&self, index: usize) -> &NodeData {
        &self.hierarchy.nodes[index]
    }

    pub(crate) fn set_flag(&mut self, index: usize, value: bool) {
        self.hierarchy.nodes[index].custom.put(SELECTED_FLAG, value);
    }

    /// Indices of `index` and all of its descendants, parents first.
    pub(crate) fn subtree(&self, index: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.hierarchy.nodes[current].children.iter().rev().copied());
        }
        out
    }
}
