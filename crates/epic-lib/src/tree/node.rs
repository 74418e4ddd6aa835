use super::{EpochTree, NodeData, NodeId};
use crate::criteria::SplitValue;
use crate::custom::{CustomValue, SELECTED_FLAG};
use crate::error::{Result, TreeError};
use crate::record::EpochId;
use serde::Serialize;
use std::fmt::Write;

pub const ROOT_LABEL: &str = "All epochs";

/// Borrowed, read-only view of one node of an [`EpochTree`].
#[derive(Clone, Copy)]
pub struct TreeNode<'a> {
    tree: &'a EpochTree,
    index: usize,
}

/// Snapshot of the properties the control surface reports for a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetadata {
    pub split_key: Option<String>,
    pub split_value: Option<String>,
    pub epoch_count: usize,
    pub selected_count: usize,
    pub depth: usize,
    pub child_count: usize,
    pub is_leaf: bool,
    pub is_selected: bool,
}

/// Response rows of the selected epochs under a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedData {
    pub matrix: Vec<Vec<f64>>,
    pub epochs: Vec<EpochId>,
    pub fs: Option<f64>,
}

impl SelectedData {
    pub fn rows(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }
}

impl<'a> TreeNode<'a> {
    pub(crate) fn new(tree: &'a EpochTree, index: usize) -> Self {
        Self { tree, index }
    }

    fn data(&self) -> &'a NodeData {
        self.tree.data(self.index)
    }

    fn at(&self, index: usize) -> TreeNode<'a> {
        TreeNode::new(self.tree, index)
    }

    pub fn id(&self) -> NodeId {
        self.tree.id_for(self.index)
    }

    pub fn split_key(&self) -> Option<&'a str> {
        self.data().split_key.as_deref()
    }

    pub fn split_value(&self) -> Option<&'a SplitValue> {
        self.data().split_value.as_ref()
    }

    pub fn label(&self) -> String {
        match self.split_value() {
            Some(value) => value.to_string(),
            None => ROOT_LABEL.to_string(),
        }
    }

    pub fn depth(&self) -> usize {
        self.data().depth
    }

    pub fn is_root(&self) -> bool {
        self.data().parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.data().is_leaf()
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn children(&self) -> impl Iterator<Item = TreeNode<'a>> + 'a {
        let tree = self.tree;
        self.data()
            .children
            .iter()
            .map(move |&index| TreeNode::new(tree, index))
    }

    pub fn child_at(&self, index: usize) -> Result<TreeNode<'a>> {
        let children = &self.data().children;
        children
            .get(index)
            .map(|&child| self.at(child))
            .ok_or(TreeError::ChildOutOfRange {
                index,
                len: children.len(),
            })
    }

    /// First child whose split value equals `value`.
    pub fn child_by_split_value(&self, value: &SplitValue) -> Option<TreeNode<'a>> {
        self.children()
            .find(|child| child.split_value() == Some(value))
    }

    /// Follow a sequence of split values downwards from this node.
    pub fn child_by_path(&self, path: &[SplitValue]) -> Option<TreeNode<'a>> {
        path.iter()
            .try_fold(*self, |node, value| node.child_by_split_value(value))
    }

    pub fn parent(&self) -> Option<TreeNode<'a>> {
        self.data().parent.map(|index| self.at(index))
    }

    /// Walk `n` ancestors up; `parent_at(0)` is the node itself.
    pub fn parent_at(&self, n: usize) -> Result<TreeNode<'a>> {
        let mut node = *self;
        for _ in 0..n {
            node = node.parent().ok_or(TreeError::ParentOutOfRange {
                requested: n,
                depth: self.depth(),
            })?;
        }
        Ok(node)
    }

    /// Split values from the root down to this node.
    pub fn path(&self) -> Vec<SplitValue> {
        let mut path = Vec::with_capacity(self.depth());
        let mut node = Some(*self);
        while let Some(current) = node {
            if let Some(value) = current.split_value() {
                path.push(value.clone());
            }
            node = current.parent();
        }
        path.reverse();
        path
    }

    /// Depth-first leaf descendants in child order, recomputed on each call.
    pub fn leaf_nodes(&self) -> LeafNodes<'a> {
        LeafNodes {
            tree: self.tree,
            stack: vec![self.index],
        }
    }

    /// Epochs held directly by this node (empty unless it is a leaf).
    pub fn epochs(&self) -> &'a [EpochId] {
        &self.data().epochs
    }

    pub fn epoch_count(&self) -> usize {
        self.leaf_nodes().map(|leaf| leaf.epochs().len()).sum()
    }

    pub fn selected_count(&self) -> usize {
        let store = self.tree.store();
        self.leaf_nodes()
            .flat_map(|leaf| leaf.epochs().iter())
            .filter(|id| store.is_selected(**id).unwrap_or(false))
            .count()
    }

    /// Handles of every epoch under this node, depth first.
    ///
    /// The handles alias the tree's store: changing a flag through
    /// [`crate::selection::SelectionController::set_epoch`] is observed by
    /// every later query on this node.
    pub fn all_epochs(&self, only_selected: bool) -> Vec<EpochId> {
        let store = self.tree.store();
        self.leaf_nodes()
            .flat_map(|leaf| leaf.epochs().iter().copied())
            .filter(|id| !only_selected || store.is_selected(*id).unwrap_or(false))
            .collect()
    }

    /// The node-level selection display flag.
    pub fn is_selected(&self) -> bool {
        self.custom(SELECTED_FLAG)
            .and_then(CustomValue::as_flag)
            .unwrap_or(false)
    }

    pub fn custom(&self, key: &str) -> Option<&'a CustomValue> {
        self.data().custom.get(key)
    }

    pub fn has_custom(&self, key: &str) -> bool {
        self.data().custom.contains(key)
    }

    pub fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            split_key: self.split_key().map(str::to_string),
            split_value: self.split_value().map(|v| v.to_string()),
            epoch_count: self.epoch_count(),
            selected_count: self.selected_count(),
            depth: self.depth(),
            child_count: self.child_count(),
            is_leaf: self.is_leaf(),
            is_selected: self.is_selected(),
        }
    }

    /// Rows of `stream` for every selected epoch under this node.
    pub fn selected_data(&self, stream: &str) -> Result<SelectedData> {
        let store = self.tree.store();
        let epochs = self.all_epochs(true);
        let mut matrix = Vec::with_capacity(epochs.len());
        let mut fs: Option<f64> = None;
        for id in &epochs {
            let record = store.get(*id).ok_or(TreeError::UnknownEpoch(id.index()))?;
            let response = record
                .response(stream)
                .ok_or_else(|| TreeError::MissingStream {
                    epoch: id.index(),
                    stream: stream.to_string(),
                })?;
            match fs {
                Some(expected) if (expected - response.fs).abs() > f64::EPSILON => {
                    return Err(TreeError::SampleRateMismatch {
                        expected,
                        found: response.fs,
                    })
                }
                Some(_) => {}
                None => fs = Some(response.fs),
            }
            matrix.push(response.data.clone());
        }
        Ok(SelectedData { matrix, epochs, fs })
    }

    /// Indented text rendering of this subtree, `max_depth` levels deep.
    pub fn outline(&self, max_depth: usize) -> String {
        let mut out = String::new();
        let base = self.depth();
        let mut stack = vec![self.index];
        while let Some(index) = stack.pop() {
            let node = self.at(index);
            let level = node.depth() - base;
            let _ = writeln!(
                out,
                "{}[{}] {} ({}/{})",
                "  ".repeat(level),
                if node.is_selected() { "x" } else { " " },
                node.label(),
                node.selected_count(),
                node.epoch_count()
            );
            if level < max_depth {
                stack.extend(node.data().children.iter().rev().copied());
            }
        }
        out
    }
}

impl std::fmt::Debug for TreeNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeNode")
            .field("index", &self.index)
            .field("split_key", &self.split_key())
            .field("split_value", &self.split_value())
            .finish()
    }
}

/// Iterator returned by [`TreeNode::leaf_nodes`].
pub struct LeafNodes<'a> {
    tree: &'a EpochTree,
    stack: Vec<usize>,
}

impl<'a> Iterator for LeafNodes<'a> {
    type Item = TreeNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(index) = self.stack.pop() {
            let data = self.tree.data(index);
            if data.is_leaf() {
                return Some(TreeNode::new(self.tree, index));
            }
            self.stack.extend(data.children.iter().rev().copied());
        }
        None
    }
}
