use crate::custom::SELECTED_FLAG;
use crate::error::Result;
use crate::record::EpochId;
use crate::tree::{EpochTree, NodeId, TreeNode};
use log::debug;

/// The one mutation path for selection state.
///
/// Node display flags live in each node's custom store under
/// [`SELECTED_FLAG`]; per-epoch flags live in the store. Going through this
/// controller keeps the two in step.
pub struct SelectionController<'t> {
    tree: &'t mut EpochTree,
}

impl<'t> SelectionController<'t> {
    pub(crate) fn new(tree: &'t mut EpochTree) -> Self {
        Self { tree }
    }

    /// Set the node's display flag and, when `recursive`, the flag of every
    /// descendant node and epoch. Returns the number of epochs written.
    pub fn set_selected(&mut self, node: NodeId, value: bool, recursive: bool) -> Result<usize> {
        let index = self.tree.check(node)?;
        if !recursive {
            self.tree.set_flag(index, value);
            debug!("node {} flag -> {}", index, value);
            return Ok(0);
        }

        let subtree = self.tree.subtree(index);
        let EpochTree {
            store, hierarchy, ..
        } = &mut *self.tree;
        let mut written = 0;
        for &current in &subtree {
            let data = &mut hierarchy.nodes[current];
            data.custom.put(SELECTED_FLAG, value);
            for id in &data.epochs {
                store.set_selected(*id, value)?;
                written += 1;
            }
        }
        self.refresh_ancestors(index);
        debug!(
            "node {} and {} descendants -> {} ({} epochs)",
            index,
            subtree.len() - 1,
            value,
            written
        );
        Ok(written)
    }

    /// Flip the node's display flag, applying the new value recursively.
    pub fn toggle(&mut self, node: NodeId) -> Result<bool> {
        let value = !self.tree.node(node)?.is_selected();
        self.set_selected(node, value, true)?;
        Ok(value)
    }

    pub fn select_all(&mut self) -> Result<usize> {
        let root = self.tree.root_id();
        self.set_selected(root, true, true)
    }

    pub fn deselect_all(&mut self) -> Result<usize> {
        let root = self.tree.root_id();
        self.set_selected(root, false, true)
    }

    /// Write one epoch's filter flag through its handle. Node display flags
    /// are left as they are.
    pub fn set_epoch(&mut self, epoch: EpochId, value: bool) -> Result<()> {
        self.tree.store.set_selected(epoch, value)?;
        debug!("epoch {} -> {}", epoch, value);
        Ok(())
    }

    pub fn set_epochs<I>(&mut self, epochs: I, value: bool) -> Result<usize>
    where
        I: IntoIterator<Item = EpochId>,
    {
        let mut written = 0;
        for epoch in epochs {
            self.set_epoch(epoch, value)?;
            written += 1;
        }
        Ok(written)
    }

    // Ancestors show as selected only while every epoch below them is.
    fn refresh_ancestors(&mut self, index: usize) {
        let mut parent = self.tree.data(index).parent;
        while let Some(current) = parent {
            let node = TreeNode::new(self.tree, current);
            let total = node.epoch_count();
            let all = total > 0 && node.selected_count() == total;
            self.tree.set_flag(current, all);
            parent = self.tree.data(current).parent;
        }
    }
}
