use crate::criteria::SplitValue;
use crate::error::Result;
use crate::record::EpochId;
use crate::render::{
    EventOutcome, ExpansionPolicy, GraphicalKey, GraphicalTree, NavDirection, NavModifiers, NavOutcome,
    WidgetEvent, WidgetKey,
};
use crate::tree::{EpochTree, NodeId, NodeMetadata, SelectedData, TreeBuilder, TreeNode};
use log::debug;

/// Drives an [`EpochTree`] and its mirrored [`GraphicalTree`] from a
/// current-node cursor, the way a console or script would.
#[derive(Debug, Clone)]
pub struct TreeController {
    tree: EpochTree,
    view: GraphicalTree,
    current: NodeId,
    trunk_label: String,
    pool_size: usize,
    policy: ExpansionPolicy,
}

impl TreeController {
    pub fn new(
        tree: EpochTree,
        trunk_label: impl Into<String>,
        pool_size: usize,
        policy: ExpansionPolicy,
    ) -> Self {
        let trunk_label = trunk_label.into();
        let mut view = GraphicalTree::mirror(&tree, trunk_label.clone(), pool_size, policy);
        view.draw();
        let current = tree.root_id();
        Self {
            tree,
            view,
            current,
            trunk_label,
            pool_size,
            policy,
        }
    }

    pub fn tree(&self) -> &EpochTree {
        &self.tree
    }

    pub fn view(&self) -> &GraphicalTree {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut GraphicalTree {
        &mut self.view
    }

    pub fn current(&self) -> TreeNode<'_> {
        // the cursor is reset on every rebuild, so it always matches
        self.tree.node(self.current).unwrap_or_else(|_| self.tree.root())
    }

    pub fn current_id(&self) -> NodeId {
        self.current
    }

    fn go(&mut self, id: NodeId) -> TreeNode<'_> {
        self.current = id;
        debug!("cursor -> node {}", id.index());
        self.current()
    }

    pub fn go_root(&mut self) -> TreeNode<'_> {
        let root = self.tree.root_id();
        self.go(root)
    }

    pub fn go_child(&mut self, index: usize) -> Result<TreeNode<'_>> {
        let id = self.current().child_at(index)?.id();
        Ok(self.go(id))
    }

    /// Move to the child whose split value equals `value`; the cursor stays
    /// put when there is none.
    pub fn go_value(&mut self, value: &SplitValue) -> Option<TreeNode<'_>> {
        let id = self.current().child_by_split_value(value)?.id();
        Some(self.go(id))
    }

    pub fn go_path(&mut self, values: &[SplitValue]) -> Option<TreeNode<'_>> {
        let id = self.current().child_by_path(values)?.id();
        Some(self.go(id))
    }

    /// Move `n` levels up; `n = 0` stays on the current node.
    pub fn go_parent(&mut self, n: usize) -> Result<TreeNode<'_>> {
        let id = self.current().parent_at(n)?.id();
        Ok(self.go(id))
    }

    pub fn metadata(&self) -> NodeMetadata {
        self.current().metadata()
    }

    /// Flip the current node's checkbox. Returns the new value.
    pub fn toggle_checkbox(&mut self, recursive: bool) -> Result<bool> {
        let value = !self.current().is_selected();
        self.tree.set_selected(self.current, value, recursive)?;
        self.view.refresh(&self.tree)?;
        Ok(value)
    }

    pub fn select_all(&mut self) -> Result<usize> {
        let written = self.tree.selection().select_all()?;
        self.view.refresh(&self.tree)?;
        Ok(written)
    }

    pub fn deselect_all(&mut self) -> Result<usize> {
        let written = self.tree.selection().deselect_all()?;
        self.view.refresh(&self.tree)?;
        Ok(written)
    }

    /// Write one epoch's filter flag. Node checkboxes are not recomputed.
    pub fn set_epoch_selected(&mut self, epoch: EpochId, value: bool) -> Result<()> {
        self.tree.selection().set_epoch(epoch, value)
    }

    pub fn extract_selected(&self, stream: &str) -> Result<SelectedData> {
        self.current().selected_data(stream)
    }

    pub fn print_subtree(&self, depth: usize) -> String {
        self.current().outline(depth)
    }

    /// Expand, select and draw so the current node is bound to a widget.
    pub fn reveal_current(&mut self) -> Result<Option<WidgetKey>> {
        let key = self.view.reveal_node(self.current, &self.tree)?;
        self.view.select_node(key, false)?;
        self.view.draw();
        Ok(self.widget_for_current())
    }

    /// Widget showing the current node after the last draw, if any.
    pub fn widget_for_current(&self) -> Option<WidgetKey> {
        self.view.widget_for_node(self.current)
    }

    /// Regroup with new criteria. The graphical tree is mirrored afresh and
    /// the cursor returns to the root.
    pub fn rebuild(&mut self, builder: &TreeBuilder) -> Result<()> {
        self.tree.rebuild(builder)?;
        self.view = GraphicalTree::mirror(
            &self.tree,
            self.trunk_label.clone(),
            self.pool_size,
            self.policy,
        );
        self.view.draw();
        self.current = self.tree.root_id();
        Ok(())
    }

    /// Forward a widget input; a click also moves the cursor.
    pub fn handle_event(&mut self, event: WidgetEvent) -> Result<EventOutcome> {
        let outcome = self.view.handle_event(event, &mut self.tree)?;
        if let EventOutcome::Selected(key) = outcome {
            self.follow(key);
        }
        Ok(outcome)
    }

    /// Keyboard navigation over the last draw; the cursor follows the
    /// active row.
    pub fn navigate(&mut self, direction: NavDirection, modifiers: NavModifiers) -> NavOutcome {
        let outcome = self.view.navigate_selection(direction, modifiers);
        if let NavOutcome::Moved(key) = outcome {
            self.follow(key);
            self.view.draw();
        }
        outcome
    }

    fn follow(&mut self, key: GraphicalKey) {
        if let Some(owner) = self.view.node(key).and_then(|n| n.owner()) {
            self.current = owner;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::SplitValue;
    use crate::record::{EpochRecord, EpochStore};
    use crate::signal::ResponseStream;
    use crate::TreeError;
    use serde_json::json;

    fn controller(pool: usize) -> TreeController {
        let mut store = EpochStore::new();
        for (i, (kind, contrast)) in [("OnP", 0.5), ("OnP", 1.0), ("OffP", 0.5), ("OnP", 0.5)]
            .into_iter()
            .enumerate()
        {
            store.push(
                EpochRecord::new(json!({ "cellInfo": { "type": kind }, "contrast": contrast }))
                    .with_response("Amp1", ResponseStream::new(1000.0, vec![i as f64; 3])),
            );
        }
        let tree = EpochTree::build(store, &TreeBuilder::new(["cellInfo.type", "contrast"])).unwrap();
        TreeController::new(tree, "cells", pool, ExpansionPolicy::default())
    }

    #[test]
    fn cursor_walks_by_index_value_and_parent() {
        let mut ctl = controller(8);
        assert_eq!(ctl.go_child(0).unwrap().label(), "OnP");
        assert_eq!(ctl.go_value(&SplitValue::from(1.0)).unwrap().label(), "1.0");
        assert_eq!(ctl.metadata().epoch_count, 1);
        assert_eq!(ctl.go_parent(2).unwrap().depth(), 0);
        assert!(ctl.go_value(&SplitValue::from("RB")).is_none());
        assert!(ctl.current().is_root());

        let path = [SplitValue::from("OffP"), SplitValue::from(0.5)];
        assert!(ctl.go_path(&path).unwrap().is_leaf());
        assert_eq!(
            ctl.go_parent(5).unwrap_err(),
            TreeError::ParentOutOfRange {
                requested: 5,
                depth: 2
            }
        );
        assert!(matches!(ctl.go_child(0), Err(TreeError::ChildOutOfRange { .. })));
    }

    #[test]
    fn checkbox_updates_tree_and_view() {
        let mut ctl = controller(8);
        ctl.go_child(0).unwrap();
        assert!(!ctl.toggle_checkbox(true).unwrap());
        assert_eq!(ctl.tree().root().selected_count(), 1);
        let key = ctl.view().find_owner(ctl.current_id()).unwrap();
        assert!(!ctl.view().node(key).unwrap().is_checked());
        assert!(!ctl.view().node(ctl.view().trunk()).unwrap().is_checked());

        ctl.select_all().unwrap();
        assert!(ctl.view().node(key).unwrap().is_checked());
        assert_eq!(ctl.deselect_all().unwrap(), 4);
        assert!(ctl.extract_selected("Amp1").unwrap().is_empty());
    }

    #[test]
    fn extraction_follows_epoch_flags() {
        let mut ctl = controller(8);
        ctl.go_child(0).unwrap();
        let first = ctl.current().all_epochs(false)[0];
        ctl.set_epoch_selected(first, false).unwrap();
        let data = ctl.extract_selected("Amp1").unwrap();
        assert_eq!(data.rows(), 2);
        assert_eq!(data.fs, Some(1000.0));
        assert!(!data.epochs.contains(&first));
        assert!(matches!(
            ctl.extract_selected("Amp2"),
            Err(TreeError::MissingStream { .. })
        ));
    }

    #[test]
    fn reveal_binds_current_node() {
        let mut ctl = controller(2);
        ctl.go_path(&[SplitValue::from("OffP"), SplitValue::from(0.5)]).unwrap();
        assert!(ctl.widget_for_current().is_none());
        let widget = ctl.reveal_current().unwrap().unwrap();
        let key = ctl.view().binder().node_for(widget).unwrap();
        assert_eq!(ctl.view().node(key).unwrap().owner(), Some(ctl.current_id()));
        assert_eq!(ctl.view().bound_count(), 2);
    }

    #[test]
    fn navigation_moves_cursor() {
        let mut ctl = controller(8);
        let none = NavModifiers::default();
        ctl.navigate(NavDirection::Down, none);
        assert!(ctl.current().is_root());
        ctl.navigate(NavDirection::Down, none);
        assert_eq!(ctl.current().label(), "OnP");
        let click = WidgetEvent {
            widget: WidgetKey(2),
            input: crate::render::WidgetInput::Click { extend: false },
        };
        ctl.handle_event(click).unwrap();
        assert_eq!(ctl.current().label(), "OffP");
    }

    #[test]
    fn rebuild_resets_cursor_and_view() {
        let mut ctl = controller(8);
        ctl.go_child(1).unwrap();
        ctl.rebuild(&TreeBuilder::new(["contrast"])).unwrap();
        assert!(ctl.current().is_root());
        assert_eq!(ctl.view().generation(), Some(1));
        assert_eq!(ctl.view().draw_count(), 3);
        assert!(ctl.print_subtree(1).starts_with("[x] All epochs (4/4)"));
    }
}
