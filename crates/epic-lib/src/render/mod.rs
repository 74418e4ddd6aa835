mod binder;
mod pool;

pub use binder::WidgetBinder;
pub use pool::{Widget, WidgetKey, WidgetPool, DEFAULT_POOL_SIZE};

use crate::error::{Result, TreeError};
use crate::tree::{EpochTree, NodeId, TreeNode};
use log::debug;
use serde::{Deserialize, Serialize};

/// Stable identity of a node in a [`GraphicalTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GraphicalKey(pub(crate) usize);

impl GraphicalKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Display mirror of one tree node. Holds only display state.
#[derive(Debug, Clone)]
pub struct GraphicalNode {
    key: GraphicalKey,
    label: String,
    depth: usize,
    expanded: bool,
    checked: bool,
    owner: Option<NodeId>,
    parent: Option<GraphicalKey>,
    children: Vec<GraphicalKey>,
    // owner has children that are not mirrored yet
    pending: bool,
}

impl GraphicalNode {
    pub fn key(&self) -> GraphicalKey {
        self.key
    }
    pub fn label(&self) -> &str {
        &self.label
    }
    pub fn depth(&self) -> usize {
        self.depth
    }
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }
    pub fn is_checked(&self) -> bool {
        self.checked
    }
    /// The tree node this graphical node represents.
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }
    pub fn parent(&self) -> Option<GraphicalKey> {
        self.parent
    }
    pub fn children(&self) -> &[GraphicalKey] {
        &self.children
    }
    pub fn has_children(&self) -> bool {
        self.pending || !self.children.is_empty()
    }
    /// Children are mirrored the first time the node is expanded.
    pub fn is_loaded(&self) -> bool {
        !self.pending
    }
}

/// Which levels start out expanded. The trunk always does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpansionPolicy {
    pub expand_depth: usize,
}

impl ExpansionPolicy {
    pub fn expands(&self, depth: usize) -> bool {
        depth == 0 || depth <= self.expand_depth
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Up,
    Down,
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavModifiers {
    /// Shift: extend the selection instead of replacing it.
    pub extend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Moved(GraphicalKey),
    /// Already on the first/last visible row; nothing changed.
    Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetInput {
    Click { extend: bool },
    ToggleExpand,
    ToggleCheck,
}

/// Input reported by the rendering host against a widget slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetEvent {
    pub widget: WidgetKey,
    pub input: WidgetInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The widget is not showing a node.
    Ignored,
    Selected(GraphicalKey),
    Expanded(GraphicalKey, bool),
    Checked(GraphicalKey, bool),
}

/// What a host needs to paint one bound widget.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub widget: WidgetKey,
    pub row: usize,
    pub node: &'a GraphicalNode,
    pub checked: bool,
    pub selected: bool,
    pub active: bool,
}

/// Virtualized renderer: a display mirror of the tree drawn through a
/// fixed pool of widgets.
#[derive(Debug, Clone)]
pub struct GraphicalTree {
    nodes: Vec<GraphicalNode>,
    by_owner: Vec<Option<GraphicalKey>>,
    pool: WidgetPool,
    binder: WidgetBinder,
    policy: ExpansionPolicy,
    generation: Option<u64>,
    draw_order: Vec<GraphicalKey>,
    stack: Vec<GraphicalKey>,
    draw_count: usize,
    scroll: usize,
    reveal_active: bool,
    selection: Vec<GraphicalKey>,
    anchor: Option<GraphicalKey>,
    active: Option<GraphicalKey>,
}

impl GraphicalTree {
    /// A tree holding only the trunk; grow it with [`GraphicalTree::new_node`].
    pub fn new(trunk_label: impl Into<String>, pool_size: usize, policy: ExpansionPolicy) -> Self {
        let trunk = GraphicalNode {
            key: GraphicalKey(0),
            label: trunk_label.into(),
            depth: 0,
            expanded: true,
            checked: false,
            owner: None,
            parent: None,
            children: Vec::new(),
            pending: false,
        };
        Self {
            nodes: vec![trunk],
            by_owner: Vec::new(),
            pool: WidgetPool::new(pool_size),
            binder: WidgetBinder::new(pool_size),
            policy,
            generation: None,
            draw_order: Vec::new(),
            stack: Vec::new(),
            draw_count: 0,
            scroll: 0,
            reveal_active: false,
            selection: Vec::new(),
            anchor: None,
            active: None,
        }
    }

    /// Mirror the current build of `tree`.
    ///
    /// Graphical nodes are created for the trunk and for every level the
    /// expansion policy opens; deeper levels are mirrored on first expand.
    pub fn mirror(
        tree: &EpochTree,
        trunk_label: impl Into<String>,
        pool_size: usize,
        policy: ExpansionPolicy,
    ) -> Self {
        let mut view = Self::new(trunk_label, pool_size, policy);
        view.generation = Some(tree.generation());
        view.by_owner = vec![None; tree.node_count()];
        let trunk = view.trunk();
        view.adopt(trunk, tree.root());

        let mut stack: Vec<(GraphicalKey, TreeNode<'_>)> = vec![(trunk, tree.root())];
        while let Some((key, node)) = stack.pop() {
            if !view.nodes[key.0].expanded {
                continue;
            }
            view.load_children(key, node);
            let children = view.nodes[key.0].children.clone();
            stack.extend(children.into_iter().zip(node.children()));
        }
        debug!(
            "mirrored generation {}: {} of {} nodes",
            tree.generation(),
            view.nodes.len(),
            tree.node_count()
        );
        view
    }

    fn adopt(&mut self, key: GraphicalKey, node: TreeNode<'_>) {
        let graphical = &mut self.nodes[key.0];
        graphical.owner = Some(node.id());
        graphical.checked = node.is_selected();
        graphical.pending = !node.is_leaf();
        if let Some(slot) = self.by_owner.get_mut(node.id().index()) {
            *slot = Some(key);
        }
    }

    fn load_children(&mut self, key: GraphicalKey, source: TreeNode<'_>) {
        if !self.nodes[key.0].pending {
            return;
        }
        for child in source.children() {
            let child_key = self.push_node(key, child.label());
            self.adopt(child_key, child);
        }
        self.nodes[key.0].pending = false;
    }

    /// Mirror the children of `key` from its owner if that has not
    /// happened yet.
    pub fn materialize(&mut self, key: GraphicalKey, tree: &EpochTree) -> Result<()> {
        let node = self.get(key)?;
        if !node.pending {
            return Ok(());
        }
        let owner = node.owner.ok_or(TreeError::NoOwner(key.0))?;
        self.check_generation(tree)?;
        let source = tree.node(owner)?;
        self.load_children(key, source);
        Ok(())
    }

    /// Expand `key`, mirroring its children first when needed.
    pub fn expand(&mut self, key: GraphicalKey, tree: &EpochTree) -> Result<()> {
        self.materialize(key, tree)?;
        self.set_expanded(key, true)
    }

    /// Mirror and expand every ancestor of tree node `node` so it is laid
    /// out on the next draw. Returns its graphical key.
    pub fn reveal_node(&mut self, node: NodeId, tree: &EpochTree) -> Result<GraphicalKey> {
        self.check_generation(tree)?;
        let target = tree.node(node)?;
        let mut ancestors = Vec::with_capacity(target.depth());
        let mut current = target.parent();
        while let Some(ancestor) = current {
            ancestors.push(ancestor.id());
            current = ancestor.parent();
        }
        for ancestor in ancestors.into_iter().rev() {
            let key = self
                .find_owner(ancestor)
                .ok_or(TreeError::UnknownNode(ancestor.index()))?;
            self.expand(key, tree)?;
        }
        self.find_owner(node)
            .ok_or(TreeError::UnknownNode(node.index()))
    }

    fn push_node(&mut self, parent: GraphicalKey, name: String) -> GraphicalKey {
        let key = GraphicalKey(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        self.nodes.push(GraphicalNode {
            key,
            label: name,
            depth,
            expanded: self.policy.expands(depth),
            checked: false,
            owner: None,
            parent: Some(parent),
            children: Vec::new(),
            pending: false,
        });
        self.nodes[parent.0].children.push(key);
        key
    }

    /// Append a child under `parent`, one level deeper.
    pub fn new_node(&mut self, parent: GraphicalKey, name: impl Into<String>) -> Result<GraphicalKey> {
        self.get(parent)?;
        Ok(self.push_node(parent, name.into()))
    }

    pub fn trunk(&self) -> GraphicalKey {
        GraphicalKey(0)
    }

    pub fn node(&self, key: GraphicalKey) -> Option<&GraphicalNode> {
        self.nodes.get(key.0)
    }

    fn get(&self, key: GraphicalKey) -> Result<&GraphicalNode> {
        self.nodes
            .get(key.0)
            .ok_or(TreeError::UnknownGraphicalNode(key.0))
    }

    fn get_mut(&mut self, key: GraphicalKey) -> Result<&mut GraphicalNode> {
        self.nodes
            .get_mut(key.0)
            .ok_or(TreeError::UnknownGraphicalNode(key.0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn pool(&self) -> &WidgetPool {
        &self.pool
    }

    pub fn binder(&self) -> &WidgetBinder {
        &self.binder
    }

    pub fn policy(&self) -> ExpansionPolicy {
        self.policy
    }

    /// Tree generation this view mirrors; `None` for hand-built views.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Nodes laid out by the most recent [`GraphicalTree::draw`].
    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    /// Visible nodes of the most recent draw, in row order.
    pub fn draw_order(&self) -> &[GraphicalKey] {
        &self.draw_order
    }

    pub fn bound_count(&self) -> usize {
        self.binder.len()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// First row to bind on the next draw.
    pub fn set_scroll(&mut self, row: usize) {
        self.scroll = row;
        self.reveal_active = false;
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let row = if delta < 0 {
            self.scroll.saturating_sub(delta.unsigned_abs())
        } else {
            self.scroll.saturating_add(delta as usize)
        };
        self.set_scroll(row);
    }

    fn row_of(&self, key: GraphicalKey) -> Option<usize> {
        self.draw_order.iter().position(|k| *k == key)
    }

    /// One depth-first visibility pass from the trunk, binding visible rows
    /// to pool widgets in order. Returns the number of visible nodes.
    pub fn draw(&mut self) -> usize {
        let mut stack = std::mem::take(&mut self.stack);
        stack.clear();
        stack.push(self.trunk());
        self.draw_order.clear();
        while let Some(key) = stack.pop() {
            self.draw_order.push(key);
            let node = &self.nodes[key.0];
            if node.expanded {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        self.stack = stack;
        self.draw_count = self.draw_order.len();

        let capacity = self.pool.capacity();
        if self.reveal_active {
            if let Some(row) = self.active.and_then(|k| self.row_of(k)) {
                if row < self.scroll {
                    self.scroll = row;
                } else if capacity > 0 && row >= self.scroll + capacity {
                    self.scroll = row + 1 - capacity;
                }
            }
            self.reveal_active = false;
        }
        self.scroll = self.scroll.min(self.draw_count.saturating_sub(capacity));

        self.pool.release_all();
        self.binder.clear();
        for (row, &key) in self.draw_order.iter().enumerate().skip(self.scroll) {
            let checked = self.nodes[key.0].checked;
            match self.pool.claim(key, row, checked) {
                Some(widget) => self.binder.bind(widget, key),
                None => break,
            }
        }
        debug!(
            "draw pass: {} visible, {} bound from row {}",
            self.draw_count,
            self.binder.len(),
            self.scroll
        );
        self.draw_count
    }

    /// Bound widgets in row order, ready to paint.
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> + '_ {
        self.pool.visible().filter_map(move |widget| {
            let key = widget.bound_node_key()?;
            Some(RowView {
                widget: widget.self_key(),
                row: widget.row(),
                node: &self.nodes[key.0],
                checked: widget.is_checked(),
                selected: self.selection.contains(&key),
                active: self.active == Some(key),
            })
        })
    }

    pub fn set_expanded(&mut self, key: GraphicalKey, expanded: bool) -> Result<()> {
        self.get_mut(key)?.expanded = expanded;
        Ok(())
    }

    pub fn toggle_expanded(&mut self, key: GraphicalKey) -> Result<bool> {
        let node = self.get_mut(key)?;
        node.expanded = !node.expanded;
        Ok(node.expanded)
    }

    /// Expand every node mirrored so far.
    pub fn expand_all(&mut self) {
        self.nodes.iter_mut().for_each(|n| n.expanded = true);
    }

    /// Collapse everything below the trunk.
    pub fn collapse_all(&mut self) {
        self.nodes
            .iter_mut()
            .for_each(|n| n.expanded = n.depth == 0);
    }

    /// Select the node bound to widget slot `index`. A hidden slot selects
    /// nothing and yields `Ok(None)`.
    pub fn select_widget(&mut self, index: usize, extend: bool) -> Result<Option<GraphicalKey>> {
        let capacity = self.pool.capacity();
        if index >= capacity {
            return Err(TreeError::WidgetOutOfRange { index, capacity });
        }
        let Some(key) = self.binder.node_for(WidgetKey(index)) else {
            return Ok(None);
        };
        self.select_key(key, extend);
        Ok(Some(key))
    }

    pub fn select_node(&mut self, key: GraphicalKey, extend: bool) -> Result<()> {
        self.get(key)?;
        self.select_key(key, extend);
        Ok(())
    }

    fn select_key(&mut self, key: GraphicalKey, extend: bool) {
        if !extend {
            self.selection.clear();
            self.selection.push(key);
            self.anchor = Some(key);
        } else {
            let range = self
                .anchor
                .and_then(|anchor| Some((self.row_of(anchor)?, self.row_of(key)?)));
            let added: Vec<GraphicalKey> = match range {
                Some((a, b)) => self.draw_order[a.min(b)..=a.max(b)].to_vec(),
                None => vec![key],
            };
            for k in added {
                if !self.selection.contains(&k) {
                    self.selection.push(k);
                }
            }
            if self.anchor.is_none() {
                self.anchor = Some(key);
            }
        }
        self.active = Some(key);
        self.reveal_active = true;
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.anchor = None;
        self.active = None;
    }

    /// Current multi-selection with the tree node each entry represents.
    pub fn selected_nodes(&self) -> Vec<(GraphicalKey, Option<NodeId>)> {
        self.selection
            .iter()
            .map(|key| (*key, self.nodes[key.0].owner))
            .collect()
    }

    /// The row keyboard navigation moves from.
    pub fn active(&self) -> Option<GraphicalKey> {
        self.active
    }

    /// Move the active row one step in the order of the last draw pass.
    ///
    /// With no visible active row, Down/First start at the top and Up/Last
    /// at the bottom.
    pub fn navigate_selection(&mut self, direction: NavDirection, modifiers: NavModifiers) -> NavOutcome {
        let Some(last) = self.draw_order.len().checked_sub(1) else {
            return NavOutcome::Boundary;
        };
        let current = match self.active {
            Some(key) => match self.row_of(key) {
                Some(row) => Some(row),
                None => {
                    // active row was collapsed away
                    if let Some(ancestor) = self.visible_ancestor(key) {
                        self.select_key(ancestor, modifiers.extend);
                        return NavOutcome::Moved(ancestor);
                    }
                    None
                }
            },
            None => None,
        };
        let target = match (direction, current) {
            (NavDirection::Down | NavDirection::First, None) => 0,
            (NavDirection::Up | NavDirection::Last, None) => last,
            (NavDirection::Up, Some(row)) if row > 0 => row - 1,
            (NavDirection::Down, Some(row)) if row < last => row + 1,
            (NavDirection::First, Some(row)) if row > 0 => 0,
            (NavDirection::Last, Some(row)) if row < last => last,
            _ => return NavOutcome::Boundary,
        };
        let key = self.draw_order[target];
        self.select_key(key, modifiers.extend);
        NavOutcome::Moved(key)
    }

    fn visible_ancestor(&self, key: GraphicalKey) -> Option<GraphicalKey> {
        let mut parent = self.nodes.get(key.0)?.parent;
        while let Some(current) = parent {
            if self.row_of(current).is_some() {
                return Some(current);
            }
            parent = self.nodes[current.0].parent;
        }
        None
    }

    fn check_generation(&self, tree: &EpochTree) -> Result<()> {
        match self.generation {
            Some(view) if view != tree.generation() => Err(TreeError::StaleView {
                view,
                tree: tree.generation(),
            }),
            _ => Ok(()),
        }
    }

    /// Copy each owner's selection display flag into `is_checked`.
    pub fn sync_checked(&mut self, tree: &EpochTree) -> Result<()> {
        self.check_generation(tree)?;
        for node in &mut self.nodes {
            if let Some(owner) = node.owner {
                node.checked = tree.node(owner)?.is_selected();
            }
        }
        Ok(())
    }

    /// [`GraphicalTree::sync_checked`] followed by [`GraphicalTree::draw`].
    pub fn refresh(&mut self, tree: &EpochTree) -> Result<usize> {
        self.sync_checked(tree)?;
        Ok(self.draw())
    }

    /// Flip the checkbox of `key` through the selection controller. The new
    /// value reaches every descendant node and epoch.
    pub fn toggle_checkbox(&mut self, key: GraphicalKey, tree: &mut EpochTree) -> Result<bool> {
        self.check_generation(tree)?;
        let owner = self.get(key)?.owner.ok_or(TreeError::NoOwner(key.0))?;
        let value = tree.selection().toggle(owner)?;
        self.sync_checked(tree)?;
        Ok(value)
    }

    /// Graphical node representing tree node `node`, if it is mirrored.
    pub fn find_owner(&self, node: NodeId) -> Option<GraphicalKey> {
        if self.generation != Some(node.generation()) {
            return None;
        }
        self.by_owner.get(node.index()).copied().flatten()
    }

    /// Widget currently showing tree node `node`, if it is on screen.
    pub fn widget_for_node(&self, node: NodeId) -> Option<WidgetKey> {
        self.find_owner(node)
            .and_then(|key| self.binder.widget_for(key))
    }

    /// Route a widget-level input to its graphical node, redrawing when the
    /// layout or checkbox state changed.
    pub fn handle_event(&mut self, event: WidgetEvent, tree: &mut EpochTree) -> Result<EventOutcome> {
        let Some(key) = self.binder.node_for(event.widget) else {
            return Ok(EventOutcome::Ignored);
        };
        let outcome = match event.input {
            WidgetInput::Click { extend } => {
                self.select_key(key, extend);
                EventOutcome::Selected(key)
            }
            WidgetInput::ToggleExpand => {
                let expanded = !self.get(key)?.expanded;
                if expanded {
                    self.materialize(key, tree)?;
                }
                self.set_expanded(key, expanded)?;
                self.draw();
                EventOutcome::Expanded(key, expanded)
            }
            WidgetInput::ToggleCheck => {
                let checked = self.toggle_checkbox(key, tree)?;
                self.draw();
                EventOutcome::Checked(key, checked)
            }
        };
        Ok(outcome)
    }
}
