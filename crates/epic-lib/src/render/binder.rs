use super::pool::WidgetKey;
use super::GraphicalKey;
use std::collections::HashMap;

/// Two-way map between graphical nodes and the widgets showing them.
///
/// Rebuilt on every draw pass, so a node that scrolled or collapsed out
/// of view has no entry rather than a stale one.
#[derive(Debug, Clone, Default)]
pub struct WidgetBinder {
    by_node: HashMap<GraphicalKey, WidgetKey>,
    by_widget: Vec<Option<GraphicalKey>>,
}

impl WidgetBinder {
    pub fn new(pool_size: usize) -> Self {
        Self {
            by_node: HashMap::with_capacity(pool_size),
            by_widget: vec![None; pool_size],
        }
    }

    pub(crate) fn bind(&mut self, widget: WidgetKey, node: GraphicalKey) {
        if let Some(previous) = self.by_widget[widget.0].replace(node) {
            self.by_node.remove(&previous);
        }
        self.by_node.insert(node, widget);
    }

    pub(crate) fn clear(&mut self) {
        self.by_node.clear();
        self.by_widget.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn widget_for(&self, node: GraphicalKey) -> Option<WidgetKey> {
        self.by_node.get(&node).copied()
    }

    pub fn node_for(&self, widget: WidgetKey) -> Option<GraphicalKey> {
        self.by_widget.get(widget.0).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}
