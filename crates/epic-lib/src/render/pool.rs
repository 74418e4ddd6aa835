use super::GraphicalKey;

pub const DEFAULT_POOL_SIZE: usize = 128;

/// Identity of a pool slot; stable for the life of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetKey(pub(crate) usize);

impl WidgetKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A reusable row renderer. Hidden widgets keep their slot but show nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    self_key: WidgetKey,
    bound: Option<GraphicalKey>,
    row: usize,
    checked: bool,
}

impl Widget {
    fn new(slot: usize) -> Self {
        Self {
            self_key: WidgetKey(slot),
            bound: None,
            row: 0,
            checked: false,
        }
    }

    pub fn self_key(&self) -> WidgetKey {
        self.self_key
    }

    pub fn bound_node_key(&self) -> Option<GraphicalKey> {
        self.bound
    }

    pub fn is_visible(&self) -> bool {
        self.bound.is_some()
    }

    /// Row in the draw order this widget shows.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    fn hide(&mut self) {
        self.bound = None;
        self.checked = false;
    }
}

/// Fixed-size widget pool with an index free list.
///
/// Claiming and releasing only move slot indices; nothing is allocated
/// after construction.
#[derive(Debug, Clone)]
pub struct WidgetPool {
    widgets: Vec<Widget>,
    free: Vec<usize>,
}

impl WidgetPool {
    pub fn new(size: usize) -> Self {
        Self {
            widgets: (0..size).map(Widget::new).collect(),
            free: (0..size).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.widgets.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn get(&self, key: WidgetKey) -> Option<&Widget> {
        self.widgets.get(key.0)
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn visible(&self) -> impl Iterator<Item = &Widget> {
        self.widgets.iter().filter(|w| w.is_visible())
    }

    /// Take the lowest free slot and show `node` in it.
    pub(crate) fn claim(&mut self, node: GraphicalKey, row: usize, checked: bool) -> Option<WidgetKey> {
        let slot = self.free.pop()?;
        let widget = &mut self.widgets[slot];
        widget.bound = Some(node);
        widget.row = row;
        widget.checked = checked;
        Some(widget.self_key)
    }

    /// Hide every widget and return all slots to the free list.
    pub(crate) fn release_all(&mut self) {
        for widget in &mut self.widgets {
            widget.hide();
        }
        self.free.clear();
        self.free.extend((0..self.widgets.len()).rev());
    }
}

impl Default for WidgetPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
