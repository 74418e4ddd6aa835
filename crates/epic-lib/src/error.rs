use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("child index {index} out of range ({len} children)")]
    ChildOutOfRange { index: usize, len: usize },
    #[error("cannot walk {requested} ancestors from depth {depth}")]
    ParentOutOfRange { requested: usize, depth: usize },
    #[error("node handle from generation {handle} used on tree generation {current}")]
    StaleNode { handle: u64, current: u64 },
    #[error("graphical tree mirrors generation {view} but tree is at generation {tree}")]
    StaleView { view: u64, tree: u64 },
    #[error("unknown node index {0}")]
    UnknownNode(usize),
    #[error("unknown epoch {0}")]
    UnknownEpoch(usize),
    #[error("unknown graphical node {0}")]
    UnknownGraphicalNode(usize),
    #[error("graphical node {0} does not represent a tree node")]
    NoOwner(usize),
    #[error("widget slot {index} out of range (pool of {capacity})")]
    WidgetOutOfRange { index: usize, capacity: usize },
    #[error("criterion `{criterion}` did not resolve for epoch {epoch}")]
    UnresolvedCriterion { criterion: String, epoch: usize },
    #[error("epoch {epoch} has no `{stream}` response")]
    MissingStream { epoch: usize, stream: String },
    #[error("sample rate mismatch: {expected} Hz vs {found} Hz")]
    SampleRateMismatch { expected: f64, found: f64 },
}

pub type Result<T> = std::result::Result<T, TreeError>;
