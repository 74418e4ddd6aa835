pub mod config;
pub mod control;
pub mod criteria;
pub mod custom;
pub mod error;
pub mod io;
pub mod record;
pub mod render;
pub mod selection;
pub mod signal;
pub mod synth;
pub mod tree;

pub use criteria::*;
pub use custom::*;
pub use error::*;
pub use record::*;
pub use signal::*;
pub use tree::*;
