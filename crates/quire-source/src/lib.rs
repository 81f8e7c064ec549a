//! Layered source tree for quire documentation builds.
//!
//! A build reads every input through a [`SourceTree`]: an ordered list of
//! layers where the user's own directory shadows the bundled default theme.
//! Placing a same-named file in the user directory overrides the bundled one.

pub mod bundled;
pub mod layer;
pub mod path;
pub mod tree;

pub use bundled::BundledLayer;
pub use layer::{DirLayer, Entry, Layer, Stat};
pub use path::normalize;
pub use tree::{SourceError, SourceTree};
