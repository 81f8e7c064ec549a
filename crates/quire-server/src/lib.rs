//! Live rebuilds and snapshot serving for quire docs.
//!
//! A [`Monitor`] debounces filesystem changes from a [`WatchSet`], rebuilds
//! into memory and publishes the result through a [`SnapshotHandle`]. The
//! router reads whatever snapshot is current.

pub mod monitor;
pub mod server;
pub mod snapshot;
pub mod watcher;

pub use monitor::{Monitor, MonitorMachine, MonitorState, Rebuild, DEFAULT_QUIET_WINDOW};
pub use server::{router, serve, ServeConfig, ServerError};
pub use snapshot::SnapshotHandle;
pub use watcher::{WatchEvent, WatchKind, WatchSet};
