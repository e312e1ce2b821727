//! Configuration synchronization and change notification
//!
//! - [`diff`] computes puts/deletes between two snapshots
//! - [`Configurator`] owns the watch loop and the sync operation for one namespace
//! - [`ConfigSource`] / [`FileSource`] load the local side of a sync
//! - [`ChangeEvent`] / [`EventDispatcher`] carry changes to listeners

mod configurator;
mod diff;
mod event;
mod source;
mod watcher;

pub use configurator::*;
pub use diff::*;
pub use event::*;
pub use source::*;
