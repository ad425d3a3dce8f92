//! File tree reconciliation between build output and the published
//! repository.

mod sync;

pub use sync::{copy_tree, remove_tree, FileSynchronizer, SyncOptions, SyncReport};
