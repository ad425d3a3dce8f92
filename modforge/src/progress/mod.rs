//! Live progress channel: pushes step, log and lock updates to observers.

mod channel;

pub use channel::{
    BroadcastProgress, CollectingProgress, NoOpProgress, ProgressChannel, ProgressEvent,
};
