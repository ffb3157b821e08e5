//! Reactive feed over the store.

pub mod combine;
pub mod pipeline;
pub mod selection;

pub use combine::{CombineLatest, FeedInputs, InputChange};
pub use pipeline::{
    compute_snapshot, FeedHandle, FeedPipeline, FeedSnapshot, FeedStopped, SnapshotReceiver,
};
pub use selection::Selection;
