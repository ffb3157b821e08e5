pub mod capture;
pub mod config;
pub mod constants;
pub mod feed;
pub mod filter;
pub mod grouping;
pub mod models;
pub mod search;
pub mod store;
pub mod tracing_setup;

pub use capture::{
    AppResolver, CaptureHandle, CaptureWorker, ListenerEvent, NotificationListener, PostedEvent,
    RemovalReason, StaticResolver,
};
pub use config::CoreConfig;
pub use feed::{FeedHandle, FeedPipeline, FeedSnapshot};
pub use store::{Database, NotificationStore};
