pub mod filter_rule;
pub mod ignored_app;
pub mod list_item;
pub mod notification;
pub mod tab;

pub use filter_rule::FilterRule;
pub use ignored_app::IgnoredApp;
pub use list_item::{ListItem, TimeOfDay};
pub use notification::{CapturedNotification, NewNotification};
pub use tab::{Scope, Tab};
