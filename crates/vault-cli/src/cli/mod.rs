pub mod config;
pub mod protocol;
pub mod vault;

pub use config::CliConfig;
pub use protocol::{CliCommand, RuleCommand};
pub use vault::Vault;
