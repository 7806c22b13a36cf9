pub mod config;
pub mod error;
pub mod retry;
pub mod sentiment;
pub mod types;

pub use config::Config;
pub use error::{RepwatchError, Result};
pub use retry::retry_with_backoff;
pub use sentiment::*;
pub use types::*;
