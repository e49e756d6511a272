pub mod config;
pub mod error;
pub mod shutdown;
pub mod types;

pub use config::Config;
pub use error::{LaunchpadError, Result};
pub use shutdown::Shutdown;
pub use types::*;
