pub mod config;
pub mod config_loader;
pub mod error;
pub mod retry;

pub use config::*;
pub use config_loader::*;
pub use error::*;
pub use retry::*;
