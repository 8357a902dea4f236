pub mod core;
pub mod orchestration;
pub mod transport;

pub use self::core::*;
pub use orchestration::{PackageDescriptor, PublishOrchestrator, PublishReport};
pub use transport::{RepositoryDestination, TransportExecutor, TransportOptions};
