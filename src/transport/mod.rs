pub mod action;
pub mod destination;
pub mod executor;

pub use action::{Action, RegisterPackageBody, RegisterRequest};
pub use destination::{Credentials, RepositoryDestination};
pub use executor::{TransportExecutor, TransportOptions};
