//! Orchestration of the publish workflow

pub mod publisher;

pub use publisher::{
    POLL_DESCRIPTION, PackageDescriptor, PublishOrchestrator, PublishReport, QueueLocation,
    READY_STATUS, UploadedFileHandle,
};
