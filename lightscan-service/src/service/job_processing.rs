//! Blueprint job lifecycle: upload, queueing, background processing, restore.
//!
//! - Upload validates and stores the document, registers the job and queues it
//! - Workers drain the bounded queue and run the pipeline off the async runtime
//! - Restore repopulates completed jobs from saved result files

mod processing;
mod restore;
mod upload;
mod workers;

pub use workers::QueuedJob;
