pub mod error;
pub mod model;

pub use error::{AppError, JobError};
pub use model::{ArtifactLocator, DownloadPhase, DownloadRequest, Job, JobId, JobState};
