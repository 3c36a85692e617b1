use std::fmt;

use url::Url;

use crate::application::is_supported_resource;
use crate::config::QualityConfig;

use super::JobError;

/// Opaque job token issued by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated download request. Fields are private so a request can only be
/// built through [`DownloadRequest::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    resource_url: String,
    quality: String,
}

impl DownloadRequest {
    pub fn new(
        resource_url: &str,
        quality: &str,
        supported_domains: &[String],
        qualities: &QualityConfig,
    ) -> Result<Self, JobError> {
        let resource_url = resource_url.trim();
        if !is_supported_resource(resource_url, supported_domains) {
            return Err(JobError::UnsupportedResource(resource_url.to_string()));
        }

        if qualities.find(quality).is_none() {
            return Err(JobError::UnknownQuality(quality.to_string()));
        }

        Ok(Self {
            resource_url: resource_url.to_string(),
            quality: quality.to_string(),
        })
    }

    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    pub fn quality(&self) -> &str {
        &self.quality
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    InProgress,
    Done,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// Client-side record of the one job a [`JobClient`](crate::application::JobClient) is driving
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub last_progress: u8,
    pub last_message: String,
    pub error_detail: Option<String>,
}

impl Job {
    pub fn submitted(id: JobId) -> Self {
        Self {
            id,
            state: JobState::Submitted,
            last_progress: 0,
            last_message: String::new(),
            error_detail: None,
        }
    }

    pub fn start(&mut self, message: &str) {
        self.state = JobState::InProgress;
        self.record_progress(0, message);
    }

    pub fn record_progress(&mut self, percent: u8, message: &str) {
        self.last_progress = percent.min(100);
        self.last_message = message.to_string();
    }

    pub fn complete(&mut self, message: &str) {
        debug_assert!(!self.state.is_terminal(), "job {} finished twice", self.id);
        self.state = JobState::Done;
        self.record_progress(100, message);
    }

    pub fn fail(&mut self, detail: &str) {
        debug_assert!(!self.state.is_terminal(), "job {} finished twice", self.id);
        self.state = JobState::Failed;
        self.error_detail = Some(detail.to_string());
    }
}

/// Where a finished artifact can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    pub job_id: JobId,
    pub url: Url,
}

impl fmt::Display for ArtifactLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

/// Phase of the desktop window, from the first probe to a saved file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    CheckingServer,
    Offline,
    Idle,
    Running,
    AwaitingSavePath,
    Saving,
    Completed,
    Failed,
}
