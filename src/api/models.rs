use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /download`
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest<'a> {
    pub url: &'a str,
    pub quality: &'a str,
}

/// Response from `POST /download`
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Body of `POST /info`
#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest<'a> {
    pub url: &'a str,
}

/// Metadata returned by `POST /info`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: String,
    pub thumbnail: Option<String>,
    /// Length in seconds
    pub duration: Option<f64>,
    pub uploader: Option<String>,
}

/// Structured error body, e.g. `{"detail": "unsupported quality"}`.
/// Validation failures carry a list instead of a string.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: Option<Value>,
}

impl ErrorBody {
    pub fn detail_message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::String(_) | Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// One message pushed on `/progress/{job_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Progress { percent: u8, message: String },
    Done,
    Error { detail: Option<String> },
}

impl ProgressEvent {
    /// Decode the JSON payload of one event.
    ///
    /// Any status other than `done` and `error` is a progress update; the server
    /// reports `pending`, `downloading` and `merging` that way. A payload without a
    /// status but with an `error` field is an error event.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        let raw: RawProgressEvent = serde_json::from_str(payload)?;

        let event = match raw.status.as_deref() {
            Some("done") => ProgressEvent::Done,
            Some("error") => ProgressEvent::Error {
                detail: non_blank(raw.error),
            },
            None if raw.error.is_some() => ProgressEvent::Error {
                detail: non_blank(raw.error),
            },
            None => {
                return Err(serde::de::Error::missing_field("status"));
            }
            Some(_) => ProgressEvent::Progress {
                percent: raw.progress.unwrap_or(0.0).clamp(0.0, 100.0) as u8,
                message: raw.message.unwrap_or_default(),
            },
        };

        Ok(event)
    }
}

fn non_blank(detail: Option<String>) -> Option<String> {
    detail.filter(|d| !d.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct RawProgressEvent {
    status: Option<String>,
    progress: Option<f64>,
    message: Option<String>,
    error: Option<String>,
}
