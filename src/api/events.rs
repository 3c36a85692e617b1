//! Server-sent events on `/progress/{job_id}`
//!
//! [`SseDecoder`] turns raw body chunks into `data` payloads following the
//! `text/event-stream` framing. [`EventSubscription`] owns the open response and
//! yields decoded [`ProgressEvent`]s in delivery order.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};

use crate::domain::JobId;

use super::models::ProgressEvent;
use super::ApiError;

/// Incremental `text/event-stream` parser. Only the `data` field matters here;
/// `event`, `id` and `retry` are accepted and ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: String,
    has_data: bool,
    ready: VecDeque<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.line);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                self.process_line(&String::from_utf8_lossy(&line));
            } else {
                self.line.push(byte);
            }
        }
    }

    /// Next complete `data` payload, if one has been dispatched
    pub fn next_payload(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            if self.has_data {
                self.ready.push_back(std::mem::take(&mut self.data));
                self.has_data = false;
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(value);
            self.has_data = true;
        }
    }
}

/// Why a subscription stopped yielding events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The payload was not a valid progress event
    Malformed(String),
    /// The connection failed mid-stream
    Transport(String),
}

/// An open event stream for one job. Dropping it closes the connection;
/// [`EventSubscription::close`] does the same and logs it.
pub struct EventSubscription {
    job_id: JobId,
    body: BoxStream<'static, Result<Bytes, ApiError>>,
    decoder: SseDecoder,
}

impl EventSubscription {
    pub fn new(job_id: JobId, body: BoxStream<'static, Result<Bytes, ApiError>>) -> Self {
        Self {
            job_id,
            body,
            decoder: SseDecoder::new(),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Wait for the next event. `None` means the server closed the stream.
    pub async fn next_event(&mut self) -> Option<Result<ProgressEvent, SubscriptionError>> {
        loop {
            if let Some(payload) = self.decoder.next_payload() {
                return Some(ProgressEvent::from_json(&payload).map_err(|e| {
                    tracing::debug!(
                        job_id = %self.job_id,
                        payload = %payload,
                        "Malformed progress event"
                    );
                    SubscriptionError::Malformed(e.to_string())
                }));
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.decoder.feed(&chunk),
                Some(Err(e)) => return Some(Err(SubscriptionError::Transport(e.to_string()))),
                None => return None,
            }
        }
    }

    pub fn close(self) {
        tracing::debug!(job_id = %self.job_id, "Progress subscription closed");
    }
}
