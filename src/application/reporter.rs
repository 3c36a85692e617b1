use futures::channel::mpsc::UnboundedSender;

use crate::domain::{ArtifactLocator, JobError};

/// Receives state changes from a running job. Calls happen inline with event
/// handling, so implementations must return quickly.
pub trait Reporter {
    fn on_progress(&mut self, percent: u8, message: &str);
    fn on_error(&mut self, message: &str);
    fn on_busy(&mut self);
    fn on_idle(&mut self);
}

/// Reporter calls plus the final outcome, as plain values for a UI event loop
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Busy,
    Progress { percent: u8, message: String },
    Error(String),
    Idle,
    Finished(Result<ArtifactLocator, JobError>),
}

/// Forwards reporter calls into a channel
pub struct ChannelReporter {
    tx: UnboundedSender<JobEvent>,
}

impl ChannelReporter {
    pub fn new(tx: UnboundedSender<JobEvent>) -> Self {
        Self { tx }
    }

    pub fn finish(self, outcome: Result<ArtifactLocator, JobError>) {
        self.send(JobEvent::Finished(outcome));
    }

    fn send(&self, event: JobEvent) {
        // Receiver gone means the window stopped listening
        let _ = self.tx.unbounded_send(event);
    }
}

impl Reporter for ChannelReporter {
    fn on_progress(&mut self, percent: u8, message: &str) {
        self.send(JobEvent::Progress {
            percent,
            message: message.to_string(),
        });
    }

    fn on_error(&mut self, message: &str) {
        self.send(JobEvent::Error(message.to_string()));
    }

    fn on_busy(&mut self) {
        self.send(JobEvent::Busy);
    }

    fn on_idle(&mut self) {
        self.send(JobEvent::Idle);
    }
}
