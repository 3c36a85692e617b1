//! Drives one download job from submission to a retrievable artifact.
//!
//! A run goes through three phases:
//! 1. submit the request and receive a job id
//! 2. listen on the job's event stream until a terminal event arrives
//! 3. derive the artifact location, only for jobs that reached `done`
//!
//! Every failure is terminal. Nothing is retried, since retrying would create a
//! second job on the server.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiError, EventSubscription, ProgressEvent, SubscriptionError};
use crate::domain::{ArtifactLocator, DownloadRequest, Job, JobError, JobState};

use super::Reporter;

pub const STARTING_MESSAGE: &str = "starting";
pub const COMPLETE_MESSAGE: &str = "complete";
const UNKNOWN_ERROR: &str = "unknown error";
const MALFORMED_EVENT: &str = "malformed progress event";

type ActiveSlot = Arc<Mutex<Option<CancellationToken>>>;

/// Lifecycle client for one job at a time. Clones share the active-job slot.
#[derive(Clone)]
pub struct JobClient {
    api: ApiClient,
    active: ActiveSlot,
}

impl JobClient {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.active).is_some()
    }

    /// Abort the active job, if any. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Submit `request`, follow its progress and return where the finished file
    /// can be fetched.
    ///
    /// Fails with [`JobError::Busy`] without touching the reporter when another
    /// job is active. Otherwise the reporter sees `on_busy` first and `on_idle`
    /// last, with `on_error` right before it when the run fails.
    pub async fn run_job(
        &self,
        request: DownloadRequest,
        reporter: &mut (dyn Reporter + Send),
    ) -> Result<ArtifactLocator, JobError> {
        let guard = self.begin()?;
        reporter.on_busy();

        let outcome = self.drive(&request, reporter, &guard.token).await;
        drop(guard);

        match &outcome {
            Ok(locator) => {
                tracing::info!(job_id = %locator.job_id, artifact = %locator, "Job finished");
            }
            Err(e) => {
                tracing::warn!(url = request.resource_url(), error = %e, "Job failed");
                reporter.on_error(&e.to_string());
            }
        }
        reporter.on_idle();

        outcome
    }

    fn begin(&self) -> Result<ActiveJobGuard, JobError> {
        let mut slot = lock(&self.active);
        if slot.is_some() {
            return Err(JobError::Busy);
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());

        Ok(ActiveJobGuard {
            slot: Arc::clone(&self.active),
            token,
        })
    }

    async fn drive(
        &self,
        request: &DownloadRequest,
        reporter: &mut (dyn Reporter + Send),
        cancel: &CancellationToken,
    ) -> Result<ArtifactLocator, JobError> {
        let mut job = self.submit(request, cancel).await?;
        job.start(STARTING_MESSAGE);
        reporter.on_progress(0, STARTING_MESSAGE);

        self.follow_progress(&mut job, reporter, cancel).await?;
        self.retrieve(&job)
    }

    /// Phase 1
    async fn submit(
        &self,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<Job, JobError> {
        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
            result = self.api.submit(request) => result,
        };

        let job_id = submitted.map_err(|e| JobError::SubmissionFailed(e.to_string()))?;
        tracing::info!(
            job_id = %job_id,
            url = request.resource_url(),
            quality = request.quality(),
            "Job submitted"
        );

        Ok(Job::submitted(job_id))
    }

    /// Phase 2
    async fn follow_progress(
        &self,
        job: &mut Job,
        reporter: &mut (dyn Reporter + Send),
        cancel: &CancellationToken,
    ) -> Result<(), JobError> {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(JobError::Cancelled),
            result = self.api.subscribe(&job.id) => result.map_err(|e| match e {
                ApiError::Rejected { status, detail } => {
                    tracing::warn!(
                        job_id = %job.id,
                        status,
                        detail = %detail,
                        "Progress stream refused"
                    );
                    JobError::RemoteError(detail)
                }
                other => {
                    tracing::warn!(
                        job_id = %job.id,
                        error = %other,
                        "Could not open progress stream"
                    );
                    JobError::ConnectionLost
                }
            }),
        };

        match opened {
            Ok(subscription) => listen(job, subscription, reporter, cancel).await,
            Err(e) => {
                job.fail(&e.to_string());
                Err(e)
            }
        }
    }

    /// Phase 3
    fn retrieve(&self, job: &Job) -> Result<ArtifactLocator, JobError> {
        debug_assert_eq!(job.state, JobState::Done);
        self.api
            .artifact_locator(&job.id)
            .map_err(|e| JobError::RemoteError(e.to_string()))
    }
}

/// Consume events until the first terminal one, then close the subscription.
///
/// `progress` keeps listening, `done` succeeds, `error` and malformed payloads
/// fail with [`JobError::RemoteError`], and a stream that ends or breaks before
/// any terminal event fails with [`JobError::ConnectionLost`].
pub(crate) async fn listen(
    job: &mut Job,
    mut subscription: EventSubscription,
    reporter: &mut (dyn Reporter + Send),
    cancel: &CancellationToken,
) -> Result<(), JobError> {
    tracing::debug!(job_id = %subscription.job_id(), "Listening for progress");

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Err(JobError::Cancelled),
            next = subscription.next_event() => next,
        };

        match next {
            Some(Ok(ProgressEvent::Progress { percent, message })) => {
                tracing::trace!(job_id = %job.id, percent, message = %message, "Progress");
                job.record_progress(percent, &message);
                reporter.on_progress(percent, &message);
            }
            Some(Ok(ProgressEvent::Done)) => {
                job.complete(COMPLETE_MESSAGE);
                reporter.on_progress(100, COMPLETE_MESSAGE);
                break Ok(());
            }
            Some(Ok(ProgressEvent::Error { detail })) => {
                break Err(JobError::RemoteError(
                    detail.unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
                ));
            }
            Some(Err(SubscriptionError::Malformed(e))) => {
                tracing::debug!(job_id = %job.id, error = %e, "Undecodable progress event");
                break Err(JobError::RemoteError(MALFORMED_EVENT.to_string()));
            }
            Some(Err(SubscriptionError::Transport(e))) => {
                tracing::debug!(job_id = %job.id, error = %e, "Progress stream broke");
                break Err(JobError::ConnectionLost);
            }
            None => break Err(JobError::ConnectionLost),
        }
    };

    subscription.close();

    if let Err(e) = &outcome {
        job.fail(&e.to_string());
    }
    tracing::debug!(
        job_id = %job.id,
        state = ?job.state,
        progress = job.last_progress,
        message = %job.last_message,
        error = ?job.error_detail,
        "Progress stream finished"
    );
    outcome
}

fn lock(slot: &Mutex<Option<CancellationToken>>) -> MutexGuard<'_, Option<CancellationToken>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the active-job slot on drop, including when the run future is dropped
/// mid-phase.
struct ActiveJobGuard {
    slot: ActiveSlot,
    token: CancellationToken,
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        lock(&self.slot).take();
    }
}
