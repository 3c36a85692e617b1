use std::path::PathBuf;

use futures::{
    channel::mpsc,
    future,
    stream::{self, BoxStream},
    FutureExt, StreamExt,
};
use tokio::io::AsyncWriteExt;

use crate::{
    api::{ApiClient, VideoInfo},
    config::{AppConfig, ConfigError, QualityConfig},
    domain::{AppError, ArtifactLocator, DownloadRequest, JobError},
};

use super::{ChannelReporter, EligibilityGate, JobClient, JobEvent};

#[derive(Debug, Clone)]
pub enum SaveEvent {
    Progress(f32),
    Completed(PathBuf),
    Failed(AppError),
}

/// Everything the window needs: the gate, the job client, and saving the artifact
#[derive(Clone)]
pub struct DownloadCoordinator {
    api_client: ApiClient,
    gate: EligibilityGate,
    jobs: JobClient,
    qualities: QualityConfig,
}

impl DownloadCoordinator {
    pub fn new(api_client: ApiClient, gate: EligibilityGate, qualities: QualityConfig) -> Self {
        Self {
            jobs: JobClient::new(api_client.clone()),
            api_client,
            gate,
            qualities,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let api_client = ApiClient::new(config.server.base_url()?);
        let gate = EligibilityGate::new(
            api_client.clone(),
            config.sources.supported_domains.clone(),
            config.server.probe_timeout(),
        );

        Ok(Self::new(api_client, gate, config.quality.clone()))
    }

    pub fn gate(&self) -> &EligibilityGate {
        &self.gate
    }

    pub fn qualities(&self) -> &QualityConfig {
        &self.qualities
    }

    pub async fn check_server(&self) -> Result<(), JobError> {
        self.gate.ensure_reachable().await
    }

    pub fn prepare_request(&self, url: &str, quality: &str) -> Result<DownloadRequest, JobError> {
        DownloadRequest::new(url, quality, self.gate.supported_domains(), &self.qualities)
    }

    pub async fn preview(&self, url: String) -> Result<VideoInfo, AppError> {
        let info = self
            .api_client
            .video_info(url.trim())
            .await
            .map_err(|e| AppError::Api(e.to_string()))?;

        tracing::debug!(title = %info.title, thumbnail = ?info.thumbnail, "Preview received");
        Ok(info)
    }

    /// Run a job and expose its reporter calls as a stream. The last item is
    /// always [`JobEvent::Finished`].
    pub fn job_events(&self, request: DownloadRequest) -> BoxStream<'static, JobEvent> {
        let (tx, rx) = mpsc::unbounded();
        let jobs = self.jobs.clone();

        let driver = async move {
            let mut reporter = ChannelReporter::new(tx);
            let outcome = jobs.run_job(request, &mut reporter).await;
            reporter.finish(outcome);
        };

        // The driver yields nothing itself; it only has to be polled alongside the channel
        stream::select(rx.map(Some), driver.into_stream().map(|()| None))
            .filter_map(future::ready)
            .boxed()
    }

    pub fn is_busy(&self) -> bool {
        self.jobs.is_busy()
    }

    pub fn cancel(&self) -> bool {
        self.jobs.cancel()
    }

    pub async fn choose_save_path(&self, suggested_filename: String) -> Option<PathBuf> {
        rfd::AsyncFileDialog::new()
            .set_file_name(&suggested_filename)
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    /// Stream the finished artifact into `path`.
    ///
    /// Bytes go to a `.part` file next to `path`, which is renamed into place only
    /// once the whole body is on disk. A failed save leaves nothing behind.
    pub fn save_artifact(
        &self,
        locator: ArtifactLocator,
        path: PathBuf,
    ) -> BoxStream<'static, SaveEvent> {
        stream::unfold(
            SaveState::Requesting {
                client: self.api_client.clone(),
                locator,
                path,
            },
            |state| async move {
                match state {
                    SaveState::Requesting {
                        client,
                        locator,
                        path,
                    } => {
                        let (total, body) = match client.download_file_stream(&locator).await {
                            Ok((total, body)) => (total, body.boxed()),
                            Err(e) => return Some(fail(AppError::Api(e.to_string()))),
                        };

                        let target = PartialFile::new(path);
                        let file = match tokio::fs::File::create(&target.partial).await {
                            Ok(file) => file,
                            Err(e) => {
                                return Some(fail(AppError::Io(format!(
                                    "Failed to create file: {}",
                                    e
                                ))));
                            }
                        };

                        tracing::info!(
                            artifact = %locator,
                            path = %target.path.display(),
                            size = ?total,
                            "Saving artifact"
                        );

                        Some((
                            SaveEvent::Progress(0.0),
                            SaveState::Writing {
                                file,
                                body,
                                written: 0,
                                total,
                                target,
                            },
                        ))
                    }
                    SaveState::Writing {
                        mut file,
                        mut body,
                        written,
                        total,
                        target,
                    } => match body.next().await {
                        Some(Ok(chunk)) => {
                            if let Err(e) = file.write_all(&chunk).await {
                                drop(file);
                                target.discard().await;
                                return Some(fail(AppError::Io(format!("Write error: {}", e))));
                            }

                            let written = written + chunk.len() as u64;
                            let fraction = total
                                .filter(|&size| size > 0)
                                .map_or(0.0, |size| written as f32 / size as f32);

                            Some((
                                SaveEvent::Progress(fraction),
                                SaveState::Writing {
                                    file,
                                    body,
                                    written,
                                    total,
                                    target,
                                },
                            ))
                        }
                        Some(Err(e)) => {
                            drop(file);
                            target.discard().await;
                            Some(fail(AppError::Api(e.to_string())))
                        }
                        None => {
                            let synced = file.sync_all().await;
                            drop(file);

                            match synced {
                                Ok(()) => match target.commit().await {
                                    Ok(path) => {
                                        tracing::info!(
                                            path = %path.display(),
                                            bytes = written,
                                            "Artifact saved"
                                        );
                                        Some((SaveEvent::Completed(path), SaveState::Finished))
                                    }
                                    Err(e) => Some(fail(e)),
                                },
                                Err(e) => {
                                    target.discard().await;
                                    Some(fail(AppError::Io(format!(
                                        "Failed to sync file: {}",
                                        e
                                    ))))
                                }
                            }
                        }
                    },
                    SaveState::Finished => None,
                }
            },
        )
        .boxed()
    }
}

fn fail(error: AppError) -> (SaveEvent, SaveState) {
    tracing::warn!(error = %error, "Saving artifact failed");
    (SaveEvent::Failed(error), SaveState::Finished)
}

enum SaveState {
    Requesting {
        client: ApiClient,
        locator: ArtifactLocator,
        path: PathBuf,
    },
    Writing {
        file: tokio::fs::File,
        body: BoxStream<'static, crate::api::Result<bytes::Bytes>>,
        written: u64,
        total: Option<u64>,
        target: PartialFile,
    },
    Finished,
}

/// The chosen destination and the `.part` file being written in its place
struct PartialFile {
    path: PathBuf,
    partial: PathBuf,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        let mut name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "download".into());
        name.push(".part");

        Self {
            partial: path.with_file_name(name),
            path,
        }
    }

    async fn commit(self) -> Result<PathBuf, AppError> {
        match tokio::fs::rename(&self.partial, &self.path).await {
            Ok(()) => Ok(self.path),
            Err(e) => {
                self.discard().await;
                Err(AppError::Io(format!("Failed to move file into place: {}", e)))
            }
        }
    }

    async fn discard(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.partial).await {
            tracing::warn!(
                path = %self.partial.display(),
                error = %e,
                "Could not remove partial file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobId;
    use mockito::{Server, ServerGuard};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use url::Url;

    fn coordinator_for(server: &ServerGuard) -> DownloadCoordinator {
        let mut config = AppConfig::default();
        config.server.base_url = server.url();
        config.server.probe_timeout_ms = 500;
        DownloadCoordinator::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_job_events_end_with_outcome() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/download")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"job_id":"abc"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/progress/abc")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "data: {\"status\":\"downloading\",\"progress\":40,\"message\":\"downloading\"}\n\n\
                 data: {\"status\":\"done\"}\n\n",
            )
            .create_async()
            .await;

        let coordinator = coordinator_for(&server);
        let request = coordinator
            .prepare_request("https://youtu.be/dQw4w9WgXcQ", "audio")
            .unwrap();
        let events: Vec<JobEvent> = coordinator.job_events(request).collect().await;

        let locator = ApiClient::new(Url::parse(&server.url()).unwrap())
            .artifact_locator(&JobId::new("abc"))
            .unwrap();
        assert_eq!(
            events,
            vec![
                JobEvent::Busy,
                JobEvent::Progress {
                    percent: 0,
                    message: "starting".to_string()
                },
                JobEvent::Progress {
                    percent: 40,
                    message: "downloading".to_string()
                },
                JobEvent::Progress {
                    percent: 100,
                    message: "complete".to_string()
                },
                JobEvent::Idle,
                JobEvent::Finished(Ok(locator)),
            ]
        );
        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn test_unreachable_server_never_submits() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/openapi.json")
            .with_status(500)
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/download")
            .expect(0)
            .create_async()
            .await;

        let coordinator = coordinator_for(&server);
        assert_eq!(coordinator.check_server().await, Err(JobError::Unreachable));
        submit.assert_async().await;
    }

    #[test]
    fn test_prepare_request_rejects_unsupported_page() {
        let config = AppConfig::default();
        let coordinator = DownloadCoordinator::from_config(&config).unwrap();

        assert!(matches!(
            coordinator.prepare_request("https://vimeo.com/1", "best"),
            Err(JobError::UnsupportedResource(_))
        ));
        assert!(coordinator
            .prepare_request("https://old.reddit.com/r/videos/1", "best")
            .is_ok());
    }

    #[tokio::test]
    async fn test_save_artifact_writes_file() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/file/abc")
            .with_status(200)
            .with_header("content-type", "audio/mpeg")
            .with_body(b"ID3 fake mp3 payload".to_vec())
            .create_async()
            .await;

        let coordinator = coordinator_for(&server);
        let locator = coordinator
            .api_client
            .artifact_locator(&JobId::new("abc"))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp3");

        let events: Vec<SaveEvent> = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.save_artifact(locator, path.clone()).collect(),
        )
        .await
        .unwrap();

        assert!(matches!(events.first(), Some(SaveEvent::Progress(p)) if *p == 0.0));
        assert!(matches!(events.last(), Some(SaveEvent::Completed(p)) if *p == path));
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3 fake mp3 payload");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_save_artifact_reports_missing_file() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/file/gone")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":"file no longer available"}"#)
            .create_async()
            .await;

        let coordinator = coordinator_for(&server);
        let locator = coordinator
            .api_client
            .artifact_locator(&JobId::new("gone"))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");

        let events: Vec<SaveEvent> = coordinator
            .save_artifact(locator, path.clone())
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            SaveEvent::Failed(AppError::Api(msg)) if msg == "file no longer available"
        ));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_truncated_artifact_leaves_no_file() {
        // Promises 1000 bytes, sends 10, then hangs up
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\n\r\n0123456789")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let mut config = AppConfig::default();
        config.server.base_url = format!("http://{addr}");
        let coordinator = DownloadCoordinator::from_config(&config).unwrap();
        let locator = coordinator
            .api_client
            .artifact_locator(&JobId::new("abc"))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.mp4");

        let events: Vec<SaveEvent> = tokio::time::timeout(
            Duration::from_secs(5),
            coordinator.save_artifact(locator, path.clone()).collect(),
        )
        .await
        .unwrap();

        assert!(matches!(events.last(), Some(SaveEvent::Failed(AppError::Api(_)))));
        assert!(!events.iter().any(|e| matches!(e, SaveEvent::Completed(_))));
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
