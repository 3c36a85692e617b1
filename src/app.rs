use crate::api::VideoInfo;
use crate::application::{DownloadCoordinator, JobEvent, SaveEvent};
use crate::domain::{ArtifactLocator, DownloadPhase, JobError};
use crate::ui::{DownloadMessage, DownloadView};
use crate::utils::{format_duration, suggested_filename};
use futures::StreamExt;
use iced::Task;
use std::path::PathBuf;

pub struct DownloadApp {
    view: DownloadView,
    coordinator: DownloadCoordinator,
    /// Title from the last preview, used to name the saved file
    preview_title: Option<String>,
    /// Quality of the job being run, used to pick the file extension
    job_quality: Option<String>,
}

impl DownloadApp {
    pub fn new(coordinator: DownloadCoordinator) -> (Self, Task<Message>) {
        let qualities = coordinator.qualities();
        let view = DownloadView::new(
            qualities.options.clone(),
            qualities.default_option().cloned(),
        );

        let app = Self {
            view,
            coordinator: coordinator.clone(),
            preview_title: None,
            job_quality: None,
        };

        // Nothing is enabled until the server answers the probe
        let probe = Task::perform(
            async move { coordinator.check_server().await },
            Message::ServerChecked,
        );

        (app, probe)
    }

    fn refresh_idle_status(&mut self) {
        if !self.view.server_online || self.view.is_downloading {
            return;
        }

        self.view.status_message = if self.view.url.trim().is_empty() {
            "Paste a link to a supported page".to_string()
        } else if self.view.url_supported {
            "Ready".to_string()
        } else {
            "Unsupported page (Reddit, YouTube, Twitter/X)".to_string()
        };
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    ServerChecked(Result<(), JobError>),
    PreviewReceived(Result<VideoInfo, String>),
    Job(JobEvent),
    /// (Selected path, artifact to fetch)
    SaveLocationSelected(Option<PathBuf>, ArtifactLocator),
    Save(SaveEvent),
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::UrlChanged(_) => {
                    app.view.url_supported = app.coordinator.gate().is_supported(&app.view.url);
                    app.preview_title = None;
                    app.refresh_idle_status();
                }
                DownloadMessage::QualitySelected(_) => {}
                DownloadMessage::PreviewPressed => {
                    let coordinator = app.coordinator.clone();
                    let url = app.view.url.clone();
                    app.view.status_message = "Fetching preview...".to_string();

                    return Task::perform(
                        async move { coordinator.preview(url).await.map_err(|e| e.to_string()) },
                        Message::PreviewReceived,
                    );
                }
                DownloadMessage::DownloadPressed => {
                    if !app.view.can_download() || app.coordinator.is_busy() {
                        return Task::none();
                    }

                    let Some(quality) = app.view.selected_quality.clone() else {
                        return Task::none();
                    };

                    match app.coordinator.prepare_request(&app.view.url, &quality.value) {
                        Ok(request) => {
                            app.job_quality = Some(quality.value);
                            return Task::stream(
                                app.coordinator.job_events(request).map(Message::Job),
                            );
                        }
                        Err(e) => {
                            app.view.status_message = format!("Error: {}", e);
                        }
                    }
                }
                DownloadMessage::CancelPressed => {
                    if app.coordinator.cancel() {
                        app.view.status_message = "Cancelling...".to_string();
                    }
                }
            }
        }
        Message::ServerChecked(result) => match result {
            Ok(()) => {
                app.view.server_online = true;
                app.view.phase = DownloadPhase::Idle;
                app.refresh_idle_status();
            }
            Err(e) => {
                app.view.server_online = false;
                app.view.phase = DownloadPhase::Offline;
                app.view.status_message = e.to_string();
            }
        },
        Message::PreviewReceived(result) => match result {
            Ok(info) => {
                let mut preview = info.title.clone();
                if let Some(uploader) = &info.uploader {
                    preview.push_str(&format!(" by {}", uploader));
                }
                if let Some(duration) = info.duration {
                    preview.push_str(&format!(" ({})", format_duration(duration)));
                }

                app.view.preview = Some(preview);
                app.preview_title = Some(info.title).filter(|t| !t.is_empty());
                app.refresh_idle_status();
            }
            Err(e) => {
                app.view.status_message = format!("Preview failed: {}", e);
            }
        },
        Message::Job(event) => match event {
            JobEvent::Busy => {
                app.view.is_downloading = true;
                app.view.phase = DownloadPhase::Running;
                app.view.set_progress(0, "Submitting...");
            }
            JobEvent::Progress { percent, message } => {
                app.view.set_progress(percent, &message);
            }
            JobEvent::Error(message) => {
                app.view.phase = DownloadPhase::Failed;
                app.view.progress = 0.0;
                app.view.status_message = format!("Error: {}", message);
            }
            JobEvent::Idle => {
                app.view.is_downloading = false;
            }
            JobEvent::Finished(Ok(locator)) => {
                app.view.phase = DownloadPhase::AwaitingSavePath;
                app.view.status_message = "Complete! Choose where to save the file...".to_string();

                let filename = suggested_filename(
                    app.preview_title.as_deref(),
                    app.job_quality.as_deref().unwrap_or_default(),
                );
                let coordinator = app.coordinator.clone();

                return Task::perform(
                    async move { coordinator.choose_save_path(filename).await },
                    move |path| Message::SaveLocationSelected(path, locator.clone()),
                );
            }
            // Already surfaced through JobEvent::Error
            JobEvent::Finished(Err(_)) => {}
        },
        Message::SaveLocationSelected(path, locator) => match path {
            Some(path) => {
                app.view.phase = DownloadPhase::Saving;
                app.view.status_message = format!("Saving to: {}", path.display());

                return Task::stream(
                    app.coordinator
                        .save_artifact(locator, path)
                        .map(Message::Save),
                );
            }
            None => {
                // User cancelled dialog
                app.view.phase = DownloadPhase::Idle;
                app.view.status_message = "Save cancelled".to_string();
            }
        },
        Message::Save(event) => match event {
            SaveEvent::Progress(progress) => {
                app.view.progress = (progress * 100.0).clamp(0.0, 100.0);
                app.view.status_message = format!("Saving: {:.1}%", progress * 100.0);
            }
            SaveEvent::Completed(path) => {
                app.view.phase = DownloadPhase::Completed;
                app.view.progress = 100.0;
                app.view.status_message = format!("Saved: {}", path.display());
            }
            SaveEvent::Failed(e) => {
                app.view.phase = DownloadPhase::Failed;
                app.view.progress = 0.0;
                app.view.status_message = format!("Save failed: {}", e);
            }
        },
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
