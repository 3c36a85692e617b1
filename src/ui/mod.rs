pub mod icon;

use iced::{
    widget::{button, column, pick_list, progress_bar, row, text, text_input, Space},
    Element, Length,
};

use crate::config::QualityOption;
use crate::domain::DownloadPhase;

/// Main view state
pub struct DownloadView {
    pub url: String,
    pub qualities: Vec<QualityOption>,
    pub selected_quality: Option<QualityOption>,
    pub status_message: String,
    pub preview: Option<String>,
    /// 0.0 to 100.0
    pub progress: f32,
    pub phase: DownloadPhase,
    pub server_online: bool,
    pub url_supported: bool,
    /// Toggled by the job reporter
    pub is_downloading: bool,
}

impl DownloadView {
    pub fn new(qualities: Vec<QualityOption>, selected_quality: Option<QualityOption>) -> Self {
        Self {
            url: String::new(),
            qualities,
            selected_quality,
            status_message: "Checking server...".to_string(),
            preview: None,
            progress: 0.0,
            phase: DownloadPhase::CheckingServer,
            server_online: false,
            url_supported: false,
            is_downloading: false,
        }
    }

    pub fn can_download(&self) -> bool {
        self.server_online
            && self.url_supported
            && self.selected_quality.is_some()
            && !self.is_downloading
            && !matches!(
                self.phase,
                DownloadPhase::AwaitingSavePath | DownloadPhase::Saving
            )
    }

    pub fn set_progress(&mut self, percent: u8, message: &str) {
        self.progress = f32::from(percent.min(100));
        self.status_message = message.to_string();
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    QualitySelected(QualityOption),
    PreviewPressed,
    DownloadPressed,
    CancelPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.url = url;
                self.preview = None;
            }
            DownloadMessage::QualitySelected(quality) => {
                self.selected_quality = Some(quality);
            }
            DownloadMessage::PreviewPressed
            | DownloadMessage::DownloadPressed
            | DownloadMessage::CancelPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let can_preview = self.server_online && self.url_supported;

        let preview: Element<'_, DownloadMessage> = match &self.preview {
            Some(preview) => text(preview).size(14).into(),
            None => Space::new().height(Length::Fixed(0.0)).into(),
        };

        column![
            text("RedditLink").size(32),
            Space::new().height(Length::Fixed(10.0)),
            text("Page URL (Reddit, YouTube, Twitter/X):").size(16),
            text_input("Paste a link...", &self.url)
                .on_input(DownloadMessage::UrlChanged)
                .padding(10),
            row![
                pick_list(
                    self.qualities.as_slice(),
                    self.selected_quality.clone(),
                    DownloadMessage::QualitySelected,
                ),
                button("Preview")
                    .on_press_maybe(can_preview.then_some(DownloadMessage::PreviewPressed))
                    .padding([8, 16]),
            ]
            .spacing(10),
            preview,
            progress_bar(0.0..=100.0, self.progress),
            text(&self.status_message).size(14),
            Space::new().height(Length::Fixed(10.0)),
            row![
                button("Download")
                    .on_press_maybe(self.can_download().then_some(DownloadMessage::DownloadPressed))
                    .padding([10, 20]),
                button("Cancel")
                    .on_press_maybe(self.is_downloading.then_some(DownloadMessage::CancelPressed))
                    .padding([10, 20]),
            ]
            .spacing(10),
        ]
        .padding(20)
        .spacing(10)
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityConfig;

    fn view() -> DownloadView {
        let qualities = QualityConfig::default();
        DownloadView::new(qualities.options.clone(), qualities.default_option().cloned())
    }

    #[test]
    fn test_download_requires_online_supported_and_idle() {
        let mut view = view();
        assert!(!view.can_download());

        view.server_online = true;
        assert!(!view.can_download());

        view.url_supported = true;
        assert!(view.can_download());

        view.is_downloading = true;
        assert!(!view.can_download());

        view.is_downloading = false;
        view.phase = DownloadPhase::Saving;
        assert!(!view.can_download());
    }

    #[test]
    fn test_url_change_clears_preview() {
        let mut view = view();
        view.preview = Some("Old title".to_string());
        view.update(DownloadMessage::UrlChanged("https://youtu.be/x".to_string()));
        assert_eq!(view.url, "https://youtu.be/x");
        assert!(view.preview.is_none());
    }

    #[test]
    fn test_set_progress_clamps() {
        let mut view = view();
        view.set_progress(250, "merging");
        assert_eq!(view.progress, 100.0);
        assert_eq!(view.status_message, "merging");
    }
}
