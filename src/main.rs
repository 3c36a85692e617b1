mod api;
mod app;
mod application;
mod config;
mod domain;
mod ui;
mod utils;

use iced::window;
use tracing_subscriber::EnvFilter;

use crate::application::DownloadCoordinator;
use crate::config::AppConfig;
use crate::ui::icon;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    let coordinator = DownloadCoordinator::from_config(&config)?;
    tracing::info!(server = %config.server.base_url, "Starting RedditLink");

    let rgba = icon::render(icon::WINDOW_ICON_SIZE);
    let (width, height) = rgba.dimensions();
    let icon = window::icon::from_rgba(rgba.into_raw(), width, height).ok();

    iced::application(
        move || app::DownloadApp::new(coordinator.clone()),
        app::update,
        app::view,
    )
    .title("RedditLink")
    .window(window::Settings {
        icon,
        size: iced::Size::new(440.0, 480.0),
        ..Default::default()
    })
    .run()?;

    Ok(())
}
