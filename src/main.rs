//! Main application for the YouTube Downloader GUI

// egui front-end
mod app;
// Background task hand-off to the UI thread
mod bridge;
// Compiled-in settings
mod config;
// Form state, validation and worker bookkeeping
mod controller;
// External downloader driving logic (yt-dlp)
mod downloader;
// Error types for every failure surface
mod error;
// Stream selection expressions
mod format;
// tracing subscriber setup
mod logging;
// Data models for requests, metadata and progress
mod model;
// Progress parsing utilities
mod progress;
// Thumbnail fetching module
mod thumbnail;

use std::sync::Arc;

// eframe/egui for GUI application framework
use eframe::egui::{self, Visuals};
use tracing::info;

use app::DownloaderApp;
use bridge::TaskRunner;
use config::Settings;
use controller::{Controller, Services};
use downloader::{MediaExtractor, YtDlp};
use error::StartupError;
use thumbnail::{HttpThumbnails, ThumbnailFetcher};

/// Program entry point: initializes logging and the runtime, then launches the GUI
fn main() -> Result<(), StartupError> {
    let settings = Settings::default();
    logging::init_logging(settings.log_level)?;

    // The runtime's blocking pool hosts every background worker
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("worker")
        .enable_all()
        .build()?;

    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlp::locate());
    let thumbnails: Arc<dyn ThumbnailFetcher> = Arc::new(HttpThumbnails::new(
        settings.thumbnail_timeout,
        settings.thumbnail_max_size,
    )?);

    // Fixed-size window, like a small dialog
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(settings.window_size)
            .with_resizable(false),
        ..Default::default()
    };

    let handle = runtime.handle().clone();
    let processes = Arc::clone(&extractor);
    info!("Starting UI");
    let result = eframe::run_native(
        "YouTube Video Downloader",
        options,
        Box::new(move |cc| {
            // Use dark theme visuals
            cc.egui_ctx.set_visuals(Visuals::dark());
            let ctx = cc.egui_ctx.clone();
            let services = Services {
                extractor,
                thumbnails,
                runner: TaskRunner::new(handle, move || ctx.request_repaint()),
            };
            Box::new(DownloaderApp::new(Controller::new(&settings, services)))
        }),
    );

    // Kill any yt-dlp the close request did not reach
    info!("Shutting down");
    processes.terminate();
    runtime.shutdown_background();

    result.map_err(StartupError::from)
}
