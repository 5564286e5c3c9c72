//! UI-side state machine: form fields, status line, progress and preview.
//!
//! All mutation happens on the UI thread. Background work is started through
//! the [`TaskRunner`] and its results are applied in [`Controller::pump`].

use std::{collections::VecDeque, path::PathBuf, sync::Arc};

use eframe::egui::ColorImage;
use tracing::{debug, info, warn};

use crate::{
    bridge::{TaskEvent, TaskKind, TaskRunner, Worker},
    config::Settings,
    downloader::MediaExtractor,
    error::{DownloadError, FetchError, TaskError, ThumbnailError, ValidationError},
    format::DownloadOptions,
    model::{DownloadRequest, Phase, ProgressEvent, Quality, VideoMetadata},
    thumbnail::ThumbnailFetcher,
};

/// Colour family of the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Ready,
    Busy,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub text: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Modal message shown once an action ends
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailState {
    Loading,
    Loaded,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub metadata: VideoMetadata,
    pub thumbnail: ThumbnailState,
}

/// External collaborators the controller hands work to
#[derive(Clone)]
pub struct Services {
    pub extractor: Arc<dyn MediaExtractor>,
    pub thumbnails: Arc<dyn ThumbnailFetcher>,
    pub runner: TaskRunner,
}

pub struct Controller {
    /// URL field
    pub url: String,
    /// "Save to" field
    pub destination: String,
    /// Selected preset
    pub quality: Quality,

    status: Status,
    progress: f32,
    preview: Option<Preview>,
    /// Oldest first; only the front one is on screen
    notices: VecDeque<Notice>,
    fresh_thumbnail: Option<ColorImage>,
    /// Destination of the download in flight
    active_destination: Option<PathBuf>,
    /// Destination of the last successful download
    finished_destination: Option<PathBuf>,

    fetch: Option<Worker<VideoMetadata, FetchError>>,
    thumbnail: Option<Worker<ColorImage, ThumbnailError>>,
    download: Option<Worker<(), DownloadError>>,

    services: Services,
}

impl Controller {
    pub fn new(settings: &Settings, services: Services) -> Self {
        Self {
            url: String::new(),
            destination: settings.default_destination.display().to_string(),
            quality: settings.default_quality,
            status: Status {
                text: "Ready to download".to_owned(),
                tone: Tone::Ready,
            },
            progress: 0.0,
            preview: None,
            notices: VecDeque::new(),
            fresh_thumbnail: None,
            active_destination: None,
            finished_destination: None,
            fetch: None,
            thumbnail: None,
            download: None,
            services,
        }
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Progress of the current or last download, `0.0..=100.0`
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notices.front()
    }

    /// Closes the visible notice; the next queued one, if any, takes its place.
    pub fn dismiss_notice(&mut self) {
        self.notices.pop_front();
    }

    /// Hands over a newly decoded thumbnail, once.
    pub fn take_thumbnail(&mut self) -> Option<ColorImage> {
        self.fresh_thumbnail.take()
    }

    pub fn finished_destination(&self) -> Option<&PathBuf> {
        self.finished_destination.as_ref()
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch.is_some()
    }

    pub fn is_downloading(&self) -> bool {
        self.download.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.fetch.is_some() || self.thumbnail.is_some() || self.download.is_some()
    }

    /// Starts a metadata fetch for the URL field. Ignored while one is running.
    pub fn fetch_info(&mut self) {
        if self.fetch.is_some() {
            debug!("Fetch already running, ignoring trigger");
            return;
        }
        let url = match validate_url(&self.url) {
            Ok(url) => url,
            Err(err) => return self.reject(err),
        };

        info!(%url, "Fetching video info");
        self.preview = None;
        self.thumbnail = None;
        self.fresh_thumbnail = None;
        if self.download.is_none() {
            self.set_status("Fetching video info...", Tone::Busy);
        }

        let extractor = Arc::clone(&self.services.extractor);
        self.fetch = Some(
            self.services
                .runner
                .run_in_background(TaskKind::Fetch, move |_| extractor.fetch_metadata(&url)),
        );
    }

    /// Starts a download of the current form. Ignored while one is running.
    pub fn start_download(&mut self) {
        if self.download.is_some() {
            debug!("Download already running, ignoring trigger");
            return;
        }
        let request = match self.snapshot() {
            Ok(request) => request,
            Err(err) => return self.reject(err),
        };
        let options = DownloadOptions::from_request(&request);

        info!(
            url = %request.url,
            destination = %request.destination.display(),
            quality = %request.quality,
            format = %options.format,
            "Starting download"
        );
        self.progress = 0.0;
        self.finished_destination = None;
        self.active_destination = Some(request.destination.clone());
        self.set_status("Downloading...", Tone::Busy);

        let extractor = Arc::clone(&self.services.extractor);
        self.download = Some(self.services.runner.run_in_background(
            TaskKind::Download,
            move |sink| extractor.download(&request.url, &options, &mut |event| sink.progress(event)),
        ));
    }

    /// Applies everything the workers reported since the last call.
    pub fn pump(&mut self) {
        if let Some(worker) = self.fetch.as_mut() {
            let events = worker.drain();
            if worker.is_completed() {
                self.fetch = None;
            }
            for event in events {
                if let TaskEvent::Completed(result) = event {
                    self.on_fetch_completed(result);
                }
            }
        }

        if let Some(worker) = self.thumbnail.as_mut() {
            let events = worker.drain();
            if worker.is_completed() {
                self.thumbnail = None;
            }
            for event in events {
                if let TaskEvent::Completed(result) = event {
                    self.on_thumbnail_completed(result);
                }
            }
        }

        if let Some(worker) = self.download.as_mut() {
            let events = worker.drain();
            if worker.is_completed() {
                self.download = None;
            }
            for event in events {
                self.on_download_event(event);
            }
        }
    }

    /// Called once when the window closes. Kills any yt-dlp still running so
    /// nothing keeps downloading after the app is gone.
    pub fn shutdown(&self) {
        if !self.is_busy() {
            return;
        }
        let running = [
            self.fetch.as_ref().map(Worker::kind),
            self.thumbnail.as_ref().map(Worker::kind),
            self.download.as_ref().map(Worker::kind),
        ];
        for kind in running.into_iter().flatten() {
            warn!("Closing with a {kind} still running");
        }
        self.services.extractor.terminate();
    }

    fn snapshot(&self) -> Result<DownloadRequest, ValidationError> {
        let url = validate_url(&self.url)?;
        let destination = self.destination.trim();
        if destination.is_empty() {
            return Err(ValidationError::EmptyDestination);
        }
        Ok(DownloadRequest {
            url,
            destination: PathBuf::from(destination),
            quality: self.quality,
        })
    }

    fn reject(&mut self, err: ValidationError) {
        debug!("Rejected input: {err}");
        self.set_status(err.to_string(), Tone::Error);
    }

    fn push_notice(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push_back(Notice {
            kind,
            message: message.into(),
        });
    }

    fn set_status(&mut self, text: impl Into<String>, tone: Tone) {
        self.status = Status {
            text: text.into(),
            tone,
        };
    }

    fn on_fetch_completed(&mut self, result: Result<VideoMetadata, TaskError<FetchError>>) {
        match result {
            Ok(metadata) => {
                info!(title = %metadata.title, "Video info received");
                let thumbnail = match metadata.thumbnail_url.clone() {
                    Some(url) => {
                        let thumbnails = Arc::clone(&self.services.thumbnails);
                        self.thumbnail = Some(
                            self.services
                                .runner
                                .run_in_background(TaskKind::Thumbnail, move |_| thumbnails.fetch(&url)),
                        );
                        ThumbnailState::Loading
                    }
                    None => ThumbnailState::Unavailable,
                };
                if self.download.is_none() {
                    self.set_status(format!("Found: {}", metadata.title), Tone::Success);
                }
                self.preview = Some(Preview {
                    metadata,
                    thumbnail,
                });
            }
            Err(err) => {
                warn!("Fetching video info failed: {err}");
                if self.download.is_none() {
                    self.set_status(format!("Error: {err}"), Tone::Error);
                }
                self.push_notice(NoticeKind::Error, format!("Could not fetch video info: {err}"));
            }
        }
    }

    fn on_thumbnail_completed(&mut self, result: Result<ColorImage, TaskError<ThumbnailError>>) {
        let state = match result {
            Ok(image) => {
                self.fresh_thumbnail = Some(image);
                ThumbnailState::Loaded
            }
            Err(err) => {
                warn!("Thumbnail unavailable: {err}");
                ThumbnailState::Unavailable
            }
        };
        if let Some(preview) = self.preview.as_mut() {
            preview.thumbnail = state;
        }
    }

    fn on_download_event(&mut self, event: TaskEvent<(), DownloadError>) {
        match event {
            TaskEvent::Progress(progress) => self.on_download_progress(progress),
            TaskEvent::Completed(Ok(())) => {
                info!("Download completed");
                self.progress = 100.0;
                self.finished_destination = self.active_destination.take();
                self.set_status("Download completed successfully!", Tone::Success);
                self.push_notice(NoticeKind::Success, "Video downloaded successfully!");
            }
            TaskEvent::Completed(Err(err)) => {
                warn!("Download failed: {err}");
                self.progress = 0.0;
                self.active_destination = None;
                self.set_status(format!("Error: {err}"), Tone::Error);
                self.push_notice(NoticeKind::Error, format!("Download failed: {err}"));
            }
        }
    }

    fn on_download_progress(&mut self, event: ProgressEvent) {
        match event.phase {
            Phase::Downloading => {
                self.progress = event.percent;
                let text = match event.speed {
                    Some(speed) => format!("Downloading... {:.1}% at {speed}", event.percent),
                    None => format!("Downloading... {:.1}%", event.percent),
                };
                self.set_status(text, Tone::Busy);
            }
            Phase::Postprocessing => self.set_status("Post-processing...", Tone::Busy),
            Phase::Finished => self.progress = 100.0,
        }
    }
}

fn validate_url(raw: &str) -> Result<String, ValidationError> {
    let url = raw.trim();
    if url.is_empty() {
        Err(ValidationError::EmptyUrl)
    } else {
        Ok(url.to_owned())
    }
}
