use std::{fmt, path::PathBuf};

/// Quality preset picked by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// Best available video and audio
    #[default]
    Best,
    /// Video capped at 720 lines
    P720,
    /// Video capped at 480 lines
    P480,
    /// Video capped at 360 lines
    P360,
    /// Audio track only, re-encoded to MP3
    AudioOnly,
}

impl Quality {
    /// All presets, in the order they are offered in the UI
    pub const ALL: [Quality; 5] = [
        Quality::Best,
        Quality::P720,
        Quality::P480,
        Quality::P360,
        Quality::AudioOnly,
    ];

    /// Maximum video height for the capped presets
    pub fn max_height(self) -> Option<u32> {
        match self {
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
            Quality::Best | Quality::AudioOnly => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::Best => "Best Quality",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
            Quality::AudioOnly => "Audio Only (MP3)",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of the form taken when the user presses Download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub quality: Quality,
}

/// What the extractor tells us about a video before downloading it
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoMetadata {
    pub title: String,
    pub uploader: Option<String>,
    pub duration_seconds: u64,
    pub thumbnail_url: Option<String>,
}

/// Stage of a running download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    Postprocessing,
    Finished,
}

/// Progress notification sent from a download worker to the UI
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Percent complete in `0.0..=100.0`, only meaningful while downloading
    pub percent: f32,
    /// Transfer rate as reported by the extractor, e.g. `1.20MiB/s`
    pub speed: Option<String>,
}

impl ProgressEvent {
    pub fn downloading(percent: f32, speed: Option<String>) -> Self {
        Self {
            phase: Phase::Downloading,
            percent: percent.clamp(0.0, 100.0),
            speed,
        }
    }

    pub fn postprocessing() -> Self {
        Self {
            phase: Phase::Postprocessing,
            percent: 100.0,
            speed: None,
        }
    }

    pub fn finished() -> Self {
        Self {
            phase: Phase::Finished,
            percent: 100.0,
            speed: None,
        }
    }
}

/// Formats a duration as `m:ss`, or `h:mm:ss` past the hour
pub fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
