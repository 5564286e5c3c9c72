use std::{path::PathBuf, time::Duration};

use tracing::Level;

use crate::model::Quality;

/// Compiled-in application settings. Nothing is read from disk or the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Folder pre-filled in the "Save to" field
    pub default_destination: PathBuf,
    pub default_quality: Quality,
    /// Upper bound on a thumbnail request
    pub thumbnail_timeout: Duration,
    /// Thumbnails are shrunk to fit in this box
    pub thumbnail_max_size: [u32; 2],
    pub log_level: Level,
    pub window_size: [f32; 2],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_destination: default_destination(dirs::home_dir()),
            default_quality: Quality::Best,
            thumbnail_timeout: Duration::from_secs(10),
            thumbnail_max_size: [320, 180],
            log_level: if cfg!(debug_assertions) { Level::DEBUG } else { Level::INFO },
            window_size: [640.0, 520.0],
        }
    }
}

/// `<home>/Downloads` when it exists, else `<home>`, else the working directory
fn default_destination(home: Option<PathBuf>) -> PathBuf {
    match home {
        Some(home) => {
            let downloads = home.join("Downloads");
            if downloads.is_dir() { downloads } else { home }
        }
        None => PathBuf::from("."),
    }
}
