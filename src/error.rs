//! Error types for every failure the application can surface.

use thiserror::Error;

/// Input rejected by the controller before any work is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a URL")]
    EmptyUrl,

    #[error("Please choose a download folder")]
    EmptyDestination,
}

/// Metadata retrieval failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not launch yt-dlp: {0}")]
    Launch(std::io::Error),

    #[error("{0}")]
    Extractor(String),

    #[error("could not read video info: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("lost contact with yt-dlp: {0}")]
    Io(#[from] std::io::Error),
}

/// Download or post-processing failure.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("could not launch yt-dlp: {0}")]
    Launch(std::io::Error),

    #[error("could not create download folder: {0}")]
    Destination(std::io::Error),

    #[error("{0}")]
    Extractor(String),

    #[error("lost contact with yt-dlp: {0}")]
    Io(#[from] std::io::Error),
}

/// Thumbnail failure. Never shown to the user beyond a placeholder.
#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("thumbnail request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("thumbnail decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Outcome of a background task that did not produce a value.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("background task panicked: {0}")]
    Panicked(String),

    #[error("background task ended without reporting a result")]
    Lost,
}

/// Fatal errors raised while bringing the application up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("could not build the HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("could not install the log subscriber: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("window system error: {0}")]
    Gui(#[from] eframe::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(ValidationError::EmptyUrl.to_string(), "Please enter a URL");
        assert_eq!(
            ValidationError::EmptyDestination.to_string(),
            "Please choose a download folder"
        );
    }

    #[test]
    fn task_error_shows_inner_message() {
        let err: TaskError<DownloadError> =
            TaskError::Failed(DownloadError::Extractor("Unsupported URL: x".into()));
        assert_eq!(err.to_string(), "Unsupported URL: x");
        let lost: TaskError<DownloadError> = TaskError::Lost;
        assert!(!lost.to_string().is_empty());
    }
}
