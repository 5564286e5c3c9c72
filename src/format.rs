//! Stream selection passed to yt-dlp, modelled as a preference list.
//!
//! A [`FormatSelection`] is tried left to right; the first [`FormatChoice`]
//! that yt-dlp can satisfy wins. It renders to yt-dlp's `-f` syntax where `/`
//! separates fallbacks and `+` merges a video stream with an audio stream.

use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
};

use crate::model::{DownloadRequest, Quality};

/// Output filename pattern, expanded by yt-dlp
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Bitrate of the MP3 produced by the audio-only preset
pub const AUDIO_BITRATE_KBPS: u16 = 192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    BestVideo,
    BestAudio,
    /// Best single file carrying both video and audio
    Best,
}

/// One stream pick with optional constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFilter {
    pub stream: Stream,
    pub max_height: Option<u32>,
    pub ext: Option<&'static str>,
}

impl StreamFilter {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            max_height: None,
            ext: None,
        }
    }

    pub fn max_height(mut self, height: Option<u32>) -> Self {
        self.max_height = height;
        self
    }

    pub fn ext(mut self, ext: &'static str) -> Self {
        self.ext = Some(ext);
        self
    }
}

impl fmt::Display for StreamFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self.stream {
            Stream::BestVideo => "bestvideo",
            Stream::BestAudio => "bestaudio",
            Stream::Best => "best",
        })?;
        if let Some(h) = self.max_height {
            write!(f, "[height<={h}]")?;
        }
        if let Some(ext) = self.ext {
            write!(f, "[ext={ext}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChoice {
    Single(StreamFilter),
    Merge {
        video: StreamFilter,
        audio: StreamFilter,
    },
}

impl fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatChoice::Single(s) => write!(f, "{s}"),
            FormatChoice::Merge { video, audio } => write!(f, "{video}+{audio}"),
        }
    }
}

/// Ordered fallback chain of stream picks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection(pub Vec<FormatChoice>);

impl FormatSelection {
    pub fn for_quality(quality: Quality) -> Self {
        use FormatChoice::{Merge, Single};

        let height = quality.max_height();
        let choices = match quality {
            Quality::AudioOnly => vec![
                Single(StreamFilter::new(Stream::BestAudio)),
                Single(StreamFilter::new(Stream::Best)),
            ],
            Quality::Best => vec![
                Merge {
                    video: StreamFilter::new(Stream::BestVideo).ext("mp4"),
                    audio: StreamFilter::new(Stream::BestAudio).ext("m4a"),
                },
                Single(StreamFilter::new(Stream::Best).ext("mp4")),
                Single(StreamFilter::new(Stream::Best)),
            ],
            Quality::P720 | Quality::P480 | Quality::P360 => vec![
                Merge {
                    video: StreamFilter::new(Stream::BestVideo)
                        .max_height(height)
                        .ext("mp4"),
                    audio: StreamFilter::new(Stream::BestAudio).ext("m4a"),
                },
                Single(StreamFilter::new(Stream::Best).max_height(height)),
            ],
        };
        Self(choices)
    }

    pub fn choices(&self) -> &[FormatChoice] {
        &self.0
    }
}

impl fmt::Display for FormatSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, choice) in self.choices().iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{choice}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Mp3,
}

impl AudioCodec {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
        }
    }
}

/// Step run by yt-dlp once the streams are on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostProcessor {
    ExtractAudio { codec: AudioCodec, bitrate_kbps: u16 },
}

impl PostProcessor {
    pub fn args(&self) -> Vec<String> {
        match self {
            PostProcessor::ExtractAudio {
                codec,
                bitrate_kbps,
            } => vec![
                "-x".to_owned(),
                "--audio-format".to_owned(),
                codec.as_str().to_owned(),
                "--audio-quality".to_owned(),
                format!("{bitrate_kbps}K"),
            ],
        }
    }
}

/// Everything the extractor needs to perform one download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    pub destination: PathBuf,
    pub format: FormatSelection,
    pub postprocessors: Vec<PostProcessor>,
}

impl DownloadOptions {
    pub fn from_request(request: &DownloadRequest) -> Self {
        let postprocessors = match request.quality {
            Quality::AudioOnly => vec![PostProcessor::ExtractAudio {
                codec: AudioCodec::Mp3,
                bitrate_kbps: AUDIO_BITRATE_KBPS,
            }],
            _ => Vec::new(),
        };
        Self {
            destination: request.destination.clone(),
            format: FormatSelection::for_quality(request.quality),
            postprocessors,
        }
    }

    /// `<destination>/%(title)s.%(ext)s`
    pub fn output_template(&self) -> OsString {
        Path::new(&self.destination)
            .join(OUTPUT_TEMPLATE)
            .into_os_string()
    }

    /// Format and post-processing arguments for the yt-dlp command line
    pub fn selection_args(&self) -> Vec<String> {
        let mut args = vec!["-f".to_owned(), self.format.to_string()];
        for pp in &self.postprocessors {
            args.extend(pp.args());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(quality: Quality) -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
            destination: PathBuf::from("/tmp/out"),
            quality,
        }
    }

    #[test]
    fn best_prefers_mp4_then_falls_back_to_anything() {
        assert_eq!(
            FormatSelection::for_quality(Quality::Best).to_string(),
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
        );
    }

    #[test]
    fn capped_presets_render_height_filters() {
        assert_eq!(
            FormatSelection::for_quality(Quality::P720).to_string(),
            "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[height<=720]"
        );
        assert_eq!(
            FormatSelection::for_quality(Quality::P360).to_string(),
            "bestvideo[height<=360][ext=mp4]+bestaudio[ext=m4a]/best[height<=360]"
        );
    }

    #[test]
    fn every_fallback_of_a_capped_preset_respects_the_cap() {
        for quality in [Quality::P720, Quality::P480, Quality::P360] {
            let cap = quality.max_height();
            let selection = FormatSelection::for_quality(quality);
            assert!(selection.choices().len() >= 2, "{quality} needs a fallback");
            for choice in selection.choices() {
                let height = match choice {
                    FormatChoice::Single(s) => s.max_height,
                    FormatChoice::Merge { video, .. } => video.max_height,
                };
                assert_eq!(height, cap, "{quality}: {choice}");
            }
        }
    }

    #[test]
    fn selection_is_deterministic() {
        for quality in Quality::ALL {
            assert_eq!(
                FormatSelection::for_quality(quality),
                FormatSelection::for_quality(quality)
            );
        }
    }

    #[test]
    fn audio_only_extracts_mp3_at_fixed_bitrate() {
        let options = DownloadOptions::from_request(&request(Quality::AudioOnly));
        assert_eq!(options.format.to_string(), "bestaudio/best");
        assert_eq!(
            options.postprocessors,
            vec![PostProcessor::ExtractAudio {
                codec: AudioCodec::Mp3,
                bitrate_kbps: 192
            }]
        );
        assert_eq!(
            options.selection_args(),
            [
                "-f",
                "bestaudio/best",
                "-x",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "192K"
            ]
        );
    }

    #[test]
    fn video_presets_have_no_postprocessing() {
        for quality in [Quality::Best, Quality::P720, Quality::P480, Quality::P360] {
            assert!(DownloadOptions::from_request(&request(quality))
                .postprocessors
                .is_empty());
        }
    }

    #[test]
    fn output_template_lives_in_destination() {
        let options = DownloadOptions::from_request(&request(Quality::Best));
        assert_eq!(
            PathBuf::from(options.output_template()),
            PathBuf::from("/tmp/out").join("%(title)s.%(ext)s")
        );
    }
}
