use crate::model::ProgressEvent;

/// Prefix of the download progress lines requested from yt-dlp
pub const DOWNLOAD_MARKER: &str = "downloading:";
/// Prefix of the post-processing lines requested from yt-dlp
pub const POSTPROCESS_MARKER: &str = "postprocessing:";

/// `--progress-template` values matching the markers above
pub fn progress_templates() -> [String; 2] {
    [
        format!("download:{DOWNLOAD_MARKER}%(progress._percent_str)s|%(progress._speed_str)s"),
        format!("postprocess:{POSTPROCESS_MARKER}%(progress.postprocessor)s|%(progress.status)s"),
    ]
}

/// Post-processors yt-dlp announces as `[Name] ...` when templates are not honoured
const POSTPROCESSOR_TAGS: [&str; 5] = [
    "[Merger]",
    "[ExtractAudio]",
    "[VideoConvertor]",
    "[FixupM3u8]",
    "[FixupM4a]",
];

pub fn parse_progress_from_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(DOWNLOAD_MARKER) {
        let (percent, speed) = rest.split_once('|').unwrap_or((rest, ""));
        let number = percent.trim().strip_suffix('%')?;
        let value = number.trim().parse::<f32>().ok()?;
        return Some(ProgressEvent::downloading(value, parse_speed(speed)));
    }
    if line.starts_with(POSTPROCESS_MARKER) || POSTPROCESSOR_TAGS.iter().any(|t| line.starts_with(t)) {
        return Some(ProgressEvent::postprocessing());
    }
    None
}

fn parse_speed(raw: &str) -> Option<String> {
    let speed = raw.trim();
    if speed.is_empty() || speed.starts_with("Unknown") || speed.starts_with("NA") {
        None
    } else {
        Some(speed.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Phase;

    #[test]
    fn parses_percent_and_speed() {
        let ev = parse_progress_from_line("downloading:  42.3%|  1.20MiB/s").unwrap();
        assert_eq!(ev.phase, Phase::Downloading);
        assert_eq!(ev.percent, 42.3);
        assert_eq!(ev.speed.as_deref(), Some("1.20MiB/s"));
    }

    #[test]
    fn unknown_speed_is_dropped() {
        let ev = parse_progress_from_line("downloading:100.0%|Unknown B/s").unwrap();
        assert_eq!(ev.percent, 100.0);
        assert_eq!(ev.speed, None);
    }

    #[test]
    fn unparseable_percent_is_ignored() {
        assert_eq!(parse_progress_from_line("downloading:  N/A%|1MiB/s"), None);
        assert_eq!(parse_progress_from_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_from_line(""), None);
    }

    #[test]
    fn postprocessing_lines_are_recognised() {
        for line in [
            "postprocessing:ExtractAudio|started",
            "[Merger] Merging formats into \"a.mp4\"",
            "[ExtractAudio] Destination: a.mp3",
        ] {
            assert_eq!(
                parse_progress_from_line(line).map(|e| e.phase),
                Some(Phase::Postprocessing),
                "{line}"
            );
        }
    }

    #[test]
    fn templates_carry_the_markers() {
        let [download, postprocess] = progress_templates();
        assert!(download.starts_with("download:downloading:"));
        assert!(postprocess.starts_with("postprocess:postprocessing:"));
    }
}
