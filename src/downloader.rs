use std::{
    ffi::OsString,
    fs,
    io::{self, BufRead, BufReader, Read},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use rust_embed::RustEmbed;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    error::{DownloadError, FetchError},
    format::DownloadOptions,
    model::{ProgressEvent, VideoMetadata},
    progress::{parse_progress_from_line, progress_templates},
};

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

/// The extraction/download collaborator.
///
/// Both calls block until the external tool is done and must only be made
/// from a worker thread.
pub trait MediaExtractor: Send + Sync {
    fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, FetchError>;

    /// `on_progress` is called zero or more times, in the order yt-dlp reports.
    fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(), DownloadError>;

    /// Kills every external process still running on behalf of this extractor.
    /// Blocked calls then return with an error.
    fn terminate(&self) {}
}

type SharedChild = Arc<Mutex<Child>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// yt-dlp processes currently running, reachable from the close path
#[derive(Debug, Clone, Default)]
struct Processes(Arc<Mutex<Vec<(u32, SharedChild)>>>);

impl Processes {
    fn track(&self, child: Child) -> TrackedChild {
        let pid = child.id();
        let child = Arc::new(Mutex::new(child));
        lock(&self.0).push((pid, Arc::clone(&child)));
        TrackedChild {
            pid,
            child,
            processes: self.clone(),
            reaped: false,
        }
    }

    fn kill_all(&self) {
        let running: Vec<_> = lock(&self.0).iter().map(|(_, c)| Arc::clone(c)).collect();
        for child in running {
            let mut child = lock(&child);
            info!(pid = child.id(), "Killing yt-dlp");
            if let Err(err) = child.kill() {
                debug!("kill failed: {err}");
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.0).len()
    }
}

/// A spawned child that is killed and reaped when dropped before it exits
struct TrackedChild {
    pid: u32,
    child: SharedChild,
    processes: Processes,
    reaped: bool,
}

impl TrackedChild {
    /// Waits without holding the lock, so [`Processes::kill_all`] stays usable.
    fn wait(&mut self) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = lock(&self.child).try_wait()? {
                self.reaped = true;
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for TrackedChild {
    fn drop(&mut self) {
        lock(&self.processes.0).retain(|(pid, _)| *pid != self.pid);
        if !self.reaped {
            let mut child = lock(&self.child);
            warn!(pid = self.pid, "yt-dlp still running, killing it");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    child.stderr.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join_stderr(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Drives the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: OsString,
    base_args: Vec<OsString>,
    processes: Processes,
}

impl YtDlp {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            processes: Processes::default(),
        }
    }

    /// Runs `program` with `base_args` in front of the yt-dlp arguments,
    /// e.g. an interpreter and a script.
    #[cfg(test)]
    pub fn with_command<I, S>(program: impl Into<OsString>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            base_args: base_args.into_iter().map(Into::into).collect(),
            ..Self::new(program)
        }
    }

    /// Prefers a binary bundled under `assets/`, otherwise `yt-dlp` from `PATH`.
    pub fn locate() -> Self {
        let bin = if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" };
        match extract_bundled(bin) {
            Ok(Some(path)) => {
                info!("Using bundled yt-dlp at {}", path.display());
                Self::new(path)
            }
            Ok(None) => {
                info!("No bundled yt-dlp, using {bin} from PATH");
                Self::new(bin)
            }
            Err(err) => {
                warn!("Could not extract bundled yt-dlp ({err}), using {bin} from PATH");
                Self::new(bin)
            }
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args);
        cmd
    }
}

fn extract_bundled(bin: &str) -> io::Result<Option<PathBuf>> {
    let Some(data) = Asset::get(bin) else {
        return Ok(None);
    };
    let dir = dirs::cache_dir()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no per-user cache directory"))?
        .join(env!("CARGO_PKG_NAME"));
    install_binary(&dir, bin, &data.data).map(Some)
}

/// Writes `data` to `dir/bin` unless an identical executable is already there.
fn install_binary(dir: &Path, bin: &str, data: &[u8]) -> io::Result<PathBuf> {
    let target = dir.join(bin);
    if fs::read(&target).is_ok_and(|existing| existing == data) {
        return Ok(target);
    }
    fs::create_dir_all(dir)?;
    debug!("Installing yt-dlp to {}", target.display());

    // Rename over the target so a crash never leaves a truncated binary behind
    let partial = dir.join(format!("{bin}.part"));
    fs::write(&partial, data)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&partial, fs::Permissions::from_mode(0o755))?;
    }
    fs::rename(&partial, &target)?;
    Ok(target)
}

/// Subset of `yt-dlp -J` output we display
#[derive(Debug, Deserialize)]
struct InfoJson {
    title: String,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl From<InfoJson> for VideoMetadata {
    fn from(info: InfoJson) -> Self {
        Self {
            title: info.title,
            uploader: info.uploader,
            duration_seconds: info.duration.map_or(0, |d| d.max(0.0).round() as u64),
            thumbnail_url: info.thumbnail,
        }
    }
}

pub fn parse_info_json(raw: &str) -> Result<VideoMetadata, FetchError> {
    Ok(serde_json::from_str::<InfoJson>(raw)?.into())
}

/// Best human-readable reason for a failed run
pub fn failure_message(stderr: &str, status: ExitStatus) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if let Some(err) = lines.iter().rev().find_map(|l| l.strip_prefix("ERROR:")) {
        return err.trim().to_owned();
    }
    match lines.last() {
        Some(line) => (*line).to_owned(),
        None => format!("yt-dlp exited with {status}"),
    }
}

impl MediaExtractor for YtDlp {
    fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata, FetchError> {
        let mut cmd = self.command();
        cmd.args(["-J", "--no-playlist", "--skip-download", "--"])
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Executing command: {cmd:?}");

        let mut child = cmd.spawn().map_err(FetchError::Launch)?;
        let stderr = drain_stderr(&mut child);
        let stdout = child.stdout.take();
        let mut child = self.processes.track(child);

        let mut raw = Vec::new();
        if let Some(mut out) = stdout {
            out.read_to_end(&mut raw)?;
        }
        let status = child.wait()?;
        let stderr = join_stderr(stderr);

        if !status.success() {
            return Err(FetchError::Extractor(failure_message(&stderr, status)));
        }
        let metadata = parse_info_json(&String::from_utf8_lossy(&raw))?;
        debug!(title = %metadata.title, duration = metadata.duration_seconds, "Metadata fetched");
        Ok(metadata)
    }

    fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<(), DownloadError> {
        fs::create_dir_all(&options.destination).map_err(DownloadError::Destination)?;

        let mut cmd = self.command();
        cmd.args(["--newline", "--no-playlist"]);
        for template in progress_templates() {
            cmd.arg("--progress-template").arg(template);
        }
        cmd.args(options.selection_args())
            .arg("-o")
            .arg(options.output_template())
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Executing command: {cmd:?}");

        let mut child = cmd.spawn().map_err(DownloadError::Launch)?;

        // Drain stderr on the side so a chatty child never blocks on a full pipe
        let stderr = drain_stderr(&mut child);
        let stdout = child.stdout.take();
        // From here on an early return kills the child
        let mut child = self.processes.track(child);

        if let Some(out) = stdout {
            // Titles are not guaranteed to be valid UTF-8 on every platform
            for line in BufReader::new(out).split(b'\n') {
                let line = String::from_utf8_lossy(&line?).into_owned();
                match parse_progress_from_line(&line) {
                    Some(event) => on_progress(event),
                    None => debug!("yt-dlp> {line}"),
                }
            }
        }

        let status = child.wait()?;
        let stderr = join_stderr(stderr);

        if !status.success() {
            return Err(DownloadError::Extractor(failure_message(&stderr, status)));
        }
        on_progress(ProgressEvent::finished());
        Ok(())
    }

    fn terminate(&self) {
        self.processes.kill_all();
    }
}
