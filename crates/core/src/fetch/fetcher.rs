//! yt-dlp driver.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::FetchConfig;
use super::error::FetchError;
use super::source::{host_of, SourceSite};
use crate::artifact::remove_if_exists;
use crate::config::ToolsConfig;
use crate::progress::{FetchHookEvent, FetchProgress, ProgressSink, HOOK_TEMPLATE};
use crate::runner::{
    CancelToken, LineSink, OutputStream, ProcessOutcome, ProcessRunner, ProcessSpec, RunnerError,
};

/// Prefix of the line carrying the final file path.
pub const OUTPUT_PREFIX: &str = "VIDIUM_OUTPUT|";

const TWITTER_TRANSIENT: &str = "Failed to parse JSON";
const TWITTER_HINT: &str = "X/Twitter did not return the post data. The post may be private or \
     removed, or yt-dlp may need an update";

/// Result of a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub path: PathBuf,
    pub site: SourceSite,
    pub attempts: u32,
}

/// Fails unless `url` is an http(s) URL with a host.
pub fn validate_url(url: &str) -> Result<(), FetchError> {
    match host_of(url) {
        Some(_) => Ok(()),
        None => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

/// Per-attempt state shared with the line sink.
struct AttemptState {
    progress: FetchProgress,
    output: Option<PathBuf>,
    files: BTreeSet<PathBuf>,
}

pub struct Fetcher {
    tools: ToolsConfig,
    config: FetchConfig,
    runner: ProcessRunner,
}

impl Fetcher {
    pub fn new(tools: ToolsConfig, config: FetchConfig, runner: ProcessRunner) -> Self {
        Self {
            tools,
            config,
            runner,
        }
    }

    /// Builds the yt-dlp invocation for `url`, writing into `out_dir`.
    pub fn command(&self, url: &str, out_dir: &Path) -> ProcessSpec {
        let site = SourceSite::detect(url);
        let template = out_dir.join(format!(
            "%(title).{}s.%(ext)s",
            self.config.title_max_chars
        ));

        let mut spec = ProcessSpec::new(&self.tools.ytdlp_path)
            .args([
                "--newline",
                "--no-playlist",
                "--restrict-filenames",
                "--progress",
                "--progress-template",
                HOOK_TEMPLATE,
                "--print",
            ])
            .arg(format!("after_move:{}%(filepath)s", OUTPUT_PREFIX))
            .arg("-f")
            .arg(self.config.format.as_str())
            .arg("-o")
            .arg(template.to_string_lossy().into_owned());

        if let Some(dir) = self.tools.ffmpeg_dir() {
            spec = spec
                .arg("--ffmpeg-location")
                .arg(dir.to_string_lossy().into_owned());
        }
        if site.merges_to_mp4() {
            spec = spec.args(["--merge-output-format", "mp4"]);
        }
        if site == SourceSite::Twitter {
            spec = spec
                .arg("--add-header")
                .arg(format!("User-Agent:{}", self.config.user_agent));
        }
        spec.arg(url)
    }

    /// Downloads `url` into `out_dir`, retrying transient source failures.
    ///
    /// Non-hook output lines are forwarded to `lines`; hook lines drive
    /// `progress`, which never reaches 100 here.
    pub async fn fetch(
        &self,
        url: &str,
        out_dir: &Path,
        cancel: &CancelToken,
        lines: &dyn LineSink,
        progress: &dyn ProgressSink,
    ) -> Result<FetchOutcome, FetchError> {
        validate_url(url)?;
        let site = SourceSite::detect(url);
        let attempts_allowed = if site == SourceSite::Twitter {
            self.config.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            info!("Fetching {} ({}), attempt {}", url, site, attempt);

            let (result, state) = self.attempt(url, out_dir, cancel, lines, progress).await;
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    if e.is_cancelled() {
                        cleanup_partial(&state).await;
                    }
                    return Err(e.into());
                }
            };

            if outcome.success() {
                return match state.output {
                    Some(path) => {
                        info!("Fetched {} to {}", url, path.display());
                        Ok(FetchOutcome {
                            path,
                            site,
                            attempts: attempt,
                        })
                    }
                    None => Err(FetchError::MissingOutput { log: outcome.log }),
                };
            }

            let transient = site == SourceSite::Twitter && outcome.log.contains(TWITTER_TRANSIENT);
            if transient && attempt < attempts_allowed {
                warn!(
                    "Transient failure fetching {}, retrying in {} ms",
                    url, self.config.retry_delay_ms
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        cleanup_partial(&state).await;
                        return Err(RunnerError::Cancelled.into());
                    }
                    _ = tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)) => {}
                }
                continue;
            }

            return Err(FetchError::ToolFailed {
                exit_code: outcome.exit_code,
                log: outcome.log,
                hint: transient.then(|| TWITTER_HINT.to_string()),
            });
        }
    }

    async fn attempt(
        &self,
        url: &str,
        out_dir: &Path,
        cancel: &CancelToken,
        lines: &dyn LineSink,
        progress: &dyn ProgressSink,
    ) -> (Result<ProcessOutcome, RunnerError>, AttemptState) {
        let state = Mutex::new(AttemptState {
            progress: FetchProgress::new(self.config.expected_parts()),
            output: None,
            files: BTreeSet::new(),
        });

        let sink = |stream: OutputStream, line: &str| {
            if let Some(event) = FetchHookEvent::parse_line(line) {
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(file) = &event.filename {
                    state.files.insert(PathBuf::from(file));
                }
                if let Some(percent) = state.progress.observe(&event) {
                    progress.emit(percent);
                }
                return;
            }
            if let Some(path) = line.strip_prefix(OUTPUT_PREFIX) {
                let path = PathBuf::from(path.trim());
                debug!("Fetch tool reported output {}", path.display());
                let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
                state.files.insert(path.clone());
                state.output = Some(path);
                return;
            }
            lines.on_line(stream, line);
        };

        let spec = self.command(url, out_dir);
        let result = self.runner.run(&spec, cancel, &sink).await;
        (result, state.into_inner().unwrap_or_else(|e| e.into_inner()))
    }
}

/// Removes every file and partial file seen during a cancelled attempt.
async fn cleanup_partial(state: &AttemptState) {
    for file in &state.files {
        let mut candidates = vec![file.clone()];
        for suffix in [".part", ".ytdl"] {
            let mut name = file.clone().into_os_string();
            name.push(suffix);
            candidates.push(PathBuf::from(name));
        }
        for path in candidates {
            if let Err(e) = remove_if_exists(&path).await {
                warn!("Failed to remove partial download {}: {}", path.display(), e);
            }
        }
    }
}
