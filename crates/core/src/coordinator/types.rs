//! Types for the task coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use super::error::TaskError;
use crate::fetch::validate_url;
use crate::planner::{Quality, TargetFormat, Timecode};
use crate::runner::OutputStream;

/// What a task does, in execution order of its phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Convert,
    Trim,
    TrimThenConvert,
    Download,
    DownloadThenConvert,
    DownloadThenTrim,
    DownloadThenTrimThenConvert,
}

impl OperationKind {
    /// The input is a URL fetched first.
    pub fn downloads(&self) -> bool {
        matches!(
            self,
            Self::Download
                | Self::DownloadThenConvert
                | Self::DownloadThenTrim
                | Self::DownloadThenTrimThenConvert
        )
    }

    pub fn trims(&self) -> bool {
        matches!(
            self,
            Self::Trim
                | Self::TrimThenConvert
                | Self::DownloadThenTrim
                | Self::DownloadThenTrimThenConvert
        )
    }

    pub fn converts(&self) -> bool {
        matches!(
            self,
            Self::Convert
                | Self::TrimThenConvert
                | Self::DownloadThenConvert
                | Self::DownloadThenTrimThenConvert
        )
    }

    /// Number of external processes the task runs on its success path.
    pub fn phase_count(&self, target: Option<TargetFormat>) -> u32 {
        let convert = match target {
            Some(TargetFormat::Gif) => 2,
            _ => 1,
        };
        u32::from(self.downloads())
            + u32::from(self.trims())
            + if self.converts() { convert } else { 0 }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Convert => "convert",
            Self::Trim => "trim",
            Self::TrimThenConvert => "trim_then_convert",
            Self::Download => "download",
            Self::DownloadThenConvert => "download_then_convert",
            Self::DownloadThenTrim => "download_then_trim",
            Self::DownloadThenTrimThenConvert => "download_then_trim_then_convert",
        };
        f.write_str(name)
    }
}

/// A task as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaTaskRequest {
    /// Source file path, or URL for download kinds.
    pub input: String,
    /// Directory receiving the final output.
    pub output_dir: PathBuf,
    pub kind: OperationKind,
    /// Required by convert kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetFormat>,
    /// Required by trim kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<Timecode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<Timecode>,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub use_gpu: bool,
}

impl MediaTaskRequest {
    pub fn new(kind: OperationKind, input: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            kind,
            target: None,
            trim_start: None,
            trim_end: None,
            quality: Quality::default(),
            use_gpu: false,
        }
    }

    pub fn convert(
        input: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        target: TargetFormat,
    ) -> Self {
        Self::new(OperationKind::Convert, input, output_dir).with_target(target)
    }

    pub fn trim(
        input: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        start: Timecode,
        end: Timecode,
    ) -> Self {
        Self::new(OperationKind::Trim, input, output_dir).with_range(start, end)
    }

    pub fn download(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self::new(OperationKind::Download, url, output_dir)
    }

    pub fn with_kind(mut self, kind: OperationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_target(mut self, target: TargetFormat) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_range(mut self, start: Timecode, end: Timecode) -> Self {
        self.trim_start = Some(start);
        self.trim_end = Some(end);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    /// Checks that the fields the kind needs are present and consistent.
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.input.trim().is_empty() {
            return Err(TaskError::Validation("input is empty".to_string()));
        }
        if self.kind.downloads() {
            validate_url(&self.input)?;
        }
        if self.kind.converts() && self.target.is_none() {
            return Err(TaskError::Validation(format!(
                "{} requires a target format",
                self.kind
            )));
        }
        if self.kind.trims() {
            match (self.trim_start, self.trim_end) {
                (Some(start), Some(end)) if start >= end => {
                    return Err(crate::planner::TrimError::StartNotBeforeEnd { start, end }.into());
                }
                (Some(_), Some(_)) => {}
                _ => {
                    return Err(TaskError::Validation(format!(
                        "{} requires a start and end time",
                        self.kind
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// One queued or running operation, owned by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTask {
    pub id: String,
    pub request: MediaTaskRequest,
    pub status: TaskStatus,
    pub progress: u8,
    /// Output of every process the task ran, oldest lines dropped first.
    pub log: String,
    /// Resolved while running.
    pub output_path: Option<PathBuf>,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MediaTask {
    pub fn new(request: MediaTaskRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            status: TaskStatus::Pending,
            progress: 0,
            log: String::new(),
            output_path: None,
            warnings: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Appends one line, dropping the oldest text beyond `max_bytes`.
    pub(crate) fn append_log(&mut self, line: &str, max_bytes: usize) {
        self.log.push_str(line);
        self.log.push('\n');
        if self.log.len() > max_bytes {
            let mut cut = self.log.len() - max_bytes;
            while !self.log.is_char_boundary(cut) {
                cut += 1;
            }
            self.log.drain(..cut);
        }
    }
}

/// Everything the coordinator reports to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    Started {
        task_id: String,
    },
    Progress {
        task_id: String,
        percent: u8,
    },
    Log {
        task_id: String,
        stream: OutputStream,
        line: String,
    },
    Warning {
        task_id: String,
        message: String,
    },
    Completed {
        task_id: String,
        output_path: PathBuf,
        warnings: Vec<String>,
    },
    Failed {
        task_id: String,
        error: String,
        log: String,
    },
    Cancelled {
        task_id: String,
    },
}

impl TaskEvent {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Started { task_id }
            | Self::Progress { task_id, .. }
            | Self::Log { task_id, .. }
            | Self::Warning { task_id, .. }
            | Self::Completed { task_id, .. }
            | Self::Failed { task_id, .. }
            | Self::Cancelled { task_id } => task_id,
        }
    }

    /// The last event a task produces.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Current status of the coordinator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    /// Whether the worker loop is running.
    pub running: bool,
    /// Snapshot of the running task.
    pub active: Option<MediaTask>,
    /// Tasks waiting to run.
    pub queued: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(s: &str) -> Timecode {
        s.parse().unwrap()
    }

    #[test]
    fn test_kind_phases() {
        assert_eq!(OperationKind::Convert.phase_count(Some(TargetFormat::Mp4)), 1);
        assert_eq!(OperationKind::Convert.phase_count(Some(TargetFormat::Gif)), 2);
        assert_eq!(OperationKind::Trim.phase_count(None), 1);
        assert_eq!(
            OperationKind::TrimThenConvert.phase_count(Some(TargetFormat::Mkv)),
            2
        );
        assert_eq!(
            OperationKind::DownloadThenTrimThenConvert.phase_count(Some(TargetFormat::Gif)),
            4
        );
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&OperationKind::DownloadThenTrim).unwrap();
        assert_eq!(json, "\"download_then_trim\"");
        assert_eq!(OperationKind::DownloadThenTrim.to_string(), "download_then_trim");
    }

    #[test]
    fn test_validate_requires_target() {
        let request = MediaTaskRequest::new(OperationKind::Convert, "/a.mp4", "/out");
        assert!(matches!(request.validate(), Err(TaskError::Validation(_))));
        assert!(request.with_target(TargetFormat::Mp4).validate().is_ok());
    }

    #[test]
    fn test_validate_requires_range() {
        let request = MediaTaskRequest::new(OperationKind::TrimThenConvert, "/a.mp4", "/out")
            .with_target(TargetFormat::Webm);
        assert!(matches!(request.validate(), Err(TaskError::Validation(_))));

        let request = request.with_range(tc("00:00:10:000"), tc("00:00:05:000"));
        assert!(matches!(request.validate(), Err(TaskError::Trim(_))));
    }

    #[test]
    fn test_validate_download_url() {
        assert!(MediaTaskRequest::download("https://youtu.be/x", "/out")
            .validate()
            .is_ok());
        assert!(MediaTaskRequest::download("/not/a/url", "/out")
            .validate()
            .is_err());
    }

    #[test]
    fn test_request_from_toml() {
        let toml = r#"
            input = "/videos/a.mkv"
            output_dir = "/out"
            kind = "trim_then_convert"
            target = "mp4"
            trim_start = "00:00:01:500"
            trim_end = "00:00:04"
            quality = 75
            use_gpu = true
        "#;
        let request: MediaTaskRequest = toml::from_str(toml).unwrap();
        assert_eq!(request.kind, OperationKind::TrimThenConvert);
        assert_eq!(request.target, Some(TargetFormat::Mp4));
        assert_eq!(request.trim_start.unwrap().total_millis(), 1500);
        assert_eq!(request.quality.percent(), 75);
        assert!(request.use_gpu);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_append_log_caps_size() {
        let mut task = MediaTask::new(MediaTaskRequest::download("https://a.com/v", "/out"));
        for i in 0..100 {
            task.append_log(&format!("line {}", i), 64);
        }
        assert!(task.log.len() <= 64);
        assert!(task.log.ends_with("line 99\n"));
    }

    #[test]
    fn test_event_serialization() {
        let event = TaskEvent::Progress {
            task_id: "t1".to_string(),
            percent: 42,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "progress");
        assert_eq!(json["percent"], 42);
        assert_eq!(event.task_id(), "t1");
        assert!(!event.is_terminal());
        assert!(TaskEvent::Cancelled {
            task_id: "t1".to_string()
        }
        .is_terminal());
    }
}
