//! Fetch tool progress hook lines.
//!
//! The fetch tool is asked to print one line per progress callback using a
//! pipe-delimited template; missing values print as `NA`.

use serde::{Deserialize, Serialize};

/// Marker that starts every hook line.
pub const HOOK_PREFIX: &str = "VIDIUM_PROGRESS|";

/// Template handed to `--progress-template`. The filename is last so that
/// pipes inside it survive parsing.
pub const HOOK_TEMPLATE: &str = "download:VIDIUM_PROGRESS|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.fragment_index)s|%(progress.fragment_count)s|%(progress.filename)s";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Downloading,
    Finished,
    Error,
    Other(String),
}

impl HookStatus {
    fn parse(value: &str) -> Self {
        match value {
            "downloading" => Self::Downloading,
            "finished" => Self::Finished,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One progress callback from the fetch tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchHookEvent {
    pub status: HookStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    pub fragment_index: Option<u64>,
    pub fragment_count: Option<u64>,
    pub filename: Option<String>,
}

impl FetchHookEvent {
    /// Parses a hook line; other output returns `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(HOOK_PREFIX)?;
        let mut fields = rest.splitn(7, '|');
        let status = HookStatus::parse(fields.next()?);
        let downloaded_bytes = number(fields.next());
        let total_bytes = number(fields.next());
        let total_bytes_estimate = number(fields.next());
        let fragment_index = number(fields.next());
        let fragment_count = number(fields.next());
        let filename = fields
            .next()
            .map(str::trim)
            .filter(|f| !f.is_empty() && *f != "NA")
            .map(str::to_string);

        Some(Self {
            status,
            downloaded_bytes,
            total_bytes,
            total_bytes_estimate,
            fragment_index,
            fragment_count,
            filename,
        })
    }

    /// Completion of the file this event describes, in `[0, 1]`.
    pub fn fraction(&self) -> Option<f64> {
        if self.status == HookStatus::Finished {
            return Some(1.0);
        }
        let by_bytes = self.downloaded_bytes.and_then(|done| {
            self.total_bytes
                .or(self.total_bytes_estimate)
                .filter(|total| *total > 0)
                .map(|total| done as f64 / total as f64)
        });
        let by_fragments = || {
            self.fragment_index
                .zip(self.fragment_count.filter(|c| *c > 0))
                .map(|(idx, count)| idx as f64 / count as f64)
        };
        by_bytes.or_else(by_fragments).map(|f| f.clamp(0.0, 1.0))
    }
}

/// Estimates print as floats ("1234.5"); everything else as integers or NA.
fn number(field: Option<&str>) -> Option<u64> {
    let field = field?.trim();
    if field.is_empty() || field == "NA" || field == "None" {
        return None;
    }
    field
        .parse::<u64>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_byte_progress() {
        let ev = FetchHookEvent::parse_line(
            "VIDIUM_PROGRESS|downloading|1024|4096|NA|NA|NA|/tmp/My_Video.f137.mp4",
        )
        .unwrap();
        assert_eq!(ev.status, HookStatus::Downloading);
        assert_eq!(ev.downloaded_bytes, Some(1024));
        assert_eq!(ev.total_bytes, Some(4096));
        assert_eq!(ev.fragment_index, None);
        assert_eq!(ev.filename.as_deref(), Some("/tmp/My_Video.f137.mp4"));
        assert_eq!(ev.fraction(), Some(0.25));
    }

    #[test]
    fn test_parse_estimate_as_float() {
        let ev = FetchHookEvent::parse_line(
            "VIDIUM_PROGRESS|downloading|500|NA|2000.0|NA|NA|clip.mp4",
        )
        .unwrap();
        assert_eq!(ev.total_bytes_estimate, Some(2000));
        assert_eq!(ev.fraction(), Some(0.25));
    }

    #[test]
    fn test_fragment_fraction() {
        let ev = FetchHookEvent::parse_line("VIDIUM_PROGRESS|downloading|NA|NA|NA|3|12|clip.mp4")
            .unwrap();
        assert_eq!(ev.fraction(), Some(0.25));
    }

    #[test]
    fn test_finished_is_complete() {
        let ev = FetchHookEvent::parse_line("VIDIUM_PROGRESS|finished|NA|NA|NA|NA|NA|clip.mp4")
            .unwrap();
        assert_eq!(ev.fraction(), Some(1.0));
    }

    #[test]
    fn test_filename_with_pipe() {
        let ev = FetchHookEvent::parse_line("VIDIUM_PROGRESS|downloading|1|2|NA|NA|NA|a|b.mp4")
            .unwrap();
        assert_eq!(ev.filename.as_deref(), Some("a|b.mp4"));
    }

    #[test]
    fn test_other_lines_ignored() {
        assert!(FetchHookEvent::parse_line("[youtube] abc: Downloading webpage").is_none());
        assert!(FetchHookEvent::parse_line("").is_none());
    }

    #[test]
    fn test_unknown_sizes_have_no_fraction() {
        let ev = FetchHookEvent::parse_line("VIDIUM_PROGRESS|downloading|100|NA|NA|NA|NA|NA")
            .unwrap();
        assert_eq!(ev.fraction(), None);
        assert_eq!(ev.filename, None);
    }

    #[test]
    fn test_event_json_shape() {
        let ev = FetchHookEvent::parse_line("VIDIUM_PROGRESS|downloading|1|2|NA|NA|NA|x.mp4")
            .unwrap();
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["status"], "downloading");
        assert_eq!(json["total_bytes"], 2);
        assert!(json["fragment_count"].is_null());
    }
}
