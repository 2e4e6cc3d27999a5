//! Elapsed-time based progress for encoder runs.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// `time=HH:MM:SS.ss` on stats lines, also matches `out_time=`.
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"time=(-?)(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").unwrap());

/// `out_time_us=` / `out_time_ms=` from `-progress`; both are microseconds.
static OUT_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^out_time_(?:us|ms)=(\d+)$").unwrap());

/// Extracts elapsed output time in seconds from one encoder line.
pub fn parse_elapsed_secs(line: &str) -> Option<f64> {
    let line = line.trim();
    if let Some(caps) = OUT_TIME_RE.captures(line) {
        let micros: u64 = caps[1].parse().ok()?;
        return Some(micros as f64 / 1_000_000.0);
    }

    let caps = TIME_RE.captures(line)?;
    if !caps[1].is_empty() {
        return None;
    }
    let hours: f64 = caps[2].parse().ok()?;
    let minutes: f64 = caps[3].parse().ok()?;
    let seconds: f64 = caps[4].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Converts encoder output into a percentage capped at 99 while running.
#[derive(Debug, Clone)]
pub struct EncodeProgress {
    total_secs: Option<f64>,
    last: Option<u8>,
}

impl EncodeProgress {
    /// With an unknown or zero total no percentage is ever produced.
    pub fn new(total_secs: Option<f64>) -> Self {
        Self {
            total_secs: total_secs.filter(|t| t.is_finite() && *t > 0.0),
            last: None,
        }
    }

    pub fn is_determinate(&self) -> bool {
        self.total_secs.is_some()
    }

    /// Returns a new percentage when `line` moves progress forward.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        let total = self.total_secs?;
        let elapsed = parse_elapsed_secs(line)?;
        let percent = (elapsed / total * 100.0).clamp(0.0, 99.0) as u8;
        match self.last {
            Some(last) if percent <= last => None,
            _ => {
                self.last = Some(percent);
                Some(percent)
            }
        }
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}
