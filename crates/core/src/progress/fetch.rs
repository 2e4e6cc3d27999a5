//! Multi-part download progress.
//!
//! A fetch may download several files (separate video and audio streams,
//! fragmented streams) before merging them. The overall percentage is
//! computed against an estimated part count that only ever grows, so a part
//! discovered late pulls the figure down instead of letting the first part
//! report 100.

use serde::{Deserialize, Serialize};

use super::hook::{FetchHookEvent, HookStatus};

/// Bookkeeping for one downloaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadPart {
    /// File name reported by the fetch tool, or a positional id.
    pub id: String,
    /// Completion in `[0, 1]`.
    pub fraction: f64,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct FetchProgress {
    parts: Vec<DownloadPart>,
    estimated_total: usize,
    last: Option<u8>,
}

impl FetchProgress {
    /// `expected_parts` seeds the estimate (2 for merged selectors).
    pub fn new(expected_parts: usize) -> Self {
        Self {
            parts: Vec::new(),
            estimated_total: expected_parts.max(1),
            last: None,
        }
    }

    pub fn parts(&self) -> &[DownloadPart] {
        &self.parts
    }

    pub fn estimated_total(&self) -> usize {
        self.estimated_total
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Applies one hook event; returns the percentage when it changed.
    pub fn observe(&mut self, event: &FetchHookEvent) -> Option<u8> {
        if !matches!(event.status, HookStatus::Downloading | HookStatus::Finished) {
            return None;
        }

        let mut corrected = false;
        let idx = match self.part_index(event) {
            Some(idx) => idx,
            None => {
                let id = event
                    .filename
                    .clone()
                    .unwrap_or_else(|| format!("part-{}", self.parts.len() + 1));
                self.parts.push(DownloadPart {
                    id,
                    fraction: 0.0,
                    completed: false,
                });
                // The first part is not a correction, only later ones are.
                corrected = self.parts.len() > 1;
                self.parts.len() - 1
            }
        };

        let part = &mut self.parts[idx];
        if event.status == HookStatus::Finished {
            part.fraction = 1.0;
            part.completed = true;
        } else if let Some(fraction) = event.fraction() {
            part.fraction = fraction;
        }

        if self.parts.len() > self.estimated_total {
            self.estimated_total = self.parts.len();
            corrected = true;
        }

        let computed = self.compute();
        let percent = match self.last {
            Some(last) if !corrected => last.max(computed),
            _ => computed,
        };
        if self.last == Some(percent) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }

    /// Final completion signal: always 100.
    pub fn complete(&mut self) -> u8 {
        self.last = Some(100);
        100
    }

    fn part_index(&self, event: &FetchHookEvent) -> Option<usize> {
        match &event.filename {
            Some(name) => self.parts.iter().position(|p| &p.id == name),
            // Unnamed events belong to whatever is currently downloading.
            None => self
                .parts
                .iter()
                .rposition(|p| !p.completed)
                .or_else(|| self.parts.len().checked_sub(1)),
        }
    }

    fn compute(&self) -> u8 {
        let completed = self.parts.iter().filter(|p| p.completed).count();
        let in_flight: f64 = self
            .parts
            .iter()
            .filter(|p| !p.completed)
            .map(|p| p.fraction)
            .sum();
        let effective_total = self.estimated_total.max(completed + 1);
        let overall = (completed as f64 + in_flight) / effective_total as f64 * 100.0;
        overall.clamp(0.0, 99.0) as u8
    }
}
