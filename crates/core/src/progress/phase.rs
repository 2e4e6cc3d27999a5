//! Task-level progress across the phases of a composite operation.

/// Maps each phase's `0..=99` onto an equal slice of the task's `0..=99`
/// and keeps the task-level value monotonic.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    phases: u32,
    current: u32,
    last: Option<u8>,
}

impl TaskProgress {
    pub fn new(phases: u32) -> Self {
        Self {
            phases: phases.max(1),
            current: 0,
            last: None,
        }
    }

    /// Task start: always reports 0.
    pub fn start(&mut self) -> u8 {
        self.current = 0;
        self.last = Some(0);
        0
    }

    /// Maps a percentage of the current phase; `None` if nothing moved.
    pub fn phase_progress(&mut self, percent: u8) -> Option<u8> {
        let percent = u32::from(percent.min(99));
        let overall = ((self.current * 100 + percent) / self.phases).min(99) as u8;
        self.advance_to(overall)
    }

    /// Moves to the next phase and reports its starting point.
    pub fn next_phase(&mut self) -> Option<u8> {
        if self.current + 1 < self.phases {
            self.current += 1;
        }
        let overall = ((self.current * 100) / self.phases).min(99) as u8;
        self.advance_to(overall)
    }

    /// Success: reports 100 exactly once.
    pub fn finish(&mut self) -> Option<u8> {
        if self.last == Some(100) {
            return None;
        }
        self.last = Some(100);
        Some(100)
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }

    fn advance_to(&mut self, overall: u8) -> Option<u8> {
        match self.last {
            Some(last) if overall <= last => None,
            _ => {
                self.last = Some(overall);
                Some(overall)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_phase_passthrough() {
        let mut progress = TaskProgress::new(1);
        assert_eq!(progress.start(), 0);
        assert_eq!(progress.phase_progress(42), Some(42));
        assert_eq!(progress.phase_progress(99), Some(99));
        assert_eq!(progress.finish(), Some(100));
        assert_eq!(progress.finish(), None);
    }

    #[test]
    fn test_two_phases_split_range() {
        let mut progress = TaskProgress::new(2);
        progress.start();
        assert_eq!(progress.phase_progress(50), Some(25));
        assert_eq!(progress.phase_progress(99), Some(49));
        assert_eq!(progress.next_phase(), Some(50));
        assert_eq!(progress.phase_progress(0), None);
        assert_eq!(progress.phase_progress(99), Some(99));
    }

    #[test]
    fn test_three_phases_monotonic() {
        let mut progress = TaskProgress::new(3);
        let mut seen = vec![progress.start()];
        for _ in 0..3 {
            for p in [0u8, 30, 20, 60, 99] {
                seen.extend(progress.phase_progress(p));
            }
            seen.extend(progress.next_phase());
        }
        seen.extend(progress.finish());
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(seen.iter().filter(|p| **p == 100).count(), 1);
    }

    #[test]
    fn test_phase_without_percent_still_advances() {
        let mut progress = TaskProgress::new(2);
        progress.start();
        assert_eq!(progress.next_phase(), Some(50));
    }
}
