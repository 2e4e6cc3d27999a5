//! `HH:MM:SS:MS` timecodes for trim ranges.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::trim::TrimError;

/// A point in a media file. The last field is milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timecode {
    hours: u32,
    minutes: u32,
    seconds: u32,
    millis: u32,
}

impl Timecode {
    pub fn new(hours: u32, minutes: u32, seconds: u32, millis: u32) -> Result<Self, TrimError> {
        if minutes > 59 || seconds > 59 || millis > 999 {
            return Err(TrimError::InvalidTimecode(format!(
                "{:02}:{:02}:{:02}:{:03}",
                hours, minutes, seconds, millis
            )));
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
            millis,
        })
    }

    pub fn total_millis(&self) -> u64 {
        ((u64::from(self.hours) * 60 + u64::from(self.minutes)) * 60 + u64::from(self.seconds))
            * 1000
            + u64::from(self.millis)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.total_millis() as f64 / 1000.0
    }

    /// `HH:MM:SS.mmm`, as accepted by the encoder's `-ss`/`-t`.
    pub fn to_ffmpeg(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            self.hours, self.minutes, self.seconds, self.millis
        )
    }

    /// Filename-safe form: `SS_MS`, `MM_SS_MS` or `HH_MM_SS`, dropping
    /// leading zero units.
    pub fn compact(&self) -> String {
        if self.hours == 0 && self.minutes == 0 {
            format!("{:02}_{:03}", self.seconds, self.millis)
        } else if self.hours == 0 {
            format!("{:02}_{:02}_{:03}", self.minutes, self.seconds, self.millis)
        } else {
            format!("{:02}_{:02}_{:02}", self.hours, self.minutes, self.seconds)
        }
    }
}

/// Formats a millisecond span the way `-t` expects it.
pub(crate) fn format_millis(total: u64) -> String {
    let millis = total % 1000;
    let secs = total / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        millis
    )
}

impl FromStr for Timecode {
    type Err = TrimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TrimError::InvalidTimecode(s.to_string());
        let fields = s
            .trim()
            .split(':')
            .map(|f| f.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;

        match fields[..] {
            [h, m, sec] => Self::new(h, m, sec, 0).map_err(|_| invalid()),
            [h, m, sec, ms] => Self::new(h, m, sec, ms).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Timecode {
    type Error = TrimError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timecode> for String {
    fn from(tc: Timecode) -> String {
        tc.to_string()
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:03}",
            self.hours, self.minutes, self.seconds, self.millis
        )
    }
}
