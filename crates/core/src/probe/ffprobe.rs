//! FFprobe-based prober.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::MediaProber;
use super::types::{bit_depth_of, ProbeError, ProbeResult};

/// Queries ffprobe one value at a time using its plain-text output mode.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Runs one query and returns its trimmed, non-empty stdout.
    async fn query(
        &self,
        path: &Path,
        stream: Option<&str>,
        entries: &str,
        writer: &str,
        field: &'static str,
    ) -> Result<String, ProbeError> {
        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.args(["-v", "error"]);
        if let Some(stream) = stream {
            cmd.args(["-select_streams", stream]);
        }
        cmd.args(["-show_entries", entries, "-of", writer])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProbeError::NotFound {
                    path: self.ffprobe_path.clone(),
                }
            } else {
                ProbeError::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(ProbeError::ToolFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let value = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or_default()
            .to_string();
        if value.is_empty() || value == "N/A" {
            return Err(ProbeError::Empty { field });
        }
        Ok(value)
    }

    async fn plain(
        &self,
        path: &Path,
        stream: Option<&str>,
        entries: &str,
        field: &'static str,
    ) -> Result<String, ProbeError> {
        self.query(path, stream, entries, "default=noprint_wrappers=1:nokey=1", field)
            .await
    }

    pub async fn duration(&self, path: &Path) -> Result<f64, ProbeError> {
        let value = self.plain(path, None, "format=duration", "duration").await?;
        parse_duration(&value)
    }

    /// Bitrate of the first video stream, falling back to the container's.
    pub async fn bitrate(&self, path: &Path) -> Result<u64, ProbeError> {
        let stream = self
            .plain(path, Some("v:0"), "stream=bit_rate", "bitrate")
            .await
            .and_then(|v| parse_bitrate(&v));
        match stream {
            Ok(bps) => Ok(bps),
            Err(e) => {
                debug!("Stream bitrate unavailable for {}: {}", path.display(), e);
                let value = self.plain(path, None, "format=bit_rate", "bitrate").await?;
                parse_bitrate(&value)
            }
        }
    }

    pub async fn pixel_format(&self, path: &Path) -> Result<String, ProbeError> {
        self.plain(path, Some("v:0"), "stream=pix_fmt", "pixel format")
            .await
    }

    pub async fn resolution(&self, path: &Path) -> Result<(u32, u32), ProbeError> {
        let value = self
            .query(
                path,
                Some("v:0"),
                "stream=width,height",
                "csv=s=x:p=0",
                "resolution",
            )
            .await?;
        parse_resolution(&value)
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> ProbeResult {
        let (duration, bitrate, pix_fmt, resolution) = tokio::join!(
            self.duration(path),
            self.bitrate(path),
            self.pixel_format(path),
            self.resolution(path),
        );

        let mut result = ProbeResult::unknown();
        match duration {
            Ok(secs) => result.duration_secs = Some(secs),
            Err(e) => warn!("Could not probe duration of {}: {}", path.display(), e),
        }
        match bitrate {
            Ok(bps) => result.bitrate_bps = Some(bps),
            Err(e) => warn!("Could not probe bitrate of {}: {}", path.display(), e),
        }
        match pix_fmt {
            Ok(pix_fmt) => {
                result.bit_depth = bit_depth_of(&pix_fmt);
                result.pixel_format = Some(pix_fmt);
            }
            Err(e) => debug!("No pixel format for {}: {}", path.display(), e),
        }
        match resolution {
            Ok((w, h)) => {
                result.width = Some(w);
                result.height = Some(h);
            }
            Err(e) => debug!("No resolution for {}: {}", path.display(), e),
        }

        debug!("Probed {}: {:?}", path.display(), result);
        result
    }
}

fn parse_duration(value: &str) -> Result<f64, ProbeError> {
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(ProbeError::Unparsable {
            field: "duration",
            value: value.to_string(),
        }),
    }
}

fn parse_bitrate(value: &str) -> Result<u64, ProbeError> {
    match value.parse::<u64>() {
        Ok(bps) if bps > 0 => Ok(bps),
        _ => Err(ProbeError::Unparsable {
            field: "bitrate",
            value: value.to_string(),
        }),
    }
}

fn parse_resolution(value: &str) -> Result<(u32, u32), ProbeError> {
    let unparsable = || ProbeError::Unparsable {
        field: "resolution",
        value: value.to_string(),
    };
    let (w, h) = value.split_once('x').ok_or_else(unparsable)?;
    let w = w.trim().parse().map_err(|_| unparsable())?;
    let h = h.trim().trim_end_matches('x').parse().map_err(|_| unparsable())?;
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("125.340000").unwrap(), 125.34);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-1").is_err());
    }

    #[test]
    fn test_parse_bitrate() {
        assert_eq!(parse_bitrate("4000000").unwrap(), 4_000_000);
        assert!(parse_bitrate("0").is_err());
        assert!(parse_bitrate("fast").is_err());
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        // Some builds print a trailing separator.
        assert_eq!(parse_resolution("1280x720x").unwrap(), (1280, 720));
        assert!(parse_resolution("1920").is_err());
    }

    #[tokio::test]
    async fn test_missing_ffprobe_yields_unknown() {
        let prober = FfprobeProber::new("/nonexistent/ffprobe");
        let result = prober.probe(Path::new("/tmp/whatever.mp4")).await;
        assert_eq!(result, ProbeResult::unknown());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_with_fake_tool() {
        use crate::testing::{fake_ffprobe_script, write_script};
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let script = write_script(
            dir.path(),
            "ffprobe",
            &fake_ffprobe_script(&ProbeResult::unknown()
                .with_duration(42.0)
                .with_bitrate(3_000_000)
                .with_resolution(1920, 1080)
                .with_pixel_format("yuv420p10le")),
        );

        let prober = FfprobeProber::new(script);
        let result = prober.probe(&dir.path().join("input.mp4")).await;
        assert_eq!(result.duration_secs, Some(42.0));
        assert_eq!(result.bitrate_bps, Some(3_000_000));
        assert_eq!(result.width, Some(1920));
        assert_eq!(result.height, Some(1080));
        assert!(result.is_ten_bit());
    }
}
