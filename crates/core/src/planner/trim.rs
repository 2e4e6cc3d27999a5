//! Trim range validation and seek strategy.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::naming::{
    avoid_source_collision, dotted_extension, file_stem, intermediate_path, trim_suffix,
    trimmed_stem,
};
use super::plan::{HwAccel, Invocation, VideoCodec};
use super::timecode::{format_millis, Timecode};
use crate::probe::ProbeResult;

/// Trim requests rejected before any process is launched.
#[derive(Debug, Error)]
pub enum TrimError {
    #[error("invalid timecode {0:?}: expected HH:MM:SS:MS")]
    InvalidTimecode(String),

    #[error("start {start} must be before end {end}")]
    StartNotBeforeEnd { start: Timecode, end: Timecode },

    #[error("end {end} exceeds source duration of {duration_secs:.3}s")]
    EndBeyondDuration { end: Timecode, duration_secs: f64 },

    #[error("source duration is unknown, cannot validate trim range")]
    UnknownDuration,
}

/// Encoder settings for a frame-accurate trim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReEncodeSettings {
    pub codec: VideoCodec,
    /// Mirrors the source bitrate rather than the quality slider.
    pub bitrate_bps: u64,
    pub hwaccel: Option<HwAccel>,
    pub profile: Option<String>,
    pub pixel_format: Option<String>,
    pub preset: Option<String>,
    /// Constant quantizer for hardware encoders.
    pub qp: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TrimMode {
    /// Seek before the input and copy streams. Fast, keyframe-aligned.
    StreamCopy,
    /// Seek after the input and re-encode. Frame-accurate.
    ReEncode(ReEncodeSettings),
}

/// A validated trim of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimSpec {
    pub start: Timecode,
    pub end: Timecode,
    pub source_duration_secs: f64,
    pub mode: TrimMode,
    /// Where the encoder writes: `<source dir>/<stem>_temp<ext>`.
    pub intermediate_path: PathBuf,
    /// Final, timestamp-suffixed name in the output directory.
    pub output_path: PathBuf,
}

impl TrimSpec {
    pub fn segment_millis(&self) -> u64 {
        self.end.total_millis() - self.start.total_millis()
    }

    pub fn segment_secs(&self) -> f64 {
        self.segment_millis() as f64 / 1000.0
    }

    /// Stem of the final output, used to name a follow-up conversion.
    pub fn output_stem(&self) -> String {
        file_stem(&self.output_path)
    }

    pub fn invocation(&self, input: &Path) -> Invocation {
        let duration = format_millis(self.segment_millis());
        let start = self.start.to_ffmpeg();

        match &self.mode {
            TrimMode::StreamCopy => {
                let pre = vec!["-ss".to_string(), start];
                let post = vec![
                    "-t".to_string(),
                    duration,
                    "-c".to_string(),
                    "copy".to_string(),
                ];
                Invocation::ffmpeg(&pre, &[input], &post, &self.intermediate_path)
            }
            TrimMode::ReEncode(settings) => {
                let mut pre = Vec::new();
                if let Some(hw) = &settings.hwaccel {
                    pre.extend([
                        "-hwaccel".to_string(),
                        "cuda".to_string(),
                        "-hwaccel_output_format".to_string(),
                        hw.output_format.clone(),
                    ]);
                }

                let mut post = vec![
                    "-ss".to_string(),
                    start,
                    "-t".to_string(),
                    duration,
                    "-c:v".to_string(),
                    settings.codec.as_str().to_string(),
                ];
                if let Some(preset) = &settings.preset {
                    post.extend(["-preset".to_string(), preset.clone()]);
                }
                if let Some(qp) = settings.qp {
                    post.extend(["-qp".to_string(), qp.to_string()]);
                }
                if let Some(profile) = &settings.profile {
                    post.extend(["-profile:v".to_string(), profile.clone()]);
                }
                if let Some(pix_fmt) = &settings.pixel_format {
                    post.extend(["-pix_fmt".to_string(), pix_fmt.clone()]);
                }
                let rate = settings.bitrate_bps.to_string();
                post.extend([
                    "-b:v".to_string(),
                    rate.clone(),
                    "-maxrate".to_string(),
                    rate,
                    "-bufsize".to_string(),
                    settings.bitrate_bps.saturating_mul(2).to_string(),
                    "-c:a".to_string(),
                    "copy".to_string(),
                ]);
                Invocation::ffmpeg(&pre, &[input], &post, &self.intermediate_path)
            }
        }
    }
}

/// How the caller intends to use the trimmed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOptions {
    pub use_gpu: bool,
    /// The segment feeds a re-encode, so the seek must be frame-accurate.
    pub reencode: bool,
}

#[derive(Debug, Clone)]
pub struct TrimPlanner {
    fallback_bitrate_bps: u64,
}

impl TrimPlanner {
    pub fn new(fallback_bitrate_bps: u64) -> Self {
        Self {
            fallback_bitrate_bps,
        }
    }

    /// Validates `start < end <= duration` and picks the seek strategy.
    pub fn plan(
        &self,
        source: &Path,
        output_dir: &Path,
        start: Timecode,
        end: Timecode,
        probe: &ProbeResult,
        options: TrimOptions,
    ) -> Result<TrimSpec, TrimError> {
        if start >= end {
            return Err(TrimError::StartNotBeforeEnd { start, end });
        }
        let duration = probe.duration_secs.ok_or(TrimError::UnknownDuration)?;
        // Compare in whole milliseconds; probe durations carry float noise.
        let duration_millis = (duration * 1000.0).round() as u64;
        if end.total_millis() > duration_millis {
            return Err(TrimError::EndBeyondDuration {
                end,
                duration_secs: duration,
            });
        }

        let (mode, ext) = if options.reencode {
            (
                TrimMode::ReEncode(self.reencode_settings(probe, options.use_gpu)),
                ".mp4".to_string(),
            )
        } else {
            (TrimMode::StreamCopy, dotted_extension(source))
        };

        let stem = trimmed_stem(&file_stem(source), &trim_suffix(&start, &end));
        let output_path = avoid_source_collision(
            output_dir.join(format!("{}{}", stem, ext)),
            source,
            "_trimmed",
        );

        Ok(TrimSpec {
            start,
            end,
            source_duration_secs: duration,
            mode,
            intermediate_path: intermediate_path(source, &ext),
            output_path,
        })
    }

    fn reencode_settings(&self, probe: &ProbeResult, use_gpu: bool) -> ReEncodeSettings {
        let bitrate_bps = probe.bitrate_bps.unwrap_or(self.fallback_bitrate_bps);
        let ten_bit = probe.is_ten_bit();

        if use_gpu {
            let (codec, profile, pix_fmt) = if ten_bit {
                (
                    VideoCodec::HevcNvenc,
                    Some("main10".to_string()),
                    Some("p010le".to_string()),
                )
            } else {
                (VideoCodec::H264Nvenc, None, None)
            };
            return ReEncodeSettings {
                codec,
                bitrate_bps,
                hwaccel: Some(HwAccel::cuda(ten_bit)),
                profile,
                pixel_format: pix_fmt,
                preset: None,
                qp: Some(18),
            };
        }

        // The intermediate is always .mp4, whatever the source container.
        ReEncodeSettings {
            codec: VideoCodec::Libx264,
            bitrate_bps,
            hwaccel: None,
            profile: None,
            pixel_format: None,
            preset: Some("veryslow".to_string()),
            qp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(s: &str) -> Timecode {
        s.parse().unwrap()
    }

    fn planner() -> TrimPlanner {
        TrimPlanner::new(5_000_000)
    }

    fn copy() -> TrimOptions {
        TrimOptions {
            use_gpu: false,
            reencode: false,
        }
    }

    fn probe() -> ProbeResult {
        ProbeResult::unknown().with_duration(60.0).with_bitrate(6_000_000)
    }

    #[test]
    fn test_rejects_start_after_end() {
        let err = planner()
            .plan(
                Path::new("/v/clip.mp4"),
                Path::new("/out"),
                tc("00:00:10:00"),
                tc("00:00:05:00"),
                &probe(),
                copy(),
            )
            .unwrap_err();
        assert!(matches!(err, TrimError::StartNotBeforeEnd { .. }));
    }

    #[test]
    fn test_rejects_empty_range() {
        let err = planner()
            .plan(
                Path::new("/v/clip.mp4"),
                Path::new("/out"),
                tc("00:00:05:00"),
                tc("00:00:05:00"),
                &probe(),
                copy(),
            )
            .unwrap_err();
        assert!(matches!(err, TrimError::StartNotBeforeEnd { .. }));
    }

    #[test]
    fn test_rejects_end_beyond_duration() {
        let err = planner()
            .plan(
                Path::new("/v/clip.mp4"),
                Path::new("/out"),
                tc("00:00:10:00"),
                tc("00:01:00:001"),
                &probe(),
                copy(),
            )
            .unwrap_err();
        assert!(matches!(err, TrimError::EndBeyondDuration { .. }));

        // Exactly at the end is fine.
        assert!(planner()
            .plan(
                Path::new("/v/clip.mp4"),
                Path::new("/out"),
                tc("00:00:10:00"),
                tc("00:01:00:000"),
                &probe(),
                copy(),
            )
            .is_ok());
    }

    #[test]
    fn test_unknown_duration_is_rejected() {
        let err = planner()
            .plan(
                Path::new("/v/clip.mp4"),
                Path::new("/out"),
                tc("00:00:01:00"),
                tc("00:00:02:00"),
                &ProbeResult::unknown(),
                copy(),
            )
            .unwrap_err();
        assert!(matches!(err, TrimError::UnknownDuration));
    }

    #[test]
    fn test_stream_copy_seeks_before_input() {
        let spec = planner()
            .plan(
                Path::new("/v/clip.mkv"),
                Path::new("/out"),
                tc("00:00:05:250"),
                tc("00:00:10:000"),
                &probe(),
                copy(),
            )
            .unwrap();
        assert_eq!(spec.mode, TrimMode::StreamCopy);
        assert_eq!(spec.intermediate_path, PathBuf::from("/v/clip_temp.mkv"));
        assert_eq!(
            spec.output_path,
            PathBuf::from("/out/clip_05_250_to_10_000.mkv")
        );
        assert_eq!(spec.segment_millis(), 4_750);

        let args = spec.invocation(Path::new("/v/clip.mkv")).args;
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(args[ss + 1], "00:00:05.250");
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "00:00:04.750");
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
    }

    #[test]
    fn test_reencode_of_webm_source_uses_x264() {
        let spec = planner()
            .plan(
                Path::new("/v/clip.webm"),
                Path::new("/out"),
                tc("00:00:01:000"),
                tc("00:00:03:000"),
                &probe(),
                TrimOptions {
                    use_gpu: false,
                    reencode: true,
                },
            )
            .unwrap();
        assert_eq!(spec.intermediate_path, PathBuf::from("/v/clip_temp.mp4"));
        match &spec.mode {
            TrimMode::ReEncode(settings) => {
                assert_eq!(settings.codec, VideoCodec::Libx264);
                assert_eq!(settings.preset.as_deref(), Some("veryslow"));
                assert_eq!(settings.bitrate_bps, 6_000_000);
            }
            other => panic!("expected re-encode, got {:?}", other),
        }

        let args = spec.invocation(Path::new("/v/clip.webm")).args;
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss > input);
        assert!(args.windows(2).any(|w| w == ["-bufsize", "12000000"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "copy"]));
    }

    #[test]
    fn test_reencode_gpu_ten_bit() {
        let probe = probe().with_pixel_format("yuv420p10le");
        let spec = planner()
            .plan(
                Path::new("/v/clip.mp4"),
                Path::new("/out"),
                tc("00:00:01:000"),
                tc("00:00:03:000"),
                &probe,
                TrimOptions {
                    use_gpu: true,
                    reencode: true,
                },
            )
            .unwrap();
        let args = spec.invocation(Path::new("/v/clip.mp4")).args;
        assert!(args.windows(2).any(|w| w == ["-c:v", "hevc_nvenc"]));
        assert!(args.windows(2).any(|w| w == ["-profile:v", "main10"]));
        assert!(args.windows(2).any(|w| w == ["-qp", "18"]));
        assert!(args.windows(2).any(|w| w == ["-hwaccel", "cuda"]));
    }

    #[test]
    fn test_reencode_cpu_fallback_bitrate() {
        let probe = ProbeResult::unknown().with_duration(10.0);
        let spec = planner()
            .plan(
                Path::new("/v/clip.mov"),
                Path::new("/out"),
                tc("00:00:01:000"),
                tc("00:00:03:000"),
                &probe,
                TrimOptions {
                    use_gpu: false,
                    reencode: true,
                },
            )
            .unwrap();
        let args = spec.invocation(Path::new("/v/clip.mov")).args;
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "veryslow"]));
        assert!(args.windows(2).any(|w| w == ["-b:v", "5000000"]));
    }

    #[test]
    fn test_output_never_overwrites_source() {
        // A source already at the length limit with the same suffix would
        // truncate back to its own name.
        let stem = format!("{}_01_000_to_02_000", "a".repeat(83));
        let source = PathBuf::from(format!("/v/{}.mp4", stem));
        let spec = planner()
            .plan(
                &source,
                Path::new("/v"),
                tc("00:00:01:000"),
                tc("00:00:02:000"),
                &probe(),
                copy(),
            )
            .unwrap();
        assert_ne!(spec.output_path, source);
        assert_eq!(
            spec.output_path,
            PathBuf::from(format!("/v/{}_trimmed.mp4", stem))
        );
    }

    #[test]
    fn test_long_name_truncated() {
        let source = PathBuf::from(format!("/v/{}.mp4", "a".repeat(140)));
        let spec = planner()
            .plan(
                &source,
                Path::new("/out"),
                tc("00:00:01:000"),
                tc("00:00:02:000"),
                &probe(),
                copy(),
            )
            .unwrap();
        assert_eq!(spec.output_stem().chars().count(), 100);
    }
}
