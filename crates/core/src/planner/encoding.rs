//! Maps user intents and probe data to an [`EncodingPlan`].

use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::config::EncodingConfig;
use super::format::{Quality, TargetFormat};
use super::plan::{
    AudioOnlyPlan, AudioPolicy, EncodingPlan, GifPlan, HwAccel, VideoCodec, VideoPlan,
};
use crate::probe::ProbeResult;

/// Pure planner for convert operations. Never fails: unknown probe values
/// are replaced by configured fallbacks.
#[derive(Debug, Clone)]
pub struct EncodingPlanner {
    config: EncodingConfig,
    temp_dir: PathBuf,
}

impl EncodingPlanner {
    /// `temp_dir` receives GIF palette images.
    pub fn new(config: EncodingConfig, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn config(&self) -> &EncodingConfig {
        &self.config
    }

    pub fn plan(
        &self,
        target: TargetFormat,
        quality: Quality,
        use_gpu: bool,
        probe: &ProbeResult,
    ) -> EncodingPlan {
        match target {
            TargetFormat::Mp3 => EncodingPlan::AudioOnly(AudioOnlyPlan {
                codec: "libmp3lame".to_string(),
                quality: Some(2),
                sample_rate: None,
            }),
            TargetFormat::Wav => EncodingPlan::AudioOnly(AudioOnlyPlan {
                codec: "pcm_s16le".to_string(),
                quality: None,
                sample_rate: Some(48_000),
            }),
            TargetFormat::Gif => EncodingPlan::Gif(GifPlan {
                fps: if quality.percent() >= 80 { 30 } else { 10 },
                width: self.config.gif_width,
                palette_path: self.palette_path(),
            }),
            TargetFormat::Webm => EncodingPlan::Video(self.software_plan(target, quality, probe)),
            TargetFormat::Mp4 | TargetFormat::Mkv => {
                if use_gpu {
                    EncodingPlan::Video(self.hardware_plan(target, quality, probe))
                } else {
                    EncodingPlan::Video(self.software_plan(target, quality, probe))
                }
            }
        }
    }

    fn palette_path(&self) -> PathBuf {
        self.temp_dir
            .join(format!("vidium-palette-{}.png", Uuid::new_v4().simple()))
    }

    fn hardware_plan(&self, target: TargetFormat, quality: Quality, probe: &ProbeResult) -> VideoPlan {
        let ten_bit = probe.is_ten_bit();
        let ceiling = probe
            .bitrate_bps
            .map(|bps| quality.scale(bps))
            .unwrap_or(self.config.fallback_bitrate_bps);

        let (codec, profile, pix_fmt) = if ten_bit {
            (VideoCodec::HevcNvenc, Some("main10".to_string()), "p010le")
        } else {
            (VideoCodec::H264Nvenc, None, "yuv420p")
        };

        VideoPlan {
            codec,
            crf: None,
            preset: None,
            bitrate_ceiling_bps: Some(ceiling),
            profile,
            pixel_format: Some(pix_fmt.to_string()),
            hwaccel: Some(HwAccel::cuda(ten_bit)),
            filter: even_dimensions_filter(probe),
            audio: audio_policy(target),
        }
    }

    fn software_plan(&self, target: TargetFormat, quality: Quality, probe: &ProbeResult) -> VideoPlan {
        let cap = probe.bitrate_bps.map(|bps| quality.scale(bps));

        if target == TargetFormat::Webm {
            return VideoPlan {
                codec: VideoCodec::LibvpxVp9,
                crf: Some(vp9_crf(quality)),
                preset: None,
                bitrate_ceiling_bps: cap,
                profile: None,
                pixel_format: Some("yuv420p".to_string()),
                hwaccel: None,
                filter: even_dimensions_filter(probe),
                audio: audio_policy(target),
            };
        }

        let (crf, preset) = x264_tier(quality);
        VideoPlan {
            codec: VideoCodec::Libx264,
            crf: Some(crf),
            preset: Some(preset.to_string()),
            bitrate_ceiling_bps: cap,
            profile: None,
            pixel_format: Some("yuv420p".to_string()),
            hwaccel: None,
            filter: even_dimensions_filter(probe),
            audio: audio_policy(target),
        }
    }

    /// Where a GIF plan places its palette; exposed for cleanup checks.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

/// CRF and preset for libx264: higher quality trades speed for size.
fn x264_tier(quality: Quality) -> (u8, &'static str) {
    match quality.percent() {
        90..=u8::MAX => (18, "slow"),
        70..=89 => (21, "medium"),
        40..=69 => (23, "fast"),
        _ => (28, "faster"),
    }
}

fn vp9_crf(quality: Quality) -> u8 {
    match quality.percent() {
        90..=u8::MAX => 24,
        70..=89 => 30,
        40..=69 => 34,
        _ => 40,
    }
}

fn audio_policy(target: TargetFormat) -> AudioPolicy {
    match target {
        TargetFormat::Mkv => AudioPolicy::Copy,
        TargetFormat::Webm => AudioPolicy::Transcode {
            codec: "libopus".to_string(),
            bitrate_kbps: 128,
        },
        _ => AudioPolicy::Transcode {
            codec: "aac".to_string(),
            bitrate_kbps: 192,
        },
    }
}

/// 4:2:0 output needs even dimensions.
fn even_dimensions_filter(probe: &ProbeResult) -> Option<String> {
    match (probe.width, probe.height) {
        (Some(w), Some(h)) if w % 2 == 1 || h % 2 == 1 => {
            Some("scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string())
        }
        _ => None,
    }
}
