//! Declarative encode plans and their serialization to encoder arguments.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::runner::ProcessSpec;

/// Video encoders the planners choose between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    Libx264,
    LibvpxVp9,
    H264Nvenc,
    HevcNvenc,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Libx264 => "libx264",
            Self::LibvpxVp9 => "libvpx-vp9",
            Self::H264Nvenc => "h264_nvenc",
            Self::HevcNvenc => "hevc_nvenc",
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::H264Nvenc | Self::HevcNvenc)
    }
}

/// What happens to the audio stream of a video encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum AudioPolicy {
    Copy,
    Transcode { codec: String, bitrate_kbps: u32 },
}

impl AudioPolicy {
    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            Self::Copy => push(args, ["-c:a", "copy"]),
            Self::Transcode {
                codec,
                bitrate_kbps,
            } => {
                push(args, ["-c:a", codec.as_str()]);
                args.push("-b:a".to_string());
                args.push(format!("{}k", bitrate_kbps));
            }
        }
    }
}

/// Hardware decode flags placed before the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwAccel {
    /// Frame format handed from the decoder (`nv12` or `p010le`).
    pub output_format: String,
}

impl HwAccel {
    pub fn cuda(ten_bit: bool) -> Self {
        Self {
            output_format: if ten_bit { "p010le" } else { "nv12" }.to_string(),
        }
    }

    fn args(&self) -> Vec<String> {
        strings([
            "-hwaccel",
            "cuda",
            "-hwaccel_output_format",
            self.output_format.as_str(),
        ])
    }
}

/// Single-pass video encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoPlan {
    pub codec: VideoCodec,
    /// Constant rate factor for software encoders.
    pub crf: Option<u8>,
    pub preset: Option<String>,
    /// Bitrate ceiling in bits per second.
    pub bitrate_ceiling_bps: Option<u64>,
    pub profile: Option<String>,
    pub pixel_format: Option<String>,
    pub hwaccel: Option<HwAccel>,
    /// Extra `-vf` chain.
    pub filter: Option<String>,
    pub audio: AudioPolicy,
}

impl VideoPlan {
    fn output_args(&self) -> Vec<String> {
        let mut args = strings(["-c:v", self.codec.as_str()]);
        if let Some(preset) = &self.preset {
            push(&mut args, ["-preset", preset.as_str()]);
        }

        match self.codec {
            VideoCodec::LibvpxVp9 => {
                push(
                    &mut args,
                    [
                        "-quality",
                        "good",
                        "-cpu-used",
                        "4",
                        "-tile-columns",
                        "6",
                        "-frame-parallel",
                        "1",
                    ],
                );
                if let Some(crf) = self.crf {
                    args.push("-crf".to_string());
                    args.push(crf.to_string());
                }
                // VP9 reads -b:v as a cap in CRF mode; 0 means uncapped.
                args.push("-b:v".to_string());
                args.push(self.bitrate_ceiling_bps.unwrap_or(0).to_string());
            }
            VideoCodec::Libx264 => {
                if let Some(crf) = self.crf {
                    args.push("-crf".to_string());
                    args.push(crf.to_string());
                }
                if let Some(cap) = self.bitrate_ceiling_bps {
                    push_rate_cap(&mut args, cap);
                }
            }
            VideoCodec::H264Nvenc | VideoCodec::HevcNvenc => {
                if let Some(cap) = self.bitrate_ceiling_bps {
                    args.push("-b:v".to_string());
                    args.push(cap.to_string());
                    push_rate_cap(&mut args, cap);
                }
            }
        }

        if let Some(profile) = &self.profile {
            push(&mut args, ["-profile:v", profile.as_str()]);
        }
        if let Some(pix_fmt) = &self.pixel_format {
            push(&mut args, ["-pix_fmt", pix_fmt.as_str()]);
        }
        if let Some(filter) = &self.filter {
            push(&mut args, ["-vf", filter.as_str()]);
        }
        self.audio.push_args(&mut args);
        args
    }
}

/// Audio-only target: the video stream is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioOnlyPlan {
    pub codec: String,
    /// Variable-bitrate quality (`-q:a`).
    pub quality: Option<u8>,
    pub sample_rate: Option<u32>,
}

impl AudioOnlyPlan {
    fn output_args(&self) -> Vec<String> {
        let mut args = strings(["-vn", "-c:a", self.codec.as_str()]);
        if let Some(q) = self.quality {
            args.push("-q:a".to_string());
            args.push(q.to_string());
        }
        if let Some(rate) = self.sample_rate {
            args.push("-ar".to_string());
            args.push(rate.to_string());
        }
        args
    }
}

/// Two-phase GIF pipeline: palette generation, then paletted encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GifPlan {
    pub fps: u32,
    pub width: u32,
    /// Temporary palette image; owned by the task running the plan.
    pub palette_path: PathBuf,
}

impl GifPlan {
    fn scale_chain(&self) -> String {
        format!("fps={},scale={}:-1:flags=lanczos", self.fps, self.width)
    }

    pub fn palette_invocation(&self, input: &Path) -> Invocation {
        let post = strings(["-vf", &format!("{},palettegen", self.scale_chain())]);
        Invocation::ffmpeg(&[], &[input], &post, &self.palette_path)
    }

    pub fn encode_invocation(&self, input: &Path, output: &Path) -> Invocation {
        let post = strings([
            "-filter_complex",
            &format!("{}[x];[x][1:v]paletteuse", self.scale_chain()),
        ]);
        Invocation::ffmpeg(&[], &[input, &self.palette_path], &post, output)
    }
}

/// Encoder parameters for one task, built once and serialized at the
/// process boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodingPlan {
    Video(VideoPlan),
    AudioOnly(AudioOnlyPlan),
    Gif(GifPlan),
}

impl EncodingPlan {
    /// Flags placed before `-i`.
    pub fn input_args(&self) -> Vec<String> {
        match self {
            Self::Video(VideoPlan {
                hwaccel: Some(hw), ..
            }) => hw.args(),
            _ => Vec::new(),
        }
    }

    /// Codec and filter flags placed after the input. For GIF plans these
    /// are the flags of the paletted phase, which reads the palette as a
    /// second input.
    pub fn output_args(&self) -> Vec<String> {
        match self {
            Self::Video(plan) => plan.output_args(),
            Self::AudioOnly(plan) => plan.output_args(),
            Self::Gif(plan) => strings([
                "-filter_complex",
                &format!("{}[x];[x][1:v]paletteuse", plan.scale_chain()),
            ]),
        }
    }

    pub fn bitrate_ceiling_bps(&self) -> Option<u64> {
        match self {
            Self::Video(plan) => plan.bitrate_ceiling_bps,
            _ => None,
        }
    }

    pub fn uses_hardware(&self) -> bool {
        matches!(self, Self::Video(plan) if plan.codec.is_hardware())
    }

    pub fn palette_path(&self) -> Option<&Path> {
        match self {
            Self::Gif(plan) => Some(&plan.palette_path),
            _ => None,
        }
    }

    /// Encoder invocations, in order, to turn `input` into `output`.
    pub fn invocations(&self, input: &Path, output: &Path) -> Vec<Invocation> {
        match self {
            Self::Gif(plan) => vec![
                plan.palette_invocation(input),
                plan.encode_invocation(input, output),
            ],
            _ => vec![Invocation::ffmpeg(
                &self.input_args(),
                &[input],
                &self.output_args(),
                output,
            )],
        }
    }
}

/// A fully serialized encoder command line, minus the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    /// File the invocation writes; removed if it is cancelled.
    pub output: PathBuf,
}

impl Invocation {
    /// `-y -hide_banner <pre> -i <input>... <post> -progress pipe:1 <output>`
    pub fn ffmpeg(pre_input: &[String], inputs: &[&Path], post: &[String], output: &Path) -> Self {
        let mut args = strings(["-y", "-hide_banner"]);
        args.extend(pre_input.iter().cloned());
        for input in inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().into_owned());
        }
        args.extend(post.iter().cloned());
        push(&mut args, ["-progress", "pipe:1"]);
        args.push(output.to_string_lossy().into_owned());
        Self {
            args,
            output: output.to_path_buf(),
        }
    }

    pub fn into_spec(self, program: &Path) -> ProcessSpec {
        ProcessSpec::new(program)
            .args(self.args)
            .cleanup_on_cancel(self.output)
    }
}

fn push_rate_cap(args: &mut Vec<String>, cap: u64) {
    args.push("-maxrate".to_string());
    args.push(cap.to_string());
    args.push("-bufsize".to_string());
    args.push(cap.saturating_mul(2).to_string());
}

fn push<const N: usize>(args: &mut Vec<String>, items: [&str; N]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
