//! Shell-script stand-ins for ffmpeg, ffprobe and yt-dlp.
//!
//! The scripts speak just enough of each tool's output format for the
//! runner, estimators and coordinator to be driven end to end.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::probe::ProbeResult;
use crate::progress::HOOK_PREFIX;
use crate::fetch::OUTPUT_PREFIX;

/// Writes an executable script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    {
        let mut file = fs::File::create(&path).expect("create script");
        file.write_all(body.as_bytes()).expect("write script");
        file.sync_all().expect("sync script");
    }
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

/// Quotes a string for POSIX sh.
pub fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Answers the per-value queries the ffprobe prober issues.
pub fn fake_ffprobe_script(probe: &ProbeResult) -> String {
    let or_na = |v: Option<String>| v.unwrap_or_else(|| "N/A".to_string());
    let duration = or_na(probe.duration_secs.map(|d| format!("{:.6}", d)));
    let bitrate = or_na(probe.bitrate_bps.map(|b| b.to_string()));
    let pix_fmt = or_na(probe.pixel_format.clone());
    let resolution = match (probe.width, probe.height) {
        (Some(w), Some(h)) => format!("{}x{}", w, h),
        _ => String::new(),
    };

    format!(
        r#"#!/bin/sh
case "$*" in
  *format=duration*) echo {duration} ;;
  *stream=bit_rate*) echo {bitrate} ;;
  *format=bit_rate*) echo {bitrate} ;;
  *stream=pix_fmt*) echo {pix_fmt} ;;
  *stream=width,height*) echo {resolution} ;;
esac
exit 0
"#,
        duration = sh_quote(&duration),
        bitrate = sh_quote(&bitrate),
        pix_fmt = sh_quote(&pix_fmt),
        resolution = sh_quote(&resolution),
    )
}

/// Behavior of the fake encoder.
#[derive(Debug, Clone)]
pub struct FakeEncode {
    /// Elapsed output time reported at the last progress line.
    pub duration_secs: f64,
    /// Number of progress lines.
    pub steps: u32,
    /// Seconds to sleep between progress lines.
    pub step_delay_secs: f64,
    /// Fail with exit code 1 when the command line contains this text.
    pub fail_on: Option<String>,
    /// Write the output, then block until killed.
    pub hang: bool,
    /// List NVENC encoders and CUDA for capability queries.
    pub hardware: bool,
    /// Append every command line to this file.
    pub log_file: Option<PathBuf>,
}

impl Default for FakeEncode {
    fn default() -> Self {
        Self {
            duration_secs: 10.0,
            steps: 5,
            step_delay_secs: 0.0,
            fail_on: None,
            hang: false,
            hardware: true,
            log_file: None,
        }
    }
}

impl FakeEncode {
    pub fn failing_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_on = Some(pattern.into());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn without_hardware(mut self) -> Self {
        self.hardware = false;
        self
    }

    pub fn logging_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    pub fn with_step_delay(mut self, secs: f64) -> Self {
        self.step_delay_secs = secs;
        self
    }
}

/// An ffmpeg stand-in: writes its last argument, emitting `-progress` lines.
pub fn fake_ffmpeg_script(behavior: &FakeEncode) -> String {
    let mut script = String::from("#!/bin/sh\n");

    let (encoders, hwaccels) = if behavior.hardware {
        (
            r"echo ' V....D h264_nvenc           NVIDIA NVENC H.264 encoder'; echo ' V....D hevc_nvenc           NVIDIA NVENC hevc encoder'",
            r"printf 'Hardware acceleration methods:\ncuda\n'",
        )
    } else {
        (
            r"echo ' V..... libx264              libx264 H.264'",
            r"printf 'Hardware acceleration methods:\n'",
        )
    };
    script.push_str(&format!(
        "for a in \"$@\"; do\n  case \"$a\" in\n    -encoders) {}; exit 0 ;;\n    -hwaccels) {}; exit 0 ;;\n  esac\ndone\n",
        encoders, hwaccels
    ));

    if let Some(log) = &behavior.log_file {
        script.push_str(&format!(
            "echo \"$*\" >> {}\n",
            sh_quote(&log.to_string_lossy())
        ));
    }

    script.push_str("out=\"\"\nfor a in \"$@\"; do out=\"$a\"; done\n");

    if let Some(pattern) = &behavior.fail_on {
        script.push_str(&format!(
            "case \"$*\" in\n  *{}*) echo \"Error: simulated encoder failure\" >&2; exit 1 ;;\nesac\n",
            sh_quote(pattern)
        ));
    }

    let total_us = (behavior.duration_secs * 1_000_000.0) as u64;
    let steps = behavior.steps.max(1);
    script.push_str(
        "echo \"frame=    0 fps=0.0 q=0.0 size=       0kB time=00:00:00.00 bitrate=N/A\" >&2\n",
    );
    script.push_str(&format!(
        "i=1\nwhile [ $i -le {steps} ]; do\n  echo \"out_time_us=$(( {total} * i / {steps} ))\"\n  echo \"progress=continue\"\n",
        steps = steps,
        total = total_us
    ));
    if behavior.step_delay_secs > 0.0 {
        script.push_str(&format!("  sleep {}\n", behavior.step_delay_secs));
    }
    script.push_str("  i=$((i + 1))\ndone\n");

    if behavior.hang {
        script.push_str("echo partial > \"$out\"\nexec sleep 30\n");
    } else {
        script.push_str("echo encoded > \"$out\"\necho \"progress=end\"\nexit 0\n");
    }
    script
}

/// Behavior of the fake fetch tool.
#[derive(Debug, Clone)]
pub enum FakeDownload {
    /// Downloads video and audio parts, merges them into `<title>.mp4`.
    TwoParts { title: String },
    /// Records an attempt in `attempts_file`, prints `message`, exits 1.
    Failing {
        message: String,
        attempts_file: PathBuf,
    },
    /// Starts the first part, then blocks until killed.
    Hanging { title: String },
}

impl FakeDownload {
    pub fn two_parts(title: impl Into<String>) -> Self {
        Self::TwoParts {
            title: title.into(),
        }
    }

    pub fn failing(message: impl Into<String>, attempts_file: impl Into<PathBuf>) -> Self {
        Self::Failing {
            message: message.into(),
            attempts_file: attempts_file.into(),
        }
    }

    pub fn hanging(title: impl Into<String>) -> Self {
        Self::Hanging {
            title: title.into(),
        }
    }
}

/// A yt-dlp stand-in that honors `-o` and prints hook and output lines.
pub fn fake_ytdlp_script(behavior: &FakeDownload) -> String {
    let mut script = String::from(
        "#!/bin/sh\nout=\"\"\nwhile [ $# -gt 0 ]; do\n  case \"$1\" in\n    -o) out=\"$2\"; shift 2 ;;\n    *) shift ;;\n  esac\ndone\ndir=$(dirname \"$out\")\n",
    );
    let hook = HOOK_PREFIX;

    match behavior {
        FakeDownload::TwoParts { title } => {
            let title = sh_quote(title);
            script.push_str(&format!(
                "f1=\"$dir/\"{title}.f137.mp4\nf2=\"$dir/\"{title}.f140.m4a\nfinal=\"$dir/\"{title}.mp4\n",
                title = title
            ));
            script.push_str(&format!(
                "for f in \"$f1\" \"$f2\"; do\n  for n in 0 25 50 75 100; do\n    echo \"{hook}downloading|$n|100|NA|NA|NA|$f\"\n  done\n  echo data > \"$f\"\n  echo \"{hook}finished|100|100|NA|NA|NA|$f\"\ndone\n",
                hook = hook
            ));
            script.push_str(&format!(
                "echo \"[Merger] Merging formats into $final\"\nrm -f \"$f1\" \"$f2\"\necho merged > \"$final\"\necho \"{}$final\"\nexit 0\n",
                OUTPUT_PREFIX
            ));
        }
        FakeDownload::Failing {
            message,
            attempts_file,
        } => {
            script.push_str(&format!(
                "echo attempt >> {}\necho {} >&2\nexit 1\n",
                sh_quote(&attempts_file.to_string_lossy()),
                sh_quote(message)
            ));
        }
        FakeDownload::Hanging { title } => {
            script.push_str(&format!(
                "f1=\"$dir/\"{}.f137.mp4\necho \"{}downloading|10|100|NA|NA|NA|$f1\"\necho partial > \"$f1.part\"\nexec sleep 30\n",
                sh_quote(title),
                hook
            ));
        }
    }
    script
}
