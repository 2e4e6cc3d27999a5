//! Queue file: a TOML list of task requests.
//!
//! ```toml
//! [[task]]
//! input = "/videos/talk.mkv"
//! output_dir = "/videos/out"
//! kind = "trim_then_convert"
//! target = "mp4"
//! trim_start = "00:01:00:000"
//! trim_end = "00:02:30:500"
//! quality = 80
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use vidium_core::{MediaTaskRequest, Quality};

#[derive(Debug)]
pub struct QueueFile {
    pub tasks: Vec<MediaTaskRequest>,
}

#[derive(Deserialize)]
struct RawQueue {
    #[serde(default, rename = "task")]
    tasks: Vec<toml::Table>,
}

impl QueueFile {
    pub fn load(path: &Path, default_quality: Quality) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read queue file {:?}", path))?;
        Self::parse(&content, default_quality)
            .with_context(|| format!("Failed to parse queue file {:?}", path))
    }

    /// Tasks without a `quality` key take `default_quality`.
    pub fn parse(content: &str, default_quality: Quality) -> Result<Self> {
        let raw: RawQueue = toml::from_str(content)?;
        let tasks = raw
            .tasks
            .into_iter()
            .enumerate()
            .map(|(index, mut task)| {
                task.entry("quality")
                    .or_insert(toml::Value::Integer(default_quality.percent().into()));
                toml::Value::Table(task)
                    .try_into()
                    .with_context(|| format!("Invalid task #{}", index + 1))
            })
            .collect::<Result<Vec<MediaTaskRequest>>>()?;
        Ok(Self { tasks })
    }
}
