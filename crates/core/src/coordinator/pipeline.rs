//! Phase execution for one task: fetch, trim, convert.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::artifact::{remove_if_exists, TempArtifact};
use crate::planner::{naming, EncodingPlan, Invocation, TargetFormat, TrimOptions};
use crate::probe::ProbeResult;
use crate::progress::{EncodeProgress, TaskProgress};
use crate::runner::{CancelToken, OutputStream};

use super::error::TaskError;
use super::runner::Shared;
use super::types::{MediaTask, MediaTaskRequest, TaskEvent};

/// Runs the phases of one task and tracks what it wrote.
pub(super) struct Pipeline<'a> {
    shared: &'a Shared,
    task_id: &'a str,
    request: &'a MediaTaskRequest,
    cancel: CancelToken,
    progress: Mutex<TaskProgress>,
    phases_entered: u32,
    software_fallback_warned: bool,
    /// Files this task created that must not survive it: removed on
    /// failure or cancellation, and on success unless they are the output.
    scratch: Vec<PathBuf>,
    warnings: Vec<String>,
}

impl<'a> Pipeline<'a> {
    pub(super) fn new(shared: &'a Shared, task: &'a MediaTask, cancel: CancelToken) -> Self {
        let phases = task.request.kind.phase_count(task.request.target);
        Self {
            shared,
            task_id: &task.id,
            request: &task.request,
            cancel,
            progress: Mutex::new(TaskProgress::new(phases)),
            phases_entered: 0,
            software_fallback_warned: false,
            scratch: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(super) fn start_progress(&self) -> u8 {
        let percent = self.lock_progress().start();
        self.shared.update_active(|task| task.progress = percent);
        percent
    }

    pub(super) fn finish_progress(&self) -> Option<u8> {
        self.lock_progress().finish()
    }

    pub(super) fn into_warnings(self) -> Vec<String> {
        self.warnings
    }

    /// Runs every phase. On error, everything the task wrote is removed
    /// before returning.
    pub(super) async fn run(&mut self) -> Result<PathBuf, TaskError> {
        match self.run_phases().await {
            Ok(output) => {
                self.discard_scratch(Some(output.as_path())).await;
                Ok(output)
            }
            Err(e) => {
                self.discard_scratch(None).await;
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self) -> Result<PathBuf, TaskError> {
        let kind = self.request.kind;
        let output_dir = self.request.output_dir.clone();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| TaskError::Io {
                path: output_dir.clone(),
                source,
            })?;

        let mut current = if kind.downloads() {
            let fetched = self.download().await?;
            if kind.trims() || kind.converts() {
                self.scratch.push(fetched.clone());
            }
            fetched
        } else {
            PathBuf::from(&self.request.input)
        };

        let mut stem = None;
        if kind.trims() {
            let (trimmed, trimmed_stem) = self.trim(&current, kind.converts()).await?;
            current = trimmed;
            stem = trimmed_stem;
        }

        if kind.converts() {
            current = self.convert(&current, stem).await?;
        }

        self.shared.update_active(|task| task.output_path = Some(current.clone()));
        Ok(current)
    }

    async fn download(&mut self) -> Result<PathBuf, TaskError> {
        self.enter_phase().await;
        let url = self.request.input.as_str();
        let lines = |stream: OutputStream, line: &str| self.on_line(stream, line);
        let progress = |percent: u8| self.on_phase_progress(percent);

        let outcome = self
            .shared
            .fetcher
            .fetch(
                url,
                &self.request.output_dir,
                &self.cancel,
                &lines,
                &progress,
            )
            .await?;
        if outcome.attempts > 1 {
            debug!(
                "Task {} fetched after {} attempts",
                self.task_id, outcome.attempts
            );
        }
        Ok(outcome.path)
    }

    /// Trims `source`. When a conversion follows, returns the intermediate
    /// and the stem the conversion should use; otherwise the final file.
    async fn trim(
        &mut self,
        source: &Path,
        feeds_convert: bool,
    ) -> Result<(PathBuf, Option<String>), TaskError> {
        let (start, end) = match (self.request.trim_start, self.request.trim_end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(TaskError::Validation(
                    "trim requires a start and end time".to_string(),
                ))
            }
        };

        let probe = self.shared.prober.probe(source).await;
        let use_gpu = feeds_convert && self.resolve_gpu(true, &probe).await;
        let spec = self.shared.trimmer.plan(
            source,
            &self.request.output_dir,
            start,
            end,
            &probe,
            TrimOptions {
                use_gpu,
                reencode: feeds_convert,
            },
        )?;
        info!(
            "Task {} trimming {} from {} to {}",
            self.task_id,
            source.display(),
            start,
            end
        );

        self.enter_phase().await;
        self.scratch.push(spec.intermediate_path.clone());
        self.run_invocation(spec.invocation(source), Some(spec.segment_secs()))
            .await?;

        if feeds_convert {
            return Ok((spec.intermediate_path.clone(), Some(spec.output_stem())));
        }

        let output = match tokio::fs::rename(&spec.intermediate_path, &spec.output_path).await {
            Ok(()) => spec.output_path.clone(),
            Err(e) => {
                self.warn(format!(
                    "Could not move {} to {}: {}",
                    spec.intermediate_path.display(),
                    spec.output_path.display(),
                    e
                ))
                .await;
                spec.intermediate_path.clone()
            }
        };

        if self.shared.config.delete_source_after_trim && !self.request.kind.downloads() {
            if let Err(e) = remove_if_exists(source).await {
                self.warn(format!("Could not delete source {}: {}", source.display(), e))
                    .await;
            }
        }
        Ok((output, None))
    }

    async fn convert(&mut self, source: &Path, stem: Option<String>) -> Result<PathBuf, TaskError> {
        let target = self
            .request
            .target
            .ok_or_else(|| TaskError::Validation("convert requires a target format".to_string()))?;

        let probe = self.shared.prober.probe(source).await;
        let use_gpu = self.resolve_gpu(target.supports_hardware(), &probe).await;
        let output = self.convert_output_path(source, stem, target);
        self.scratch.push(output.clone());

        let plan = self
            .shared
            .encoder
            .plan(target, self.request.quality, use_gpu, &probe);
        info!(
            "Task {} converting {} to {}",
            self.task_id,
            source.display(),
            output.display()
        );

        match self.run_plan(&plan, source, &output, &probe, false).await {
            Err(TaskError::EncodeFailed { exit_code, .. })
                if plan.uses_hardware() && self.shared.config.cpu_fallback_on_gpu_failure =>
            {
                self.warn(format!(
                    "Hardware encode failed (exit code {}), retrying in software",
                    exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
                ))
                .await;
                let plan = self
                    .shared
                    .encoder
                    .plan(target, self.request.quality, false, &probe);
                self.run_plan(&plan, source, &output, &probe, true).await?;
            }
            other => other?,
        }
        Ok(output)
    }

    async fn run_plan(
        &mut self,
        plan: &EncodingPlan,
        source: &Path,
        output: &Path,
        probe: &ProbeResult,
        retry: bool,
    ) -> Result<(), TaskError> {
        // Removed on every exit path, including a failed second pass.
        let _palette = plan.palette_path().map(TempArtifact::new);

        for (index, invocation) in plan.invocations(source, output).into_iter().enumerate() {
            if index > 0 || !retry {
                self.enter_phase().await;
            }
            self.run_invocation(invocation, probe.duration_secs).await?;
        }
        Ok(())
    }

    async fn run_invocation(
        &self,
        invocation: Invocation,
        total_secs: Option<f64>,
    ) -> Result<(), TaskError> {
        let program = &self.shared.tools.ffmpeg_path;
        let spec = invocation.into_spec(program);
        let estimator = EncodeProgress::new(total_secs);
        if !estimator.is_determinate() {
            debug!(
                "Task {}: duration unknown, progress is indeterminate",
                self.task_id
            );
        }
        let estimator = Mutex::new(estimator);

        let sink = |stream: OutputStream, line: &str| {
            self.on_line(stream, line);
            let percent = estimator
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .observe(line);
            if let Some(percent) = percent {
                self.on_phase_progress(percent);
            }
        };

        let outcome = self.shared.runner.run(&spec, &self.cancel, &sink).await?;
        if !outcome.success() {
            return Err(TaskError::EncodeFailed {
                program: program.display().to_string(),
                exit_code: outcome.exit_code,
                log: outcome.log,
            });
        }
        Ok(())
    }

    /// Whether to plan on the GPU. Requests for hardware the encoder does
    /// not offer fall back to software with a warning.
    async fn resolve_gpu(&mut self, hardware_capable: bool, probe: &ProbeResult) -> bool {
        if !self.request.use_gpu || !hardware_capable {
            return false;
        }
        let capabilities = self.shared.capabilities().await;
        if capabilities.supports_gpu(probe.is_ten_bit()) {
            return true;
        }
        if !self.software_fallback_warned {
            self.software_fallback_warned = true;
            self.warn("No usable hardware encoder found, encoding in software".to_string())
                .await;
        }
        false
    }

    fn convert_output_path(
        &self,
        source: &Path,
        stem: Option<String>,
        target: TargetFormat,
    ) -> PathBuf {
        let stem = stem.unwrap_or_else(|| naming::file_stem(source));
        let candidate = self
            .request
            .output_dir
            .join(format!("{}.{}", stem, target.extension()));
        naming::avoid_source_collision(candidate, source, "_converted")
    }

    /// Advances task progress to the next phase, except before the first.
    async fn enter_phase(&mut self) {
        self.phases_entered += 1;
        if self.phases_entered == 1 {
            return;
        }
        let percent = self.lock_progress().next_phase();
        if let Some(percent) = percent {
            self.shared.update_active(|task| task.progress = percent);
            self.shared
                .publish_reliably(TaskEvent::Progress {
                    task_id: self.task_id.to_string(),
                    percent,
                })
                .await;
        }
    }

    fn on_line(&self, stream: OutputStream, line: &str) {
        let max_bytes = self.shared.max_log_bytes;
        self.shared
            .update_active(|task| task.append_log(line, max_bytes));
        self.shared.publish(TaskEvent::Log {
            task_id: self.task_id.to_string(),
            stream,
            line: line.to_string(),
        });
    }

    fn on_phase_progress(&self, percent: u8) {
        let overall = self.lock_progress().phase_progress(percent);
        if let Some(percent) = overall {
            self.shared.update_active(|task| task.progress = percent);
            self.shared.publish(TaskEvent::Progress {
                task_id: self.task_id.to_string(),
                percent,
            });
        }
    }

    async fn warn(&mut self, message: String) {
        warn!("Task {}: {}", self.task_id, message);
        self.shared
            .update_active(|task| task.warnings.push(message.clone()));
        self.shared
            .publish_reliably(TaskEvent::Warning {
                task_id: self.task_id.to_string(),
                message: message.clone(),
            })
            .await;
        self.warnings.push(message);
    }

    /// Removes scratch files other than `keep`. After success a failed
    /// removal is a warning; after failure it is only logged.
    async fn discard_scratch(&mut self, keep: Option<&Path>) {
        let scratch = std::mem::take(&mut self.scratch);
        for path in scratch {
            if keep == Some(path.as_path()) {
                continue;
            }
            match remove_if_exists(&path).await {
                Ok(true) => debug!("Task {} removed {}", self.task_id, path.display()),
                Ok(false) => {}
                Err(e) if keep.is_some() => {
                    self.warn(format!(
                        "Could not delete intermediate file {}: {}",
                        path.display(),
                        e
                    ))
                    .await;
                }
                Err(e) => warn!(
                    "Task {}: could not delete {}: {}",
                    self.task_id,
                    path.display(),
                    e
                ),
            }
        }
    }

    fn lock_progress(&self) -> std::sync::MutexGuard<'_, TaskProgress> {
        self.progress.lock().unwrap_or_else(|e| e.into_inner())
    }
}
