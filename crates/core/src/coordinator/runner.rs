//! Task coordinator implementation.
//!
//! Tasks run strictly one at a time on a single worker. The worker sleeps on
//! a [`Notify`] until something is enqueued and exits on the shutdown
//! broadcast.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Notify, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ToolsConfig};
use crate::fetch::Fetcher;
use crate::planner::{EncodingPlanner, TrimPlanner};
use crate::probe::{EncoderCapabilities, MediaProber};
use crate::runner::{CancelToken, ProcessRunner};

use super::config::CoordinatorConfig;
use super::error::TaskError;
use super::pipeline::Pipeline;
use super::types::{CoordinatorStatus, MediaTask, MediaTaskRequest, TaskEvent, TaskStatus};

/// The running task and the token that cancels it.
struct ActiveTask {
    task: MediaTask,
    cancel: CancelToken,
}

#[derive(Default)]
struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// State shared between the coordinator handle and its worker.
pub(super) struct Shared {
    pub(super) config: CoordinatorConfig,
    pub(super) tools: ToolsConfig,
    pub(super) max_log_bytes: usize,
    pub(super) encoder: EncodingPlanner,
    pub(super) trimmer: TrimPlanner,
    pub(super) runner: ProcessRunner,
    pub(super) fetcher: Fetcher,
    pub(super) prober: Arc<dyn MediaProber>,
    capabilities: OnceCell<EncoderCapabilities>,
    events: mpsc::Sender<TaskEvent>,
    queue: Mutex<VecDeque<MediaTask>>,
    active: Mutex<Option<ActiveTask>>,
    counters: Counters,
    notify: Notify,
    running: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    /// Publishes an event without waiting; dropped if the channel is full.
    pub(super) fn publish(&self, event: TaskEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!("Event channel full, dropping {:?}", event);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Publishes an event, waiting for room in the channel.
    pub(super) async fn publish_reliably(&self, event: TaskEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }

    /// Applies `f` to the running task's snapshot.
    pub(super) fn update_active(&self, f: impl FnOnce(&mut MediaTask)) {
        if let Some(active) = lock(&self.active).as_mut() {
            f(&mut active.task);
        }
    }

    pub(super) async fn capabilities(&self) -> EncoderCapabilities {
        if !self.config.detect_capabilities {
            return EncoderCapabilities::assume_all();
        }
        *self
            .capabilities
            .get_or_init(|| EncoderCapabilities::detect(&self.tools.ffmpeg_path))
            .await
    }

    /// Moves the next queued task into the active slot, unless the
    /// coordinator is stopping. Checked under the queue lock, which `stop`
    /// also holds while cancelling the active task.
    fn activate_next(&self) -> Option<(MediaTask, CancelToken)> {
        let mut queue = lock(&self.queue);
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }
        let mut task = queue.pop_front()?;
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());

        let cancel = CancelToken::new();
        *lock(&self.active) = Some(ActiveTask {
            task: task.clone(),
            cancel: cancel.clone(),
        });
        Some((task, cancel))
    }

    /// Cancels the running task. Holds the queue lock so a task cannot be
    /// activated in between.
    fn cancel_active(&self) {
        let _queue = lock(&self.queue);
        if let Some(active) = lock(&self.active).as_ref() {
            info!("Cancelling running task {}", active.task.id);
            active.cancel.cancel();
        }
    }

    fn take_active(&self) -> Option<MediaTask> {
        lock(&self.active).take().map(|active| active.task)
    }

    async fn execute(&self, task: MediaTask, cancel: CancelToken) {
        let task_id = task.id.clone();
        info!(
            "Starting task {} ({}) for {}",
            task_id, task.request.kind, task.request.input
        );
        self.publish_reliably(TaskEvent::Started {
            task_id: task_id.clone(),
        })
        .await;

        let mut pipeline = Pipeline::new(self, &task, cancel);
        self.publish_reliably(TaskEvent::Progress {
            task_id: task_id.clone(),
            percent: pipeline.start_progress(),
        })
        .await;

        let result = pipeline.run().await;
        let final_percent = result.is_ok().then(|| pipeline.finish_progress()).flatten();
        let warnings = pipeline.into_warnings();

        let mut finished = self.take_active().unwrap_or(task);
        finished.finished_at = Some(Utc::now());
        finished.warnings = warnings.clone();

        match result {
            Ok(output_path) => {
                finished.status = TaskStatus::Succeeded;
                finished.progress = 100;
                finished.output_path = Some(output_path.clone());
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                info!("Task {} completed: {}", task_id, output_path.display());

                if let Some(percent) = final_percent {
                    self.publish_reliably(TaskEvent::Progress {
                        task_id: task_id.clone(),
                        percent,
                    })
                    .await;
                }
                self.publish_reliably(TaskEvent::Completed {
                    task_id,
                    output_path,
                    warnings,
                })
                .await;
            }
            Err(e) if e.is_cancelled() => {
                finished.status = TaskStatus::Cancelled;
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                info!("Task {} cancelled", task_id);
                self.publish_reliably(TaskEvent::Cancelled { task_id }).await;
            }
            Err(e) => {
                finished.status = TaskStatus::Failed;
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!("Task {} failed: {}", task_id, e);
                let log = e
                    .log()
                    .map(str::to_string)
                    .unwrap_or_else(|| finished.log.clone());
                self.publish_reliably(TaskEvent::Failed {
                    task_id,
                    error: e.to_string(),
                    log,
                })
                .await;
            }
        }
        debug!("Task {} finished as {:?}", finished.id, finished.status);
    }
}

/// Serializes media tasks and reports their lifecycle as [`TaskEvent`]s.
pub struct TaskCoordinator {
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskCoordinator {
    /// Creates a coordinator and the receiving end of its event channel.
    pub fn new(config: Config, prober: Arc<dyn MediaProber>) -> (Self, mpsc::Receiver<TaskEvent>) {
        let (events, events_rx) = mpsc::channel(config.coordinator.event_buffer.max(1));
        let (shutdown_tx, _) = broadcast::channel(1);

        let fallback_bitrate = config.encoding.fallback_bitrate_bps;
        let shared = Shared {
            encoder: EncodingPlanner::new(config.encoding, config.coordinator.temp_dir()),
            trimmer: TrimPlanner::new(fallback_bitrate),
            runner: ProcessRunner::new(config.runner.clone()),
            fetcher: Fetcher::new(
                config.tools.clone(),
                config.fetch,
                ProcessRunner::new(config.runner.clone()),
            ),
            max_log_bytes: config.runner.max_log_bytes,
            tools: config.tools,
            config: config.coordinator,
            prober,
            capabilities: OnceCell::new(),
            events,
            queue: Mutex::new(VecDeque::new()),
            active: Mutex::new(None),
            counters: Counters::default(),
            notify: Notify::new(),
            running: AtomicBool::new(false),
        };

        let coordinator = Self {
            shared: Arc::new(shared),
            shutdown_tx,
            worker: Mutex::new(None),
        };
        (coordinator, events_rx)
    }

    /// Start the worker loop.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            warn!("Task coordinator already running");
            return;
        }

        info!("Starting task coordinator");
        let shared = Arc::clone(&self.shared);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            info!("Task worker started");
            loop {
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                match shared.activate_next() {
                    Some((task, cancel)) => shared.execute(task, cancel).await,
                    None => {
                        tokio::select! {
                            _ = shutdown_rx.recv() => {
                                info!("Task worker received shutdown signal");
                                break;
                            }
                            _ = shared.notify.notified() => {}
                        }
                    }
                }
            }
            info!("Task worker stopped");
        });
        *lock(&self.worker) = Some(handle);
    }

    /// Stop the worker. The running task is cancelled; queued tasks stay
    /// queued for the next `start`.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            warn!("Task coordinator not running");
            return;
        }

        info!("Stopping task coordinator");
        let _ = self.shutdown_tx.send(());
        self.shared.cancel_active();

        let handle = lock(&self.worker).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Task worker panicked: {}", e);
            }
        }
        info!("Task coordinator stopped");
    }

    /// Queues a task and returns its id. Incomplete requests are rejected
    /// here, before anything runs.
    pub fn enqueue(&self, request: MediaTaskRequest) -> Result<String, TaskError> {
        request.validate()?;
        let task = MediaTask::new(request);
        let id = task.id.clone();
        info!("Queued task {} ({})", id, task.request.kind);

        lock(&self.shared.queue).push_back(task);
        self.shared.notify.notify_one();
        Ok(id)
    }

    /// Cancels one task. A queued task is removed and reported cancelled;
    /// the running task's process is killed. Returns whether the task was
    /// found.
    pub async fn cancel(&self, task_id: &str) -> bool {
        let removed = {
            let mut queue = lock(&self.shared.queue);
            queue
                .iter()
                .position(|task| task.id == task_id)
                .and_then(|index| queue.remove(index))
        };
        if let Some(task) = removed {
            self.report_dequeued(task).await;
            return true;
        }

        let guard = lock(&self.shared.active);
        match guard.as_ref() {
            Some(active) if active.task.id == task_id => {
                info!("Cancelling running task {}", task_id);
                active.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancels the running task and drains the queue.
    pub async fn cancel_all(&self) {
        let drained: Vec<MediaTask> = lock(&self.shared.queue).drain(..).collect();
        if let Some(active) = lock(&self.shared.active).as_ref() {
            info!("Cancelling running task {}", active.task.id);
            active.cancel.cancel();
        }
        for task in drained {
            self.report_dequeued(task).await;
        }
    }

    /// Get current coordinator status.
    pub fn status(&self) -> CoordinatorStatus {
        let active = lock(&self.shared.active)
            .as_ref()
            .map(|active| active.task.clone());
        let queued = lock(&self.shared.queue).len();
        let counters = &self.shared.counters;

        CoordinatorStatus {
            running: self.shared.running.load(Ordering::Relaxed),
            active,
            queued,
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            cancelled: counters.cancelled.load(Ordering::Relaxed),
        }
    }

    async fn report_dequeued(&self, task: MediaTask) {
        info!("Removed queued task {}", task.id);
        self.shared
            .counters
            .cancelled
            .fetch_add(1, Ordering::Relaxed);
        self.shared
            .publish_reliably(TaskEvent::Cancelled { task_id: task.id })
            .await;
    }
}

impl Drop for TaskCoordinator {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
        self.shared.cancel_active();
    }
}
