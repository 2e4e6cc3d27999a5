//! Task coordinator: queueing, sequencing and lifecycle reporting.
//!
//! Every task moves `Pending -> Running -> {Succeeded, Failed, Cancelled}`.
//! Exactly one task runs at a time. Composite kinds run their phases in
//! order (fetch, trim, convert) and map each phase onto an equal slice of
//! the task's progress.
//!
//! ```rust,ignore
//! let (coordinator, mut events) = TaskCoordinator::new(config, prober);
//! coordinator.start();
//! let id = coordinator.enqueue(MediaTaskRequest::convert("in.mkv", "out", TargetFormat::Mp4))?;
//! while let Some(event) = events.recv().await {
//!     if event.is_terminal() && event.task_id() == id {
//!         break;
//!     }
//! }
//! ```

mod config;
mod error;
mod pipeline;
mod runner;
mod types;

pub use config::CoordinatorConfig;
pub use error::TaskError;
pub use runner::TaskCoordinator;
pub use types::{
    CoordinatorStatus, MediaTask, MediaTaskRequest, OperationKind, TaskEvent, TaskStatus,
};
