pub mod artifact;
pub mod config;
pub mod coordinator;
pub mod fetch;
pub mod planner;
pub mod preferences;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ToolsConfig,
};
pub use coordinator::{
    CoordinatorConfig, CoordinatorStatus, MediaTask, MediaTaskRequest, OperationKind,
    TaskCoordinator, TaskError, TaskEvent, TaskStatus,
};
pub use fetch::{FetchConfig, FetchError, Fetcher, SourceSite};
pub use planner::{EncodingPlan, EncodingPlanner, Quality, TargetFormat, Timecode, TrimPlanner};
pub use preferences::{MemoryStore, PreferencesError, SettingsStore, TomlFileStore, UserPreferences};
pub use probe::{EncoderCapabilities, FfprobeProber, MediaProber, ProbeResult};
pub use runner::{CancelToken, ProcessRunner, RunnerError};
