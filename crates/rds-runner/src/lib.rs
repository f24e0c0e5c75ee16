//! Job execution: preparation, sandboxing, subprocess driving, real-time
//! log capture, and status reporting.
//!
//! Runners are synchronous (`std::process`); async callers enter through
//! `tokio::task::spawn_blocking`. Failures never escape into the control
//! plane: anything that goes wrong during execution is pushed through the
//! status sink onto the Job record.

pub mod config;
pub mod docker;
pub mod handlers;
pub mod logs;
pub mod mounts;
pub mod process;
pub mod python;
pub mod runner;

pub use config::{JobConfig, DEFAULT_TIMEOUT_SECS};
pub use docker::DockerRunner;
pub use handlers::{default_handlers, FileOutputHandler, OutputHandler, TracingOutputHandler};
pub use logs::{parse_log_level, LogLevel};
pub use mounts::{mount_provider, register_mount_provider, Mount, MountMode, MountProvider};
pub use process::ProcessHandle;
pub use python::PythonRunner;
pub use runner::{runner_for, JobRunner, RunOutcome, StatusSink};
