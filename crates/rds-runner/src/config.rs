use std::collections::HashMap;
use std::path::PathBuf;

use rds_core::Runtime;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Container-side layout used by the docker runner.
pub const CONTAINER_WORKDIR: &str = "/app";
pub const CONTAINER_CODE_DIR: &str = "/app/code";
pub const CONTAINER_DATA_DIR: &str = "/app/data";
pub const CONTAINER_OUTPUT_DIR: &str = "/app/output";

/// Everything a runner needs to execute one job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Extracted user-code bundle; `args[0]` is the entrypoint inside it.
    pub function_folder: PathBuf,
    /// Private dataset contents.
    pub data_path: PathBuf,
    /// Working tree for this job; `logs/` and `output/` live under it.
    pub job_path: PathBuf,
    pub args: Vec<String>,
    pub runtime: Runtime,
    pub timeout_secs: u64,
    pub extra_env: HashMap<String, String>,
    pub blocking: bool,
    /// What `DATA_DIR` looks like from inside the sandbox.
    pub data_mount_dir: String,
}

impl JobConfig {
    pub fn logs_dir(&self) -> PathBuf {
        self.job_path.join("logs")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.job_path.join("output")
    }

    pub fn entrypoint(&self) -> &str {
        &self.args[0]
    }

    pub fn interpreter(&self) -> String {
        self.runtime.cmd.join(" ")
    }

    /// Environment contract for executed user code.
    pub fn env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("DATA_DIR".to_string(), self.data_path.display().to_string());
        env.insert(
            "OUTPUT_DIR".to_string(),
            self.output_dir().display().to_string(),
        );
        env.insert(
            "CODE_DIR".to_string(),
            self.function_folder.display().to_string(),
        );
        env.insert(
            "INPUT_FILE".to_string(),
            self.function_folder.join(self.entrypoint()).display().to_string(),
        );
        env.insert("TIMEOUT".to_string(), self.timeout_secs.to_string());
        env.insert("INTERPRETER".to_string(), self.interpreter());
        env
    }
}
