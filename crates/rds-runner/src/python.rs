use std::process::Command;

use tracing::debug;

use rds_core::{Job, Result};

use crate::config::JobConfig;
use crate::handlers::OutputHandler;
use crate::runner::{
    prepare_job_folders, run_subprocess, validate_paths, JobRunner, RunOutcome, StatusSink,
};

/// Runs a job as a local subprocess under the runtime's interpreter.
pub struct PythonRunner {
    handlers: Vec<Box<dyn OutputHandler>>,
    status: StatusSink,
}

impl PythonRunner {
    pub fn new(handlers: Vec<Box<dyn OutputHandler>>, status: StatusSink) -> Self {
        Self { handlers, status }
    }

    /// `runtime.cmd -u <entrypoint> <args…>`, or `uv run` when the runtime
    /// opts in and the bundle declares its dependencies.
    fn build_argv(config: &JobConfig) -> Vec<String> {
        let script_path = config.function_folder.join(config.entrypoint());
        let use_uv = config
            .runtime
            .config
            .as_python()
            .map(|c| c.use_uv)
            .unwrap_or(false);
        let pyproject = config.function_folder.join("pyproject.toml");

        if use_uv && pyproject.exists() {
            debug!(pyproject = %pyproject.display(), "running through uv");
            let mut argv = vec![
                "uv".to_string(),
                "run".to_string(),
                "--directory".to_string(),
                config.function_folder.display().to_string(),
                "python".to_string(),
                "-u".to_string(),
                script_path.display().to_string(),
            ];
            argv.extend(config.args[1..].iter().cloned());
            argv
        } else {
            let mut argv = config.runtime.cmd.clone();
            argv.push("-u".to_string());
            argv.push(script_path.display().to_string());
            argv.extend(config.args[1..].iter().cloned());
            argv
        }
    }
}

impl JobRunner for PythonRunner {
    fn run(self: Box<Self>, job: &Job, config: &JobConfig) -> Result<RunOutcome> {
        validate_paths(config)?;
        prepare_job_folders(config)?;

        let argv = Self::build_argv(config);
        debug!(?argv, "python runner command");
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]);

        let mut env = config.env();
        env.extend(config.extra_env.clone());

        run_subprocess(command, &env, job, config, self.handlers, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rds_core::models::runtime::PythonRuntimeConfig;
    use rds_core::{Runtime, RuntimeConfig};
    use std::collections::HashMap;

    fn config(dir: &std::path::Path, use_uv: bool) -> JobConfig {
        let mut runtime = Runtime::ephemeral("do@x");
        runtime.config = RuntimeConfig::Python(PythonRuntimeConfig {
            version: None,
            use_uv,
        });
        JobConfig {
            function_folder: dir.join("code"),
            data_path: dir.join("data"),
            job_path: dir.join("job"),
            args: vec!["main.py".to_string(), "--flag".to_string()],
            runtime,
            timeout_secs: 300,
            extra_env: HashMap::new(),
            blocking: true,
            data_mount_dir: String::new(),
        }
    }

    #[test]
    fn argv_uses_interpreter_with_unbuffered_flag() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), false);
        let argv = PythonRunner::build_argv(&config);
        assert_eq!(argv[0], "python3");
        assert_eq!(argv[1], "-u");
        assert!(argv[2].ends_with("main.py"));
        assert_eq!(argv[3], "--flag");
    }

    #[test]
    fn argv_switches_to_uv_when_pyproject_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), true);
        std::fs::create_dir_all(&config.function_folder).unwrap();
        std::fs::write(config.function_folder.join("pyproject.toml"), "[project]\n").unwrap();

        let argv = PythonRunner::build_argv(&config);
        assert_eq!(&argv[..2], &["uv".to_string(), "run".to_string()]);
        assert!(argv.contains(&"--directory".to_string()));
        assert!(argv.contains(&"python".to_string()));
    }

    #[test]
    fn uv_disabled_falls_back_even_with_pyproject() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), false);
        std::fs::create_dir_all(&config.function_folder).unwrap();
        std::fs::write(config.function_folder.join("pyproject.toml"), "[project]\n").unwrap();

        let argv = PythonRunner::build_argv(&config);
        assert_eq!(argv[0], "python3");
    }
}
