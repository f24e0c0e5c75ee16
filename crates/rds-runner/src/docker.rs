use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use rds_core::{Job, RdsError, Result};

use crate::config::{
    JobConfig, CONTAINER_CODE_DIR, CONTAINER_DATA_DIR, CONTAINER_OUTPUT_DIR, CONTAINER_WORKDIR,
};
use crate::handlers::OutputHandler;
use crate::mounts::{mount_provider, Mount};
use crate::runner::{
    prepare_job_folders, run_subprocess, validate_paths, JobRunner, RunOutcome, StatusSink,
};

/// The fixed sandbox profile. These exact flags are part of the contract.
const SANDBOX_LIMITS: &[&str] = &[
    "--cap-drop",
    "ALL",
    "--network",
    "none",
    "--tmpfs",
    "/tmp:size=16m,noexec,nosuid,nodev",
    "--memory",
    "1G",
    "--cpus",
    "1",
    "--pids-limit",
    "100",
    "--ulimit",
    "nproc=4096:4096",
    "--ulimit",
    "nofile=50:50",
    "--ulimit",
    "fsize=10000000:10000000",
];

/// Runs a job inside a docker container with the fixed sandbox profile.
pub struct DockerRunner {
    handlers: Vec<Box<dyn OutputHandler>>,
    status: StatusSink,
}

impl DockerRunner {
    pub fn new(handlers: Vec<Box<dyn OutputHandler>>, status: StatusSink) -> Self {
        Self { handlers, status }
    }

    /// Image name from the runtime config, falling back to the runtime name.
    fn image_name(config: &JobConfig) -> String {
        config
            .runtime
            .config
            .as_docker()
            .and_then(|c| c.image_name.clone())
            .unwrap_or_else(|| config.runtime.name.clone())
    }

    /// Fail fast when the daemon is down. The caller records the failure on
    /// the job so the control plane stays responsive.
    fn check_docker_daemon() -> Result<()> {
        let output = Command::new("docker").arg("info").output();
        let failure = match output {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => {
                format!(
                    "docker daemon is not running: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                )
            }
            Err(e) => format!("docker not installed or not in PATH: {e}"),
        };
        Err(RdsError::RuntimeUnavailable(failure))
    }

    fn image_exists(image: &str) -> bool {
        Command::new("docker")
            .args(["image", "inspect", image])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Build the image with the Dockerfile content fed through stdin.
    fn build_image(config: &JobConfig) -> Result<()> {
        let image = Self::image_name(config);
        let dockerfile_content = config
            .runtime
            .config
            .as_docker()
            .and_then(|c| c.dockerfile_content.clone())
            .ok_or_else(|| {
                RdsError::RuntimeUnavailable(format!(
                    "image '{image}' not present and runtime has no dockerfile content"
                ))
            })?;

        info!(image, "building docker image");
        let mut child = Command::new("docker")
            .args(["build", "-t", &image, "-f", "-", "."])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RdsError::RuntimeUnavailable(format!("docker not available: {e}")))?;

        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(dockerfile_content.as_bytes())?;
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RdsError::RuntimeUnavailable(format!(
                "failed to build docker image '{image}':\n{stderr}"
            )));
        }
        info!(image, "docker image built");
        Ok(())
    }

    fn extra_mounts(config: &JobConfig) -> Vec<Mount> {
        let Some(app_name) = config
            .runtime
            .config
            .as_docker()
            .and_then(|c| c.app_name.as_deref())
        else {
            return Vec::new();
        };
        match mount_provider(app_name) {
            Some(provider) => provider.mounts(config),
            None => Vec::new(),
        }
    }

    /// Compose the full `docker run` argv: sandbox profile, env contract,
    /// code/data read-only, output read-write, then the entrypoint.
    fn build_argv(config: &JobConfig) -> Vec<String> {
        let image = Self::image_name(config);
        let interpreter = config.interpreter();
        let interpreter = if interpreter.contains(' ') {
            format!("\"{interpreter}\"")
        } else {
            interpreter
        };

        let mut argv: Vec<String> = vec!["docker".into(), "run".into(), "--rm".into()];
        argv.extend(SANDBOX_LIMITS.iter().map(|s| s.to_string()));

        argv.push("-e".into());
        argv.push(format!("TIMEOUT={}", config.timeout_secs));
        argv.push("-e".into());
        argv.push(format!("DATA_DIR={}", config.data_mount_dir));
        argv.push("-e".into());
        argv.push(format!("OUTPUT_DIR={CONTAINER_OUTPUT_DIR}"));
        argv.push("-e".into());
        argv.push(format!("CODE_DIR={CONTAINER_CODE_DIR}"));
        argv.push("-e".into());
        argv.push(format!("INTERPRETER={interpreter}"));
        argv.push("-e".into());
        argv.push(format!(
            "INPUT_FILE={CONTAINER_CODE_DIR}/{}",
            config.entrypoint()
        ));
        for (key, value) in &config.extra_env {
            argv.push("-e".into());
            argv.push(format!("{key}={value}"));
        }

        argv.push("-v".into());
        argv.push(format!(
            "{}:{CONTAINER_CODE_DIR}:ro",
            config.function_folder.display()
        ));
        argv.push("-v".into());
        argv.push(format!("{}:{CONTAINER_DATA_DIR}:ro", config.data_path.display()));
        argv.push("-v".into());
        argv.push(format!(
            "{}:{CONTAINER_OUTPUT_DIR}:rw",
            config.output_dir().display()
        ));
        for mount in Self::extra_mounts(config) {
            argv.push("-v".into());
            argv.push(format!(
                "{}:{}:{}",
                mount.source.display(),
                mount.target,
                mount.mode
            ));
        }

        argv.push("--workdir".into());
        argv.push(CONTAINER_WORKDIR.into());
        argv.push(image);
        argv.extend(config.runtime.cmd.iter().cloned());
        argv.push(format!("{CONTAINER_CODE_DIR}/{}", config.entrypoint()));
        argv.extend(config.args[1..].iter().cloned());
        argv
    }
}

impl JobRunner for DockerRunner {
    fn run(self: Box<Self>, job: &Job, config: &JobConfig) -> Result<RunOutcome> {
        debug!(
            code = %config.function_folder.display(),
            data = %config.data_path.display(),
            "docker runner starting"
        );
        validate_paths(config)?;
        prepare_job_folders(config)?;

        Self::check_docker_daemon()?;
        let image = Self::image_name(config);
        if !Self::image_exists(&image) {
            info!(image, "docker image not found, building");
            Self::build_image(config)?;
        }

        let argv = Self::build_argv(config);
        debug!(?argv, "docker run command");
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]);

        // The container gets its env through `-e`; nothing extra host-side.
        let env = std::collections::HashMap::new();
        run_subprocess(command, &env, job, config, self.handlers, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rds_core::models::runtime::DockerRuntimeConfig;
    use rds_core::{Runtime, RuntimeConfig, RuntimeKind};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config() -> JobConfig {
        let mut runtime = Runtime::ephemeral("do@x");
        runtime.kind = RuntimeKind::Docker;
        runtime.name = "rds-test-image".to_string();
        runtime.config = RuntimeConfig::Docker(DockerRuntimeConfig::default());
        JobConfig {
            function_folder: PathBuf::from("/work/code"),
            data_path: PathBuf::from("/work/data"),
            job_path: PathBuf::from("/work/job"),
            args: vec!["main.py".to_string(), "--n".to_string(), "5".to_string()],
            runtime,
            timeout_secs: 300,
            extra_env: HashMap::new(),
            blocking: true,
            data_mount_dir: CONTAINER_DATA_DIR.to_string(),
        }
    }

    #[test]
    fn argv_carries_the_exact_sandbox_profile() {
        let argv = DockerRunner::build_argv(&config());
        let joined = argv.join(" ");
        assert!(joined.starts_with("docker run --rm"));
        assert!(joined.contains("--cap-drop ALL"));
        assert!(joined.contains("--network none"));
        assert!(joined.contains("--tmpfs /tmp:size=16m,noexec,nosuid,nodev"));
        assert!(joined.contains("--memory 1G"));
        assert!(joined.contains("--cpus 1"));
        assert!(joined.contains("--pids-limit 100"));
        assert!(joined.contains("--ulimit nproc=4096:4096"));
        assert!(joined.contains("--ulimit nofile=50:50"));
        assert!(joined.contains("--ulimit fsize=10000000:10000000"));
    }

    #[test]
    fn argv_mounts_code_data_output() {
        let argv = DockerRunner::build_argv(&config());
        let joined = argv.join(" ");
        assert!(joined.contains("/work/code:/app/code:ro"));
        assert!(joined.contains("/work/data:/app/data:ro"));
        assert!(joined.contains("/work/job/output:/app/output:rw"));
    }

    #[test]
    fn argv_ends_with_entrypoint_and_args() {
        let argv = DockerRunner::build_argv(&config());
        let n = argv.len();
        assert_eq!(argv[n - 3], "/app/code/main.py");
        assert_eq!(argv[n - 2], "--n");
        assert_eq!(argv[n - 1], "5");
    }

    #[test]
    fn image_name_falls_back_to_runtime_name() {
        let mut cfg = config();
        assert_eq!(DockerRunner::image_name(&cfg), "rds-test-image");

        cfg.runtime.config = RuntimeConfig::Docker(DockerRuntimeConfig {
            image_name: Some("python:3.12-slim".into()),
            ..Default::default()
        });
        assert_eq!(DockerRunner::image_name(&cfg), "python:3.12-slim");
    }

    #[test]
    fn env_contract_is_container_relative() {
        let argv = DockerRunner::build_argv(&config());
        let joined = argv.join(" ");
        assert!(joined.contains("-e DATA_DIR=/app/data"));
        assert!(joined.contains("-e OUTPUT_DIR=/app/output"));
        assert!(joined.contains("-e INPUT_FILE=/app/code/main.py"));
        assert!(joined.contains("-e TIMEOUT=300"));
    }
}
