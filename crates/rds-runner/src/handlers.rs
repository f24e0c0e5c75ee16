use std::fs::{File, OpenOptions};
use std::io::Write;

use tracing::{debug, info, warn};

use crate::config::JobConfig;
use crate::logs::{parse_log_level, LogLevel};

/// A sink for runner lifecycle events and captured output. Handlers are
/// composable and invoked in registration order; they must never panic into
/// the reader loop, so failures are swallowed with a warning.
pub trait OutputHandler: Send {
    fn on_job_start(&mut self, config: &JobConfig);

    /// Called with one line at a time; the other stream's argument is empty.
    fn on_job_progress(&mut self, stdout_line: &str, stderr_line: &str);

    fn on_job_completion(&mut self, return_code: i32);
}

/// Writes `stdout.log` and `stderr.log` under the job's logs directory.
#[derive(Default)]
pub struct FileOutputHandler {
    stdout: Option<File>,
    stderr: Option<File>,
}

impl FileOutputHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_log(path: &std::path::Path) -> Option<File> {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %path.display(), "cannot open log file: {e}");
                None
            }
        }
    }
}

impl OutputHandler for FileOutputHandler {
    fn on_job_start(&mut self, config: &JobConfig) {
        let logs_dir = config.logs_dir();
        self.stdout = Self::open_log(&logs_dir.join("stdout.log"));
        self.stderr = Self::open_log(&logs_dir.join("stderr.log"));
    }

    fn on_job_progress(&mut self, stdout_line: &str, stderr_line: &str) {
        if !stdout_line.is_empty() {
            if let Some(file) = &mut self.stdout {
                let _ = writeln!(file, "{stdout_line}");
            }
        }
        if !stderr_line.is_empty() {
            if let Some(file) = &mut self.stderr {
                let _ = writeln!(file, "{stderr_line}");
            }
        }
    }

    fn on_job_completion(&mut self, _return_code: i32) {
        if let Some(file) = &mut self.stdout {
            let _ = file.flush();
        }
        if let Some(file) = &mut self.stderr {
            let _ = file.flush();
        }
    }
}

/// Mirrors captured output into the tracing log, mapping recognised stderr
/// levels onto tracing levels.
pub struct TracingOutputHandler;

impl OutputHandler for TracingOutputHandler {
    fn on_job_start(&mut self, config: &JobConfig) {
        info!(
            job_path = %config.job_path.display(),
            entrypoint = config.entrypoint(),
            "job started"
        );
    }

    fn on_job_progress(&mut self, stdout_line: &str, stderr_line: &str) {
        if !stdout_line.is_empty() {
            debug!(target: "rds::job", "{stdout_line}");
        }
        if !stderr_line.is_empty() {
            match parse_log_level(stderr_line).0 {
                Some(level) if level.is_error() => warn!(target: "rds::job", "{stderr_line}"),
                Some(LogLevel::Warning) => warn!(target: "rds::job", "{stderr_line}"),
                _ => debug!(target: "rds::job", "{stderr_line}"),
            }
        }
    }

    fn on_job_completion(&mut self, return_code: i32) {
        info!(return_code, "job process exited");
    }
}

/// The default handler set: file logs plus tracing mirror.
pub fn default_handlers() -> Vec<Box<dyn OutputHandler>> {
    vec![Box::new(FileOutputHandler::new()), Box::new(TracingOutputHandler)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rds_core::Runtime;
    use std::collections::HashMap;

    fn config(job_path: std::path::PathBuf) -> JobConfig {
        JobConfig {
            function_folder: job_path.join("code"),
            data_path: job_path.join("data"),
            job_path,
            args: vec!["main.py".to_string()],
            runtime: Runtime::ephemeral("do@x"),
            timeout_secs: 300,
            extra_env: HashMap::new(),
            blocking: true,
            data_mount_dir: String::new(),
        }
    }

    #[test]
    fn file_handler_writes_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path().to_path_buf());
        std::fs::create_dir_all(config.logs_dir()).unwrap();

        let mut handler = FileOutputHandler::new();
        handler.on_job_start(&config);
        handler.on_job_progress("hello", "");
        handler.on_job_progress("", "ERROR: boom");
        handler.on_job_completion(0);

        let stdout = std::fs::read_to_string(config.logs_dir().join("stdout.log")).unwrap();
        let stderr = std::fs::read_to_string(config.logs_dir().join("stderr.log")).unwrap();
        assert_eq!(stdout, "hello\n");
        assert_eq!(stderr, "ERROR: boom\n");
    }
}
