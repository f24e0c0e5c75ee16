//! Subprocess driving: line-buffered capture of both streams, 100ms exit
//! polling, and the ERROR-log demotion rule.

use std::io::{BufRead, BufReader, Read};
use std::process::Child;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::handlers::OutputHandler;
use crate::logs::parse_log_level;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a detached (non-blocking) job process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Arc<Mutex<Child>>,
    pid: u32,
}

impl ProcessHandle {
    pub(crate) fn new(child: Arc<Mutex<Child>>, pid: u32) -> Self {
        Self { child, pid }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn kill(&self) -> std::io::Result<()> {
        self.child.lock().expect("child lock poisoned").kill()
    }

    pub fn try_wait(&self) -> std::io::Result<Option<i32>> {
        let status = self.child.lock().expect("child lock poisoned").try_wait()?;
        Ok(status.map(|s| s.code().unwrap_or(-1)))
    }

    /// Poll until the process exits. Never holds the child lock while
    /// sleeping, so `kill` stays callable from other threads.
    pub fn wait(&self) -> std::io::Result<i32> {
        loop {
            if let Some(code) = self.try_wait()? {
                return Ok(code);
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

enum StreamLine {
    Out(String),
    Err(String),
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    tx: mpsc::Sender<StreamLine>,
    wrap: fn(String) -> StreamLine,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(std::io::Result::ok) {
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    })
}

/// The outcome of driving a process to completion, after demotion.
pub(crate) struct DriveResult {
    pub return_code: i32,
    pub error_message: Option<String>,
}

/// Drain both streams into the handlers while polling for exit. On stream
/// close any buffered lines are flushed. A zero exit with ERROR/CRITICAL
/// stderr lines is demoted to a failure with return code 1.
pub(crate) fn drive(
    child: &Arc<Mutex<Child>>,
    handlers: &mut [Box<dyn OutputHandler>],
) -> std::io::Result<DriveResult> {
    let (stdout, stderr) = {
        let mut child = child.lock().expect("child lock poisoned");
        (child.stdout.take(), child.stderr.take())
    };

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::new();
    if let Some(stdout) = stdout {
        readers.push(spawn_reader(stdout, tx.clone(), StreamLine::Out));
    }
    if let Some(stderr) = stderr {
        readers.push(spawn_reader(stderr, tx.clone(), StreamLine::Err));
    }
    drop(tx);

    let mut stderr_lines: Vec<String> = Vec::new();
    let mut error_lines: Vec<String> = Vec::new();
    let deliver = |line: StreamLine,
                       handlers: &mut [Box<dyn OutputHandler>],
                       stderr_lines: &mut Vec<String>,
                       error_lines: &mut Vec<String>| match line {
        StreamLine::Out(l) => {
            for handler in handlers.iter_mut() {
                handler.on_job_progress(&l, "");
            }
        }
        StreamLine::Err(l) => {
            if parse_log_level(&l).0.is_some_and(|level| level.is_error()) {
                error_lines.push(l.clone());
            }
            stderr_lines.push(l.clone());
            for handler in handlers.iter_mut() {
                handler.on_job_progress("", &l);
            }
        }
    };

    let raw_code = loop {
        for line in rx.try_iter() {
            deliver(line, handlers, &mut stderr_lines, &mut error_lines);
        }
        let status = child.lock().expect("child lock poisoned").try_wait()?;
        if let Some(status) = status {
            debug!("process exited with {status}");
            break status.code().unwrap_or(-1);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    };

    // Readers finish at EOF once the process is gone; flush what remains.
    for reader in readers {
        let _ = reader.join();
    }
    for line in rx.try_iter() {
        deliver(line, handlers, &mut stderr_lines, &mut error_lines);
    }

    let mut return_code = raw_code;
    let error_message = if raw_code != 0 {
        if stderr_lines.is_empty() {
            None
        } else {
            Some(concat_lines(&stderr_lines))
        }
    } else if !error_lines.is_empty() {
        // Exit 0 but ERROR-level stderr: treat as failure.
        debug!(
            "demoting successful exit: {} error-level stderr line(s)",
            error_lines.len()
        );
        return_code = 1;
        Some(concat_lines(&error_lines))
    } else {
        None
    };

    for handler in handlers.iter_mut() {
        handler.on_job_completion(raw_code);
    }

    Ok(DriveResult {
        return_code,
        error_message,
    })
}

fn concat_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out
}
