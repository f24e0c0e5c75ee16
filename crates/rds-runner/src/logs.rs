//! Log-level sniffing for captured output lines.
//!
//! Some interpreters exit 0 after printing non-fatal errors; the runner uses
//! this parser to demote such runs. Only a small set of fixed formats is
//! recognised; a line that matches nothing is simply not a log line.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn from_token(token: &str) -> Option<LogLevel> {
        match token.to_ascii_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Critical)
    }
}

/// Parse the level token at the start of a line: `LEVEL rest`, `LEVEL: rest`
/// or `[LEVEL] rest`, case-insensitive. Returns the level and the remainder.
pub fn parse_log_level(line: &str) -> (Option<LogLevel>, &str) {
    let trimmed = line.trim_start();

    let (token, rest) = if let Some(stripped) = trimmed.strip_prefix('[') {
        match stripped.split_once(']') {
            Some((token, rest)) => (token, rest),
            None => return (None, line),
        }
    } else {
        let end = trimmed
            .find(|c: char| c == ':' || c.is_whitespace())
            .unwrap_or(trimmed.len());
        (&trimmed[..end], trimmed[end..].strip_prefix(':').unwrap_or(&trimmed[end..]))
    };

    match LogLevel::from_token(token) {
        Some(level) => (Some(level), rest.trim_start()),
        None => (None, line),
    }
}
