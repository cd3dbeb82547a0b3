//! Structured JSON logging
//!
//! One line per event, written synchronously. The event name leads, severity
//! follows, fields in alphabetical order, so identical events produce
//! identical lines. Errors go to stderr, everything else to stdout.

use std::fmt;
use std::io::{self, Write};

/// Log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Normal operations
    Info,
    /// Rejected requests: limit and multiplicity enforcement
    Warn,
    /// Write conflicts and store failures
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Synchronous JSON-lines logger
pub struct Logger;

impl Logger {
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Info, event, fields, &mut io::stdout());
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Warn, event, fields, &mut io::stdout());
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::emit(Severity::Error, event, fields, &mut io::stderr());
    }

    fn emit<W: Write>(severity: Severity, event: &str, fields: &[(&str, &str)], out: &mut W) {
        let mut ordered: Vec<&(&str, &str)> = fields.iter().collect();
        ordered.sort_by_key(|(key, _)| *key);

        let mut line = String::with_capacity(128);
        line.push('{');
        push_pair(&mut line, "event", event);
        line.push(',');
        push_pair(&mut line, "severity", severity.as_str());
        for (key, value) in ordered {
            line.push(',');
            push_pair(&mut line, key, value);
        }
        line.push_str("}\n");

        // one write call so concurrent events do not interleave
        let _ = out.write_all(line.as_bytes());
        let _ = out.flush();
    }
}

/// serde_json handles escaping, control characters included
fn push_pair(line: &mut String, key: &str, value: &str) {
    line.push_str(&serde_json::to_string(key).unwrap_or_default());
    line.push(':');
    line.push_str(&serde_json::to_string(value).unwrap_or_default());
}

#[cfg(test)]
pub fn capture_log(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
    let mut buffer = Vec::new();
    Logger::emit(severity, event, fields, &mut buffer);
    String::from_utf8(buffer).unwrap()
}
