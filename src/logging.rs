// src/logging.rs
// Leveled, timestamped logging for the arena server

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::Local;

use crate::session::SessionId;

/// Log level enum, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Set the process-wide minimum level; messages below it are dropped
pub fn set_min_level(level: LogLevel) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn min_level() -> LogLevel {
    LogLevel::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

fn enabled(level: LogLevel) -> bool {
    level >= min_level()
}

/// Format and print a log message with timestamp
pub fn log_message(level: LogLevel, message: &str) {
    if !enabled(level) {
        return;
    }
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    println!("{} - {} - {}", timestamp, level.as_str(), message);
}

pub fn log_debug(message: &str) {
    log_message(LogLevel::Debug, message);
}

pub fn log_info(message: &str) {
    log_message(LogLevel::Info, message);
}

pub fn log_warning(message: &str) {
    log_message(LogLevel::Warning, message);
}

pub fn log_error(message: &str) {
    log_message(LogLevel::Error, message);
}

/// Startup failures bypass the level filter and go to stderr
pub fn log_error_stderr(message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    eprintln!("{} - {} - {}", timestamp, LogLevel::Error.as_str(), message);
}

/// Log a message tagged with the session it concerns
pub fn log_session(level: LogLevel, session: SessionId, name: Option<&str>, message: &str) {
    if !enabled(level) {
        return;
    }
    log_message(level, &format!("{} {message}", session_tag(session, name)));
}

fn session_tag(session: SessionId, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("[session {session} {name}]"),
        None => format!("[session {session}]"),
    }
}
