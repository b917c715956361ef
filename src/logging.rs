//! Explicit logging context.
//!
//! The control plane never reaches for a process-wide logger on its own. The
//! embedding application builds one [`LogContext`] at startup, optionally
//! around its own [`log::Log`] sink, and hands clones of it to the server loop
//! and the route handlers. Call [`LogContext::flush`] once on shutdown.
//!
//! When no sink is injected, records are forwarded to whatever `log` backend
//! the process has installed (a no-op if none).

use log::{Level, LevelFilter, Log, Record};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_TARGET: &str = "admin_control_plane";

/// Shared, cheaply cloneable handle to a leveled log sink
#[derive(Clone)]
pub struct LogContext {
    sink: Option<Arc<dyn Log>>,
    level: LevelFilter,
    target: Arc<str>,
}

impl LogContext {
    /// Context that writes into an injected sink
    pub fn new(sink: Arc<dyn Log>, level: LevelFilter) -> Self {
        Self {
            sink: Some(sink),
            level,
            target: Arc::from(DEFAULT_TARGET),
        }
    }

    /// Context that forwards to the process-wide `log` backend
    pub fn process(level: LevelFilter) -> Self {
        Self {
            sink: None,
            level,
            target: Arc::from(DEFAULT_TARGET),
        }
    }

    /// Context that drops everything
    pub fn disabled() -> Self {
        Self::process(LevelFilter::Off)
    }

    /// Same sink and level, different record target
    pub fn scoped(&self, target: &str) -> Self {
        Self {
            sink: self.sink.clone(),
            level: self.level,
            target: Arc::from(target),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }

        let record = Record::builder()
            .args(args)
            .level(level)
            .target(&self.target)
            .build();

        match &self.sink {
            Some(sink) => {
                if sink.enabled(record.metadata()) {
                    sink.log(&record);
                }
            }
            None => log::logger().log(&record),
        }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    /// Flush buffered records; part of shutdown teardown
    pub fn flush(&self) {
        match &self.sink {
            Some(sink) => sink.flush(),
            None => log::logger().flush(),
        }
    }
}

impl fmt::Debug for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogContext")
            .field("sink", &self.sink.as_ref().map(|_| "<injected>"))
            .field("level", &self.level)
            .field("target", &self.target)
            .finish()
    }
}

/// In-memory sink, used by tests to assert on emitted lines
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: parking_lot::Mutex<Vec<(Level, String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured `(level, target, message)` so far
    pub fn lines(&self) -> Vec<(Level, String, String)> {
        self.lines.lock().clone()
    }

    /// Captured messages at the given level
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .map(|(_, _, message)| message.clone())
            .collect()
    }
}

impl Log for MemorySink {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.lines.lock().push((
            record.level(),
            record.target().to_string(),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}
