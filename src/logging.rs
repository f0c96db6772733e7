//! Logging collaborator handed to the controller.
//!
//! Records go through the `log` facade under a per-service target. By default
//! they reach whatever logger `main` installed; tests inject their own sink.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use log::{Level, Log, Record};

#[derive(Clone)]
pub struct EventLog {
    target: String,
    sink: Option<Arc<dyn Log>>,
}

impl EventLog {
    /// Forward to the process-wide logger under `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            sink: None,
        }
    }

    /// Forward to an explicit logger instead of the global one
    pub fn with_sink(target: impl Into<String>, sink: Arc<dyn Log>) -> Self {
        Self {
            target: target.into(),
            sink: Some(sink),
        }
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Info, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Warn, args);
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Error, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Debug, args);
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        let logger: &dyn Log = match &self.sink {
            Some(sink) => sink.as_ref(),
            None => log::logger(),
        };
        let record = Record::builder()
            .args(args)
            .level(level)
            .target(&self.target)
            .module_path(Some(module_path!()))
            .build();
        if logger.enabled(record.metadata()) {
            logger.log(&record);
        }
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("target", &self.target)
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}

/// Install the process logger: `[timestamp level file:line] message`,
/// Info by default, overridable through `RUST_LOG`.
pub fn init() {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or(record.target()),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
