//! Logger shortcut over the `log` event.
//!
//! Every call emits one `log` event, so an observer subscribed to `log`
//! receives all severities. Records are mirrored into `tracing` as well.

use std::fmt::Display;

use crate::events::{Emitter, Event, LogRecord, Severity};

/// Severity-tagged emitters bound to a dispatcher's event registry.
#[derive(Debug, Clone, Copy)]
pub struct Logger<'a> {
    events: &'a Emitter,
    transport: &'a str,
}

impl<'a> Logger<'a> {
    pub fn new(events: &'a Emitter, transport: &'a str) -> Self {
        Self { events, transport }
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogRecord::new(Some(Severity::Error), message));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogRecord::new(Some(Severity::Warn), message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogRecord::new(Some(Severity::Info), message));
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogRecord::new(Some(Severity::Debug), message));
    }

    /// Untagged log line.
    pub fn plain(&self, message: impl Into<String>) {
        self.emit(LogRecord::new(None, message));
    }

    /// Log with extra arguments, rendered with `Display`.
    pub fn log<I, D>(&self, severity: Option<Severity>, message: impl Into<String>, args: I)
    where
        I: IntoIterator<Item = D>,
        D: Display,
    {
        let mut record = LogRecord::new(severity, message);
        record.args = args.into_iter().map(|arg| arg.to_string()).collect();
        self.emit(record);
    }

    fn emit(&self, record: LogRecord) {
        let transport = self.transport;
        let message = record.message.as_str();
        let args = &record.args;
        match record.severity {
            Some(Severity::Error) => tracing::error!(transport, ?args, "{message}"),
            Some(Severity::Warn) => tracing::warn!(transport, ?args, "{message}"),
            Some(Severity::Debug) => tracing::debug!(transport, ?args, "{message}"),
            Some(Severity::Info) | None => tracing::info!(transport, ?args, "{message}"),
        }

        self.events.emit(&Event::Log(record));
    }
}
