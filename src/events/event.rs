//! Events produced by a dispatcher.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use crate::http::{IncomingRequest, Responder, UpgradeSocket};

pub const REQUEST: &str = "request";
pub const UPGRADE: &str = "upgrade";
pub const UNKNOWN: &str = "unknown";
pub const LOG: &str = "log";

/// Continuation handed to claimed-request subscribers. Calling it is optional.
pub type Continuation = fn();

/// The continuation passed with every claimed request. Does nothing.
pub fn noop() {}

/// Severity attached to a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warn,
    Info,
    Debug,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `log` event: `(severity?, message, args...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: Option<Severity>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl LogRecord {
    pub fn new(severity: Option<Severity>, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            args: Vec::new(),
        }
    }
}

/// An event delivered to dispatcher subscribers.
#[derive(Debug, Clone)]
pub enum Event {
    /// A claimed plain request.
    Request {
        request: Arc<IncomingRequest>,
        response: Responder,
        next: Continuation,
    },
    /// A claimed upgrade attempt; `head` is the dispatcher's private copy.
    Upgrade {
        request: Arc<IncomingRequest>,
        socket: UpgradeSocket,
        head: Bytes,
        next: Continuation,
    },
    /// A request outside the base path.
    Unknown { request: Arc<IncomingRequest> },
    Log(LogRecord),
    /// Any other event name, with an arbitrary JSON payload.
    Custom {
        name: Cow<'static, str>,
        payload: serde_json::Value,
    },
}

impl Event {
    /// Name subscribers register under to receive this event.
    pub fn name(&self) -> &str {
        match self {
            Event::Request { .. } => REQUEST,
            Event::Upgrade { .. } => UPGRADE,
            Event::Unknown { .. } => UNKNOWN,
            Event::Log(_) => LOG,
            Event::Custom { name, .. } => name.as_ref(),
        }
    }
}
