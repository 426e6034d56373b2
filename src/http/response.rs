//! Response handle passed to request handlers.
//!
//! # Responsibilities
//! - Let any handler (sync or from a spawned task) answer a request
//! - Guarantee at most one response per request
//!
//! # Design Decisions
//! - A oneshot channel back to the connection task; the first `send` wins
//! - Dropping every clone without sending leaves the request unanswered,
//!   which the HTTP binding turns into a wait for the request timeout

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Response;
use tokio::sync::oneshot;

/// Receiving side of a [`Responder`], held by the connection task.
pub type ResponseReceiver = oneshot::Receiver<Response<Body>>;

/// Handle used to answer a request. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Responder {
    slot: Arc<Mutex<Option<oneshot::Sender<Response<Body>>>>>,
}

impl Responder {
    /// Create a responder and the receiver the connection task waits on.
    pub fn channel() -> (Self, ResponseReceiver) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Send the response.
    ///
    /// Returns false if a response was already sent or the connection is gone.
    pub fn send(&self, response: Response<Body>) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };

        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// True once a response has been sent (or the slot was poisoned).
    pub fn is_sent(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_none()).unwrap_or(true)
    }
}
