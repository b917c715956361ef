use crate::http::Status;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A simple counter that can be incremented atomically
#[derive(Debug)]
pub struct Counter {
    value: AtomicUsize,
}

impl Counter {
    /// Create a new counter with an initial value
    pub fn new(initial_value: usize) -> Self {
        Self {
            value: AtomicUsize::new(initial_value),
        }
    }

    /// Increment the counter by a specific amount
    pub fn increment(&self, amount: usize) {
        self.value.fetch_add(amount, Ordering::Relaxed);
    }

    /// Get the current value of the counter
    pub fn value(&self) -> usize {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Counters for a running control plane
#[derive(Debug, Default)]
pub struct ControlPlaneStats {
    pub connections_accepted: Counter,
    pub accept_errors: Counter,
    pub connection_errors: Counter,
    /// Connections still open when the shutdown grace period ran out
    pub connections_abandoned: Counter,
    pub responses_success: Counter,
    pub responses_client_error: Counter,
    /// Instructions accepted by the moderation sink
    pub commands_forwarded: Counter,
}

impl ControlPlaneStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a response written back to a client
    pub fn record_response(&self, status: Status) {
        if status.is_success() {
            self.responses_success.increment(1);
        } else {
            self.responses_client_error.increment(1);
        }
    }

    pub fn responses_total(&self) -> usize {
        self.responses_success.value() + self.responses_client_error.value()
    }

    /// One-line summary
    pub fn format(&self) -> String {
        format!(
            "connections={} accept_errors={} connection_errors={} abandoned={} responses_2xx={} responses_4xx={} forwarded={}",
            self.connections_accepted.value(),
            self.accept_errors.value(),
            self.connection_errors.value(),
            self.connections_abandoned.value(),
            self.responses_success.value(),
            self.responses_client_error.value(),
            self.commands_forwarded.value(),
        )
    }
}
