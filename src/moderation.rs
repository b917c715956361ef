//! The boundary to whatever owns connected clients.
//!
//! Route handlers only record intent: they hand a [`ModerationCommand`] to a
//! [`ModerationSink`] and answer the HTTP caller. Enforcement (dropping the
//! client, persisting the ban) happens on the other side of the sink.

use crate::error::{ServerError, ServerResult};
use crate::logging::LogContext;
use std::fmt;
use tokio::sync::mpsc;

/// Moderation actions exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Kick,
    Ban,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Kick, Action::Ban];

    /// Lowercase name, as used in paths and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Kick => "kick",
            Action::Ban => "ban",
        }
    }

    /// Capitalized name, as used in confirmation messages
    pub fn title(&self) -> &'static str {
        match self {
            Action::Kick => "Kick",
            Action::Ban => "Ban",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationCommand {
    pub action: Action,
    pub user_id: String,
}

impl ModerationCommand {
    pub fn new(action: Action, user_id: impl Into<String>) -> Self {
        Self {
            action,
            user_id: user_id.into(),
        }
    }
}

/// Receiver of moderation instructions. Called from connection tasks, so
/// implementations must tolerate concurrent submits.
pub trait ModerationSink: Send + Sync {
    fn submit(&self, command: ModerationCommand) -> ServerResult<()>;
}

/// Sink that only logs what it would enforce
#[derive(Debug, Clone)]
pub struct LoggingSink {
    log: LogContext,
}

impl LoggingSink {
    pub fn new(log: LogContext) -> Self {
        Self { log }
    }
}

impl ModerationSink for LoggingSink {
    fn submit(&self, command: ModerationCommand) -> ServerResult<()> {
        self.log.info(format_args!(
            "Moderation instruction queued: {} {}",
            command.action, command.user_id
        ));
        Ok(())
    }
}

/// Sink that enqueues commands for the task owning client state
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ModerationCommand>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ModerationCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ModerationSink for ChannelSink {
    fn submit(&self, command: ModerationCommand) -> ServerResult<()> {
        self.tx
            .send(command)
            .map_err(|e| ServerError::ModerationUnavailable(format!("receiver dropped, lost {:?}", e.0)))
    }
}
