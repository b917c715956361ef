use crate::http::{Response, Status};
use crate::logging::LogContext;
use crate::metrics::ControlPlaneStats;
use crate::moderation::{Action, ModerationCommand, ModerationSink};
use std::fmt;
use std::sync::Arc;

/// Handler for `POST /{action}/{id}`, one instance per action
#[derive(Clone)]
pub struct ActionHandler {
    action: Action,
    /// `/{action}/`, built once
    prefix: String,
    sink: Arc<dyn ModerationSink>,
    log: LogContext,
    stats: Arc<ControlPlaneStats>,
}

impl fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandler")
            .field("action", &self.action)
            .field("prefix", &self.prefix)
            .field("sink", &"<sink>")
            .finish()
    }
}

impl ActionHandler {
    pub fn new(
        action: Action,
        sink: Arc<dyn ModerationSink>,
        log: LogContext,
        stats: Arc<ControlPlaneStats>,
    ) -> Self {
        Self {
            action,
            prefix: format!("/{}/", action.as_str()),
            sink,
            log,
            stats,
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Coarse prefix the router uses to pick this handler
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The user id if `path` is exactly `/{action}/{alphanumeric}`
    pub fn extract_user_id<'a>(&self, path: &'a str) -> Option<&'a str> {
        let id = path.strip_prefix(self.prefix.as_str())?;
        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric()) {
            Some(id)
        } else {
            None
        }
    }

    /// Validate the path and forward the instruction
    pub fn handle(&self, path: &str) -> Response {
        let user_id = match self.extract_user_id(path) {
            Some(id) => id,
            None => {
                return Response::new(
                    Status::BadRequest,
                    format!("Invalid {} request format", self.action),
                )
            }
        };

        self.log.info(format_args!(
            "Received {} request for user ID: {}",
            self.action, user_id
        ));

        match self.sink.submit(ModerationCommand::new(self.action, user_id)) {
            Ok(()) => self.stats.commands_forwarded.increment(1),
            Err(e) => self.log.warn(format_args!(
                "Could not forward {} for user ID {}: {}",
                self.action, user_id, e
            )),
        }

        Response::new(
            Status::Ok,
            format!("{} instruction received for user ID: {}", self.action.title(), user_id),
        )
    }
}
