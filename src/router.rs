use crate::http::{Method, Request, Response};
use crate::logging::LogContext;
use crate::metrics::ControlPlaneStats;
use crate::moderation::{Action, ModerationSink};
use crate::routes::ActionHandler;
use std::fmt;
use std::sync::Arc;

/// Routes control plane requests.
///
/// Method is checked before path, and the router only does a prefix test:
/// `/kick/` with no id reaches the kick handler and comes back 400, not 404.
#[derive(Clone)]
pub struct Router {
    /// The routes registered with this router, checked in order
    routes: Vec<ActionHandler>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .finish()
    }
}

impl Router {
    /// Create a router with the kick and ban routes
    pub fn new(sink: Arc<dyn ModerationSink>, log: LogContext) -> Self {
        Self::with_stats(sink, log, Arc::new(ControlPlaneStats::new()))
    }

    /// Create a router whose handlers count forwarded instructions into `stats`
    pub fn with_stats(sink: Arc<dyn ModerationSink>, log: LogContext, stats: Arc<ControlPlaneStats>) -> Self {
        let routes = Action::ALL
            .iter()
            .map(|&action| ActionHandler::new(action, sink.clone(), log.clone(), stats.clone()))
            .collect();

        Self { routes }
    }

    /// Decide the response for a method and path
    pub fn dispatch(&self, method: &Method, path: &str) -> Response {
        if *method != Method::Post {
            return Response::method_not_allowed();
        }

        match self.routes.iter().find(|route| path.starts_with(route.prefix())) {
            Some(route) => route.handle(path),
            None => Response::not_found(),
        }
    }

    /// Handle a parsed request
    pub fn handle_request(&self, request: &Request) -> Response {
        self.dispatch(&request.method, request.path())
    }
}
