//! Administrative HTTP control plane for a voice server.
//!
//! Operators issue `POST /kick/{id}` and `POST /ban/{id}` over plain HTTP on a
//! loopback port. Requests are validated and forwarded to a
//! [`ModerationSink`]; enforcement belongs to whoever owns client state.

pub mod acceptor;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod moderation;
pub mod router;
pub mod routes;
pub mod server;

/// Re-exports of common components for easier access
pub use acceptor::ConnectionAcceptor;
pub use config::ControlPlaneConfig;
pub use connection::Connection;
pub use error::{ServerError, ServerResult};
pub use http::{HttpParser, Method, Request, Response, Status};
pub use lifecycle::{Controller, ShutdownSignal};
pub use logging::LogContext;
pub use metrics::{ControlPlaneStats, Counter};
pub use moderation::{Action, ChannelSink, LoggingSink, ModerationCommand, ModerationSink};
pub use router::Router;
pub use routes::ActionHandler;
pub use server::ControlServer;
