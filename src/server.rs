use crate::acceptor::ConnectionAcceptor;
use crate::connection;
use crate::error::ServerResult;
use crate::lifecycle::ShutdownSignal;
use crate::logging::LogContext;
use crate::metrics::ControlPlaneStats;
use crate::router::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time;

/// Pause after a failed accept, so a persistent error (EMFILE) does not spin
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// The accept loop. Each accepted connection is served on its own task.
pub struct ControlServer {
    acceptor: ConnectionAcceptor,
    router: Arc<Router>,
    log: LogContext,
    stats: Arc<ControlPlaneStats>,
    shutdown_grace: Duration,
}

impl ControlServer {
    pub fn new(
        acceptor: ConnectionAcceptor,
        router: Arc<Router>,
        log: LogContext,
        stats: Arc<ControlPlaneStats>,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            acceptor,
            router,
            log,
            stats,
            shutdown_grace,
        }
    }

    /// Accept and serve until `shutdown` fires, then close the listener and
    /// give in-flight connections up to the grace period to finish.
    pub async fn run(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let Self {
            acceptor,
            router,
            log,
            stats,
            shutdown_grace,
        } = self;

        let local_addr = acceptor.local_addr()?;
        log.info(format_args!("HTTP Server started. Listening on http://{}/", local_addr));

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.wait() => break,

                accepted = acceptor.accept() => match accepted {
                    Ok(conn) => {
                        stats.connections_accepted.increment(1);

                        let router = router.clone();
                        let log = log.clone();
                        let stats = stats.clone();
                        connections.spawn(async move {
                            let id = conn.id();
                            let peer = conn.peer_addr();
                            if let Err(e) = connection::serve(conn, &router, &log, &stats).await {
                                log.error(format_args!(
                                    "Error processing HTTP request from {} (connection {}): {}",
                                    peer, id, e
                                ));
                                stats.connection_errors.increment(1);
                            }
                        });
                    }
                    Err(e) => {
                        stats.accept_errors.increment(1);
                        log.error(format_args!("Error accepting HTTP connection: {}", e));
                        time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            stats.connection_errors.increment(1);
                            log.error(format_args!("Connection task panicked: {}", e));
                        }
                    }
                }
            }
        }

        // Closes the listening socket; the signal is not looked at again.
        drop(acceptor);

        let in_flight = connections.len();
        if in_flight > 0 {
            log.debug(format_args!("Waiting for {} in-flight connection(s)", in_flight));
            let drained = time::timeout(shutdown_grace, async {
                while connections.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                let abandoned = connections.len();
                log.warn(format_args!(
                    "Abandoning {} connection(s) still open after {:?}",
                    abandoned, shutdown_grace
                ));
                stats.connections_abandoned.increment(abandoned);
                connections.abort_all();
            }
        }

        log.info(format_args!("HTTP Server stopped. {}", stats.format()));
        Ok(())
    }
}
