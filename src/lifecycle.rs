//! Start/stop control for the HTTP control plane.
//!
//! # Data Flow
//! ```text
//! Controller::start:
//!     Validate config → Build runtime → Bind listener → Spawn accept loop
//!
//! Controller::stop:
//!     Trigger signal → Accept loop exits → Listener closed
//!         → In-flight connections drained (bounded) → Runtime shut down
//! ```
//!
//! The controller owns its runtime and blocks (bounded) while stopping. When
//! `stop` or drop happens on a thread already driving a tokio runtime, the
//! wait moves to a helper thread.

use crate::acceptor::ConnectionAcceptor;
use crate::config::ControlPlaneConfig;
use crate::error::{ServerError, ServerResult};
use crate::logging::LogContext;
use crate::metrics::ControlPlaneStats;
use crate::moderation::ModerationSink;
use crate::router::Router;
use crate::server::ControlServer;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::{self, Handle, Runtime};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Extra time `stop` allows on top of the connection grace period
const STOP_MARGIN: Duration = Duration::from_millis(500);

/// One-shot cancellation flag. Goes from unset to set once and never back.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

#[derive(Default)]
struct SignalInner {
    triggered: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal. Returns `true` only for the call that actually set it.
    pub fn trigger(&self) -> bool {
        if self.inner.triggered.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.notify.notify_waiters();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Resolve once the signal is set
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent trigger is not missed
        notified.as_mut().enable();

        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .finish()
    }
}

enum State {
    Idle,
    Running {
        runtime: Runtime,
        handle: JoinHandle<ServerResult<()>>,
        local_addr: SocketAddr,
    },
    Stopped,
}

/// Owns the control plane's runtime and its shutdown signal
pub struct Controller {
    config: ControlPlaneConfig,
    router: Arc<Router>,
    log: LogContext,
    stats: Arc<ControlPlaneStats>,
    shutdown: ShutdownSignal,
    state: Mutex<State>,
}

impl Controller {
    pub fn new(config: ControlPlaneConfig, sink: Arc<dyn ModerationSink>, log: LogContext) -> Self {
        let stats = Arc::new(ControlPlaneStats::new());
        let router = Arc::new(Router::with_stats(
            sink,
            log.scoped("admin_control_plane::routes"),
            stats.clone(),
        ));

        Self {
            config,
            router,
            log,
            stats,
            shutdown: ShutdownSignal::new(),
            state: Mutex::new(State::Idle),
        }
    }

    /// Bind the listener and spawn the accept loop; returns without waiting
    /// for any connection.
    ///
    /// Call at most once. Later calls, including after `stop`, return
    /// [`ServerError::AlreadyStarted`]. A bind failure is returned as
    /// [`ServerError::Bind`] and leaves the controller idle.
    pub fn start(&self) -> ServerResult<SocketAddr> {
        let mut state = self.state.lock();
        if !matches!(*state, State::Idle) {
            return Err(ServerError::AlreadyStarted);
        }

        let addr = self.config.validate()?;

        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads)
            .thread_name("control-plane")
            .enable_all()
            .build()
            .map_err(|e| ServerError::Runtime(format!("failed to build runtime: {}", e)))?;

        let bound = {
            let _guard = runtime.enter();
            ConnectionAcceptor::bind(addr, &self.config)
                .and_then(|acceptor| Ok((acceptor.local_addr()?, acceptor)))
        };
        let (local_addr, acceptor) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                runtime.shutdown_background();
                return Err(e);
            }
        };

        let server = ControlServer::new(
            acceptor,
            self.router.clone(),
            self.log.scoped("admin_control_plane::server"),
            self.stats.clone(),
            self.config.shutdown_grace,
        );
        let handle = runtime.spawn(server.run(self.shutdown.clone()));

        *state = State::Running {
            runtime,
            handle,
            local_addr,
        };
        Ok(local_addr)
    }

    /// Stop accepting and wait briefly for the loop to wind down.
    ///
    /// Idempotent: only the first call does anything.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), State::Stopped);
        self.shutdown.trigger();

        let (runtime, handle) = match previous {
            State::Running { runtime, handle, .. } => (runtime, handle),
            State::Idle | State::Stopped => return,
        };

        self.log.info(format_args!("Stopping HTTP control plane"));

        let wait = self.config.shutdown_grace + STOP_MARGIN;
        if Handle::try_current().is_ok() {
            // Blocking on our runtime from inside another one panics
            let log = self.log.clone();
            let joined = thread::Builder::new()
                .name("control-plane-stop".to_string())
                .spawn(move || wait_for_loop(runtime, handle, wait, &log))
                .map(|helper| helper.join());

            match joined {
                Ok(Ok(())) => {}
                Ok(Err(_)) => self.log.error(format_args!("HTTP control plane stop thread panicked")),
                Err(e) => self.log.error(format_args!("Could not spawn stop thread: {}", e)),
            }
        } else {
            wait_for_loop(runtime, handle, wait, &self.log);
        }

        self.log.flush();
    }

    /// Address the listener is bound to while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.lock() {
            State::Running { local_addr, .. } => Some(*local_addr),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running { .. })
    }

    pub fn stats(&self) -> Arc<ControlPlaneStats> {
        self.stats.clone()
    }
}

/// Wait up to `wait` for the accept loop to return, then tear the runtime down
fn wait_for_loop(runtime: Runtime, handle: JoinHandle<ServerResult<()>>, wait: Duration, log: &LogContext) {
    match runtime.block_on(async { tokio::time::timeout(wait, handle).await }) {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => log.error(format_args!("HTTP server loop failed: {}", e)),
        Ok(Err(e)) => log.error(format_args!("HTTP server loop panicked: {}", e)),
        Err(_) => log.warn(format_args!(
            "HTTP server loop did not acknowledge shutdown within {:?}",
            wait
        )),
    }

    runtime.shutdown_timeout(STOP_MARGIN);
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
