use crate::config::ControlPlaneConfig;
use crate::connection::Connection;
use crate::error::{ServerError, ServerResult};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

/// Owns the listening socket and hands out accepted [`Connection`]s.
///
/// Dropping the acceptor closes the socket.
pub struct ConnectionAcceptor {
    listener: TcpListener,
    connection_count: AtomicUsize,
    read_timeout: Duration,
    max_header_size: usize,
}

impl ConnectionAcceptor {
    /// Bind to `addr`. Must be called from within a tokio runtime.
    pub fn bind(addr: SocketAddr, config: &ControlPlaneConfig) -> ServerResult<Self> {
        let socket = Self::create_socket(&addr, config.backlog_size).map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })?;

        let listener = TcpListener::from_std(socket.into()).map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })?;

        Ok(Self {
            listener,
            connection_count: AtomicUsize::new(0),
            read_timeout: config.read_timeout,
            max_header_size: config.max_header_size,
        })
    }

    /// Wait for the next connection
    pub async fn accept(&self) -> io::Result<Connection> {
        let (stream, addr) = self.listener.accept().await?;
        let id = self.connection_count.fetch_add(1, Ordering::Relaxed);

        Ok(Connection::new(stream, addr, id, self.read_timeout, self.max_header_size))
    }

    /// Get the local address this acceptor is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of connections accepted so far
    pub fn accepted(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Create a properly configured socket
    fn create_socket(addr: &SocketAddr, backlog: u32) -> io::Result<Socket> {
        let domain = if addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nonblocking(true)?;

        // Quick restarts without waiting out TIME_WAIT. On Windows this option
        // would let a second process steal the port, so leave it off there.
        #[cfg(unix)]
        socket.set_reuse_address(true)?;

        socket.bind(&(*addr).into())?;
        socket.listen(backlog.min(i32::MAX as u32) as i32)?;

        Ok(socket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection;
    use crate::logging::LogContext;
    use crate::metrics::ControlPlaneStats;
    use crate::moderation::LoggingSink;
    use crate::router::Router;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = ControlPlaneConfig::new().with_address("127.0.0.1", 0);
        let acceptor = ConnectionAcceptor::bind(config.validate().unwrap(), &config).unwrap();
        let addr = acceptor.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
        assert_eq!(acceptor.accepted(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let config = ControlPlaneConfig::new().with_address("127.0.0.1", 0);
        let first = ConnectionAcceptor::bind(config.validate().unwrap(), &config).unwrap();
        let taken = first.local_addr().unwrap();

        match ConnectionAcceptor::bind(taken, &config) {
            Err(ServerError::Bind { address, .. }) => assert_eq!(address, taken.to_string()),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("second bind on {} succeeded", taken),
        }
    }

    #[tokio::test]
    async fn test_accept_assigns_sequential_ids() {
        let config = ControlPlaneConfig::new().with_address("127.0.0.1", 0);
        let acceptor = ConnectionAcceptor::bind(config.validate().unwrap(), &config).unwrap();
        let addr = acceptor.local_addr().unwrap();

        let _a = tokio::net::TcpStream::connect(addr).await.unwrap();
        let _b = tokio::net::TcpStream::connect(addr).await.unwrap();

        let first = acceptor.accept().await.unwrap();
        let second = acceptor.accept().await.unwrap();
        assert_eq!(first.id(), 0);
        assert_eq!(second.id(), 1);
        assert_eq!(acceptor.accepted(), 2);
    }

    #[tokio::test]
    async fn test_client_that_hung_up_is_still_accepted() {
        let config = ControlPlaneConfig::new().with_address("127.0.0.1", 0);
        let acceptor = ConnectionAcceptor::bind(config.validate().unwrap(), &config).unwrap();
        let addr = acceptor.local_addr().unwrap();

        let client = std::net::TcpStream::connect(addr).unwrap();
        socket2::SockRef::from(&client).set_linger(Some(Duration::ZERO)).unwrap();
        drop(client);

        // Socket setup belongs to the connection now; accept only fails for listener errors
        let connection = acceptor.accept().await.unwrap();
        assert_eq!(connection.id(), 0);

        let log = LogContext::disabled();
        let router = Router::new(Arc::new(LoggingSink::new(log.clone())), log.clone());
        let stats = ControlPlaneStats::new();
        assert!(connection::serve(connection, &router, &log, &stats).await.is_err());
        assert_eq!(stats.responses_total(), 0);
    }
}
