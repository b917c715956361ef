use crate::error::{ServerError, ServerResult};
use crate::http::{HttpParser, Request, Response};
use crate::logging::LogContext;
use crate::metrics::ControlPlaneStats;
use crate::router::Router;
use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

/// One accepted client connection. Serves exactly one request, then closes.
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: usize,
    buffer: BytesMut,
    parser: HttpParser,
    read_timeout: Duration,
}

impl Connection {
    /// Wrap an accepted stream
    pub fn new(
        stream: TcpStream,
        peer_addr: SocketAddr,
        id: usize,
        read_timeout: Duration,
        max_header_size: usize,
    ) -> Self {
        Self {
            stream,
            peer_addr,
            id,
            buffer: BytesMut::with_capacity(1024.min(max_header_size)),
            parser: HttpParser::new(max_header_size),
            read_timeout,
        }
    }

    /// Read until a full request head is buffered
    pub async fn read_request(&mut self) -> ServerResult<Request> {
        loop {
            if let Some(request) = self.parser.parse(&self.buffer)? {
                return Ok(request);
            }

            let read = time::timeout(self.read_timeout, self.stream.read_buf(&mut self.buffer))
                .await
                .map_err(|_| ServerError::RequestTimeout)??;

            if read == 0 {
                return Err(ServerError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed before sending a complete request",
                )));
            }
        }
    }

    /// Write the status line, headers and body
    pub async fn write_response(&mut self, response: &Response) -> ServerResult<()> {
        let encoded = response.to_bytes();
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Close our side of the connection
    pub async fn close(&mut self) -> ServerResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Get the connection's peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get the connection's unique ID
    pub fn id(&self) -> usize {
        self.id
    }
}

/// Serve a single connection: read, route, respond, close.
///
/// Malformed, oversized or slow requests still get an HTTP answer. Errors are
/// returned only when the transport itself failed.
pub async fn serve(
    mut connection: Connection,
    router: &Router,
    log: &LogContext,
    stats: &ControlPlaneStats,
) -> ServerResult<()> {
    // Responses are a single small write
    connection.stream.set_nodelay(true)?;

    let response = match connection.read_request().await {
        Ok(request) => {
            log.debug(format_args!(
                "{} {} from {} (connection {})",
                request.method,
                request.target,
                connection.peer_addr(),
                connection.id()
            ));
            router.handle_request(&request)
        }
        Err(ServerError::RequestTimeout) => {
            log.debug(format_args!("Connection {} timed out reading request", connection.id()));
            Response::request_timeout()
        }
        Err(e @ (ServerError::HttpParse(_) | ServerError::HeaderTooLarge { .. })) => {
            log.debug(format_args!("Rejecting request on connection {}: {}", connection.id(), e));
            Response::invalid_request()
        }
        Err(e) => return Err(e),
    };

    connection.write_response(&response).await?;
    stats.record_response(response.status());
    connection.close().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::LoggingSink;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn roundtrip(raw: &'static [u8], read_timeout: Duration) -> (ServerResult<()>, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(raw).await.unwrap();
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await.unwrap();
            String::from_utf8(reply).unwrap()
        });

        let (stream, peer) = listener.accept().await.unwrap();
        let connection = Connection::new(stream, peer, 7, read_timeout, 1024);
        let log = LogContext::disabled();
        let router = Router::new(Arc::new(LoggingSink::new(log.clone())), log.clone());
        let stats = ControlPlaneStats::new();

        let result = serve(connection, &router, &log, &stats).await;
        (result, client.await.unwrap())
    }

    #[tokio::test]
    async fn test_serves_kick() {
        let (result, reply) = roundtrip(b"POST /kick/abc HTTP/1.1\r\nHost: localhost\r\n\r\n", Duration::from_secs(5)).await;
        assert!(result.is_ok());
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(reply.contains("Content-Length: 42\r\n"));
        assert!(reply.ends_with("\r\n\r\nKick instruction received for user ID: abc"));
    }

    #[tokio::test]
    async fn test_garbage_gets_invalid_request() {
        let (result, reply) = roundtrip(b"this is not http\r\n\r\n", Duration::from_secs(5)).await;
        assert!(result.is_ok());
        assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(reply.ends_with("\r\n\r\nInvalid request"));
    }

    #[tokio::test]
    async fn test_incomplete_head_times_out() {
        let (result, reply) = roundtrip(b"POST /kick/abc HTTP/1.1\r\n", Duration::from_millis(100)).await;
        assert!(result.is_ok());
        assert!(reply.starts_with("HTTP/1.1 408 Request Timeout\r\n"));
        assert!(reply.ends_with("Request timeout"));
    }
}
