use crate::error::{ServerError, ServerResult};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::str::{self, FromStr};

/// HTTP status codes the control plane can answer with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok = 200,

    BadRequest = 400,
    NotFound = 404,
    MethodNotAllowed = 405,
    RequestTimeout = 408,
}

impl Status {
    /// Numeric status code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the reason phrase for this status code
    pub fn as_str(&self) -> &'static str {
        match *self {
            Status::Ok => "OK",

            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::RequestTimeout => "Request Timeout",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code())
    }
}

/// HTTP methods. Anything outside the registered set is kept as an extension
/// token so that it routes to 405 like every other non-POST method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
    Connect,
    Patch,
    Extension(String),
}

impl Method {
    /// Convert the method to a string
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Patch => "PATCH",
            Method::Extension(token) => token,
        }
    }
}

impl FromStr for Method {
    type Err = ServerError;

    fn from_str(s: &str) -> ServerResult<Self> {
        let method = match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            "PATCH" => Method::Patch,
            _ if is_token(s) => Method::Extension(s.to_string()),
            _ => return Err(ServerError::HttpParse(format!("Invalid method: {:?}", s))),
        };
        Ok(method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 9110 `token`
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Parses the head (request line and headers) of a single request.
///
/// The body is never consumed; none of the routes take one.
#[derive(Debug, Clone)]
pub struct HttpParser {
    max_header_size: usize,
}

impl HttpParser {
    /// Create a new parser that rejects heads longer than `max_header_size`,
    /// counting the blank line that ends them
    pub fn new(max_header_size: usize) -> Self {
        Self { max_header_size }
    }

    /// Try to parse a request head out of `data`.
    ///
    /// Returns `Ok(None)` while the blank line ending the head has not arrived yet.
    pub fn parse(&self, data: &[u8]) -> ServerResult<Option<Request>> {
        let headers_end = match find_head_end(data) {
            Some(end) => end,
            None if data.len() >= self.max_header_size => {
                return Err(ServerError::HeaderTooLarge {
                    limit: self.max_header_size,
                })
            }
            None => return Ok(None),
        };

        if headers_end + 4 > self.max_header_size {
            return Err(ServerError::HeaderTooLarge {
                limit: self.max_header_size,
            });
        }

        let head = str::from_utf8(&data[..headers_end])
            .map_err(|_| ServerError::HttpParse("Invalid UTF-8".to_string()))?;

        let mut lines = head.split("\r\n");
        let request_line = lines
            .next()
            .ok_or_else(|| ServerError::HttpParse("Missing request line".to_string()))?;
        let mut request = Self::parse_request_line(request_line)?;

        for line in lines.filter(|line| !line.is_empty()) {
            let (key, value) = Self::parse_header(line)?;
            request.headers.insert(key, value);
        }

        Ok(Some(request))
    }

    /// Parse a request line
    fn parse_request_line(line: &str) -> ServerResult<Request> {
        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() != 3 {
            return Err(ServerError::HttpParse("Invalid request line".to_string()));
        }

        let method: Method = parts[0].parse()?;
        let target = parts[1];
        if target.is_empty() {
            return Err(ServerError::HttpParse("Empty request target".to_string()));
        }

        let version = parts[2];
        if version != "HTTP/1.1" && version != "HTTP/1.0" {
            return Err(ServerError::HttpParse(format!("Unsupported version: {}", version)));
        }

        let mut request = Request::new(method, target);
        request.version = version.to_string();
        Ok(request)
    }

    /// Parse a header line
    fn parse_header(line: &str) -> ServerResult<(String, String)> {
        match line.split_once(':') {
            Some((key, value)) if is_token(key) => {
                Ok((key.to_ascii_lowercase(), value.trim().to_string()))
            }
            _ => Err(ServerError::HttpParse("Invalid header".to_string())),
        }
    }
}

fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Strip query, fragment and absolute-form authority from a request target
fn path_of(target: &str) -> &str {
    let target = target
        .split_once(|c: char| c == '?' || c == '#')
        .map_or(target, |(before, _)| before);

    for scheme in ["http://", "https://"] {
        if let Some(rest) = target.strip_prefix(scheme) {
            return rest.find('/').map_or("/", |slash| &rest[slash..]);
        }
    }

    target
}

/// HTTP request head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Request target exactly as received
    pub target: String,
    pub version: String,
    pub headers: HashMap<String, String>,
}

impl Request {
    /// Create a new request
    pub fn new(method: Method, target: &str) -> Self {
        Self {
            method,
            target: target.to_string(),
            version: "HTTP/1.1".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Path component of the target, without query string
    pub fn path(&self) -> &str {
        path_of(&self.target)
    }

    /// Get a header
    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }
}

/// Outcome of a request: status plus a plain-text message. Never changes once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    message: String,
}

impl Response {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self::new(Status::MethodNotAllowed, "Method not allowed")
    }

    pub fn not_found() -> Self {
        Self::new(Status::NotFound, "Endpoint not found")
    }

    pub fn invalid_request() -> Self {
        Self::new(Status::BadRequest, "Invalid request")
    }

    pub fn request_timeout() -> Self {
        Self::new(Status::RequestTimeout, "Request timeout")
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Serialize the response to a byte vector
    pub fn serialize(&self, writer: &mut Vec<u8>) -> ServerResult<()> {
        let body = self.message.as_bytes();

        write!(writer, "HTTP/1.1 {} {}\r\n", self.status.code(), self.status.as_str())?;
        write!(writer, "Content-Type: text/plain; charset=utf-8\r\n")?;
        write!(writer, "Content-Length: {}\r\n", body.len())?;
        write!(writer, "Connection: close\r\n")?;
        write!(writer, "\r\n")?;
        writer.extend_from_slice(body);

        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(128 + self.message.len());
        // Writes into a Vec cannot fail
        let _ = self.serialize(&mut encoded);
        encoded
    }
}
