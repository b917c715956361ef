use admin_control_plane::http::{HttpParser, Method, Request, Response, Status};
use admin_control_plane::ServerError;

#[test]
fn test_http_parser_simple_post() {
    let parser = HttpParser::new(8 * 1024);
    let request_data = b"POST /kick/abc123 HTTP/1.1\r\nHost: 127.0.0.1:8080\r\n\r\n";

    let request = parser.parse(request_data).unwrap().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.target, "/kick/abc123");
    assert_eq!(request.path(), "/kick/abc123");
    assert_eq!(request.version, "HTTP/1.1");
    assert_eq!(request.get_header("Host").unwrap(), "127.0.0.1:8080");
}

#[test]
fn test_http_parser_multiple_headers() {
    let parser = HttpParser::new(8 * 1024);
    let request_data = b"POST /ban/u1 HTTP/1.0\r\n\
                        Host: localhost\r\n\
                        User-Agent: admin-panel\r\n\
                        Content-Type: application/json\r\n\
                        Content-Length: 2\r\n\
                        \r\n{}";

    let request = parser.parse(request_data).unwrap().unwrap();
    assert_eq!(request.version, "HTTP/1.0");
    assert_eq!(request.headers.get("user-agent").unwrap(), "admin-panel");
    assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
    assert_eq!(request.headers.get("content-length").unwrap(), "2");
    assert_eq!(request.headers.len(), 4);
}

#[test]
fn test_http_parser_rejects_malformed_heads() {
    let parser = HttpParser::new(8 * 1024);

    let malformed: [&[u8]; 6] = [
        b"POST /ban/abc 123 HTTP/1.1\r\n\r\n",
        b"POST /ban/abc\r\n\r\n",
        b"POST /ban/abc HTTP/2.0\r\n\r\n",
        b"P()ST /ban/abc HTTP/1.1\r\n\r\n",
        b"POST /ban/abc HTTP/1.1\r\nno colon here\r\n\r\n",
        b"POST /ban/\xff HTTP/1.1\r\n\r\n",
    ];

    for data in malformed {
        match parser.parse(data) {
            Err(ServerError::HttpParse(_)) => {}
            other => panic!("{:?} parsed as {:?}", String::from_utf8_lossy(data), other),
        }
    }
}

#[test]
fn test_unknown_method_is_kept() {
    let parser = HttpParser::new(8 * 1024);
    let request = parser.parse(b"BREW /kick/abc HTTP/1.1\r\n\r\n").unwrap().unwrap();
    assert_eq!(request.method, Method::Extension("BREW".to_string()));
    assert_eq!(request.method.to_string(), "BREW");
}

#[test]
fn test_request_path_variants() {
    let request = Request::new(Method::Post, "/ban/abc123?source=panel");
    assert_eq!(request.path(), "/ban/abc123");

    let request = Request::new(Method::Post, "http://127.0.0.1:8080/kick/abc");
    assert_eq!(request.path(), "/kick/abc");
}

#[test]
fn test_response_serialization() {
    let response = Response::new(Status::Ok, "Ban instruction received for user ID: abc123");

    let mut buffer = Vec::new();
    response.serialize(&mut buffer).unwrap();

    let response_str = String::from_utf8(buffer).unwrap();
    assert_eq!(
        response_str,
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: 44\r\n\
         Connection: close\r\n\
         \r\n\
         Ban instruction received for user ID: abc123"
    );
}

#[test]
fn test_fallback_responses() {
    let responses = vec![
        (Response::method_not_allowed(), 405, "Method Not Allowed", "Method not allowed"),
        (Response::not_found(), 404, "Not Found", "Endpoint not found"),
        (Response::invalid_request(), 400, "Bad Request", "Invalid request"),
        (Response::request_timeout(), 408, "Request Timeout", "Request timeout"),
    ];

    for (response, code, reason, message) in responses {
        assert_eq!(response.status_code(), code);
        assert_eq!(response.message(), message);

        let response_str = String::from_utf8(response.to_bytes()).unwrap();
        assert!(response_str.starts_with(&format!("HTTP/1.1 {} {}\r\n", code, reason)));
        assert!(response_str.contains(&format!("Content-Length: {}\r\n", message.len())));
    }
}

#[test]
fn test_content_length_counts_bytes_not_chars() {
    let response = Response::new(Status::Ok, "é");
    let response_str = String::from_utf8(response.to_bytes()).unwrap();
    assert!(response_str.contains("Content-Length: 2\r\n"));
}
