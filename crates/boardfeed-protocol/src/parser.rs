//! Incremental HTTP request head parser

use crate::error::{ProtocolError, ProtocolResult};
use crate::request::Request;
use bytes::BytesMut;

/// Maximum request head size (16KB)
const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Buffers bytes from a connection until a full request head is available.
///
/// Only the request line is interpreted; headers are skipped and request
/// bodies are not supported since every route is a GET.
pub struct RequestParser {
    buffer: BytesMut,
}

impl RequestParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// Add data to the parser buffer
    pub fn feed(&mut self, data: &[u8]) -> ProtocolResult<()> {
        if self.buffer.len() + data.len() > MAX_HEAD_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: self.buffer.len() + data.len(),
                max: MAX_HEAD_SIZE,
            });
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Try to parse a complete request head from the buffer
    pub fn parse(&mut self) -> ProtocolResult<Option<Request>> {
        let head_end = match find_head_end(&self.buffer) {
            Some(end) => end,
            None => return Ok(None),
        };

        let head = self.buffer.split_to(head_end);
        let head = String::from_utf8_lossy(&head);

        let request_line = head
            .lines()
            .next()
            .ok_or_else(|| ProtocolError::MalformedRequest("empty request".into()))?;

        Self::parse_request_line(request_line).map(Some)
    }

    fn parse_request_line(line: &str) -> ProtocolResult<Request> {
        let mut parts = line.split_whitespace();

        let method = parts
            .next()
            .ok_or_else(|| ProtocolError::MalformedRequest("missing method".into()))?;
        let target = parts
            .next()
            .ok_or_else(|| ProtocolError::MalformedRequest("missing request target".into()))?;
        let version = parts
            .next()
            .ok_or_else(|| ProtocolError::MalformedRequest("missing HTTP version".into()))?;

        if !version.starts_with("HTTP/1.") {
            return Err(ProtocolError::MalformedRequest(format!("unsupported version: {}", version)));
        }
        if !target.starts_with('/') {
            return Err(ProtocolError::MalformedRequest(format!("invalid request target: {}", target)));
        }

        Ok(Request::new(method, target))
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Offset just past the blank line ending the head, accepting bare LF
fn find_head_end(buf: &[u8]) -> Option<usize> {
    for i in 0..buf.len() {
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some(i + 4);
        }
        if buf[i..].starts_with(b"\n\n") {
            return Some(i + 2);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_get() {
        let mut parser = RequestParser::new();
        parser
            .feed(b"GET /boards/42/updates?since=3 HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\n\r\n")
            .unwrap();

        let request = parser.parse().unwrap().unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/boards/42/updates");
        assert_eq!(request.query.as_deref(), Some("since=3"));
    }

    #[test]
    fn test_incomplete_head() {
        let mut parser = RequestParser::new();
        parser.feed(b"GET /health HTTP/1.1\r\nHost: local").unwrap();
        assert!(parser.parse().unwrap().is_none());

        parser.feed(b"host\r\n\r\n").unwrap();
        assert_eq!(parser.parse().unwrap().unwrap().path, "/health");
    }

    #[test]
    fn test_bare_newlines() {
        let mut parser = RequestParser::new();
        parser.feed(b"GET /health HTTP/1.0\n\n").unwrap();
        assert_eq!(parser.parse().unwrap().unwrap().path, "/health");
    }

    #[test]
    fn test_pipelined_requests() {
        let mut parser = RequestParser::new();
        parser
            .feed(b"GET /health HTTP/1.1\r\n\r\nGET /metrics HTTP/1.1\r\n\r\n")
            .unwrap();

        assert_eq!(parser.parse().unwrap().unwrap().path, "/health");
        assert_eq!(parser.parse().unwrap().unwrap().path, "/metrics");
        assert!(parser.parse().unwrap().is_none());
    }

    #[test]
    fn test_malformed_request_line() {
        let mut parser = RequestParser::new();
        parser.feed(b"HELLO\r\n\r\n").unwrap();
        assert!(matches!(parser.parse(), Err(ProtocolError::MalformedRequest(_))));

        let mut parser = RequestParser::new();
        parser.feed(b"GET /health SPDY/3\r\n\r\n").unwrap();
        assert!(matches!(parser.parse(), Err(ProtocolError::MalformedRequest(_))));
    }

    #[test]
    fn test_oversized_head() {
        let mut parser = RequestParser::new();
        let filler = vec![b'a'; MAX_HEAD_SIZE + 1];
        assert!(matches!(
            parser.feed(&filler),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }
}
