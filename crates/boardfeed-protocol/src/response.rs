//! HTTP responses with JSON bodies

use crate::error::{ProtocolError, ProtocolResult};
use boardfeed_core::{Snapshot, UpdateBatch};
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const JSON: &str = "application/json";

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub backend: String,
}

impl HealthStatus {
    pub fn ok(backend: impl Into<String>) -> Self {
        Self {
            status: "ok".into(),
            backend: backend.into(),
        }
    }
}

/// A response the server writes back before closing the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    pub fn json<T: Serialize + ?Sized>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status, JSON, body),
            Err(e) => Self::error(500, &format!("failed to encode response: {}", e)),
        }
    }

    pub fn batch(batch: &UpdateBatch) -> Self {
        Self::json(200, batch)
    }

    pub fn snapshot(snapshot: &Snapshot) -> Self {
        Self::json(200, snapshot)
    }

    pub fn health(health: &HealthStatus) -> Self {
        Self::json(200, health)
    }

    /// `{"error": message}`
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::new(status, JSON, body)
    }

    pub fn not_found(what: &str) -> Self {
        Self::error(404, &format!("Not found: {}", what))
    }

    pub fn from_error(error: &ProtocolError) -> Self {
        Self::error(error.status(), &error.to_string())
    }

    /// Encode the response to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(128 + self.body.len());
        self.encode_into(&mut buf);
        buf
    }

    /// Encode the response into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(b"HTTP/1.1 ");
        buf.put_slice(self.status.to_string().as_bytes());
        buf.put_slice(b" ");
        buf.put_slice(reason(self.status).as_bytes());
        buf.put_slice(b"\r\nContent-Type: ");
        buf.put_slice(self.content_type.as_bytes());
        buf.put_slice(b"\r\nContent-Length: ");
        buf.put_slice(self.body.len().to_string().as_bytes());
        buf.put_slice(b"\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n");
        buf.put_slice(&self.body);
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// A response as read back by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ParsedResponse {
    /// Parse a complete response, as read until the server closed the connection
    pub fn parse(raw: &[u8]) -> ProtocolResult<Self> {
        let (head_len, sep) = match raw.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(pos) => (pos, 4),
            None => (
                raw.windows(2)
                    .position(|w| w == b"\n\n")
                    .ok_or_else(|| ProtocolError::MalformedResponse("incomplete response head".into()))?,
                2,
            ),
        };

        let head = String::from_utf8_lossy(&raw[..head_len]);
        let mut lines = head.lines();

        let status_line = lines
            .next()
            .ok_or_else(|| ProtocolError::MalformedResponse("empty response".into()))?;
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| ProtocolError::MalformedResponse(format!("bad status line: {}", status_line)))?;

        let content_length = lines.find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        });

        let mut body = &raw[head_len + sep..];
        if let Some(len) = content_length {
            if body.len() < len {
                return Err(ProtocolError::MalformedResponse(format!(
                    "body truncated: {} of {} bytes",
                    body.len(),
                    len
                )));
            }
            body = &body[..len];
        }

        Ok(Self {
            status,
            body: body.to_vec(),
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
    }

    /// The `error` field of an error body, if there is one
    pub fn error_message(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.body).ok()?;
        value.get("error")?.as_str().map(str::to_string)
    }
}
