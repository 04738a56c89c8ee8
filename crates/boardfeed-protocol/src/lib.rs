//! boardfeed polling protocol
//!
//! Plain HTTP/1.1 with JSON bodies. Clients poll with the last id they
//! consumed and receive everything newer plus the cursor for the next call.
//!
//! ## Routes
//! ```text
//! GET /boards/{id}/updates[?since=N]   -> {"events": [...], "latestId": N, "retry": 3000}
//! GET /boards/{id}/snapshot            -> <snapshot JSON> | 404
//! GET /health                          -> {"status": "ok", "backend": "connected"}
//! GET /metrics                         -> Prometheus text format
//! ```

pub mod cursor;
pub mod error;
pub mod parser;
pub mod request;
pub mod response;

pub use cursor::PollCursor;
pub use error::{ProtocolError, ProtocolResult};
pub use parser::RequestParser;
pub use request::{Request, Route};
pub use response::{HealthStatus, HttpResponse, ParsedResponse};
