//! Polling requests and route resolution

use crate::error::{ProtocolError, ProtocolResult};
use boardfeed_core::BoardId;

/// The parts of an HTTP request the server looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

impl Request {
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };

        Self {
            method: method.into(),
            path: path.to_string(),
            query,
        }
    }

    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key == name).then_some(value)
        })
    }
}

/// A request the server knows how to answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// GET /boards/{id}/updates[?since=N]
    Updates { board: BoardId, since: Option<u64> },

    /// GET /boards/{id}/snapshot
    Snapshot { board: BoardId },

    /// GET /health
    Health,

    /// GET /metrics
    Metrics,
}

impl Route {
    pub fn resolve(request: &Request) -> ProtocolResult<Route> {
        let route = Self::match_path(request)?;

        if !request.method.eq_ignore_ascii_case("GET") {
            return Err(ProtocolError::MethodNotAllowed(request.method.clone()));
        }

        Ok(route)
    }

    fn match_path(request: &Request) -> ProtocolResult<Route> {
        let segments: Vec<&str> = request
            .path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            ["health"] => Ok(Route::Health),
            ["metrics"] => Ok(Route::Metrics),
            ["boards", id, "updates"] => Ok(Route::Updates {
                board: board_id(id, &request.path)?,
                since: parse_since(request.query_param("since"))?,
            }),
            ["boards", id, "snapshot"] => Ok(Route::Snapshot {
                board: board_id(id, &request.path)?,
            }),
            _ => Err(ProtocolError::NotFound(request.path.clone())),
        }
    }

    /// Request target for this route, as a client sends it
    pub fn target(&self) -> String {
        match self {
            Route::Updates { board, since: Some(since) } => format!("/boards/{}/updates?since={}", board, since),
            Route::Updates { board, since: None } => format!("/boards/{}/updates", board),
            Route::Snapshot { board } => format!("/boards/{}/snapshot", board),
            Route::Health => "/health".into(),
            Route::Metrics => "/metrics".into(),
        }
    }
}

fn board_id(raw: &str, path: &str) -> ProtocolResult<BoardId> {
    raw.parse().map_err(|_| ProtocolError::NotFound(path.to_string()))
}

/// `since` is optional; when present and non-empty it must be all digits
fn parse_since(raw: Option<&str>) -> ProtocolResult<Option<u64>> {
    match raw {
        None | Some("") => Ok(None),
        Some(value) if value.bytes().all(|b| b.is_ascii_digit()) => value
            .parse()
            .map(Some)
            .map_err(|_| ProtocolError::InvalidArgument(format!("since is out of range: {}", value))),
        Some(value) => Err(ProtocolError::InvalidArgument(format!(
            "since must be a non-negative integer: {}",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(method: &str, target: &str) -> ProtocolResult<Route> {
        Route::resolve(&Request::new(method, target))
    }

    #[test]
    fn test_resolve_updates() {
        assert_eq!(
            resolve("GET", "/boards/42/updates").unwrap(),
            Route::Updates { board: BoardId::new(42), since: None }
        );
        assert_eq!(
            resolve("GET", "/boards/42/updates?since=17").unwrap(),
            Route::Updates { board: BoardId::new(42), since: Some(17) }
        );
        assert_eq!(
            resolve("GET", "/boards/42/updates?since=").unwrap(),
            Route::Updates { board: BoardId::new(42), since: None }
        );
    }

    #[test]
    fn test_since_must_be_digits() {
        for target in [
            "/boards/1/updates?since=-1",
            "/boards/1/updates?since=abc",
            "/boards/1/updates?since=1.5",
            "/boards/1/updates?since=99999999999999999999999",
        ] {
            let err = resolve("GET", target).unwrap_err();
            assert_eq!(err.status(), 400, "{}", target);
        }
    }

    #[test]
    fn test_other_routes() {
        assert_eq!(resolve("GET", "/health").unwrap(), Route::Health);
        assert_eq!(resolve("GET", "/metrics").unwrap(), Route::Metrics);
        assert_eq!(
            resolve("GET", "/boards/7/snapshot").unwrap(),
            Route::Snapshot { board: BoardId::new(7) }
        );
    }

    #[test]
    fn test_unknown_paths() {
        assert_eq!(resolve("GET", "/").unwrap_err().status(), 404);
        assert_eq!(resolve("GET", "/boards/abc/updates").unwrap_err().status(), 404);
        assert_eq!(resolve("GET", "/boards/1/cards").unwrap_err().status(), 404);
        assert_eq!(resolve("POST", "/nowhere").unwrap_err().status(), 404);
    }

    #[test]
    fn test_only_get_is_allowed() {
        let err = resolve("POST", "/boards/1/updates").unwrap_err();
        assert!(matches!(err, ProtocolError::MethodNotAllowed(ref m) if m == "POST"));
        assert_eq!(err.status(), 405);
    }

    #[test]
    fn test_target_round_trip() {
        let route = Route::Updates { board: BoardId::new(3), since: Some(9) };
        assert_eq!(resolve("GET", &route.target()).unwrap(), route);
    }

    #[test]
    fn test_query_param() {
        let request = Request::new("GET", "/boards/1/updates?x=1&since=5&since=6&flag");
        assert_eq!(request.query_param("since"), Some("5"));
        assert_eq!(request.query_param("flag"), Some(""));
        assert_eq!(request.query_param("missing"), None);
    }
}
