use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::FrameError;

/// End of the header block; the framer treats it as end of request.
pub const BOUNDARY: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Request target with exactly one leading `/` removed.
    pub path: String,
    /// Lower-cased names, trimmed values, last occurrence wins.
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Pause,
    Save,
    Cancel,
    Status,
}

impl Operation {
    /// Accepts the short form (`start`) and the long form (`record/start`).
    pub fn from_path(path: &str) -> Option<Self> {
        let name = path.strip_prefix("record/").unwrap_or(path);
        match name {
            "start" => Some(Operation::Start),
            "pause" => Some(Operation::Pause),
            "save" => Some(Operation::Save),
            "cancel" => Some(Operation::Cancel),
            "status" => Some(Operation::Status),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Pause => "pause",
            Operation::Save => "save",
            Operation::Cancel => "cancel",
            Operation::Status => "status",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Operation(Operation),
    Index,
    /// `api/<op>`; `op` is `None` when the remainder names no operation.
    Legacy {
        op: Option<Operation>,
        params: Map<String, Value>,
    },
    NotFound,
}

pub fn find_boundary(buf: &[u8]) -> Option<usize> {
    buf.windows(BOUNDARY.len()).position(|w| w == BOUNDARY)
}

pub fn parse_request(raw: &[u8]) -> Result<Request, FrameError> {
    if raw.is_empty() {
        return Err(FrameError::Empty);
    }

    let text = String::from_utf8_lossy(raw);
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap_or("");
    let tokens: Vec<&str> = request_line.split(' ').collect();
    if tokens.len() < 3 {
        return Err(FrameError::InvalidRequestLine(request_line.to_string()));
    }

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        match line.find(':') {
            Some(colon) if colon > 0 => {
                let name = line[..colon].trim().to_lowercase();
                let value = line[colon + 1..].trim().to_string();
                headers.insert(name, value);
            }
            _ => {}
        }
    }

    let body = find_boundary(raw)
        .map(|at| at + BOUNDARY.len())
        .filter(|&start| start < raw.len())
        .map(|start| raw[start..].to_vec());

    let target = tokens[1];
    let path = target.strip_prefix('/').unwrap_or(target).to_string();

    Ok(Request {
        method: tokens[0].to_string(),
        path,
        headers,
        body,
    })
}

pub fn route(path: &str, body: Option<&[u8]>) -> Route {
    if let Some(op) = Operation::from_path(path) {
        return Route::Operation(op);
    }

    if matches!(path, "" | "index" | "index.html") {
        return Route::Index;
    }

    if let Some(rest) = path.strip_prefix("api/") {
        return Route::Legacy {
            op: Operation::from_path(rest),
            params: parse_params(body),
        };
    }

    Route::NotFound
}

/// Decodes a legacy body as a JSON object; anything else is no parameters.
pub fn parse_params(body: Option<&[u8]>) -> Map<String, Value> {
    match body.map(serde_json::from_slice::<Value>) {
        Some(Ok(Value::Object(params))) => params,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_headers_and_body() {
        let raw = b"POST /api/record/start HTTP/1.1\r\nHost: localhost\r\nContent-Type : application/json \r\n\r\n{\"a\":1}";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "api/record/start");
        assert_eq!(req.headers.get("host").map(String::as_str), Some("localhost"));
        assert_eq!(
            req.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(req.body.as_deref(), Some(&b"{\"a\":1}"[..]));
    }

    #[test]
    fn later_header_wins() {
        let raw = b"GET / HTTP/1.1\r\nX-Mode: one\r\nx-mode: two\r\n\r\n";
        let req = parse_request(raw).unwrap();
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.headers["x-mode"], "two");
    }

    #[test]
    fn header_without_name_is_skipped() {
        let raw = b"GET / HTTP/1.1\r\n: nameless\r\nno colon here\r\n\r\n";
        let req = parse_request(raw).unwrap();
        assert!(req.headers.is_empty());
    }

    #[test]
    fn no_body_after_boundary() {
        let req = parse_request(b"GET /status HTTP/1.1\r\n\r\n").unwrap();
        assert!(req.body.is_none());
    }

    #[test]
    fn strips_exactly_one_slash() {
        let req = parse_request(b"GET //status HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "/status");
        let req = parse_request(b"GET status HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path, "status");
    }

    #[test]
    fn rejects_short_request_line() {
        let err = parse_request(b"GET /status\r\n\r\n").unwrap_err();
        assert_eq!(err, FrameError::InvalidRequestLine("GET /status".to_string()));
        assert_eq!(parse_request(b"").unwrap_err(), FrameError::Empty);
    }

    #[test]
    fn routes_both_path_forms() {
        assert_eq!(route("status", None), Route::Operation(Operation::Status));
        assert_eq!(route("record/status", None), Route::Operation(Operation::Status));
        assert_eq!(route("record/start", None), Route::Operation(Operation::Start));
        assert_eq!(route("", None), Route::Index);
        assert_eq!(route("index.html", None), Route::Index);
        assert_eq!(route("nonexistent", None), Route::NotFound);
        assert_eq!(route("record/", None), Route::NotFound);
    }

    #[test]
    fn legacy_prefix_carries_params() {
        let route = route("api/record/pause", Some(&br#"{"reason":"break"}"#[..]));
        let Route::Legacy { op, params } = route else {
            panic!("expected legacy route");
        };
        assert_eq!(op, Some(Operation::Pause));
        assert_eq!(params["reason"], "break");
    }

    #[test]
    fn malformed_or_non_object_body_is_empty_params() {
        assert!(parse_params(Some(&b"{not json"[..])).is_empty());
        assert!(parse_params(Some(&b"[1,2,3]"[..])).is_empty());
        assert!(parse_params(None).is_empty());
    }

    #[test]
    fn legacy_unknown_op() {
        assert_eq!(
            route("api/record/rewind", None),
            Route::Legacy { op: None, params: Map::new() }
        );
    }
}
