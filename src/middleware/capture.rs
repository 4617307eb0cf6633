//! Request and response snapshots.

use axum::body::Body;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Extensions, HeaderMap, Method, StatusCode, Uri};
use http_body::{Body as _, Frame, SizeHint};
use serde_json::{Map, Value};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Request as seen by the middleware when the request entered it.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// URI as routed, possibly rewritten by nesting.
    pub uri: Uri,
    /// URI as received, before any rewriting.
    pub original_uri: Uri,
    pub headers: HeaderMap,
    /// Captured body, empty when the body was not captured.
    pub body: Bytes,
}

impl RequestHead {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Original path and query.
    pub fn url(&self) -> String {
        self.original_uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.original_uri.to_string())
    }
}

/// Response as sent, captured when its body finished.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub extensions: Extensions,
}

/// Default request snapshot:
/// `{method, url, headers, path, query, body}`.
pub fn default_request_snapshot(req: &RequestHead) -> Value {
    let mut map = Map::new();
    map.insert("method".into(), Value::String(req.method.to_string()));
    map.insert("url".into(), Value::String(req.url()));
    map.insert("headers".into(), headers_to_json(&req.headers));
    map.insert("path".into(), Value::String(req.path().to_string()));
    map.insert("query".into(), parse_query(req.query().unwrap_or("")));
    map.insert("body".into(), body_to_json(&req.headers, &req.body));
    Value::Object(map)
}

/// Default response snapshot: `{statusCode, headers}`.
pub fn default_response_snapshot(res: &ResponseHead) -> Value {
    let mut map = Map::new();
    map.insert("statusCode".into(), Value::from(res.status.as_u16()));
    map.insert("headers".into(), headers_to_json(&res.headers));
    Value::Object(map)
}

/// Headers as an object keyed by lowercase name. Repeated headers become
/// arrays; non-UTF-8 values are decoded lossily.
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys() {
        let mut values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        map.insert(name.as_str().to_string(), value);
    }
    Value::Object(map)
}

/// Decode a query string into an object.
///
/// `+` decodes to a space, repeated keys are collected into arrays, and a
/// key without `=` maps to an empty string.
pub fn parse_query(query: &str) -> Value {
    let mut map = Map::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = Value::String(decode_component(value));
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key, value);
            }
        }
    }
    Value::Object(map)
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
}

fn body_kind(headers: &HeaderMap) -> Option<BodyKind> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    if mime == "application/json" || mime.ends_with("+json") {
        Some(BodyKind::Json)
    } else if mime == "application/x-www-form-urlencoded" {
        Some(BodyKind::Form)
    } else {
        None
    }
}

/// Parsed body snapshot. Anything that is not a JSON or form body, or that
/// fails to parse, is recorded as an empty object.
pub fn body_to_json(headers: &HeaderMap, body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Object(Map::new());
    }
    match body_kind(headers) {
        Some(BodyKind::Json) => {
            serde_json::from_slice(body).unwrap_or_else(|_| Value::Object(Map::new()))
        }
        Some(BodyKind::Form) => parse_query(&String::from_utf8_lossy(body)),
        None => Value::Object(Map::new()),
    }
}

/// Buffer a request body for the snapshot when it is safe to do so.
///
/// Only JSON and form bodies of exactly known length up to `limit` are
/// buffered; everything else is passed through untouched and recorded as
/// an empty body.
///
/// **Returns**
/// - The captured bytes (possibly empty) and the body to forward. A body
///   that fails while buffering is forwarded as a body yielding the same
///   error.
pub async fn capture_body(headers: &HeaderMap, body: Body, limit: usize) -> (Bytes, Body) {
    if body_kind(headers).is_none() {
        return (Bytes::new(), body);
    }
    let fits = body
        .size_hint()
        .exact()
        .and_then(|len| usize::try_from(len).ok())
        .is_some_and(|len| len <= limit);
    if !fits {
        return (Bytes::new(), body);
    }

    match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => (bytes.clone(), Body::from(bytes)),
        Err(e) => (Bytes::new(), Body::new(FailedBody { error: Some(e) })),
    }
}

/// Body whose only frame is the error hit while buffering the original.
struct FailedBody {
    error: Option<axum::Error>,
}

impl http_body::Body for FailedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().error.take().map(Err))
    }

    fn is_end_stream(&self) -> bool {
        self.error.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}
