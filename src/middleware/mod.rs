//! Request logging middleware for axum.
//!
//! Every request passing through [`log_requests`] produces exactly one
//! record, written through [`Logger::write`] after the response body has
//! been fully sent.
//!
//! ```no_run
//! use axum::{middleware::from_fn_with_state, routing::get, Router};
//! use reqlog::middleware::{log_requests, RequestMiddleware};
//! use reqlog::Logger;
//!
//! let mw = RequestMiddleware::builder()
//!     .logger(Logger::default())
//!     .header(http::HeaderName::from_static("x-request-id"))
//!     .build();
//! let app: Router = Router::new()
//!     .route("/", get(|| async { "Hello world!" }))
//!     .layer(from_fn_with_state(mw, log_requests));
//! ```

pub mod capture;
pub mod error_response;
pub mod finish;

use crate::logger::{Logger, LoggerConfig};
use crate::sink::LogSink;
use axum::body::Body;
use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::{HeaderName, HeaderValue};
use rand::RngCore;
use serde_json::{Map, Value};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub use capture::{RequestHead, ResponseHead};
pub use error_response::attach_response_error;
pub use finish::{FinishBody, ResponseObserver};

use capture::{capture_body, default_request_snapshot, default_response_snapshot};
use finish::PendingRecord;

/// Maps the request head to its snapshot.
pub type RequestSnapshot = Arc<dyn Fn(&RequestHead) -> Value + Send + Sync>;
/// Maps the response head to its snapshot.
pub type ResponseSnapshot = Arc<dyn Fn(&ResponseHead) -> Value + Send + Sync>;
/// Edits the record in place after both snapshots are attached.
pub type FormatHook = Arc<dyn Fn(&mut Map<String, Value>, &RequestHead, &ResponseHead) + Send + Sync>;
/// Produces a fresh correlation id.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Largest request body captured into the snapshot by default.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Random 12-byte token, hex encoded.
pub fn random_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) logger: Logger,
    pub(crate) defaults: Map<String, Value>,
    pub(crate) header: Option<HeaderName>,
    pub(crate) header_id: IdGenerator,
    pub(crate) req: RequestSnapshot,
    pub(crate) res: ResponseSnapshot,
    pub(crate) format: Option<FormatHook>,
    pub(crate) body_limit: usize,
}

/// Configured request logger, shared by every request.
///
/// Register it with `axum::middleware::from_fn_with_state(mw, log_requests)`.
#[derive(Clone)]
pub struct RequestMiddleware {
    shared: Arc<Shared>,
}

impl RequestMiddleware {
    pub fn builder() -> RequestMiddlewareBuilder {
        RequestMiddlewareBuilder::default()
    }

    pub fn logger(&self) -> &Logger {
        &self.shared.logger
    }

    /// Name of the correlation header, if ids are enabled.
    pub fn header(&self) -> Option<&HeaderName> {
        self.shared.header.as_ref()
    }
}

impl Default for RequestMiddleware {
    fn default() -> Self {
        RequestMiddleware::builder().build()
    }
}

impl fmt::Debug for RequestMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMiddleware")
            .field("logger", &self.shared.logger)
            .field("defaults", &self.shared.defaults)
            .field("header", &self.shared.header)
            .field("format", &self.shared.format.is_some())
            .field("body_limit", &self.shared.body_limit)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestMiddleware`].
#[derive(Default)]
pub struct RequestMiddlewareBuilder {
    logger: Option<Logger>,
    sink: Option<Arc<dyn LogSink>>,
    defaults: Map<String, Value>,
    header: Option<HeaderName>,
    header_id: Option<IdGenerator>,
    req: Option<RequestSnapshot>,
    res: Option<ResponseSnapshot>,
    format: Option<FormatHook>,
    body_limit: Option<usize>,
}

impl RequestMiddlewareBuilder {
    /// Write records through an existing logger.
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sink for a fresh logger, used only when no logger is given.
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Fields layered under every record. `type` defaults to `"req"`.
    pub fn defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Enable correlation ids carried in `header`.
    pub fn header(mut self, header: HeaderName) -> Self {
        self.header = Some(header);
        self
    }

    /// Replace the correlation id generator (default: [`random_id`]).
    pub fn header_id<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.header_id = Some(Arc::new(generate));
        self
    }

    pub fn req<F>(mut self, snapshot: F) -> Self
    where
        F: Fn(&RequestHead) -> Value + Send + Sync + 'static,
    {
        self.req = Some(Arc::new(snapshot));
        self
    }

    pub fn res<F>(mut self, snapshot: F) -> Self
    where
        F: Fn(&ResponseHead) -> Value + Send + Sync + 'static,
    {
        self.res = Some(Arc::new(snapshot));
        self
    }

    /// Hook run after the `res` snapshot and before the write.
    pub fn format<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Map<String, Value>, &RequestHead, &ResponseHead) + Send + Sync + 'static,
    {
        self.format = Some(Arc::new(hook));
        self
    }

    /// Largest request body buffered for the snapshot.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = Some(limit);
        self
    }

    pub fn build(self) -> RequestMiddleware {
        let logger = self.logger.unwrap_or_else(|| {
            Logger::new(LoggerConfig { sink: self.sink, ..LoggerConfig::default() })
        });

        let mut defaults = Map::new();
        defaults.insert("type".to_string(), Value::String("req".to_string()));
        defaults.extend(self.defaults);

        let shared = Shared {
            logger,
            defaults,
            header: self.header,
            header_id: self.header_id.unwrap_or_else(|| Arc::new(random_id)),
            req: self.req.unwrap_or_else(|| Arc::new(default_request_snapshot)),
            res: self.res.unwrap_or_else(|| Arc::new(default_response_snapshot)),
            format: self.format,
            body_limit: self.body_limit.unwrap_or(DEFAULT_BODY_LIMIT),
        };
        RequestMiddleware { shared: Arc::new(shared) }
    }
}

/// Middleware function recording one record per request.
///
/// **Behavior**
/// 1. With a correlation header configured, a fresh id is stamped into the
///    inbound request headers, the outbound response headers and the
///    record's `id`.
/// 2. The `req` snapshot is taken before the next stage runs. A panicking
///    snapshot hook drops the record, never the request.
/// 3. The next stage always runs.
/// 4. The response body is wrapped so that the `res` snapshot, the format
///    hook and the write happen once, after the body has been fully sent.
pub async fn log_requests(
    State(mw): State<RequestMiddleware>,
    request: Request,
    next: Next,
) -> Response {
    let shared = mw.shared;
    let mut record = Map::new();

    let (mut parts, body) = request.into_parts();

    let id_header = shared.header.as_ref().map(|name| {
        let id = (shared.header_id)();
        record.insert("id".to_string(), Value::String(id.clone()));
        let value = HeaderValue::from_str(&id).ok();
        if let Some(value) = &value {
            parts.headers.insert(name.clone(), value.clone());
        }
        (name.clone(), value)
    });

    let (captured, body) = capture_body(&parts.headers, body, shared.body_limit).await;
    let original_uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|o| o.0.clone())
        .unwrap_or_else(|| parts.uri.clone());
    let head = RequestHead {
        method: parts.method.clone(),
        uri: parts.uri.clone(),
        original_uri,
        headers: parts.headers.clone(),
        body: captured,
    };
    let req_snapshot = catch_unwind(AssertUnwindSafe(|| (shared.req)(&head))).ok();
    if req_snapshot.is_none() {
        eprintln!("request snapshot hook panicked, record dropped");
    }

    let response = next.run(Request::from_parts(parts, body)).await;

    let (mut res_parts, res_body) = response.into_parts();
    if let Some((name, Some(value))) = id_header {
        res_parts.headers.insert(name, value);
    }
    let Some(snapshot) = req_snapshot else {
        return Response::from_parts(res_parts, res_body);
    };
    record.insert("req".to_string(), snapshot);
    let res_head = ResponseHead {
        status: res_parts.status,
        headers: res_parts.headers.clone(),
        extensions: res_parts.extensions.clone(),
    };

    let observer = ResponseObserver::new(PendingRecord {
        shared,
        record,
        request: head,
        response: res_head,
    });
    Response::from_parts(res_parts, Body::new(FinishBody::new(res_body, observer)))
}
