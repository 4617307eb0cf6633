//! One-shot completion observer bound to the end of a response body.

use super::capture::{RequestHead, ResponseHead};
use super::Shared;
use axum::body::Body;
use bytes::Bytes;
use http::{Method, StatusCode};
use http_body::{Body as _, Frame, SizeHint};
use serde_json::{Map, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Everything needed to finish a request's record.
pub(crate) struct PendingRecord {
    pub(crate) shared: Arc<Shared>,
    pub(crate) record: Map<String, Value>,
    pub(crate) request: RequestHead,
    pub(crate) response: ResponseHead,
}

impl PendingRecord {
    /// Whether the connection sends this response without a body: replies
    /// to HEAD, and 1xx, 204 and 304 statuses.
    fn sends_no_body(&self) -> bool {
        self.request.method == Method::HEAD
            || self.response.status.is_informational()
            || matches!(
                self.response.status,
                StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED
            )
    }

    /// Attach the response snapshot, run the format hook, layer the record
    /// over the defaults and write it.
    fn complete(self) {
        let PendingRecord { shared, mut record, request, response } = self;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            record.insert("res".to_string(), (shared.res)(&response));
            if let Some(format) = &shared.format {
                format(&mut record, &request, &response);
            }
            let mut out = shared.defaults.clone();
            out.extend(record);
            out
        }));

        match outcome {
            Ok(out) => shared.logger.write(out),
            Err(_) => eprintln!("request record hook panicked, record dropped"),
        }
    }
}

/// Fires a [`PendingRecord`] at most once.
pub struct ResponseObserver {
    pending: Option<PendingRecord>,
}

impl ResponseObserver {
    pub(crate) fn new(pending: PendingRecord) -> Self {
        ResponseObserver { pending: Some(pending) }
    }

    /// Signal that the response has been fully sent. Only the first call
    /// writes a record.
    pub fn finished(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.complete();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Response body that notifies a [`ResponseObserver`] once its last frame
/// has been handed to the connection.
///
/// Bodiless responses and bodies already at their end notify on drop,
/// since the connection never polls them. Any other body dropped before
/// reaching its end (aborted connection) never notifies the observer.
pub struct FinishBody {
    inner: Body,
    observer: ResponseObserver,
}

impl FinishBody {
    pub fn new(inner: Body, observer: ResponseObserver) -> Self {
        FinishBody { inner, observer }
    }
}

impl http_body::Body for FinishBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.observer.finished(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.observer.finished(),
            Poll::Ready(Some(Err(_))) => {
                // Failed mid-stream: the response never completed.
                this.observer.pending = None;
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for FinishBody {
    fn drop(&mut self) {
        // Never polled: the connection (or axum for HEAD) drops these once
        // the head is written.
        let bodyless = self
            .observer
            .pending
            .as_ref()
            .is_some_and(PendingRecord::sends_no_body);
        if self.observer.is_pending() && (bodyless || self.inner.is_end_stream()) {
            self.observer.finished();
        }
    }
}
