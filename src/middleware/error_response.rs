//! Error responses that carry their [`ErrorRecord`] to the request record.

use super::capture::{RequestHead, ResponseHead};
use crate::error_record::{format_err, ErrorEnvelope, ErrorRecord, ErrorValue};
use crate::sanitize::snapshot;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::{Map, Value};

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Responds with the [`ErrorEnvelope`] as JSON and keeps the formatted
/// [`ErrorRecord`] in the response extensions.
impl IntoResponse for ErrorValue {
    fn into_response(self) -> Response {
        let mut response = ErrorEnvelope::from(&self).into_response();
        response.extensions_mut().insert(format_err(&self, None));
        response
    }
}

/// Format hook copying an [`ErrorRecord`] found in the response extensions
/// to `res.error`.
///
/// Use directly as `RequestMiddleware::builder().format(attach_response_error)`
/// or call it from a custom hook.
pub fn attach_response_error(
    record: &mut Map<String, Value>,
    _request: &RequestHead,
    response: &ResponseHead,
) {
    let Some(error) = response.extensions.get::<ErrorRecord>() else {
        return;
    };
    if let Some(Value::Object(res)) = record.get_mut("res") {
        res.insert("error".to_string(), snapshot(error));
    }
}
