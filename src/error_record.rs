use serde::Serialize;
use serde_json::{Map, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;

/// An error value as handed to the logger.
///
/// Carries the fields that end up in an [`ErrorRecord`]: an optional
/// machine-readable `code`, a `name`, a `message`, an optional HTTP
/// `status`, and the raw trace lines. Values built from a plain string
/// carry no trace.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    code: Option<String>,
    name: Option<String>,
    message: Option<String>,
    status: Option<u16>,
    display: String,
    trace: Option<Vec<String>>,
}

impl ErrorValue {
    /// Capture an error together with its `source()` chain.
    ///
    /// The name is the short name of the concrete error type. When
    /// backtrace capture is enabled (`RUST_BACKTRACE`), the frames are
    /// appended to the trace after the cause chain.
    pub fn new<E: Error + ?Sized>(err: &E) -> Self {
        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(format!("Caused by: {}", cause));
            source = cause.source();
        }

        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            trace.extend(backtrace.to_string().lines().map(str::to_string));
        }

        let display = err.to_string();
        ErrorValue {
            code: None,
            name: short_type_name(std::any::type_name::<E>()),
            message: Some(display.clone()),
            status: None,
            display,
            trace: Some(trace),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Replace the trace lines that follow the `"<name>: <message>"` head.
    pub fn with_trace<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace = Some(lines.into_iter().map(Into::into).collect());
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("Error")
    }

    pub fn message(&self) -> &str {
        match self.message.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => &self.display,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// The stack as recorded in [`ErrorRecord::stack`]: trimmed lines,
    /// always derived from this value and never from display overrides.
    pub fn stack(&self) -> Vec<String> {
        match &self.trace {
            Some(trace) => {
                let head = if self.message().is_empty() {
                    self.name().to_string()
                } else {
                    format!("{}: {}", self.name(), self.message())
                };
                std::iter::once(head)
                    .chain(trace.iter().cloned())
                    .flat_map(|chunk| {
                        chunk
                            .lines()
                            .map(|l| l.trim().to_string())
                            .collect::<Vec<_>>()
                    })
                    .collect()
            }
            None => self.display.split('\n').map(|l| l.trim().to_string()).collect(),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.trace.is_some() {
            write!(f, "{}: {}", self.name(), self.message())
        } else {
            f.write_str(&self.display)
        }
    }
}

impl From<&str> for ErrorValue {
    fn from(value: &str) -> Self {
        ErrorValue::from(value.to_string())
    }
}

impl From<String> for ErrorValue {
    fn from(value: String) -> Self {
        ErrorValue {
            code: None,
            name: None,
            message: None,
            status: None,
            display: value,
            trace: None,
        }
    }
}

fn short_type_name(full: &str) -> Option<String> {
    if full.starts_with("dyn ") || full.starts_with('&') {
        return None;
    }
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().map(str::to_string)
}

/// Normalized, JSON-ready shape of an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub code: Option<String>,
    pub name: String,
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub stack: Vec<String>,
}

/// Format an error into an [`ErrorRecord`].
///
/// **Parameters**
/// - `err`: the error to format.
/// - `context`: optional keys merged over the defaults. `code`, `name` and
///   `message` replace the defaults, any other key is added as an extra
///   field. A `stack` key is ignored.
///
/// **Returns**
/// - A record whose `stack` always reflects the original `err`, so a
///   caller can relabel the error for display without losing its trace.
pub fn format_err(err: &ErrorValue, context: Option<&Map<String, Value>>) -> ErrorRecord {
    let mut record = ErrorRecord {
        code: err.code().map(str::to_string),
        name: err.name().to_string(),
        message: err.message().to_string(),
        extra: Map::new(),
        stack: Vec::new(),
    };

    for (key, value) in context.into_iter().flatten() {
        match key.as_str() {
            "code" => record.code = value_to_opt_string(value),
            "name" => record.name = value_to_string(value),
            "message" => record.message = value_to_string(value),
            "stack" => {}
            _ => {
                record.extra.insert(key.clone(), value.clone());
            }
        }
    }

    record.stack = err.stack();
    record
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_opt_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(value_to_string(other)),
    }
}

/// Wire-level body for an HTTP error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub code: Option<String>,
    pub name: String,
    pub message: String,
    pub status: u16,
}

impl From<&ErrorValue> for ErrorEnvelope {
    fn from(err: &ErrorValue) -> Self {
        ErrorEnvelope {
            code: err.code().map(str::to_string),
            name: err.name().to_string(),
            message: err.message().to_string(),
            status: err.status().unwrap_or(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct DriverError {
        query: String,
    }

    impl fmt::Display for DriverError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Invalid database query: {:?} is not a valid query", self.query)
        }
    }

    impl Error for DriverError {}

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    fn generic(message: &str) -> ErrorValue {
        ErrorValue::from(message.to_string()).with_trace(Vec::<String>::new())
    }

    #[test]
    fn formats_error_with_defaults() {
        let out = format_err(&generic("Something bad happened"), None);
        assert_eq!(out.code, None);
        assert_eq!(out.name, "Error");
        assert_eq!(out.message, "Something bad happened");
        assert_eq!(out.stack[0], "Error: Something bad happened");
        assert!(out.extra.is_empty());
    }

    #[test]
    fn formats_named_error_with_code() {
        let err = generic("Route not found: /foo/bar")
            .with_code("ROUTE_NOT_FOUND")
            .with_name("NotFoundError");

        let out = format_err(&err, None);
        assert_eq!(out.code.as_deref(), Some("ROUTE_NOT_FOUND"));
        assert_eq!(out.name, "NotFoundError");
        assert_eq!(out.stack[0], "NotFoundError: Route not found: /foo/bar");
    }

    #[test]
    fn context_relabels_but_keeps_original_stack() {
        let err = ErrorValue::new(&DriverError { query: "PICK 1 FROM 1MILLION".into() })
            .with_code("INVALID_DATABASE_QUERY")
            .with_name("CrazyDatabaseDriverError");

        let ctx = json!({
            "name": "UnusualDatabaseError",
            "message": "Error returning data from the database",
            "stack": ["forged"],
            "table": "users",
        });
        let out = format_err(&err, ctx.as_object());

        assert_eq!(out.code.as_deref(), Some("INVALID_DATABASE_QUERY"));
        assert_eq!(out.name, "UnusualDatabaseError");
        assert_eq!(out.message, "Error returning data from the database");
        assert_eq!(
            out.stack[0],
            "CrazyDatabaseDriverError: Invalid database query: \"PICK 1 FROM 1MILLION\" is not a valid query"
        );
        assert_eq!(out.extra.get("table"), Some(&json!("users")));
        assert!(!out.extra.contains_key("stack"));
    }

    #[test]
    fn string_is_formatted_as_error() {
        let msg = "Something bad happened, but this ain't no regular Error";
        let out = format_err(&ErrorValue::from(msg), None);
        assert_eq!(
            out,
            ErrorRecord {
                code: None,
                name: "Error".into(),
                message: msg.into(),
                extra: Map::new(),
                stack: vec![msg.into()],
            }
        );
    }

    #[test]
    fn type_name_and_cause_chain_are_captured() {
        let err = ErrorValue::new(&Wrapped(std::io::Error::new(
            std::io::ErrorKind::Other,
            "connection reset",
        )));
        assert_eq!(err.name(), "Wrapped");
        let stack = err.stack();
        assert_eq!(stack[0], "Wrapped: request failed");
        assert_eq!(stack[1], "Caused by: connection reset");
    }

    #[test]
    fn dyn_error_falls_back_to_generic_name() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let dyn_err: &dyn Error = &io;
        assert_eq!(ErrorValue::new(dyn_err).name(), "Error");
    }

    #[test]
    fn context_code_null_clears_code() {
        let err = generic("x").with_code("A");
        let ctx = json!({"code": null});
        assert_eq!(format_err(&err, ctx.as_object()).code, None);
    }

    #[test]
    fn serialized_record_keeps_stack_last() {
        let ctx = json!({"request": 7});
        let out = format_err(&generic("z"), ctx.as_object());
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(
            json,
            r#"{"code":null,"name":"Error","message":"z","request":7,"stack":["Error: z"]}"#
        );
    }

    #[test]
    fn envelope_defaults_to_500() {
        let env = ErrorEnvelope::from(&generic("boom"));
        assert_eq!(env.status, 500);
        let env = ErrorEnvelope::from(&generic("gone").with_status(404).with_code("ROUTE_NOT_FOUND"));
        assert_eq!(env.status, 404);
        assert_eq!(env.code.as_deref(), Some("ROUTE_NOT_FOUND"));
    }
}
