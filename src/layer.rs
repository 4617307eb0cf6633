use crate::call::LogCall;
use crate::error_record::{format_err, ErrorValue};
use crate::logger::Logger;
use crate::record::Record;
use crate::sanitize::snapshot;
use crate::severity::Severity;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that turns `tracing` events into records on
/// a [`Logger`].
///
/// The event's level picks the severity, the `message` field becomes the
/// record message, a field recorded as an error becomes the record's
/// `error`, and every other field lands in `data`. When an error is
/// present the remaining fields are merged into the error record as
/// context instead.
#[derive(Clone, Debug)]
pub struct RecordLayer {
    logger: Logger,
}

impl RecordLayer {
    pub fn new(logger: Logger) -> Self {
        RecordLayer { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

/// Severity for a `tracing` level.
pub fn severity_for(level: &Level) -> Severity {
    match *level {
        Level::TRACE => Severity::Trace,
        Level::DEBUG => Severity::Debug,
        Level::INFO => Severity::Info,
        Level::WARN => Severity::Warn,
        _ => Severity::Error,
    }
}

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let severity = severity_for(event.metadata().level());
        if !self.logger.enabled(severity) {
            return;
        }

        let mut fields = Map::new();
        let mut message: Option<String> = None;
        let mut error: Option<ErrorValue> = None;

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
            error: &mut error,
        };
        event.record(&mut visitor);

        match error {
            Some(error) => {
                // Fields become error context, so the record still carries
                // exactly one of `data`/`error`.
                let context = (!fields.is_empty()).then_some(&fields);
                let record = Record {
                    severity,
                    message,
                    data: None,
                    error: Some(format_err(&error, context)),
                };
                self.logger.write(record.into_map());
            }
            None if fields.is_empty() => {
                self.logger
                    .log(severity, LogCall::Plain(message.unwrap_or_default()));
            }
            None => {
                self.logger.log(
                    severity,
                    LogCall::WithData { message, data: Value::Object(fields) },
                );
            }
        }
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Map<String, Value>,
    pub message: &'a mut Option<String>,
    pub error: &'a mut Option<ErrorValue>,
}

impl<'a> FieldVisitor<'a> {
    fn insert(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, snapshot(&value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if self.error.is_none() {
            *self.error = Some(ErrorValue::new(value));
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, Value::String(format!("{:?}", value)));
        }
    }
}
