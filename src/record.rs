use crate::call::LogCall;
use crate::error_record::{format_err, ErrorRecord};
use crate::sanitize::snapshot;
use crate::severity::Severity;
use serde::Serialize;
use serde_json::{Map, Value};

/// One normalized log record, before timestamping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl Record {
    pub fn from_call(severity: Severity, call: LogCall) -> Self {
        let mut record = Record { severity, message: None, data: None, error: None };
        match call {
            LogCall::Plain(message) => record.message = Some(message),
            LogCall::WithData { message, data } => {
                record.message = message;
                record.data = Some(data);
            }
            LogCall::WithError { message, error } => {
                record.message = message;
                record.error = Some(format_err(&error, None));
            }
        }
        record
    }

    /// Field map handed to [`Logger::write`](crate::Logger::write), in wire order.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(self.severity.as_str().to_string()));
        if let Some(message) = self.message {
            map.insert("message".to_string(), Value::String(message));
        }
        if let Some(data) = self.data {
            map.insert("data".to_string(), data);
        }
        if let Some(error) = self.error {
            map.insert("error".to_string(), snapshot(&error));
        }
        map
    }
}
