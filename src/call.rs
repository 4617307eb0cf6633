//! Normalization of log call arguments into one [`LogCall`] shape.

use crate::error_record::ErrorValue;
use crate::inspect::{inspect, INSPECT_DEPTH};
use crate::sanitize::{sanitize, snapshot};
use serde::Serialize;
use serde_json::{Number, Value};

/// What a caller wants logged.
#[derive(Debug, Clone, PartialEq)]
pub enum LogCall {
    /// A human-readable message only.
    Plain(String),
    /// A JSON-safe data snapshot, optionally labelled with a message.
    WithData { message: Option<String>, data: Value },
    /// An error, optionally labelled with a message.
    WithError { message: Option<String>, error: ErrorValue },
}

impl LogCall {
    /// Snapshot any serializable value as a data call.
    pub fn data<T: Serialize + ?Sized>(message: Option<String>, data: &T) -> Self {
        LogCall::WithData { message, data: snapshot(data) }
    }

    pub fn error(message: Option<String>, error: ErrorValue) -> Self {
        LogCall::WithError { message, error }
    }

    /// Classify a variadic argument list.
    ///
    /// Rules, in priority order:
    /// 1. one deep argument (error, object, array) becomes `error`/`data`;
    /// 2. a string followed by one deep argument becomes `message` plus
    ///    `error`/`data`;
    /// 3. anything else is formatted into a single message.
    pub fn classify(mut args: Vec<Arg>) -> Self {
        match args.len() {
            1 if args[0].is_deep() => {
                let arg = args.remove(0);
                deep_call(None, arg)
            }
            2 if matches!(args[0], Arg::Str(_)) && args[1].is_deep() => {
                let deep = args.remove(1);
                let message = match args.remove(0) {
                    Arg::Str(s) => Some(s),
                    _ => None,
                };
                deep_call(message, deep)
            }
            _ => LogCall::Plain(format_message(&args)),
        }
    }
}

fn deep_call(message: Option<String>, arg: Arg) -> LogCall {
    match arg {
        Arg::Error(error) => LogCall::WithError { message, error },
        Arg::Value(data) => LogCall::WithData { message, data: sanitize(data) },
        other => LogCall::Plain(format_message(&[other])),
    }
}

impl From<&str> for LogCall {
    fn from(message: &str) -> Self {
        LogCall::Plain(message.to_string())
    }
}

impl From<String> for LogCall {
    fn from(message: String) -> Self {
        LogCall::Plain(message)
    }
}

impl From<Value> for LogCall {
    fn from(value: Value) -> Self {
        LogCall::classify(vec![Arg::from(value)])
    }
}

impl From<ErrorValue> for LogCall {
    fn from(error: ErrorValue) -> Self {
        LogCall::WithError { message: None, error }
    }
}

impl From<(&str, Value)> for LogCall {
    fn from((message, value): (&str, Value)) -> Self {
        LogCall::classify(vec![Arg::from(message), Arg::from(value)])
    }
}

impl From<(String, Value)> for LogCall {
    fn from((message, value): (String, Value)) -> Self {
        LogCall::classify(vec![Arg::from(message), Arg::from(value)])
    }
}

impl From<(&str, ErrorValue)> for LogCall {
    fn from((message, error): (&str, ErrorValue)) -> Self {
        LogCall::WithError { message: Some(message.to_string()), error }
    }
}

impl From<(String, ErrorValue)> for LogCall {
    fn from((message, error): (String, ErrorValue)) -> Self {
        LogCall::WithError { message: Some(message), error }
    }
}

/// One argument of a variadic log call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Number(Number),
    Bool(bool),
    Null,
    /// Any JSON value; deep when it is an object or array.
    Value(Value),
    Error(ErrorValue),
}

impl Arg {
    /// Errors, objects and arrays are deep.
    pub fn is_deep(&self) -> bool {
        matches!(
            self,
            Arg::Error(_) | Arg::Value(Value::Object(_)) | Arg::Value(Value::Array(_))
        )
    }

    /// Snapshot any serializable value as an argument.
    pub fn data<T: Serialize + ?Sized>(value: &T) -> Self {
        Arg::from(snapshot(value))
    }

    fn render(&self) -> String {
        match self {
            Arg::Str(s) => s.clone(),
            Arg::Number(n) => n.to_string(),
            Arg::Bool(b) => b.to_string(),
            Arg::Null => "null".to_string(),
            Arg::Value(v) => v.to_string(),
            Arg::Error(e) => e.to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Arg::Number(n) => n.as_f64(),
            Arg::Str(s) => s.trim().parse().ok(),
            Arg::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Arg::Null => Some(0.0),
            _ => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Str(s.clone())
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<ErrorValue> for Arg {
    fn from(e: ErrorValue) -> Self {
        Arg::Error(e)
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Arg::Str(s),
            Value::Number(n) => Arg::Number(n),
            Value::Bool(b) => Arg::Bool(b),
            Value::Null => Arg::Null,
            deep => Arg::Value(deep),
        }
    }
}

macro_rules! arg_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Arg {
                fn from(n: $t) -> Self {
                    Arg::Number(Number::from(n))
                }
            }
        )*
    };
}

arg_from_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for Arg {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Arg::Null, Arg::Number)
    }
}

impl From<f32> for Arg {
    fn from(n: f32) -> Self {
        Arg::from(n as f64)
    }
}

/// Format arguments into a single message.
///
/// When the first argument is a string, `%s %d %i %f %j %o %O` are
/// substituted from the following arguments and `%%` becomes `%`.
/// Directives without a matching argument are left as written. Leftover
/// arguments are appended, separated by spaces.
pub fn format_message(args: &[Arg]) -> String {
    let Some(first) = args.first() else {
        return String::new();
    };

    let mut rest = args[1..].iter();
    let mut out = match first {
        Arg::Str(template) => substitute(template, &mut rest),
        other => other.render(),
    };

    for arg in rest {
        out.push(' ');
        out.push_str(&arg.render());
    }
    out
}

fn substitute<'a>(template: &str, args: &mut impl Iterator<Item = &'a Arg>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(d @ ('s' | 'd' | 'i' | 'f' | 'j' | 'o' | 'O')) => {
                chars.next();
                match args.next() {
                    Some(arg) => out.push_str(&directive(d, arg)),
                    None => {
                        out.push('%');
                        out.push(d);
                    }
                }
            }
            _ => out.push('%'),
        }
    }
    out
}

fn directive(d: char, arg: &Arg) -> String {
    match d {
        'd' | 'i' => match arg.as_f64() {
            Some(n) if d == 'i' => format_number(n.trunc()),
            Some(n) => format_number(n),
            None => "NaN".to_string(),
        },
        'f' => arg.as_f64().map_or_else(|| "NaN".to_string(), format_number),
        'j' => match arg {
            Arg::Str(s) => Value::String(s.clone()).to_string(),
            other => other.render(),
        },
        'o' | 'O' => match arg {
            Arg::Str(s) => inspect(&Value::String(s.clone()), INSPECT_DEPTH),
            Arg::Value(v) => inspect(v, INSPECT_DEPTH),
            other => other.render(),
        },
        _ => arg.render(),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
