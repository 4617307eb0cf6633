//! Multi-line, human-inspectable rendering of records for development mode.

use serde_json::Value;

/// Nesting depth rendered before containers collapse to `[Object]`/`[Array]`.
pub const INSPECT_DEPTH: usize = 5;

/// Render `value` across multiple lines, two spaces per level.
pub fn inspect(value: &Value, max_depth: usize) -> String {
    let mut out = String::new();
    render(value, 0, max_depth, &mut out);
    out
}

fn render(value: &Value, depth: usize, max_depth: usize, out: &mut String) {
    match value {
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Object(_) if depth > max_depth => out.push_str("[Object]"),
        Value::Array(_) if depth > max_depth => out.push_str("[Array]"),
        Value::Object(map) => {
            out.push_str("{\n");
            let len = map.len();
            for (i, (key, v)) in map.iter().enumerate() {
                indent(depth + 1, out);
                push_key(key, out);
                out.push_str(": ");
                render(v, depth + 1, max_depth, out);
                if i + 1 < len {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(depth, out);
            out.push('}');
        }
        Value::Array(items) => {
            out.push_str("[\n");
            let len = items.len();
            for (i, v) in items.iter().enumerate() {
                indent(depth + 1, out);
                render(v, depth + 1, max_depth, out);
                if i + 1 < len {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(depth, out);
            out.push(']');
        }
        Value::String(s) => push_quoted(s, out),
        other => out.push_str(&other.to_string()),
    }
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn push_key(key: &str, out: &mut String) {
    let bare = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if bare {
        out.push_str(key);
    } else {
        push_quoted(key, out);
    }
}

fn push_quoted(s: &str, out: &mut String) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
}
