use serde::Serialize;
use std::fmt;

/// Severity of a log call.
///
/// Each severity has a fixed numeric rank; a [`Logger`](crate::Logger)
/// emits a call only when the call's rank is at least the logger's
/// threshold rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Trace,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Debug,
        Severity::Trace,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
    ];

    /// Fixed numeric rank. Higher is more severe.
    pub const fn rank(self) -> u8 {
        match self {
            Severity::Debug => 10,
            Severity::Trace => 15,
            Severity::Info => 20,
            Severity::Warn => 30,
            Severity::Error => 50,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Trace => "trace",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        }
    }

    /// Look up a severity by its lowercase name.
    pub fn from_name(name: &str) -> Option<Severity> {
        Severity::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold rank for an optional level name.
///
/// Absent or unrecognized names yield `0`, which lets every call through.
pub fn threshold_for(level: Option<&str>) -> u8 {
    level.and_then(Severity::from_name).map_or(0, Severity::rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_fixed() {
        let ranks: Vec<u8> = Severity::ALL.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks, vec![10, 15, 20, 30, 50]);
    }

    #[test]
    fn threshold_defaults_to_zero() {
        assert_eq!(threshold_for(None), 0);
        assert_eq!(threshold_for(Some("verbose")), 0);
        assert_eq!(threshold_for(Some("WARN")), 0);
        assert_eq!(threshold_for(Some("warn")), 30);
    }

    #[test]
    fn serializes_as_lowercase_name() {
        let json = serde_json::to_string(&Severity::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
        assert_eq!(Severity::Trace.to_string(), "trace");
    }
}
