pub mod severity;
pub mod sanitize;
pub mod error_record;
pub mod call;
pub mod record;
pub mod inspect;
pub mod sink;
pub mod logger;
pub mod env;

#[cfg(feature = "middleware")]
pub mod middleware;

pub mod layer;
pub mod init;
pub mod memory_sink;
pub mod noop_sink;

pub use call::{Arg, LogCall};
pub use error_record::{format_err, ErrorEnvelope, ErrorRecord, ErrorValue};
pub use logger::{Logger, LoggerConfig, OutputMode};
pub use record::Record;
pub use severity::Severity;
pub use sink::{LogSink, SinkError, StdoutSink, WriterSink};
