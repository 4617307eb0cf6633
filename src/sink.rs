use std::io::{self, Write};
use std::sync::Mutex;

/// Error returned by a [`LogSink`] when a line could not be written.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("sink lock poisoned")]
    Poisoned,
}

/// Destination for serialized log records.
///
/// Implementations receive one fully formatted record per call and are
/// responsible for appending it, followed by a newline, to the underlying
/// stream. Concurrent callers may interleave whole lines but never the
/// bytes of a single line.
pub trait LogSink: Send + Sync {
    /// Append one formatted record.
    ///
    /// **Parameters**
    /// - `line`: the record without its trailing newline.
    ///
    /// **Returns**
    /// - `Ok(())` if the line was handed to the stream.
    /// - `Err(..)` if the stream failed. The logger reports the failure on
    ///   stderr and carries on.
    fn write_line(&self, line: &str) -> Result<(), SinkError>;

    /// Flush any buffered output.
    ///
    /// Default implementation is a no-op.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes each record to the process's standard output.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let mut out = io::stdout().lock();
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        io::stdout().lock().flush()?;
        Ok(())
    }
}

/// Writes each record to any [`Write`] implementation, e.g. a file.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer: Mutex::new(writer) }
    }

    /// Recover the inner writer.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer.into_inner().map_err(|_| SinkError::Poisoned)
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        writer.write_all(&buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().map_err(|_| SinkError::Poisoned)?.flush()?;
        Ok(())
    }
}
