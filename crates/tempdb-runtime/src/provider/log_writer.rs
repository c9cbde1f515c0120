//! Diagnostic log sink exposed by the connection provider.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Shared, swappable write target for diagnostic text.
pub type SharedLogWriter = Arc<Mutex<dyn Write + Send>>;

/// Buffers written text and emits it as one tracing line per flush.
#[derive(Debug, Default)]
pub struct TracingLogWriter {
    buffer: Vec<u8>,
}

impl TracingLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh writer behind the shared handle type.
    pub fn shared() -> SharedLogWriter {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Bytes written since the last flush.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }
}

impl Write for TracingLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            debug!(target: "tempdb::log_writer", "{}", String::from_utf8_lossy(&self.buffer));
            self.buffer.clear();
        }
        Ok(())
    }
}

impl Drop for TracingLogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
