//! Per-context output streams.
//!
//! Each context owns its own stdout and stderr sink so that multiple
//! contexts never interleave on one OS stream. Sinks buffer and flush on
//! newline or when the buffer fills, so a host callback sees line-sized
//! deltas rather than single bytes.

use std::io::Write as _;
use std::sync::{Arc, Mutex};

const SINK_BUF_SIZE: usize = 256;

/// A write-only byte stream owned by one context.
pub trait OutputSink: Send {
    /// Append bytes to the stream.
    fn write(&mut self, bytes: &[u8]);

    /// Force any buffered bytes out to the backend.
    fn flush(&mut self);
}

/// Hosted-build sink: forwards to process stdout or stderr, prefixing each
/// line with the owning context's id.
pub struct HostSink {
    ctx: u32,
    to_stderr: bool,
    buf: Vec<u8>,
    at_line_start: bool,
}

impl HostSink {
    #[must_use]
    pub fn stdout(ctx: u32) -> Self {
        Self::new(ctx, false)
    }

    #[must_use]
    pub fn stderr(ctx: u32) -> Self {
        Self::new(ctx, true)
    }

    fn new(ctx: u32, to_stderr: bool) -> Self {
        Self {
            ctx,
            to_stderr,
            buf: Vec::with_capacity(SINK_BUF_SIZE),
            at_line_start: true,
        }
    }

    fn drain(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        if self.to_stderr {
            let mut out = std::io::stderr().lock();
            let _ = out.write_all(&self.buf);
            let _ = out.flush();
        } else {
            let mut out = std::io::stdout().lock();
            let _ = out.write_all(&self.buf);
            let _ = out.flush();
        }
        self.buf.clear();
    }
}

impl OutputSink for HostSink {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.at_line_start {
                let prefix = format!("[{}] ", self.ctx);
                self.buf.extend_from_slice(prefix.as_bytes());
                self.at_line_start = false;
            }
            self.buf.push(b);
            if b == b'\n' {
                self.at_line_start = true;
                self.drain();
            } else if self.buf.len() >= SINK_BUF_SIZE {
                self.drain();
            }
        }
    }

    fn flush(&mut self) {
        self.drain();
    }
}

impl Drop for HostSink {
    fn drop(&mut self) {
        self.drain();
    }
}

/// In-memory sink with a shared handle, used by embedding hosts and tests
/// to capture a context's output after the context has moved to the
/// simulator thread.
#[derive(Clone, Default)]
pub struct BufferSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl BufferSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Everything written so far, lossily decoded.
    #[must_use]
    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl OutputSink for BufferSink {
    fn write(&mut self, bytes: &[u8]) {
        if let Ok(mut buf) = self.buf.lock() {
            buf.extend_from_slice(bytes);
        }
    }

    fn flush(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_shares_contents_across_clones() {
        let sink = BufferSink::new();
        let mut writer = sink.clone();
        writer.write(b"hello");
        writer.flush();
        assert_eq!(sink.contents_string(), "hello");
    }
}
