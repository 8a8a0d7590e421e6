//! OutputGate: the single synchronized path to standard output.
//!
//! Every emission takes the gate's mutex for its whole duration, so a line
//! printed by one thread is never interleaved with bytes from another. A
//! [`GateWriter`] keeps the lock for as long as it lives and streams formatted
//! text through a [`ChunkBuffer`], which only hands complete characters to the
//! sink until the final flush.
//!
//! Taking the lock again on a thread that already holds a `GateWriter`
//! deadlocks. A poisoned lock is recovered and output continues.

use crate::chunk::{ChunkBuffer, MIN_CAPACITY};
use crate::error::{OutputError, OutputResult};
use crate::sink::{LINE_TERMINATOR, OutputSink, stdout_sink};
use core_locale::OutputMode;
use std::fmt;
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Default [`ChunkBuffer`] capacity for buffered writers.
pub const DEFAULT_CAPACITY: usize = 256;

pub struct OutputGate<S = Box<dyn OutputSink>> {
    sink: Mutex<S>,
    mode: OutputMode,
    capacity: usize,
}

impl OutputGate {
    /// Gate over the process's standard output, sink chosen from `mode`.
    pub fn stdout(mode: OutputMode, capacity: usize) -> Self {
        Self::with_sink(stdout_sink(mode), mode, capacity)
    }
}

impl<S: OutputSink> OutputGate<S> {
    pub fn with_sink(sink: S, mode: OutputMode, capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        debug!(
            target: "output.gate",
            bridged = sink.is_bridged(),
            utf8_clean = mode.is_utf8_clean(),
            capacity,
            "gate_ready"
        );
        Self {
            sink: Mutex::new(sink),
            mode,
            capacity,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Capacity of the chunk buffer behind each [`GateWriter`].
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit `text` in one locked write. Empty input does nothing.
    pub fn print(&self, text: impl AsRef<[u8]>) -> OutputResult<()> {
        let bytes = text.as_ref();
        if bytes.is_empty() {
            return Ok(());
        }
        self.lock().emit(bytes, false)
    }

    /// Emit `text` followed by the line terminator, both under one lock.
    pub fn print_line(&self, text: impl AsRef<[u8]>) -> OutputResult<()> {
        self.lock().emit(text.as_ref(), true)
    }

    pub fn newline(&self) -> OutputResult<()> {
        self.lock().emit(&[], true)
    }

    /// Lock the gate and return a buffered writer. The lock is released when
    /// the writer is dropped or finished.
    pub fn buffered(&self) -> GateWriter<'_, S> {
        GateWriter {
            sink: self.lock(),
            chunk: ChunkBuffer::with_capacity(self.capacity),
            error: None,
        }
    }

    /// Format `args` through a buffered writer in a single locked scope.
    pub fn print_fmt(&self, args: fmt::Arguments<'_>) -> OutputResult<()> {
        let mut writer = self.buffered();
        if fmt::Write::write_fmt(&mut writer, args).is_err() {
            return Err(writer.error.take().unwrap_or(OutputError::Format));
        }
        writer.finish()
    }

    pub fn into_sink(self) -> S {
        self.sink.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped, lock-holding writer. Implements both [`fmt::Write`] and
/// [`io::Write`]; whatever is still buffered is flushed on drop.
pub struct GateWriter<'a, S: OutputSink> {
    sink: MutexGuard<'a, S>,
    chunk: ChunkBuffer,
    error: Option<OutputError>,
}

impl<S: OutputSink> GateWriter<'_, S> {
    /// Append raw bytes. Full buffers are flushed at a character boundary.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> OutputResult<()> {
        let sink = &mut self.sink;
        self.chunk.extend(bytes, |chunk| sink.emit(chunk, false))
    }

    pub fn push(&mut self, byte: u8) -> OutputResult<()> {
        let sink = &mut self.sink;
        self.chunk.push(byte, |chunk| sink.emit(chunk, false))
    }

    pub fn write_line(&mut self, text: &str) -> OutputResult<()> {
        self.write_bytes(text.as_bytes())?;
        self.write_bytes(LINE_TERMINATOR)
    }

    /// Bytes held back, waiting for the rest of a character or a flush.
    pub fn pending(&self) -> &[u8] {
        self.chunk.as_bytes()
    }

    fn flush_remaining(&mut self) -> OutputResult<()> {
        let sink = &mut self.sink;
        self.chunk.finish(|chunk| sink.emit(chunk, false))
    }

    /// Flush the remainder, complete or not, and release the lock. Returns
    /// the first error recorded by a `fmt::Write` call, if any.
    pub fn finish(mut self) -> OutputResult<()> {
        let flushed = self.flush_remaining();
        match self.error.take() {
            Some(err) => Err(err),
            None => flushed,
        }
    }
}

impl<S: OutputSink> fmt::Write for GateWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes()).map_err(|err| {
            if self.error.is_none() {
                self.error = Some(err);
            }
            fmt::Error
        })
    }
}

impl<S: OutputSink> io::Write for GateWriter<'_, S> {
    /// Takes at most the free space of the chunk buffer, so one call causes at
    /// most one flush and the returned count is exactly what was consumed.
    /// A failed flush has already dropped its bytes; errors never carry
    /// `Interrupted`, which would make `write_all` resend them.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let take = buf.len().min(self.chunk.capacity() - self.chunk.len());
        self.write_bytes(&buf[..take]).map_err(|err| match err {
            OutputError::Io(e) if e.kind() != io::ErrorKind::Interrupted => e,
            other => io::Error::other(other),
        })?;
        Ok(take)
    }

    /// Content reaches the sink only when the buffer fills or the writer
    /// finishes; flushing mid-scope would split characters.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: OutputSink> Drop for GateWriter<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = self.flush_remaining() {
            warn!(target: "output.gate", %err, "writer_flush_failed");
        }
    }
}
