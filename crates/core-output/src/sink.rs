//! Output sinks: where a flushed chunk finally goes.
//!
//! Two implementations sit behind [`OutputSink`]:
//! * [`DirectSink`] writes UTF-8 bytes straight to a byte stream. Used when the
//!   probe found the process UTF-8 clean.
//! * [`BridgedSink`] converts each chunk to UTF-16 and hands it to a
//!   [`WideWrite`]. Chunks that fail conversion are dropped.
//!
//! The choice is made once, by [`stdout_sink`], from the probe result. Sinks
//! are not synchronized themselves; the gate owns the lock.

use crate::error::OutputResult;
use core_bridge::{BridgeError, utf8_to_wide};
use core_locale::OutputMode;
use std::io::{self, Write};
use tracing::debug;

pub const LINE_TERMINATOR: &[u8] = b"\n";
const WIDE_LINE_TERMINATOR: u16 = b'\n' as u16;

pub trait OutputSink: Send {
    /// Emit one chunk. With `newline` the terminator goes out in the same
    /// emission as the chunk.
    fn emit(&mut self, chunk: &[u8], newline: bool) -> OutputResult<()>;
    /// True when output is transcoded to wide characters.
    fn is_bridged(&self) -> bool;
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn emit(&mut self, chunk: &[u8], newline: bool) -> OutputResult<()> {
        (**self).emit(chunk, newline)
    }

    fn is_bridged(&self) -> bool {
        (**self).is_bridged()
    }
}

pub struct DirectSink<W> {
    out: W,
}

impl<W: Write + Send> DirectSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> OutputSink for DirectSink<W> {
    fn emit(&mut self, chunk: &[u8], newline: bool) -> OutputResult<()> {
        self.out.write_all(chunk)?;
        if newline {
            self.out.write_all(LINE_TERMINATOR)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn is_bridged(&self) -> bool {
        false
    }
}

/// Destination for UTF-16 text.
pub trait WideWrite: Send {
    fn write_wide(&mut self, units: &[u16]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Re-encodes wide text as UTF-8 on a byte stream. This is what a redirected
/// stdout receives in bridged mode, and what non-Windows hosts use throughout.
pub struct Utf8Stream<W> {
    out: W,
    scratch: String,
}

impl<W: Write + Send> Utf8Stream<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            scratch: String::new(),
        }
    }
}

impl<W: Write + Send> WideWrite for Utf8Stream<W> {
    fn write_wide(&mut self, units: &[u16]) -> io::Result<()> {
        self.scratch.clear();
        self.scratch.extend(
            char::decode_utf16(units.iter().copied())
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)),
        );
        self.out.write_all(self.scratch.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

pub struct BridgedSink<W> {
    out: W,
}

impl<W: WideWrite> BridgedSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: WideWrite> OutputSink for BridgedSink<W> {
    fn emit(&mut self, chunk: &[u8], newline: bool) -> OutputResult<()> {
        let mut wide = utf8_to_wide(chunk)?;
        if wide.is_empty() && !chunk.is_empty() {
            debug!(target: "output.gate", len = chunk.len(), newline, "chunk_dropped");
            return Ok(());
        }
        if newline {
            wide.try_reserve_exact(1).map_err(BridgeError::from)?;
            wide.push(WIDE_LINE_TERMINATOR);
        }
        self.out.write_wide(&wide)?;
        self.out.flush()?;
        Ok(())
    }

    fn is_bridged(&self) -> bool {
        true
    }
}

#[cfg(windows)]
pub use console::ConsoleWide;

#[cfg(windows)]
mod console {
    use super::WideWrite;
    use std::io;
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::System::Console::{
        CONSOLE_MODE, GetConsoleMode, GetStdHandle, STD_OUTPUT_HANDLE, WriteConsoleW,
    };

    /// Wide writes straight to the attached console via `WriteConsoleW`.
    pub struct ConsoleWide {
        handle: HANDLE,
    }

    // SAFETY: the standard output handle is process-wide and valid for the
    // life of the process; the console API accepts it from any thread.
    unsafe impl Send for ConsoleWide {}

    impl ConsoleWide {
        /// `None` when stdout is not a console (redirected to a file or pipe).
        pub fn stdout() -> Option<Self> {
            // SAFETY: plain handle query, no pointers involved.
            let handle = unsafe { GetStdHandle(STD_OUTPUT_HANDLE) }.ok()?;
            let mut mode = CONSOLE_MODE::default();
            // SAFETY: `mode` is a valid out-pointer for the duration of the call.
            unsafe { GetConsoleMode(handle, &mut mode) }.ok()?;
            Some(Self { handle })
        }
    }

    impl WideWrite for ConsoleWide {
        fn write_wide(&mut self, mut units: &[u16]) -> io::Result<()> {
            while !units.is_empty() {
                let mut written = 0u32;
                // SAFETY: `units` is a live slice and `written` a valid
                // out-pointer for the duration of the call.
                unsafe {
                    WriteConsoleW(
                        self.handle,
                        units,
                        Some(std::ptr::addr_of_mut!(written)),
                        None,
                    )
                }
                .map_err(|e| io::Error::other(e.to_string()))?;
                if written == 0 {
                    return Err(io::ErrorKind::WriteZero.into());
                }
                units = &units[(written as usize).min(units.len())..];
            }
            Ok(())
        }
    }
}

/// Sink for the process's standard output, picked from the probe result.
pub fn stdout_sink(mode: OutputMode) -> Box<dyn OutputSink> {
    if mode.is_utf8_clean() {
        debug!(target: "output.gate", "sink_direct");
        return Box::new(DirectSink::new(io::stdout()));
    }
    #[cfg(windows)]
    if let Some(console) = ConsoleWide::stdout() {
        debug!(target: "output.gate", "sink_bridged_console");
        return Box::new(BridgedSink::new(console));
    }
    debug!(target: "output.gate", "sink_bridged_stream");
    Box::new(BridgedSink::new(Utf8Stream::new(io::stdout())))
}
