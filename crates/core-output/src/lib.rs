//! Thread-safe console output that never splits a UTF-8 character.
//!
//! Components:
//! - `chunk`: fixed-capacity buffer flushing only at character boundaries.
//! - `sink`: direct UTF-8 or bridged UTF-16 emission, picked from the probe.
//! - `gate`: the process-wide lock plus one-shot and buffered print calls.
//!
//! Typical use: probe once at startup, build one [`OutputGate`], share it.
//!
//! ```no_run
//! use core_output::{OutputGate, outputf};
//!
//! let gate = OutputGate::stdout(core_locale::probe(), core_output::DEFAULT_CAPACITY);
//! gate.print_line("ready").unwrap();
//! outputf!(gate, "{} workers\n", 4).unwrap();
//! ```

pub mod chunk;
pub mod error;
pub mod gate;
pub mod sink;

pub use chunk::{ChunkBuffer, MAX_CARRY, MIN_CAPACITY, boundary_split};
pub use core_locale::OutputMode;
pub use error::{OutputError, OutputResult};
pub use gate::{DEFAULT_CAPACITY, GateWriter, OutputGate};
pub use sink::{BridgedSink, DirectSink, LINE_TERMINATOR, OutputSink, Utf8Stream, WideWrite, stdout_sink};

#[cfg(windows)]
pub use sink::ConsoleWide;

/// Formatted print through an [`OutputGate`], one locked scope per call.
#[macro_export]
macro_rules! outputf {
    ($gate:expr, $($arg:tt)*) => {
        $gate.print_fmt(::std::format_args!($($arg)*))
    };
}
