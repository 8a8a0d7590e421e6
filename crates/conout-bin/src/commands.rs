//! Subcommand bodies. Each one writes only through the shared gate.

use crate::cli::Command;
use anyhow::{Context, Result, anyhow, bail};
use core_bridge::{legacy_to_wide, wide_to_utf8};
use core_output::{OutputGate, OutputMode, OutputResult, OutputSink, outputf};
use std::fs::File;
use std::io::{self, Read};
use std::thread;
use tracing::{debug, info};

/// Largest read buffer `cat` allocates, whatever `--read-size` asks for.
const MAX_READ_SIZE: usize = 1 << 20;

const FULLWIDTH_SAMPLE: &str = "あいうえおかきくけこ漢字仮名交じり文カタカナ全角英数ＡＢＣ";

/// What the startup probe saw and what was finally chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub probed: OutputMode,
    pub resolved: OutputMode,
    pub active_codepage: u32,
    pub console_codepage: u32,
    pub capacity: usize,
}

pub fn run<S: OutputSink>(command: &Command, gate: &OutputGate<S>, report: &ProbeReport) -> Result<()> {
    debug!(target: "runtime", ?command, "command_start");
    match command {
        Command::Probe => probe(gate, report)?,
        Command::Echo { no_newline, words } => echo(gate, words, *no_newline)?,
        Command::Cat { path: Some(path), read_size, codepage } => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            cat_any(gate, file, *read_size, *codepage)?
        }
        Command::Cat { path: None, read_size, codepage } => {
            cat_any(gate, io::stdin().lock(), *read_size, *codepage)?
        }
        Command::Fullwidth { lines, width } => fullwidth(gate, *lines, *width)?,
        Command::Stress { threads, lines } => stress(gate, *threads, *lines)?,
    }
    Ok(())
}

fn probe<S: OutputSink>(gate: &OutputGate<S>, report: &ProbeReport) -> OutputResult<()> {
    let sink = if report.resolved.is_utf8_clean() { "direct" } else { "bridged" };
    outputf!(
        gate,
        "utf8_clean        {}\n\
         legacy_codepage   {}\n\
         active_codepage   {}\n\
         console_codepage  {}\n\
         probed_clean      {}\n\
         capacity          {}\n\
         sink              {}\n",
        report.resolved.is_utf8_clean(),
        report.resolved.legacy_codepage(),
        report.active_codepage,
        report.console_codepage,
        report.probed.is_utf8_clean(),
        report.capacity,
        sink,
    )
}

fn echo<S: OutputSink>(gate: &OutputGate<S>, words: &[String], no_newline: bool) -> OutputResult<()> {
    let line = words.join(" ");
    if no_newline {
        gate.print(line)
    } else {
        gate.print_line(line)
    }
}

/// Stream `input` through one buffered writer. Read boundaries fall anywhere,
/// including inside a character; the writer reassembles them. The read size
/// is clamped to `1..=MAX_READ_SIZE`.
fn cat<S: OutputSink, R: Read>(gate: &OutputGate<S>, mut input: R, read_size: usize) -> Result<()> {
    let mut buf = vec![0u8; read_size.clamp(1, MAX_READ_SIZE)];
    let mut writer = gate.buffered();
    let mut total = 0usize;
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("reading input"),
        };
        writer.write_bytes(&buf[..n])?;
        total += n;
    }
    writer.finish()?;
    debug!(target: "runtime", total_bytes = total, "cat_complete");
    Ok(())
}

fn cat_any<S: OutputSink, R: Read>(
    gate: &OutputGate<S>,
    input: R,
    read_size: usize,
    codepage: Option<u32>,
) -> Result<()> {
    match codepage {
        Some(cp) => cat_legacy(gate, input, cp),
        None => cat(gate, input, read_size),
    }
}

/// Decode the whole of `input` from a legacy code page and print it.
/// Multi-byte code pages cannot be decoded piecewise, so nothing is streamed.
fn cat_legacy<S: OutputSink, R: Read>(gate: &OutputGate<S>, mut input: R, codepage: u32) -> Result<()> {
    let mut raw = Vec::new();
    input.read_to_end(&mut raw).context("reading input")?;
    let wide = legacy_to_wide(&raw, codepage)?;
    if wide.is_empty() && !raw.is_empty() {
        bail!("input is not valid in code page {codepage}");
    }
    let text = wide_to_utf8(&wide)?;
    gate.print(text)?;
    Ok(())
}

fn fullwidth_line(n: usize, width: usize) -> String {
    FULLWIDTH_SAMPLE.chars().cycle().skip(n).take(width).collect()
}

fn fullwidth<S: OutputSink>(gate: &OutputGate<S>, lines: usize, width: usize) -> OutputResult<()> {
    for n in 0..lines {
        outputf!(gate, "{n:>4} {}\n", fullwidth_line(n, width))?;
    }
    Ok(())
}

fn stress<S: OutputSink>(gate: &OutputGate<S>, threads: usize, lines: usize) -> Result<()> {
    let threads = threads.max(1);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                scope.spawn(move || -> OutputResult<()> {
                    for i in 0..lines {
                        gate.print_line(format!("[{t:02}] {i:06} {}", fullwidth_line(t + i, 12)))?;
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().map_err(|_| anyhow!("stress worker panicked"))??;
        }
        Ok::<(), anyhow::Error>(())
    })?;
    info!(target: "runtime", threads, lines, "stress_complete");
    Ok(())
}
