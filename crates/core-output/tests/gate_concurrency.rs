//! Concurrent emission through one gate: lines never interleave.

use core_output::{BridgedSink, DirectSink, OutputGate, OutputMode, WideWrite, outputf};
use std::io::{self, Write};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct SharedBytes(Arc<Mutex<Vec<u8>>>);

impl SharedBytes {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBytes {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct SharedWide(Arc<Mutex<Vec<u16>>>);

impl WideWrite for SharedWide {
    fn write_wide(&mut self, units: &[u16]) -> io::Result<()> {
        self.0.lock().unwrap().extend_from_slice(units);
        Ok(())
    }
}

fn direct_gate(capacity: usize) -> (Arc<OutputGate<DirectSink<SharedBytes>>>, SharedBytes) {
    let out = SharedBytes::default();
    let gate = OutputGate::with_sink(DirectSink::new(out.clone()), OutputMode::clean(), capacity);
    (Arc::new(gate), out)
}

#[test]
fn concurrent_print_line_keeps_lines_whole() {
    const THREADS: usize = 8;
    const LINES: usize = 200;
    let (gate, out) = direct_gate(16);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                for i in 0..LINES {
                    gate.print_line(format!("t{t} l{i} 日本語テキスト")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let text = out.text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), THREADS * LINES);
    for t in 0..THREADS {
        let mine: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| l.starts_with(&format!("t{t} ")))
            .collect();
        assert_eq!(mine.len(), LINES);
        for (i, line) in mine.iter().enumerate() {
            assert_eq!(*line, format!("t{t} l{i} 日本語テキスト"));
        }
    }
}

#[test]
fn buffered_writers_do_not_interleave() {
    const THREADS: usize = 6;
    let (gate, out) = direct_gate(5);

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                for i in 0..50 {
                    let mut w = gate.buffered();
                    for piece in ["かな", "-", "漢字", "-"] {
                        w.write_bytes(piece.as_bytes()).unwrap();
                    }
                    writeln!(w, "{t}:{i}").unwrap();
                    w.finish().unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let text = out.text();
    assert_eq!(text.lines().count(), THREADS * 50);
    for line in text.lines() {
        let (prefix, id) = line.split_at("かな-漢字-".len());
        assert_eq!(prefix, "かな-漢字-");
        assert!(id.split_once(':').is_some(), "bad line {line:?}");
    }
}

#[test]
fn writer_holds_lock_for_its_scope() {
    let (gate, out) = direct_gate(64);
    let (tx, rx) = mpsc::channel();

    let holder = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            let mut w = gate.buffered();
            tx.send(()).unwrap();
            w.write_bytes(b"first ").unwrap();
            thread::sleep(Duration::from_millis(50));
            w.write_bytes(b"second").unwrap();
        })
    };
    rx.recv().unwrap();
    gate.print_line(" other").unwrap();
    holder.join().unwrap();

    assert_eq!(out.text(), "first second other\n");
}

#[test]
fn outputf_formats_in_one_scope() {
    let (gate, out) = direct_gate(4);
    outputf!(gate, "{}={:>3}|{}\n", "値", 7, "🦄").unwrap();
    assert_eq!(out.text(), "値=  7|🦄\n");
}

#[test]
fn bridged_gate_transcodes_and_drops_malformed() {
    let wide = SharedWide::default();
    let gate = OutputGate::with_sink(BridgedSink::new(wide.clone()), OutputMode::bridged(1252), 8);

    gate.print_line([b'a', 0xE4, 0xB8]).unwrap();
    gate.print_line("é").unwrap();
    gate.newline().unwrap();
    gate.print("全角").unwrap();

    let units = wide.0.lock().unwrap().clone();
    assert_eq!(String::from_utf16(&units).unwrap(), "é\n\n全角");
}

#[test]
fn bridged_buffered_output_survives_small_capacity() {
    let wide = SharedWide::default();
    let gate = OutputGate::with_sink(BridgedSink::new(wide.clone()), OutputMode::bridged(932), 4);
    let text = "ｶﾀｶﾅ カタカナ 片仮名 👨‍👩‍👧";
    outputf!(gate, "{text}").unwrap();

    let units = wide.0.lock().unwrap().clone();
    assert_eq!(String::from_utf16(&units).unwrap(), text);
}

struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

impl Write for LockedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn dropped_chunk_is_logged_at_debug() {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter {
            inner: buffer.clone(),
        })
        .finish();

    with_default(subscriber, || {
        let gate = OutputGate::with_sink(
            BridgedSink::new(SharedWide::default()),
            OutputMode::bridged(1252),
            8,
        );
        gate.print([0xFFu8, 0xFE]).unwrap();
    });

    let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(log_output.contains("DEBUG output.gate:"));
    assert!(log_output.contains("chunk_dropped"));
}
