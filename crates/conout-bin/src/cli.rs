use clap::{Parser, Subcommand, ValueEnum};
use core_config::{ModeChoice, Overrides};
use std::path::PathBuf;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "conout", version, about = "UTF-8 safe console output")]
pub struct Args {
    /// Optional configuration file path (overrides discovery of `conout.toml`).
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Output mode; `auto` trusts the startup probe.
    #[arg(long, value_enum, global = true)]
    pub mode: Option<ModeArg>,
    /// Chunk buffer capacity in bytes.
    #[arg(long, global = true)]
    pub capacity: Option<usize>,
    /// Write logs to this file instead of stderr.
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            capacity: self.capacity,
            mode: self.mode.map(ModeChoice::from),
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report the decided output mode and the ambient code pages.
    Probe,
    /// Print the arguments as one line.
    Echo {
        /// Do not print the trailing newline.
        #[arg(short = 'n')]
        no_newline: bool,
        words: Vec<String>,
    },
    /// Stream a file (or stdin) through a buffered writer.
    Cat {
        path: Option<PathBuf>,
        /// Upper bound for a single read, capped at 1 MiB.
        #[arg(long, default_value_t = 4096)]
        read_size: usize,
        /// Decode the input from this legacy code page instead of UTF-8.
        #[arg(long)]
        codepage: Option<u32>,
    },
    /// Print long full-width kana/kanji lines.
    Fullwidth {
        #[arg(long, default_value_t = 16)]
        lines: usize,
        /// Characters per line.
        #[arg(long, default_value_t = 40)]
        width: usize,
    },
    /// Print from many threads at once; every line must arrive whole.
    Stress {
        #[arg(long, default_value_t = 4)]
        threads: usize,
        #[arg(long, default_value_t = 1000)]
        lines: usize,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Auto,
    Direct,
    Bridged,
}

impl From<ModeArg> for ModeChoice {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Auto => ModeChoice::Auto,
            ModeArg::Direct => ModeChoice::Direct,
            ModeArg::Bridged => ModeChoice::Bridged,
        }
    }
}
