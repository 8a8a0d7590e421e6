//! Configuration loading for the console output subsystem.
//!
//! Parses `conout.toml` (or an override path supplied by the binary):
//!
//! ```toml
//! [output]
//! capacity = 256      # chunk buffer size in bytes
//! mode = "auto"       # auto | direct | bridged
//!
//! [probe]
//! locales = ["C.UTF-8", "en_US.UTF-8", ".UTF-8"]
//! ```
//!
//! Missing files and parse failures fall back to defaults. Unknown fields are
//! ignored. The raw capacity is kept as parsed; `Config::apply_overrides`
//! folds in command-line values and clamps into `MIN_CAPACITY..=MAX_CAPACITY`.

use anyhow::Result;
use core_locale::{DEFAULT_LOCALE_CANDIDATES, OutputMode};
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub use core_output::{DEFAULT_CAPACITY, MIN_CAPACITY};

pub const MAX_CAPACITY: usize = 64 * 1024;

/// How the output mode is chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeChoice {
    /// Use the probe result as-is.
    #[default]
    Auto,
    /// Write UTF-8 bytes directly regardless of the probe.
    Direct,
    /// Always transcode through the wide-character path.
    Bridged,
}

impl ModeChoice {
    pub fn resolve(self, probed: OutputMode) -> OutputMode {
        match self {
            Self::Auto => probed,
            Self::Direct => OutputMode::new(true, probed.legacy_codepage()),
            Self::Bridged => OutputMode::bridged(probed.legacy_codepage()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub mode: ModeChoice,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            mode: ModeChoice::default(),
        }
    }
}

impl OutputConfig {
    const fn default_capacity() -> usize {
        DEFAULT_CAPACITY
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    #[serde(default = "ProbeConfig::default_locales")]
    pub locales: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            locales: Self::default_locales(),
        }
    }
}

impl ProbeConfig {
    fn default_locales() -> Vec<String> {
        DEFAULT_LOCALE_CANDIDATES.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
    pub effective_capacity: usize,
    pub effective_mode: ModeChoice,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file(None, ConfigFile::default())
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub capacity: Option<usize>,
    pub mode: Option<ModeChoice>,
}

/// Config path: `conout.toml` in the working directory if present, else the
/// platform config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("conout.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("conout").join("conout.toml");
    }
    PathBuf::from("conout.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => Ok(Config::from_file(Some(content), file)),
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    fn from_file(raw: Option<String>, file: ConfigFile) -> Self {
        let mut cfg = Self {
            raw,
            effective_capacity: DEFAULT_CAPACITY,
            effective_mode: file.output.mode,
            file,
        };
        cfg.apply_overrides(Overrides::default());
        cfg
    }

    /// Fold command-line values over the file and clamp the capacity.
    /// Returns the effective capacity.
    pub fn apply_overrides(&mut self, overrides: Overrides) -> usize {
        let raw = overrides.capacity.unwrap_or(self.file.output.capacity);
        let clamped = raw.clamp(MIN_CAPACITY, MAX_CAPACITY);
        if clamped != raw {
            info!(
                target: "config",
                raw,
                clamped,
                min = MIN_CAPACITY,
                max = MAX_CAPACITY,
                from_cli = overrides.capacity.is_some(),
                "output_capacity_clamped"
            );
        }
        self.effective_capacity = clamped;
        self.effective_mode = overrides.mode.unwrap_or(self.file.output.mode);
        clamped
    }

    pub fn locale_candidates(&self) -> &[String] {
        &self.file.probe.locales
    }
}
