//! Startup locale probe deciding how console output is emitted.
//!
//! The probe runs exactly once, before any output is produced. It inspects the
//! ambient locale and console code page through a [`LocaleEnv`] and returns an
//! [`OutputMode`]: whether the process is "UTF-8 clean" (stdout, C locale and
//! console code page all agree on UTF-8) and which legacy code page
//! non-Unicode programs on this system use.
//!
//! `OutputMode` is a plain `Copy` value with private fields. Components that
//! care about it receive it through their constructors; nothing re-derives or
//! mutates it after the probe returns.
//!
//! Probing never fails. Every step that does not succeed degrades the result
//! to `utf8_clean = false`, which selects the transcoding output path.

use tracing::{debug, info};

pub mod codeset;
pub mod system;

pub use system::SystemLocaleEnv;

/// Code page identifier for UTF-8.
pub const CP_UTF8: u32 = 65001;
/// Code page identifier for 7-bit US-ASCII.
pub const CP_US_ASCII: u32 = 20127;

/// Locale names tried, in order, when forcing a UTF-8 text locale.
pub const DEFAULT_LOCALE_CANDIDATES: &[&str] = &["C.UTF-8", "en_US.UTF-8", ".UTF-8"];

const UTF8_SUFFIXES: &[&str] = &[".utf-8", ".utf8"];

/// Result of the startup probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    utf8_clean: bool,
    legacy_codepage: u32,
}

impl OutputMode {
    pub const fn new(utf8_clean: bool, legacy_codepage: u32) -> Self {
        Self {
            utf8_clean,
            legacy_codepage,
        }
    }

    /// Mode for an environment known to be UTF-8 end to end.
    pub const fn clean() -> Self {
        Self {
            utf8_clean: true,
            legacy_codepage: CP_UTF8,
        }
    }

    /// Mode that routes all output through the wide-character bridge.
    pub const fn bridged(legacy_codepage: u32) -> Self {
        Self {
            utf8_clean: false,
            legacy_codepage,
        }
    }

    pub const fn is_utf8_clean(&self) -> bool {
        self.utf8_clean
    }

    pub const fn legacy_codepage(&self) -> u32 {
        self.legacy_codepage
    }
}

/// Ambient locale and console state consulted by the probe.
///
/// The system implementation talks to the C runtime and, on Windows, the
/// console API. Tests substitute scripted environments.
pub trait LocaleEnv {
    /// Code page the process uses for narrow strings (`GetACP` on Windows).
    fn active_codepage(&self) -> u32;
    /// Current process text locale name, if the runtime reports one.
    fn current_locale(&mut self) -> Option<String>;
    /// Switch the process text locale. Returns the resulting locale name,
    /// `None` when the runtime rejected the request.
    fn set_locale(&mut self, name: &str) -> Option<String>;
    /// Put stdout into plain byte/text mode. Returns false on failure.
    fn prepare_text_stdout(&mut self) -> bool;
    /// Request a console output code page. Returns false on failure.
    fn set_console_output_codepage(&mut self, codepage: u32) -> bool;
    /// Console output code page as currently reported.
    fn console_output_codepage(&self) -> u32;
    /// Default ANSI code page of the system locale, if it can be determined.
    fn system_default_codepage(&self) -> Option<u32>;
}

/// True when `name` denotes a UTF-8 locale (`xx_YY.UTF-8`, `C.utf8`, ...).
pub fn is_utf8_locale(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    UTF8_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// Probe the real process environment using the default candidate list.
pub fn probe() -> OutputMode {
    probe_with(&mut SystemLocaleEnv::new(), DEFAULT_LOCALE_CANDIDATES)
}

/// Run the probe against `env`, trying `candidates` in order when forcing a
/// UTF-8 locale.
pub fn probe_with<E, S>(env: &mut E, candidates: &[S]) -> OutputMode
where
    E: LocaleEnv + ?Sized,
    S: AsRef<str>,
{
    let acp = env.active_codepage();
    let mut utf8_clean = false;

    if acp == CP_UTF8 {
        let backup = env.current_locale();
        let mut forced = None;
        for candidate in candidates {
            let candidate = candidate.as_ref();
            let result = env.set_locale(candidate);
            debug!(target: "locale.probe", candidate, result = result.as_deref(), "set_locale_attempt");
            if result.as_deref().is_some_and(is_utf8_locale) {
                forced = result;
                break;
            }
        }
        let locale_ok = forced.is_some() || env.current_locale().as_deref().is_some_and(is_utf8_locale);

        if locale_ok && env.prepare_text_stdout() {
            // The setter's own status is not trusted; the read-back decides.
            let _ = env.set_console_output_codepage(CP_UTF8);
            utf8_clean = env.console_output_codepage() == CP_UTF8;
        }

        if !utf8_clean {
            if let Some(previous) = backup.as_deref() {
                let _ = env.set_locale(previous);
            }
        }
    }

    let legacy_codepage = match env.system_default_codepage() {
        Some(cp) => cp,
        None => acp,
    };

    info!(
        target: "locale.probe",
        active_codepage = acp,
        utf8_clean,
        legacy_codepage,
        "probe_complete"
    );

    OutputMode {
        utf8_clean,
        legacy_codepage,
    }
}
