//! [`crate::LocaleEnv`] backed by the running process.
//!
//! The text locale is switched through the C runtime's `setlocale` on every
//! platform. Code pages come from `GetACP`/console API on Windows and from the
//! `LC_ALL`/`LC_CTYPE`/`LANG` variables elsewhere, where a terminal is a plain
//! byte stream whose encoding the process cannot change.
//!
//! `setlocale` mutates process-global state and is not thread-safe. The probe
//! is meant to run once on the main thread before other threads start.

pub struct SystemLocaleEnv {
    _private: (),
}

impl Default for SystemLocaleEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemLocaleEnv {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(any(unix, windows))]
fn c_setlocale(name: Option<&str>) -> Option<String> {
    use std::ffi::{CStr, CString};

    let owned = match name {
        Some(n) => Some(CString::new(n).ok()?),
        None => None,
    };
    let ptr = owned.as_ref().map_or(std::ptr::null(), |c| c.as_ptr());
    // SAFETY: `ptr` is either null (query only) or points at a NUL-terminated
    // string that outlives the call. LC_ALL is a valid category.
    let result = unsafe { libc::setlocale(libc::LC_ALL, ptr) };
    if result.is_null() {
        return None;
    }
    // SAFETY: a non-null return is a NUL-terminated string owned by the C
    // runtime, valid until the next `setlocale` call. It is copied right away.
    let current = unsafe { CStr::from_ptr(result) };
    Some(current.to_string_lossy().into_owned())
}

#[cfg(unix)]
mod imp {
    use super::{SystemLocaleEnv, c_setlocale};
    use crate::codeset::codepage_for_locale;
    use crate::{CP_US_ASCII, LocaleEnv};

    fn env_locale() -> Option<String> {
        ["LC_ALL", "LC_CTYPE", "LANG"]
            .iter()
            .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    impl LocaleEnv for SystemLocaleEnv {
        fn active_codepage(&self) -> u32 {
            env_locale()
                .map(|l| codepage_for_locale(&l))
                .unwrap_or(CP_US_ASCII)
        }

        fn current_locale(&mut self) -> Option<String> {
            c_setlocale(None)
        }

        fn set_locale(&mut self, name: &str) -> Option<String> {
            c_setlocale(Some(name))
        }

        fn prepare_text_stdout(&mut self) -> bool {
            true
        }

        fn set_console_output_codepage(&mut self, codepage: u32) -> bool {
            codepage == self.active_codepage()
        }

        fn console_output_codepage(&self) -> u32 {
            self.active_codepage()
        }

        fn system_default_codepage(&self) -> Option<u32> {
            env_locale().map(|l| codepage_for_locale(&l))
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::{SystemLocaleEnv, c_setlocale};
    use crate::LocaleEnv;
    use windows::Win32::Globalization::{
        GetACP, GetLocaleInfoW, GetSystemDefaultLCID, LOCALE_IDEFAULTANSICODEPAGE,
        LOCALE_RETURN_NUMBER,
    };
    use windows::Win32::System::Console::{GetConsoleOutputCP, SetConsoleOutputCP};

    // CP_ACP: "use the active code page", i.e. no specific answer.
    const CP_ACP: u32 = 0;

    impl LocaleEnv for SystemLocaleEnv {
        fn active_codepage(&self) -> u32 {
            // SAFETY: no arguments, reads process state only.
            unsafe { GetACP() }
        }

        fn current_locale(&mut self) -> Option<String> {
            c_setlocale(None)
        }

        fn set_locale(&mut self, name: &str) -> Option<String> {
            c_setlocale(Some(name))
        }

        fn prepare_text_stdout(&mut self) -> bool {
            // Rust's stdout never goes through CRT text-mode translation.
            true
        }

        fn set_console_output_codepage(&mut self, codepage: u32) -> bool {
            // SAFETY: plain integer argument; fails cleanly without a console.
            unsafe { SetConsoleOutputCP(codepage) }.is_ok()
        }

        fn console_output_codepage(&self) -> u32 {
            // SAFETY: no arguments; returns 0 without a console.
            unsafe { GetConsoleOutputCP() }
        }

        fn system_default_codepage(&self) -> Option<u32> {
            let mut number = [0u16; 2];
            // SAFETY: `number` is a writable buffer of exactly the two UTF-16
            // units LOCALE_RETURN_NUMBER writes.
            let written = unsafe {
                let lcid = GetSystemDefaultLCID();
                GetLocaleInfoW(
                    lcid,
                    LOCALE_IDEFAULTANSICODEPAGE | LOCALE_RETURN_NUMBER,
                    Some(&mut number[..]),
                )
            };
            if written != 2 {
                return None;
            }
            let cp = u32::from(number[0]) | (u32::from(number[1]) << 16);
            if cp == CP_ACP { None } else { Some(cp) }
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod imp {
    use super::SystemLocaleEnv;
    use crate::{CP_US_ASCII, LocaleEnv};

    impl LocaleEnv for SystemLocaleEnv {
        fn active_codepage(&self) -> u32 {
            CP_US_ASCII
        }
        fn current_locale(&mut self) -> Option<String> {
            None
        }
        fn set_locale(&mut self, _name: &str) -> Option<String> {
            None
        }
        fn prepare_text_stdout(&mut self) -> bool {
            false
        }
        fn set_console_output_codepage(&mut self, _codepage: u32) -> bool {
            false
        }
        fn console_output_codepage(&self) -> u32 {
            CP_US_ASCII
        }
        fn system_default_codepage(&self) -> Option<u32> {
            None
        }
    }
}
