//! Conversions between UTF-8 and the platform wide-character form.
//!
//! Wide text is UTF-16 code units, which is what the Windows console API
//! consumes. Every conversion here is non-throwing for bad input: malformed
//! or unconvertible text produces an empty result and callers treat empty as
//! "drop this chunk". The only error is running out of memory while
//! allocating the output, which the caller must propagate.

use std::collections::TryReserveError;
use thiserror::Error;
use tracing::debug;

mod legacy;

pub use legacy::legacy_to_wide;

/// Code page identifier for UTF-8.
pub const CP_UTF8: u32 = 65001;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("out of memory converting text: {0}")]
    Alloc(#[from] TryReserveError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

pub(crate) fn reserve_units(units: usize) -> BridgeResult<Vec<u16>> {
    let mut wide = Vec::new();
    wide.try_reserve_exact(units)?;
    Ok(wide)
}

/// Convert UTF-8 bytes to UTF-16. Malformed input yields an empty vector.
pub fn utf8_to_wide(bytes: &[u8]) -> BridgeResult<Vec<u16>> {
    let Ok(text) = std::str::from_utf8(bytes) else {
        debug!(target: "bridge", len = bytes.len(), "utf8_malformed");
        return Ok(Vec::new());
    };
    // A UTF-16 encoding never has more units than the UTF-8 encoding has bytes.
    let mut wide = reserve_units(text.len())?;
    wide.extend(text.encode_utf16());
    Ok(wide)
}

/// Convert UTF-16 back to UTF-8. Unpaired surrogates yield an empty string.
pub fn wide_to_utf8(units: &[u16]) -> BridgeResult<String> {
    let mut text = String::new();
    text.try_reserve_exact(units.len().saturating_mul(3))?;
    for decoded in char::decode_utf16(units.iter().copied()) {
        match decoded {
            Ok(c) => text.push(c),
            Err(e) => {
                debug!(target: "bridge", unpaired = e.unpaired_surrogate(), "utf16_malformed");
                return Ok(String::new());
            }
        }
    }
    Ok(text)
}

// Placeholders the C runtime or the std fallback produce for codes the OS
// does not know.
const UNKNOWN_MESSAGE_PREFIXES: &[&str] = &["Unknown error", "No error information", "OS Error "];

/// Human readable message the OS associates with an error code, without the
/// trailing code annotation. Empty when the OS has nothing to say.
pub fn system_message(code: i32) -> String {
    let text = std::io::Error::from_raw_os_error(code).to_string();
    let suffix = format!(" (os error {code})");
    let message = text.strip_suffix(suffix.as_str()).unwrap_or(&text).trim_end();
    if UNKNOWN_MESSAGE_PREFIXES.iter().any(|p| message.starts_with(p)) {
        debug!(target: "bridge", code, "system_message_unknown");
        return String::new();
    }
    message.to_string()
}
