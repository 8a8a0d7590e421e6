//! Legacy (non-Unicode) code page decoding.
//!
//! UTF-8, US-ASCII, ISO-8859-1 and Windows-1252 are decoded in-crate so the
//! behavior is identical on every platform. Anything else goes through
//! `MultiByteToWideChar` on Windows and is unsupported (empty) elsewhere.
//! Decoding is strict: a byte the code page does not define empties the
//! whole result.

use crate::{BridgeResult, CP_UTF8, reserve_units, utf8_to_wide};
use tracing::debug;

const CP_US_ASCII: u32 = 20127;
const CP_LATIN1: u32 = 28591;
const CP_WINDOWS_1252: u32 = 1252;

// 0x80..=0x9F of Windows-1252; zero marks an undefined byte.
const CP1252_HIGH: [u16; 32] = [
    0x20AC, 0x0000, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, //
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0x0000, 0x017D, 0x0000, //
    0x0000, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, //
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0x0000, 0x017E, 0x0178, //
];

fn decode_single_byte(bytes: &[u8], map: impl Fn(u8) -> Option<u16>) -> BridgeResult<Vec<u16>> {
    let mut wide = reserve_units(bytes.len())?;
    for &b in bytes {
        match map(b) {
            Some(unit) => wide.push(unit),
            None => {
                debug!(target: "bridge", byte = b, "legacy_undefined_byte");
                return Ok(Vec::new());
            }
        }
    }
    Ok(wide)
}

fn cp1252(b: u8) -> Option<u16> {
    match b {
        0x80..=0x9F => match CP1252_HIGH[usize::from(b - 0x80)] {
            0 => None,
            unit => Some(unit),
        },
        _ => Some(u16::from(b)),
    }
}

/// Decode `bytes` encoded in `codepage` to UTF-16.
pub fn legacy_to_wide(bytes: &[u8], codepage: u32) -> BridgeResult<Vec<u16>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    match codepage {
        CP_UTF8 => utf8_to_wide(bytes),
        CP_US_ASCII => decode_single_byte(bytes, |b| b.is_ascii().then_some(u16::from(b))),
        CP_LATIN1 => decode_single_byte(bytes, |b| Some(u16::from(b))),
        CP_WINDOWS_1252 => decode_single_byte(bytes, cp1252),
        other => platform_to_wide(bytes, other),
    }
}

#[cfg(windows)]
fn platform_to_wide(bytes: &[u8], codepage: u32) -> BridgeResult<Vec<u16>> {
    use windows::Win32::Globalization::{MB_ERR_INVALID_CHARS, MultiByteToWideChar};

    // SAFETY: size query only; `bytes` is a valid slice and no output buffer
    // is passed.
    let needed = unsafe { MultiByteToWideChar(codepage, MB_ERR_INVALID_CHARS, bytes, None) };
    if needed <= 0 {
        debug!(target: "bridge", codepage, "legacy_conversion_failed");
        return Ok(Vec::new());
    }
    let mut wide = reserve_units(needed as usize)?;
    wide.resize(needed as usize, 0);
    // SAFETY: `wide` holds exactly the `needed` units reported above.
    let written =
        unsafe { MultiByteToWideChar(codepage, MB_ERR_INVALID_CHARS, bytes, Some(&mut wide)) };
    if written <= 0 {
        debug!(target: "bridge", codepage, "legacy_conversion_failed");
        return Ok(Vec::new());
    }
    wide.truncate(written as usize);
    Ok(wide)
}

#[cfg(not(windows))]
fn platform_to_wide(_bytes: &[u8], codepage: u32) -> BridgeResult<Vec<u16>> {
    debug!(target: "bridge", codepage, "legacy_codepage_unsupported");
    Ok(Vec::new())
}
