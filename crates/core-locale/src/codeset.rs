//! Mapping from POSIX code-set names to code page numbers.
//!
//! Locale names look like `language_TERRITORY.CODESET@modifier`. Only the
//! code-set part matters here; it is compared after stripping punctuation
//! and case so `UTF-8`, `utf8` and `Utf_8` are the same thing.

use crate::{CP_US_ASCII, CP_UTF8};

const CODESETS: &[(&str, u32)] = &[
    ("utf8", CP_UTF8),
    ("iso88591", 28591),
    ("iso885915", 28605),
    ("cp1252", 1252),
    ("windows1252", 1252),
    ("shiftjis", 932),
    ("sjis", 932),
    ("cp932", 932),
    ("eucjp", 20932),
    ("gbk", 936),
    ("gb2312", 936),
    ("gb18030", 54936),
    ("big5", 950),
    ("euckr", 51949),
    ("koi8r", 20866),
    ("ansix3.41968", CP_US_ASCII),
    ("ascii", CP_US_ASCII),
];

fn normalize(codeset: &str) -> String {
    codeset
        .chars()
        .filter(|c| !matches!(c, '-' | '_'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Extract the code-set part of a locale name, without any `@modifier`.
pub fn codeset_of(locale: &str) -> Option<&str> {
    let (_, rest) = locale.split_once('.')?;
    let codeset = rest.split('@').next().unwrap_or(rest);
    if codeset.is_empty() { None } else { Some(codeset) }
}

/// Code page number for a code-set name; `None` if unknown.
pub fn codepage_for_codeset(codeset: &str) -> Option<u32> {
    let key = normalize(codeset);
    CODESETS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, cp)| *cp)
}

/// Code page a locale name implies. `C`/`POSIX` and names without a known
/// code set fall back to US-ASCII.
pub fn codepage_for_locale(locale: &str) -> u32 {
    codeset_of(locale)
        .and_then(codepage_for_codeset)
        .unwrap_or(CP_US_ASCII)
}
