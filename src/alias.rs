//! Encoding name resolution.
//!
//! A name is either numeric (`CP1252`, `1252`) or one of the historical
//! aliases below. Lookup is case-insensitive and many-to-one; the first
//! alias listed for a code page is its preferred display name.

use tracing::debug;

use crate::{CodePage, Error, Result};

static ALIASES: &[(u32, &str)] = &[
    // Unicode
    (65001, "UTF-8"),
    (65001, "UTF8"),
    (1200, "UTF-16LE"),
    (1200, "UTF16LE"),
    (1200, "UTF-16"),
    (1200, "UTF16"),
    (1200, "UNICODELITTLE"),
    (1201, "UTF-16BE"),
    (1201, "UTF16BE"),
    (1201, "UNICODEBIG"),
    (12000, "UTF-32LE"),
    (12000, "UTF32LE"),
    (12000, "UTF-32"),
    (12000, "UTF32"),
    (12000, "UCS-4LE"),
    (12001, "UTF-32BE"),
    (12001, "UTF32BE"),
    (12001, "UCS-4BE"),
    // ASCII
    (20127, "US-ASCII"),
    (20127, "ASCII"),
    (20127, "ANSI_X3.4-1968"),
    (20127, "ANSI_X3.4-1986"),
    (20127, "IBM367"),
    (20127, "ISO-IR-6"),
    (20127, "ISO646-US"),
    (20127, "ISO_646.IRV:1991"),
    (20127, "US"),
    (20127, "CSASCII"),
    // ISO-8859
    (28591, "ISO-8859-1"),
    (28591, "ISO8859-1"),
    (28591, "ISO_8859-1"),
    (28591, "ISO_8859-1:1987"),
    (28591, "ISO-IR-100"),
    (28591, "IBM819"),
    (28591, "LATIN1"),
    (28591, "L1"),
    (28591, "CSISOLATIN1"),
    (28592, "ISO-8859-2"),
    (28592, "ISO8859-2"),
    (28592, "ISO_8859-2"),
    (28592, "ISO_8859-2:1987"),
    (28592, "ISO-IR-101"),
    (28592, "LATIN2"),
    (28592, "L2"),
    (28592, "CSISOLATIN2"),
    (28593, "ISO-8859-3"),
    (28593, "ISO8859-3"),
    (28593, "ISO_8859-3"),
    (28593, "ISO_8859-3:1988"),
    (28593, "ISO-IR-109"),
    (28593, "LATIN3"),
    (28593, "L3"),
    (28593, "CSISOLATIN3"),
    (28594, "ISO-8859-4"),
    (28594, "ISO8859-4"),
    (28594, "ISO_8859-4"),
    (28594, "ISO_8859-4:1988"),
    (28594, "ISO-IR-110"),
    (28594, "LATIN4"),
    (28594, "L4"),
    (28594, "CSISOLATIN4"),
    (28595, "ISO-8859-5"),
    (28595, "ISO8859-5"),
    (28595, "ISO_8859-5"),
    (28595, "ISO_8859-5:1988"),
    (28595, "ISO-IR-144"),
    (28595, "CYRILLIC"),
    (28595, "CSISOLATINCYRILLIC"),
    (28596, "ISO-8859-6"),
    (28596, "ISO8859-6"),
    (28596, "ISO_8859-6"),
    (28596, "ISO_8859-6:1987"),
    (28596, "ISO-IR-127"),
    (28596, "ARABIC"),
    (28596, "ASMO-708"),
    (28596, "ECMA-114"),
    (28596, "CSISOLATINARABIC"),
    (28597, "ISO-8859-7"),
    (28597, "ISO8859-7"),
    (28597, "ISO_8859-7"),
    (28597, "ISO_8859-7:1987"),
    (28597, "ISO-IR-126"),
    (28597, "ECMA-118"),
    (28597, "ELOT_928"),
    (28597, "GREEK"),
    (28597, "GREEK8"),
    (28597, "CSISOLATINGREEK"),
    (28598, "ISO-8859-8"),
    (28598, "ISO8859-8"),
    (28598, "ISO_8859-8"),
    (28598, "ISO_8859-8:1988"),
    (28598, "ISO-IR-138"),
    (28598, "HEBREW"),
    (28598, "CSISOLATINHEBREW"),
    (28599, "ISO-8859-9"),
    (28599, "ISO8859-9"),
    (28599, "ISO_8859-9"),
    (28599, "ISO_8859-9:1989"),
    (28599, "ISO-IR-148"),
    (28599, "LATIN5"),
    (28599, "L5"),
    (28599, "CSISOLATIN5"),
    (28600, "ISO-8859-10"),
    (28600, "ISO8859-10"),
    (28600, "ISO_8859-10"),
    (28600, "ISO_8859-10:1992"),
    (28600, "ISO-IR-157"),
    (28600, "LATIN6"),
    (28600, "L6"),
    (28600, "CSISOLATIN6"),
    (28603, "ISO-8859-13"),
    (28603, "ISO8859-13"),
    (28603, "ISO_8859-13"),
    (28603, "ISO-IR-179"),
    (28603, "LATIN7"),
    (28603, "L7"),
    (28604, "ISO-8859-14"),
    (28604, "ISO8859-14"),
    (28604, "ISO_8859-14"),
    (28604, "ISO_8859-14:1998"),
    (28604, "ISO-IR-199"),
    (28604, "ISO-CELTIC"),
    (28604, "LATIN8"),
    (28604, "L8"),
    (28605, "ISO-8859-15"),
    (28605, "ISO8859-15"),
    (28605, "ISO_8859-15"),
    (28605, "ISO_8859-15:1998"),
    (28605, "ISO-IR-203"),
    (28605, "LATIN-9"),
    (28605, "LATIN9"),
    (28606, "ISO-8859-16"),
    (28606, "ISO8859-16"),
    (28606, "ISO_8859-16"),
    (28606, "ISO_8859-16:2001"),
    (28606, "ISO-IR-226"),
    (28606, "LATIN10"),
    (28606, "L10"),
    // Windows
    (874, "WINDOWS-874"),
    (874, "TIS-620"),
    (874, "ISO-8859-11"),
    (1250, "WINDOWS-1250"),
    (1250, "MS-EE"),
    (1251, "WINDOWS-1251"),
    (1251, "MS-CYRL"),
    (1252, "WINDOWS-1252"),
    (1252, "MS-ANSI"),
    (1253, "WINDOWS-1253"),
    (1253, "MS-GREEK"),
    (1254, "WINDOWS-1254"),
    (1254, "MS-TURK"),
    (1255, "WINDOWS-1255"),
    (1255, "MS-HEBR"),
    (1256, "WINDOWS-1256"),
    (1256, "MS-ARAB"),
    (1257, "WINDOWS-1257"),
    (1257, "WINBALTRIM"),
    (1258, "WINDOWS-1258"),
    // DOS, KOI8, Macintosh
    (437, "IBM437"),
    (437, "CSPC8CODEPAGE437"),
    (850, "IBM850"),
    (850, "CSPC850MULTILINGUAL"),
    (866, "IBM866"),
    (866, "CSIBM866"),
    (20866, "KOI8-R"),
    (20866, "CSKOI8R"),
    (21866, "KOI8-U"),
    (21866, "KOI8-RU"),
    (10000, "MACINTOSH"),
    (10000, "MACROMAN"),
    (10000, "MAC"),
    (10000, "CSMACINTOSH"),
    (10007, "MACCYRILLIC"),
    (10007, "X-MAC-CYRILLIC"),
    // Japanese
    (932, "SHIFT_JIS"),
    (932, "SHIFT-JIS"),
    (932, "SJIS"),
    (932, "MS_KANJI"),
    (932, "CSSHIFTJIS"),
    (932, "MS932"),
    (932, "WINDOWS-31J"),
    (932, "CSWINDOWS31J"),
    (932, "WINDOWS-932"),
    (932, "SJIS-OPEN"),
    (932, "SJIS-WIN"),
    (932, "SJIS-MS"),
    (51932, "EUC-JP"),
    (51932, "EUCJP"),
    (51932, "EUC_JP"),
    (51932, "MS51932"),
    (51932, "WINDOWS-51932"),
    (51932, "CSEUCPKDFMTJAPANESE"),
    (50220, "ISO-2022-JP-STRICT"),
    (50220, "MS50220"),
    (50220, "WINDOWS-50220"),
    (50221, "ISO-2022-JP"),
    (50221, "CSISO2022JP"),
    (50221, "MS50221"),
    (50221, "WINDOWS-50221"),
    (50222, "ISO-2022-JP-MS"),
    (50222, "MS50222"),
    (50222, "WINDOWS-50222"),
    // Chinese and Korean
    (936, "GBK"),
    (936, "MS936"),
    (936, "WINDOWS-936"),
    (936, "GB2312"),
    (936, "EUC-CN"),
    (936, "EUCCN"),
    (936, "CHINESE"),
    (936, "CSGB2312"),
    (950, "BIG5"),
    (950, "BIG-5"),
    (950, "BIG-FIVE"),
    (950, "BIGFIVE"),
    (950, "CN-BIG5"),
    (950, "CSBIG5"),
    (950, "MS950"),
    (949, "EUC-KR"),
    (949, "EUCKR"),
    (949, "UHC"),
    (949, "KS_C_5601-1987"),
    (949, "KOREAN"),
    (949, "CSEUCKR"),
];

/// A parsed `name//option` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingSpec {
    name: String,
    codepage: CodePage,
    compat: bool,
}

impl EncodingSpec {
    /// The name as given, without options.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved code page.
    pub fn codepage(&self) -> CodePage {
        self.codepage
    }

    /// False when `//nocompat` was given.
    pub fn compat(&self) -> bool {
        self.compat
    }
}

/// Parse a full encoding name, including `//` options.
pub fn parse(full_name: &str) -> Result<EncodingSpec> {
    let mut parts = full_name.split("//");
    let name = parts.next().unwrap_or_default();
    let mut compat = true;
    for option in parts {
        if option.eq_ignore_ascii_case("nocompat") {
            compat = false;
        } else {
            debug!(name, option, "ignoring unsupported encoding option");
        }
    }

    Ok(EncodingSpec {
        name: name.to_string(),
        codepage: resolve(name)?,
        compat,
    })
}

/// Resolve a bare encoding name to its code page.
///
/// Numeric names are returned as-is; whether the number is a supported code
/// page is decided when a codec is built for it.
pub fn resolve(name: &str) -> Result<CodePage> {
    if let Some(number) = parse_numeric(name) {
        return Ok(CodePage::new(number));
    }
    ALIASES
        .iter()
        .find(|(_, alias)| alias.eq_ignore_ascii_case(name))
        .map(|&(number, _)| CodePage::new(number))
        .ok_or_else(|| Error::UnknownEncoding {
            name: name.to_string(),
        })
}

fn parse_numeric(name: &str) -> Option<u32> {
    let digits = match name.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("CP") => &name[2..],
        _ => name,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Preferred display name of a code page, if it has an alias.
pub fn preferred_name(codepage: CodePage) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|&&(number, _)| number == codepage.number())
        .map(|&(_, alias)| alias)
}

/// Every alias the resolver accepts, in table order.
pub fn list_supported_names() -> Vec<&'static str> {
    ALIASES.iter().map(|&(_, alias)| alias).collect()
}

/// Every alias paired with its code page.
pub fn aliases() -> impl Iterator<Item = (CodePage, &'static str)> {
    ALIASES.iter().map(|&(number, alias)| (CodePage::new(number), alias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_is_uppercase_and_unique() {
        let mut seen = HashSet::new();
        for &(_, alias) in ALIASES {
            assert_eq!(alias, alias.to_ascii_uppercase(), "{alias} is not uppercase");
            assert!(seen.insert(alias), "{alias} listed twice");
            assert!(parse_numeric(alias).is_none(), "{alias} shadows the numeric form");
        }
    }

    #[test]
    fn test_every_alias_is_supported() {
        for (codepage, alias) in aliases() {
            assert!(crate::codec::is_supported(codepage), "{alias} -> {codepage}");
        }
    }

    #[test]
    fn test_numeric_forms() {
        assert_eq!(resolve("CP932").unwrap(), CodePage::new(932));
        assert_eq!(resolve("cp1252").unwrap(), CodePage::new(1252));
        assert_eq!(resolve("65001").unwrap(), CodePage::UTF8);
        // Numbers resolve even when no codec exists for them
        assert_eq!(resolve("CP12345").unwrap(), CodePage::new(12345));
        assert!(resolve("CP").is_err());
        assert!(resolve("CP-1252").is_err());
    }

    #[test]
    fn test_aliases_case_insensitive() {
        assert_eq!(resolve("utf-8").unwrap(), CodePage::UTF8);
        assert_eq!(resolve("Shift_JIS").unwrap(), CodePage::new(932));
        assert_eq!(resolve("euc-jp").unwrap(), CodePage::new(51932));
        assert_eq!(resolve("iso-2022-jp").unwrap(), CodePage::new(50221));
        assert_eq!(resolve("Latin1").unwrap(), CodePage::new(28591));
    }

    #[test]
    fn test_unmarked_unicode_defaults_to_little_endian() {
        assert_eq!(resolve("UTF-16").unwrap(), resolve("UTF-16LE").unwrap());
        assert_eq!(resolve("UTF-32").unwrap(), resolve("UTF-32LE").unwrap());
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            resolve("NOT-A-REAL-ENCODING").unwrap_err(),
            Error::UnknownEncoding {
                name: "NOT-A-REAL-ENCODING".to_string()
            }
        );
    }

    #[test]
    fn test_resolution_is_stable() {
        for name in list_supported_names() {
            assert_eq!(resolve(name).unwrap(), resolve(name).unwrap());
        }
    }

    #[test]
    fn test_options() {
        let spec = parse("cp932//NoCompat").unwrap();
        assert_eq!(spec.codepage(), CodePage::new(932));
        assert_eq!(spec.name(), "cp932");
        assert!(!spec.compat());

        let spec = parse("UTF-8//TRANSLIT").unwrap();
        assert!(spec.compat());
        assert!(parse("BOGUS//nocompat").is_err());
    }

    #[test]
    fn test_preferred_names() {
        assert_eq!(preferred_name(CodePage::UTF8), Some("UTF-8"));
        assert_eq!(preferred_name(CodePage::new(932)), Some("SHIFT_JIS"));
        assert_eq!(preferred_name(CodePage::new(1)), None);
    }
}
