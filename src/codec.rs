//! Codec descriptors.
//!
//! A [`CodecDescriptor`] is one side of a conversion: it knows how long the
//! next unit is, how to turn it into UTF-16, how to turn UTF-16 back into
//! bytes, and how to return a stateful encoding to its initial state. The
//! family is a closed enum, so adding an encoding family means adding a
//! variant and letting the compiler point at every match that needs it.

use std::fmt;
use std::ops::RangeInclusive;

use crate::alias::EncodingSpec;
use crate::compat::{self, CompatEntry};
use crate::config::Options;
use crate::host::{HostCodePage, HostEncodeError};
use crate::inet;
use crate::iso2022jp::{Iso2022Jp, Iso2022State, KanaPolicy};
use crate::unicode::{self, Endian};
use crate::{CodePage, Error, Result};

/// Maximum number of bytes a single encoded unit may occupy.
pub const MB_CHAR_MAX: usize = 16;

const MAX_UNITS: usize = 4;

/// UTF-16 code units produced by decoding one unit of input.
///
/// Usually one unit, two for a surrogate pair, and occasionally a base
/// character plus a combining mark for legacy sequences that map to two
/// code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Utf16Units {
    buf: [u16; MAX_UNITS],
    len: usize,
}

impl Utf16Units {
    /// Empty sequence, as produced by escape sequences
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence holding one unit
    pub fn from_unit(unit: u16) -> Self {
        let mut units = Self::new();
        units.push(unit);
        units
    }

    pub(crate) fn from_slice(slice: &[u16]) -> Self {
        let mut units = Self::new();
        for &unit in slice {
            units.push(unit);
        }
        units
    }

    pub(crate) fn push(&mut self, unit: u16) {
        debug_assert!(self.len < MAX_UNITS);
        self.buf[self.len] = unit;
        self.len += 1;
    }

    /// View as a slice
    pub fn as_slice(&self) -> &[u16] {
        &self.buf[..self.len]
    }

    /// True for escape-only units
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The unit, if exactly one BMP unit was produced.
    pub fn single(&self) -> Option<u16> {
        match self.as_slice() {
            [unit] if !unicode::is_high_surrogate(*unit) && !unicode::is_low_surrogate(*unit) => Some(*unit),
            _ => None,
        }
    }
}

/// Result of decoding one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Bytes of input the unit occupied
    pub consumed: usize,
    /// Resulting UTF-16 code units; empty for designators and shifts
    pub units: Utf16Units,
}

impl Decoded {
    pub(crate) fn empty(consumed: usize) -> Self {
        Self {
            consumed,
            units: Utf16Units::new(),
        }
    }
}

/// Decode failure for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The unit continues past the end of the input
    Incomplete,
    /// The bytes are not a valid unit
    Invalid,
}

/// Encode failure for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The destination has no representation for a character
    Unmappable,
    /// The output buffer cannot hold the unit
    OutputFull,
}

/// Snapshot of a descriptor's conversion state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Stateless encodings
    Neutral,
    /// Designated set of an ISO-2022-JP stream
    Iso2022(Iso2022State),
}

/// Codec family, as reported for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FamilyKind {
    /// One byte per character
    SingleByte,
    /// Lead byte plus trail byte, from the primary service
    HostDoubleByte,
    /// UTF-8
    Utf8,
    /// UTF-16 of either byte order
    Utf16,
    /// UTF-32 of either byte order
    Utf32,
    /// EUC-JP through the secondary service
    SecondaryDoubleByte,
    /// Stateful ISO-2022-JP
    Iso2022Jp,
}

impl fmt::Display for FamilyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FamilyKind::SingleByte => "single-byte",
            FamilyKind::HostDoubleByte => "double-byte",
            FamilyKind::Utf8 => "UTF-8",
            FamilyKind::Utf16 => "UTF-16",
            FamilyKind::Utf32 => "UTF-32",
            FamilyKind::SecondaryDoubleByte => "EUC (secondary service)",
            FamilyKind::Iso2022Jp => "ISO-2022-JP (stateful)",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Family {
    SingleByte(HostCodePage),
    HostDoubleByte(HostCodePage),
    Utf8 { legacy: bool },
    Utf16(Endian),
    Utf32(Endian),
    SecondaryDoubleByte,
    Iso2022Jp(Iso2022Jp),
}

/// Whether a code page has a built-in codec.
pub fn is_supported(codepage: CodePage) -> bool {
    let n = codepage.number();
    matches!(n, 65001 | 1200 | 1201 | 12000 | 12001)
        || inet::is_supported(n)
        || KanaPolicy::for_codepage(n).is_some()
        || HostCodePage::lookup(n).is_some()
}

/// One side of a conversion session.
#[derive(Debug, Clone)]
pub struct CodecDescriptor {
    codepage: CodePage,
    family: Family,
    compat: Option<&'static [CompatEntry]>,
}

impl CodecDescriptor {
    /// Build the descriptor for a parsed encoding name.
    pub fn new(spec: &EncodingSpec, options: &Options) -> Result<Self> {
        let codepage = spec.codepage();
        let n = codepage.number();
        let family = match n {
            65001 => Family::Utf8 {
                legacy: options.legacy_utf8,
            },
            1200 => Family::Utf16(Endian::Little),
            1201 => Family::Utf16(Endian::Big),
            12000 => Family::Utf32(Endian::Little),
            12001 => Family::Utf32(Endian::Big),
            _ if inet::is_supported(n) => Family::SecondaryDoubleByte,
            _ => {
                if let Some(policy) = KanaPolicy::for_codepage(n) {
                    Family::Iso2022Jp(Iso2022Jp::new(policy))
                } else {
                    match HostCodePage::lookup(n) {
                        Some(page) if page.max_char_size() == 1 => Family::SingleByte(page),
                        Some(page) => Family::HostDoubleByte(page),
                        None => {
                            return Err(Error::UnknownEncoding {
                                name: spec.name().to_string(),
                            });
                        }
                    }
                }
            }
        };

        let compat = if spec.compat() {
            compat::table_for(n)
        } else {
            None
        };

        Ok(Self {
            codepage,
            family,
            compat,
        })
    }

    /// Code page this descriptor converts.
    pub fn codepage(&self) -> CodePage {
        self.codepage
    }

    /// Family of the codec.
    pub fn family(&self) -> FamilyKind {
        match self.family {
            Family::SingleByte(_) => FamilyKind::SingleByte,
            Family::HostDoubleByte(_) => FamilyKind::HostDoubleByte,
            Family::Utf8 { .. } => FamilyKind::Utf8,
            Family::Utf16(_) => FamilyKind::Utf16,
            Family::Utf32(_) => FamilyKind::Utf32,
            Family::SecondaryDoubleByte => FamilyKind::SecondaryDoubleByte,
            Family::Iso2022Jp(_) => FamilyKind::Iso2022Jp,
        }
    }

    /// Compatibility table in effect, if any.
    pub fn compat_table(&self) -> Option<&'static [CompatEntry]> {
        self.compat
    }

    /// Expected byte length of the next unit in `bytes`.
    ///
    /// `bytes` must not be empty. The length may exceed `bytes.len()`; that
    /// is how a unit split across buffers is detected.
    pub fn probe_length(&self, bytes: &[u8]) -> std::result::Result<usize, DecodeError> {
        let lead = *bytes.first().ok_or(DecodeError::Incomplete)?;
        match &self.family {
            Family::SingleByte(_) => Ok(1),
            Family::HostDoubleByte(page) => Ok(if page.is_lead_byte(lead) { 2 } else { 1 }),
            Family::Utf8 { legacy } => unicode::utf8_sequence_length(lead, *legacy).ok_or(DecodeError::Invalid),
            Family::Utf16(endian) => unicode::utf16_sequence_length(bytes, *endian),
            Family::Utf32(_) => Ok(4),
            Family::SecondaryDoubleByte => euc_jp_length(bytes),
            Family::Iso2022Jp(codec) => Ok(codec.probe_length(bytes)),
        }
    }

    /// Decode the next unit of `bytes`.
    ///
    /// Units the same code page could not encode again are rejected as
    /// invalid, so every accepted unit survives a conversion back into this
    /// encoding.
    pub fn decode(&mut self, bytes: &[u8]) -> std::result::Result<Decoded, DecodeError> {
        let len = self.probe_length(bytes)?;
        match &mut self.family {
            Family::Utf8 { legacy } => unicode::decode_utf8(bytes, *legacy),
            Family::Utf16(endian) => unicode::decode_utf16(bytes, *endian),
            Family::Utf32(endian) => unicode::decode_utf32(bytes, *endian),
            Family::Iso2022Jp(codec) => codec.decode(bytes),
            Family::SingleByte(page) | Family::HostDoubleByte(page) => {
                let unit = bytes.get(..len).ok_or(DecodeError::Incomplete)?;
                let mut wide = [0u16; MAX_UNITS * 2];
                let written = page.to_wide(unit, &mut wide).ok_or(DecodeError::Invalid)?;
                to_decoded(len, &wide[..written])
            }
            Family::SecondaryDoubleByte => {
                let unit = bytes.get(..len).ok_or(DecodeError::Incomplete)?;
                let mut wide = [0u16; MAX_UNITS * 2];
                let written = inet::multibyte_to_unicode(self.codepage.number(), unit, &mut wide)
                    .map_err(|_| DecodeError::Invalid)?;
                to_decoded(len, &wide[..written])
            }
        }
    }

    /// Encode one decoded unit into `out`.
    pub fn encode(&mut self, units: &[u16], out: &mut [u8]) -> std::result::Result<usize, EncodeError> {
        match &mut self.family {
            Family::SingleByte(page) | Family::HostDoubleByte(page) => {
                page.from_wide(units, out).map_err(|e| match e {
                    HostEncodeError::DefaultCharUsed => EncodeError::Unmappable,
                    HostEncodeError::InsufficientBuffer => EncodeError::OutputFull,
                })
            }
            Family::Utf8 { .. } => unicode::encode_utf8(units, out),
            Family::Utf16(endian) => unicode::encode_utf16(units, *endian, out),
            Family::Utf32(endian) => unicode::encode_utf32(units, *endian, out),
            Family::SecondaryDoubleByte => {
                let mut bytes = [0u8; MB_CHAR_MAX];
                let written = inet::unicode_to_multibyte(self.codepage.number(), units, &mut bytes)
                    .map_err(|_| EncodeError::Unmappable)?;
                let slot = out.get_mut(..written).ok_or(EncodeError::OutputFull)?;
                slot.copy_from_slice(&bytes[..written]);
                Ok(written)
            }
            Family::Iso2022Jp(codec) => codec.encode(units, out),
        }
    }

    /// Emit the bytes that return the encoder to its initial state.
    pub fn flush(&mut self, out: &mut [u8]) -> std::result::Result<usize, EncodeError> {
        match &mut self.family {
            Family::Iso2022Jp(codec) => codec.flush(out),
            _ => Ok(0),
        }
    }

    /// Current conversion state.
    pub fn mode(&self) -> Mode {
        match &self.family {
            Family::Iso2022Jp(codec) => Mode::Iso2022(codec.state()),
            _ => Mode::Neutral,
        }
    }

    /// Put back a state previously returned by [`mode`](Self::mode).
    pub fn restore_mode(&mut self, mode: Mode) {
        if let (Family::Iso2022Jp(codec), Mode::Iso2022(state)) = (&mut self.family, mode) {
            codec.set_state(state);
        }
    }

    /// Return to the initial state without emitting anything.
    pub fn reset(&mut self) {
        if let Family::Iso2022Jp(codec) = &mut self.family {
            *codec = Iso2022Jp::new(codec.policy());
        }
    }
}

fn to_decoded(consumed: usize, wide: &[u16]) -> std::result::Result<Decoded, DecodeError> {
    if wide.is_empty() || wide.len() > MAX_UNITS {
        return Err(DecodeError::Invalid);
    }
    Ok(Decoded {
        consumed,
        units: Utf16Units::from_slice(wide),
    })
}

/// EUC-JP unit length, validating the ranges of every byte present.
fn euc_jp_length(bytes: &[u8]) -> std::result::Result<usize, DecodeError> {
    const GR: RangeInclusive<u8> = 0xA1..=0xFE;

    let (len, trail) = match bytes[0] {
        0x00..=0x7F => return Ok(1),
        // JIS X 0201 katakana
        0x8E => (2, 0xA1..=0xDF),
        // JIS X 0212
        0x8F => (3, GR),
        b if GR.contains(&b) => (2, GR),
        _ => return Err(DecodeError::Invalid),
    };
    if bytes.iter().take(len).skip(1).any(|b| !trail.contains(b)) {
        return Err(DecodeError::Invalid);
    }
    if bytes.len() < len {
        return Err(DecodeError::Incomplete);
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias;

    fn descriptor(name: &str) -> CodecDescriptor {
        CodecDescriptor::new(&alias::parse(name).unwrap(), &Options::default()).unwrap()
    }

    #[test]
    fn test_family_selection() {
        assert_eq!(descriptor("UTF-8").family(), FamilyKind::Utf8);
        assert_eq!(descriptor("UTF-16").family(), FamilyKind::Utf16);
        assert_eq!(descriptor("UTF-32BE").family(), FamilyKind::Utf32);
        assert_eq!(descriptor("ASCII").family(), FamilyKind::SingleByte);
        assert_eq!(descriptor("CP1252").family(), FamilyKind::SingleByte);
        assert_eq!(descriptor("SHIFT_JIS").family(), FamilyKind::HostDoubleByte);
        assert_eq!(descriptor("EUC-JP").family(), FamilyKind::SecondaryDoubleByte);
        assert_eq!(descriptor("ISO-2022-JP").family(), FamilyKind::Iso2022Jp);
    }

    #[test]
    fn test_unsupported_number_is_unknown() {
        let spec = alias::parse("CP12345").unwrap();
        assert_eq!(
            CodecDescriptor::new(&spec, &Options::default()).unwrap_err(),
            Error::UnknownEncoding {
                name: "CP12345".to_string()
            }
        );
    }

    #[test]
    fn test_compat_table_attachment() {
        assert!(descriptor("CP932").compat_table().is_some());
        assert!(descriptor("CP932//nocompat").compat_table().is_none());
        assert!(descriptor("ISO-2022-JP-STRICT").compat_table().is_none());
        assert!(descriptor("UTF-8").compat_table().is_none());
    }

    #[test]
    fn test_probe_lengths() {
        let sjis = descriptor("CP932");
        assert_eq!(sjis.probe_length(&[0x82]), Ok(2));
        assert_eq!(sjis.probe_length(&[0xB1]), Ok(1));

        let utf8 = descriptor("UTF-8");
        assert_eq!(utf8.probe_length(&[0xE3]), Ok(3));
        assert_eq!(utf8.probe_length(&[0xBF]), Err(DecodeError::Invalid));

        let utf16 = descriptor("UTF-16BE");
        assert_eq!(utf16.probe_length(&[0xD8, 0x00]), Ok(4));
        assert_eq!(utf16.probe_length(&[0x30, 0x42]), Ok(2));
    }

    #[test]
    fn test_euc_jp_lengths() {
        assert_eq!(euc_jp_length(b"A"), Ok(1));
        assert_eq!(euc_jp_length(&[0xA4, 0xA2]), Ok(2));
        assert_eq!(euc_jp_length(&[0x8E, 0xB1]), Ok(2));
        assert_eq!(euc_jp_length(&[0x8F, 0xB0, 0xA1]), Ok(3));
        assert_eq!(euc_jp_length(&[0xA4]), Err(DecodeError::Incomplete));
        assert_eq!(euc_jp_length(&[0x8F, 0xB0]), Err(DecodeError::Incomplete));
        assert_eq!(euc_jp_length(&[0x8E, 0xE0]), Err(DecodeError::Invalid));
        assert_eq!(euc_jp_length(&[0xFF, 0xFF]), Err(DecodeError::Invalid));
        assert_eq!(euc_jp_length(&[0xA4, 0x41]), Err(DecodeError::Invalid));
    }

    #[test]
    fn test_decode_consumes_measured_length() {
        let cases: [(&str, &[u8]); 5] = [
            ("CP932", &[0x82, 0xA0, b'x']),
            ("CP932", &[0xB1, 0x82]),
            ("EUC-JP", &[0x8E, 0xB1, 0xA4]),
            ("UTF-16BE", &[0xD8, 0x3D, 0xDE, 0x00]),
            ("ISO-2022-JP", b"\x1b$Bx"),
        ];
        for (name, bytes) in cases {
            let mut codec = descriptor(name);
            let expected = codec.probe_length(bytes).unwrap();
            assert_eq!(codec.decode(bytes).unwrap().consumed, expected, "{name}");
        }
    }

    #[test]
    fn test_euc_jp_jis0212_measured_but_rejected() {
        let mut euc = descriptor("EUC-JP");
        assert_eq!(euc.probe_length(&[0x8F, 0xB0, 0xA1]), Ok(3));
        assert_eq!(euc.decode(&[0x8F, 0xB0]), Err(DecodeError::Incomplete));
        assert_eq!(euc.decode(&[0x8F, 0xB0, 0xA1]), Err(DecodeError::Invalid));
    }

    #[test]
    fn test_decode_and_encode_host_double_byte() {
        let mut sjis = descriptor("CP932");
        let decoded = sjis.decode(&[0x82, 0xA0, b'x']).unwrap();
        assert_eq!(decoded.consumed, 2);
        assert_eq!(decoded.units.as_slice(), &[0x3042]);
        assert_eq!(sjis.decode(&[0x82]), Err(DecodeError::Incomplete));

        let mut out = [0u8; MB_CHAR_MAX];
        assert_eq!(sjis.encode(&[0x3042], &mut out), Ok(2));
        assert_eq!(&out[..2], &[0x82, 0xA0]);
        assert_eq!(sjis.encode(&[0x0E01], &mut out), Err(EncodeError::Unmappable));
    }

    #[test]
    fn test_euc_jp_decode_and_encode() {
        let mut euc = descriptor("EUC-JP");
        let decoded = euc.decode(&[0x8E, 0xB1]).unwrap();
        assert_eq!(decoded.units.as_slice(), &[0xFF71]);

        let mut out = [0u8; MB_CHAR_MAX];
        assert_eq!(euc.encode(&[0x3042], &mut out), Ok(2));
        assert_eq!(&out[..2], &[0xA4, 0xA2]);
        assert_eq!(euc.encode(&[0x3042], &mut out[..1]), Err(EncodeError::OutputFull));
    }

    #[test]
    fn test_mode_snapshot_and_reset() {
        let mut jis = descriptor("ISO-2022-JP");
        assert_eq!(jis.mode(), Mode::Iso2022(Iso2022State::Ascii));

        let before = jis.mode();
        let mut out = [0u8; MB_CHAR_MAX];
        jis.encode(&[0x3042], &mut out).unwrap();
        assert_eq!(jis.mode(), Mode::Iso2022(Iso2022State::Jis0208));

        jis.restore_mode(before);
        assert_eq!(jis.mode(), before);

        jis.encode(&[0x3042], &mut out).unwrap();
        jis.reset();
        assert_eq!(jis.mode(), Mode::Iso2022(Iso2022State::Ascii));

        assert_eq!(descriptor("UTF-8").mode(), Mode::Neutral);
    }

    #[test]
    fn test_supported_code_pages() {
        assert!(is_supported(CodePage::UTF8));
        assert!(is_supported(CodePage::new(50222)));
        assert!(is_supported(CodePage::new(437)));
        assert!(!is_supported(CodePage::new(37)));
    }
}
