//! Primary multibyte service, keyed by numeric code page.
//!
//! This is the one place that knows which table backs a code page. Most
//! pages are served by `encoding_rs`; a few single-byte pages it does not
//! carry come from [`crate::tables`]. Callers only see the narrow
//! "platform" surface: maximum unit size, a lead-byte query, and
//! whole-unit conversion to and from UTF-16 that refuses to substitute.

use encoding_rs::{DecoderResult, EncoderResult, Encoding};

use crate::tables::{CP437_HIGH, CP850_HIGH, SingleByteTable};

const SHIFT_JIS_LEADS: &[(u8, u8)] = &[(0x81, 0x9F), (0xE0, 0xFC)];
const EUC_STYLE_LEADS: &[(u8, u8)] = &[(0x81, 0xFE)];

/// Why the service refused to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostEncodeError {
    /// The code page has no byte for the character; a best-effort service
    /// would have written its default character here
    DefaultCharUsed,
    InsufficientBuffer,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum HostCodePage {
    Builtin(SingleByteTable),
    Library {
        encoding: &'static Encoding,
        lead_bytes: &'static [(u8, u8)],
    },
}

impl HostCodePage {
    /// Look up the service entry for `codepage`.
    pub(crate) fn lookup(codepage: u32) -> Option<Self> {
        let library = |encoding: &'static Encoding| HostCodePage::Library {
            encoding,
            lead_bytes: &[],
        };
        let double_byte = |encoding: &'static Encoding, lead_bytes| HostCodePage::Library {
            encoding,
            lead_bytes,
        };

        let page = match codepage {
            20127 => HostCodePage::Builtin(SingleByteTable::Ascii),
            28591 => HostCodePage::Builtin(SingleByteTable::Latin1),
            437 => HostCodePage::Builtin(SingleByteTable::Oem(&CP437_HIGH)),
            850 => HostCodePage::Builtin(SingleByteTable::Oem(&CP850_HIGH)),

            866 => library(encoding_rs::IBM866),
            874 => library(encoding_rs::WINDOWS_874),
            1250 => library(encoding_rs::WINDOWS_1250),
            1251 => library(encoding_rs::WINDOWS_1251),
            1252 => library(encoding_rs::WINDOWS_1252),
            1253 => library(encoding_rs::WINDOWS_1253),
            1254 => library(encoding_rs::WINDOWS_1254),
            1255 => library(encoding_rs::WINDOWS_1255),
            1256 => library(encoding_rs::WINDOWS_1256),
            1257 => library(encoding_rs::WINDOWS_1257),
            1258 => library(encoding_rs::WINDOWS_1258),
            10000 => library(encoding_rs::MACINTOSH),
            10007 => library(encoding_rs::X_MAC_CYRILLIC),
            20866 => library(encoding_rs::KOI8_R),
            21866 => library(encoding_rs::KOI8_U),
            28592 => library(encoding_rs::ISO_8859_2),
            28593 => library(encoding_rs::ISO_8859_3),
            28594 => library(encoding_rs::ISO_8859_4),
            28595 => library(encoding_rs::ISO_8859_5),
            28596 => library(encoding_rs::ISO_8859_6),
            28597 => library(encoding_rs::ISO_8859_7),
            28598 => library(encoding_rs::ISO_8859_8),
            // Latin-5 is served by its Windows superset
            28599 => library(encoding_rs::WINDOWS_1254),
            28600 => library(encoding_rs::ISO_8859_10),
            28603 => library(encoding_rs::ISO_8859_13),
            28604 => library(encoding_rs::ISO_8859_14),
            28605 => library(encoding_rs::ISO_8859_15),
            28606 => library(encoding_rs::ISO_8859_16),

            932 => double_byte(encoding_rs::SHIFT_JIS, SHIFT_JIS_LEADS),
            936 => double_byte(encoding_rs::GBK, EUC_STYLE_LEADS),
            949 => double_byte(encoding_rs::EUC_KR, EUC_STYLE_LEADS),
            950 => double_byte(encoding_rs::BIG5, EUC_STYLE_LEADS),

            _ => return None,
        };
        Some(page)
    }

    /// Longest byte sequence for one character.
    pub(crate) fn max_char_size(&self) -> usize {
        match self {
            HostCodePage::Library { lead_bytes, .. } if !lead_bytes.is_empty() => 2,
            _ => 1,
        }
    }

    pub(crate) fn is_lead_byte(&self, byte: u8) -> bool {
        match self {
            HostCodePage::Builtin(_) => false,
            HostCodePage::Library { lead_bytes, .. } => lead_bytes
                .iter()
                .any(|&(low, high)| (low..=high).contains(&byte)),
        }
    }

    /// Convert exactly one complete unit to UTF-16. Returns the number of
    /// units written, or `None` when the bytes are not a valid character.
    ///
    /// A unit is only valid if this code page can encode its characters
    /// again. Extension rows a table decodes but never writes (HKSCS in
    /// Big5, for one) are refused. Duplicate codes for one character still
    /// decode, and encode back to the preferred code.
    pub(crate) fn to_wide(&self, bytes: &[u8], wide: &mut [u16]) -> Option<usize> {
        match self {
            HostCodePage::Builtin(table) => {
                let [byte] = bytes else { return None };
                let unit = table.decode(*byte)?;
                *wide.first_mut()? = unit;
                Some(1)
            }
            HostCodePage::Library { encoding, .. } => {
                let mut decoder = encoding.new_decoder_without_bom_handling();
                let (result, read, written) =
                    decoder.decode_to_utf16_without_replacement(bytes, wide, true);
                let written = match result {
                    DecoderResult::InputEmpty if read == bytes.len() && written > 0 => written,
                    _ => return None,
                };
                let mut back = [0u8; 8];
                self.from_wide(&wide[..written], &mut back).ok()?;
                Some(written)
            }
        }
    }

    /// Convert UTF-16 units to bytes without ever substituting a default
    /// character.
    pub(crate) fn from_wide(&self, wide: &[u16], bytes: &mut [u8]) -> Result<usize, HostEncodeError> {
        match self {
            HostCodePage::Builtin(table) => {
                if bytes.len() < wide.len() {
                    return Err(HostEncodeError::InsufficientBuffer);
                }
                for (slot, &unit) in bytes.iter_mut().zip(wide) {
                    *slot = table.encode(unit).ok_or(HostEncodeError::DefaultCharUsed)?;
                }
                Ok(wide.len())
            }
            HostCodePage::Library { encoding, .. } => {
                let mut encoder = encoding.new_encoder();
                let (result, _, written) =
                    encoder.encode_from_utf16_without_replacement(wide, bytes, true);
                match result {
                    EncoderResult::InputEmpty => Ok(written),
                    EncoderResult::Unmappable(_) => Err(HostEncodeError::DefaultCharUsed),
                    EncoderResult::OutputFull => Err(HostEncodeError::InsufficientBuffer),
                }
            }
        }
    }
}
