//! Secondary "internet string" conversion service.
//!
//! The primary service in [`crate::host`] cannot address EUC-JP, so that
//! code page goes through this narrower entry point instead. The same
//! service also resolves JIS X 0208 row/cell pairs for the ISO-2022-JP
//! codec, which carries those characters as EUC-JP bytes with the high bit
//! cleared.

use encoding_rs::{DecoderResult, EncoderResult, EUC_JP};

/// Code page number of EUC-JP.
pub(crate) const EUC_JP_CODEPAGE: u32 = 51932;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InetError {
    Unsupported,
    Invalid,
}

pub(crate) fn is_supported(codepage: u32) -> bool {
    codepage == EUC_JP_CODEPAGE
}

/// EUC-JP lead byte of the three-byte JIS X 0212 form.
const SS3: u8 = 0x8F;

/// Decode one complete unit.
///
/// JIS X 0212 units are measured by the caller but refused here: the code
/// page cannot encode them, so accepting them would break the round trip.
/// Any other unit must encode back through the same service.
pub(crate) fn multibyte_to_unicode(codepage: u32, bytes: &[u8], wide: &mut [u16]) -> Result<usize, InetError> {
    if !is_supported(codepage) {
        return Err(InetError::Unsupported);
    }
    if bytes.first() == Some(&SS3) {
        return Err(InetError::Invalid);
    }
    let mut decoder = EUC_JP.new_decoder_without_bom_handling();
    let written = match decoder.decode_to_utf16_without_replacement(bytes, wide, true) {
        (DecoderResult::InputEmpty, read, written) if read == bytes.len() && written > 0 => written,
        _ => return Err(InetError::Invalid),
    };
    let mut back = [0u8; 8];
    unicode_to_multibyte(codepage, &wide[..written], &mut back)?;
    Ok(written)
}

pub(crate) fn unicode_to_multibyte(codepage: u32, wide: &[u16], bytes: &mut [u8]) -> Result<usize, InetError> {
    if !is_supported(codepage) {
        return Err(InetError::Unsupported);
    }
    let mut encoder = EUC_JP.new_encoder();
    match encoder.encode_from_utf16_without_replacement(wide, bytes, true) {
        (EncoderResult::InputEmpty, _, written) => Ok(written),
        _ => Err(InetError::Invalid),
    }
}

/// Resolve a JIS X 0208 row/cell pair (both in `0x21..=0x7E`).
pub(crate) fn jis0208_to_unicode(row: u8, cell: u8, wide: &mut [u16]) -> Option<usize> {
    multibyte_to_unicode(EUC_JP_CODEPAGE, &[row | 0x80, cell | 0x80], wide).ok()
}

/// Find the JIS X 0208 row/cell pair for one character, if the set has it.
pub(crate) fn unicode_to_jis0208(wide: &[u16]) -> Option<[u8; 2]> {
    let mut bytes = [0u8; 8];
    match unicode_to_multibyte(EUC_JP_CODEPAGE, wide, &mut bytes) {
        Ok(2) if (0xA1..=0xFE).contains(&bytes[0]) && (0xA1..=0xFE).contains(&bytes[1]) => {
            Some([bytes[0] & 0x7F, bytes[1] & 0x7F])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euc_jp_round_trip() {
        let mut wide = [0u16; 4];
        assert_eq!(multibyte_to_unicode(51932, &[0xA4, 0xA2], &mut wide), Ok(1));
        assert_eq!(wide[0], 0x3042);

        let mut bytes = [0u8; 8];
        assert_eq!(unicode_to_multibyte(51932, &[0x3042], &mut bytes), Ok(2));
        assert_eq!(&bytes[..2], &[0xA4, 0xA2]);
    }

    #[test]
    fn test_unsupported_code_page() {
        let mut wide = [0u16; 4];
        assert_eq!(
            multibyte_to_unicode(932, &[0x82, 0xA0], &mut wide),
            Err(InetError::Unsupported)
        );
    }

    #[test]
    fn test_jis0208_pairs() {
        let mut wide = [0u16; 4];
        assert_eq!(jis0208_to_unicode(0x24, 0x22, &mut wide), Some(1));
        assert_eq!(wide[0], 0x3042);
        assert_eq!(unicode_to_jis0208(&[0x3042]), Some([0x24, 0x22]));
        assert_eq!(unicode_to_jis0208(&[0xFF5E]), Some([0x21, 0x41]));
        // Half-width katakana lives in JIS X 0201, not 0208
        assert_eq!(unicode_to_jis0208(&[0xFF71]), None);
        assert_eq!(unicode_to_jis0208(&[b'A' as u16]), None);
    }

    #[test]
    fn test_jis0212_refused() {
        let mut wide = [0u16; 4];
        assert_eq!(
            multibyte_to_unicode(51932, &[0x8F, 0xB0, 0xA1], &mut wide),
            Err(InetError::Invalid)
        );
        assert_eq!(
            multibyte_to_unicode(51932, &[0x8F, 0xA2, 0xB7], &mut wide),
            Err(InetError::Invalid)
        );
    }
}
