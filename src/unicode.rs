//! Self-contained UTF-8, UTF-16 and UTF-32 routines.
//!
//! Nothing here touches a platform service: every function is plain bit
//! manipulation over byte slices, and the UTF-16 pivot used by the session
//! is produced and consumed through [`Utf16Units`].

use crate::codec::{DecodeError, Decoded, EncodeError, Utf16Units};

/// Byte order of a UTF-16 or UTF-32 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

impl Endian {
    fn read_u16(self, bytes: &[u8]) -> u16 {
        let pair = [bytes[0], bytes[1]];
        match self {
            Endian::Little => u16::from_le_bytes(pair),
            Endian::Big => u16::from_be_bytes(pair),
        }
    }

    fn write_u16(self, value: u16) -> [u8; 2] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    fn read_u32(self, bytes: &[u8]) -> u32 {
        let quad = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            Endian::Little => u32::from_le_bytes(quad),
            Endian::Big => u32::from_be_bytes(quad),
        }
    }

    fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}

pub(crate) const MAX_CODE_POINT: u32 = 0x10FFFF;

pub(crate) fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

pub(crate) fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

/// Split a supplementary-plane code point into its surrogate pair.
pub(crate) fn split_surrogates(code_point: u32) -> (u16, u16) {
    let v = code_point - 0x10000;
    (0xD800 | (v >> 10) as u16, 0xDC00 | (v & 0x3FF) as u16)
}

/// Inverse of [`split_surrogates`].
pub(crate) fn combine_surrogates(high: u16, low: u16) -> u32 {
    0x10000 + ((((high & 0x3FF) as u32) << 10) | (low & 0x3FF) as u32)
}

/// Push one scalar value onto the pivot, splitting it when needed.
pub(crate) fn push_code_point(units: &mut Utf16Units, code_point: u32) {
    if code_point >= 0x10000 {
        let (high, low) = split_surrogates(code_point);
        units.push(high);
        units.push(low);
    } else {
        units.push(code_point as u16);
    }
}

/// Walk the pivot as scalar values. Unpaired surrogates are unmappable in
/// every encoding form.
pub(crate) fn code_points(units: &[u16]) -> impl Iterator<Item = Result<u32, EncodeError>> + '_ {
    let mut rest = units;
    std::iter::from_fn(move || {
        let (&unit, tail) = rest.split_first()?;
        rest = tail;
        if is_low_surrogate(unit) {
            return Some(Err(EncodeError::Unmappable));
        }
        if !is_high_surrogate(unit) {
            return Some(Ok(unit as u32));
        }
        match rest.split_first() {
            Some((&low, tail)) if is_low_surrogate(low) => {
                rest = tail;
                Some(Ok(combine_surrogates(unit, low)))
            }
            _ => Some(Err(EncodeError::Unmappable)),
        }
    })
}

/// Length of the UTF-8 sequence introduced by `lead`.
///
/// The classic table admits 5- and 6-byte forms (`0xF8..=0xFB`,
/// `0xFC..=0xFD`); they are only reported when `legacy` is set.
pub(crate) fn utf8_sequence_length(lead: u8, legacy: bool) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        0xF8..=0xFB if legacy => Some(5),
        0xFC..=0xFD if legacy => Some(6),
        _ => None,
    }
}

const UTF8_MIN_BY_LENGTH: [u32; 7] = [0, 0, 0x80, 0x800, 0x10000, 0x20_0000, 0x400_0000];

pub(crate) fn decode_utf8(bytes: &[u8], legacy: bool) -> Result<Decoded, DecodeError> {
    let lead = bytes[0];
    let len = utf8_sequence_length(lead, legacy).ok_or(DecodeError::Invalid)?;

    let available = bytes.len().min(len);
    if bytes[1..available].iter().any(|&b| b & 0xC0 != 0x80) {
        return Err(DecodeError::Invalid);
    }
    if bytes.len() < len {
        return Err(DecodeError::Incomplete);
    }

    let mut value = match len {
        1 => lead as u32,
        2 => (lead & 0x1F) as u32,
        3 => (lead & 0x0F) as u32,
        4 => (lead & 0x07) as u32,
        5 => (lead & 0x03) as u32,
        _ => (lead & 0x01) as u32,
    };
    for &b in &bytes[1..len] {
        value = (value << 6) | (b & 0x3F) as u32;
    }

    if value < UTF8_MIN_BY_LENGTH[len] || value > MAX_CODE_POINT || (0xD800..=0xDFFF).contains(&value) {
        return Err(DecodeError::Invalid);
    }

    let mut units = Utf16Units::new();
    push_code_point(&mut units, value);
    Ok(Decoded { consumed: len, units })
}

pub(crate) fn encode_utf8(units: &[u16], out: &mut [u8]) -> Result<usize, EncodeError> {
    let mut written = 0;
    for code_point in code_points(units) {
        let ch = char::from_u32(code_point?).ok_or(EncodeError::Unmappable)?;
        let len = ch.len_utf8();
        if out.len() - written < len {
            return Err(EncodeError::OutputFull);
        }
        ch.encode_utf8(&mut out[written..]);
        written += len;
    }
    Ok(written)
}

/// Length of the next UTF-16 unit: 4 when it starts with a high surrogate.
pub(crate) fn utf16_sequence_length(bytes: &[u8], endian: Endian) -> Result<usize, DecodeError> {
    if bytes.len() < 2 {
        return Err(DecodeError::Incomplete);
    }
    let first = endian.read_u16(bytes);
    if is_low_surrogate(first) {
        Err(DecodeError::Invalid)
    } else if is_high_surrogate(first) {
        Ok(4)
    } else {
        Ok(2)
    }
}

pub(crate) fn decode_utf16(bytes: &[u8], endian: Endian) -> Result<Decoded, DecodeError> {
    let len = utf16_sequence_length(bytes, endian)?;
    let first = endian.read_u16(bytes);
    let mut units = Utf16Units::new();
    if len == 2 {
        units.push(first);
        return Ok(Decoded { consumed: 2, units });
    }

    if bytes.len() < 4 {
        return Err(DecodeError::Incomplete);
    }
    let second = endian.read_u16(&bytes[2..]);
    if !is_low_surrogate(second) {
        return Err(DecodeError::Invalid);
    }
    units.push(first);
    units.push(second);
    Ok(Decoded { consumed: 4, units })
}

pub(crate) fn encode_utf16(units: &[u16], endian: Endian, out: &mut [u8]) -> Result<usize, EncodeError> {
    let mut written = 0;
    for code_point in code_points(units) {
        let ch = char::from_u32(code_point?).ok_or(EncodeError::Unmappable)?;
        let mut pair = [0u16; 2];
        let encoded = ch.encode_utf16(&mut pair);
        if out.len() - written < encoded.len() * 2 {
            return Err(EncodeError::OutputFull);
        }
        for &unit in encoded.iter() {
            out[written..written + 2].copy_from_slice(&endian.write_u16(unit));
            written += 2;
        }
    }
    Ok(written)
}

pub(crate) fn decode_utf32(bytes: &[u8], endian: Endian) -> Result<Decoded, DecodeError> {
    if bytes.len() < 4 {
        return Err(DecodeError::Incomplete);
    }
    let value = endian.read_u32(bytes);
    if value > MAX_CODE_POINT || (0xD800..=0xDFFF).contains(&value) {
        return Err(DecodeError::Invalid);
    }
    let mut units = Utf16Units::new();
    push_code_point(&mut units, value);
    Ok(Decoded { consumed: 4, units })
}

pub(crate) fn encode_utf32(units: &[u16], endian: Endian, out: &mut [u8]) -> Result<usize, EncodeError> {
    let mut written = 0;
    for code_point in code_points(units) {
        let code_point = code_point?;
        if out.len() - written < 4 {
            return Err(EncodeError::OutputFull);
        }
        out[written..written + 4].copy_from_slice(&endian.write_u32(code_point));
        written += 4;
    }
    Ok(written)
}
