//! ISO-2022-JP as an explicit four-state machine.
//!
//! Decoding follows designators (`ESC ( B`, `ESC ( J`, `ESC ( I`,
//! `ESC $ B`, `ESC $ @`) and, for the shift-out variant, SO/SI. Encoding
//! picks a target state per character and emits whatever [`transition`]
//! returns for the `(policy, from, to)` triple before the data bytes.

use crate::codec::{DecodeError, Decoded, EncodeError, Utf16Units};
use crate::inet;
use crate::unicode;

const ESC: u8 = 0x1B;
const SO: u8 = 0x0E;
const SI: u8 = 0x0F;

const TO_ASCII: &[u8] = &[ESC, b'(', b'B'];
const TO_ROMAN: &[u8] = &[ESC, b'(', b'J'];
const TO_KANA: &[u8] = &[ESC, b'(', b'I'];
const TO_JIS0208: &[u8] = &[ESC, b'$', b'B'];
const SHIFT_OUT: &[u8] = &[SO];
const SHIFT_IN: &[u8] = &[SI];
const SHIFT_IN_TO_ROMAN: &[u8] = &[SI, ESC, b'(', b'J'];
const SHIFT_IN_TO_JIS0208: &[u8] = &[SI, ESC, b'$', b'B'];

/// Character set currently designated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iso2022State {
    /// US-ASCII
    Ascii,
    /// JIS X 0201 Roman
    Roman,
    /// JIS X 0201 half-width katakana
    Kana,
    /// JIS X 0208
    Jis0208,
}

/// How a variant handles JIS X 0201 katakana.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KanaPolicy {
    /// Not representable (CP50220)
    Forbidden,
    /// Reached with `ESC ( I` (CP50221)
    Designator,
    /// Reached with SO, left with SI (CP50222)
    ShiftOut,
}

impl KanaPolicy {
    pub(crate) fn for_codepage(codepage: u32) -> Option<Self> {
        match codepage {
            50220 => Some(KanaPolicy::Forbidden),
            50221 => Some(KanaPolicy::Designator),
            50222 => Some(KanaPolicy::ShiftOut),
            _ => None,
        }
    }
}

/// Bytes that move the encoder from `from` to `to`.
fn transition(policy: KanaPolicy, from: Iso2022State, to: Iso2022State) -> &'static [u8] {
    use Iso2022State::*;

    match (policy, from, to) {
        (_, Ascii, Ascii) | (_, Roman, Roman) | (_, Kana, Kana) | (_, Jis0208, Jis0208) => &[],
        (KanaPolicy::ShiftOut, Kana, Ascii) => SHIFT_IN,
        (KanaPolicy::ShiftOut, Kana, Roman) => SHIFT_IN_TO_ROMAN,
        (KanaPolicy::ShiftOut, Kana, Jis0208) => SHIFT_IN_TO_JIS0208,
        (KanaPolicy::ShiftOut, _, Kana) => SHIFT_OUT,
        (_, _, Ascii) => TO_ASCII,
        (_, _, Roman) => TO_ROMAN,
        (_, _, Kana) => TO_KANA,
        (_, _, Jis0208) => TO_JIS0208,
    }
}

fn designation(intermediate: u8, final_byte: u8) -> Option<Iso2022State> {
    match (intermediate, final_byte) {
        (b'(', b'B') => Some(Iso2022State::Ascii),
        (b'(', b'J') => Some(Iso2022State::Roman),
        (b'(', b'I') => Some(Iso2022State::Kana),
        (b'$', b'B') | (b'$', b'@') => Some(Iso2022State::Jis0208),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Iso2022Jp {
    policy: KanaPolicy,
    state: Iso2022State,
}

impl Iso2022Jp {
    pub(crate) fn new(policy: KanaPolicy) -> Self {
        Self {
            policy,
            state: Iso2022State::Ascii,
        }
    }

    pub(crate) fn policy(&self) -> KanaPolicy {
        self.policy
    }

    pub(crate) fn state(&self) -> Iso2022State {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: Iso2022State) {
        self.state = state;
    }

    pub(crate) fn probe_length(&self, bytes: &[u8]) -> usize {
        match bytes[0] {
            ESC => 3,
            SO | SI => 1,
            _ if self.state == Iso2022State::Jis0208 => 2,
            _ => 1,
        }
    }

    pub(crate) fn decode(&mut self, bytes: &[u8]) -> Result<Decoded, DecodeError> {
        let len = self.probe_length(bytes);
        let first = bytes[0];
        match first {
            ESC => self.decode_escape(bytes, len),
            SO | SI if self.policy == KanaPolicy::ShiftOut => {
                self.state = if first == SO {
                    Iso2022State::Kana
                } else {
                    Iso2022State::Ascii
                };
                Ok(Decoded::empty(1))
            }
            SO | SI => Err(DecodeError::Invalid),
            0x80..=0xFF => Err(DecodeError::Invalid),
            _ => self.decode_data(bytes, len),
        }
    }

    fn decode_escape(&mut self, bytes: &[u8], len: usize) -> Result<Decoded, DecodeError> {
        if let Some(&intermediate) = bytes.get(1) {
            if intermediate != b'(' && intermediate != b'$' {
                return Err(DecodeError::Invalid);
            }
        }
        let Some(&[_, intermediate, final_byte]) = bytes.get(..len) else {
            return Err(DecodeError::Incomplete);
        };
        let state = designation(intermediate, final_byte).ok_or(DecodeError::Invalid)?;
        if state == Iso2022State::Kana && self.policy == KanaPolicy::Forbidden {
            return Err(DecodeError::Invalid);
        }
        self.state = state;
        Ok(Decoded::empty(len))
    }

    fn decode_data(&self, bytes: &[u8], len: usize) -> Result<Decoded, DecodeError> {
        let byte = bytes[0];
        let unit = match self.state {
            Iso2022State::Ascii => byte as u16,
            Iso2022State::Roman => match byte {
                0x5C => 0x00A5,
                0x7E => 0x203E,
                _ => byte as u16,
            },
            Iso2022State::Kana => match byte {
                0x21..=0x5F => 0xFF61 + (byte - 0x21) as u16,
                _ => return Err(DecodeError::Invalid),
            },
            Iso2022State::Jis0208 => {
                if !(0x21..=0x7E).contains(&byte) {
                    return Err(DecodeError::Invalid);
                }
                let Some(&[row, cell]) = bytes.get(..len) else {
                    return Err(DecodeError::Incomplete);
                };
                if !(0x21..=0x7E).contains(&cell) {
                    return Err(DecodeError::Invalid);
                }
                let mut wide = [0u16; 4];
                let written = inet::jis0208_to_unicode(row, cell, &mut wide).ok_or(DecodeError::Invalid)?;
                return Ok(Decoded {
                    consumed: len,
                    units: Utf16Units::from_slice(&wide[..written]),
                });
            }
        };
        Ok(Decoded {
            consumed: 1,
            units: Utf16Units::from_unit(unit),
        })
    }

    /// Encode one decoded unit. On failure the state is left untouched.
    pub(crate) fn encode(&mut self, units: &[u16], out: &mut [u8]) -> Result<usize, EncodeError> {
        let mut state = self.state;
        let mut written = 0;
        for code_point in unicode::code_points(units) {
            let (target, data, len) = self.select(state, code_point?)?;
            let shift = transition(self.policy, state, target);
            let needed = shift.len() + len;
            if out.len() - written < needed {
                return Err(EncodeError::OutputFull);
            }
            out[written..written + shift.len()].copy_from_slice(shift);
            written += shift.len();
            out[written..written + len].copy_from_slice(&data[..len]);
            written += len;
            state = target;
        }
        self.state = state;
        Ok(written)
    }

    fn select(&self, current: Iso2022State, code_point: u32) -> Result<(Iso2022State, [u8; 2], usize), EncodeError> {
        match code_point {
            0x1B | 0x0E | 0x0F => Err(EncodeError::Unmappable),
            0x00..=0x7F => {
                let byte = code_point as u8;
                let stay_roman = current == Iso2022State::Roman && byte != 0x5C && byte != 0x7E;
                let target = if stay_roman {
                    Iso2022State::Roman
                } else {
                    Iso2022State::Ascii
                };
                Ok((target, [byte, 0], 1))
            }
            0xA5 => Ok((Iso2022State::Roman, [0x5C, 0], 1)),
            0x203E => Ok((Iso2022State::Roman, [0x7E, 0], 1)),
            0xFF61..=0xFF9F if self.policy == KanaPolicy::Forbidden => Err(EncodeError::Unmappable),
            0xFF61..=0xFF9F => Ok((Iso2022State::Kana, [(code_point - 0xFF61) as u8 + 0x21, 0], 1)),
            _ => {
                let mut wide = Utf16Units::new();
                unicode::push_code_point(&mut wide, code_point);
                let pair = inet::unicode_to_jis0208(wide.as_slice()).ok_or(EncodeError::Unmappable)?;
                Ok((Iso2022State::Jis0208, pair, 2))
            }
        }
    }

    /// Return to ASCII. Nothing is written when already there.
    pub(crate) fn flush(&mut self, out: &mut [u8]) -> Result<usize, EncodeError> {
        let shift = transition(self.policy, self.state, Iso2022State::Ascii);
        if out.len() < shift.len() {
            return Err(EncodeError::OutputFull);
        }
        out[..shift.len()].copy_from_slice(shift);
        self.state = Iso2022State::Ascii;
        Ok(shift.len())
    }
}
