//! Conversion sessions.
//!
//! A [`Session`] pairs a source and a destination codec, or hands every call
//! to an external delegate chosen when the session was opened. It owns no
//! buffers: each [`convert`](Session::convert) call reads from a caller
//! slice and writes into another, and reports how far it got.

use serde::Serialize;
use tracing::{debug, trace};

use crate::alias;
use crate::codec::{CodecDescriptor, DecodeError, EncodeError, MB_CHAR_MAX};
use crate::compat;
use crate::config::Options;
use crate::delegate::{self, DelegateSession};
use crate::{Error, Result};

/// Bytes consumed from the input and produced into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    /// Input bytes fully converted
    pub consumed: usize,
    /// Output bytes written
    pub produced: usize,
}

#[derive(Debug)]
enum Engine {
    Builtin {
        from: CodecDescriptor,
        to: CodecDescriptor,
    },
    Delegated(DelegateSession),
}

/// A streaming conversion between two encodings.
///
/// ```rust
/// use stream_iconv::{Error, Session};
///
/// let mut session = Session::open("UTF-16BE", "UTF-8").unwrap();
/// let mut out = [0u8; 16];
///
/// // The tail of a split sequence is reported, not consumed
/// let err = session.convert(&[b'a', 0xE3, 0x81], &mut out).unwrap_err();
/// assert_eq!(err, Error::Incomplete { consumed: 1, produced: 2 });
///
/// let progress = session.convert(&[0xE3, 0x81, 0x82], &mut out).unwrap();
/// assert_eq!(&out[..progress.produced], &[0x30, 0x42]);
/// ```
#[derive(Debug)]
pub struct Session {
    engine: Engine,
}

impl Session {
    /// Open a session converting `from` into `to` with default options.
    pub fn open(to: &str, from: &str) -> Result<Self> {
        Self::open_with(to, from, &Options::default())
    }

    /// Open a session with explicit options.
    ///
    /// A configured delegate is tried first; if it is missing, incompatible,
    /// or does not know the pair, the built-in codecs are used.
    pub fn open_with(to: &str, from: &str, options: &Options) -> Result<Self> {
        if let Some(delegated) = delegate::open(&options.delegate, to, from) {
            debug!(to, from, library = %delegated.library_path().display(), "session delegated");
            return Ok(Self {
                engine: Engine::Delegated(delegated),
            });
        }

        let from_spec = alias::parse(from)?;
        let to_spec = alias::parse(to)?;
        let from = CodecDescriptor::new(&from_spec, options)?;
        let to = CodecDescriptor::new(&to_spec, options)?;
        debug!(from = %from.codepage(), to = %to.codepage(), "session opened");

        Ok(Self {
            engine: Engine::Builtin { from, to },
        })
    }

    /// True when an external library performs the conversion.
    pub fn is_delegated(&self) -> bool {
        matches!(self.engine, Engine::Delegated(_))
    }

    /// Source codec, unless delegated.
    pub fn source(&self) -> Option<&CodecDescriptor> {
        match &self.engine {
            Engine::Builtin { from, .. } => Some(from),
            Engine::Delegated(_) => None,
        }
    }

    /// Destination codec, unless delegated.
    pub fn destination(&self) -> Option<&CodecDescriptor> {
        match &self.engine {
            Engine::Builtin { to, .. } => Some(to),
            Engine::Delegated(_) => None,
        }
    }

    /// Convert as much of `input` as fits into `output`.
    ///
    /// An empty `input` is an end-of-stream request and behaves like
    /// [`flush`](Self::flush). On error the counts carried by the error say
    /// exactly how much was converted before the failing unit.
    pub fn convert(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress> {
        if input.is_empty() {
            let produced = self.flush(output)?;
            return Ok(Progress {
                consumed: 0,
                produced,
            });
        }

        let progress = match &mut self.engine {
            Engine::Delegated(delegated) => delegated.convert(input, output),
            Engine::Builtin { from, to } => convert_units(from, to, input, output),
        };
        trace!(?progress, "convert");
        progress
    }

    /// Write the bytes that return the destination to its initial state.
    pub fn flush(&mut self, output: &mut [u8]) -> Result<usize> {
        match &mut self.engine {
            Engine::Delegated(delegated) => delegated.flush(output),
            Engine::Builtin { from, to } => {
                let produced = to.flush(output).map_err(|_| Error::OutputFull {
                    consumed: 0,
                    produced: 0,
                })?;
                to.reset();
                from.reset();
                Ok(produced)
            }
        }
    }

    /// Discard all conversion state without writing anything.
    pub fn reset(&mut self) {
        match &mut self.engine {
            Engine::Delegated(delegated) => delegated.reset(),
            Engine::Builtin { from, to } => {
                from.reset();
                to.reset();
            }
        }
    }

    /// Release the session. Dropping it has the same effect.
    pub fn close(self) {}

    /// Convert a complete buffer, including the final flush.
    ///
    /// Error positions are absolute offsets into `input` and into the output
    /// that would have been returned.
    pub fn convert_to_vec(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 2);
        let mut chunk = [0u8; 4096];
        let mut offset = 0;

        while offset < input.len() {
            match self.convert(&input[offset..], &mut chunk) {
                Ok(progress) => {
                    output.extend_from_slice(&chunk[..progress.produced]);
                    offset += progress.consumed;
                }
                Err(Error::OutputFull { consumed, produced }) => {
                    output.extend_from_slice(&chunk[..produced]);
                    offset += consumed;
                }
                Err(err) => return Err(err.offset_by(offset, output.len())),
            }
        }

        let produced = self.flush(&mut chunk)?;
        output.extend_from_slice(&chunk[..produced]);
        Ok(output)
    }
}

/// The built-in conversion loop. Each unit is decoded, remapped and encoded
/// as one step; a unit that cannot be finished leaves both codecs exactly
/// as they were before it.
fn convert_units(
    from: &mut CodecDescriptor,
    to: &mut CodecDescriptor,
    input: &[u8],
    output: &mut [u8],
) -> Result<Progress> {
    let mut consumed = 0;
    let mut produced = 0;
    let mut scratch = [0u8; MB_CHAR_MAX];

    while consumed < input.len() {
        let from_mode = from.mode();
        let to_mode = to.mode();

        let decoded = match from.decode(&input[consumed..]) {
            Ok(decoded) => decoded,
            Err(DecodeError::Incomplete) => return Err(Error::Incomplete { consumed, produced }),
            Err(DecodeError::Invalid) => return Err(Error::InvalidSequence { consumed, produced }),
        };

        let mut units = decoded.units;
        compat::remap(&mut units, from.compat_table(), to.compat_table());

        let written = if units.is_empty() {
            0
        } else {
            match to.encode(units.as_slice(), &mut scratch) {
                Ok(written) => written,
                Err(EncodeError::Unmappable) => {
                    from.restore_mode(from_mode);
                    to.restore_mode(to_mode);
                    return Err(Error::InvalidSequence { consumed, produced });
                }
                Err(EncodeError::OutputFull) => {
                    from.restore_mode(from_mode);
                    to.restore_mode(to_mode);
                    return Err(Error::OutputFull { consumed, produced });
                }
            }
        };

        let Some(slot) = output.get_mut(produced..produced + written) else {
            from.restore_mode(from_mode);
            to.restore_mode(to_mode);
            return Err(Error::OutputFull { consumed, produced });
        };
        slot.copy_from_slice(&scratch[..written]);
        consumed += decoded.consumed;
        produced += written;
    }

    Ok(Progress { consumed, produced })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Mode;
    use crate::iso2022jp::Iso2022State;

    fn open(to: &str, from: &str) -> Session {
        Session::open_with(to, from, &Options::builtin_only()).unwrap()
    }

    #[test]
    fn test_utf8_to_utf16le() {
        let mut session = open("UTF-16LE", "UTF-8");
        let mut out = [0u8; 16];
        let progress = session.convert("aあ".as_bytes(), &mut out).unwrap();
        assert_eq!(progress, Progress { consumed: 4, produced: 4 });
        assert_eq!(&out[..4], &[0x61, 0x00, 0x42, 0x30]);
        assert!(!session.is_delegated());
    }

    #[test]
    fn test_empty_input_flushes() {
        let mut session = open("ISO-2022-JP", "UTF-8");
        let mut out = [0u8; 16];
        let progress = session.convert("あ".as_bytes(), &mut out).unwrap();
        assert_eq!(&out[..progress.produced], b"\x1b$B\x24\x22");

        let progress = session.convert(&[], &mut out).unwrap();
        assert_eq!(progress, Progress { consumed: 0, produced: 3 });
        assert_eq!(&out[..3], b"\x1b(B");
        assert_eq!(
            session.destination().unwrap().mode(),
            Mode::Iso2022(Iso2022State::Ascii)
        );
    }

    #[test]
    fn test_flush_needs_room() {
        let mut session = open("ISO-2022-JP", "UTF-8");
        let mut out = [0u8; 16];
        session.convert("あ".as_bytes(), &mut out).unwrap();
        assert_eq!(
            session.flush(&mut out[..2]),
            Err(Error::OutputFull {
                consumed: 0,
                produced: 0
            })
        );
        assert_eq!(session.flush(&mut out), Ok(3));
        assert_eq!(session.flush(&mut out), Ok(0));
    }

    #[test]
    fn test_output_full_rolls_back_destination_state() {
        let mut session = open("ISO-2022-JP", "CP932");
        let mut small = [0u8; 4];
        assert_eq!(
            session.convert(&[0x81, 0x60], &mut small),
            Err(Error::OutputFull {
                consumed: 0,
                produced: 0
            })
        );
        assert_eq!(
            session.destination().unwrap().mode(),
            Mode::Iso2022(Iso2022State::Ascii)
        );

        let mut out = [0u8; 16];
        let progress = session.convert(&[0x81, 0x60], &mut out).unwrap();
        assert_eq!(&out[..progress.produced], b"\x1b$B\x21\x41");
    }

    #[test]
    fn test_encode_failure_is_deterministic() {
        // The designator is committed; the character after it is not representable
        let mut session = open("US-ASCII", "ISO-2022-JP");
        let input = b"\x1b$B\x24\x22";
        let mut out = [0u8; 16];
        let err = session.convert(input, &mut out).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidSequence {
                consumed: 3,
                produced: 0
            }
        );
        assert_eq!(
            session.source().unwrap().mode(),
            Mode::Iso2022(Iso2022State::Jis0208)
        );
        for _ in 0..2 {
            assert_eq!(
                session.convert(&input[3..], &mut out),
                Err(Error::InvalidSequence {
                    consumed: 0,
                    produced: 0
                })
            );
        }
    }

    #[test]
    fn test_reset_discards_state() {
        let mut session = open("ISO-2022-JP", "UTF-8");
        let mut out = [0u8; 16];
        session.convert("あ".as_bytes(), &mut out).unwrap();
        session.reset();
        assert_eq!(session.flush(&mut out), Ok(0));
    }

    #[test]
    fn test_convert_to_vec() {
        let mut session = open("ISO-2022-JP", "UTF-8");
        let long = "あ".repeat(3000);
        let output = session.convert_to_vec(long.as_bytes()).unwrap();
        assert!(output.starts_with(b"\x1b$B"));
        assert!(output.ends_with(b"\x24\x22\x1b(B"));
        assert_eq!(output.len(), 3 + 2 * 3000 + 3);
    }

    #[test]
    fn test_convert_to_vec_reports_absolute_offsets() {
        let mut session = open("UTF-16BE", "UTF-8");
        let mut input = vec![b'a'; 5000];
        input.push(0xFF);
        assert_eq!(
            session.convert_to_vec(&input),
            Err(Error::InvalidSequence {
                consumed: 5000,
                produced: 10000
            })
        );
    }

    #[test]
    fn test_unknown_encoding_at_open() {
        let err = Session::open_with("UTF-8", "NOT-A-REAL-ENCODING", &Options::builtin_only()).unwrap_err();
        assert_eq!(
            err,
            Error::UnknownEncoding {
                name: "NOT-A-REAL-ENCODING".to_string()
            }
        );
    }
}
