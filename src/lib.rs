//! # StreamIconv - Streaming Code-Page Conversion
//!
//! An iconv-style conversion engine: open a session between two named
//! encodings, feed it byte buffers, and get bytes back, with exact control
//! over partial sequences at buffer boundaries.
//!
//! ## Features
//!
//! - **Numeric code pages and historical aliases** (`CP932`, `Shift_JIS`, `latin1`, ...)
//! - **Unicode forms** UTF-8, UTF-16LE/BE and UTF-32LE/BE with surrogate handling
//! - **East Asian legacy sets** including stateful ISO-2022-JP
//! - **Compatibility remapping** between divergent JIS vendor tables, switchable per name with `//nocompat`
//! - **Resumable errors** that report exactly how much input was consumed
//! - **Optional delegation** to a compatible system `iconv` library
//!
//! ## Quick Start
//!
//! ```rust
//! use stream_iconv::Session;
//!
//! let mut session = Session::open("ISO-2022-JP", "Shift_JIS").unwrap();
//!
//! let mut out = [0u8; 32];
//! let progress = session.convert(&[0x82, 0xA0], &mut out).unwrap();
//! let flushed = session.flush(&mut out[progress.produced..]).unwrap();
//!
//! assert_eq!(
//!     &out[..progress.produced + flushed],
//!     b"\x1b$B\x24\x22\x1b(B"
//! );
//! ```

#![deny(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod alias;
pub mod codec;
mod compat;
pub mod config;
mod delegate;
mod host;
mod inet;
mod iso2022jp;
mod session;
mod tables;
mod unicode;

pub use alias::{EncodingSpec, list_supported_names};
pub use codec::{CodecDescriptor, FamilyKind};
pub use compat::{CompatEntry, CompatFlags};
pub use config::{DelegateSource, Options};
pub use iso2022jp::Iso2022State;
pub use session::{Progress, Session};

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by sessions.
///
/// Apart from [`Error::UnknownEncoding`], every variant records how much
/// input was consumed and how much output was produced before the failing
/// unit, so the caller can resume from that point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The name resolves to no supported encoding
    #[error("unknown encoding `{name}`")]
    UnknownEncoding {
        /// The name as given
        name: String,
    },
    /// The input ends in the middle of a multibyte sequence
    #[error("incomplete multibyte sequence at input offset {consumed}")]
    Incomplete {
        /// Input bytes converted before the partial sequence
        consumed: usize,
        /// Output bytes written
        produced: usize,
    },
    /// The input is malformed, or not representable in the destination
    #[error("invalid or unconvertible sequence at input offset {consumed}")]
    InvalidSequence {
        /// Input bytes converted before the offending sequence
        consumed: usize,
        /// Output bytes written
        produced: usize,
    },
    /// The output buffer cannot take the next character
    #[error("output buffer full after {produced} bytes (input offset {consumed})")]
    OutputFull {
        /// Input bytes converted
        consumed: usize,
        /// Output bytes written
        produced: usize,
    },
}

impl Error {
    /// Progress made before the error, for the resumable variants.
    pub fn progress(&self) -> Option<Progress> {
        match *self {
            Error::UnknownEncoding { .. } => None,
            Error::Incomplete { consumed, produced }
            | Error::InvalidSequence { consumed, produced }
            | Error::OutputFull { consumed, produced } => Some(Progress { consumed, produced }),
        }
    }

    /// True if retrying with more input or more output space can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Incomplete { .. } | Error::OutputFull { .. })
    }

    pub(crate) fn offset_by(self, input: usize, output: usize) -> Self {
        match self {
            Error::UnknownEncoding { .. } => self,
            Error::Incomplete { consumed, produced } => Error::Incomplete {
                consumed: consumed + input,
                produced: produced + output,
            },
            Error::InvalidSequence { consumed, produced } => Error::InvalidSequence {
                consumed: consumed + input,
                produced: produced + output,
            },
            Error::OutputFull { consumed, produced } => Error::OutputFull {
                consumed: consumed + input,
                produced: produced + output,
            },
        }
    }
}

/// Numeric identifier of an encoding, using Windows code-page numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodePage(u32);

impl CodePage {
    /// UTF-8
    pub const UTF8: CodePage = CodePage(65001);
    /// UTF-16, little endian
    pub const UTF16LE: CodePage = CodePage(1200);
    /// UTF-16, big endian
    pub const UTF16BE: CodePage = CodePage(1201);
    /// UTF-32, little endian
    pub const UTF32LE: CodePage = CodePage(12000);
    /// UTF-32, big endian
    pub const UTF32BE: CodePage = CodePage(12001);
    /// US-ASCII
    pub const ASCII: CodePage = CodePage(20127);
    /// ISO-8859-1
    pub const ISO_8859_1: CodePage = CodePage(28591);
    /// Windows-1252
    pub const WINDOWS_1252: CodePage = CodePage(1252);
    /// Shift_JIS (Windows-31J)
    pub const SHIFT_JIS: CodePage = CodePage(932);
    /// EUC-JP
    pub const EUC_JP: CodePage = CodePage(51932);
    /// ISO-2022-JP
    pub const ISO_2022_JP: CodePage = CodePage(50221);

    /// Wrap a raw code-page number
    pub const fn new(number: u32) -> Self {
        CodePage(number)
    }

    /// The raw number
    pub const fn number(self) -> u32 {
        self.0
    }

    /// Preferred alias, if the code page has one
    pub fn name(self) -> Option<&'static str> {
        alias::preferred_name(self)
    }

    /// Whether a built-in codec exists for this code page
    pub fn is_supported(self) -> bool {
        codec::is_supported(self)
    }
}

impl fmt::Display for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CP{}", self.0)
    }
}

/// Open a session converting `from` into `to`.
pub fn open(to: &str, from: &str) -> Result<Session> {
    Session::open(to, from)
}

/// Convert a complete buffer in one call.
///
/// ```rust
/// let bytes = stream_iconv::transcode(b"caf\xe9", "UTF-8", "ISO-8859-1").unwrap();
/// assert_eq!(bytes, "café".as_bytes());
/// ```
pub fn transcode(input: &[u8], to: &str, from: &str) -> Result<Vec<u8>> {
    Session::open(to, from)?.convert_to_vec(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_progress() {
        let err = Error::OutputFull {
            consumed: 2,
            produced: 2,
        };
        assert_eq!(err.progress(), Some(Progress { consumed: 2, produced: 2 }));
        assert!(err.is_recoverable());

        let err = Error::UnknownEncoding {
            name: "X".to_string(),
        };
        assert_eq!(err.progress(), None);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::UnknownEncoding {
                name: "KLINGON".to_string()
            }
            .to_string(),
            "unknown encoding `KLINGON`"
        );
        assert_eq!(
            Error::Incomplete {
                consumed: 7,
                produced: 3
            }
            .to_string(),
            "incomplete multibyte sequence at input offset 7"
        );
    }

    #[test]
    fn test_code_page_display_and_name() {
        assert_eq!(CodePage::SHIFT_JIS.to_string(), "CP932");
        assert_eq!(CodePage::UTF8.name(), Some("UTF-8"));
        assert!(CodePage::ISO_2022_JP.is_supported());
        assert!(!CodePage::new(0).is_supported());
    }

    #[test]
    fn test_offset_by() {
        let err = Error::InvalidSequence {
            consumed: 1,
            produced: 2,
        };
        assert_eq!(
            err.offset_by(10, 20),
            Error::InvalidSequence {
                consumed: 11,
                produced: 22
            }
        );
    }

    #[test]
    fn test_transcode() {
        assert_eq!(transcode(b"ABC", "ASCII", "ASCII").unwrap(), b"ABC");
        assert!(matches!(
            transcode(b"ABC", "ASCII", "NOT-A-REAL-ENCODING"),
            Err(Error::UnknownEncoding { .. })
        ));
    }
}
