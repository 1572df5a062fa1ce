//! Session options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable naming an external conversion library.
pub const DELEGATE_ENV_VAR: &str = "STREAM_ICONV_DELEGATE";

/// Where an external conversion library may come from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DelegateSource {
    /// Always use the built-in engine
    Disabled,
    /// Library named by [`DELEGATE_ENV_VAR`], loaded once per process
    #[default]
    Environment,
    /// Library at an explicit path
    Library(PathBuf),
}

/// Options applied when a session is opened.
///
/// ```rust
/// use stream_iconv::{DelegateSource, Options};
///
/// let options = Options::new()
///     .legacy_utf8(true)
///     .delegate(DelegateSource::Disabled);
/// assert!(options.legacy_utf8);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Options {
    /// Accept the obsolete 5- and 6-byte UTF-8 lead bytes when measuring a
    /// sequence. Off by default: such sequences are rejected outright.
    pub legacy_utf8: bool,
    /// External library lookup
    pub delegate: DelegateSource,
}

impl Options {
    /// Default options: strict UTF-8, delegate taken from the environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that never leave the built-in engine
    pub fn builtin_only() -> Self {
        Self::new().delegate(DelegateSource::Disabled)
    }

    /// Set the legacy UTF-8 length policy
    pub fn legacy_utf8(mut self, legacy: bool) -> Self {
        self.legacy_utf8 = legacy;
        self
    }

    /// Set where an external library is looked for
    pub fn delegate(mut self, source: DelegateSource) -> Self {
        self.delegate = source;
        self
    }
}
