//! External delegate discovery.
//!
//! When a system `iconv` implementation is available and shares this
//! process's C runtime, a session can hand every call to it instead of the
//! built-in codecs. Discovery never fails loudly: any problem is logged at
//! debug level and the caller falls back to the built-in engine.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::config::{DELEGATE_ENV_VAR, DelegateSource};

pub(crate) use imp::{DelegateLibrary, DelegateSession};

/// Find the library selected by `source`.
///
/// The environment-provided library is loaded at most once per process; an
/// explicit path is loaded on every call.
pub(crate) fn discover(source: &DelegateSource) -> Option<Arc<DelegateLibrary>> {
    static ENVIRONMENT: OnceLock<Option<Arc<DelegateLibrary>>> = OnceLock::new();

    match source {
        DelegateSource::Disabled => None,
        DelegateSource::Environment => ENVIRONMENT.get_or_init(load_from_environment).clone(),
        DelegateSource::Library(path) => DelegateLibrary::load(path).map(Arc::new),
    }
}

fn load_from_environment() -> Option<Arc<DelegateLibrary>> {
    let path = std::env::var_os(DELEGATE_ENV_VAR)?;
    if path.is_empty() {
        return None;
    }
    DelegateLibrary::load(Path::new(&path)).map(Arc::new)
}

/// Open a delegated session, or `None` to use the built-in engine.
pub(crate) fn open(source: &DelegateSource, to: &str, from: &str) -> Option<DelegateSession> {
    let library = discover(source)?;
    let session = DelegateSession::open(Arc::clone(&library), to, from);
    if session.is_none() {
        debug!(
            library = %library.path().display(),
            to,
            from,
            "delegate does not support this pair"
        );
    }
    session
}

impl fmt::Debug for DelegateSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateSession")
            .field("library", &self.library_path())
            .finish()
    }
}

#[cfg(unix)]
mod imp {
    use std::ffi::{CStr, CString, c_char, c_int, c_void};
    use std::os::unix::ffi::OsStrExt;
    use std::path::{Path, PathBuf};
    use std::ptr;
    use std::sync::Arc;

    use tracing::debug;

    use crate::session::Progress;
    use crate::{Error, Result};

    type IconvOpenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut c_void;
    type IconvFn =
        unsafe extern "C" fn(*mut c_void, *mut *mut c_char, *mut usize, *mut *mut c_char, *mut usize) -> usize;
    type IconvCloseFn = unsafe extern "C" fn(*mut c_void) -> c_int;

    /// GNU libiconv prefixes its entry points; everything else uses the
    /// POSIX names.
    const ENTRY_POINTS: [[&CStr; 3]; 2] = [
        [c"libiconv_open", c"libiconv", c"libiconv_close"],
        [c"iconv_open", c"iconv", c"iconv_close"],
    ];

    /// Accessor every object linked against the C runtime imports to reach
    /// `errno`.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    const ERRNO_ACCESSOR: Option<&CStr> = Some(c"__errno_location");
    #[cfg(any(target_vendor = "apple", target_os = "freebsd", target_os = "dragonfly"))]
    const ERRNO_ACCESSOR: Option<&CStr> = Some(c"__error");
    #[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
    const ERRNO_ACCESSOR: Option<&CStr> = Some(c"__errno");
    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_vendor = "apple",
        target_os = "freebsd",
        target_os = "dragonfly",
        target_os = "openbsd",
        target_os = "netbsd"
    )))]
    const ERRNO_ACCESSOR: Option<&CStr> = None;

    struct Handle(*mut c_void);

    impl Drop for Handle {
        fn drop(&mut self) {
            // SAFETY: the handle came from a successful dlopen and is closed once.
            unsafe {
                libc::dlclose(self.0);
            }
        }
    }

    /// A loaded, validated iconv implementation.
    pub(crate) struct DelegateLibrary {
        path: PathBuf,
        open: IconvOpenFn,
        convert: IconvFn,
        close: IconvCloseFn,
        _handle: Handle,
    }

    // SAFETY: the handle is only closed on drop and the entry points are
    // plain C functions; per-descriptor state lives in `DelegateSession`.
    unsafe impl Send for DelegateLibrary {}
    unsafe impl Sync for DelegateLibrary {}

    impl DelegateLibrary {
        pub(crate) fn load(path: &Path) -> Option<Self> {
            let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
            // SAFETY: c_path is NUL-terminated and outlives the call.
            let raw = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
            if raw.is_null() {
                debug!(path = %path.display(), error = %dl_error(), "delegate library not loaded");
                return None;
            }
            let handle = Handle(raw);

            if !shares_runtime(&handle) {
                debug!(path = %path.display(), "delegate library uses a different C runtime");
                return None;
            }

            let Some([open, convert, close]) = ENTRY_POINTS
                .iter()
                .find_map(|names| resolve_all(&handle, names))
            else {
                debug!(path = %path.display(), "delegate library exports no iconv entry points");
                return None;
            };

            // SAFETY: the symbols carry the iconv names, whose C signatures the
            // function pointer types mirror.
            let (open, convert, close) = unsafe {
                (
                    std::mem::transmute::<*mut c_void, IconvOpenFn>(open),
                    std::mem::transmute::<*mut c_void, IconvFn>(convert),
                    std::mem::transmute::<*mut c_void, IconvCloseFn>(close),
                )
            };

            debug!(path = %path.display(), "delegate library loaded");
            Some(Self {
                path: path.to_path_buf(),
                open,
                convert,
                close,
                _handle: handle,
            })
        }

        pub(crate) fn path(&self) -> &Path {
            &self.path
        }
    }

    fn resolve_all(handle: &Handle, names: &[&CStr; 3]) -> Option<[*mut c_void; 3]> {
        let mut symbols = [ptr::null_mut(); 3];
        for (slot, name) in symbols.iter_mut().zip(names) {
            // SAFETY: valid handle and NUL-terminated name.
            let symbol = unsafe { libc::dlsym(handle.0, name.as_ptr()) };
            if symbol.is_null() {
                return None;
            }
            *slot = symbol;
        }
        Some(symbols)
    }

    /// The library must resolve the errno accessor to the very function this
    /// process uses, or its error reports would land in a different `errno`.
    fn shares_runtime(handle: &Handle) -> bool {
        let Some(accessor) = ERRNO_ACCESSOR else {
            return false;
        };
        // SAFETY: valid handles and a NUL-terminated name.
        let (theirs, ours) = unsafe {
            (
                libc::dlsym(handle.0, accessor.as_ptr()),
                libc::dlsym(libc::RTLD_DEFAULT, accessor.as_ptr()),
            )
        };
        !theirs.is_null() && theirs == ours
    }

    fn dl_error() -> String {
        // SAFETY: dlerror returns NULL or a NUL-terminated string valid until
        // the next dl* call on this thread.
        unsafe {
            let message = libc::dlerror();
            if message.is_null() {
                String::from("unknown error")
            } else {
                CStr::from_ptr(message).to_string_lossy().into_owned()
            }
        }
    }

    /// An open conversion descriptor of a delegate library.
    pub(crate) struct DelegateSession {
        library: Arc<DelegateLibrary>,
        cd: *mut c_void,
    }

    // SAFETY: the descriptor is owned exclusively by this value.
    unsafe impl Send for DelegateSession {}

    impl DelegateSession {
        pub(crate) fn open(library: Arc<DelegateLibrary>, to: &str, from: &str) -> Option<Self> {
            let to = CString::new(to).ok()?;
            let from = CString::new(from).ok()?;
            // SAFETY: both names are NUL-terminated and outlive the call.
            let cd = unsafe { (library.open)(to.as_ptr(), from.as_ptr()) };
            if cd.is_null() || cd as isize == -1 {
                return None;
            }
            Some(Self { library, cd })
        }

        pub(crate) fn library_path(&self) -> &Path {
            self.library.path()
        }

        pub(crate) fn convert(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress> {
            let mut in_ptr = input.as_ptr() as *mut c_char;
            let mut in_left = input.len();
            let mut out_ptr = output.as_mut_ptr() as *mut c_char;
            let mut out_left = output.len();
            // SAFETY: the pointers and counts describe live slices; iconv
            // never writes through the input pointer.
            let rc = unsafe {
                (self.library.convert)(self.cd, &mut in_ptr, &mut in_left, &mut out_ptr, &mut out_left)
            };
            let errno = std::io::Error::last_os_error().raw_os_error();

            let progress = Progress {
                consumed: input.len() - in_left,
                produced: output.len() - out_left,
            };
            if rc == usize::MAX {
                Err(error_from_errno(errno, progress))
            } else {
                Ok(progress)
            }
        }

        pub(crate) fn flush(&mut self, output: &mut [u8]) -> Result<usize> {
            let mut out_ptr = output.as_mut_ptr() as *mut c_char;
            let mut out_left = output.len();
            // SAFETY: a null input pointer asks iconv for its shift sequence.
            let rc = unsafe {
                (self.library.convert)(self.cd, ptr::null_mut(), ptr::null_mut(), &mut out_ptr, &mut out_left)
            };
            let errno = std::io::Error::last_os_error().raw_os_error();

            let produced = output.len() - out_left;
            if rc == usize::MAX {
                Err(error_from_errno(errno, Progress { consumed: 0, produced }))
            } else {
                Ok(produced)
            }
        }

        pub(crate) fn reset(&mut self) {
            // SAFETY: all-null arguments reset the descriptor's shift state.
            unsafe {
                (self.library.convert)(
                    self.cd,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    ptr::null_mut(),
                );
            }
        }
    }

    impl Drop for DelegateSession {
        fn drop(&mut self) {
            // SAFETY: cd came from the library's open and is closed once.
            unsafe {
                (self.library.close)(self.cd);
            }
        }
    }

    fn error_from_errno(errno: Option<i32>, progress: Progress) -> Error {
        let Progress { consumed, produced } = progress;
        match errno {
            Some(libc::E2BIG) => Error::OutputFull { consumed, produced },
            Some(libc::EINVAL) => Error::Incomplete { consumed, produced },
            _ => Error::InvalidSequence { consumed, produced },
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_missing_library_is_rejected() {
            assert!(DelegateLibrary::load(Path::new("/nonexistent/libiconv.so.2")).is_none());
        }

        #[test]
        fn test_errno_mapping() {
            let progress = Progress {
                consumed: 3,
                produced: 2,
            };
            assert_eq!(
                error_from_errno(Some(libc::E2BIG), progress),
                Error::OutputFull {
                    consumed: 3,
                    produced: 2
                }
            );
            assert_eq!(
                error_from_errno(Some(libc::EINVAL), progress),
                Error::Incomplete {
                    consumed: 3,
                    produced: 2
                }
            );
            assert_eq!(
                error_from_errno(Some(libc::EILSEQ), progress),
                Error::InvalidSequence {
                    consumed: 3,
                    produced: 2
                }
            );
        }

        #[cfg(all(target_os = "linux", target_env = "gnu"))]
        #[test]
        fn test_glibc_is_a_compatible_delegate() {
            let library = DelegateLibrary::load(Path::new("libc.so.6")).unwrap();
            let mut session = DelegateSession::open(Arc::new(library), "UTF-8", "ISO-8859-1").unwrap();

            let mut out = [0u8; 8];
            let progress = session.convert(&[b'a', 0xE9], &mut out).unwrap();
            assert_eq!(progress, Progress { consumed: 2, produced: 3 });
            assert_eq!(&out[..3], &[b'a', 0xC3, 0xA9]);

            assert_eq!(
                session.convert(&[0xE9], &mut out[..1]),
                Err(Error::OutputFull {
                    consumed: 0,
                    produced: 0
                })
            );
            assert_eq!(session.flush(&mut out), Ok(0));
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::path::Path;
    use std::sync::Arc;

    use tracing::debug;

    use crate::Result;
    use crate::session::Progress;

    /// Delegation is only implemented for `dlopen` platforms.
    pub(crate) struct DelegateLibrary {
        _private: (),
    }

    impl DelegateLibrary {
        pub(crate) fn load(path: &Path) -> Option<Self> {
            debug!(path = %path.display(), "delegation is not available on this platform");
            None
        }

        pub(crate) fn path(&self) -> &Path {
            Path::new("")
        }
    }

    pub(crate) enum DelegateSession {}

    impl DelegateSession {
        pub(crate) fn open(_library: Arc<DelegateLibrary>, _to: &str, _from: &str) -> Option<Self> {
            None
        }

        pub(crate) fn library_path(&self) -> &Path {
            match *self {}
        }

        pub(crate) fn convert(&mut self, _input: &[u8], _output: &mut [u8]) -> Result<Progress> {
            match *self {}
        }

        pub(crate) fn flush(&mut self, _output: &mut [u8]) -> Result<usize> {
            match *self {}
        }

        pub(crate) fn reset(&mut self) {
            match *self {}
        }
    }
}
