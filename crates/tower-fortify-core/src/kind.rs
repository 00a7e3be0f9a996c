//! Hierarchical error kinds.
//!
//! Policies never inspect concrete error types. Instead every failure is
//! classified into an [`ErrorKind`], a dotted path such as
//! `"operation.http.server_error"`. A kind *is a* every one of its prefixes,
//! so a handler or predicate declared for `"operation.http"` matches
//! `"operation.http.server_error"` as well.
//!
//! ```
//! use tower_fortify_core::ErrorKind;
//!
//! let server = ErrorKind::new("operation.http.server_error");
//! let http = ErrorKind::new("operation.http");
//!
//! assert!(server.is_a(&http));
//! assert!(server.is_a(&ErrorKind::ANY));
//! assert!(!http.is_a(&server));
//! assert_eq!(server.depth(), 3);
//! assert_eq!(server.parent(), Some(http));
//! ```

use std::fmt;

/// A dotted, hierarchical classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorKind(&'static str);

impl ErrorKind {
    /// The root kind; every kind is a descendant of it.
    pub const ANY: ErrorKind = ErrorKind("");

    /// Admission-layer rejections.
    pub const REJECTED: ErrorKind = ErrorKind("rejected");
    /// Rejected by an open or forced-open circuit breaker.
    pub const CIRCUIT_OPEN: ErrorKind = ErrorKind("rejected.circuit_open");
    /// Rejected by a saturated bulkhead.
    pub const BULKHEAD_FULL: ErrorKind = ErrorKind("rejected.bulkhead_full");
    /// Rejected by a rate limiter.
    pub const RATE_LIMITED: ErrorKind = ErrorKind("rejected.rate_limited");
    /// A pooled job was dropped before producing a result.
    pub const SHUT_DOWN: ErrorKind = ErrorKind("rejected.shut_down");
    /// The call exceeded its deadline.
    pub const TIMEOUT: ErrorKind = ErrorKind("timeout");

    /// Creates a kind from a dotted path. Leading or trailing dots are not
    /// meaningful and should be avoided.
    pub const fn new(path: &'static str) -> Self {
        ErrorKind(path)
    }

    /// The dotted path.
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Number of path segments; `ANY` has depth 0.
    pub fn depth(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.split('.').count()
        }
    }

    /// The immediate ancestor, or `None` for [`ErrorKind::ANY`].
    pub fn parent(&self) -> Option<ErrorKind> {
        if self.0.is_empty() {
            return None;
        }
        match self.0.rfind('.') {
            Some(idx) => Some(ErrorKind(&self.0[..idx])),
            None => Some(ErrorKind::ANY),
        }
    }

    /// Returns true if `self` equals `ancestor` or descends from it.
    ///
    /// Matching is by whole segments: `"io.timeout"` is not a `"io.time"`.
    pub fn is_a(&self, ancestor: &ErrorKind) -> bool {
        if ancestor.0.is_empty() || self.0 == ancestor.0 {
            return true;
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'.'
    }

    /// Returns true if `self` is a descendant of any kind in `set`.
    pub fn is_any_of(&self, set: &[ErrorKind]) -> bool {
        set.iter().any(|k| self.is_a(k))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(self.0)
        }
    }
}

/// Maps an error value onto its [`ErrorKind`].
///
/// Implement this for the error type of the operation being protected.
///
/// ```
/// use tower_fortify_core::{Classify, ErrorKind};
///
/// enum BackendError {
///     ServerError(u16),
///     Business(String),
/// }
///
/// impl Classify for BackendError {
///     fn kind(&self) -> ErrorKind {
///         match self {
///             BackendError::ServerError(_) => ErrorKind::new("backend.http.server_error"),
///             BackendError::Business(_) => ErrorKind::new("backend.business"),
///         }
///     }
/// }
/// ```
pub trait Classify {
    /// The kind of this error.
    fn kind(&self) -> ErrorKind;
}

impl Classify for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

impl Classify for std::io::Error {
    fn kind(&self) -> ErrorKind {
        use std::io::ErrorKind as Io;
        match std::io::Error::kind(self) {
            Io::TimedOut => ErrorKind::new("io.timed_out"),
            Io::ConnectionRefused => ErrorKind::new("io.connection_refused"),
            Io::ConnectionReset => ErrorKind::new("io.connection_reset"),
            Io::NotFound => ErrorKind::new("io.not_found"),
            _ => ErrorKind::new("io"),
        }
    }
}

impl<T: Classify + ?Sized> Classify for Box<T> {
    fn kind(&self) -> ErrorKind {
        (**self).kind()
    }
}
