//! Error types for codec and transport operations.

use std::io;

/// Result type for codec and transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or decoding netlink messages, or
/// while talking to the kernel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// Operation not supported.
    #[error("operation not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Create a kernel error from an errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Check if this is an "invalid argument" error (EINVAL).
    pub fn is_invalid_argument(&self) -> bool {
        self.errno() == Some(libc::EINVAL)
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM) | Some(libc::EACCES))
    }
}

/// Why a ruleset document failed to parse.
///
/// Only the document-level entry points produce this type; wire-level decode
/// failures stay on [`Error`]. Each parse call reports at most one
/// `ParseError`, describing the most specific diagnosis available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Structural or syntax problem in the input document. Line and column
    /// are 1-based and point at the offending token.
    #[error("bad input format in line {line} column {column}")]
    BadInput {
        /// 1-based line of the offending token.
        line: usize,
        /// 1-based column of the offending token.
        column: usize,
    },

    /// A required child node was absent from an otherwise well-formed node.
    #[error("node \"{name}\" not found")]
    MissingNode {
        /// Name of the missing node.
        name: String,
    },

    /// A node was present but held data of the wrong kind.
    #[error("invalid type in node \"{node}\"")]
    BadType {
        /// Name of the offending node.
        node: String,
    },

    /// The node's meaning is recognized but not implemented.
    #[error("operation not supported")]
    NotSupported,

    /// Anything else.
    #[error("undefined error")]
    Undefined,
}

impl ParseError {
    /// Missing-node error for `name`.
    pub fn missing(name: &str) -> Self {
        Self::MissingNode { name: name.into() }
    }

    /// Bad-type error for `node`.
    pub fn bad_type(node: &str) -> Self {
        Self::BadType { node: node.into() }
    }

    /// One-line diagnostic naming the failed operation, e.g.
    /// `parsing ruleset: node "table" not found`.
    pub fn report(&self, operation: &str) -> String {
        format!("{operation}: {self}")
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_eof() {
            Self::BadInput {
                line: err.line(),
                column: err.column(),
            }
        } else {
            Self::Undefined
        }
    }
}
