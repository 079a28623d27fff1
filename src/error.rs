//! Error taxonomy for the conversion device
//!
//! Every failing operation returns a [`DriverError`]. Each variant maps onto the
//! errno a kernel character device would hand back to user space, so callers
//! that speak POSIX can still distinguish the failure.

use thiserror::Error;

/// Why a numeric prefix was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Empty prefix, stray characters, or a sign without digits
    Invalid,
    /// Digits parse but do not fit in an `i64`
    Overflow,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::Invalid => write!(f, "not a base-10 integer"),
            ParseErrorKind::Overflow => write!(f, "integer out of range"),
        }
    }
}

/// Errors returned by the device, its registration, and its configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("out of memory allocating the staging buffer")]
    OutOfMemory,

    #[error("write of {len} bytes exceeds the {max}-byte limit")]
    InputTooLarge { len: usize, max: usize },

    #[error("bad address while copying to or from the caller")]
    CopyFault,

    #[error("could not parse entered value into integer: {0}")]
    ParseError(ParseErrorKind),

    #[error("no temperature available")]
    NoDataAvailable,

    #[error("device does not support seeking")]
    NotSeekable,

    #[error("permission denied opening {path}")]
    PermissionDenied { path: String },

    #[error("file not opened for {0}")]
    BadFileMode(&'static str),

    #[error("misc device {name} (minor {minor}) is already registered")]
    Busy { name: String, minor: u8 },

    #[error("no free dynamic minor numbers")]
    NoFreeMinor,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DriverError {
    /// Positive errno value matching this failure
    pub fn errno(&self) -> i32 {
        match self {
            // The original driver reports oversized writes as ENOMEM too
            DriverError::OutOfMemory | DriverError::InputTooLarge { .. } => libc::ENOMEM,
            DriverError::CopyFault => libc::EFAULT,
            DriverError::ParseError(ParseErrorKind::Invalid) => libc::EINVAL,
            DriverError::ParseError(ParseErrorKind::Overflow) => libc::ERANGE,
            DriverError::NoDataAvailable => libc::EINVAL,
            DriverError::NotSeekable => libc::ESPIPE,
            DriverError::PermissionDenied { .. } => libc::EACCES,
            DriverError::BadFileMode(_) => libc::EBADF,
            DriverError::Busy { .. } | DriverError::NoFreeMinor => libc::EBUSY,
            DriverError::InvalidConfig(_) => libc::EINVAL,
        }
    }

    /// Symbolic errno name, e.g. `"EFAULT"`
    pub fn errno_name(&self) -> &'static str {
        match self.errno() {
            libc::ENOMEM => "ENOMEM",
            libc::EFAULT => "EFAULT",
            libc::EINVAL => "EINVAL",
            libc::ERANGE => "ERANGE",
            libc::ESPIPE => "ESPIPE",
            libc::EACCES => "EACCES",
            libc::EBADF => "EBADF",
            libc::EBUSY => "EBUSY",
            _ => "EUNKNOWN",
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, DriverError>;
