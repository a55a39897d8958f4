//! The error taxonomy surfaced at the crate's operation boundaries.

use std::fmt;
use std::io;

/// Errors returned by selector registration, socket construction and address
/// parsing.
///
/// Transient, non-blocking-mode syscall errors (`EAGAIN`, `EWOULDBLOCK`,
/// `EINTR`) never reach this type: they are swallowed inside the readiness
/// handlers and converted to [`Action::Continue`](crate::Action::Continue).
#[derive(Debug)]
pub enum Error {
    /// `mask` passed to `Selector::register` contained neither READABLE nor
    /// WRITABLE.
    UnknownMask(u32),
    /// `fd` is greater than or equal to the selector's table capacity.
    FdOverLimit(i32),
    /// The host portion of an address could not be parsed as a dotted-quad
    /// IPv4 address.
    IpFormat(String),
    /// `network` was not `"tcp4"`.
    UnknownNetwork(String),
    /// A kernel syscall failed.
    Syscall(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownMask(mask) => write!(f, "unknown event mask: {}", mask),
            Error::FdOverLimit(fd) => write!(f, "fd {} exceed the limit", fd),
            Error::IpFormat(ip) => write!(f, "ip {} format error", ip),
            Error::UnknownNetwork(net) => write!(f, "network {} is unknown", net),
            Error::Syscall(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Syscall(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Syscall(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
