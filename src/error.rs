use thiserror::Error;

#[cfg(feature = "defmt")]
use defmt::Format;

/// Crate-wide error taxonomy.
///
/// `Uninitialized`/`InvalidParam`/`Busy`/`Timeout`/`Failed` mirror the outcomes the command
/// engine can surface to an adapter; the rest are internal plumbing failures (buffer, encoding,
/// transport) that bubble up the same way.
#[derive(Debug, Error, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Error {
    #[error("operation attempted before init succeeded")]
    Uninitialized,
    #[error("adapter passed an invalid parameter")]
    InvalidParam,
    #[error("a command is already in flight")]
    Busy,
    #[error("command deadline exceeded")]
    Timeout,
    #[error("modem returned ERROR or +CME/+CMS ERROR: {0}")]
    Failed(u16),
    #[error("buffer too small")]
    BufferTooSmallError,
    #[error("cannot parse string as the given type")]
    ParseError,
    #[error("inconsistent AT response")]
    AtError,
    #[error("transport write failed")]
    UartWriteError,
    #[error("transport read failed")]
    TransportError,
    #[error("bytes are not valid UTF-8")]
    StringEncodingError,
    #[error("PDU codec rejected the input")]
    PduError,
}

impl Error {
    /// Numeric `+CME`/`+CMS ERROR` code, if this variant carries one.
    pub fn code(&self) -> Option<u16> {
        match self {
            Error::Failed(n) => Some(*n),
            _ => None,
        }
    }
}
