//! Byte Transport: the capability set the Command Engine needs from the UART peer.
//!
//! Modelled as two small traits rather than an inheritance hierarchy (spec §9 "Inheritance /
//! virtual dispatch"): `Tx` for writing, `Rx` for framed reads. A concrete implementation owns
//! the actual ring buffers and DMA/IT completion; this crate only consumes the interface.

use crate::error::Error;

/// Writes bytes to the modem.
pub trait Tx {
    /// Enqueues `buffer` for transmission. Does not block indefinitely: a transport whose TX
    /// ring is full returns as soon as it has accepted what it can and reports the remainder via
    /// `tx_free_space`; the chunked-write loop in `send_binary` deals with the rest.
    fn write(&mut self, buffer: &[u8]) -> impl core::future::Future<Output = crate::Result<()>>;

    /// Bytes still queued for transmission, for the binary-send drain loop (§4.3.1 step 3).
    fn pending_tx_bytes(&self) -> u32 {
        0
    }

    /// Free space in the TX ring, for the binary-send chunked-write loop (§4.3.1 step 2).
    fn tx_free_space(&self) -> u32 {
        u32::MAX
    }
}

/// One frame read from the modem, according to the framing discipline in effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A CRLF-terminated line, CR stripped, LF stripped.
    Line(&'a str),
    /// The `>` prompt byte, not CRLF-terminated.
    Prompt,
    /// Exactly `n` raw bytes, read in `BINARY(n)` mode.
    Binary(&'a [u8]),
}

/// Which framing discipline the reader should apply for the next frame (§4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Line,
    Prompt,
    Binary(usize),
}

/// Reads frames out of the RX ring according to the Line Framer's three disciplines.
///
/// Implementations own the line buffer; `read_frame` returns `Ok(None)` when no complete frame is
/// available yet rather than blocking — callers loop, yielding, until the deadline.
pub trait Rx {
    /// Attempts to produce one frame of the given `kind`.
    ///
    /// Returns `Ok(None)` if no complete frame is buffered yet (spec §4.1: "a return of 0 means
    /// no complete frame yet"). An RX framing/overrun error resets RX and is surfaced as
    /// `Err(Error::TransportError)`, which callers treat as "no line this tick" (§4.1).
    fn read_frame(
        &mut self,
        kind: FrameKind,
        scratch: &mut [u8],
    ) -> impl core::future::Future<Output = crate::Result<Option<usize>>>;

    /// Decodes the bytes written into `scratch[..n]` by `read_frame` into a `Frame`.
    fn decode<'a>(kind: FrameKind, scratch: &'a [u8], n: usize) -> crate::Result<Frame<'a>> {
        match kind {
            FrameKind::Prompt => Ok(Frame::Prompt),
            FrameKind::Binary(_) => Ok(Frame::Binary(&scratch[..n])),
            FrameKind::Line => {
                let raw = &scratch[..n];
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                core::str::from_utf8(raw).map(Frame::Line).map_err(|_| Error::StringEncodingError)
            }
        }
    }
}
