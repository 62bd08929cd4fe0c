//! File system adapter (spec §4.9), grounded in `ril_file.h`'s `RIL_FILE_Err` range (400-426).

use heapless::format;

use super::parse_csv_field;
use crate::context::RilContext;
use crate::engine::{CallbackOutcome, Outcome};
use crate::transport::{Frame, Rx, Tx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    Timeout,
    InvalidValue,
    OutOfRange,
    Eof,
    StorageFull,
    NotFound,
    BadName,
    AlreadyExists,
    WriteFailed,
    OpenFailed,
    ReadFailed,
    TooManyOpen,
    ReadOnly,
    SizeError,
    BadDescriptor,
    ListFailed,
    DeleteFailed,
    NoMemory,
    TooLarge,
    BadParam,
    Busy,
    Unknown(u16),
}

fn map_error(code: u16) -> FsError {
    match code {
        400 => FsError::InvalidValue,
        401 => FsError::OutOfRange,
        402 => FsError::Eof,
        403 => FsError::StorageFull,
        405 => FsError::NotFound,
        406 => FsError::BadName,
        407 => FsError::AlreadyExists,
        409 => FsError::WriteFailed,
        410 => FsError::OpenFailed,
        411 => FsError::ReadFailed,
        413 => FsError::TooManyOpen,
        414 => FsError::ReadOnly,
        415 => FsError::SizeError,
        416 => FsError::BadDescriptor,
        417 => FsError::ListFailed,
        418 => FsError::DeleteFailed,
        420 => FsError::NoMemory,
        421 => FsError::Timeout,
        423 => FsError::TooLarge,
        425 => FsError::BadParam,
        426 => FsError::Busy,
        other => FsError::Unknown(other),
    }
}

/// One entry from an `AT+QFLST` listing: filename and size in bytes.
#[derive(Clone, Debug)]
pub struct FileInfo {
    pub name: heapless::String<64>,
    pub size: u32,
}

pub struct FsAdapter<'a, IO: Tx + Rx> {
    ctx: &'a RilContext<IO>,
}

impl<'a, IO: Tx + Rx> FsAdapter<'a, IO> {
    pub fn new(ctx: &'a RilContext<IO>) -> Self {
        Self { ctx }
    }

    /// `AT+QFUPL="<name>",<len>` (two-phase, prompted) then the raw file bytes.
    pub async fn upload(&self, name: &str, data: &[u8]) -> Result<(), FsError> {
        let cmd: heapless::String<80> =
            format!(80; "+QFUPL=\"{name}\",{}", data.len()).map_err(|_| FsError::Unknown(0))?;
        let prompt = self
            .ctx
            .send(&cmd, true, |_, _| CallbackOutcome::Continue, 5_000)
            .await
            .map_err(|_| FsError::Timeout)?;
        if prompt != Outcome::Success {
            return Err(FsError::Timeout);
        }
        let outcome = self
            .ctx
            .send_binary(data, |frame, _| ok_terminates(frame), 30_000)
            .await
            .map_err(|_| FsError::Timeout)?;
        self.translate(outcome).await
    }

    /// `AT+QFWRITE="<name>",<len>` (two-phase, prompted): appends or creates `name`.
    pub async fn write(&self, name: &str, data: &[u8]) -> Result<(), FsError> {
        let cmd: heapless::String<80> =
            format!(80; "+QFWRITE=\"{name}\",{}", data.len()).map_err(|_| FsError::Unknown(0))?;
        let prompt = self
            .ctx
            .send(&cmd, true, |_, _| CallbackOutcome::Continue, 5_000)
            .await
            .map_err(|_| FsError::Timeout)?;
        if prompt != Outcome::Success {
            return Err(FsError::Timeout);
        }
        let outcome = self
            .ctx
            .send_binary(data, |frame, _| ok_terminates(frame), 30_000)
            .await
            .map_err(|_| FsError::Timeout)?;
        self.translate(outcome).await
    }

    /// `AT+QFDWL="<name>"`: the file streams in as a `CONNECT n` binary payload.
    pub async fn download(&self, name: &str, out: &mut [u8]) -> Result<usize, FsError> {
        let cmd: heapless::String<80> = format!(80; "+QFDWL=\"{name}\"").map_err(|_| FsError::Unknown(0))?;
        let mut written = 0usize;
        let outcome = self
            .ctx
            .send(
                &cmd,
                false,
                |frame, switch| match frame {
                    Frame::Line(l) if l.starts_with("CONNECT") => {
                        let n: usize = l.split_whitespace().nth(1).and_then(|s| s.parse().ok()).unwrap_or(0);
                        switch.set_binary_mode(n.min(out.len()));
                        CallbackOutcome::Continue
                    }
                    Frame::Binary(bytes) => {
                        let n = bytes.len().min(out.len() - written);
                        out[written..written + n].copy_from_slice(&bytes[..n]);
                        written += n;
                        CallbackOutcome::Success
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                30_000,
            )
            .await
            .map_err(|_| FsError::Timeout)?;
        self.translate(outcome).await?;
        Ok(written)
    }

    /// `AT+QFDEL="<name>"`.
    pub async fn delete(&self, name: &str) -> Result<(), FsError> {
        let cmd: heapless::String<80> = format!(80; "+QFDEL=\"{name}\"").map_err(|_| FsError::Unknown(0))?;
        let outcome = self
            .ctx
            .send(&cmd, false, |frame, _| ok_terminates(frame), 10_000)
            .await
            .map_err(|_| FsError::Timeout)?;
        self.translate(outcome).await
    }

    /// `AT+QFLST="<pattern>"`: fills `out` with one entry per `+QFLST:` line, returns count seen
    /// (which may exceed `out.len()`, in which case the tail is dropped).
    pub async fn list(&self, pattern: &str, out: &mut [FileInfo]) -> Result<usize, FsError> {
        let cmd: heapless::String<80> = format!(80; "+QFLST=\"{pattern}\"").map_err(|_| FsError::Unknown(0))?;
        let mut seen = 0usize;
        let outcome = self
            .ctx
            .send(
                &cmd,
                false,
                |frame, _| {
                    if let Frame::Line(l) = frame {
                        if l == "OK" {
                            return CallbackOutcome::Success;
                        }
                        if l.starts_with("+QFLST:") {
                            if let (Some(name), Some(size)) =
                                (parse_csv_field::<heapless::String<64>>(l, 0), parse_csv_field::<u32>(l, 1))
                            {
                                if seen < out.len() {
                                    out[seen] = FileInfo { name, size };
                                }
                                seen += 1;
                            }
                        }
                    }
                    CallbackOutcome::Continue
                },
                10_000,
            )
            .await
            .map_err(|_| FsError::Timeout)?;
        self.translate(outcome).await?;
        Ok(seen)
    }

    async fn translate(&self, outcome: Outcome) -> Result<(), FsError> {
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(map_error(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(FsError::Timeout),
        }
    }
}

fn ok_terminates(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}
