//! HTTP(S) adapter (spec §4.9), grounded in `ril_http.h`'s `RIL_HTTP_Err` range (701-733).

use heapless::format;

use super::parse_csv_field;
use crate::context::RilContext;
use crate::engine::{CallbackOutcome, Outcome};
use crate::transport::{Frame, Rx, Tx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpError {
    Timeout,
    Busy,
    NetError,
    UrlError,
    ResponseFailed,
    Unsupported,
    Unknown(u16),
}

fn map_error(code: u16) -> HttpError {
    match code {
        702 => HttpError::Timeout,
        703 | 704 => HttpError::Busy,
        710 => HttpError::NetError,
        711 | 712 => HttpError::UrlError,
        723 => HttpError::ResponseFailed,
        733 => HttpError::Unsupported,
        _ => HttpError::Unknown(code),
    }
}

pub struct HttpAdapter<'a, IO: Tx + Rx> {
    ctx: &'a RilContext<IO>,
}

impl<'a, IO: Tx + Rx> HttpAdapter<'a, IO> {
    pub fn new(ctx: &'a RilContext<IO>) -> Self {
        Self { ctx }
    }

    /// `AT+QHTTPURL=<len>,<timeout>` (prompted) then the URL bytes.
    pub async fn configure_url(&self, url: &str) -> Result<(), HttpError> {
        let cmd: heapless::String<32> =
            format!(32; "+QHTTPURL={},80", url.len()).map_err(|_| HttpError::Unknown(0))?;
        let prompt = self
            .ctx
            .send(&cmd, true, |_, _| CallbackOutcome::Continue, 5_000)
            .await
            .map_err(|_| HttpError::Timeout)?;
        if prompt != Outcome::Success {
            return Err(HttpError::Timeout);
        }
        let outcome = self
            .ctx
            .send_binary(url.as_bytes(), |frame, _| connect_or_ok(frame), 10_000)
            .await
            .map_err(|_| HttpError::Timeout)?;
        self.translate(outcome).await
    }

    /// `AT+QHTTPGET=<timeout>`.
    pub async fn get(&self, timeout_s: u32) -> Result<(), HttpError> {
        let cmd: heapless::String<32> =
            format!(32; "+QHTTPGET={timeout_s}").map_err(|_| HttpError::Unknown(0))?;
        self.run_simple(&cmd, (timeout_s as u32 + 5) * 1000).await
    }

    /// `AT+QHTTPPOST=<len>,<input_time>,<rsp_time>` (prompted) then the raw body.
    pub async fn post(&self, body: &[u8], timeout_s: u32) -> Result<(), HttpError> {
        let cmd: heapless::String<32> =
            format!(32; "+QHTTPPOST={},5,{timeout_s}", body.len()).map_err(|_| HttpError::Unknown(0))?;
        let prompt = self
            .ctx
            .send(&cmd, true, |_, _| CallbackOutcome::Continue, 5_000)
            .await
            .map_err(|_| HttpError::Timeout)?;
        if prompt != Outcome::Success {
            return Err(HttpError::Timeout);
        }
        let outcome = self
            .ctx
            .send_binary(body, |frame, _| connect_or_ok(frame), (timeout_s + 10) as u32 * 1000)
            .await
            .map_err(|_| HttpError::Timeout)?;
        self.translate(outcome).await
    }

    /// `AT+QHTTPREAD=<timeout>`: the response body streams in as a `CONNECT n` binary payload.
    pub async fn read_response(
        &self,
        timeout_s: u32,
        out: &mut [u8],
    ) -> Result<usize, HttpError> {
        let cmd: heapless::String<32> =
            format!(32; "+QHTTPREAD={timeout_s}").map_err(|_| HttpError::Unknown(0))?;
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
                (timeout_s + 5) as u32 * 1000,
            )
            .await
            .map_err(|_| HttpError::Timeout)?;
        self.translate(outcome).await?;
        Ok(written)
    }

    /// Reads the final status line from `+QHTTPGET`/`+QHTTPPOST` URCs: `(err, http_status, len)`.
    pub fn last_status(&self, line: &str) -> Option<(i32, u32, u32)> {
        Some((
            parse_csv_field(line, 0)?,
            parse_csv_field(line, 1)?,
            parse_csv_field(line, 2)?,
        ))
    }

    async fn run_simple(&self, cmd: &str, timeout_ms: u32) -> Result<(), HttpError> {
        let outcome = self
            .ctx
            .send(cmd, false, |frame, _| connect_or_ok(frame), timeout_ms)
            .await
            .map_err(|_| HttpError::Timeout)?;
        self.translate(outcome).await
    }

    async fn translate(&self, outcome: Outcome) -> Result<(), HttpError> {
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(map_error(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(HttpError::Timeout),
        }
    }
}

fn connect_or_ok(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}
