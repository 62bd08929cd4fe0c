//! TCP/UDP socket adapter (spec §4.9), grounded in `ril_socket.h`'s `RIL_SOC_*` operation set.

use heapless::format;

use crate::context::RilContext;
use crate::engine::{CallbackOutcome, Outcome};
use crate::transport::{Frame, Rx, Tx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketType {
    Tcp,
    Udp,
}

impl SocketType {
    fn as_str(self) -> &'static str {
        match self {
            SocketType::Tcp => "TCP",
            SocketType::Udp => "UDP",
        }
    }
}

/// Mirrors `RIL_SocErrCode`: the vendor stack reports socket failures as small negative codes
/// rather than the `+CME ERROR` numeric ranges the other adapters use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketError {
    Timeout,
    General,
    AtError,
    InvalidParam,
    Unknown(i32),
}

fn map_error(code: i32) -> SocketError {
    match code {
        -1 => SocketError::General,
        -2 => SocketError::Timeout,
        -3 => SocketError::AtError,
        -4 => SocketError::InvalidParam,
        other => SocketError::Unknown(other),
    }
}

pub struct SocketAdapter<'a, IO: Tx + Rx> {
    ctx: &'a RilContext<IO>,
}

impl<'a, IO: Tx + Rx> SocketAdapter<'a, IO> {
    pub fn new(ctx: &'a RilContext<IO>) -> Self {
        Self { ctx }
    }

    /// `AT+QIOPEN=<context_id>,<connect_id>,"<TCP|UDP>","<host>",<remote_port>,<local_port>,0`.
    /// Returns the `(connect_id, err)` pair reported by the `+QIOPEN:` URC-shaped response line.
    pub async fn open(
        &self,
        context_id: u8,
        connect_id: u8,
        socket_type: SocketType,
        host: &str,
        remote_port: u16,
        local_port: u16,
    ) -> Result<(), SocketError> {
        let cmd: heapless::String<100> = format!(100;
            "+QIOPEN={context_id},{connect_id},\"{}\",\"{host}\",{remote_port},{local_port},0",
            socket_type.as_str()
        )
        .map_err(|_| SocketError::Unknown(0))?;
        let mut open_err: Option<i32> = None;
        let outcome = self
            .ctx
            .send(
                &cmd,
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+QIOPEN:") => {
                        open_err = super::parse_csv_field(l, 1);
                        CallbackOutcome::Success
                    }
                    _ => CallbackOutcome::Continue,
                },
                150_000,
            )
            .await
            .map_err(|_| SocketError::Timeout)?;
        self.require(outcome).await?;
        match open_err {
            Some(0) | None => Ok(()),
            Some(code) => Err(map_error(code)),
        }
    }

    /// `AT+QICLOSE=<connect_id>`.
    pub async fn close(&self, connect_id: u8) -> Result<(), SocketError> {
        let cmd: heapless::String<24> = format!(24; "+QICLOSE={connect_id}").map_err(|_| SocketError::Unknown(0))?;
        let outcome = self
            .ctx
            .send(&cmd, false, |frame, _| ok_terminates(frame), 10_000)
            .await
            .map_err(|_| SocketError::Timeout)?;
        self.require(outcome).await
    }

    /// `AT+QISEND=<connect_id>,<len>` (two-phase, prompted) then the raw payload.
    pub async fn send(&self, connect_id: u8, data: &[u8]) -> Result<(), SocketError> {
        let cmd: heapless::String<32> =
            format!(32; "+QISEND={connect_id},{}", data.len()).map_err(|_| SocketError::Unknown(0))?;
        let prompt = self
            .ctx
            .send(&cmd, true, |_, _| CallbackOutcome::Continue, 5_000)
            .await
            .map_err(|_| SocketError::Timeout)?;
        if prompt != Outcome::Success {
            return Err(SocketError::Timeout);
        }
        let outcome = self
            .ctx
            .send_binary(data, |frame, _| ok_terminates(frame), 10_000)
            .await
            .map_err(|_| SocketError::Timeout)?;
        self.require(outcome).await
    }

    /// `AT+QIRD=<connect_id>,<max_len>`: the payload streams in as a `CONNECT n` binary frame.
    pub async fn recv(&self, connect_id: u8, out: &mut [u8]) -> Result<usize, SocketError> {
        let cmd: heapless::String<32> =
            format!(32; "+QIRD={connect_id},{}", out.len()).map_err(|_| SocketError::Unknown(0))?;
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
                10_000,
            )
            .await
            .map_err(|_| SocketError::Timeout)?;
        self.require(outcome).await?;
        Ok(written)
    }

    async fn require(&self, outcome: Outcome) -> Result<(), SocketError> {
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(SocketError::Unknown(self.ctx.get_last_error_code().await as i32)),
            Outcome::Timeout => Err(SocketError::Timeout),
        }
    }
}

fn ok_terminates(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}
