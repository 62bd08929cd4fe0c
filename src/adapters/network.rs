//! Network/registration adapter (spec §4.9), grounded in `ril_network.h`'s `RIL_NW_Error` range
//! (550-574).

use heapless::format;

use super::parse_csv_field;
use crate::context::RilContext;
use crate::engine::{CallbackOutcome, Outcome};
use crate::transport::{Frame, Rx, Tx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkError {
    Timeout,
    OperationBlocked,
    InvalidParameters,
    SocketCreationFailed,
    NotSupported,
    PdpActivationFailed,
    PdpDeactivationFailed,
    DnsFailed,
    SystemBusy,
    ApnNotConfigured,
    Unknown(u16),
}

fn map_error(code: u16) -> NetworkError {
    match code {
        551 => NetworkError::OperationBlocked,
        552 => NetworkError::InvalidParameters,
        554 => NetworkError::SocketCreationFailed,
        555 => NetworkError::NotSupported,
        561 => NetworkError::PdpActivationFailed,
        562 => NetworkError::PdpDeactivationFailed,
        564 | 565 => NetworkError::DnsFailed,
        568 | 574 => NetworkError::SystemBusy,
        569 => NetworkError::Timeout,
        573 => NetworkError::ApnNotConfigured,
        other => NetworkError::Unknown(other),
    }
}

/// `+CREG:`/`+CEREG:` registration status (3GPP TS 27.007 §7.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationStatus {
    NotRegistered,
    RegisteredHome,
    Searching,
    Denied,
    Unknown,
    RegisteredRoaming,
}

impl RegistrationStatus {
    fn from_code(code: u8) -> Self {
        match code {
            1 => RegistrationStatus::RegisteredHome,
            2 => RegistrationStatus::Searching,
            3 => RegistrationStatus::Denied,
            5 => RegistrationStatus::RegisteredRoaming,
            0 => RegistrationStatus::NotRegistered,
            _ => RegistrationStatus::Unknown,
        }
    }
}

/// `AT+CSQ`'s `(rssi, ber)` pair, raw scale (rssi 0-31/99, ber 0-7/99).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalQuality {
    pub rssi: u8,
    pub ber: u8,
}

pub struct NetworkAdapter<'a, IO: Tx + Rx> {
    ctx: &'a RilContext<IO>,
}

impl<'a, IO: Tx + Rx> NetworkAdapter<'a, IO> {
    pub fn new(ctx: &'a RilContext<IO>) -> Self {
        Self { ctx }
    }

    /// `AT+CREG?`: packet-switched circuit registration status.
    pub async fn get_registration(&self) -> Result<RegistrationStatus, NetworkError> {
        self.query_registration("+CREG?", "+CREG:").await
    }

    /// `AT+CEREG?`: EPS (LTE/NB-IoT) registration status.
    pub async fn get_eps_registration(&self) -> Result<RegistrationStatus, NetworkError> {
        self.query_registration("+CEREG?", "+CEREG:").await
    }

    async fn query_registration(&self, cmd: &str, prefix: &str) -> Result<RegistrationStatus, NetworkError> {
        let mut status = None;
        let outcome = self
            .ctx
            .send(
                cmd,
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with(prefix) => {
                        status = parse_csv_field::<u8>(l, 1);
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                5_000,
            )
            .await
            .map_err(|_| NetworkError::Timeout)?;
        self.require(outcome).await?;
        Ok(status.map(RegistrationStatus::from_code).unwrap_or(RegistrationStatus::Unknown))
    }

    /// `AT+CSQ`.
    pub async fn get_signal_quality(&self) -> Result<SignalQuality, NetworkError> {
        let mut quality = None;
        let outcome = self
            .ctx
            .send(
                "+CSQ",
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+CSQ:") => {
                        quality = Some(SignalQuality {
                            rssi: parse_csv_field(l, 0).unwrap_or(99),
                            ber: parse_csv_field(l, 1).unwrap_or(99),
                        });
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                5_000,
            )
            .await
            .map_err(|_| NetworkError::Timeout)?;
        self.require(outcome).await?;
        quality.ok_or(NetworkError::Unknown(0))
    }

    /// `AT+CGDCONT=<cid>,"IP","<apn>"`.
    pub async fn set_apn(&self, cid: u8, apn: &str) -> Result<(), NetworkError> {
        let cmd: heapless::String<100> =
            format!(100; "+CGDCONT={cid},\"IP\",\"{apn}\"").map_err(|_| NetworkError::Unknown(0))?;
        self.run_simple(&cmd).await
    }

    /// `AT+QIACT=<cid>`: activates the PDP context.
    pub async fn open_pdp(&self, cid: u8) -> Result<(), NetworkError> {
        let cmd: heapless::String<24> = format!(24; "+QIACT={cid}").map_err(|_| NetworkError::Unknown(0))?;
        self.run_simple_with_timeout(&cmd, 150_000).await
    }

    /// `AT+QIDEACT=<cid>`: deactivates the PDP context.
    pub async fn close_pdp(&self, cid: u8) -> Result<(), NetworkError> {
        let cmd: heapless::String<24> = format!(24; "+QIDEACT={cid}").map_err(|_| NetworkError::Unknown(0))?;
        self.run_simple_with_timeout(&cmd, 40_000).await
    }

    /// `AT+QIACT?`: the activated context's IP address.
    pub async fn get_ip(&self, cid: u8, out: &mut heapless::String<40>) -> Result<(), NetworkError> {
        out.clear();
        let outcome = self
            .ctx
            .send(
                "+QIACT?",
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+QIACT:") => {
                        if parse_csv_field::<u8>(l, 0) == Some(cid) {
                            if let Some(ip) = super::csv_field(l, 3) {
                                let _ = out.push_str(ip.trim_matches('"'));
                            }
                        }
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                5_000,
            )
            .await
            .map_err(|_| NetworkError::Timeout)?;
        self.require(outcome).await
    }

    /// `AT+COPS?`: the currently selected operator, as its raw string (format 0-2 per mode).
    pub async fn get_operator(&self, out: &mut heapless::String<40>) -> Result<(), NetworkError> {
        out.clear();
        let outcome = self
            .ctx
            .send(
                "+COPS?",
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+COPS:") => {
                        if let Some(op) = super::csv_field(l, 2) {
                            let _ = out.push_str(op.trim_matches('"'));
                        }
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                10_000,
            )
            .await
            .map_err(|_| NetworkError::Timeout)?;
        self.require(outcome).await
    }

    async fn run_simple(&self, cmd: &str) -> Result<(), NetworkError> {
        self.run_simple_with_timeout(cmd, 5_000).await
    }

    async fn run_simple_with_timeout(&self, cmd: &str, timeout_ms: u32) -> Result<(), NetworkError> {
        let outcome = self
            .ctx
            .send(cmd, false, |frame, _| ok_terminates(frame), timeout_ms)
            .await
            .map_err(|_| NetworkError::Timeout)?;
        self.require(outcome).await
    }

    async fn require(&self, outcome: Outcome) -> Result<(), NetworkError> {
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(map_error(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(NetworkError::Timeout),
        }
    }
}

fn ok_terminates(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}
