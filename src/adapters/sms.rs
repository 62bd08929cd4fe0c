//! SMS adapter (spec §4.9), grounded in `original_source/SourceCode/src/ril_sms.c`'s
//! `HDLR_TYPE_CPMS_*`/`HDLR_TYPE_CMGR_PDU_CMD`/`HDLR_TYPE_CMGS_PDU_CMD` command dispatch, reusing
//! the PDU codec in [`crate::pdu`].

use heapless::{format, Vec};

use crate::context::RilContext;
use crate::engine::{CallbackOutcome, Outcome};
use crate::pdu::{self, address::PhoneNumber, hex, DecodedPdu, SubmitParams};
use crate::transport::{Frame, Rx, Tx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SmsError {
    Busy,
    Timeout,
    NotFound,
    StorageFull,
    Unknown(u16),
}

fn map_error(code: u16) -> SmsError {
    match code {
        1 | 322 => SmsError::StorageFull,
        321 => SmsError::NotFound,
        _ => SmsError::Unknown(code),
    }
}

pub struct SmsAdapter<'a, IO: Tx + Rx> {
    ctx: &'a RilContext<IO>,
}

impl<'a, IO: Tx + Rx> SmsAdapter<'a, IO> {
    pub fn new(ctx: &'a RilContext<IO>) -> Self {
        Self { ctx }
    }

    /// `AT+CPMS=...`: selects the preferred message storage (e.g. `"ME","ME","ME"`).
    pub async fn set_storage(&self, storage: &str) -> Result<(), SmsError> {
        let cmd: heapless::String<40> = format!(40; "+CPMS={storage}").map_err(|_| SmsError::Unknown(0))?;
        self.run_simple(&cmd).await
    }

    /// `AT+CMGR=<index>` in PDU mode: reads and decodes a stored message.
    pub async fn read_pdu(&self, index: u32) -> Result<DecodedPdu, SmsError> {
        let cmd: heapless::String<24> = format!(24; "+CMGR={index}").map_err(|_| SmsError::Unknown(0))?;
        let mut hex_line: Option<heapless::String<400>> = None;
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
                        if l.starts_with("+CMGR:") {
                            return CallbackOutcome::Continue;
                        }
                        // The line after +CMGR: is the raw PDU hex string.
                        if hex_line.is_none() && !l.is_empty() {
                            hex_line = heapless::String::try_from(l).ok();
                        }
                    }
                    CallbackOutcome::Continue
                },
                5_000,
            )
            .await
            .map_err(|_| SmsError::Timeout)?;

        match outcome {
            Outcome::Success => {
                let hex_str = hex_line.ok_or(SmsError::Unknown(0))?;
                let octets: Vec<u8, { pdu::MAX_PDU_OCTETS }> =
                    hex::hex_str_to_octets(hex_str.as_bytes()).map_err(|_| SmsError::Unknown(0))?;
                pdu::decode(&octets).map_err(|_| SmsError::Unknown(0))
            }
            Outcome::Failed => Err(map_error(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(SmsError::Timeout),
        }
    }

    /// `AT+CMGS=<len>` (two-phase, prompted) then the raw PDU bytes.
    pub async fn send_pdu(
        &self,
        destination: PhoneNumber,
        text: &str,
        message_reference: u8,
    ) -> Result<(), SmsError> {
        let mut encoded = Vec::<u8, { pdu::MAX_PDU_OCTETS }>::new();
        let params = SubmitParams {
            message_reference,
            destination,
            validity_period: pdu::DEFAULT_VALIDITY_PERIOD,
            text,
        };
        pdu::encode_submit(&params, &mut encoded).map_err(|_| SmsError::Unknown(0))?;

        // TPDU length in octets, excluding the (zero-length, omitted) SMSC prefix byte.
        let tpdu_len = encoded.len() - 1;
        let cmd: heapless::String<24> = format!(24; "+CMGS={tpdu_len}").map_err(|_| SmsError::Unknown(0))?;
        let prompt_outcome = self
            .ctx
            .send(&cmd, true, |_, _| CallbackOutcome::Continue, 5_000)
            .await
            .map_err(|_| SmsError::Timeout)?;
        if prompt_outcome != Outcome::Success {
            return Err(SmsError::Timeout);
        }

        let hex_pdu: Vec<u8, { pdu::MAX_PDU_OCTETS * 2 }> =
            hex::octets_to_hex_str(&encoded).map_err(|_| SmsError::Unknown(0))?;
        let mut payload = Vec::<u8, { pdu::MAX_PDU_OCTETS * 2 + 1 }>::new();
        payload.extend_from_slice(&hex_pdu).map_err(|_| SmsError::Unknown(0))?;
        payload.push(0x1A).map_err(|_| SmsError::Unknown(0))?; // Ctrl-Z terminator

        let outcome = self
            .ctx
            .send_binary(&payload, |frame, _| frame_terminates(frame), 15_000)
            .await
            .map_err(|_| SmsError::Timeout)?;
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(map_error(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(SmsError::Timeout),
        }
    }

    /// `AT+CMGD=<index>`.
    pub async fn delete(&self, index: u32) -> Result<(), SmsError> {
        let cmd: heapless::String<24> = format!(24; "+CMGD={index}").map_err(|_| SmsError::Unknown(0))?;
        self.run_simple(&cmd).await
    }

    async fn run_simple(&self, cmd: &str) -> Result<(), SmsError> {
        let outcome = self
            .ctx
            .send(cmd, false, |frame, _| frame_terminates(frame), 5_000)
            .await
            .map_err(|_| SmsError::Timeout)?;
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(map_error(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(SmsError::Timeout),
        }
    }
}

fn frame_terminates(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}
