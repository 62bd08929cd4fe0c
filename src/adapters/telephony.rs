//! Voice call adapter (spec §4.9), grounded in `ril_telephony.h`'s `RIL_Telephony_Dial`/
//! `_Answer`/`_Hangup` and `Enum_CallState`. Inbound-call notification rides the `+CLIP`/`+CRING`/
//! `+COLP` URCs already in the registry (spec §4.7).

use heapless::format;

use crate::context::RilContext;
use crate::engine::{CallbackOutcome, Outcome};
use crate::transport::{Frame, Rx, Tx};

/// Mirrors `Enum_CallState`: the final line a dial attempt settles on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallState {
    Connected,
    Busy,
    NoAnswer,
    NoCarrier,
    NoDialtone,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelephonyError {
    Timeout,
    Unknown(u16),
}

pub struct TelephonyAdapter<'a, IO: Tx + Rx> {
    ctx: &'a RilContext<IO>,
}

impl<'a, IO: Tx + Rx> TelephonyAdapter<'a, IO> {
    pub fn new(ctx: &'a RilContext<IO>) -> Self {
        Self { ctx }
    }

    /// `ATD<number>;`: voice call only, per `RIL_Telephony_Dial`'s `type` parameter being fixed.
    pub async fn dial(&self, number: &str) -> Result<CallState, TelephonyError> {
        let cmd: heapless::String<48> = format!(48; "D{number};").map_err(|_| TelephonyError::Unknown(0))?;
        let mut state = CallState::Connected;
        let outcome = self
            .ctx
            .send(
                &cmd,
                false,
                |frame, _| match frame {
                    Frame::Line("OK") => CallbackOutcome::Success,
                    Frame::Line("BUSY") => {
                        state = CallState::Busy;
                        CallbackOutcome::Success
                    }
                    Frame::Line("NO ANSWER") => {
                        state = CallState::NoAnswer;
                        CallbackOutcome::Success
                    }
                    Frame::Line("NO CARRIER") => {
                        state = CallState::NoCarrier;
                        CallbackOutcome::Success
                    }
                    Frame::Line("NO DIALTONE") => {
                        state = CallState::NoDialtone;
                        CallbackOutcome::Success
                    }
                    _ => CallbackOutcome::Continue,
                },
                60_000,
            )
            .await
            .map_err(|_| TelephonyError::Timeout)?;
        match outcome {
            Outcome::Success => Ok(state),
            Outcome::Failed => Err(TelephonyError::Unknown(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(TelephonyError::Timeout),
        }
    }

    /// `ATA`: answers an incoming call signalled by a `+CRING`/`+CLIP` URC.
    pub async fn answer(&self) -> Result<(), TelephonyError> {
        self.run_simple("A").await
    }

    /// `ATH`: ends the active or ringing call.
    pub async fn hangup(&self) -> Result<(), TelephonyError> {
        self.run_simple("H").await
    }

    async fn run_simple(&self, cmd: &str) -> Result<(), TelephonyError> {
        let outcome = self
            .ctx
            .send(cmd, false, |frame, _| ok_terminates(frame), 10_000)
            .await
            .map_err(|_| TelephonyError::Timeout)?;
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(TelephonyError::Unknown(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(TelephonyError::Timeout),
        }
    }
}

fn ok_terminates(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}
