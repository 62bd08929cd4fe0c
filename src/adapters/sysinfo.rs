//! System/SIM/clock adapter (spec §4.9), grounded in `ril_system.h`, `ril_sim.h` and
//! `ril_dateTime.h`.

use heapless::{format, String};

use super::csv_field;
use crate::context::RilContext;
use crate::engine::{CallbackOutcome, Outcome};
use crate::transport::{Frame, Rx, Tx};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysinfoError {
    Timeout,
    Unknown(u16),
}

/// Mirrors `Enum_SIMState`, collapsed to the states `AT+CPIN?` actually reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimState {
    Ready,
    PinRequired,
    PukRequired,
    PhSimPinRequired,
    PhSimPukRequired,
    Pin2Required,
    Puk2Required,
    Unspecified,
}

fn sim_state_from_text(text: &str) -> SimState {
    match text {
        "READY" => SimState::Ready,
        "SIM PIN" => SimState::PinRequired,
        "SIM PUK" => SimState::PukRequired,
        "PH-SIM PIN" => SimState::PhSimPinRequired,
        "PH-SIM PUK" => SimState::PhSimPukRequired,
        "SIM PIN2" => SimState::Pin2Required,
        "SIM PUK2" => SimState::Puk2Required,
        _ => SimState::Unspecified,
    }
}

/// `AT+CBC`'s `(capacity_pct, voltage_mv)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerSupply {
    pub capacity_pct: u32,
    pub voltage_mv: u32,
}

/// `AT+CCLK?`'s `"yy/MM/dd,hh:mm:ss±zz"` reading, kept in its native fields rather than forced
/// through [`crate::pdu::timestamp`] (that module decodes the PDU's binary SCTS octets, a
/// different wire shape from this text response).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleDateTime {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub tz_quarter_hours: i8,
}

pub struct SysinfoAdapter<'a, IO: Tx + Rx> {
    ctx: &'a RilContext<IO>,
}

impl<'a, IO: Tx + Rx> SysinfoAdapter<'a, IO> {
    pub fn new(ctx: &'a RilContext<IO>) -> Self {
        Self { ctx }
    }

    /// `AT+CBC`.
    pub async fn get_power_supply(&self) -> Result<PowerSupply, SysinfoError> {
        let mut result = None;
        let outcome = self
            .ctx
            .send(
                "+CBC",
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+CBC:") => {
                        result = Some(PowerSupply {
                            capacity_pct: super::parse_csv_field(l, 1).unwrap_or(0),
                            voltage_mv: super::parse_csv_field(l, 2).unwrap_or(0),
                        });
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                5_000,
            )
            .await
            .map_err(|_| SysinfoError::Timeout)?;
        self.require(outcome).await?;
        result.ok_or(SysinfoError::Unknown(0))
    }

    /// `AT+GSN`.
    pub async fn get_imei(&self, out: &mut String<20>) -> Result<(), SysinfoError> {
        self.read_bare_line("+GSN", out).await
    }

    /// `AT+QGMR`.
    pub async fn get_firmware_version(&self, out: &mut String<40>) -> Result<(), SysinfoError> {
        self.read_bare_line("+QGMR", out).await
    }

    /// `AT+CGMI`.
    pub async fn get_manufacturer(&self, out: &mut String<40>) -> Result<(), SysinfoError> {
        self.read_bare_line("+CGMI", out).await
    }

    /// `AT+CGMM`.
    pub async fn get_model(&self, out: &mut String<40>) -> Result<(), SysinfoError> {
        self.read_bare_line("+CGMM", out).await
    }

    /// `AT+QCCID`.
    pub async fn get_ccid(&self, out: &mut String<24>) -> Result<(), SysinfoError> {
        self.read_bare_line("+QCCID", out).await
    }

    /// `AT+CIMI`.
    pub async fn get_imsi(&self, out: &mut String<16>) -> Result<(), SysinfoError> {
        self.read_bare_line("+CIMI", out).await
    }

    /// `AT+CPIN?`.
    pub async fn get_sim_state(&self) -> Result<SimState, SysinfoError> {
        let mut state = SimState::Unspecified;
        let outcome = self
            .ctx
            .send(
                "+CPIN?",
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+CPIN:") => {
                        state = sim_state_from_text(l["+CPIN:".len()..].trim());
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                5_000,
            )
            .await
            .map_err(|_| SysinfoError::Timeout)?;
        self.require(outcome).await?;
        Ok(state)
    }

    /// `AT+CCLK?`.
    pub async fn get_datetime(&self) -> Result<ModuleDateTime, SysinfoError> {
        let mut result = None;
        let outcome = self
            .ctx
            .send(
                "+CCLK?",
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+CCLK:") => {
                        result = parse_cclk(l);
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                5_000,
            )
            .await
            .map_err(|_| SysinfoError::Timeout)?;
        self.require(outcome).await?;
        result.ok_or(SysinfoError::Unknown(0))
    }

    /// `AT+CCLK="yy/MM/dd,hh:mm:ss±zz"`.
    pub async fn set_datetime(&self, dt: &ModuleDateTime) -> Result<(), SysinfoError> {
        let sign = if dt.tz_quarter_hours < 0 { '-' } else { '+' };
        let tz = dt.tz_quarter_hours.unsigned_abs();
        let cmd: heapless::String<48> = format!(48;
            "+CCLK=\"{:02}/{:02}/{:02},{:02}:{:02}:{:02}{sign}{tz:02}\"",
            dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
        )
        .map_err(|_| SysinfoError::Unknown(0))?;
        let outcome = self
            .ctx
            .send(&cmd, false, |frame, _| ok_terminates(frame), 5_000)
            .await
            .map_err(|_| SysinfoError::Timeout)?;
        self.require(outcome).await
    }

    async fn read_bare_line<const N: usize>(&self, cmd: &str, out: &mut String<N>) -> Result<(), SysinfoError> {
        out.clear();
        let outcome = self
            .ctx
            .send(
                cmd,
                false,
                |frame, _| match frame {
                    Frame::Line("OK") => CallbackOutcome::Success,
                    Frame::Line(l) if !l.is_empty() && !l.starts_with('+') => {
                        let _ = out.push_str(l);
                        CallbackOutcome::Continue
                    }
                    Frame::Line(l) if l.starts_with('+') => {
                        if let Some(value) = csv_field(l, 0) {
                            let _ = out.push_str(value.trim_matches('"'));
                        }
                        CallbackOutcome::Continue
                    }
                    _ => CallbackOutcome::Continue,
                },
                5_000,
            )
            .await
            .map_err(|_| SysinfoError::Timeout)?;
        self.require(outcome).await
    }

    async fn require(&self, outcome: Outcome) -> Result<(), SysinfoError> {
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(SysinfoError::Unknown(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(SysinfoError::Timeout),
        }
    }
}

fn parse_cclk(line: &str) -> Option<ModuleDateTime> {
    let body = csv_field(line, 0)?;
    let body = body.trim_matches('"');
    let (date, rest) = body.split_once(',')?;
    let mut date_parts = date.split('/');
    let year = date_parts.next()?.parse().ok()?;
    let month = date_parts.next()?.parse().ok()?;
    let day = date_parts.next()?.parse().ok()?;

    let sign_pos = rest.rfind(['+', '-'])?;
    let (time, tz) = rest.split_at(sign_pos);
    let mut time_parts = time.split(':');
    let hour = time_parts.next()?.parse().ok()?;
    let minute = time_parts.next()?.parse().ok()?;
    let second = time_parts.next()?.parse().ok()?;
    let quarters: i8 = tz[1..].parse().ok()?;
    let tz_quarter_hours = if tz.starts_with('-') { -quarters } else { quarters };

    Some(ModuleDateTime { year, month, day, hour, minute, second, tz_quarter_hours })
}

fn ok_terminates(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}

#[cfg(test)]
mod test_sysinfo {
    use super::*;

    #[test]
    fn parses_cclk_with_negative_timezone() {
        let dt = parse_cclk("+CCLK: \"24/03/15,12:30:00-08\"").unwrap();
        assert_eq!(dt.year, 24);
        assert_eq!(dt.month, 3);
        assert_eq!(dt.day, 15);
        assert_eq!(dt.hour, 12);
        assert_eq!(dt.tz_quarter_hours, -8);
    }

    #[test]
    fn sim_state_maps_known_strings() {
        assert_eq!(sim_state_from_text("READY"), SimState::Ready);
        assert_eq!(sim_state_from_text("SIM PIN"), SimState::PinRequired);
        assert_eq!(sim_state_from_text("bogus"), SimState::Unspecified);
    }
}
