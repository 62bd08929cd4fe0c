//! MQTT adapter (spec §4.9), grounded in `ril_mqtt_client.h` and the teacher's
//! `bg77/mqtt.rs::MqttClient` (`mqtt_open`/`mqtt_connect`/`send_message` sequencing, `MqttQos`,
//! status-code mapping), generalised away from the teacher's fixed single broker and hardcoded
//! `yar/<mac>/<topic>` topic shape — those are adapter-configuration concerns here, not baked in.

use heapless::format;

use crate::context::RilContext;
use crate::engine::{CallbackOutcome, Outcome};
use crate::transport::{Frame, Rx, Tx};

/// Quality of service for a publish (spec §4.9; QoS 2 is unsupported by the vendor stack).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttQos {
    AtMostOnce = 0,
    AtLeastOnce = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishStatus {
    Published,
    Retrying(u8),
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttError {
    Timeout,
    NotConnected,
    OpenFailed(i8),
    ConnectFailed(i8),
    SubscribeFailed(i8),
    Unknown(u16),
}

pub struct MqttAdapter<'a, IO: Tx + Rx> {
    ctx: &'a RilContext<IO>,
    client_id: u8,
}

impl<'a, IO: Tx + Rx> MqttAdapter<'a, IO> {
    pub fn new(ctx: &'a RilContext<IO>, client_id: u8) -> Self {
        Self { ctx, client_id }
    }

    /// `AT+QMTOPEN=<id>,"<host>",<port>`.
    pub async fn open(&self, host: &str, port: u16) -> Result<(), MqttError> {
        let cmd: heapless::String<100> =
            format!(100; "+QMTOPEN={},\"{host}\",{port}", self.client_id).map_err(|_| MqttError::Unknown(0))?;
        let mut status: Option<i8> = None;
        let outcome = self
            .ctx
            .send(
                &cmd,
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+QMTOPEN:") => {
                        status = super::parse_csv_field(l, 1);
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                15_000,
            )
            .await
            .map_err(|_| MqttError::Timeout)?;
        self.require_success(outcome).await?;
        match status {
            Some(0) | None => Ok(()),
            Some(code) => Err(MqttError::OpenFailed(code)),
        }
    }

    /// `AT+QMTCONN=<id>,"<client id>"`.
    pub async fn connect(&self, client_id_str: &str) -> Result<(), MqttError> {
        let cmd: heapless::String<80> =
            format!(80; "+QMTCONN={},\"{client_id_str}\"", self.client_id).map_err(|_| MqttError::Unknown(0))?;
        let mut result: Option<(u32, i8)> = None;
        let outcome = self
            .ctx
            .send(
                &cmd,
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+QMTCONN:") => {
                        result = Some((
                            super::parse_csv_field(l, 1).unwrap_or(0),
                            super::parse_csv_field(l, 2).unwrap_or(-1),
                        ));
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                40_000,
            )
            .await
            .map_err(|_| MqttError::Timeout)?;
        self.require_success(outcome).await?;
        match result {
            Some((_, 0)) | None => Ok(()),
            Some((_, reason)) => Err(MqttError::ConnectFailed(reason)),
        }
    }

    /// `AT+QMTSUB=<id>,<msgid>,"<topic>",<qos>`. The `+QMTSUB:` response's third field is 0 on
    /// success, 1 or 2 on failure (retransmission exhausted / subscribe rejected).
    pub async fn subscribe(&self, msg_id: u16, topic: &str, qos: MqttQos) -> Result<(), MqttError> {
        let cmd: heapless::String<140> =
            format!(140; "+QMTSUB={},{msg_id},\"{topic}\",{}", self.client_id, qos as u8)
                .map_err(|_| MqttError::Unknown(0))?;
        let mut result: Option<i8> = None;
        let outcome = self
            .ctx
            .send(
                &cmd,
                false,
                |frame, _| match frame {
                    Frame::Line(l) if l.starts_with("+QMTSUB:") => {
                        result = super::parse_csv_field(l, 2);
                        CallbackOutcome::Continue
                    }
                    Frame::Line("OK") => CallbackOutcome::Success,
                    _ => CallbackOutcome::Continue,
                },
                15_000,
            )
            .await
            .map_err(|_| MqttError::Timeout)?;
        self.require_success(outcome).await?;
        match result {
            Some(0) | None => Ok(()),
            Some(code) => Err(MqttError::SubscribeFailed(code)),
        }
    }

    /// `AT+QMTPUBEX=<id>,<msgid>,<qos>,0,"<topic>",<len>` (two-phase, prompt then binary).
    pub async fn publish(
        &self,
        msg_id: u16,
        topic: &str,
        payload: &[u8],
        qos: MqttQos,
    ) -> Result<(), MqttError> {
        let cmd: heapless::String<160> = format!(160;
            "+QMTPUBEX={},{msg_id},{},0,\"{topic}\",{}",
            self.client_id,
            qos as u8,
            payload.len()
        )
        .map_err(|_| MqttError::Unknown(0))?;
        let prompt = self
            .ctx
            .send(&cmd, true, |_, _| CallbackOutcome::Continue, 5_000)
            .await
            .map_err(|_| MqttError::Timeout)?;
        self.require_success(prompt).await?;

        let outcome = self
            .ctx
            .send_binary(payload, |frame, _| ok_terminates(frame), 10_000)
            .await
            .map_err(|_| MqttError::Timeout)?;
        self.require_success(outcome).await
    }

    /// `AT+QMTDISC=<id>` then `AT+QMTCLOSE=<id>`, matching the teacher's disconnect sequencing.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        let cmd: heapless::String<24> =
            format!(24; "+QMTDISC={}", self.client_id).map_err(|_| MqttError::Unknown(0))?;
        let outcome = self
            .ctx
            .send(&cmd, false, |frame, _| ok_terminates(frame), 10_000)
            .await
            .map_err(|_| MqttError::Timeout)?;
        self.require_success(outcome).await?;

        let cmd: heapless::String<24> =
            format!(24; "+QMTCLOSE={}", self.client_id).map_err(|_| MqttError::Unknown(0))?;
        let outcome = self
            .ctx
            .send(&cmd, false, |frame, _| ok_terminates(frame), 5_000)
            .await
            .map_err(|_| MqttError::Timeout)?;
        self.require_success(outcome).await
    }

    /// Translates a `+QMTPUB`/`+QMTPUBEX` URC's trailing status field (spec §4.7 registry).
    pub fn publish_status(retries: Option<u8>, status: u8) -> PublishStatus {
        match status {
            0 => PublishStatus::Published,
            1 => PublishStatus::Retrying(retries.unwrap_or(0)),
            _ => PublishStatus::Timeout,
        }
    }

    async fn require_success(&self, outcome: Outcome) -> Result<(), MqttError> {
        match outcome {
            Outcome::Success => Ok(()),
            Outcome::Failed => Err(MqttError::Unknown(self.ctx.get_last_error_code().await)),
            Outcome::Timeout => Err(MqttError::Timeout),
        }
    }
}

fn ok_terminates(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}
