//! Lifecycle Controller (spec §4.4): initial probe, echo/verbose configuration, URC activation,
//! power-cycle-and-retry on failure.

use embassy_time::{Duration, Timer};

use crate::config::{Config, InitResult, PowerCmd};
use crate::engine::{CallbackOutcome, Engine, Outcome};
use crate::transport::{Frame, Rx, Tx};
use crate::urc::URC_REGISTRY;

#[cfg(feature = "defmt")]
use defmt::info;
#[cfg(not(feature = "defmt"))]
use log::info;

/// Stateless driver of the init/deinit algorithm; `RilContext` owns the actual `Engine`.
pub struct LifecycleController;

impl LifecycleController {
    /// `init` (spec §4.4). Up to 3 attempts; the first successful sync-and-configure still
    /// triggers a `RESTART` and a retry before reporting `Success` — the source does this
    /// unconditionally to normalise boot state (spec §9 open question; preserved, not "fixed").
    pub async fn init<IO: Tx + Rx>(
        engine: &mut Engine<IO>,
        config: &Config,
        mut power_command: impl FnMut(PowerCmd),
        urc_subscribed: bool,
    ) -> crate::Result<InitResult> {
        let mut first_attempt = true;
        for _ in 0..3 {
            if Self::sync(engine, config).await? {
                Self::configure(engine, config, urc_subscribed).await?;
                if first_attempt {
                    first_attempt = false;
                    info!("first AT sync succeeded, power-cycling to normalise boot state");
                    power_command(PowerCmd::Restart);
                    Timer::after_millis(config.post_powercycle_delay_ms as u64).await;
                    continue;
                }
                return Ok(InitResult::Success);
            }
            first_attempt = false;
            power_command(PowerCmd::Restart);
            Timer::after_millis(config.post_powercycle_delay_ms as u64).await;
        }
        Ok(InitResult::Timeout)
    }

    /// `deinit` (spec §4.4): reapplies configuration after a spontaneous modem reset, without a
    /// power cycle.
    pub async fn deinit<IO: Tx + Rx>(
        engine: &mut Engine<IO>,
        config: &Config,
        urc_subscribed: bool,
    ) -> crate::Result<InitResult> {
        for _ in 0..config.init_retry_count {
            if Self::sync(engine, config).await? {
                Self::configure(engine, config, urc_subscribed).await?;
                return Ok(InitResult::Success);
            }
        }
        Ok(InitResult::Timeout)
    }

    /// AT sync: send plain `AT` up to `init_retry_count` times at 500 ms intervals.
    async fn sync<IO: Tx + Rx>(engine: &mut Engine<IO>, config: &Config) -> crate::Result<bool> {
        for _ in 0..config.init_retry_count {
            let outcome = engine
                .send("", false, |frame, _| ok_terminates(frame), Duration::from_millis(500))
                .await?;
            if outcome == Outcome::Success {
                return Ok(true);
            }
            Timer::after_millis(500).await;
        }
        Ok(false)
    }

    /// `ATE1`, `AT+CMEE=1`, `ATV1`, then URC activation if a subscriber is registered.
    async fn configure<IO: Tx + Rx>(
        engine: &mut Engine<IO>,
        config: &Config,
        urc_subscribed: bool,
    ) -> crate::Result<()> {
        Self::simple_command(engine, "E1", config).await?;
        Self::simple_command(engine, "+CMEE=1", config).await?;
        Self::simple_command(engine, "V1", config).await?;
        if urc_subscribed {
            Self::simple_command(engine, "+QURCCFG=\"urcport\",\"uart1\"", config).await?;
            for descriptor in URC_REGISTRY.iter().filter(|d| d.needs_activation) {
                if let Some(cmd) = descriptor.activation_cmd {
                    Self::simple_command(engine, cmd, config).await?;
                }
            }
        }
        Ok(())
    }

    async fn simple_command<IO: Tx + Rx>(
        engine: &mut Engine<IO>,
        cmd: &str,
        config: &Config,
    ) -> crate::Result<()> {
        engine
            .send(
                cmd,
                false,
                |frame, _| ok_terminates(frame),
                Duration::from_millis(config.default_cmd_timeout_ms as u64),
            )
            .await?;
        Ok(())
    }
}

fn ok_terminates(frame: Frame<'_>) -> CallbackOutcome {
    match frame {
        Frame::Line("OK") => CallbackOutcome::Success,
        _ => CallbackOutcome::Continue,
    }
}

#[cfg(test)]
mod test_lifecycle {
    use super::*;
    use crate::transport::FrameKind;
    use embassy_futures::block_on;
    use heapless::Deque;

    struct FakeIo {
        lines: Deque<&'static str, 32>,
    }

    impl FakeIo {
        fn new(lines: &[&'static str]) -> Self {
            let mut d = Deque::new();
            for l in lines {
                d.push_back(l).unwrap();
            }
            Self { lines: d }
        }
    }

    impl Tx for FakeIo {
        async fn write(&mut self, _buffer: &[u8]) -> crate::Result<()> {
            Ok(())
        }
    }

    impl Rx for FakeIo {
        async fn read_frame(
            &mut self,
            kind: FrameKind,
            scratch: &mut [u8],
        ) -> crate::Result<Option<usize>> {
            if !matches!(kind, FrameKind::Line) {
                return Ok(None);
            }
            match self.lines.pop_front() {
                Some(line) => {
                    scratch[..line.len()].copy_from_slice(line.as_bytes());
                    Ok(Some(line.len()))
                }
                None => Ok(None),
            }
        }
    }

    #[test]
    fn init_happy_path_power_cycles_once_then_succeeds() {
        // Two full sync-and-configure passes: OK x4 (AT, ATE1, CMEE, ATV1), restart, OK x4 again.
        let io = FakeIo::new(&["OK", "OK", "OK", "OK", "OK", "OK", "OK", "OK"]);
        let mut engine = Engine::new(io);
        let config = Config::default();
        let mut restarts = 0u32;
        let result = block_on(LifecycleController::init(
            &mut engine,
            &config,
            |cmd| {
                assert_eq!(cmd, PowerCmd::Restart);
                restarts += 1;
            },
            false,
        ))
        .unwrap();
        assert_eq!(result, InitResult::Success);
        assert_eq!(restarts, 1);
    }

    #[test]
    fn init_times_out_when_modem_never_responds() {
        let io = FakeIo::new(&[]);
        let mut engine = Engine::new(io);
        let mut config = Config::default();
        config.init_retry_count = 1;
        let result = block_on(LifecycleController::init(&mut engine, &config, |_| {}, false)).unwrap();
        assert_eq!(result, InitResult::Timeout);
    }
}
