//! Command Engine (spec §4.3, §4.3.1, §4.3.2): the core contract.
//!
//! `Engine` itself is not synchronized — `RilContext` wraps it in an `embassy_sync::mutex::Mutex`
//! and that mutex lock *is* the `BUSY` state (spec §3 invariant 1: "state == BUSY iff a command
//! owns the mutex"). `get_state()` on the context is implemented as a `try_lock` probe rather than
//! a separate flag, so the invariant is true by construction instead of by convention.
//!
//! The engine is generic over one `IO: Tx + Rx` type rather than separate TX/RX type parameters;
//! a peripheral that splits into independent halves is wrapped in a small struct implementing
//! both traits by delegating to each half (spec §9: "model as an interface... rather than an
//! inheritance hierarchy").

use core::fmt::Write as _;
use embassy_time::{Duration, Instant, Timer};
use heapless::String;

use crate::error::Error;
use crate::transport::{Frame, FrameKind, Rx, Tx};

#[cfg(feature = "defmt")]
use defmt::debug;
#[cfg(not(feature = "defmt"))]
use log::debug;

/// Longest AT command line this engine will compose (`AT` + body + CRLF).
pub const CMD_BUFFER_SIZE: usize = 128;
/// Scratch buffer for one received line or prompt.
pub const LINE_BUF_SIZE: usize = 256;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const BINARY_WRITE_STALL_LIMIT: u32 = 500; // 500 * 10ms = 5s (spec §4.3.1 step 2)
const BINARY_DRAIN_STALL_LIMIT: u32 = 100; // 100 * 10ms = 1s (spec §4.3.1 step 3)

/// `mode` (spec §3): `NORMAL` or `BINARY(n)` with `n` the expected byte count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Normal,
    Binary(usize),
}

/// What `send`/`send_binary` return to the adapter (spec §7, minus `Uninitialized`/`Busy`, which
/// the context layer reports before the engine is ever reached).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Success,
    Failed,
    Timeout,
}

/// What a response callback reports about one line or binary payload (spec §9: "visitor pattern
/// driven by the engine... preserve it as-is").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackOutcome {
    Continue,
    Success,
    Failed,
}

/// Handed to the response callback so it can switch framing into `BINARY(n)` after observing a
/// `CONNECT n` line. This is the only documented way to enter binary mode (spec §4.3 tie-breaks,
/// §9 open question).
pub struct ModeSwitch<'e> {
    mode: &'e mut Mode,
}

impl<'e> ModeSwitch<'e> {
    pub fn set_binary_mode(&mut self, n: usize) {
        *self.mode = Mode::Binary(n);
    }

    pub fn set_normal_mode(&mut self) {
        *self.mode = Mode::Normal;
    }
}

/// Parses a `+CME ERROR: n` or `+CMS ERROR: n` line into its numeric code (spec §4.3 step 5a).
fn parse_cme_cms_error(line: &str) -> Option<u16> {
    let rest = line.strip_prefix("+CME ERROR:").or_else(|| line.strip_prefix("+CMS ERROR:"))?;
    rest.trim().parse::<u16>().ok()
}

/// The half-duplex AT command engine: one transport, one command in flight at a time.
pub struct Engine<IO: Tx + Rx> {
    io: IO,
    mode: Mode,
    last_error_code: u16,
}

impl<IO: Tx + Rx> Engine<IO> {
    pub fn new(io: IO) -> Self {
        Self { io, mode: Mode::Normal, last_error_code: 0 }
    }

    pub fn get_operation_mode(&self) -> (Mode, usize) {
        match self.mode {
            Mode::Normal => (Mode::Normal, 0),
            Mode::Binary(n) => (Mode::Binary(n), n),
        }
    }

    pub fn get_last_error_code(&self) -> u16 {
        self.last_error_code
    }

    pub fn set_last_error_code(&mut self, code: u16) {
        self.last_error_code = code;
    }

    /// One non-blocking line read, for the URC dispatcher's cooperative pump (spec §4.5): returns
    /// `Ok(None)` immediately if no complete line is buffered rather than waiting.
    pub async fn try_read_line<'s>(&mut self, scratch: &'s mut [u8]) -> crate::Result<Option<&'s str>> {
        match self.io.read_frame(FrameKind::Line, scratch).await {
            Ok(Some(n)) => {
                let raw = &scratch[..n];
                let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
                let n = raw.len();
                match core::str::from_utf8(&scratch[..n]) {
                    Ok(s) => Ok(Some(s)),
                    Err(_) => Err(Error::StringEncodingError),
                }
            }
            _ => Ok(None),
        }
    }

    /// `send(cmd, wait_for_prompt, response_cb, timeout) -> Outcome` (spec §4.3).
    ///
    /// `cmd` is the command body without the leading `AT` or trailing CRLF; the engine adds both.
    pub async fn send(
        &mut self,
        cmd: &str,
        wait_for_prompt: bool,
        response_cb: impl FnMut(Frame<'_>, &mut ModeSwitch) -> CallbackOutcome,
        timeout: Duration,
    ) -> crate::Result<Outcome> {
        self.last_error_code = 0;
        self.mode = Mode::Normal;

        let mut wire = String::<CMD_BUFFER_SIZE>::new();
        write!(wire, "AT{cmd}").map_err(|_| Error::BufferTooSmallError)?;
        let echo_len = wire.len();
        wire.push_str("\r\n").map_err(|_| Error::BufferTooSmallError)?;

        if self.io.write(wire.as_bytes()).await.is_err() {
            return Ok(Outcome::Failed);
        }

        let deadline = Instant::now() + if timeout.as_millis() == 0 { DEFAULT_TIMEOUT } else { timeout };

        if wait_for_prompt {
            return self.await_prompt(deadline).await;
        }

        let echo = Some(&wire[..echo_len]);
        let outcome = self.collect_response(echo, response_cb, deadline).await;
        self.mode = Mode::Normal;
        outcome
    }

    /// `send_binary(data, response_cb, timeout) -> Outcome` (spec §4.3.1): sends a raw payload
    /// already announced by a preceding prompted `send`.
    pub async fn send_binary(
        &mut self,
        data: &[u8],
        response_cb: impl FnMut(Frame<'_>, &mut ModeSwitch) -> CallbackOutcome,
        timeout: Duration,
    ) -> crate::Result<Outcome> {
        if self.write_chunked(data).await.is_err() {
            return Ok(Outcome::Failed);
        }
        if self.drain().await.is_err() {
            return Ok(Outcome::Failed);
        }

        let deadline = Instant::now() + if timeout.as_millis() == 0 { DEFAULT_TIMEOUT } else { timeout };
        let outcome = self.collect_response(None, response_cb, deadline).await;
        self.mode = Mode::Normal;
        outcome
    }

    async fn write_chunked(&mut self, data: &[u8]) -> crate::Result<()> {
        let mut offset = 0usize;
        let mut stalled_ticks = 0u32;
        while offset < data.len() {
            let free = self.io.tx_free_space() as usize;
            if free == 0 {
                stalled_ticks += 1;
                if stalled_ticks > BINARY_WRITE_STALL_LIMIT {
                    return Err(Error::Timeout);
                }
                Timer::after_millis(10).await;
                continue;
            }
            stalled_ticks = 0;
            let chunk_len = free.min(data.len() - offset);
            self.io.write(&data[offset..offset + chunk_len]).await?;
            offset += chunk_len;
        }
        Ok(())
    }

    async fn drain(&mut self) -> crate::Result<()> {
        let mut last_pending = self.io.pending_tx_bytes();
        let mut unchanged_ticks = 0u32;
        loop {
            let pending = self.io.pending_tx_bytes();
            if pending == 0 {
                return Ok(());
            }
            if pending == last_pending {
                unchanged_ticks += 1;
                if unchanged_ticks >= BINARY_DRAIN_STALL_LIMIT {
                    return Err(Error::Timeout);
                }
            } else {
                unchanged_ticks = 0;
                last_pending = pending;
            }
            Timer::after_millis(10).await;
        }
    }

    async fn await_prompt(&mut self, deadline: Instant) -> crate::Result<Outcome> {
        loop {
            if Instant::now() >= deadline {
                return Ok(Outcome::Timeout);
            }
            let mut scratch = [0u8; LINE_BUF_SIZE];
            match self.io.read_frame(FrameKind::Prompt, &mut scratch).await {
                Ok(Some(_)) => return Ok(Outcome::Success),
                _ => Timer::after_millis(1).await,
            }
        }
    }

    /// Shared read/dispatch loop for `send`'s NORMAL/BINARY steps and all of `send_binary`.
    ///
    /// `echo`, when set, is the literal echoed command text; the first line that matches it is
    /// swallowed and the echo flag latches (spec §9: the second occurrence is a response line).
    async fn collect_response(
        &mut self,
        mut echo: Option<&str>,
        mut response_cb: impl FnMut(Frame<'_>, &mut ModeSwitch) -> CallbackOutcome,
        deadline: Instant,
    ) -> crate::Result<Outcome> {
        loop {
            if Instant::now() >= deadline {
                return Ok(Outcome::Timeout);
            }

            let kind = match self.mode {
                Mode::Normal => FrameKind::Line,
                Mode::Binary(n) => FrameKind::Binary(n),
            };
            let mut scratch = [0u8; LINE_BUF_SIZE];
            let read = self.io.read_frame(kind, &mut scratch).await;
            let n = match read {
                Ok(Some(n)) => n,
                Ok(None) => {
                    Timer::after_millis(1).await;
                    continue;
                }
                Err(_) => {
                    // RX error: reset, treat as "no line this tick" (spec §4.1).
                    Timer::after_millis(1).await;
                    continue;
                }
            };
            let frame = match IO::decode(kind, &scratch, n) {
                Ok(f) => f,
                Err(_) => continue,
            };

            match frame {
                Frame::Line(line) => {
                    if let Some(expected) = echo
                        && line == expected
                    {
                        echo = None;
                        continue;
                    }
                    if let Some(code) = parse_cme_cms_error(line) {
                        self.last_error_code = code;
                        return Ok(Outcome::Failed);
                    }
                    if line == "ERROR" {
                        return Ok(Outcome::Failed);
                    }
                    let mut mode_switch = ModeSwitch { mode: &mut self.mode };
                    match response_cb(Frame::Line(line), &mut mode_switch) {
                        CallbackOutcome::Success => return Ok(Outcome::Success),
                        CallbackOutcome::Failed => return Ok(Outcome::Failed),
                        CallbackOutcome::Continue => {
                            if line.starts_with('+') {
                                debug!("dropping inline URC-looking line owned by active command");
                            }
                            continue;
                        }
                    }
                }
                Frame::Binary(bytes) => {
                    let mut mode_switch = ModeSwitch { mode: &mut self.mode };
                    match response_cb(Frame::Binary(bytes), &mut mode_switch) {
                        CallbackOutcome::Success => return Ok(Outcome::Success),
                        CallbackOutcome::Failed => return Ok(Outcome::Failed),
                        CallbackOutcome::Continue => {
                            self.mode = Mode::Normal;
                            continue;
                        }
                    }
                }
                Frame::Prompt => continue,
            }
        }
    }
}

#[cfg(test)]
mod test_engine {
    use super::*;
    use embassy_futures::block_on;
    use heapless::Deque;

    /// A scripted fake transport: each entry is either consumed as a line, or (for the prompt
    /// case) just signals "a frame was available". Writes are recorded for inspection.
    struct FakeIo {
        lines: Deque<&'static str, 8>,
        written: heapless::Vec<u8, 256>,
    }

    impl FakeIo {
        fn new(lines: &[&'static str]) -> Self {
            let mut d = Deque::new();
            for l in lines {
                d.push_back(l).unwrap();
            }
            Self { lines: d, written: heapless::Vec::new() }
        }
    }

    impl Tx for FakeIo {
        async fn write(&mut self, buffer: &[u8]) -> crate::Result<()> {
            self.written.extend_from_slice(buffer).map_err(|_| Error::BufferTooSmallError)
        }
    }

    impl Rx for FakeIo {
        async fn read_frame(
            &mut self,
            kind: FrameKind,
            scratch: &mut [u8],
        ) -> crate::Result<Option<usize>> {
            match kind {
                FrameKind::Line => match self.lines.pop_front() {
                    Some(line) => {
                        scratch[..line.len()].copy_from_slice(line.as_bytes());
                        Ok(Some(line.len()))
                    }
                    None => Ok(None),
                },
                FrameKind::Prompt => match self.lines.pop_front() {
                    Some(_) => Ok(Some(0)),
                    None => Ok(None),
                },
                FrameKind::Binary(n) => match self.lines.pop_front() {
                    Some(line) => {
                        let bytes = line.as_bytes();
                        let n = n.min(bytes.len());
                        scratch[..n].copy_from_slice(&bytes[..n]);
                        Ok(Some(n))
                    }
                    None => Ok(None),
                },
            }
        }
    }

    #[test]
    fn echo_then_ok_is_success_and_callback_sees_response_then_ok() {
        let io = FakeIo::new(&["AT+CSQ", "+CSQ: 18,99", "OK"]);
        let mut engine = Engine::new(io);
        let mut seen: heapless::Vec<heapless::String<32>, 4> = heapless::Vec::new();
        let outcome = block_on(engine.send(
            "+CSQ",
            false,
            |frame, _| {
                if let Frame::Line(l) = frame {
                    seen.push(heapless::String::try_from(l).unwrap()).unwrap();
                    if l == "OK" {
                        return CallbackOutcome::Success;
                    }
                }
                CallbackOutcome::Continue
            },
            Duration::from_millis(1000),
        ))
        .unwrap();
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(seen.as_slice(), ["+CSQ: 18,99", "OK"]);
    }

    #[test]
    fn cme_error_sets_last_error_code_and_fails() {
        let io = FakeIo::new(&["AT+COPS?", "+CME ERROR: 30"]);
        let mut engine = Engine::new(io);
        let outcome =
            block_on(engine.send("+COPS?", false, |_, _| CallbackOutcome::Continue, Duration::from_millis(1000)))
                .unwrap();
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(engine.get_last_error_code(), 30);
    }

    #[test]
    fn timeout_when_no_terminal_line_arrives() {
        let io = FakeIo::new(&["AT+CSQ"]);
        let mut engine = Engine::new(io);
        let outcome =
            block_on(engine.send("+CSQ", false, |_, _| CallbackOutcome::Continue, Duration::from_millis(5)))
                .unwrap();
        assert_eq!(outcome, Outcome::Timeout);
    }

    #[test]
    fn mode_restores_to_normal_after_terminal_outcome() {
        let io = FakeIo::new(&["AT+QFUPL=\"x.bin\",3", "CONNECT", "OK"]);
        let mut engine = Engine::new(io);
        let outcome = block_on(engine.send(
            "+QFUPL=\"x.bin\",3",
            false,
            |frame, switch| {
                if let Frame::Line(l) = frame {
                    if l.starts_with("CONNECT") {
                        switch.set_binary_mode(3);
                        return CallbackOutcome::Continue;
                    }
                    if l == "OK" {
                        return CallbackOutcome::Success;
                    }
                }
                CallbackOutcome::Continue
            },
            Duration::from_millis(1000),
        ))
        .unwrap();
        assert_eq!(outcome, Outcome::Success);
        let (mode, expected) = engine.get_operation_mode();
        assert_eq!(mode, Mode::Normal);
        assert_eq!(expected, 0);
    }
}
