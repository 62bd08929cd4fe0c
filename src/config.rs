//! Process-wide configuration (spec §3 "Configuration"), set once at `init`.

/// Power-rail / reset command sent to the host's GPIO callback (spec §3, §6 "Power callback").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerCmd {
    Off,
    On,
    Restart,
}

/// Terminal result of `init`, delivered once to the init-result callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitResult {
    Success,
    Timeout,
}

/// Buffer sizes are informational here: this crate uses compile-time-sized `heapless` buffers
/// (`engine::LINE_BUF_SIZE`, `engine::CMD_BUFFER_SIZE`) rather than runtime-configured ring
/// buffers, since there is no allocator to size them from at init. The fields are kept because
/// the spec's data model names them as part of the process-wide configuration; a caller building
/// against a modem with unusually long lines can cross-check them against the const buffers.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub rx_stream_size: u32,
    pub tx_stream_size: u32,
    pub line_buffer_size: u32,
    pub param_buffer_size: u32,
    pub default_cmd_timeout_ms: u32,
    pub init_retry_count: u8,
    pub post_powercycle_delay_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rx_stream_size: 512,
            tx_stream_size: 512,
            line_buffer_size: crate::engine::LINE_BUF_SIZE as u32,
            param_buffer_size: 256,
            default_cmd_timeout_ms: 5_000,
            init_retry_count: 3,
            post_powercycle_delay_ms: 1_000,
        }
    }
}
