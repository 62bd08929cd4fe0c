#![no_std]

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod param;
pub mod pdu;
pub mod transport;
pub mod urc;

pub mod adapters;

pub type Result<T> = core::result::Result<T, error::Error>;

/// The mutex flavour backing `context::RilContext`'s engine lock. `CriticalSectionRawMutex` works
/// on both bare-metal (via a target-provided `critical-section` implementation) and host test
/// builds (via `critical-section`'s `std` feature), unlike `ThreadModeRawMutex`, which assumes a
/// Cortex-M single-executor target.
pub type RawMutex = embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
