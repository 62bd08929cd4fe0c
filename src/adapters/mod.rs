//! Adapter Layer (spec §4.9): thin, per-family clients of `RilContext`'s core contract.
//!
//! Each adapter is grounded in a specific `ril_*.h`/`ril_*.c` pair under
//! `original_source/SourceCode/`; see `DESIGN.md` for the mapping. Every adapter operation
//! returns the engine's `Outcome` translated into the family's own numeric error enum, matching
//! the vendor's `+CME ERROR`/Quectel-specific error-code ranges.

pub mod fs;
pub mod http;
pub mod mqtt;
pub mod network;
pub mod sms;
pub mod socket;
pub mod sysinfo;
pub mod telephony;

/// Extracts the `idx`-th comma-separated field of `line` after its first `:` and parses it.
///
/// All adapters share this instead of routing fixed-position numeric fields through the general
/// `param` module's destructive tokeniser, since adapter responses are copied into an owned
/// buffer inside the `send` callback and no longer have a mutable backing slice to tokenise in
/// place.
pub(crate) fn csv_field(line: &str, idx: usize) -> Option<&str> {
    let tail = line.find(':').map(|p| &line[p + 1..])?;
    tail.split(',').nth(idx).map(str::trim)
}

pub(crate) fn parse_csv_field<T: core::str::FromStr>(line: &str, idx: usize) -> Option<T> {
    csv_field(line, idx)?.parse().ok()
}
