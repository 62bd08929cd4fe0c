//! URC Registry (spec §4.7) and URC Dispatcher (spec §4.5).

use crate::param::{ParamCursor, ParamValue};
use heapless::Vec;

#[cfg(feature = "defmt")]
use defmt::debug;
#[cfg(not(feature = "defmt"))]
use log::debug;

/// Maximum number of parameters carried by a single URC event (spec §3 "URC event").
pub const URC_MAX_PARAMS: usize = 8;

/// Which URC family a line was classified as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tag {
    Creg,
    Cereg,
    Cgreg,
    Ctzv,
    Ctze,
    Cmti,
    Cmt,
    Cds,
    Cdsi,
    Clip,
    Cring,
    Colp,
    Rdy,
    CfunOn,
    Cpin,
    QindSmsDone,
    QindPbDone,
    Cgev,
    QindCsq,
    QindAct,
    QindSmsFull,
    Qsimstat,
    Qcsq,
    Qnetdevstatus,
    Qmtstat,
    Qmtrecv,
    Qmtping,
}

/// One row of the compile-time URC registry.
pub struct UrcDescriptor {
    pub tag: Tag,
    pub prefix: &'static str,
    pub activation_cmd: Option<&'static str>,
    pub needs_activation: bool,
}

/// The URC registry table (spec §4.7, abridged list reproduced verbatim).
pub static URC_REGISTRY: &[UrcDescriptor] = &[
    UrcDescriptor { tag: Tag::Creg, prefix: "+CREG:", activation_cmd: Some("+CREG=2"), needs_activation: true },
    UrcDescriptor { tag: Tag::Cereg, prefix: "+CEREG:", activation_cmd: Some("+CEREG=2"), needs_activation: true },
    UrcDescriptor { tag: Tag::Cgreg, prefix: "+CGREG:", activation_cmd: Some("+CGREG=2"), needs_activation: true },
    UrcDescriptor { tag: Tag::Ctzv, prefix: "+CTZV:", activation_cmd: Some("+CTZR=1"), needs_activation: true },
    UrcDescriptor { tag: Tag::Ctze, prefix: "+CTZE:", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Cmti, prefix: "+CMTI:", activation_cmd: Some("+CNMI=2,1,0,1,0"), needs_activation: true },
    UrcDescriptor { tag: Tag::Cmt, prefix: "+CMT:", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Cds, prefix: "+CDS:", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Cdsi, prefix: "+CDSI:", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Clip, prefix: "+CLIP:", activation_cmd: Some("+CLIP=1"), needs_activation: true },
    UrcDescriptor { tag: Tag::Cring, prefix: "+CRING:", activation_cmd: Some("+CRC=1"), needs_activation: true },
    UrcDescriptor { tag: Tag::Colp, prefix: "+COLP:", activation_cmd: Some("+COLP=1"), needs_activation: true },
    UrcDescriptor { tag: Tag::Rdy, prefix: "RDY", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::CfunOn, prefix: "+CFUN: 1", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Cpin, prefix: "+CPIN", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::QindSmsDone, prefix: "+QIND: SMS DONE", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::QindPbDone, prefix: "+QIND: PB DONE", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Cgev, prefix: "+CGEV:", activation_cmd: Some("+CGEREP=1,1"), needs_activation: true },
    UrcDescriptor { tag: Tag::QindCsq, prefix: "+QIND: \"csq\"", activation_cmd: Some("+QINDCFG=\"csq\",1"), needs_activation: true },
    UrcDescriptor { tag: Tag::QindAct, prefix: "+QIND: \"act\"", activation_cmd: Some("+QINDCFG=\"act\",1"), needs_activation: true },
    UrcDescriptor { tag: Tag::QindSmsFull, prefix: "+QIND: \"smsfull\"", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Qsimstat, prefix: "+QSIMSTAT:", activation_cmd: Some("+QSIMSTAT=1"), needs_activation: true },
    UrcDescriptor { tag: Tag::Qcsq, prefix: "+QCSQ:", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Qnetdevstatus, prefix: "+QNETDEVSTATUS:", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Qmtstat, prefix: "+QMTSTAT:", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Qmtrecv, prefix: "+QMTRECV:", activation_cmd: None, needs_activation: false },
    UrcDescriptor { tag: Tag::Qmtping, prefix: "+QMTPING:", activation_cmd: None, needs_activation: false },
];

/// A dispatched URC: the family tag plus its tokenised parameter list.
///
/// `params` borrows from the scratch buffer handed to `UrcDispatcher::dispatch_line`; the
/// subscriber callback must copy anything it needs past its own return.
pub struct UrcEvent<'a> {
    pub tag: Tag,
    pub params: Vec<ParamValue<'a>, URC_MAX_PARAMS>,
}

/// Classifies a line against the registry and tokenises its tail.
///
/// Returns `None` when no registry entry's prefix matches; per spec §4.5 step 4, such lines are
/// unsolicited noise at this layer and are discarded, not reported as an error.
pub fn classify_line<'a>(line: &str, scratch: &'a mut [u8]) -> Option<UrcEvent<'a>> {
    let descriptor = URC_REGISTRY.iter().find(|d| line.starts_with(d.prefix))?;

    let tail = line.find(':').map(|pos| line[pos + 1..].trim_start()).unwrap_or("");
    let n = tail.len().min(scratch.len());
    scratch[..n].copy_from_slice(&tail.as_bytes()[..n]);

    let cursor = ParamCursor::new(&mut scratch[..n], b',', true);
    let mut params = Vec::new();
    for value in cursor {
        if params.push(value).is_err() {
            break; // excess tokens are dropped (spec §4.5 step 5)
        }
    }
    Some(UrcEvent { tag: descriptor.tag, params })
}

/// The cooperative URC pump (spec §4.5). `service_routine` is invoked by the host at roughly a
/// 50 ms cadence; it never blocks and never itself talks to the engine's mutex — callers are
/// expected to check `state == READY` before calling `dispatch_line`.
pub struct UrcDispatcher<F>
where
    F: FnMut(UrcEvent<'_>),
{
    subscriber: F,
}

impl<F> UrcDispatcher<F>
where
    F: FnMut(UrcEvent<'_>),
{
    pub fn new(subscriber: F) -> Self {
        Self { subscriber }
    }

    /// Classifies and, on a registry match, delivers `line` to the subscriber synchronously.
    pub fn dispatch_line(&mut self, line: &str, scratch: &mut [u8]) {
        if let Some(event) = classify_line(line, scratch) {
            debug!("dispatching URC");
            (self.subscriber)(event);
        }
    }
}

#[cfg(test)]
mod test_urc {
    use super::*;

    #[test]
    fn matches_registered_prefix_and_tokenises_tail() {
        let mut scratch = [0u8; 64];
        let event = classify_line("+CMTI: \"SM\",7", &mut scratch).unwrap();
        assert_eq!(event.tag, Tag::Cmti);
        assert_eq!(event.params.len(), 2);
        assert_eq!(event.params[0], ParamValue::Str("SM"));
        assert_eq!(event.params[1], ParamValue::Integer(7));
    }

    #[test]
    fn unrecognised_line_is_discarded() {
        let mut scratch = [0u8; 64];
        assert!(classify_line("+UNKNOWNURC: 1", &mut scratch).is_none());
    }

    #[test]
    fn line_with_no_colon_has_zero_params() {
        let mut scratch = [0u8; 64];
        let event = classify_line("RDY", &mut scratch).unwrap();
        assert_eq!(event.tag, Tag::Rdy);
        assert_eq!(event.params.len(), 0);
    }

    #[test]
    fn subscriber_is_invoked_for_matching_line() {
        let mut seen = 0u32;
        let mut dispatcher = UrcDispatcher::new(|event: UrcEvent<'_>| {
            assert_eq!(event.tag, Tag::Qmtstat);
            seen += 1;
        });
        let mut scratch = [0u8; 64];
        dispatcher.dispatch_line("+QMTSTAT: 0,2", &mut scratch);
        assert_eq!(seen, 1);
    }
}
