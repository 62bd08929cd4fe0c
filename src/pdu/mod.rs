//! SMS PDU Codec (spec §4.8): 3GPP TS 23.040 SUBMIT/DELIVER TPDU encode and decode.
//!
//! Each concern is its own pure-function submodule, grounded in
//! `original_source/SourceCode/src/lib_ril_sms.c`/`inc/lib_ril_sms.h`: hex text <-> octets
//! ([`hex`]), phone-number semi-octet packing ([`address`]), the `TP-DCS` decode table ([`dcs`]),
//! `TP-SCTS` decode ([`timestamp`]), and GSM 7-bit/UCS2/IRA/8859-1 user-data conversion
//! ([`charset`]).

pub mod address;
pub mod charset;
pub mod dcs;
pub mod hex;
pub mod timestamp;

use heapless::{String, Vec};

use crate::error::Error;
use address::PhoneNumber;

/// `LIB_SMS_PDU_BUF_MAX_LEN`.
pub const MAX_PDU_OCTETS: usize = 180;
/// `LIB_SMS_USER_DATA_MAX_LEN`.
pub const MAX_USER_DATA_CHARS: usize = 160;
/// `LIB_SMS_SUBMIT_PDU_DEFAULT_VP_RELATIVE`: 24 hours.
pub const DEFAULT_VALIDITY_PERIOD: u8 = 167;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PduType {
    Deliver,
    Submit,
    StatusReport,
}

/// Parameters for encoding a SUBMIT TPDU.
pub struct SubmitParams<'a> {
    pub message_reference: u8,
    pub destination: PhoneNumber,
    /// Relative validity period in the 03.40 §9.2.3.12.1 encoding (`DEFAULT_VALIDITY_PERIOD` is
    /// 24 hours).
    pub validity_period: u8,
    pub text: &'a str,
}

/// A concatenated-SMS reference, decoded from a `TP-UDH` IEI `0x00`/`0x08` element
/// (GSM 03.40 §9.2.3.24.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Concatenation {
    pub reference: u16,
    pub total_segments: u8,
    pub this_segment: u8,
}

/// A decoded SUBMIT or DELIVER TPDU.
pub struct DecodedPdu {
    pub pdu_type: PduType,
    /// The SMSC address prefix, if one was present (length byte nonzero).
    pub smsc: Option<PhoneNumber>,
    pub address: PhoneNumber,
    pub dcs: dcs::Dcs,
    /// Present only for `Deliver` (the service centre timestamp).
    pub scts: Option<timestamp::Timestamp>,
    /// Present when `TP-UDH` carried a concatenation element (`TP-UDHI` set).
    pub concatenation: Option<Concatenation>,
    pub user_data: String<MAX_USER_DATA_CHARS>,
}

/// Encodes a SUBMIT TPDU with no SMSC override (SCA length 0, i.e. "use the module's stored
/// SMSC"), GSM 7-bit default alphabet, relative validity period, and no UDH.
pub fn encode_submit(params: &SubmitParams, out: &mut Vec<u8, MAX_PDU_OCTETS>) -> crate::Result<()> {
    out.push(0).map_err(|_| Error::BufferTooSmallError)?; // SCA length

    const VPF_RELATIVE: u8 = 0x02;
    let fo = 0x01 | (VPF_RELATIVE << 3); // TP-MTI=SUBMIT, no SRR, no UDHI
    out.push(fo).map_err(|_| Error::BufferTooSmallError)?;
    out.push(params.message_reference).map_err(|_| Error::BufferTooSmallError)?;

    address::encode(&params.destination, out)?;

    out.push(0).map_err(|_| Error::BufferTooSmallError)?; // PID
    out.push(0).map_err(|_| Error::BufferTooSmallError)?; // DCS: GSM default, no class
    out.push(params.validity_period).map_err(|_| Error::BufferTooSmallError)?;

    let mut packed = Vec::<u8, 160>::new();
    let septets = charset::pack_gsm7(params.text, &mut packed)?;
    out.push(septets as u8).map_err(|_| Error::BufferTooSmallError)?;
    out.extend_from_slice(&packed).map_err(|_| Error::BufferTooSmallError)?;
    Ok(())
}

/// Decodes a SUBMIT or DELIVER TPDU octet stream (spec §8 scenario 6).
pub fn decode(octets: &[u8]) -> crate::Result<DecodedPdu> {
    let (smsc, mut offset) = address::decode_smsc(octets)?;

    let fo = *octets.get(offset).ok_or(Error::PduError)?;
    offset += 1;
    let udhi = fo & 0x40 != 0;
    let pdu_type = match fo & 0x03 {
        0x00 => PduType::Deliver,
        0x01 => PduType::Submit,
        0x02 => PduType::StatusReport,
        _ => return Err(Error::PduError),
    };

    match pdu_type {
        PduType::Submit => {
            offset += 1; // TP-MR
            let (address, consumed) = address::decode(octets.get(offset..).ok_or(Error::PduError)?)?;
            offset += consumed;
            offset += 1; // PID
            let dcs_byte = *octets.get(offset).ok_or(Error::PduError)?;
            offset += 1;
            let dcs = dcs::decode(dcs_byte);

            let vpf = (fo >> 3) & 0x03;
            offset += match vpf {
                0x00 => 0,
                0x02 => 1,
                0x01 | 0x03 => 7,
                _ => 0,
            };

            let udl = *octets.get(offset).ok_or(Error::PduError)? as usize;
            offset += 1;
            let (concatenation, user_data) =
                decode_user_data(&dcs, octets.get(offset..).ok_or(Error::PduError)?, udl, udhi)?;
            Ok(DecodedPdu { pdu_type, smsc, address, dcs, scts: None, concatenation, user_data })
        }
        PduType::Deliver => {
            let (address, consumed) = address::decode(octets.get(offset..).ok_or(Error::PduError)?)?;
            offset += consumed;
            offset += 1; // PID
            let dcs_byte = *octets.get(offset).ok_or(Error::PduError)?;
            offset += 1;
            let dcs = dcs::decode(dcs_byte);
            let (scts, consumed) = timestamp::decode(octets.get(offset..).ok_or(Error::PduError)?)?;
            offset += consumed;
            let udl = *octets.get(offset).ok_or(Error::PduError)? as usize;
            offset += 1;
            let (concatenation, user_data) =
                decode_user_data(&dcs, octets.get(offset..).ok_or(Error::PduError)?, udl, udhi)?;
            Ok(DecodedPdu { pdu_type, smsc, address, dcs, scts: Some(scts), concatenation, user_data })
        }
        PduType::StatusReport => Err(Error::PduError),
    }
}

/// Parses the `TP-UDH` (GSM 03.40 §9.2.3.24): a length-prefixed sequence of `[IEI][IEL][data]`
/// information elements. Recognises the two concatenation IEIs; anything else is skipped.
/// Returns the concatenation (if any) and the number of header bytes consumed, including the
/// `UDHL` byte itself.
fn decode_udh(bytes: &[u8]) -> crate::Result<(Option<Concatenation>, usize)> {
    let udhl = *bytes.first().ok_or(Error::PduError)? as usize;
    let header = bytes.get(1..1 + udhl).ok_or(Error::PduError)?;

    let mut concatenation = None;
    let mut pos = 0;
    while pos + 2 <= header.len() {
        let iei = header[pos];
        let iel = header[pos + 1] as usize;
        let data = header.get(pos + 2..pos + 2 + iel).ok_or(Error::PduError)?;
        match iei {
            0x00 if iel >= 3 => {
                concatenation = Some(Concatenation {
                    reference: data[0] as u16,
                    total_segments: data[1],
                    this_segment: data[2],
                });
            }
            0x08 if iel >= 4 => {
                concatenation = Some(Concatenation {
                    reference: u16::from_be_bytes([data[0], data[1]]),
                    total_segments: data[2],
                    this_segment: data[3],
                });
            }
            _ => {}
        }
        pos += 2 + iel;
    }
    Ok((concatenation, 1 + udhl))
}

fn decode_user_data(
    dcs: &dcs::Dcs,
    bytes: &[u8],
    udl: usize,
    udhi: bool,
) -> crate::Result<(Option<Concatenation>, String<MAX_USER_DATA_CHARS>)> {
    let (concatenation, header_len) = if udhi { decode_udh(bytes)? } else { (None, 0) };

    let mut user_data = String::new();
    match dcs.alphabet {
        dcs::Alphabet::Gsm7Bit => {
            // The header itself is byte-aligned; it occupies ceil(header_len*8/7) septets, after
            // which the text septets begin directly in the remaining packed stream.
            let header_septets = (header_len * 8).div_ceil(7);
            let text_septets = udl.saturating_sub(header_septets);
            let text = bytes.get(header_len..).ok_or(Error::PduError)?;
            charset::unpack_gsm7(text, text_septets, &mut user_data)?
        }
        dcs::Alphabet::EightBitData => {
            let text = bytes.get(header_len..udl).ok_or(Error::PduError)?;
            charset::decode_8859_1(text, &mut user_data)?
        }
        dcs::Alphabet::Ucs2 => {
            let text = bytes.get(header_len..udl).ok_or(Error::PduError)?;
            charset::decode_ucs2(text, &mut user_data)?
        }
    }
    Ok((concatenation, user_data))
}

#[cfg(test)]
mod test_pdu {
    use super::*;
    use address::NumberType;

    /// Spec §8 scenario 6: destination "46708251358", DCS=0, UDL=10, user data "hellohello".
    #[test]
    fn decodes_worked_submit_pdu_example() {
        let hex = b"0011000B916407281553F80000AA0AE8329BFD4697D9EC37";
        let octets: Vec<u8, MAX_PDU_OCTETS> = hex::hex_str_to_octets(hex).unwrap();
        let decoded = decode(&octets).unwrap();
        assert_eq!(decoded.pdu_type, PduType::Submit);
        assert!(decoded.smsc.is_none());
        assert_eq!(decoded.address.digits.as_str(), "46708251358");
        assert_eq!(decoded.address.number_type, NumberType::International);
        assert_eq!(decoded.dcs.alphabet, dcs::Alphabet::Gsm7Bit);
        assert_eq!(decoded.dcs.message_class, None);
        assert!(decoded.concatenation.is_none());
        assert_eq!(decoded.user_data.as_str(), "hellohello");
    }

    #[test]
    fn decodes_nonzero_smsc_prefix() {
        // SCA len=7 (toa + 6 digit bytes, 11 digits "12345678901"), then the same SUBMIT body.
        let mut hex = Vec::<u8, 128>::new();
        hex.extend_from_slice(b"07912143658709F1").unwrap(); // SMSC
        hex.extend_from_slice(b"11000B916407281553F80000AA0AE8329BFD4697D9EC37").unwrap();
        let octets: Vec<u8, MAX_PDU_OCTETS> = hex::hex_str_to_octets(&hex).unwrap();
        let decoded = decode(&octets).unwrap();
        let smsc = decoded.smsc.unwrap();
        assert_eq!(smsc.digits.as_str(), "12345678901");
        assert_eq!(decoded.address.digits.as_str(), "46708251358");
        assert_eq!(decoded.user_data.as_str(), "hellohello");
    }

    #[test]
    fn decodes_concatenation_header_with_16_bit_reference() {
        // fo=0x41 (SUBMIT, UDHI set, VPF=0). The UDH is UDHL(1) + IEI 0x08 + IEL 4 + 4 data bytes
        // = 7 header bytes total, occupying ceil(7*8/7)=8 septets, followed by 3 GSM7 septets of
        // "hi!" packed directly into the remaining stream.
        let mut packed = heapless::Vec::<u8, 160>::new();
        let text_septets = charset::pack_gsm7("hi!", &mut packed).unwrap();
        let header_len = 7;
        let header_septets = (header_len * 8_usize).div_ceil(7);
        let udl = header_septets + text_septets;

        let mut octets = Vec::<u8, MAX_PDU_OCTETS>::new();
        octets.push(0).unwrap(); // SCA len
        octets.push(0x41).unwrap(); // fo: SUBMIT, UDHI
        octets.push(0).unwrap(); // TP-MR
        address::encode(
            &PhoneNumber {
                number_type: NumberType::International,
                digits: heapless::String::try_from("12345").unwrap(),
            },
            &mut octets,
        )
        .unwrap();
        octets.push(0).unwrap(); // PID
        octets.push(0).unwrap(); // DCS: GSM7 default
        octets.push(udl as u8).unwrap();
        octets.push(6).unwrap(); // UDHL: IEI+IEL+4 data bytes
        octets.push(0x08).unwrap(); // IEI: concat, 16-bit ref
        octets.push(0x04).unwrap(); // IEL
        octets.push(0x12).unwrap();
        octets.push(0x34).unwrap();
        octets.push(0x02).unwrap(); // total
        octets.push(0x01).unwrap(); // this
        octets.extend_from_slice(&packed).unwrap();

        let decoded = decode(&octets).unwrap();
        let concat = decoded.concatenation.unwrap();
        assert_eq!(concat.reference, 0x1234);
        assert_eq!(concat.total_segments, 2);
        assert_eq!(concat.this_segment, 1);
        assert_eq!(decoded.user_data.as_str(), "hi!");
    }

    #[test]
    fn encode_then_decode_round_trips_text_and_address() {
        let params = SubmitParams {
            message_reference: 0,
            destination: PhoneNumber {
                number_type: NumberType::International,
                digits: heapless::String::try_from("46708251358").unwrap(),
            },
            validity_period: DEFAULT_VALIDITY_PERIOD,
            text: "hellohello",
        };
        let mut encoded = Vec::<u8, MAX_PDU_OCTETS>::new();
        encode_submit(&params, &mut encoded).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.pdu_type, PduType::Submit);
        assert_eq!(decoded.address.digits.as_str(), "46708251358");
        assert_eq!(decoded.user_data.as_str(), "hellohello");
    }
}
