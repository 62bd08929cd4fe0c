//! Phone number semi-octet packing (spec §4.8), grounded in
//! `lib_ril_sms.h`'s `LIB_SMS_PhoneNumberStruct` (type byte + BCD-swapped digit string).

use heapless::String;

use super::charset;
use crate::error::Error;

pub const MAX_DIGITS: usize = 20;

/// `type-of-address` byte values from `lib_ril_sms.h`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NumberType {
    International,
    National,
    Unknown,
    Alphanumeric,
}

impl NumberType {
    fn to_toa(self) -> u8 {
        match self {
            NumberType::International => 0x91,
            NumberType::National => 0xA1,
            NumberType::Unknown => 0x81,
            NumberType::Alphanumeric => 0x50,
        }
    }

    fn from_toa(toa: u8) -> NumberType {
        match toa {
            0x91 => NumberType::International,
            0xA1 => NumberType::National,
            0x50 => NumberType::Alphanumeric,
            _ => NumberType::Unknown,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PhoneNumber {
    pub number_type: NumberType,
    pub digits: String<MAX_DIGITS>,
}

/// Encodes `digits` into the PDU address field: `[length][toa][swapped semi-octets...]`.
/// `length` is the digit count, not the byte count, per GSM 03.40 §9.1.2.5.
pub fn encode<const N: usize>(number: &PhoneNumber, out: &mut heapless::Vec<u8, N>) -> crate::Result<()> {
    let digits = number.digits.as_bytes();
    if digits.len() > MAX_DIGITS || !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::InvalidParam);
    }
    out.push(digits.len() as u8).map_err(|_| Error::BufferTooSmallError)?;
    out.push(number.number_type.to_toa()).map_err(|_| Error::BufferTooSmallError)?;
    for pair in digits.chunks(2) {
        let low = pair[0] - b'0';
        let high = if pair.len() == 2 { pair[1] - b'0' } else { 0x0F };
        out.push((high << 4) | low).map_err(|_| Error::BufferTooSmallError)?;
    }
    Ok(())
}

/// Decodes an address field starting at `octets[0]` (the digit-count byte). Returns the number
/// and how many bytes were consumed.
pub fn decode(octets: &[u8]) -> crate::Result<(PhoneNumber, usize)> {
    let digit_count = *octets.first().ok_or(Error::PduError)? as usize;
    let toa = *octets.get(1).ok_or(Error::PduError)?;
    let number_type = NumberType::from_toa(toa);

    if number_type == NumberType::Alphanumeric {
        // The length byte counts septets here, not BCD digits (GSM 03.40 §9.1.2.5).
        let byte_count = (digit_count * 7).div_ceil(8);
        let body = octets.get(2..2 + byte_count).ok_or(Error::PduError)?;
        let digits = decode_alphanumeric_digits(body, digit_count)?;
        Ok((PhoneNumber { number_type, digits }, 2 + byte_count))
    } else {
        let byte_count = digit_count.div_ceil(2);
        let body = octets.get(2..2 + byte_count).ok_or(Error::PduError)?;
        let digits = decode_numeric_digits(body, digit_count)?;
        Ok((PhoneNumber { number_type, digits }, 2 + byte_count))
    }
}

/// Decodes the SMSC address prefix (GSM 03.40 §9.2.3.1). Unlike the OA/DA field `decode` handles,
/// this length byte counts address octets (type-of-address plus digit bytes), not digits. A zero
/// length means "no SMSC given" (the modem uses its own stored address).
pub fn decode_smsc(octets: &[u8]) -> crate::Result<(Option<PhoneNumber>, usize)> {
    let len = *octets.first().ok_or(Error::PduError)? as usize;
    if len == 0 {
        return Ok((None, 1));
    }
    let toa = *octets.get(1).ok_or(Error::PduError)?;
    let number_type = NumberType::from_toa(toa);
    let body = octets.get(2..1 + len).ok_or(Error::PduError)?;

    let digits = if number_type == NumberType::Alphanumeric {
        decode_alphanumeric_digits(body, (body.len() * 8) / 7)?
    } else {
        decode_numeric_digits(body, body.len() * 2)?
    };
    Ok((Some(PhoneNumber { number_type, digits }), 1 + len))
}

fn decode_numeric_digits(body: &[u8], digit_count: usize) -> crate::Result<String<MAX_DIGITS>> {
    let mut digits = String::<MAX_DIGITS>::new();
    for (i, &byte) in body.iter().enumerate() {
        let low = byte & 0x0F;
        let high = byte >> 4;
        if i * 2 < digit_count && low != 0x0F {
            digits.push((b'0' + low) as char).map_err(|_| Error::BufferTooSmallError)?;
        }
        if i * 2 + 1 < digit_count && high != 0x0F {
            digits.push((b'0' + high) as char).map_err(|_| Error::BufferTooSmallError)?;
        }
    }
    Ok(digits)
}

fn decode_alphanumeric_digits(body: &[u8], septet_count: usize) -> crate::Result<String<MAX_DIGITS>> {
    let mut digits = String::<MAX_DIGITS>::new();
    charset::unpack_gsm7(body, septet_count, &mut digits)?;
    Ok(digits)
}

#[cfg(test)]
mod test_address {
    use super::*;

    #[test]
    fn decodes_international_number_from_worked_example() {
        // From spec §8 scenario 6's worked PDU: 0B 91 64 07 28 15 53 F8
        let octets = [0x0B, 0x91, 0x64, 0x07, 0x28, 0x15, 0x53, 0xF8];
        let (number, consumed) = decode(&octets).unwrap();
        assert_eq!(number.number_type, NumberType::International);
        assert_eq!(number.digits.as_str(), "46708251358");
        assert_eq!(consumed, 8);
    }

    #[test]
    fn encode_round_trips_through_decode() {
        let number = PhoneNumber {
            number_type: NumberType::International,
            digits: String::try_from("46708251358").unwrap(),
        };
        let mut buf = heapless::Vec::<u8, 32>::new();
        encode(&number, &mut buf).unwrap();
        let (decoded, _) = decode(&buf).unwrap();
        assert_eq!(decoded.digits.as_str(), number.digits.as_str());
        assert_eq!(decoded.number_type, number.number_type);
    }

    #[test]
    fn decodes_alphanumeric_address_as_packed_gsm7_not_bcd() {
        let mut packed = heapless::Vec::<u8, 160>::new();
        let septets = charset::pack_gsm7("hi", &mut packed).unwrap();
        let mut octets = heapless::Vec::<u8, 16>::new();
        octets.push(septets as u8).unwrap();
        octets.push(NumberType::Alphanumeric.to_toa()).unwrap();
        octets.extend_from_slice(&packed).unwrap();

        let (number, consumed) = decode(&octets).unwrap();
        assert_eq!(number.number_type, NumberType::Alphanumeric);
        assert_eq!(number.digits.as_str(), "hi");
        assert_eq!(consumed, 2 + packed.len());
    }

    #[test]
    fn decode_smsc_zero_length_means_no_smsc() {
        let octets = [0x00, 0x11, 0x22];
        let (smsc, consumed) = decode_smsc(&octets).unwrap();
        assert!(smsc.is_none());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn decode_smsc_counts_octets_not_digits() {
        // len=7 counts the toa byte plus 6 digit bytes, 11 digits with one 0xF pad nibble.
        let octets = [0x07, 0x91, 0x21, 0x43, 0x65, 0x87, 0x09, 0xF1];
        let (smsc, consumed) = decode_smsc(&octets).unwrap();
        let smsc = smsc.unwrap();
        assert_eq!(smsc.number_type, NumberType::International);
        assert_eq!(smsc.digits.as_str(), "12345678901");
        assert_eq!(consumed, 8);
    }
}
