//! `TP-SCTS`/`TP-VP` absolute timestamp decode (spec §4.8), grounded in
//! `lib_ril_sms.h`'s `LIB_SMS_TimeStampStruct` (7 semi-octet-swapped BCD fields, the last carrying
//! a signed quarter-hour timezone offset per GSM 03.40 §9.2.3.11).

use chrono::{DateTime, FixedOffset, TimeZone};

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Signed, in units of 15 minutes.
    pub tz_quarter_hours: i8,
}

fn bcd_swapped(byte: u8) -> u8 {
    (byte & 0x0F) * 10 + (byte >> 4)
}

/// Decodes the 7-octet SCTS field. Returns the timestamp and the number of bytes consumed (7).
pub fn decode(octets: &[u8]) -> crate::Result<(Timestamp, usize)> {
    let field = octets.get(..7).ok_or(Error::PduError)?;
    let tz_byte = field[6];
    let sign = if tz_byte & 0x08 != 0 { -1i8 } else { 1 };
    let quarter_hours = ((tz_byte & 0x07) * 10 + (tz_byte >> 4)) as i8;

    Ok((
        Timestamp {
            year: bcd_swapped(field[0]),
            month: bcd_swapped(field[1]),
            day: bcd_swapped(field[2]),
            hour: bcd_swapped(field[3]),
            minute: bcd_swapped(field[4]),
            second: bcd_swapped(field[5]),
            tz_quarter_hours: sign * quarter_hours,
        },
        7,
    ))
}

impl Timestamp {
    /// Interprets the two-digit year as 2000-2099, matching every Quectel module in the field.
    pub fn to_datetime(&self) -> crate::Result<DateTime<FixedOffset>> {
        let offset_seconds = self.tz_quarter_hours as i32 * 15 * 60;
        let tz = FixedOffset::east_opt(offset_seconds).ok_or(Error::PduError)?;
        tz.with_ymd_and_hms(
            2000 + self.year as i32,
            self.month as u32,
            self.day as u32,
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
        )
        .single()
        .ok_or(Error::PduError)
    }
}

#[cfg(test)]
mod test_timestamp {
    use super::*;

    #[test]
    fn decodes_scts_fields_and_applies_timezone_offset() {
        // 2024-03-15 12:30:00, tz=+2h (8 quarter-hours): swapped BCD fields, tz byte tens=0/units=8.
        let octets = [0x42, 0x30, 0x51, 0x21, 0x03, 0x00, 0x80];
        let (ts, consumed) = decode(&octets).unwrap();
        assert_eq!(consumed, 7);
        assert_eq!(ts.year, 24);
        assert_eq!(ts.month, 3);
        assert_eq!(ts.day, 15);
        assert_eq!(ts.hour, 12);
        assert_eq!(ts.minute, 30);
        assert_eq!(ts.second, 0);
        assert_eq!(ts.tz_quarter_hours, 8);
        let dt = ts.to_datetime().unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S %z").to_string(), "2024-03-15 12:30:00 +0200");
    }

    #[test]
    fn negative_timezone_sign_bit_is_honoured() {
        let octets = [0x42, 0x30, 0x51, 0x21, 0x03, 0x00, 0x88]; // sign bit set, 8 quarter-hours
        let (ts, _) = decode(&octets).unwrap();
        assert_eq!(ts.tz_quarter_hours, -8);
    }
}
