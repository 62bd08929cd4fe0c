//! `TP-DCS` decode (spec §4.8), grounded in `lib_ril_sms.h`'s `LIB_SMS_DecodeDCS`: groups `00xx`
//! and `01xx` (alphabet + optional message class share one bit layout per GSM 03.38 §4), group
//! `1111` (data coding / message class), the rest treated as the default alphabet with no message
//! class.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Alphabet {
    Gsm7Bit,
    EightBitData,
    Ucs2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Dcs {
    pub alphabet: Alphabet,
    pub message_class: Option<u8>,
    pub compressed: bool,
}

/// Decodes a raw `TP-DCS` octet (spec §4.8; groups per GSM 03.38 §4).
pub fn decode(dcs: u8) -> Dcs {
    let group = dcs >> 4;
    match group {
        0x0..=0x3 | 0x4..=0x7 => Dcs {
            alphabet: alphabet_from_bits((dcs >> 2) & 0x03),
            message_class: if dcs & 0x10 != 0 { Some(dcs & 0x03) } else { None },
            compressed: dcs & 0x20 != 0,
        },
        0xF => Dcs {
            alphabet: if dcs & 0x04 != 0 { Alphabet::EightBitData } else { Alphabet::Gsm7Bit },
            message_class: Some(dcs & 0x03),
            compressed: false,
        },
        _ => Dcs { alphabet: Alphabet::Gsm7Bit, message_class: None, compressed: false },
    }
}

fn alphabet_from_bits(bits: u8) -> Alphabet {
    match bits {
        0b01 => Alphabet::EightBitData,
        0b10 => Alphabet::Ucs2,
        _ => Alphabet::Gsm7Bit,
    }
}

#[cfg(test)]
mod test_dcs {
    use super::*;

    #[test]
    fn zero_is_default_alphabet_no_class() {
        let dcs = decode(0x00);
        assert_eq!(dcs.alphabet, Alphabet::Gsm7Bit);
        assert_eq!(dcs.message_class, None);
        assert!(!dcs.compressed);
    }

    #[test]
    fn group_f_carries_message_class() {
        let dcs = decode(0xF1);
        assert_eq!(dcs.alphabet, Alphabet::Gsm7Bit);
        assert_eq!(dcs.message_class, Some(1));
    }

    #[test]
    fn group_0_ucs2_with_class() {
        let dcs = decode(0x18); // group 0, alpha bits=10 (UCS2), class bit set, class=0
        assert_eq!(dcs.alphabet, Alphabet::Ucs2);
        assert_eq!(dcs.message_class, Some(0));
    }

    #[test]
    fn group_4_shares_group_0_bit_layout() {
        let dcs = decode(0x48); // group 4, alpha bits=10 (UCS2), class bit clear
        assert_eq!(dcs.alphabet, Alphabet::Ucs2);
        assert_eq!(dcs.message_class, None);
        assert!(!dcs.compressed);
    }

    #[test]
    fn group_5_eight_bit_with_class() {
        let dcs = decode(0x54); // group 5, alpha bits=01 (8-bit), class bit set, class=0
        assert_eq!(dcs.alphabet, Alphabet::EightBitData);
        assert_eq!(dcs.message_class, Some(0));
    }
}
