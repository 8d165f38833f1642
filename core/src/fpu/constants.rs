//! On-chip constant ROM (FMOVECR)

use super::storage::BitsExtReal;
use crate::types::{Long, Word};

/// Extended precision bit pattern as stored in the ROM:
/// sign/exponent, mantissa high, mantissa low
struct RomEntry(Word, Long, Long);

impl RomEntry {
    fn value(&self) -> f64 {
        BitsExtReal::from_longs(Long::from(self.0) << 16, self.1, self.2).into()
    }
}

const PI: RomEntry = RomEntry(0x4000, 0xC90FDAA2, 0x2168C235);
const LOG10_2: RomEntry = RomEntry(0x3FFD, 0x9A209A84, 0xFBCFF798);
const E: RomEntry = RomEntry(0x4000, 0xADF85458, 0xA2BB4A9A);
const LOG2_E: RomEntry = RomEntry(0x3FFF, 0xB8AA3B29, 0x5C17F0BC);
const LOG10_E: RomEntry = RomEntry(0x3FFD, 0xDE5BD8A9, 0x37287195);
const LN_2: RomEntry = RomEntry(0x3FFE, 0xB17217F7, 0xD1CF79AC);
const LN_10: RomEntry = RomEntry(0x4000, 0x935D8DDD, 0xAAA8AC17);

/// 10^(2^n) for n = 4..=12
const POWERS_OF_TEN: [RomEntry; 9] = [
    RomEntry(0x4034, 0x8E1BC9BF, 0x04000000),
    RomEntry(0x4069, 0x9DC5ADA8, 0x2B70B59E),
    RomEntry(0x40D3, 0xC2781F49, 0xFFCFA6D5),
    RomEntry(0x41A8, 0x93BA47C9, 0x80E98CE0),
    RomEntry(0x4351, 0xAA7EEBFB, 0x9DF9DE8E),
    RomEntry(0x46A3, 0xE319A0AE, 0xA60E91C7),
    RomEntry(0x4D48, 0xC9767586, 0x81750C17),
    RomEntry(0x5A92, 0x9E8B3B5D, 0xC53D5DE5),
    RomEntry(0x7525, 0xC4605202, 0x8A20979B),
];

/// Looks up a ROM offset. Offsets not populated on the 6888x return None.
pub fn rom_constant(offset: u8) -> Option<f64> {
    Some(match offset {
        0x00 => PI.value(),
        0x0B => LOG10_2.value(),
        0x0C => E.value(),
        0x0D => LOG2_E.value(),
        0x0E => LOG10_E.value(),
        0x0F => 0.0,
        0x30 => LN_2.value(),
        0x31 => LN_10.value(),
        0x32 => 1.0,
        0x33 => 10.0,
        0x34 => 100.0,
        0x35 => 10000.0,
        0x36 => 1e8,
        0x37..=0x3F => POWERS_OF_TEN[usize::from(offset - 0x37)].value(),
        _ => return None,
    })
}
