//! Factory calibration table.
//!
//! The sensor stores its trimming parameters in NVM and copies them into two
//! non-contiguous register blocks after reset. Nothing on the bus verifies
//! them, so decoding must follow the datasheet byte map (section 4.2.2) exactly.

/// Register blocks holding the calibration data.
pub(crate) mod calib_mem {
    /// `calib00..calib25` and `calib26..calib32`.
    pub const ADDR: [u8; 2] = [0x88, 0xE1];
    pub const SIZES: [usize; 2] = [26, 7];
    pub const TOTAL_SIZE: usize = 26 + 7;
}

/// Factory-fused compensation parameters, unique to every chip.
///
/// Built once by [`CalibData::from_bytes`] and read-only afterwards.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibData {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    /// 12-bit signed, packed with `dig_h5` across 0xE4..=0xE6.
    pub dig_h4: i16,
    /// 12-bit signed, packed with `dig_h4` across 0xE4..=0xE6.
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibData {
    /// Decodes both calibration blocks, concatenated in register order
    /// (26 bytes from 0x88, then 7 bytes from 0xE1).
    ///
    /// Multi-byte words are little-endian. Signed words are two's complement,
    /// so `from_le_bytes` on `i16` performs the sign extension.
    pub fn from_bytes(buffer: &[u8; calib_mem::TOTAL_SIZE]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([buffer[i], buffer[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([buffer[i], buffer[i + 1]]);

        // 0xE4 holds h4[11:4], 0xE5 holds h5[3:0] | h4[3:0], 0xE6 holds h5[11:4].
        // The MSB bytes carry the sign, hence the i8 cast before shifting.
        let e4 = buffer[29];
        let e5 = buffer[30];
        let e6 = buffer[31];

        CalibData {
            dig_t1: u16_at(0),
            dig_t2: i16_at(2),
            dig_t3: i16_at(4),
            dig_p1: u16_at(6),
            dig_p2: i16_at(8),
            dig_p3: i16_at(10),
            dig_p4: i16_at(12),
            dig_p5: i16_at(14),
            dig_p6: i16_at(16),
            dig_p7: i16_at(18),
            dig_p8: i16_at(20),
            dig_p9: i16_at(22),
            // buffer[24] (0xA0) is reserved
            dig_h1: buffer[25],
            dig_h2: i16_at(26),
            dig_h3: buffer[28],
            dig_h4: ((e4 as i8 as i16) << 4) | (e5 & 0x0F) as i16,
            dig_h5: ((e6 as i8 as i16) << 4) | (e5 >> 4) as i16,
            dig_h6: buffer[32] as i8,
        }
    }
}
