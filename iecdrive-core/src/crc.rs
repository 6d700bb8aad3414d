//! Incremental CRC folds
//!
//! - CRC-7 (polynomial 0x09, MSB first) protects SD/MMC command frames.
//! - CRC-16/XMODEM (polynomial 0x1021, MSB first) protects data blocks.
//!
//! Both are pure functions of the running accumulator and the next byte.
//! The block forms are plain left folds of the byte forms, so a block may be
//! split at any point and continued with the returned accumulator.

/// CRC-16/XMODEM generator polynomial
pub const CRC16_POLY: u16 = 0x1021;

/// CRC-7 generator polynomial (x^7 + x^3 + 1, top bit implicit)
pub const CRC7_POLY: u8 = 0x09;

const CRC16_TABLE: [u16; 256] = crc16_table();

const fn crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = crc16_update_bitwise(0, i as u8);
        i += 1;
    }
    table
}

/// Bit-at-a-time CRC-16/XMODEM update
///
/// Reference form of [`crc16_update`], also used to build its table.
pub const fn crc16_update_bitwise(crc: u16, data: u8) -> u16 {
    let mut crc = crc ^ ((data as u16) << 8);
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ CRC16_POLY
        } else {
            crc << 1
        };
        bit += 1;
    }
    crc
}

/// Fold one byte into a CRC-16/XMODEM accumulator
#[inline(always)]
pub const fn crc16_update(crc: u16, data: u8) -> u16 {
    (crc << 8) ^ CRC16_TABLE[((crc >> 8) as u8 ^ data) as usize]
}

/// Fold a block of bytes into a CRC-16/XMODEM accumulator, in order
///
/// An empty block returns `crc` unchanged.
pub const fn crc16_block(crc: u16, data: &[u8]) -> u16 {
    let mut crc = crc;
    let mut i = 0;
    while i < data.len() {
        crc = crc16_update(crc, data[i]);
        i += 1;
    }
    crc
}

/// Fold one byte into a CRC-7 accumulator
///
/// The accumulator holds the remainder in its low seven bits; bit 7 of the
/// result is always clear.
pub const fn crc7_update(crc: u8, data: u8) -> u8 {
    let mut crc = crc;
    let mut data = data;
    let mut bit = 0;
    while bit < 8 {
        crc <<= 1;
        if (data ^ crc) & 0x80 != 0 {
            crc ^= CRC7_POLY;
        }
        data <<= 1;
        bit += 1;
    }
    crc & 0x7f
}

/// Fold a block of bytes into a CRC-7 accumulator, in order
pub const fn crc7_block(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    let mut i = 0;
    while i < data.len() {
        crc = crc7_update(crc, data[i]);
        i += 1;
    }
    crc
}

/// Trailing byte of an SD command frame: CRC-7 shifted up with the end bit
///
/// `frame` is the command byte followed by the four argument bytes.
pub const fn sd_command_crc(frame: &[u8]) -> u8 {
    (crc7_block(0, frame) << 1) | 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CHECK: &[u8] = b"123456789";

    #[test]
    fn test_crc16_xmodem_check_value() {
        assert_eq!(crc16_block(0, CHECK), 0x31C3);
    }

    #[test]
    fn test_crc7_check_value() {
        assert_eq!(crc7_block(0, CHECK), 0x75);
    }

    #[test]
    fn test_crc16_empty_block_is_identity() {
        assert_eq!(crc16_block(0, &[]), 0);
        assert_eq!(crc16_block(0xBEEF, &[]), 0xBEEF);
        assert_eq!(crc7_block(0x2A, &[]), 0x2A);
    }

    #[test]
    fn test_sd_command_trailers() {
        // GO_IDLE_STATE and SEND_IF_COND carry fixed, well known trailers
        assert_eq!(sd_command_crc(&[0x40, 0, 0, 0, 0]), 0x95);
        assert_eq!(sd_command_crc(&[0x48, 0, 0, 0x01, 0xAA]), 0x87);
    }

    #[test]
    fn test_crc16_is_order_sensitive() {
        assert_ne!(crc16_block(0, &[0x01, 0x02]), crc16_block(0, &[0x02, 0x01]));
    }

    #[test]
    fn test_crc16_table_matches_bitwise() {
        for crc in [0u16, 0x1234, 0xFFFF, 0x8000] {
            for byte in 0..=255u8 {
                assert_eq!(crc16_update(crc, byte), crc16_update_bitwise(crc, byte));
            }
        }
    }

    #[test]
    fn test_crc_evaluates_at_compile_time() {
        const FRAME: u8 = sd_command_crc(&[0x40, 0, 0, 0, 0]);
        const BLOCK: u16 = crc16_block(0, b"123456789");
        assert_eq!(FRAME, 0x95);
        assert_eq!(BLOCK, 0x31C3);
    }

    proptest! {
        #[test]
        fn crc16_block_is_left_fold(acc: u16, data in proptest::collection::vec(any::<u8>(), 0..600)) {
            let folded = data.iter().fold(acc, |crc, &b| crc16_update(crc, b));
            prop_assert_eq!(crc16_block(acc, &data), folded);
        }

        #[test]
        fn crc7_block_is_left_fold(acc in 0u8..0x80, data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let folded = data.iter().fold(acc, |crc, &b| crc7_update(crc, b));
            prop_assert_eq!(crc7_block(acc, &data), folded);
        }

        #[test]
        fn crc16_block_splits_anywhere(data in proptest::collection::vec(any::<u8>(), 0..256), split: prop::sample::Index) {
            let at = split.index(data.len() + 1);
            let (head, tail) = data.split_at(at);
            prop_assert_eq!(crc16_block(crc16_block(0, head), tail), crc16_block(0, &data));
        }

        #[test]
        fn crc7_stays_seven_bits(acc: u8, byte: u8) {
            prop_assert!(crc7_update(acc, byte) < 0x80);
        }
    }
}
