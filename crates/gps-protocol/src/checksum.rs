//! NMEA checksum

use crate::{CHECKSUM_MARKER, START_MARKER};
use telemetry::SENTENCE_CAPACITY;

/// XOR of every byte strictly between the start marker and `*`.
///
/// Returns the accumulator and the index of the `*`, or `None` when no
/// delimiter appears within the buffer bound.
pub fn checksum(line: &[u8]) -> Option<(u8, usize)> {
    let bound = line.len().min(SENTENCE_CAPACITY);
    let mut acc = 0u8;
    for (i, &byte) in line.iter().enumerate().take(bound).skip(1) {
        match byte {
            CHECKSUM_MARKER => return Some((acc, i)),
            0 | b'\n' => return None,
            _ => acc ^= byte,
        }
    }
    None
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

/// True iff the line starts with `$` and its two hex digits after `*`
/// match the XOR of the payload
pub fn validate_checksum(line: &[u8]) -> bool {
    if line.first() != Some(&START_MARKER) {
        return false;
    }
    let Some((acc, star)) = checksum(line) else {
        return false;
    };
    let (Some(&hi), Some(&lo)) = (line.get(star + 1), line.get(star + 2)) else {
        return false;
    };
    if star + 2 >= SENTENCE_CAPACITY {
        return false;
    }
    match (hex_value(hi), hex_value(lo)) {
        (Some(hi), Some(lo)) => (hi << 4 | lo) == acc,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,,,,*1F\r\n";

    #[test]
    fn test_valid_sentence() {
        assert!(validate_checksum(GGA));
        assert!(validate_checksum(
            b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\n"
        ));
    }

    #[test]
    fn test_lowercase_digits_accepted() {
        assert!(validate_checksum(
            b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6a\n"
        ));
    }

    #[test]
    fn test_wrong_checksum() {
        assert!(!validate_checksum(
            b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,,,,*47\r\n"
        ));
    }

    #[test]
    fn test_missing_delimiter() {
        assert!(!validate_checksum(b"$GPGGA,123519,4807.038,N\r\n"));
    }

    #[test]
    fn test_non_hex_digit() {
        assert!(!validate_checksum(
            b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,,,,*1G\r\n"
        ));
    }

    #[test]
    fn test_truncated_digits() {
        assert!(!validate_checksum(b"$GPGGA,1*1"));
    }

    #[test]
    fn test_requires_start_marker() {
        assert!(!validate_checksum(
            b"GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,,,,*1F\r\n"
        ));
    }

    proptest! {
        #[test]
        fn prop_single_bit_flip_rejected(pos in 1usize..58, bit in 0u8..8) {
            let star = GGA.iter().position(|&b| b == b'*').unwrap();
            prop_assume!(pos < star);
            let mut line = GGA.to_vec();
            line[pos] ^= 1 << bit;
            // Flipping into the delimiter moves the checksum field itself.
            prop_assume!(line[pos] != b'*');
            prop_assert!(!validate_checksum(&line));
        }
    }
}
