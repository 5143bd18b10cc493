//! Quadrature transition table

/// Movement implied by one sampled transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Forward,
    Backward,
    /// No change, or both phases changed at once
    Illegal,
}

/// Decode a transition between two 2-bit samples (bit 1 = A, bit 0 = B)
pub fn decode(previous: u8, current: u8) -> Step {
    let a = current >> 1 & 1;
    let b = current & 1;
    match (previous ^ current) & 0b11 {
        // B changed
        0b01 if a == b => Step::Forward,
        0b01 => Step::Backward,
        // A changed
        0b10 if a != b => Step::Forward,
        0b10 => Step::Backward,
        _ => Step::Illegal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gray sequence for forward rotation
    const FORWARD: [u8; 4] = [0b00, 0b10, 0b11, 0b01];

    #[test]
    fn test_forward_sequence() {
        for i in 0..4 {
            let prev = FORWARD[i];
            let next = FORWARD[(i + 1) % 4];
            assert_eq!(decode(prev, next), Step::Forward, "{prev:02b} -> {next:02b}");
        }
    }

    #[test]
    fn test_backward_sequence() {
        for i in 0..4 {
            let prev = FORWARD[(i + 1) % 4];
            let next = FORWARD[i];
            assert_eq!(decode(prev, next), Step::Backward, "{prev:02b} -> {next:02b}");
        }
    }

    #[test]
    fn test_illegal_transitions() {
        for sample in 0..4u8 {
            assert_eq!(decode(sample, sample), Step::Illegal);
            assert_eq!(decode(sample, sample ^ 0b11), Step::Illegal);
        }
    }
}
