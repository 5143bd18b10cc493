//! Double-buffered Tick Counter

use crate::decode::{decode, Step};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU8, Ordering};
use telemetry::{status, SharedRecord};
use tracing::debug;

/// Encoder wiring options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Negate counts when the phases are wired for the other rotation sense
    pub reverse_direction: bool,
}

/// Ticks and error state collected during one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderReading {
    pub ticks: i16,
    pub error: bool,
}

#[derive(Debug, Default)]
struct CounterCell {
    count: AtomicI16,
    error: AtomicBool,
}

impl CounterCell {
    fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.error.store(false, Ordering::Release);
    }
}

/// Two counter cells and a single-byte index selecting the one the
/// interrupt handler writes. The main loop owns the other cell.
#[derive(Debug, Default)]
pub struct EncoderCounter {
    cells: [CounterCell; 2],
    active: AtomicU8,
    last_sample: AtomicU8,
    reverse: bool,
}

impl EncoderCounter {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            reverse: config.reverse_direction,
            ..Default::default()
        }
    }

    /// Record the phase levels at start-up so the first edge decodes cleanly
    pub fn prime(&self, sample: u8) {
        self.last_sample.store(sample & 0b11, Ordering::Relaxed);
    }

    /// Interrupt context: a phase input changed; `sample` holds A in bit 1
    /// and B in bit 0
    pub fn on_edge(&self, sample: u8) {
        let sample = sample & 0b11;
        let previous = self.last_sample.swap(sample, Ordering::Relaxed);
        let cell = &self.cells[usize::from(self.active.load(Ordering::Acquire) & 1)];
        match decode(previous, sample) {
            Step::Forward => {
                cell.count.fetch_add(1, Ordering::AcqRel);
            }
            Step::Backward => {
                cell.count.fetch_sub(1, Ordering::AcqRel);
            }
            Step::Illegal => cell.error.store(true, Ordering::Release),
        }
    }

    /// Main loop: take the ticks counted since the previous drain
    pub fn drain(&self) -> EncoderReading {
        self.drain_with(|| {})
    }

    /// `drain`, running `between` after the inactive cell is cleared and
    /// before the index swap
    pub(crate) fn drain_with(&self, between: impl FnOnce()) -> EncoderReading {
        let active = self.active.load(Ordering::Acquire) & 1;
        let inactive = active ^ 1;

        self.cells[usize::from(inactive)].clear();
        between();
        self.active.store(inactive, Ordering::Release);

        let cell = &self.cells[usize::from(active)];
        let ticks = cell.count.load(Ordering::Acquire);
        EncoderReading {
            ticks: if self.reverse { ticks.wrapping_neg() } else { ticks },
            error: cell.error.load(Ordering::Acquire),
        }
    }

    /// Main loop: drain into the record
    pub fn update(&self, record: &mut SharedRecord) {
        let reading = self.drain();
        record.encoder.ticks = reading.ticks;
        record.encoder.valid = !reading.error;
        if reading.error {
            debug!("Illegal quadrature transition ({} ticks discarded)", reading.ticks);
            record.raise(status::ENCODER_ERROR);
        } else {
            record.raise(status::ENCODER_VALID);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FORWARD: [u8; 4] = [0b00, 0b10, 0b11, 0b01];

    /// Simulated wheel producing phase samples
    struct Wheel {
        phase: usize,
    }

    impl Wheel {
        fn forward(&mut self) -> u8 {
            self.phase = (self.phase + 1) % 4;
            FORWARD[self.phase]
        }

        fn backward(&mut self) -> u8 {
            self.phase = (self.phase + 3) % 4;
            FORWARD[self.phase]
        }

        fn skip(&mut self) -> u8 {
            self.phase = (self.phase + 2) % 4;
            FORWARD[self.phase]
        }

        fn bounce(&self) -> u8 {
            FORWARD[self.phase]
        }
    }

    #[test]
    fn test_counts_forward() {
        let counter = EncoderCounter::default();
        let mut wheel = Wheel { phase: 0 };
        for _ in 0..10 {
            counter.on_edge(wheel.forward());
        }
        assert_eq!(counter.drain(), EncoderReading { ticks: 10, error: false });
        assert_eq!(counter.drain(), EncoderReading { ticks: 0, error: false });
    }

    #[test]
    fn test_counts_backward() {
        let counter = EncoderCounter::default();
        let mut wheel = Wheel { phase: 0 };
        for _ in 0..7 {
            counter.on_edge(wheel.backward());
        }
        assert_eq!(counter.drain().ticks, -7);
    }

    #[test]
    fn test_illegal_edge_flags_error() {
        let counter = EncoderCounter::default();
        let mut wheel = Wheel { phase: 0 };
        counter.on_edge(wheel.forward());
        counter.on_edge(wheel.skip());

        let reading = counter.drain();
        assert_eq!(reading.ticks, 1);
        assert!(reading.error);
        assert!(!counter.drain().error);
    }

    #[test]
    fn test_edge_between_clear_and_swap_kept() {
        let counter = EncoderCounter::default();
        let mut wheel = Wheel { phase: 0 };
        counter.on_edge(wheel.forward());

        let first = counter.drain_with(|| counter.on_edge(wheel.forward()));
        assert_eq!(first.ticks, 2);
        assert_eq!(counter.drain().ticks, 0);
    }

    #[test]
    fn test_reverse_direction() {
        let counter = EncoderCounter::new(&EncoderConfig { reverse_direction: true });
        let mut wheel = Wheel { phase: 0 };
        counter.on_edge(wheel.forward());
        assert_eq!(counter.drain().ticks, -1);
    }

    #[test]
    fn test_update_sets_validity() {
        let counter = EncoderCounter::default();
        let mut wheel = Wheel { phase: 0 };
        let mut record = SharedRecord::new();

        counter.on_edge(wheel.forward());
        counter.update(&mut record);
        assert!(record.has(status::ENCODER_VALID));
        assert_eq!(record.encoder.ticks, 1);

        record.begin_cycle();
        counter.on_edge(wheel.bounce());
        counter.update(&mut record);
        assert!(record.has(status::ENCODER_ERROR));
        assert!(!record.encoder.valid);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Forward,
        Backward,
        Bounce,
        Drain,
        /// Drain with this many forward edges landing mid-drain
        DrainInterleaved(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => Just(Op::Forward),
            2 => Just(Op::Backward),
            1 => Just(Op::Bounce),
            1 => Just(Op::Drain),
            1 => (1u8..5).prop_map(Op::DrainInterleaved),
        ]
    }

    proptest! {
        #[test]
        fn prop_drains_conserve_ticks(ops in prop::collection::vec(op(), 0..300)) {
            let counter = EncoderCounter::default();
            let mut wheel = Wheel { phase: 0 };
            let mut expected: i64 = 0;
            let mut drained: i64 = 0;

            for op in ops {
                match op {
                    Op::Forward => {
                        counter.on_edge(wheel.forward());
                        expected += 1;
                    }
                    Op::Backward => {
                        counter.on_edge(wheel.backward());
                        expected -= 1;
                    }
                    Op::Bounce => counter.on_edge(wheel.bounce()),
                    Op::Drain => drained += i64::from(counter.drain().ticks),
                    Op::DrainInterleaved(edges) => {
                        let reading = counter.drain_with(|| {
                            for _ in 0..edges {
                                counter.on_edge(wheel.forward());
                            }
                        });
                        expected += i64::from(edges);
                        drained += i64::from(reading.ticks);
                    }
                }
            }
            drained += i64::from(counter.drain().ticks);
            prop_assert_eq!(drained, expected);
        }
    }
}
