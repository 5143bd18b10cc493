//! Hardware counter seam

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Free-running hardware counter used to time a cycle
pub trait CycleTimer {
    /// Reset the counter to zero
    fn reset(&mut self);

    /// Current counter value in timer ticks
    fn ticks(&self) -> u32;
}

/// Overflow flag raised by the counter's overflow interrupt
#[derive(Debug, Default)]
pub struct OverrunFlag(AtomicBool);

impl OverrunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt context: the counter wrapped
    pub fn on_overflow(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Simulated counter that advances a fixed step on every read.
///
/// When the count passes `top` it wraps to zero and raises the attached
/// overflow flag, like a 16-bit timer in normal mode.
#[derive(Debug)]
pub struct MockTimer {
    now: Cell<u32>,
    step: u32,
    top: u32,
    overflow: Option<Arc<OverrunFlag>>,
    resets: u32,
}

impl MockTimer {
    /// 16-bit counter advancing `step` ticks per read
    pub fn new(step: u32) -> Self {
        Self {
            now: Cell::new(0),
            step,
            top: u32::from(u16::MAX),
            overflow: None,
            resets: 0,
        }
    }

    /// Raise `flag` whenever the counter wraps
    pub fn attach_overflow(&mut self, flag: Arc<OverrunFlag>) {
        self.overflow = Some(flag);
    }

    /// Simulate main-loop work consuming `ticks`
    pub fn spend(&self, ticks: u32) {
        self.bump(ticks);
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    fn bump(&self, ticks: u32) {
        let next = self.now.get().saturating_add(ticks);
        if next > self.top {
            self.now.set(next - self.top - 1);
            if let Some(flag) = &self.overflow {
                flag.on_overflow();
            }
        } else {
            self.now.set(next);
        }
    }
}

impl CycleTimer for MockTimer {
    fn reset(&mut self) {
        self.now.set(0);
        self.resets += 1;
    }

    fn ticks(&self) -> u32 {
        let now = self.now.get();
        self.bump(self.step);
        now
    }
}
