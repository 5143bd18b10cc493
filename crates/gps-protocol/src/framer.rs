//! Interrupt-side sentence framer and its slot pool
//!
//! The receive interrupt owns a [`SentenceFramer`]; the main loop drains
//! the shared [`SentencePool`]. A slot's `ready` flag is the only handoff:
//! the framer writes a slot only while it is claimed and not ready, the
//! main loop reads it only while it is ready.

use crate::{LINE_TERMINATOR, START_MARKER};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use telemetry::{status, RawSentence, SENTENCE_CAPACITY, SENTENCE_SLOTS};

struct Slot {
    ready: AtomicBool,
    text: UnsafeCell<[u8; SENTENCE_CAPACITY]>,
}

impl Slot {
    fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            text: UnsafeCell::new([0; SENTENCE_CAPACITY]),
        }
    }
}

/// Fixed pool of sentence buffers shared by the framer and the main loop
pub struct SentencePool {
    slots: [Slot; SENTENCE_SLOTS],
    /// Framer fault bits (`status::SERIAL_*`) since the last drain
    faults: AtomicU32,
}

impl SentencePool {
    /// A fresh pool and the only framer that may ever write it
    pub fn with_framer() -> (Arc<Self>, SentenceFramer) {
        let pool = Arc::new(Self {
            slots: std::array::from_fn(|_| Slot::new()),
            faults: AtomicU32::new(0),
        });
        (pool.clone(), SentenceFramer::new(pool))
    }

    /// Main loop: copy out a ready slot and hand it back to the framer
    pub fn take_ready(&self, index: usize) -> Option<RawSentence> {
        let slot = self.slots.get(index)?;
        if !slot.ready.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: the slot is ready, so the framer will not touch it until
        // the flag is cleared below.
        let sentence = RawSentence::from_bytes(unsafe { &*slot.text.get() });
        slot.ready.store(false, Ordering::Release);
        Some(sentence)
    }

    /// Main loop: fault bits raised since the last call
    pub fn take_faults(&self) -> u32 {
        self.faults.swap(0, Ordering::AcqRel)
    }

    pub fn is_ready(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.ready.load(Ordering::Acquire))
    }

    fn raise(&self, bits: u32) {
        self.faults.fetch_or(bits, Ordering::AcqRel);
    }

    fn first_free(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| !slot.ready.load(Ordering::Acquire))
    }
}

// SAFETY: slot text is written only by the single framer handed out by
// `with_framer`, while the slot is claimed and not ready, and read only by the main loop while it is ready.
// The ready flag's Release/Acquire pair orders those accesses.
unsafe impl Sync for SentencePool {}

/// Receive-interrupt state: at most one claimed slot and its write cursor
pub struct SentenceFramer {
    pool: Arc<SentencePool>,
    claimed: Option<usize>,
    cursor: usize,
    overflowed: bool,
}

impl SentenceFramer {
    fn new(pool: Arc<SentencePool>) -> Self {
        Self {
            pool,
            claimed: None,
            cursor: 0,
            overflowed: false,
        }
    }

    /// Interrupt context: consume one received byte. Never blocks.
    pub fn on_byte(&mut self, byte: u8) {
        let index = match self.claimed {
            Some(index) => index,
            None => match self.pool.first_free() {
                Some(index) => {
                    self.claimed = Some(index);
                    self.cursor = 0;
                    self.overflowed = false;
                    index
                }
                None => {
                    self.pool.raise(status::SERIAL_NO_BUFFER);
                    return;
                }
            },
        };

        if byte == START_MARKER && self.cursor != 0 {
            self.pool.raise(status::SERIAL_UNEXPECTED_START);
            self.cursor = 0;
            self.overflowed = false;
        }

        let slot = &self.pool.slots[index];
        // SAFETY: this slot is claimed by us and not ready; the main loop
        // does not read it.
        let text = unsafe { &mut *slot.text.get() };

        if byte != LINE_TERMINATOR {
            if self.overflowed {
                return;
            }
            text[self.cursor] = byte;
            self.cursor += 1;
            if self.cursor == SENTENCE_CAPACITY - 2 {
                self.cursor -= 1;
                self.overflowed = true;
                self.pool.raise(status::SERIAL_BUFFER_OVERFLOW);
            }
            return;
        }

        text[self.cursor] = LINE_TERMINATOR;
        text[self.cursor + 1] = 0;
        slot.ready.store(true, Ordering::Release);
        self.claimed = None;
        self.cursor = 0;
    }

    /// Interrupt context: consume a burst of bytes
    pub fn on_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.on_byte(byte);
        }
    }

    pub fn pool(&self) -> &Arc<SentencePool> {
        &self.pool
    }
}
