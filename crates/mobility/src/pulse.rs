//! Hardware-timed servo pulses
//!
//! Right after the cycle counter is reset, the main loop raises both
//! outputs and loads each compare register with its pulse width. The
//! compare-match interrupt drops the output, so pulse width does not
//! depend on main-loop timing.

use crate::MobilityConfig;
use std::sync::Mutex;
use tracing::info;

/// Servo output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Steering,
    Throttle,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Steering, Channel::Throttle];

    fn index(self) -> usize {
        match self {
            Channel::Steering => 0,
            Channel::Throttle => 1,
        }
    }
}

/// Output pins and compare registers
pub trait PulseHardware {
    fn set_high(&self, channel: Channel);
    fn set_low(&self, channel: Channel);
    /// Counter value at which the channel's compare interrupt fires
    fn load_compare(&self, channel: Channel, ticks: u16);
}

/// Drives both servo outputs
pub struct PulseGenerator<H: PulseHardware> {
    hardware: H,
    us_per_tick: u16,
}

impl<H: PulseHardware> PulseGenerator<H> {
    pub fn new(hardware: H, config: &MobilityConfig) -> Self {
        Self {
            hardware,
            us_per_tick: config.us_per_timer_tick.max(1),
        }
    }

    /// Main loop: start one pulse per channel. Call just after the cycle
    /// counter is reset.
    pub fn emit(&self, steering_us: u16, throttle_us: u16) {
        for (channel, us) in [(Channel::Steering, steering_us), (Channel::Throttle, throttle_us)] {
            self.hardware.load_compare(channel, us / self.us_per_tick);
            self.hardware.set_high(channel);
        }
    }

    /// Interrupt context: compare match ends the channel's pulse
    pub fn on_compare_match(&self, channel: Channel) {
        self.hardware.set_low(channel);
    }

    /// Send the power-up run of neutral pulses, one per cycle.
    ///
    /// `next_cycle` is called before every pulse and must return once the
    /// cycle counter has been reset for a new period.
    pub fn startup_neutral(&self, config: &MobilityConfig, mut next_cycle: impl FnMut()) {
        info!(
            "Sending {} neutral pulses for throttle-neutral protection",
            config.startup_neutral_pulses
        );
        for _ in 0..config.startup_neutral_pulses {
            next_cycle();
            self.emit(config.steering_neutral_us, config.throttle_neutral_us);
        }
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Pulse width a compare value produces
    pub fn ticks_to_us(&self, ticks: u16) -> u16 {
        ticks.saturating_mul(self.us_per_tick)
    }
}

#[derive(Debug, Default)]
struct MockChannel {
    high: bool,
    compare: u16,
    pulses: u32,
}

/// Simulated output pins and compare registers
#[derive(Debug, Default)]
pub struct MockPulseHardware {
    channels: Mutex<[MockChannel; 2]>,
}

impl MockPulseHardware {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut [MockChannel; 2]) -> R) -> R {
        let mut channels = match self.channels.lock() {
            Ok(channels) => channels,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut channels)
    }

    pub fn is_high(&self, channel: Channel) -> bool {
        self.with(|c| c[channel.index()].high)
    }

    pub fn compare(&self, channel: Channel) -> u16 {
        self.with(|c| c[channel.index()].compare)
    }

    /// Pulses started on this channel
    pub fn pulse_count(&self, channel: Channel) -> u32 {
        self.with(|c| c[channel.index()].pulses)
    }
}

impl PulseHardware for MockPulseHardware {
    fn set_high(&self, channel: Channel) {
        self.with(|c| {
            let ch = &mut c[channel.index()];
            ch.high = true;
            ch.pulses += 1;
        });
    }

    fn set_low(&self, channel: Channel) {
        self.with(|c| c[channel.index()].high = false);
    }

    fn load_compare(&self, channel: Channel, ticks: u16) {
        self.with(|c| c[channel.index()].compare = ticks);
    }
}

impl PulseGenerator<MockPulseHardware> {
    /// Fire compare interrupts for every high output, shortest pulse first
    pub fn complete_pulses(&self) {
        let mut pending: Vec<(u16, Channel)> = Channel::ALL
            .into_iter()
            .filter(|&ch| self.hardware.is_high(ch))
            .map(|ch| (self.hardware.compare(ch), ch))
            .collect();
        pending.sort_by_key(|&(ticks, _)| ticks);
        for (_, channel) in pending {
            self.on_compare_match(channel);
        }
    }
}
