//! Hardware the control stack runs on

use block_storage::SpiBus;
use cycle_scheduler::CycleTimer;
use heading_sensor::TwoWireBus;
use mobility::PulseHardware;

/// A target board: one type per hardware seam
pub trait Board {
    type Timer: CycleTimer;
    type CompassBus: TwoWireBus;
    type StorageBus: SpiBus;
    type PulseOutput: PulseHardware;
}

/// The peripherals handed to [`crate::Rover::new`]
pub struct Peripherals<B: Board> {
    pub timer: B::Timer,
    pub compass_bus: B::CompassBus,
    pub storage_bus: B::StorageBus,
    pub pulse_output: B::PulseOutput,
}
