use std::cell::Cell;
use std::rc::Rc;

/// Capabilities the chip needs from the host processor
pub trait Host {
    /// Host master clock count. Must never go backwards.
    fn clock(&self) -> u64;

    /// Last value driven onto the host data bus (open bus)
    fn open_bus(&self) -> u8;
}

#[derive(Debug, Default)]
struct HostLines {
    clock: Cell<u64>,
    mdr: Cell<u8>,
}

/// Host lines shared between the host CPU and the chip
///
/// Clones share the same lines: the host keeps one handle and advances it,
/// the chip reads through the other.
#[derive(Debug, Clone, Default)]
pub struct SharedHost {
    lines: Rc<HostLines>,
}

impl SharedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clock(&self, clock: u64) {
        self.lines.clock.set(clock);
    }

    /// Advance the host clock by `cycles` master cycles
    pub fn add_clock(&self, cycles: u64) {
        self.lines.clock.set(self.lines.clock.get() + cycles);
    }

    pub fn set_open_bus(&self, value: u8) {
        self.lines.mdr.set(value);
    }
}

impl Host for SharedHost {
    fn clock(&self) -> u64 {
        self.lines.clock.get()
    }

    fn open_bus(&self) -> u8 {
        self.lines.mdr.get()
    }
}
