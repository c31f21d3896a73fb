//! Data port ($4810-$481A)
//!
//! Direct reads from the data ROM through a 24-bit offset. Cursor A ($4810)
//! steps on every touch; cursor B ($481A) reads at offset + adjust and steps
//! by the adjust amount when the trigger mode asks for it.
//!
//! Mode register ($4818):
//! - bit 0: cursor A steps by the stride register instead of 1
//! - bit 1: cursor A reads at offset + adjust
//! - bit 2: stride is signed
//! - bit 3: adjust is signed
//! - bit 4: cursor A's step goes to the adjust register instead of the offset
//! - bits 5-6: adjust trigger (0 off, 1-2 on a completed adjust write, 3 on $481A reads)

use serde::{Deserialize, Serialize};

use crate::cartridge::Backing;
use crate::config::Config;
use crate::registers::{
    PORT_ADJUST_LO, PORT_DATA_A, PORT_DATA_B, PORT_MODE, PORT_OFFSET_HI, PORT_OFFSET_LO,
    PORT_OFFSET_MID, PORT_STRIDE_LO, RegisterFile,
};
use crate::units::mmu;

const MODE_STRIDE: u8 = 0x01;
const MODE_ADJUST_READ: u8 = 0x02;
const MODE_STRIDE_SIGNED: u8 = 0x04;
const MODE_ADJUST_SIGNED: u8 = 0x08;
const MODE_STEP_ADJUST: u8 = 0x10;

const ADDRESS_MASK: u32 = 0xFFFFFF;

/// Which half of the adjust register a write touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    Low,
    High,
}

/// When cursor B adds the adjust amount to the offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Never,
    AdjustWrite,
    ReadB,
}

fn trigger(regs: &RegisterFile) -> Trigger {
    match (regs.get(PORT_MODE) >> 5) & 3 {
        0 => Trigger::Never,
        1 | 2 => Trigger::AdjustWrite,
        _ => Trigger::ReadB,
    }
}

/// Data ROM path the port reads through
pub struct PortBus<'a> {
    pub config: &'a Config,
    pub backing: &'a dyn Backing,
}

impl PortBus<'_> {
    fn read(&self, regs: &RegisterFile, addr: u32) -> u8 {
        mmu::data_rom_read(regs, self.config, self.backing, addr & ADDRESS_MASK)
    }
}

/// Two-phase adjust latch
///
/// An adjust-triggered step only happens once both halves of the 16-bit
/// adjust amount have been written since the last step, so a half-written
/// amount never moves the cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPort {
    adjust_low_latched: bool,
    adjust_high_latched: bool,
}

impl DataPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latches(&self) -> (bool, bool) {
        (self.adjust_low_latched, self.adjust_high_latched)
    }

    pub fn offset(regs: &RegisterFile) -> u32 {
        regs.get_u24(PORT_OFFSET_LO)
    }

    fn set_offset(regs: &mut RegisterFile, offset: u32) {
        regs.set(PORT_OFFSET_LO, offset as u8);
        regs.set(PORT_OFFSET_MID, (offset >> 8) as u8);
        regs.set(PORT_OFFSET_HI, (offset >> 16) as u8 & 0x7F);
    }

    /// Adjust amount, sign-extended when the mode says so
    fn adjust(regs: &RegisterFile) -> u32 {
        let adjust = regs.get_u16(PORT_ADJUST_LO);
        if regs.get(PORT_MODE) & MODE_ADJUST_SIGNED != 0 {
            adjust as i16 as i32 as u32
        } else {
            adjust as u32
        }
    }

    /// Cursor A step size
    fn stride(regs: &RegisterFile) -> u32 {
        let mode = regs.get(PORT_MODE);
        if mode & MODE_STRIDE == 0 {
            return 1;
        }
        let stride = regs.get_u16(PORT_STRIDE_LO);
        if mode & MODE_STRIDE_SIGNED != 0 {
            stride as i16 as i32 as u32
        } else {
            stride as u32
        }
    }

    /// Reload both visible data bytes from the current pointers
    pub fn refresh(regs: &mut RegisterFile, bus: &PortBus) {
        let offset = Self::offset(regs);
        let adjust = Self::adjust(regs);

        let addr_a = if regs.get(PORT_MODE) & MODE_ADJUST_READ != 0 {
            offset.wrapping_add(adjust)
        } else {
            offset
        };
        let a = bus.read(regs, addr_a);
        let b = bus.read(regs, offset.wrapping_add(adjust));
        regs.set(PORT_DATA_A, a);
        regs.set(PORT_DATA_B, b);
    }

    /// Move cursor A one step and reload
    pub fn step_a(&mut self, regs: &mut RegisterFile, bus: &PortBus) {
        let stride = Self::stride(regs);
        if regs.get(PORT_MODE) & MODE_STEP_ADJUST != 0 {
            let adjust = regs.get_u16(PORT_ADJUST_LO).wrapping_add(stride as u16);
            regs.set_u16(PORT_ADJUST_LO, adjust);
        } else {
            Self::set_offset(regs, Self::offset(regs).wrapping_add(stride));
        }
        Self::refresh(regs, bus);
    }

    /// Read of $4810: the byte visible before the step
    pub fn read_a(&mut self, regs: &mut RegisterFile, bus: &PortBus) -> u8 {
        let data = regs.get(PORT_DATA_A);
        self.step_a(regs, bus);
        data
    }

    /// Read of $481A
    pub fn read_b(&mut self, regs: &mut RegisterFile, bus: &PortBus) -> u8 {
        let data = regs.get(PORT_DATA_B);
        if trigger(regs) == Trigger::ReadB {
            self.apply_adjust(regs, bus);
        }
        data
    }

    /// Write to $4814 or $4815 (the value is already stored)
    pub fn write_adjust(&mut self, regs: &mut RegisterFile, bus: &PortBus, half: Half) {
        match half {
            Half::Low => self.adjust_low_latched = true,
            Half::High => self.adjust_high_latched = true,
        }
        if self.adjust_low_latched && self.adjust_high_latched && trigger(regs) == Trigger::AdjustWrite {
            self.apply_adjust(regs, bus);
        }
    }

    /// Write to $4818 (the value is already stored)
    pub fn write_mode(&mut self, regs: &mut RegisterFile, bus: &PortBus) {
        self.clear_latches();
        Self::refresh(regs, bus);
    }

    fn apply_adjust(&mut self, regs: &mut RegisterFile, bus: &PortBus) {
        let offset = Self::offset(regs).wrapping_add(Self::adjust(regs));
        Self::set_offset(regs, offset);
        self.clear_latches();
        Self::refresh(regs, bus);
    }

    fn clear_latches(&mut self) {
        self.adjust_low_latched = false;
        self.adjust_high_latched = false;
    }
}
