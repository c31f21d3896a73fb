//! Register file and per-address handler table ($4800-$4842)
//!
//! Every address has its own hardware behavior: a read effect, an optional
//! store mask, and a side effect triggered after the store. The dispatcher in
//! `chip` looks the record up instead of branching on the address.

use serde::{Deserialize, Serialize};

pub const BASE: u16 = 0x4800;
pub const REGISTER_COUNT: usize = 0x43;

// Decompression unit
pub const DECOMP_DATA: u16 = 0x4800;
pub const DECOMP_TABLE_LO: u16 = 0x4801;
pub const DECOMP_TABLE_MID: u16 = 0x4802;
pub const DECOMP_TABLE_HI: u16 = 0x4803;
pub const DECOMP_INDEX: u16 = 0x4804;
pub const DECOMP_LENGTH_LO: u16 = 0x4805;
pub const DECOMP_LENGTH_HI: u16 = 0x4806;
pub const DECOMP_CHANNEL: u16 = 0x4807;
pub const DECOMP_RESERVED: u16 = 0x4808;
pub const DECOMP_COUNTER_LO: u16 = 0x4809;
pub const DECOMP_COUNTER_HI: u16 = 0x480A;
pub const DECOMP_CONTROL: u16 = 0x480B;
pub const DECOMP_STATUS: u16 = 0x480C;

// Data port unit
pub const PORT_DATA_A: u16 = 0x4810;
pub const PORT_OFFSET_LO: u16 = 0x4811;
pub const PORT_OFFSET_MID: u16 = 0x4812;
pub const PORT_OFFSET_HI: u16 = 0x4813;
pub const PORT_ADJUST_LO: u16 = 0x4814;
pub const PORT_ADJUST_HI: u16 = 0x4815;
pub const PORT_STRIDE_LO: u16 = 0x4816;
pub const PORT_STRIDE_HI: u16 = 0x4817;
pub const PORT_MODE: u16 = 0x4818;
pub const PORT_DATA_B: u16 = 0x481A;

// Math unit
pub const ALU_MULTIPLIER_LO: u16 = 0x4820; // also dividend bits 0-7
pub const ALU_MULTIPLIER_HI: u16 = 0x4821; // also dividend bits 8-15
pub const ALU_DIVIDEND_0: u16 = 0x4820;
pub const ALU_DIVIDEND_2: u16 = 0x4822;
pub const ALU_DIVIDEND_3: u16 = 0x4823;
pub const ALU_MULTIPLICAND_LO: u16 = 0x4824;
pub const ALU_MULTIPLICAND_HI: u16 = 0x4825;
pub const ALU_DIVISOR_LO: u16 = 0x4826;
pub const ALU_DIVISOR_HI: u16 = 0x4827;
pub const ALU_RESULT_0: u16 = 0x4828;
pub const ALU_REMAINDER_LO: u16 = 0x482C;
pub const ALU_SIGN: u16 = 0x482E;
pub const ALU_STATUS: u16 = 0x482F;

// Memory mapping unit
pub const MMU_BANK_0: u16 = 0x4830; // bit 7: RAM enable
pub const MMU_BANK_1: u16 = 0x4831;
pub const MMU_BANK_2: u16 = 0x4832;
pub const MMU_BANK_3: u16 = 0x4833;
pub const MMU_SIZE_MODE: u16 = 0x4834;

// Real-time clock unit
pub const RTC_ENABLE: u16 = 0x4840;
pub const RTC_DATA: u16 = 0x4841;
pub const RTC_STATUS: u16 = 0x4842;

/// Unit a register belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    None,
    Decomp,
    DataPort,
    Alu,
    Mmu,
    Rtc,
}

/// What a host read of the address does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEffect {
    /// Nothing drives the bus; the host sees its last data byte
    OpenBus,
    /// Return the stored cell
    Latch,
    /// Always reads 0
    Zero,
    /// Next decompressed byte, decrements the visible counter
    DecompStream,
    /// Status byte, bit 7 clears after the read
    DecompStatus,
    /// Cursor A byte, then step cursor A
    PortA,
    /// Cursor B byte, then step cursor B when configured
    PortB,
    /// RTC nibble at the protocol cursor
    RtcData,
}

/// Side effect applied after the (masked) store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEffect {
    None,
    DecompStart,
    PortStep,
    PortRefresh,
    AdjustLow,
    AdjustHigh,
    PortMode,
    MultiplyArm,
    DivideArm,
    RtcEnable,
    RtcCommand,
}

/// Hardware behavior of one address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    pub unit: Unit,
    pub read: ReadEffect,
    /// Bits kept when the host writes; `None` leaves the cell untouched
    pub store_mask: Option<u8>,
    pub effect: WriteEffect,
}

impl Handler {
    pub const UNMAPPED: Handler = Handler {
        unit: Unit::None,
        read: ReadEffect::OpenBus,
        store_mask: None,
        effect: WriteEffect::None,
    };

    const fn new(unit: Unit, read: ReadEffect, store_mask: Option<u8>, effect: WriteEffect) -> Self {
        Self {
            unit,
            read,
            store_mask,
            effect,
        }
    }

    /// Plain read/write cell with a store mask
    const fn latch(unit: Unit, mask: u8) -> Self {
        Self::new(unit, ReadEffect::Latch, Some(mask), WriteEffect::None)
    }

    /// Readable cell the host cannot write
    const fn read_only(unit: Unit) -> Self {
        Self::new(unit, ReadEffect::Latch, None, WriteEffect::None)
    }

    const fn trigger(unit: Unit, mask: u8, effect: WriteEffect) -> Self {
        Self::new(unit, ReadEffect::Latch, Some(mask), effect)
    }
}

use ReadEffect as R;
use Unit as U;
use WriteEffect as W;

const HANDLERS: &[(u16, Handler)] = &[
    (DECOMP_DATA, Handler::new(U::Decomp, R::DecompStream, None, W::None)),
    (DECOMP_TABLE_LO, Handler::latch(U::Decomp, 0xFF)),
    (DECOMP_TABLE_MID, Handler::latch(U::Decomp, 0xFF)),
    (DECOMP_TABLE_HI, Handler::latch(U::Decomp, 0x7F)),
    (DECOMP_INDEX, Handler::latch(U::Decomp, 0xFF)),
    (DECOMP_LENGTH_LO, Handler::latch(U::Decomp, 0xFF)),
    (DECOMP_LENGTH_HI, Handler::trigger(U::Decomp, 0xFF, W::DecompStart)),
    (DECOMP_CHANNEL, Handler::latch(U::Decomp, 0xFF)),
    (DECOMP_RESERVED, Handler::new(U::Decomp, R::Zero, None, W::None)),
    (DECOMP_COUNTER_LO, Handler::latch(U::Decomp, 0xFF)),
    (DECOMP_COUNTER_HI, Handler::latch(U::Decomp, 0xFF)),
    (DECOMP_CONTROL, Handler::latch(U::Decomp, 0x03)),
    (DECOMP_STATUS, Handler::new(U::Decomp, R::DecompStatus, None, W::None)),
    (PORT_DATA_A, Handler::new(U::DataPort, R::PortA, None, W::PortStep)),
    (PORT_OFFSET_LO, Handler::latch(U::DataPort, 0xFF)),
    (PORT_OFFSET_MID, Handler::latch(U::DataPort, 0xFF)),
    (PORT_OFFSET_HI, Handler::trigger(U::DataPort, 0x7F, W::PortRefresh)),
    (PORT_ADJUST_LO, Handler::trigger(U::DataPort, 0xFF, W::AdjustLow)),
    (PORT_ADJUST_HI, Handler::trigger(U::DataPort, 0xFF, W::AdjustHigh)),
    (PORT_STRIDE_LO, Handler::latch(U::DataPort, 0xFF)),
    (PORT_STRIDE_HI, Handler::latch(U::DataPort, 0xFF)),
    (PORT_MODE, Handler::trigger(U::DataPort, 0x7F, W::PortMode)),
    (PORT_DATA_B, Handler::new(U::DataPort, R::PortB, None, W::None)),
    (0x4820, Handler::latch(U::Alu, 0xFF)),
    (0x4821, Handler::latch(U::Alu, 0xFF)),
    (0x4822, Handler::latch(U::Alu, 0xFF)),
    (0x4823, Handler::latch(U::Alu, 0xFF)),
    (ALU_MULTIPLICAND_LO, Handler::latch(U::Alu, 0xFF)),
    (ALU_MULTIPLICAND_HI, Handler::trigger(U::Alu, 0xFF, W::MultiplyArm)),
    (ALU_DIVISOR_LO, Handler::latch(U::Alu, 0xFF)),
    (ALU_DIVISOR_HI, Handler::trigger(U::Alu, 0xFF, W::DivideArm)),
    (0x4828, Handler::read_only(U::Alu)),
    (0x4829, Handler::read_only(U::Alu)),
    (0x482A, Handler::read_only(U::Alu)),
    (0x482B, Handler::read_only(U::Alu)),
    (0x482C, Handler::read_only(U::Alu)),
    (0x482D, Handler::read_only(U::Alu)),
    (ALU_SIGN, Handler::latch(U::Alu, 0x01)),
    (ALU_STATUS, Handler::read_only(U::Alu)),
    (MMU_BANK_0, Handler::latch(U::Mmu, 0x87)),
    (MMU_BANK_1, Handler::latch(U::Mmu, 0x07)),
    (MMU_BANK_2, Handler::latch(U::Mmu, 0x07)),
    (MMU_BANK_3, Handler::latch(U::Mmu, 0x07)),
    (MMU_SIZE_MODE, Handler::latch(U::Mmu, 0x07)),
    (RTC_ENABLE, Handler::trigger(U::Rtc, 0x03, W::RtcEnable)),
    (RTC_DATA, Handler::new(U::Rtc, R::RtcData, None, W::RtcCommand)),
    (RTC_STATUS, Handler::read_only(U::Rtc)),
];

static TABLE: [Handler; REGISTER_COUNT] = {
    let mut table = [Handler::UNMAPPED; REGISTER_COUNT];
    let mut i = 0;
    while i < HANDLERS.len() {
        let (addr, handler) = HANDLERS[i];
        table[(addr - BASE) as usize] = handler;
        i += 1;
    }
    table
};

/// Handler record for a 16-bit bus address
pub fn handler(addr: u16) -> Handler {
    match addr.checked_sub(BASE) {
        Some(index) if (index as usize) < REGISTER_COUNT => TABLE[index as usize],
        _ => Handler::UNMAPPED,
    }
}

/// Byte cells $4800-$4842
///
/// Cells only hold values; what a host access does lives in the handler
/// table. Multi-byte values are little-endian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct RegisterFile {
    cells: [u8; REGISTER_COUNT],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Power-on values: everything clear except the default bank layout
    /// (window 2 on bank 1, window 3 on bank 2)
    pub fn new() -> Self {
        let mut regs = Self {
            cells: [0; REGISTER_COUNT],
        };
        regs.set(MMU_BANK_2, 0x01);
        regs.set(MMU_BANK_3, 0x02);
        regs
    }

    fn index(addr: u16) -> usize {
        (addr - BASE) as usize
    }

    pub fn get(&self, addr: u16) -> u8 {
        self.cells[Self::index(addr)]
    }

    pub fn set(&mut self, addr: u16, value: u8) {
        self.cells[Self::index(addr)] = value;
    }

    pub fn get_u16(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.get(addr), self.get(addr + 1)])
    }

    pub fn set_u16(&mut self, addr: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.set(addr, lo);
        self.set(addr + 1, hi);
    }

    pub fn get_u24(&self, addr: u16) -> u32 {
        u32::from_le_bytes([self.get(addr), self.get(addr + 1), self.get(addr + 2), 0])
    }

    pub fn get_u32(&self, addr: u16) -> u32 {
        u32::from_le_bytes([
            self.get(addr),
            self.get(addr + 1),
            self.get(addr + 2),
            self.get(addr + 3),
        ])
    }

    pub fn set_u32(&mut self, addr: u16, value: u32) {
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            self.set(addr + i as u16, byte);
        }
    }
}

impl TryFrom<Vec<u8>> for RegisterFile {
    type Error = String;

    fn try_from(cells: Vec<u8>) -> Result<Self, Self::Error> {
        let len = cells.len();
        let cells = cells
            .try_into()
            .map_err(|_| format!("expected {} register cells, got {}", REGISTER_COUNT, len))?;
        Ok(Self { cells })
    }
}

impl From<RegisterFile> for Vec<u8> {
    fn from(regs: RegisterFile) -> Self {
        regs.cells.to_vec()
    }
}
