//! Decompression front-end
//!
//! The chip only starts sessions and pulls bytes; the algorithm sits behind
//! the [`Decompressor`] trait.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registers::{
    DECOMP_COUNTER_LO, DECOMP_INDEX, DECOMP_LENGTH_LO, DECOMP_STATUS, DECOMP_TABLE_LO,
    RegisterFile,
};

const STATUS_READY: u8 = 0x80;

/// Source side of a decompression session
pub trait DataRom {
    fn read(&self, addr: u32) -> u8;
}

/// Stateful byte producer started by the chip
pub trait Decompressor {
    fn reset(&mut self);

    /// Begin a session over `length` output bytes from source `offset`
    fn init(&mut self, mode: u8, offset: u32, length: u32);

    /// Produce the next output byte, pulling source bytes from `rom`
    fn read(&mut self, rom: &dyn DataRom) -> u8;

    /// Internal state for a snapshot
    fn save(&self) -> Vec<u8>;

    /// Restore state produced by [`Decompressor::save`]
    fn load(&mut self, state: &[u8]);
}

/// Session started by the last write to $4806
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub mode: u8,
    pub offset: u32,
    pub length: u32,
    pub remaining: u32,
}

/// Register-side state of the decompression unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompUnit {
    session: Option<Session>,
}

impl DecompUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Fetch the 4-byte descriptor selected by the table/index registers
    ///
    /// Layout: mode byte, then the 24-bit source offset big-endian. The
    /// output length is the length register shifted by the mode.
    pub fn fetch_descriptor(regs: &RegisterFile, rom: &dyn DataRom) -> Session {
        let table = regs.get_u24(DECOMP_TABLE_LO);
        let index = (regs.get(DECOMP_INDEX) as u32) << 2;
        let addr = table + index;

        let mode = rom.read(addr);
        let offset = u32::from_be_bytes([0, rom.read(addr + 1), rom.read(addr + 2), rom.read(addr + 3)]);
        let length = (regs.get_u16(DECOMP_LENGTH_LO) as u32).wrapping_shl(mode as u32);

        Session {
            mode,
            offset,
            length,
            remaining: length,
        }
    }

    /// Start `session` on the decompressor and raise the status flag
    pub fn start(&mut self, regs: &mut RegisterFile, session: Session, decompressor: &mut dyn Decompressor) {
        debug!(
            "decompression started: mode {} offset {:06X} length {}",
            session.mode, session.offset, session.length
        );
        decompressor.init(session.mode, session.offset, session.length);
        regs.set(DECOMP_STATUS, STATUS_READY);
        self.session = Some(session);
    }

    /// Bookkeeping for a read of $4800
    ///
    /// The visible counter decrements on every read, wrapping, whether or
    /// not a session is still running.
    pub fn consume(&mut self, regs: &mut RegisterFile) {
        let counter = regs.get_u16(DECOMP_COUNTER_LO).wrapping_sub(1);
        regs.set_u16(DECOMP_COUNTER_LO, counter);
        if let Some(session) = self.session.as_mut() {
            session.remaining = session.remaining.saturating_sub(1);
        }
    }

    /// Read of $480C: bit 7 is cleared by the read itself
    pub fn read_status(regs: &mut RegisterFile) -> u8 {
        let status = regs.get(DECOMP_STATUS);
        regs.set(DECOMP_STATUS, status & 0x7F);
        status
    }
}

/// Streams source bytes unmodified, ignoring the mode
///
/// Useful for boards that store some data uncompressed and for tests.
#[derive(Debug, Clone, Default)]
pub struct PassthroughDecompressor {
    offset: u32,
    remaining: u32,
}

impl PassthroughDecompressor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decompressor for PassthroughDecompressor {
    fn reset(&mut self) {
        self.offset = 0;
        self.remaining = 0;
    }

    fn init(&mut self, _mode: u8, offset: u32, length: u32) {
        self.offset = offset;
        self.remaining = length;
    }

    fn read(&mut self, rom: &dyn DataRom) -> u8 {
        let data = rom.read(self.offset);
        self.offset = self.offset.wrapping_add(1) & 0xFFFFFF;
        self.remaining = self.remaining.saturating_sub(1);
        data
    }

    fn save(&self) -> Vec<u8> {
        let mut state = self.offset.to_le_bytes().to_vec();
        state.extend_from_slice(&self.remaining.to_le_bytes());
        state
    }

    fn load(&mut self, state: &[u8]) {
        if let (Some(offset), Some(remaining)) = (state.get(0..4), state.get(4..8)) {
            self.offset = u32::from_le_bytes([offset[0], offset[1], offset[2], offset[3]]);
            self.remaining = u32::from_le_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::{DECOMP_COUNTER_HI, DECOMP_LENGTH_HI};

    struct Bytes(Vec<u8>);

    impl DataRom for Bytes {
        fn read(&self, addr: u32) -> u8 {
            self.0.get(addr as usize).copied().unwrap_or(0)
        }
    }

    #[test]
    fn test_descriptor_is_big_endian() {
        let mut rom = vec![0; 0x40];
        // Entry 2 of a table at 0x20
        rom[0x28..0x2C].copy_from_slice(&[0x01, 0x12, 0x34, 0x56]);
        let mut regs = RegisterFile::new();
        regs.set(DECOMP_TABLE_LO, 0x20);
        regs.set(DECOMP_INDEX, 0x02);
        regs.set(DECOMP_LENGTH_LO, 0x10);
        regs.set(DECOMP_LENGTH_HI, 0x00);

        let session = DecompUnit::fetch_descriptor(&regs, &Bytes(rom));
        assert_eq!(session.mode, 1);
        assert_eq!(session.offset, 0x123456);
        assert_eq!(session.length, 0x20);
        assert_eq!(session.remaining, 0x20);
    }

    #[test]
    fn test_length_shifted_by_mode() {
        let mut regs = RegisterFile::new();
        regs.set(DECOMP_LENGTH_LO, 0x00);
        regs.set(DECOMP_LENGTH_HI, 0x01);
        let session = DecompUnit::fetch_descriptor(&regs, &Bytes(vec![2, 0, 0, 0]));
        assert_eq!(session.length, 0x400);
    }

    #[test]
    fn test_counter_wraps_past_zero() {
        let mut unit = DecompUnit::new();
        let mut regs = RegisterFile::new();
        unit.consume(&mut regs);
        assert_eq!(regs.get(DECOMP_COUNTER_LO), 0xFF);
        assert_eq!(regs.get(DECOMP_COUNTER_HI), 0xFF);
    }

    #[test]
    fn test_status_top_bit_clears_on_read() {
        let mut regs = RegisterFile::new();
        regs.set(DECOMP_STATUS, 0x83);
        assert_eq!(DecompUnit::read_status(&mut regs), 0x83);
        assert_eq!(DecompUnit::read_status(&mut regs), 0x03);
    }

    #[test]
    fn test_passthrough_streams_source() {
        let rom = Bytes(vec![0, 0, 0x11, 0x22, 0x33]);
        let mut decompressor = PassthroughDecompressor::new();
        decompressor.init(0, 2, 3);
        assert_eq!(decompressor.read(&rom), 0x11);
        assert_eq!(decompressor.read(&rom), 0x22);

        let saved = decompressor.save();
        let mut restored = PassthroughDecompressor::new();
        restored.load(&saved);
        assert_eq!(restored.read(&rom), 0x33);
        assert_eq!(decompressor.read(&rom), 0x33);
    }
}
