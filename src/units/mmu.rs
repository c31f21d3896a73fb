//! Memory mapping unit
//!
//! Four 1 MiB windows, each selected by a bank register, map the host's ROM
//! address space onto the 8 MiB data ROM. Each window answers to two address
//! shapes, the LoROM-style `$xx:8000-FFFF` half banks and the HiROM-style
//! `$xx:0000-FFFF` full banks.

use crate::cartridge::Backing;
use crate::config::Config;
use crate::registers::{MMU_BANK_0, MMU_SIZE_MODE, RegisterFile};
use crate::units::decomp::DataRom;

const WINDOW_MASK: u32 = 0x0FFFFF;
const WINDOW_SIZE: u32 = 0x100000;
const BANK_MASK: u8 = 0x07;
const RAM_ENABLE: u8 = 0x80;
const SIZE_MODE_SECOND_PROM: u8 = 0x04;
const DROM_ADDRESS_MASK: u32 = 0x7FFFFF;
const RAM_PAGE_SIZE: u32 = 0x2000;

/// Where a ROM-space address lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Offset into the program ROM, before mirroring
    ProgramRom(u32),
    /// Address in the data ROM space, before size masking
    DataRom(u32),
    /// No window decodes the address
    Unmapped,
}

/// Window (0-3) that decodes `addr`, if any
///
/// Window n covers `$n0-$nF|$8n-$9F:8000-FFFF` style half banks and
/// `$Cn-$CF:0000-FFFF` style full banks, shifted by one megabyte per window.
pub fn window(addr: u32) -> Option<usize> {
    (0..4u32)
        .find(|&n| {
            (addr & 0x708000) == 0x008000 + n * WINDOW_SIZE
                || (addr & 0xF00000) == 0xC00000 + n * WINDOW_SIZE
        })
        .map(|n| n as usize)
}

/// Translate a ROM-space address
///
/// Pure function of the address, the bank/size registers and the cartridge
/// layout. Window 0 is hard-wired to the program ROM when the board has one;
/// window 1 shows the second program ROM megabyte when the size mode asks
/// for it.
pub fn translate(addr: u32, regs: &RegisterFile, config: &Config) -> Target {
    let Some(window) = window(addr) else {
        return Target::Unmapped;
    };
    let offset = addr & WINDOW_MASK;

    match window {
        0 if config.prom_size != 0 => Target::ProgramRom(offset),
        1 if regs.get(MMU_SIZE_MODE) & SIZE_MODE_SECOND_PROM != 0 => {
            Target::ProgramRom(WINDOW_SIZE + offset)
        }
        _ => {
            let bank = regs.get(MMU_BANK_0 + window as u16) & BANK_MASK;
            Target::DataRom(offset | (bank as u32) * WINDOW_SIZE)
        }
    }
}

/// Read the program ROM at a logical offset
pub fn program_rom_read(config: &Config, backing: &dyn Backing, offset: u32) -> u8 {
    backing.rom_read(config.prom_base + backing.mirror(offset, config.prom_size))
}

/// Read the data ROM at a 24-bit address
///
/// The size mode declares the data ROM as 8, 16, 32 or 64 Mbit. When the
/// declared range fits inside the real chip, addresses past the chip read
/// as 0; otherwise they wrap onto it.
pub fn data_rom_read(regs: &RegisterFile, config: &Config, backing: &dyn Backing, addr: u32) -> u8 {
    let mask = (1u32 << (regs.get(MMU_SIZE_MODE) & 3)) - 1;
    let range = WINDOW_SIZE * (1 + mask);
    let offset = addr & DROM_ADDRESS_MASK;

    if range <= config.drom_size && offset >= config.drom_size {
        return 0x00;
    }

    backing.rom_read(config.drom_base + backing.mirror(offset, config.drom_size))
}

/// Read through a ROM-space window; `None` means open bus
pub fn rom_read(regs: &RegisterFile, config: &Config, backing: &dyn Backing, addr: u32) -> Option<u8> {
    match translate(addr, regs, config) {
        Target::ProgramRom(offset) => Some(program_rom_read(config, backing, offset)),
        Target::DataRom(addr) => Some(data_rom_read(regs, config, backing, addr)),
        Target::Unmapped => None,
    }
}

/// `$00-3F|$80-BF:6000-7FFF`
pub fn is_ram_window(addr: u32) -> bool {
    (addr & 0x40E000) == 0x006000
}

pub fn ram_enabled(regs: &RegisterFile) -> bool {
    regs.get(MMU_BANK_0) & RAM_ENABLE != 0
}

/// Physical RAM offset for a RAM-window address
///
/// Each bank contributes one 8 KiB page; the result wraps onto the RAM the
/// board actually carries.
pub fn ram_offset(backing: &dyn Backing, addr: u32) -> u32 {
    let bank = (addr >> 16) & 0x3F;
    backing.mirror(bank * RAM_PAGE_SIZE + (addr & (RAM_PAGE_SIZE - 1)), backing.ram_size())
}

/// Data ROM as seen by the decompressor: same path as the data port
pub struct DataRomView<'a> {
    regs: &'a RegisterFile,
    config: &'a Config,
    backing: &'a dyn Backing,
}

impl<'a> DataRomView<'a> {
    pub fn new(regs: &'a RegisterFile, config: &'a Config, backing: &'a dyn Backing) -> Self {
        Self {
            regs,
            config,
            backing,
        }
    }
}

impl DataRom for DataRomView<'_> {
    fn read(&self, addr: u32) -> u8 {
        data_rom_read(self.regs, self.config, self.backing, addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::CartridgeImage;
    use crate::registers::{MMU_BANK_1, MMU_BANK_2, MMU_BANK_3};
    use rand::Rng;

    // 1 MiB of program ROM filled with 0xAA, then `drom_size` bytes of data
    // ROM where each megabyte starts with its index
    fn image(drom_size: u32) -> (Config, CartridgeImage) {
        let mut rom = vec![0xAA; 0x100000];
        rom.extend((0..drom_size).map(|i| (i >> 20) as u8 * 0x10 + (i & 0x0F) as u8));
        let config = Config::new(rom.len() as u32);
        (config, CartridgeImage::new(rom, 0x2000))
    }

    #[test]
    fn test_window_shapes() {
        assert_eq!(window(0x008000), Some(0));
        assert_eq!(window(0x8F8000), Some(0));
        assert_eq!(window(0xC01234), Some(0));
        assert_eq!(window(0x108000), Some(1));
        assert_eq!(window(0xD0FFFF), Some(1));
        assert_eq!(window(0x2FFFFF), Some(2));
        assert_eq!(window(0xA08000), Some(2));
        assert_eq!(window(0xE00000), Some(2));
        assert_eq!(window(0x3F8000), Some(3));
        assert_eq!(window(0xF00000), Some(3));
        assert_eq!(window(0x007FFF), None);
        assert_eq!(window(0x408000), None);
        assert_eq!(window(0x200000), None);
    }

    #[test]
    fn test_translation_applies_bank_registers() {
        let config = Config::new(0x500000);
        let mut regs = RegisterFile::new();
        regs.set(MMU_BANK_1, 0x05);
        regs.set(MMU_BANK_2, 0x03);
        regs.set(MMU_BANK_3, 0x07);

        assert_eq!(translate(0x108123, &regs, &config), Target::DataRom(0x508123));
        assert_eq!(translate(0xE01234, &regs, &config), Target::DataRom(0x301234));
        assert_eq!(translate(0xB0FFFF, &regs, &config), Target::DataRom(0x70FFFF));
        assert_eq!(translate(0x400000, &regs, &config), Target::Unmapped);
    }

    #[test]
    fn test_window_zero_fixed_to_program_rom() {
        let config = Config::new(0x500000);
        let mut regs = RegisterFile::new();
        regs.set(MMU_BANK_0, 0x03);
        assert_eq!(translate(0xC04567, &regs, &config), Target::ProgramRom(0x04567));

        // Without a program ROM the bank register applies
        let no_prom = Config::default().with_prom_size(0x400000, 0);
        assert_eq!(translate(0xC04567, &regs, &no_prom), Target::DataRom(0x304567));
    }

    #[test]
    fn test_window_one_second_program_megabyte() {
        let config = Config::default().with_prom_size(0x600000, 0x200000);
        let mut regs = RegisterFile::new();
        regs.set(MMU_BANK_1, 0x04);
        assert_eq!(translate(0xD00010, &regs, &config), Target::DataRom(0x400010));

        regs.set(MMU_SIZE_MODE, 0x04);
        assert_eq!(translate(0xD00010, &regs, &config), Target::ProgramRom(0x100010));
    }

    #[test]
    fn test_translation_is_pure() {
        let config = Config::new(0x900000);
        let mut rng = rand::rng();
        for _ in 0..2000 {
            let mut regs = RegisterFile::new();
            for w in 0..4 {
                regs.set(MMU_BANK_0 + w, rng.random_range(0..=7));
            }
            regs.set(MMU_SIZE_MODE, rng.random_range(0..=7));
            let addr = rng.random_range(0..=0xFFFFFFu32);

            let first = translate(addr, &regs, &config);
            let copy = regs.clone();
            assert_eq!(translate(addr, &copy, &config), first);
            assert_eq!(translate(addr, &regs, &config), first);
        }
    }

    #[test]
    fn test_data_rom_size_mode() {
        let (config, backing) = image(0x100000);
        let mut regs = RegisterFile::new();

        // 8 Mbit declared, 8 Mbit present: past the end reads 0
        assert_eq!(data_rom_read(&regs, &config, &backing, 0x000005), 0x05);
        assert_eq!(data_rom_read(&regs, &config, &backing, 0x100005), 0x00);

        // 16 Mbit declared on an 8 Mbit chip: wraps
        regs.set(MMU_SIZE_MODE, 0x01);
        assert_eq!(data_rom_read(&regs, &config, &backing, 0x100005), 0x05);
    }

    #[test]
    fn test_rom_read_through_windows() {
        let (config, backing) = image(0x400000);
        let mut regs = RegisterFile::new();
        regs.set(MMU_SIZE_MODE, 0x02);
        regs.set(MMU_BANK_3, 0x02);

        assert_eq!(rom_read(&regs, &config, &backing, 0xC00003), Some(0xAA));
        assert_eq!(rom_read(&regs, &config, &backing, 0xF00003), Some(0x23));
        assert_eq!(rom_read(&regs, &config, &backing, 0x700000), None);
    }

    #[test]
    fn test_ram_window_mirrors_onto_board_ram() {
        let (_, backing) = image(0);
        assert!(is_ram_window(0x006000));
        assert!(is_ram_window(0xBF7FFF));
        assert!(!is_ram_window(0x008000));
        assert!(!is_ram_window(0x406000));

        assert_eq!(ram_offset(&backing, 0x006123), 0x0123);
        // 8 KiB of RAM: every bank lands on the same page
        assert_eq!(ram_offset(&backing, 0x016123), 0x0123);
        assert_eq!(ram_offset(&backing, 0x3F7FFF), 0x1FFF);
    }

    #[test]
    fn test_ram_enable_bit() {
        let mut regs = RegisterFile::new();
        assert!(!ram_enabled(&regs));
        regs.set(MMU_BANK_0, 0x80);
        assert!(ram_enabled(&regs));
    }
}
