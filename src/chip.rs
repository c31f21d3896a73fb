use tracing::{debug, info};

use crate::cartridge::Backing;
use crate::config::{CHIP_FREQUENCY, Config};
use crate::host::Host;
use crate::registers::{self, DECOMP_DATA, ReadEffect, RegisterFile, Unit, WriteEffect};
use crate::snapshot::{SNAPSHOT_VERSION, Snapshot};
use crate::units::alu::Alu;
use crate::units::data_port::{DataPort, Half, PortBus};
use crate::units::decomp::{DecompUnit, Decompressor};
use crate::units::mmu::{self, DataRomView};
use crate::units::rtc::{IMAGE_SIZE, Rtc};

/// SPC7110 coprocessor
///
/// Owns the register file and every unit. The host reaches it through
/// [`Spc7110::read`]/[`Spc7110::write`] for $4800-$4842 and the cartridge
/// bus entry points for the ROM and RAM windows; the host scheduler drives
/// chip time through [`Spc7110::advance`].
pub struct Spc7110 {
    config: Config,
    regs: RegisterFile,
    decomp: DecompUnit,
    data_port: DataPort,
    alu: Alu,
    rtc: Rtc,
    cycles: u64,
    handoff: bool,
    backing: Box<dyn Backing>,
    decompressor: Box<dyn Decompressor>,
    host: Box<dyn Host>,
}

impl Spc7110 {
    pub fn new(
        config: Config,
        backing: Box<dyn Backing>,
        decompressor: Box<dyn Decompressor>,
        host: Box<dyn Host>,
    ) -> Self {
        let rtc = Rtc::new(config.has_rtc);
        let mut chip = Self {
            config,
            regs: RegisterFile::new(),
            decomp: DecompUnit::new(),
            data_port: DataPort::new(),
            alu: Alu::new(),
            rtc,
            cycles: 0,
            handoff: false,
            backing,
            decompressor,
            host,
        };
        chip.reset();
        chip
    }

    /// Reset every register and unit, keeping the RTC memory
    ///
    /// Chip time restarts aligned with the current host clock.
    pub fn reset(&mut self) {
        self.regs = RegisterFile::new();
        self.decomp = DecompUnit::new();
        self.data_port = DataPort::new();
        self.alu = Alu::new();
        self.rtc.reset();
        self.decompressor.reset();
        self.handoff = false;
        self.cycles = self.host_target();
        info!("SPC7110 reset at chip cycle {}", self.cycles);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn rtc(&self) -> &Rtc {
        &self.rtc
    }

    pub fn decomp(&self) -> &DecompUnit {
        &self.decomp
    }

    pub fn data_port(&self) -> &DataPort {
        &self.data_port
    }

    pub fn backing(&self) -> &dyn Backing {
        &*self.backing
    }

    pub fn backing_mut(&mut self) -> &mut dyn Backing {
        &mut *self.backing
    }

    /// Chip cycles run since power-on
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    // Chip cycle the host clock corresponds to
    fn host_target(&self) -> u64 {
        let host_clock = self.host.clock() as u128;
        let target = (host_clock * CHIP_FREQUENCY as u128)
            .checked_div(self.config.host_frequency as u128)
            .unwrap_or(self.cycles as u128);
        target as u64
    }

    /// One chip cycle
    pub fn step(&mut self) {
        self.alu.tick(&mut self.regs);
        self.rtc.tick_wait(&mut self.regs);
        self.rtc.clock();
        self.cycles += 1;
    }

    /// Run up to `cycles` chip cycles, returning how many ran
    ///
    /// A pending handoff request stops the run at the next cycle boundary
    /// and is consumed; the next call picks up at that boundary.
    pub fn advance(&mut self, cycles: u64) -> u64 {
        self.run(cycles, true)
    }

    /// Ask a running [`Spc7110::advance`] to return at the next cycle boundary
    pub fn request_handoff(&mut self) {
        self.handoff = true;
    }

    /// Catch chip time up with the host clock
    ///
    /// Register accesses must never observe chip time the host has already
    /// passed, so this ignores handoff requests.
    pub fn synchronize(&mut self) {
        let target = self.host_target();
        if target > self.cycles {
            self.run(target - self.cycles, false);
        }
    }

    fn run(&mut self, budget: u64, yielding: bool) -> u64 {
        let mut ran = 0;
        while ran < budget {
            if yielding && self.handoff {
                self.handoff = false;
                break;
            }

            // Nothing but the RTC counter moves until a wait is armed or
            // the next RTC event, so quiet stretches go in one jump
            if !self.alu.pending() && !self.rtc.busy() {
                let quiet = (self.rtc.idle_cycles() as u64).min(budget - ran);
                if quiet > 0 {
                    self.rtc.skip(quiet as u32);
                    self.cycles += quiet;
                    ran += quiet;
                    continue;
                }
            }

            self.step();
            ran += 1;
        }
        ran
    }

    /// Host read of $4800-$4842 (any bank; only the low 16 bits decode)
    pub fn read(&mut self, addr: u32) -> u8 {
        self.synchronize();
        let addr = (addr & 0xFFFF) as u16;
        let handler = registers::handler(addr);

        if handler.unit == Unit::Rtc && !self.rtc.present() {
            return 0x00;
        }

        match handler.read {
            ReadEffect::OpenBus => self.host.open_bus(),
            ReadEffect::Latch => self.regs.get(addr),
            ReadEffect::Zero => 0x00,
            ReadEffect::DecompStream => self.decomp_read(),
            ReadEffect::DecompStatus => DecompUnit::read_status(&mut self.regs),
            ReadEffect::PortA => {
                let bus = PortBus {
                    config: &self.config,
                    backing: &*self.backing,
                };
                self.data_port.read_a(&mut self.regs, &bus)
            }
            ReadEffect::PortB => {
                let bus = PortBus {
                    config: &self.config,
                    backing: &*self.backing,
                };
                self.data_port.read_b(&mut self.regs, &bus)
            }
            ReadEffect::RtcData => self.rtc.read_data(&mut self.regs),
        }
    }

    /// Host write of $4800-$4842
    pub fn write(&mut self, addr: u32, data: u8) {
        self.synchronize();
        let addr = (addr & 0xFFFF) as u16;
        let handler = registers::handler(addr);

        if handler.unit == Unit::Rtc && !self.rtc.present() {
            return;
        }

        if let Some(mask) = handler.store_mask {
            self.regs.set(addr, data & mask);
        }

        let bus = PortBus {
            config: &self.config,
            backing: &*self.backing,
        };
        match handler.effect {
            WriteEffect::None => {}
            WriteEffect::DecompStart => {
                let session = {
                    let rom = DataRomView::new(&self.regs, &self.config, &*self.backing);
                    DecompUnit::fetch_descriptor(&self.regs, &rom)
                };
                self.decomp.start(&mut self.regs, session, &mut *self.decompressor);
            }
            WriteEffect::PortStep => self.data_port.step_a(&mut self.regs, &bus),
            WriteEffect::PortRefresh => DataPort::refresh(&mut self.regs, &bus),
            WriteEffect::AdjustLow => self.data_port.write_adjust(&mut self.regs, &bus, Half::Low),
            WriteEffect::AdjustHigh => self.data_port.write_adjust(&mut self.regs, &bus, Half::High),
            WriteEffect::PortMode => self.data_port.write_mode(&mut self.regs, &bus),
            WriteEffect::MultiplyArm => self.alu.arm_multiply(&mut self.regs),
            WriteEffect::DivideArm => self.alu.arm_divide(&mut self.regs),
            WriteEffect::RtcEnable => self.rtc.write_enable(&mut self.regs),
            WriteEffect::RtcCommand => self.rtc.write_data(&mut self.regs, data),
        }
    }

    fn decomp_read(&mut self) -> u8 {
        self.decomp.consume(&mut self.regs);
        let rom = DataRomView::new(&self.regs, &self.config, &*self.backing);
        self.decompressor.read(&rom)
    }

    /// DMA read from the decompression port, same as a read of $4800
    pub fn dcu_read(&mut self) -> u8 {
        self.read(DECOMP_DATA as u32)
    }

    /// The decompression port ignores DMA writes
    pub fn dcu_write(&mut self, _data: u8) {}

    /// Host read of the banked ROM windows
    pub fn mcurom_read(&self, addr: u32) -> u8 {
        mmu::rom_read(&self.regs, &self.config, &*self.backing, addr).unwrap_or_else(|| self.host.open_bus())
    }

    /// ROM windows ignore writes
    pub fn mcurom_write(&mut self, _addr: u32, _data: u8) {}

    /// Host read of the `$00-3F|$80-BF:6000-7FFF` RAM window
    pub fn mcuram_read(&self, addr: u32) -> u8 {
        if !mmu::is_ram_window(addr) {
            return self.host.open_bus();
        }
        if !mmu::ram_enabled(&self.regs) {
            return 0x00;
        }
        self.backing.ram_read(mmu::ram_offset(&*self.backing, addr))
    }

    pub fn mcuram_write(&mut self, addr: u32, data: u8) {
        if mmu::is_ram_window(addr) && mmu::ram_enabled(&self.regs) {
            let offset = mmu::ram_offset(&*self.backing, addr);
            self.backing.ram_write(offset, data);
        }
    }

    /// Battery-backed RTC memory for the host's save file
    pub fn rtc_image(&self) -> [u8; IMAGE_SIZE] {
        self.rtc.image()
    }

    pub fn load_rtc_image(&mut self, image: &[u8]) {
        self.rtc.load_image(image);
    }

    /// Full chip state, enough to resume with identical behavior
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            cycles: self.cycles,
            registers: self.regs.clone(),
            decomp: self.decomp.clone(),
            data_port: self.data_port.clone(),
            alu: self.alu.clone(),
            rtc: self.rtc.clone(),
            decompressor: self.decompressor.save(),
        }
    }

    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.cycles = snapshot.cycles;
        self.regs = snapshot.registers.clone();
        self.decomp = snapshot.decomp.clone();
        self.data_port = snapshot.data_port.clone();
        self.alu = snapshot.alu.clone();
        self.rtc = snapshot.rtc.clone();
        self.decompressor.load(&snapshot.decompressor);
        self.handoff = false;
        debug!("SPC7110 restored at chip cycle {}", self.cycles);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cartridge::CartridgeImage;
    use crate::config::HOST_FREQUENCY_NTSC;
    use crate::host::SharedHost;
    use crate::registers::{
        ALU_MULTIPLICAND_HI, ALU_MULTIPLICAND_LO, ALU_MULTIPLIER_LO, ALU_RESULT_0, ALU_STATUS,
        MMU_BANK_0, PORT_DATA_A, PORT_OFFSET_HI, PORT_OFFSET_LO, PORT_OFFSET_MID, RTC_DATA,
        RTC_ENABLE, RTC_STATUS,
    };
    use crate::units::alu::MULTIPLY_DELAY;
    use crate::units::decomp::PassthroughDecompressor;

    /// Chip on a 2 MiB image (1 MiB program ROM of 0xAA, then a data ROM
    /// holding the low byte of each address) with 8 KiB of RAM
    pub(crate) fn chip_with(has_rtc: bool) -> (Spc7110, SharedHost) {
        let mut rom = vec![0xAA; 0x100000];
        rom.extend((0..0x100000u32).map(|i| i as u8));
        let config = Config::new(rom.len() as u32).with_rtc(has_rtc);
        let host = SharedHost::new();
        let chip = Spc7110::new(
            config,
            Box::new(CartridgeImage::new(rom, 0x2000)),
            Box::new(PassthroughDecompressor::new()),
            Box::new(host.clone()),
        );
        (chip, host)
    }

    #[test]
    fn test_synchronize_follows_host_clock() {
        let (mut chip, host) = chip_with(false);
        assert_eq!(chip.config().host_frequency, HOST_FREQUENCY_NTSC);
        host.set_clock(30);
        chip.synchronize();
        assert_eq!(chip.cycles(), 5);
        host.set_clock(31);
        chip.synchronize();
        assert_eq!(chip.cycles(), 6);
    }

    #[test]
    fn test_register_access_sees_current_chip_time() {
        let (mut chip, host) = chip_with(false);
        chip.write(ALU_MULTIPLIER_LO as u32, 7);
        chip.write(ALU_MULTIPLICAND_LO as u32, 6);
        chip.write(ALU_MULTIPLICAND_HI as u32, 0);
        assert_eq!(chip.read(ALU_STATUS as u32), 0x81);

        // Roughly 6 chip cycles of host time
        host.add_clock(31);
        assert_eq!(chip.read(ALU_STATUS as u32), 0x01);
        assert_eq!(chip.read(ALU_RESULT_0 as u32), 42);
    }

    #[test]
    fn test_reset_aligns_with_host() {
        let (mut chip, host) = chip_with(false);
        host.set_clock(HOST_FREQUENCY_NTSC);
        chip.reset();
        assert_eq!(chip.cycles(), CHIP_FREQUENCY);
    }

    #[test]
    fn test_handoff_stops_at_cycle_boundary() {
        let (mut chip, _host) = chip_with(false);
        chip.request_handoff();
        assert_eq!(chip.advance(100), 0);
        assert_eq!(chip.advance(100), 100);
        assert_eq!(chip.cycles(), 100);
    }

    #[test]
    fn test_synchronize_ignores_handoff() {
        let (mut chip, host) = chip_with(false);
        chip.request_handoff();
        host.set_clock(31);
        chip.synchronize();
        assert_eq!(chip.cycles(), 6);
    }

    #[test]
    fn test_bulk_advance_matches_single_steps() {
        let (mut fast, _) = chip_with(true);
        let (mut slow, _) = chip_with(true);
        for chip in [&mut fast, &mut slow] {
            chip.load_rtc_image(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02, 0]);
            chip.write(RTC_ENABLE as u32, 0x01);
            chip.write(ALU_MULTIPLIER_LO as u32, 3);
            chip.write(ALU_MULTIPLICAND_HI as u32, 1);
        }

        let total = 3 * 65536 + 123;
        let mut ran = 0;
        while ran < total {
            ran += fast.advance((total - ran).min(40_000));
        }
        for _ in 0..total {
            slow.step();
        }
        assert_eq!(fast.snapshot(), slow.snapshot());
        assert_eq!(fast.rtc().seconds(), 3);
    }

    #[test]
    fn test_multiply_after_exact_delay_through_advance() {
        let (mut chip, _) = chip_with(false);
        chip.write(ALU_MULTIPLIER_LO as u32, 2);
        chip.write(ALU_MULTIPLICAND_HI as u32, 1);
        chip.advance(MULTIPLY_DELAY as u64 - 1);
        assert_eq!(chip.registers().get_u32(ALU_RESULT_0), 0);
        chip.advance(1);
        assert_eq!(chip.registers().get_u32(ALU_RESULT_0), 0x200);
    }

    #[test]
    fn test_unmapped_reads_open_bus() {
        let (mut chip, host) = chip_with(false);
        host.set_open_bus(0x5C);
        assert_eq!(chip.read(0x480D), 0x5C);
        assert_eq!(chip.read(0x4843), 0x5C);
        assert_eq!(chip.read(0x4808), 0x00);
        chip.write(0x480D, 0x12);
        assert_eq!(chip.read(0x480D), 0x5C);
    }

    #[test]
    fn test_bank_bits_ignored() {
        let (mut chip, _) = chip_with(false);
        chip.write(0x7F4830, 0xFF);
        assert_eq!(chip.read(0x004830), 0x87);
    }

    #[test]
    fn test_read_only_results_ignore_writes() {
        let (mut chip, _) = chip_with(false);
        chip.write(ALU_RESULT_0 as u32, 0x55);
        chip.write(ALU_STATUS as u32, 0x80);
        assert_eq!(chip.read(ALU_RESULT_0 as u32), 0);
        assert_eq!(chip.read(ALU_STATUS as u32), 0);
    }

    #[test]
    fn test_data_port_through_registers() {
        let (mut chip, _) = chip_with(false);
        chip.write(PORT_OFFSET_LO as u32, 0x40);
        chip.write(PORT_OFFSET_MID as u32, 0x00);
        chip.write(PORT_OFFSET_HI as u32, 0x00);
        assert_eq!(chip.read(PORT_DATA_A as u32), 0x40);
        assert_eq!(chip.read(PORT_DATA_A as u32), 0x41);
        // A write steps as well
        chip.write(PORT_DATA_A as u32, 0x00);
        assert_eq!(chip.read(PORT_DATA_A as u32), 0x43);
    }

    #[test]
    fn test_rom_windows() {
        let (chip, host) = chip_with(false);
        host.set_open_bus(0x11);
        assert_eq!(chip.mcurom_read(0xC00000), 0xAA);
        // Window 2 defaults to bank 1, past the 1 MiB data ROM
        assert_eq!(chip.mcurom_read(0xE00005), 0x00);
        assert_eq!(chip.mcurom_read(0x400000), 0x11);
    }

    #[test]
    fn test_ram_window_enable() {
        let (mut chip, host) = chip_with(false);
        chip.mcuram_write(0x006010, 0x77);
        assert_eq!(chip.mcuram_read(0x006010), 0x00);

        chip.write(MMU_BANK_0 as u32, 0x80);
        chip.mcuram_write(0x006010, 0x77);
        assert_eq!(chip.mcuram_read(0x006010), 0x77);
        assert_eq!(chip.mcuram_read(0x806010), 0x77);
        assert_eq!(chip.backing().ram_read(0x10), 0x77);

        host.set_open_bus(0x33);
        assert_eq!(chip.mcuram_read(0x008000), 0x33);
    }

    #[test]
    fn test_battery_ram_loaded_by_host() {
        let (mut chip, _) = chip_with(false);
        chip.backing_mut().ram_write(0x1234, 0x9C);
        chip.write(MMU_BANK_0 as u32, 0x80);
        assert_eq!(chip.mcuram_read(0x007234), 0x9C);
    }

    #[test]
    fn test_dma_port_writes_ignored() {
        let (mut chip, _) = chip_with(false);
        let before = chip.snapshot();
        chip.dcu_write(0x42);
        chip.mcurom_write(0xC00000, 0x42);
        assert_eq!(chip.snapshot(), before);
        assert_eq!(chip.mcurom_read(0xC00000), 0xAA);
    }

    #[test]
    fn test_absent_rtc_is_inert() {
        let (mut chip, _) = chip_with(false);
        chip.write(RTC_ENABLE as u32, 0x01);
        chip.write(RTC_DATA as u32, 0x0C);
        assert_eq!(chip.read(RTC_ENABLE as u32), 0);
        assert_eq!(chip.read(RTC_STATUS as u32), 0);
        assert_eq!(chip.read(RTC_DATA as u32), 0);
    }

    #[test]
    fn test_rtc_busy_through_registers() {
        let (mut chip, _) = chip_with(true);
        chip.write(RTC_ENABLE as u32, 0x01);
        assert_eq!(chip.read(RTC_STATUS as u32), 0x80);
        chip.advance(20);
        assert_eq!(chip.read(RTC_STATUS as u32), 0x00);
    }

    #[test]
    fn test_reset_keeps_rtc_memory() {
        let (mut chip, _) = chip_with(true);
        let image: Vec<u8> = (0..16).map(|i| 15 - i).collect();
        chip.load_rtc_image(&image);
        chip.write(MMU_BANK_0 as u32, 0x83);
        chip.reset();
        assert_eq!(chip.rtc_image().to_vec(), image);
        assert_eq!(chip.read(MMU_BANK_0 as u32), 0);
    }
}
