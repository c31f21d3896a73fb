use crate::cartridge::Backing;

/// In-memory cartridge: one ROM image plus work RAM
pub struct CartridgeImage {
    rom: Vec<u8>,
    ram: Vec<u8>,
}

impl CartridgeImage {
    /// Create an image from ROM data with `ram_size` bytes of zeroed RAM
    pub fn new(rom: Vec<u8>, ram_size: usize) -> Self {
        Self {
            rom,
            ram: vec![0; ram_size],
        }
    }

    pub fn rom_size(&self) -> u32 {
        self.rom.len() as u32
    }

    /// RAM contents, for the host's save file
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }
}

impl Backing for CartridgeImage {
    fn rom_read(&self, addr: u32) -> u8 {
        self.rom.get(addr as usize).copied().unwrap_or(0)
    }

    fn ram_read(&self, addr: u32) -> u8 {
        self.ram.get(addr as usize).copied().unwrap_or(0)
    }

    fn ram_write(&mut self, addr: u32, data: u8) {
        if let Some(cell) = self.ram.get_mut(addr as usize) {
            *cell = data;
        }
    }

    fn ram_size(&self) -> u32 {
        self.ram.len() as u32
    }
}
