/// Physical ROM/RAM storage behind the chip
///
/// Addresses are physical offsets into the cartridge image. Out of range
/// reads return 0 and out of range writes are dropped; the chip never
/// depends on a backing store failing.
pub trait Backing {
    /// Read a byte of the combined program/data ROM image
    fn rom_read(&self, addr: u32) -> u8;

    /// Read a byte of the battery-backed work RAM
    fn ram_read(&self, addr: u32) -> u8;

    /// Write a byte of the battery-backed work RAM
    fn ram_write(&mut self, addr: u32, data: u8);

    fn ram_size(&self) -> u32;

    /// Wrap `addr` into a region of `size` bytes
    ///
    /// Boards override this when their chips are not wired as power-of-two
    /// mirrors. The default follows the usual SNES decoding.
    fn mirror(&self, addr: u32, size: u32) -> u32 {
        mirror(addr, size)
    }
}

/// Fold `addr` into `size` bytes the way a partially decoded bus does
///
/// The highest set address bit is dropped repeatedly. Whenever the region
/// itself is larger than the dropped bit, that chunk becomes part of the
/// base, so a 3 MiB region maps `0x300000` onto its last megabyte.
pub fn mirror(addr: u32, size: u32) -> u32 {
    if size == 0 {
        return 0;
    }

    let mut addr = addr;
    let mut size = size;
    let mut base = 0;
    let mut mask = 1 << 31;
    while addr >= size {
        while addr & mask == 0 {
            mask >>= 1;
        }
        addr -= mask;
        if size > mask {
            size -= mask;
            base += mask;
        }
        mask >>= 1;
    }
    base + addr
}
