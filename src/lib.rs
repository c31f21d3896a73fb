// SPC7110 coprocessor emulation: decompression front-end, data port,
// multiply/divide unit, bank mapping and the Epson RTC

pub mod cartridge;
pub mod chip;
pub mod config;
pub mod error;
pub mod host;
pub mod persist;
pub mod registers;
pub mod snapshot;
pub mod units; // One module per functional unit


pub use chip::Spc7110;
pub use config::Config;
pub use error::{Result, Spc7110Error};
pub use host::{Host, SharedHost};
pub use snapshot::Snapshot;
pub use units::decomp::{DataRom, Decompressor, PassthroughDecompressor};
