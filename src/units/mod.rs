pub mod alu;
pub mod data_port;
pub mod decomp;
pub mod mmu;
pub mod rtc;
