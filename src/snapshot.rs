use serde::{Deserialize, Serialize};

use crate::registers::RegisterFile;
use crate::units::alu::Alu;
use crate::units::data_port::DataPort;
use crate::units::decomp::DecompUnit;
use crate::units::rtc::Rtc;
use crate::{Result, Spc7110Error};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete chip state for save states
///
/// Every register cell, latch and countdown is captured, plus the opaque
/// state of the decompressor. Restoring it resumes with identical behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub cycles: u64,
    pub registers: RegisterFile,
    pub decomp: DecompUnit,
    pub data_port: DataPort,
    pub alu: Alu,
    pub rtc: Rtc,
    pub decompressor: Vec<u8>,
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_slice(bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Spc7110Error::InvalidSnapshot(format!(
                "unsupported version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }
}
