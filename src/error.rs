use thiserror::Error;

pub type Result<T> = std::result::Result<T, Spc7110Error>;

/// Errors raised at the host boundary.
///
/// The emulated chip itself never fails: every hardware quirk is ordinary
/// control flow. These only cover configuration, snapshots and save files.
#[derive(Debug, Error)]
pub enum Spc7110Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot error: {0}")]
    InvalidSnapshot(String),
}
