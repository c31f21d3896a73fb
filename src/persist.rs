//! RTC save file
//!
//! The RTC memory is the only chip state that outlives a session. It is
//! written to a temporary file next to the save and renamed over it, so a
//! crash mid-write leaves either the old image or the new one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::Result;
use crate::chip::Spc7110;

/// Write the chip's RTC image to `path`
pub fn save_rtc(chip: &Spc7110, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(&chip.rtc_image())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    debug!("RTC image saved to {}", path.display());
    Ok(())
}

/// Load the RTC image at `path` into the chip
///
/// A missing or unreadable save is treated like a torn one: the clock
/// comes up cold with the lost flag set. Only a real image clears it.
pub fn load_rtc(chip: &mut Spc7110, path: &Path) {
    match fs::read(path) {
        Ok(image) => {
            debug!("RTC image loaded from {}", path.display());
            chip.load_rtc_image(&image);
        }
        Err(e) => {
            if e.kind() == ErrorKind::NotFound {
                debug!("no RTC image at {}", path.display());
            } else {
                warn!("failed to read RTC image {}: {}", path.display(), e);
            }
            chip.load_rtc_image(&[]);
        }
    }
}
