//! This submodule exists to map a WIN file as a "memory map" and hand its
//! bytes to the frame parser.
use std::path::Path;

use giga_win_core::errors::WinError;
use giga_win_core::FRAME_HEADER_LEN;

use memmap2::{Mmap, MmapOptions};

/// This structure represents a memory mapped WIN file.
pub struct MappedWin {
    pub(crate) map: Mmap,
    _file: std::fs::File,
}

impl MappedWin {
    /// Map a file, with a sanity check that it is long enough to hold at
    /// least one second-frame header.
    pub(crate) fn new<P: AsRef<Path>>(path: P) -> Result<MappedWin, WinError> {
        let file = std::fs::File::open(path)?;
        // Safety: the map is read only and the file handle is kept alive
        // alongside it.
        let map = unsafe { MmapOptions::new().map(&file)? };
        if map.len() < FRAME_HEADER_LEN {
            return Err(WinError::MalformedFrame {
                msg: format!(
                    "file is {} bytes, shorter than a single frame header",
                    map.len()
                ),
            });
        }
        Ok(MappedWin { map, _file: file })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.map
    }
}
