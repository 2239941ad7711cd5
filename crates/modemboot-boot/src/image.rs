//! Firmware partition and calibration file readers.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{BootError, Result};

/// Read `read_size` bytes of firmware from a raw flash partition.
///
/// The partition is consumed in `block_size` erase blocks. Blocks the flash
/// driver reports bad are skipped and the image continues with the next good
/// block. Plain files never report bad blocks.
pub fn read_firmware(
    path: impl AsRef<Path>,
    read_size: usize,
    block_size: usize,
) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let firmware_err = |source: io::Error| BootError::Firmware {
        path: path.to_path_buf(),
        source,
    };
    if block_size == 0 {
        return Err(firmware_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "firmware block size is zero",
        )));
    }

    let mut file = File::open(path).map_err(firmware_err)?;
    let mut image = vec![0u8; read_size];
    let mut filled = 0usize;
    let mut offset = 0u64;
    let mut skipped = 0usize;

    while filled < read_size {
        if block_is_bad(&file, offset) {
            warn!(offset, "skipping bad firmware block");
            skipped += 1;
            offset += block_size as u64;
            file.seek(SeekFrom::Start(offset)).map_err(firmware_err)?;
            continue;
        }

        let want = block_size.min(read_size - filled);
        file.read_exact(&mut image[filled..filled + want])
            .map_err(firmware_err)?;
        filled += want;
        offset += want as u64;
    }

    info!(path = %path.display(), bytes = filled, skipped, "firmware image read");
    Ok(image)
}

/// Read exactly `size` bytes of calibration data in `block_size` chunks.
///
/// A file shorter than `size` is an error.
pub fn read_calibration(path: impl AsRef<Path>, size: usize, block_size: usize) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let calibration_err = |source: io::Error| BootError::Calibration {
        path: path.to_path_buf(),
        source,
    };
    if block_size == 0 {
        return Err(calibration_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "calibration block size is zero",
        )));
    }

    let mut file = File::open(path).map_err(calibration_err)?;
    let mut data = vec![0u8; size];
    for chunk in data.chunks_mut(block_size) {
        file.read_exact(chunk).map_err(calibration_err)?;
    }

    debug!(path = %path.display(), bytes = size, "calibration data read");
    Ok(data)
}

#[cfg(target_os = "linux")]
fn block_is_bad(file: &File, offset: u64) -> bool {
    modemboot_transport::mtd::is_bad_block(file, offset)
}

#[cfg(not(target_os = "linux"))]
fn block_is_bad(_file: &File, _offset: u64) -> bool {
    false
}
