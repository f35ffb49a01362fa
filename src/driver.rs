//! Boot driver written into the driver partition of converted images.

/// `Apple_Driver43` SCSI driver code, loaded by the ROM from block 64.
pub static APPLE_DRIVER_43: &[u8] = include_bytes!("../resources/Apple_Driver43.bin");

/// Checksum recorded for [`APPLE_DRIVER_43`] in its partition map entry.
pub const APPLE_DRIVER_43_CHECKSUM: u32 = 0x0000_F624;

/// Marker bytes the ROM expects in the driver entry's reserved area, as
/// (index into `pmPad`, value).
pub const DRIVER_ENTRY_MARKERS: [(usize, u8); 4] = [(1, 0x01), (2, 0x06), (11, 0x01), (13, 0x07)];
