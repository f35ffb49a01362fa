//! Classify an image and locate the HFS volume inside it.

use log::{debug, info};
use std::io::{Read, Seek};

use crate::codec::{read_record, read_u16_at};
use crate::error::{Error, Result};
use crate::partition::{VolumeSpan, find_hfs_partition};
use crate::raw::DriverDescriptorRecord;
use hfs_types::{
    BOOT_BLOCK_SIGNATURE, DDR_SIGNATURE, HFS_PLUS_SIGNATURE, HFS_SIGNATURE, VOLUME_HEADER_OFFSET,
};

/// How a volume is laid out within an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    /// Bare HFS or HFS Plus volume without boot blocks.
    RawUnbootable,
    /// Bare HFS volume whose boot blocks carry `'LK'`.
    RawBootable,
    /// Device image with a Driver Descriptor Record and partition map.
    PartitionMapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub layout: ImageLayout,
    pub file_size: u64,
    pub volume: VolumeSpan,
}

/// Block 0 signature and the candidate volume signature at 0x400, as seen
/// by [`classify`]. The volume signature is zeroed unless it is `'BD'` or
/// `'H+'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signatures {
    pub device: u16,
    pub volume: u16,
}

pub fn read_signatures<S: Read + Seek + ?Sized>(
    store: &mut S,
) -> Result<(DriverDescriptorRecord, Signatures)> {
    let ddr: DriverDescriptorRecord = read_record(store, 0)?;

    // An image too short to hold a volume header simply has no volume
    // signature.
    let volume = match read_u16_at(store, VOLUME_HEADER_OFFSET) {
        Ok(sig) if sig == HFS_SIGNATURE || sig == HFS_PLUS_SIGNATURE => sig,
        _ => 0,
    };

    let signatures = Signatures {
        device: ddr.signature,
        volume,
    };
    Ok((ddr, signatures))
}

/// Layout implied by the signatures, or `None` for an unknown format.
pub fn classify(signatures: Signatures) -> Option<ImageLayout> {
    match signatures.device {
        DDR_SIGNATURE => Some(ImageLayout::PartitionMapped),
        BOOT_BLOCK_SIGNATURE => Some(ImageLayout::RawBootable),
        0 if signatures.volume != 0 => Some(ImageLayout::RawUnbootable),
        _ => None,
    }
}

/// Classify `store` and find the byte span of its HFS volume.
pub fn probe<S: Read + Seek + ?Sized>(store: &mut S, file_size: u64) -> Result<Probe> {
    let (_ddr, signatures) = read_signatures(store)?;
    debug!(
        "Device signature 0x{:04X}, volume signature 0x{:04X}",
        signatures.device, signatures.volume
    );

    let layout = classify(signatures).ok_or(Error::UnknownFormat)?;
    let volume = match layout {
        ImageLayout::PartitionMapped => find_hfs_partition(store, file_size)?,
        ImageLayout::RawBootable | ImageLayout::RawUnbootable => VolumeSpan {
            offset: 0,
            length: file_size,
        },
    };

    info!(
        "{layout:?} image: HFS volume at offset {}, length {}",
        volume.offset, volume.length
    );
    Ok(Probe {
        layout,
        file_size,
        volume,
    })
}
