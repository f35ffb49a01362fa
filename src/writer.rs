//! Writes bootable Apple Partition Map device images around an HFS volume,
//! and bare volume copies.
//!
//! A device image is laid out as:
//!
//! | Offset   | Contents                                   |
//! |----------|--------------------------------------------|
//! | `0x0000` | Driver Descriptor Record                   |
//! | `0x0200` | `Apple_partition_map` entry (blocks 1-63)  |
//! | `0x0400` | `Apple_Driver43` entry (blocks 64-95)      |
//! | `0x0600` | `Apple_HFS` entry (block 96 onwards)       |
//! | `0x8000` | Driver code                                |
//! | `0xC000` | HFS volume                                 |
//!
//! Writing is not atomic: a failure part way leaves whatever was already
//! written in the destination.

use log::{debug, info, trace, warn};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::codec::{read_u16_at, write_record, write_u16_at};
use crate::driver::{APPLE_DRIVER_43, APPLE_DRIVER_43_CHECKSUM, DRIVER_ENTRY_MARKERS};
use crate::error::{Error, Result};
use crate::raw::{DriverDescriptorRecord, PartitionMapEntry, to_fixed};
use hfs_types::partition_status::*;
use hfs_types::{
    BLOCK_SIZE, DDR_SIGNATURE, HFS_SIGNATURE, MDB_ATTRIBUTES_OFFSET, VOLUME_HEADER_OFFSET,
    partition_type, volume_attributes,
};

pub const DRIVER_OFFSET: u64 = 0x8000;
pub const VOLUME_OFFSET: u64 = 0xC000;

/// Bytes moved per read/write during the volume copy.
pub const CHUNK_SIZE: usize = 256 * 1024;

/// Entries in the synthesized partition map.
const MAP_BLOCK_COUNT: u32 = 3;

const MAP_PARTITION_START: u32 = 1;
const MAP_PARTITION_BLOCKS: u32 = 63;
const DRIVER_PARTITION_START: u32 = 64;
const DRIVER_PARTITION_BLOCKS: u32 = 32;
const HFS_PARTITION_START: u32 = (VOLUME_OFFSET / BLOCK_SIZE) as u32;

/// Driver size recorded in the DDR, in blocks.
const DRIVER_BLOCKS: u16 = 0x13;
const OS_TYPE_MAC_OS: u16 = 1;

const MAP_STATUS: u32 = VALID | ALLOCATED | IN_USE | READABLE | WRITABLE;
const DRIVER_STATUS: u32 =
    VALID | ALLOCATED | IN_USE | BOOTABLE | READABLE | WRITABLE | POSITION_INDEPENDENT;
const HFS_STATUS_READ_ONLY: u32 = VALID | ALLOCATED | IN_USE | READABLE | UNDOCUMENTED_7;
const HFS_STATUS_WRITABLE: u32 = HFS_STATUS_READ_ONLY | WRITABLE;

/// Observer and cancellation hooks for the volume copy.
///
/// The progress callback runs synchronously on the copying thread, once per
/// chunk after that chunk is written, with the fraction copied so far. The
/// cancellation flag is checked before each chunk is read.
#[derive(Default)]
pub struct CopyControl<'a> {
    pub on_progress: Option<&'a mut dyn FnMut(f64)>,
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> CopyControl<'a> {
    pub fn with_progress(on_progress: &'a mut dyn FnMut(f64)) -> Self {
        CopyControl {
            on_progress: Some(on_progress),
            cancel: None,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn report(&mut self, fraction: f64) {
        if let Some(callback) = self.on_progress.as_deref_mut() {
            callback(fraction);
        }
    }
}

pub fn driver_descriptor_record(hfs_length: u64) -> DriverDescriptorRecord {
    DriverDescriptorRecord {
        signature: DDR_SIGNATURE,
        block_size: BLOCK_SIZE as u16,
        block_count: (VOLUME_OFFSET + hfs_length).div_ceil(BLOCK_SIZE) as u32,
        device_type: 1,
        device_id: 1,
        data: 0,
        driver_count: 1,
        driver_block: DRIVER_PARTITION_START,
        driver_size: DRIVER_BLOCKS,
        driver_os_type: OS_TYPE_MAC_OS,
        pad: [0u8; 486],
    }
}

pub fn partition_map_entry() -> PartitionMapEntry {
    let mut entry = PartitionMapEntry::new("Apple", partition_type::PARTITION_MAP);
    entry.map_block_count = MAP_BLOCK_COUNT;
    entry.physical_start = MAP_PARTITION_START;
    entry.block_count = MAP_PARTITION_BLOCKS;
    entry.data_count = MAP_PARTITION_BLOCKS;
    entry.status = MAP_STATUS;
    entry
}

pub fn driver_partition_entry() -> PartitionMapEntry {
    let mut entry = PartitionMapEntry::new("Macintosh", partition_type::DRIVER_43);
    entry.map_block_count = MAP_BLOCK_COUNT;
    entry.physical_start = DRIVER_PARTITION_START;
    entry.block_count = DRIVER_PARTITION_BLOCKS;
    entry.data_count = DRIVER_PARTITION_BLOCKS;
    entry.status = DRIVER_STATUS;
    entry.boot_size = APPLE_DRIVER_43.len() as u32;
    entry.boot_checksum = APPLE_DRIVER_43_CHECKSUM;
    entry.processor = to_fixed("68000");
    for (index, value) in DRIVER_ENTRY_MARKERS {
        entry.pad[index] = value;
    }
    entry
}

pub fn hfs_partition_entry(hfs_length: u64, writable: bool) -> PartitionMapEntry {
    let blocks = (hfs_length / BLOCK_SIZE) as u32;
    let mut entry = PartitionMapEntry::new("MacOS", partition_type::HFS);
    entry.map_block_count = MAP_BLOCK_COUNT;
    entry.physical_start = HFS_PARTITION_START;
    entry.block_count = blocks;
    entry.data_count = blocks;
    entry.status = if writable {
        HFS_STATUS_WRITABLE
    } else {
        HFS_STATUS_READ_ONLY
    };
    entry
}

/// Write a partitioned, bootable device image to `dest` holding the
/// `hfs_length` bytes of `source` starting at `hfs_start`.
pub fn write_device_image<W, R>(
    dest: &mut W,
    source: &mut R,
    hfs_start: u64,
    hfs_length: u64,
    writable: bool,
    control: &mut CopyControl,
) -> Result<()>
where
    W: Read + Write + Seek + ?Sized,
    R: Read + Seek + ?Sized,
{
    debug!("Writing driver descriptor record");
    write_record(dest, 0, &driver_descriptor_record(hfs_length))?;

    debug!("Writing Apple partition map");
    write_record(dest, 0x200, &partition_map_entry())?;

    debug!("Writing driver partition");
    write_record(dest, 0x400, &driver_partition_entry())?;

    debug!("Writing HFS partition");
    write_record(dest, 0x600, &hfs_partition_entry(hfs_length, writable))?;

    debug!("Writing driver data");
    dest.seek(SeekFrom::Start(DRIVER_OFFSET))?;
    dest.write_all(APPLE_DRIVER_43)?;

    write_volume_data(
        dest,
        source,
        hfs_start,
        VOLUME_OFFSET,
        hfs_length,
        writable,
        control,
    )
}

/// Copy `hfs_length` bytes of `source` at `hfs_start` to `dest` at
/// `dest_offset`, then set or clear the copied volume's lock bits.
///
/// Only HFS volumes are patched. Offset 10 of an HFS Plus header belongs to
/// `lastMountedVersion`, so HFS Plus volumes are copied unchanged whatever
/// `writable` says.
pub fn write_volume_data<W, R>(
    dest: &mut W,
    source: &mut R,
    hfs_start: u64,
    dest_offset: u64,
    hfs_length: u64,
    writable: bool,
    control: &mut CopyControl,
) -> Result<()>
where
    W: Read + Write + Seek + ?Sized,
    R: Read + Seek + ?Sized,
{
    info!("Writing HFS volume data: {hfs_length} bytes at offset {dest_offset}");
    source.seek(SeekFrom::Start(hfs_start))?;
    dest.seek(SeekFrom::Start(dest_offset))?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied: u64 = 0;
    while copied < hfs_length {
        if control.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let chunk = (hfs_length - copied).min(CHUNK_SIZE as u64) as usize;
        source.read_exact(&mut buf[..chunk])?;
        dest.write_all(&buf[..chunk])?;
        copied += chunk as u64;

        trace!("Copied {copied} of {hfs_length} bytes");
        control.report(copied as f64 / hfs_length as f64);
    }

    if set_volume_lock(dest, dest_offset, writable)?.is_some() {
        let state = if writable { "writable" } else { "read-only" };
        info!("Marked HFS volume as {state}");
    }
    Ok(())
}

/// Clear (writable) or set (read-only) both lock bits in the MDB of the HFS
/// volume at `volume_start`, returning the new attribute word. HFS Plus and
/// unrecognised volumes are left untouched and yield `None`.
pub fn set_volume_lock<S>(store: &mut S, volume_start: u64, writable: bool) -> Result<Option<u16>>
where
    S: Read + Write + Seek + ?Sized,
{
    let signature = read_u16_at(store, volume_start + VOLUME_HEADER_OFFSET)?;
    if signature != HFS_SIGNATURE {
        warn!("Volume signature 0x{signature:04X} is not HFS; lock bits left unchanged");
        return Ok(None);
    }

    let offset = volume_start + VOLUME_HEADER_OFFSET + MDB_ATTRIBUTES_OFFSET;
    let attributes = read_u16_at(store, offset)?;
    let attributes = if writable {
        attributes & !volume_attributes::LOCKED
    } else {
        attributes | volume_attributes::LOCKED
    };
    write_u16_at(store, offset, attributes)?;

    Ok(Some(attributes))
}
