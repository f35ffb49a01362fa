//! On-disk records of classic Macintosh device and volume images, decoded
//! without validation. Layouts follow Inside Macintosh: Devices (Driver
//! Descriptor Record, partition map), Inside Macintosh: Files (boot blocks,
//! Master Directory Block) and TN1150 (HFS Plus volume header).
//!
//! All fields are big-endian and packed; each record's total width is part of
//! the on-disk contract and is given by [`Record::SIZE`](crate::codec::Record).

use deku::ctx::Endian;
use deku::prelude::*;

use crate::codec::Record;
use hfs_types::{HFS_VOLUME_NAME_MAX, PARTITION_MAP_SIGNATURE, partition_type};

/// Seconds since 1904-01-01 00:00:00. Zero means "not set".
pub type Date = u32;

/// Block 0 of a partitioned device. Defined as `struct Block0` in
/// Inside Macintosh: Devices > SCSI Manager.
#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct DriverDescriptorRecord {
    pub signature: u16,
    pub block_size: u16,
    pub block_count: u32,
    pub device_type: u16,
    pub device_id: u16,
    pub data: u32,
    pub driver_count: u16,
    /// Start block of the first driver.
    pub driver_block: u32,
    /// Size of the first driver, in 512-byte blocks.
    pub driver_size: u16,
    /// Operating system type, 1 for Mac OS.
    pub driver_os_type: u16,
    /// Descriptors for additional drivers, 8 bytes each.
    pub pad: [u8; 486],
}

impl Record for DriverDescriptorRecord {
    const SIZE: usize = 512;
}

impl DriverDescriptorRecord {
    /// Device size claimed by the record, in bytes.
    pub fn device_size(&self) -> u64 {
        self.block_size as u64 * self.block_count as u64
    }
}

/// One partition map entry. Entries occupy consecutive blocks starting at
/// block 1. Defined as `struct Partition` in Inside Macintosh: Devices.
#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct PartitionMapEntry {
    pub signature: u16,
    pub signature_pad: u16,
    /// Number of blocks (entries) in the partition map.
    pub map_block_count: u32,
    pub physical_start: u32,
    pub block_count: u32,
    pub name: [u8; 32],
    pub partition_type: [u8; 32],
    pub logical_data_start: u32,
    pub data_count: u32,
    pub status: u32,
    pub logical_boot_start: u32,
    /// Size of the boot code, in bytes.
    pub boot_size: u32,
    pub boot_load: u32,
    pub boot_load_2: u32,
    pub boot_entry: u32,
    pub boot_entry_2: u32,
    /// 16-bit checksum of the boot code, stored in a 32-bit field.
    pub boot_checksum: u32,
    pub processor: [u8; 16],
    pub pad: [u8; 376],
}

impl Record for PartitionMapEntry {
    const SIZE: usize = 512;
}

impl PartitionMapEntry {
    /// An entry with only the signature and the given name and type filled.
    pub fn new(name: &str, partition_type: &str) -> Self {
        PartitionMapEntry {
            signature: PARTITION_MAP_SIGNATURE,
            signature_pad: 0,
            map_block_count: 0,
            physical_start: 0,
            block_count: 0,
            name: to_fixed(name),
            partition_type: to_fixed(partition_type),
            logical_data_start: 0,
            data_count: 0,
            status: 0,
            logical_boot_start: 0,
            boot_size: 0,
            boot_load: 0,
            boot_load_2: 0,
            boot_entry: 0,
            boot_entry_2: 0,
            boot_checksum: 0,
            processor: [0u8; 16],
            pad: [0u8; 376],
        }
    }

    pub fn has_valid_signature(&self) -> bool {
        self.signature == PARTITION_MAP_SIGNATURE
    }

    pub fn name(&self) -> String {
        from_fixed(&self.name)
    }

    pub fn partition_type(&self) -> String {
        from_fixed(&self.partition_type)
    }

    pub fn processor(&self) -> String {
        from_fixed(&self.processor)
    }

    /// Byte offset of the partition from the start of the device.
    pub fn byte_offset(&self) -> u64 {
        self.physical_start as u64 * hfs_types::BLOCK_SIZE
    }

    /// Byte length of the partition as recorded, before any truncation.
    pub fn byte_length(&self) -> u64 {
        self.block_count as u64 * hfs_types::BLOCK_SIZE
    }

    pub fn is_driver(&self) -> bool {
        self.partition_type().starts_with(partition_type::DRIVER_PREFIX)
    }

    pub fn is_hfs(&self) -> bool {
        self.partition_type() == partition_type::HFS
    }
}

/// Header of the 1024-byte boot block area at the start of an HFS volume.
/// Defined as boot block header in Inside Macintosh: Files > Data
/// Organization on Volumes.
#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct BootBlockHeader {
    pub id: u16,
    /// Entry point to boot code, as a 68K `BRA.S`.
    pub entry: u32,
    pub version: u16,
    pub page_flags: u16,
    pub system_name: [u8; 16],
    pub shell_name: [u8; 16],
    pub debugger_1_name: [u8; 16],
    pub debugger_2_name: [u8; 16],
    pub screen_name: [u8; 16],
    pub hello_name: [u8; 16],
    pub scrap_name: [u8; 16],
    pub fcb_count: u16,
    pub event_count: u16,
    pub heap_128k: u32,
    pub heap_256k: u32,
    pub system_heap_size: u32,
    pub filler: u16,
    pub system_heap_extra: u32,
    pub system_heap_fraction: u32,
}

impl Record for BootBlockHeader {
    const SIZE: usize = 148;
}

impl BootBlockHeader {
    /// Names of the System, Finder, debugger, startup screen, startup
    /// program and scrap files, in header order. Unset names are empty.
    pub fn file_names(&self) -> [String; 7] {
        [
            &self.system_name,
            &self.shell_name,
            &self.debugger_1_name,
            &self.debugger_2_name,
            &self.screen_name,
            &self.hello_name,
            &self.scrap_name,
        ]
        .map(|field| from_pascal(field))
    }
}

/// HFS extent: first allocation block and number of allocation blocks.
#[derive(Debug, Clone, Copy, PartialEq, Default, DekuRead, DekuWrite)]
#[deku(endian = "endian", ctx = "endian: Endian")]
pub struct ExtentDescriptor {
    pub start_block: u16,
    pub block_count: u16,
}

/// HFS Master Directory Block, 1024 bytes into the volume. Defined as
/// `struct MDB` in Inside Macintosh: Files.
#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct MasterDirectoryBlock {
    pub signature: u16,
    pub create_date: Date,
    pub modify_date: Date,
    /// Bit 7 is the hardware lock, bit 15 the software lock.
    pub attributes: u16,
    pub root_file_count: u16,
    pub bitmap_start: u16,
    pub allocation_pointer: u16,
    pub total_blocks: u16,
    pub block_size: u32,
    pub clump_size: u32,
    pub first_allocation_block: u16,
    pub next_catalog_id: u32,
    pub free_blocks: u16,
    /// Pascal string: length byte followed by up to 27 characters.
    pub volume_name: [u8; 28],
    pub backup_date: Date,
    pub backup_sequence: u16,
    pub write_count: u32,
    pub extents_clump_size: u32,
    pub catalog_clump_size: u32,
    pub root_folder_count: u16,
    pub file_count: u32,
    pub folder_count: u32,
    pub finder_info: [u32; 8],
    pub embedded_signature: u16,
    pub embedded_extent: ExtentDescriptor,
    pub extents_file_size: u32,
    pub extents_file_extents: [ExtentDescriptor; 3],
    pub catalog_file_size: u32,
    pub catalog_file_extents: [ExtentDescriptor; 3],
}

impl Record for MasterDirectoryBlock {
    const SIZE: usize = 162;
}

impl MasterDirectoryBlock {
    /// Raw volume name bytes. The stored length is clamped to the field.
    pub fn volume_name_bytes(&self) -> &[u8] {
        let length = (self.volume_name[0] as usize).min(HFS_VOLUME_NAME_MAX);
        &self.volume_name[1..1 + length]
    }
}

/// HFS Plus extent. Defined as `struct HFSPlusExtentDescriptor` in
/// TN1150 > Fork Data Structure.
#[derive(Debug, Clone, Copy, PartialEq, Default, DekuRead, DekuWrite)]
#[deku(endian = "endian", ctx = "endian: Endian")]
pub struct HfsPlusExtentDescriptor {
    pub start_block: u32,
    pub block_count: u32,
}

/// Defined as `struct HFSPlusForkData` in TN1150 > Fork Data Structure.
#[derive(Debug, Clone, PartialEq, Default, DekuRead, DekuWrite)]
#[deku(endian = "endian", ctx = "endian: Endian")]
pub struct ForkData {
    pub logical_size: u64,
    pub clump_size: u32,
    pub total_blocks: u32,
    pub extents: [HfsPlusExtentDescriptor; 8],
}

/// HFS Plus volume header, at the same offset as the MDB. Defined as
/// `struct HFSPlusVolumeHeader` in TN1150 > Volume Header.
#[derive(Debug, Clone, PartialEq, DekuRead, DekuWrite)]
#[deku(endian = "big")]
pub struct HfsPlusVolumeHeader {
    pub signature: u16,
    pub version: u16,
    pub attributes: u32,
    pub last_mounted_version: u32,
    pub journal_info_block: u32,

    pub create_date: Date,
    pub modify_date: Date,
    pub backup_date: Date,
    pub checked_date: Date,

    pub file_count: u32,
    pub folder_count: u32,

    pub block_size: u32,
    pub total_blocks: u32,
    pub free_blocks: u32,

    pub next_allocation: u32,
    pub rsrc_clump_size: u32,
    pub data_clump_size: u32,
    pub next_catalog_id: u32,

    pub write_count: u32,
    pub encodings_bitmap: u64,

    pub finder_info: [u32; 8],

    pub allocation_file: ForkData,
    pub extents_file: ForkData,
    pub catalog_file: ForkData,
    pub attributes_file: ForkData,
    pub startup_file: ForkData,
}

impl Record for HfsPlusVolumeHeader {
    const SIZE: usize = 512;
}

/// Read a NUL-padded ASCII field, dropping trailing NULs.
pub fn from_fixed(field: &[u8]) -> String {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Read a Pascal string (length byte, then characters) from a fixed-width
/// field. The length is clamped to the field.
pub fn from_pascal(field: &[u8]) -> String {
    let Some((&length, chars)) = field.split_first() else {
        return String::new();
    };
    let length = (length as usize).min(chars.len());
    String::from_utf8_lossy(&chars[..length]).into_owned()
}

/// NUL-pad `value` into a fixed-width field, truncating if it is too long.
pub fn to_fixed<const N: usize>(value: &str) -> [u8; N] {
    let mut field = [0u8; N];
    let bytes = value.as_bytes();
    let length = bytes.len().min(N);
    field[..length].copy_from_slice(&bytes[..length]);
    field
}
