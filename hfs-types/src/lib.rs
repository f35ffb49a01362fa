// SPDX-License-Identifier: MIT

//! Signature words, fixed offsets and flag bits for classic Macintosh disk
//! images, as described in Inside Macintosh: Devices (SCSI Manager, partition
//! maps) and Inside Macintosh: Files (HFS), plus TN1150 for HFS Plus.

#![forbid(dead_code, unsafe_code)]

/// Size of a device block. Partition maps always address 512-byte blocks.
pub const BLOCK_SIZE: u64 = 512;

/// Driver Descriptor Record signature, `'ER'`.
pub const DDR_SIGNATURE: u16 = u16::from_be_bytes(*b"ER");

/// Boot block signature of a bootable HFS volume, `'LK'`.
pub const BOOT_BLOCK_SIGNATURE: u16 = u16::from_be_bytes(*b"LK");

/// Partition map entry signature, `'PM'`.
pub const PARTITION_MAP_SIGNATURE: u16 = u16::from_be_bytes(*b"PM");

/// Master Directory Block signature, `'BD'`.
pub const HFS_SIGNATURE: u16 = u16::from_be_bytes(*b"BD");

/// HFS Plus volume header signature, `'H+'`.
pub const HFS_PLUS_SIGNATURE: u16 = u16::from_be_bytes(*b"H+");

/// Byte offset of the first partition map entry (block 1).
pub const PARTITION_MAP_OFFSET: u64 = BLOCK_SIZE;

/// Byte offset of the MDB / volume header from the start of a volume.
pub const VOLUME_HEADER_OFFSET: u64 = 1024;

/// Byte offset of `drAtrb` within the Master Directory Block.
pub const MDB_ATTRIBUTES_OFFSET: u64 = 10;

/// Seconds between the Macintosh epoch (1904-01-01) and the Unix epoch.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Longest volume name an MDB can hold; the length byte is not trusted.
pub const HFS_VOLUME_NAME_MAX: usize = 27;

/// Partition type strings written to and recognised in partition maps.
pub mod partition_type {
    pub const PARTITION_MAP: &str = "Apple_partition_map";
    pub const DRIVER_43: &str = "Apple_Driver43";
    /// Prefix shared by every boot driver partition type.
    pub const DRIVER_PREFIX: &str = "Apple_Driver";
    pub const HFS: &str = "Apple_HFS";
}

/// `pmPartStatus` bits. Only the low byte is defined; bit 7 is set by the
/// classic tools on HFS partitions but carries no documented meaning.
pub mod partition_status {
    pub const VALID: u32 = 1 << 0;
    pub const ALLOCATED: u32 = 1 << 1;
    pub const IN_USE: u32 = 1 << 2;
    pub const BOOTABLE: u32 = 1 << 3;
    pub const READABLE: u32 = 1 << 4;
    pub const WRITABLE: u32 = 1 << 5;
    pub const POSITION_INDEPENDENT: u32 = 1 << 6;
    pub const UNDOCUMENTED_7: u32 = 1 << 7;
}

/// Volume attribute masks shared by `drAtrb` (HFS, 16 bits) and
/// `attributes` (HFS Plus, 32 bits).
pub mod volume_attributes {
    /// Volume is write-protected due to a hardware setting.
    pub const HARDWARE_LOCK: u16 = 1 << 7;
    /// Volume is write-protected by software.
    pub const SOFTWARE_LOCK: u16 = 1 << 15;

    /// Both lock bits. A converted read-only volume carries both.
    pub const LOCKED: u16 = HARDWARE_LOCK | SOFTWARE_LOCK;
}
