//! Summary statistics from an HFS Master Directory Block or HFS Plus volume
//! header.

use chrono::DateTime;
use log::debug;
use std::io::{Read, Seek};

use crate::codec::read_record;
use crate::raw::{BootBlockHeader, Date, HfsPlusVolumeHeader, MasterDirectoryBlock};
use hfs_types::{HFS_PLUS_SIGNATURE, HFS_SIGNATURE, MAC_EPOCH_OFFSET, VOLUME_HEADER_OFFSET};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Hfs,
    HfsPlus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSummary {
    pub kind: VolumeKind,
    /// Only HFS stores a name in the volume header.
    pub name: Option<String>,
    pub create_date: Date,
    pub modify_date: Date,
    pub block_size: u64,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub file_count: u32,
    pub folder_count: u32,
    pub attributes: u32,
}

impl VolumeSummary {
    fn from_mdb(mdb: &MasterDirectoryBlock) -> Self {
        VolumeSummary {
            kind: VolumeKind::Hfs,
            name: Some(mac_roman_to_utf8(mdb.volume_name_bytes())),
            create_date: mdb.create_date,
            modify_date: mdb.modify_date,
            block_size: mdb.block_size as u64,
            total_blocks: mdb.total_blocks as u64,
            free_blocks: mdb.free_blocks as u64,
            file_count: mdb.file_count,
            folder_count: mdb.folder_count,
            attributes: mdb.attributes as u32,
        }
    }

    fn from_volume_header(vh: &HfsPlusVolumeHeader) -> Self {
        VolumeSummary {
            kind: VolumeKind::HfsPlus,
            name: None,
            create_date: vh.create_date,
            modify_date: vh.modify_date,
            block_size: vh.block_size as u64,
            total_blocks: vh.total_blocks as u64,
            free_blocks: vh.free_blocks as u64,
            file_count: vh.file_count,
            folder_count: vh.folder_count,
            attributes: vh.attributes,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.block_size * self.total_blocks
    }

    pub fn free(&self) -> u64 {
        self.block_size * self.free_blocks
    }

    pub fn used(&self) -> u64 {
        self.capacity().saturating_sub(self.free())
    }

    /// Either lock bit is set.
    pub fn is_locked(&self) -> bool {
        (self.attributes & hfs_types::volume_attributes::LOCKED as u32) != 0
    }
}

/// Why a volume could not be summarised. Reported, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    BootBlocksUnreadable,
    MasterDirectoryBlockUnreadable,
    VolumeHeaderUnreadable,
    UnrecognizedSignature(u16),
}

/// Everything read from the first three blocks of a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeDescription {
    pub boot_blocks: Option<BootBlockHeader>,
    /// Signature word at the MDB position, if it could be read.
    pub signature: Option<u16>,
    pub summary: Option<VolumeSummary>,
    pub diagnostic: Option<Diagnostic>,
}

impl VolumeDescription {
    fn failed(
        boot_blocks: Option<BootBlockHeader>,
        signature: Option<u16>,
        diagnostic: Diagnostic,
    ) -> Self {
        VolumeDescription {
            boot_blocks,
            signature,
            summary: None,
            diagnostic: Some(diagnostic),
        }
    }
}

/// Describe the volume starting at byte `offset` of `store`.
pub fn describe_volume<S: Read + Seek + ?Sized>(store: &mut S, offset: u64) -> VolumeDescription {
    let boot_blocks: BootBlockHeader = match read_record(store, offset) {
        Ok(bb) => bb,
        Err(err) => {
            debug!("Boot blocks at {offset} unreadable: {err}");
            return VolumeDescription::failed(None, None, Diagnostic::BootBlocksUnreadable);
        }
    };

    let header_offset = offset + VOLUME_HEADER_OFFSET;
    let mdb: MasterDirectoryBlock = match read_record(store, header_offset) {
        Ok(mdb) => mdb,
        Err(err) => {
            debug!("Volume header at {header_offset} unreadable: {err}");
            return VolumeDescription::failed(
                Some(boot_blocks),
                None,
                Diagnostic::MasterDirectoryBlockUnreadable,
            );
        }
    };

    let signature = mdb.signature;
    let summary = match signature {
        HFS_SIGNATURE => VolumeSummary::from_mdb(&mdb),
        HFS_PLUS_SIGNATURE => match read_record::<HfsPlusVolumeHeader, _>(store, header_offset) {
            Ok(vh) => VolumeSummary::from_volume_header(&vh),
            Err(err) => {
                debug!("HFS Plus volume header at {header_offset} unreadable: {err}");
                return VolumeDescription::failed(
                    Some(boot_blocks),
                    Some(signature),
                    Diagnostic::VolumeHeaderUnreadable,
                );
            }
        },
        other => {
            return VolumeDescription::failed(
                Some(boot_blocks),
                Some(signature),
                Diagnostic::UnrecognizedSignature(other),
            );
        }
    };

    VolumeDescription {
        boot_blocks: Some(boot_blocks),
        signature: Some(signature),
        summary: Some(summary),
        diagnostic: None,
    }
}

/// Render a 1904-based date in UTC. Zero means "not set" and renders empty.
pub fn format_date(date: Date) -> String {
    if date == 0 {
        return String::new();
    }

    DateTime::from_timestamp(date as i64 - MAC_EPOCH_OFFSET, 0)
        .map(|t| t.format("%B %-d, %Y at %-I:%M:%S %p UTC").to_string())
        .unwrap_or_default()
}

/// Mac Roman to Unicode lookup table for bytes 0x80-0xFF.
static MAC_ROMAN_TABLE: [char; 128] = [
    '\u{00C4}', '\u{00C5}', '\u{00C7}', '\u{00C9}', '\u{00D1}', '\u{00D6}', '\u{00DC}', '\u{00E1}',
    '\u{00E0}', '\u{00E2}', '\u{00E4}', '\u{00E3}', '\u{00E5}', '\u{00E7}', '\u{00E9}', '\u{00E8}',
    '\u{00EA}', '\u{00EB}', '\u{00ED}', '\u{00EC}', '\u{00EE}', '\u{00EF}', '\u{00F1}', '\u{00F3}',
    '\u{00F2}', '\u{00F4}', '\u{00F6}', '\u{00F5}', '\u{00FA}', '\u{00F9}', '\u{00FB}', '\u{00FC}',
    '\u{2020}', '\u{00B0}', '\u{00A2}', '\u{00A3}', '\u{00A7}', '\u{2022}', '\u{00B6}', '\u{00DF}',
    '\u{00AE}', '\u{00A9}', '\u{2122}', '\u{00B4}', '\u{00A8}', '\u{2260}', '\u{00C6}', '\u{00D8}',
    '\u{221E}', '\u{00B1}', '\u{2264}', '\u{2265}', '\u{00A5}', '\u{00B5}', '\u{2202}', '\u{2211}',
    '\u{220F}', '\u{03C0}', '\u{222B}', '\u{00AA}', '\u{00BA}', '\u{03A9}', '\u{00E6}', '\u{00F8}',
    '\u{00BF}', '\u{00A1}', '\u{00AC}', '\u{221A}', '\u{0192}', '\u{2248}', '\u{2206}', '\u{00AB}',
    '\u{00BB}', '\u{2026}', '\u{00A0}', '\u{00C0}', '\u{00C3}', '\u{00D5}', '\u{0152}', '\u{0153}',
    '\u{2013}', '\u{2014}', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '\u{00F7}', '\u{25CA}',
    '\u{00FF}', '\u{0178}', '\u{2044}', '\u{20AC}', '\u{2039}', '\u{203A}', '\u{FB01}', '\u{FB02}',
    '\u{2021}', '\u{00B7}', '\u{201A}', '\u{201E}', '\u{2030}', '\u{00C2}', '\u{00CA}', '\u{00C1}',
    '\u{00CB}', '\u{00C8}', '\u{00CD}', '\u{00CE}', '\u{00CF}', '\u{00CC}', '\u{00D3}', '\u{00D4}',
    '\u{F8FF}', '\u{00D2}', '\u{00DA}', '\u{00DB}', '\u{00D9}', '\u{0131}', '\u{02C6}', '\u{02DC}',
    '\u{00AF}', '\u{02D8}', '\u{02D9}', '\u{02DA}', '\u{00B8}', '\u{02DD}', '\u{02DB}', '\u{02C7}',
];

fn mac_roman_to_utf8(data: &[u8]) -> String {
    data.iter()
        .map(|&b| {
            if b < 0x80 {
                b as char
            } else {
                MAC_ROMAN_TABLE[(b - 0x80) as usize]
            }
        })
        .collect()
}
