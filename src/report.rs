//! Human-readable description of a disk image.

use itertools::Itertools;
use log::debug;
use std::fmt::{Display, Write as _};
use std::io::{Read, Seek};

use crate::checksum::{checksum16, matches_stored};
use crate::codec::read_bytes_at;
use crate::error::Result;
use crate::partition::PartitionMapWalker;
use crate::probe::{ImageLayout, classify, read_signatures};
use crate::raw::{DriverDescriptorRecord, PartitionMapEntry};
use crate::volume::{Diagnostic, VolumeDescription, VolumeSummary, describe_volume, format_date};
use hfs_types::{BOOT_BLOCK_SIGNATURE, HFS_PLUS_SIGNATURE, HFS_SIGNATURE};

const INDENT: &str = "    ";

/// Line-oriented text with nesting by depth.
#[derive(Default)]
struct Report {
    text: String,
}

impl Report {
    fn line(&mut self, depth: usize, content: impl Display) {
        let line = format!("{}{content}", INDENT.repeat(depth));
        // Infallible for String.
        let _ = writeln!(self.text, "{}", line.trim_end());
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }
}

/// Describe the image in `store`. `name` is shown in the header line.
///
/// Unrecognised images produce a short explanation rather than an error;
/// only failing to read the first block is fatal.
pub fn describe_image<S: Read + Seek + ?Sized>(
    store: &mut S,
    name: &str,
    file_size: u64,
    verbose: bool,
) -> Result<String> {
    let mut report = Report::default();
    report.line(0, format_args!("Checking file \"{name}\""));
    report.line(0, format_args!("File size: {file_size} bytes"));

    let (ddr, signatures) = read_signatures(store)?;
    let layout = classify(signatures);
    debug!("Describing {name} as {layout:?}");

    if verbose && layout == Some(ImageLayout::PartitionMapped) {
        device_lines(&mut report, &ddr, file_size);
    }

    match layout {
        Some(ImageLayout::PartitionMapped) => {
            report.line(0, "File format: Apple Partition Map disk image");
            partition_map(&mut report, store, 1, file_size);
        }
        Some(ImageLayout::RawBootable) => {
            report.line(0, "File format: Apple HFS volume image (bootable)");
            volume(&mut report, &describe_volume(store, 0), 1, verbose);
        }
        Some(ImageLayout::RawUnbootable) => {
            report.line(0, "File format: Apple HFS volume image (not bootable)");
            volume(&mut report, &describe_volume(store, 0), 1, verbose);
        }
        None => {
            report.line(0, "File is not a recognized disk image format.");
            report.line(
                0,
                "Currently this utility only recognizes raw HFS or Apple Partition Map format.",
            );
        }
    }

    Ok(report.text)
}

fn device_lines(report: &mut Report, ddr: &DriverDescriptorRecord, file_size: u64) {
    match ddr.device_size() {
        0 => report.line(0, "Device size: (not specified)"),
        size if size > file_size => {
            report.line(0, format_args!("Device size: {size} bytes [TRUNCATED]"))
        }
        size => report.line(0, format_args!("Device size: {size} bytes")),
    }
    let signature = ddr.signature;
    report.line(0, format_args!("Device signature: 0x{signature:04X} 'ER'"));
}

fn partition_map<S: Read + Seek + ?Sized>(
    report: &mut Report,
    store: &mut S,
    depth: usize,
    file_size: u64,
) {
    // Collected up front so the store is free for reading partition contents.
    let entries: Vec<PartitionMapEntry> = PartitionMapWalker::new(store)
        .map_while(|entry| entry.ok())
        .collect();

    for (index, entry) in entries.iter().enumerate() {
        let (name, kind) = (entry.name(), entry.partition_type());
        let offset = entry.byte_offset();
        let length = entry.byte_length();
        let end = offset + length;

        report.blank();
        report.line(depth, format_args!("Partition {index}: {name} ({kind})"));
        let truncated = if end > file_size { " [TRUNCATED]" } else { "" };
        report.line(
            depth + 1,
            format_args!("Size: {length} bytes (offset {offset} to {end}){truncated}"),
        );

        if entry.is_driver() {
            let boot_size = entry.boot_size;
            report.line(
                depth + 1,
                format_args!("Code: {boot_size} bytes (offset {offset} in file)"),
            );
            report.line(depth + 1, driver_checksum(store, entry, file_size));
        }

        if entry.is_hfs() {
            volume(report, &describe_volume(store, offset), depth + 1, true);
        }
    }
}

/// `Checksum: ...` line for a driver partition, with its verification result.
fn driver_checksum<S: Read + Seek + ?Sized>(
    store: &mut S,
    entry: &PartitionMapEntry,
    file_size: u64,
) -> String {
    let stored = entry.boot_checksum;
    if stored == 0 {
        return format!("Checksum: 0x{stored:08X} (driver will not load)");
    }

    let offset = entry.byte_offset();
    let code = if offset.saturating_add(entry.boot_size as u64) <= file_size {
        read_bytes_at(store, offset, entry.boot_size as usize).ok()
    } else {
        None
    };

    match code.map(|code| checksum16(&code)) {
        Some(computed) if matches_stored(computed, stored) => {
            format!("Checksum: 0x{stored:08X} (computed 0x{computed:04X}) [VERIFIED]")
        }
        Some(computed) => {
            format!("Checksum: 0x{stored:08X} (computed 0x{computed:04X}) [VERIFY FAILED]")
        }
        None => format!("Checksum: 0x{stored:08X} (computed: unreadable) [VERIFY FAILED]"),
    }
}

fn volume(report: &mut Report, description: &VolumeDescription, depth: usize, verbose: bool) {
    if verbose {
        if let Some(bb) = &description.boot_blocks {
            let (id, version) = (bb.id, bb.version);
            let meaning = match id {
                0 => " (non-bootable volume)",
                BOOT_BLOCK_SIGNATURE => " 'LK' (bootable volume)",
                _ => " (expected 0x4C4B)",
            };
            report.line(
                depth,
                format_args!("Boot block signature: 0x{id:04X}{meaning}"),
            );
            report.line(depth, format_args!("Boot block version: 0x{version:04X}"));
            if id == BOOT_BLOCK_SIGNATURE {
                let names = bb
                    .file_names()
                    .into_iter()
                    .filter(|name| !name.is_empty())
                    .join(", ");
                if !names.is_empty() {
                    report.line(depth, format_args!("Boot files: {names}"));
                }
            }
        }
        if let Some(signature) = description.signature {
            let meaning = match signature {
                HFS_SIGNATURE => "'BD' (HFS volume)",
                HFS_PLUS_SIGNATURE => "'H+' (HFS+ volume)",
                _ => "(unrecognized format)",
            };
            report.line(
                depth,
                format_args!("Volume signature: 0x{signature:04X} {meaning}"),
            );
        }
    }

    match description.diagnostic {
        Some(Diagnostic::BootBlocksUnreadable) => {
            report.line(depth, "Error reading HFS boot blocks")
        }
        Some(Diagnostic::MasterDirectoryBlockUnreadable) => {
            report.line(depth, "Error reading volume information block")
        }
        Some(Diagnostic::VolumeHeaderUnreadable) => {
            report.line(depth, "Error reading HFS+ volume header")
        }
        Some(Diagnostic::UnrecognizedSignature(signature)) if !verbose => report.line(
            depth,
            format_args!("Volume signature: 0x{signature:04X} (unrecognized format)"),
        ),
        Some(Diagnostic::UnrecognizedSignature(_)) | None => {}
    }

    if let Some(summary) = &description.summary {
        statistics(report, summary, depth);
    }
}

fn statistics(report: &mut Report, summary: &VolumeSummary, depth: usize) {
    if let Some(name) = &summary.name {
        report.line(depth, format_args!("Volume: {name}"));
    }
    let created = format_date(summary.create_date);
    let modified = format_date(summary.modify_date);
    report.line(depth, format_args!("Created: {created}"));
    report.line(depth, format_args!("Last modified: {modified}"));

    let capacity = megabytes(summary.capacity());
    let used = megabytes(summary.used());
    let free = megabytes(summary.free());
    report.line(depth, format_args!("Capacity: {capacity}"));
    report.line(depth, format_args!("Used: {used}"));
    report.line(depth, format_args!("Free: {free}"));

    report.line(depth, format_args!("Files: {}", summary.file_count));
    report.line(depth, format_args!("Folders: {}", summary.folder_count));
    let attributes = summary.attributes;
    let lock = if summary.is_locked() {
        "locked"
    } else {
        "unlocked"
    };
    report.line(depth, format_args!("Attributes: 0x{attributes:04X} ({lock})"));
}

fn megabytes(bytes: u64) -> String {
    format!("{:.1} MB ({bytes} bytes)", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{write_record, write_u16_at};
    use crate::driver::APPLE_DRIVER_43;
    use crate::volume::tests::{hfs_plus_volume, hfs_volume};
    use crate::writer::{CopyControl, write_device_image};
    use hfs_types::partition_type;
    use std::io::Cursor;

    fn describe(bytes: Vec<u8>, verbose: bool) -> String {
        let file_size = bytes.len() as u64;
        describe_image(&mut Cursor::new(bytes), "test.img", file_size, verbose).unwrap()
    }

    fn entry(name: &str, kind: &str, start: u32, blocks: u32) -> PartitionMapEntry {
        let mut entry = PartitionMapEntry::new(name, kind);
        entry.map_block_count = 3;
        entry.physical_start = start;
        entry.block_count = blocks;
        entry
    }

    /// Device with a DDR and the given partition map entries, `size` bytes long.
    fn device(entries: &[PartitionMapEntry], size: usize) -> Cursor<Vec<u8>> {
        let mut store = Cursor::new(vec![0u8; size]);
        let mut ddr = crate::writer::driver_descriptor_record(0);
        ddr.block_count = 64;
        write_record(&mut store, 0, &ddr).unwrap();
        for (index, entry) in entries.iter().enumerate() {
            write_record(&mut store, 512 * (index as u64 + 1), entry).unwrap();
        }
        store
    }

    fn driver_with_checksum(code: &[u8], checksum: u32) -> String {
        let mut driver = entry("Macintosh", partition_type::DRIVER_43, 8, 4);
        driver.boot_size = code.len() as u32;
        driver.boot_checksum = checksum;
        let mut store = device(&[driver], 8192);
        store.get_mut()[4096..4096 + code.len()].copy_from_slice(code);
        describe(store.into_inner(), false)
    }

    fn converted(volume: Vec<u8>) -> String {
        let length = volume.len() as u64;
        let mut source = Cursor::new(volume);
        let mut dest = Cursor::new(Vec::new());
        let mut control = CopyControl::default();
        write_device_image(&mut dest, &mut source, 0, length, false, &mut control).unwrap();
        describe(dest.into_inner(), false)
    }

    #[test]
    fn raw_volume_terse() {
        let report = describe(hfs_volume("Untitled", 4096), false);
        let expected = "\
Checking file \"test.img\"
File size: 4096 bytes
File format: Apple HFS volume image (not bootable)
    Volume: Untitled
    Created: January 1, 1970 at 12:00:00 AM UTC
    Last modified:
    Capacity: 1.4 MB (1433600 bytes)
    Used: 1.0 MB (1075200 bytes)
    Free: 0.3 MB (358400 bytes)
    Files: 12
    Folders: 3
    Attributes: 0x0000 (unlocked)
";
        assert_eq!(report, expected);
    }

    #[test]
    fn raw_hfs_plus_volume_has_no_name() {
        let report = describe(hfs_plus_volume(4096), false);
        let expected = "\
Checking file \"test.img\"
File size: 4096 bytes
File format: Apple HFS volume image (not bootable)
    Created: January 1, 1970 at 12:00:00 AM UTC
    Last modified:
    Capacity: 3.9 MB (4096000 bytes)
    Used: 2.9 MB (3072000 bytes)
    Free: 1.0 MB (1024000 bytes)
    Files: 5
    Folders: 2
    Attributes: 0x8000 (locked)
";
        assert_eq!(report, expected);
    }

    #[test]
    fn short_hfs_plus_header_is_reported() {
        let bytes = hfs_plus_volume(4096)[..1324].to_vec();
        let report = describe(bytes, true);
        assert!(report.ends_with(
            "    Volume signature: 0x482B 'H+' (HFS+ volume)\n\
             \x20   Error reading HFS+ volume header\n"
        ));
        assert!(!report.contains("Capacity"));
    }

    #[test]
    fn short_master_directory_block_is_reported() {
        let mut store = Cursor::new(vec![0u8; 1100]);
        write_u16_at(&mut store, 0, BOOT_BLOCK_SIGNATURE).unwrap();
        let report = describe(store.into_inner(), false);
        assert!(report.ends_with("    Error reading volume information block\n"));
    }

    #[test]
    fn raw_volume_verbose_shows_signatures() {
        let mut store = Cursor::new(hfs_volume("Boot", 4096));
        write_u16_at(&mut store, 0, BOOT_BLOCK_SIGNATURE).unwrap();
        store.get_mut()[10..17].copy_from_slice(b"\x06System");
        store.get_mut()[26..33].copy_from_slice(b"\x06Finder");
        write_u16_at(&mut store, 1034, 0x8080).unwrap();

        let report = describe(store.into_inner(), true);
        assert!(report.contains("File format: Apple HFS volume image (bootable)\n"));
        assert!(report.contains("    Boot block signature: 0x4C4B 'LK' (bootable volume)\n"));
        assert!(report.contains("    Boot files: System, Finder\n"));
        assert!(report.contains("    Volume signature: 0x4244 'BD' (HFS volume)\n"));
        assert!(report.contains("    Attributes: 0x8080 (locked)\n"));
    }

    #[test]
    fn unknown_format_is_explained() {
        let report = describe(vec![0u8; 2048], true);
        assert!(report.ends_with(
            "File is not a recognized disk image format.\n\
             Currently this utility only recognizes raw HFS or Apple Partition Map format.\n"
        ));
    }

    #[test]
    fn unreadable_first_block_is_an_error() {
        let mut store = Cursor::new(vec![0u8; 100]);
        assert!(describe_image(&mut store, "short", 100, false).is_err());
    }

    #[test]
    fn truncated_partition_map_lists_every_entry_in_order() {
        let entries = [
            entry("Apple", partition_type::PARTITION_MAP, 1, 63),
            entry("Macintosh", partition_type::DRIVER_43, 64, 32),
            entry("MacOS", partition_type::HFS, 96, 64),
        ];
        // The HFS partition claims up to byte 81920 but the file ends at 65536.
        let report = describe(device(&entries, 65536).into_inner(), false);

        let headings: Vec<&str> = report
            .lines()
            .filter(|line| line.starts_with("    Partition"))
            .collect();
        assert_eq!(
            headings,
            [
                "    Partition 0: Apple (Apple_partition_map)",
                "    Partition 1: Macintosh (Apple_Driver43)",
                "    Partition 2: MacOS (Apple_HFS)",
            ]
        );
        assert!(report.contains("        Size: 32256 bytes (offset 512 to 32768)\n"));
        assert!(report.contains("        Size: 32768 bytes (offset 49152 to 81920) [TRUNCATED]\n"));
        assert_eq!(report.matches("[TRUNCATED]").count(), 1);
    }

    #[test]
    fn verbose_device_lines() {
        let report = describe(device(&[], 4096).into_inner(), true);
        assert!(report.contains("Device size: 32768 bytes [TRUNCATED]\n"));
        assert!(report.contains("Device signature: 0x4552 'ER'\n"));
        assert!(report.contains("File format: Apple Partition Map disk image\n"));
    }

    #[test]
    fn zero_checksum_will_not_load() {
        let report = driver_with_checksum(b"driver", 0);
        assert!(report.contains("Checksum: 0x00000000 (driver will not load)\n"));
        assert!(!report.contains("VERIF"));
    }

    #[test]
    fn matching_checksum_is_verified() {
        let code = b"Apple_Driver43";
        let report = driver_with_checksum(code, 0xA341);
        assert!(report.contains("        Code: 14 bytes (offset 4096 in file)\n"));
        assert!(report.contains("Checksum: 0x0000A341 (computed 0xA341) [VERIFIED]\n"));
    }

    #[test]
    fn mismatched_checksum_fails_verification() {
        let report = driver_with_checksum(b"Apple_Driver43", 0x1234);
        assert!(report.contains("Checksum: 0x00001234 (computed 0xA341) [VERIFY FAILED]\n"));
    }

    #[test]
    fn driver_code_past_end_is_unreadable() {
        let mut driver = entry("Macintosh", partition_type::DRIVER_43, 8, 4);
        driver.boot_size = 100_000;
        driver.boot_checksum = 0xF624;
        let report = describe(device(&[driver], 8192).into_inner(), false);
        assert!(report.contains("Checksum: 0x0000F624 (computed: unreadable) [VERIFY FAILED]\n"));
    }

    #[test]
    fn converted_image_describes_nested_volume() {
        let report = converted(hfs_volume("Converted", 8192));
        assert!(report.contains("    Partition 2: MacOS (Apple_HFS)\n"));
        assert!(report.contains(&format!("        Code: {} bytes", APPLE_DRIVER_43.len())));
        // HFS partitions are always described in full.
        assert!(report.contains("        Boot block signature: 0x0000 (non-bootable volume)\n"));
        assert!(report.contains("        Volume: Converted\n"));
        assert!(report.contains("        Attributes: 0x8080 (locked)\n"));
    }

    /// The bundled driver is a zero-filled stand-in, so its code sums to the
    /// zero sentinel and never matches the recorded checksum. Replacing the
    /// resource with real driver code must update this test.
    #[test]
    fn bundled_driver_fails_verification() {
        assert_eq!(APPLE_DRIVER_43.len(), 9728);
        assert!(APPLE_DRIVER_43.iter().all(|&b| b == 0));

        let report = converted(hfs_volume("Driver", 8192));
        assert!(
            report.contains("        Checksum: 0x0000F624 (computed 0xFFFF) [VERIFY FAILED]\n")
        );
    }
}
