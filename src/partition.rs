//! Apple Partition Map traversal.

use log::warn;
use std::io::{self, Read, Seek};

use crate::codec::{Record, read_record};
use crate::error::{Error, Result};
use crate::raw::PartitionMapEntry;
use hfs_types::{BLOCK_SIZE, PARTITION_MAP_OFFSET};

/// Byte span of a volume inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSpan {
    pub offset: u64,
    pub length: u64,
}

/// Yields consecutive partition map entries starting at block 1, stopping at
/// the first entry without the `'PM'` signature. A failed read is yielded
/// once and ends the walk.
pub struct PartitionMapWalker<'s, S: ?Sized> {
    store: &'s mut S,
    offset: u64,
    done: bool,
}

impl<'s, S: Read + Seek + ?Sized> PartitionMapWalker<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        PartitionMapWalker {
            store,
            offset: PARTITION_MAP_OFFSET,
            done: false,
        }
    }
}

impl<S: Read + Seek + ?Sized> Iterator for PartitionMapWalker<'_, S> {
    type Item = io::Result<PartitionMapEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match read_record::<PartitionMapEntry, _>(&mut *self.store, self.offset) {
            Ok(entry) if entry.has_valid_signature() => {
                self.offset += PartitionMapEntry::SIZE as u64;
                Some(Ok(entry))
            }
            Ok(_) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Fit a partition's recorded span inside a file of `file_size` bytes,
/// dropping whole blocks from the end of a partition cut short by a
/// truncated image. A partition left with less than one block is out of
/// range.
pub fn fit_to_file(entry: &PartitionMapEntry, file_size: u64) -> Result<VolumeSpan> {
    let offset = entry.byte_offset();
    if offset > file_size {
        return Err(Error::PartitionOutOfRange {
            start: offset,
            file_size,
        });
    }

    let recorded = entry.byte_length();
    let mut length = recorded;
    while length >= BLOCK_SIZE && offset + length > file_size {
        length -= BLOCK_SIZE;
    }

    if length < BLOCK_SIZE {
        return Err(Error::PartitionOutOfRange {
            start: offset,
            file_size,
        });
    }

    if length != recorded {
        warn!(
            "Partition \"{}\" truncated from {recorded} to {length} bytes to fit image",
            entry.name()
        );
    }

    Ok(VolumeSpan { offset, length })
}

/// Locate the first `Apple_HFS` partition. Only one HFS partition per image
/// is supported.
pub fn find_hfs_partition<S>(store: &mut S, file_size: u64) -> Result<VolumeSpan>
where
    S: Read + Seek + ?Sized,
{
    for entry in PartitionMapWalker::new(store) {
        let entry = entry?;
        if entry.is_hfs() {
            return fit_to_file(&entry, file_size);
        }
    }

    Err(Error::HfsPartitionNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_record;
    use std::io::Cursor;

    fn entry(name: &str, kind: &str, start: u32, blocks: u32) -> PartitionMapEntry {
        let mut entry = PartitionMapEntry::new(name, kind);
        entry.map_block_count = 3;
        entry.physical_start = start;
        entry.block_count = blocks;
        entry.data_count = blocks;
        entry
    }

    fn image_with(entries: &[PartitionMapEntry], size: usize) -> Cursor<Vec<u8>> {
        let mut store = Cursor::new(vec![0u8; size]);
        for (i, e) in entries.iter().enumerate() {
            write_record(&mut store, 512 * (i as u64 + 1), e).unwrap();
        }
        store
    }

    #[test]
    fn walk_stops_at_missing_signature() {
        let mut store = image_with(
            &[
                entry("Apple", "Apple_partition_map", 1, 63),
                entry("Macintosh", "Apple_Driver43", 64, 32),
            ],
            8192,
        );
        let types: Vec<String> = PartitionMapWalker::new(&mut store)
            .map(|e| e.unwrap().partition_type())
            .collect();
        assert_eq!(types, ["Apple_partition_map", "Apple_Driver43"]);
    }

    #[test]
    fn walk_yields_read_error_once() {
        // The second entry would start past the end of the store.
        let mut store = image_with(&[entry("Apple", "Apple_partition_map", 1, 63)], 1024);
        let mut walker = PartitionMapWalker::new(&mut store);
        assert!(walker.next().unwrap().is_ok());
        assert!(walker.next().unwrap().is_err());
        assert!(walker.next().is_none());
    }

    #[test]
    fn finds_hfs_partition() {
        let mut store = image_with(
            &[
                entry("Apple", "Apple_partition_map", 1, 63),
                entry("MacOS", "Apple_HFS", 4, 8),
            ],
            8192,
        );
        let span = find_hfs_partition(&mut store, 8192).unwrap();
        assert_eq!(
            span,
            VolumeSpan {
                offset: 2048,
                length: 4096
            }
        );
    }

    #[test]
    fn truncated_partition_shrinks_by_blocks() {
        let e = entry("MacOS", "Apple_HFS", 96, 100);
        let file_size = 96 * 512 + 40 * 512 + 100;
        let span = fit_to_file(&e, file_size).unwrap();
        assert_eq!(span.offset, 96 * 512);
        assert_eq!(span.length, 40 * 512);
    }

    #[test]
    fn partition_fitting_file_is_untouched() {
        let e = entry("MacOS", "Apple_HFS", 96, 100);
        let span = fit_to_file(&e, 196 * 512).unwrap();
        assert_eq!(span.length, 100 * 512);
    }

    #[test]
    fn partition_with_no_block_left_is_out_of_range() {
        let e = entry("MacOS", "Apple_HFS", 10, 4);
        let err = fit_to_file(&e, 10 * 512 + 200).unwrap_err();
        assert!(matches!(err, Error::PartitionOutOfRange { .. }));
    }

    #[test]
    fn partition_start_beyond_file_is_out_of_range() {
        let e = entry("MacOS", "Apple_HFS", 96, 4);
        let err = fit_to_file(&e, 1024).unwrap_err();
        assert!(matches!(
            err,
            Error::PartitionOutOfRange {
                start: 49152,
                file_size: 1024
            }
        ));
    }

    #[test]
    fn missing_hfs_partition_is_not_found() {
        let mut store = image_with(&[entry("Apple", "Apple_partition_map", 1, 63)], 4096);
        let err = find_hfs_partition(&mut store, 4096).unwrap_err();
        assert!(matches!(err, Error::HfsPartitionNotFound));
    }
}
