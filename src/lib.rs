#![forbid(unsafe_code)]

//! Inspect and convert classic Macintosh disk images.
//!
//! Two layouts are recognised: a bare HFS or HFS Plus volume, and a device
//! image carrying an Apple Partition Map with an `Apple_HFS` partition.
//! [`probe_and_describe`] renders a text report of either; [`convert`]
//! extracts the HFS volume and writes it back out as a bare volume or as a
//! bootable partitioned device image.

pub mod checksum;
pub mod codec;
pub mod driver;
pub mod error;
pub mod partition;
pub mod probe;
pub mod raw;
pub mod report;
pub mod volume;
pub mod writer;

use log::info;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::Path;

pub use error::{Error, Result};
pub use probe::{ImageLayout, Probe, probe};
pub use writer::CopyControl;

/// Output layout of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertTarget {
    /// Partition map, boot driver and HFS partition at 0xC000.
    PartitionedImage,
    /// The HFS volume alone.
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    pub target: ConvertTarget,
    /// Clear the volume lock bits instead of setting them.
    pub writable: bool,
}

/// Describe the image at `path` as indented text.
pub fn probe_and_describe(path: impl AsRef<Path>, verbose: bool) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy());

    let mut reader = BufReader::new(file);
    report::describe_image(&mut reader, &name, file_size, verbose)
}

/// Extract the HFS volume from `input` and write it to `output`.
///
/// The output file is created or truncated before any data is copied, so a
/// failed or cancelled conversion leaves a partial file behind.
pub fn convert(
    options: &ConvertOptions,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    control: &mut CopyControl,
) -> Result<()> {
    let (input, output) = (input.as_ref(), output.as_ref());

    let source = File::open(input)?;
    let file_size = source.metadata()?.len();
    let mut source = BufReader::new(source);
    let found = probe(&mut source, file_size)?;

    let mut dest = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(output)?;

    info!(
        "Converting {} to {:?} at {}",
        input.display(),
        options.target,
        output.display()
    );
    match options.target {
        ConvertTarget::PartitionedImage => writer::write_device_image(
            &mut dest,
            &mut source,
            found.volume.offset,
            found.volume.length,
            options.writable,
            control,
        )?,
        ConvertTarget::Volume => writer::write_volume_data(
            &mut dest,
            &mut source,
            found.volume.offset,
            0,
            found.volume.length,
            options.writable,
            control,
        )?,
    }
    dest.flush()?;

    info!("Wrote {}", output.display());
    Ok(())
}
