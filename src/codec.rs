//! Positioned reads and writes of fixed-layout records.

use deku::{DekuContainerRead, DekuContainerWrite};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A fixed-width on-disk record.
pub trait Record: for<'a> DekuContainerRead<'a> + DekuContainerWrite {
    /// Exact encoded width in bytes.
    const SIZE: usize;
}

/// Decode a `T` from exactly `T::SIZE` bytes at `offset`. A short read fails
/// with `UnexpectedEof`.
pub fn read_record<T, S>(store: &mut S, offset: u64) -> io::Result<T>
where
    T: Record,
    S: Read + Seek + ?Sized,
{
    store.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; T::SIZE];
    store.read_exact(&mut buf)?;

    let (_rest, record) = T::from_bytes((buf.as_slice(), 0))?;
    Ok(record)
}

/// Encode `record` and write it at `offset`.
pub fn write_record<T, S>(store: &mut S, offset: u64, record: &T) -> io::Result<()>
where
    T: Record,
    S: Write + Seek + ?Sized,
{
    let bytes = record.to_bytes()?;
    if bytes.len() != T::SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("record encoded to {} bytes, expected {}", bytes.len(), T::SIZE),
        ));
    }

    store.seek(SeekFrom::Start(offset))?;
    store.write_all(&bytes)
}

pub fn read_u16_at<S: Read + Seek + ?Sized>(store: &mut S, offset: u64) -> io::Result<u16> {
    store.seek(SeekFrom::Start(offset))?;
    let mut buf = [0u8; 2];
    store.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

pub fn write_u16_at<S: Write + Seek + ?Sized>(
    store: &mut S,
    offset: u64,
    value: u16,
) -> io::Result<()> {
    store.seek(SeekFrom::Start(offset))?;
    store.write_all(&value.to_be_bytes())
}

/// Read exactly `length` bytes at `offset`.
pub fn read_bytes_at<S: Read + Seek + ?Sized>(
    store: &mut S,
    offset: u64,
    length: usize,
) -> io::Result<Vec<u8>> {
    store.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; length];
    store.read_exact(&mut buf)?;
    Ok(buf)
}
