use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown format")]
    UnknownFormat,

    #[error("HFS partition not found")]
    HfsPartitionNotFound,

    #[error("partition start {start} lies beyond file size {file_size}")]
    PartitionOutOfRange { start: u64, file_size: u64 },

    #[error("conversion cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
