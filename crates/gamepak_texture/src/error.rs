//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// the chunk is not a known texture chunk
    #[error("unrecognized texture chunk {0:02X?}")]
    UnknownChunk([u8; 4]),

    /// the PVRT data format is neither a PVR nor an SVR format
    #[error("data format {0:#04x} is not a known PVRT data format")]
    UnsupportedDataFormat(u8),

    /// the global index chunk cannot hold an index
    #[error("global index chunk is too short ({0} bytes)")]
    InvalidGlobalIndex(u32),

    /// the payload does not fit in a chunk
    #[error("texture payload of {0} bytes does not fit in a chunk")]
    TooLarge(usize),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
