//! Error types that can be emitted from this library

use gamepak_texture::TextureKind;
use miette::Diagnostic;
use thiserror::Error;

use crate::format::ArchiveFormat;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Transparent wrapper for errors from the nested texture headers
    #[error(transparent)]
    #[diagnostic(transparent)]
    TextureError(#[from] gamepak_texture::error::Error),

    /// the container is internally inconsistent
    #[error("file is an invalid {format} archive: {reason}")]
    InvalidArchive {
        /// Format the container was parsed as
        format: ArchiveFormat,
        /// What did not add up
        reason: String,
    },

    /// no registered format recognized the data
    #[error("unable to identify the archive format")]
    UnknownFormat,

    /// offsets or counts overflow the fields of the format
    #[error("{0} archives cannot address this much data")]
    ArchiveTooLarge(ArchiveFormat),

    /// unable to find requested file
    #[error("unable to find requested file {0}")]
    FileNotFound(#[from] FileNotFoundError),

    /// the writer refused an entry
    #[error(transparent)]
    #[diagnostic(transparent)]
    Rejected(#[from] RejectedContent),
}

impl Error {
    pub(crate) fn invalid(format: ArchiveFormat, reason: impl Into<String>) -> Self {
        Error::InvalidArchive {
            format,
            reason: reason.into(),
        }
    }

    pub(crate) fn rejected(
        name: impl Into<String>,
        format: ArchiveFormat,
        reason: RejectionReason,
    ) -> Self {
        Error::Rejected(RejectedContent {
            name: name.into(),
            format,
            reason,
        })
    }

    /// Whether this error is a content rejection, which callers may collect and skip
    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected(_))
    }

    /// The rejection details, if this error is a content rejection
    pub fn rejection(&self) -> Option<&RejectedContent> {
        match self {
            Error::Rejected(rejected) => Some(rejected),
            _ => None,
        }
    }
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Content refused by an archive writer
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("{name:?} was rejected by the {format} archive: {reason}")]
pub struct RejectedContent {
    /// Name the content was added under
    pub name: String,

    /// Format of the archive being written
    pub format: ArchiveFormat,

    /// Why the content was refused
    pub reason: RejectionReason,
}

/// The format specific check that refused an entry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// texture containers only hold textures of their own codec
    #[error("content is not a {expected} texture")]
    NotATexture {
        /// Codec the container requires
        expected: TextureKind,
    },

    /// the name does not fit the fixed width name field
    #[error("name is longer than {max} bytes")]
    NameTooLong {
        /// Width of the name field
        max: usize,
    },

    /// the name contains characters the format's text encoding cannot represent
    #[error("name cannot be encoded as {0}")]
    NameNotEncodable(&'static str),

    /// the texture header declares a different length than the content has
    #[error("texture header declares {declared} bytes, content has {actual}")]
    LengthMismatch {
        /// Length taken from the texture chunks
        declared: u64,
        /// Length of the content that was added
        actual: u64,
    },

    /// hierarchical formats need at least one path component
    #[error("path has no file name")]
    EmptyPath,

    /// the content is larger than the format can address
    #[error("content of {0} bytes exceeds the format limit")]
    TooLarge(u64),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
