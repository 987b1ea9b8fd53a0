//! This library handles reading from and creating the container archives found in *Sega* and
//! *Nintendo* era game resource packages.
//!
//! # Container Format Documentation
//!
//! Every format is reached through the same [`ArchiveReader`] and [`ArchiveWriter`]. The reader
//! sniffs the format, parses the entry table once, and hands out bounded views of each entry.
//! The writer queues content, checks it against the format as it is added, and lays the whole
//! container out in one pass when it is finished.
//!
//! ## Formats
//!
//! | Format | Magic            | Byte order | Alignment | Names                                |
//! |--------|------------------|------------|-----------|--------------------------------------|
//! | AFS    | `AFS\0`          | LE         | 2048      | optional 32 byte table after the data |
//! | ACX    | `00000000`       | BE         | 4         | none                                 |
//! | GNT    | `NGIF` + `NGTL`  | BE fields  | 8         | none                                 |
//! | SNT    | `NUIF` + `NUTL`  | LE         | 8         | none                                 |
//! | GVM    | `GVMH`           | BE         | 16        | 28 bytes, optional                   |
//! | PVM    | `PVMH`           | LE         | 16        | 28 bytes, optional                   |
//! | SVM    | `PVMH`           | LE         | 16        | 28 bytes, optional                   |
//! | XVM    | `XVMH`           | LE         | 16        | 28 bytes, optional                   |
//! | MRG    | `MRG0`           | LE         | 16        | 32 byte stem, 4 byte extension       |
//! | NARC   | `NARC`           | LE         | 4         | directory tree, optional             |
//! | SPK    | `SND0`           | LE         | 16        | 20 bytes                             |
//! | TEX    | `TEX0`           | LE         | 32        | 20 bytes, Shift-JIS                  |
//! | U8     | `55 AA 38 2D`    | BE         | 32        | directory tree                       |
//! | ONE    | none             | LE         | 16        | 32 bytes, entries zlib compressed    |
//!
//! ### Identification
//!
//! Formats are tried in the order of [`ArchiveFormat::ALL`]. Each check restores the stream
//! position and treats read errors as a mismatch. PVM and SVM share a magic number and are told
//! apart by the codec of the first nested texture. Empty ACX and ONE archives carry no
//! signature at all and are only recognized through the file extension.
//!
//! ### Texture Containers
//!
//! GVM, PVM, SVM and XVM only hold textures of their own codec. The entry table mirrors a few
//! attributes of each texture, selected by [`TableFlags`], and entry lengths are taken from
//! the nested texture headers rather than from the table.
//!
//! ### Hierarchical Formats
//!
//! NARC and U8 store a directory tree. Entry paths are joined with `/` when reading, and split
//! on either `/` or `\` when writing.
//!

pub mod compression;
pub mod entry;
pub mod error;
pub mod format;
mod formats;
pub mod io;
pub mod read;
mod tree;
pub mod write;

pub use compression::EntryEncoding;
pub use entry::{Catalog, Entry, TextureMetadata};
pub use format::{try_identify, ArchiveCodec, ArchiveFormat};
pub use formats::TableFlags;
pub use read::{ArchiveFile, ArchiveReader};
pub use write::{AfsVersion, ArchiveWriter, EntryProgress, WriterOptions};
