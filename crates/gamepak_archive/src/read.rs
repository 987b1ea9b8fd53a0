//! Types for reading archives
//!

use indexmap::IndexMap;
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    fs::{self, File},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};
use tracing::{debug, instrument};

use crate::{
    compression::EntryReader,
    entry::{Entry, TextureMetadata},
    error::{Error, FileNotFoundError, Result},
    format::{try_identify, ArchiveFormat},
    io::Window,
};

/// A struct for reading an entry from an archive
///
/// Positions are relative to the start of the entry's decoded content.
pub struct ArchiveFile<'a, R: Read + Seek> {
    entry: &'a Entry,
    reader: EntryReader<'a, R>,
}

impl<R: Read + Seek> Debug for ArchiveFile<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ArchiveFile({:#?})", self.entry)
    }
}

/// Methods for retrieving information on archive entries
impl<'a, R: Read + Seek> ArchiveFile<'a, R> {
    /// Get the name of the entry, without its directories
    pub fn name(&self) -> &'a str {
        self.entry.name()
    }

    /// Get the full path of the entry
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this path directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`). Carelessly writing to these paths
    /// allows an attacker to craft an archive that will overwrite critical
    /// files.
    pub fn path(&self) -> &'a str {
        self.entry.path()
    }

    /// Get the size of the entry, in bytes, once decoded
    pub fn size(&self) -> u64 {
        self.entry.size()
    }

    /// Get the starting offset of the stored data, relative to the container
    pub fn data_start(&self) -> u64 {
        self.entry.offset()
    }

    /// Get the table record of the entry
    pub fn entry(&self) -> &'a Entry {
        self.entry
    }
}

impl<R: Read + Seek> Read for ArchiveFile<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R: Read + Seek> Seek for ArchiveFile<'_, R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}

/// Archive reader
///
/// The container may start anywhere in the reader, it is parsed from the reader's position
/// when the archive is opened and runs to the end of the reader.
///
/// Every entry access moves the position of the shared reader, so a reader is not safe for
/// concurrent use. Open one reader per thread to extract in parallel.
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_contents(reader: impl Read + Seek) -> gamepak_archive::error::Result<()> {
///     let mut archive = gamepak_archive::ArchiveReader::new(reader)?;
///
///     for i in 0..archive.len() {
///         let mut file = archive.by_index(i)?;
///         println!("Filename: {}", file.path());
///         std::io::copy(&mut file, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct ArchiveReader<R> {
    reader: R,
    format: ArchiveFormat,
    start_offset: u64,
    length: u64,
    entries: Vec<Entry>,
    names: IndexMap<Box<str>, usize>,
    textures: HashMap<usize, TextureMetadata>,
}

impl<R> ArchiveReader<R> {
    /// Format of the container
    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Offset of the container in the underlying reader
    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    /// Size of the container region, from its start to the end of the reader
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Number of entries contained in this archive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries in table order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns an iterator over the paths of all named entries
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(|s| s.as_ref())
    }

    /// Total size of the entries once decoded
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for entry in &self.entries {
            total = total.checked_add(entry.size() as u128)?;
        }
        Some(total)
    }

    /// Get the index of an entry by path, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Get the path of an entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|entry| entry.path())
    }

    /// Texture attributes stored for an entry, for texture containers
    pub fn texture_metadata(&self, index: usize) -> Option<&TextureMetadata> {
        self.textures.get(&index)
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Identify and read the archive at the current position of `reader`.
    pub fn new(reader: R) -> Result<ArchiveReader<R>> {
        Self::with_hint(reader, None)
    }

    /// Identify and read the archive, using `name_hint` for formats without a magic number.
    pub fn with_hint(mut reader: R, name_hint: Option<&str>) -> Result<ArchiveReader<R>> {
        let format = try_identify(&mut reader, name_hint).ok_or(Error::UnknownFormat)?;
        Self::with_format(reader, format)
    }

    /// Read the archive at the current position of `reader` as `format`.
    #[instrument(skip(reader), err)]
    pub fn with_format(mut reader: R, format: ArchiveFormat) -> Result<ArchiveReader<R>> {
        let start_offset = reader.stream_position()?;
        let length = reader.seek(SeekFrom::End(0))?.saturating_sub(start_offset);

        let catalog = {
            let mut window = Window::new(&mut reader, start_offset, Some(length))?;
            format
                .codec()
                .read(&mut window, length)
                .map_err(|error| malformed(error, format))?
        };

        if let Some(entry) = catalog.entries.iter().find(|entry| entry.end() > length) {
            return Err(Error::invalid(
                format,
                format!(
                    "entry {} spans {:#x}..{:#x}, past the end of the container at {length:#x}",
                    entry.index(),
                    entry.offset(),
                    entry.end()
                ),
            ));
        }

        let mut names = IndexMap::with_capacity(catalog.entries.len());
        for entry in catalog.entries.iter().filter(|entry| !entry.path().is_empty()) {
            names.entry(entry.path().into()).or_insert(entry.index());
        }

        debug!(
            %format,
            entries = catalog.entries.len(),
            start_offset,
            length,
            "read archive"
        );

        Ok(ArchiveReader {
            reader,
            format,
            start_offset,
            length,
            entries: catalog.entries,
            names,
            textures: catalog.textures,
        })
    }

    /// Search for an entry by path
    pub fn by_name(&mut self, name: &str) -> Result<ArchiveFile<'_, R>> {
        let Some(index) = self.index_for_name(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Get a contained entry by index
    pub fn by_index(&mut self, file_number: usize) -> Result<ArchiveFile<'_, R>> {
        let entry = self
            .entries
            .get(file_number)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(file_number)))?;

        Ok(ArchiveFile {
            entry,
            reader: EntryReader::new(
                &mut self.reader,
                self.start_offset + entry.offset(),
                entry.length(),
                entry.encoding(),
            )?,
        })
    }

    /// Open an entry previously obtained from [`ArchiveReader::entries`]
    pub fn open(&mut self, entry: &Entry) -> Result<ArchiveFile<'_, R>> {
        self.by_index(entry.index())
    }

    /// Copy the decoded content of an entry to `writer`, returning the number of bytes copied
    #[instrument(skip(self, writer), err)]
    pub fn extract_to<W: Write + ?Sized>(&mut self, index: usize, writer: &mut W) -> Result<u64> {
        let mut file = self.by_index(index)?;
        Ok(io::copy(&mut file, writer)?)
    }

    /// Extract an entry into a new file at `path`, creating missing directories
    ///
    /// Fails if the file already exists unless `overwrite` is set.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()), err)]
    pub fn extract_to_path(
        &mut self,
        index: usize,
        path: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<u64> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = if overwrite {
            File::create(path)?
        } else {
            File::create_new(path)?
        };

        let copied = self.extract_to(index, &mut file)?;
        file.flush()?;
        Ok(copied)
    }
}

/// Truncated tables and bad magic numbers make the container invalid, other I/O errors pass through
fn malformed(error: Error, format: ArchiveFormat) -> Error {
    match error {
        Error::IOError(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
            Error::invalid(format, "unexpected end of data")
        }
        Error::BinRWError(binrw::Error::Io(io)) if io.kind() == io::ErrorKind::UnexpectedEof => {
            Error::invalid(format, "unexpected end of data")
        }
        Error::BinRWError(binrw::Error::Io(io)) => Error::IOError(io),
        Error::BinRWError(other) => Error::invalid(format, other.to_string()),
        other => other,
    }
}
