//! Types for writing archives
//!

use bon::Builder;
use flate2::Compression;
use std::fmt::{self, Debug};
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::{debug, instrument, trace};

use crate::entry::TextureMetadata;
use crate::error::{Error, RejectionReason, Result};
use crate::format::ArchiveFormat;
use crate::formats::TableFlags;
use crate::io::{pad_to_block, ReadSeek, Window, WriteSeek};

/// Layout of AFS archives, which differ in where the name table pointer lives
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum AfsVersion {
    /// Pointer stored just before the first entry
    V1,
    /// Pointer stored right after the entry table
    #[default]
    V2,
}

/// Options for how an archive should be written
///
/// Each format only looks at the options that apply to it.
#[derive(Debug, Clone, Copy, Builder)]
pub struct WriterOptions {
    /// Placement of the AFS name table pointer
    #[builder(default)]
    pub afs_version: AfsVersion,

    /// Store entry names, for formats where names are optional (AFS, NARC, texture containers)
    #[builder(default = true)]
    pub store_names: bool,

    /// Optional fields stored in texture container tables
    #[builder(default)]
    pub texture_table: TableFlags,

    /// Compression level for formats that compress their entries
    #[builder(default)]
    pub compression: Compression,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Notification sent around the transfer of an entry's content
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntryProgress<'n> {
    /// Number of entries transferred before this one
    pub index: usize,
    /// Number of entries in the archive
    pub total: usize,
    /// Name the entry was added under
    pub name: &'n str,
}

/// Callback receiving [`EntryProgress`] notifications
pub type ProgressCallback<'a> = Box<dyn FnMut(&EntryProgress<'_>) + 'a>;

/// Progress reporting handed to the format writers
pub struct Progress<'p, 'a> {
    total: usize,
    on_writing: &'p mut Option<ProgressCallback<'a>>,
    on_written: &'p mut Option<ProgressCallback<'a>>,
}

impl<'p, 'a> Progress<'p, 'a> {
    pub(crate) fn new(
        total: usize,
        on_writing: &'p mut Option<ProgressCallback<'a>>,
        on_written: &'p mut Option<ProgressCallback<'a>>,
    ) -> Self {
        Self {
            total,
            on_writing,
            on_written,
        }
    }

    pub(crate) fn writing(&mut self, index: usize, name: &str) {
        if let Some(callback) = self.on_writing.as_mut() {
            callback(&EntryProgress {
                index,
                total: self.total,
                name,
            });
        }
    }

    pub(crate) fn written(&mut self, index: usize, name: &str) {
        if let Some(callback) = self.on_written.as_mut() {
            callback(&EntryProgress {
                index,
                total: self.total,
                name,
            });
        }
    }
}

/// Content queued for an archive, read when the archive is finished
pub struct PendingEntry<'a> {
    name: String,
    source: Box<dyn ReadSeek + 'a>,
    length: u64,
    texture: Option<TextureMetadata>,
}

impl Debug for PendingEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEntry")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("texture", &self.texture)
            .finish_non_exhaustive()
    }
}

impl PendingEntry<'_> {
    /// Name the entry was added under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the content in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Texture attributes captured when the entry was accepted
    pub fn texture(&self) -> Option<&TextureMetadata> {
        self.texture.as_ref()
    }

    /// Read the whole content into memory
    pub(crate) fn read_all(&mut self) -> Result<Vec<u8>> {
        self.source.rewind()?;
        let mut buffer = Vec::with_capacity(usize::try_from(self.length).unwrap_or_default());
        self.source.by_ref().take(self.length).read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

/// Copy one entry into `sink`, then zero fill to `block`
///
/// `index` counts the entries written so far, which may differ from the insertion order for
/// hierarchical formats.
pub(crate) fn write_entry(
    sink: &mut dyn WriteSeek,
    entry: &mut PendingEntry<'_>,
    index: usize,
    block: u64,
    progress: &mut Progress<'_, '_>,
) -> Result<()> {
    progress.writing(index, &entry.name);

    entry.source.rewind()?;
    let copied = io::copy(&mut entry.source.by_ref().take(entry.length), sink)?;
    if copied != entry.length {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} shrank from {} to {copied} bytes", entry.name, entry.length),
        )
        .into());
    }
    pad_to_block(sink, block)?;

    progress.written(index, &entry.name);
    trace!(index, name = %entry.name, length = entry.length, "wrote entry");
    Ok(())
}

/// Write content that was transformed in memory, then zero fill to `block`
pub(crate) fn write_encoded(
    sink: &mut dyn WriteSeek,
    name: &str,
    data: &[u8],
    index: usize,
    block: u64,
    progress: &mut Progress<'_, '_>,
) -> Result<()> {
    progress.writing(index, name);
    sink.write_all(data)?;
    pad_to_block(sink, block)?;
    progress.written(index, name);
    Ok(())
}

/// Checked conversion of an offset or length into a 32 bit table field
pub(crate) fn field_u32(value: u64, format: ArchiveFormat) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::ArchiveTooLarge(format))
}

/// Archive generator
///
/// Entries are queued with [`ArchiveWriter::add`], which runs the format's acceptance checks
/// right away. Nothing is written until [`ArchiveWriter::finish`], which lays the container out
/// starting at the current position of the inner writer.
///
/// ```
/// # fn doit() -> gamepak_archive::error::Result<()>
/// # {
/// use std::io::Cursor;
/// use gamepak_archive::{ArchiveFormat, ArchiveReader, ArchiveWriter, WriterOptions};
///
/// let mut afs = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::Afs, WriterOptions::default());
/// afs.add_bytes("hello_world.txt", b"Hello, World!".to_vec())?;
///
/// let mut buf = afs.finish()?;
/// buf.set_position(0);
///
/// let mut reader = ArchiveReader::with_format(buf, ArchiveFormat::Afs)?;
/// assert_eq!(reader.by_index(0)?.name(), "hello_world.txt");
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct ArchiveWriter<'a, W: Write + Seek> {
    inner: W,
    format: ArchiveFormat,
    options: WriterOptions,
    entries: Vec<PendingEntry<'a>>,
    on_writing: Option<ProgressCallback<'a>>,
    on_written: Option<ProgressCallback<'a>>,
}

impl<'a, W: Write + Seek> ArchiveWriter<'a, W> {
    /// Initializes the archive.
    pub fn new(inner: W, format: ArchiveFormat, options: WriterOptions) -> ArchiveWriter<'a, W> {
        ArchiveWriter {
            inner,
            format,
            options,
            entries: Vec::new(),
            on_writing: None,
            on_written: None,
        }
    }

    /// Format being written
    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Number of entries accepted so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were accepted yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a callback invoked before each entry's content is transferred
    pub fn on_entry_writing(&mut self, callback: impl FnMut(&EntryProgress<'_>) + 'a) {
        self.on_writing = Some(Box::new(callback));
    }

    /// Register a callback invoked after each entry's content is transferred
    pub fn on_entry_written(&mut self, callback: impl FnMut(&EntryProgress<'_>) + 'a) {
        self.on_written = Some(Box::new(callback));
    }

    /// Queue `source` under `name`.
    ///
    /// The source is read from its start, and only when the archive is finished. Content the
    /// format cannot hold is refused with [`Error::Rejected`], which leaves the archive as if
    /// the call never happened.
    #[instrument(skip(self, name, source), fields(format = %self.format), err(level = "debug"))]
    pub fn add(&mut self, name: impl Into<String>, source: impl Read + Seek + 'a) -> Result<()> {
        let name = name.into();
        let mut source: Box<dyn ReadSeek + 'a> = Box::new(source);

        let length = source.seek(SeekFrom::End(0))?;
        if length > u64::from(u32::MAX) {
            return Err(Error::rejected(
                name,
                self.format,
                RejectionReason::TooLarge(length),
            ));
        }

        source.rewind()?;
        let texture = self
            .format
            .codec()
            .accept(&name, &mut *source, &self.options)?;
        source.rewind()?;

        debug!(name = %name, length, "accepted entry");
        self.entries.push(PendingEntry {
            name,
            source,
            length,
            texture,
        });

        Ok(())
    }

    /// Queue an in-memory buffer under `name`
    pub fn add_bytes(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<()> {
        self.add(name, io::Cursor::new(data.into()))
    }

    /// Write the container and return the inner writer
    ///
    /// The inner writer is left at the end of the container.
    #[instrument(skip(self), fields(format = %self.format, entries = self.entries.len()), err)]
    pub fn finish(self) -> Result<W> {
        let ArchiveWriter {
            mut inner,
            format,
            options,
            mut entries,
            mut on_writing,
            mut on_written,
        } = self;

        {
            let mut sink = Window::at_current(&mut inner, None)?;
            let mut progress = Progress::new(entries.len(), &mut on_writing, &mut on_written);

            format
                .codec()
                .write(&mut sink, &mut entries, &options, &mut progress)?;

            sink.flush()?;
        }

        Ok(inner)
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::error::Result;
    use crate::format::ArchiveFormat;
    use crate::write::{ArchiveWriter, WriterOptions};

    #[traced_test]
    #[test]
    fn progress_brackets_every_entry() -> Result<()> {
        let events = RefCell::new(Vec::new());

        let mut writer = ArchiveWriter::new(
            Cursor::new(Vec::new()),
            ArchiveFormat::Mrg,
            WriterOptions::default(),
        );
        writer.on_entry_writing(|p| events.borrow_mut().push(format!("> {} {}/{}", p.name, p.index, p.total)));
        writer.on_entry_written(|p| events.borrow_mut().push(format!("< {} {}/{}", p.name, p.index, p.total)));

        writer.add_bytes("a.bin", vec![1; 3])?;
        writer.add_bytes("b.bin", vec![2; 5])?;
        writer.finish()?;

        assert_eq!(
            events.into_inner(),
            vec!["> a.bin 0/2", "< a.bin 0/2", "> b.bin 1/2", "< b.bin 1/2"]
        );

        Ok(())
    }

    #[test]
    fn finish_starts_at_current_position() -> Result<()> {
        let mut inner = Cursor::new(vec![0xAA; 5]);
        inner.set_position(5);

        let mut writer = ArchiveWriter::new(inner, ArchiveFormat::Acx, WriterOptions::default());
        writer.add_bytes("", vec![0x11; 2])?;
        let out = writer.finish()?.into_inner();

        #[rustfmt::skip]
        let expected = vec![
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x10,
            0x00, 0x00, 0x00, 0x02,
            0x11, 0x11, 0x00, 0x00,
        ];

        assert_eq!(format!("{:02X?}", out), format!("{:02X?}", expected));

        Ok(())
    }

    #[test]
    fn options_defaults() {
        let options = WriterOptions::default();
        assert!(options.store_names);
        assert_eq!(options.afs_version, crate::write::AfsVersion::V2);
    }
}
