//! Texture containers (PVM, SVM, GVM and XVM).
//!
//! The table only stores a number per entry plus the optional fields selected by the header
//! flags, entry lengths come from the headers of the textures themselves. PVM and SVM share the
//! `PVMH` magic and are told apart by the codec of their first texture.

use binrw::{BinRead, BinWrite, Endian};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use gamepak_texture::{TextureHeader, TextureKind};
use std::io::SeekFrom;
use tracing::{trace, warn};

use crate::{
    entry::{Catalog, TextureMetadata},
    error::{Error, RejectionReason, Result},
    format::{ArchiveCodec, ArchiveFormat},
    formats::fixed_name,
    io::{align, pad_to_block, read_fixed_string, write_fixed_string, ReadSeek, TextEncoding, WriteSeek},
    write::{field_u32, write_entry, PendingEntry, Progress, WriterOptions},
};

const HEADER_SIZE: u64 = 12;
const NAME_WIDTH: usize = 28;
/// Some tools pad the last texture past the end of the file by exactly this much
const TRAILING_OVERRUN: u64 = 16;

/// Optional fields present in each row of a texture container table
///
/// ```
/// use gamepak_archive::TableFlags;
///
/// let flags = TableFlags::ALL.without(TableFlags::NAMES);
/// assert!(flags.has(TableFlags::GLOBAL_INDEX));
/// assert!(!flags.has(TableFlags::NAMES));
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TableFlags(u16);

impl TableFlags {
    /// Global index, `u32`
    pub const GLOBAL_INDEX: u16 = 0x1;
    /// Packed dimensions, `u16`
    pub const DIMENSIONS: u16 = 0x2;
    /// Pixel and data format, one byte each
    pub const FORMATS: u16 = 0x4;
    /// Name, 28 bytes
    pub const NAMES: u16 = 0x8;

    /// Every optional field
    pub const ALL: TableFlags = TableFlags(0xF);

    /// Wrap raw header flags
    pub const fn new(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw header flags
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether `flag` is set
    pub const fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    /// These flags with `flag` cleared
    pub const fn without(self, flag: u16) -> Self {
        Self(self.0 & !flag)
    }

    /// Size of one table row
    fn row_size(self) -> u64 {
        let mut size = 2;
        if self.has(Self::NAMES) {
            size += NAME_WIDTH as u64;
        }
        if self.has(Self::FORMATS) {
            size += 2;
        }
        if self.has(Self::DIMENSIONS) {
            size += 2;
        }
        if self.has(Self::GLOBAL_INDEX) {
            size += 4;
        }
        size
    }
}

impl Default for TableFlags {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct TableRow {
    name: String,
    metadata: TextureMetadata,
}

/// One member of the texture container family
pub(crate) struct TextureContainer {
    format: ArchiveFormat,
    magic: [u8; 4],
    kind: TextureKind,
    endian: Endian,
}

pub(crate) const PVM: TextureContainer = TextureContainer {
    format: ArchiveFormat::Pvm,
    magic: *b"PVMH",
    kind: TextureKind::Pvr,
    endian: Endian::Little,
};

pub(crate) const SVM: TextureContainer = TextureContainer {
    format: ArchiveFormat::Svm,
    magic: *b"PVMH",
    kind: TextureKind::Svr,
    endian: Endian::Little,
};

pub(crate) const GVM: TextureContainer = TextureContainer {
    format: ArchiveFormat::Gvm,
    magic: *b"GVMH",
    kind: TextureKind::Gvr,
    endian: Endian::Big,
};

pub(crate) const XVM: TextureContainer = TextureContainer {
    format: ArchiveFormat::Xvm,
    magic: *b"XVMH",
    kind: TextureKind::Xvr,
    endian: Endian::Little,
};

/// Parsed container header
struct Layout {
    flags: TableFlags,
    count: u16,
    data_start: u64,
}

impl TextureContainer {
    fn block(&self) -> u64 {
        self.format.block_size()
    }

    fn read_layout(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Layout> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        source.read_exact(&mut magic)?;
        if magic != self.magic {
            return Err(Error::invalid(self.format, "missing container header"));
        }

        let header_length = source.read_u32::<LE>()?;
        let flags = TableFlags::new(u16::read_options(&mut source, self.endian, ())?);
        let count = u16::read_options(&mut source, self.endian, ())?;

        let data_start = 8 + u64::from(header_length);
        let table_end = HEADER_SIZE + flags.row_size() * u64::from(count);
        if table_end > data_start || data_start > length {
            return Err(Error::invalid(
                self.format,
                format!("entry table ends at {table_end:#x}, past the data at {data_start:#x}"),
            ));
        }

        Ok(Layout {
            flags,
            count,
            data_start,
        })
    }

    fn read_row(&self, source: &mut dyn ReadSeek, flags: TableFlags) -> Result<TableRow> {
        let mut source = source;
        let mut row = TableRow::default();

        let _number = u16::read_options(&mut source, self.endian, ())?;
        if flags.has(TableFlags::NAMES) {
            row.name = read_fixed_string(source, NAME_WIDTH, TextEncoding::Utf8)?;
        }
        if flags.has(TableFlags::FORMATS) {
            row.metadata.pixel_format = Some(source.read_u8()?);
            row.metadata.data_format = Some(source.read_u8()?);
        }
        if flags.has(TableFlags::DIMENSIONS) {
            let dimensions = u16::read_options(&mut source, self.endian, ())?;
            row.metadata.dimensions = Some((dimensions & 0xFF) as u8);
        }
        if flags.has(TableFlags::GLOBAL_INDEX) {
            row.metadata.global_index = Some(u32::read_options(&mut source, self.endian, ())?);
        }

        Ok(row)
    }

    fn write_row(
        &self,
        sink: &mut dyn WriteSeek,
        flags: TableFlags,
        number: u16,
        entry: &PendingEntry<'_>,
    ) -> Result<()> {
        let mut sink = sink;
        let metadata = entry.texture().copied().unwrap_or_default();

        number.write_options(&mut sink, self.endian, ())?;
        if flags.has(TableFlags::NAMES) {
            let name = fixed_name(self.format, entry.name(), NAME_WIDTH, TextEncoding::Utf8)?;
            write_fixed_string(sink, &name, NAME_WIDTH)?;
        }
        if flags.has(TableFlags::FORMATS) {
            sink.write_u8(metadata.pixel_format.unwrap_or_default())?;
            sink.write_u8(metadata.data_format.unwrap_or_default())?;
        }
        if flags.has(TableFlags::DIMENSIONS) {
            u16::from(metadata.dimensions.unwrap_or_default()).write_options(&mut sink, self.endian, ())?;
        }
        if flags.has(TableFlags::GLOBAL_INDEX) {
            metadata
                .global_index
                .unwrap_or_default()
                .write_options(&mut sink, self.endian, ())?;
        }

        Ok(())
    }
}

impl ArchiveCodec for TextureContainer {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, _name_hint: Option<&str>) -> Result<bool> {
        if length < HEADER_SIZE {
            return Ok(false);
        }

        let layout = self.read_layout(source, length)?;
        if layout.count == 0 {
            // Nothing tells an empty SVM apart from an empty PVM
            return Ok(self.kind != TextureKind::Svr);
        }

        source.seek(SeekFrom::Start(layout.data_start))?;
        Ok(TextureHeader::identify(&mut &mut *source, self.kind))
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let layout = self.read_layout(source, length)?;

        source.seek(SeekFrom::Start(HEADER_SIZE))?;
        let rows = (0..layout.count)
            .map(|_| self.read_row(source, layout.flags))
            .collect::<Result<Vec<_>>>()?;

        let mut catalog = Catalog::default();
        let mut offset = layout.data_start;
        let last = rows.len().saturating_sub(1);

        for (index, row) in rows.into_iter().enumerate() {
            source.seek(SeekFrom::Start(offset))?;
            let header = TextureHeader::read(&mut &mut *source).map_err(|error| {
                Error::invalid(self.format, format!("texture {index} at {offset:#x}: {error}"))
            })?;
            if header.kind != self.kind {
                return Err(Error::invalid(
                    self.format,
                    format!("texture {index} is a {} texture, expected {}", header.kind, self.kind),
                ));
            }

            let mut entry_length = header.length;
            if offset + entry_length > length && index == last {
                warn!(
                    format = %self.format,
                    index,
                    declared = entry_length,
                    available = length.saturating_sub(offset),
                    "last texture overruns the container, trimming {TRAILING_OVERRUN} bytes"
                );
                entry_length = entry_length.saturating_sub(TRAILING_OVERRUN);
            }
            if offset + entry_length > length {
                return Err(Error::invalid(
                    self.format,
                    format!(
                        "texture {index} at {offset:#x} declares {entry_length:#x} bytes, only {:#x} remain",
                        length.saturating_sub(offset)
                    ),
                ));
            }

            trace!(index, offset, entry_length, metadata = ?row.metadata, "texture entry");
            let entry = catalog.push(row.name, offset, entry_length);
            catalog.textures.insert(entry, row.metadata);

            offset = align(offset + entry_length, self.block());
        }

        Ok(catalog)
    }

    fn accept(
        &self,
        name: &str,
        content: &mut dyn ReadSeek,
        options: &WriterOptions,
    ) -> Result<Option<TextureMetadata>> {
        let not_a_texture = || {
            Error::rejected(
                name,
                self.format,
                RejectionReason::NotATexture {
                    expected: self.kind,
                },
            )
        };

        let header = TextureHeader::read(&mut &mut *content).map_err(|_| not_a_texture())?;
        if header.kind != self.kind {
            return Err(not_a_texture());
        }

        // Readers step to the next texture by the declared length
        let actual = content.seek(SeekFrom::End(0))?;
        if header.length != actual {
            return Err(Error::rejected(
                name,
                self.format,
                RejectionReason::LengthMismatch {
                    declared: header.length,
                    actual,
                },
            ));
        }

        if options.store_names && options.texture_table.has(TableFlags::NAMES) {
            fixed_name(self.format, name, NAME_WIDTH, TextEncoding::Utf8)?;
        }

        Ok(Some(TextureMetadata::from_header(&header)))
    }

    fn write(
        &self,
        sink: &mut dyn WriteSeek,
        entries: &mut [PendingEntry<'_>],
        options: &WriterOptions,
        progress: &mut Progress<'_, '_>,
    ) -> Result<()> {
        let count = u16::try_from(entries.len()).map_err(|_| Error::ArchiveTooLarge(self.format))?;
        let flags = if options.store_names {
            options.texture_table
        } else {
            options.texture_table.without(TableFlags::NAMES)
        };

        let data_start = align(HEADER_SIZE + flags.row_size() * u64::from(count), self.block());

        {
            let mut sink = &mut *sink;
            sink.write_all(&self.magic)?;
            sink.write_u32::<LE>(field_u32(data_start - 8, self.format)?)?;
            flags.bits().write_options(&mut sink, self.endian, ())?;
            count.write_options(&mut sink, self.endian, ())?;
        }

        for (number, entry) in (0..count).zip(entries.iter()) {
            self.write_row(sink, flags, number, entry)?;
        }
        pad_to_block(sink, self.block())?;

        for (index, entry) in entries.iter_mut().enumerate() {
            write_entry(sink, entry, index, self.block(), progress)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use gamepak_texture::{TextureHeader, TextureKind};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::error::{Error, Result};
    use crate::format::{ArchiveCodec, ArchiveFormat};
    use crate::formats::{TableFlags, GVM, PVM, SVM};
    use crate::write::{ArchiveWriter, WriterOptions};

    fn texture(kind: TextureKind, data_format: u8, global_index: u32) -> Vec<u8> {
        TextureHeader::new(kind, 0x01, data_format, 32, 32)
            .with_global_index(global_index)
            .encode(&[0x77; 32])
            .unwrap_or_default()
    }

    #[test]
    fn table_row_sizes() {
        assert_eq!(TableFlags::ALL.row_size(), 38);
        assert_eq!(TableFlags::new(0).row_size(), 2);
        assert_eq!(TableFlags::ALL.without(TableFlags::NAMES).row_size(), 10);
    }

    #[test]
    fn gvm_header_is_big_endian() -> Result<()> {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::Gvm, WriterOptions::default());
        writer.add_bytes("ring", texture(TextureKind::Gvr, 0x0E, 1000))?;
        let data = writer.finish()?.into_inner();

        #[rustfmt::skip]
        let expected = vec![
            0x47, 0x56, 0x4D, 0x48,
            0x38, 0x00, 0x00, 0x00,
            0x00, 0x0F, 0x00, 0x01,
            0x00, 0x00,
        ];
        assert_eq!(format!("{:02X?}", &data[..14]), format!("{:02X?}", expected));

        let length = data.len() as u64;
        let mut input = Cursor::new(data);
        assert!(GVM.identify(&mut input, length, None));

        let catalog = GVM.read(&mut input, length)?;
        assert_eq!(catalog.entries[0].path(), "ring");
        assert_eq!(catalog.entries[0].offset(), 0x40);
        assert_eq!(catalog.textures[&0].global_index, Some(1000));
        assert_eq!(catalog.textures[&0].width(), Some(32));

        Ok(())
    }

    #[test]
    fn pvm_and_svm_share_a_magic() -> Result<()> {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::Svm, WriterOptions::default());
        writer.add_bytes("ps2.svr", texture(TextureKind::Svr, 0x62, 7))?;
        let data = writer.finish()?.into_inner();

        let length = data.len() as u64;
        let mut input = Cursor::new(data);
        assert!(SVM.identify(&mut input, length, None));
        assert!(!PVM.identify(&mut input, length, None));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn foreign_textures_are_rejected() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::Pvm, WriterOptions::default());

        let result = writer.add_bytes("gc.gvr", texture(TextureKind::Gvr, 0x0E, 1));
        assert!(matches!(result, Err(Error::Rejected(_))));

        let result = writer.add_bytes("notes.txt", b"not a texture".to_vec());
        assert!(result.is_err_and(|e| e.is_rejected()));

        assert!(writer.is_empty());
    }
}
