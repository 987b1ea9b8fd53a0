//! Ninja texture lists (GNT and SNT).
//!
//! Both variants share one layout. Chunk headers are little endian everywhere, while the fields
//! inside the list chunk follow the byte order of the target console. A pointer fixup list
//! (`NOF0`) and an end marker (`NEND`) trail the entry data.

use binrw::{BinRead, BinWrite, Endian};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::SeekFrom;

use crate::{
    entry::Catalog,
    error::{Error, Result},
    format::{ArchiveCodec, ArchiveFormat},
    formats::table_end,
    io::{align, pad_to_block, write_zeros, ReadSeek, WriteSeek},
    write::{field_u32, write_entry, PendingEntry, Progress, WriterOptions},
};

const INFO_SIZE: u64 = 0x20;
const LIST_OFFSET: u64 = INFO_SIZE;
/// Offset of the entry table, relative to the list chunk
const TABLE_OFFSET: u64 = 0x10;
const ROW_SIZE: u64 = 8;
const NOF0: [u8; 4] = *b"NOF0";
const NEND: [u8; 4] = *b"NEND";

/// File header, pointing at the list chunk and the fixup list
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
struct InfoChunk {
    magic: [u8; 4],
    length: u32,
    chunk_count: u32,
    list_offset: u32,
    list_length: u32,
    fixup_offset: u32,
    fixup_length: u32,
    reserved: u32,
}

/// One of the two texture list variants
pub(crate) struct NinjaTextureList {
    format: ArchiveFormat,
    info_magic: [u8; 4],
    list_magic: [u8; 4],
    endian: Endian,
}

pub(crate) const GNT: NinjaTextureList = NinjaTextureList {
    format: ArchiveFormat::Gnt,
    info_magic: *b"NGIF",
    list_magic: *b"NGTL",
    endian: Endian::Big,
};

pub(crate) const SNT: NinjaTextureList = NinjaTextureList {
    format: ArchiveFormat::Snt,
    info_magic: *b"NUIF",
    list_magic: *b"NUTL",
    endian: Endian::Little,
};

impl NinjaTextureList {
    fn block(&self) -> u64 {
        self.format.block_size()
    }

    /// Read the list chunk header, returning the entry count and the absolute table offset
    fn read_list_header(&self, source: &mut dyn ReadSeek, length: u64) -> Result<(u32, u64)> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;

        let info = InfoChunk::read(&mut source)?;
        if info.magic != self.info_magic {
            return Err(Error::invalid(self.format, "missing info chunk"));
        }
        if u64::from(info.list_offset) != LIST_OFFSET {
            return Err(Error::invalid(
                self.format,
                format!("list chunk at {:#x} instead of {LIST_OFFSET:#x}", info.list_offset),
            ));
        }

        source.seek(SeekFrom::Start(LIST_OFFSET))?;
        let mut magic = [0u8; 4];
        source.read_exact(&mut magic)?;
        if magic != self.list_magic {
            return Err(Error::invalid(self.format, "missing texture list chunk"));
        }
        let _payload_length = source.read_u32::<LE>()?;

        let table_offset = LIST_OFFSET + u64::from(u32::read_options(&mut source, self.endian, ())?);
        let count = u32::read_options(&mut source, self.endian, ())?;

        if !table_end(table_offset, count.into(), ROW_SIZE).is_some_and(|end| end <= length) {
            return Err(Error::invalid(self.format, "entry table exceeds the container"));
        }

        Ok((count, table_offset))
    }
}

impl ArchiveCodec for NinjaTextureList {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, _name_hint: Option<&str>) -> Result<bool> {
        if length < LIST_OFFSET + TABLE_OFFSET {
            return Ok(false);
        }

        self.read_list_header(source, length)?;
        Ok(true)
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let mut source = source;
        let (count, table_offset) = self.read_list_header(source, length)?;

        source.seek(SeekFrom::Start(table_offset))?;
        let mut catalog = Catalog::default();
        for _ in 0..count {
            let entry_length = u32::read_options(&mut source, self.endian, ())?;
            let offset = u32::read_options(&mut source, self.endian, ())?;
            catalog.push("", LIST_OFFSET + u64::from(offset), entry_length.into());
        }

        Ok(catalog)
    }

    fn write(
        &self,
        sink: &mut dyn WriteSeek,
        entries: &mut [PendingEntry<'_>],
        _options: &WriterOptions,
        progress: &mut Progress<'_, '_>,
    ) -> Result<()> {
        let mut sink = sink;
        let count = field_u32(entries.len() as u64, self.format)?;
        let table_offset = LIST_OFFSET + TABLE_OFFSET;
        let data_start = align(table_offset + ROW_SIZE * entries.len() as u64, self.block());
        let data_end = entries
            .iter()
            .fold(data_start, |offset, entry| align(offset + entry.length(), self.block()));

        // The table offset and every entry offset need relocating
        let fixups: Vec<u32> = std::iter::once(0x08)
            .chain((0..count).map(|i| (TABLE_OFFSET + ROW_SIZE * u64::from(i) + 4) as u32))
            .collect();
        let fixup_length = align(8 + 4 * fixups.len() as u64, self.block());

        InfoChunk {
            magic: self.info_magic,
            length: (INFO_SIZE - 8) as u32,
            chunk_count: 1,
            list_offset: LIST_OFFSET as u32,
            list_length: field_u32(data_end - LIST_OFFSET, self.format)?,
            fixup_offset: field_u32(data_end, self.format)?,
            fixup_length: field_u32(8 + fixup_length, self.format)?,
            reserved: 1,
        }
        .write(&mut sink)?;

        sink.write_all(&self.list_magic)?;
        sink.write_u32::<LE>(field_u32(data_end - LIST_OFFSET - 8, self.format)?)?;
        (TABLE_OFFSET as u32).write_options(&mut sink, self.endian, ())?;
        count.write_options(&mut sink, self.endian, ())?;

        let mut offset = data_start;
        for entry in entries.iter() {
            field_u32(entry.length(), self.format)?.write_options(&mut sink, self.endian, ())?;
            field_u32(offset - LIST_OFFSET, self.format)?.write_options(&mut sink, self.endian, ())?;
            offset = align(offset + entry.length(), self.block());
        }
        pad_to_block(sink, self.block())?;

        for (index, entry) in entries.iter_mut().enumerate() {
            write_entry(sink, entry, index, self.block(), progress)?;
        }

        sink.write_all(&NOF0)?;
        sink.write_u32::<LE>(fixup_length as u32)?;
        (fixups.len() as u32).write_options(&mut sink, self.endian, ())?;
        0u32.write_options(&mut sink, self.endian, ())?;
        for fixup in &fixups {
            fixup.write_options(&mut sink, self.endian, ())?;
        }
        pad_to_block(sink, self.block())?;

        sink.write_all(&NEND)?;
        sink.write_u32::<LE>(8)?;
        write_zeros(sink, 8)?;

        Ok(())
    }
}
