//! TEX texture packages with Shift-JIS names.

use binrw::{BinRead, BinWrite};
use std::io::SeekFrom;

use crate::{
    entry::{Catalog, TextureMetadata},
    error::{Error, Result},
    format::{ArchiveCodec, ArchiveFormat},
    formats::{fixed_name, table_end},
    io::{align, pad_to_block, write_fixed_string, ReadSeek, TextEncoding, WriteSeek},
    write::{field_u32, write_entry, PendingEntry, Progress, WriterOptions},
};

const HEADER_SIZE: u64 = 16;
const ROW_SIZE: u64 = 32;
const NAME_WIDTH: usize = 20;
const BLOCK: u64 = ArchiveFormat::Tex.block_size();

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little, magic = b"TEX0")]
struct TexHeader {
    #[brw(pad_before = 4, pad_after = 4)]
    count: u32,
}

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
struct TexRow {
    name: [u8; NAME_WIDTH],
    offset: u32,
    #[brw(pad_after = 4)]
    length: u32,
}

pub(crate) struct Tex;

impl Tex {
    fn read_rows(source: &mut dyn ReadSeek, length: u64) -> Result<(Vec<TexRow>, u64)> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;

        let header = TexHeader::read(&mut source)?;
        let end = table_end(HEADER_SIZE, header.count.into(), ROW_SIZE)
            .filter(|&end| end <= length)
            .ok_or_else(|| Error::invalid(ArchiveFormat::Tex, "entry table exceeds the container"))?;

        let rows = (0..header.count)
            .map(|_| TexRow::read(&mut source))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        Ok((rows, end))
    }
}

impl ArchiveCodec for Tex {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Tex
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, _name_hint: Option<&str>) -> Result<bool> {
        if length < HEADER_SIZE {
            return Ok(false);
        }

        let (rows, end) = Self::read_rows(source, length)?;
        Ok(rows
            .first()
            .map_or(true, |first| u64::from(first.offset) >= end))
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let (rows, _) = Self::read_rows(source, length)?;

        let mut catalog = Catalog::default();
        for row in rows {
            let name = TextEncoding::ShiftJis.decode(&row.name);
            catalog.push(name, row.offset.into(), row.length.into());
        }
        Ok(catalog)
    }

    fn accept(
        &self,
        name: &str,
        _content: &mut dyn ReadSeek,
        _options: &WriterOptions,
    ) -> Result<Option<TextureMetadata>> {
        fixed_name(ArchiveFormat::Tex, name, NAME_WIDTH, TextEncoding::ShiftJis)?;
        Ok(None)
    }

    fn write(
        &self,
        sink: &mut dyn WriteSeek,
        entries: &mut [PendingEntry<'_>],
        _options: &WriterOptions,
        progress: &mut Progress<'_, '_>,
    ) -> Result<()> {
        let mut sink = sink;
        let count = field_u32(entries.len() as u64, ArchiveFormat::Tex)?;
        TexHeader { count }.write(&mut sink)?;

        let mut offset = align(HEADER_SIZE + ROW_SIZE * entries.len() as u64, BLOCK);
        for entry in entries.iter() {
            let mut row = TexRow {
                offset: field_u32(offset, ArchiveFormat::Tex)?,
                length: field_u32(entry.length(), ArchiveFormat::Tex)?,
                ..Default::default()
            };
            let name = fixed_name(ArchiveFormat::Tex, entry.name(), NAME_WIDTH, TextEncoding::ShiftJis)?;
            write_fixed_string(&mut &mut row.name[..], &name, NAME_WIDTH)?;
            row.write(&mut sink)?;

            offset = align(offset + entry.length(), BLOCK);
        }
        pad_to_block(sink, BLOCK)?;

        for (index, entry) in entries.iter_mut().enumerate() {
            write_entry(sink, entry, index, BLOCK, progress)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::error::Result;
    use crate::format::ArchiveCodec;
    use crate::formats::Tex;

    #[test]
    fn read_shift_jis_names() -> Result<()> {
        let mut data = b"TEX0\0\0\0\0\x01\0\0\0\0\0\0\0".to_vec();
        let mut row = [0u8; 32];
        // "リング.gvr"
        row[..10].copy_from_slice(&[0x83, 0x8A, 0x83, 0x93, 0x83, 0x4F, 0x2E, 0x67, 0x76, 0x72]);
        row[20] = 0x40;
        row[24] = 0x08;
        data.extend_from_slice(&row);
        data.resize(0x48, 0xAB);

        let mut input = Cursor::new(data);
        assert!(Tex.identify(&mut input, 0x48, None));

        let catalog = Tex.read(&mut input, 0x48)?;
        assert_eq!(catalog.entries[0].path(), "リング.gvr");
        assert_eq!(catalog.entries[0].offset(), 0x40);
        assert_eq!(catalog.entries[0].length(), 8);

        Ok(())
    }
}
