//! SPK sound packages.
//!
//! Rows only store lengths, entry offsets follow from packing the entries one after the other.
//! The header repeats the total size, which has to agree with that packing.

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
const BLOCK: u64 = ArchiveFormat::Spk.block_size();

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little, magic = b"SND0")]
struct SpkHeader {
    total_length: u32,
    #[brw(pad_after = 4)]
    count: u32,
}

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
struct SpkRow {
    name: [u8; NAME_WIDTH],
    #[brw(pad_after = 8)]
    length: u32,
}

pub(crate) struct Spk;

impl Spk {
    fn read_header(source: &mut dyn ReadSeek, length: u64) -> Result<(SpkHeader, u64)> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;

        let header = SpkHeader::read(&mut source)?;
        let end = table_end(HEADER_SIZE, header.count.into(), ROW_SIZE)
            .filter(|&end| end <= length)
            .ok_or_else(|| Error::invalid(ArchiveFormat::Spk, "entry table exceeds the container"))?;

        Ok((header, end))
    }
}

impl ArchiveCodec for Spk {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Spk
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, _name_hint: Option<&str>) -> Result<bool> {
        if length < HEADER_SIZE {
            return Ok(false);
        }

        let (header, end) = Self::read_header(source, length)?;
        let total = u64::from(header.total_length);
        Ok(total >= align(end, BLOCK) && total <= length)
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let mut source = source;
        let (header, end) = Self::read_header(source, length)?;

        let mut catalog = Catalog::default();
        let mut offset = align(end, BLOCK);
        for _ in 0..header.count {
            let row = SpkRow::read(&mut source)?;
            let name = TextEncoding::Utf8.decode(&row.name);
            catalog.push(name, offset, row.length.into());
            offset = align(offset + u64::from(row.length), BLOCK);
        }

        if offset != u64::from(header.total_length) {
            return Err(Error::invalid(
                ArchiveFormat::Spk,
                format!(
                    "entries end at {offset:#x} but the header declares {:#x}",
                    header.total_length
                ),
            ));
        }

        Ok(catalog)
    }

    fn accept(
        &self,
        name: &str,
        _content: &mut dyn ReadSeek,
        _options: &WriterOptions,
    ) -> Result<Option<TextureMetadata>> {
        fixed_name(ArchiveFormat::Spk, name, NAME_WIDTH, TextEncoding::Utf8)?;
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
        let data_start = align(HEADER_SIZE + ROW_SIZE * entries.len() as u64, BLOCK);
        let total_length = entries
            .iter()
            .fold(data_start, |offset, entry| align(offset + entry.length(), BLOCK));

        SpkHeader {
            total_length: field_u32(total_length, ArchiveFormat::Spk)?,
            count: field_u32(entries.len() as u64, ArchiveFormat::Spk)?,
        }
        .write(&mut sink)?;

        for entry in entries.iter() {
            let mut row = SpkRow {
                length: field_u32(entry.length(), ArchiveFormat::Spk)?,
                ..Default::default()
            };
            write_fixed_string(&mut &mut row.name[..], entry.name().as_bytes(), NAME_WIDTH)?;
            row.write(&mut sink)?;
        }
        pad_to_block(sink, BLOCK)?;

        for (index, entry) in entries.iter_mut().enumerate() {
            write_entry(sink, entry, index, BLOCK, progress)?;
        }

        Ok(())
    }
}
