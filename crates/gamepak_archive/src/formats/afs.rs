//! CRI AFS archives.
//!
//! Entry data is aligned to 2048 byte sectors. Names live in an optional metadata table after
//! the last entry, located through a pointer that moved between the two revisions of the format.

use binrw::{BinRead, BinWrite};
use std::io::SeekFrom;
use tracing::{debug, trace};

use crate::{
    entry::{Catalog, TextureMetadata},
    error::{Error, Result},
    format::{ArchiveCodec, ArchiveFormat},
    formats::{fixed_name, table_end, Span},
    io::{align, pad_to_block, write_fixed_string, write_zeros, ReadSeek, TextEncoding, WriteSeek},
    write::{field_u32, write_entry, AfsVersion, PendingEntry, Progress, WriterOptions},
};

const HEADER_SIZE: u64 = 8;
const ROW_SIZE: u64 = 8;
const METADATA_ROW_SIZE: u64 = 48;
const NAME_WIDTH: usize = 32;
const BLOCK: u64 = ArchiveFormat::Afs.block_size();

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little, magic = b"AFS\0")]
struct AfsHeader {
    count: u32,
}

/// Name table row, the timestamp is left zeroed when writing
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
struct MetadataRow {
    name: [u8; NAME_WIDTH],
    year: u16,
    month: u16,
    day: u16,
    hour: u16,
    minute: u16,
    second: u16,
    length: u32,
}

pub(crate) struct Afs;

impl Afs {
    /// Find a plausible metadata pointer, trying the V2 location before the V1 one
    fn metadata_pointer(
        source: &mut dyn ReadSeek,
        spans: &[Span],
        table_end: u64,
        length: u64,
    ) -> Result<Option<Span>> {
        let mut source = source;
        let expected = METADATA_ROW_SIZE * spans.len() as u64;
        let first_offset = spans.first().map(|span| u64::from(span.offset));

        let mut candidates = vec![table_end];
        if let Some(first) = first_offset.filter(|&first| first >= table_end + ROW_SIZE) {
            candidates.push(first - ROW_SIZE);
        }

        for location in candidates {
            if location + ROW_SIZE > length {
                continue;
            }
            source.seek(SeekFrom::Start(location))?;
            let pointer = Span::read_le(&mut source)?;
            if pointer.offset != 0 && u64::from(pointer.length) >= expected && pointer.end() <= length {
                trace!(location, ?pointer, "found name table pointer");
                return Ok(Some(pointer));
            }
        }

        Ok(None)
    }

    fn read_table(source: &mut dyn ReadSeek, length: u64) -> Result<(Vec<Span>, u64)> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;

        let header = AfsHeader::read(&mut source)?;
        let end = table_end(HEADER_SIZE, header.count.into(), ROW_SIZE)
            .filter(|&end| end <= length)
            .ok_or_else(|| Error::invalid(ArchiveFormat::Afs, "entry table exceeds the container"))?;

        let spans = (0..header.count)
            .map(|_| Span::read_le(&mut source))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        Ok((spans, end))
    }
}

impl ArchiveCodec for Afs {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Afs
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, _name_hint: Option<&str>) -> Result<bool> {
        if length < HEADER_SIZE {
            return Ok(false);
        }

        let (spans, end) = Self::read_table(source, length)?;
        Ok(spans
            .first()
            .map_or(true, |first| u64::from(first.offset) >= end && first.end() <= length))
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let mut source = source;
        let (spans, end) = Self::read_table(source, length)?;

        let mut names = vec![String::new(); spans.len()];
        match Self::metadata_pointer(source, &spans, end, length)? {
            Some(pointer) => {
                source.seek(SeekFrom::Start(pointer.offset.into()))?;
                for name in names.iter_mut() {
                    let row = MetadataRow::read(&mut source)?;
                    *name = TextEncoding::Utf8.decode(&row.name);
                }
            }
            None => debug!("archive has no name table"),
        }

        let mut catalog = Catalog::default();
        for (span, name) in spans.iter().zip(names) {
            catalog.push(name, span.offset.into(), span.length.into());
        }
        Ok(catalog)
    }

    fn accept(
        &self,
        name: &str,
        _content: &mut dyn ReadSeek,
        options: &WriterOptions,
    ) -> Result<Option<TextureMetadata>> {
        if options.store_names {
            fixed_name(ArchiveFormat::Afs, name, NAME_WIDTH, TextEncoding::Utf8)?;
        }
        Ok(None)
    }

    fn write(
        &self,
        sink: &mut dyn WriteSeek,
        entries: &mut [PendingEntry<'_>],
        options: &WriterOptions,
        progress: &mut Progress<'_, '_>,
    ) -> Result<()> {
        let mut sink = sink;
        let count = field_u32(entries.len() as u64, ArchiveFormat::Afs)?;
        let table_end = HEADER_SIZE + ROW_SIZE * entries.len() as u64;
        let data_start = align(table_end + ROW_SIZE, BLOCK);

        AfsHeader { count }.write(&mut sink)?;

        let mut offset = data_start;
        for entry in entries.iter() {
            Span {
                offset: field_u32(offset, ArchiveFormat::Afs)?,
                length: field_u32(entry.length(), ArchiveFormat::Afs)?,
            }
            .write_le(&mut sink)?;
            offset = align(offset + entry.length(), BLOCK);
        }

        let pointer = if options.store_names {
            Span {
                offset: field_u32(offset, ArchiveFormat::Afs)?,
                length: field_u32(METADATA_ROW_SIZE * entries.len() as u64, ArchiveFormat::Afs)?,
            }
        } else {
            Span::default()
        };

        match options.afs_version {
            AfsVersion::V1 => write_zeros(sink, data_start - ROW_SIZE - table_end)?,
            AfsVersion::V2 => {}
        }
        pointer.write_le(&mut sink)?;
        pad_to_block(sink, BLOCK)?;

        for (index, entry) in entries.iter_mut().enumerate() {
            write_entry(sink, entry, index, BLOCK, progress)?;
        }

        if options.store_names {
            for entry in entries.iter() {
                let mut name = [0u8; NAME_WIDTH];
                write_fixed_string(&mut &mut name[..], entry.name().as_bytes(), NAME_WIDTH)?;
                MetadataRow {
                    name,
                    length: field_u32(entry.length(), ArchiveFormat::Afs)?,
                    ..Default::default()
                }
                .write(&mut sink)?;
            }
            pad_to_block(sink, BLOCK)?;
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
    use crate::formats::Afs;

    #[rustfmt::skip]
    fn afs_v1_image() -> Vec<u8> {
        let mut data = vec![0u8; 0x1000];
        data[..0x10].copy_from_slice(&[
            0x41, 0x46, 0x53, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x08, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
        ]);
        // V1 keeps the name table pointer right before the first entry
        data[0x7F8..0x800].copy_from_slice(&[
            0x00, 0x0C, 0x00, 0x00,
            0x30, 0x00, 0x00, 0x00,
        ]);
        data[0x800..0x804].copy_from_slice(b"RIFF");
        data[0xC00..0xC0A].copy_from_slice(b"voice1.adx");
        data
    }

    #[test]
    fn read_v1_names() -> Result<()> {
        let mut input = Cursor::new(afs_v1_image());

        assert!(Afs.identify(&mut input, 0x1000, None));

        let catalog = Afs.read(&mut input, 0x1000)?;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries[0].path(), "voice1.adx");
        assert_eq!(catalog.entries[0].offset(), 0x800);
        assert_eq!(catalog.entries[0].length(), 4);

        Ok(())
    }

    #[test]
    fn read_without_names() -> Result<()> {
        let mut data = afs_v1_image();
        data[0x7F8..0x800].fill(0);

        let catalog = Afs.read(&mut Cursor::new(data), 0x1000)?;
        assert_eq!(catalog.entries[0].path(), "");

        Ok(())
    }
}
