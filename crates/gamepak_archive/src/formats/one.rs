//! Storybook ONE archives, big endian tables with compressed entries.
//!
//! Entries written here are Zlib streams. Entries packed with other compressors are exposed as
//! stored bytes, decoding those is left to the caller.

use binrw::{BinRead, BinWrite};
use std::io::SeekFrom;
use tracing::trace;

use crate::{
    compression::{deflate, is_zlib_header, EntryEncoding},
    entry::{Catalog, TextureMetadata},
    error::{Error, Result},
    format::{has_extension, ArchiveCodec, ArchiveFormat},
    formats::{fixed_name, table_end},
    io::{align, pad_to_block, write_fixed_string, ReadSeek, TextEncoding, WriteSeek},
    write::{field_u32, write_encoded, PendingEntry, Progress, WriterOptions},
};

const HEADER_SIZE: u64 = 16;
const ROW_SIZE: u64 = 48;
const NAME_WIDTH: usize = 32;
const BLOCK: u64 = ArchiveFormat::One.block_size();

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
struct OneHeader {
    count: u32,
    table_offset: u32,
    table_length: u32,
    reserved: u32,
}

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
struct OneRow {
    name: [u8; NAME_WIDTH],
    offset: u32,
    stored_length: u32,
    #[brw(pad_after = 4)]
    decoded_length: u32,
}

pub(crate) struct One;

impl One {
    fn read_rows(source: &mut dyn ReadSeek, length: u64) -> Result<Vec<OneRow>> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;

        let header = OneHeader::read(&mut source)?;
        let expected = table_end(0, header.count.into(), ROW_SIZE);
        if u64::from(header.table_offset) != HEADER_SIZE
            || expected != Some(u64::from(header.table_length))
            || header.reserved != 0
        {
            return Err(Error::invalid(ArchiveFormat::One, "unexpected table layout"));
        }
        if HEADER_SIZE + u64::from(header.table_length) > length {
            return Err(Error::invalid(ArchiveFormat::One, "entry table exceeds the container"));
        }

        let rows = (0..header.count)
            .map(|_| OneRow::read(&mut source))
            .collect::<binrw::BinResult<Vec<_>>>()?;
        Ok(rows)
    }

    fn is_zlib(source: &mut dyn ReadSeek, offset: u64, stored: u64) -> Result<bool> {
        if stored < 2 {
            return Ok(false);
        }

        source.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; 2];
        source.read_exact(&mut header)?;
        Ok(is_zlib_header(header))
    }
}

impl ArchiveCodec for One {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::One
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, name_hint: Option<&str>) -> Result<bool> {
        if length < HEADER_SIZE {
            return Ok(false);
        }

        let rows = Self::read_rows(source, length)?;
        let Some(first) = rows.first() else {
            return Ok(has_extension(name_hint, "one"));
        };

        let data_start = align(HEADER_SIZE + ROW_SIZE * rows.len() as u64, BLOCK);
        Ok(u64::from(first.offset) == data_start
            && rows.iter().all(|row| {
                u64::from(row.offset) >= data_start
                    && u64::from(row.offset) + u64::from(row.stored_length) <= length
            }))
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let mut catalog = Catalog::default();
        for row in Self::read_rows(source, length)? {
            let (offset, stored) = (u64::from(row.offset), u64::from(row.stored_length));
            if offset + stored > length {
                return Err(Error::invalid(
                    ArchiveFormat::One,
                    format!("entry at {offset:#x} runs past the container"),
                ));
            }

            let encoding = if Self::is_zlib(source, offset, stored)? {
                EntryEncoding::Zlib {
                    decoded_length: row.decoded_length.into(),
                }
            } else {
                EntryEncoding::Stored
            };

            let path = TextEncoding::ShiftJis.decode(&row.name);
            trace!(path = %path, offset, stored, ?encoding, "entry");
            catalog.push_encoded(path, offset, stored, encoding);
        }
        Ok(catalog)
    }

    fn accept(
        &self,
        name: &str,
        _content: &mut dyn ReadSeek,
        _options: &WriterOptions,
    ) -> Result<Option<TextureMetadata>> {
        fixed_name(ArchiveFormat::One, name, NAME_WIDTH, TextEncoding::ShiftJis)?;
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

        // Stored lengths are only known once compressed
        let compressed = entries
            .iter_mut()
            .map(|entry| Ok(deflate(&entry.read_all()?, options.compression)?))
            .collect::<Result<Vec<_>>>()?;

        let table_length = ROW_SIZE * entries.len() as u64;
        OneHeader {
            count: field_u32(entries.len() as u64, ArchiveFormat::One)?,
            table_offset: HEADER_SIZE as u32,
            table_length: field_u32(table_length, ArchiveFormat::One)?,
            reserved: 0,
        }
        .write(&mut sink)?;

        let mut offset = align(HEADER_SIZE + table_length, BLOCK);
        for (entry, data) in entries.iter().zip(&compressed) {
            let mut row = OneRow {
                offset: field_u32(offset, ArchiveFormat::One)?,
                stored_length: field_u32(data.len() as u64, ArchiveFormat::One)?,
                decoded_length: field_u32(entry.length(), ArchiveFormat::One)?,
                ..Default::default()
            };
            let name = fixed_name(ArchiveFormat::One, entry.name(), NAME_WIDTH, TextEncoding::ShiftJis)?;
            write_fixed_string(&mut &mut row.name[..], &name, NAME_WIDTH)?;
            row.write(&mut sink)?;

            trace!(name = entry.name(), stored = data.len(), decoded = entry.length(), "compressed entry");
            offset = align(offset + data.len() as u64, BLOCK);
        }
        pad_to_block(sink, BLOCK)?;

        for (index, (entry, data)) in entries.iter().zip(&compressed).enumerate() {
            write_encoded(sink, entry.name(), data, index, BLOCK, progress)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Read};

    use pretty_assertions::assert_eq;

    use crate::compression::{EntryEncoding, EntryReader};
    use crate::error::Result;
    use crate::format::{try_identify, ArchiveCodec, ArchiveFormat};
    use crate::formats::One;
    use crate::read::ArchiveReader;
    use crate::write::ArchiveWriter;
    use crate::write::WriterOptions;

    #[test]
    fn entries_are_compressed() -> Result<()> {
        let plain = b"obj_ring obj_spring obj_ring obj_spring".repeat(4);

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::One, WriterOptions::default());
        writer.add_bytes("stg01_obj.bin", plain.clone())?;
        let data = writer.finish()?.into_inner();
        let length = data.len() as u64;

        let mut input = Cursor::new(data);
        assert!(One.identify(&mut input, length, None));

        let catalog = One.read(&mut input, length)?;
        let entry = &catalog.entries[0];
        assert_eq!(entry.path(), "stg01_obj.bin");
        assert_eq!(entry.offset(), 0x40);
        assert!(entry.length() < plain.len() as u64);
        assert_eq!(entry.size(), plain.len() as u64);

        let mut out = Vec::new();
        EntryReader::new(&mut input, entry.offset(), entry.length(), entry.encoding())?.read_to_end(&mut out)?;
        assert_eq!(out, plain);

        Ok(())
    }

    #[rustfmt::skip]
    fn raw_entry_archive() -> Vec<u8> {
        let mut data = vec![
            // 1 entry, table at 0x10, 0x30 bytes long
            0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x10,
            0x00, 0x00, 0x00, 0x30,
            0x00, 0x00, 0x00, 0x00,
        ];
        let mut name = b"raw.bin".to_vec();
        name.resize(32, 0);
        data.extend_from_slice(&name);
        data.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x40,
            0x00, 0x00, 0x00, 0x04,
            0x00, 0x00, 0x00, 0x04,
            0x00, 0x00, 0x00, 0x00,
            // Data, not a Zlib stream
            0xDE, 0xAD, 0xBE, 0xEF,
        ]);
        data
    }

    #[test]
    fn foreign_compression_is_read_as_stored() -> Result<()> {
        let data = raw_entry_archive();
        let length = data.len() as u64;
        let mut input = Cursor::new(data.clone());

        assert!(One.identify(&mut input, length, None));
        assert_eq!(try_identify(&mut input, Some("a.one")), Some(ArchiveFormat::One));

        let catalog = One.read(&mut input, length)?;
        assert_eq!(catalog.entries[0].path(), "raw.bin");
        assert_eq!(catalog.entries[0].encoding(), EntryEncoding::Stored);

        let mut reader = ArchiveReader::with_hint(Cursor::new(data), Some("a.one"))?;
        let mut out = Vec::new();
        reader.by_index(0)?.read_to_end(&mut out)?;
        assert_eq!(out, vec![0xDE, 0xAD, 0xBE, 0xEF]);

        Ok(())
    }

    #[test]
    fn empty_archive_needs_a_name() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x10,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ]);

        assert!(!One.identify(&mut input, 16, None));
        assert!(One.identify(&mut input, 16, Some("stg01.one")));
    }
}
