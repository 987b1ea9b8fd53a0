//! MRG archives, storing each name as a separate stem and extension.

use binrw::{BinRead, BinWrite};
use std::io::SeekFrom;

use crate::{
    entry::{Catalog, TextureMetadata},
    error::{Error, RejectionReason, Result},
    format::{ArchiveCodec, ArchiveFormat},
    formats::table_end,
    io::{align, pad_to_block, write_fixed_string, ReadSeek, TextEncoding, WriteSeek},
    write::{field_u32, write_entry, PendingEntry, Progress, WriterOptions},
};

const HEADER_SIZE: u64 = 16;
const ROW_SIZE: u64 = 48;
const STEM_WIDTH: usize = 32;
const EXTENSION_WIDTH: usize = 4;
const BLOCK: u64 = ArchiveFormat::Mrg.block_size();

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little, magic = b"MRG0")]
struct MrgHeader {
    #[brw(pad_after = 8)]
    count: u32,
}

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
struct MrgRow {
    extension: [u8; EXTENSION_WIDTH],
    offset: u32,
    #[brw(pad_after = 4)]
    length: u32,
    stem: [u8; STEM_WIDTH],
}

/// Split at the last dot, names without an extension keep any trailing dot in the stem
fn split_name(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, extension)) if !extension.is_empty() => (stem, extension),
        _ => (name, ""),
    }
}

pub(crate) struct Mrg;

impl ArchiveCodec for Mrg {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Mrg
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, _name_hint: Option<&str>) -> Result<bool> {
        let mut source = source;
        if length < HEADER_SIZE {
            return Ok(false);
        }

        source.seek(SeekFrom::Start(0))?;
        let header = MrgHeader::read(&mut source)?;
        Ok(table_end(HEADER_SIZE, header.count.into(), ROW_SIZE).is_some_and(|end| end <= length))
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;

        let header = MrgHeader::read(&mut source)?;
        if !table_end(HEADER_SIZE, header.count.into(), ROW_SIZE).is_some_and(|end| end <= length) {
            return Err(Error::invalid(ArchiveFormat::Mrg, "entry table exceeds the container"));
        }

        let mut catalog = Catalog::default();
        for _ in 0..header.count {
            let row = MrgRow::read(&mut source)?;
            let stem = TextEncoding::Utf8.decode(&row.stem);
            let extension = TextEncoding::Utf8.decode(&row.extension);

            let name = if extension.is_empty() {
                stem
            } else {
                format!("{stem}.{extension}")
            };
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
        let (stem, extension) = split_name(name);
        for (part, max) in [(extension, EXTENSION_WIDTH), (stem, STEM_WIDTH)] {
            if part.len() > max {
                return Err(Error::rejected(
                    name,
                    ArchiveFormat::Mrg,
                    RejectionReason::NameTooLong { max },
                ));
            }
        }
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
        let count = field_u32(entries.len() as u64, ArchiveFormat::Mrg)?;
        MrgHeader { count }.write(&mut sink)?;

        let mut offset = align(HEADER_SIZE + ROW_SIZE * entries.len() as u64, BLOCK);
        for entry in entries.iter() {
            let (stem, extension) = split_name(entry.name());

            let mut row = MrgRow {
                offset: field_u32(offset, ArchiveFormat::Mrg)?,
                length: field_u32(entry.length(), ArchiveFormat::Mrg)?,
                ..Default::default()
            };
            write_fixed_string(&mut &mut row.extension[..], extension.as_bytes(), EXTENSION_WIDTH)?;
            write_fixed_string(&mut &mut row.stem[..], stem.as_bytes(), STEM_WIDTH)?;
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

    use crate::error::{RejectionReason, Result};
    use crate::format::{ArchiveCodec, ArchiveFormat};
    use crate::formats::Mrg;
    use crate::read::ArchiveReader;
    use crate::write::{ArchiveWriter, WriterOptions};

    use super::split_name;

    #[test]
    fn read_split_names() -> Result<()> {
        let mut data = Vec::new();
        data.extend_from_slice(b"MRG0\x02\0\0\0\0\0\0\0\0\0\0\0");

        data.extend_from_slice(b"pvm\0\x80\0\0\0\x04\0\0\0\0\0\0\0");
        data.extend_from_slice(&{
            let mut stem = [0u8; 32];
            stem[..6].copy_from_slice(b"car_01");
            stem
        });

        data.extend_from_slice(b"\0\0\0\0\x90\0\0\0\x02\0\0\0\0\0\0\0");
        data.extend_from_slice(&{
            let mut stem = [0u8; 32];
            stem[..6].copy_from_slice(b"README");
            stem
        });

        data.resize(0xA0, 0xEE);

        let mut input = Cursor::new(data);
        assert!(Mrg.identify(&mut input, 0xA0, None));

        let catalog = Mrg.read(&mut input, 0xA0)?;
        assert_eq!(catalog.entries[0].path(), "car_01.pvm");
        assert_eq!(catalog.entries[0].offset(), 0x80);
        assert_eq!(catalog.entries[1].path(), "README");
        assert_eq!(catalog.entries[1].length(), 2);

        Ok(())
    }

    #[test]
    fn trailing_dots_stay_in_the_stem() -> Result<()> {
        assert_eq!(split_name("car_01.pvm"), ("car_01", "pvm"));
        assert_eq!(split_name("file."), ("file.", ""));
        assert_eq!(split_name("README"), ("README", ""));

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::Mrg, WriterOptions::default());
        writer.add_bytes("file.", b"dot".to_vec())?;
        writer.add_bytes("file", b"bare".to_vec())?;
        let data = writer.finish()?.into_inner();

        let reader = ArchiveReader::with_format(Cursor::new(data), ArchiveFormat::Mrg)?;
        assert_eq!(reader.file_names().collect::<Vec<_>>(), vec!["file.", "file"]);

        Ok(())
    }

    #[test]
    fn long_extensions_are_rejected() {
        let result = Mrg.accept(
            "model.mdl_backup",
            &mut Cursor::new(Vec::new()),
            &WriterOptions::default(),
        );

        assert_eq!(
            result.err().and_then(|e| e.rejection().map(|r| r.reason.clone())),
            Some(RejectionReason::NameTooLong { max: 4 })
        );
    }
}
