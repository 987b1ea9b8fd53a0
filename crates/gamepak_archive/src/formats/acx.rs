//! ACX archives, a bare table of big endian offset and length pairs.

use binrw::{BinRead, BinWrite};
use std::io::SeekFrom;

use crate::{
    entry::Catalog,
    error::{Error, Result},
    format::{has_extension, ArchiveCodec, ArchiveFormat},
    formats::{table_end, Span},
    io::{align, pad_to_block, ReadSeek, WriteSeek},
    write::{field_u32, write_entry, PendingEntry, Progress, WriterOptions},
};

const HEADER_SIZE: u64 = 8;
const ROW_SIZE: u64 = 8;
const BLOCK: u64 = ArchiveFormat::Acx.block_size();

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big, magic = 0u32)]
struct AcxHeader {
    count: u32,
}

pub(crate) struct Acx;

impl Acx {
    fn read_table(source: &mut dyn ReadSeek, length: u64) -> Result<Vec<Span>> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;

        let header = AcxHeader::read(&mut source)?;
        let end = table_end(HEADER_SIZE, header.count.into(), ROW_SIZE)
            .filter(|&end| end <= length)
            .ok_or_else(|| Error::invalid(ArchiveFormat::Acx, "entry table exceeds the container"))?;

        let spans = (0..header.count)
            .map(|_| Span::read_be(&mut source))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        if let Some(first) = spans.first() {
            if u64::from(first.offset) < end {
                return Err(Error::invalid(
                    ArchiveFormat::Acx,
                    "first entry overlaps the entry table",
                ));
            }
        }

        Ok(spans)
    }
}

impl ArchiveCodec for Acx {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Acx
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, name_hint: Option<&str>) -> Result<bool> {
        if length < HEADER_SIZE {
            return Ok(false);
        }

        let spans = Self::read_table(source, length)?;
        let Some(first) = spans.first() else {
            // An empty ACX is eight zero bytes, which says nothing on its own
            return Ok(has_extension(name_hint, "acx"));
        };

        let data_start = align(HEADER_SIZE + ROW_SIZE * spans.len() as u64, BLOCK);
        Ok(u64::from(first.offset) == data_start && spans.iter().all(|span| span.end() <= length))
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let mut catalog = Catalog::default();
        for span in Self::read_table(source, length)? {
            catalog.push("", span.offset.into(), span.length.into());
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
        let count = field_u32(entries.len() as u64, ArchiveFormat::Acx)?;

        AcxHeader { count }.write(&mut sink)?;

        let mut offset = align(HEADER_SIZE + ROW_SIZE * entries.len() as u64, BLOCK);
        for entry in entries.iter() {
            Span {
                offset: field_u32(offset, ArchiveFormat::Acx)?,
                length: field_u32(entry.length(), ArchiveFormat::Acx)?,
            }
            .write_be(&mut sink)?;
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
    use crate::format::{ArchiveCodec, ArchiveFormat};
    use crate::formats::Acx;

    #[test]
    fn read_acx_table() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x02,
            0x00, 0x00, 0x00, 0x18,
            0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x1C,
            0x00, 0x00, 0x00, 0x04,
            0x41, 0x41, 0x41, 0x00,
            0x42, 0x42, 0x42, 0x42,
        ]);

        assert!(Acx.identify(&mut input, 32, None));

        let catalog = Acx.read(&mut input, 32)?;
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.entries[0].offset(), 0x18);
        assert_eq!(catalog.entries[0].length(), 3);
        assert_eq!(catalog.entries[1].offset(), 0x1C);
        assert_eq!(catalog.entries[1].path(), "");

        Ok(())
    }

    #[test]
    fn empty_acx_needs_a_name() {
        let mut input = Cursor::new(vec![0u8; 8]);

        assert!(!Acx.identify(&mut input, 8, None));
        assert!(!Acx.identify(&mut input, 8, Some("voice.afs")));
        assert!(Acx.identify(&mut input, 8, Some("VOICE.ACX")));
        assert_eq!(Acx.format(), ArchiveFormat::Acx);
    }

    #[test]
    fn misaligned_table_is_not_acx() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x14,
            0x00, 0x00, 0x00, 0x04,
            0x00, 0x00, 0x00, 0x00,
        ]);

        assert!(!Acx.identify(&mut input, 20, None));
    }
}
