//! Entry content decoding and encoding.

use std::io::{self, Cursor, Read, Seek, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::{instrument, warn};

use crate::{error::Result, io::Window};

/// Identifies how the bytes of an entry are stored inside the container
///
/// Only Storybook ONE archives compress their entries, every other format stores them as is.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum EntryEncoding {
    /// Stores the data as it is
    #[default]
    Stored,

    /// Data compressed using Zlib
    Zlib {
        /// Size of the data once inflated
        decoded_length: u64,
    },
}

pub(crate) enum EntryReader<'a, R: Read + Seek> {
    Raw(Window<&'a mut R>),
    Inflated(Cursor<Vec<u8>>),
}

impl<'a, R: Read + Seek> EntryReader<'a, R> {
    #[instrument(skip(reader), err)]
    pub fn new(reader: &'a mut R, start: u64, length: u64, encoding: EntryEncoding) -> Result<Self> {
        let window = Window::new(reader, start, Some(length))?;

        Ok(match encoding {
            EntryEncoding::Stored => EntryReader::Raw(window),
            EntryEncoding::Zlib { decoded_length } => {
                let mut window = window;
                let mut buffer = Vec::new();
                if let Err(error) = ZlibDecoder::new(&mut window).read_to_end(&mut buffer) {
                    if !matches!(error.kind(), io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData) {
                        return Err(error.into());
                    }
                    warn!(%error, "entry is not a Zlib stream, reading it as stored");
                    window.rewind()?;
                    return Ok(EntryReader::Raw(window));
                }
                if buffer.len() as u64 != decoded_length {
                    warn!(
                        expected = decoded_length,
                        actual = buffer.len(),
                        "inflated entry size differs from its table record"
                    );
                }
                EntryReader::Inflated(Cursor::new(buffer))
            }
        })
    }
}

impl<R: Read + Seek> Seek for EntryReader<'_, R> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        match self {
            EntryReader::Raw(r) => r.seek(pos),
            EntryReader::Inflated(r) => r.seek(pos),
        }
    }
}

impl<R: Read + Seek> Read for EntryReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryReader::Raw(r) => r.read(buf),
            EntryReader::Inflated(r) => r.read(buf),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self {
            EntryReader::Raw(r) => r.read_exact(buf),
            EntryReader::Inflated(r) => r.read_exact(buf),
        }
    }

    fn read_to_end(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self {
            EntryReader::Raw(r) => r.read_to_end(buf),
            EntryReader::Inflated(r) => r.read_to_end(buf),
        }
    }
}

/// Compress a whole entry with Zlib
#[instrument(skip_all, err, fields(size = data.len()))]
pub(crate) fn deflate(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
    encoder.write_all(data)?;
    encoder.finish()
}

/// Whether `bytes` start with a valid Zlib stream header
pub(crate) fn is_zlib_header(bytes: [u8; 2]) -> bool {
    let [cmf, flg] = bytes;
    cmf & 0x0F == 8 && cmf >> 4 <= 7 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Read, Seek, SeekFrom};

    use flate2::Compression;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::compression::{deflate, is_zlib_header, EntryEncoding, EntryReader};
    use crate::error::Result;

    #[traced_test]
    #[test]
    fn inflated_entries_are_seekable() -> Result<()> {
        let plain = b"Sonic Team Storybook".repeat(8);
        let compressed = deflate(&plain, Compression::default())?;

        let mut container = vec![0xEEu8; 16];
        container.extend_from_slice(&compressed);
        let mut container = Cursor::new(container);

        let mut reader = EntryReader::new(
            &mut container,
            16,
            compressed.len() as u64,
            EntryEncoding::Zlib {
                decoded_length: plain.len() as u64,
            },
        )?;

        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        assert_eq!(out, plain);

        reader.seek(SeekFrom::Start(6))?;
        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        assert_eq!(&word, b"Team");

        Ok(())
    }

    #[traced_test]
    #[test]
    fn broken_streams_read_as_stored() -> Result<()> {
        // Valid Zlib header followed by a reserved block type
        let stored = vec![0x78, 0x9C, 0xFF, 0xFF, 0xFF];
        let mut container = Cursor::new(stored.clone());

        let mut reader = EntryReader::new(
            &mut container,
            0,
            stored.len() as u64,
            EntryEncoding::Zlib { decoded_length: 64 },
        )?;

        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        assert_eq!(out, stored);
        assert!(logs_contain("not a Zlib stream"));

        Ok(())
    }

    #[test]
    fn zlib_header_detection() -> Result<()> {
        let compressed = deflate(b"data", Compression::best())?;
        assert!(is_zlib_header([compressed[0], compressed[1]]));
        assert!(!is_zlib_header(*b"PK"));
        assert!(!is_zlib_header([0x78, 0x00]));

        Ok(())
    }
}
