//! Positioned stream views and small binary helpers shared by the format codecs.

use encoding_rs::SHIFT_JIS;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Object safe combination of [`Read`] and [`Seek`]
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Object safe combination of [`Write`] and [`Seek`]
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// A view of the `[start, start + length)` range of an inner stream.
///
/// Position 0 of the window is `start` in the inner stream, so a container embedded in a
/// larger file can be parsed with the same offsets it would have as a standalone file.
/// Without a length the window runs to the end of the inner stream and writes may extend it.
#[derive(Debug)]
pub struct Window<T> {
    inner: T,
    start: u64,
    length: Option<u64>,
    position: u64,
}

impl<T: Seek> Window<T> {
    /// Open a window at `start`, positioned at its beginning
    pub fn new(mut inner: T, start: u64, length: Option<u64>) -> io::Result<Self> {
        inner.seek(SeekFrom::Start(start))?;
        Ok(Self {
            inner,
            start,
            length,
            position: 0,
        })
    }

    /// Open a window at the current position of `inner`
    pub fn at_current(mut inner: T, length: Option<u64>) -> io::Result<Self> {
        let start = inner.stream_position()?;
        Self::new(inner, start, length)
    }

    fn remaining(&self) -> Option<u64> {
        self.length.map(|length| length.saturating_sub(self.position))
    }
}

impl<T: Read + Seek> Read for Window<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let max = match self.remaining() {
            Some(remaining) => buf
                .len()
                .min(usize::try_from(remaining).unwrap_or(usize::MAX)),
            None => buf.len(),
        };
        if max == 0 {
            return Ok(0);
        }

        let read = self.inner.read(&mut buf[..max])?;
        self.position += read as u64;
        Ok(read)
    }
}

impl<T: Write + Seek> Write for Window<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T: Seek> Seek for Window<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let end = match self.length {
                    Some(length) => length,
                    None => self
                        .inner
                        .seek(SeekFrom::End(0))?
                        .saturating_sub(self.start),
                };
                end.checked_add_signed(delta)
            }
        }
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;

        self.inner.seek(SeekFrom::Start(self.start + target))?;
        self.position = target;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

/// Round `value` up to the next multiple of `block`
pub const fn align(value: u64, block: u64) -> u64 {
    if block <= 1 {
        value
    } else {
        value.div_ceil(block) * block
    }
}

pub(crate) fn write_zeros<W: Write + ?Sized>(writer: &mut W, count: u64) -> io::Result<()> {
    io::copy(&mut io::repeat(0).take(count), writer)?;
    Ok(())
}

/// Zero fill up to the next multiple of `block`, returning the new position
pub(crate) fn pad_to_block<W: Write + Seek + ?Sized>(writer: &mut W, block: u64) -> io::Result<u64> {
    let position = writer.stream_position()?;
    let target = align(position, block);
    write_zeros(writer, target - position)?;
    Ok(target)
}

/// Character encodings used by fixed width name fields
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8, which covers the plain ASCII names most formats store
    #[default]
    Utf8,
    /// Shift-JIS, used by Japanese titles
    ShiftJis,
}

impl TextEncoding {
    /// Human readable name of the encoding
    pub const fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::ShiftJis => "Shift-JIS",
        }
    }

    /// Decode a NUL padded field, stopping at the first NUL
    pub fn decode(self, field: &[u8]) -> String {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let bytes = &field[..end];

        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::ShiftJis => SHIFT_JIS.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }

    /// Encode `text`, returning `None` if a character cannot be represented
    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Some(text.as_bytes().to_vec()),
            TextEncoding::ShiftJis => {
                let (bytes, _, had_errors) = SHIFT_JIS.encode(text);
                (!had_errors).then(|| bytes.into_owned())
            }
        }
    }
}

pub(crate) fn read_fixed_string<R: Read + ?Sized>(
    reader: &mut R,
    width: usize,
    encoding: TextEncoding,
) -> io::Result<String> {
    let mut field = vec![0u8; width];
    reader.read_exact(&mut field)?;
    Ok(encoding.decode(&field))
}

/// Write `bytes` into a NUL padded field of `width` bytes, truncating if needed
pub(crate) fn write_fixed_string<W: Write + ?Sized>(
    writer: &mut W,
    bytes: &[u8],
    width: usize,
) -> io::Result<()> {
    let len = bytes.len().min(width);
    writer.write_all(&bytes[..len])?;
    write_zeros(writer, (width - len) as u64)
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Read, Seek, SeekFrom, Write};

    use pretty_assertions::assert_eq;

    use crate::error::Result;
    use crate::io::{align, pad_to_block, write_fixed_string, TextEncoding, Window};

    #[test]
    fn window_maps_positions() -> Result<()> {
        let mut inner = Cursor::new((0u8..32).collect::<Vec<_>>());
        let mut window = Window::new(&mut inner, 8, Some(4))?;

        let mut buf = Vec::new();
        window.read_to_end(&mut buf)?;
        assert_eq!(buf, vec![8, 9, 10, 11]);

        assert_eq!(window.seek(SeekFrom::End(-1))?, 3);
        let mut byte = [0u8; 1];
        window.read_exact(&mut byte)?;
        assert_eq!(byte, [11]);

        assert!(window.seek(SeekFrom::Current(-10)).is_err());

        Ok(())
    }

    #[test]
    fn unbounded_window_writes_past_start() -> Result<()> {
        let mut inner = Cursor::new(vec![0xFFu8; 4]);
        inner.seek(SeekFrom::End(0))?;

        let mut window = Window::at_current(&mut inner, None)?;
        window.write_all(b"AB")?;
        assert_eq!(pad_to_block(&mut window, 8)?, 8);
        assert_eq!(window.seek(SeekFrom::End(0))?, 8);

        assert_eq!(inner.into_inner().len(), 12);

        Ok(())
    }

    #[test]
    fn align_rounds_up() {
        assert_eq!(align(0, 2048), 0);
        assert_eq!(align(1, 2048), 2048);
        assert_eq!(align(2048, 2048), 2048);
        assert_eq!(align(13, 1), 13);
    }

    #[test]
    fn shift_jis_names() -> Result<()> {
        let encoded = TextEncoding::ShiftJis.encode("テスト.bin");
        assert_eq!(
            encoded.as_deref(),
            Some(&[0x83, 0x65, 0x83, 0x58, 0x83, 0x67, 0x2E, 0x62, 0x69, 0x6E][..])
        );

        let mut field = Vec::new();
        write_fixed_string(&mut field, encoded.as_deref().unwrap_or_default(), 16)?;
        assert_eq!(field.len(), 16);
        assert_eq!(TextEncoding::ShiftJis.decode(&field), "テスト.bin");

        assert_eq!(TextEncoding::ShiftJis.encode("\u{1F600}"), None);

        Ok(())
    }
}
