//! Types for reading and encoding texture headers
//!

use binrw::{BinRead, BinWrite, Endian};
use std::{
    fmt,
    io::{Cursor, Read, Seek, SeekFrom, Write},
};
use tracing::{instrument, trace};

use crate::{
    error::{Error, Result},
    types::{ChunkHeader, GvrHeader, PvrHeader, XvrHeader, GBIX, GCIX, GVRT, PVRT, XVRT},
};

/// PVRT data formats reserved for SVR (PlayStation 2) textures
const SVR_DATA_FORMATS: std::ops::Range<u8> = 0x60..0x70;

/// The texture codecs that can be stored in texture containers
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Dreamcast PowerVR texture
    Pvr,
    /// PlayStation 2 texture, sharing the `PVRT` chunk with PVR
    Svr,
    /// GameCube / Wii texture
    Gvr,
    /// Xbox texture
    Xvr,
}

impl TextureKind {
    /// Four character code of the texture chunk
    pub const fn chunk_magic(self) -> [u8; 4] {
        match self {
            TextureKind::Pvr | TextureKind::Svr => PVRT,
            TextureKind::Gvr => GVRT,
            TextureKind::Xvr => XVRT,
        }
    }

    /// Short lowercase name, matching the usual file extension
    pub const fn name(self) -> &'static str {
        match self {
            TextureKind::Pvr => "pvr",
            TextureKind::Svr => "svr",
            TextureKind::Gvr => "gvr",
            TextureKind::Xvr => "xvr",
        }
    }

    /// Byte order of the global index
    pub const fn endian(self) -> Endian {
        match self {
            TextureKind::Gvr => Endian::Big,
            _ => Endian::Little,
        }
    }

    const fn body_size(self) -> u32 {
        match self {
            TextureKind::Xvr => 12,
            _ => 8,
        }
    }

    fn for_pvrt_data_format(data_format: u8) -> Result<Self> {
        if data_format < SVR_DATA_FORMATS.start {
            Ok(TextureKind::Pvr)
        } else if SVR_DATA_FORMATS.contains(&data_format) {
            Ok(TextureKind::Svr)
        } else {
            Err(Error::UnsupportedDataFormat(data_format))
        }
    }
}

impl fmt::Display for TextureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The header of a texture, without its pixel data
///
/// ```
/// use std::io::Cursor;
/// use gamepak_texture::{TextureHeader, TextureKind};
///
/// # fn doit() -> gamepak_texture::error::Result<()> {
/// let header = TextureHeader::new(TextureKind::Gvr, 0x01, 0x0E, 64, 64).with_global_index(7);
/// let blob = header.encode(&[0u8; 32])?;
///
/// let parsed = TextureHeader::read(&mut Cursor::new(&blob))?;
/// assert_eq!(parsed.kind, TextureKind::Gvr);
/// assert_eq!(parsed.global_index, Some(7));
/// assert_eq!(parsed.length, blob.len() as u64);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureHeader {
    /// Codec the texture is encoded with
    pub kind: TextureKind,

    /// Global index, if the texture carries a global index chunk
    pub global_index: Option<u32>,

    /// Pixel format byte
    pub pixel_format: u8,

    /// Data format byte
    pub data_format: u8,

    /// Width in pixels
    pub width: u16,

    /// Height in pixels
    pub height: u16,

    /// Total number of bytes covered by the global index chunk and the texture chunk
    ///
    /// This is taken from the declared chunk lengths, it is not checked against the
    /// amount of data actually available.
    pub length: u64,
}

impl TextureHeader {
    /// Describe a texture without a global index chunk
    pub fn new(kind: TextureKind, pixel_format: u8, data_format: u8, width: u16, height: u16) -> Self {
        Self {
            kind,
            global_index: None,
            pixel_format,
            data_format,
            width,
            height,
            length: 0,
        }
    }

    /// Attach a global index chunk
    pub fn with_global_index(mut self, global_index: u32) -> Self {
        self.global_index = Some(global_index);
        self
    }

    /// Read a texture header from the current position of `reader`.
    ///
    /// The reader is left after the codec specific header, at the start of the pixel data.
    #[instrument(skip(reader), err(level = "debug"))]
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let start = reader.stream_position()?;

        let first = ChunkHeader::read(reader)?;
        let (raw_index, chunk_offset, chunk) = if first.magic == GBIX || first.magic == GCIX {
            if first.length < 4 {
                return Err(Error::InvalidGlobalIndex(first.length));
            }

            let raw_index = <[u8; 4]>::read_le(reader)?;
            let chunk_offset = 8 + first.length as u64;
            reader.seek(SeekFrom::Start(start + chunk_offset))?;
            (Some(raw_index), chunk_offset, ChunkHeader::read(reader)?)
        } else {
            (None, 0, first)
        };

        let (kind, pixel_format, data_format, width, height) = match chunk.magic {
            PVRT => {
                let body = PvrHeader::read(reader)?;
                let kind = TextureKind::for_pvrt_data_format(body.data_format)?;
                (kind, body.pixel_format, body.data_format, body.width, body.height)
            }
            GVRT => {
                let body = GvrHeader::read(reader)?;
                let kind = TextureKind::Gvr;
                (kind, body.pixel_format, body.data_format, body.width, body.height)
            }
            XVRT => {
                let body = XvrHeader::read(reader)?;
                let kind = TextureKind::Xvr;
                (
                    kind,
                    (body.flags & 0xFF) as u8,
                    (body.data_format & 0xFF) as u8,
                    body.width,
                    body.height,
                )
            }
            other => return Err(Error::UnknownChunk(other)),
        };

        let global_index = raw_index.map(|bytes| match kind.endian() {
            Endian::Big => u32::from_be_bytes(bytes),
            Endian::Little => u32::from_le_bytes(bytes),
        });

        let header = TextureHeader {
            kind,
            global_index,
            pixel_format,
            data_format,
            width,
            height,
            length: chunk_offset + 8 + chunk.length as u64,
        };
        trace!(?header, "read texture header");

        Ok(header)
    }

    /// Check whether the data at the current position is a texture of the requested kind.
    ///
    /// The position of `reader` is restored before returning.
    pub fn identify<R: Read + Seek>(reader: &mut R, kind: TextureKind) -> bool {
        let Ok(start) = reader.stream_position() else {
            return false;
        };

        let matched = Self::read(reader).is_ok_and(|header| header.kind == kind);

        reader.seek(SeekFrom::Start(start)).is_ok() && matched
    }

    /// Dimensions packed as two nibbles: `log2(width) - 2` and `log2(height) - 2`
    pub fn dimensions(&self) -> u8 {
        fn nibble(value: u16) -> u8 {
            (value.max(4).ilog2() - 2).min(0xF) as u8
        }

        (nibble(self.width) << 4) | nibble(self.height)
    }

    /// Encode this header followed by `payload` into a complete texture.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let kind = match self.kind {
            TextureKind::Pvr | TextureKind::Svr => {
                TextureKind::for_pvrt_data_format(self.data_format)?
            }
            kind => kind,
        };

        let length = u32::try_from(payload.len())
            .ok()
            .and_then(|len| len.checked_add(kind.body_size()))
            .ok_or(Error::TooLarge(payload.len()))?;

        let mut writer = Cursor::new(Vec::with_capacity(payload.len() + 32));

        if let Some(global_index) = self.global_index {
            ChunkHeader {
                magic: GBIX,
                length: 8,
            }
            .write(&mut writer)?;
            global_index.write_options(&mut writer, kind.endian(), ())?;
            0u32.write_le(&mut writer)?;
        }

        ChunkHeader {
            magic: kind.chunk_magic(),
            length,
        }
        .write(&mut writer)?;

        match kind {
            TextureKind::Pvr | TextureKind::Svr => PvrHeader {
                pixel_format: self.pixel_format,
                data_format: self.data_format,
                width: self.width,
                height: self.height,
            }
            .write(&mut writer)?,
            TextureKind::Gvr => GvrHeader {
                pixel_format: self.pixel_format,
                data_format: self.data_format,
                width: self.width,
                height: self.height,
            }
            .write(&mut writer)?,
            TextureKind::Xvr => XvrHeader {
                flags: self.pixel_format as u32,
                data_format: self.data_format as u32,
                width: self.width,
                height: self.height,
            }
            .write(&mut writer)?,
        }

        writer.write_all(payload)?;

        Ok(writer.into_inner())
    }
}
