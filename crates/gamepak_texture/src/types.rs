//! Base types for the structure of texture headers.

use binrw::{BinRead, BinWrite};

/// Global index chunk used by most Sega titles
pub const GBIX: [u8; 4] = *b"GBIX";

/// Global index chunk variant found in some GameCube titles
pub const GCIX: [u8; 4] = *b"GCIX";

/// Texture chunk shared by PVR and SVR textures
pub const PVRT: [u8; 4] = *b"PVRT";

/// Texture chunk of GVR textures
pub const GVRT: [u8; 4] = *b"GVRT";

/// Texture chunk of XVR textures
pub const XVRT: [u8; 4] = *b"XVRT";

/// Generic chunk header
///
/// Every chunk starts with a four character code and the length of the body that follows.
/// Chunk lengths are always little endian, even for GameCube textures.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ChunkHeader {
    /// Four character code of the chunk
    pub magic: [u8; 4],

    /// Number of bytes following this header
    pub length: u32,
}

/// Body of a `PVRT` chunk, shared by PVR and SVR textures
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct PvrHeader {
    /// Pixel format (palette or colour layout)
    pub pixel_format: u8,

    /// Data format (twiddling, mipmaps, compression)
    pub data_format: u8,

    /// Width in pixels
    #[brw(pad_before = 2)]
    pub width: u16,

    /// Height in pixels
    pub height: u16,
}

/// Body of a `GVRT` chunk
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct GvrHeader {
    /// Pixel format, only meaningful for palettized data formats
    #[brw(pad_before = 2)]
    pub pixel_format: u8,

    /// Data format
    pub data_format: u8,

    /// Width in pixels
    pub width: u16,

    /// Height in pixels
    pub height: u16,
}

/// Body of an `XVRT` chunk
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct XvrHeader {
    /// Surface flags (alpha, mipmaps)
    pub flags: u32,

    /// Direct3D surface format
    pub data_format: u32,

    /// Width in pixels
    pub width: u16,

    /// Height in pixels
    pub height: u16,
}
