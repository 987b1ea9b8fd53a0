//! This library identifies the texture codecs stored inside *Sega* texture containers.
//!
//! # Texture Header Documentation
//!
//! Only the headers are handled here. Decoding pixel data is left to a dedicated codec, the
//! archive layer just needs to know which codec a blob belongs to, how long it is, and the
//! handful of attributes that texture containers mirror in their entry tables.
//!
//! ## File Structure
//!
//! A texture starts with an optional global index chunk, followed by the texture chunk.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "GBIX" or "GCIX"                                  |
//! | 0x0004         | Chunk length           | 4 bytes: Length of the chunk body (usually 8)              |
//! | 0x0008         | Global index           | 4 bytes: Engine texture binding, big endian for GVR        |
//! | 0x000C         | Padding                | Remainder of the chunk body                                |
//!
//! ### Texture Chunk
//!
//! | Codec | Magic  | Body                                                                         |
//! |-------|--------|------------------------------------------------------------------------------|
//! | PVR   | `PVRT` | pixel format u8, data format u8 (< 0x60), 2 reserved, width u16 LE, height u16 LE |
//! | SVR   | `PVRT` | pixel format u8, data format u8 (0x60..0x70), 2 reserved, width u16 LE, height u16 LE |
//! | GVR   | `GVRT` | 2 reserved, pixel format u8, data format u8, width u16 BE, height u16 BE      |
//! | XVR   | `XVRT` | flags u32 LE, data format u32 LE, width u16 LE, height u16 LE                 |
//!
//! Every texture chunk starts with its four character code and a little endian `u32` holding
//! the number of bytes that follow the chunk header, pixel data included.
//!

pub mod error;
pub mod read;
pub mod types;

pub use read::{TextureHeader, TextureKind};
