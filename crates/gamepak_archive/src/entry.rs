//! Entry records produced by the format readers.

use std::collections::HashMap;

use gamepak_texture::TextureHeader;

use crate::compression::EntryEncoding;

/// Location and identity of one entry inside a container
///
/// Offsets are relative to the start of the container, which is not necessarily the start of
/// the underlying stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    index: usize,
    path: Box<str>,
    offset: u64,
    length: u64,
    encoding: EntryEncoding,
}

impl Entry {
    /// Position of the entry in the container's table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Full path of the entry, using `/` as separator
    ///
    /// Empty for formats that do not store names.
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this path directly when extracting an archive.
    /// It may contain an absolute path, or break out of the current directory (`../runtime`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last component of the path
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(split) => &self.path[split + 1..],
            None => &self.path,
        }
    }

    /// Starting offset of the stored data
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes the entry occupies in the container
    pub fn length(&self) -> u64 {
        self.length
    }

    /// End of the stored data, exclusive
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Size of the entry once decoded
    pub fn size(&self) -> u64 {
        match self.encoding {
            EntryEncoding::Stored => self.length,
            EntryEncoding::Zlib { decoded_length } => decoded_length,
        }
    }

    /// How the stored bytes are transformed on the way out
    pub fn encoding(&self) -> EntryEncoding {
        self.encoding
    }
}

/// Attributes texture containers mirror in their entry tables
///
/// Every field is optional as containers choose which ones to store.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TextureMetadata {
    /// Engine binding index
    pub global_index: Option<u32>,
    /// Pixel format byte of the texture codec
    pub pixel_format: Option<u8>,
    /// Data format byte of the texture codec
    pub data_format: Option<u8>,
    /// Width and height as `log2(size) - 2` nibbles
    pub dimensions: Option<u8>,
}

impl TextureMetadata {
    /// Take the attributes from a parsed texture header
    pub fn from_header(header: &TextureHeader) -> Self {
        Self {
            global_index: header.global_index,
            pixel_format: Some(header.pixel_format),
            data_format: Some(header.data_format),
            dimensions: Some(header.dimensions()),
        }
    }

    /// Width in pixels, decoded from the dimension nibbles
    pub fn width(&self) -> Option<u32> {
        self.dimensions.map(|d| 4u32 << (d >> 4))
    }

    /// Height in pixels, decoded from the dimension nibbles
    pub fn height(&self) -> Option<u32> {
        self.dimensions.map(|d| 4u32 << (d & 0xF))
    }
}

/// Everything a format reader learns from a container's tables
#[derive(Debug, Default)]
pub struct Catalog {
    /// Entries in table order
    pub entries: Vec<Entry>,
    /// Texture attributes keyed by entry index
    pub textures: HashMap<usize, TextureMetadata>,
}

impl Catalog {
    /// Append a stored entry, returning its index
    pub fn push(&mut self, path: impl Into<Box<str>>, offset: u64, length: u64) -> usize {
        self.push_encoded(path, offset, length, EntryEncoding::Stored)
    }

    /// Append an entry whose stored bytes need decoding, returning its index
    pub fn push_encoded(
        &mut self,
        path: impl Into<Box<str>>,
        offset: u64,
        length: u64,
        encoding: EntryEncoding,
    ) -> usize {
        let index = self.entries.len();
        self.entries.push(Entry {
            index,
            path: path.into(),
            offset,
            length,
            encoding,
        });
        index
    }

    /// Number of entries collected so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were collected
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use gamepak_texture::{TextureHeader, TextureKind};
    use pretty_assertions::assert_eq;

    use crate::compression::EntryEncoding;
    use crate::entry::{Catalog, TextureMetadata};

    #[test]
    fn entry_names_and_sizes() {
        let mut catalog = Catalog::default();
        catalog.push("stage/enemy/boss.bin", 0x800, 0x20);
        catalog.push_encoded(
            "title.prs",
            0x820,
            0x10,
            EntryEncoding::Zlib {
                decoded_length: 0x40,
            },
        );

        let [boss, title] = &catalog.entries[..] else {
            panic!("expected two entries");
        };

        assert_eq!(boss.index(), 0);
        assert_eq!(boss.name(), "boss.bin");
        assert_eq!(boss.end(), 0x820);
        assert_eq!(boss.size(), 0x20);

        assert_eq!(title.index(), 1);
        assert_eq!(title.name(), "title.prs");
        assert_eq!(title.length(), 0x10);
        assert_eq!(title.size(), 0x40);
    }

    #[test]
    fn texture_metadata_dimensions() {
        let header = TextureHeader::new(TextureKind::Gvr, 0, 0x0E, 256, 32).with_global_index(5);
        let metadata = TextureMetadata::from_header(&header);

        assert_eq!(metadata.global_index, Some(5));
        assert_eq!(metadata.dimensions, Some(0x63));
        assert_eq!(metadata.width(), Some(256));
        assert_eq!(metadata.height(), Some(32));
    }
}
