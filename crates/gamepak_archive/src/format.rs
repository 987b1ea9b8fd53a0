//! The registry of supported container formats and their codec interface.

use std::{
    fmt,
    io::{Read, Seek, SeekFrom},
    str::FromStr,
};

use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::{
    entry::{Catalog, TextureMetadata},
    error::Result,
    formats,
    io::{ReadSeek, Window, WriteSeek},
    write::{PendingEntry, Progress, WriterOptions},
};

/// Every container format this library can read and write
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArchiveFormat {
    /// Puyo Pop Fever ACX
    Acx,
    /// CRI AFS
    Afs,
    /// GameCube Ninja texture list
    Gnt,
    /// GameCube texture container
    Gvm,
    /// Tokyo Xtreme Racer MRG
    Mrg,
    /// Nintendo DS NARC
    Narc,
    /// Sonic and the Secret Rings / Black Knight ONE
    One,
    /// Dreamcast texture container
    Pvm,
    /// PlayStation 2 / PC Ninja texture list
    Snt,
    /// Sonic Rush sound package
    Spk,
    /// PlayStation 2 texture container
    Svm,
    /// Sonic Rush texture package
    Tex,
    /// Wii U8
    U8,
    /// Xbox texture container
    Xvm,
}

impl ArchiveFormat {
    /// All formats in identification order
    ///
    /// Formats with strong magic numbers come first, those identified by structure or file
    /// extension alone come last.
    pub const ALL: [ArchiveFormat; 14] = [
        ArchiveFormat::Afs,
        ArchiveFormat::Gvm,
        ArchiveFormat::Pvm,
        ArchiveFormat::Svm,
        ArchiveFormat::Xvm,
        ArchiveFormat::Gnt,
        ArchiveFormat::Snt,
        ArchiveFormat::Mrg,
        ArchiveFormat::Narc,
        ArchiveFormat::Spk,
        ArchiveFormat::Tex,
        ArchiveFormat::U8,
        ArchiveFormat::One,
        ArchiveFormat::Acx,
    ];

    /// Display name of the format
    pub const fn name(self) -> &'static str {
        match self {
            ArchiveFormat::Acx => "ACX",
            ArchiveFormat::Afs => "AFS",
            ArchiveFormat::Gnt => "GNT",
            ArchiveFormat::Gvm => "GVM",
            ArchiveFormat::Mrg => "MRG",
            ArchiveFormat::Narc => "NARC",
            ArchiveFormat::One => "ONE",
            ArchiveFormat::Pvm => "PVM",
            ArchiveFormat::Snt => "SNT",
            ArchiveFormat::Spk => "SPK",
            ArchiveFormat::Svm => "SVM",
            ArchiveFormat::Tex => "TEX",
            ArchiveFormat::U8 => "U8",
            ArchiveFormat::Xvm => "XVM",
        }
    }

    /// Usual file extension, without the dot
    pub const fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Acx => "acx",
            ArchiveFormat::Afs => "afs",
            ArchiveFormat::Gnt => "gnt",
            ArchiveFormat::Gvm => "gvm",
            ArchiveFormat::Mrg => "mrg",
            ArchiveFormat::Narc => "narc",
            ArchiveFormat::One => "one",
            ArchiveFormat::Pvm => "pvm",
            ArchiveFormat::Snt => "snt",
            ArchiveFormat::Spk => "spk",
            ArchiveFormat::Svm => "svm",
            ArchiveFormat::Tex => "tex",
            ArchiveFormat::U8 => "arc",
            ArchiveFormat::Xvm => "xvm",
        }
    }

    /// Alignment of entry data
    pub const fn block_size(self) -> u64 {
        match self {
            ArchiveFormat::Afs => 2048,
            ArchiveFormat::Acx | ArchiveFormat::Narc => 4,
            ArchiveFormat::Gnt | ArchiveFormat::Snt => 8,
            ArchiveFormat::Tex | ArchiveFormat::U8 => 32,
            ArchiveFormat::Gvm
            | ArchiveFormat::Mrg
            | ArchiveFormat::One
            | ArchiveFormat::Pvm
            | ArchiveFormat::Spk
            | ArchiveFormat::Svm
            | ArchiveFormat::Xvm => 16,
        }
    }

    /// Whether entry names may contain directories
    pub const fn is_hierarchical(self) -> bool {
        matches!(self, ArchiveFormat::Narc | ArchiveFormat::U8)
    }

    /// The codec reading and writing this format
    pub fn codec(self) -> &'static dyn ArchiveCodec {
        match self {
            ArchiveFormat::Acx => &formats::Acx,
            ArchiveFormat::Afs => &formats::Afs,
            ArchiveFormat::Gnt => &formats::GNT,
            ArchiveFormat::Gvm => &formats::GVM,
            ArchiveFormat::Mrg => &formats::Mrg,
            ArchiveFormat::Narc => &formats::Narc,
            ArchiveFormat::One => &formats::One,
            ArchiveFormat::Pvm => &formats::PVM,
            ArchiveFormat::Snt => &formats::SNT,
            ArchiveFormat::Spk => &formats::Spk,
            ArchiveFormat::Svm => &formats::SVM,
            ArchiveFormat::Tex => &formats::Tex,
            ArchiveFormat::U8 => &formats::U8Archive,
            ArchiveFormat::Xvm => &formats::XVM,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown format name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown archive format {0:?}")]
pub struct ParseFormatError(String);

impl FromStr for ArchiveFormat {
    type Err = ParseFormatError;

    /// Accepts either the display name or the file extension, ignoring case
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ArchiveFormat::ALL
            .into_iter()
            .find(|format| {
                s.eq_ignore_ascii_case(format.name()) || s.eq_ignore_ascii_case(format.extension())
            })
            .ok_or_else(|| ParseFormatError(s.to_owned()))
    }
}

/// Reading, writing and identification of one container format
///
/// Every codec sees the container through a stream whose position 0 is the start of the
/// container and which spans exactly `length` bytes.
pub trait ArchiveCodec: Send + Sync {
    /// Format handled by this codec
    fn format(&self) -> ArchiveFormat;

    /// Check whether `source` holds a container of this format.
    ///
    /// `name_hint` is the file name the data came from, used by formats without magic numbers.
    /// Errors are treated as a negative answer by [`ArchiveCodec::identify`].
    fn probe(&self, source: &mut dyn ReadSeek, length: u64, name_hint: Option<&str>) -> Result<bool>;

    /// Parse the tables of the container into entries
    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog>;

    /// Inspect content before it is added, refusing it with [`crate::error::Error::Rejected`].
    ///
    /// Returns the texture attributes to store in the table, for texture containers.
    fn accept(
        &self,
        name: &str,
        content: &mut dyn ReadSeek,
        options: &WriterOptions,
    ) -> Result<Option<TextureMetadata>> {
        let _ = (name, content, options);
        Ok(None)
    }

    /// Serialize `entries` into `sink`, starting at its position 0
    fn write(
        &self,
        sink: &mut dyn WriteSeek,
        entries: &mut [PendingEntry<'_>],
        options: &WriterOptions,
        progress: &mut Progress<'_, '_>,
    ) -> Result<()>;

    /// Side effect free identification, the position of `source` is restored afterwards
    fn identify(&self, source: &mut dyn ReadSeek, length: u64, name_hint: Option<&str>) -> bool {
        let Ok(start) = source.stream_position() else {
            return false;
        };

        let matched = match self.probe(source, length, name_hint) {
            Ok(matched) => matched,
            Err(error) => {
                trace!(format = %self.format(), %error, "probe failed");
                false
            }
        };

        source.seek(SeekFrom::Start(start)).is_ok() && matched
    }
}

/// Find the format of the container starting at the current position of `source`.
///
/// Formats are tried in [`ArchiveFormat::ALL`] order and the first match wins. The position of
/// `source` is restored before returning.
#[instrument(skip(source))]
pub fn try_identify<R: Read + Seek + ?Sized>(
    source: &mut R,
    name_hint: Option<&str>,
) -> Option<ArchiveFormat> {
    let start = source.stream_position().ok()?;
    let length = source.seek(SeekFrom::End(0)).ok()?.saturating_sub(start);

    let found = Window::new(&mut *source, start, Some(length))
        .ok()
        .and_then(|mut window| {
            ArchiveFormat::ALL
                .into_iter()
                .find(|format| format.codec().identify(&mut window, length, name_hint))
        });

    source.seek(SeekFrom::Start(start)).ok()?;

    debug!(?found, length, "identified container");
    found
}

/// Whether the file name hint ends with `.extension`, ignoring case
pub(crate) fn has_extension(name_hint: Option<&str>, extension: &str) -> bool {
    name_hint
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod test {
    use std::io::{Cursor, Seek, SeekFrom};

    use pretty_assertions::assert_eq;

    use crate::format::{has_extension, try_identify, ArchiveFormat};

    #[test]
    fn parse_format_names() {
        assert_eq!("afs".parse(), Ok(ArchiveFormat::Afs));
        assert_eq!("NARC".parse(), Ok(ArchiveFormat::Narc));
        assert_eq!("arc".parse(), Ok(ArchiveFormat::U8));
        assert_eq!("u8".parse(), Ok(ArchiveFormat::U8));
        assert!("zip".parse::<ArchiveFormat>().is_err());
    }

    #[test]
    fn registry_matches_formats() {
        for format in ArchiveFormat::ALL {
            assert_eq!(format.codec().format(), format);
        }
    }

    #[test]
    fn extension_hints() {
        assert!(has_extension(Some("stage01.ONE"), "one"));
        assert!(has_extension(Some("dir.v2/voice.acx"), "acx"));
        assert!(!has_extension(Some("acx"), "acx"));
        assert!(!has_extension(None, "acx"));
    }

    #[test]
    fn unknown_data_is_not_identified() -> crate::error::Result<()> {
        let mut input = Cursor::new(b"Hello, World! This is not an archive.".to_vec());
        input.seek(SeekFrom::Start(3))?;

        assert_eq!(try_identify(&mut input, None), None);
        assert_eq!(input.stream_position()?, 3);

        Ok(())
    }
}
