//! Readers and writers for each container format.

use binrw::{BinRead, BinWrite};

use crate::{
    error::{Error, RejectionReason, Result},
    format::ArchiveFormat,
    io::TextEncoding,
};

mod acx;
mod afs;
mod mrg;
mod narc;
mod ninja;
mod one;
mod spk;
mod tex;
mod texture_container;
mod u8_archive;

pub(crate) use acx::Acx;
pub(crate) use afs::Afs;
pub(crate) use mrg::Mrg;
pub(crate) use narc::Narc;
pub(crate) use ninja::{GNT, SNT};
pub(crate) use one::One;
pub(crate) use spk::Spk;
pub(crate) use tex::Tex;
pub use texture_container::TableFlags;
pub(crate) use texture_container::{GVM, PVM, SVM, XVM};
pub(crate) use u8_archive::U8Archive;

/// Offset and length pair, the most common table row
///
/// Byte order is picked by the caller, formats disagree on it.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Span {
    pub offset: u32,
    pub length: u32,
}

impl Span {
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.length)
    }
}

/// Encode `name` for a fixed width field, refusing names that do not fit
pub(crate) fn fixed_name(
    format: ArchiveFormat,
    name: &str,
    width: usize,
    encoding: TextEncoding,
) -> Result<Vec<u8>> {
    let bytes = encoding.encode(name).ok_or_else(|| {
        Error::rejected(name, format, RejectionReason::NameNotEncodable(encoding.name()))
    })?;

    if bytes.len() > width {
        return Err(Error::rejected(
            name,
            format,
            RejectionReason::NameTooLong { max: width },
        ));
    }

    Ok(bytes)
}

/// Size of a table of `count` rows of `row` bytes after a `header`, or `None` on overflow
pub(crate) fn table_end(header: u64, count: u64, row: u64) -> Option<u64> {
    count.checked_mul(row)?.checked_add(header)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::RejectionReason;
    use crate::format::ArchiveFormat;
    use crate::formats::fixed_name;
    use crate::io::TextEncoding;

    #[test]
    fn fixed_names() {
        assert_eq!(
            fixed_name(ArchiveFormat::Tex, "ring.gvr", 20, TextEncoding::ShiftJis).ok(),
            Some(b"ring.gvr".to_vec())
        );

        let too_long = fixed_name(ArchiveFormat::Tex, "a_very_long_texture_name.gvr", 20, TextEncoding::ShiftJis);
        assert_eq!(
            too_long.err().and_then(|e| e.rejection().map(|r| r.reason.clone())),
            Some(RejectionReason::NameTooLong { max: 20 })
        );

        let emoji = fixed_name(ArchiveFormat::One, "\u{1F600}", 32, TextEncoding::ShiftJis);
        assert_eq!(
            emoji.err().and_then(|e| e.rejection().map(|r| r.reason.clone())),
            Some(RejectionReason::NameNotEncodable("Shift-JIS"))
        );
    }
}
