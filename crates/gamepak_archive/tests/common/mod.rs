#![allow(dead_code)]

use std::io::{Cursor, Read};

use gamepak_archive::{ArchiveFormat, ArchiveReader, ArchiveWriter, WriterOptions};
use gamepak_texture::{TextureHeader, TextureKind};
use miette::{IntoDiagnostic, Result};

/// Texture codec a container format requires, if any
pub fn texture_kind(format: ArchiveFormat) -> Option<TextureKind> {
    match format {
        ArchiveFormat::Pvm => Some(TextureKind::Pvr),
        ArchiveFormat::Svm => Some(TextureKind::Svr),
        ArchiveFormat::Gvm => Some(TextureKind::Gvr),
        ArchiveFormat::Xvm => Some(TextureKind::Xvr),
        _ => None,
    }
}

/// Whether reading an archive written with default options gives back the entry names
pub fn stores_names(format: ArchiveFormat) -> bool {
    !matches!(format, ArchiveFormat::Acx | ArchiveFormat::Gnt | ArchiveFormat::Snt)
}

/// A small texture of `kind`, with `fill` repeated as its pixel data
pub fn texture(kind: TextureKind, fill: u8, pixels: usize) -> Vec<u8> {
    let data_format = match kind {
        TextureKind::Pvr => 0x01,
        TextureKind::Svr => 0x62,
        TextureKind::Gvr => 0x0E,
        TextureKind::Xvr => 0x0C,
    };

    TextureHeader::new(kind, 0x01, data_format, 16, 16)
        .with_global_index(u32::from(fill))
        .encode(&vec![fill; pixels])
        .expect("texture encodes")
}

/// Content suitable for `format`, distinct for every `seed`
pub fn content(format: ArchiveFormat, seed: u8, length: usize) -> Vec<u8> {
    match texture_kind(format) {
        Some(kind) => texture(kind, seed, length),
        None => (0..length).map(|i| seed.wrapping_add(i as u8)).collect(),
    }
}

/// `count` named entries with lengths that do not line up with any block size
pub fn sample_entries(format: ArchiveFormat, count: usize) -> Vec<(String, Vec<u8>)> {
    (0..count)
        .map(|i| {
            let name = if stores_names(format) {
                format!("file{i}.bin")
            } else {
                String::new()
            };
            (name, content(format, i as u8 + 1, 5 + 7 * i))
        })
        .collect()
}

pub fn write_archive(
    format: ArchiveFormat,
    entries: &[(String, Vec<u8>)],
    options: WriterOptions,
) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), format, options);
    for (name, data) in entries {
        writer.add_bytes(name.as_str(), data.clone())?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Decoded content of every entry, paired with its path
pub fn read_all<R: Read + std::io::Seek>(reader: &mut ArchiveReader<R>) -> Result<Vec<(String, Vec<u8>)>> {
    let mut out = Vec::with_capacity(reader.len());
    for i in 0..reader.len() {
        let mut file = reader.by_index(i)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).into_diagnostic()?;
        out.push((file.path().to_owned(), buffer));
    }
    Ok(out)
}
