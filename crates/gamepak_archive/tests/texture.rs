mod common;

use std::io::Cursor;

use common::{read_all, texture, write_archive};
use gamepak_archive::{
    error::{Error, RejectionReason},
    ArchiveFormat, ArchiveReader, ArchiveWriter, TableFlags, WriterOptions,
};
use gamepak_texture::TextureKind;
use miette::Result;
use pretty_assertions::assert_eq;
use tracing_test::traced_test;

fn two_textures() -> Vec<(String, Vec<u8>)> {
    vec![
        ("ring.pvr".to_owned(), texture(TextureKind::Pvr, 0x10, 40)),
        ("spring.pvr".to_owned(), texture(TextureKind::Pvr, 0x20, 40)),
    ]
}

#[traced_test]
#[test]
fn last_texture_may_overrun_by_sixteen_bytes() -> Result<()> {
    let entries = two_textures();
    let mut data = write_archive(ArchiveFormat::Pvm, &entries, WriterOptions::default())?;
    let full = ArchiveReader::with_format(Cursor::new(data.clone()), ArchiveFormat::Pvm)?;
    let last = full.entries()[1].clone();

    data.truncate(last.end() as usize - 16);

    let reader = ArchiveReader::with_format(Cursor::new(data), ArchiveFormat::Pvm)?;
    assert_eq!(reader.entries()[1].length(), last.length() - 16);
    assert_eq!(reader.entries()[0].length(), full.entries()[0].length());
    assert!(logs_contain("overruns the container"));

    Ok(())
}

#[test]
fn larger_overruns_are_invalid() -> Result<()> {
    let entries = two_textures();
    let data = write_archive(ArchiveFormat::Pvm, &entries, WriterOptions::default())?;
    let full = ArchiveReader::with_format(Cursor::new(data.clone()), ArchiveFormat::Pvm)?;
    let first = full.entries()[0].clone();
    let last = full.entries()[1].clone();

    let mut short_last = data.clone();
    short_last.truncate(last.end() as usize - 17);
    let result = ArchiveReader::with_format(Cursor::new(short_last), ArchiveFormat::Pvm);
    assert!(matches!(result, Err(Error::InvalidArchive { .. })));

    // Only the last texture gets the allowance
    let mut short_first = data;
    short_first.truncate(first.end() as usize - 16);
    let result = ArchiveReader::with_format(Cursor::new(short_first), ArchiveFormat::Pvm);
    assert!(matches!(result, Err(Error::InvalidArchive { .. })));

    Ok(())
}

#[traced_test]
#[test]
fn rejection_leaves_output_unchanged() -> Result<()> {
    let entries = two_textures();
    let expected = write_archive(ArchiveFormat::Pvm, &entries, WriterOptions::default())?;

    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::Pvm, WriterOptions::default());
    writer.add_bytes(entries[0].0.as_str(), entries[0].1.clone())?;

    let error = writer
        .add_bytes("cube.gvr", texture(TextureKind::Gvr, 0x30, 40))
        .expect_err("a GVR texture does not belong in a PVM");
    assert_eq!(
        error.rejection().map(|rejected| rejected.reason.clone()),
        Some(RejectionReason::NotATexture {
            expected: TextureKind::Pvr
        })
    );

    let error = writer
        .add_bytes("readme.txt", b"plain text".to_vec())
        .expect_err("text is not a texture");
    assert!(error.is_rejected());

    writer.add_bytes(entries[1].0.as_str(), entries[1].1.clone())?;
    assert_eq!(writer.len(), 2);

    // Rejections are routine for callers building from a directory
    assert!(!logs_contain("ERROR"));

    let actual = writer.finish()?.into_inner();
    assert_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));

    Ok(())
}

#[test]
fn texture_length_must_match_content() -> Result<()> {
    let entries = two_textures();
    let expected = write_archive(ArchiveFormat::Pvm, &entries, WriterOptions::default())?;
    let declared = entries[0].1.len() as u64;

    let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()), ArchiveFormat::Pvm, WriterOptions::default());

    let mut padded = entries[0].1.clone();
    padded.extend_from_slice(&[0xAA; 32]);
    let error = writer
        .add_bytes("padded.pvr", padded)
        .expect_err("trailing bytes would misplace the next texture");
    assert_eq!(
        error.rejection().map(|rejected| rejected.reason.clone()),
        Some(RejectionReason::LengthMismatch {
            declared,
            actual: declared + 32
        })
    );

    let mut short = entries[0].1.clone();
    short.truncate(short.len() - 20);
    let error = writer
        .add_bytes("short.pvr", short)
        .expect_err("a truncated texture would misplace the next texture");
    assert_eq!(
        error.rejection().map(|rejected| rejected.reason.clone()),
        Some(RejectionReason::LengthMismatch {
            declared,
            actual: declared - 20
        })
    );

    for (name, data) in &entries {
        writer.add_bytes(name.as_str(), data.clone())?;
    }
    let actual = writer.finish()?.into_inner();
    assert_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));

    let mut reader = ArchiveReader::with_format(Cursor::new(actual), ArchiveFormat::Pvm)?;
    assert_eq!(read_all(&mut reader)?, entries);

    Ok(())
}

#[test]
fn table_fields_follow_flags() -> Result<()> {
    let entries = vec![("boss.gvr".to_owned(), texture(TextureKind::Gvr, 0x42, 64))];

    let full = write_archive(ArchiveFormat::Gvm, &entries, WriterOptions::default())?;
    let reader = ArchiveReader::with_format(Cursor::new(full), ArchiveFormat::Gvm)?;
    let metadata = reader.texture_metadata(0).copied().unwrap_or_default();
    assert_eq!(metadata.global_index, Some(0x42));
    assert_eq!(metadata.data_format, Some(0x0E));
    assert_eq!(metadata.width(), Some(16));
    assert_eq!(reader.name_for_index(0), Some("boss.gvr"));

    let options = WriterOptions::builder()
        .texture_table(TableFlags::new(TableFlags::GLOBAL_INDEX))
        .build();
    let bare = write_archive(ArchiveFormat::Gvm, &entries, options)?;
    let mut reader = ArchiveReader::with_format(Cursor::new(bare), ArchiveFormat::Gvm)?;
    let metadata = reader.texture_metadata(0).copied().unwrap_or_default();
    assert_eq!(metadata.global_index, Some(0x42));
    assert_eq!(metadata.data_format, None);
    assert_eq!(reader.name_for_index(0), Some(""));

    // Entry lengths come from the texture itself, so content survives without the optional fields
    assert_eq!(read_all(&mut reader)?[0].1, entries[0].1);

    Ok(())
}

#[test]
fn names_can_be_left_out() -> Result<()> {
    let options = WriterOptions::builder().store_names(false).build();
    let data = write_archive(ArchiveFormat::Xvm, &[("a.xvr".to_owned(), texture(TextureKind::Xvr, 1, 8))], options)?;

    let reader = ArchiveReader::with_format(Cursor::new(data), ArchiveFormat::Xvm)?;
    assert_eq!(reader.file_names().count(), 0);
    assert_eq!(reader.texture_metadata(0).and_then(|m| m.global_index), Some(1));

    Ok(())
}
