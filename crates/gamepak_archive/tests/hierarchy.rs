mod common;

use std::collections::BTreeMap;
use std::io::Cursor;

use common::{read_all, write_archive};
use gamepak_archive::{ArchiveFormat, ArchiveReader, WriterOptions};
use miette::Result;
use pretty_assertions::assert_eq;
use tracing::instrument;
use tracing_test::traced_test;

const HIERARCHICAL: [ArchiveFormat; 2] = [ArchiveFormat::Narc, ArchiveFormat::U8];

fn entries(paths: &[&str]) -> Vec<(String, Vec<u8>)> {
    paths
        .iter()
        .map(|path| (path.to_string(), path.as_bytes().repeat(3)))
        .collect()
}

#[instrument(skip(input))]
fn reopen(format: ArchiveFormat, input: &[(String, Vec<u8>)]) -> Result<BTreeMap<String, Vec<u8>>> {
    let data = write_archive(format, input, WriterOptions::default())?;
    let mut reader = ArchiveReader::new(Cursor::new(data))?;
    assert_eq!(reader.format(), format);
    Ok(read_all(&mut reader)?.into_iter().collect())
}

#[traced_test]
#[test]
fn directory_roundtrip() -> Result<()> {
    for format in HIERARCHICAL {
        let input = entries(&["a/b/f1", "a/c/f2", "f3"]);
        let output = reopen(format, &input)?;

        assert_eq!(output, input.into_iter().collect::<BTreeMap<_, _>>());
    }

    Ok(())
}

#[test]
fn new_sibling_leaves_others_intact() -> Result<()> {
    for format in HIERARCHICAL {
        let input = entries(&["a/b/f1", "a/c/f2", "f3", "a/b/f4"]);
        let output = reopen(format, &input)?;

        assert_eq!(output.len(), 4, "{format}");
        assert_eq!(output["a/b/f1"], b"a/b/f1a/b/f1a/b/f1");
        assert_eq!(output["a/c/f2"], b"a/c/f2a/c/f2a/c/f2");
        assert_eq!(output["a/b/f4"], b"a/b/f4a/b/f4a/b/f4");
        assert_eq!(output["f3"], b"f3f3f3");
    }

    Ok(())
}

#[test]
fn separators_and_case_are_normalized() -> Result<()> {
    for format in HIERARCHICAL {
        let input = entries(&["Stage\\one.bin", "stage/two.bin", "/stage//three.bin"]);
        let output = reopen(format, &input)?;

        let paths: Vec<&str> = output.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["Stage/one.bin", "Stage/three.bin", "Stage/two.bin"], "{format}");
    }

    Ok(())
}

#[test]
fn deep_nesting() -> Result<()> {
    for format in HIERARCHICAL {
        let input = entries(&["a/b/c/d/e/f.bin", "a/b/g.bin", "h/i.bin"]);
        let output = reopen(format, &input)?;

        assert_eq!(output, input.into_iter().collect::<BTreeMap<_, _>>(), "{format}");
    }

    Ok(())
}
