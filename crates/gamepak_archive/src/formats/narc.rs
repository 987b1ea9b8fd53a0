//! Nintendo NARC archives.
//!
//! Three sections follow the header. `BTAF` holds the file spans, `BTNF` the directory tree and
//! file names, and `GMIF` the file data. Spans in `BTAF` are relative to the start of the
//! `GMIF` payload. Names are optional, an unnamed archive has a single root directory with an
//! empty listing.

use binrw::{BinRead, BinWrite};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::collections::VecDeque;
use std::io::{Cursor, Read, SeekFrom};
use tracing::{debug, trace};

use crate::{
    entry::{Catalog, TextureMetadata},
    error::{Error, RejectionReason, Result},
    format::{ArchiveCodec, ArchiveFormat},
    io::{align, pad_to_block, ReadSeek, TextEncoding, WriteSeek},
    tree::{join_path, split_path, Child, DirectoryTree},
    write::{field_u32, write_entry, PendingEntry, Progress, WriterOptions},
};

const HEADER_SIZE: u16 = 0x10;
const SECTION_HEADER_SIZE: u64 = 8;
const BLOCK: u64 = ArchiveFormat::Narc.block_size();
const FILE_LENGTH_OFFSET: u64 = 8;

const BTAF: [u8; 4] = *b"BTAF";
const BTNF: [u8; 4] = *b"BTNF";
const GMIF: [u8; 4] = *b"GMIF";

const DIRECTORY_FLAG: u8 = 0x80;
const DIRECTORY_ID: u16 = 0xF000;
const MAX_NAME: usize = 0x7F;
const MAX_DIRECTORIES: usize = 0x1000;
const DIRECTORY_ROW_SIZE: u64 = 8;

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little, magic = b"NARC")]
struct NarcHeader {
    #[brw(magic = 0xFFFEu16)]
    version: u16,
    file_length: u32,
    header_length: u16,
    section_count: u16,
}

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(little)]
struct SectionHeader {
    magic: [u8; 4],
    length: u32,
}

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
struct FileSpan {
    start: u32,
    end: u32,
}

/// Row of the main directory table in `BTNF`
#[derive(Debug, Copy, Clone, PartialEq)]
struct DirectoryRow {
    sub_table: u32,
    first_file: u16,
    /// Directory count for the root, `0xF000 | parent` for the rest
    parent: u16,
}

impl DirectoryRow {
    fn read(table: &mut Cursor<&[u8]>, id: u16) -> Result<Self> {
        table.set_position(u64::from(id) * DIRECTORY_ROW_SIZE);
        Ok(Self {
            sub_table: table.read_u32::<LE>()?,
            first_file: table.read_u16::<LE>()?,
            parent: table.read_u16::<LE>()?,
        })
    }

    fn write(&self, table: &mut Vec<u8>) -> Result<()> {
        table.write_u32::<LE>(self.sub_table)?;
        table.write_u16::<LE>(self.first_file)?;
        table.write_u16::<LE>(self.parent)?;
        Ok(())
    }
}

fn read_section(source: &mut dyn ReadSeek, magic: [u8; 4], length: u64) -> Result<(u64, u64)> {
    let mut source = source;
    let start = source.stream_position()?;
    let section = SectionHeader::read(&mut source)?;

    if section.magic != magic {
        return Err(Error::invalid(
            ArchiveFormat::Narc,
            format!("expected a {} section at {start:#x}", String::from_utf8_lossy(&magic)),
        ));
    }

    let section_length = u64::from(section.length);
    if section_length < SECTION_HEADER_SIZE || start + section_length > length {
        return Err(Error::invalid(
            ArchiveFormat::Narc,
            format!("{} section length {section_length:#x} is out of range", String::from_utf8_lossy(&magic)),
        ));
    }

    Ok((start, section_length))
}

/// Walk the directory tree breadth first, naming every file it lists
fn file_paths(table: &[u8], count: usize) -> Result<Vec<String>> {
    let mut paths = vec![String::new(); count];
    let mut table = Cursor::new(table);

    let root = DirectoryRow::read(&mut table, 0)?;
    let directory_count = usize::from(root.parent);
    if directory_count == 0 || directory_count > MAX_DIRECTORIES {
        return Err(Error::invalid(
            ArchiveFormat::Narc,
            format!("root directory claims {directory_count} directories"),
        ));
    }

    let mut visited = vec![false; directory_count];
    let mut queue = VecDeque::from([(0u16, String::new())]);

    while let Some((id, base)) = queue.pop_front() {
        let Some(seen) = visited.get_mut(usize::from(id)) else {
            return Err(Error::invalid(ArchiveFormat::Narc, format!("directory {id:#x} does not exist")));
        };
        if std::mem::replace(seen, true) {
            return Err(Error::invalid(ArchiveFormat::Narc, format!("directory {id:#x} is listed twice")));
        }

        let row = DirectoryRow::read(&mut table, id)?;
        table.set_position(row.sub_table.into());

        let mut file = usize::from(row.first_file);
        loop {
            let length = table.read_u8()?;
            if length == 0 {
                break;
            }

            let mut name = vec![0u8; usize::from(length & !DIRECTORY_FLAG)];
            table.read_exact(&mut name)?;
            let path = join_path(&base, &TextEncoding::Utf8.decode(&name));

            if length & DIRECTORY_FLAG != 0 {
                let child = table.read_u16::<LE>()? & !DIRECTORY_ID;
                queue.push_back((child, path));
            } else {
                let Some(slot) = paths.get_mut(file) else {
                    return Err(Error::invalid(
                        ArchiveFormat::Narc,
                        format!("{path} names file {file}, but there are only {count}"),
                    ));
                };
                *slot = path;
                file += 1;
            }
        }
    }

    Ok(paths)
}

/// Build the `BTNF` payload, with the files of each directory numbered from `first_files`
fn name_table(tree: &DirectoryTree, first_files: &[u16]) -> Result<Vec<u8>> {
    let directories = tree.directories();
    let main_size = DIRECTORY_ROW_SIZE as usize * directories.len();

    let mut main = Vec::with_capacity(main_size);
    let mut listings = Vec::new();

    for (id, directory) in directories.iter().enumerate() {
        let parent = if id == 0 {
            directories.len() as u16
        } else {
            DIRECTORY_ID | directory.parent as u16
        };
        DirectoryRow {
            sub_table: field_u32((main_size + listings.len()) as u64, ArchiveFormat::Narc)?,
            first_file: first_files[id],
            parent,
        }
        .write(&mut main)?;

        for child in &directory.children {
            match child {
                Child::File { name, .. } => {
                    listings.push(name.len() as u8);
                    listings.extend_from_slice(name.as_bytes());
                }
                Child::Directory(child) => {
                    let name = &tree.directory(*child).name;
                    listings.push(DIRECTORY_FLAG | name.len() as u8);
                    listings.extend_from_slice(name.as_bytes());
                    listings.write_u16::<LE>(DIRECTORY_ID | *child as u16)?;
                }
            }
        }
        listings.push(0);
    }

    main.append(&mut listings);
    Ok(main)
}

fn unnamed_table() -> Result<Vec<u8>> {
    let mut table = Vec::with_capacity(9);
    DirectoryRow {
        sub_table: DIRECTORY_ROW_SIZE as u32,
        first_file: 0,
        parent: 1,
    }
    .write(&mut table)?;
    table.push(0);
    Ok(table)
}

pub(crate) struct Narc;

impl ArchiveCodec for Narc {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Narc
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, _name_hint: Option<&str>) -> Result<bool> {
        if length < u64::from(HEADER_SIZE) + SECTION_HEADER_SIZE {
            return Ok(false);
        }

        let mut source = source;
        source.seek(SeekFrom::Start(0))?;
        let header = NarcHeader::read(&mut source)?;

        source.seek(SeekFrom::Start(header.header_length.into()))?;
        read_section(source, BTAF, length)?;
        Ok(true)
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;
        let header = NarcHeader::read(&mut source)?;
        if u64::from(header.file_length) != length {
            debug!(file_length = header.file_length, length, "header length disagrees with the container");
        }

        source.seek(SeekFrom::Start(header.header_length.into()))?;
        let (fat_start, fat_length) = read_section(source, BTAF, length)?;
        let count = source.read_u16::<LE>()?;
        let _reserved = source.read_u16::<LE>()?;
        let spans = (0..count)
            .map(|_| FileSpan::read(&mut source))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        source.seek(SeekFrom::Start(fat_start + fat_length))?;
        let (fnt_start, fnt_length) = read_section(source, BTNF, length)?;
        let mut table = vec![0u8; (fnt_length - SECTION_HEADER_SIZE) as usize];
        source.read_exact(&mut table)?;

        source.seek(SeekFrom::Start(fnt_start + fnt_length))?;
        let (gmif_start, _) = read_section(source, GMIF, length)?;
        let data_start = gmif_start + SECTION_HEADER_SIZE;

        let paths = file_paths(&table, spans.len())?;

        let mut catalog = Catalog::default();
        for (index, (span, path)) in spans.iter().zip(paths).enumerate() {
            let Some(file_length) = span.end.checked_sub(span.start) else {
                return Err(Error::invalid(
                    ArchiveFormat::Narc,
                    format!("file {index} ends at {:#x} before it starts at {:#x}", span.end, span.start),
                ));
            };
            trace!(index, path = %path, start = span.start, file_length, "file");
            catalog.push(path, data_start + u64::from(span.start), file_length.into());
        }

        Ok(catalog)
    }

    fn accept(
        &self,
        name: &str,
        _content: &mut dyn ReadSeek,
        options: &WriterOptions,
    ) -> Result<Option<TextureMetadata>> {
        if !options.store_names {
            return Ok(None);
        }

        let mut components = split_path(name).peekable();
        if components.peek().is_none() {
            return Err(Error::rejected(name, ArchiveFormat::Narc, RejectionReason::EmptyPath));
        }
        if components.any(|component| component.len() > MAX_NAME) {
            return Err(Error::rejected(
                name,
                ArchiveFormat::Narc,
                RejectionReason::NameTooLong { max: MAX_NAME },
            ));
        }

        Ok(None)
    }

    fn write(
        &self,
        sink: &mut dyn WriteSeek,
        entries: &mut [PendingEntry<'_>],
        options: &WriterOptions,
        progress: &mut Progress<'_, '_>,
    ) -> Result<()> {
        let mut sink = sink;
        let count = u16::try_from(entries.len()).map_err(|_| Error::ArchiveTooLarge(ArchiveFormat::Narc))?;

        // File ids run through the directories in table order
        let (order, table) = if options.store_names {
            let tree = DirectoryTree::from_paths(entries.iter().map(|entry| entry.name()));
            if tree.directories().len() > MAX_DIRECTORIES {
                return Err(Error::ArchiveTooLarge(ArchiveFormat::Narc));
            }

            let mut order = Vec::with_capacity(entries.len());
            let mut first_files = Vec::with_capacity(tree.directories().len());
            for directory in tree.directories() {
                first_files.push(order.len() as u16);
                order.extend(directory.children.iter().filter_map(|child| match child {
                    Child::File { entry, .. } => Some(*entry),
                    Child::Directory(_) => None,
                }));
            }
            let table = name_table(&tree, &first_files)?;
            (order, table)
        } else {
            ((0..entries.len()).collect(), unnamed_table()?)
        };

        NarcHeader {
            version: 0x0100,
            file_length: 0,
            header_length: HEADER_SIZE,
            section_count: 3,
        }
        .write(&mut sink)?;

        SectionHeader {
            magic: BTAF,
            length: field_u32(12 + 8 * u64::from(count), ArchiveFormat::Narc)?,
        }
        .write(&mut sink)?;
        sink.write_u16::<LE>(count)?;
        sink.write_u16::<LE>(0)?;

        let mut offset = 0;
        for &entry in &order {
            let end = offset + entries[entry].length();
            FileSpan {
                start: field_u32(offset, ArchiveFormat::Narc)?,
                end: field_u32(end, ArchiveFormat::Narc)?,
            }
            .write(&mut sink)?;
            offset = align(end, BLOCK);
        }
        let data_length = offset;

        SectionHeader {
            magic: BTNF,
            length: field_u32(align(SECTION_HEADER_SIZE + table.len() as u64, BLOCK), ArchiveFormat::Narc)?,
        }
        .write(&mut sink)?;
        sink.write_all(&table)?;
        pad_to_block(sink, BLOCK)?;

        SectionHeader {
            magic: GMIF,
            length: field_u32(SECTION_HEADER_SIZE + data_length, ArchiveFormat::Narc)?,
        }
        .write(&mut sink)?;

        for (index, &entry) in order.iter().enumerate() {
            write_entry(sink, &mut entries[entry], index, BLOCK, progress)?;
        }

        let file_length = sink.stream_position()?;
        sink.seek(SeekFrom::Start(FILE_LENGTH_OFFSET))?;
        sink.write_u32::<LE>(field_u32(file_length, ArchiveFormat::Narc)?)?;
        sink.seek(SeekFrom::Start(file_length))?;

        Ok(())
    }
}
