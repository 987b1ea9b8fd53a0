//! U8 archives.
//!
//! The directory tree is flattened depth first into a table of 12 byte nodes. A directory node
//! records its parent and the index one past its last descendant, so the table can be walked in
//! a single pass.

use binrw::{BinRead, BinWrite};
use std::io::SeekFrom;
use tracing::trace;

use crate::{
    entry::{Catalog, TextureMetadata},
    error::{Error, RejectionReason, Result},
    format::{ArchiveCodec, ArchiveFormat},
    formats::table_end,
    io::{align, pad_to_block, ReadSeek, TextEncoding, WriteSeek},
    tree::{join_path, split_path, Child, DirectoryTree},
    write::{field_u32, write_entry, PendingEntry, Progress, WriterOptions},
};

const ROOT_OFFSET: u32 = 0x20;
const NODE_SIZE: u64 = 12;
const BLOCK: u64 = ArchiveFormat::U8.block_size();
const DIRECTORY: u32 = 0x0100_0000;
const NAME_MASK: u32 = 0x00FF_FFFF;

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(big, magic = 0x55AA_382Du32)]
struct U8Header {
    root_offset: u32,
    /// Size of the node table and the string table together
    header_size: u32,
    #[brw(pad_after = 16)]
    data_offset: u32,
}

#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(big)]
struct Node {
    type_name: u32,
    /// File offset, or the parent index for directories
    data_offset: u32,
    /// File length, or the end index for directories
    size: u32,
}

impl Node {
    fn is_directory(&self) -> bool {
        self.type_name & !NAME_MASK == DIRECTORY
    }

    fn name_offset(&self) -> usize {
        (self.type_name & NAME_MASK) as usize
    }
}

/// Node table being laid out for writing
#[derive(Debug)]
struct Layout {
    nodes: Vec<Planned>,
    strings: Vec<u8>,
}

#[derive(Debug)]
enum Planned {
    Directory { name: u32, parent: u32, end: u32 },
    File { name: u32, entry: usize },
}

impl Layout {
    fn new(tree: &DirectoryTree) -> Result<Self> {
        let mut layout = Layout {
            nodes: Vec::new(),
            strings: vec![0],
        };
        layout.flatten(tree, 0, 0)?;
        Ok(layout)
    }

    fn intern(&mut self, name: &str) -> Result<u32> {
        if name.is_empty() {
            return Ok(0);
        }

        let offset = self.strings.len() as u64;
        if offset > u64::from(NAME_MASK) {
            return Err(Error::ArchiveTooLarge(ArchiveFormat::U8));
        }
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        Ok(offset as u32)
    }

    fn flatten(&mut self, tree: &DirectoryTree, id: usize, parent: u32) -> Result<()> {
        let directory = tree.directory(id);
        let index = self.nodes.len();
        let name = self.intern(&directory.name)?;
        self.nodes.push(Planned::Directory { name, parent, end: 0 });

        for child in &directory.children {
            match child {
                Child::Directory(child) => self.flatten(tree, *child, index as u32)?,
                Child::File { name, entry } => {
                    let name = self.intern(name)?;
                    self.nodes.push(Planned::File { name, entry: *entry });
                }
            }
        }

        let count = self.nodes.len() as u32;
        if let Planned::Directory { end, .. } = &mut self.nodes[index] {
            *end = count;
        }
        Ok(())
    }

    fn header_size(&self) -> u64 {
        NODE_SIZE * self.nodes.len() as u64 + self.strings.len() as u64
    }
}

pub(crate) struct U8Archive;

impl U8Archive {
    fn read_header(source: &mut dyn ReadSeek, length: u64) -> Result<(U8Header, Node)> {
        let mut source = source;
        source.seek(SeekFrom::Start(0))?;
        let header = U8Header::read(&mut source)?;

        source.seek(SeekFrom::Start(header.root_offset.into()))?;
        let root = Node::read(&mut source)?;
        if !root.is_directory() {
            return Err(Error::invalid(ArchiveFormat::U8, "root node is not a directory"));
        }

        let tables_end = u64::from(header.root_offset) + u64::from(header.header_size);
        let nodes_fit = table_end(header.root_offset.into(), root.size.into(), NODE_SIZE)
            .is_some_and(|end| end <= tables_end);
        if !nodes_fit || tables_end > length {
            return Err(Error::invalid(
                ArchiveFormat::U8,
                format!("{} nodes do not fit the {:#x} byte header", root.size, header.header_size),
            ));
        }

        Ok((header, root))
    }
}

impl ArchiveCodec for U8Archive {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::U8
    }

    fn probe(&self, source: &mut dyn ReadSeek, length: u64, _name_hint: Option<&str>) -> Result<bool> {
        if length < u64::from(ROOT_OFFSET) + NODE_SIZE {
            return Ok(false);
        }

        let (_, root) = Self::read_header(source, length)?;
        Ok(root.size >= 1)
    }

    fn read(&self, source: &mut dyn ReadSeek, length: u64) -> Result<Catalog> {
        let mut source = source;
        let (header, root) = Self::read_header(source, length)?;

        let nodes = (1..root.size)
            .map(|_| Node::read(&mut source))
            .collect::<binrw::BinResult<Vec<_>>>()?;

        let strings_length = u64::from(header.header_size) - NODE_SIZE * u64::from(root.size);
        let mut strings = vec![0u8; strings_length as usize];
        source.read_exact(&mut strings)?;

        let name = |node: &Node| -> Result<String> {
            strings
                .get(node.name_offset()..)
                .map(|field| TextEncoding::Utf8.decode(field))
                .ok_or_else(|| {
                    Error::invalid(
                        ArchiveFormat::U8,
                        format!("name offset {:#x} is past the string table", node.name_offset()),
                    )
                })
        };

        // Directories still open, with the index their subtree ends at
        let mut open: Vec<(u32, String)> = vec![(root.size, String::new())];
        let mut catalog = Catalog::default();

        for (index, node) in (1..).zip(&nodes) {
            while open.len() > 1 && open.last().is_some_and(|(end, _)| index >= *end) {
                open.pop();
            }
            let Some((parent_end, base)) = open.last() else {
                break;
            };

            let path = join_path(base, &name(node)?);
            if node.is_directory() {
                if node.size <= index || node.size > *parent_end {
                    return Err(Error::invalid(
                        ArchiveFormat::U8,
                        format!("directory {path} ends at node {}, outside its parent", node.size),
                    ));
                }
                trace!(index, path = %path, end = node.size, "directory");
                open.push((node.size, path));
            } else {
                trace!(index, path = %path, offset = node.data_offset, length = node.size, "file");
                catalog.push(path, node.data_offset.into(), node.size.into());
            }
        }

        Ok(catalog)
    }

    fn accept(
        &self,
        name: &str,
        _content: &mut dyn ReadSeek,
        _options: &WriterOptions,
    ) -> Result<Option<TextureMetadata>> {
        if split_path(name).next().is_none() {
            return Err(Error::rejected(name, ArchiveFormat::U8, RejectionReason::EmptyPath));
        }
        Ok(None)
    }

    fn write(
        &self,
        sink: &mut dyn WriteSeek,
        entries: &mut [PendingEntry<'_>],
        _options: &WriterOptions,
        progress: &mut Progress<'_, '_>,
    ) -> Result<()> {
        let mut sink = sink;
        let tree = DirectoryTree::from_paths(entries.iter().map(|entry| entry.name()));
        let layout = Layout::new(&tree)?;

        let header_size = layout.header_size();
        let data_offset = align(u64::from(ROOT_OFFSET) + header_size, BLOCK);

        U8Header {
            root_offset: ROOT_OFFSET,
            header_size: field_u32(header_size, ArchiveFormat::U8)?,
            data_offset: field_u32(data_offset, ArchiveFormat::U8)?,
        }
        .write(&mut sink)?;

        let mut order = Vec::with_capacity(entries.len());
        let mut offset = data_offset;
        for planned in &layout.nodes {
            let node = match *planned {
                Planned::Directory { name, parent, end } => Node {
                    type_name: DIRECTORY | name,
                    data_offset: parent,
                    size: end,
                },
                Planned::File { name, entry } => {
                    let length = entries[entry].length();
                    let node = Node {
                        type_name: name,
                        data_offset: field_u32(offset, ArchiveFormat::U8)?,
                        size: field_u32(length, ArchiveFormat::U8)?,
                    };
                    order.push(entry);
                    offset = align(offset + length, BLOCK);
                    node
                }
            };
            node.write(&mut sink)?;
        }
        sink.write_all(&layout.strings)?;
        pad_to_block(sink, BLOCK)?;

        for (index, &entry) in order.iter().enumerate() {
            write_entry(sink, &mut entries[entry], index, BLOCK, progress)?;
        }

        Ok(())
    }
}
