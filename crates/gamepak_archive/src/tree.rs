//! Directory trees built from flat entry paths, for the hierarchical formats.

/// A directory of the tree, children kept in insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Directory {
    pub name: String,
    pub parent: usize,
    pub children: Vec<Child>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Child {
    /// Index of a directory in the arena
    Directory(usize),
    /// A file and the index of the entry it came from
    File { name: String, entry: usize },
}

/// Arena of directories, the root is always at index 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DirectoryTree {
    directories: Vec<Directory>,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self {
            directories: vec![Directory {
                name: String::new(),
                parent: 0,
                children: Vec::new(),
            }],
        }
    }
}

impl DirectoryTree {
    /// Build a tree where file `i` comes from the `i`th path
    pub fn from_paths<'s>(paths: impl IntoIterator<Item = &'s str>) -> Self {
        let mut tree = Self::default();
        for (entry, path) in paths.into_iter().enumerate() {
            tree.insert(path, entry);
        }
        tree
    }

    /// Insert a file, creating its directories on the way.
    ///
    /// Directories are matched ignoring case. Paths without a component are ignored.
    pub fn insert(&mut self, path: &str, entry: usize) {
        let mut components: Vec<&str> = split_path(path).collect();
        let Some(file_name) = components.pop() else {
            return;
        };

        let mut directory = 0;
        for component in components {
            directory = self.child_directory(directory, component);
        }

        self.directories[directory].children.push(Child::File {
            name: file_name.to_owned(),
            entry,
        });
    }

    fn child_directory(&mut self, parent: usize, name: &str) -> usize {
        let existing = self.directories[parent]
            .children
            .iter()
            .find_map(|child| match child {
                Child::Directory(id) if same_name(&self.directories[*id].name, name) => Some(*id),
                _ => None,
            });

        if let Some(id) = existing {
            return id;
        }

        let id = self.directories.len();
        self.directories.push(Directory {
            name: name.to_owned(),
            parent,
            children: Vec::new(),
        });
        self.directories[parent].children.push(Child::Directory(id));
        id
    }

    /// All directories, the root first
    pub fn directories(&self) -> &[Directory] {
        &self.directories
    }

    pub fn directory(&self, id: usize) -> &Directory {
        &self.directories[id]
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Split a path on either separator, dropping empty components
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|component| !component.is_empty())
}

/// Append `name` to a directory path
pub(crate) fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_owned()
    } else {
        format!("{base}/{name}")
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::tree::{join_path, split_path, Child, DirectoryTree};

    #[test]
    fn directories_merge_ignoring_case() {
        let tree = DirectoryTree::from_paths(["Stage/a.bin", "stage\\b.bin", "c.bin", "/stage//Sub/d.bin"]);

        let root = tree.directory(0);
        assert_eq!(
            root.children,
            vec![
                Child::Directory(1),
                Child::File {
                    name: "c.bin".into(),
                    entry: 2
                },
            ]
        );

        let stage = tree.directory(1);
        assert_eq!(stage.name, "Stage");
        assert_eq!(
            stage.children,
            vec![
                Child::File {
                    name: "a.bin".into(),
                    entry: 0
                },
                Child::File {
                    name: "b.bin".into(),
                    entry: 1
                },
                Child::Directory(2),
            ]
        );

        assert_eq!(tree.directory(2).name, "Sub");
        assert_eq!(tree.directory(2).parent, 1);
        assert_eq!(tree.directories().len(), 3);
    }

    #[test]
    fn empty_paths_are_ignored() {
        let tree = DirectoryTree::from_paths(["", "//"]);
        assert!(tree.directory(0).children.is_empty());
    }

    #[test]
    fn path_helpers() {
        assert_eq!(split_path("a\\b//c").collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(join_path("", "file"), "file");
        assert_eq!(join_path("a/b", "file"), "a/b/file");
    }
}
