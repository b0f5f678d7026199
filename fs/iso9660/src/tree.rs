// Copyright 2024 Kevin Ludwig
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The in-memory hierarchy mirroring the caller's file set. Children are
//! owned downward through the arena; the parent back-reference is a plain
//! index, never a borrowed or raw pointer.

use std::path::PathBuf;

use crate::error::{ConfigError, DataError, Result};

pub mod flags {
    pub const DIRECTORY: u16 = 1 << 0;
    pub const IMPORTED: u16 = 1 << 1;
    pub const HIDDEN: u16 = 1 << 2;
    /// Set on nodes dropped from the ISO 9660/Joliet directory listing
    /// during allocation (depth limit exceeded, or oversized with
    /// fragmentation disallowed). The node is excluded from path tables
    /// and directory records in both namespaces. Its data may still be
    /// written into the image: see [`OMITTED`] for the narrower case.
    pub const SKIPPED: u16 = 1 << 3;
    pub const MULTI_EXTENT_TAIL: u16 = 1 << 4;
    /// Set together with [`SKIPPED`] when the node must be absent from
    /// the image entirely — directory depth exceeded, or oversized with
    /// neither fragmentation nor a UDF view to fall back to. A node that
    /// is `SKIPPED` but not `OMITTED` (an oversized file under a UDF
    /// mode) still gets its data allocated and copied; only its ISO 9660/
    /// Joliet directory entry is missing.
    pub const OMITTED: u16 = 1 << 5;
}

/// Timestamp, flags and extent location inherited verbatim from a
/// previously written disc session, rather than derived fresh.
#[derive(Debug, Clone)]
pub struct ImportedData {
    pub extent: u32,
    pub size: u64,
    /// The 7-byte ISO 9660 recording date/time, already encoded.
    pub timestamp: [u8; 7],
    pub file_flags: u8,
    pub file_unit_size: u8,
    pub interleave_gap_size: u8,
    pub volume_sequence_number: u16,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Fresh,
    Imported(ImportedData),
}

/// One entry supplied by the caller: a file or directory to place
/// somewhere in the image.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Forward-slash rooted path, e.g. `/docs/readme.txt`.
    pub internal_path: String,
    /// Host filesystem path backing the content; ignored for directories.
    pub source_path: PathBuf,
    /// Byte length of the content at `source_path`, supplied by the caller
    /// up front so allocation never has to open the file to size it.
    /// Ignored for directories and for imported nodes (whose size comes
    /// from `imported` instead).
    pub file_size: u64,
    pub flags: u16,
    pub imported: Option<ImportedData>,
}

impl FileDescriptor {
    pub fn file(internal_path: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            internal_path: internal_path.into(),
            source_path: source_path.into(),
            file_size: 0,
            flags: 0,
            imported: None,
        }
    }

    pub fn directory(internal_path: impl Into<String>) -> Self {
        Self {
            internal_path: internal_path.into(),
            source_path: PathBuf::new(),
            file_size: 0,
            flags: flags::DIRECTORY,
            imported: None,
        }
    }

    pub fn size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }
}

pub type FileSet = Vec<FileDescriptor>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Raw,
    Iso9660,
    Joliet,
}

#[derive(Debug, Clone)]
pub struct FileTreeNode {
    pub file_name: String,
    pub file_path: PathBuf,
    pub file_name_iso9660: String,
    pub file_name_joliet: String,
    pub file_size: u64,
    pub flags: u16,

    /// Sector location in the ISO 9660 view. For plain file nodes this is
    /// aliased with `data_pos_joliet`; directories and imported nodes may
    /// legitimately diverge between namespaces.
    pub data_pos_normal: u32,
    pub data_size_normal: u64,
    pub data_pos_joliet: u32,
    pub data_size_joliet: u64,
    /// Trailing zero-sector padding inserted after this node's data
    /// (DVD-Video VOB alignment).
    pub data_pad_len: u32,

    pub data: NodeData,

    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl FileTreeNode {
    pub fn is_dir(&self) -> bool {
        self.flags & flags::DIRECTORY != 0
    }

    pub fn is_imported(&self) -> bool {
        self.flags & flags::IMPORTED != 0
    }

    pub fn is_skipped(&self) -> bool {
        self.flags & flags::SKIPPED != 0
    }

    /// True for nodes absent from the image entirely (not just from the
    /// ISO 9660/Joliet directory listing). See [`flags::OMITTED`].
    pub fn is_omitted(&self) -> bool {
        self.flags & flags::OMITTED != 0
    }

    fn new_root() -> Self {
        Self {
            file_name: String::new(),
            file_path: PathBuf::new(),
            file_name_iso9660: String::new(),
            file_name_joliet: String::new(),
            file_size: 0,
            flags: flags::DIRECTORY,
            data_pos_normal: 0,
            data_size_normal: 0,
            data_pos_joliet: 0,
            data_size_joliet: 0,
            data_pad_len: 0,
            data: NodeData::Fresh,
            parent: None,
            children: Vec::new(),
        }
    }
}

pub struct FileTree {
    nodes: Vec<FileTreeNode>,
}

impl FileTree {
    pub const ROOT: NodeId = NodeId(0);

    pub fn node(&self, id: NodeId) -> &FileTreeNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut FileTreeNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds the tree from a file set, inserting intermediate directories
    /// that were not listed explicitly. Descriptors are processed shallowest
    /// path first so a directory is always created before anything nested
    /// under it is looked up.
    pub fn build(file_set: &FileSet) -> Result<Self> {
        let mut tree = FileTree {
            nodes: vec![FileTreeNode::new_root()],
        };

        let mut ordered: Vec<&FileDescriptor> = file_set.iter().collect();
        ordered.sort_by_key(|d| depth(&d.internal_path));

        for desc in ordered {
            let components: Vec<&str> = desc
                .internal_path
                .split('/')
                .filter(|c| !c.is_empty())
                .collect();
            if components.is_empty() {
                return Err(ConfigError::TreeConstruction(format!(
                    "empty internal path {:?}",
                    desc.internal_path
                ))
                .into());
            }

            let mut current = FileTree::ROOT;
            for (i, component) in components.iter().enumerate() {
                let is_last = i == components.len() - 1;
                let existing = tree
                    .node(current)
                    .children
                    .iter()
                    .copied()
                    .find(|&id| tree.node(id).file_name == *component);

                current = match existing {
                    Some(id) => id,
                    None => {
                        let is_dir = !is_last || desc.flags & flags::DIRECTORY != 0;
                        let mut node = FileTreeNode {
                            file_name: component.to_string(),
                            file_path: if is_last {
                                desc.source_path.clone()
                            } else {
                                PathBuf::new()
                            },
                            file_name_iso9660: String::new(),
                            file_name_joliet: String::new(),
                            file_size: 0,
                            flags: if is_dir { flags::DIRECTORY } else { 0 },
                            data_pos_normal: 0,
                            data_size_normal: 0,
                            data_pos_joliet: 0,
                            data_size_joliet: 0,
                            data_pad_len: 0,
                            data: NodeData::Fresh,
                            parent: Some(current),
                            children: Vec::new(),
                        };
                        if is_last {
                            node.flags |= desc.flags & (flags::IMPORTED | flags::HIDDEN);
                            match &desc.imported {
                                Some(imported) => {
                                    node.file_size = imported.size;
                                    node.data = NodeData::Imported(imported.clone());
                                }
                                None if desc.flags & flags::IMPORTED != 0 => {
                                    return Err(DataError::MissingImportedMetadata.into());
                                }
                                None if desc.flags & flags::DIRECTORY == 0 => {
                                    node.file_size = desc.file_size;
                                }
                                None => {}
                            }
                        }
                        let id = NodeId(tree.nodes.len());
                        tree.nodes.push(node);
                        tree.node_mut(current).children.push(id);
                        id
                    }
                };
            }
        }

        Ok(tree)
    }

    /// Reconstructs the rooted path of `id` by ascending through parents,
    /// using the name assigned in `namespace`.
    pub fn internal_path(&self, id: NodeId, namespace: Namespace) -> String {
        let mut parts = Vec::new();
        let mut current = id;
        loop {
            let node = self.node(current);
            if current == FileTree::ROOT {
                break;
            }
            let name = match namespace {
                Namespace::Raw => node.file_name.clone(),
                Namespace::Iso9660 => strip_version(&node.file_name_iso9660),
                Namespace::Joliet => strip_version(&node.file_name_joliet),
            };
            parts.push(name);
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Iterative pre-order walk using an explicit LIFO work list, bounding
    /// stack usage on pathological inputs and letting depth limits be
    /// enforced per visit.
    pub fn preorder(&self) -> Vec<(NodeId, u32)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(FileTree::ROOT, 0u32)];
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            for &child in self.node(id).children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    /// Every directory node (including the root), ordered by ascending
    /// depth and, within a depth, by first-discovery order in a pre-order
    /// walk. `WritePathTable` consumes exactly this order so path-table
    /// parent numbers are assigned consistently rather than depending on
    /// incidental file-set ordering.
    pub fn depth_ordered_dirs(&self) -> Vec<NodeId> {
        let mut dirs: Vec<(NodeId, u32)> = self
            .preorder()
            .into_iter()
            .filter(|(id, _)| self.node(*id).is_dir() && !self.node(*id).is_skipped())
            .collect();
        dirs.sort_by_key(|(_, depth)| *depth);
        dirs.into_iter().map(|(id, _)| id).collect()
    }
}

fn depth(path: &str) -> usize {
    path.split('/').filter(|c| !c.is_empty()).count()
}

fn strip_version(name: &str) -> String {
    match name.find(';') {
        Some(idx) => name[..idx].to_string(),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_inserts_intermediate_directories() {
        let tree = FileTree::build(&vec![FileDescriptor::file("/a/b/c.txt", "/tmp/c.txt")]).unwrap();
        assert_eq!(tree.len(), 4); // root, a, b, c.txt
        let a = tree.node(FileTree::ROOT).children[0];
        assert!(tree.node(a).is_dir());
        assert_eq!(tree.node(a).file_name, "a");
    }

    #[test]
    fn preorder_visits_parent_before_children() {
        let tree = FileTree::build(&vec![FileDescriptor::file("/a/b.txt", "/tmp/b.txt")]).unwrap();
        let order = tree.preorder();
        let positions: Vec<NodeId> = order.iter().map(|(id, _)| *id).collect();
        let root_pos = positions.iter().position(|&id| id == FileTree::ROOT).unwrap();
        assert_eq!(root_pos, 0);
    }

    #[test]
    fn depth_ordered_dirs_groups_by_depth() {
        let tree = FileTree::build(&vec![
            FileDescriptor::file("/a/x.txt", "/tmp/x.txt"),
            FileDescriptor::file("/b/y.txt", "/tmp/y.txt"),
            FileDescriptor::file("/a/c/z.txt", "/tmp/z.txt"),
        ])
        .unwrap();
        let dirs = tree.depth_ordered_dirs();
        // root (depth 0), then a, b (depth 1), then a/c (depth 2)
        assert_eq!(dirs[0], FileTree::ROOT);
        assert_eq!(dirs.len(), 4);
    }
}
