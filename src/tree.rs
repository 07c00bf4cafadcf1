//! Folder tree rebuilt from flattened relative paths.
//!
//! The tree is an arena of [`FolderNode`]s addressed by [`NodeId`]. Node 0 is
//! always the synthetic root. Remote folder ids are write-once cells filled in
//! by the scheduler once the folder exists on the server.

use std::sync::OnceLock;

use crate::event::ItemId;
use crate::file::UploadFile;

/// A selected file together with its `/`-delimited path relative to the selection.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file: UploadFile,
    /// For a file picked on its own this is just the file name.
    pub relative_path: String,
}

impl SelectedFile {
    /// A file selected on its own (no folder structure).
    pub fn flat(file: UploadFile) -> Self {
        let relative_path = file.name().to_string();
        Self {
            file,
            relative_path,
        }
    }

    pub fn with_path(file: UploadFile, relative_path: impl Into<String>) -> Self {
        Self {
            file,
            relative_path: relative_path.into(),
        }
    }
}

/// Index of a folder node in an [`UploadTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// An upload item id paired with its file.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub id: ItemId,
    pub file: UploadFile,
}

/// One folder of the selection.
#[derive(Debug)]
pub struct FolderNode {
    name: Option<String>,
    remote_id: OnceLock<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    files: Vec<FileNode>,
}

impl FolderNode {
    fn new(name: Option<String>, parent: Option<NodeId>) -> Self {
        Self {
            name,
            remote_id: OnceLock::new(),
            parent,
            children: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Get the folder name; `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the server-side folder id, once known.
    ///
    /// For the root this is the destination folder (`None` = drive root).
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.get().map(String::as_str)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child folders in first-seen order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Files attached directly to this folder, in selection order.
    pub fn files(&self) -> &[FileNode] {
        &self.files
    }
}

/// Folder hierarchy of one upload invocation.
#[derive(Debug)]
pub struct UploadTree {
    nodes: Vec<FolderNode>,
}

impl UploadTree {
    const ROOT: NodeId = NodeId(0);

    /// Create a tree holding only the root.
    pub fn new(destination: Option<String>) -> Self {
        let root = FolderNode::new(None, None);
        if let Some(id) = destination {
            let _ = root.remote_id.set(id);
        }
        Self { nodes: vec![root] }
    }

    /// Rebuild the folder hierarchy from `(item id, selected file)` pairs.
    ///
    /// Every path segment but the last names a folder; segments are matched
    /// exactly (case-sensitive) against existing children, so identical
    /// prefixes merge. Empty segments are skipped. Ordering follows the order
    /// of first appearance.
    pub fn reconstruct<I>(entries: I, destination: Option<String>) -> Self
    where
        I: IntoIterator<Item = (ItemId, SelectedFile)>,
    {
        let mut tree = Self::new(destination);

        for (id, selected) in entries {
            let mut segments: Vec<&str> = selected
                .relative_path
                .split('/')
                .filter(|s| !s.is_empty())
                .collect();
            // The last segment is the file name itself.
            segments.pop();

            let mut current = Self::ROOT;
            for segment in segments {
                current = match tree.find_child(current, segment) {
                    Some(child) => child,
                    None => tree.add_child(current, segment),
                };
            }

            tree.nodes[current.0].files.push(FileNode {
                id,
                file: selected.file,
            });
        }

        tree
    }

    fn add_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes
            .push(FolderNode::new(Some(name.to_string()), Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    /// Get a node by id.
    ///
    /// Ids are only handed out by this tree, so they are always in range.
    pub fn node(&self, id: NodeId) -> &FolderNode {
        &self.nodes[id.0]
    }

    /// Find a direct child folder by exact name.
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.node(child).name() == Some(name))
    }

    /// Record the server-side id of a folder.
    ///
    /// Returns `false` if an id was already recorded; the first one wins.
    pub fn set_remote_id(&self, id: NodeId, remote_id: String) -> bool {
        self.node(id).remote_id.set(remote_id).is_ok()
    }

    /// All files at or below `id`, depth first.
    pub fn files_in_subtree(&self, id: NodeId) -> Vec<&FileNode> {
        let mut files = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current);
            files.extend(node.files.iter());
            stack.extend(node.children.iter().rev());
        }
        files
    }

    /// Slash-joined folder path of a node, empty for the root.
    pub fn path(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            if let Some(name) = node.name() {
                names.push(name);
            }
            current = node.parent;
        }
        names.reverse();
        names.join("/")
    }

    pub fn file_count(&self) -> usize {
        self.nodes.iter().map(|n| n.files.len()).sum()
    }

    /// Number of folders, root excluded.
    pub fn folder_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Whether there is nothing to upload.
    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }
}
