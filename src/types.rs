use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Contents of a single file in the project tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// The full text of the file
    pub contents: String,
    /// Editor language id, omitted on the wire when unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl FileContent {
    pub fn new(contents: impl Into<String>, language: Option<String>) -> Self {
        Self {
            contents: contents.into(),
            language,
        }
    }
}

/// A node of the project tree
///
/// Serialized as `{"file": {...}}` or `{"directory": {...}}`. Anything else,
/// including an object carrying both keys, fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNode {
    File(FileContent),
    Directory(FileTree),
}

impl FileNode {
    pub fn file(contents: impl Into<String>, language: Option<&str>) -> Self {
        FileNode::File(FileContent::new(contents, language.map(String::from)))
    }

    pub fn empty_directory() -> Self {
        FileNode::Directory(FileTree::new())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FileNode::File(_) => NodeKind::File,
            FileNode::Directory(_) => NodeKind::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FileNode::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FileNode::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileContent> {
        match self {
            FileNode::File(content) => Some(content),
            FileNode::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&FileTree> {
        match self {
            FileNode::Directory(children) => Some(children),
            FileNode::File(_) => None,
        }
    }
}

/// Discriminant of a [`FileNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// The children of a directory, keyed by name
///
/// The project root is an implicit unnamed `FileTree`. Children are held
/// behind `Arc`, so cloning a tree copies only one level of the map and
/// untouched subtrees are shared between snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree {
    entries: BTreeMap<String, Arc<FileNode>>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used when assembling trees by hand
    pub fn with_entry(mut self, name: impl Into<String>, node: FileNode) -> Self {
        self.entries.insert(name.into(), Arc::new(node));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FileNode> {
        self.entries.get(name).map(Arc::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileNode)> {
        self.entries
            .iter()
            .map(|(name, node)| (name.as_str(), node.as_ref()))
    }

    pub(crate) fn get_shared(&self, name: &str) -> Option<&Arc<FileNode>> {
        self.entries.get(name)
    }

    pub(crate) fn insert_shared(&mut self, name: String, node: Arc<FileNode>) {
        self.entries.insert(name, node);
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<FileNode>> {
        self.entries.remove(name)
    }
}
