//! Path-addressed reads and copy-on-write updates of a [`FileTree`].
//!
//! Nothing in this module mutates its input. `apply` rebuilds only the
//! directories along the addressed path; every other subtree is shared with
//! the previous snapshot.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, WorkspaceError};
use crate::path::{validate_name, TreePath};
use crate::types::{FileContent, FileNode, FileTree};

/// What a path resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry<'a> {
    File(&'a FileContent),
    Directory(&'a FileTree),
}

impl<'a> Entry<'a> {
    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }
}

/// A single mutation addressed at one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeOp {
    /// Insert a new node, creating missing parent directories
    Create(FileNode),
    /// Replace an existing node
    Update(FileNode),
    /// Remove a node and its whole subtree
    Delete,
}

/// Resolve `path` against `tree`
///
/// The root path resolves to the tree itself. Returns `None` when any
/// segment is missing or an intermediate segment is a file.
pub fn resolve<'a>(tree: &'a FileTree, path: &TreePath) -> Option<Entry<'a>> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Some(Entry::Directory(tree));
    };

    let mut dir = tree;
    for segment in parents {
        dir = dir.get(segment)?.as_directory()?;
    }

    Some(match dir.get(last)? {
        FileNode::File(content) => Entry::File(content),
        FileNode::Directory(children) => Entry::Directory(children),
    })
}

/// Produce a new tree with `op` applied at `path`
///
/// * `Create` fails with `AlreadyExists` if the path is taken, and with
///   `NotFound` if a parent segment is a file.
/// * `Update` and `Delete` fail with `NotFound` if the parent chain is
///   broken. `Update` also requires the node itself to exist; deleting an
///   absent leaf leaves the tree unchanged.
pub fn apply(tree: &FileTree, path: &TreePath, op: TreeOp) -> Result<FileTree> {
    if path.is_root() {
        return Err(WorkspaceError::invalid_operation(
            "the project root cannot be created, replaced or deleted",
        ));
    }
    apply_at(tree, path.segments(), path, op)
}

fn apply_at(dir: &FileTree, segments: &[String], path: &TreePath, op: TreeOp) -> Result<FileTree> {
    let mut updated = dir.clone();

    match segments {
        [] => Err(WorkspaceError::invalid_operation("empty path")),
        [name] => {
            match op {
                TreeOp::Create(node) => {
                    if updated.contains(name) {
                        return Err(WorkspaceError::already_exists(path));
                    }
                    updated.insert_shared(name.clone(), Arc::new(node));
                }
                TreeOp::Update(node) => {
                    if !updated.contains(name) {
                        return Err(WorkspaceError::not_found(path));
                    }
                    updated.insert_shared(name.clone(), Arc::new(node));
                }
                TreeOp::Delete => {
                    updated.remove(name);
                }
            }
            Ok(updated)
        }
        [name, rest @ ..] => {
            let children = match updated.get(name) {
                Some(FileNode::Directory(children)) => apply_at(children, rest, path, op)?,
                Some(FileNode::File(_)) => return Err(WorkspaceError::not_found(path)),
                None if matches!(op, TreeOp::Create(_)) => {
                    apply_at(&FileTree::new(), rest, path, op)?
                }
                None => return Err(WorkspaceError::not_found(path)),
            };
            updated.insert_shared(name.clone(), Arc::new(FileNode::Directory(children)));
            Ok(updated)
        }
    }
}

fn resolve_shared<'a>(tree: &'a FileTree, path: &TreePath) -> Option<&'a Arc<FileNode>> {
    let (last, parents) = path.segments().split_last()?;
    let mut dir = tree;
    for segment in parents {
        dir = dir.get(segment)?.as_directory()?;
    }
    dir.get_shared(last)
}

/// Relocate the node at `from` to `to`, carrying its whole subtree
///
/// `to`'s parent must already exist as a directory and `to` must be free.
pub fn relocate(tree: &FileTree, from: &TreePath, to: &TreePath) -> Result<FileTree> {
    if from.is_root() || to.is_root() {
        return Err(WorkspaceError::invalid_operation("the project root cannot be moved"));
    }
    if to.starts_with(from) {
        return Err(WorkspaceError::invalid_operation(format!(
            "cannot move {} into itself",
            from
        )));
    }

    let node = resolve_shared(tree, from)
        .cloned()
        .ok_or_else(|| WorkspaceError::not_found(from))?;

    let parent = to.parent().unwrap_or_default();
    match resolve(tree, &parent) {
        Some(Entry::Directory(dir)) => {
            if let Some(name) = to.name() {
                if dir.contains(name) {
                    return Err(WorkspaceError::already_exists(to));
                }
            }
        }
        _ => return Err(WorkspaceError::not_found(&parent)),
    }

    let without = apply(tree, from, TreeOp::Delete)?;
    apply(&without, to, TreeOp::Create(node.as_ref().clone()))
}

impl FileTree {
    pub fn resolve(&self, path: &TreePath) -> Option<Entry<'_>> {
        resolve(self, path)
    }

    pub fn apply(&self, path: &TreePath, op: TreeOp) -> Result<FileTree> {
        apply(self, path, op)
    }

    pub fn exists(&self, path: &TreePath) -> bool {
        resolve(self, path).is_some()
    }

    /// File contents at `path`, if it names a file
    pub fn file(&self, path: &TreePath) -> Option<&FileContent> {
        match resolve(self, path)? {
            Entry::File(content) => Some(content),
            Entry::Directory(_) => None,
        }
    }

    /// True when `path` is the root or names a directory
    pub fn is_directory(&self, path: &TreePath) -> bool {
        matches!(resolve(self, path), Some(Entry::Directory(_)))
    }

    /// Map every file path to its contents
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        flatten_into(self, "", &mut files);
        files
    }

    /// Check the structural rules a received snapshot must satisfy
    pub fn validate(&self) -> Result<()> {
        validate_dir(self, &TreePath::root())
    }

    /// SHA-256 over names, kinds and contents, in a stable order
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        digest_dir(self, &mut hasher);
        format!("{:x}", hasher.finalize())
    }
}

fn flatten_into(dir: &FileTree, prefix: &str, files: &mut BTreeMap<String, String>) {
    for (name, node) in dir.iter() {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        };
        match node {
            FileNode::File(content) => {
                files.insert(path, content.contents.clone());
            }
            FileNode::Directory(children) => flatten_into(children, &path, files),
        }
    }
}

fn validate_dir(dir: &FileTree, at: &TreePath) -> Result<()> {
    for (name, node) in dir.iter() {
        if validate_name(name).is_err() {
            return Err(WorkspaceError::MalformedSnapshot {
                message: format!("invalid entry name {:?} under /{}", name, at),
            });
        }
        if let FileNode::Directory(children) = node {
            let child = at.join(name)?;
            validate_dir(children, &child)?;
        }
    }
    Ok(())
}

fn digest_dir(dir: &FileTree, hasher: &mut Sha256) {
    hasher.update(b"{");
    for (name, node) in dir.iter() {
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        match node {
            FileNode::File(content) => {
                hasher.update(b"f");
                hasher.update((content.contents.len() as u64).to_le_bytes());
                hasher.update(content.contents.as_bytes());
                match &content.language {
                    Some(language) => {
                        hasher.update(b"l");
                        hasher.update((language.len() as u64).to_le_bytes());
                        hasher.update(language.as_bytes());
                    }
                    None => hasher.update(b"-"),
                }
            }
            FileNode::Directory(children) => {
                hasher.update(b"d");
                digest_dir(children, hasher);
            }
        }
    }
    hasher.update(b"}");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> TreePath {
        TreePath::parse(raw).unwrap()
    }

    fn sample() -> FileTree {
        FileTree::new()
            .with_entry("README.md", FileNode::file("# demo", Some("markdown")))
            .with_entry(
                "src",
                FileNode::Directory(
                    FileTree::new()
                        .with_entry("index.js", FileNode::file("main()", Some("javascript")))
                        .with_entry(
                            "util",
                            FileNode::Directory(
                                FileTree::new().with_entry("math.js", FileNode::file("", None)),
                            ),
                        ),
                ),
            )
    }

    #[test]
    fn test_resolve() {
        let tree = sample();

        assert_eq!(resolve(&tree, &TreePath::root()), Some(Entry::Directory(&tree)));
        assert!(resolve(&tree, &p("src/util")).unwrap().is_directory());
        assert_eq!(tree.file(&p("src/index.js")).unwrap().contents, "main()");

        assert_eq!(resolve(&tree, &p("src/missing.js")), None);
        assert_eq!(resolve(&tree, &p("missing/index.js")), None);
        // addressed through a file
        assert_eq!(resolve(&tree, &p("README.md/inner")), None);
    }

    #[test]
    fn test_create_builds_missing_parents() {
        let tree = FileTree::new();
        let node = FileNode::file("x", None);

        let updated = apply(&tree, &p("a/b/c.txt"), TreeOp::Create(node.clone())).unwrap();

        assert!(updated.is_directory(&p("a")));
        assert!(updated.is_directory(&p("a/b")));
        assert_eq!(updated.file(&p("a/b/c.txt")), node.as_file());
        assert!(tree.is_empty());
    }

    #[test]
    fn test_create_rejects_existing_path() {
        let tree = sample();
        let result = apply(&tree, &p("src/index.js"), TreeOp::Create(FileNode::file("", None)));
        assert!(matches!(result, Err(WorkspaceError::AlreadyExists { .. })));
    }

    #[test]
    fn test_create_through_file_is_not_found() {
        let tree = sample();
        let result = apply(&tree, &p("README.md/c.txt"), TreeOp::Create(FileNode::file("", None)));
        assert!(matches!(result, Err(WorkspaceError::NotFound { .. })));
    }

    #[test]
    fn test_update_and_delete_require_parents() {
        let tree = sample();

        let result = apply(&tree, &p("nope/x.js"), TreeOp::Update(FileNode::file("", None)));
        assert!(matches!(result, Err(WorkspaceError::NotFound { .. })));

        let result = apply(&tree, &p("src/new.js"), TreeOp::Update(FileNode::file("", None)));
        assert!(matches!(result, Err(WorkspaceError::NotFound { .. })));

        let result = apply(&tree, &p("nope/x.js"), TreeOp::Delete);
        assert!(matches!(result, Err(WorkspaceError::NotFound { .. })));

        // absent leaf under an existing directory is a no-op
        assert_eq!(apply(&tree, &p("src/gone.js"), TreeOp::Delete).unwrap(), tree);
    }

    #[test]
    fn test_round_trip_and_immutability() {
        let tree = sample();
        let before = tree.clone();

        for raw in ["README.md", "src", "src/util/math.js"] {
            let path = p(raw);
            let deleted = apply(&tree, &path, TreeOp::Delete).unwrap();
            assert!(resolve(&deleted, &path).is_none());

            let node = FileNode::file("fresh", Some("plaintext"));
            let recreated = apply(&deleted, &path, TreeOp::Create(node.clone())).unwrap();
            assert_eq!(recreated.file(&path), node.as_file());
        }

        assert_eq!(tree, before);
    }

    #[test]
    fn test_untouched_subtrees_are_shared() {
        let tree = sample();
        let updated = apply(&tree, &p("README.md"), TreeOp::Update(FileNode::file("new", None))).unwrap();

        let old_src = tree.get_shared("src").unwrap();
        let new_src = updated.get_shared("src").unwrap();
        assert!(Arc::ptr_eq(old_src, new_src));
    }

    #[test]
    fn test_root_is_not_mutable() {
        let result = apply(&sample(), &TreePath::root(), TreeOp::Delete);
        assert!(matches!(result, Err(WorkspaceError::InvalidOperation { .. })));
    }

    #[test]
    fn test_relocate() {
        let tree = sample();

        let moved = relocate(&tree, &p("src/util"), &p("util")).unwrap();
        assert!(moved.exists(&p("util/math.js")));
        assert!(!moved.exists(&p("src/util")));

        assert!(matches!(
            relocate(&tree, &p("src"), &p("src/util/src")),
            Err(WorkspaceError::InvalidOperation { .. })
        ));
        assert!(matches!(
            relocate(&tree, &p("README.md"), &p("src/index.js")),
            Err(WorkspaceError::AlreadyExists { .. })
        ));
        assert!(matches!(
            relocate(&tree, &p("README.md"), &p("docs/README.md")),
            Err(WorkspaceError::NotFound { .. })
        ));
        assert!(matches!(
            relocate(&tree, &p("ghost"), &p("src/ghost")),
            Err(WorkspaceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_flatten() {
        let files = sample().flatten();
        let paths: Vec<_> = files.keys().map(String::as_str).collect();
        assert_eq!(paths, ["README.md", "src/index.js", "src/util/math.js"]);
        assert_eq!(files["src/index.js"], "main()");
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        assert!(sample().validate().is_ok());

        let bad: FileTree = serde_json::from_value(serde_json::json!({
            "src": { "directory": { "a/b.js": { "file": { "contents": "" } } } }
        }))
        .unwrap();
        assert!(matches!(
            bad.validate(),
            Err(WorkspaceError::MalformedSnapshot { .. })
        ));
    }

    #[test]
    fn test_digest_tracks_content() {
        let tree = sample();
        assert_eq!(tree.digest(), sample().digest());

        let edited = apply(&tree, &p("README.md"), TreeOp::Update(FileNode::file("# other", Some("markdown")))).unwrap();
        assert_ne!(tree.digest(), edited.digest());
    }
}
