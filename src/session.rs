use std::collections::BTreeSet;

use crate::error::{Result, WorkspaceError};
use crate::path::TreePath;
use crate::types::FileTree;

/// Which files are open, which one is active, and which folders are expanded
///
/// Pure client state: it is never broadcast and is reset when the project is
/// unloaded. Structural mutations of the tree must be mirrored here through
/// [`EditorSession::rename`] and [`EditorSession::remove`] in the same step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSession {
    open_files: Vec<TreePath>,
    current_file: Option<TreePath>,
    expanded: BTreeSet<TreePath>,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open files in the order they were opened
    pub fn open_files(&self) -> &[TreePath] {
        &self.open_files
    }

    pub fn current_file(&self) -> Option<&TreePath> {
        self.current_file.as_ref()
    }

    pub fn expanded_folders(&self) -> &BTreeSet<TreePath> {
        &self.expanded
    }

    pub fn is_open(&self, path: &TreePath) -> bool {
        self.open_files.contains(path)
    }

    pub fn is_expanded(&self, path: &TreePath) -> bool {
        self.expanded.contains(path)
    }

    /// Open `path` (if needed) and make it the current file
    ///
    /// The path must name a file in `tree`. Its parent folders are expanded
    /// so it is visible in the explorer.
    pub fn open(&mut self, tree: &FileTree, path: &TreePath) -> Result<()> {
        if tree.file(path).is_none() {
            return Err(WorkspaceError::not_found(path));
        }
        if !self.is_open(path) {
            self.open_files.push(path.clone());
        }
        self.current_file = Some(path.clone());
        self.reveal(path);
        Ok(())
    }

    /// Close a tab; returns false if it was not open
    pub fn close(&mut self, path: &TreePath) -> bool {
        let before = self.open_files.len();
        self.open_files.retain(|open| open != path);
        if self.open_files.len() == before {
            return false;
        }
        if self.current_file.as_ref() == Some(path) {
            self.current_file = self.open_files.last().cloned();
        }
        true
    }

    /// Expand every folder containing `path`
    pub fn reveal(&mut self, path: &TreePath) {
        self.expanded.extend(path.ancestors());
    }

    pub fn expand(&mut self, folder: &TreePath) {
        if !folder.is_root() {
            self.expanded.insert(folder.clone());
        }
    }

    /// Flip a folder's expansion; returns the new state
    pub fn toggle(&mut self, folder: &TreePath) -> bool {
        if self.expanded.remove(folder) {
            false
        } else {
            self.expand(folder);
            !folder.is_root()
        }
    }

    /// Rewrite every tracked path at or below `from` to live under `to`
    pub fn rename(&mut self, from: &TreePath, to: &TreePath) {
        for open in &mut self.open_files {
            if let Some(moved) = open.rebase(from, to) {
                *open = moved;
            }
        }

        if let Some(moved) = self
            .current_file
            .as_ref()
            .and_then(|current| current.rebase(from, to))
        {
            self.current_file = Some(moved);
        }

        self.expanded = std::mem::take(&mut self.expanded)
            .into_iter()
            .map(|folder| folder.rebase(from, to).unwrap_or(folder))
            .collect();
    }

    /// Forget every tracked path at or below `path`
    pub fn remove(&mut self, path: &TreePath) {
        self.open_files.retain(|open| !open.starts_with(path));
        self.expanded.retain(|folder| !folder.starts_with(path));
        self.repair_current();
    }

    /// Drop entries that no longer resolve after the tree was replaced
    pub fn prune(&mut self, tree: &FileTree) {
        self.open_files.retain(|open| tree.file(open).is_some());
        self.expanded.retain(|folder| tree.is_directory(folder));
        self.repair_current();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Every open file resolves to a file and the current file is open
    pub fn is_consistent_with(&self, tree: &FileTree) -> bool {
        let distinct: BTreeSet<_> = self.open_files.iter().collect();
        distinct.len() == self.open_files.len()
            && self.open_files.iter().all(|open| tree.file(open).is_some())
            && self
                .current_file
                .as_ref()
                .map_or(true, |current| self.is_open(current))
    }

    fn repair_current(&mut self) {
        let stale = self
            .current_file
            .as_ref()
            .map_or(false, |current| !self.open_files.contains(current));
        if stale {
            self.current_file = self.open_files.last().cloned();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TreeOp;
    use crate::types::FileNode;

    fn p(raw: &str) -> TreePath {
        TreePath::parse(raw).unwrap()
    }

    fn tree() -> FileTree {
        FileTree::new()
            .with_entry("a.txt", FileNode::file("", None))
            .with_entry("b.txt", FileNode::file("", None))
            .with_entry("other.js", FileNode::file("", None))
            .with_entry(
                "src",
                FileNode::Directory(
                    FileTree::new()
                        .with_entry("a.js", FileNode::file("", None))
                        .with_entry(
                            "deep",
                            FileNode::Directory(
                                FileTree::new().with_entry("x.js", FileNode::file("", None)),
                            ),
                        ),
                ),
            )
    }

    #[test]
    fn test_open_appends_once_and_reveals() {
        let tree = tree();
        let mut session = EditorSession::new();

        session.open(&tree, &p("src/deep/x.js")).unwrap();
        session.open(&tree, &p("a.txt")).unwrap();
        session.open(&tree, &p("src/deep/x.js")).unwrap();

        assert_eq!(session.open_files(), [p("src/deep/x.js"), p("a.txt")]);
        assert_eq!(session.current_file(), Some(&p("src/deep/x.js")));
        assert!(session.is_expanded(&p("src")));
        assert!(session.is_expanded(&p("src/deep")));
    }

    #[test]
    fn test_open_rejects_directories_and_missing() {
        let tree = tree();
        let mut session = EditorSession::new();

        assert!(session.open(&tree, &p("src")).is_err());
        assert!(session.open(&tree, &p("missing.txt")).is_err());
        assert!(session.open_files().is_empty());
    }

    #[test]
    fn test_close_falls_back_to_most_recent() {
        let tree = tree();
        let mut session = EditorSession::new();
        for raw in ["a.txt", "b.txt", "other.js"] {
            session.open(&tree, &p(raw)).unwrap();
        }
        session.open(&tree, &p("a.txt")).unwrap();

        assert!(session.close(&p("a.txt")));
        assert_eq!(session.current_file(), Some(&p("other.js")));
        assert!(!session.close(&p("a.txt")));

        session.close(&p("b.txt"));
        session.close(&p("other.js"));
        assert_eq!(session.current_file(), None);
    }

    #[test]
    fn test_rename_cascade() {
        let tree = tree();
        let mut session = EditorSession::new();
        session.open(&tree, &p("src/a.js")).unwrap();
        session.open(&tree, &p("other.js")).unwrap();
        session.open(&tree, &p("src/a.js")).unwrap();
        session.expand(&p("src/deep"));

        session.rename(&p("src"), &p("lib"));

        assert_eq!(session.open_files(), [p("lib/a.js"), p("other.js")]);
        assert_eq!(session.current_file(), Some(&p("lib/a.js")));
        assert!(session.is_expanded(&p("lib")));
        assert!(session.is_expanded(&p("lib/deep")));
        assert!(!session.is_expanded(&p("src")));
    }

    #[test]
    fn test_remove_current_file() {
        let tree = tree();
        let mut session = EditorSession::new();
        session.open(&tree, &p("b.txt")).unwrap();
        session.open(&tree, &p("a.txt")).unwrap();
        let tree = tree.apply(&p("a.txt"), TreeOp::Delete).unwrap();

        session.remove(&p("a.txt"));

        assert_eq!(session.open_files(), [p("b.txt")]);
        assert_eq!(session.current_file(), Some(&p("b.txt")));
        assert!(session.is_consistent_with(&tree));
    }

    #[test]
    fn test_remove_directory_drops_descendants() {
        let tree = tree();
        let mut session = EditorSession::new();
        session.open(&tree, &p("src/deep/x.js")).unwrap();
        session.open(&tree, &p("src/a.js")).unwrap();

        session.remove(&p("src"));

        assert!(session.open_files().is_empty());
        assert_eq!(session.current_file(), None);
        assert!(session.expanded_folders().is_empty());
    }

    #[test]
    fn test_prune_after_replace() {
        let tree = tree();
        let mut session = EditorSession::new();
        session.open(&tree, &p("a.txt")).unwrap();
        session.open(&tree, &p("src/a.js")).unwrap();

        let replaced = FileTree::new().with_entry("a.txt", FileNode::file("", None));
        session.prune(&replaced);

        assert_eq!(session.open_files(), [p("a.txt")]);
        assert_eq!(session.current_file(), Some(&p("a.txt")));
        assert!(session.expanded_folders().is_empty());
        assert!(session.is_consistent_with(&replaced));
    }

    #[test]
    fn test_toggle() {
        let mut session = EditorSession::new();
        assert!(session.toggle(&p("src")));
        assert!(!session.toggle(&p("src")));
        assert!(!session.toggle(&TreePath::root()));
    }
}
