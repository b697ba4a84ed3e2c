//! Interactive structural edits: create, rename, move and delete.
//!
//! Creation and renaming are two-step gestures. `begin_*` opens an inline
//! name editor (inserting a placeholder node for new items) and `commit`
//! finishes it. Move and delete run to completion in one call. Every
//! operation is all-or-nothing against the tree and keeps the editor
//! session in step with it.

use tracing::debug;

use crate::error::{Result, WorkspaceError};
use crate::language::language_for;
use crate::path::{validate_name, TreePath};
use crate::session::EditorSession;
use crate::store::{relocate, Entry, TreeOp};
use crate::types::{FileContent, FileNode, FileTree, NodeKind};

/// The tree together with the session state that must track it
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub tree: FileTree,
    pub session: EditorSession,
}

impl Workspace {
    pub fn new(tree: FileTree) -> Self {
        Self {
            tree,
            session: EditorSession::new(),
        }
    }

    /// Swap in a whole new tree and drop session entries it no longer has
    pub fn replace_tree(&mut self, tree: FileTree) {
        self.tree = tree;
        self.session.prune(&self.tree);
    }
}

/// Result of an explorer operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The tree changed; the new item lives at this path
    Committed(TreePath),
    /// The gesture completed without changing anything
    Unchanged,
    /// The gesture was abandoned and any placeholder rolled back
    Cancelled,
    /// No edit was pending, or one is already being submitted
    Ignored,
}

impl Outcome {
    /// Whether the resulting tree must be broadcast and persisted
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Create(NodeKind),
    Rename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Editing,
    Committing,
}

/// An inline name edit in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub kind: EditKind,
    /// Placeholder path for new items, current path for renames
    pub path: TreePath,
    pub phase: EditPhase,
}

#[derive(Debug, Default)]
pub struct Explorer {
    pending: Option<PendingEdit>,
}

impl Explorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingEdit> {
        self.pending.as_ref()
    }

    /// Insert a placeholder file or folder and start editing its name
    ///
    /// `location` may be a directory or a file; a file target creates a
    /// sibling. New files are opened and made current right away.
    pub fn begin_create(
        &mut self,
        ws: &mut Workspace,
        location: &TreePath,
        kind: NodeKind,
    ) -> Result<TreePath> {
        self.cancel(ws);

        let parent = directory_for(&ws.tree, location)?;
        let dir = match ws.tree.resolve(&parent) {
            Some(Entry::Directory(dir)) => dir,
            _ => return Err(WorkspaceError::not_found(&parent)),
        };
        let placeholder = parent.join(&placeholder_name(dir, kind))?;

        let node = match kind {
            NodeKind::File => {
                let language = placeholder.name().map(language_for);
                FileNode::file("", language)
            }
            NodeKind::Directory => FileNode::empty_directory(),
        };
        ws.tree = ws.tree.apply(&placeholder, TreeOp::Create(node))?;

        match kind {
            NodeKind::File => ws.session.open(&ws.tree, &placeholder)?,
            NodeKind::Directory => ws.session.reveal(&placeholder),
        }

        debug!(path = %placeholder, ?kind, "placeholder inserted");
        self.pending = Some(PendingEdit {
            kind: EditKind::Create(kind),
            path: placeholder.clone(),
            phase: EditPhase::Editing,
        });
        Ok(placeholder)
    }

    /// Start editing the name of an existing item
    pub fn begin_rename(&mut self, ws: &mut Workspace, path: &TreePath) -> Result<()> {
        self.cancel(ws);

        if path.is_root() {
            return Err(WorkspaceError::invalid_operation("the project root cannot be renamed"));
        }
        if !ws.tree.exists(path) {
            return Err(WorkspaceError::not_found(path));
        }

        self.pending = Some(PendingEdit {
            kind: EditKind::Rename,
            path: path.clone(),
            phase: EditPhase::Editing,
        });
        Ok(())
    }

    /// Finish the pending edit with the typed name
    ///
    /// An empty name cancels. A name taken by a sibling fails with
    /// `AlreadyExists`: a new item stays in editing so the user can retype,
    /// a rename is abandoned with the item left under its old name.
    pub fn commit(&mut self, ws: &mut Workspace, input: &str) -> Result<Outcome> {
        let pending = match self.pending.as_mut() {
            Some(pending) if pending.phase == EditPhase::Editing => {
                pending.phase = EditPhase::Committing;
                pending.clone()
            }
            _ => return Ok(Outcome::Ignored),
        };

        let result = finish_edit(ws, &pending, input);

        self.pending = match (&result, pending.kind) {
            (
                Err(WorkspaceError::AlreadyExists { .. } | WorkspaceError::InvalidName { .. }),
                EditKind::Create(_),
            ) => Some(PendingEdit {
                phase: EditPhase::Editing,
                ..pending
            }),
            _ => None,
        };
        result
    }

    /// Abandon the pending edit, removing a placeholder if one was inserted
    pub fn cancel(&mut self, ws: &mut Workspace) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        rollback(ws, &pending);
        true
    }

    /// Forget the pending edit without touching the tree
    ///
    /// Used when the tree was replaced from outside and the placeholder is
    /// already gone.
    pub fn abandon(&mut self) -> Option<PendingEdit> {
        self.pending.take()
    }

    /// Move `source` into the directory at `target`
    ///
    /// Dropping onto a file targets that file's directory. Moving an item
    /// into itself or one of its descendants is refused.
    pub fn move_item(
        &mut self,
        ws: &mut Workspace,
        source: &TreePath,
        target: &TreePath,
    ) -> Result<Outcome> {
        if source.is_root() {
            return Err(WorkspaceError::invalid_operation("the project root cannot be moved"));
        }
        ensure_outside(source, target)?;
        if !ws.tree.exists(source) {
            return Err(WorkspaceError::not_found(source));
        }

        let dest_dir = directory_for(&ws.tree, target)?;
        ensure_outside(source, &dest_dir)?;
        if source.parent().as_ref() == Some(&dest_dir) {
            return Ok(Outcome::Unchanged);
        }

        let name = source
            .name()
            .ok_or_else(|| WorkspaceError::invalid_operation("the project root cannot be moved"))?;
        let dest = dest_dir.join(name)?;
        if ws.tree.exists(&dest) {
            return Err(WorkspaceError::already_exists(&dest));
        }

        ws.tree = relocate(&ws.tree, source, &dest)?;
        ws.session.rename(source, &dest);
        ws.session.reveal(&dest);
        self.follow_move(source, &dest);

        debug!(from = %source, to = %dest, "item moved");
        Ok(Outcome::Committed(dest))
    }

    /// Delete a file or a whole directory subtree
    ///
    /// `confirmed` records that the user acknowledged the destructive
    /// action; without it nothing happens.
    pub fn delete_item(
        &mut self,
        ws: &mut Workspace,
        path: &TreePath,
        confirmed: bool,
    ) -> Result<Outcome> {
        if path.is_root() {
            return Err(WorkspaceError::invalid_operation("the project root cannot be deleted"));
        }
        if !confirmed {
            return Err(WorkspaceError::invalid_operation(format!(
                "deleting {} requires confirmation",
                path
            )));
        }
        if !ws.tree.exists(path) {
            return Err(WorkspaceError::not_found(path));
        }

        ws.tree = ws.tree.apply(path, TreeOp::Delete)?;
        ws.session.remove(path);
        if self
            .pending
            .as_ref()
            .map_or(false, |pending| pending.path.starts_with(path))
        {
            self.pending = None;
        }

        debug!(path = %path, "item deleted");
        Ok(Outcome::Committed(path.clone()))
    }

    fn follow_move(&mut self, from: &TreePath, to: &TreePath) {
        if let Some(pending) = self.pending.as_mut() {
            if let Some(moved) = pending.path.rebase(from, to) {
                pending.path = moved;
            }
        }
    }
}

fn finish_edit(ws: &mut Workspace, pending: &PendingEdit, input: &str) -> Result<Outcome> {
    let name = input.trim();
    if name.is_empty() {
        rollback(ws, pending);
        return Ok(Outcome::Cancelled);
    }
    validate_name(name)?;

    let target = pending.path.with_name(name)?;
    if target == pending.path {
        return Ok(match pending.kind {
            EditKind::Create(_) => Outcome::Committed(target),
            EditKind::Rename => Outcome::Unchanged,
        });
    }
    if ws.tree.exists(&target) {
        return Err(WorkspaceError::already_exists(&target));
    }

    let mut tree = relocate(&ws.tree, &pending.path, &target)?;
    if let Some(content) = tree.file(&target) {
        let retyped = FileContent::new(
            content.contents.clone(),
            Some(language_for(name).to_string()),
        );
        tree = tree.apply(&target, TreeOp::Update(FileNode::File(retyped)))?;
    }

    ws.tree = tree;
    ws.session.rename(&pending.path, &target);
    debug!(from = %pending.path, to = %target, "name committed");
    Ok(Outcome::Committed(target))
}

fn rollback(ws: &mut Workspace, pending: &PendingEdit) {
    if let EditKind::Create(_) = pending.kind {
        if let Ok(tree) = ws.tree.apply(&pending.path, TreeOp::Delete) {
            ws.tree = tree;
        }
        ws.session.remove(&pending.path);
        debug!(path = %pending.path, "placeholder rolled back");
    }
}

/// The directory an operation aimed at `location` acts in
fn directory_for(tree: &FileTree, location: &TreePath) -> Result<TreePath> {
    match tree.resolve(location) {
        Some(Entry::Directory(_)) => Ok(location.clone()),
        Some(Entry::File(_)) => Ok(location.parent().unwrap_or_default()),
        None => Err(WorkspaceError::not_found(location)),
    }
}

fn ensure_outside(source: &TreePath, target: &TreePath) -> Result<()> {
    if target.starts_with(source) {
        return Err(WorkspaceError::invalid_operation(format!(
            "cannot move {} into itself",
            source
        )));
    }
    Ok(())
}

/// Smallest free `untitled{n}` style name in `dir`
fn placeholder_name(dir: &FileTree, kind: NodeKind) -> String {
    (1u32..)
        .map(|n| match kind {
            NodeKind::File => format!("untitled{}.txt", n),
            NodeKind::Directory => format!("untitled-folder{}", n),
        })
        .find(|name| !dir.contains(name))
        .unwrap_or_default()
}
