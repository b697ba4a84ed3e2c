use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WorkspaceError};

/// A slash-delimited location inside a project tree
///
/// The empty path addresses the implicit root directory. Every other path is
/// a sequence of non-empty segments, none of which contain `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreePath {
    segments: Vec<String>,
}

impl TreePath {
    /// The implicit root directory
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-joined path
    ///
    /// A single leading or trailing slash is tolerated; empty segments in the
    /// middle (`a//b`) are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            validate_name(segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Last segment, `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Containing directory, `None` for the root
    pub fn parent(&self) -> Option<TreePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append one validated segment
    pub fn join(&self, name: &str) -> Result<TreePath> {
        validate_name(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    /// Same parent, different final segment
    pub fn with_name(&self, name: &str) -> Result<TreePath> {
        match self.parent() {
            Some(parent) => parent.join(name),
            None => Err(WorkspaceError::invalid_operation("the root has no name")),
        }
    }

    /// True when `self` equals `prefix` or lies underneath it
    pub fn starts_with(&self, prefix: &TreePath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// True when `self` lies strictly underneath `ancestor`
    pub fn is_descendant_of(&self, ancestor: &TreePath) -> bool {
        self.segments.len() > ancestor.segments.len() && self.starts_with(ancestor)
    }

    /// Substitute the `from` prefix with `to`
    ///
    /// Returns `None` when `self` is not equal to or nested under `from`.
    pub fn rebase(&self, from: &TreePath, to: &TreePath) -> Option<TreePath> {
        if !self.starts_with(from) {
            return None;
        }
        let mut segments = to.segments.clone();
        segments.extend_from_slice(&self.segments[from.segments.len()..]);
        Some(Self { segments })
    }

    /// Every proper ancestor directory, outermost first, excluding the root
    pub fn ancestors(&self) -> Vec<TreePath> {
        (1..self.segments.len())
            .map(|len| Self {
                segments: self.segments[..len].to_vec(),
            })
            .collect()
    }
}

/// Check a single path segment / item name
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(WorkspaceError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for TreePath {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> TreePath {
        TreePath::parse(raw).unwrap()
    }

    #[test]
    fn test_parse() {
        assert!(p("").is_root());
        assert!(p("/").is_root());
        assert_eq!(p("src/main.rs").segments(), ["src", "main.rs"]);
        assert_eq!(p("/src/lib/").to_string(), "src/lib");

        assert!(matches!(
            TreePath::parse("a//b"),
            Err(WorkspaceError::InvalidName { .. })
        ));
        assert!(TreePath::parse("a/../b").is_err());
    }

    #[test]
    fn test_parent_and_name() {
        let path = p("src/util/mod.rs");
        assert_eq!(path.name(), Some("mod.rs"));
        assert_eq!(path.parent(), Some(p("src/util")));
        assert_eq!(p("a").parent(), Some(TreePath::root()));
        assert_eq!(TreePath::root().parent(), None);
        assert_eq!(path.with_name("lib.rs").unwrap(), p("src/util/lib.rs"));
    }

    #[test]
    fn test_prefix_relations() {
        let src = p("src");
        assert!(p("src").starts_with(&src));
        assert!(p("src/a.js").starts_with(&src));
        assert!(!p("srcx/a.js").starts_with(&src));
        assert!(!p("src").is_descendant_of(&src));
        assert!(p("src/a/b").is_descendant_of(&src));
        assert!(p("anything").is_descendant_of(&TreePath::root()));
    }

    #[test]
    fn test_rebase() {
        let from = p("src");
        let to = p("lib");
        assert_eq!(p("src/a.js").rebase(&from, &to), Some(p("lib/a.js")));
        assert_eq!(p("src").rebase(&from, &to), Some(p("lib")));
        assert_eq!(p("other.js").rebase(&from, &to), None);
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(p("a/b/c.txt").ancestors(), vec![p("a"), p("a/b")]);
        assert!(p("top.txt").ancestors().is_empty());
    }
}
