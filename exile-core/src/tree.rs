//! Nested path trees keyed by path component.
//!
//! Both the manifest's `files` section and the resolve snapshot are trees of
//! this shape: interior nodes are JSON objects keyed by path segment, leaves
//! carry the per-file payload. Traversal is always by explicit path
//! components; see [`crate::paths::resolve_components`] for turning a
//! filesystem path into components.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A tree node: a tracked file or a directory of further nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node<T> {
    Directory(BTreeMap<String, Node<T>>),
    Leaf(T),
}

/// Which variant of [`Node`] was found somewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => write!(f, "file"),
            NodeKind::Directory => write!(f, "directory"),
        }
    }
}

/// An insert hit a node of the wrong kind.
///
/// `depth` indexes the offending component in the path passed to
/// [`FileTree::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeConflict {
    pub depth: usize,
    pub found: NodeKind,
}

impl<T> Node<T> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Leaf(_) => NodeKind::File,
            Node::Directory(_) => NodeKind::Directory,
        }
    }

    /// All leaves of this node, with paths relative to the node itself.
    /// A leaf node yields itself with an empty path.
    pub fn leaves(&self) -> Leaves<'_, T> {
        Leaves {
            stack: vec![(PathBuf::new(), self)],
        }
    }
}

/// Root of a path tree. Serializes as the bare JSON object of its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree<T> {
    nodes: BTreeMap<String, Node<T>>,
}

impl<T> Default for FileTree<T> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
        }
    }
}

impl<T> FileTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node at `parts`. The root itself is not a node; empty `parts`
    /// returns `None`.
    pub fn node(&self, parts: &[String]) -> Option<&Node<T>> {
        let (first, rest) = parts.split_first()?;
        let mut node = self.nodes.get(first)?;
        for name in rest {
            node = match node {
                Node::Directory(children) => children.get(name)?,
                Node::Leaf(_) => return None,
            };
        }
        Some(node)
    }

    /// The leaf payload at `parts`; `None` for directories and unknown paths.
    pub fn get(&self, parts: &[String]) -> Option<&T> {
        match self.node(parts)? {
            Node::Leaf(value) => Some(value),
            Node::Directory(_) => None,
        }
    }

    /// Leaves under `parts`, with paths relative to the tree root.
    ///
    /// Empty `parts` walks the whole tree. Returns `None` if nothing is
    /// stored at `parts`.
    pub fn leaves(&self, parts: &[String]) -> Option<Leaves<'_, T>> {
        if parts.is_empty() {
            let mut leaves = Leaves::empty();
            leaves.push_children(Path::new(""), &self.nodes);
            return Some(leaves);
        }
        let node = self.node(parts)?;
        Some(Leaves {
            stack: vec![(parts.iter().collect(), node)],
        })
    }

    /// Store `value` at `parts`, creating intermediate directories.
    ///
    /// Returns the previous leaf value, if any. A leaf standing where a
    /// directory is needed, or a directory where the leaf goes, is reported
    /// as a [`ShapeConflict`] and the tree is left unchanged.
    pub fn insert(&mut self, parts: &[String], value: T) -> Result<Option<T>, ShapeConflict> {
        let Some((last, dirs)) = parts.split_last() else {
            return Err(ShapeConflict {
                depth: 0,
                found: NodeKind::Directory,
            });
        };

        let mut map = &mut self.nodes;
        for (depth, name) in dirs.iter().enumerate() {
            map = match map
                .entry(name.clone())
                .or_insert_with(|| Node::Directory(BTreeMap::new()))
            {
                Node::Directory(children) => children,
                Node::Leaf(_) => {
                    return Err(ShapeConflict {
                        depth,
                        found: NodeKind::File,
                    })
                }
            };
        }

        match map.get_mut(last) {
            Some(Node::Leaf(existing)) => Ok(Some(std::mem::replace(existing, value))),
            Some(Node::Directory(_)) => Err(ShapeConflict {
                depth: dirs.len(),
                found: NodeKind::Directory,
            }),
            None => {
                map.insert(last.clone(), Node::Leaf(value));
                Ok(None)
            }
        }
    }

    /// Detach the subtree at `parts` and return it.
    ///
    /// Directories left empty by the removal are pruned. Empty `parts`
    /// detaches everything.
    pub fn remove(&mut self, parts: &[String]) -> Option<Node<T>> {
        if parts.is_empty() {
            if self.nodes.is_empty() {
                return None;
            }
            return Some(Node::Directory(std::mem::take(&mut self.nodes)));
        }
        remove_from(&mut self.nodes, parts)
    }
}

fn remove_from<T>(map: &mut BTreeMap<String, Node<T>>, parts: &[String]) -> Option<Node<T>> {
    let (first, rest) = parts.split_first()?;
    if rest.is_empty() {
        return map.remove(first);
    }
    let Node::Directory(children) = map.get_mut(first)? else {
        return None;
    };
    let removed = remove_from(children, rest)?;
    if children.is_empty() {
        map.remove(first);
    }
    Some(removed)
}

/// Lazy depth-first walk over leaves, in component order.
///
/// Produced by [`FileTree::leaves`] and [`Node::leaves`]; each call starts a
/// fresh walk.
pub struct Leaves<'a, T> {
    stack: Vec<(PathBuf, &'a Node<T>)>,
}

impl<'a, T> Leaves<'a, T> {
    pub fn empty() -> Self {
        Self { stack: Vec::new() }
    }

    fn push_children(&mut self, parent: &Path, children: &'a BTreeMap<String, Node<T>>) {
        self.stack.extend(
            children
                .iter()
                .rev()
                .map(|(name, child)| (parent.join(name), child)),
        );
    }
}

impl<'a, T> Iterator for Leaves<'a, T> {
    type Item = (PathBuf, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((path, node)) = self.stack.pop() {
            match node {
                Node::Leaf(value) => return Some((path, value)),
                Node::Directory(children) => self.push_children(&path, children),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(path: &str) -> Vec<String> {
        path.split('/').map(str::to_owned).collect()
    }

    fn paths<T>(leaves: Leaves<'_, T>) -> Vec<String> {
        leaves
            .map(|(p, _)| p.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn insert_creates_intermediate_directories() {
        let mut tree = FileTree::new();
        assert_eq!(tree.insert(&parts("a/b/c"), 1).unwrap(), None);
        assert_eq!(tree.get(&parts("a/b/c")), Some(&1));
        assert_eq!(tree.node(&parts("a/b")).map(Node::kind), Some(NodeKind::Directory));
        assert_eq!(tree.get(&parts("a/b")), None);
    }

    #[test]
    fn insert_returns_previous_value() {
        let mut tree = FileTree::new();
        tree.insert(&parts("x"), 1).unwrap();
        assert_eq!(tree.insert(&parts("x"), 2).unwrap(), Some(1));
        assert_eq!(tree.get(&parts("x")), Some(&2));
    }

    #[test]
    fn insert_through_leaf_is_a_conflict_and_changes_nothing() {
        let mut tree = FileTree::new();
        tree.insert(&parts("a"), 1).unwrap();
        let before = tree.clone();

        let err = tree.insert(&parts("a/b/c"), 2).unwrap_err();
        assert_eq!(
            err,
            ShapeConflict {
                depth: 0,
                found: NodeKind::File
            }
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn insert_over_directory_is_a_conflict() {
        let mut tree = FileTree::new();
        tree.insert(&parts("a/b"), 1).unwrap();
        let err = tree.insert(&parts("a"), 2).unwrap_err();
        assert_eq!(err.found, NodeKind::Directory);
        assert_eq!(tree.get(&parts("a/b")), Some(&1));
    }

    #[test]
    fn leaves_walk_in_component_order() {
        let mut tree = FileTree::new();
        for path in ["c/e/f", "a", "c/d", "b"] {
            tree.insert(&parts(path), ()).unwrap();
        }
        assert_eq!(paths(tree.leaves(&[]).unwrap()), ["a", "b", "c/d", "c/e/f"]);
        assert_eq!(paths(tree.leaves(&parts("c")).unwrap()), ["c/d", "c/e/f"]);
        assert_eq!(paths(tree.leaves(&parts("c/d")).unwrap()), ["c/d"]);
        assert!(tree.leaves(&parts("missing")).is_none());
    }

    #[test]
    fn leaves_are_restartable() {
        let mut tree = FileTree::new();
        tree.insert(&parts("a/b"), 1).unwrap();
        let first: Vec<_> = paths(tree.leaves(&[]).unwrap());
        let second: Vec<_> = paths(tree.leaves(&[]).unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn remove_detaches_subtree_and_keeps_siblings() {
        let mut tree = FileTree::new();
        tree.insert(&parts("a/b/c"), 1).unwrap();
        tree.insert(&parts("a/b/d"), 2).unwrap();
        tree.insert(&parts("a/x"), 3).unwrap();

        let detached = tree.remove(&parts("a/b")).expect("detached");
        assert_eq!(paths(detached.leaves()), ["c", "d"]);
        assert_eq!(paths(tree.leaves(&[]).unwrap()), ["a/x"]);
    }

    #[test]
    fn remove_prunes_emptied_directories() {
        let mut tree = FileTree::new();
        tree.insert(&parts("a/b/c"), 1).unwrap();
        assert_eq!(tree.remove(&parts("a/b/c")), Some(Node::Leaf(1)));
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_through_leaf_finds_nothing() {
        let mut tree = FileTree::new();
        tree.insert(&parts("a"), 1).unwrap();
        assert_eq!(tree.remove(&parts("a/b")), None);
        assert_eq!(tree.get(&parts("a")), Some(&1));
    }

    #[test]
    fn json_shape_matches_filesystem_nesting() {
        let mut tree = FileTree::new();
        tree.insert(&parts("a"), "A".to_string()).unwrap();
        tree.insert(&parts("c/d"), "D".to_string()).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json, serde_json::json!({"a": "A", "c": {"d": "D"}}));

        let back: FileTree<String> = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }
}
