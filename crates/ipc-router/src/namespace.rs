//! Namespace tree
//!
//! Projection of the flat channel set into nested segments, e.g.
//! `["a:b:c", "a:b:d", "a:e"]` → `{"a": {"b": {"c": true, "d": true}, "e": true}}`.
//! The tree is recomputed from the route set whenever asked for. Children
//! are kept sorted so the structure and its rendering do not depend on the
//! order channels were registered in.

use crate::channel::SEPARATOR;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceNode {
    callable: bool,
    children: BTreeMap<String, NamespaceNode>,
}

impl NamespaceNode {
    /// A node is rendered as a leaf only when nothing hangs below it;
    /// a branch always wins over a leaf of the same name.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether a channel ends exactly at this node
    pub fn is_callable(&self) -> bool {
        self.callable
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &NamespaceNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for NamespaceNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_leaf() {
            return serializer.serialize_bool(true);
        }
        let mut map = serializer.serialize_map(Some(self.children.len()))?;
        for (segment, child) in &self.children {
            map.serialize_entry(segment, child)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceTree {
    root: NamespaceNode,
}

impl NamespaceTree {
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Top-level segments
    pub fn children(&self) -> impl Iterator<Item = (&str, &NamespaceNode)> {
        self.root.children()
    }

    /// Node at a colon-delimited path
    pub fn get(&self, path: &str) -> Option<&NamespaceNode> {
        path.split(SEPARATOR)
            .try_fold(&self.root, |node, segment| node.children.get(segment))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}

impl Serialize for NamespaceTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.root.children.len()))?;
        for (segment, child) in &self.root.children {
            map.serialize_entry(segment, child)?;
        }
        map.end()
    }
}

/// Build the namespace tree for a set of channel paths
pub fn build_namespace_tree<'a, I>(paths: I) -> NamespaceTree
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tree = NamespaceTree::default();

    for path in paths.into_iter().filter(|p| !p.is_empty()) {
        let node = path.split(SEPARATOR).fold(&mut tree.root, |node, segment| {
            node.children.entry(segment.to_string()).or_default()
        });
        node.callable = true;
    }

    tree
}
