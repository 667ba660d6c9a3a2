//! In-memory object tree staged between open and flush.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::path;
use crate::read::StoredData;
use crate::types::{AttrValue, DType, NodeKind};

/// Where a dataset's element bytes live.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    /// Written since open; owned by the tree.
    Owned(Vec<u8>),
    /// Little-endian bytes still in the backing source at `offset..offset + len`.
    Source { offset: usize, len: usize },
    /// In the backing source but chunked or byte-swapped; assembled on read.
    Stored(Box<StoredData>),
}

impl Payload {
    pub(crate) fn resolve<'a>(&'a self, source: &'a [u8]) -> Result<Cow<'a, [u8]>, StoreError> {
        match self {
            Payload::Owned(bytes) => Ok(Cow::Borrowed(bytes.as_slice())),
            Payload::Source { offset, len } => offset
                .checked_add(*len)
                .and_then(|end| source.get(*offset..end))
                .map(Cow::Borrowed)
                .ok_or(StoreError::UnexpectedEof {
                    expected: offset.saturating_add(*len),
                    available: source.len(),
                }),
            Payload::Stored(stored) => stored.load(source).map(Cow::Owned),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DatasetNode {
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub attrs: BTreeMap<String, AttrValue>,
    pub payload: Payload,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct GroupNode {
    pub attrs: BTreeMap<String, AttrValue>,
    pub children: BTreeMap<String, Node>,
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Group(GroupNode),
    Dataset(DatasetNode),
}

impl Node {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Node::Group(_) => NodeKind::Group,
            Node::Dataset(_) => NodeKind::Dataset,
        }
    }

    pub(crate) fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        match self {
            Node::Group(g) => &g.attrs,
            Node::Dataset(d) => &d.attrs,
        }
    }

    fn attrs_mut(&mut self) -> &mut BTreeMap<String, AttrValue> {
        match self {
            Node::Group(g) => &mut g.attrs,
            Node::Dataset(d) => &mut d.attrs,
        }
    }
}

/// The whole object hierarchy, rooted at an (always present) root group.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tree {
    pub root: GroupNode,
}

impl Tree {
    pub(crate) fn node(&self, p: &str) -> Result<&Node, StoreError> {
        let parts = path::components(p)?;
        let Some((last, walk)) = parts.split_last() else {
            return Err(StoreError::InvalidPath(p.to_string()));
        };
        let mut group = &self.root;
        for part in walk {
            group = match group.children.get(*part) {
                Some(Node::Group(g)) => g,
                Some(Node::Dataset(_)) => return Err(StoreError::NotAGroup(p.to_string())),
                None => return Err(StoreError::NotFound(p.to_string())),
            };
        }
        group
            .children
            .get(*last)
            .ok_or_else(|| StoreError::NotFound(p.to_string()))
    }

    pub(crate) fn kind(&self, p: &str) -> Result<Option<NodeKind>, StoreError> {
        if path::components(p)?.is_empty() {
            return Ok(Some(NodeKind::Group));
        }
        match self.node(p) {
            Ok(node) => Ok(Some(node.kind())),
            Err(StoreError::NotFound(_)) | Err(StoreError::NotAGroup(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(crate) fn group(&self, p: &str) -> Result<&GroupNode, StoreError> {
        if path::components(p)?.is_empty() {
            return Ok(&self.root);
        }
        match self.node(p)? {
            Node::Group(g) => Ok(g),
            Node::Dataset(_) => Err(StoreError::NotAGroup(p.to_string())),
        }
    }

    pub(crate) fn dataset(&self, p: &str) -> Result<&DatasetNode, StoreError> {
        match self.node(p)? {
            Node::Dataset(d) => Ok(d),
            Node::Group(_) => Err(StoreError::NotADataset(p.to_string())),
        }
    }

    pub(crate) fn attrs(&self, p: &str) -> Result<&BTreeMap<String, AttrValue>, StoreError> {
        if path::components(p)?.is_empty() {
            return Ok(&self.root.attrs);
        }
        Ok(self.node(p)?.attrs())
    }

    pub(crate) fn attrs_mut(
        &mut self,
        p: &str,
    ) -> Result<&mut BTreeMap<String, AttrValue>, StoreError> {
        let parts = path::components(p)?;
        let Some((last, walk)) = parts.split_last() else {
            return Ok(&mut self.root.attrs);
        };
        let parent = group_mut(&mut self.root, walk, p)?;
        parent
            .children
            .get_mut(*last)
            .map(Node::attrs_mut)
            .ok_or_else(|| StoreError::NotFound(p.to_string()))
    }

    /// Insert `node` at `p`. The parent must exist and the name must be free.
    pub(crate) fn insert(&mut self, p: &str, node: Node) -> Result<(), StoreError> {
        let parts = path::components(p)?;
        let Some((last, walk)) = parts.split_last() else {
            return Err(StoreError::AlreadyExists("/".to_string()));
        };
        let parent = group_mut(&mut self.root, walk, p)?;
        if parent.children.contains_key(*last) {
            return Err(StoreError::AlreadyExists(p.to_string()));
        }
        parent.children.insert((*last).to_string(), node);
        Ok(())
    }

    /// Detach and return the object at `p` together with its subtree.
    pub(crate) fn remove(&mut self, p: &str) -> Result<Node, StoreError> {
        let parts = path::components(p)?;
        let Some((last, walk)) = parts.split_last() else {
            return Err(StoreError::InvalidPath(p.to_string()));
        };
        let parent = group_mut(&mut self.root, walk, p)?;
        parent
            .children
            .remove(*last)
            .ok_or_else(|| StoreError::NotFound(p.to_string()))
    }
}

fn group_mut<'a>(
    root: &'a mut GroupNode,
    walk: &[&str],
    full: &str,
) -> Result<&'a mut GroupNode, StoreError> {
    let mut group = root;
    for part in walk {
        group = match group.children.get_mut(*part) {
            Some(Node::Group(g)) => g,
            Some(Node::Dataset(_)) => return Err(StoreError::NotAGroup(full.to_string())),
            None => return Err(StoreError::NotFound(full.to_string())),
        };
    }
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(values: &[u8]) -> Node {
        Node::Dataset(DatasetNode {
            dtype: DType::U8,
            shape: vec![values.len()],
            attrs: BTreeMap::new(),
            payload: Payload::Owned(values.to_vec()),
        })
    }

    fn sample_tree() -> Tree {
        let mut tree = Tree::default();
        tree.insert("/data", Node::Group(GroupNode::default())).unwrap();
        tree.insert("/data/x", Node::Group(GroupNode::default())).unwrap();
        tree.insert("/data/x/data", dataset(&[1, 2, 3])).unwrap();
        tree
    }

    #[test]
    fn lookup_kinds() {
        let tree = sample_tree();
        assert_eq!(tree.kind("/").unwrap(), Some(NodeKind::Group));
        assert_eq!(tree.kind("/data/x").unwrap(), Some(NodeKind::Group));
        assert_eq!(tree.kind("/data/x/data").unwrap(), Some(NodeKind::Dataset));
        assert_eq!(tree.kind("/data/missing").unwrap(), None);
        assert_eq!(tree.kind("/data/x/data/below").unwrap(), None);
    }

    #[test]
    fn insert_requires_parent_and_free_name() {
        let mut tree = sample_tree();
        assert!(matches!(
            tree.insert("/nope/child", Node::Group(GroupNode::default())),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            tree.insert("/data/x", Node::Group(GroupNode::default())),
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            tree.insert("/data/x/data/deeper", Node::Group(GroupNode::default())),
            Err(StoreError::NotAGroup(_))
        ));
    }

    #[test]
    fn remove_subtree() {
        let mut tree = sample_tree();
        let removed = tree.remove("/data/x").unwrap();
        assert_eq!(removed.kind(), NodeKind::Group);
        assert_eq!(tree.kind("/data/x/data").unwrap(), None);
        assert!(matches!(tree.remove("/data/x"), Err(StoreError::NotFound(_))));
        assert!(tree.remove("/").is_err());
    }

    #[test]
    fn attrs_on_root_group_and_dataset() {
        let mut tree = sample_tree();
        tree.attrs_mut("/")
            .unwrap()
            .insert("version_major".into(), AttrValue::I64(0));
        tree.attrs_mut("/data/x/data")
            .unwrap()
            .insert("units".into(), AttrValue::Bytes(b"nm".to_vec()));
        assert_eq!(tree.attrs("/").unwrap().len(), 1);
        assert!(tree.attrs("/data/x/data").unwrap().contains_key("units"));
        assert!(tree.attrs("/data/x").unwrap().is_empty());
    }

    #[test]
    fn payload_out_of_range() {
        let payload = Payload::Source { offset: 4, len: 8 };
        assert!(payload.resolve(&[0u8; 10]).is_err());
        assert_eq!(payload.resolve(&[1u8; 12]).unwrap().len(), 8);
    }

    #[test]
    fn payload_range_does_not_wrap() {
        let payload = Payload::Source {
            offset: usize::MAX - 2,
            len: 8,
        };
        assert!(matches!(
            payload.resolve(&[0u8; 16]),
            Err(StoreError::UnexpectedEof {
                expected: usize::MAX,
                available: 16
            })
        ));
    }
}
