use super::{Data, NodeKind, Pre};
use std::borrow::Cow;

#[derive(Debug, Clone)]
struct MemNode {
    kind: NodeKind,
    parent: Option<Pre>,
    size: u32,
    value: Vec<u8>,
}

/// In-memory node table, used by tests, benches and small embedded callers
#[derive(Debug, Clone, Default)]
pub struct MemData {
    nodes: Vec<MemNode>,
}

impl MemData {
    pub fn builder() -> MemDataBuilder {
        MemDataBuilder::default()
    }

    /// A flat table of text nodes at positions `0..n`
    pub fn texts<I, T>(texts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let nodes = texts
            .into_iter()
            .map(|t| MemNode {
                kind: NodeKind::Text,
                parent: None,
                size: 1,
                value: t.as_ref().to_vec(),
            })
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Data for MemData {
    fn kind(&self, pre: Pre) -> NodeKind {
        self.nodes[pre as usize].kind
    }

    fn parent(&self, pre: Pre, _kind: NodeKind) -> Option<Pre> {
        self.nodes[pre as usize].parent
    }

    fn size(&self, pre: Pre, _kind: NodeKind) -> u32 {
        self.nodes[pre as usize].size
    }

    fn text(&self, pre: Pre, _text: bool) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.nodes[pre as usize].value)
    }

    fn total_size(&self) -> u32 {
        self.nodes.len() as u32
    }
}

/// Builds a [`MemData`] document by document in table order.
///
/// Attributes must be added directly after their element is opened.
#[derive(Debug, Default)]
pub struct MemDataBuilder {
    nodes: Vec<MemNode>,
    open: Vec<Pre>,
}

impl MemDataBuilder {
    fn push(&mut self, kind: NodeKind, value: &[u8]) -> Pre {
        let pre = self.nodes.len() as Pre;
        self.nodes.push(MemNode {
            kind,
            parent: self.open.last().copied(),
            size: 1,
            value: value.to_vec(),
        });
        pre
    }

    pub fn open_doc(mut self, uri: &str) -> Self {
        let pre = self.push(NodeKind::Doc, uri.as_bytes());
        self.open.push(pre);
        self
    }

    pub fn open_elem(mut self, name: &str) -> Self {
        let pre = self.push(NodeKind::Elem, name.as_bytes());
        self.open.push(pre);
        self
    }

    pub fn attr(mut self, value: &str) -> Self {
        self.push(NodeKind::Attr, value.as_bytes());
        self
    }

    pub fn text(mut self, value: &str) -> Self {
        self.push(NodeKind::Text, value.as_bytes());
        self
    }

    pub fn comment(mut self, value: &str) -> Self {
        self.push(NodeKind::Comm, value.as_bytes());
        self
    }

    /// Close the innermost open element or document
    pub fn close(mut self) -> Self {
        if let Some(pre) = self.open.pop() {
            let size = self.nodes.len() as u32 - pre;
            self.nodes[pre as usize].size = size;
        }
        self
    }

    pub fn finish(mut self) -> MemData {
        while !self.open.is_empty() {
            self = self.close();
        }
        MemData { nodes: self.nodes }
    }
}
