use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;
use crate::mark::Mark;
use crate::replace::{self, Slice};
use crate::resolved::ResolvedPos;
use crate::schema::{NodeType, NodeTypeId};

pub type Attrs = BTreeMap<String, String>;

/// Immutable document node. Cloning is cheap and unchanged subtrees are
/// shared between successive documents, so `ptr_eq` is a fast identity test.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

struct NodeInner {
    ty: Arc<NodeType>,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<String>,
    text_len: usize,
}

impl Node {
    pub fn new(ty: Arc<NodeType>, attrs: Attrs, content: Fragment, marks: Vec<Mark>) -> Self {
        Node(Arc::new(NodeInner {
            ty,
            attrs,
            content,
            marks,
            text: None,
            text_len: 0,
        }))
    }

    pub fn new_text(ty: Arc<NodeType>, text: &str, marks: Vec<Mark>) -> Self {
        Node(Arc::new(NodeInner {
            ty,
            attrs: Attrs::new(),
            content: Fragment::empty(),
            marks,
            text_len: text.chars().count(),
            text: Some(text.to_string()),
        }))
    }

    pub fn ty(&self) -> &Arc<NodeType> {
        &self.0.ty
    }

    pub fn type_id(&self) -> NodeTypeId {
        self.0.ty.id
    }

    pub fn type_name(&self) -> &str {
        &self.0.ty.name
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.0.attrs.get(name).map(String::as_str)
    }

    pub fn content(&self) -> &Fragment {
        &self.0.content
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.0.text.is_some()
    }

    pub fn is_inline(&self) -> bool {
        self.0.ty.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.0.ty.is_block()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.ty.is_leaf()
    }

    pub fn is_textblock(&self) -> bool {
        self.0.ty.is_textblock()
    }

    /// Length of the text in chars (0 for non-text nodes)
    pub fn text_len(&self) -> usize {
        self.0.text_len
    }

    pub fn node_size(&self) -> usize {
        if self.is_text() {
            self.0.text_len
        } else if self.is_leaf() {
            1
        } else {
            self.0.content.size() + 2
        }
    }

    pub fn content_size(&self) -> usize {
        self.0.content.size()
    }

    pub fn child_count(&self) -> usize {
        self.0.content.child_count()
    }

    pub fn child(&self, index: usize) -> &Node {
        self.0.content.child(index)
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.0.content.maybe_child(index)
    }

    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.0.content.iter()
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.0.content.first_child()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last_child()
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn same_markup(&self, other: &Node) -> bool {
        self.type_id() == other.type_id()
            && self.attrs() == other.attrs()
            && Mark::same_set(self.marks(), other.marks())
    }

    /// Same type, attributes and marks, with different content.
    pub fn copy(&self, content: Fragment) -> Node {
        Node(Arc::new(NodeInner {
            ty: self.0.ty.clone(),
            attrs: self.0.attrs.clone(),
            content,
            marks: self.0.marks.clone(),
            text: self.0.text.clone(),
            text_len: self.0.text_len,
        }))
    }

    pub fn with_text(&self, text: &str) -> Node {
        Node::new_text(self.0.ty.clone(), text, self.0.marks.clone())
    }

    pub fn mark(&self, marks: Vec<Mark>) -> Node {
        Node(Arc::new(NodeInner {
            ty: self.0.ty.clone(),
            attrs: self.0.attrs.clone(),
            content: self.0.content.clone(),
            marks,
            text: self.0.text.clone(),
            text_len: self.0.text_len,
        }))
    }

    pub fn cut(&self, from: usize, to: Option<usize>) -> Node {
        if let Some(text) = self.text() {
            let to = to.unwrap_or(self.0.text_len);
            if from == 0 && to == self.0.text_len {
                return self.clone();
            }
            return self.with_text(char_slice(text, from, to));
        }
        let to = to.unwrap_or(self.content_size());
        if from == 0 && to == self.content_size() {
            return self.clone();
        }
        self.copy(self.0.content.cut(from, Some(to)))
    }

    pub fn text_content(&self) -> String {
        match self.text() {
            Some(text) => text.to_string(),
            None => self.text_between(0, self.content_size(), None),
        }
    }

    pub fn text_between(&self, from: usize, to: usize, block_separator: Option<&str>) -> String {
        self.0.content.text_between(from, to, block_separator)
    }

    /// Call `f` for every descendant with its position. Returning false
    /// skips the node's children.
    pub fn descendants<F>(&self, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node) -> bool,
    {
        self.0.content.nodes_between(0, self.content_size(), f, 0, self);
    }

    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node) -> bool,
    {
        self.0.content.nodes_between(from, to, f, 0, self);
    }

    /// The node starting at `pos`, if any (text nodes also match inside).
    pub fn node_at(&self, mut pos: usize) -> Option<Node> {
        let mut node = self.clone();
        loop {
            let (index, offset) = node.content().find_index(pos, -1).ok()?;
            let child = node.maybe_child(index)?.clone();
            if offset == pos || child.is_text() {
                return Some(child);
            }
            pos -= offset + 1;
            node = child;
        }
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, ModelError> {
        ResolvedPos::resolve(self, pos)
    }

    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, ModelError> {
        if from == to {
            return Ok(Slice::empty());
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(rfrom.pos() - start, Some(rto.pos() - start));
        Ok(Slice::new(
            content,
            rfrom.depth() - depth,
            rto.depth() - depth,
        ))
    }

    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ModelError> {
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        replace::replace(&rfrom, &rto, slice)
    }

    pub fn check(&self) -> Result<(), ModelError> {
        self.0.ty.check_content(&self.0.content)?;
        for child in self.children() {
            child.check()?;
        }
        Ok(())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.same_markup(other)
                && self.0.text == other.0.text
                && self.0.content == other.0.content)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body = match self.text() {
            Some(text) => format!("{text:?}"),
            None if self.child_count() > 0 => {
                let inner: Vec<String> =
                    self.children().map(|child| format!("{child:?}")).collect();
                format!("{}({})", self.type_name(), inner.join(", "))
            }
            None => self.type_name().to_string(),
        };
        for mark in self.marks().iter().rev() {
            body = format!("{}({body})", mark.type_name());
        }
        f.write_str(&body)
    }
}

/// Ordered children of a node. Adjacent text nodes with identical marks are
/// always merged.
#[derive(Clone, Default)]
pub struct Fragment {
    nodes: Vec<Node>,
    size: usize,
}

impl Fragment {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_node(node: Node) -> Self {
        Self {
            size: node.node_size(),
            nodes: vec![node],
        }
    }

    pub fn from_vec(nodes: Vec<Node>) -> Self {
        let mut joined: Vec<Node> = Vec::with_capacity(nodes.len());
        let mut size = 0;
        for node in nodes {
            if node.is_text() && node.text_len() == 0 {
                continue;
            }
            size += node.node_size();
            if let Some(last) = joined.last_mut()
                && node.is_text()
                && last.is_text()
                && Mark::same_set(node.marks(), last.marks())
            {
                let merged = format!("{}{}", last.text().unwrap_or(""), node.text().unwrap_or(""));
                *last = last.with_text(&merged);
                continue;
            }
            joined.push(node);
        }
        Self {
            nodes: joined,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn child_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn child(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.size == 0 && other.nodes.is_empty() {
            return self.clone();
        }
        if self.size == 0 && self.nodes.is_empty() {
            return other.clone();
        }
        let mut nodes = self.nodes.clone();
        nodes.extend(other.nodes.iter().cloned());
        Fragment::from_vec(nodes)
    }

    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut nodes = self.nodes.clone();
        nodes[index] = node;
        Fragment::from_vec(nodes)
    }

    pub fn cut(&self, from: usize, to: Option<usize>) -> Fragment {
        let to = to.unwrap_or(self.size);
        if from == 0 && to == self.size {
            return self.clone();
        }
        let mut result = Vec::new();
        if to > from {
            let mut pos = 0;
            for child in &self.nodes {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let child = if pos < from || end > to {
                        if child.is_text() {
                            child.cut(
                                from.saturating_sub(pos),
                                Some(child.text_len().min(to - pos)),
                            )
                        } else {
                            child.cut(
                                from.saturating_sub(pos + 1),
                                Some(child.content_size().min(to.saturating_sub(pos + 1))),
                            )
                        }
                    } else {
                        child.clone()
                    };
                    result.push(child);
                }
                pos = end;
            }
        }
        Fragment::from_vec(result)
    }

    /// Find the child index at `pos` and the offset where that child starts.
    /// `round > 0` prefers the index after a boundary.
    pub fn find_index(&self, pos: usize, round: i32) -> Result<(usize, usize), ModelError> {
        if pos == 0 {
            return Ok((0, 0));
        }
        if pos == self.size {
            return Ok((self.nodes.len(), pos));
        }
        if pos > self.size {
            return Err(ModelError::PositionOutOfRange {
                pos,
                size: self.size,
            });
        }
        let mut cur = 0;
        for (index, child) in self.nodes.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                if end == pos || round > 0 {
                    return Ok((index + 1, end));
                }
                return Ok((index, cur));
            }
            cur = end;
        }
        Err(ModelError::PositionOutOfRange {
            pos,
            size: self.size,
        })
    }

    pub fn text_between(&self, from: usize, to: usize, block_separator: Option<&str>) -> String {
        let mut text = String::new();
        let mut separated = true;
        let mut collect = |node: &Node, pos: usize, _parent: &Node| {
            if let Some(node_text) = node.text() {
                let start = from.saturating_sub(pos);
                let end = node.text_len().min(to.saturating_sub(pos));
                text.push_str(char_slice(node_text, start, end));
                separated = block_separator.is_none();
            } else if node.is_block() && !separated {
                if let Some(separator) = block_separator {
                    text.push_str(separator);
                }
                separated = true;
            }
            true
        };
        // The collector ignores the parent argument
        if let Some(first) = self.nodes.first() {
            self.nodes_between(from, to, &mut collect, 0, first);
        }
        text
    }

    pub(crate) fn nodes_between<F>(
        &self,
        from: usize,
        to: usize,
        f: &mut F,
        node_start: usize,
        parent: &Node,
    ) where
        F: FnMut(&Node, usize, &Node) -> bool,
    {
        let mut pos = 0;
        for child in &self.nodes {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent) && child.content_size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    child.content_size().min(to.saturating_sub(start)),
                    f,
                    node_start + start,
                    child,
                );
            }
            pos = end;
        }
    }

    /// First position where the two fragments differ, or `None` if equal.
    pub fn find_diff_start(&self, other: &Fragment, mut pos: usize) -> Option<usize> {
        let mut index = 0;
        loop {
            if index == self.child_count() || index == other.child_count() {
                return if self.child_count() == other.child_count() {
                    None
                } else {
                    Some(pos)
                };
            }
            let a = self.child(index);
            let b = other.child(index);
            index += 1;
            if a.ptr_eq(b) {
                pos += a.node_size();
                continue;
            }
            if !a.same_markup(b) {
                return Some(pos);
            }
            if let (Some(text_a), Some(text_b)) = (a.text(), b.text()) {
                if text_a != text_b {
                    let common = text_a
                        .chars()
                        .zip(text_b.chars())
                        .take_while(|(x, y)| x == y)
                        .count();
                    return Some(pos + common);
                }
            } else if (a.content_size() > 0 || b.content_size() > 0)
                && let Some(inner) = a.content().find_diff_start(b.content(), pos + 1)
            {
                return Some(inner);
            }
            pos += a.node_size();
        }
    }

    /// Last positions (in self and other) where the fragments differ.
    pub fn find_diff_end(
        &self,
        other: &Fragment,
        mut pos_a: usize,
        mut pos_b: usize,
    ) -> Option<(usize, usize)> {
        let mut index_a = self.child_count();
        let mut index_b = other.child_count();
        loop {
            if index_a == 0 || index_b == 0 {
                return if index_a == index_b {
                    None
                } else {
                    Some((pos_a, pos_b))
                };
            }
            index_a -= 1;
            index_b -= 1;
            let a = self.child(index_a);
            let b = other.child(index_b);
            let size = a.node_size();
            if a.ptr_eq(b) {
                pos_a -= size;
                pos_b -= size;
                continue;
            }
            if !a.same_markup(b) {
                return Some((pos_a, pos_b));
            }
            if let (Some(text_a), Some(text_b)) = (a.text(), b.text()) {
                if text_a != text_b {
                    let same = text_a
                        .chars()
                        .rev()
                        .zip(text_b.chars().rev())
                        .take_while(|(x, y)| x == y)
                        .count();
                    return Some((pos_a - same, pos_b - same));
                }
            } else if (a.content_size() > 0 || b.content_size() > 0)
                && let Some(inner) =
                    a.content()
                        .find_diff_end(b.content(), pos_a - 1, pos_b - 1)
            {
                return Some(inner);
            }
            pos_a -= size;
            pos_b -= b.node_size();
        }
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.nodes == other.nodes
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter()).finish()
    }
}

/// Slice a string by char offsets, clamping to its length.
pub(crate) fn char_slice(text: &str, from: usize, to: usize) -> &str {
    let byte_at = |chars: usize| {
        text.char_indices()
            .nth(chars)
            .map(|(byte, _)| byte)
            .unwrap_or(text.len())
    };
    let start = byte_at(from);
    let end = byte_at(to.max(from));
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{br, doc, em, p, pt, strong, txt};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sizes_follow_border_rules() {
        let d = doc(vec![pt("one"), p(vec![txt("a"), br(), txt("b")])]);

        assert_eq!(d.child(0).node_size(), 5);
        assert_eq!(d.child(1).node_size(), 5);
        assert_eq!(d.content_size(), 10);
    }

    #[test]
    fn test_text_len_counts_chars() {
        let d = doc(vec![pt("héllo")]);
        assert_eq!(d.child(0).content_size(), 5);
    }

    #[test]
    fn test_fragment_merges_adjacent_text_with_same_marks() {
        let para = p(vec![txt("ab"), txt("cd"), strong(txt("ef"))]);
        assert_eq!(para.child_count(), 2);
        assert_eq!(para.child(0).text(), Some("abcd"));
    }

    #[test]
    fn test_cut_across_children() {
        let para = p(vec![txt("ab"), em(txt("cd")), txt("ef")]);
        let cut = para.content().cut(1, Some(5));
        assert_eq!(format!("{cut:?}"), r#"["b", em("cd"), "e"]"#);
    }

    #[test]
    fn test_node_at() {
        let d = doc(vec![pt("one"), pt("two")]);
        assert_eq!(d.node_at(0).map(|n| n.type_name().to_string()), Some("paragraph".into()));
        assert_eq!(d.node_at(5).map(|n| n.type_name().to_string()), Some("paragraph".into()));
        assert_eq!(d.node_at(2).and_then(|n| n.text().map(str::to_string)), Some("one".into()));
        assert!(d.node_at(10).is_none());
    }

    #[test]
    fn test_text_between_with_separator() {
        let d = doc(vec![pt("one"), pt("two")]);
        assert_eq!(d.text_between(0, 10, Some("\n")), "one\ntwo");
        assert_eq!(d.text_between(2, 8, None), "netw");
    }

    #[test]
    fn test_find_diff_start_and_end() {
        let a = doc(vec![pt("one"), pt("two")]);
        let b = doc(vec![pt("one"), pt("tXo")]);

        assert_eq!(a.content().find_diff_start(b.content(), 0), Some(7));
        assert_eq!(
            a.content().find_diff_end(b.content(), 10, 10),
            Some((8, 8))
        );
        assert_eq!(a.content().find_diff_start(a.content(), 0), None);
    }

    #[test]
    fn test_descendants_reports_positions() {
        let d = doc(vec![pt("ab"), p(vec![br()])]);
        let mut seen = Vec::new();
        d.descendants(&mut |node, pos, _| {
            seen.push((node.type_name().to_string(), pos));
            true
        });
        assert_eq!(
            seen,
            vec![
                ("paragraph".to_string(), 0),
                ("text".to_string(), 1),
                ("paragraph".to_string(), 4),
                ("hard_break".to_string(), 5),
            ]
        );
    }

    #[test]
    fn test_debug_format() {
        let d = doc(vec![p(vec![txt("a"), strong(txt("b"))])]);
        assert_eq!(format!("{d:?}"), r#"doc(paragraph("a", strong("b")))"#);
    }
}
