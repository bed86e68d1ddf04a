use crate::error::ModelError;
use crate::mark::Mark;
use crate::node::Node;

#[derive(Clone)]
struct PathEntry {
    node: Node,
    index: usize,
    /// Absolute position where the child at `index` starts
    offset: usize,
}

/// A document position with the chain of ancestors that contain it.
#[derive(Clone)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub fn resolve(doc: &Node, pos: usize) -> Result<Self, ModelError> {
        if pos > doc.content_size() {
            return Err(ModelError::PositionOutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.content().find_index(parent_offset, -1)?;
            let rem = parent_offset - offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let child = node.child(index).clone();
            if child.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
            node = child;
        }
        Ok(Self {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].node
    }

    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    pub fn doc(&self) -> &Node {
        self.node(0)
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    pub fn index_after(&self, depth: usize) -> usize {
        let index = self.index(depth);
        if depth == self.depth() && self.text_offset() == 0 {
            index
        } else {
            index + 1
        }
    }

    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position directly before the ancestor at `depth` (depth >= 1)
    pub fn before(&self, depth: usize) -> usize {
        self.path[depth - 1].offset
    }

    pub fn after(&self, depth: usize) -> usize {
        self.before(depth) + self.node(depth).node_size()
    }

    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.maybe_child(index)?;
        let offset = self.text_offset();
        if offset > 0 {
            Some(child.cut(offset, None))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth());
        let offset = self.text_offset();
        if offset > 0 {
            return Some(self.parent().child(index).cut(0, Some(offset)));
        }
        if index == 0 {
            None
        } else {
            Some(self.parent().child(index - 1).clone())
        }
    }

    pub fn pos_at_index(&self, index: usize, depth: usize) -> usize {
        let node = self.node(depth);
        let mut pos = self.start(depth);
        for child in node.children().take(index) {
            pos += child.node_size();
        }
        pos
    }

    /// Marks that text inserted here would get. Non-inclusive marks are
    /// only kept when the node after the position carries them too.
    pub fn marks(&self) -> Vec<Mark> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if parent.content_size() == 0 {
            return Vec::new();
        }
        if self.text_offset() > 0 {
            return parent.child(index).marks().to_vec();
        }
        let before = index.checked_sub(1).and_then(|i| parent.maybe_child(i));
        let after = parent.maybe_child(index);
        let (main, other) = match before {
            Some(before) => (before, after),
            None => match after {
                Some(after) => (after, None),
                None => return Vec::new(),
            },
        };
        main.marks()
            .iter()
            .filter(|mark| {
                mark.is_inclusive() || other.is_some_and(|other| mark.is_in_set(other.marks()))
            })
            .cloned()
            .collect()
    }

    /// Marks for content replacing the range from here to `end`
    pub fn marks_across(&self, end: &ResolvedPos) -> Option<Vec<Mark>> {
        let after = self.parent().maybe_child(self.index(self.depth()))?;
        if !after.is_inline() {
            return None;
        }
        let next = end.parent().maybe_child(end.index(end.depth()));
        Some(
            after
                .marks()
                .iter()
                .filter(|mark| {
                    mark.is_inclusive() || next.is_some_and(|next| mark.is_in_set(next.marks()))
                })
                .cloned()
                .collect(),
        )
    }

    /// Deepest depth whose node contains both this position and `pos`
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|&depth| self.start(depth) <= pos && self.end(depth) >= pos)
            .unwrap_or(0)
    }

    /// Depth of the innermost textblock around the position, if any
    pub fn textblock_depth(&self) -> Option<usize> {
        (0..=self.depth())
            .rev()
            .find(|&depth| self.node(depth).is_textblock())
    }

    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.depth() == other.depth()
            && self.start(self.depth()) == other.start(other.depth())
    }
}

impl std::fmt::Debug for ResolvedPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut text = String::new();
        for depth in 1..=self.depth() {
            if !text.is_empty() {
                text.push('/');
            }
            text.push_str(&format!(
                "{}_{}",
                self.node(depth).type_name(),
                self.index(depth - 1)
            ));
        }
        write!(f, "{text}:{}", self.parent_offset)
    }
}

#[cfg(test)]
mod tests {
    use crate::builders::{blockquote, br, doc, em, p, pt, txt};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 0)]
    #[case(1, 1, 0)]
    #[case(3, 1, 2)]
    #[case(5, 0, 5)]
    #[case(6, 1, 0)]
    fn test_resolve_depth_and_offset(
        #[case] pos: usize,
        #[case] depth: usize,
        #[case] parent_offset: usize,
    ) {
        let d = doc(vec![pt("abc"), pt("de")]);
        let resolved = d.resolve(pos).unwrap();

        assert_eq!(resolved.depth(), depth);
        assert_eq!(resolved.parent_offset(), parent_offset);
    }

    #[test]
    fn test_resolve_out_of_range() {
        let d = doc(vec![pt("abc")]);
        assert!(d.resolve(6).is_err());
    }

    #[test]
    fn test_nested_boundaries() {
        let d = doc(vec![blockquote(vec![pt("ab")])]);
        let resolved = d.resolve(3).unwrap();

        assert_eq!(resolved.depth(), 2);
        assert_eq!(resolved.start(2), 2);
        assert_eq!(resolved.end(2), 4);
        assert_eq!(resolved.before(1), 0);
        assert_eq!(resolved.after(1), 6);
        assert_eq!(resolved.before(2), 1);
        assert_eq!(format!("{resolved:?}"), "blockquote_0/paragraph_0:1");
    }

    #[test]
    fn test_node_before_and_after_split_text() {
        let d = doc(vec![p(vec![txt("ab"), br(), txt("cd")])]);

        let inside = d.resolve(2).unwrap();
        let text_of = |n: crate::Node| n.text().map(str::to_string);
        assert_eq!(inside.node_before().and_then(text_of), Some("a".into()));
        assert_eq!(inside.node_after().and_then(text_of), Some("b".into()));

        let at_break = d.resolve(3).unwrap();
        assert_eq!(
            at_break.node_after().map(|n| n.type_name().to_string()),
            Some("hard_break".into())
        );
        assert_eq!(at_break.text_offset(), 0);
    }

    #[test]
    fn test_marks_at_end_of_inclusive_mark() {
        let d = doc(vec![p(vec![em(txt("ab")), txt("c")])]);
        let names: Vec<String> = d
            .resolve(3)
            .unwrap()
            .marks()
            .iter()
            .map(|m| m.type_name().to_string())
            .collect();
        assert_eq!(names, vec!["em".to_string()]);
    }

    #[test]
    fn test_shared_depth() {
        let d = doc(vec![pt("ab"), pt("cd")]);
        let resolved = d.resolve(1).unwrap();
        assert_eq!(resolved.shared_depth(3), 1);
        assert_eq!(resolved.shared_depth(5), 0);
    }
}
