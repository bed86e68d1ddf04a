use crate::error::ModelError;
use crate::mapping::{Assoc, Mapping};
use crate::node::Node;

/// Document selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    /// Text cursor or range; `anchor` stays put while `head` moves
    Text { anchor: usize, head: usize },
    /// A single selected node spanning `from..to`. Not drawn with the
    /// native caret.
    Node { from: usize, to: usize },
    All { size: usize },
}

impl Selection {
    pub fn cursor(pos: usize) -> Self {
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    pub fn text(anchor: usize, head: usize) -> Self {
        Selection::Text { anchor, head }
    }

    /// Select the node that starts at `pos`.
    pub fn node(doc: &Node, pos: usize) -> Result<Self, ModelError> {
        let node = doc.node_at(pos).ok_or(ModelError::PositionOutOfRange {
            pos,
            size: doc.content_size(),
        })?;
        Ok(Selection::Node {
            from: pos,
            to: pos + node.node_size(),
        })
    }

    pub fn all(doc: &Node) -> Self {
        Selection::All {
            size: doc.content_size(),
        }
    }

    pub fn anchor(&self) -> usize {
        match *self {
            Selection::Text { anchor, .. } => anchor,
            Selection::Node { from, .. } => from,
            Selection::All { .. } => 0,
        }
    }

    pub fn head(&self) -> usize {
        match *self {
            Selection::Text { head, .. } => head,
            Selection::Node { to, .. } => to,
            Selection::All { size } => size,
        }
    }

    pub fn from(&self) -> usize {
        self.anchor().min(self.head())
    }

    pub fn to(&self) -> usize {
        self.anchor().max(self.head())
    }

    pub fn is_empty(&self) -> bool {
        self.anchor() == self.head()
    }

    /// Whether the native caret/range should be shown for this selection
    pub fn visible(&self) -> bool {
        !matches!(self, Selection::Node { .. })
    }

    /// Map through a change. `doc` is the document after the change.
    pub fn map(&self, mapping: &Mapping, doc: &Node) -> Selection {
        match *self {
            Selection::Text { anchor, head } => {
                let head = mapping.map(head, Assoc::Right);
                if !is_text_position(doc, head) {
                    return Selection::near(doc, head, 1);
                }
                let anchor = mapping.map(anchor, Assoc::Right);
                if is_text_position(doc, anchor) {
                    Selection::Text { anchor, head }
                } else {
                    Selection::cursor(head)
                }
            }
            Selection::Node { from, .. } => {
                let result = mapping.map_result(from, Assoc::Right);
                if result.deleted() {
                    return Selection::near(doc, result.pos, 1);
                }
                Selection::node(doc, result.pos)
                    .unwrap_or_else(|_| Selection::near(doc, result.pos, 1))
            }
            Selection::All { .. } => Selection::all(doc),
        }
    }

    /// Closest valid cursor position to `pos`, searching in the `bias`
    /// direction first. Falls back to selecting everything when the
    /// document has no textblock.
    pub fn near(doc: &Node, pos: usize, bias: i8) -> Selection {
        let size = doc.content_size();
        let pos = pos.min(size);
        let forward = (pos..=size).find(|&p| is_text_position(doc, p));
        let backward = (0..=pos).rev().find(|&p| is_text_position(doc, p));
        let found = if bias < 0 {
            backward.or(forward)
        } else {
            forward.or(backward)
        };
        match found {
            Some(pos) => Selection::cursor(pos),
            None => Selection::all(doc),
        }
    }

    pub fn at_start(doc: &Node) -> Selection {
        Selection::near(doc, 0, 1)
    }

    /// Clamp the selection into a document, e.g. after the owner replaced
    /// the document wholesale.
    pub fn clamp(&self, doc: &Node) -> Selection {
        let size = doc.content_size();
        match *self {
            Selection::Text { anchor, head }
                if anchor <= size
                    && head <= size
                    && is_text_position(doc, anchor)
                    && is_text_position(doc, head) =>
            {
                *self
            }
            Selection::Node { from, to } if to <= size => {
                Selection::node(doc, from).unwrap_or_else(|_| Selection::near(doc, from, 1))
            }
            Selection::All { .. } => Selection::all(doc),
            _ => Selection::near(doc, self.head(), 1),
        }
    }
}

fn is_text_position(doc: &Node, pos: usize) -> bool {
    doc.resolve(pos)
        .map(|resolved| resolved.parent().is_textblock())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{doc, img, p, pt, txt};
    use crate::mapping::StepMap;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_selection_maps_through_insert() {
        let mut mapping = Mapping::new();
        mapping.append_map(StepMap::replace(2, 0, 3));

        let mapped = Selection::text(1, 4).map(&mapping, &doc(vec![pt("abXXXcdef")]));
        assert_eq!(mapped, Selection::text(1, 7));
        assert_eq!(Selection::text(4, 1).from(), 1);
    }

    #[test]
    fn test_near_skips_block_boundaries() {
        let d = doc(vec![pt("ab"), pt("cd")]);
        assert_eq!(Selection::near(&d, 4, 1), Selection::cursor(5));
        assert_eq!(Selection::near(&d, 4, -1), Selection::cursor(3));
        assert_eq!(Selection::at_start(&d), Selection::cursor(1));
    }

    #[test]
    fn test_node_selection_is_not_visible() {
        let d = doc(vec![p(vec![txt("a"), img("x.png")])]);
        let selection = Selection::node(&d, 2).unwrap();

        assert_eq!(selection, Selection::Node { from: 2, to: 3 });
        assert!(!selection.visible());
        assert!(Selection::cursor(1).visible());
    }

    #[test]
    fn test_deleted_node_selection_falls_back_to_cursor() {
        let mut mapping = Mapping::new();
        mapping.append_map(StepMap::replace(2, 1, 0));
        let after = doc(vec![pt("a")]);

        let mapped = Selection::Node { from: 2, to: 3 }.map(&mapping, &after);
        assert_eq!(mapped, Selection::cursor(2));
    }
}
