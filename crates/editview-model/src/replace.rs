use std::fmt;

use crate::error::ModelError;
use crate::node::{Fragment, Node};
use crate::resolved::ResolvedPos;

/// A piece of document cut out of its context. `open_start` and `open_end`
/// count how many levels of the first and last node are open, i.e. not
/// closed at that side.
#[derive(Clone, PartialEq)]
pub struct Slice {
    pub content: Fragment,
    pub open_start: usize,
    pub open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    pub fn empty() -> Self {
        Self::new(Fragment::empty(), 0, 0)
    }

    pub fn closed(content: Fragment) -> Self {
        Self::new(content, 0, 0)
    }

    /// Number of positions this slice adds to a document
    pub fn size(&self) -> usize {
        self.content.size() - self.open_start - self.open_end
    }

    pub fn is_empty(&self) -> bool {
        self.content.size() == 0
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({},{})", self.content, self.open_start, self.open_end)
    }
}

pub(crate) fn replace(
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
) -> Result<Node, ModelError> {
    if slice.open_start > from.depth() {
        return Err(ModelError::Replace(
            "inserted content deeper than insertion position".to_string(),
        ));
    }
    if from.depth() - slice.open_start != to.depth() - slice.open_end {
        return Err(ModelError::Replace("inconsistent open depths".to_string()));
    }
    replace_outer(from, to, slice, 0)
}

fn replace_outer(
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ModelError> {
    let index = from.index(depth);
    let node = from.node(depth);
    if index == to.index(depth) && depth < from.depth() - slice.open_start {
        let inner = replace_outer(from, to, slice, depth + 1)?;
        return Ok(node.copy(node.content().replace_child(index, inner)));
    }
    if slice.content.size() == 0 {
        return close(node, replace_two_way(from, to, depth)?);
    }
    if slice.open_start == 0
        && slice.open_end == 0
        && from.depth() == depth
        && to.depth() == depth
    {
        let parent = from.parent();
        let content = parent.content();
        let joined = content
            .cut(0, Some(from.parent_offset()))
            .append(&slice.content)
            .append(&content.cut(to.parent_offset(), None));
        return close(parent, joined);
    }
    let (start, end) = prepare_slice_for_replace(slice, from)?;
    close(node, replace_three_way(from, &start, &end, to, depth)?)
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ModelError> {
    if sub.ty().compatible_content(main.ty()) {
        Ok(())
    } else {
        Err(ModelError::Replace(format!(
            "cannot join {} onto {}",
            sub.type_name(),
            main.type_name()
        )))
    }
}

fn joinable(before: &ResolvedPos, after: &ResolvedPos, depth: usize) -> Result<Node, ModelError> {
    let node = before.node(depth);
    check_join(node, after.node(depth))?;
    Ok(node.clone())
}

fn add_range(
    start: Option<&ResolvedPos>,
    end: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let Some(reference) = end.or(start) else {
        return;
    };
    let node = reference.node(depth);
    let mut start_index = 0;
    let end_index = end.map_or(node.child_count(), |end| end.index(depth));
    if let Some(start) = start {
        start_index = start.index(depth);
        if start.depth() > depth {
            start_index += 1;
        } else if start.text_offset() > 0 {
            if let Some(after) = start.node_after() {
                target.push(after);
            }
            start_index += 1;
        }
    }
    for index in start_index..end_index {
        target.push(node.child(index).clone());
    }
    if let Some(end) = end
        && end.depth() == depth
        && end.text_offset() > 0
        && let Some(before) = end.node_before()
    {
        target.push(before);
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node, ModelError> {
    node.ty().check_content(&content)?;
    Ok(node.copy(content))
}

fn replace_three_way(
    from: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let open_start = if from.depth() > depth {
        Some(joinable(from, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(end, to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(open_start), Some(open_end)) if start.index(depth) == end.index(depth) => {
            check_join(open_start, open_end)?;
            let inner = replace_three_way(from, start, end, to, depth + 1)?;
            content.push(close(open_start, inner)?);
        }
        _ => {
            if let Some(open_start) = &open_start {
                let inner = replace_two_way(from, start, depth + 1)?;
                content.push(close(open_start, inner)?);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(open_end) = &open_end {
                let inner = replace_two_way(end, to, depth + 1)?;
                content.push(close(open_end, inner)?);
            }
        }
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

fn replace_two_way(
    from: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let ty = joinable(from, to, depth + 1)?;
        let inner = replace_two_way(from, to, depth + 1)?;
        content.push(close(&ty, inner)?);
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

/// Wrap the slice content in copies of the ancestors of `along`, so its
/// open sides can be resolved like positions in a real document.
fn prepare_slice_for_replace(
    slice: &Slice,
    along: &ResolvedPos,
) -> Result<(ResolvedPos, ResolvedPos), ModelError> {
    let extra = along.depth() - slice.open_start;
    let mut node = along.node(extra).copy(slice.content.clone());
    for depth in (0..extra).rev() {
        node = along.node(depth).copy(Fragment::from_node(node));
    }
    let start = node.resolve(slice.open_start + extra)?;
    let end = node.resolve(node.content_size() - slice.open_end - extra)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{blockquote, doc, em, p, pt, txt};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_flat_text() {
        let d = doc(vec![pt("ac")]);
        let slice = Slice::closed(Fragment::from_node(txt("b")));
        let result = d.replace(2, 2, &slice).unwrap();
        assert_eq!(result, doc(vec![pt("abc")]));
    }

    #[test]
    fn test_delete_across_paragraphs_joins_them() {
        let d = doc(vec![pt("one"), pt("two")]);
        let result = d.replace(3, 7, &Slice::empty()).unwrap();
        assert_eq!(result, doc(vec![pt("onwo")]));
    }

    #[test]
    fn test_split_slice_creates_two_paragraphs() {
        let d = doc(vec![pt("abcd")]);
        let split = Slice::new(Fragment::from_vec(vec![p(vec![]), p(vec![])]), 1, 1);
        assert_eq!(split.size(), 2);

        let result = d.replace(3, 3, &split).unwrap();
        assert_eq!(result, doc(vec![pt("ab"), pt("cd")]));
    }

    #[test]
    fn test_replace_keeps_untouched_siblings_shared() {
        let d = doc(vec![pt("one"), pt("two"), pt("three")]);
        let result = d.replace(6, 7, &Slice::empty()).unwrap();

        assert!(result.child(0).ptr_eq(d.child(0)));
        assert!(result.child(2).ptr_eq(d.child(2)));
        assert_eq!(result.child(1), &pt("wo"));
    }

    #[test]
    fn test_slice_from_nested_block_inserts_flat() {
        let d = doc(vec![blockquote(vec![pt("ab")])]);
        let slice = d.slice(2, 4).unwrap();
        assert_eq!(slice.open_start, 0);

        let target = doc(vec![p(vec![em(txt("x"))])]);
        let result = target.replace(1, 1, &slice).unwrap();
        assert_eq!(result, doc(vec![p(vec![txt("ab"), em(txt("x"))])]));
    }

    #[test]
    fn test_inconsistent_depths_rejected() {
        let d = doc(vec![pt("ab")]);
        let slice = Slice::new(Fragment::from_node(p(vec![])), 1, 0);
        assert!(matches!(
            d.replace(1, 1, &slice),
            Err(ModelError::Replace(_))
        ));
    }
}
