use editview_model::{Decoration, DecorationSource, Node};

/// One child of a node, ready to be mirrored by a descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub node: Node,
    /// Decorations drawn around this child
    pub outer: Vec<Decoration>,
    /// Decorations for the child's own content, relative to it
    pub inner: DecorationSource,
    /// Start of the child relative to the parent's content
    pub offset: usize,
    /// Index in the parent, `None` for a piece of a text node that was cut
    pub index: Option<usize>,
}

/// What the projector emits, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Projected {
    Widget {
        deco: Decoration,
        offset: usize,
        /// Set when the widget falls inside a text node that was split
        inside_text: bool,
    },
    Node(Segment),
}

impl Projected {
    pub fn offset(&self) -> usize {
        match self {
            Projected::Widget { offset, .. } => *offset,
            Projected::Node(segment) => segment.offset,
        }
    }

    pub fn segment(&self) -> Option<&Segment> {
        match self {
            Projected::Node(segment) => Some(segment),
            Projected::Widget { .. } => None,
        }
    }
}

/// Walk the children of `parent` together with the decorations that apply
/// at its level.
///
/// Text is cut at every decoration boundary strictly inside it. Widgets
/// sharing a position come out ordered by side (stable for equal sides),
/// before content at that position. Widgets with a non-negative side at
/// the end of the parent come after the last child.
pub fn project(parent: &Node, source: &DecorationSource) -> Vec<Projected> {
    let locals = source.locals(parent);
    let mut out = Vec::new();
    let mut offset = 0;

    if locals.is_empty() {
        for (index, child) in parent.children().enumerate() {
            out.push(Projected::Node(Segment {
                node: child.clone(),
                outer: Vec::new(),
                inner: source.for_child(offset, child),
                offset,
                index: Some(index),
            }));
            offset += child.node_size();
        }
        return out;
    }

    let mut deco_index = 0;
    let mut active: Vec<&Decoration> = Vec::new();
    let mut rest: Option<Node> = None;
    let mut parent_index = 0;

    loop {
        let mut widgets: Vec<&Decoration> = Vec::new();
        while deco_index < locals.len() && locals[deco_index].to == offset {
            let next = &locals[deco_index];
            deco_index += 1;
            if next.is_widget() {
                widgets.push(next);
            }
        }
        widgets.sort_by_key(|deco| deco.side());
        for deco in widgets {
            out.push(Projected::Widget {
                deco: deco.clone(),
                offset,
                inside_text: rest.is_some(),
            });
        }

        let (mut child, mut index) = match rest.take() {
            Some(node) => (node, None),
            None if parent_index < parent.child_count() => {
                parent_index += 1;
                (parent.child(parent_index - 1).clone(), Some(parent_index - 1))
            }
            None => break,
        };

        active.retain(|deco| deco.to > offset);
        while deco_index < locals.len()
            && locals[deco_index].from <= offset
            && locals[deco_index].to > offset
        {
            active.push(&locals[deco_index]);
            deco_index += 1;
        }

        let mut end = offset + child.node_size();
        if child.is_text() {
            let mut cut_at = end;
            if deco_index < locals.len() && locals[deco_index].from < cut_at {
                cut_at = locals[deco_index].from;
            }
            for deco in &active {
                if deco.to < cut_at {
                    cut_at = deco.to;
                }
            }
            if cut_at < end {
                rest = Some(child.cut(cut_at - offset, None));
                child = child.cut(0, Some(cut_at - offset));
                end = cut_at;
                index = None;
            }
        } else {
            while deco_index < locals.len() && locals[deco_index].to < end {
                deco_index += 1;
            }
        }

        // Inline decorations are drawn by the innermost level only.
        let outer: Vec<Decoration> = if child.is_leaf() {
            active.iter().map(|deco| (*deco).clone()).collect()
        } else {
            active
                .iter()
                .filter(|deco| !deco.is_inline())
                .map(|deco| (*deco).clone())
                .collect()
        };
        let inner = source.for_child(offset, &child);
        out.push(Projected::Node(Segment {
            node: child,
            outer,
            inner,
            offset,
            index,
        }));
        offset = end;
    }
    out
}
