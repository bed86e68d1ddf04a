use std::collections::BTreeMap;

use crate::mapping::{Assoc, Mapping};
use crate::mark::Mark;
use crate::node::Node;

/// Attributes a decoration adds to the DOM it applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoAttrs {
    pub class: Option<String>,
    pub style: Option<String>,
    /// Wrap the decorated content in an element of this name instead of
    /// setting the attributes on the content itself.
    pub node_name: Option<String>,
    pub attrs: BTreeMap<String, String>,
}

impl DecoAttrs {
    pub fn class(class: &str) -> Self {
        Self {
            class: Some(class.to_string()),
            ..Self::default()
        }
    }

    pub fn style(style: &str) -> Self {
        Self {
            style: Some(style.to_string()),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_node_name(mut self, node_name: &str) -> Self {
        self.node_name = Some(node_name.to_string());
        self
    }
}

/// DOM content for a widget. Widgets are rendered outside the document
/// and mounted into the editable surface as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetContent {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
}

impl WidgetContent {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            text: None,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Widget {
    pub content: WidgetContent,
    /// Negative sides sit before content at the same position, others after
    pub side: i32,
    /// Marks to render the widget inside. `None` lets the grouper infer them
    /// from neighbouring inline content.
    pub marks: Option<Vec<Mark>>,
    /// Widgets with equal keys are considered the same widget
    pub key: Option<String>,
}

impl Widget {
    pub fn new(content: WidgetContent) -> Self {
        Self {
            content,
            side: 0,
            marks: None,
            key: None,
        }
    }

    pub fn side(mut self, side: i32) -> Self {
        self.side = side;
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn marks(mut self, marks: Vec<Mark>) -> Self {
        self.marks = Some(marks);
        self
    }
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        match (&self.key, &other.key) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.side == other.side
                    && self.content == other.content
                    && match (&self.marks, &other.marks) {
                        (Some(a), Some(b)) => Mark::same_set(a, b),
                        (None, None) => true,
                        _ => false,
                    }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecorationKind {
    Inline {
        attrs: DecoAttrs,
        inclusive_start: bool,
        inclusive_end: bool,
    },
    Node {
        attrs: DecoAttrs,
    },
    Widget(Widget),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    pub kind: DecorationKind,
}

impl Decoration {
    pub fn inline(from: usize, to: usize, attrs: DecoAttrs) -> Self {
        Self::inline_with(from, to, attrs, false, false)
    }

    pub fn inline_with(
        from: usize,
        to: usize,
        attrs: DecoAttrs,
        inclusive_start: bool,
        inclusive_end: bool,
    ) -> Self {
        Self {
            from,
            to,
            kind: DecorationKind::Inline {
                attrs,
                inclusive_start,
                inclusive_end,
            },
        }
    }

    /// Decorate the node spanning exactly `from..to`
    pub fn node(from: usize, to: usize, attrs: DecoAttrs) -> Self {
        Self {
            from,
            to,
            kind: DecorationKind::Node { attrs },
        }
    }

    pub fn widget(pos: usize, widget: Widget) -> Self {
        Self {
            from: pos,
            to: pos,
            kind: DecorationKind::Widget(widget),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.kind, DecorationKind::Inline { .. })
    }

    pub fn is_node(&self) -> bool {
        matches!(self.kind, DecorationKind::Node { .. })
    }

    pub fn is_widget(&self) -> bool {
        matches!(self.kind, DecorationKind::Widget(_))
    }

    pub fn widget_spec(&self) -> Option<&Widget> {
        match &self.kind {
            DecorationKind::Widget(widget) => Some(widget),
            _ => None,
        }
    }

    pub fn attrs(&self) -> Option<&DecoAttrs> {
        match &self.kind {
            DecorationKind::Inline { attrs, .. } | DecorationKind::Node { attrs } => Some(attrs),
            DecorationKind::Widget(_) => None,
        }
    }

    /// Widget side, 0 for range decorations
    pub fn side(&self) -> i32 {
        self.widget_spec().map_or(0, |widget| widget.side)
    }

    pub fn copy(&self, from: usize, to: usize) -> Decoration {
        Decoration {
            from,
            to,
            kind: self.kind.clone(),
        }
    }

    /// Map through a change, `None` when the decoration no longer applies
    pub fn map(&self, mapping: &Mapping) -> Option<Decoration> {
        match &self.kind {
            DecorationKind::Inline {
                inclusive_start,
                inclusive_end,
                ..
            } => {
                let start_assoc = if *inclusive_start {
                    Assoc::Left
                } else {
                    Assoc::Right
                };
                let end_assoc = if *inclusive_end {
                    Assoc::Right
                } else {
                    Assoc::Left
                };
                let from = mapping.map(self.from, start_assoc);
                let to = mapping.map(self.to, end_assoc);
                (from < to).then(|| self.copy(from, to))
            }
            DecorationKind::Node { .. } => {
                let from = mapping.map_result(self.from, Assoc::Right);
                if from.deleted() {
                    return None;
                }
                let to = mapping.map_result(self.to, Assoc::Left);
                if to.deleted() || to.pos <= from.pos {
                    return None;
                }
                Some(self.copy(from.pos, to.pos))
            }
            DecorationKind::Widget(widget) => {
                let assoc = if widget.side < 0 {
                    Assoc::Left
                } else {
                    Assoc::Right
                };
                let result = mapping.map_result(self.from, assoc);
                (!result.deleted()).then(|| self.copy(result.pos, result.pos))
            }
        }
    }
}

/// A document-level collection of decorations in absolute positions, sorted
/// by `(from, to)`. Order of equal ranges is their registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecorationSet {
    decos: Vec<Decoration>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn create(decos: Vec<Decoration>) -> Self {
        let mut decos = decos;
        decos.sort_by_key(|deco| (deco.from, deco.to));
        Self { decos }
    }

    pub fn is_empty(&self) -> bool {
        self.decos.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decos.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decos.iter()
    }

    pub fn add(&self, decos: Vec<Decoration>) -> Self {
        let mut all = self.decos.clone();
        all.extend(decos);
        Self::create(all)
    }

    pub fn remove<F: Fn(&Decoration) -> bool>(&self, predicate: F) -> Self {
        Self {
            decos: self
                .decos
                .iter()
                .filter(|deco| !predicate(deco))
                .cloned()
                .collect(),
        }
    }

    /// Decorations touching `from..to`
    pub fn find(&self, from: usize, to: usize) -> Vec<&Decoration> {
        self.decos
            .iter()
            .filter(|deco| deco.from <= to && deco.to >= from)
            .collect()
    }

    pub fn map(&self, mapping: &Mapping) -> Self {
        if mapping.is_empty() {
            return self.clone();
        }
        Self::create(self.decos.iter().filter_map(|deco| deco.map(mapping)).collect())
    }

    pub fn source(&self) -> DecorationSource {
        DecorationSource {
            decos: self.decos.clone(),
        }
    }
}

/// Decorations as seen from inside one node, in positions relative to the
/// start of that node's content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecorationSource {
    decos: Vec<Decoration>,
}

impl DecorationSource {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Combine several sets. Sets listed earlier register first.
    pub fn from_sets(sets: &[&DecorationSet]) -> Self {
        let mut decos: Vec<Decoration> = sets.iter().flat_map(|set| set.iter().cloned()).collect();
        decos.sort_by_key(|deco| (deco.from, deco.to));
        Self { decos }
    }

    pub fn is_empty(&self) -> bool {
        self.decos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decos.iter()
    }

    /// Decorations drawn at this level: everything not strictly inside one
    /// of `node`'s non-leaf children.
    pub fn locals(&self, node: &Node) -> Vec<Decoration> {
        let mut nested = Vec::new();
        let mut offset = 0;
        for child in node.children() {
            let end = offset + child.node_size();
            if !child.is_leaf() {
                nested.push((offset, end));
            }
            offset = end;
        }
        self.decos
            .iter()
            .filter(|deco| {
                !nested
                    .iter()
                    .any(|&(start, end)| deco.from > start && deco.to < end)
            })
            .cloned()
            .collect()
    }

    /// Decorations for the content of the child at `offset`: those strictly
    /// inside it, plus inline decorations overlapping its content, clipped.
    pub fn for_child(&self, offset: usize, child: &Node) -> DecorationSource {
        if child.is_leaf() || self.decos.is_empty() {
            return DecorationSource::empty();
        }
        let start = offset + 1;
        let end = start + child.content_size();
        let child_end = offset + child.node_size();
        let mut decos = Vec::new();
        for deco in &self.decos {
            if deco.from > offset && deco.to < child_end {
                decos.push(deco.copy(deco.from - start, deco.to - start));
            } else if deco.is_inline() && deco.from < end && deco.to > start {
                let from = deco.from.max(start) - start;
                let to = deco.to.min(end) - start;
                if from < to {
                    decos.push(deco.copy(from, to));
                }
            }
        }
        decos.sort_by_key(|deco| (deco.from, deco.to));
        DecorationSource { decos }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{blockquote, doc, pt};
    use crate::mapping::StepMap;
    use pretty_assertions::assert_eq;

    fn widget(pos: usize, side: i32) -> Decoration {
        Decoration::widget(pos, Widget::new(WidgetContent::element("span")).side(side))
    }

    #[test]
    fn test_locals_exclude_decorations_inside_children() {
        let d = doc(vec![pt("abc"), pt("de")]);
        let source = DecorationSet::create(vec![
            Decoration::node(0, 5, DecoAttrs::class("first")),
            Decoration::inline(2, 3, DecoAttrs::class("inner")),
            widget(5, 0),
        ])
        .source();

        let locals = source.locals(&d);
        assert_eq!(locals.len(), 2);
        assert!(locals.iter().all(|deco| !deco.is_inline()));
    }

    #[test]
    fn test_for_child_rebases_and_clips_inline() {
        let d = doc(vec![pt("abc"), pt("de")]);
        let source = DecorationSet::create(vec![
            Decoration::inline(2, 7, DecoAttrs::class("span")),
            widget(2, -1),
        ])
        .source();

        let first = source.for_child(0, d.child(0));
        let ranges: Vec<(usize, usize)> = first.iter().map(|deco| (deco.from, deco.to)).collect();
        assert_eq!(ranges, vec![(1, 1), (1, 3)]);

        let second = source.for_child(5, d.child(1));
        let ranges: Vec<(usize, usize)> = second.iter().map(|deco| (deco.from, deco.to)).collect();
        assert_eq!(ranges, vec![(0, 1)]);
    }

    #[test]
    fn test_for_child_nested_blocks() {
        let d = doc(vec![blockquote(vec![pt("ab")])]);
        let source = DecorationSet::create(vec![widget(3, 0)]).source();

        let quote = source.for_child(0, d.child(0));
        let para = quote.for_child(0, d.child(0).child(0));
        assert_eq!(para.iter().map(|deco| deco.from).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_map_drops_collapsed_and_deleted() {
        let set = DecorationSet::create(vec![
            Decoration::inline(2, 4, DecoAttrs::class("gone")),
            Decoration::inline(5, 8, DecoAttrs::class("kept")),
            widget(3, 0),
        ]);
        let mut mapping = Mapping::new();
        mapping.append_map(StepMap::replace(1, 4, 0));

        let mapped = set.map(&mapping);
        let ranges: Vec<(usize, usize)> = mapped.iter().map(|deco| (deco.from, deco.to)).collect();
        assert_eq!(ranges, vec![(1, 4)]);
    }

    #[test]
    fn test_inline_inclusivity_on_insert_at_edge() {
        let exclusive = Decoration::inline(2, 4, DecoAttrs::class("x"));
        let inclusive = Decoration::inline_with(2, 4, DecoAttrs::class("x"), true, true);
        let mut mapping = Mapping::new();
        mapping.append_map(StepMap::replace(4, 0, 2));

        assert_eq!(exclusive.map(&mapping).map(|d| (d.from, d.to)), Some((2, 4)));
        assert_eq!(inclusive.map(&mapping).map(|d| (d.from, d.to)), Some((2, 6)));
    }
}
