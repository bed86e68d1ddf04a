use std::collections::HashMap;

use editview_model::{DecoAttrs, Decoration, DecorationSource, DomOutput, Node, WidgetContent};
use log::trace;

use super::desc::{Desc, DescId, DescKind, DescSnapshot, Dirty, HackKind};
use crate::dom::{DomId, DomTree};
use crate::error::{DomError, ViewError};
use crate::render::{
    Group, KeyRegistry, Projected, RenderRegistry, Segment, group, project, resolve_marks,
};

pub const TRAILING_BREAK_CLASS: &str = "ProseMirror-trailingBreak";
pub const SEPARATOR_CLASS: &str = "ProseMirror-separator";
pub const WIDGET_CLASS: &str = "ProseMirror-widget";

/// Text node written by an input method that the tree must leave alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionGuard {
    pub text_dom: DomId,
    /// Document position the composition started at
    pub pos: usize,
}

/// What a render pass reads besides the document.
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx<'a> {
    pub keys: &'a KeyRegistry,
    pub rules: &'a RenderRegistry,
    pub composition: Option<CompositionGuard>,
}

/// Descriptor tree mirroring a document onto a [`DomTree`].
///
/// Descriptors live in an arena and refer to each other by [`DescId`].
/// Dead descriptors keep their slot so stale ids never alias new ones.
#[derive(Debug, Clone)]
pub struct DescTree {
    pub(crate) descs: Vec<Desc>,
    pub(crate) root: DescId,
    /// Outermost DOM node of every live descriptor
    pub(crate) dom_map: HashMap<DomId, DescId>,
}

type Pool = Vec<Option<DescId>>;

impl DescTree {
    /// Build a tree for `doc`, rendering into the existing element `root_dom`.
    pub fn new(
        dom: &mut DomTree,
        root_dom: DomId,
        doc: &Node,
        decorations: &DecorationSource,
        ctx: &RenderCtx<'_>,
    ) -> Result<Self, ViewError> {
        let root = Desc::new(
            DescKind::Node {
                node: doc.clone(),
                outer: Vec::new(),
                inner: decorations.clone(),
                key: None,
            },
            root_dom,
            root_dom,
            Some(root_dom),
        );
        let mut tree = Self {
            descs: vec![root],
            root: DescId(0),
            dom_map: HashMap::from([(root_dom, DescId(0))]),
        };
        tree.sync_content(dom, ctx, DescId(0), 0)?;
        Ok(tree)
    }

    pub fn root(&self) -> DescId {
        self.root
    }

    pub fn root_dom(&self) -> DomId {
        self.descs[self.root.0].dom
    }

    pub fn desc(&self, id: DescId) -> &Desc {
        &self.descs[id.0]
    }

    /// Live descriptor whose outermost DOM node is `dom`
    pub fn desc_for_dom(&self, dom: DomId) -> Option<DescId> {
        self.dom_map
            .get(&dom)
            .copied()
            .filter(|id| self.descs[id.0].alive)
    }

    pub fn live(&self) -> impl Iterator<Item = (DescId, &Desc)> {
        self.descs
            .iter()
            .enumerate()
            .filter(|(_, desc)| desc.alive)
            .map(|(i, desc)| (DescId(i), desc))
    }

    pub fn find_by_key(&self, key: crate::render::NodeKey) -> Option<DescId> {
        self.live()
            .find(|(_, desc)| desc.key() == Some(key))
            .map(|(id, _)| id)
    }

    /// Document size of the content a descriptor mirrors
    pub fn size(&self, id: DescId) -> usize {
        let desc = &self.descs[id.0];
        match &desc.kind {
            DescKind::Node { node, .. } if id == self.root => node.content_size(),
            DescKind::Node { node, .. } => node.node_size(),
            DescKind::Text { node, .. } => node.text_len(),
            DescKind::Mark { .. } => desc.children.iter().map(|child| self.size(*child)).sum(),
            DescKind::Widget { .. } | DescKind::Composition { .. } | DescKind::TrailingHack(_) => 0,
        }
    }

    /// Positions taken by a node's own start and end tokens
    pub fn border(&self, id: DescId) -> usize {
        match &self.descs[id.0].kind {
            DescKind::Node { node, .. } if id != self.root && !node.is_leaf() => 1,
            _ => 0,
        }
    }

    pub fn pos_before(&self, id: DescId) -> usize {
        let Some(parent) = self.descs[id.0].parent else {
            return 0;
        };
        let mut pos = self.pos_at_start(parent);
        for child in &self.descs[parent.0].children {
            if *child == id {
                break;
            }
            pos += self.size(*child);
        }
        pos
    }

    pub fn pos_at_start(&self, id: DescId) -> usize {
        self.pos_before(id) + self.border(id)
    }

    pub fn pos_after(&self, id: DescId) -> usize {
        self.pos_before(id) + self.size(id)
    }

    pub fn pos_at_end(&self, id: DescId) -> usize {
        self.pos_at_start(id) + self.size(id) - 2 * self.border(id)
    }

    /// Bring the tree in line with a new document and decorations.
    /// Returns whether anything was re-derived.
    pub fn update(
        &mut self,
        dom: &mut DomTree,
        ctx: &RenderCtx<'_>,
        doc: &Node,
        decorations: &DecorationSource,
    ) -> Result<bool, ViewError> {
        let root = self.root;
        let desc = &mut self.descs[root.0];
        if let DescKind::Node { node, inner, .. } = &mut desc.kind {
            if desc.dirty == Dirty::NotDirty
                && ctx.composition.is_none()
                && (node.ptr_eq(doc) || node == doc)
                && inner == decorations
            {
                return Ok(false);
            }
            *node = doc.clone();
            *inner = decorations.clone();
        }
        desc.derivations += 1;
        self.sync_content(dom, ctx, root, 0)?;
        self.descs[root.0].dirty = Dirty::NotDirty;
        Ok(true)
    }

    fn alloc(&mut self, desc: Desc) -> DescId {
        let id = DescId(self.descs.len());
        self.dom_map.insert(desc.dom, id);
        self.descs.push(desc);
        id
    }

    fn destroy(&mut self, id: DescId) {
        let desc = &mut self.descs[id.0];
        if !desc.alive {
            return;
        }
        desc.alive = false;
        let dom = desc.dom;
        let children = std::mem::take(&mut desc.children);
        if self.dom_map.get(&dom) == Some(&id) {
            self.dom_map.remove(&dom);
        }
        for child in children {
            self.destroy(child);
        }
    }

    fn take(&self, pool: &mut Pool, pred: impl Fn(&Desc) -> bool) -> Option<DescId> {
        pool.iter_mut()
            .find(|slot| slot.is_some_and(|id| pred(&self.descs[id.0])))
            .and_then(Option::take)
    }

    /// Re-derive the children of a node descriptor whose content starts at
    /// document position `start`.
    fn sync_content(
        &mut self,
        dom: &mut DomTree,
        ctx: &RenderCtx<'_>,
        id: DescId,
        start: usize,
    ) -> Result<(), ViewError> {
        let (node, inner) = match &self.descs[id.0].kind {
            DescKind::Node { node, inner, .. } => (node.clone(), inner.clone()),
            _ => return Ok(()),
        };
        let Some(content_dom) = self.descs[id.0].content_dom else {
            return Ok(());
        };
        let projected = project(&node, &inner);
        let marks = resolve_marks(&projected);
        let groups = group(marks.into_iter().zip(projected).collect());

        let old = std::mem::take(&mut self.descs[id.0].children);
        let mut pool: Pool = old.into_iter().map(Some).collect();
        let mut children = self.build(dom, ctx, &mut pool, groups, start)?;
        if node.is_textblock() {
            if let Some(guard) = ctx.composition {
                self.place_composition(dom, content_dom, &mut children, guard, start, &node);
            }
            self.add_hacks(dom, &mut pool, &mut children)?;
        }
        for leftover in pool.into_iter().flatten() {
            self.destroy(leftover);
        }
        self.set_children(dom, id, content_dom, children)?;
        Ok(())
    }

    fn build(
        &mut self,
        dom: &mut DomTree,
        ctx: &RenderCtx<'_>,
        pool: &mut Pool,
        groups: Vec<Group<Projected>>,
        start: usize,
    ) -> Result<Vec<DescId>, ViewError> {
        let mut children = Vec::with_capacity(groups.len());
        for item in groups {
            let child = match item {
                Group::Mark { mark, children } => {
                    let reused = self.take(pool, |desc| {
                        matches!(&desc.kind, DescKind::Mark { mark: m } if *m == mark)
                            && desc.dirty < Dirty::NodeDirty
                    });
                    let (id, old) = match reused {
                        Some(id) => (id, std::mem::take(&mut self.descs[id.0].children)),
                        None => {
                            let out = ctx.rules.mark_dom(&mark)?;
                            let element = element_from(dom, &out)?;
                            let desc =
                                Desc::new(DescKind::Mark { mark }, element, element, Some(element));
                            (self.alloc(desc), Vec::new())
                        }
                    };
                    let mut inner_pool: Pool = old.into_iter().map(Some).collect();
                    let built = self.build(dom, ctx, &mut inner_pool, children, start)?;
                    for leftover in inner_pool.into_iter().flatten() {
                        self.destroy(leftover);
                    }
                    let content = self.descs[id.0].node_dom;
                    self.descs[id.0].dirty = Dirty::NotDirty;
                    self.set_children(dom, id, content, built)?;
                    id
                }
                Group::Item(Projected::Widget { deco, .. }) => {
                    let reused = self.take(pool, |desc| match &desc.kind {
                        DescKind::Widget { deco: old } => {
                            old.widget_spec() == deco.widget_spec() && desc.dirty == Dirty::NotDirty
                        }
                        _ => false,
                    });
                    match reused {
                        Some(id) => {
                            self.descs[id.0].kind = DescKind::Widget { deco };
                            id
                        }
                        None => self.create_widget(dom, deco)?,
                    }
                }
                Group::Item(Projected::Node(segment)) => {
                    let pos = start + segment.offset;
                    if segment.node.is_text() {
                        self.text_child(dom, ctx, pool, segment)?
                    } else {
                        self.node_child(dom, ctx, pool, segment, pos)?
                    }
                }
            };
            children.push(child);
        }
        Ok(children)
    }

    fn text_child(
        &mut self,
        dom: &mut DomTree,
        ctx: &RenderCtx<'_>,
        pool: &mut Pool,
        segment: Segment,
    ) -> Result<DescId, ViewError> {
        let exact = self.take(pool, |desc| match &desc.kind {
            DescKind::Text { node, outer } => {
                desc.dirty == Dirty::NotDirty && *node == segment.node && *outer == segment.outer
            }
            _ => false,
        });
        if let Some(id) = exact {
            return Ok(id);
        }

        let similar = self.take(pool, |desc| match &desc.kind {
            DescKind::Text { outer, .. } => {
                desc.dirty < Dirty::NodeDirty && *outer == segment.outer
            }
            _ => false,
        });
        if let Some(id) = similar {
            let text_dom = self.descs[id.0].node_dom;
            let text = segment.node.text().unwrap_or_default();
            let protected = ctx.composition.is_some_and(|guard| guard.text_dom == text_dom);
            if !protected && dom.text(text_dom) != Some(text) {
                dom.set_text(text_dom, text)?;
            }
            let desc = &mut self.descs[id.0];
            desc.kind = DescKind::Text {
                node: segment.node,
                outer: segment.outer,
            };
            desc.dirty = Dirty::NotDirty;
            desc.derivations += 1;
            trace!("text descriptor {id:?} updated in place");
            return Ok(id);
        }

        let text_dom = dom.create_text(segment.node.text().unwrap_or_default());
        let outer_dom = build_outer(dom, text_dom, &segment.outer)?;
        Ok(self.alloc(Desc::new(
            DescKind::Text {
                node: segment.node,
                outer: segment.outer,
            },
            outer_dom,
            text_dom,
            None,
        )))
    }

    fn node_child(
        &mut self,
        dom: &mut DomTree,
        ctx: &RenderCtx<'_>,
        pool: &mut Pool,
        segment: Segment,
        pos: usize,
    ) -> Result<DescId, ViewError> {
        let key = ctx.keys.key_at(pos);
        let found = match key {
            Some(key) => self.take(pool, |desc| desc.key() == Some(key)),
            None => self.take(pool, |desc| {
                desc.is_node() && desc.node().is_some_and(|node| node.ptr_eq(&segment.node))
            }),
        };
        let Some(id) = found else {
            return self.create_node(dom, ctx, segment, key, pos);
        };

        let desc = &self.descs[id.0];
        let DescKind::Node { node, outer, inner, .. } = &desc.kind else {
            return self.create_node(dom, ctx, segment, key, pos);
        };
        let same_node = node.ptr_eq(&segment.node) || *node == segment.node;
        if desc.dirty == Dirty::NotDirty
            && same_node
            && *outer == segment.outer
            && *inner == segment.inner
        {
            return Ok(id);
        }
        let recreate = desc.dirty == Dirty::NodeDirty
            || !node.same_markup(&segment.node)
            || (!same_node && ctx.rules.is_overridden(segment.node.type_id()));
        if recreate {
            trace!("recreating descriptor {id:?} for {}", segment.node.type_name());
            self.destroy(id);
            return self.create_node(dom, ctx, segment, key, pos);
        }

        let outer_changed = *outer != segment.outer;
        self.descs[id.0].kind = DescKind::Node {
            node: segment.node.clone(),
            outer: segment.outer.clone(),
            inner: segment.inner,
            key,
        };
        self.descs[id.0].derivations += 1;
        if outer_changed {
            self.patch_outer(dom, ctx, id, &segment.node, &segment.outer)?;
        }
        self.sync_content(dom, ctx, id, pos + 1)?;
        self.descs[id.0].dirty = Dirty::NotDirty;
        Ok(id)
    }

    fn create_node(
        &mut self,
        dom: &mut DomTree,
        ctx: &RenderCtx<'_>,
        segment: Segment,
        key: Option<crate::render::NodeKey>,
        pos: usize,
    ) -> Result<DescId, ViewError> {
        let out = ctx.rules.node_dom(&segment.node)?;
        let node_dom = element_from(dom, &out)?;
        let content_dom = (out.hole && !segment.node.is_leaf()).then_some(node_dom);
        if content_dom.is_none() && out.tag != "br" {
            dom.set_attr(node_dom, "contenteditable", "false")?;
        }
        let outer_dom = build_outer(dom, node_dom, &segment.outer)?;
        let id = self.alloc(Desc::new(
            DescKind::Node {
                node: segment.node,
                outer: segment.outer,
                inner: segment.inner,
                key,
            },
            outer_dom,
            node_dom,
            content_dom,
        ));
        self.sync_content(dom, ctx, id, pos + 1)?;
        Ok(id)
    }

    /// Rebuild decoration wrappers and attributes around a node's element
    fn patch_outer(
        &mut self,
        dom: &mut DomTree,
        ctx: &RenderCtx<'_>,
        id: DescId,
        node: &Node,
        outer: &[Decoration],
    ) -> Result<(), ViewError> {
        let old_dom = self.descs[id.0].dom;
        let node_dom = self.descs[id.0].node_dom;
        if old_dom != node_dom {
            dom.detach(node_dom)?;
        }
        let out = ctx.rules.node_dom(node)?;
        let mut attrs: std::collections::BTreeMap<String, String> = out.attrs.into_iter().collect();
        if self.descs[id.0].content_dom.is_none() && out.tag != "br" {
            attrs.insert("contenteditable".to_string(), "false".to_string());
        }
        dom.replace_attrs(node_dom, attrs)?;
        let outer_dom = build_outer(dom, node_dom, outer)?;
        if self.dom_map.get(&old_dom) == Some(&id) {
            self.dom_map.remove(&old_dom);
        }
        self.dom_map.insert(outer_dom, id);
        self.descs[id.0].dom = outer_dom;
        Ok(())
    }

    fn create_widget(&mut self, dom: &mut DomTree, deco: Decoration) -> Result<DescId, ViewError> {
        let content = deco
            .widget_spec()
            .map(|widget| widget.content.clone())
            .unwrap_or_else(|| WidgetContent::element("span"));
        let element = dom.create_element(&content.tag);
        for (name, value) in &content.attrs {
            dom.set_attr(element, name, value)?;
        }
        if let Some(text) = &content.text {
            let text = dom.create_text(text);
            dom.append_child(element, text)?;
        }
        dom.set_attr(element, "contenteditable", "false")?;
        dom.add_class(element, WIDGET_CLASS)?;
        Ok(self.alloc(Desc::new(DescKind::Widget { deco }, element, element, None)))
    }

    /// Keep an input method's fresh text node in place while it composes
    fn place_composition(
        &mut self,
        dom: &DomTree,
        content_dom: DomId,
        children: &mut Vec<DescId>,
        guard: CompositionGuard,
        start: usize,
        node: &Node,
    ) {
        if guard.pos < start || guard.pos > start + node.content_size() {
            return;
        }
        if !dom.contains(content_dom, guard.text_dom) {
            return;
        }
        let owned = self
            .live()
            .any(|(_, desc)| desc.node_dom == guard.text_dom || desc.dom == guard.text_dom);
        if owned {
            return;
        }
        let local = guard.pos - start;
        let mut acc = 0;
        let mut index = children.len();
        for (i, child) in children.iter().enumerate() {
            let size = self.size(*child);
            if acc >= local && (size > 0 || self.descs[child.0].is_hack()) {
                index = i;
                break;
            }
            acc += size;
        }
        let text = dom.text(guard.text_dom).unwrap_or_default().to_string();
        let id = self.alloc(Desc::new(
            DescKind::Composition { text },
            guard.text_dom,
            guard.text_dom,
            None,
        ));
        trace!("composition placeholder {id:?} at {}", guard.pos);
        children.insert(index, id);
    }

    /// Trailing `<br>` (and separator) for textblocks whose last child the
    /// caret cannot be placed after
    fn add_hacks(
        &mut self,
        dom: &mut DomTree,
        pool: &mut Pool,
        children: &mut Vec<DescId>,
    ) -> Result<(), ViewError> {
        let mut last = children.last().copied();
        while let Some(id) = last {
            match &self.descs[id.0].kind {
                DescKind::Mark { .. } => last = self.descs[id.0].children.last().copied(),
                _ => break,
            }
        }
        let needs_break = match last.map(|id| &self.descs[id.0].kind) {
            Some(DescKind::Text { node, .. }) => {
                node.text().is_some_and(|text| text.ends_with('\n'))
            }
            _ => true,
        };
        if !needs_break {
            return Ok(());
        }
        if let Some(id) = last {
            if dom.is_uneditable(self.descs[id.0].node_dom) {
                children.push(self.hack(dom, pool, HackKind::Separator)?);
            }
        }
        children.push(self.hack(dom, pool, HackKind::TrailingBreak)?);
        Ok(())
    }

    fn hack(
        &mut self,
        dom: &mut DomTree,
        pool: &mut Pool,
        kind: HackKind,
    ) -> Result<DescId, ViewError> {
        let reused = self.take(pool, |desc| {
            matches!(desc.kind, DescKind::TrailingHack(k) if k == kind)
                && desc.dirty == Dirty::NotDirty
        });
        if let Some(id) = reused {
            return Ok(id);
        }
        let element = match kind {
            HackKind::TrailingBreak => {
                let br = dom.create_element("br");
                dom.add_class(br, TRAILING_BREAK_CLASS)?;
                br
            }
            HackKind::Separator => {
                let img = dom.create_element("img");
                dom.add_class(img, SEPARATOR_CLASS)?;
                dom.set_attr(img, "alt", "")?;
                img
            }
        };
        Ok(self.alloc(Desc::new(DescKind::TrailingHack(kind), element, element, None)))
    }

    fn set_children(
        &mut self,
        dom: &mut DomTree,
        id: DescId,
        content_dom: DomId,
        children: Vec<DescId>,
    ) -> Result<(), DomError> {
        let wanted: Vec<DomId> = children.iter().map(|child| self.descs[child.0].dom).collect();
        for child in &children {
            self.descs[child.0].parent = Some(id);
        }
        self.descs[id.0].children = children;
        sync_dom_children(dom, content_dom, &wanted)
    }

    pub fn snapshot(&self) -> DescSnapshot {
        self.snapshot_of(self.root)
    }

    pub fn snapshot_of(&self, id: DescId) -> DescSnapshot {
        let desc = &self.descs[id.0];
        let text = match &desc.kind {
            DescKind::Text { node, .. } => node.text().map(str::to_string),
            DescKind::Composition { text } => Some(text.clone()),
            _ => None,
        };
        DescSnapshot {
            kind: desc.name(),
            text,
            pos: self.pos_before(id),
            size: self.size(id),
            children: desc.children.iter().map(|child| self.snapshot_of(*child)).collect(),
        }
    }
}

fn element_from(dom: &mut DomTree, out: &DomOutput) -> Result<DomId, DomError> {
    let element = dom.create_element(&out.tag);
    for (name, value) in &out.attrs {
        dom.set_attr(element, name, value)?;
    }
    Ok(element)
}

fn apply_attrs(dom: &mut DomTree, element: DomId, attrs: &DecoAttrs) -> Result<(), DomError> {
    if let Some(class) = &attrs.class {
        for name in class.split_whitespace() {
            dom.add_class(element, name)?;
        }
    }
    if let Some(style) = &attrs.style {
        let style = match dom.attr(element, "style") {
            Some(existing) if !existing.is_empty() => format!("{existing};{style}"),
            _ => style.clone(),
        };
        dom.set_attr(element, "style", &style)?;
    }
    for (name, value) in &attrs.attrs {
        dom.set_attr(element, name, value)?;
    }
    Ok(())
}

/// Apply range decorations around `node_dom`. Attributes without a node
/// name merge onto the node's element (or one span around text); named
/// ones each add a wrapper. Returns the outermost node.
fn build_outer(
    dom: &mut DomTree,
    node_dom: DomId,
    outer: &[Decoration],
) -> Result<DomId, DomError> {
    let mut merged = Vec::new();
    let mut wrappers = Vec::new();
    for attrs in outer.iter().filter_map(Decoration::attrs) {
        if attrs.node_name.is_some() {
            wrappers.push(attrs);
        } else {
            merged.push(attrs);
        }
    }
    let mut current = node_dom;
    if !merged.is_empty() {
        if dom.is_text(node_dom) {
            let span = dom.create_element("span");
            dom.append_child(span, node_dom)?;
            current = span;
        }
        for attrs in merged {
            apply_attrs(dom, current, attrs)?;
        }
    }
    for attrs in wrappers {
        let wrapper = dom.create_element(attrs.node_name.as_deref().unwrap_or("span"));
        apply_attrs(dom, wrapper, attrs)?;
        dom.append_child(wrapper, current)?;
        current = wrapper;
    }
    Ok(current)
}

/// Make `parent`'s children exactly `wanted`, moving as little as possible
fn sync_dom_children(dom: &mut DomTree, parent: DomId, wanted: &[DomId]) -> Result<(), DomError> {
    for (i, child) in wanted.iter().enumerate() {
        let current = dom.child(parent, i);
        if current != Some(*child) {
            dom.insert_before(parent, *child, current)?;
        }
    }
    while let Some(extra) = dom.child(parent, wanted.len()) {
        dom.detach(extra)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NodeViews;
    use editview_model::builders::{
        basic_schema, blockquote, br, doc, em, hr, img, p, pt, strong, txt,
    };
    use editview_model::{DecorationSet, Selection, Transaction, Widget};
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    struct Harness {
        dom: DomTree,
        root: DomId,
        keys: KeyRegistry,
        rules: RenderRegistry,
        tree: DescTree,
        doc: Node,
    }

    impl Harness {
        fn new(doc: Node, decos: Vec<Decoration>) -> Self {
            let mut dom = DomTree::new();
            let root = dom.create_element("div");
            let keys = KeyRegistry::new(&doc);
            let rules = RenderRegistry::new(&basic_schema(), &NodeViews::new()).unwrap();
            let source = DecorationSet::create(decos).source();
            let ctx = RenderCtx {
                keys: &keys,
                rules: &rules,
                composition: None,
            };
            let tree = DescTree::new(&mut dom, root, &doc, &source, &ctx).unwrap();
            Self {
                dom,
                root,
                keys,
                rules,
                tree,
                doc,
            }
        }

        fn html(&self) -> String {
            self.dom.inner_html(self.root)
        }

        fn apply(&mut self, tr: &Transaction, decos: Vec<Decoration>) {
            self.keys.apply(tr);
            self.doc = tr.doc().clone();
            let source = DecorationSet::create(decos).source();
            let ctx = RenderCtx {
                keys: &self.keys,
                rules: &self.rules,
                composition: None,
            };
            self.tree.update(&mut self.dom, &ctx, &self.doc, &source).unwrap();
        }

        fn tr(&self) -> Transaction {
            Transaction::new(basic_schema(), self.doc.clone(), Selection::cursor(1), None)
        }
    }

    #[test]
    fn test_renders_blocks_marks_and_hacks() {
        let h = Harness::new(
            doc(vec![
                p(vec![txt("a "), em(txt("b")), strong(em(txt("c")))]),
                blockquote(vec![pt("")]),
                hr(),
                p(vec![txt("x"), img("i.png")]),
                p(vec![txt("y"), br()]),
            ]),
            vec![],
        );

        assert_snapshot!(h.html(), @r#"<p>a <em>b<strong>c</strong></em></p><blockquote><p><br class="ProseMirror-trailingBreak"></p></blockquote><hr contenteditable="false"><p>x<img contenteditable="false" src="i.png"><img alt="" class="ProseMirror-separator"><br class="ProseMirror-trailingBreak"></p><p>y<br><br class="ProseMirror-trailingBreak"></p>"#);
    }

    #[test]
    fn test_decorations_render_as_attributes_and_wrappers() {
        let h = Harness::new(
            doc(vec![pt("abcd")]),
            vec![
                Decoration::node(0, 6, DecoAttrs::class("picked")),
                Decoration::inline(2, 4, DecoAttrs::class("hl")),
                Decoration::widget(
                    5,
                    Widget::new(WidgetContent::element("span").with_text("@")),
                ),
            ],
        );

        assert_snapshot!(h.html(), @r#"<p class="picked">a<span class="hl">bc</span>d<span class="ProseMirror-widget" contenteditable="false">@</span><img alt="" class="ProseMirror-separator"><br class="ProseMirror-trailingBreak"></p>"#);
    }

    #[test]
    fn test_sizes_and_positions() {
        let h = Harness::new(doc(vec![pt("one"), blockquote(vec![pt("two")])]), vec![]);
        let root = h.tree.root();
        let quote = h.tree.desc(root).children[1];
        let inner = h.tree.desc(quote).children[0];

        assert_eq!(h.tree.size(root), 12);
        assert_eq!(h.tree.pos_before(quote), 5);
        assert_eq!(h.tree.pos_at_start(inner), 7);
        assert_eq!(h.tree.pos_at_end(inner), 10);
    }

    #[test]
    fn test_text_insert_updates_text_node_in_place() {
        let mut h = Harness::new(doc(vec![pt("one"), pt("two")]), vec![]);
        let first = h.tree.desc(h.tree.root()).children[0];
        let text = h.tree.desc(first).children[0];
        let text_dom = h.tree.desc(text).node_dom;

        let mut tr = h.tr();
        tr.insert_text("!", 4, 4).unwrap();
        h.apply(&tr, vec![]);

        assert_eq!(h.tree.desc(h.tree.root()).children[0], first);
        assert_eq!(h.tree.desc(first).children[0], text);
        assert_eq!(h.dom.text(text_dom), Some("one!"));
        assert_eq!(h.html(), "<p>one!</p><p>two</p>");
    }

    #[test]
    fn test_untouched_siblings_are_not_rederived() {
        let mut h = Harness::new(doc(vec![pt("one"), pt("two"), pt("three")]), vec![]);
        let third = h.tree.desc(h.tree.root()).children[2];
        let derivations = h.tree.desc(third).derivations;

        let mut tr = h.tr();
        tr.delete(3, 8).unwrap();
        h.apply(&tr, vec![]);

        assert_eq!(h.html(), "<p>ono</p><p>three</p>");
        assert_eq!(h.tree.desc(h.tree.root()).children[1], third);
        assert_eq!(h.tree.desc(third).derivations, derivations);
    }

    #[test]
    fn test_moving_decoration_reuses_node_descriptor() {
        let mut h = Harness::new(
            doc(vec![pt("ab"), pt("cd")]),
            vec![Decoration::node(0, 4, DecoAttrs::class("sel"))],
        );
        let first = h.tree.desc(h.tree.root()).children[0];
        let tr = h.tr();
        h.apply(&tr, vec![Decoration::node(4, 8, DecoAttrs::class("sel"))]);

        assert_eq!(h.html(), r#"<p>ab</p><p class="sel">cd</p>"#);
        assert_eq!(h.tree.desc(h.tree.root()).children[0], first);
    }

    #[test]
    fn test_snapshot_outline() {
        let h = Harness::new(doc(vec![p(vec![em(txt("hi"))])]), vec![]);
        assert_eq!(
            outline(&h.tree.snapshot()),
            "doc[paragraph[mark:em[text(hi)]]]"
        );
    }

    fn outline(snapshot: &DescSnapshot) -> String {
        let inner: Vec<String> = snapshot.children.iter().map(outline).collect();
        match (&snapshot.text, inner.is_empty()) {
            (Some(text), _) => format!("{}({text})", snapshot.kind),
            (None, true) => snapshot.kind.clone(),
            (None, false) => format!("{}[{}]", snapshot.kind, inner.join(",")),
        }
    }
}
