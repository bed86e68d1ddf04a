use super::desc::{DescId, Dirty};
use super::tree::DescTree;
use crate::dom::DomTree;

impl DescTree {
    /// Flag the descriptors covering `from..to` so the next update
    /// re-derives them even if the document did not change there.
    pub fn mark_dirty(&mut self, dom: &DomTree, from: usize, to: usize) {
        let root = self.root;
        self.mark_local_dirty(dom, root, from, to);
    }

    fn raise(&mut self, id: DescId, dirty: Dirty) {
        let desc = &mut self.descs[id.0];
        desc.dirty = desc.dirty.max(dirty);
    }

    fn mark_local_dirty(&mut self, dom: &DomTree, id: DescId, from: usize, to: usize) {
        let content = self.content_of(id);
        let children = self.desc(id).children.clone();
        let mut offset = 0;
        for child in children {
            let end = offset + self.size(child);
            let touches = if offset == end {
                from <= end && to >= offset
            } else {
                from < end && to > offset
            };
            if touches {
                let border = self.border(child);
                let start_inside = offset + border;
                let end_inside = end - border;
                let child_desc = self.desc(child);
                let attached = dom.parent(child_desc.dom) == content;
                if from >= start_inside && to <= end_inside {
                    let level = if from == offset || to == end {
                        Dirty::ContentDirty
                    } else {
                        Dirty::ChildDirty
                    };
                    self.raise(id, level);
                    if from == start_inside && to == end_inside && !attached {
                        self.raise(child, Dirty::NodeDirty);
                    } else {
                        self.mark_local_dirty(dom, child, from - start_inside, to - start_inside);
                    }
                    return;
                }
                let shallow = Some(child_desc.dom) == child_desc.content_dom
                    && attached
                    && child_desc.children.is_empty();
                self.raise(
                    child,
                    if shallow {
                        Dirty::ContentDirty
                    } else {
                        Dirty::NodeDirty
                    },
                );
            }
            offset = end;
        }
        self.raise(id, Dirty::ContentDirty);
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::DomTree;
    use crate::render::{KeyRegistry, NodeViews, RenderRegistry};
    use crate::view::desc::Dirty;
    use crate::view::tree::{DescTree, RenderCtx};
    use editview_model::DecorationSource;
    use editview_model::builders::{basic_schema, blockquote, doc, pt};
    use pretty_assertions::assert_eq;

    fn render() -> (DomTree, DescTree, KeyRegistry, RenderRegistry) {
        let d = doc(vec![pt("ab"), blockquote(vec![pt("cd")])]);
        let mut dom = DomTree::new();
        let root = dom.create_element("div");
        let keys = KeyRegistry::new(&d);
        let rules = RenderRegistry::new(&basic_schema(), &NodeViews::new()).unwrap();
        let ctx = RenderCtx {
            keys: &keys,
            rules: &rules,
            composition: None,
        };
        let tree = DescTree::new(&mut dom, root, &d, &DecorationSource::empty(), &ctx).unwrap();
        (dom, tree, keys, rules)
    }

    #[test]
    fn test_point_inside_text_marks_ancestors() {
        let (dom, mut tree, _, _) = render();
        tree.mark_dirty(&dom, 2, 2);

        let root = tree.root();
        let paragraph = tree.desc(root).children[0];
        let text = tree.desc(paragraph).children[0];
        assert_eq!(tree.desc(root).dirty, Dirty::ChildDirty);
        assert_eq!(tree.desc(paragraph).dirty, Dirty::ChildDirty);
        assert_eq!(tree.desc(text).dirty, Dirty::ContentDirty);
    }

    #[test]
    fn test_range_spanning_blocks_dirties_both() {
        let (dom, mut tree, _, _) = render();
        tree.mark_dirty(&dom, 2, 8);

        let root = tree.root();
        let first = tree.desc(root).children[0];
        let quote = tree.desc(root).children[1];
        assert_eq!(tree.desc(root).dirty, Dirty::ContentDirty);
        assert_eq!(tree.desc(first).dirty, Dirty::NodeDirty);
        assert_eq!(tree.desc(quote).dirty, Dirty::NodeDirty);
    }

    #[test]
    fn test_detached_node_is_recreated_on_update() {
        let (mut dom, mut tree, keys, rules) = render();
        let root = tree.root();
        let first = tree.desc(root).children[0];
        let first_dom = tree.desc(first).dom;
        dom.detach(first_dom).unwrap();

        tree.mark_dirty(&dom, 1, 3);
        assert_eq!(tree.desc(first).dirty, Dirty::NodeDirty);

        let ctx = RenderCtx {
            keys: &keys,
            rules: &rules,
            composition: None,
        };
        let d = tree.desc(root).node().cloned().unwrap();
        tree.update(&mut dom, &ctx, &d, &DecorationSource::empty()).unwrap();

        assert_eq!(dom.inner_html(tree.root_dom()), "<p>ab</p><blockquote><p>cd</p></blockquote>");
        assert!(!tree.desc(first).is_alive());
        assert_eq!(tree.desc(root).dirty, Dirty::NotDirty);
    }
}
