use editview_config::BrowserQuirks;
use log::{trace, warn};

use super::desc::{DescId, DescKind};
use super::tree::DescTree;
use crate::dom::{DomPoint, DomRange, DomTree};
use crate::error::DomError;

impl DescTree {
    /// Write a document selection to the native selection. Nothing is
    /// written when the native selection already renders the same caret,
    /// unless `force` is set.
    pub fn set_selection(
        &self,
        dom: &mut DomTree,
        anchor: usize,
        head: usize,
        quirks: &BrowserQuirks,
        force: bool,
    ) -> Result<bool, DomError> {
        self.set_local_selection(dom, self.root, anchor, head, quirks, force)
    }

    fn set_local_selection(
        &self,
        dom: &mut DomTree,
        id: DescId,
        anchor: usize,
        head: usize,
        quirks: &BrowserQuirks,
        mut force: bool,
    ) -> Result<bool, DomError> {
        let from = anchor.min(head);
        let to = anchor.max(head);
        let mut offset = 0;
        for child in &self.desc(id).children {
            let end = offset + self.size(*child);
            if from > offset && to < end {
                let border = self.border(*child);
                return self.set_local_selection(
                    dom,
                    *child,
                    anchor - offset - border,
                    head - offset - border,
                    quirks,
                    force,
                );
            }
            offset = end;
        }

        let side = |pos: usize| if pos > 0 { -1 } else { 1 };
        let mut anchor_dom = self.local_dom_from_pos(dom, id, anchor, side(anchor));
        let mut head_dom = if head == anchor {
            anchor_dom
        } else {
            self.local_dom_from_pos(dom, id, head, side(head))
        };

        let mut br_kludge = false;
        if (quirks.gecko || quirks.safari) && anchor == head {
            let DomPoint { node, offset } = anchor_dom;
            if let Some(text) = dom.text(node) {
                let chars: Vec<char> = text.chars().collect();
                br_kludge = offset > 0 && chars.get(offset - 1) == Some(&'\n');
                if br_kludge && offset == chars.len() {
                    if let Some(after_br) = self.br_after(dom, node) {
                        anchor_dom = after_br;
                        head_dom = after_br;
                    }
                }
            } else {
                br_kludge = offset
                    .checked_sub(1)
                    .and_then(|index| dom.child(node, index))
                    .is_some_and(|prev| dom.tag(prev) == Some("br") || dom.is_uneditable(prev));
            }
        }

        let current_anchor = dom.selection().anchor();
        let current_focus = dom.selection().focus();
        if quirks.gecko {
            if let Some(focus) = current_focus.filter(|focus| focus.node != head_dom.node) {
                if dom.is_element(focus.node)
                    && dom
                        .child(focus.node, focus.offset)
                        .is_some_and(|after| dom.is_uneditable(after))
                {
                    force = true;
                }
            }
        }

        if !(force || br_kludge && quirks.safari)
            && self.is_equivalent_position(dom, anchor_dom, current_anchor)
            && self.is_equivalent_position(dom, head_dom, current_focus)
        {
            trace!("native selection already at {anchor}..{head}");
            return Ok(false);
        }

        let mut extended = false;
        if (dom.selection().supports_extend() || anchor == head) && !br_kludge {
            dom.collapse_selection(anchor_dom)?;
            if anchor == head {
                extended = true;
            } else {
                match dom.extend_selection(head_dom) {
                    Ok(()) => extended = true,
                    Err(err) => warn!("extending selection failed, falling back to a range: {err}"),
                }
            }
        }
        if !extended {
            if anchor > head {
                std::mem::swap(&mut anchor_dom, &mut head_dom);
            }
            dom.selection_mut().remove_all_ranges();
            dom.add_selection_range(DomRange {
                start: anchor_dom,
                end: head_dom,
            })?;
        }
        Ok(true)
    }

    /// Point right after a `<br>` that follows `node` within its block
    fn br_after(&self, dom: &DomTree, node: crate::dom::DomId) -> Option<DomPoint> {
        let mut scan = Some(node);
        while let Some(cur) = scan {
            if let Some(after) = dom.next_sibling(cur) {
                if dom.tag(after) == Some("br") {
                    let parent = dom.parent(after)?;
                    return Some(DomPoint::new(parent, dom.index_of(after)? + 1));
                }
                return None;
            }
            let is_block = self.desc_for_dom(cur).is_some_and(|id| {
                matches!(&self.desc(id).kind, DescKind::Node { node, .. } if node.is_block())
            });
            if is_block {
                return None;
            }
            scan = dom.parent(cur);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{KeyRegistry, NodeViews, RenderRegistry};
    use crate::view::tree::RenderCtx;
    use editview_model::builders::{basic_schema, br, doc, em, img, p, pt, txt};
    use editview_model::{DecorationSource, Node};
    use pretty_assertions::assert_eq;

    fn render(doc: &Node) -> (DomTree, DescTree) {
        let mut dom = DomTree::new();
        let root = dom.create_element("div");
        let keys = KeyRegistry::new(doc);
        let rules = RenderRegistry::new(&basic_schema(), &NodeViews::new()).unwrap();
        let ctx = RenderCtx {
            keys: &keys,
            rules: &rules,
            composition: None,
        };
        let tree = DescTree::new(&mut dom, root, doc, &DecorationSource::empty(), &ctx).unwrap();
        (dom, tree)
    }

    #[test]
    fn test_cursor_lands_in_text() {
        let (mut dom, tree) = render(&doc(vec![pt("abc")]));

        let written = tree.set_selection(&mut dom, 2, 2, &BrowserQuirks::default(), false).unwrap();

        assert!(written);
        let anchor = dom.selection().anchor().unwrap();
        assert_eq!(dom.text(anchor.node), Some("abc"));
        assert_eq!(anchor.offset, 1);
        assert!(dom.selection().is_collapsed());
    }

    #[test]
    fn test_equivalent_selection_is_not_rewritten() {
        let (mut dom, tree) = render(&doc(vec![p(vec![txt("ab"), em(txt("cd"))])]));
        let paragraph = dom.child(tree.root_dom(), 0).unwrap();
        dom.collapse_selection(DomPoint::new(paragraph, 1)).unwrap();
        dom.selection_mut().take_change();

        let written = tree.set_selection(&mut dom, 3, 3, &BrowserQuirks::default(), false).unwrap();

        assert!(!written);
        assert!(!dom.selection_mut().take_change());
        assert_eq!(dom.selection().anchor(), Some(DomPoint::new(paragraph, 1)));
    }

    #[test]
    fn test_force_rewrites_equivalent_selection() {
        let (mut dom, tree) = render(&doc(vec![pt("ab")]));
        tree.set_selection(&mut dom, 2, 2, &BrowserQuirks::default(), false).unwrap();

        let written = tree.set_selection(&mut dom, 2, 2, &BrowserQuirks::default(), true).unwrap();

        assert!(written);
    }

    #[test]
    fn test_backward_range_without_extend_falls_back_to_range() {
        let (mut dom, tree) = render(&doc(vec![pt("abcd")]));
        dom.selection_mut().set_supports_extend(false);
        let quirks = BrowserQuirks {
            selection_extend: false,
            ..BrowserQuirks::default()
        };

        tree.set_selection(&mut dom, 4, 2, &quirks, false).unwrap();

        let selection = dom.selection();
        assert_eq!(selection.anchor().map(|point| point.offset), Some(1));
        assert_eq!(selection.focus().map(|point| point.offset), Some(3));
    }

    #[test]
    fn test_forward_range_with_extend() {
        let (mut dom, tree) = render(&doc(vec![pt("abcd")]));

        tree.set_selection(&mut dom, 4, 2, &BrowserQuirks::default(), false).unwrap();

        let selection = dom.selection();
        assert_eq!(selection.anchor().map(|point| point.offset), Some(3));
        assert_eq!(selection.focus().map(|point| point.offset), Some(1));
    }

    #[test]
    fn test_gecko_cursor_after_break_uses_range() {
        let (mut dom, tree) = render(&doc(vec![p(vec![txt("a"), br()])]));
        let quirks = BrowserQuirks {
            gecko: true,
            ..BrowserQuirks::default()
        };

        tree.set_selection(&mut dom, 3, 3, &quirks, false).unwrap();

        let paragraph = dom.child(tree.root_dom(), 0).unwrap();
        assert_eq!(dom.selection().anchor(), Some(DomPoint::new(paragraph, 2)));
        assert!(dom.selection().is_collapsed());
    }

    #[test]
    fn test_selection_next_to_image() {
        let (mut dom, tree) = render(&doc(vec![p(vec![img("x.png"), txt("b")])]));

        tree.set_selection(&mut dom, 2, 2, &BrowserQuirks::default(), false).unwrap();

        let anchor = dom.selection().anchor().unwrap();
        let paragraph = dom.child(tree.root_dom(), 0).unwrap();
        assert_eq!(anchor, DomPoint::new(paragraph, 1));
    }
}
