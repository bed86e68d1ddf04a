//! Translation between document positions and DOM points.

use std::sync::LazyLock;

use regex::Regex;

use super::desc::{DescId, DescKind};
use super::tree::DescTree;
use crate::dom::{DomId, DomPoint, DomTree};
use crate::error::ViewError;

static ATOM_ELEMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)(img|br|input|textarea|hr)$").expect("valid regex"));

impl DescTree {
    /// Closest descriptor for a document node, text or mark whose DOM
    /// holds `dom`.
    pub fn nearest_desc(&self, dom_tree: &DomTree, dom: DomId) -> Option<DescId> {
        let mut first = true;
        let mut cur = Some(dom);
        while let Some(node) = cur {
            if let Some(id) = self.desc_for_dom(node) {
                let desc = self.desc(id);
                if desc.node().is_some() || matches!(desc.kind, DescKind::Mark { .. }) {
                    let inside = if dom_tree.is_element(desc.node_dom) {
                        let target = if dom_tree.is_element(dom) {
                            Some(dom)
                        } else {
                            dom_tree.parent(dom)
                        };
                        target.is_some_and(|target| dom_tree.contains(desc.node_dom, target))
                    } else {
                        desc.node_dom == dom
                    };
                    if first && !inside {
                        first = false;
                    } else {
                        return Some(id);
                    }
                }
            }
            cur = dom_tree.parent(node);
        }
        None
    }

    /// Document position for a DOM point. `bias` picks a side when the
    /// point sits in DOM that has no document counterpart.
    pub fn pos_from_dom(
        &self,
        dom_tree: &DomTree,
        dom: DomId,
        offset: usize,
        bias: i32,
    ) -> Result<usize, ViewError> {
        if !dom_tree.contains(self.root_dom(), dom) {
            return Err(ViewError::OutsideEditor(dom));
        }
        let id = self
            .nearest_desc(dom_tree, dom)
            .ok_or(ViewError::OutsideEditor(dom))?;
        Ok(self.local_pos_from_dom(dom_tree, id, dom, offset, bias))
    }

    fn local_pos_from_dom(
        &self,
        dom_tree: &DomTree,
        id: DescId,
        dom: DomId,
        offset: usize,
        bias: i32,
    ) -> usize {
        let desc = self.desc(id);
        if let DescKind::Text { node, .. } = &desc.kind {
            if dom == desc.node_dom {
                return self.pos_at_start(id) + offset.min(node.text_len());
            }
        }

        if let Some(content) = self.content_of(id) {
            let holder = if dom_tree.is_element(dom) {
                Some(dom)
            } else {
                dom_tree.parent(dom)
            };
            if holder.is_some_and(|holder| dom_tree.contains(content, holder)) {
                return self.pos_in_content(dom_tree, id, content, dom, offset, bias);
            }
        }

        let at_end = match desc.content_dom {
            Some(content) if dom == desc.dom => {
                dom_tree.index_of(content).map(|index| offset > index)
            }
            Some(content) if content != desc.dom && dom_tree.contains(desc.dom, content) => {
                Some(follows(dom_tree, content, dom))
            }
            _ if !dom_tree.children(desc.dom).is_empty() => {
                let mut at_end = None;
                if offset == 0 {
                    at_end = edge_of(dom_tree, desc.dom, dom, false).then_some(false);
                }
                if at_end.is_none() && offset == dom_tree.node_size(dom) {
                    at_end = edge_of(dom_tree, desc.dom, dom, true).then_some(true);
                }
                at_end
            }
            _ => None,
        };
        if at_end.unwrap_or(bias > 0) {
            self.pos_at_end(id)
        } else {
            self.pos_at_start(id)
        }
    }

    /// Position for a DOM point inside a descriptor's content element,
    /// taken from the child descriptor on the side `bias` points at.
    fn pos_in_content(
        &self,
        dom_tree: &DomTree,
        id: DescId,
        content: DomId,
        dom: DomId,
        offset: usize,
        bias: i32,
    ) -> usize {
        let (mut sibling, backward) = if dom == content {
            if bias < 0 {
                (offset.checked_sub(1).and_then(|i| dom_tree.child(content, i)), true)
            } else {
                (dom_tree.child(content, offset), false)
            }
        } else {
            let mut top = dom;
            while let Some(parent) = dom_tree.parent(top) {
                if parent == content {
                    break;
                }
                top = parent;
            }
            if bias < 0 {
                (dom_tree.previous_sibling(top), true)
            } else {
                (dom_tree.next_sibling(top), false)
            }
        };
        while let Some(node) = sibling {
            let child = self
                .desc_for_dom(node)
                .filter(|child| self.desc(*child).parent == Some(id));
            if let Some(child) = child {
                return if backward {
                    self.pos_before(child) + self.size(child)
                } else {
                    self.pos_before(child)
                };
            }
            sibling = if backward {
                dom_tree.previous_sibling(node)
            } else {
                dom_tree.next_sibling(node)
            };
        }
        if backward {
            self.pos_at_start(id)
        } else {
            self.pos_at_end(id)
        }
    }

    /// DOM point for a document position. Negative `side` prefers the
    /// content before the position, positive the content after it.
    pub fn dom_from_pos(
        &self,
        dom_tree: &DomTree,
        pos: usize,
        side: i32,
    ) -> Result<DomPoint, ViewError> {
        if pos > self.size(self.root) {
            return Err(ViewError::NoDescriptor(pos));
        }
        Ok(self.local_dom_from_pos(dom_tree, self.root, pos, side))
    }

    pub(crate) fn local_dom_from_pos(
        &self,
        dom_tree: &DomTree,
        id: DescId,
        pos: usize,
        side: i32,
    ) -> DomPoint {
        let desc = self.desc(id);
        match &desc.kind {
            DescKind::Text { .. } | DescKind::Composition { .. } => {
                return DomPoint::new(desc.node_dom, pos);
            }
            _ => {}
        }
        let Some(content) = self.content_of(id) else {
            return DomPoint::new(desc.dom, 0);
        };

        let children = &desc.children;
        let mut i = 0;
        let mut offset = 0;
        let mut cur = 0;
        while i < children.len() {
            let child = children[i];
            let end = cur + self.size(child);
            if end > pos || self.desc(child).is_hack() {
                offset = pos - cur;
                break;
            }
            cur = end;
            i += 1;
        }
        if offset > 0 {
            let child = children[i];
            return self.local_dom_from_pos(dom_tree, child, offset - self.border(child), side);
        }

        while i > 0 {
            let prev = self.desc(children[i - 1]);
            if self.size(children[i - 1]) == 0 && prev.is_widget() && prev.side() >= 0 {
                i -= 1;
            } else {
                break;
            }
        }

        if side <= 0 {
            let mut enter = true;
            let prev = loop {
                let prev = i.checked_sub(1).map(|index| children[index]);
                match prev {
                    Some(p) if dom_tree.parent(self.desc(p).dom) != Some(content) => {
                        i -= 1;
                        enter = false;
                    }
                    _ => break prev,
                }
            };
            if let Some(prev) = prev {
                let prev_desc = self.desc(prev);
                if side != 0 && enter && self.border(prev) == 0 && !prev_desc.dom_atom() {
                    return self.local_dom_from_pos(dom_tree, prev, self.size(prev), side);
                }
                let index = dom_tree.index_of(prev_desc.dom).map_or(0, |index| index + 1);
                return DomPoint::new(content, index);
            }
            DomPoint::new(content, 0)
        } else {
            let mut enter = true;
            let next = loop {
                let next = children.get(i).copied();
                match next {
                    Some(n) if dom_tree.parent(self.desc(n).dom) != Some(content) => {
                        i += 1;
                        enter = false;
                    }
                    _ => break next,
                }
            };
            if let Some(next) = next {
                let next_desc = self.desc(next);
                if enter && self.border(next) == 0 && !next_desc.dom_atom() {
                    return self.local_dom_from_pos(dom_tree, next, 0, side);
                }
                let index = dom_tree.index_of(next_desc.dom).unwrap_or(0);
                return DomPoint::new(content, index);
            }
            DomPoint::new(content, dom_tree.node_size(content))
        }
    }

    /// Element children of a descriptor are rendered into
    pub(crate) fn content_of(&self, id: DescId) -> Option<DomId> {
        let desc = self.desc(id);
        match desc.kind {
            DescKind::Mark { .. } => Some(desc.node_dom),
            _ => desc.content_dom,
        }
    }

    /// Innermost descriptor of a node starting at `pos`, or the one `pos`
    /// falls into
    pub fn desc_at(&self, pos: usize) -> Option<DescId> {
        self.local_desc_at(self.root, pos)
    }

    fn local_desc_at(&self, id: DescId, pos: usize) -> Option<DescId> {
        let mut offset = 0;
        for child in &self.desc(id).children {
            let mut child = *child;
            let end = offset + self.size(child);
            if offset == pos && end != offset {
                while self.border(child) == 0 && !self.desc(child).children.is_empty() {
                    match self.desc(child).children.iter().find(|inner| self.size(**inner) > 0) {
                        Some(inner) => child = *inner,
                        None => break,
                    }
                }
                return Some(child);
            }
            if pos < end {
                return self.local_desc_at(child, pos - offset - self.border(child));
            }
            offset = end;
        }
        None
    }

    /// DOM element of the node starting at `pos`
    pub fn node_dom_at(&self, pos: usize) -> Option<DomId> {
        self.desc_at(pos).map(|id| self.desc(id).node_dom)
    }

    /// Whether a block descriptor's own DOM or content DOM is `dom`
    fn has_block_desc(&self, dom_tree: &DomTree, dom: DomId) -> bool {
        let mut cur = Some(dom);
        while let Some(node) = cur {
            if let Some(id) = self.desc_for_dom(node) {
                let desc = self.desc(id);
                return desc.node().is_some_and(|node| node.is_block())
                    && (desc.dom == dom || desc.content_dom == Some(dom));
            }
            cur = dom_tree.parent(node);
        }
        false
    }

    /// Whether two DOM points render the same caret location, scanning
    /// through inline element boundaries in both directions.
    pub fn is_equivalent_position(
        &self,
        dom_tree: &DomTree,
        a: DomPoint,
        b: Option<DomPoint>,
    ) -> bool {
        let Some(b) = b else {
            return false;
        };
        self.scan_for(dom_tree, a, b, -1) || self.scan_for(dom_tree, a, b, 1)
    }

    fn scan_for(&self, dom_tree: &DomTree, from: DomPoint, target: DomPoint, dir: i32) -> bool {
        let DomPoint { mut node, mut offset } = from;
        loop {
            if node == target.node && offset == target.offset {
                return true;
            }
            let edge = if dir < 0 { 0 } else { dom_tree.node_size(node) };
            if offset == edge {
                let Some(parent) = dom_tree.parent(node) else {
                    return false;
                };
                let atom = dom_tree.tag(node).is_some_and(|tag| ATOM_ELEMENTS.is_match(tag));
                if !dom_tree.is_element(parent)
                    || self.has_block_desc(dom_tree, node)
                    || atom
                    || dom_tree.is_uneditable(node)
                {
                    return false;
                }
                let Some(index) = dom_tree.index_of(node) else {
                    return false;
                };
                offset = if dir < 0 { index } else { index + 1 };
                node = parent;
            } else if dom_tree.is_element(node) {
                let index = if dir < 0 { offset - 1 } else { offset };
                let Some(child) = dom_tree.child(node, index) else {
                    return false;
                };
                if dom_tree.is_uneditable(child) {
                    return false;
                }
                node = child;
                offset = if dir < 0 { dom_tree.node_size(child) } else { 0 };
            } else {
                return false;
            }
        }
    }
}

/// `node` comes after `reference` in document order
fn follows(dom_tree: &DomTree, reference: DomId, node: DomId) -> bool {
    let path = |id: DomId| {
        let mut path = vec![id];
        let mut cur = id;
        while let Some(parent) = dom_tree.parent(cur) {
            path.push(parent);
            cur = parent;
        }
        path.reverse();
        path
    };
    let a = path(reference);
    let b = path(node);
    for (x, y) in a.iter().zip(&b) {
        if x != y {
            let ix = dom_tree.index_of(*x).unwrap_or(0);
            let iy = dom_tree.index_of(*y).unwrap_or(0);
            return iy > ix;
        }
    }
    false
}

/// `dom` sits at the very start (or end) of `container` with no sibling
/// content in between
fn edge_of(dom_tree: &DomTree, container: DomId, dom: DomId, end: bool) -> bool {
    let mut search = dom;
    loop {
        if search == container {
            return true;
        }
        let sibling = if end {
            dom_tree.next_sibling(search)
        } else {
            dom_tree.previous_sibling(search)
        };
        if sibling.is_some() {
            return false;
        }
        match dom_tree.parent(search) {
            Some(parent) => search = parent,
            None => return false,
        }
    }
}
