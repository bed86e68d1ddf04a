use std::collections::{BTreeMap, BTreeSet};

use log::trace;
use serde::Serialize;

use super::selection::{DomPoint, DomRange, DomSelection};
use crate::error::DomError;

/// Handle of a node in a [`DomTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DomId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum DomNodeKind {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct DomNode {
    kind: DomNodeKind,
    parent: Option<DomId>,
    children: Vec<DomId>,
}

/// A change observed in the DOM, as a `MutationObserver` would report it.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    ChildList {
        target: DomId,
        added: Vec<DomId>,
        removed: Vec<DomId>,
    },
    CharacterData {
        target: DomId,
        old_value: String,
    },
    Attributes {
        target: DomId,
        name: String,
    },
}

impl MutationRecord {
    pub fn target(&self) -> DomId {
        match self {
            MutationRecord::ChildList { target, .. }
            | MutationRecord::CharacterData { target, .. }
            | MutationRecord::Attributes { target, .. } => *target,
        }
    }
}

const VOID_ELEMENTS: [&str; 5] = ["img", "br", "hr", "input", "wbr"];

/// Headless stand-in for a browser document: an arena of element and text
/// nodes, a native selection, focus, and a queue of mutation records for
/// changes made while observation is on.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
    observed_root: Option<DomId>,
    observing: bool,
    records: Vec<MutationRecord>,
    selection: DomSelection,
    focused: bool,
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            observed_root: None,
            observing: false,
            records: Vec::new(),
            selection: DomSelection::default(),
            focused: false,
        }
    }

    fn push(&mut self, kind: DomNodeKind) -> DomId {
        let id = DomId(self.nodes.len());
        self.nodes.push(DomNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> DomId {
        self.push(DomNodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> DomId {
        self.push(DomNodeKind::Text(text.to_string()))
    }

    fn node(&self, id: DomId) -> Result<&DomNode, DomError> {
        self.nodes.get(id.0).ok_or(DomError::Detached(id))
    }

    fn node_mut(&mut self, id: DomId) -> Result<&mut DomNode, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::Detached(id))
    }

    pub fn kind(&self, id: DomId) -> Option<&DomNodeKind> {
        self.nodes.get(id.0).map(|node| &node.kind)
    }

    pub fn is_text(&self, id: DomId) -> bool {
        matches!(self.kind(id), Some(DomNodeKind::Text(_)))
    }

    pub fn is_element(&self, id: DomId) -> bool {
        matches!(self.kind(id), Some(DomNodeKind::Element { .. }))
    }

    pub fn tag(&self, id: DomId) -> Option<&str> {
        match self.kind(id) {
            Some(DomNodeKind::Element { tag, .. }) => Some(tag),
            _ => None,
        }
    }

    pub fn text(&self, id: DomId) -> Option<&str> {
        match self.kind(id) {
            Some(DomNodeKind::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn parent(&self, id: DomId) -> Option<DomId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn children(&self, id: DomId) -> &[DomId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child(&self, id: DomId, index: usize) -> Option<DomId> {
        self.children(id).get(index).copied()
    }

    /// Index of the node among its parent's children
    pub fn index_of(&self, id: DomId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|child| *child == id)
    }

    pub fn previous_sibling(&self, id: DomId) -> Option<DomId> {
        let parent = self.parent(id)?;
        let index = self.index_of(id)?;
        index.checked_sub(1).and_then(|i| self.child(parent, i))
    }

    pub fn next_sibling(&self, id: DomId) -> Option<DomId> {
        let parent = self.parent(id)?;
        let index = self.index_of(id)?;
        self.child(parent, index + 1)
    }

    /// Length in offset units: chars for text, child count for elements
    pub fn node_size(&self, id: DomId) -> usize {
        match self.kind(id) {
            Some(DomNodeKind::Text(text)) => text.chars().count(),
            Some(DomNodeKind::Element { .. }) => self.children(id).len(),
            None => 0,
        }
    }

    /// Whether `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: DomId, node: DomId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    fn record(&mut self, record: MutationRecord) {
        if !self.observing {
            return;
        }
        let Some(root) = self.observed_root else {
            return;
        };
        if self.contains(root, record.target()) {
            trace!("dom mutation {record:?}");
            self.records.push(record);
        }
    }

    /// Start reporting mutations below `root`
    pub fn observe(&mut self, root: DomId) {
        self.observed_root = Some(root);
        self.observing = true;
    }

    pub fn set_observing(&mut self, observing: bool) {
        self.observing = observing;
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn detach(&mut self, child: DomId) -> Result<(), DomError> {
        let Some(parent) = self.node(child)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|id| *id != child);
        self.node_mut(child)?.parent = None;
        self.record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![child],
        });
        Ok(())
    }

    /// Insert `child` before `reference` (or at the end), moving it if it
    /// already has a parent.
    pub fn insert_before(
        &mut self,
        parent: DomId,
        child: DomId,
        reference: Option<DomId>,
    ) -> Result<(), DomError> {
        if !self.is_element(parent) {
            return Err(DomError::NotAnElement(parent));
        }
        self.node(child)?;
        if reference == Some(child) {
            return Ok(());
        }
        self.detach(child)?;
        let index = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|id| *id == reference)
                .ok_or(DomError::Detached(reference))?,
            None => self.children(parent).len(),
        };
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        self.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    pub fn append_child(&mut self, parent: DomId, child: DomId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    pub fn remove_children(&mut self, parent: DomId) -> Result<(), DomError> {
        for child in self.children(parent).to_vec() {
            self.detach(child)?;
        }
        Ok(())
    }

    pub fn set_text(&mut self, id: DomId, text: &str) -> Result<(), DomError> {
        let node = self.node_mut(id)?;
        let DomNodeKind::Text(current) = &mut node.kind else {
            return Err(DomError::NotAnElement(id));
        };
        if current == text {
            return Ok(());
        }
        let old_value = std::mem::replace(current, text.to_string());
        self.record(MutationRecord::CharacterData {
            target: id,
            old_value,
        });
        Ok(())
    }

    /// Insert text into a text node at a char offset
    pub fn insert_text(&mut self, id: DomId, offset: usize, text: &str) -> Result<(), DomError> {
        let current = self.text(id).ok_or(DomError::NotAnElement(id))?;
        let chars: Vec<char> = current.chars().collect();
        if offset > chars.len() {
            return Err(DomError::OffsetOutOfRange { node: id, offset });
        }
        let mut updated: String = chars[..offset].iter().collect();
        updated.push_str(text);
        updated.extend(&chars[offset..]);
        self.set_text(id, &updated)
    }

    /// Remove chars `from..to` from a text node
    pub fn delete_text(&mut self, id: DomId, from: usize, to: usize) -> Result<(), DomError> {
        let current = self.text(id).ok_or(DomError::NotAnElement(id))?;
        let chars: Vec<char> = current.chars().collect();
        if from > to || to > chars.len() {
            return Err(DomError::OffsetOutOfRange { node: id, offset: to });
        }
        let updated: String = chars[..from].iter().chain(&chars[to..]).collect();
        self.set_text(id, &updated)
    }

    pub fn attr(&self, id: DomId, name: &str) -> Option<&str> {
        match self.kind(id) {
            Some(DomNodeKind::Element { attrs, .. }) => attrs.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn attrs(&self, id: DomId) -> Option<&BTreeMap<String, String>> {
        match self.kind(id) {
            Some(DomNodeKind::Element { attrs, .. }) => Some(attrs),
            _ => None,
        }
    }

    pub fn set_attr(&mut self, id: DomId, name: &str, value: &str) -> Result<(), DomError> {
        let node = self.node_mut(id)?;
        let DomNodeKind::Element { attrs, .. } = &mut node.kind else {
            return Err(DomError::NotAnElement(id));
        };
        if attrs.get(name).map(String::as_str) == Some(value) {
            return Ok(());
        }
        attrs.insert(name.to_string(), value.to_string());
        self.record(MutationRecord::Attributes {
            target: id,
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn remove_attr(&mut self, id: DomId, name: &str) -> Result<(), DomError> {
        let node = self.node_mut(id)?;
        let DomNodeKind::Element { attrs, .. } = &mut node.kind else {
            return Err(DomError::NotAnElement(id));
        };
        if attrs.remove(name).is_some() {
            self.record(MutationRecord::Attributes {
                target: id,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Replace every attribute of an element
    pub fn replace_attrs(
        &mut self,
        id: DomId,
        attrs: BTreeMap<String, String>,
    ) -> Result<(), DomError> {
        let node = self.node_mut(id)?;
        let DomNodeKind::Element { attrs: current, .. } = &mut node.kind else {
            return Err(DomError::NotAnElement(id));
        };
        let old = std::mem::replace(current, attrs);
        let changed: BTreeSet<String> = match self.attrs(id) {
            Some(new) => old
                .keys()
                .chain(new.keys())
                .filter(|name| old.get(*name) != new.get(*name))
                .cloned()
                .collect(),
            None => BTreeSet::new(),
        };
        for name in changed {
            self.record(MutationRecord::Attributes { target: id, name });
        }
        Ok(())
    }

    pub fn has_class(&self, id: DomId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, id: DomId, class: &str) -> Result<(), DomError> {
        if self.has_class(id, class) {
            return Ok(());
        }
        let classes = match self.attr(id, "class") {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr(id, "class", &classes)
    }

    pub fn remove_class(&mut self, id: DomId, class: &str) -> Result<(), DomError> {
        let Some(existing) = self.attr(id, "class") else {
            return Ok(());
        };
        let remaining: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attr(id, "class")
        } else {
            let remaining = remaining.join(" ");
            self.set_attr(id, "class", &remaining)
        }
    }

    /// `contenteditable="false"` on the node itself
    pub fn is_uneditable(&self, id: DomId) -> bool {
        self.attr(id, "contenteditable") == Some("false")
    }

    pub fn selection(&self) -> &DomSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut DomSelection {
        &mut self.selection
    }

    fn check_point(&self, point: DomPoint) -> Result<(), DomError> {
        self.node(point.node)?;
        if point.offset > self.node_size(point.node) {
            return Err(DomError::OffsetOutOfRange {
                node: point.node,
                offset: point.offset,
            });
        }
        Ok(())
    }

    pub fn collapse_selection(&mut self, point: DomPoint) -> Result<(), DomError> {
        self.check_point(point)?;
        self.selection.collapse(point);
        Ok(())
    }

    pub fn extend_selection(&mut self, point: DomPoint) -> Result<(), DomError> {
        self.check_point(point)?;
        if self.selection.extend(point) {
            Ok(())
        } else {
            Err(DomError::ExtendUnsupported)
        }
    }

    pub fn add_selection_range(&mut self, range: DomRange) -> Result<(), DomError> {
        self.check_point(range.start)?;
        self.check_point(range.end)?;
        self.selection.add_range(range);
        Ok(())
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn has_focus(&self) -> bool {
        self.focused
    }

    /// Type text the way a browser or IME would: into the text node at the
    /// point, or into a new text node when the point is between elements.
    /// Moves the caret after the text.
    pub fn type_text(&mut self, point: DomPoint, text: &str) -> Result<DomPoint, DomError> {
        let len = text.chars().count();
        let caret = if self.is_text(point.node) {
            self.insert_text(point.node, point.offset, text)?;
            DomPoint::new(point.node, point.offset + len)
        } else {
            let before = point
                .offset
                .checked_sub(1)
                .and_then(|i| self.child(point.node, i))
                .filter(|id| self.is_text(*id));
            match before {
                Some(text_node) => {
                    let end = self.node_size(text_node);
                    self.insert_text(text_node, end, text)?;
                    DomPoint::new(text_node, end + len)
                }
                None => {
                    let reference = self.child(point.node, point.offset);
                    let text_node = self.create_text(text);
                    self.insert_before(point.node, text_node, reference)?;
                    DomPoint::new(text_node, len)
                }
            }
        };
        self.selection.collapse(caret);
        Ok(caret)
    }

    pub fn outer_html(&self, id: DomId) -> String {
        let mut out = String::new();
        self.write_html(id, &mut out);
        out
    }

    pub fn inner_html(&self, id: DomId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_html(*child, &mut out);
        }
        out
    }

    fn write_html(&self, id: DomId, out: &mut String) {
        match self.kind(id) {
            Some(DomNodeKind::Text(text)) => {
                out.push_str(&html_escape::encode_text(text));
            }
            Some(DomNodeKind::Element { tag, attrs }) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in self.children(id) {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            None => {}
        }
    }
}
