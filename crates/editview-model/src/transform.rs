use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ModelError;
use crate::mapping::{Mapping, StepMap};
use crate::mark::Mark;
use crate::node::{Fragment, Node};
use crate::replace::Slice;
use crate::schema::Schema;
use crate::selection::Selection;

/// An atomic document change.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Replace {
        from: usize,
        to: usize,
        slice: Slice,
    },
    AddMark {
        from: usize,
        to: usize,
        mark: Mark,
    },
    RemoveMark {
        from: usize,
        to: usize,
        mark: Mark,
    },
}

impl Step {
    pub fn apply(&self, doc: &Node) -> Result<Node, ModelError> {
        match self {
            Step::Replace { from, to, slice } => doc.replace(*from, *to, slice),
            Step::AddMark { from, to, mark } => {
                map_marks_in_range(doc, *from, *to, |marks| mark.add_to_set(marks))
            }
            Step::RemoveMark { from, to, mark } => {
                map_marks_in_range(doc, *from, *to, |marks| mark.remove_from_set(marks))
            }
        }
    }

    pub fn get_map(&self) -> StepMap {
        match self {
            Step::Replace { from, to, slice } => StepMap::replace(*from, to - from, slice.size()),
            Step::AddMark { .. } | Step::RemoveMark { .. } => StepMap::empty(),
        }
    }
}

fn map_marks_in_range<F>(doc: &Node, from: usize, to: usize, f: F) -> Result<Node, ModelError>
where
    F: Fn(&[Mark]) -> Vec<Mark>,
{
    let old = doc.slice(from, to)?;
    let content = map_inline(&old.content, &f);
    doc.replace(from, to, &Slice::new(content, old.open_start, old.open_end))
}

fn map_inline<F>(fragment: &Fragment, f: &F) -> Fragment
where
    F: Fn(&[Mark]) -> Vec<Mark>,
{
    let mapped = fragment
        .iter()
        .map(|child| {
            let child = if child.content_size() > 0 {
                child.copy(map_inline(child.content(), f))
            } else {
                child.clone()
            };
            if child.is_inline() {
                child.mark(f(child.marks()))
            } else {
                child
            }
        })
        .collect();
    Fragment::from_vec(mapped)
}

/// Where a selection change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    Pointer,
    Keyboard,
}

/// Metadata attached to a transaction, read by the view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionMeta {
    pub origin: Option<SelectionOrigin>,
    pub scroll_into_view: bool,
    /// Positions whose node identity must be discarded
    pub bust_keys: Vec<usize>,
    /// Produced by the end of an input method composition
    pub composition: bool,
    /// Produced by reading changes the browser already made to the DOM
    pub from_dom: bool,
    pub custom: BTreeMap<String, String>,
}

/// A batch of steps plus selection and metadata changes, built against
/// one document state.
#[derive(Debug, Clone)]
pub struct Transaction {
    schema: Arc<Schema>,
    doc_before: Node,
    doc: Node,
    steps: Vec<Step>,
    mapping: Mapping,
    selection_before: Selection,
    selection: Option<Selection>,
    stored_marks: Option<Option<Vec<Mark>>>,
    stored_marks_before: Option<Vec<Mark>>,
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(
        schema: Arc<Schema>,
        doc: Node,
        selection: Selection,
        stored_marks: Option<Vec<Mark>>,
    ) -> Self {
        Self {
            schema,
            doc_before: doc.clone(),
            doc,
            steps: Vec::new(),
            mapping: Mapping::new(),
            selection_before: selection,
            selection: None,
            stored_marks: None,
            stored_marks_before: stored_marks,
            meta: TransactionMeta::default(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn doc_before(&self) -> &Node {
        &self.doc_before
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn selection_set(&self) -> bool {
        self.selection.is_some()
    }

    /// Selection after this transaction: the explicit one, or the old one
    /// mapped through the steps.
    pub fn selection(&self) -> Selection {
        match self.selection {
            Some(selection) => selection,
            None => self.selection_before.map(&self.mapping, &self.doc),
        }
    }

    pub fn stored_marks(&self) -> Option<Vec<Mark>> {
        match &self.stored_marks {
            Some(marks) => marks.clone(),
            None if self.doc_changed() => None,
            None => self.stored_marks_before.clone(),
        }
    }

    pub fn step(&mut self, step: Step) -> Result<&mut Self, ModelError> {
        let doc = step.apply(&self.doc)?;
        self.mapping.append_map(step.get_map());
        self.steps.push(step);
        self.doc = doc;
        Ok(self)
    }

    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
    ) -> Result<&mut Self, ModelError> {
        if from == to && slice.size() == 0 {
            return Ok(self);
        }
        self.step(Step::Replace { from, to, slice })
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, ModelError> {
        self.replace(from, to, Slice::empty())
    }

    pub fn insert(&mut self, pos: usize, nodes: Vec<Node>) -> Result<&mut Self, ModelError> {
        self.replace(pos, pos, Slice::closed(Fragment::from_vec(nodes)))
    }

    /// Replace `from..to` with text, using stored marks or the marks at
    /// `from`. Places the cursor after the text unless a selection was set.
    pub fn insert_text(
        &mut self,
        text: &str,
        from: usize,
        to: usize,
    ) -> Result<&mut Self, ModelError> {
        if text.is_empty() {
            return self.delete(from, to);
        }
        let marks = match self.stored_marks() {
            Some(marks) => marks,
            None => {
                let resolved_from = self.doc.resolve(from)?;
                if from == to {
                    resolved_from.marks()
                } else {
                    let resolved_to = self.doc.resolve(to)?;
                    resolved_from.marks_across(&resolved_to).unwrap_or_default()
                }
            }
        };
        let node = self.schema.text(text, marks);
        self.replace(from, to, Slice::closed(Fragment::from_node(node)))?;
        if self.selection.is_none() {
            self.selection = Some(Selection::cursor(from + text.chars().count()));
        }
        Ok(self)
    }

    /// Split the textblock around `pos` into two of the same type.
    pub fn split(&mut self, pos: usize) -> Result<&mut Self, ModelError> {
        let resolved = self.doc.resolve(pos)?;
        if resolved.depth() == 0 {
            return Err(ModelError::Replace("cannot split the top node".to_string()));
        }
        let parent = resolved.parent();
        let before = Fragment::from_node(parent.copy(Fragment::empty()));
        let after = Fragment::from_node(parent.copy(Fragment::empty()));
        self.replace(pos, pos, Slice::new(before.append(&after), 1, 1))?;
        if self.selection.is_none() {
            self.selection = Some(Selection::cursor(pos + 2));
        }
        Ok(self)
    }

    pub fn add_mark(
        &mut self,
        from: usize,
        to: usize,
        mark: Mark,
    ) -> Result<&mut Self, ModelError> {
        self.step(Step::AddMark { from, to, mark })
    }

    pub fn remove_mark(
        &mut self,
        from: usize,
        to: usize,
        mark: Mark,
    ) -> Result<&mut Self, ModelError> {
        self.step(Step::RemoveMark { from, to, mark })
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    pub fn set_stored_marks(&mut self, marks: Option<Vec<Mark>>) -> &mut Self {
        self.stored_marks = Some(marks);
        self
    }

    pub fn set_origin(&mut self, origin: SelectionOrigin) -> &mut Self {
        self.meta.origin = Some(origin);
        self
    }

    pub fn scroll_into_view(&mut self) -> &mut Self {
        self.meta.scroll_into_view = true;
        self
    }

    /// Discard the identity of the node at `pos` (in the new document).
    pub fn bust_key(&mut self, pos: usize) -> &mut Self {
        self.meta.bust_keys.push(pos);
        self
    }

    pub fn set_meta(&mut self, key: &str, value: &str) -> &mut Self {
        self.meta.custom.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get_meta(&self, key: &str) -> Option<&str> {
        self.meta.custom.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{basic_schema, doc, em, em_mark, p, pt, strong, strong_mark, txt};
    use crate::mapping::Assoc;
    use pretty_assertions::assert_eq;

    fn tr(d: &Node, selection: Selection) -> Transaction {
        Transaction::new(basic_schema(), d.clone(), selection, None)
    }

    #[test]
    fn test_insert_text_inherits_marks() {
        let d = doc(vec![p(vec![strong(txt("ab")), txt("c")])]);
        let mut t = tr(&d, Selection::cursor(3));
        t.insert_text("X", 3, 3).unwrap();

        assert_eq!(t.doc(), &doc(vec![p(vec![strong(txt("abX")), txt("c")])]));
        assert_eq!(t.selection(), Selection::cursor(4));
    }

    #[test]
    fn test_stored_marks_win() {
        let d = doc(vec![pt("ab")]);
        let mut t = tr(&d, Selection::cursor(2));
        t.set_stored_marks(Some(vec![em_mark()]));
        t.insert_text("X", 2, 2).unwrap();

        assert_eq!(t.doc(), &doc(vec![p(vec![txt("a"), em(txt("X")), txt("b")])]));
    }

    #[test]
    fn test_split_and_mapping() {
        let d = doc(vec![pt("abcd")]);
        let mut t = tr(&d, Selection::cursor(3));
        t.split(3).unwrap();

        assert_eq!(t.doc(), &doc(vec![pt("ab"), pt("cd")]));
        assert_eq!(t.selection(), Selection::cursor(5));
        assert_eq!(t.mapping().map(4, Assoc::Right), 6);
    }

    #[test]
    fn test_add_and_remove_mark() {
        let d = doc(vec![pt("abcd")]);
        let mut t = tr(&d, Selection::cursor(1));
        t.add_mark(2, 4, strong_mark()).unwrap();
        assert_eq!(
            t.doc(),
            &doc(vec![p(vec![txt("a"), strong(txt("bc")), txt("d")])])
        );

        t.remove_mark(1, 5, strong_mark()).unwrap();
        assert_eq!(t.doc(), &d);
        assert!(t.mapping().maps().iter().all(|map| map == &StepMap::empty()));
    }

    #[test]
    fn test_selection_maps_when_not_set() {
        let d = doc(vec![pt("abcd")]);
        let mut t = tr(&d, Selection::text(2, 4));
        t.delete(1, 2).unwrap();
        assert_eq!(t.selection(), Selection::text(1, 3));
    }

    #[test]
    fn test_meta_flags() {
        let d = doc(vec![pt("a")]);
        let mut t = tr(&d, Selection::cursor(1));
        t.set_origin(SelectionOrigin::Keyboard)
            .scroll_into_view()
            .bust_key(0)
            .set_meta("source", "test");

        assert_eq!(t.meta.origin, Some(SelectionOrigin::Keyboard));
        assert!(t.meta.scroll_into_view);
        assert_eq!(t.meta.bust_keys, vec![0]);
        assert_eq!(t.get_meta("source"), Some("test"));
        assert!(!t.doc_changed());
    }
}
