use std::sync::Arc;

use crate::decoration::DecorationSet;
use crate::mark::Mark;
use crate::node::Node;
use crate::schema::Schema;
use crate::selection::Selection;
use crate::transform::Transaction;

/// Immutable editor state. A new state is derived for every transaction.
#[derive(Debug, Clone)]
pub struct EditorState {
    pub schema: Arc<Schema>,
    pub doc: Node,
    pub selection: Selection,
    pub stored_marks: Option<Vec<Mark>>,
    /// Decorations owned by the state, mapped through every transaction
    pub decorations: DecorationSet,
}

impl EditorState {
    pub fn create(schema: Arc<Schema>, doc: Node) -> Self {
        let selection = Selection::at_start(&doc);
        Self {
            schema,
            doc,
            selection,
            stored_marks: None,
            decorations: DecorationSet::empty(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection.clamp(&self.doc);
        self
    }

    pub fn with_decorations(mut self, decorations: DecorationSet) -> Self {
        self.decorations = decorations;
        self
    }

    pub fn tr(&self) -> Transaction {
        Transaction::new(
            self.schema.clone(),
            self.doc.clone(),
            self.selection,
            self.stored_marks.clone(),
        )
    }

    pub fn apply(&self, tr: &Transaction) -> EditorState {
        EditorState {
            schema: self.schema.clone(),
            doc: tr.doc().clone(),
            selection: tr.selection(),
            stored_marks: tr.stored_marks(),
            decorations: self.decorations.map(tr.mapping()),
        }
    }
}
