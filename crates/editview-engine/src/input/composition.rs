use editview_model::{Assoc, EditorState, Mapping, ModelError, SelectionOrigin, Transaction};
use log::{debug, trace, warn};

use crate::dom::DomId;

/// Input method session. Text is buffered while composing and committed
/// as a single transaction once the session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CompositionState {
    #[default]
    Idle,
    Composing {
        from: usize,
        to: usize,
        text: String,
        /// Text node the input method writes into
        anchor: Option<DomId>,
    },
    /// Ended, waiting to be turned into a transaction
    Flushing {
        from: usize,
        to: usize,
        text: String,
        anchor: Option<DomId>,
    },
}

impl CompositionState {
    pub fn is_composing(&self) -> bool {
        matches!(self, CompositionState::Composing { .. })
    }

    pub fn anchor(&self) -> Option<DomId> {
        match self {
            CompositionState::Composing { anchor, .. }
            | CompositionState::Flushing { anchor, .. } => *anchor,
            CompositionState::Idle => None,
        }
    }

    pub fn start_pos(&self) -> Option<usize> {
        match self {
            CompositionState::Composing { from, .. } | CompositionState::Flushing { from, .. } => {
                Some(*from)
            }
            CompositionState::Idle => None,
        }
    }

    /// Begin composing over `from..to`. A start while already composing is
    /// ignored.
    pub fn start(&mut self, from: usize, to: usize) -> bool {
        if *self != CompositionState::Idle {
            warn!("composition start ignored in {self:?}");
            return false;
        }
        debug!("composition started at {from}..{to}");
        *self = CompositionState::Composing {
            from,
            to,
            text: String::new(),
            anchor: None,
        };
        true
    }

    /// Carry the session's range through a transaction applied while it
    /// runs. Content inserted at a collapsed range stays outside it.
    pub fn map(&mut self, mapping: &Mapping) {
        match self {
            CompositionState::Composing { from, to, .. }
            | CompositionState::Flushing { from, to, .. } => {
                let start = mapping.map(*from, Assoc::Right);
                let end = mapping.map(*to, Assoc::Left).max(start);
                trace!("composition range {}..{} mapped to {start}..{end}", *from, *to);
                *from = start;
                *to = end;
            }
            CompositionState::Idle => {}
        }
    }

    pub fn update(&mut self, data: &str, dom_anchor: Option<DomId>) {
        if let CompositionState::Composing { text, anchor, .. } = self {
            *text = data.to_string();
            if dom_anchor.is_some() {
                *anchor = dom_anchor;
            }
        }
    }

    /// Finish the session. `data` is the final text if the end event
    /// carried one.
    pub fn end(&mut self, data: Option<&str>) {
        if !self.is_composing() {
            return;
        }
        if let CompositionState::Composing { from, to, text, anchor } = std::mem::take(self) {
            let text = data.map_or(text, str::to_string);
            *self = CompositionState::Flushing { from, to, text, anchor };
        }
    }

    /// Turn an ended session into a transaction, returning to idle.
    /// Abandoned sessions (no text, or no text node to anchor to) give none.
    pub fn flush(&mut self, state: &EditorState) -> Result<Option<Transaction>, ModelError> {
        let CompositionState::Flushing { from, to, text, anchor } = std::mem::take(self) else {
            return Ok(None);
        };
        if text.is_empty() || anchor.is_none() {
            debug!("composition abandoned");
            return Ok(None);
        }
        let resolved = state.doc.resolve(from)?;
        let block = resolved
            .textblock_depth()
            .filter(|depth| *depth > 0)
            .map(|depth| resolved.before(depth));
        let mut tr = state.tr();
        tr.insert_text(&text, from, to)?;
        tr.meta.composition = true;
        if let Some(block) = block {
            tr.bust_key(block);
        }
        tr.set_origin(SelectionOrigin::Keyboard).scroll_into_view();
        debug!("composition committed {text:?} at {from}");
        Ok(Some(tr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomTree;
    use editview_model::Selection;
    use editview_model::builders::{basic_schema, doc, pt};
    use pretty_assertions::assert_eq;

    fn text_node() -> DomId {
        DomTree::new().create_text("foo")
    }

    fn state() -> EditorState {
        EditorState::create(basic_schema(), doc(vec![pt("one"), pt("foo")]))
            .with_selection(Selection::cursor(8))
    }

    #[test]
    fn test_session_commits_once() {
        let mut comp = CompositionState::default();
        assert!(comp.start(8, 8));
        assert!(!comp.start(8, 8));
        comp.update("e", Some(text_node()));
        comp.update("é", None);
        comp.end(None);

        let tr = comp.flush(&state()).unwrap().unwrap();

        assert_eq!(tr.doc(), &doc(vec![pt("one"), pt("foéo")]));
        assert!(tr.meta.composition);
        assert_eq!(tr.meta.bust_keys, vec![5]);
        assert_eq!(comp, CompositionState::Idle);
    }

    #[test]
    fn test_end_data_wins_over_updates() {
        let mut comp = CompositionState::default();
        comp.start(8, 8);
        comp.update("a", Some(text_node()));
        comp.end(Some("b"));

        let tr = comp.flush(&state()).unwrap().unwrap();
        assert_eq!(tr.doc(), &doc(vec![pt("one"), pt("fobo")]));
    }

    #[test]
    fn test_abandoned_session_gives_nothing() {
        let mut comp = CompositionState::default();
        comp.start(8, 8);
        comp.update("x", None);
        comp.end(None);
        assert_eq!(comp.flush(&state()).unwrap().map(|tr| tr.doc().clone()), None);

        comp.start(8, 8);
        comp.update("", Some(text_node()));
        comp.end(None);
        assert!(comp.flush(&state()).unwrap().is_none());
        assert_eq!(comp, CompositionState::Idle);
    }

    #[test]
    fn test_range_follows_earlier_edits() {
        let mut comp = CompositionState::default();
        comp.start(8, 8);
        comp.update("é", Some(text_node()));

        let mut remote = state().tr();
        remote.insert_text("X", 1, 1).unwrap();
        comp.map(remote.mapping());
        assert_eq!(comp.start_pos(), Some(9));

        comp.end(None);
        let after = state().apply(&remote);
        let tr = comp.flush(&after).unwrap().unwrap();
        assert_eq!(tr.doc(), &doc(vec![pt("Xone"), pt("foéo")]));
        assert_eq!(tr.meta.bust_keys, vec![6]);
    }

    #[test]
    fn test_insert_at_collapsed_range_stays_outside() {
        let mut comp = CompositionState::default();
        comp.start(8, 8);

        let mut remote = state().tr();
        remote.insert_text("ab", 8, 8).unwrap();
        comp.map(remote.mapping());

        assert!(matches!(comp, CompositionState::Composing { from: 10, to: 10, .. }));
    }

    #[test]
    fn test_end_without_start_is_ignored() {
        let mut comp = CompositionState::default();
        comp.end(Some("x"));
        assert_eq!(comp, CompositionState::Idle);
        assert!(comp.flush(&state()).unwrap().is_none());
    }
}
