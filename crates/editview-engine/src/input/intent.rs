use editview_model::{
    Attrs, EditorState, Fragment, ModelError, Node, Selection, SelectionOrigin, Transaction,
};
use unicode_segmentation::UnicodeSegmentation;

use super::words::{word_end, word_start};

/// Stand-in for inline leaf nodes when scanning textblock content
const LEAF_CHAR: char = '\u{fffc}';

/// A `beforeinput` intent the view handles itself instead of letting the
/// browser edit the DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputIntent {
    InsertText(String),
    /// Spellcheck or autocorrect replacing `from..to`
    InsertReplacementText { text: String, from: usize, to: usize },
    DeleteWordBackward,
    DeleteWordForward,
    DeleteContentBackward,
    DeleteContentForward,
    InsertParagraph,
    InsertLineBreak,
}

impl InputIntent {
    /// Map a DOM `inputType` to an intent. `target` is the document range
    /// the browser reported for replacements.
    pub fn from_input_type(
        input_type: &str,
        data: Option<&str>,
        target: Option<(usize, usize)>,
    ) -> Option<Self> {
        let intent = match input_type {
            "insertText" => InputIntent::InsertText(data?.to_string()),
            "insertReplacementText" => {
                let (from, to) = target?;
                InputIntent::InsertReplacementText {
                    text: data?.to_string(),
                    from,
                    to,
                }
            }
            "deleteWordBackward" => InputIntent::DeleteWordBackward,
            "deleteWordForward" => InputIntent::DeleteWordForward,
            "deleteContentBackward" => InputIntent::DeleteContentBackward,
            "deleteContentForward" => InputIntent::DeleteContentForward,
            "insertParagraph" => InputIntent::InsertParagraph,
            "insertLineBreak" => InputIntent::InsertLineBreak,
            _ => return None,
        };
        Some(intent)
    }
}

/// Content of the textblock around `pos` as chars, one per position, with
/// the position its content starts at
fn textblock_chars(doc: &Node, pos: usize) -> Result<Option<(Vec<char>, usize)>, ModelError> {
    let resolved = doc.resolve(pos)?;
    let parent = resolved.parent();
    if !parent.is_textblock() {
        return Ok(None);
    }
    let mut chars = Vec::with_capacity(parent.content_size());
    for child in parent.children() {
        match child.text() {
            Some(text) => chars.extend(text.chars()),
            None => chars.push(LEAF_CHAR),
        }
    }
    Ok(Some((chars, resolved.start(resolved.depth()))))
}

/// Char count of the last grapheme cluster in `chars`
fn last_grapheme_len(chars: &[char]) -> usize {
    let text: String = chars.iter().collect();
    text.graphemes(true)
        .next_back()
        .map_or(0, |grapheme| grapheme.chars().count())
}

fn first_grapheme_len(chars: &[char]) -> usize {
    let text: String = chars.iter().collect();
    text.graphemes(true)
        .next()
        .map_or(0, |grapheme| grapheme.chars().count())
}

/// Range removed by joining the textblock at `pos` with its previous
/// (or next) sibling
fn join_range(
    doc: &Node,
    pos: usize,
    backward: bool,
) -> Result<Option<(usize, usize)>, ModelError> {
    let resolved = doc.resolve(pos)?;
    let depth = resolved.depth();
    if depth == 0 {
        return Ok(None);
    }
    let container = resolved.node(depth - 1);
    let index = resolved.index(depth - 1);
    let before = resolved.before(depth);
    let after = resolved.after(depth);
    if backward {
        let Some(sibling) = index.checked_sub(1).and_then(|i| container.maybe_child(i)) else {
            return Ok(None);
        };
        if sibling.is_textblock() {
            Ok(Some((before - 1, before + 1)))
        } else if sibling.is_leaf() {
            Ok(Some((before - sibling.node_size(), before)))
        } else {
            Ok(None)
        }
    } else {
        let Some(sibling) = container.maybe_child(index + 1) else {
            return Ok(None);
        };
        if sibling.is_textblock() {
            Ok(Some((after - 1, after + 1)))
        } else if sibling.is_leaf() {
            Ok(Some((after, after + sibling.node_size())))
        } else {
            Ok(None)
        }
    }
}

/// Build the transaction an intent stands for, or `None` when it changes
/// nothing (e.g. backspace at the very start of the document).
pub fn intent_transaction(
    state: &EditorState,
    intent: &InputIntent,
) -> Result<Option<Transaction>, ModelError> {
    let selection = state.selection;
    let (from, to) = (selection.from(), selection.to());
    let doc = &state.doc;
    let mut tr = state.tr();

    match intent {
        InputIntent::InsertText(text) => {
            tr.insert_text(text, from, to)?;
        }
        InputIntent::InsertReplacementText { text, from, to } => {
            tr.insert_text(text, *from, *to)?;
        }
        InputIntent::DeleteContentBackward
        | InputIntent::DeleteContentForward
        | InputIntent::DeleteWordBackward
        | InputIntent::DeleteWordForward
            if from != to =>
        {
            tr.delete(from, to)?;
        }
        InputIntent::DeleteContentBackward | InputIntent::DeleteWordBackward => {
            let Some((chars, start)) = textblock_chars(doc, from)? else {
                return Ok(None);
            };
            let offset = from - start;
            if offset == 0 {
                let Some((del_from, del_to)) = join_range(doc, from, true)? else {
                    return Ok(None);
                };
                tr.delete(del_from, del_to)?;
            } else {
                let cut = if matches!(intent, InputIntent::DeleteWordBackward) {
                    word_start(&chars, offset)
                } else {
                    offset - last_grapheme_len(&chars[..offset])
                };
                tr.delete(start + cut, from)?;
            }
        }
        InputIntent::DeleteContentForward | InputIntent::DeleteWordForward => {
            let Some((chars, start)) = textblock_chars(doc, from)? else {
                return Ok(None);
            };
            let offset = from - start;
            if offset == chars.len() {
                let Some((del_from, del_to)) = join_range(doc, from, false)? else {
                    return Ok(None);
                };
                tr.delete(del_from, del_to)?;
            } else {
                let cut = if matches!(intent, InputIntent::DeleteWordForward) {
                    word_end(&chars, offset)
                } else {
                    offset + first_grapheme_len(&chars[offset..])
                };
                tr.delete(from, start + cut)?;
            }
        }
        InputIntent::InsertParagraph => {
            if !doc.resolve(from)?.parent().is_textblock() {
                return Ok(None);
            }
            tr.delete(from, to)?;
            tr.split(from)?;
        }
        InputIntent::InsertLineBreak => {
            let Some(line_break) = state.schema.line_break_type() else {
                return Ok(None);
            };
            if !doc.resolve(from)?.parent().is_textblock() {
                return Ok(None);
            }
            let node = Node::new(line_break.clone(), Attrs::new(), Fragment::empty(), Vec::new());
            tr.delete(from, to)?;
            tr.insert(from, vec![node])?;
            tr.set_selection(Selection::cursor(from + 1));
        }
    }
    if !tr.doc_changed() {
        return Ok(None);
    }
    tr.set_origin(SelectionOrigin::Keyboard).scroll_into_view();
    Ok(Some(tr))
}
