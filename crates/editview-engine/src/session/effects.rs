use std::fmt;

use editview_model::EditorState;
use serde::Serialize;

use crate::dom::Rect;

/// Side-effecting companion of an editor session, told about every
/// committed state after the DOM is up to date.
pub trait PluginView: fmt::Debug {
    fn update(&mut self, state: &EditorState, prev: &EditorState);

    fn destroy(&mut self) {}
}

/// Steps of one commit, in the order they ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommitPhase {
    KeyDerivation,
    DecorationProjection,
    TreeReconciliation,
    SelectionPush,
    PluginViews,
    ObserverRearm,
}

/// Request to bring a caret into view, left for the host to act on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollRequest {
    pub pos: usize,
    pub rect: Option<Rect>,
    pub margin: f64,
}
