//! The descriptor tree: a live mirror of the document onto the DOM,
//! reconciled in place on every update.

pub mod desc;
mod dirty;
mod position;
mod selection;
pub mod tree;

pub use desc::{Desc, DescId, DescKind, DescSnapshot, Dirty, HackKind};
pub use tree::{
    CompositionGuard, DescTree, RenderCtx, SEPARATOR_CLASS, TRAILING_BREAK_CLASS, WIDGET_CLASS,
};
