//! Headless stand-in for the browser's editable surface.

pub mod layout;
pub mod selection;
pub mod tree;

pub use layout::{GridLayout, Layout, Rect};
pub use selection::{DomPoint, DomRange, DomSelection};
pub use tree::{DomId, DomNodeKind, DomTree, MutationRecord};
