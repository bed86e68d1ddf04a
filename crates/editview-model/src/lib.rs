//! # Document model
//!
//! Immutable, position-addressed document tree consumed by the view engine.
//!
//! ## Addressing
//!
//! Positions are integer offsets into a flattened token stream. A text node
//! contributes one unit per Unicode scalar value, a leaf node (image, hard
//! break) contributes one unit, and a non-leaf node contributes its content
//! plus one unit per edge (its *border*). The top node's own edges are not
//! addressable, so position `0` is the start of the document's content.
//!
//! ```rust
//! use editview_model::builders::{doc, pt};
//!
//! let d = doc(vec![pt("one"), pt("two")]);
//! // <p>one</p><p>two</p>  ->  0 p 1 o 2 n 3 e 4 /p 5 p 6 t 7 w 8 o 9 /p 10
//! assert_eq!(d.content_size(), 10);
//! assert_eq!(d.text_between(6, 9, None), "two");
//! ```
//!
//! ## Edits
//!
//! All edits are expressed as [`Step`]s collected in a [`Transaction`]. Every
//! step exposes a [`StepMap`] so positions, selections and decorations can be
//! carried forward (or, inverted, backward) across the edit.

pub mod builders;
pub mod decoration;
pub mod error;
pub mod mapping;
pub mod mark;
pub mod node;
pub mod replace;
pub mod resolved;
pub mod schema;
pub mod selection;
pub mod state;
pub mod transform;

pub use decoration::{
    DecoAttrs, Decoration, DecorationKind, DecorationSet, DecorationSource, Widget, WidgetContent,
};
pub use error::ModelError;
pub use mapping::{Assoc, MapResult, Mapping, StepMap};
pub use mark::Mark;
pub use node::{Attrs, Fragment, Node};
pub use replace::Slice;
pub use resolved::ResolvedPos;
pub use schema::{
    ContentKind, DomOutput, MarkSpec, MarkType, MarkTypeId, NodeSpec, NodeType, NodeTypeId,
    Schema,
};
pub use selection::Selection;
pub use state::EditorState;
pub use transform::{SelectionOrigin, Step, Transaction, TransactionMeta};
