use editview_model::ModelError;
use thiserror::Error;

use crate::dom::DomId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomError {
    #[error("dom node {0:?} does not exist or is detached")]
    Detached(DomId),

    #[error("dom node {0:?} is not an element")]
    NotAnElement(DomId),

    #[error("offset {offset} out of range for dom node {node:?}")]
    OffsetOutOfRange { node: DomId, offset: usize },

    #[error("selection extend is not supported")]
    ExtendUnsupported,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewError {
    /// A node type has neither a schema render rule nor an override
    #[error("no render rule for node type `{node_type}`")]
    MissingNodeRule { node_type: String },

    #[error("no render rule for mark type `{mark_type}`")]
    MissingMarkRule { mark_type: String },

    #[error("dom node {0:?} is not inside the editor")]
    OutsideEditor(DomId),

    #[error("no descriptor covers position {0}")]
    NoDescriptor(usize),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Dom(#[from] DomError),
}
