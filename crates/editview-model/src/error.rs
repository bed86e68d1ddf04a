use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("position {pos} out of range (content size {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    #[error("replace failed: {0}")]
    Replace(String),

    #[error("invalid content for node `{node_type}`")]
    InvalidContent { node_type: String },

    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    #[error("unknown mark type `{0}`")]
    UnknownMarkType(String),

    #[error("schema is missing required node type `{0}`")]
    MissingSchemaNode(&'static str),
}
