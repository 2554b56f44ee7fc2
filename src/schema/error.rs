use crate::tree::TreeError;
use crate::types::UnsupportedTypeError;

/// Errors that can occur while building the output schema
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A kept column has a type outside the type table
    #[error(transparent)]
    UnsupportedType(#[from] UnsupportedTypeError),

    /// Inconsistent builder settings or record layout
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The tree refused a declaration or binding
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),
}
