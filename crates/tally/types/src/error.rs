use thiserror::Error;

/// Errors raised while constructing or parsing core types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid account address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid token code {0:?}: expected <address>::<module>::<name>")]
    InvalidTokenCode(String),

    #[error("hex decoding failed: {0}")]
    Hex(String),
}
