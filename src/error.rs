// ⚠️ Error Types - Fatal vs recoverable failures
//
// Only a document that fails to parse is fatal. Everything else (a bad date,
// an unparsable amount, an entity without id) is recovered from inside the
// assembler and never reaches the caller.

use crate::entities::EntityKind;
use thiserror::Error;

/// Fatal conversion failure, surfaced by `convert`.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Notice is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Notice is not well-formed XML: {0}")]
    Parse(#[from] roxmltree::Error),
}

/// Identity violation raised by the entity registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Refusing to register {kind} without an id")]
    EmptyId { kind: EntityKind },
}

pub type Result<T> = std::result::Result<T, ConversionError>;
