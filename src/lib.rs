// Notice Release - Core Library
// Converts eForms procurement notices (XML) into release documents (JSON)

pub mod assembler;
pub mod cleaner;
pub mod codes;
pub mod config;
pub mod dates;
pub mod entities;
pub mod error;
pub mod extract;
pub mod fragment;
pub mod merge;
pub mod source;

// Re-export commonly used types
pub use assembler::ReleaseAssembler;
pub use config::ConverterConfig;
pub use entities::{Entity, EntityKind, EntityRegistry};
pub use error::{ConversionError, RegistryError, Result};
pub use extract::{default_rules, ExtractContext, ExtractionRule, Phase};
pub use fragment::{AmendmentParent, Fragment, Patch, Target};
pub use source::SourceDocument;

use serde_json::Value;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convert one notice with the default configuration
pub fn convert(bytes: &[u8]) -> Result<Value> {
    convert_with_config(bytes, &ConverterConfig::default())
}

/// Convert one notice
///
/// The only failure is a document that is not well-formed UTF-8 XML; every
/// other problem degrades to an absent field.
pub fn convert_with_config(bytes: &[u8], config: &ConverterConfig) -> Result<Value> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let doc = SourceDocument::parse(text)?;
    Ok(ReleaseAssembler::new(config.clone()).assemble(&doc))
}
