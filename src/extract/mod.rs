//! Application document handling — raw text extraction and field parsing.

pub mod document;
pub mod parser;

pub use document::{DocumentParser, PdfTextParser, PlainTextParser};
pub use parser::{FieldExtractor, NOT_APPLICABLE};
