//! Input and output adapters.
//!
//! Adapters connect the comparison core to the outside world:
//! - `tsv`: record formats for documents and spans
//! - `reader`: streaming document and span readers behind pull traits
//! - `export`: writer for the sampled document/span export

pub mod export;
pub mod reader;
pub mod tsv;

// Re-export the pull interfaces and their file-backed implementations
pub use export::Exporter;
pub use reader::{DocumentEntry, DocumentReader, DocumentSource, SpanReader, SpanSource};
pub use tsv::RecordError;
