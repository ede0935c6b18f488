#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod importer;
pub mod preprocess;
pub mod source;

pub use importer::{import_data, ImportSummary};
pub use source::{DocumentSource, SourceDocument};
