use std::path::PathBuf;

use common::utils::jsonl::iter_jsonl;
use serde::{Deserialize, Serialize};

/// One article as it appears in a knowledge-base file: a url, a title and its paragraphs in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDocument {
    pub url: String,
    pub title: String,
    pub paragraphs: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Newline-delimited JSON, one `SourceDocument` per line.
    Path(PathBuf),
    Records(Vec<SourceDocument>),
}

pub type DocumentIter = Box<dyn Iterator<Item = anyhow::Result<SourceDocument>> + Send>;

impl DocumentSource {
    /// Opens the source as a lazy stream of documents. Only opening the file can fail here;
    /// parse errors surface per item.
    pub fn into_documents(self) -> anyhow::Result<DocumentIter> {
        match self {
            Self::Path(path) => Ok(Box::new(iter_jsonl::<SourceDocument>(&path)?)),
            Self::Records(records) => Ok(Box::new(records.into_iter().map(Ok))),
        }
    }
}

impl From<Vec<SourceDocument>> for DocumentSource {
    fn from(records: Vec<SourceDocument>) -> Self {
        Self::Records(records)
    }
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}
