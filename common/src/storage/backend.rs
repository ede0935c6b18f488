use async_trait::async_trait;

use crate::{
    error::AppError,
    storage::{
        schema::{ClassDefinition, PropertyDefinition},
        types::{query::ParagraphAnswer, BatchOutcome, DataObject, ReferenceLink},
    },
};

/// The capabilities consumed from the search-and-inference backend.
///
/// Implementations are handed around explicitly (`&dyn SearchBackend` or
/// `Arc<dyn SearchBackend>`) so several backends can coexist in one process.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn class_names(&self) -> Result<Vec<String>, AppError>;

    async fn class_exists(&self, class: &str) -> Result<bool, AppError> {
        Ok(self
            .class_names()
            .await?
            .iter()
            .any(|name| name.eq_ignore_ascii_case(class)))
    }

    async fn create_class(&self, class: &ClassDefinition) -> Result<(), AppError>;

    async fn add_property(&self, class: &str, property: &PropertyDefinition)
        -> Result<(), AppError>;

    async fn delete_class(&self, class: &str) -> Result<(), AppError>;

    async fn delete_all_classes(&self) -> Result<(), AppError> {
        for name in self.class_names().await? {
            self.delete_class(&name).await?;
        }
        Ok(())
    }

    async fn write_objects(&self, objects: &[DataObject]) -> Result<BatchOutcome, AppError>;

    async fn write_references(
        &self,
        references: &[ReferenceLink],
    ) -> Result<BatchOutcome, AppError>;

    /// Identifiers of the top `limit` objects of `class` under combined lexical and vector ranking.
    async fn hybrid_search(
        &self,
        class: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, AppError>;

    /// Paragraphs of one document ranked by the span-extraction module for `question`.
    async fn ask_in_document(
        &self,
        document_id: &str,
        question: &str,
        limit: usize,
    ) -> Result<Vec<ParagraphAnswer>, AppError>;

    async fn count(&self, class: &str) -> Result<usize, AppError>;

    async fn is_ready(&self) -> bool;
}
