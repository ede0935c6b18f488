use common::{
    error::AppError,
    storage::{
        backend::SearchBackend,
        types::{
            document::Document, paragraph::Paragraph, BatchOutcome, DataObject, ReferenceLink,
            StoredObject,
        },
    },
};
use tracing::{debug, error, info, warn};

use crate::source::{DocumentIter, DocumentSource, SourceDocument};

/// Totals for one import run. Failures are the per-item rejections the backend reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub documents: usize,
    pub paragraphs: usize,
    pub references: usize,
    pub failed_objects: usize,
    pub failed_references: usize,
}

impl ImportSummary {
    pub fn is_clean(&self) -> bool {
        self.failed_objects == 0 && self.failed_references == 0
    }
}

/// Buffers object and reference writes and submits them once `capacity` items are queued.
struct ImportBatch<'a> {
    backend: &'a dyn SearchBackend,
    capacity: usize,
    objects: Vec<DataObject>,
    references: Vec<ReferenceLink>,
    summary: ImportSummary,
}

impl<'a> ImportBatch<'a> {
    fn new(backend: &'a dyn SearchBackend, capacity: usize) -> Self {
        Self {
            backend,
            capacity,
            objects: Vec::new(),
            references: Vec::new(),
            summary: ImportSummary::default(),
        }
    }

    fn queued(&self) -> usize {
        self.objects.len() + self.references.len()
    }

    async fn add_object(&mut self, object: DataObject) -> Result<(), AppError> {
        self.objects.push(object);
        self.flush_if_full().await
    }

    async fn add_reference(&mut self, reference: ReferenceLink) -> Result<(), AppError> {
        self.references.push(reference);
        self.summary.references += 1;
        self.flush_if_full().await
    }

    async fn flush_if_full(&mut self) -> Result<(), AppError> {
        if self.queued() >= self.capacity {
            self.flush().await?;
        }
        Ok(())
    }

    /// Objects go first so references in the same flush can resolve.
    async fn flush(&mut self) -> Result<(), AppError> {
        if !self.objects.is_empty() {
            let objects = std::mem::take(&mut self.objects);
            let outcome = self.backend.write_objects(&objects).await?;
            self.summary.failed_objects += record_failures("object", &outcome);
        }

        if !self.references.is_empty() {
            let references = std::mem::take(&mut self.references);
            let outcome = self.backend.write_references(&references).await?;
            self.summary.failed_references += record_failures("reference", &outcome);
        }

        Ok(())
    }

    async fn add_document(&mut self, source: &SourceDocument) -> Result<(), AppError> {
        let document = Document::new(&source.url, &source.title, &source.paragraphs);
        self.add_object(document.to_data_object()?).await?;
        self.summary.documents += 1;

        for (order, text) in source.paragraphs.iter().enumerate() {
            let paragraph = Paragraph::new(&source.url, order, text);
            self.add_object(paragraph.to_data_object()?).await?;
            self.summary.paragraphs += 1;

            self.add_reference(ReferenceLink::new(
                Document::class_name(),
                document.id,
                Document::HAS_PARAGRAPHS,
                Paragraph::class_name(),
                paragraph.id,
            ))
            .await?;
            self.add_reference(ReferenceLink::new(
                Paragraph::class_name(),
                paragraph.id,
                Paragraph::IN_DOCUMENT,
                Document::class_name(),
                document.id,
            ))
            .await?;
        }

        Ok(())
    }
}

fn record_failures(kind: &str, outcome: &BatchOutcome) -> usize {
    for failure in &outcome.failures {
        warn!(kind, target = %failure.target, message = %failure.message, "Batch item rejected");
    }
    debug!(
        kind,
        submitted = outcome.submitted,
        succeeded = outcome.succeeded(),
        "Batch flushed"
    );
    outcome.failures.len()
}

/// Writes every document of `source`, its paragraphs and the links between them.
///
/// Identifiers are derived from urls, so importing the same source twice overwrites rather than
/// duplicates. Anything still queued is flushed even when a source item fails to parse, after
/// which that error is returned.
pub async fn import_data(
    backend: &dyn SearchBackend,
    source: DocumentSource,
    batch_size: usize,
    show_progress: bool,
) -> Result<ImportSummary, AppError> {
    if batch_size == 0 {
        return Err(AppError::Validation("batch size must be at least 1".into()));
    }

    let documents = source.into_documents()?;
    let (documents, total): (DocumentIter, Option<usize>) = if show_progress {
        let materialized: Vec<_> = documents.collect();
        let total = materialized.len();
        (Box::new(materialized.into_iter()), Some(total))
    } else {
        (documents, None)
    };

    let mut batch = ImportBatch::new(backend, batch_size);
    let mut result = Ok(());

    for (processed, item) in documents.enumerate() {
        let step = match item {
            Ok(document) => batch.add_document(&document).await,
            Err(err) => Err(AppError::from(err)),
        };
        if let Err(err) = step {
            result = Err(err);
            break;
        }
        if let Some(total) = total {
            info!(processed = processed + 1, total, "Importing documents");
        }
    }

    match (result, batch.flush().await) {
        (Err(err), flushed) => {
            if let Err(flush_err) = flushed {
                error!(error = %flush_err, "Failed to flush pending batch after import error");
            }
            Err(err)
        }
        (Ok(()), Err(flush_err)) => Err(flush_err),
        (Ok(()), Ok(())) => {
            let summary = batch.summary;
            info!(
                documents = summary.documents,
                paragraphs = summary.paragraphs,
                references = summary.references,
                failed_objects = summary.failed_objects,
                failed_references = summary.failed_references,
                "Import finished"
            );
            Ok(summary)
        }
    }
}
