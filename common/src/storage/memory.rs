//! In-process stand-in for the search backend, used to test the orchestration layer in isolation.
//!
//! Ranking is plain term overlap and span extraction is whatever closure the test supplies;
//! neither tries to approximate the real engine.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{
        backend::SearchBackend,
        schema::{ClassDefinition, PropertyDefinition},
        types::{
            paragraph::Paragraph,
            query::{AnswerPayload, DocumentRef, ParagraphAnswer},
            BatchFailure, BatchOutcome, DataObject, ReferenceLink, StoredObject,
        },
    },
};

/// `(question, paragraph_text) -> Some((span, certainty))` when the paragraph answers the question.
pub type SpanExtractor = dyn Fn(&str, &str) -> Option<(String, f64)> + Send + Sync;

#[derive(Debug, Clone)]
struct MemoryObject {
    class: String,
    id: Uuid,
    properties: Value,
    links: BTreeMap<String, Vec<Uuid>>,
}

#[derive(Default)]
struct MemoryState {
    classes: Vec<ClassDefinition>,
    objects: Vec<MemoryObject>,
}

impl MemoryState {
    fn class(&self, name: &str) -> Option<&ClassDefinition> {
        self.classes
            .iter()
            .find(|class| class.name.eq_ignore_ascii_case(name))
    }

    fn class_mut(&mut self, name: &str) -> Option<&mut ClassDefinition> {
        self.classes
            .iter_mut()
            .find(|class| class.name.eq_ignore_ascii_case(name))
    }

    fn object(&self, id: Uuid) -> Option<&MemoryObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    fn object_mut(&mut self, id: Uuid) -> Option<&mut MemoryObject> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    fn link_error(&self, link: &ReferenceLink) -> Option<String> {
        let Some(class) = self.class(&link.from_class) else {
            return Some(format!("class {} does not exist", link.from_class));
        };
        if !class
            .property(&link.property)
            .is_some_and(PropertyDefinition::is_reference)
        {
            return Some(format!(
                "{} has no reference property {}",
                link.from_class, link.property
            ));
        }
        if !self
            .object(link.from_id)
            .is_some_and(|object| object.class.eq_ignore_ascii_case(&link.from_class))
        {
            return Some(format!("source object {} not found", link.from_id));
        }
        if !self
            .object(link.to_id)
            .is_some_and(|object| object.class.eq_ignore_ascii_case(&link.to_class))
        {
            return Some(format!("target object {} not found", link.to_id));
        }
        None
    }
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    extractor: Option<Arc<SpanExtractor>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extractor<F>(mut self, extractor: F) -> Self
    where
        F: Fn(&str, &str) -> Option<(String, f64)> + Send + Sync + 'static,
    {
        self.extractor = Some(Arc::new(extractor));
        self
    }

    pub async fn class(&self, name: &str) -> Option<ClassDefinition> {
        self.state.lock().await.class(name).cloned()
    }

    pub async fn objects(&self, class: &str) -> Vec<DataObject> {
        self.state
            .lock()
            .await
            .objects
            .iter()
            .filter(|object| object.class.eq_ignore_ascii_case(class))
            .map(|object| DataObject {
                class: object.class.clone(),
                id: object.id,
                properties: object.properties.clone(),
            })
            .collect()
    }

    /// Targets of `property` on the object `id`, in insertion order.
    pub async fn links(&self, id: Uuid, property: &str) -> Vec<Uuid> {
        self.state
            .lock()
            .await
            .object(id)
            .and_then(|object| object.links.get(property).cloned())
            .unwrap_or_default()
    }

    fn extract(&self, question: &str, text: &str) -> AnswerPayload {
        self.extractor
            .as_ref()
            .and_then(|extract| extract(question, text))
            .map_or_else(AnswerPayload::none, |(span, certainty)| {
                AnswerPayload::found(span, certainty)
            })
    }
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn searchable_text(properties: &Value) -> String {
    properties
        .as_object()
        .map(|map| {
            map.values()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn string_property(properties: &Value, name: &str) -> String {
    properties
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn class_names(&self) -> Result<Vec<String>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .classes
            .iter()
            .map(|class| class.name.clone())
            .collect())
    }

    async fn create_class(&self, class: &ClassDefinition) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.class(&class.name).is_some() {
            return Err(AppError::Backend {
                status: 422,
                message: format!("class name {} already exists", class.name),
            });
        }
        state.classes.push(class.clone());
        Ok(())
    }

    async fn add_property(
        &self,
        class: &str,
        property: &PropertyDefinition,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let definition = state.class_mut(class).ok_or_else(|| AppError::Backend {
            status: 404,
            message: format!("class {class} not found"),
        })?;
        definition.properties.push(property.clone());
        Ok(())
    }

    async fn delete_class(&self, class: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state
            .classes
            .retain(|definition| !definition.name.eq_ignore_ascii_case(class));
        state
            .objects
            .retain(|object| !object.class.eq_ignore_ascii_case(class));
        Ok(())
    }

    async fn write_objects(&self, objects: &[DataObject]) -> Result<BatchOutcome, AppError> {
        let mut state = self.state.lock().await;
        let mut failures = Vec::new();

        for object in objects {
            if state.class(&object.class).is_none() {
                failures.push(BatchFailure {
                    target: object.id.to_string(),
                    message: format!("class {} does not exist", object.class),
                });
                continue;
            }
            if !object.properties.is_object() {
                failures.push(BatchFailure {
                    target: object.id.to_string(),
                    message: "properties must be an object".into(),
                });
                continue;
            }

            match state.object_mut(object.id) {
                Some(existing) => {
                    existing.class.clone_from(&object.class);
                    existing.properties = object.properties.clone();
                }
                None => state.objects.push(MemoryObject {
                    class: object.class.clone(),
                    id: object.id,
                    properties: object.properties.clone(),
                    links: BTreeMap::new(),
                }),
            }
        }

        Ok(BatchOutcome {
            submitted: objects.len(),
            failures,
        })
    }

    async fn write_references(
        &self,
        references: &[ReferenceLink],
    ) -> Result<BatchOutcome, AppError> {
        let mut state = self.state.lock().await;
        let mut failures = Vec::new();

        for link in references {
            if let Some(message) = state.link_error(link) {
                failures.push(BatchFailure {
                    target: link.from_id.to_string(),
                    message,
                });
                continue;
            }
            if let Some(source) = state.object_mut(link.from_id) {
                let targets = source.links.entry(link.property.clone()).or_default();
                if !targets.contains(&link.to_id) {
                    targets.push(link.to_id);
                }
            }
        }

        Ok(BatchOutcome {
            submitted: references.len(),
            failures,
        })
    }

    async fn hybrid_search(
        &self,
        class: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, AppError> {
        let state = self.state.lock().await;
        if state.class(class).is_none() {
            return Err(AppError::Query(format!("Cannot query field \"{class}\"")));
        }

        let query_tokens = tokens(query);
        let mut scored: Vec<(usize, Uuid)> = state
            .objects
            .iter()
            .filter(|object| object.class.eq_ignore_ascii_case(class))
            .map(|object| {
                let object_tokens = tokens(&searchable_text(&object.properties));
                (query_tokens.intersection(&object_tokens).count(), object.id)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps insertion order between equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, id)| id.to_string())
            .collect())
    }

    async fn ask_in_document(
        &self,
        document_id: &str,
        question: &str,
        limit: usize,
    ) -> Result<Vec<ParagraphAnswer>, AppError> {
        let state = self.state.lock().await;
        let Ok(document_id) = Uuid::parse_str(document_id) else {
            return Ok(Vec::new());
        };

        let document = state
            .object(document_id)
            .map(|document| DocumentRef {
                title: string_property(&document.properties, "title"),
                url: string_property(&document.properties, "url"),
            })
            .unwrap_or_else(|| DocumentRef {
                title: String::new(),
                url: String::new(),
            });

        let mut candidates: Vec<(u64, ParagraphAnswer)> = state
            .objects
            .iter()
            .filter(|object| object.class.eq_ignore_ascii_case(Paragraph::class_name()))
            .filter(|object| {
                object
                    .links
                    .get(Paragraph::IN_DOCUMENT)
                    .is_some_and(|targets| targets.contains(&document_id))
            })
            .map(|object| {
                let text = string_property(&object.properties, "text");
                let order = object
                    .properties
                    .get("order")
                    .and_then(Value::as_u64)
                    .unwrap_or_default();
                let answer = self.extract(question, &text);
                (
                    order,
                    ParagraphAnswer {
                        text,
                        document: document.clone(),
                        answer,
                    },
                )
            })
            .collect();

        candidates.sort_by(|(order_a, a), (order_b, b)| {
            let certainty = |p: &ParagraphAnswer| p.answer.certainty.unwrap_or(-1.0);
            b.answer
                .has_answer
                .cmp(&a.answer.has_answer)
                .then_with(|| certainty(b).total_cmp(&certainty(a)))
                .then_with(|| order_a.cmp(order_b))
        });

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|(_, paragraph)| paragraph)
            .collect())
    }

    async fn count(&self, class: &str) -> Result<usize, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .objects
            .iter()
            .filter(|object| object.class.eq_ignore_ascii_case(class))
            .count())
    }

    async fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{schema::create_schema, types::document::Document};

    async fn backend_with_document() -> (MemoryBackend, Document, Vec<Paragraph>) {
        let backend = MemoryBackend::new().with_extractor(|question, text| {
            (question.contains("albedo") && text.contains("measure"))
                .then(|| ("the measure of the diffuse reflection".to_string(), 0.8))
        });
        create_schema(&backend, false).await.expect("schema");

        let texts = vec![
            "Albedo is the measure of the diffuse reflection of solar radiation.".to_string(),
            "Surface albedo is defined as the ratio of radiosity.".to_string(),
        ];
        let document = Document::new("albedo-url", "Albedo", &texts);
        let paragraphs: Vec<Paragraph> = texts
            .iter()
            .enumerate()
            .map(|(order, text)| Paragraph::new("albedo-url", order, text))
            .collect();

        let mut objects = vec![document.to_data_object().expect("doc")];
        let mut links = Vec::new();
        for paragraph in &paragraphs {
            objects.push(paragraph.to_data_object().expect("paragraph"));
            links.push(ReferenceLink::new(
                "Paragraph",
                paragraph.id,
                Paragraph::IN_DOCUMENT,
                "Document",
                document.id,
            ));
        }
        backend.write_objects(&objects).await.expect("objects");
        backend.write_references(&links).await.expect("links");

        (backend, document, paragraphs)
    }

    #[tokio::test]
    async fn test_writes_to_unknown_class_are_reported_per_item() {
        let backend = MemoryBackend::new();
        let document = Document::new("u", "t", &[]);
        let outcome = backend
            .write_objects(&[document.to_data_object().expect("object")])
            .await
            .expect("write");

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(backend.count("Document").await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_links_to_missing_objects_fail() {
        let backend = MemoryBackend::new();
        create_schema(&backend, false).await.expect("schema");
        let link = ReferenceLink::new(
            "Document",
            Uuid::from_u128(1),
            Document::HAS_PARAGRAPHS,
            "Paragraph",
            Uuid::from_u128(2),
        );

        let outcome = backend.write_references(&[link]).await.expect("write");
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_keeps_single_object() {
        let (backend, document, _) = backend_with_document().await;
        backend
            .write_objects(&[document.to_data_object().expect("doc")])
            .await
            .expect("rewrite");

        assert_eq!(backend.count("Document").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_hybrid_search_ranks_by_overlap_and_skips_unrelated() {
        let (backend, document, _) = backend_with_document().await;

        let hits = backend
            .hybrid_search("Document", "what is albedo", 1)
            .await
            .expect("search");
        assert_eq!(hits, vec![document.id.to_string()]);

        let misses = backend
            .hybrid_search("Document", "zzz qqq", 1)
            .await
            .expect("search");
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn test_ask_prefers_answered_paragraph() {
        let (backend, document, paragraphs) = backend_with_document().await;

        let rows = backend
            .ask_in_document(&document.id.to_string(), "what is albedo", 1)
            .await
            .expect("ask");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, paragraphs[0].text);
        assert_eq!(rows[0].document.title, "Albedo");
        assert!(rows[0].answer.has_answer);
    }

    #[tokio::test]
    async fn test_ask_without_extractor_reports_no_answer() {
        let (backend, document, _) = backend_with_document().await;
        let plain = MemoryBackend {
            extractor: None,
            ..backend
        };

        let rows = plain
            .ask_in_document(&document.id.to_string(), "what is albedo", 5)
            .await
            .expect("ask");

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| !row.answer.has_answer));
    }
}
