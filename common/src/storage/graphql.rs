//! GraphQL query construction and typed response parsing for the backend's query endpoint.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{
    error::AppError,
    storage::types::{
        document::Document,
        paragraph::Paragraph,
        query::{AnswerPayload, DocumentRef, ParagraphAnswer},
        StoredObject,
    },
};

/// Escapes a value for use inside a double-quoted GraphQL string literal.
///
/// JSON string escapes are a subset of GraphQL's, so quotes, backslashes and
/// control characters all come out valid. This is the only sanitization applied
/// to user input.
pub fn escape_literal(value: &str) -> String {
    let quoted = Value::String(value.to_owned()).to_string();
    quoted
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(&quoted)
        .to_string()
}

pub fn hybrid_query(class: &str, query: &str, limit: usize) -> String {
    format!(
        "{{ Get {{ {class}(hybrid: {{ query: \"{query}\" }}, limit: {limit}) {{ _additional {{ id }} }} }} }}",
        query = escape_literal(query),
    )
}

pub fn paragraph_ask_query(document_id: &str, question: &str, limit: usize) -> String {
    format!(
        "{{ Get {{ {paragraph}(\
         where: {{ path: [\"{in_document}\", \"{document}\", \"id\"], operator: Equal, valueString: \"{document_id}\" }}, \
         ask: {{ question: \"{question}\", properties: [\"text\"] }}, \
         limit: {limit}) {{ \
         text \
         {in_document} {{ ... on {document} {{ title url }} }} \
         _additional {{ answer {{ hasAnswer certainty result startPosition endPosition }} }} \
         }} }} }}",
        paragraph = Paragraph::class_name(),
        document = Document::class_name(),
        in_document = Paragraph::IN_DOCUMENT,
        document_id = escape_literal(document_id),
        question = escape_literal(question),
    )
}

pub fn count_query(class: &str) -> String {
    format!("{{ Aggregate {{ {class} {{ meta {{ count }} }} }} }}")
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Splits a raw response into its typed `data`, or the reported query errors.
pub fn parse_response<T>(raw: Value) -> Result<T, AppError>
where
    T: DeserializeOwned,
{
    let envelope: Envelope = serde_json::from_value(raw)
        .map_err(|e| AppError::MalformedResponse(format!("invalid GraphQL envelope: {e}")))?;

    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
        return Err(AppError::Query(messages.join("; ")));
    }

    let data = envelope
        .data
        .ok_or_else(|| AppError::MalformedResponse("GraphQL response has no data".into()))?;

    serde_json::from_value(data)
        .map_err(|e| AppError::MalformedResponse(format!("unexpected GraphQL data shape: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct GetData<T> {
    #[serde(rename = "Get")]
    get: HashMap<String, Option<Vec<T>>>,
}

impl<T> GetData<T> {
    /// Rows for `class`; a class the backend answered with `null` yields no rows.
    pub fn rows(mut self, class: &str) -> Result<Vec<T>, AppError> {
        self.get
            .remove(class)
            .map(Option::unwrap_or_default)
            .ok_or_else(|| AppError::MalformedResponse(format!("no {class} entry in Get result")))
    }
}

#[derive(Debug, Deserialize)]
pub struct IdRow {
    #[serde(rename = "_additional")]
    additional: IdAdditional,
}

#[derive(Debug, Deserialize)]
struct IdAdditional {
    id: String,
}

impl IdRow {
    pub fn into_id(self) -> String {
        self.additional.id
    }
}

#[derive(Debug, Deserialize)]
pub struct ParagraphRow {
    text: String,
    #[serde(rename = "inDocument", default)]
    in_document: Option<Vec<DocumentRef>>,
    #[serde(rename = "_additional")]
    additional: AnswerAdditional,
}

#[derive(Debug, Deserialize)]
struct AnswerAdditional {
    answer: AnswerPayload,
}

impl TryFrom<ParagraphRow> for ParagraphAnswer {
    type Error = AppError;

    fn try_from(row: ParagraphRow) -> Result<Self, Self::Error> {
        let document = row
            .in_document
            .and_then(|documents| documents.into_iter().next())
            .ok_or_else(|| {
                AppError::MalformedResponse("paragraph has no inDocument reference".into())
            })?;

        Ok(Self {
            text: row.text,
            document,
            answer: row.additional.answer,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AggregateData {
    #[serde(rename = "Aggregate")]
    aggregate: HashMap<String, Option<Vec<AggregateRow>>>,
}

#[derive(Debug, Deserialize)]
struct AggregateRow {
    meta: AggregateMeta,
}

#[derive(Debug, Deserialize)]
struct AggregateMeta {
    count: usize,
}

impl AggregateData {
    pub fn count(mut self, class: &str) -> Result<usize, AppError> {
        let rows = self
            .aggregate
            .remove(class)
            .flatten()
            .ok_or_else(|| AppError::MalformedResponse(format!("no {class} aggregate")))?;
        Ok(rows.first().map_or(0, |row| row.meta.count))
    }
}
