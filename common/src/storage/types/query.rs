use serde::{Deserialize, Serialize};

/// Title and url of the document a paragraph belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRef {
    pub title: String,
    pub url: String,
}

/// Payload produced by the backend's span-extraction module for one paragraph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub has_answer: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub certainty: Option<f64>,
    #[serde(default)]
    pub start_position: Option<usize>,
    #[serde(default)]
    pub end_position: Option<usize>,
}

impl AnswerPayload {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn found(result: String, certainty: f64) -> Self {
        Self {
            has_answer: true,
            result: Some(result),
            certainty: Some(certainty),
            start_position: None,
            end_position: None,
        }
    }
}

/// One ranked paragraph from an "ask" query scoped to a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphAnswer {
    pub text: String,
    pub document: DocumentRef,
    pub answer: AnswerPayload,
}
