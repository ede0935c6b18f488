use std::fmt;

use common::{
    error::AppError,
    storage::{
        backend::SearchBackend,
        types::{document::Document, query::ParagraphAnswer, StoredObject},
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// Result of one question. Every optional field is present exactly when `has_answer` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub has_answer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certainty: Option<f64>,
}

impl Answer {
    pub fn not_found() -> Self {
        Self {
            has_answer: false,
            source: None,
            support_text: None,
            answer: None,
            certainty: None,
        }
    }

    pub fn found(source: Source, support_text: String, answer: String, certainty: f64) -> Self {
        Self {
            has_answer: true,
            source: Some(source),
            support_text: Some(support_text),
            answer: Some(answer),
            certainty: Some(certainty),
        }
    }

    /// The span text, or an empty string when nothing was found.
    pub fn span_or_empty(&self) -> &str {
        self.answer.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.answer, &self.source) {
            (Some(answer), Some(source)) if self.has_answer => {
                writeln!(f, "{answer}")?;
                if let Some(certainty) = self.certainty {
                    writeln!(f, "certainty: {certainty:.3}")?;
                }
                write!(f, "source: {} <{}>", source.title, source.url)?;
                if let Some(support_text) = &self.support_text {
                    write!(f, "\n\n{support_text}")?;
                }
                Ok(())
            }
            _ => write!(f, "No answer found."),
        }
    }
}

impl TryFrom<ParagraphAnswer> for Answer {
    type Error = AppError;

    fn try_from(paragraph: ParagraphAnswer) -> Result<Self, Self::Error> {
        let payload = paragraph.answer;
        if !payload.has_answer {
            return Ok(Self::not_found());
        }

        let span = payload.result.ok_or_else(|| {
            AppError::MalformedResponse("answer reported without result span".into())
        })?;
        let certainty = payload.certainty.ok_or_else(|| {
            AppError::MalformedResponse("answer reported without certainty".into())
        })?;

        Ok(Self::found(
            Source {
                title: paragraph.document.title,
                url: paragraph.document.url,
            },
            paragraph.text,
            span,
            certainty,
        ))
    }
}

/// Answers `question` in two passes: pick the best matching document, then let the backend
/// extract a span from that document's best paragraph.
///
/// A paragraph without an extracted span is discarded rather than returned as partial evidence.
#[instrument(skip(backend))]
pub async fn ask_question(backend: &dyn SearchBackend, question: &str) -> Result<Answer, AppError> {
    let documents = backend
        .hybrid_search(Document::class_name(), question, 1)
        .await?;
    let Some(document_id) = documents.into_iter().next() else {
        debug!("No document matched");
        return Ok(Answer::not_found());
    };

    let paragraphs = backend.ask_in_document(&document_id, question, 1).await?;
    let Some(paragraph) = paragraphs.into_iter().next() else {
        debug!(%document_id, "Matched document has no paragraphs");
        return Ok(Answer::not_found());
    };

    let answer = Answer::try_from(paragraph)?;
    debug!(
        %document_id,
        has_answer = answer.has_answer,
        certainty = answer.certainty,
        "Question answered"
    );

    Ok(answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::storage::{
        db::WeaviateClient,
        memory::MemoryBackend,
        schema::create_schema,
        types::{
            paragraph::Paragraph,
            query::{AnswerPayload, DocumentRef},
            ReferenceLink,
        },
    };
    use serde_json::json;

    const ANARCHISM_URL: &str = "https://en.wikipedia.org/wiki?curid=12";

    /// Answers questions about anarchism from its defining sentence only.
    async fn anarchism_backend() -> MemoryBackend {
        let backend = MemoryBackend::new().with_extractor(|question, text| {
            (question.contains("anarchism") && text.contains("political philosophy"))
                .then(|| ("a political philosophy and movement".to_string(), 0.87))
        });
        create_schema(&backend, false).await.expect("schema");

        let texts = [
            "Anarchism is a political philosophy and movement that is skeptical of authority.",
            "Anarchism advocates for the replacement of the state with stateless societies.",
            "As a historically left-wing movement, anarchism is placed on the farthest left.",
        ]
        .map(String::from);
        let document = Document::new(ANARCHISM_URL, "Anarchism", &texts);

        let mut objects = vec![document.to_data_object().expect("document")];
        let mut links = Vec::new();
        for (order, text) in texts.iter().enumerate() {
            let paragraph = Paragraph::new(ANARCHISM_URL, order, text);
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
        backend
    }

    #[tokio::test]
    async fn test_answerable_question() {
        let backend = anarchism_backend().await;

        let answer = ask_question(&backend, "what is anarchism?")
            .await
            .expect("ask");

        assert!(answer.has_answer);
        assert_eq!(
            answer.answer.as_deref(),
            Some("a political philosophy and movement")
        );
        assert_eq!(
            answer.source,
            Some(Source {
                title: "Anarchism".into(),
                url: ANARCHISM_URL.into()
            })
        );
        assert!(answer
            .support_text
            .as_deref()
            .is_some_and(|text| text.starts_with("Anarchism is a political philosophy")));
        assert!(answer.certainty.is_some_and(|c| c > 0.0 && c <= 1.0));
    }

    #[tokio::test]
    async fn test_unrelated_question_has_no_answer() {
        let backend = anarchism_backend().await;

        let answer = ask_question(&backend, "zzzz qqqq").await.expect("ask");
        assert_eq!(answer, Answer::not_found());
    }

    #[tokio::test]
    async fn test_matching_document_without_span_is_not_found() {
        let backend = anarchism_backend().await;

        // Matches the document lexically but the extractor only answers anarchism questions.
        let answer = ask_question(&backend, "stateless societies").await.expect("ask");
        assert!(!answer.has_answer);
        assert!(answer.support_text.is_none());
    }

    #[tokio::test]
    async fn test_document_without_paragraphs_is_not_found() {
        let backend = MemoryBackend::new();
        create_schema(&backend, false).await.expect("schema");
        let empty = Document::new("empty-url", "Empty topic", &[]);
        backend
            .write_objects(&[empty.to_data_object().expect("document")])
            .await
            .expect("write");

        let answer = ask_question(&backend, "empty topic").await.expect("ask");
        assert_eq!(answer, Answer::not_found());
    }

    #[tokio::test]
    async fn test_empty_index_is_not_found() {
        let backend = MemoryBackend::new();
        create_schema(&backend, false).await.expect("schema");

        let answer = ask_question(&backend, "anything").await.expect("ask");
        assert!(!answer.has_answer);
    }

    #[tokio::test]
    async fn test_backend_query_errors_propagate() {
        let mut server = mockito::Server::new_async().await;
        let _graphql = server
            .mock("POST", "/v1/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "errors": [{ "message": "Cannot query field" }] }).to_string())
            .create_async()
            .await;
        let client = WeaviateClient::new(&server.url(), None).expect("client");

        let err = ask_question(&client, "anything")
            .await
            .expect_err("query error");
        assert!(matches!(err, AppError::Query(message) if message == "Cannot query field"));
    }

    #[test]
    fn test_answer_without_span_is_malformed() {
        let paragraph = ParagraphAnswer {
            text: "text".into(),
            document: DocumentRef {
                title: "t".into(),
                url: "u".into(),
            },
            answer: AnswerPayload {
                has_answer: true,
                ..AnswerPayload::default()
            },
        };

        let err = Answer::try_from(paragraph).expect_err("no span");
        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[test]
    fn test_not_found_serializes_without_optional_fields() {
        assert_eq!(
            serde_json::to_value(Answer::not_found()).expect("serialize"),
            json!({ "has_answer": false })
        );

        let found = Answer::found(
            Source {
                title: "Albedo".into(),
                url: "u".into(),
            },
            "support".into(),
            "span".into(),
            0.5,
        );
        let value = serde_json::to_value(&found).expect("serialize");
        assert_eq!(value["source"]["title"], "Albedo");
        assert_eq!(value["support_text"], "support");
        assert_eq!(value["answer"], "span");
    }

    #[test]
    fn test_display() {
        assert_eq!(Answer::not_found().to_string(), "No answer found.");

        let found = Answer::found(
            Source {
                title: "Albedo".into(),
                url: "u".into(),
            },
            "support".into(),
            "span".into(),
            0.5,
        );
        assert_eq!(
            found.to_string(),
            "span\ncertainty: 0.500\nsource: Albedo <u>\n\nsupport"
        );
    }
}
