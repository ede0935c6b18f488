use std::{fs, path::Path};

use anyhow::{Context, Result};
use common::utils::jsonl::save_jsonl;
use retrieval_pipeline::inference::QuestionRecord;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::source::SourceDocument;

pub const KNOWLEDGE_BASE_FILE: &str = "knowledge-base.jsonl";
pub const QUESTIONS_FILE: &str = "questions.jsonl";
pub const DEV_SET_FILE: &str = "squad-2.0-dev.json";

#[derive(Debug, Deserialize)]
struct SquadArticle {
    title: String,
    paragraphs: Vec<SquadParagraph>,
}

#[derive(Debug, Deserialize)]
struct SquadParagraph {
    context: String,
    qas: Vec<SquadQuestion>,
}

#[derive(Debug, Deserialize)]
struct SquadQuestion {
    id: String,
    question: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquadConversion {
    pub articles: usize,
    pub questions: usize,
}

/// Splits a SQuAD 2.0 dump into a knowledge base, a question list and a matching (possibly
/// truncated) dev set, all written into `output_dir`.
///
/// Documents are keyed by their article index, so answers can be scored against the dev set.
pub fn convert_squad(
    input: &Path,
    output_dir: &Path,
    max_samples: Option<usize>,
) -> Result<SquadConversion> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("reading SQuAD dataset at {}", input.display()))?;
    let mut dump: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing SQuAD dataset at {}", input.display()))?;

    let data = dump
        .get_mut("data")
        .and_then(Value::as_array_mut)
        .with_context(|| format!("{} has no data array", input.display()))?;
    if let Some(max_samples) = max_samples {
        data.truncate(max_samples);
    }
    let articles: Vec<SquadArticle> = serde_json::from_value(Value::Array(data.clone()))
        .with_context(|| format!("unexpected article shape in {}", input.display()))?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let questions: Vec<QuestionRecord> = articles
        .iter()
        .flat_map(|article| &article.paragraphs)
        .flat_map(|paragraph| &paragraph.qas)
        .map(|qa| QuestionRecord {
            id: qa.id.clone(),
            question: qa.question.clone(),
        })
        .collect();

    let knowledge_base = articles
        .into_iter()
        .enumerate()
        .map(|(index, article)| SourceDocument {
            url: index.to_string(),
            title: article.title,
            paragraphs: article
                .paragraphs
                .into_iter()
                .map(|paragraph| paragraph.context)
                .collect(),
        });

    let article_count = save_jsonl(knowledge_base, &output_dir.join(KNOWLEDGE_BASE_FILE))?;
    let question_count = save_jsonl(&questions, &output_dir.join(QUESTIONS_FILE))?;

    let dev_set = output_dir.join(DEV_SET_FILE);
    fs::write(&dev_set, serde_json::to_vec(&dump)?)
        .with_context(|| format!("writing {}", dev_set.display()))?;

    info!(
        articles = article_count,
        questions = question_count,
        output = %output_dir.display(),
        "Converted SQuAD dataset"
    );

    Ok(SquadConversion {
        articles: article_count,
        questions: question_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::utils::jsonl::iter_jsonl;
    use serde_json::json;

    fn dump() -> Value {
        json!({
            "version": "v2.0",
            "data": [
                {
                    "title": "Normans",
                    "paragraphs": [
                        {
                            "context": "The Normans were the people who gave their name to Normandy.",
                            "qas": [
                                { "id": "q1", "question": "In what country is Normandy located?", "answers": [], "is_impossible": true },
                                { "id": "q2", "question": "Who gave their name to Normandy?", "answers": [{ "text": "The Normans", "answer_start": 0 }], "is_impossible": false }
                            ]
                        },
                        { "context": "The Norman dynasty had a major political impact.", "qas": [] }
                    ]
                },
                {
                    "title": "Computational complexity theory",
                    "paragraphs": [
                        { "context": "Complexity theory classifies problems.", "qas": [{ "id": "q3", "question": "What does it classify?", "answers": [] }] }
                    ]
                }
            ]
        })
    }

    fn write_dump(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("dev-v2.0.json");
        fs::write(&path, serde_json::to_vec(&dump()).expect("serialize")).expect("write dump");
        path
    }

    #[test]
    fn test_convert_writes_all_three_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = write_dump(dir.path());
        let output = dir.path().join("out");

        let conversion = convert_squad(&input, &output, None).expect("convert");
        assert_eq!(
            conversion,
            SquadConversion {
                articles: 2,
                questions: 3
            }
        );

        let documents: Vec<SourceDocument> = iter_jsonl(&output.join(KNOWLEDGE_BASE_FILE))
            .expect("open")
            .collect::<Result<_>>()
            .expect("parse");
        assert_eq!(documents[0].url, "0");
        assert_eq!(documents[0].title, "Normans");
        assert_eq!(documents[0].paragraphs.len(), 2);
        assert_eq!(documents[1].url, "1");

        let questions: Vec<QuestionRecord> = iter_jsonl(&output.join(QUESTIONS_FILE))
            .expect("open")
            .collect::<Result<_>>()
            .expect("parse");
        let ids: Vec<_> = questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2", "q3"]);

        let dev: Value =
            serde_json::from_slice(&fs::read(output.join(DEV_SET_FILE)).expect("read dev"))
                .expect("parse dev");
        assert_eq!(dev, dump());
    }

    #[test]
    fn test_max_samples_truncates_every_output() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = write_dump(dir.path());
        let output = dir.path().join("out");

        let conversion = convert_squad(&input, &output, Some(1)).expect("convert");
        assert_eq!(conversion.articles, 1);
        assert_eq!(conversion.questions, 2);

        let dev: Value =
            serde_json::from_slice(&fs::read(output.join(DEV_SET_FILE)).expect("read dev"))
                .expect("parse dev");
        assert_eq!(dev["version"], "v2.0");
        assert_eq!(dev["data"].as_array().map(Vec::len), Some(1));
    }
}
