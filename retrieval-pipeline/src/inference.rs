use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use common::{error::AppError, storage::backend::SearchBackend, utils::jsonl::iter_jsonl};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::answer::ask_question;

/// One line of a questions file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionRecord {
    pub id: String,
    pub question: String,
}

/// Asks every question in turn and maps its id to the answer span, or `""` when none was found.
pub async fn answer_questions(
    backend: &dyn SearchBackend,
    questions: &[QuestionRecord],
    show_progress: bool,
) -> Result<BTreeMap<String, String>, AppError> {
    let total = questions.len();
    let mut answers = BTreeMap::new();

    for (index, record) in questions.iter().enumerate() {
        let answer = ask_question(backend, &record.question).await?;
        answers.insert(record.id.clone(), answer.span_or_empty().to_string());

        if show_progress {
            info!(processed = index + 1, total, "Answering questions");
        }
    }

    Ok(answers)
}

/// Reads questions from JSONL and writes `{id: answer}` as a single JSON object.
pub async fn run_inference(
    backend: &dyn SearchBackend,
    questions_file: &Path,
    output_file: &Path,
    show_progress: bool,
) -> Result<usize, AppError> {
    let questions = iter_jsonl::<QuestionRecord>(questions_file)?
        .collect::<anyhow::Result<Vec<_>>>()?;

    let answers = answer_questions(backend, &questions, show_progress).await?;

    let file = File::create(output_file)
        .with_context(|| format!("creating output file {}", output_file.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &answers)?;
    writer.flush()?;

    let answered = answers.values().filter(|span| !span.is_empty()).count();
    info!(
        questions = answers.len(),
        answered,
        output = %output_file.display(),
        "Inference finished"
    );

    Ok(answers.len())
}
