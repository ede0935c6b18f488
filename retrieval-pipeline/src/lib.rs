#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod answer;
pub mod inference;

pub use answer::{ask_question, Answer, Source};
pub use inference::{answer_questions, run_inference, QuestionRecord};
