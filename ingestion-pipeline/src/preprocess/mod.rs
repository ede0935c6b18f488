//! Converters that turn public datasets into the knowledge-base format `import_data` reads.

mod squad;
mod wiki;

pub use squad::{convert_squad, SquadConversion, DEV_SET_FILE, KNOWLEDGE_BASE_FILE, QUESTIONS_FILE};
pub use wiki::{filter_wiki_data, normalize_text, split_paragraphs, MIN_PARAGRAPH_WORDS};
