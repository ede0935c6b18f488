use uuid::Uuid;

use crate::stored_object;

use super::deterministic_id;

stored_object!(Document, "Document", {
    title: String,
    text: String,
    url: String
});

impl Document {
    /// Reference property pointing at every paragraph of the document.
    pub const HAS_PARAGRAPHS: &'static str = "hasParagraphs";

    pub fn new(url: &str, title: &str, paragraphs: &[String]) -> Self {
        Self {
            id: Self::id_for(url),
            title: title.to_string(),
            text: paragraphs.join("\n"),
            url: url.to_string(),
        }
    }

    pub fn id_for(url: &str) -> Uuid {
        deterministic_id(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_joins_paragraphs_with_newline() {
        let paragraphs = vec!["first".to_string(), "second".to_string()];
        let document = Document::new("u", "t", &paragraphs);
        assert_eq!(document.text, "first\nsecond");
    }

    #[test]
    fn test_id_depends_only_on_url() {
        let a = Document::new("same", "Title A", &["x".to_string()]);
        let b = Document::new("same", "Title B", &[]);
        let c = Document::new("other", "Title A", &["x".to_string()]);

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }
}
