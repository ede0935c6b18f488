use uuid::Uuid;

use crate::stored_object;

use super::deterministic_id;

stored_object!(Paragraph, "Paragraph", {
    text: String,
    order: usize
});

impl Paragraph {
    /// Reference property pointing back at the owning document.
    pub const IN_DOCUMENT: &'static str = "inDocument";

    pub fn new(document_url: &str, order: usize, text: &str) -> Self {
        Self {
            id: Self::id_for(document_url, order),
            text: text.to_string(),
            order,
        }
    }

    pub fn id_for(document_url: &str, order: usize) -> Uuid {
        deterministic_id(&format!("{document_url}#{order}"))
    }
}
