use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub mod document;
pub mod paragraph;
pub mod query;

pub trait StoredObject: Serialize {
    fn class_name() -> &'static str;
    fn get_id(&self) -> Uuid;

    /// Wraps the record's properties in the envelope the batch endpoint expects.
    fn to_data_object(&self) -> Result<DataObject, serde_json::Error> {
        Ok(DataObject {
            class: Self::class_name().to_string(),
            id: self.get_id(),
            properties: serde_json::to_value(self)?,
        })
    }
}

/// Identifier derived from stable input, so re-importing the same source lands on the same record.
pub fn deterministic_id(identifier: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, identifier.as_bytes())
}

#[macro_export]
macro_rules! stored_object {
    ($name:ident, $class:expr, {$($(#[$attr:meta])* $field:ident: $ty:ty),*}) => {
        #[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
        pub struct $name {
            #[serde(skip)]
            pub id: ::uuid::Uuid,
            $( $(#[$attr])* pub $field: $ty),*
        }

        impl $crate::storage::types::StoredObject for $name {
            fn class_name() -> &'static str {
                $class
            }

            fn get_id(&self) -> ::uuid::Uuid {
                self.id
            }
        }
    };
}

/// A single object write, keyed by an externally supplied identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataObject {
    pub class: String,
    pub id: Uuid,
    pub properties: Value,
}

/// A directed relation from one object's reference property to another object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceLink {
    pub from_class: String,
    pub from_id: Uuid,
    pub property: String,
    pub to_class: String,
    pub to_id: Uuid,
}

impl ReferenceLink {
    pub fn new(
        from_class: &str,
        from_id: Uuid,
        property: &str,
        to_class: &str,
        to_id: Uuid,
    ) -> Self {
        Self {
            from_class: from_class.to_string(),
            from_id,
            property: property.to_string(),
            to_class: to_class.to_string(),
            to_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub target: String,
    pub message: String,
}

/// What the backend reported for one flushed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub submitted: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.submitted.saturating_sub(self.failures.len())
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{document::Document, paragraph::Paragraph};

    #[test]
    fn test_deterministic_id_matches_uuid5_dns_namespace() {
        let id = deterministic_id("https://en.wikipedia.org/wiki?curid=12");
        assert_eq!(id.to_string(), "e0af8dbf-f126-5c77-ac51-77c88e141e5a");
        assert_eq!(id, deterministic_id("https://en.wikipedia.org/wiki?curid=12"));
    }

    #[test]
    fn test_data_object_excludes_id_from_properties() {
        let document = Document::new("doc-url", "Title", &["one".to_string()]);
        let object = document.to_data_object().expect("serialize");

        assert_eq!(object.class, "Document");
        assert_eq!(object.id, document.id);
        assert!(object.properties.get("id").is_none());
        assert_eq!(object.properties["title"], "Title");
        assert_eq!(object.properties["url"], "doc-url");
    }

    #[test]
    fn test_paragraph_data_object_carries_order() {
        let paragraph = Paragraph::new("doc-url", 3, "text");
        let object = paragraph.to_data_object().expect("serialize");

        assert_eq!(object.class, "Paragraph");
        assert_eq!(object.properties["order"], 3);
        assert_eq!(object.properties["text"], "text");
    }

    #[test]
    fn test_batch_outcome_counts() {
        let outcome = BatchOutcome {
            submitted: 4,
            failures: vec![BatchFailure {
                target: "x".into(),
                message: "boom".into(),
            }],
        };
        assert_eq!(outcome.succeeded(), 3);
        assert!(!outcome.is_clean());
        assert!(BatchOutcome::default().is_clean());
    }
}
