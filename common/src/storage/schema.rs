use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    error::AppError,
    storage::{
        backend::SearchBackend,
        types::{document::Document, paragraph::Paragraph, StoredObject},
    },
};

const VECTORIZER: &str = "text2vec-transformers";
const EF: i64 = -1;
const EF_CONSTRUCTION: u32 = 512;
const MAX_CONNECTIONS: u32 = 128;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    pub classes: Vec<ClassDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassDefinition {
    #[serde(rename = "class")]
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectorizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_index_config: Option<VectorIndexConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_config: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    pub data_type: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_inverted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_config: Option<Value>,
}

/// HNSW tuning passed straight through to the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexConfig {
    pub ef: i64,
    pub ef_construction: u32,
    pub max_connections: u32,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            ef: EF,
            ef_construction: EF_CONSTRUCTION,
            max_connections: MAX_CONNECTIONS,
        }
    }
}

impl PropertyDefinition {
    /// Inverted-indexed text that feeds the vectorizer.
    pub fn vectorized_text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: vec!["text".to_string()],
            index_inverted: Some(true),
            module_config: Some(json!({
                VECTORIZER: { "skip": false, "vectorizePropertyName": false }
            })),
        }
    }

    /// A property the vectorizer ignores.
    pub fn unvectorized(name: &str, data_type: &str, index_inverted: Option<bool>) -> Self {
        Self {
            name: name.to_string(),
            data_type: vec![data_type.to_string()],
            index_inverted,
            module_config: Some(json!({ VECTORIZER: { "skip": true } })),
        }
    }

    pub fn reference(name: &str, target_class: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: vec![target_class.to_string()],
            index_inverted: None,
            module_config: None,
        }
    }

    /// Cross-reference data types are class names, which always start upper case.
    pub fn is_reference(&self) -> bool {
        self.data_type
            .first()
            .and_then(|data_type| data_type.chars().next())
            .is_some_and(char::is_uppercase)
    }
}

impl ClassDefinition {
    fn vectorized(name: &str, properties: Vec<PropertyDefinition>) -> Self {
        Self {
            name: name.to_string(),
            properties,
            vectorizer: Some(VECTORIZER.to_string()),
            vector_index_config: Some(VectorIndexConfig::default()),
            module_config: Some(json!({ VECTORIZER: { "vectorizeClassName": false } })),
        }
    }

    /// The class as it can be created before its relation targets exist.
    pub fn without_references(&self) -> Self {
        Self {
            properties: self
                .properties
                .iter()
                .filter(|property| !property.is_reference())
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    pub fn reference_properties(&self) -> impl Iterator<Item = &PropertyDefinition> {
        self.properties
            .iter()
            .filter(|property| property.is_reference())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|property| property.name == name)
    }
}

/// The two linked record types: documents and the paragraphs they were split into.
pub fn default_schema() -> Schema {
    let document = ClassDefinition::vectorized(
        Document::class_name(),
        vec![
            PropertyDefinition::unvectorized("url", "string", Some(false)),
            PropertyDefinition::vectorized_text("title"),
            PropertyDefinition::vectorized_text("text"),
            PropertyDefinition::reference(Document::HAS_PARAGRAPHS, Paragraph::class_name()),
        ],
    );

    let paragraph = ClassDefinition::vectorized(
        Paragraph::class_name(),
        vec![
            PropertyDefinition::vectorized_text("text"),
            PropertyDefinition::unvectorized("order", "int", None),
            PropertyDefinition::reference(Paragraph::IN_DOCUMENT, Document::class_name()),
        ],
    );

    Schema {
        classes: vec![document, paragraph],
    }
}

pub async fn create_schema(backend: &dyn SearchBackend, overwrite: bool) -> Result<(), AppError> {
    create_schema_with(backend, &default_schema(), overwrite).await
}

/// Creates every class of `schema`, failing before any write if one already exists.
///
/// With `overwrite` set, all existing classes are deleted first. This cannot be undone.
pub async fn create_schema_with(
    backend: &dyn SearchBackend,
    schema: &Schema,
    overwrite: bool,
) -> Result<(), AppError> {
    if overwrite {
        warn!("Deleting every existing class before creating schema");
        backend.delete_all_classes().await?;
    }

    let existing = backend.class_names().await?;
    for class in &schema.classes {
        if existing
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&class.name))
        {
            return Err(AppError::SchemaAlreadyExists(class.name.clone()));
        }
    }

    for class in &schema.classes {
        backend.create_class(&class.without_references()).await?;
    }

    for class in &schema.classes {
        for property in class.reference_properties() {
            backend.add_property(&class.name, property).await?;
        }
    }

    info!(
        classes = ?schema.classes.iter().map(|class| class.name.as_str()).collect::<Vec<_>>(),
        "Schema created"
    );

    Ok(())
}
