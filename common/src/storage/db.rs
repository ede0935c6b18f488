use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::AppError,
    storage::{
        backend::SearchBackend,
        graphql::{self, AggregateData, GetData, IdRow, ParagraphRow},
        schema::{ClassDefinition, PropertyDefinition},
        types::{
            paragraph::Paragraph, query::ParagraphAnswer, BatchFailure, BatchOutcome, DataObject,
            ReferenceLink, StoredObject,
        },
    },
    utils::config::AppConfig,
};

/// HTTP client for a Weaviate instance (REST schema/batch endpoints plus GraphQL).
#[derive(Clone)]
pub struct WeaviateClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl WeaviateClient {
    /// # Initialize a new backend client
    ///
    /// # Arguments
    /// * `address` - base url of the instance, e.g. `http://127.0.0.1:8080`
    /// * `api_key` - optional bearer token
    ///
    /// # Returns
    /// * `WeaviateClient` initialized; no request is made until first use
    pub fn new(address: &str, api_key: Option<String>) -> Result<Self, AppError> {
        let mut address = address.trim().to_string();
        if !address.ends_with('/') {
            address.push('/');
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(&address)?,
            api_key,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(&config.weaviate_url, config.weaviate_api_key.clone())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AppError> {
        let mut builder = self.http.request(method, self.base_url.join(path)?);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        Ok(builder)
    }

    async fn send(builder: RequestBuilder) -> Result<Response, AppError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(AppError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json<T>(response: Response) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::MalformedResponse(format!("unexpected response body: {e}")))
    }

    async fn graphql<T>(&self, query: String) -> Result<T, AppError>
    where
        T: DeserializeOwned,
    {
        debug!(%query, "Sending GraphQL query");
        let response =
            Self::send(self.request(Method::POST, "v1/graphql")?.json(&json!({ "query": query })))
                .await?;
        let raw: Value = Self::read_json(response).await?;
        graphql::parse_response(raw)
    }

    async fn post_batch<B>(&self, path: &str, body: &B) -> Result<Vec<BatchItemResult>, AppError>
    where
        B: Serialize + Sync,
    {
        let response = Self::send(self.request(Method::POST, path)?.json(body)).await?;
        Self::read_json(response).await
    }
}

fn beacon(class: &str, id: &uuid::Uuid) -> String {
    format!("weaviate://localhost/{class}/{id}")
}

#[derive(Debug, Serialize)]
struct ReferenceBody {
    from: String,
    to: String,
}

impl From<&ReferenceLink> for ReferenceBody {
    fn from(link: &ReferenceLink) -> Self {
        Self {
            from: format!(
                "{}/{}",
                beacon(&link.from_class, &link.from_id),
                link.property
            ),
            to: beacon(&link.to_class, &link.to_id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchItemResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    result: Option<BatchItemStatus>,
}

#[derive(Debug, Deserialize)]
struct BatchItemStatus {
    #[serde(default)]
    errors: Option<BatchErrors>,
}

#[derive(Debug, Deserialize)]
struct BatchErrors {
    #[serde(default)]
    error: Vec<BatchErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct BatchErrorMessage {
    message: String,
}

fn collect_outcome(submitted: usize, items: Vec<BatchItemResult>) -> BatchOutcome {
    let failures = items
        .into_iter()
        .filter_map(|item| {
            let errors = item.result.and_then(|result| result.errors)?;
            if errors.error.is_empty() {
                return None;
            }
            let message = errors
                .error
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            let target = item.id.or(item.from).unwrap_or_default();
            Some(BatchFailure { target, message })
        })
        .collect();

    BatchOutcome {
        submitted,
        failures,
    }
}

#[derive(Debug, Deserialize)]
struct SchemaListing {
    #[serde(default)]
    classes: Option<Vec<ClassName>>,
}

#[derive(Debug, Deserialize)]
struct ClassName {
    class: String,
}

#[async_trait]
impl SearchBackend for WeaviateClient {
    async fn class_names(&self) -> Result<Vec<String>, AppError> {
        let response = Self::send(self.request(Method::GET, "v1/schema")?).await?;
        let listing: SchemaListing = Self::read_json(response).await?;
        Ok(listing
            .classes
            .unwrap_or_default()
            .into_iter()
            .map(|class| class.class)
            .collect())
    }

    async fn create_class(&self, class: &ClassDefinition) -> Result<(), AppError> {
        debug!(class = %class.name, "Creating class");
        Self::send(self.request(Method::POST, "v1/schema")?.json(class)).await?;
        Ok(())
    }

    async fn add_property(
        &self,
        class: &str,
        property: &PropertyDefinition,
    ) -> Result<(), AppError> {
        debug!(%class, property = %property.name, "Adding property");
        let path = format!("v1/schema/{class}/properties");
        Self::send(self.request(Method::POST, &path)?.json(property)).await?;
        Ok(())
    }

    async fn delete_class(&self, class: &str) -> Result<(), AppError> {
        debug!(%class, "Deleting class");
        let path = format!("v1/schema/{class}");
        Self::send(self.request(Method::DELETE, &path)?).await?;
        Ok(())
    }

    async fn write_objects(&self, objects: &[DataObject]) -> Result<BatchOutcome, AppError> {
        if objects.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let items = self
            .post_batch("v1/batch/objects", &json!({ "objects": objects }))
            .await?;
        let outcome = collect_outcome(objects.len(), items);
        if !outcome.is_clean() {
            warn!(
                failed = outcome.failures.len(),
                submitted = outcome.submitted,
                "Backend rejected objects in batch"
            );
        }
        Ok(outcome)
    }

    async fn write_references(
        &self,
        references: &[ReferenceLink],
    ) -> Result<BatchOutcome, AppError> {
        if references.is_empty() {
            return Ok(BatchOutcome::default());
        }
        let body: Vec<ReferenceBody> = references.iter().map(ReferenceBody::from).collect();
        let items = self.post_batch("v1/batch/references", &body).await?;
        let outcome = collect_outcome(references.len(), items);
        if !outcome.is_clean() {
            warn!(
                failed = outcome.failures.len(),
                submitted = outcome.submitted,
                "Backend rejected references in batch"
            );
        }
        Ok(outcome)
    }

    async fn hybrid_search(
        &self,
        class: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, AppError> {
        let data: GetData<IdRow> = self
            .graphql(graphql::hybrid_query(class, query, limit))
            .await?;
        Ok(data
            .rows(class)?
            .into_iter()
            .map(IdRow::into_id)
            .collect())
    }

    async fn ask_in_document(
        &self,
        document_id: &str,
        question: &str,
        limit: usize,
    ) -> Result<Vec<ParagraphAnswer>, AppError> {
        let data: GetData<ParagraphRow> = self
            .graphql(graphql::paragraph_ask_query(document_id, question, limit))
            .await?;
        data.rows(Paragraph::class_name())?
            .into_iter()
            .map(ParagraphAnswer::try_from)
            .collect()
    }

    async fn count(&self, class: &str) -> Result<usize, AppError> {
        let data: AggregateData = self.graphql(graphql::count_query(class)).await?;
        data.count(class)
    }

    async fn is_ready(&self) -> bool {
        match self.request(Method::GET, "v1/.well-known/ready") {
            Ok(builder) => Self::send(builder).await.is_ok(),
            Err(_) => false,
        }
    }
}
