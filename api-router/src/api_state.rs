use std::sync::Arc;

use common::{
    error::AppError,
    storage::{backend::SearchBackend, db::WeaviateClient},
    utils::config::AppConfig,
};

#[derive(Clone)]
pub struct ApiState {
    pub backend: Arc<dyn SearchBackend>,
}

impl ApiState {
    /// Connects to the backend named in `config`.
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let client = WeaviateClient::from_config(config)?;
        Ok(Self::with_backend(Arc::new(client)))
    }

    pub fn with_backend(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }
}
