use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_weaviate_url")]
    pub weaviate_url: String,
    #[serde(default)]
    pub weaviate_api_key: Option<String>,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            weaviate_url: default_weaviate_url(),
            weaviate_api_key: None,
            http_port: default_http_port(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_weaviate_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_batch_size() -> usize {
    8
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
