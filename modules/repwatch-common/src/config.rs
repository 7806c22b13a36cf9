use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Blob storage
    pub blob_api_base: String,
    pub blob_api_token: String,
    pub analysis_bucket: String,

    // Model API
    pub model_api_base: String,
    pub model_api_key: String,
    pub model_id: String,
    pub batch_model_id: String,

    // Job scheduler
    pub scheduler_api_base: String,

    // Our own public base URL, used for trigger chaining and scheduler targets
    pub service_base_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            blob_api_base: required_env("BLOB_API_BASE"),
            blob_api_token: required_env("BLOB_API_TOKEN"),
            analysis_bucket: env::var("ANALYSIS_BUCKET")
                .unwrap_or_else(|_| "repwatch-sentiment-analysis".to_string()),
            model_api_base: required_env("MODEL_API_BASE"),
            model_api_key: required_env("MODEL_API_KEY"),
            model_id: env::var("MODEL_ID").unwrap_or_else(|_| "gemini-1.5-pro-002".to_string()),
            batch_model_id: env::var("BATCH_MODEL_ID")
                .unwrap_or_else(|_| "gemini-1.5-pro-002".to_string()),
            scheduler_api_base: required_env("SCHEDULER_API_BASE"),
            service_base_url: env::var("SERVICE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
