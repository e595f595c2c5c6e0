use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "nooverfit.toml",
    "config/nooverfit.toml",
    "crates/config/nooverfit.toml",
    "../nooverfit.toml",
    "../config/nooverfit.toml",
    "../crates/config/nooverfit.toml",
];

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

pub const SYSTEM_INSTRUCTION: &str = r#"
You are NoOverfit.AI, an intelligent document analysis assistant acting as a RAG (Retrieval-Augmented Generation) system.

**PIPELINE INSTRUCTIONS:**

1.  **CONTEXT AUGMENTATION:**
    - You will receive documents that have passed strict validation.
    - Treat the provided files as your "Vector Store" or "Knowledge Base".
    - Answer the user's query *exclusively* using the information found in these documents.

2.  **CITATION & REFERENCES:**
    - **ALWAYS** cite the specific location of the information.
    - Use bold brackets for citations, e.g., **[Page 2]**, **[Section 3.1]**, **[Table 1]**, or **[Image 3]**.
    - If extracting raw text, wrap the text in quotes and append the citation.

3.  **RESPONSE FORMAT:**
    - Use Markdown.
    - If the answer is not in the documents, state: "I cannot find the answer in the provided documents."

4.  **TONE:**
    - Professional, objective, and analytical.
"#;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/json",
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/heic",
    "image/heif",
    "text/plain",
    "text/csv",
    "text/markdown",
    "text/html",
    "text/xml",
    "text/javascript",
    "text/typescript",
    "text/x-python",
    "application/x-javascript",
    "application/xml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    /// Upper bound for JSON request bodies; attachments travel inline as base64.
    pub body_limit_mb: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 3001,
            body_limit_mb: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOption {
    pub id: String,
    pub name: String,
}

impl ModelOption {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub default_model: String,
    pub models: Vec<ModelOption>,
    pub system_instruction: String,
    /// Reasoning budget attached to requests for `thinking` model variants.
    pub thinking_budget: u32,
    pub gemini: GeminiProviderConfig,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            models: vec![
                ModelOption::new("gemini-3-flash-preview", "Gemini 3.0 Flash (Fast)"),
                ModelOption::new("gemini-3-pro-preview", "Gemini 3.0 Pro (Reasoning)"),
                ModelOption::new("gemini-2.0-flash-exp", "Gemini 2.0 Flash"),
                ModelOption::new("gemini-2.0-flash-thinking-exp", "Gemini 2.0 Thinking"),
            ],
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            thinking_budget: 1024,
            gemini: GeminiProviderConfig::default(),
        }
    }
}

/// Connection settings for the upstream Gemini `generateContent` API.
///
/// ```
/// use nooverfit_config::GeminiProviderConfig;
///
/// let provider = GeminiProviderConfig::default();
/// assert_eq!(provider.base_url, "https://generativelanguage.googleapis.com/v1beta");
/// assert_eq!(provider.request_timeout_seconds, 120);
/// assert!(provider.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "GeminiProviderConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "GeminiProviderConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GeminiProviderConfig {
    fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1beta".to_string()
    }

    const fn default_request_timeout() -> u64 {
        120
    }
}

impl Default for GeminiProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_files: usize,
    pub max_file_size_mb: u64,
    pub max_pages_per_doc: usize,
    pub allowed_mime_types: Vec<String>,
    pub pdf_probe_timeout_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_file_size_mb: 10,
            max_pages_per_doc: 20,
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
            pdf_probe_timeout_ms: 3_000,
        }
    }
}

/// Timers that pace the status pipeline shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retrieval_delay_ms: u64,
    pub ingest_delay_ms: u64,
    pub auto_idle_delay_ms: u64,
    pub notice_ttl_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retrieval_delay_ms: 800,
            ingest_delay_ms: 600,
            auto_idle_delay_ms: 2_000,
            notice_ttl_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub backend_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:3001".to_string(),
            request_timeout_seconds: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://nooverfit.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use nooverfit_config::load;
///
/// std::env::remove_var("NOOVERFIT_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default(
            "inference.default_model",
            defaults.inference.default_model.clone(),
        )?
        .set_default(
            "inference.gemini.base_url",
            defaults.inference.gemini.base_url.clone(),
        )?
        .set_default(
            "inference.gemini.request_timeout_seconds",
            i64::try_from(defaults.inference.gemini.request_timeout_seconds).unwrap_or(i64::MAX),
        )?
        .set_default("client.backend_url", defaults.client.backend_url.clone())?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?;

    let environment_overrides = config::Environment::with_prefix("NOOVERFIT").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("NOOVERFIT_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via NOOVERFIT_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.uploads.max_files == 0 {
        anyhow::bail!("invalid configuration: uploads.max_files must be at least 1");
    }

    if !config
        .inference
        .models
        .iter()
        .any(|model| model.id == config.inference.default_model)
    {
        debug!(
            model = %config.inference.default_model,
            "default model missing from catalogue, registering it"
        );
        let id = config.inference.default_model.clone();
        config.inference.models.push(ModelOption {
            name: id.clone(),
            id,
        });
    }

    debug!(
        http = ?config.http,
        uploads = ?config.uploads,
        pipeline = ?config.pipeline,
        "loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_defaults_match_documented_limits() {
        let uploads = UploadConfig::default();
        assert_eq!(uploads.max_files, 5);
        assert_eq!(uploads.max_file_size_mb, 10);
        assert_eq!(uploads.max_pages_per_doc, 20);
        assert_eq!(uploads.pdf_probe_timeout_ms, 3_000);
        assert!(uploads
            .allowed_mime_types
            .iter()
            .any(|mime| mime == "application/pdf"));
    }

    #[test]
    fn default_model_is_part_of_catalogue() {
        let inference = InferenceConfig::default();
        assert!(inference
            .models
            .iter()
            .any(|model| model.id == inference.default_model));
    }
}
