//! Test plan for the `nooverfit-config` crate.
//!
//! These tests exercise the configuration loader across default handling,
//! file discovery, environment overrides, and validation behaviour.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use nooverfit_config::{
    load, AppConfig, HttpConfig, InferenceConfig, PipelineConfig, UploadConfig, DEFAULT_MODEL,
};

const ENV_VARS_TO_RESET: &[&str] = &[
    "NOOVERFIT_CONFIG",
    "NOOVERFIT__CLIENT__BACKEND_URL",
    "NOOVERFIT__DATABASE__MAX_CONNECTIONS",
    "NOOVERFIT__DATABASE__URL",
    "NOOVERFIT__HTTP__ADDRESS",
    "NOOVERFIT__HTTP__PORT",
    "NOOVERFIT__INFERENCE__DEFAULT_MODEL",
    "NOOVERFIT__INFERENCE__GEMINI__API_KEY",
    "NOOVERFIT__INFERENCE__GEMINI__BASE_URL",
    "NOOVERFIT__INFERENCE__GEMINI__REQUEST_TIMEOUT_SECONDS",
    "NOOVERFIT__UPLOADS__MAX_FILES",
    "NOOVERFIT__UPLOADS__MAX_PAGES_PER_DOC",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        Self {
            vars: Vec::new(),
            original_dir: None,
        }
    }

    fn reset_environment(&mut self) {
        for key in ENV_VARS_TO_RESET {
            self.remove_var(key);
        }
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(path, contents).expect("failed to write config file");
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.inference.default_model, DEFAULT_MODEL);
    assert_eq!(config.inference.models, defaults.inference.models);
    assert_eq!(config.uploads.max_files, defaults.uploads.max_files);
    assert_eq!(
        config.uploads.allowed_mime_types,
        defaults.uploads.allowed_mime_types
    );
    assert_eq!(
        config.pipeline.retrieval_delay_ms,
        defaults.pipeline.retrieval_delay_ms
    );
    assert_eq!(config.database.url, defaults.database.url);
    assert!(config.inference.gemini.api_key.is_none());
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "nooverfit.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/nooverfit.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "nooverfit.toml",
        r#"
        [uploads]
        max_pages_per_doc = 50

        [pipeline]
        retrieval_delay_ms = 0
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.uploads.max_pages_per_doc, 50);
    assert_eq!(config.uploads.max_files, defaults.uploads.max_files);
    assert_eq!(config.pipeline.retrieval_delay_ms, 0);
    assert_eq!(
        config.pipeline.auto_idle_delay_ms,
        defaults.pipeline.auto_idle_delay_ms
    );
    assert_eq!(config.http.port, defaults.http.port);
}

#[test]
#[serial]
fn load_honours_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [client]
        backend_url = "http://backend.internal:9000"
        "#,
    );
    let path = temp_dir.path().join("elsewhere/custom.toml");
    ctx.set_var("NOOVERFIT_CONFIG", path.display().to_string());

    let config = load().expect("configuration load should read NOOVERFIT_CONFIG");
    assert_eq!(config.client.backend_url, "http://backend.internal:9000");
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "nooverfit.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    ctx.set_var("NOOVERFIT__HTTP__PORT", "8080");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
}

#[test]
#[serial]
fn load_accepts_gemini_api_key_from_env() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var("NOOVERFIT__INFERENCE__GEMINI__API_KEY", "test-key");

    let config = load().expect("configuration load should read the Gemini API key");
    assert_eq!(config.inference.gemini.api_key.as_deref(), Some("test-key"));
    assert_eq!(
        config.inference.gemini.base_url,
        InferenceConfig::default().gemini.base_url
    );
}

#[test]
#[serial]
fn load_registers_unknown_default_model_in_catalogue() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var("NOOVERFIT__INFERENCE__DEFAULT_MODEL", "gemini-experimental");

    let config = load().expect("configuration load should accept a custom default model");
    assert_eq!(config.inference.default_model, "gemini-experimental");
    assert!(config
        .inference
        .models
        .iter()
        .any(|model| model.id == "gemini-experimental"));
}

#[test]
#[serial]
fn load_rejects_zero_file_capacity() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "nooverfit.toml",
        r#"
        [uploads]
        max_files = 0
        "#,
    );

    let error = load().expect_err("zero capacity should be rejected");
    assert!(error.to_string().contains("max_files"));
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.reset_environment();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "nooverfit.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration")
            || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn pipeline_config_defaults_match_status_timings() {
    let defaults = PipelineConfig::default();
    assert_eq!(defaults.retrieval_delay_ms, 800);
    assert_eq!(defaults.ingest_delay_ms, 600);
    assert_eq!(defaults.auto_idle_delay_ms, 2_000);
    assert_eq!(defaults.notice_ttl_ms, 5_000);
}

#[test]
fn upload_config_defaults_allow_documents_and_images() {
    let defaults = UploadConfig::default();
    for mime in ["application/pdf", "image/png", "text/markdown", "text/x-python"] {
        assert!(
            defaults.allowed_mime_types.iter().any(|m| m == mime),
            "{mime} should be allowed by default"
        );
    }
    assert!(!defaults
        .allowed_mime_types
        .iter()
        .any(|m| m == "application/zip"));
}

#[test]
fn http_config_defaults_match_expected_host_and_port() {
    let defaults = HttpConfig::default();
    assert_eq!(defaults.address, "127.0.0.1");
    assert_eq!(defaults.port, 3001);
    assert_eq!(defaults.body_limit_mb, 50);
}
