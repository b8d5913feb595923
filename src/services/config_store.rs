// Configuration Storage Service
// Handles config file read/write and version backup

use crate::models::Method;
use crate::services::detection::extractor::ExtractorSettings;
use crate::services::nlp_client::{DEFAULT_NLP_URL, DEFAULT_TIMEOUT_SECS, NLP_URL_ENV};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const BACKUPS_KEPT: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub nlp_service: NlpServiceConfig,
    #[serde(default)]
    pub models: ModelPaths,
    #[serde(default)]
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NlpServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Use the local rule splitter when the service is unreachable.
    #[serde(default = "default_true")]
    pub fallback_sentence_splitter: bool,
}

impl Default for NlpServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            fallback_sentence_splitter: true,
        }
    }
}

impl NlpServiceConfig {
    /// Base URL, with `MTDETECT_NLP_URL` taking precedence.
    pub fn effective_base_url(&self) -> String {
        resolve_base_url(std::env::var(NLP_URL_ENV).ok(), &self.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn resolve_base_url(env: Option<String>, configured: &str) -> String {
    match env {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => configured.to_string(),
    }
}

/// Trained classifier files per method plus the embedding table.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelPaths {
    pub back_translation: Option<PathBuf>,
    pub dependency_tree: Option<PathBuf>,
    pub word_distribution: Option<PathBuf>,
    pub word_embedding: Option<PathBuf>,
    pub embedding_table: Option<PathBuf>,
}

impl ModelPaths {
    pub fn classifier(&self, method: Method) -> Option<&Path> {
        match method {
            Method::BackTranslation => self.back_translation.as_deref(),
            Method::DependencyTree => self.dependency_tree.as_deref(),
            Method::WordDistribution => self.word_distribution.as_deref(),
            Method::WordEmbedding => self.word_embedding.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    #[serde(default = "default_sentence_min_tokens")]
    pub sentence_min_tokens: usize,
    #[serde(default = "default_paragraph_min_lemmas")]
    pub paragraph_min_lemmas: usize,
    #[serde(default = "default_lemmatize_batch_size")]
    pub lemmatize_batch_size: usize,
    #[serde(default = "default_translation_pivot")]
    pub translation_pivot: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sentence_min_tokens: default_sentence_min_tokens(),
            paragraph_min_lemmas: default_paragraph_min_lemmas(),
            lemmatize_batch_size: default_lemmatize_batch_size(),
            translation_pivot: default_translation_pivot(),
        }
    }
}

impl From<&DetectionConfig> for ExtractorSettings {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            sentence_min_tokens: config.sentence_min_tokens,
            paragraph_min_lemmas: config.paragraph_min_lemmas,
            lemmatize_batch_size: config.lemmatize_batch_size.max(1),
            translation_pivot: config.translation_pivot.clone(),
        }
    }
}

fn default_base_url() -> String { DEFAULT_NLP_URL.to_string() }
fn default_timeout_secs() -> u64 { DEFAULT_TIMEOUT_SECS }
fn default_true() -> bool { true }
fn default_sentence_min_tokens() -> usize { ExtractorSettings::default().sentence_min_tokens }
fn default_paragraph_min_lemmas() -> usize { ExtractorSettings::default().paragraph_min_lemmas }
fn default_lemmatize_batch_size() -> usize { ExtractorSettings::default().lemmatize_batch_size }
fn default_translation_pivot() -> String { ExtractorSettings::default().translation_pivot }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("mtdetect"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Load configuration; a missing file yields the defaults.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_file.exists() {
            debug!("[config] {} not found, using defaults", self.config_file.display());
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)?;
        serde_json::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.config_dir)?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
        fs::write(&self.config_file, content)?;
        info!("[config] saved {}", self.config_file.display());
        Ok(())
    }

    fn create_backup(&self) -> Result<(), ConfigError> {
        let backup_dir = self.config_dir.join("backups");
        fs::create_dir_all(&backup_dir)?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let mut backup_file = backup_dir.join(format!("config_{}.json", timestamp));
        let mut n = 1;
        while backup_file.exists() {
            backup_file = backup_dir.join(format!("config_{}_{}.json", timestamp, n));
            n += 1;
        }
        fs::copy(&self.config_file, &backup_file)?;

        cleanup_old_backups(&backup_dir, BACKUPS_KEPT)?;
        Ok(())
    }
}

/// Remove old backups, keeping only the most recent `keep`.
fn cleanup_old_backups(backup_dir: &Path, keep: usize) -> Result<(), ConfigError> {
    let mut entries: Vec<_> = fs::read_dir(backup_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
        .collect();

    if entries.len() <= keep {
        return Ok(());
    }

    // Oldest first; names carry the timestamp when mtimes tie.
    entries.sort_by_key(|e| {
        (
            e.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            e.file_name(),
        )
    });

    let remove_count = entries.len() - keep;
    for entry in entries.iter().take(remove_count) {
        let _ = fs::remove_file(entry.path());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nlp_service.base_url, "http://127.0.0.1:8788");
        assert_eq!(config.nlp_service.timeout_secs, 120);
        assert!(config.nlp_service.fallback_sentence_splitter);
        assert_eq!(config.detection.sentence_min_tokens, 5);
        assert_eq!(config.detection.paragraph_min_lemmas, 50);
        assert_eq!(config.detection.translation_pivot, "de");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{"nlpService":{"baseUrl":"http://nlp:9000"},"models":{"dependencyTree":"dt.json"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.nlp_service.base_url, "http://nlp:9000");
        assert_eq!(config.nlp_service.timeout_secs, 120);
        assert_eq!(
            config.models.classifier(Method::DependencyTree),
            Some(Path::new("dt.json"))
        );
        assert_eq!(config.models.classifier(Method::WordEmbedding), None);
        assert_eq!(config.detection, DetectionConfig::default());
    }

    #[test]
    fn test_env_url_overrides() {
        assert_eq!(resolve_base_url(Some(" http://x:1 ".into()), "http://y"), "http://x:1");
        assert_eq!(resolve_base_url(Some("  ".into()), "http://y"), "http://y");
        assert_eq!(resolve_base_url(None, "http://y"), "http://y");
    }

    #[test]
    fn test_settings_from_config() {
        let config = DetectionConfig {
            lemmatize_batch_size: 0,
            ..DetectionConfig::default()
        };
        let settings = ExtractorSettings::from(&config);
        assert_eq!(settings.lemmatize_batch_size, 1);
        assert_eq!(settings.sentence_min_tokens, 5);
    }

    #[test]
    fn test_save_load_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("mtdetect"));
        assert_eq!(store.load().unwrap(), AppConfig::default());

        let mut config = AppConfig::default();
        store.save(&config).unwrap();
        config.detection.translation_pivot = "fr".to_string();
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap().detection.translation_pivot, "fr");
        let backups = fs::read_dir(dir.path().join("mtdetect").join("backups"))
            .unwrap()
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn test_rapid_saves_keep_every_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        let mut config = AppConfig::default();
        for pivot in ["de", "fr", "es", "it"] {
            config.detection.translation_pivot = pivot.to_string();
            store.save(&config).unwrap();
        }
        let backups = fs::read_dir(dir.path().join("backups")).unwrap().count();
        assert_eq!(backups, 3);
    }

    #[test]
    fn test_cleanup_keeps_latest() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..13 {
            fs::write(dir.path().join(format!("config_2024010{:02}.json", i)), "{}").unwrap();
        }
        cleanup_old_backups(dir.path(), 10).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 10);
    }

    #[test]
    fn test_malformed_config_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.json"), "{not json").unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        assert!(matches!(store.load(), Err(ConfigError::Parse(_))));
    }
}
