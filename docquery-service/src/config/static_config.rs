//! Configuration structures and their defaults.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration read at startup. Changing it requires a restart.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_search")]
    pub search: SearchConfig,

    #[serde(default)]
    pub jobs: JobsConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            storage: default_storage(),
            search: default_search(),
            jobs: JobsConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Filesystem locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Holds the SQLite document store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// One subdirectory per index, each with a `downloads/` folder.
    /// Asset paths starting with `../` resolve against this directory.
    #[serde(default = "default_ingestion_root")]
    pub ingestion_root: PathBuf,

    /// One subdirectory per prompt id containing `system_prompt_ver_N.txt` files
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,

    #[serde(default = "default_processing_plan")]
    pub processing_plan: PathBuf,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

/// Search engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Model names advertised by `GET /models`
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Files larger than this are ignored by the local engine
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

/// Ingestion job runners
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsConfig {
    #[serde(default)]
    pub local: LocalJobConfig,

    #[serde(default)]
    pub remote: RemoteJobConfig,
}

/// Subprocess runner, intended for local testing
#[derive(Debug, Clone, Deserialize)]
pub struct LocalJobConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_local_program")]
    pub program: String,

    #[serde(default = "default_local_args")]
    pub args: Vec<String>,
}

impl Default for LocalJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: default_local_program(),
            args: default_local_args(),
        }
    }
}

/// Remote HTTP job service. Disabled while `base_url` is unset.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteJobConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_remote_script")]
    pub script: String,

    #[serde(default = "default_remote_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteJobConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            script: default_remote_script(),
            timeout_secs: default_remote_timeout_secs(),
        }
    }
}

impl RemoteJobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ==================== Default Value Functions ====================

pub(crate) fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

pub(crate) fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub(crate) fn default_port() -> u16 {
    8000
}

pub(crate) fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
        ingestion_root: default_ingestion_root(),
        prompts_dir: default_prompts_dir(),
        processing_plan: default_processing_plan(),
        max_upload_bytes: default_max_upload_bytes(),
    }
}

pub(crate) fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

pub(crate) fn default_ingestion_root() -> PathBuf {
    PathBuf::from("./data/ingestion")
}

pub(crate) fn default_prompts_dir() -> PathBuf {
    PathBuf::from("./prompts")
}

pub(crate) fn default_processing_plan() -> PathBuf {
    PathBuf::from("./processing_plan.json")
}

pub(crate) fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

pub(crate) fn default_search() -> SearchConfig {
    SearchConfig {
        models: default_models(),
        max_file_bytes: default_max_file_bytes(),
    }
}

pub(crate) fn default_models() -> Vec<String> {
    vec!["gpt-4o".to_string(), "gpt-4-turbo".to_string()]
}

pub(crate) fn default_max_file_bytes() -> u64 {
    10 * 1024 * 1024
}

pub(crate) fn default_local_program() -> String {
    "python".to_string()
}

pub(crate) fn default_local_args() -> Vec<String> {
    vec!["./ingest_doc.py".to_string()]
}

pub(crate) fn default_remote_script() -> String {
    "ingest_doc.py".to_string()
}

pub(crate) fn default_remote_timeout_secs() -> u64 {
    30
}
