//! Configuration loading from files and environment variables.

use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};

use crate::error::{ServiceError, ServiceResult};

use super::static_config::ServiceConfig;

/// Load configuration from `config.*` in the working directory and env vars
pub fn load_config() -> ServiceResult<ServiceConfig> {
    finish(Config::builder().add_source(File::with_name("config").required(false)))
}

/// Load configuration from an explicit file plus env vars
pub fn load_config_from_file(path: &Path) -> ServiceResult<ServiceConfig> {
    finish(Config::builder().add_source(File::from(path)))
}

fn finish(builder: ConfigBuilder<DefaultState>) -> ServiceResult<ServiceConfig> {
    builder
        .add_source(
            Environment::with_prefix("DOCQUERY")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("search.models")
                .with_list_parse_key("jobs.local.args"),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })
}
