//! Service configuration.
//!
//! Loaded once at startup from an optional `config.*` file and
//! `DOCQUERY__SECTION__KEY` environment variables.

mod loader;
mod static_config;

pub use loader::{load_config, load_config_from_file};
pub use static_config::{LocalJobConfig, RemoteJobConfig, ServiceConfig};
