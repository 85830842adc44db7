/// `load_config` module: loads a static YAML config and injects environment secrets into a [`CliConfig`].
///
/// This module is the only place where untrusted YAML is parsed and mapped to strongly-typed structs.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file (`api` and `upload` sections)
/// - Inject secrets and overrides from the environment:
///   `CARBON_API_TOKEN` (optional bearer token) and `CARBON_API_URL` (optional base URL override)
/// - Fail with clear diagnostics: any failure in loading must name what went wrong
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use carbon_upload_core::config::UploadConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const API_TOKEN_ENV: &str = "CARBON_API_TOKEN";
pub const API_URL_ENV: &str = "CARBON_API_URL";

#[derive(Debug)]
pub struct CliConfig {
    pub api: ApiSection,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSection {
    pub base_url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Never read from YAML; injected from the environment.
    #[serde(skip)]
    pub api_token: Option<String>,
}

/// Loads a static YAML config file (no secrets) and injects env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    #[derive(Debug, Deserialize)]
    struct RawConfig {
        api: ApiSection,
        upload: UploadConfig,
    }

    let mut raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
        info!(base_url = %url, "{API_URL_ENV} overrides api.base_url");
        raw.api.base_url = url;
    }
    if raw.api.base_url.trim().is_empty() {
        error!("api.base_url is empty");
        anyhow::bail!("api.base_url must not be empty");
    }

    match std::env::var(API_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => {
            info!("{API_TOKEN_ENV} found in env");
            raw.api.api_token = Some(token);
        }
        _ => info!("{API_TOKEN_ENV} not set, requests will be unauthenticated"),
    }

    raw.upload.trace_loaded();

    Ok(CliConfig {
        api: raw.api,
        upload: raw.upload,
    })
}
