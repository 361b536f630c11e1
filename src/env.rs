use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://plan.db?mode=rwc";

/// Settings read from the process environment after the env files are loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEnv {
    pub database_url: String,
    pub profile: String,
    pub otlp_endpoint: Option<String>,
}

impl AppEnv {
    pub fn from_env() -> Self {
        let database_url = dotenvy::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let otlp_endpoint = dotenvy::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty());

        Self {
            database_url,
            profile: current_profile(),
            otlp_endpoint,
        }
    }
}

fn current_profile() -> String {
    dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string())
}

pub fn load_environment() -> anyhow::Result<()> {
    let env_files = if current_profile() == "production" {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)
        .with_context(|| format!("Failed to load environment file {}", path))?;
    info!("Loaded environment from: {}", path);
    Ok(())
}
