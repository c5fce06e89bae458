// src/config/loader.rs

use anyhow::{bail, Context, Result};
use std::{env, fs, path::Path};
use tracing::debug;

use super::model::{AudioConfig, RunConfig};

pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";

/// App credentials for the audio catalog.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Read and validate a YAML run file.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RunConfig> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
    let config = parse(&contents).with_context(|| format!("parsing config {:?}", path))?;
    debug!(path = %path.display(), tasks = config.tasks.len(), "config loaded");
    Ok(config)
}

pub fn parse(contents: &str) -> Result<RunConfig> {
    let config: RunConfig = serde_yaml::from_str(contents)?;
    validate(&config)?;
    Ok(config)
}

/// Run-wide sanity checks. Column bindings are checked per task at run
/// time, against the actual sheet.
fn validate(config: &RunConfig) -> Result<()> {
    if config.tasks.is_empty() {
        bail!("no tasks selected");
    }
    if config.backends.video.search_results == 0 {
        bail!("backends.video.search_results must be at least 1");
    }
    if config.backends.page.poll_interval_ms == 0 {
        bail!("backends.page.poll_interval_ms must be positive");
    }
    if config.pipeline.row_timeout_secs == 0 {
        bail!("pipeline.row_timeout_secs must be positive");
    }
    Ok(())
}

/// Credentials from the config file, falling back to the environment.
pub fn resolve_credentials(audio: &AudioConfig) -> Option<Credentials> {
    resolve_credentials_with(audio, |key| env::var(key).ok())
}

pub fn resolve_credentials_with<F>(audio: &AudioConfig, lookup: F) -> Option<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = audio
        .client_id
        .clone()
        .or_else(|| lookup(CLIENT_ID_ENV))
        .filter(|s| !s.trim().is_empty())?;
    let client_secret = audio
        .client_secret
        .clone()
        .or_else(|| lookup(CLIENT_SECRET_ENV))
        .filter(|s| !s.trim().is_empty())?;
    Some(Credentials {
        client_id,
        client_secret,
    })
}
