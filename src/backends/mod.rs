// src/backends/mod.rs

//! Narrow interfaces to the external services the lookups depend on.
//!
//! Each trait is the only thing the lookup adapters see; the concrete
//! implementations shell out to `yt-dlp`, call the Spotify Web API, or fetch
//! and render pages.

pub mod page;
pub mod spotify;
pub mod ytdlp;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::config::{resolve_credentials, BackendsConfig, RendererKind};
use crate::errors::LookupFailure;

pub use page::{ChromeRenderer, HttpRenderer};
pub use spotify::SpotifyCatalog;
pub use ytdlp::YtDlpBackend;

/// The fields of a video metadata record we care about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VideoEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
}

#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Run a search and return up to `limit` candidates.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<VideoEntry>, LookupFailure>;

    /// Fetch metadata for a single video page.
    async fn metadata(&self, url: &Url) -> Result<VideoEntry, LookupFailure>;
}

#[async_trait]
pub trait AudioCatalog: Send + Sync {
    /// Canonical share URL of the first track matching `song` (and `album`),
    /// or `None` when the catalog has no match.
    async fn search_track(
        &self,
        song: &str,
        album: Option<&str>,
    ) -> Result<Option<String>, LookupFailure>;
}

/// Opens exclusive page sessions.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, LookupFailure>;
}

/// One exclusively owned rendering session. Dropping it releases whatever
/// it holds (browser profile, connection pool).
#[async_trait]
pub trait PageSession: Send {
    /// Load `url` and return the rendered document.
    async fn render(&mut self, url: &Url) -> Result<String, LookupFailure>;
}

/// The concrete backends for one run.
#[derive(Clone)]
pub struct Backends {
    pub video: Arc<dyn VideoBackend>,
    /// `None` when no app credentials were configured.
    pub audio: Option<Arc<dyn AudioCatalog>>,
    pub page: Arc<dyn PageRenderer>,
}

impl Backends {
    pub fn from_config(config: &BackendsConfig) -> anyhow::Result<Self> {
        let video: Arc<dyn VideoBackend> = Arc::new(YtDlpBackend::new(
            config.video.program.clone(),
            config.video.timeout(),
        ));

        let audio: Option<Arc<dyn AudioCatalog>> = match resolve_credentials(&config.audio) {
            Some(creds) => Some(Arc::new(SpotifyCatalog::new(creds, &config.audio)?)),
            None => {
                warn!("no audio catalog credentials configured; audio link tasks will be rejected");
                None
            }
        };

        let page: Arc<dyn PageRenderer> = match config.page.renderer {
            RendererKind::Http => Arc::new(HttpRenderer::new(config.page.navigation_timeout())),
            RendererKind::Chrome => Arc::new(ChromeRenderer::new(
                config.page.chrome_program.clone(),
                config.page.navigation_timeout(),
            )),
        };

        Ok(Self { video, audio, page })
    }
}
