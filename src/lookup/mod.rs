// src/lookup/mod.rs

//! Lookup adapters: one external capability each, behind one signature.
//!
//! An adapter reads only the inputs it is handed and returns either a value,
//! the not-found sentinel, or a [`LookupFailure`]. [`AdapterTable`] maps a
//! task's platform and kind onto the adapter that serves it.

pub mod audio;
pub mod video;

use async_trait::async_trait;
use scraper::Selector;

use crate::backends::Backends;
use crate::config::BackendsConfig;
use crate::errors::{ConfigError, LookupFailure};
use crate::pipeline::task::{Platform, TaskKind, TaskSpec};
use crate::table::Cell;

pub use audio::{AudioLinkAdapter, AudioMetricAdapter, ElementWait};
pub use video::{format_view_count, VideoLinkAdapter, VideoMetricAdapter};

/// Written into the output cell when a catalog legitimately has no match.
pub const NOT_FOUND_SENTINEL: &str = "Song Not Found";
/// Prefix of every rendered failure.
pub const ERROR_TAG: &str = "Error:";
/// Failure text beyond this many characters is cut. Workbook cells hold at
/// most 32,767 and backend stderr can be longer.
pub const MAX_FAILURE_CHARS: usize = 2048;

#[derive(Debug, Clone, PartialEq)]
pub enum LookupValue {
    Found(Cell),
    /// A business outcome, not a failure.
    NotFound,
}

pub type LookupResult = Result<LookupValue, LookupFailure>;

#[async_trait]
pub trait LookupAdapter: Send {
    fn name(&self) -> &'static str;

    /// `inputs` holds the row's values for the task's input columns, in
    /// order; the first is always present and non-empty.
    async fn lookup(&mut self, inputs: &[String]) -> LookupResult;
}

/// Cell value for one row's outcome. Failures are tagged, never dropped.
pub fn render(result: &LookupResult) -> Cell {
    match result {
        Ok(LookupValue::Found(cell)) => cell.clone(),
        Ok(LookupValue::NotFound) => Cell::Text(NOT_FOUND_SENTINEL.to_string()),
        Err(failure) => Cell::Text(truncate_chars(
            format!("{} {}", ERROR_TAG, failure),
            MAX_FAILURE_CHARS,
        )),
    }
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max) {
        text.truncate(cut);
        text.push('…');
    }
    text
}

/// True for values a previous lookup wrote that are not real links.
pub fn is_placeholder(value: &str) -> bool {
    value == NOT_FOUND_SENTINEL || value.starts_with(ERROR_TAG)
}

/// Fixed dispatch from `(platform, kind)` to a freshly built adapter.
pub struct AdapterTable {
    backends: Backends,
    video_search_results: usize,
    element_wait: ElementWait,
}

impl AdapterTable {
    pub fn new(backends: Backends, video_search_results: usize, element_wait: ElementWait) -> Self {
        Self {
            backends,
            video_search_results,
            element_wait,
        }
    }

    pub fn from_config(config: &BackendsConfig) -> anyhow::Result<Self> {
        let backends = Backends::from_config(config)?;
        let element_wait = ElementWait::new(
            &config.page.selector,
            config.page.element_wait(),
            config.page.poll_interval(),
        )
        .map_err(anyhow::Error::new)?;
        Ok(Self::new(
            backends,
            config.video.search_results,
            element_wait,
        ))
    }

    /// A new adapter for one task. Each task gets its own instance, so any
    /// session it opens lives exactly as long as the task.
    pub fn build(&self, spec: &TaskSpec) -> Result<Box<dyn LookupAdapter>, ConfigError> {
        Ok(match (spec.platform, spec.kind) {
            (Platform::Video, TaskKind::LinkLookup) => Box::new(VideoLinkAdapter::new(
                self.backends.video.clone(),
                self.video_search_results,
            )),
            (Platform::Video, TaskKind::MetricLookup) => {
                Box::new(VideoMetricAdapter::new(self.backends.video.clone()))
            }
            (Platform::Audio, TaskKind::LinkLookup) => {
                let catalog = self.backends.audio.clone().ok_or_else(|| {
                    ConfigError::MissingCredentials(format!(
                        "{} needs SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET",
                        spec.label
                    ))
                })?;
                Box::new(AudioLinkAdapter::new(catalog))
            }
            (Platform::Audio, TaskKind::MetricLookup) => Box::new(AudioMetricAdapter::new(
                self.backends.page.clone(),
                self.element_wait.clone(),
            )),
        })
    }
}

/// Parse a selector from configuration.
pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::Invalid(format!("selector '{}': {:?}", selector, e)))
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory backends shared by the adapter and pipeline tests.

    use super::*;
    use crate::backends::{AudioCatalog, PageRenderer, PageSession, VideoBackend, VideoEntry};
    use std::collections::{HashMap, VecDeque};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };
    use url::Url;

    #[derive(Default)]
    pub struct FakeVideo {
        pub searches: HashMap<String, Vec<VideoEntry>>,
        pub metadata: HashMap<String, VideoEntry>,
    }

    #[async_trait]
    impl VideoBackend for FakeVideo {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<VideoEntry>, LookupFailure> {
            Ok(self.searches.get(query).cloned().unwrap_or_default())
        }

        async fn metadata(&self, url: &Url) -> Result<VideoEntry, LookupFailure> {
            self.metadata
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| LookupFailure::Backend(format!("video unavailable: {}", url)))
        }
    }

    #[derive(Default)]
    pub struct FakeCatalog {
        pub tracks: HashMap<(String, Option<String>), String>,
    }

    #[async_trait]
    impl AudioCatalog for FakeCatalog {
        async fn search_track(
            &self,
            song: &str,
            album: Option<&str>,
        ) -> Result<Option<String>, LookupFailure> {
            if song == "explode" {
                return Err(LookupFailure::Backend("catalog returned 500".into()));
            }
            Ok(self
                .tracks
                .get(&(song.to_string(), album.map(str::to_string)))
                .cloned())
        }
    }

    /// Serves canned pages; each URL yields its queue of responses in turn,
    /// repeating the last one.
    pub struct FakeRenderer {
        pub pages: Mutex<HashMap<String, VecDeque<Result<String, LookupFailure>>>>,
        pub opened: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
    }

    impl FakeRenderer {
        pub fn new(pages: Vec<(&str, Vec<Result<String, LookupFailure>>)>) -> Self {
            Self {
                pages: Mutex::new(
                    pages
                        .into_iter()
                        .map(|(u, r)| (u.to_string(), r.into_iter().collect()))
                        .collect(),
                ),
                opened: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl PageRenderer for Arc<FakeRenderer> {
        async fn open_session(&self) -> Result<Box<dyn PageSession>, LookupFailure> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                renderer: Arc::clone(self),
            }))
        }
    }

    pub struct FakeSession {
        renderer: Arc<FakeRenderer>,
    }

    #[async_trait]
    impl PageSession for FakeSession {
        async fn render(&mut self, url: &Url) -> Result<String, LookupFailure> {
            let mut pages = self.renderer.pages.lock().expect("pages lock");
            let queue = pages
                .get_mut(url.as_str())
                .ok_or_else(|| LookupFailure::Backend(format!("404 for {}", url)))?;
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_else(|| Ok(String::new()))
            } else {
                queue.front().cloned().unwrap_or_else(|| Ok(String::new()))
            }
        }
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.renderer.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::pipeline::task::OutputMode;
    use std::sync::Arc;
    use std::time::Duration;

    fn table(audio: bool) -> AdapterTable {
        let backends = Backends {
            video: Arc::new(FakeVideo::default()),
            audio: if audio {
                Some(Arc::new(FakeCatalog::default()))
            } else {
                None
            },
            page: Arc::new(Arc::new(FakeRenderer::new(vec![]))),
        };
        let wait = ElementWait::new(r#"[data-testid="playcount"]"#, Duration::from_secs(1), Duration::from_millis(10))
            .expect("valid selector");
        AdapterTable::new(backends, 1, wait)
    }

    fn spec(platform: Platform, kind: TaskKind) -> TaskSpec {
        TaskSpec::new(platform, kind, "S", &["Song"], "Out", OutputMode::CreateNew)
    }

    #[test]
    fn dispatches_every_platform_and_kind() {
        let t = table(true);
        let names: Vec<_> = [
            (Platform::Video, TaskKind::LinkLookup),
            (Platform::Video, TaskKind::MetricLookup),
            (Platform::Audio, TaskKind::LinkLookup),
            (Platform::Audio, TaskKind::MetricLookup),
        ]
        .into_iter()
        .map(|(p, k)| t.build(&spec(p, k)).map(|a| a.name()))
        .collect::<Result<_, _>>()
        .expect("all adapters build");
        assert_eq!(names, vec!["video-link", "video-metric", "audio-link", "audio-metric"]);
    }

    #[test]
    fn audio_link_without_credentials_is_config_error() {
        let t = table(false);
        let err = t
            .build(&spec(Platform::Audio, TaskKind::LinkLookup))
            .err()
            .expect("build fails");
        assert!(matches!(err, ConfigError::MissingCredentials(_)));
    }

    #[test]
    fn render_tags_failures_and_not_found() {
        assert_eq!(render(&Ok(LookupValue::NotFound)), Cell::from("Song Not Found"));
        assert_eq!(
            render(&Err(LookupFailure::Parse("playcount 'n/a' is not a number".into()))),
            Cell::from("Error: parse error: playcount 'n/a' is not a number")
        );
        assert_eq!(render(&Ok(LookupValue::Found(Cell::Number(3.0)))), Cell::Number(3.0));
    }

    #[test]
    fn long_failures_are_cut_and_still_export() -> anyhow::Result<()> {
        let stderr = "x".repeat(40_000);
        let cell = render(&Err(LookupFailure::Backend(stderr)));
        let Cell::Text(text) = &cell else {
            panic!("failure renders as text");
        };
        assert!(text.starts_with("Error: backend error: xxx"));
        assert!(text.ends_with('…'));
        assert_eq!(text.chars().count(), MAX_FAILURE_CHARS + 1);

        let mut t = crate::table::Table::new(["Links"]);
        t.push_row(vec![cell]);
        crate::export::assemble(&[("S", &t)])?;
        Ok(())
    }

    #[test]
    fn short_failures_are_untouched() {
        assert_eq!(truncate_chars("Error: timeout: slow".into(), 20), "Error: timeout: slow");
        assert_eq!(truncate_chars("ééé".into(), 2), "éé…");
    }

    #[test]
    fn placeholders_are_recognised() {
        assert!(is_placeholder("Song Not Found"));
        assert!(is_placeholder("Error: timeout: slow"));
        assert!(!is_placeholder("https://www.youtube.com/watch?v=a"));
    }
}
