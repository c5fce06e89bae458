// src/lookup/audio.rs

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use super::video::parse_link;
use super::{parse_selector, LookupAdapter, LookupResult, LookupValue};
use crate::backends::{AudioCatalog, PageRenderer, PageSession};
use crate::errors::{ConfigError, LookupFailure};
use crate::table::Cell;

/// Grouping characters a rendered play count may contain.
static DIGIT_GROUPING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,.'\u{00A0}\u{202F}]").expect("static regex"));

/// song (+ album) -> canonical track link.
pub struct AudioLinkAdapter {
    catalog: Arc<dyn AudioCatalog>,
}

impl AudioLinkAdapter {
    pub fn new(catalog: Arc<dyn AudioCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl LookupAdapter for AudioLinkAdapter {
    fn name(&self) -> &'static str {
        "audio-link"
    }

    async fn lookup(&mut self, inputs: &[String]) -> LookupResult {
        let song = inputs[0].as_str();
        let album = inputs.get(1).map(String::as_str);
        Ok(match self.catalog.search_track(song, album).await? {
            Some(url) => LookupValue::Found(Cell::Text(url)),
            None => LookupValue::NotFound,
        })
    }
}

/// How long to wait for the play count element, and how often to look.
#[derive(Debug, Clone)]
pub struct ElementWait {
    selector: Selector,
    timeout: Duration,
    poll: Duration,
}

impl ElementWait {
    pub fn new(selector: &str, timeout: Duration, poll: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            selector: parse_selector(selector)?,
            timeout,
            poll,
        })
    }
}

/// track link -> play count scraped from the rendered track page.
///
/// The page session is opened on the first lookup and kept for the rest of
/// the task; it is released when the adapter is dropped.
pub struct AudioMetricAdapter {
    renderer: Arc<dyn PageRenderer>,
    wait: ElementWait,
    session: Option<Box<dyn PageSession>>,
}

impl AudioMetricAdapter {
    pub fn new(renderer: Arc<dyn PageRenderer>, wait: ElementWait) -> Self {
        Self {
            renderer,
            wait,
            session: None,
        }
    }

    async fn session(&mut self) -> Result<&mut Box<dyn PageSession>, LookupFailure> {
        if self.session.is_none() {
            self.session = Some(self.renderer.open_session().await?);
        }
        self.session
            .as_mut()
            .ok_or_else(|| LookupFailure::Backend("page session unavailable".into()))
    }
}

#[async_trait]
impl LookupAdapter for AudioMetricAdapter {
    fn name(&self) -> &'static str {
        "audio-metric"
    }

    async fn lookup(&mut self, inputs: &[String]) -> LookupResult {
        let url = parse_link(&inputs[0])?;
        let wait = self.wait.clone();
        let deadline = Instant::now() + wait.timeout;
        let session = self.session().await?;

        loop {
            let html = session.render(&url).await?;
            if let Some(text) = extract_text(&html, &wait.selector) {
                debug!(%url, raw = %text, "play count element found");
                return parse_play_count(&text).map(|n| LookupValue::Found(Cell::Number(n as f64)));
            }
            if Instant::now() + wait.poll > deadline {
                return Err(LookupFailure::Timeout(format!(
                    "play count did not appear within {}s",
                    wait.timeout.as_secs()
                )));
            }
            trace!(%url, "play count not rendered yet");
            sleep(wait.poll).await;
        }
    }
}

/// Text of the first element matching `selector`, if it has any.
fn extract_text(html: &str, selector: &Selector) -> Option<String> {
    let doc = Html::parse_document(html);
    let text = doc
        .select(selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// `1,234,567`, `1.234.567` and `1 234 567` all read as 1234567.
pub fn parse_play_count(raw: &str) -> Result<u64, LookupFailure> {
    let digits = DIGIT_GROUPING.replace_all(raw, "");
    digits
        .parse::<u64>()
        .map_err(|_| LookupFailure::Parse(format!("play count '{}' is not a number", raw.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::fakes::{FakeCatalog, FakeRenderer};
    use std::sync::atomic::Ordering;

    const TRACK: &str = "https://open.spotify.com/track/abc";
    const SELECTOR: &str = r#"[data-testid="playcount"]"#;

    fn wait(timeout_ms: u64) -> ElementWait {
        ElementWait::new(SELECTOR, Duration::from_millis(timeout_ms), Duration::from_millis(10))
            .expect("valid selector")
    }

    fn page(count: &str) -> Result<String, LookupFailure> {
        Ok(format!(
            r#"<html><body><span data-testid="playcount">{}</span></body></html>"#,
            count
        ))
    }

    #[test]
    fn play_count_separators() {
        assert_eq!(parse_play_count("1,234,567"), Ok(1_234_567));
        assert_eq!(parse_play_count("1.234.567"), Ok(1_234_567));
        assert_eq!(parse_play_count("1\u{202F}234\u{00A0}567"), Ok(1_234_567));
        assert_eq!(parse_play_count(" 42 "), Ok(42));
        assert!(matches!(parse_play_count("n/a"), Err(LookupFailure::Parse(_))));
    }

    #[test]
    fn bad_selector_is_config_error() {
        let err = ElementWait::new("[[", Duration::from_secs(1), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn link_lookup_passes_album_through() {
        let mut catalog = FakeCatalog::default();
        catalog.tracks.insert(
            ("Tum Hi Ho".into(), Some("Aashiqui 2".into())),
            "https://open.spotify.com/track/tum".into(),
        );
        let mut adapter = AudioLinkAdapter::new(Arc::new(catalog));

        assert_eq!(
            adapter.lookup(&["Tum Hi Ho".into(), "Aashiqui 2".into()]).await,
            Ok(LookupValue::Found(Cell::from("https://open.spotify.com/track/tum")))
        );
        assert_eq!(adapter.lookup(&["Tum Hi Ho".into()]).await, Ok(LookupValue::NotFound));
        assert!(matches!(
            adapter.lookup(&["explode".into()]).await,
            Err(LookupFailure::Backend(_))
        ));
    }

    #[tokio::test]
    async fn metric_waits_for_element_then_parses() {
        let renderer = Arc::new(FakeRenderer::new(vec![(
            TRACK,
            vec![Ok("<html><body>loading</body></html>".into()), page("1,234,567")],
        )]));
        let mut adapter = AudioMetricAdapter::new(Arc::new(renderer.clone()), wait(1000));

        assert_eq!(
            adapter.lookup(&[TRACK.into()]).await,
            Ok(LookupValue::Found(Cell::Number(1_234_567.0)))
        );
    }

    #[tokio::test]
    async fn metric_times_out_when_element_never_appears() {
        let renderer = Arc::new(FakeRenderer::new(vec![(
            TRACK,
            vec![Ok("<html><body>still loading</body></html>".into())],
        )]));
        let mut adapter = AudioMetricAdapter::new(Arc::new(renderer.clone()), wait(50));

        assert!(matches!(
            adapter.lookup(&[TRACK.into()]).await,
            Err(LookupFailure::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn unparseable_count_is_parse_error() {
        let renderer = Arc::new(FakeRenderer::new(vec![(TRACK, vec![page("lots")])]));
        let mut adapter = AudioMetricAdapter::new(Arc::new(renderer.clone()), wait(200));
        assert!(matches!(
            adapter.lookup(&[TRACK.into()]).await,
            Err(LookupFailure::Parse(_))
        ));
    }

    #[tokio::test]
    async fn session_opens_once_and_is_released_on_drop() {
        let renderer = Arc::new(FakeRenderer::new(vec![(TRACK, vec![page("7")])]));
        let mut adapter = AudioMetricAdapter::new(Arc::new(renderer.clone()), wait(200));

        // invalid links never touch the renderer
        assert!(matches!(
            adapter.lookup(&["Song Not Found".into()]).await,
            Err(LookupFailure::InvalidInput(_))
        ));
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 0);

        for _ in 0..3 {
            assert_eq!(
                adapter.lookup(&[TRACK.into()]).await,
                Ok(LookupValue::Found(Cell::Number(7.0)))
            );
        }
        assert_eq!(renderer.opened.load(Ordering::SeqCst), 1);
        assert_eq!(renderer.released.load(Ordering::SeqCst), 0);

        drop(adapter);
        assert_eq!(renderer.released.load(Ordering::SeqCst), 1);
    }
}
