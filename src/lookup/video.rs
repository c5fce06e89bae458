// src/lookup/video.rs

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::{is_placeholder, LookupAdapter, LookupResult, LookupValue};
use crate::backends::{VideoBackend, VideoEntry};
use crate::errors::LookupFailure;
use crate::table::Cell;

/// song (+ album) -> link of the most viewed search hit.
pub struct VideoLinkAdapter {
    backend: Arc<dyn VideoBackend>,
    search_results: usize,
}

impl VideoLinkAdapter {
    pub fn new(backend: Arc<dyn VideoBackend>, search_results: usize) -> Self {
        Self {
            backend,
            search_results,
        }
    }
}

#[async_trait]
impl LookupAdapter for VideoLinkAdapter {
    fn name(&self) -> &'static str {
        "video-link"
    }

    async fn lookup(&mut self, inputs: &[String]) -> LookupResult {
        let query = inputs.join(" ");
        let entries = self.backend.search(&query, self.search_results).await?;
        debug!(%query, candidates = entries.len(), "video search");
        Ok(match most_viewed(&entries) {
            Some(url) => LookupValue::Found(Cell::Text(url.to_string())),
            None => LookupValue::NotFound,
        })
    }
}

/// First candidate with the highest view count; missing counts rank as zero.
fn most_viewed(entries: &[VideoEntry]) -> Option<&str> {
    entries
        .iter()
        .filter_map(|e| Some((e.webpage_url.as_deref()?, e.view_count.unwrap_or(0))))
        .fold(None::<(&str, u64)>, |best, (url, views)| match best {
            Some((_, top)) if top >= views => best,
            _ => Some((url, views)),
        })
        .map(|(url, _)| url)
}

/// link -> rendered view count.
pub struct VideoMetricAdapter {
    backend: Arc<dyn VideoBackend>,
}

impl VideoMetricAdapter {
    pub fn new(backend: Arc<dyn VideoBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl LookupAdapter for VideoMetricAdapter {
    fn name(&self) -> &'static str {
        "video-metric"
    }

    async fn lookup(&mut self, inputs: &[String]) -> LookupResult {
        let url = parse_link(&inputs[0])?;
        let entry = self.backend.metadata(&url).await?;
        let views = entry
            .view_count
            .ok_or_else(|| LookupFailure::Backend(format!("no view count in metadata for {}", url)))?;
        Ok(LookupValue::Found(Cell::Text(format_view_count(views))))
    }
}

/// `2.5M` at a million and above, otherwise whole thousands (`850K`, `0K`).
pub fn format_view_count(views: u64) -> String {
    if views >= 1_000_000 {
        format!("{:.1}M", views as f64 / 1_000_000.0)
    } else {
        format!("{}K", views / 1_000)
    }
}

/// Validate a link cell before it is handed to a backend.
pub(crate) fn parse_link(raw: &str) -> Result<Url, LookupFailure> {
    if is_placeholder(raw) {
        return Err(LookupFailure::InvalidInput(format!(
            "no link to look up ('{}')",
            raw
        )));
    }
    let url = Url::parse(raw)
        .map_err(|e| LookupFailure::InvalidInput(format!("malformed URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LookupFailure::InvalidInput(format!(
            "unsupported URL scheme '{}' in '{}'",
            other, raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::fakes::FakeVideo;

    fn entry(url: &str, views: Option<u64>) -> VideoEntry {
        VideoEntry {
            title: None,
            webpage_url: Some(url.to_string()),
            view_count: views,
        }
    }

    #[test]
    fn view_count_rendering() {
        assert_eq!(format_view_count(2_500_000), "2.5M");
        assert_eq!(format_view_count(850_000), "850K");
        assert_eq!(format_view_count(1_000_000), "1.0M");
        assert_eq!(format_view_count(999_999), "999K");
        assert_eq!(format_view_count(999), "0K");
    }

    #[test]
    fn most_viewed_prefers_first_on_ties() {
        let entries = vec![
            entry("https://y/a", Some(10)),
            entry("https://y/b", Some(30)),
            entry("https://y/c", Some(30)),
            entry("https://y/d", None),
        ];
        assert_eq!(most_viewed(&entries), Some("https://y/b"));
        assert_eq!(most_viewed(&[]), None);
    }

    #[tokio::test]
    async fn link_lookup_queries_song_and_album() {
        let mut video = FakeVideo::default();
        video.searches.insert(
            "Tum Hi Ho Aashiqui 2".into(),
            vec![entry("https://y/lyric", Some(5)), entry("https://y/official", Some(900))],
        );
        let mut adapter = VideoLinkAdapter::new(Arc::new(video), 2);

        let found = adapter.lookup(&["Tum Hi Ho".into(), "Aashiqui 2".into()]).await;
        assert_eq!(found, Ok(LookupValue::Found(Cell::from("https://y/official"))));

        let missing = adapter.lookup(&["Unknown".into()]).await;
        assert_eq!(missing, Ok(LookupValue::NotFound));
    }

    #[tokio::test]
    async fn metric_lookup_formats_views() {
        let mut video = FakeVideo::default();
        video
            .metadata
            .insert("https://www.youtube.com/watch?v=a".into(), entry("https://www.youtube.com/watch?v=a", Some(2_500_000)));
        video
            .metadata
            .insert("https://www.youtube.com/watch?v=b".into(), entry("https://www.youtube.com/watch?v=b", None));
        let mut adapter = VideoMetricAdapter::new(Arc::new(video));

        assert_eq!(
            adapter.lookup(&["https://www.youtube.com/watch?v=a".into()]).await,
            Ok(LookupValue::Found(Cell::from("2.5M")))
        );
        assert!(matches!(
            adapter.lookup(&["https://www.youtube.com/watch?v=b".into()]).await,
            Err(LookupFailure::Backend(_))
        ));
        assert!(matches!(
            adapter.lookup(&["https://www.youtube.com/watch?v=gone".into()]).await,
            Err(LookupFailure::Backend(_))
        ));
    }

    #[tokio::test]
    async fn metric_lookup_rejects_malformed_links() {
        let mut adapter = VideoMetricAdapter::new(Arc::new(FakeVideo::default()));
        for bad in ["not a url", "ftp://host/file", "Song Not Found", "Error: timeout: slow"] {
            assert!(
                matches!(adapter.lookup(&[bad.to_string()]).await, Err(LookupFailure::InvalidInput(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
