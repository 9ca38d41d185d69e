//! YouTube videos pulled out of Discogs release payloads.
//!
//! Videos come from the release's `videos` array, deduplicated by the
//! 11-character video id; the first occurrence wins.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::models::Release;

/// Long-form `watch?v=` and short-form `youtu.be/` links.
static VIDEO_ID: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/)([A-Za-z0-9_-]{11})").expect("video id pattern must compile"));

/// A playable YouTube video attached to a release. Identity is the video id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
  pub id: String,
  pub title: String,
  pub description: String,
}

impl Video {
  pub fn watch_url(&self) -> String {
    watch_url(&self.id)
  }
}

pub fn watch_url(video_id: &str) -> String {
  format!("https://youtube.com/watch?v={}", video_id)
}

/// Extract the 11-character video id from a YouTube URI.
pub fn video_id(uri: &str) -> Option<&str> {
  if !(uri.contains("youtube.com") || uri.contains("youtu.be")) {
    return None;
  }
  VIDEO_ID.captures(uri).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Unique YouTube videos of a release in source order; the first occurrence of an id wins.
pub fn extract_videos(release: &Release) -> Vec<Video> {
  let mut seen = HashSet::new();
  release
    .videos
    .iter()
    .filter_map(|raw| Some((raw, video_id(&raw.uri)?)))
    .filter(|(_, id)| seen.insert(id.to_string()))
    .map(|(raw, id)| Video {
      id: id.to_string(),
      title: if raw.title.is_empty() { "Untitled".to_string() } else { raw.title.clone() },
      description: raw.description.clone(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::RawVideo;

  fn raw(uri: &str, title: &str) -> RawVideo {
    RawVideo { uri: uri.to_string(), title: title.to_string(), ..Default::default() }
  }

  fn release(videos: Vec<RawVideo>) -> Release {
    Release { id: 1, videos, ..Default::default() }
  }

  fn ids(videos: &[Video]) -> Vec<&str> {
    videos.iter().map(|v| v.id.as_str()).collect()
  }

  #[test]
  fn video_id_long_form() {
    assert_eq!(video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
    assert_eq!(video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"), Some("dQw4w9WgXcQ"));
    assert_eq!(video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
  }

  #[test]
  fn video_id_short_form() {
    assert_eq!(video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), Some("dQw4w9WgXcQ"));
  }

  #[test]
  fn video_id_rejects_other_hosts() {
    assert_eq!(video_id("https://vimeo.com/watch?v=dQw4w9WgXcQ"), None);
    assert_eq!(video_id("https://www.youtube.com/channel/UC123"), None);
    assert_eq!(video_id(""), None);
  }

  #[test]
  fn extract_dedupes_keeping_first() {
    let r = release(vec![
      raw("https://www.youtube.com/watch?v=AAAAAAAAAAA", "first"),
      raw("https://www.youtube.com/watch?v=AAAAAAAAAAA", "second"),
      raw("https://www.youtube.com/watch?v=BBBBBBBBBBB", "third"),
    ]);
    let videos = extract_videos(&r);
    assert_eq!(ids(&videos), ["AAAAAAAAAAA", "BBBBBBBBBBB"]);
    assert_eq!(videos[0].title, "first");
  }

  #[test]
  fn extract_is_stable_under_rerun() {
    let r = release(vec![
      raw("https://youtu.be/BBBBBBBBBBB", "b"),
      raw("https://www.youtube.com/watch?v=AAAAAAAAAAA", "a"),
      raw("https://youtu.be/BBBBBBBBBBB", "b again"),
    ]);
    assert_eq!(extract_videos(&r), extract_videos(&r));
    assert_eq!(ids(&extract_videos(&r)), ["BBBBBBBBBBB", "AAAAAAAAAAA"]);
  }

  #[test]
  fn extract_defaults_title_and_skips_non_youtube() {
    let r = release(vec![raw("https://vimeo.com/1", "vimeo"), raw("https://www.youtube.com/watch?v=CCCCCCCCCCC", "")]);
    let videos = extract_videos(&r);
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].title, "Untitled");
    assert_eq!(videos[0].watch_url(), "https://youtube.com/watch?v=CCCCCCCCCCC");
  }

  #[test]
  fn extract_empty_release() {
    assert!(extract_videos(&Release::default()).is_empty());
  }
}
