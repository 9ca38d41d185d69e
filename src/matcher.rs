//! Fuzzy matching of YouTube video titles to tracklist entries.
//!
//! Video titles on Discogs are uploader-supplied and inconsistently formatted
//! (file extensions, "Official Video" tags, split artist credits on
//! compilations). Matching walks a cascade of tiers from the most literal
//! comparison to plain substring containment and keeps the best score over
//! the whole tracklist. Scores at or below [`MIN_SCORE`] are discarded.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use crate::models::{Release, Track};

pub const EXACT: f64 = 1.0;
pub const ACCENT_FOLDED: f64 = 0.95;
pub const CONTAINS_ARTIST_AND_TITLE: f64 = 0.9;
pub const FUZZY: f64 = 0.7;
pub const VARIOUS_TITLE_ONLY: f64 = 0.65;
pub const CONTAINMENT_WEIGHT: f64 = 0.8;
pub const MIN_SCORE: f64 = 0.5;

/// A tracklist entry paired with the score it was matched at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackMatch<'a> {
  pub track: &'a Track,
  pub score: f64,
  /// Set for the fuzzy and title-only tiers.
  pub uncertain: bool,
}

fn re(pattern: &str) -> Regex {
  Regex::new(pattern).expect("matcher pattern must compile")
}

static AUDIOSURF_PREFIX: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^audiosurf:\s*"));
static FILE_EXTENSION: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\.(mp4|avi|mov|wmv|flv|webm)$"));

/// The normalization pipeline, applied in order to lowercased text.
static NORMALIZE_STEPS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
  vec![
    (re(r"_"), " "),
    (re(r"\s*/\s*"), " "),
    (re(r"\s+versus\s+"), " "),
    (re(r"\s+vs\.?\s+"), " "),
    (re(r"\(official\s+(audio|video)\)"), ""),
    (re(r"\[official\s+video\]"), ""),
    (re(r"\((cd|vinyl\s+rip|rip)\)"), ""),
    (re(r"\([^)]*\)"), ""),
    (re(r"\[[^\]]*\]"), ""),
    (re(r"\b(the|a|an)\s+"), ""),
    (re(r"'"), ""),
  ]
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| re(r"\s+"));
static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| re(r"[^a-z0-9\s]"));
static FEATURING: LazyLock<Regex> = LazyLock::new(|| re(r"\s+(?:feat\.|ft\.|featuring)\s+[^-]*"));
static MIX_PARENS: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\([^)]*mix[^)]*\)"));

fn collapse(s: &str) -> String {
  WHITESPACE.replace_all(s, " ").trim().to_string()
}

/// Strip an Audiosurf prefix and a trailing media file extension.
pub fn clean_video_title(title: &str) -> String {
  let stripped = AUDIOSURF_PREFIX.replace(title, "");
  FILE_EXTENSION.replace(&stripped, "").trim().to_string()
}

/// Lowercase and drop separators, annotations, bracketed text, articles and apostrophes.
pub fn normalize(s: &str) -> String {
  let mut out = s.to_lowercase();
  for (pattern, replacement) in NORMALIZE_STEPS.iter() {
    out = pattern.replace_all(&out, *replacement).into_owned();
  }
  collapse(&out)
}

/// Remove diacritics, then anything outside `[a-z0-9\s]`. Expects lowercase input.
pub fn fold_accents(s: &str) -> String {
  let stripped: String = s.nfd().filter(|c| !('\u{0300}'..='\u{036f}').contains(c)).collect();
  collapse(&NON_ALNUM.replace_all(&stripped, ""))
}

/// Lowercase, with punctuation turned into spaces.
fn simplify(s: &str) -> String {
  collapse(&NON_ALNUM.replace_all(&s.to_lowercase(), " "))
}

fn strip_featuring(s: &str) -> String {
  collapse(&FEATURING.replace_all(s, " "))
}

/// Whether any release-level artist reads as "Various".
pub fn is_various_artists(release: &Release) -> bool {
  release.artists.iter().any(|a| a.name.to_lowercase().contains("various"))
}

/// `"<artist> - <title>"` as the video would ideally be titled.
fn expected_title(track: &Track, release: &Release, various: bool) -> String {
  let artist = if various && !track.artists.is_empty() {
    track.artists.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(" Vs. ")
  } else {
    release.artists.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
  };
  format!("{} - {}", artist, track.title)
}

/// Pre-computed forms of the video title shared across all tracks.
struct VideoForms {
  normalized: String,
  folded: String,
  fuzzy: String,
}

impl VideoForms {
  fn new(video_title: &str) -> Self {
    let normalized = normalize(&clean_video_title(video_title));
    let folded = fold_accents(&normalized);
    let fuzzy = fold_accents(&strip_featuring(&normalized));
    Self { normalized, folded, fuzzy }
  }
}

/// Score one track against the video. Returns `(score, uncertain)`.
fn score_track(video: &VideoForms, track: &Track, release: &Release, various: bool) -> Option<(f64, bool)> {
  let expected = expected_title(track, release, various);
  let normalized_expected = normalize(&expected);

  if video.normalized == normalized_expected {
    return Some((EXACT, false));
  }

  let folded_expected = fold_accents(&normalized_expected);
  if video.folded == folded_expected {
    return Some((ACCENT_FOLDED, false));
  }

  let track_part = simplify(&track.title);
  let artist_part = simplify(expected.split(" - ").next().unwrap_or_default());
  if !track_part.is_empty() && video.folded.contains(&track_part) && video.folded.contains(&artist_part) {
    return Some((CONTAINS_ARTIST_AND_TITLE, false));
  }

  if video.fuzzy == fold_accents(&strip_featuring(&normalized_expected)) {
    return Some((FUZZY, true));
  }

  if various {
    let title_only = fold_accents(MIX_PARENS.replace_all(&track.title.to_lowercase(), "").trim());
    if !title_only.is_empty() && video.fuzzy == title_only {
      return Some((VARIOUS_TITLE_ONLY, true));
    }
  }

  if track_part.is_empty() || video.folded.is_empty() {
    return None;
  }
  if video.folded.contains(&track_part) || track_part.contains(&video.folded) {
    let (a, b) = (track_part.len() as f64, video.folded.len() as f64);
    return Some((a.min(b) / a.max(b) * CONTAINMENT_WEIGHT, false));
  }
  None
}

/// Find the tracklist entry a video most likely corresponds to.
pub fn match_track<'a>(video_title: &str, tracklist: &'a [Track], release: &Release) -> Option<TrackMatch<'a>> {
  if video_title.trim().is_empty() {
    return None;
  }
  let various = is_various_artists(release);
  let video = VideoForms::new(video_title);

  let mut best: Option<TrackMatch<'a>> = None;
  for track in tracklist.iter().filter(|t| !t.title.is_empty()) {
    let Some((score, uncertain)) = score_track(&video, track, release, various) else { continue };
    if best.is_none_or(|b| score > b.score) {
      best = Some(TrackMatch { track, score, uncertain });
    }
    if score >= EXACT {
      break;
    }
  }

  best.filter(|m| m.score > MIN_SCORE)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{Artist, TrackArtist};

  fn track(position: &str, title: &str) -> Track {
    Track { position: position.to_string(), title: title.to_string(), ..Default::default() }
  }

  fn track_by(position: &str, title: &str, artists: &[&str]) -> Track {
    Track {
      artists: artists.iter().map(|n| TrackArtist { name: n.to_string(), ..Default::default() }).collect(),
      ..track(position, title)
    }
  }

  fn release(artists: &[&str], tracklist: Vec<Track>) -> Release {
    Release {
      id: 1,
      artists: artists.iter().map(|n| Artist { name: n.to_string(), ..Default::default() }).collect(),
      tracklist,
      ..Default::default()
    }
  }

  fn best<'a>(title: &str, r: &'a Release) -> Option<TrackMatch<'a>> {
    match_track(title, &r.tracklist, r)
  }

  // --- normalization ---

  #[test]
  fn clean_strips_prefix_and_extension() {
    assert_eq!(clean_video_title("Audiosurf: Artist - Song.mp4"), "Artist - Song");
    assert_eq!(clean_video_title("AUDIOSURF:Song.WEBM"), "Song");
    assert_eq!(clean_video_title("Song.mp3"), "Song.mp3");
  }

  #[test]
  fn normalize_drops_annotations() {
    assert_eq!(normalize("The Artist - Song (Official Video)"), "artist - song");
    assert_eq!(normalize("Artist - Song [HD] (Vinyl Rip)"), "artist - song");
    assert_eq!(normalize("A vs. B / C versus D - Trippin'"), "b c d - trippin");
    assert_eq!(normalize("dj_shadow  -  organ   donor"), "dj shadow - organ donor");
  }

  #[test]
  fn fold_accents_strips_diacritics_and_punctuation() {
    assert_eq!(fold_accents("beyoncé - déjà vu!"), "beyonce deja vu");
    assert_eq!(fold_accents("sigur rós"), "sigur ros");
  }

  // --- tiers ---

  #[test]
  fn exact_match() {
    let r = release(&["Artist"], vec![track("A1", "Song Title")]);
    let m = best("Artist - Song Title", &r).unwrap();
    assert_eq!(m.track.position, "A1");
    assert!(m.score >= 0.95);
    assert!(!m.uncertain);
  }

  #[test]
  fn exact_match_ignores_official_video_tag() {
    let r = release(&["Artist"], vec![track("A1", "Other"), track("A2", "Song")]);
    let m = best("Artist - Song (Official Video).mp4", &r).unwrap();
    assert_eq!(m.track.position, "A2");
    assert_eq!(m.score, EXACT);
  }

  #[test]
  fn accent_folded_match() {
    let r = release(&["Björk"], vec![track("1", "Jóga")]);
    let m = best("Bjork - Joga", &r).unwrap();
    assert_eq!(m.score, ACCENT_FOLDED);
  }

  #[test]
  fn contains_artist_and_title() {
    let r = release(&["Artist"], vec![track("B2", "Night Drive")]);
    let m = best("Artist - Night Drive live at the BBC 1983", &r).unwrap();
    assert_eq!(m.track.position, "B2");
    assert_eq!(m.score, CONTAINS_ARTIST_AND_TITLE);
  }

  #[test]
  fn fuzzy_match_strips_featuring_and_is_uncertain() {
    let r = release(&["Artist"], vec![track("A1", "Don't Stop")]);
    let m = best("Artist feat. Guest - Don't Stop", &r).unwrap();
    assert_eq!(m.score, FUZZY);
    assert!(m.uncertain);
  }

  #[test]
  fn bare_feat_word_is_not_a_credit() {
    let r = release(&["Artist"], vec![track("A1", "Feat of Clay")]);
    assert!(best("Artist - Feat of Strength", &r).is_none());
    assert_eq!(strip_featuring("artist - feat of strength"), "artist - feat of strength");
    assert_eq!(strip_featuring("artist ft. guest - song"), "artist - song");
  }

  #[test]
  fn various_artists_use_track_credits() {
    let r = release(
      &["Various"],
      vec![track_by("1", "First", &["Alpha"]), track_by("2", "Second", &["Beta", "Gamma"])],
    );
    let m = best("Beta vs Gamma - Second", &r).unwrap();
    assert_eq!(m.track.position, "2");
    assert_eq!(m.score, EXACT);
  }

  #[test]
  fn various_artists_title_only_is_uncertain() {
    let r = release(&["Various"], vec![track_by("1", "Solar Wind (Club Remix)", &["Someone"])]);
    let m = best("Solar Wind", &r).unwrap();
    assert_eq!(m.score, VARIOUS_TITLE_ONLY);
    assert!(m.uncertain);
  }

  #[test]
  fn containment_fallback_scales_with_length() {
    let r = release(&["Artist"], vec![track("A1", "Blue Monday")]);
    // "blue monday 88" vs "blue monday": 11/14 * 0.8 ≈ 0.63
    let m = best("Blue Monday 88", &r).unwrap();
    assert!(m.score > MIN_SCORE && m.score < FUZZY, "{}", m.score);
  }

  #[test]
  fn weak_containment_is_rejected() {
    let r = release(&["Artist"], vec![track("A1", "Go")]);
    assert!(best("Go Go Go Go Go Go", &r).is_none());
  }

  #[test]
  fn noise_does_not_match() {
    let r = release(&["Artist"], vec![track("A1", "Song Title"), track("A2", "Another")]);
    assert!(best("randomnoise.mp4", &r).is_none());
  }

  #[test]
  fn empty_inputs() {
    let r = release(&["Artist"], vec![track("A1", "Song")]);
    assert!(best("", &r).is_none());
    assert!(match_track("Artist - Song", &[], &r).is_none());
    let untitled = release(&["Artist"], vec![track("A1", "")]);
    assert!(best("Artist - Song", &untitled).is_none());
  }

  #[test]
  fn exact_beats_later_partial() {
    let r = release(&["Artist"], vec![track("A1", "Song"), track("A2", "Song Song")]);
    let m = best("Artist - Song", &r).unwrap();
    assert_eq!(m.track.position, "A1");
  }

  #[test]
  fn is_deterministic() {
    let r = release(&["Artist"], vec![track("A1", "One"), track("A2", "Two")]);
    assert_eq!(best("Artist - Two", &r), best("Artist - Two", &r));
  }
}
