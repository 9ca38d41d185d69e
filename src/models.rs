use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

// --- API response types ---

/// Which of the user's lists a sample is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
  #[default]
  Collection,
  Wantlist,
}

impl ListKind {
  pub fn label(self) -> &'static str {
    match self {
      ListKind::Collection => "collection",
      ListKind::Wantlist => "wantlist",
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      ListKind::Collection => ListKind::Wantlist,
      ListKind::Wantlist => ListKind::Collection,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Artist {
  pub id: u64,
  pub name: String,
  /// Artist name variation, as credited on this release.
  pub anv: String,
  pub join: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Label {
  pub name: String,
  pub catno: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Format {
  pub name: String,
  pub qty: String,
  pub descriptions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Image {
  pub uri: String,
  #[serde(rename = "type")]
  pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Track {
  pub position: String,
  pub title: String,
  pub duration: String,
  #[serde(rename = "type_")]
  pub kind: String,
  pub artists: Vec<TrackArtist>,
}

/// Per-track artist credit (only present on compilations and splits).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackArtist {
  pub name: String,
  pub anv: String,
  pub join: String,
}

/// A raw entry of a release's `videos` array, before YouTube extraction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawVideo {
  pub uri: String,
  pub title: String,
  pub description: String,
  pub duration: Option<u32>,
  pub embed: bool,
}

/// Full release details from `/releases/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Release {
  pub id: u64,
  pub title: String,
  pub artists: Vec<Artist>,
  /// Discogs reports unknown years as `0`.
  pub year: i32,
  pub country: Option<String>,
  pub labels: Vec<Label>,
  pub formats: Vec<Format>,
  pub genres: Vec<String>,
  pub styles: Vec<String>,
  pub images: Vec<Image>,
  pub tracklist: Vec<Track>,
  pub videos: Vec<RawVideo>,
}

impl Release {
  pub fn artist_line(&self) -> String {
    format_artists(&self.artists)
  }

  pub fn year_label(&self) -> Option<String> {
    (self.year > 0).then(|| self.year.to_string())
  }

  /// Primary image if tagged, otherwise the first one.
  pub fn cover_uri(&self) -> Option<&str> {
    self
      .images
      .iter()
      .find(|i| i.kind == "primary")
      .or_else(|| self.images.first())
      .map(|i| i.uri.as_str())
      .filter(|u| !u.is_empty())
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pagination {
  pub page: u32,
  pub pages: u32,
  pub per_page: u32,
  pub items: u32,
}

/// One page of `/users/{u}/collection/folders/0/releases` or `/users/{u}/wants`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListPage {
  pub pagination: Pagination,
  #[serde(alias = "releases", alias = "wants")]
  pub entries: Vec<CollectionEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BasicInformation {
  pub id: u64,
  pub title: String,
  pub year: i32,
  pub artists: Vec<Artist>,
}

/// Numbered collection field. Discogs ships three by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteField {
  MediaCondition,
  SleeveCondition,
  Notes,
}

impl NoteField {
  pub fn id(self) -> u32 {
    match self {
      NoteField::MediaCondition => 1,
      NoteField::SleeveCondition => 2,
      NoteField::Notes => 3,
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      NoteField::MediaCondition => "media condition",
      NoteField::SleeveCondition => "sleeve condition",
      NoteField::Notes => "notes",
    }
  }
}

/// Grading vocabulary offered for the media and sleeve fields.
pub const CONDITIONS: [&str; 10] = [
  "Generic",
  "No Cover",
  "Mint (M)",
  "Near Mint (NM or M-)",
  "Very Good Plus (VG+)",
  "Very Good (VG)",
  "Good Plus (G+)",
  "Good (G)",
  "Fair (F)",
  "Poor (P)",
];

pub const NOT_SPECIFIED: &str = "Not specified";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Note {
  pub field_id: u32,
  pub value: String,
}

/// The user's join entity for a release: a collection instance or a want.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectionEntry {
  pub id: u64,
  pub instance_id: Option<u64>,
  pub rating: u8,
  #[serde(deserialize_with = "deserialize_notes")]
  pub notes: Vec<Note>,
  pub basic_information: Option<BasicInformation>,
}

impl CollectionEntry {
  pub fn release_id(&self) -> Option<u64> {
    if self.id != 0 {
      return Some(self.id);
    }
    self.basic_information.as_ref().map(|b| b.id).filter(|id| *id != 0)
  }

  pub fn note(&self, field: NoteField) -> Option<&str> {
    self.notes.iter().find(|n| n.field_id == field.id()).map(|n| n.value.as_str())
  }

  /// Condition text for display, `Not specified` when unset.
  pub fn condition(&self, field: NoteField) -> &str {
    self.note(field).unwrap_or(NOT_SPECIFIED)
  }

  /// Insert or replace a field value.
  pub fn set_note(&mut self, field: NoteField, value: &str) {
    match self.notes.iter_mut().find(|n| n.field_id == field.id()) {
      Some(note) => note.value = value.to_string(),
      None => self.notes.push(Note { field_id: field.id(), value: value.to_string() }),
    }
  }
}

/// Collection entries carry notes as `[{field_id, value}]`; wants carry a plain string.
fn deserialize_notes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Note>, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum NotesRepr {
    Fields(Vec<Note>),
    Text(String),
  }

  Ok(match Option::<NotesRepr>::deserialize(deserializer)? {
    Some(NotesRepr::Fields(notes)) => notes,
    Some(NotesRepr::Text(text)) if !text.is_empty() => {
      vec![Note { field_id: NoteField::Notes.id(), value: text }]
    }
    _ => Vec::new(),
  })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Price {
  pub value: f64,
  pub currency: String,
}

/// `/marketplace/stats/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketplaceStats {
  pub lowest_price: Option<Price>,
  pub num_for_sale: Option<u32>,
  pub blocked_from_sale: bool,
}

impl MarketplaceStats {
  pub fn summary(&self) -> String {
    if self.blocked_from_sale {
      return "blocked from sale".to_string();
    }
    match (&self.lowest_price, self.num_for_sale) {
      (Some(p), Some(n)) if n > 0 => format!("{} for sale from {:.2} {}", n, p.value, p.currency),
      _ => "none for sale".to_string(),
    }
  }
}

// --- Display helpers ---

/// Format artist credits into a display string.
/// Uses `anv` when present, otherwise `name`, and keeps Discogs' `join` strings.
pub fn format_artists(artists: &[Artist]) -> String {
  if artists.is_empty() {
    return "Unknown Artist".to_string();
  }
  artists
    .iter()
    .map(|a| {
      let name = if a.anv.is_empty() { &a.name } else { &a.anv };
      if a.join.is_empty() { name.clone() } else { format!("{} {}", name, a.join) }
    })
    .collect::<Vec<_>>()
    .join(" ")
    .trim()
    .to_string()
}

/// Distinct format names in first-seen order, e.g. `Vinyl, CD`.
pub fn unique_formats(formats: &[Format]) -> String {
  if formats.is_empty() {
    return "Unknown".to_string();
  }
  let mut seen = BTreeSet::new();
  formats.iter().filter(|f| seen.insert(f.name.as_str())).map(|f| f.name.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collection_page_parses_field_notes() {
    let json = r#"{
      "pagination": {"page": 1, "pages": 3, "per_page": 100, "items": 250},
      "releases": [{
        "id": 42, "instance_id": 7, "rating": 4,
        "notes": [{"field_id": 1, "value": "Mint (M)"}, {"field_id": 3, "value": "gift"}],
        "basic_information": {"id": 42, "title": "T", "year": 1999, "artists": []}
      }]
    }"#;
    let page: ListPage = serde_json::from_str(json).unwrap();
    assert_eq!(page.pagination.pages, 3);
    assert_eq!(page.pagination.items, 250);
    let entry = &page.entries[0];
    assert_eq!(entry.instance_id, Some(7));
    assert_eq!(entry.rating, 4);
    assert_eq!(entry.condition(NoteField::MediaCondition), "Mint (M)");
    assert_eq!(entry.condition(NoteField::SleeveCondition), NOT_SPECIFIED);
    assert_eq!(entry.note(NoteField::Notes), Some("gift"));
  }

  #[test]
  fn wantlist_page_parses_string_notes() {
    let json = r#"{
      "pagination": {"page": 1, "pages": 1, "per_page": 100, "items": 1},
      "wants": [{"id": 9, "rating": 0, "notes": "look for the red vinyl", "basic_information": {"id": 9}}]
    }"#;
    let page: ListPage = serde_json::from_str(json).unwrap();
    let entry = &page.entries[0];
    assert_eq!(entry.instance_id, None);
    assert_eq!(entry.note(NoteField::Notes), Some("look for the red vinyl"));
  }

  #[test]
  fn release_id_falls_back_to_basic_information() {
    let entry = CollectionEntry {
      basic_information: Some(BasicInformation { id: 55, ..Default::default() }),
      ..Default::default()
    };
    assert_eq!(entry.release_id(), Some(55));
    assert_eq!(CollectionEntry::default().release_id(), None);
  }

  #[test]
  fn set_note_upserts() {
    let mut entry = CollectionEntry::default();
    entry.set_note(NoteField::SleeveCondition, "Good (G)");
    entry.set_note(NoteField::SleeveCondition, "Fair (F)");
    assert_eq!(entry.notes.len(), 1);
    assert_eq!(entry.condition(NoteField::SleeveCondition), "Fair (F)");
  }

  #[test]
  fn release_tolerates_missing_fields() {
    let release: Release = serde_json::from_str(r#"{"id": 1, "title": "Bare"}"#).unwrap();
    assert!(release.tracklist.is_empty());
    assert!(release.videos.is_empty());
    assert_eq!(release.year_label(), None);
    assert_eq!(release.artist_line(), "Unknown Artist");
  }

  #[test]
  fn format_artists_uses_anv_and_join() {
    let artists = vec![
      Artist { name: "Artist One (2)".into(), anv: "Artist One".into(), join: "&".into(), ..Default::default() },
      Artist { name: "Two".into(), ..Default::default() },
    ];
    assert_eq!(format_artists(&artists), "Artist One & Two");
  }

  #[test]
  fn unique_formats_dedupes_in_order() {
    let formats = vec![
      Format { name: "Vinyl".into(), ..Default::default() },
      Format { name: "CD".into(), ..Default::default() },
      Format { name: "Vinyl".into(), ..Default::default() },
    ];
    assert_eq!(unique_formats(&formats), "Vinyl, CD");
    assert_eq!(unique_formats(&[]), "Unknown");
  }

  #[test]
  fn marketplace_summary() {
    let stats = MarketplaceStats {
      lowest_price: Some(Price { value: 12.5, currency: "EUR".into() }),
      num_for_sale: Some(3),
      blocked_from_sale: false,
    };
    assert_eq!(stats.summary(), "3 for sale from 12.50 EUR");
    assert_eq!(MarketplaceStats::default().summary(), "none for sale");
  }
}
