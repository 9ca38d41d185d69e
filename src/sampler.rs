//! Random release sampling over a paginated collection or wantlist.
//!
//! Sampling picks a uniformly random page and then a uniformly random entry
//! on it. That is only uniform over all items when every page is full; a
//! short last page over-weights its entries. This bias is accepted.

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::constants;
use crate::discogs::{Client, DiscogsError};
use crate::models::{CollectionEntry, ListKind, Release};
use crate::youtube::{Video, extract_videos};

/// Pagination summary of a list, kept between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionCache {
  pub total_items: u32,
  pub total_pages: u32,
}

#[derive(Debug, Error)]
pub enum SampleError {
  #[error("Please enter a username")]
  NoUsername,

  #[error("No releases found in {}", .0.label())]
  Empty(ListKind),

  #[error("No releases with YouTube videos found after {attempts} attempts")]
  NotFound { attempts: u32 },

  #[error(transparent)]
  Api(#[from] DiscogsError),
}

/// Progress reported while sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleProgress {
  LoadingInfo(ListKind),
  Searching,
  Attempt { attempt: u32, max: u32 },
}

impl SampleProgress {
  pub fn message(&self) -> String {
    match self {
      SampleProgress::LoadingInfo(kind) => format!("Loading {} info...", kind.label()),
      SampleProgress::Searching => "Finding release with videos...".to_string(),
      SampleProgress::Attempt { attempt, max } => {
        format!("Finding release with videos... (attempt {}/{})", attempt, max)
      }
    }
  }
}

/// What to sample from.
#[derive(Debug, Clone)]
pub struct SampleRequest {
  pub username: String,
  pub kind: ListKind,
  /// Cached pagination from a previous sample of the same list, if any.
  pub cache: Option<CollectionCache>,
  pub max_attempts: u32,
}

impl SampleRequest {
  pub fn new(username: &str, kind: ListKind, cache: Option<CollectionCache>) -> Self {
    Self { username: username.trim().to_string(), kind, cache, max_attempts: constants().max_sample_attempts }
  }
}

/// A release that carries at least one YouTube video.
#[derive(Debug, Clone)]
pub struct SampledRelease {
  pub release: Release,
  pub videos: Vec<Video>,
  /// The list entry it was drawn from (rating, notes, instance id).
  pub entry: CollectionEntry,
  /// Pagination used for this sample, to be cached by the caller.
  pub cache: CollectionCache,
}

/// Read page 1 of the list for its pagination metadata.
pub async fn collection_info(client: &Client, username: &str, kind: ListKind) -> Result<CollectionCache, DiscogsError> {
  let page = client.list_page(username, kind, None).await?;
  Ok(CollectionCache { total_items: page.pagination.items, total_pages: page.pagination.pages })
}

/// Fetch one uniformly random page in `[1, total_pages]`.
pub async fn random_page<R: Rng + ?Sized>(
  client: &Client,
  username: &str,
  total_pages: u32,
  kind: ListKind,
  rng: &mut R,
) -> Result<Vec<CollectionEntry>, DiscogsError> {
  let page = rng.random_range(1..=total_pages.max(1));
  debug!(page, total_pages, kind = kind.label(), "sampler: fetching random page");
  Ok(client.list_page(username, kind, Some(page)).await?.entries)
}

/// Draw random list entries until one resolves to a release with YouTube videos.
pub async fn sample_release_with_video<R, F>(
  client: &Client,
  request: &SampleRequest,
  rng: &mut R,
  mut progress: F,
) -> Result<SampledRelease, SampleError>
where
  R: Rng + ?Sized,
  F: FnMut(SampleProgress),
{
  if request.username.is_empty() {
    return Err(SampleError::NoUsername);
  }

  let cache = match request.cache {
    Some(cache) => cache,
    None => {
      progress(SampleProgress::LoadingInfo(request.kind));
      let cache = collection_info(client, &request.username, request.kind).await?;
      if cache.total_items == 0 {
        return Err(SampleError::Empty(request.kind));
      }
      cache
    }
  };

  progress(SampleProgress::Searching);
  for attempt in 1..=request.max_attempts {
    let entries = random_page(client, &request.username, cache.total_pages, request.kind, rng).await?;
    if !entries.is_empty() {
      let entry = entries[rng.random_range(0..entries.len())].clone();
      if let Some(release_id) = entry.release_id() {
        let release = client.release(release_id).await?;
        let videos = extract_videos(&release);
        if !videos.is_empty() {
          info!(release_id, attempt, videos = videos.len(), "sampler: found release with videos");
          return Ok(SampledRelease { release, videos, entry, cache });
        }
        debug!(release_id, attempt, "sampler: release has no videos");
      }
    }
    progress(SampleProgress::Attempt { attempt, max: request.max_attempts });
  }

  Err(SampleError::NotFound { attempts: request.max_attempts })
}
