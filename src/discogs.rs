use reqwest::{StatusCode, Url, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::models::{CollectionEntry, ListKind, ListPage, MarketplaceStats, NoteField, Release};

#[derive(Debug, Error)]
pub enum DiscogsError {
  #[error("HTTP {status}: {reason}")]
  Http { status: u16, reason: String },

  #[error("Rate limited by Discogs ({attempts} attempts)")]
  RateLimited { attempts: u32 },

  #[error("CORS error: Please use a token or try from a different browser/network")]
  Cors,

  #[error("Token required to update {what}. Get yours at https://www.discogs.com/settings/developers")]
  TokenRequired { what: &'static str },

  #[error("Release is not an instance in your collection")]
  NotInCollection,

  #[error("Request failed: {0}")]
  Transport(#[source] reqwest::Error),

  #[error("Failed to parse response: {0}")]
  Decode(String),

  #[error("Invalid API base URL: {0}")]
  BaseUrl(String),
}

impl DiscogsError {
  fn from_status(status: StatusCode) -> Self {
    DiscogsError::Http { status: status.as_u16(), reason: status.canonical_reason().unwrap_or("").to_string() }
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      DiscogsError::Http { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// Transport errors mentioning a cross-origin restriction are not worth retrying.
fn is_cross_origin(message: &str) -> bool {
  message.contains("CORS") || message.contains("Cross-Origin")
}

/// Discogs REST client with rate-limit backoff.
#[derive(Debug, Clone)]
pub struct Client {
  http: reqwest::Client,
  base: Url,
  token: Option<String>,
  retries: u32,
  backoff_base: Duration,
}

impl Client {
  pub fn new(token: Option<String>) -> Result<Self, DiscogsError> {
    Self::with_base(&constants().api_base, token)
  }

  pub fn with_base(base: &str, token: Option<String>) -> Result<Self, DiscogsError> {
    let c = constants();
    let http = reqwest::Client::builder()
      .user_agent(c.user_agent.as_str())
      .timeout(Duration::from_secs(c.request_timeout_secs))
      .build()
      .map_err(DiscogsError::Transport)?;
    let base = Url::parse(base).map_err(|e| DiscogsError::BaseUrl(format!("{}: {}", base, e)))?;
    Ok(Self {
      http,
      base,
      token: token.filter(|t| !t.trim().is_empty()),
      retries: c.fetch_retries,
      backoff_base: c.backoff_base(),
    })
  }

  /// Override the backoff unit (`2^attempt` times this).
  pub fn with_backoff(mut self, base: Duration) -> Self {
    self.backoff_base = base;
    self
  }

  pub fn with_retries(mut self, retries: u32) -> Self {
    self.retries = retries.max(1);
    self
  }

  pub fn has_token(&self) -> bool {
    self.token.is_some()
  }

  fn backoff(&self, attempt: u32) -> Duration {
    self.backoff_base * 2u32.saturating_pow(attempt)
  }

  fn endpoint(&self, segments: &[&str]) -> Result<Url, DiscogsError> {
    let mut url = self.base.clone();
    url
      .path_segments_mut()
      .map_err(|()| DiscogsError::BaseUrl(self.base.to_string()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  fn list_url(&self, username: &str, kind: ListKind, page: Option<u32>) -> Result<Url, DiscogsError> {
    let mut url = match kind {
      ListKind::Collection => self.endpoint(&["users", username, "collection", "folders", "0", "releases"])?,
      ListKind::Wantlist => self.endpoint(&["users", username, "wants"])?,
    };
    {
      let mut query = url.query_pairs_mut();
      query.append_pair("per_page", &constants().per_page.to_string());
      if let Some(page) = page {
        query.append_pair("page", &page.to_string());
      }
    }
    Ok(url)
  }

  fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => request.header(AUTHORIZATION, format!("Discogs token={}", token)),
      None => request,
    }
  }

  /// GET a JSON document with 429 backoff and retry on transient failures.
  ///
  /// A 429 sleeps `2^attempt` units and moves on to the next attempt. 5xx
  /// and transport failures are retried the same way; other 4xx fail at once.
  pub async fn fetch_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, DiscogsError> {
    let mut last_err = None;

    for attempt in 0..self.retries {
      debug!(url = %url, attempt, "discogs: GET");
      match self.authorize(self.http.get(url.clone())).send().await {
        Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
          let wait = self.backoff(attempt);
          warn!(url = %url, attempt, wait_ms = wait.as_millis() as u64, "discogs: rate limited, backing off");
          tokio::time::sleep(wait).await;
          last_err = Some(DiscogsError::RateLimited { attempts: attempt + 1 });
          continue;
        }
        Ok(resp) if resp.status().is_success() => {
          return resp.json::<T>().await.map_err(|e| DiscogsError::Decode(e.to_string()));
        }
        Ok(resp) => {
          let err = DiscogsError::from_status(resp.status());
          if resp.status().is_client_error() {
            return Err(err);
          }
          warn!(url = %url, attempt, err = %err, "discogs: server error");
          last_err = Some(err);
        }
        Err(e) => {
          if is_cross_origin(&e.to_string()) {
            return Err(DiscogsError::Cors);
          }
          warn!(url = %url, attempt, err = %e, "discogs: request failed");
          last_err = Some(DiscogsError::Transport(e));
        }
      }

      if attempt + 1 < self.retries {
        tokio::time::sleep(self.backoff(attempt)).await;
      }
    }

    Err(last_err.unwrap_or(DiscogsError::RateLimited { attempts: self.retries }))
  }

  /// Fetch one page of the user's collection or wantlist (1-indexed).
  pub async fn list_page(&self, username: &str, kind: ListKind, page: Option<u32>) -> Result<ListPage, DiscogsError> {
    self.fetch_json(self.list_url(username, kind, page)?).await
  }

  pub async fn release(&self, release_id: u64) -> Result<Release, DiscogsError> {
    let url = self.endpoint(&["releases", &release_id.to_string()])?;
    self.fetch_json(url).await
  }

  pub async fn marketplace_stats(&self, release_id: u64) -> Result<MarketplaceStats, DiscogsError> {
    let url = self.endpoint(&["marketplace", "stats", &release_id.to_string()])?;
    self.fetch_json(url).await
  }

  pub async fn update_rating(&self, username: &str, entry: &CollectionEntry, rating: u8) -> Result<(), DiscogsError> {
    self.post_instance(username, entry, json!({ "rating": rating.min(5) }), "rating").await
  }

  pub async fn update_note(
    &self,
    username: &str,
    entry: &CollectionEntry,
    field: NoteField,
    value: &str,
  ) -> Result<(), DiscogsError> {
    let mut body = serde_json::Map::new();
    body.insert(format!("notes[{}]", field.id()), value.into());
    self.post_instance(username, entry, serde_json::Value::Object(body), field.label()).await
  }

  /// POST to the collection-instance endpoint. Not retried.
  async fn post_instance(
    &self,
    username: &str,
    entry: &CollectionEntry,
    body: serde_json::Value,
    what: &'static str,
  ) -> Result<(), DiscogsError> {
    if self.token.is_none() {
      return Err(DiscogsError::TokenRequired { what });
    }
    let (Some(release_id), Some(instance_id)) = (entry.release_id(), entry.instance_id) else {
      return Err(DiscogsError::NotInCollection);
    };

    let url = self.endpoint(&[
      "users",
      username,
      "collection",
      "folders",
      "0",
      "releases",
      &release_id.to_string(),
      "instances",
      &instance_id.to_string(),
    ])?;

    let resp = self.authorize(self.http.post(url.clone())).json(&body).send().await.map_err(|e| {
      if is_cross_origin(&e.to_string()) { DiscogsError::Cors } else { DiscogsError::Transport(e) }
    })?;

    if !resp.status().is_success() {
      return Err(DiscogsError::from_status(resp.status()));
    }
    info!(release_id, instance_id, what, "discogs: instance updated");
    Ok(())
  }
}
