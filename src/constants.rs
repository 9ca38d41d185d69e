//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! with no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Discogs API
  pub user_agent: String,
  pub api_base: String,
  pub per_page: u32,
  pub fetch_retries: u32,
  pub backoff_base_ms: u64,
  pub request_timeout_secs: u64,

  // Sampling
  pub max_sample_attempts: u32,

  // Playback staggering
  pub next_video_delay_ms: u64,
  pub autoplay_delay_ms: u64,

  // Transient status messages
  pub status_flash_ms: u64,
  pub error_flash_ms: u64,

  /// Username used when neither prefs nor CLI provide one.
  pub default_username: String,
}

impl Constants {
  pub fn backoff_base(&self) -> Duration {
    Duration::from_millis(self.backoff_base_ms)
  }

  pub fn next_video_delay(&self) -> Duration {
    Duration::from_millis(self.next_video_delay_ms)
  }

  pub fn autoplay_delay(&self) -> Duration {
    Duration::from_millis(self.autoplay_delay_ms)
  }

  pub fn status_flash(&self) -> Duration {
    Duration::from_millis(self.status_flash_ms)
  }

  pub fn error_flash(&self) -> Duration {
    Duration::from_millis(self.error_flash_ms)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
