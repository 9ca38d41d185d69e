use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::ListKind;

fn default_true() -> bool {
  true
}

/// User preferences, persisted to `prefs.toml` in the config dir.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub token: Option<String>,
  #[serde(default = "default_true")]
  pub autoplay: bool,
  #[serde(default)]
  pub shuffle: bool,
  #[serde(default)]
  pub continuous_play: bool,
  #[serde(default)]
  pub random_next: bool,
  #[serde(default)]
  pub list_kind: ListKind,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      username: None,
      token: None,
      autoplay: true,
      shuffle: false,
      continuous_play: false,
      random_next: false,
      list_kind: ListKind::Collection,
    }
  }
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "diggr") {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file) {
        return Self::parse(&content);
      }
    }
    Self::default()
  }

  /// Parse prefs, falling back to defaults on malformed content.
  pub fn parse(content: &str) -> Self {
    toml::from_str(content).unwrap_or_else(|e| {
      warn!(err = %e, "config: ignoring malformed prefs.toml");
      Self::default()
    })
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "diggr") {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        match toml::to_string(self) {
          Ok(content) => {
            if let Err(e) = std::fs::write(&config_file, content) {
              warn!(err = %e, path = %config_file.display(), "config: failed to write prefs");
            }
          }
          Err(e) => warn!(err = %e, "config: failed to serialize prefs"),
        }
      }
    }
  }

  pub fn token(&self) -> Option<String> {
    self.token.clone().filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_prefs_use_defaults() {
    let config = Config::parse("");
    assert!(config.autoplay);
    assert!(!config.shuffle);
    assert!(!config.continuous_play);
    assert!(!config.random_next);
    assert_eq!(config.list_kind, ListKind::Collection);
  }

  #[test]
  fn parses_saved_prefs() {
    let config = Config::parse(
      r#"
username = "digger"
autoplay = false
shuffle = true
list_kind = "wantlist"
"#,
    );
    assert_eq!(config.username.as_deref(), Some("digger"));
    assert!(!config.autoplay);
    assert!(config.shuffle);
    assert_eq!(config.list_kind, ListKind::Wantlist);
  }

  #[test]
  fn malformed_prefs_fall_back() {
    assert_eq!(Config::parse("shuffle = [nope"), Config::default());
  }

  #[test]
  fn round_trips_through_toml() {
    let config = Config { username: Some("u".into()), random_next: true, ..Default::default() };
    let text = toml::to_string(&config).unwrap();
    assert_eq!(Config::parse(&text), config);
  }

  #[test]
  fn blank_token_is_none() {
    let config = Config { token: Some("  ".into()), ..Default::default() };
    assert_eq!(config.token(), None);
  }
}
