use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::constants;
use crate::discogs::{Client, DiscogsError};
use crate::matcher::match_track;
use crate::models::{CONDITIONS, CollectionEntry, ListKind, MarketplaceStats, NoteField, Release};
use crate::player::{MusicPlayer, PlayerEvent};
use crate::sampler::{CollectionCache, SampleError, SampleProgress, SampleRequest, SampledRelease, sample_release_with_video};
use crate::sequencer::{Advance, PlaybackFlags, Sequencer};
use crate::store::{self, Storage};
use crate::theme::THEMES;
use crate::youtube::{Video, extract_videos};

// --- Types ---

pub type SampleResult = Result<SampledRelease, SampleError>;
pub type LoadResult = Result<(Release, Vec<Video>), DiscogsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget {
  Username,
  Token,
  ReleaseId,
  Notes,
}

impl InputTarget {
  pub fn title(self) -> &'static str {
    match self {
      InputTarget::Username => " Discogs username ",
      InputTarget::Token => " Personal access token ",
      InputTarget::ReleaseId => " Load release by id ",
      InputTarget::Notes => " Notes ",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Browse,
  Input(InputTarget),
  Condition(NoteField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
  Loading,
  Info,
  Error,
}

/// One line of transient feedback. Expiring messages clear themselves on tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
  pub kind: StatusKind,
  pub text: String,
  expires: Option<Instant>,
}

/// Display annotation for a video: the tracklist entry it matched.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchLabel {
  pub position: String,
  pub title: String,
  pub uncertain: bool,
}

/// Identifies the collection entry an edit was sent for: release id and instance id.
pub type EntryKey = (Option<u64>, Option<u64>);

fn entry_key(entry: &CollectionEntry) -> EntryKey {
  (entry.release_id(), entry.instance_id)
}

/// A collection edit awaiting server confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingUpdate {
  Rating(u8),
  Note(NoteField, String),
}

/// In-flight async task receivers. Replacing a receiver drops the stale task's result.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) sample_rx: Option<oneshot::Receiver<SampleResult>>,
  pub(crate) progress_rx: Option<mpsc::UnboundedReceiver<SampleProgress>>,
  pub(crate) load_rx: Option<oneshot::Receiver<LoadResult>>,
  pub(crate) stats_rx: Option<oneshot::Receiver<Result<MarketplaceStats, DiscogsError>>>,
  pub(crate) update_rx: Option<oneshot::Receiver<(EntryKey, PendingUpdate, Result<(), DiscogsError>)>>,
}

pub struct App {
  pub config: Config,
  pub mode: AppMode,
  pub theme_index: usize,
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub release: Option<Release>,
  pub videos: Vec<Video>,
  pub matches: Vec<Option<MatchLabel>>,
  pub entry: Option<CollectionEntry>,
  pub stats: Option<MarketplaceStats>,
  pub list_state: ListState,
  pub condition_state: ListState,
  pub cache: Option<CollectionCache>,
  pub sequencer: Sequencer,
  pub player: MusicPlayer,
  pub storage: Storage,
  /// The video list was reordered since the last save.
  pub order_dirty: bool,
  pub status: Option<Status>,
  /// Rating feedback, shown beside the stars.
  pub rating_status: Option<Status>,
  pub should_quit: bool,
  /// Write preference changes to `prefs.toml`.
  pub persist_prefs: bool,
  client: Client,
  player_rx: mpsc::UnboundedReceiver<PlayerEvent>,
  pending_start: Option<(usize, Instant)>,
  rng: StdRng,
  pub(crate) tasks: AsyncTasks,
}

impl App {
  pub fn new(config: Config, storage: Storage) -> Result<Self> {
    let client = Client::new(config.token()).context("Failed to build Discogs client")?;
    let (player_tx, player_rx) = mpsc::unbounded_channel();
    Ok(Self {
      config,
      mode: AppMode::Browse,
      theme_index: 0,
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      release: None,
      videos: Vec::new(),
      matches: Vec::new(),
      entry: None,
      stats: None,
      list_state: ListState::default(),
      condition_state: ListState::default(),
      cache: None,
      sequencer: Sequencer::default(),
      player: MusicPlayer::new(player_tx),
      storage,
      order_dirty: false,
      status: None,
      rating_status: None,
      should_quit: false,
      persist_prefs: true,
      client,
      player_rx,
      pending_start: None,
      rng: StdRng::from_os_rng(),
      tasks: AsyncTasks::default(),
    })
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
  }

  pub fn flags(&self) -> PlaybackFlags {
    PlaybackFlags {
      autoplay: self.config.autoplay,
      shuffle: self.config.shuffle,
      continuous_play: self.config.continuous_play,
      random_next: self.config.random_next,
    }
  }

  pub fn username(&self) -> &str {
    self.config.username.as_deref().unwrap_or(&constants().default_username)
  }

  pub fn is_loading(&self) -> bool {
    self.tasks.sample_rx.is_some() || self.tasks.load_rx.is_some()
  }

  // --- Status line ---

  pub fn set_loading(&mut self, text: impl Into<String>) {
    self.status = Some(Status { kind: StatusKind::Loading, text: text.into(), expires: None });
  }

  pub fn set_error(&mut self, text: impl Into<String>) {
    self.status = Some(Status { kind: StatusKind::Error, text: text.into(), expires: None });
  }

  /// Show a message that clears itself after `ttl`.
  pub fn flash(&mut self, kind: StatusKind, text: impl Into<String>, ttl: Duration) {
    self.status = Some(Status { kind, text: text.into(), expires: Some(Instant::now() + ttl) });
  }

  pub fn clear_status(&mut self) {
    self.status = None;
  }

  fn expire_status(&mut self, now: Instant) {
    for slot in [&mut self.status, &mut self.rating_status] {
      if slot.as_ref().and_then(|s| s.expires).is_some_and(|t| now >= t) {
        *slot = None;
      }
    }
  }

  // --- Per-tick polling ---

  /// Poll background tasks, player events and timers. Call once per UI loop iteration.
  pub async fn tick(&mut self) -> Result<()> {
    self.check_pending();
    self.player.check_mpv_status();
    while let Ok(event) = self.player_rx.try_recv() {
      self.handle_player_event(event);
    }
    let now = Instant::now();
    if let Some((index, at)) = self.pending_start
      && now >= at
    {
      self.pending_start = None;
      self.play_index(index).await;
    }
    self.expire_status(now);
    Ok(())
  }

  fn check_pending(&mut self) {
    if let Some(rx) = &mut self.tasks.progress_rx {
      let mut latest = None;
      while let Ok(progress) = rx.try_recv() {
        latest = Some(progress);
      }
      if let Some(progress) = latest {
        self.set_loading(progress.message());
      }
    }

    if let Some(mut rx) = self.tasks.sample_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.tasks.progress_rx = None;
          match result {
            Ok(sampled) => {
              self.cache = Some(sampled.cache);
              self.clear_status();
              self.apply_release(sampled.release, sampled.videos, Some(sampled.entry));
            }
            Err(e) => self.set_error(sample_error_message(&e)),
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.sample_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.tasks.progress_rx = None;
          self.set_error("Sampling task failed.");
        }
      }
    }

    if let Some(mut rx) = self.tasks.load_rx.take() {
      match rx.try_recv() {
        Ok(Ok((release, videos))) => {
          self.clear_status();
          let entry = self.entry.take().filter(|e| e.release_id() == Some(release.id));
          self.apply_release(release, videos, entry);
        }
        Ok(Err(e)) => self.set_error(format!("Error: {}", e)),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.load_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.set_error("Load task failed.");
        }
      }
    }

    if let Some(mut rx) = self.tasks.stats_rx.take() {
      match rx.try_recv() {
        Ok(Ok(stats)) => self.stats = Some(stats),
        Ok(Err(e)) => debug!(err = %e, "marketplace stats unavailable"),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.stats_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {}
      }
    }

    if let Some(mut rx) = self.tasks.update_rx.take() {
      match rx.try_recv() {
        Ok((key, update, result)) => {
          if self.entry.as_ref().map(entry_key) == Some(key) {
            self.finish_update(update, result);
          } else {
            debug!(?key, "dropping edit result for an entry no longer shown");
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.update_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.set_error("Update task failed.");
        }
      }
    }
  }

  // --- Release loading ---

  /// Sample a random release with videos from the current list.
  pub fn trigger_sample(&mut self) {
    let request = SampleRequest::new(self.username(), self.config.list_kind, self.cache);
    if request.username.is_empty() {
      self.set_error(SampleError::NoUsername.to_string());
      return;
    }

    self.clear_release();
    self.set_loading(SampleProgress::Searching.message());
    info!(username = %request.username, kind = request.kind.label(), "sample triggered");

    let client = self.client.clone();
    let mut rng = StdRng::from_rng(&mut self.rng);
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let result = sample_release_with_video(&client, &request, &mut rng, |p| {
        let _ = progress_tx.send(p);
      })
      .await;
      let _ = tx.send(result);
    });
    self.tasks.load_rx = None;
    self.tasks.sample_rx = Some(rx);
    self.tasks.progress_rx = Some(progress_rx);
  }

  /// Load a specific release by id (outside any collection entry).
  pub fn trigger_load(&mut self, release_id: u64) {
    self.clear_release();
    self.spawn_load(release_id, format!("Loading release {}...", release_id));
  }

  /// Re-fetch the current release, keeping its collection entry.
  pub fn refresh_release(&mut self) {
    let Some(release_id) = self.release.as_ref().map(|r| r.id) else { return };
    self.spawn_load(release_id, "Refreshing release data...".to_string());
  }

  fn spawn_load(&mut self, release_id: u64, message: String) {
    self.tasks.sample_rx = None;
    self.tasks.progress_rx = None;
    self.set_loading(message);
    let client = self.client.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let result = client.release(release_id).await.map(|release| {
        let videos = extract_videos(&release);
        (release, videos)
      });
      let _ = tx.send(result);
    });
    self.tasks.load_rx = Some(rx);
  }

  fn clear_release(&mut self) {
    self.release = None;
    self.videos.clear();
    self.matches.clear();
    self.entry = None;
    self.stats = None;
    self.order_dirty = false;
    self.pending_start = None;
    self.sequencer.reset(0);
    self.list_state.select(None);
    self.tasks.stats_rx = None;
    self.tasks.update_rx = None;
  }

  /// Install a freshly fetched release: saved order, fresh sequencer, matches, autoplay.
  pub fn apply_release(&mut self, release: Release, videos: Vec<Video>, entry: Option<CollectionEntry>) {
    let videos = store::load_order(&self.storage, release.id, videos);
    info!(release_id = release.id, videos = videos.len(), "release loaded");

    self.sequencer.reset(videos.len());
    self.list_state.select((!videos.is_empty()).then_some(0));
    self.videos = videos;
    self.entry = entry;
    self.order_dirty = false;
    self.stats = None;
    self.release = Some(release);
    self.refresh_matches();
    self.spawn_stats();

    self.pending_start = None;
    if self.config.autoplay {
      let flags = self.flags();
      if let Some(index) = self.sequencer.start_index(flags, &mut self.rng) {
        self.pending_start = Some((index, Instant::now() + constants().autoplay_delay()));
      }
    }
  }

  fn refresh_matches(&mut self) {
    self.matches = match &self.release {
      Some(release) => self
        .videos
        .iter()
        .map(|video| {
          match_track(&video.title, &release.tracklist, release).map(|m| MatchLabel {
            position: m.track.position.clone(),
            title: m.track.title.clone(),
            uncertain: m.uncertain,
          })
        })
        .collect(),
      None => Vec::new(),
    };
  }

  fn spawn_stats(&mut self) {
    let Some(release_id) = self.release.as_ref().map(|r| r.id) else { return };
    let client = self.client.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(client.marketplace_stats(release_id).await);
    });
    self.tasks.stats_rx = Some(rx);
  }

  // --- Playback ---

  pub fn handle_player_event(&mut self, event: PlayerEvent) {
    match event {
      PlayerEvent::Playing(video_id) => {
        if let Some(index) = self.index_of(&video_id) {
          self.sequencer.select(index);
        }
      }
      PlayerEvent::Ended(video_id) => {
        let Some(index) = self.index_of(&video_id) else { return };
        if self.sequencer.current() != Some(index) {
          return;
        }
        let flags = self.flags();
        match self.sequencer.on_ended(flags, &mut self.rng) {
          Advance::Play(next) => {
            debug!(next, "playback: scheduling next video");
            self.pending_start = Some((next, Instant::now() + constants().next_video_delay()));
          }
          Advance::SampleRelease => self.trigger_sample(),
          Advance::Stop => {}
        }
      }
      PlayerEvent::Failed(video_id) => {
        let Some(index) = self.index_of(&video_id) else { return };
        if self.sequencer.current() != Some(index) {
          return;
        }
        warn!(%video_id, "playback: mpv exited with an error");
        let title = self.videos[index].title.clone();
        self.set_error(format!("Playback failed: {}", title));
      }
    }
  }

  fn index_of(&self, video_id: &str) -> Option<usize> {
    self.videos.iter().position(|v| v.id == video_id)
  }

  pub fn pending_start(&self) -> Option<usize> {
    self.pending_start.map(|(index, _)| index)
  }

  async fn play_index(&mut self, index: usize) {
    let Some(video_id) = self.videos.get(index).map(|v| v.id.clone()) else { return };
    self.sequencer.select(index);
    self.list_state.select(Some(index));
    if let Err(e) = self.player.play(&video_id).await {
      warn!(err = %e, %video_id, "playback failed");
      self.set_error(format!("Playback error: {:#}", e));
      let _ = self.player.stop().await;
    }
  }

  /// Play the highlighted video now.
  pub async fn play_selected(&mut self) {
    let Some(index) = self.list_state.selected() else { return };
    self.pending_start = None;
    self.play_index(index).await;
  }

  pub async fn toggle_pause(&mut self) {
    if self.player.is_playing()
      && let Err(e) = self.player.toggle_pause().await
    {
      self.set_error(format!("Pause error: {}", e));
    }
  }

  pub async fn stop(&mut self) -> Result<()> {
    self.pending_start = None;
    self.player.stop().await.context("Failed to stop playback")
  }

  // --- Video order ---

  pub fn select_next(&mut self) {
    let count = self.videos.len();
    if count > 0 {
      let i = self.list_state.selected().map_or(0, |i| (i + 1) % count);
      self.list_state.select(Some(i));
    }
  }

  pub fn select_prev(&mut self) {
    let count = self.videos.len();
    if count > 0 {
      let i = self.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
      self.list_state.select(Some(i));
    }
  }

  /// Move the highlighted video one slot up (`-1`) or down (`+1`).
  pub fn move_selected(&mut self, delta: isize) {
    let Some(from) = self.list_state.selected() else { return };
    let Some(to) = from.checked_add_signed(delta).filter(|to| *to < self.videos.len()) else { return };

    let current_id = self.sequencer.current().and_then(|i| self.videos.get(i)).map(|v| v.id.clone());
    self.videos.swap(from, to);
    self.matches.swap(from, to);
    self.list_state.select(Some(to));
    self.order_dirty = true;
    if let Some(index) = current_id.and_then(|id| self.index_of(&id)) {
      self.sequencer.select(index);
    }
  }

  pub fn save_order(&mut self) {
    let Some(release_id) = self.release.as_ref().map(|r| r.id) else { return };
    match store::save_order(&mut self.storage, release_id, &self.videos) {
      Ok(()) => {
        self.order_dirty = false;
        self.flash(StatusKind::Info, "Video order saved!", constants().status_flash());
      }
      Err(e) => self.set_error(format!("Failed to save order: {:#}", e)),
    }
  }

  // --- Collection edits ---

  pub fn set_rating(&mut self, rating: u8) {
    self.spawn_update(PendingUpdate::Rating(rating.min(5)));
  }

  pub fn set_note(&mut self, field: NoteField, value: String) {
    self.spawn_update(PendingUpdate::Note(field, value));
  }

  fn spawn_update(&mut self, update: PendingUpdate) {
    if !self.client.has_token() {
      let what = match &update {
        PendingUpdate::Rating(_) => "rating",
        PendingUpdate::Note(field, _) => field.label(),
      };
      self.set_error(DiscogsError::TokenRequired { what }.to_string());
      return;
    }
    let Some(entry) = self.entry.clone() else {
      self.set_error(DiscogsError::NotInCollection.to_string());
      return;
    };
    let key = entry_key(&entry);

    let client = self.client.clone();
    let username = self.username().to_string();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let result = match &update {
        PendingUpdate::Rating(rating) => client.update_rating(&username, &entry, *rating).await,
        PendingUpdate::Note(field, value) => client.update_note(&username, &entry, *field, value).await,
      };
      let _ = tx.send((key, update, result));
    });
    self.tasks.update_rx = Some(rx);
  }

  /// Apply a confirmed edit locally, or report the failure.
  pub fn finish_update(&mut self, update: PendingUpdate, result: Result<(), DiscogsError>) {
    let c = constants();
    match (update, result) {
      (PendingUpdate::Rating(rating), Ok(())) => {
        if let Some(entry) = &mut self.entry {
          entry.rating = rating;
        }
        self.rating_status = Some(Status {
          kind: StatusKind::Info,
          text: "Rating saved!".to_string(),
          expires: Some(Instant::now() + c.status_flash()),
        });
      }
      (PendingUpdate::Rating(_), Err(e)) => {
        self.rating_status = Some(Status {
          kind: StatusKind::Error,
          text: format!("Failed to save: {}", e),
          expires: Some(Instant::now() + c.error_flash()),
        });
      }
      (PendingUpdate::Note(field, value), Ok(())) => {
        if let Some(entry) = &mut self.entry {
          entry.set_note(field, &value);
        }
        self.flash(StatusKind::Info, format!("Saved {}", field.label()), c.status_flash());
      }
      (PendingUpdate::Note(field, _), Err(e)) => {
        warn!(err = %e, field = field.label(), "failed to update note");
        self.flash(StatusKind::Error, format!("Failed to save {}: {}", field.label(), e), c.error_flash());
      }
    }
  }

  pub fn open_condition_picker(&mut self, field: NoteField) {
    let current = self.entry.as_ref().and_then(|e| e.note(field));
    let index = current.and_then(|v| CONDITIONS.iter().position(|c| *c == v)).unwrap_or(0);
    self.condition_state.select(Some(index));
    self.mode = AppMode::Condition(field);
  }

  pub fn confirm_condition(&mut self) {
    let AppMode::Condition(field) = self.mode else { return };
    self.mode = AppMode::Browse;
    if let Some(value) = self.condition_state.selected().and_then(|i| CONDITIONS.get(i)) {
      self.set_note(field, value.to_string());
    }
  }

  // --- Preferences ---

  fn save_prefs(&self) {
    if self.persist_prefs {
      self.config.save();
    }
  }

  pub fn toggle_autoplay(&mut self) {
    self.config.autoplay = !self.config.autoplay;
    self.save_prefs();
  }

  pub fn toggle_shuffle(&mut self) {
    self.config.shuffle = !self.config.shuffle;
    self.save_prefs();
  }

  pub fn toggle_continuous(&mut self) {
    self.config.continuous_play = !self.config.continuous_play;
    self.save_prefs();
  }

  pub fn toggle_random_next(&mut self) {
    self.config.random_next = !self.config.random_next;
    self.save_prefs();
  }

  /// Switch between collection and wantlist. Drops the cached page counts.
  pub fn toggle_list_kind(&mut self) {
    self.set_list_kind(self.config.list_kind.toggled());
  }

  pub fn set_list_kind(&mut self, kind: ListKind) {
    if self.config.list_kind != kind {
      self.config.list_kind = kind;
      self.cache = None;
      self.save_prefs();
    }
  }

  pub fn set_username(&mut self, username: &str) {
    let username = username.trim();
    if self.config.username.as_deref() != Some(username) {
      self.config.username = Some(username.to_string()).filter(|u| !u.is_empty());
      self.cache = None;
      self.save_prefs();
    }
  }

  pub fn set_token(&mut self, token: &str) -> Result<()> {
    self.config.token = Some(token.trim().to_string()).filter(|t| !t.is_empty());
    self.client = Client::new(self.config.token()).context("Failed to build Discogs client")?;
    self.save_prefs();
    Ok(())
  }

  // --- Text input ---

  pub fn begin_input(&mut self, target: InputTarget) {
    self.input = match target {
      InputTarget::Username => self.config.username.clone().unwrap_or_default(),
      InputTarget::Token => self.config.token.clone().unwrap_or_default(),
      InputTarget::ReleaseId => String::new(),
      InputTarget::Notes => self.entry.as_ref().and_then(|e| e.note(NoteField::Notes)).unwrap_or_default().to_string(),
    };
    self.cursor_position = self.input.chars().count();
    self.input_scroll = 0;
    self.mode = AppMode::Input(target);
  }

  pub fn cancel_input(&mut self) {
    self.input.clear();
    self.cursor_position = 0;
    self.mode = AppMode::Browse;
  }

  pub fn commit_input(&mut self) -> Result<()> {
    let AppMode::Input(target) = self.mode else { return Ok(()) };
    let value = std::mem::take(&mut self.input);
    self.cursor_position = 0;
    self.mode = AppMode::Browse;
    match target {
      InputTarget::Username => self.set_username(&value),
      InputTarget::Token => self.set_token(&value)?,
      InputTarget::ReleaseId => match value.trim().trim_start_matches(['r', 'R']).parse::<u64>() {
        Ok(id) if id > 0 => self.trigger_load(id),
        _ => self.set_error(format!("Not a release id: {}", value.trim())),
      },
      InputTarget::Notes => self.set_note(NoteField::Notes, value),
    }
    Ok(())
  }
}

fn sample_error_message(e: &SampleError) -> String {
  match e {
    SampleError::Api(api) => format!("Error: {}", api),
    other => other.to_string(),
  }
}
