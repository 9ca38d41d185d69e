use rand::Rng;
use std::collections::BTreeSet;

/// Playback switches, toggled by the user and persisted in prefs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackFlags {
  pub autoplay: bool,
  pub shuffle: bool,
  pub continuous_play: bool,
  pub random_next: bool,
}

/// What to do after a video ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
  /// Leave playback stopped.
  Stop,
  /// Start the video at this index.
  Play(usize),
  /// The list is exhausted; sample a fresh release.
  SampleRelease,
}

/// Decides which video of the loaded release plays next.
///
/// Holds the current index and, in shuffle mode, the set of indices already
/// played. Reset on every release load.
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
  len: usize,
  current: Option<usize>,
  played: BTreeSet<usize>,
}

impl Sequencer {
  pub fn new(len: usize) -> Self {
    Self { len, current: (len > 0).then_some(0), played: BTreeSet::new() }
  }

  /// Start over for a newly loaded video list.
  pub fn reset(&mut self, len: usize) {
    *self = Self::new(len);
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn current(&self) -> Option<usize> {
    self.current
  }

  pub fn played(&self) -> &BTreeSet<usize> {
    &self.played
  }

  /// Point at `index` (a video started playing, or the user picked it).
  pub fn select(&mut self, index: usize) {
    if index < self.len {
      self.current = Some(index);
    }
  }

  /// Index autoplay should start from: the first video, or a random one in shuffle mode.
  pub fn start_index<R: Rng + ?Sized>(&mut self, flags: PlaybackFlags, rng: &mut R) -> Option<usize> {
    if self.len == 0 {
      return None;
    }
    let index = if flags.shuffle { rng.random_range(0..self.len) } else { 0 };
    self.current = Some(index);
    Some(index)
  }

  /// React to the current video ending.
  pub fn on_ended<R: Rng + ?Sized>(&mut self, flags: PlaybackFlags, rng: &mut R) -> Advance {
    if !flags.continuous_play || self.len == 0 {
      return Advance::Stop;
    }
    let current = self.current.unwrap_or(0);

    let next = if flags.shuffle {
      self.played.insert(current);
      if self.played.len() >= self.len {
        if flags.random_next {
          return Advance::SampleRelease;
        }
        self.played.clear();
        rng.random_range(0..self.len)
      } else {
        let unplayed: Vec<usize> = (0..self.len).filter(|i| !self.played.contains(i)).collect();
        unplayed[rng.random_range(0..unplayed.len())]
      }
    } else {
      let next = current + 1;
      if next >= self.len {
        if flags.random_next {
          return Advance::SampleRelease;
        }
        0
      } else {
        next
      }
    };

    self.current = Some(next);
    Advance::Play(next)
  }
}
