use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode, InputTarget};
use crate::models::{CONDITIONS, NoteField};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

fn open_in_browser(app: &mut App, url: &str) {
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";
  match std::process::Command::new(cmd)
    .arg(url)
    .stdin(std::process::Stdio::null())
    .stdout(std::process::Stdio::null())
    .stderr(std::process::Stdio::null())
    .spawn()
  {
    Ok(mut child) => {
      // Reap the child in a background thread to avoid zombie processes.
      std::thread::spawn(move || {
        let _ = child.wait();
      });
    }
    Err(e) => app.set_error(format!("Failed to open browser: {}", e)),
  }
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => {
        app.should_quit = true;
        return Ok(());
      }
      KeyCode::Char('t') => {
        app.next_theme();
        return Ok(());
      }
      KeyCode::Char('o') => {
        if let Some(id) = app.release.as_ref().map(|r| r.id) {
          open_in_browser(app, &format!("https://www.discogs.com/release/{}", id));
        }
        return Ok(());
      }
      _ => {}
    }
  }

  match app.mode {
    AppMode::Browse => handle_browse_key(app, key).await?,
    AppMode::Input(_) => handle_input_key(app, key)?,
    AppMode::Condition(_) => handle_condition_key(app, key),
  }
  Ok(())
}

async fn handle_browse_key(app: &mut App, key: event::KeyEvent) -> Result<()> {
  match key.code {
    KeyCode::Char('q') | KeyCode::Esc => {
      app.should_quit = true;
    }
    KeyCode::Char('n') => app.trigger_sample(),
    KeyCode::Char('R') => app.refresh_release(),
    KeyCode::Char('g') => app.begin_input(InputTarget::ReleaseId),
    KeyCode::Char('u') => app.begin_input(InputTarget::Username),
    KeyCode::Char('t') => app.begin_input(InputTarget::Token),
    KeyCode::Char('l') => app.toggle_list_kind(),
    KeyCode::Enter => app.play_selected().await,
    KeyCode::Char(' ') => app.toggle_pause().await,
    KeyCode::Char('s') => app.stop().await?,
    KeyCode::Down | KeyCode::Char('j') => app.select_next(),
    KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
    KeyCode::Char('J') => app.move_selected(1),
    KeyCode::Char('K') => app.move_selected(-1),
    KeyCode::Char('w') => app.save_order(),
    KeyCode::Char(c @ '0'..='5') => {
      if let Some(rating) = c.to_digit(10) {
        app.set_rating(rating as u8);
      }
    }
    KeyCode::Char('m') => app.open_condition_picker(NoteField::MediaCondition),
    KeyCode::Char('v') => app.open_condition_picker(NoteField::SleeveCondition),
    KeyCode::Char('e') => app.begin_input(InputTarget::Notes),
    KeyCode::Char('a') => app.toggle_autoplay(),
    KeyCode::Char('h') => app.toggle_shuffle(),
    KeyCode::Char('c') => app.toggle_continuous(),
    KeyCode::Char('x') => app.toggle_random_next(),
    _ => {}
  }
  Ok(())
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) -> Result<()> {
  match key.code {
    KeyCode::Enter => app.commit_input()?,
    KeyCode::Esc => app.cancel_input(),
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    _ => {}
  }
  Ok(())
}

fn handle_condition_key(app: &mut App, key: event::KeyEvent) {
  let count = CONDITIONS.len();
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => {
      let i = app.condition_state.selected().map_or(0, |i| (i + 1) % count);
      app.condition_state.select(Some(i));
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let i = app.condition_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
      app.condition_state.select(Some(i));
    }
    KeyCode::Enter => app.confirm_condition(),
    KeyCode::Esc | KeyCode::Char('q') => app.mode = AppMode::Browse,
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::store::Storage;
  use ratatui::crossterm::event::KeyEvent;

  fn app() -> App {
    let mut app = App::new(Config::default(), Storage::default()).unwrap();
    app.persist_prefs = false;
    app
  }

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("hello", 0), 0);
    assert_eq!(char_to_byte_index("hello", 3), 3);
    assert_eq!(char_to_byte_index("hello", 5), 5);
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "aé日";
    assert_eq!(char_to_byte_index(s, 1), 1);
    assert_eq!(char_to_byte_index(s, 2), 3);
    assert_eq!(char_to_byte_index(s, 3), 6);
  }

  // --- key dispatch ---

  #[tokio::test]
  async fn typing_edits_input_at_cursor() {
    let mut app = app();
    app.config.username = None;
    handle_key_event(&mut app, press(KeyCode::Char('u'))).await.unwrap();
    assert_eq!(app.mode, AppMode::Input(InputTarget::Username));

    for c in "mik".chars() {
      handle_key_event(&mut app, press(KeyCode::Char(c))).await.unwrap();
    }
    handle_key_event(&mut app, press(KeyCode::Home)).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::Char('é'))).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::End)).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::Backspace)).await.unwrap();
    assert_eq!(app.input, "émi");

    handle_key_event(&mut app, press(KeyCode::Enter)).await.unwrap();
    assert_eq!(app.mode, AppMode::Browse);
    assert_eq!(app.config.username.as_deref(), Some("émi"));
  }

  #[tokio::test]
  async fn escape_cancels_input() {
    let mut app = app();
    app.config.username = Some("keep".into());
    handle_key_event(&mut app, press(KeyCode::Char('u'))).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::Char('x'))).await.unwrap();
    handle_key_event(&mut app, press(KeyCode::Esc)).await.unwrap();
    assert_eq!(app.mode, AppMode::Browse);
    assert_eq!(app.config.username.as_deref(), Some("keep"));
    assert!(!app.should_quit);
  }

  #[tokio::test]
  async fn toggles_flip_preferences() {
    let mut app = app();
    for c in ['a', 'h', 'c', 'x'] {
      handle_key_event(&mut app, press(KeyCode::Char(c))).await.unwrap();
    }
    assert!(!app.config.autoplay);
    assert!(app.config.shuffle);
    assert!(app.config.continuous_play);
    assert!(app.config.random_next);
  }

  #[tokio::test]
  async fn condition_picker_wraps_and_cancels() {
    let mut app = app();
    app.open_condition_picker(NoteField::MediaCondition);
    handle_key_event(&mut app, press(KeyCode::Up)).await.unwrap();
    assert_eq!(app.condition_state.selected(), Some(CONDITIONS.len() - 1));
    handle_key_event(&mut app, press(KeyCode::Esc)).await.unwrap();
    assert_eq!(app.mode, AppMode::Browse);
  }

  #[tokio::test]
  async fn ctrl_c_quits_from_any_mode() {
    let mut app = app();
    app.begin_input(InputTarget::Notes);
    handle_key_event(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)).await.unwrap();
    assert!(app.should_quit);
  }
}
