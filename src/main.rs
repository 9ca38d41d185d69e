mod app;
mod config;
mod constants;
mod discogs;
mod input;
mod matcher;
mod models;
mod player;
mod sampler;
mod sequencer;
mod store;
#[cfg(test)]
mod test_support;
mod theme;
mod ui;
mod youtube;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use directories::ProjectDirs;
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;
use discogs::Client;
use matcher::match_track;
use models::{Release, unique_formats};
use sampler::{SampleRequest, sample_release_with_video};
use store::Storage;
use youtube::{Video, extract_videos};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Discogs username (overrides the saved one for this session)
  #[arg(short, long, global = true)]
  user: Option<String>,

  /// Discogs personal access token
  #[arg(short, long, global = true)]
  token: Option<String>,

  /// Sample from the wantlist instead of the collection
  #[arg(short, long, global = true)]
  wantlist: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print a release, its YouTube videos and the track each one matches
  Release {
    /// Discogs release id
    id: u64,
  },
  /// Pick one random release with videos and print it
  Sample,
  /// Generate shell completions
  Completions { shell: Shell },
}

fn apply_overrides(config: &mut Config, args: &Args) {
  if let Some(user) = &args.user {
    config.username = Some(user.trim().to_string());
  }
  if let Some(token) = &args.token {
    config.token = Some(token.trim().to_string());
  }
  if args.wantlist {
    config.list_kind = models::ListKind::Wantlist;
  }
}

// --- Logging ---

/// Log to a file in the data dir; the terminal belongs to the UI.
fn init_logging() -> Option<WorkerGuard> {
  let dirs = ProjectDirs::from("", "", "diggr")?;
  let log_dir = dirs.data_dir();
  std::fs::create_dir_all(log_dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, "diggr.log"));
  let filter = EnvFilter::try_from_env("DIGGR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Headless commands ---

/// Plain-text report of a release: header, then one line per video with its matched track.
fn describe_release(release: &Release, videos: &[Video]) -> String {
  let mut out = String::new();
  let _ = write!(out, "r{}  {} – {}", release.id, release.artist_line(), release.title);
  if let Some(year) = release.year_label() {
    let _ = write!(out, " ({})", year);
  }
  let _ = writeln!(out);
  let _ = writeln!(out, "Format: {}", unique_formats(&release.formats));
  if let Some(cover) = release.cover_uri() {
    let _ = writeln!(out, "Cover: {}", cover);
  }
  let _ = writeln!(out, "Videos ({}):", videos.len());
  for (i, video) in videos.iter().enumerate() {
    let _ = write!(out, "  {:>2}. {}  {}", i + 1, video.watch_url(), video.title);
    match match_track(&video.title, &release.tracklist, release) {
      Some(m) => {
        let flag = if m.uncertain { " ?" } else { "" };
        let _ = writeln!(out, "  -> {} {} ({:.2}{})", m.track.position, m.track.title, m.score, flag);
      }
      None => {
        let _ = writeln!(out, "  -> no match");
      }
    }
  }
  out
}

async fn print_release(config: &Config, release_id: u64) -> Result<()> {
  let client = Client::new(config.token()).context("Failed to build Discogs client")?;
  let release = client.release(release_id).await.with_context(|| format!("Failed to fetch release {}", release_id))?;
  let videos = store::load_order(&Storage::open_default(), release.id, extract_videos(&release));
  print!("{}", describe_release(&release, &videos));
  Ok(())
}

async fn print_sample(config: &Config) -> Result<()> {
  let client = Client::new(config.token()).context("Failed to build Discogs client")?;
  let username = config.username.as_deref().unwrap_or(&constants::constants().default_username);
  let request = SampleRequest::new(username, config.list_kind, None);
  let mut rng = StdRng::from_os_rng();
  let sampled = sample_release_with_video(&client, &request, &mut rng, |p| eprintln!("{}", p.message())).await?;
  print!("{}", describe_release(&sampled.release, &sampled.videos));
  Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _guard = init_logging();

  let mut config = Config::load();
  apply_overrides(&mut config, &args);

  match args.command {
    Some(Command::Completions { shell }) => {
      clap_complete::generate(shell, &mut Args::command(), "diggr", &mut std::io::stdout());
      Ok(())
    }
    Some(Command::Release { id }) => {
      if id == 0 {
        bail!("Release ids start at 1");
      }
      print_release(&config, id).await.inspect_err(|e| error!(err = ?e, "release command failed"))
    }
    Some(Command::Sample) => {
      print_sample(&config).await.inspect_err(|e| error!(err = ?e, "sample command failed"))
    }
    None => {
      let default_hook = std::panic::take_hook();
      std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        default_hook(info);
      }));

      let mut terminal = ratatui::init();
      let result = run(&mut terminal, config).await;
      ratatui::restore();
      result
    }
  }
}

async fn run(terminal: &mut DefaultTerminal, config: Config) -> Result<()> {
  let mut app = App::new(config, Storage::open_default())?;
  info!(username = app.username(), kind = app.config.list_kind.label(), "diggr started");
  if !app.username().is_empty() {
    app.trigger_sample();
  }

  loop {
    app.tick().await?;

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.stop().await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{Artist, Track};

  #[test]
  fn cli_parses_subcommands_and_globals() {
    let args = Args::try_parse_from(["diggr", "sample", "--user", "digger", "--wantlist"]).unwrap();
    assert!(matches!(args.command, Some(Command::Sample)));
    let mut config = Config::default();
    apply_overrides(&mut config, &args);
    assert_eq!(config.username.as_deref(), Some("digger"));
    assert_eq!(config.list_kind, models::ListKind::Wantlist);

    let args = Args::try_parse_from(["diggr", "release", "249504"]).unwrap();
    assert!(matches!(args.command, Some(Command::Release { id: 249504 })));
    assert!(Args::try_parse_from(["diggr", "release", "abc"]).is_err());
  }

  #[test]
  fn cli_definition_is_consistent() {
    Args::command().debug_assert();
  }

  #[test]
  fn describe_release_lists_matches() {
    let release = Release {
      id: 7,
      title: "Tape".into(),
      year: 1999,
      artists: vec![Artist { name: "Band".into(), ..Default::default() }],
      tracklist: vec![Track { position: "B2".into(), title: "Song".into(), ..Default::default() }],
      ..Default::default()
    };
    let videos = vec![
      Video { id: "AAAAAAAAAAA".into(), title: "Band - Song".into(), description: String::new() },
      Video { id: "BBBBBBBBBBB".into(), title: "Live at the club".into(), description: String::new() },
    ];
    let text = describe_release(&release, &videos);
    assert!(text.starts_with("r7  Band – Tape (1999)\n"));
    assert!(text.contains("Videos (2):"));
    assert!(text.contains("watch?v=AAAAAAAAAAA  Band - Song  -> B2 Song (1.00)"));
    assert!(text.contains("watch?v=BBBBBBBBBBB  Live at the club  -> no match"));
  }
}
