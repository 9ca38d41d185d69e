use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::{
  io::BufReader as TokioBufReader,
  io::AsyncBufReadExt,
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::youtube::watch_url;

/// Playback notifications, one per state change of the current video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
  Playing(String),
  /// mpv exited cleanly at the end of the video.
  Ended(String),
  /// mpv exited with an error (unplayable video, missing yt-dlp).
  Failed(String),
}

/// Audio-only YouTube playback through a single `mpv` child process.
///
/// Starting a video stops whichever one was playing. State changes are sent
/// as [`PlayerEvent`]s; `Ended` or `Failed` fires only when mpv exits by
/// itself, never after [`MusicPlayer::stop`].
pub struct MusicPlayer {
  current_process: Option<TokioChild>,
  current_video: Option<String>,
  events: mpsc::UnboundedSender<PlayerEvent>,
  mpv_monitor_handle: Option<JoinHandle<()>>,
  mpv_status_rx: Option<mpsc::Receiver<String>>,
  last_mpv_status: Option<String>,
  ipc_socket_path: Option<String>,
  pub paused: bool,
}

impl MusicPlayer {
  pub fn new(events: mpsc::UnboundedSender<PlayerEvent>) -> Self {
    Self {
      current_process: None,
      current_video: None,
      events,
      mpv_monitor_handle: None,
      mpv_status_rx: None,
      last_mpv_status: None,
      ipc_socket_path: None,
      paused: false,
    }
  }

  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }

  pub fn current_video(&self) -> Option<&str> {
    self.current_video.as_deref()
  }

  /// Drain mpv's status lines and detect a finished process. Call once per tick.
  pub fn check_mpv_status(&mut self) {
    if let Some(rx) = &mut self.mpv_status_rx {
      while let Ok(status) = rx.try_recv() {
        self.last_mpv_status = Some(status);
      }
    }

    let exit = match self.current_process.as_mut().map(|child| child.try_wait()) {
      Some(Ok(Some(status))) => {
        debug!(?status, "player: mpv exited");
        Some(status.success())
      }
      Some(Err(e)) => {
        warn!(err = %e, "player: failed to poll mpv");
        Some(false)
      }
      _ => None,
    };

    if let Some(success) = exit {
      self.current_process = None;
      self.cleanup();
      if let Some(video_id) = self.current_video.take() {
        let event = if success { PlayerEvent::Ended(video_id) } else { PlayerEvent::Failed(video_id) };
        let _ = self.events.send(event);
      }
    }
  }

  pub fn get_last_mpv_status(&self) -> Option<String> {
    self.last_mpv_status.clone()
  }

  pub async fn play(&mut self, video_id: &str) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;
    self.paused = false;

    let socket_path = std::env::temp_dir().join(format!("diggr-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let url = watch_url(video_id);
    let mut cmd = Command::new("mpv");
    cmd.args([
      "--no-video",
      "--term-status-msg=Time: ${time-pos/full} / ${duration/full} | ${pause} ${percent-pos}%",
      &format!("--input-ipc-server={}", socket_path_str),
      &url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    // stderr is never drained; piping it would eventually block mpv.
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let stdout = child.stdout.take().context("Failed to get mpv stdout")?;
    let (tx, rx) = mpsc::channel::<String>(10);
    self.mpv_status_rx = Some(rx);

    let monitor_handle = tokio::spawn(async move {
      let reader = TokioBufReader::new(stdout);
      let mut lines = reader.lines();
      while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
          break;
        }
      }
    });

    info!(video_id, "player: started mpv");
    self.current_process = Some(child);
    self.current_video = Some(video_id.to_string());
    self.mpv_monitor_handle = Some(monitor_handle);
    self.ipc_socket_path = Some(socket_path_str);
    let _ = self.events.send(PlayerEvent::Playing(video_id.to_string()));
    Ok(())
  }

  pub async fn toggle_pause(&mut self) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let stream = tokio::net::UnixStream::connect(socket_path).await.context("Failed to connect to mpv IPC socket")?;
    stream.writable().await.context("mpv IPC socket not writable")?;
    let cmd = b"{\"command\":[\"cycle\",\"pause\"]}\n";
    let written = stream.try_write(cmd).context("Failed to send pause command to mpv")?;
    if written < cmd.len() {
      return Err(anyhow!("Partial write to mpv IPC socket: wrote {} of {} bytes", written, cmd.len()));
    }
    self.paused = !self.paused;
    Ok(())
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }
    self.current_video = None;
    self.paused = false;
    self.cleanup();
    Ok(())
  }

  fn cleanup(&mut self) {
    if let Some(handle) = self.mpv_monitor_handle.take() {
      handle.abort();
    }
    self.mpv_status_rx = None;
    self.last_mpv_status = None;
    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
  }
}
