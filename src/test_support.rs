//! Minimal HTTP/1.1 stub standing in for the Discogs API in async tests.

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct StubRequest {
  pub method: String,
  /// Path plus query string, e.g. `/releases/1?x=y`.
  pub target: String,
  pub head: String,
  pub body: String,
}

impl StubRequest {
  pub fn header(&self, name: &str) -> Option<&str> {
    self.head.lines().skip(1).find_map(|line| {
      let (k, v) = line.split_once(':')?;
      k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
  }

  pub fn path(&self) -> &str {
    self.target.split('?').next().unwrap_or(&self.target)
  }

  pub fn query(&self, key: &str) -> Option<&str> {
    let (_, query) = self.target.split_once('?')?;
    query.split('&').find_map(|pair| {
      let (k, v) = pair.split_once('=')?;
      (k == key).then_some(v)
    })
  }
}

pub struct StubServer {
  pub base: String,
  requests: Arc<Mutex<Vec<StubRequest>>>,
}

impl StubServer {
  pub fn requests(&self) -> Vec<StubRequest> {
    self.requests.lock().unwrap().clone()
  }
}

/// Bind to an ephemeral port and answer every request with `handler(request) -> (status, body)`.
pub async fn serve<F>(handler: F) -> StubServer
where
  F: Fn(&StubRequest) -> (u16, String) + Send + Sync + 'static,
{
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let base = format!("http://{}", listener.local_addr().unwrap());
  let handler = Arc::new(handler);
  let requests = Arc::new(Mutex::new(Vec::new()));
  let log = requests.clone();

  tokio::spawn(async move {
    while let Ok((socket, _)) = listener.accept().await {
      let handler = handler.clone();
      let log = log.clone();
      tokio::spawn(async move {
        let _ = answer(socket, handler.as_ref(), &log).await;
      });
    }
  });

  StubServer { base, requests }
}

async fn answer<F>(mut socket: TcpStream, handler: &F, log: &Mutex<Vec<StubRequest>>) -> std::io::Result<()>
where
  F: Fn(&StubRequest) -> (u16, String),
{
  let mut buf = Vec::new();
  let mut chunk = [0u8; 4096];
  let head_end = loop {
    let n = socket.read(&mut chunk).await?;
    if n == 0 {
      return Ok(());
    }
    buf.extend_from_slice(&chunk[..n]);
    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
      break pos;
    }
  };

  let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
  let content_length = head
    .lines()
    .find_map(|l| {
      let (k, v) = l.split_once(':')?;
      k.trim().eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
    })
    .unwrap_or(0);
  while buf.len() < head_end + 4 + content_length {
    let n = socket.read(&mut chunk).await?;
    if n == 0 {
      break;
    }
    buf.extend_from_slice(&chunk[..n]);
  }
  let body = String::from_utf8_lossy(&buf[head_end + 4..]).to_string();

  let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
  let request = StubRequest {
    method: request_line.next().unwrap_or_default().to_string(),
    target: request_line.next().unwrap_or_default().to_string(),
    head: head.clone(),
    body,
  };

  let (status, body) = handler(&request);
  log.lock().unwrap().push(request);

  let response = format!(
    "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
    status,
    reason(status),
    body.len(),
    body
  );
  socket.write_all(response.as_bytes()).await?;
  socket.shutdown().await
}

fn reason(status: u16) -> &'static str {
  match status {
    200 => "OK",
    401 => "Unauthorized",
    404 => "Not Found",
    429 => "Too Many Requests",
    500 => "Internal Server Error",
    503 => "Service Unavailable",
    _ => "Status",
  }
}
