//! Offline-first response cache.
//!
//! A single spawned task owns the on-disk cache; everything else talks to
//! it through a cloneable [`CacheHandle`]. GET requests are classified by
//! URL and each class gets its own strategy. Completion traffic is
//! network-only; static assets are served cache-first; other documents go
//! network-first with a background write-back. An intercepted request
//! always gets a response; when the network is down the controller
//! synthesizes one instead of failing.

use anyhow::{Context, Result, anyhow};
use reqwest::{Method, Url, header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::storage::write_atomic;

// --- Requests & responses ---

#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub method: Method,
  pub url: Url,
  pub body: Option<Vec<u8>>,
  pub content_type: Option<String>,
}

impl FetchRequest {
  pub fn get(url: Url) -> Self {
    Self { method: Method::GET, url, body: None, content_type: None }
  }

  pub fn post_json(url: Url, body: Vec<u8>) -> Self {
    Self { method: Method::POST, url, body: Some(body), content_type: Some("application/json".to_string()) }
  }
}

/// Where a response came from. Synthesized responses stand in for the
/// network when it is unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOrigin {
  Network,
  Cache,
  Synthesized,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
  pub origin: ResponseOrigin,
}

impl FetchResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

// --- Transport ---

/// The network boundary. The production transport wraps a reqwest client;
/// tests substitute their own.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// Copy of `url` with the query dropped. Logs and error text must never
/// carry the completion key, which rides as a query parameter.
fn redacted(url: &Url) -> Url {
  let mut url = url.clone();
  url.set_query(None);
  url
}

pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new() -> Self {
    Self { client: reqwest::Client::new() }
  }
}

impl Default for HttpTransport {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: &FetchRequest) -> Result<FetchResponse> {
    let mut builder = self.client.request(request.method.clone(), request.url.clone());
    if let Some(ref ct) = request.content_type {
      builder = builder.header(header::CONTENT_TYPE, ct.as_str());
    }
    if let Some(ref body) = request.body {
      builder = builder.body(body.clone());
    }
    // reqwest errors display their URL, query included; strip it before
    // the error can reach a log line or the status bar.
    let response = builder
      .send()
      .await
      .map_err(reqwest::Error::without_url)
      .with_context(|| format!("request to {} failed", redacted(&request.url)))?;
    let status = response.status().as_u16();
    let content_type = response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_string);
    let body = response.bytes().await.map_err(reqwest::Error::without_url).context("failed to read response body")?.to_vec();
    Ok(FetchResponse { status, content_type, body, origin: ResponseOrigin::Network })
  }
}

// --- Classification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchClass {
  /// Non-GET traffic is not intercepted; transport errors propagate.
  Passthrough,
  /// GET to the completion host: network-only, never cached.
  CompletionApi,
  /// GET for a static asset: cache-first.
  StaticAsset,
  /// Everything else: network-first with background cache write-back.
  Document,
}

fn classify(request: &FetchRequest) -> FetchClass {
  if request.method != Method::GET {
    return FetchClass::Passthrough;
  }
  if request.url.host_str() == Some(constants().completion_host.as_str()) {
    return FetchClass::CompletionApi;
  }
  if has_static_extension(request.url.path()) {
    return FetchClass::StaticAsset;
  }
  FetchClass::Document
}

fn has_static_extension(path: &str) -> bool {
  let segment = path.rsplit('/').next().unwrap_or(path);
  match segment.rsplit_once('.') {
    Some((_, ext)) => {
      let ext = ext.to_ascii_lowercase();
      constants().static_extensions.iter().any(|e| e == &ext)
    }
    None => false,
  }
}

// --- Disk store ---

/// Sidecar metadata stored next to each cached body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
  url: String,
  status: u16,
  content_type: Option<String>,
  cached_at: String,
}

/// One generation directory of cached responses. Entries are keyed by the
/// sha256 of the URL; each entry is a body file plus a JSON sidecar.
#[derive(Clone)]
pub struct CacheStore {
  root: PathBuf,
  generation: String,
}

impl CacheStore {
  pub fn new(root: PathBuf, generation: &str) -> Self {
    Self { root, generation: generation.to_string() }
  }

  pub fn generation_dir(&self) -> PathBuf {
    self.root.join(&self.generation)
  }

  fn entry_paths(&self, url: &Url) -> (PathBuf, PathBuf) {
    let name = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    let dir = self.generation_dir();
    (dir.join(format!("{}.meta", name)), dir.join(format!("{}.body", name)))
  }

  /// Look up a cached response. Any read or decode problem is a miss.
  pub fn load(&self, url: &Url) -> Option<FetchResponse> {
    let (meta_path, body_path) = self.entry_paths(url);
    let meta_raw = std::fs::read(&meta_path).ok()?;
    let meta: EntryMeta = serde_json::from_slice(&meta_raw).ok()?;
    let body = std::fs::read(&body_path).ok()?;
    Some(FetchResponse { status: meta.status, content_type: meta.content_type, body, origin: ResponseOrigin::Cache })
  }

  /// Persist a response. The body lands before the sidecar so a visible
  /// sidecar always points at a complete body.
  pub fn store(&self, url: &Url, response: &FetchResponse) -> Result<()> {
    let (meta_path, body_path) = self.entry_paths(url);
    let meta = EntryMeta {
      url: url.as_str().to_string(),
      status: response.status,
      content_type: response.content_type.clone(),
      cached_at: chrono::Local::now().to_rfc3339(),
    };
    let meta_raw = serde_json::to_vec_pretty(&meta).context("failed to encode cache metadata")?;
    write_atomic(&body_path, &response.body)?;
    write_atomic(&meta_path, &meta_raw)?;
    Ok(())
  }

  /// Remove every entry in this generation. The directory is recreated
  /// lazily on the next write.
  pub fn clear(&self) -> Result<()> {
    let dir = self.generation_dir();
    if dir.exists() {
      std::fs::remove_dir_all(&dir).with_context(|| format!("failed to clear cache dir {}", dir.display()))?;
    }
    Ok(())
  }

  /// Delete sibling generation directories left behind by older versions.
  fn remove_stale_generations(&self) {
    let Ok(entries) = std::fs::read_dir(&self.root) else { return };
    for entry in entries.flatten() {
      let path = entry.path();
      if path.is_dir() && entry.file_name().to_string_lossy() != self.generation {
        info!(path = %path.display(), "removing stale cache generation");
        if let Err(e) = std::fs::remove_dir_all(&path) {
          warn!(err = %e, path = %path.display(), "failed to remove stale cache generation");
        }
      }
    }
  }
}

// --- Controller ---

/// Messages accepted by the controller task. `SkipWaiting` and
/// `ClearCache` are fire-and-forget; `Fetch` always answers its reply
/// channel.
pub enum CacheCommand {
  Fetch { request: FetchRequest, reply: oneshot::Sender<Result<FetchResponse>> },
  SkipWaiting,
  ClearCache,
}

/// When the controller begins intercepting: right after install (the
/// default, matching a fresh start), or only once `SkipWaiting` arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
  Immediate,
  Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
  Waiting,
  Active,
}

/// Cheap cloneable handle to the controller task.
#[derive(Clone)]
pub struct CacheHandle {
  tx: mpsc::Sender<CacheCommand>,
}

impl CacheHandle {
  /// Route a request through the controller. Intercepted requests always
  /// resolve to a response; only passthrough traffic and a dead controller
  /// surface errors.
  pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
    let (reply, rx) = oneshot::channel();
    self.tx.send(CacheCommand::Fetch { request, reply }).await.map_err(|_| anyhow!("cache controller is not running"))?;
    rx.await.map_err(|_| anyhow!("cache controller dropped the request"))?
  }

  pub fn skip_waiting(&self) {
    let _ = self.tx.try_send(CacheCommand::SkipWaiting);
  }

  pub fn clear_cache(&self) {
    let _ = self.tx.try_send(CacheCommand::ClearCache);
  }
}

pub struct CacheController {
  store: CacheStore,
  transport: Arc<dyn Transport>,
  lifecycle: Lifecycle,
}

impl CacheController {
  /// Spawn the controller task and return its handle. Install (directory
  /// setup plus best-effort pre-population) runs before the first command
  /// is served.
  pub fn spawn(cache_root: PathBuf, transport: Arc<dyn Transport>, activation: Activation) -> CacheHandle {
    let (tx, rx) = mpsc::channel(64);
    let controller = CacheController {
      store: CacheStore::new(cache_root, &constants().cache_generation),
      transport,
      lifecycle: Lifecycle::Waiting,
    };
    tokio::spawn(controller.run(rx, activation));
    CacheHandle { tx }
  }

  async fn run(mut self, mut rx: mpsc::Receiver<CacheCommand>, activation: Activation) {
    self.install().await;
    if activation == Activation::Immediate {
      self.activate();
    }

    while let Some(command) = rx.recv().await {
      match command {
        CacheCommand::Fetch { request, reply } => {
          let response = self.handle_fetch(request).await;
          let _ = reply.send(response);
        }
        CacheCommand::SkipWaiting => {
          if self.lifecycle == Lifecycle::Waiting {
            self.activate();
          } else {
            debug!("skip-waiting received while already active");
          }
        }
        CacheCommand::ClearCache => match self.store.clear() {
          Ok(()) => info!("cache cleared"),
          Err(e) => warn!(err = %e, "cache clear failed"),
        },
      }
    }
  }

  /// Create the generation directory and pre-populate it. Individual
  /// fetch failures are logged and skipped; install itself never fails.
  async fn install(&mut self) {
    use futures::stream::{self, StreamExt};

    if let Err(e) = std::fs::create_dir_all(self.store.generation_dir()) {
      warn!(err = %e, "failed to create cache generation dir");
    }

    let urls: Vec<Url> = constants()
      .precache_urls
      .iter()
      .filter_map(|raw| match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(e) => {
          warn!(url = %raw, err = %e, "skipping unparseable precache URL");
          None
        }
      })
      .collect();

    let transport = Arc::clone(&self.transport);
    let fetched: Vec<(Url, FetchResponse)> = stream::iter(urls)
      .map(|url| {
        let transport = Arc::clone(&transport);
        async move {
          match transport.send(&FetchRequest::get(url.clone())).await {
            Ok(response) if response.is_success() => Some((url, response)),
            Ok(response) => {
              warn!(url = %url, status = response.status, "precache fetch returned non-success");
              None
            }
            Err(e) => {
              warn!(url = %url, err = %e, "precache fetch failed");
              None
            }
          }
        }
      })
      .buffer_unordered(constants().precache_concurrency)
      .filter_map(|r| async move { r })
      .collect()
      .await;

    let mut cached = 0usize;
    for (url, response) in &fetched {
      match self.store.store(url, response) {
        Ok(()) => cached += 1,
        Err(e) => warn!(url = %url, err = %e, "failed to store precached response"),
      }
    }
    info!(cached, total = constants().precache_urls.len(), "cache install complete");
  }

  /// Drop stale generations, then begin intercepting.
  fn activate(&mut self) {
    self.store.remove_stale_generations();
    self.lifecycle = Lifecycle::Active;
    info!(generation = %self.store.generation, "cache controller active");
  }

  async fn handle_fetch(&mut self, request: FetchRequest) -> Result<FetchResponse> {
    // A waiting controller does not intercept; traffic flows straight to
    // the network and failures propagate.
    if self.lifecycle == Lifecycle::Waiting {
      return self.transport.send(&request).await;
    }

    match classify(&request) {
      FetchClass::Passthrough => self.transport.send(&request).await,
      FetchClass::CompletionApi => Ok(self.fetch_network_only(&request).await),
      FetchClass::StaticAsset => Ok(self.fetch_cache_first(&request).await),
      FetchClass::Document => Ok(self.fetch_network_first(&request).await),
    }
  }

  /// Completion traffic is never cached; an unreachable network becomes a
  /// synthesized 503 so the caller always has an envelope to decode.
  async fn fetch_network_only(&self, request: &FetchRequest) -> FetchResponse {
    match self.transport.send(request).await {
      Ok(response) => response,
      Err(e) => {
        warn!(url = %redacted(&request.url), err = %e, "completion fetch failed, synthesizing offline response");
        offline_completion_response()
      }
    }
  }

  async fn fetch_cache_first(&self, request: &FetchRequest) -> FetchResponse {
    if let Some(cached) = self.store.load(&request.url) {
      debug!(url = %request.url, "static asset served from cache");
      return cached;
    }
    match self.transport.send(request).await {
      Ok(response) => response,
      Err(e) => {
        warn!(url = %request.url, err = %e, "static asset unavailable (cache miss, network down)");
        not_found_response()
      }
    }
  }

  async fn fetch_network_first(&self, request: &FetchRequest) -> FetchResponse {
    match self.transport.send(request).await {
      Ok(response) => {
        if response.is_success() {
          // Write-back happens off the response path.
          let store = self.store.clone();
          let url = request.url.clone();
          let copy = response.clone();
          tokio::spawn(async move {
            if let Err(e) = store.store(&url, &copy) {
              warn!(url = %url, err = %e, "background cache write failed");
            }
          });
        }
        response
      }
      Err(e) => match self.store.load(&request.url) {
        Some(cached) => {
          debug!(url = %request.url, "network down, serving cached copy");
          cached
        }
        None => {
          warn!(url = %request.url, err = %e, "content unavailable offline");
          offline_content_response()
        }
      },
    }
  }
}

// --- Synthesized fallbacks ---

fn offline_completion_response() -> FetchResponse {
  let body = serde_json::json!({
    "error": "Network error. Please check your internet connection and API key."
  });
  FetchResponse {
    status: 503,
    content_type: Some("application/json".to_string()),
    body: body.to_string().into_bytes(),
    origin: ResponseOrigin::Synthesized,
  }
}

fn not_found_response() -> FetchResponse {
  FetchResponse { status: 404, content_type: None, body: b"Resource not found".to_vec(), origin: ResponseOrigin::Synthesized }
}

fn offline_content_response() -> FetchResponse {
  FetchResponse {
    status: 503,
    content_type: None,
    body: b"Content not available offline".to_vec(),
    origin: ResponseOrigin::Synthesized,
  }
}
