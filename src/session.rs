//! Session state: one generation at a time, from validation to history.

use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::cache::CacheHandle;
use crate::constants::constants;
use crate::error::ScriptError;
use crate::gemini;
use crate::history::{HistoryEntry, HistoryStore};
use crate::prompt::{Mode, build_prompt, format_duration, word_count};

/// A finished script. Counts and duration are derived from the text and
/// mode on demand; history freezes its own copies.
#[derive(Debug, Clone)]
pub struct GenerationResult {
  pub topic: String,
  pub mode: Mode,
  pub script_text: String,
}

impl GenerationResult {
  pub fn word_count(&self) -> usize {
    word_count(&self.script_text)
  }

  pub fn char_count(&self) -> usize {
    self.script_text.chars().count()
  }

  pub fn duration_display(&self) -> String {
    format_duration(self.mode.estimated_duration_secs())
  }
}

/// Outcome of a finished generation, reported once by `poll_generate`.
#[derive(Debug)]
pub enum GenerateEvent {
  /// Script ready and recorded in history.
  Done(GenerationResult),
  /// Script ready but the history write failed; the entry exists only in
  /// memory until the next successful write.
  DoneStorageFailed(GenerationResult, ScriptError),
  /// Generation failed; any previous result stays as it was.
  Failed(ScriptError),
}

/// Reject requests that must never reach the network.
pub fn validate(api_key: &str, topic: &str) -> Result<(), ScriptError> {
  if api_key.trim().is_empty() {
    return Err(ScriptError::Validation("Please enter your Gemini API key".to_string()));
  }
  let topic = topic.trim();
  if topic.is_empty() {
    return Err(ScriptError::Validation("Please enter a topic".to_string()));
  }
  if topic.chars().count() > constants().topic_max_chars {
    return Err(ScriptError::Validation(format!(
      "Topic is too long (max {} characters)",
      constants().topic_max_chars
    )));
  }
  Ok(())
}

/// Validate `topic`, then build the prompt and run one completion. The
/// interactive session spawns this; the one-shot CLI path awaits it
/// directly.
pub async fn generate_once(
  cache: &CacheHandle,
  api_key: &str,
  topic: &str,
  mode: Mode,
) -> Result<GenerationResult, ScriptError> {
  let topic = topic.trim();
  validate(api_key, topic)?;
  let prompt = build_prompt(mode, topic);
  let script_text = gemini::complete(cache, api_key, &prompt).await?;
  Ok(GenerationResult { topic: topic.to_string(), mode, script_text })
}

/// Everything one user sitting owns: the credential, the last committed
/// topic and mode, the in-flight request, the current result, and the
/// history log.
pub struct Session {
  pub api_key: String,
  pub mode: Mode,
  pub topic: String,
  history: HistoryStore,
  current: Option<GenerationResult>,
  generate_rx: Option<oneshot::Receiver<Result<GenerationResult, ScriptError>>>,
}

impl Session {
  pub fn new(history: HistoryStore, api_key: Option<String>, mode: Mode) -> Self {
    Self {
      api_key: api_key.unwrap_or_default(),
      mode,
      topic: String::new(),
      history,
      current: None,
      generate_rx: None,
    }
  }

  pub fn history(&self) -> &HistoryStore {
    &self.history
  }

  pub fn current(&self) -> Option<&GenerationResult> {
    self.current.as_ref()
  }

  pub fn in_flight(&self) -> bool {
    self.generate_rx.is_some()
  }

  /// Kick off a generation for `topic`. Validation runs here, before any
  /// task is spawned, so a rejected request costs nothing.
  pub fn begin_generate(&mut self, cache: &CacheHandle, topic: &str) -> Result<(), ScriptError> {
    if self.in_flight() {
      return Err(ScriptError::Validation("A script is already being generated".to_string()));
    }
    let topic = topic.trim().to_string();
    validate(&self.api_key, &topic)?;
    self.topic = topic.clone();

    let (tx, rx) = oneshot::channel();
    let cache = cache.clone();
    let api_key = self.api_key.clone();
    let mode = self.mode;
    info!(topic = %topic, mode = mode.label(), "generation started");
    tokio::spawn(async move {
      let outcome = generate_once(&cache, &api_key, &topic, mode).await;
      let _ = tx.send(outcome);
    });
    self.generate_rx = Some(rx);
    Ok(())
  }

  /// Non-blocking check on the in-flight generation. Returns an event
  /// exactly once per generation.
  pub fn poll_generate(&mut self) -> Option<GenerateEvent> {
    let rx = self.generate_rx.as_mut()?;
    match rx.try_recv() {
      Ok(outcome) => {
        self.generate_rx = None;
        Some(self.finish(outcome))
      }
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.generate_rx = None;
        Some(GenerateEvent::Failed(ScriptError::Completion(
          "generation task stopped unexpectedly".to_string(),
        )))
      }
    }
  }

  fn finish(&mut self, outcome: Result<GenerationResult, ScriptError>) -> GenerateEvent {
    match outcome {
      Ok(result) => {
        self.current = Some(result.clone());
        let entry = HistoryEntry::new(result.topic.clone(), result.mode, result.script_text.clone());
        match self.history.add(entry) {
          Ok(()) => {
            info!(words = result.word_count(), "generation finished");
            GenerateEvent::Done(result)
          }
          Err(e) => {
            warn!(kind = e.kind(), err = %e, "script generated but history write failed");
            GenerateEvent::DoneStorageFailed(result, e)
          }
        }
      }
      Err(e) => {
        warn!(kind = e.kind(), err = %e, "generation failed");
        GenerateEvent::Failed(e)
      }
    }
  }

  /// Load a history entry back into the current slot. Returns false when
  /// the index is out of range.
  pub fn load_entry(&mut self, index: usize) -> bool {
    let Some(entry) = self.history.entries().get(index) else {
      return false;
    };
    self.topic = entry.topic.clone();
    self.mode = entry.mode;
    self.current = Some(GenerationResult {
      topic: entry.topic.clone(),
      mode: entry.mode,
      script_text: entry.script_text.clone(),
    });
    true
  }

  pub fn delete_entry(&mut self, index: usize) -> Result<(), ScriptError> {
    self.history.remove(index)
  }

  /// Start over: clear the topic and the current result. History and the
  /// stored credential are untouched.
  pub fn reset(&mut self) {
    self.topic.clear();
    self.current = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::test_transport::{CannedTransport, DownTransport};
  use crate::cache::{Activation, CacheController};
  use std::sync::Arc;
  use std::sync::atomic::Ordering;
  use std::time::Duration;
  use tempfile::TempDir;

  const RESPONSE_BODY: &str = r#"{
    "candidates": [
      { "content": { "parts": [ { "text": "Meow script" } ] } }
    ]
  }"#;

  fn session_in(dir: &TempDir, api_key: Option<&str>) -> Session {
    let history = HistoryStore::open(dir.path().join("history.json"));
    Session::new(history, api_key.map(str::to_string), Mode::Short)
  }

  async fn wait_for_event(session: &mut Session) -> GenerateEvent {
    for _ in 0..100 {
      if let Some(event) = session.poll_generate() {
        return event;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation never finished");
  }

  #[tokio::test]
  async fn generate_records_result_and_history() {
    let dir = TempDir::new().unwrap();
    let (transport, _) = CannedTransport::json(200, RESPONSE_BODY);
    let requests = transport.requests();
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(transport), Activation::Immediate);
    let mut session = session_in(&dir, Some("k1"));

    session.begin_generate(&cache, "cats").unwrap();
    assert!(session.in_flight());

    match wait_for_event(&mut session).await {
      GenerateEvent::Done(result) => {
        assert_eq!(result.script_text, "Meow script");
        assert_eq!(result.word_count(), 2);
        assert_eq!(result.char_count(), 11);
        assert_eq!(result.duration_display(), "1m 15s");
      }
      other => panic!("expected Done, got {:?}", other),
    }

    assert!(!session.in_flight());
    assert_eq!(session.current().unwrap().script_text, "Meow script");
    assert_eq!(session.history().entries()[0].topic, "cats");
    assert_eq!(session.history().entries()[0].word_count, 2);

    // Exactly one request reached the completion endpoint, carrying the
    // assembled prompt rather than the bare topic.
    let sent: Vec<_> = requests
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.url.host_str() == Some(constants().completion_host.as_str()))
      .cloned()
      .collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, reqwest::Method::POST);
    let value: serde_json::Value = serde_json::from_slice(sent[0].body.as_deref().unwrap()).unwrap();
    let prompt = value["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert_eq!(prompt, build_prompt(Mode::Short, "cats"));
    assert!(prompt.starts_with("You are a creative scriptwriter"));
    assert!(prompt.ends_with("Topic to cover:\ncats"));
  }

  #[tokio::test]
  async fn missing_key_never_touches_the_network() {
    let dir = TempDir::new().unwrap();
    let (transport, hits) = CannedTransport::json(200, RESPONSE_BODY);
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(transport), Activation::Immediate);
    // Drain the install precache so the counter only moves for new work.
    let warmup = crate::cache::FetchRequest::get("https://example.com/page".parse().unwrap());
    cache.fetch(warmup).await.unwrap();
    let before = hits.load(Ordering::SeqCst);

    let mut session = session_in(&dir, None);
    let err = session.begin_generate(&cache, "cats").unwrap_err();
    assert_eq!(err.to_string(), "Please enter your Gemini API key");
    assert!(!session.in_flight());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), before);
  }

  #[tokio::test]
  async fn blank_topic_is_rejected() {
    let dir = TempDir::new().unwrap();
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(DownTransport), Activation::Immediate);
    let mut session = session_in(&dir, Some("k1"));

    let err = session.begin_generate(&cache, "   ").unwrap_err();
    assert_eq!(err.to_string(), "Please enter a topic");
    assert!(!session.in_flight());
  }

  #[tokio::test]
  async fn oversized_topic_is_rejected() {
    let dir = TempDir::new().unwrap();
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(DownTransport), Activation::Immediate);
    let mut session = session_in(&dir, Some("k1"));

    let err = session.begin_generate(&cache, &"x".repeat(201)).unwrap_err();
    assert_eq!(err.to_string(), "Topic is too long (max 200 characters)");

    // Exactly at the limit is fine.
    session.begin_generate(&cache, &"x".repeat(200)).unwrap();
  }

  #[tokio::test]
  async fn topic_is_trimmed_before_length_check() {
    let dir = TempDir::new().unwrap();
    let (transport, _) = CannedTransport::json(200, RESPONSE_BODY);
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(transport), Activation::Immediate);
    let mut session = session_in(&dir, Some("k1"));

    let padded = format!("   {}   ", "x".repeat(200));
    session.begin_generate(&cache, &padded).unwrap();
    assert_eq!(session.topic.chars().count(), 200);
  }

  #[tokio::test]
  async fn second_generate_while_in_flight_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (transport, _) = CannedTransport::json(200, RESPONSE_BODY);
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(transport), Activation::Immediate);
    let mut session = session_in(&dir, Some("k1"));

    session.begin_generate(&cache, "cats").unwrap();
    let err = session.begin_generate(&cache, "dogs").unwrap_err();
    assert!(matches!(err, ScriptError::Validation(_)));

    match wait_for_event(&mut session).await {
      GenerateEvent::Done(result) => assert_eq!(result.topic, "cats"),
      other => panic!("expected Done, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn failed_generation_keeps_previous_result() {
    let dir = TempDir::new().unwrap();
    let (transport, _) = CannedTransport::json(200, RESPONSE_BODY);
    let ok_cache = CacheController::spawn(dir.path().join("cache-ok"), Arc::new(transport), Activation::Immediate);
    let down_cache =
      CacheController::spawn(dir.path().join("cache-down"), Arc::new(DownTransport), Activation::Immediate);
    let mut session = session_in(&dir, Some("k1"));

    session.begin_generate(&ok_cache, "cats").unwrap();
    assert!(matches!(wait_for_event(&mut session).await, GenerateEvent::Done(_)));

    session.begin_generate(&down_cache, "dogs").unwrap();
    match wait_for_event(&mut session).await {
      GenerateEvent::Failed(e) => {
        assert!(matches!(e, ScriptError::Completion(_)));
        assert_eq!(e.kind(), "completion");
      }
      other => panic!("expected Failed, got {:?}", other),
    }

    assert_eq!(session.current().unwrap().script_text, "Meow script");
    assert_eq!(session.history().len(), 1);
  }

  #[tokio::test]
  async fn storage_failure_still_reports_the_script() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();

    let (transport, _) = CannedTransport::json(200, RESPONSE_BODY);
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(transport), Activation::Immediate);
    let history = HistoryStore::open(blocker.join("history.json"));
    let mut session = Session::new(history, Some("k1".to_string()), Mode::Short);

    session.begin_generate(&cache, "cats").unwrap();
    match wait_for_event(&mut session).await {
      GenerateEvent::DoneStorageFailed(result, err) => {
        assert_eq!(result.script_text, "Meow script");
        assert!(matches!(err, ScriptError::Storage(_)));
        assert_eq!(err.kind(), "storage");
      }
      other => panic!("expected DoneStorageFailed, got {:?}", other),
    }

    // The result is still usable and the entry lives in memory.
    assert!(session.current().is_some());
    assert_eq!(session.history().len(), 1);
  }

  #[tokio::test]
  async fn load_entry_restores_topic_mode_and_script() {
    let dir = TempDir::new().unwrap();
    let (transport, _) = CannedTransport::json(200, RESPONSE_BODY);
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(transport), Activation::Immediate);
    let mut session = session_in(&dir, Some("k1"));
    session.mode = Mode::Long;

    session.begin_generate(&cache, "cats").unwrap();
    assert!(matches!(wait_for_event(&mut session).await, GenerateEvent::Done(_)));
    session.reset();
    session.mode = Mode::Short;

    assert!(session.load_entry(0));
    assert_eq!(session.topic, "cats");
    assert_eq!(session.mode, Mode::Long);
    assert_eq!(session.current().unwrap().script_text, "Meow script");

    assert!(!session.load_entry(7));
  }

  #[tokio::test]
  async fn reset_clears_topic_and_result_only() {
    let dir = TempDir::new().unwrap();
    let (transport, _) = CannedTransport::json(200, RESPONSE_BODY);
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(transport), Activation::Immediate);
    let mut session = session_in(&dir, Some("k1"));

    session.begin_generate(&cache, "cats").unwrap();
    assert!(matches!(wait_for_event(&mut session).await, GenerateEvent::Done(_)));

    session.reset();
    assert!(session.topic.is_empty());
    assert!(session.current().is_none());
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.api_key, "k1");
  }

  #[test]
  fn delete_entry_out_of_range_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let mut session = session_in(&dir, Some("k1"));
    session.delete_entry(3).unwrap();
    assert!(session.history().is_empty());
  }
}
