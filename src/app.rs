use anyhow::Result;
use ratatui::widgets::ListState;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::cache::CacheHandle;
use crate::config::Config;
use crate::export;
use crate::session::{GenerateEvent, Session};
use crate::theme::THEMES;

// --- Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Topic,
  ApiKey,
  History,
}

pub struct App {
  pub session: Session,
  pub cache: CacheHandle,
  pub mode: AppMode,
  pub theme_index: usize,
  /// Topic input buffer and its editing state.
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  /// API key input buffer and its editing state. Committed to the session
  /// on Enter, never logged, masked on screen.
  pub key_input: String,
  pub key_cursor: usize,
  pub key_scroll: usize,
  pub list_state: ListState,
  /// Vertical scroll offset for the script pane.
  pub script_scroll: u16,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message — shown with info icon, lower priority than status/error.
  pub info_message: Option<String>,
  pub should_quit: bool,
  pub(crate) export_rx: Option<oneshot::Receiver<Result<PathBuf>>>,
  /// When the last error was set — used for auto-dismiss after 5 seconds.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(session: Session, cache: CacheHandle, config: &Config) -> Self {
    let theme_index =
      if let Some(ref name) = config.theme_name { THEMES.iter().position(|t| t.name == name).unwrap_or(0) } else { 0 };
    let key_input = session.api_key.clone();
    let key_cursor = key_input.chars().count();

    Self {
      session,
      cache,
      mode: AppMode::Topic,
      theme_index,
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      key_input,
      key_cursor,
      key_scroll: 0,
      list_state: ListState::default(),
      script_scroll: 0,
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      export_rx: None,
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is always bounded by modular arithmetic in next_theme()
    // and clamped to THEMES.len() - 1 on initialization.
    &THEMES[self.theme_index]
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  /// Clear the current error message and its expiry timer.
  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  fn save_config(&self) {
    let config = Config {
      api_key: (!self.session.api_key.is_empty()).then(|| self.session.api_key.clone()),
      theme_name: Some(self.theme().name.to_string()),
      default_mode: Some(self.session.mode.label().to_string()),
    };
    config.save();
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  pub fn toggle_script_mode(&mut self) {
    self.session.mode = self.session.mode.toggle();
    self.save_config();
  }

  pub fn scroll_script_up(&mut self) {
    self.script_scroll = self.script_scroll.saturating_sub(1);
  }

  pub fn scroll_script_down(&mut self) {
    let Some(result) = self.session.current() else { return };
    // Upper bound on wrapped line count at any sane terminal width.
    let max = (result.script_text.chars().count() / 20 + result.script_text.lines().count()) as u16;
    self.script_scroll = self.script_scroll.saturating_add(1).min(max);
  }

  /// Poll in-flight work: the generation owned by the session and any
  /// running export. Called once per tick from the run loop.
  pub fn check_pending(&mut self) {
    if let Some(event) = self.session.poll_generate() {
      self.status_message = None;
      self.script_scroll = 0;
      match event {
        GenerateEvent::Done(_) => {
          self.info_message = None;
        }
        GenerateEvent::DoneStorageFailed(_, e) => {
          self.set_error(format!("Script ready, but saving history failed: {}", e));
        }
        GenerateEvent::Failed(e) => {
          self.set_error(e.to_string());
        }
      }
    }

    if let Some(mut rx) = self.export_rx.take() {
      match rx.try_recv() {
        Ok(Ok(path)) => {
          self.status_message = None;
          info!(path = %path.display(), "export finished");
          self.info_message = Some(format!("Saved {}", path.display()));
        }
        Ok(Err(e)) => {
          self.status_message = None;
          warn!(err = %e, "export failed");
          self.set_error(format!("Export failed: {:#}", e));
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.export_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Export task failed.".to_string());
        }
      }
    }
  }

  pub fn trigger_generate(&mut self) {
    if self.session.in_flight() {
      self.info_message = Some("Already generating, hang on…".to_string());
      return;
    }
    self.clear_error();
    self.info_message = None;
    match self.session.begin_generate(&self.cache, &self.input) {
      Ok(()) => {
        self.status_message = Some("Generating script…".to_string());
        // The key that just went out is worth keeping.
        self.save_config();
      }
      Err(e) => self.set_error(e.to_string()),
    }
  }

  /// Start over: clear the topic input and the current result. An
  /// in-flight generation keeps running and will still land in history.
  pub fn reset_session(&mut self) {
    self.session.reset();
    self.input.clear();
    self.cursor_position = 0;
    self.input_scroll = 0;
    self.script_scroll = 0;
    self.clear_error();
    self.info_message = None;
    if !self.session.in_flight() {
      self.status_message = None;
    }
  }

  // --- API key editing ---

  pub fn open_api_key(&mut self) {
    self.key_input = self.session.api_key.clone();
    self.key_cursor = self.key_input.chars().count();
    self.key_scroll = 0;
    self.mode = AppMode::ApiKey;
  }

  pub fn commit_api_key(&mut self) {
    self.session.api_key = self.key_input.trim().to_string();
    self.save_config();
    self.mode = AppMode::Topic;
    self.info_message = if self.session.api_key.is_empty() {
      Some("API key cleared.".to_string())
    } else {
      Some("API key saved.".to_string())
    };
  }

  // --- Exports ---

  pub fn trigger_copy(&mut self) {
    let Some(result) = self.session.current() else {
      self.info_message = Some("Nothing to copy yet.".to_string());
      return;
    };
    match export::copy_to_clipboard(&result.script_text) {
      Ok(()) => self.info_message = Some("Script copied to clipboard.".to_string()),
      Err(e) => self.set_error(format!("Copy failed: {}", e)),
    }
  }

  pub fn trigger_export_text(&mut self) {
    let Some(result) = self.session.current() else {
      self.info_message = Some("Nothing to export yet.".to_string());
      return;
    };
    match export::export_text(result) {
      Ok(path) => self.info_message = Some(format!("Saved {}", path.display())),
      Err(e) => self.set_error(format!("Export failed: {:#}", e)),
    }
  }

  pub fn trigger_export_html(&mut self) {
    if self.export_rx.is_some() {
      self.info_message = Some("An export is already running.".to_string());
      return;
    }
    let Some(result) = self.session.current() else {
      self.info_message = Some("Nothing to export yet.".to_string());
      return;
    };
    let result = result.clone();
    let cache = self.cache.clone();
    self.status_message = Some("Exporting…".to_string());

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(export::export_html(&result, &cache).await);
    });
    self.export_rx = Some(rx);
  }

  // --- History ---

  pub fn open_history(&mut self) {
    if self.session.history().is_empty() {
      self.info_message = Some("No history yet.".to_string());
      return;
    }
    self.list_state.select(Some(0));
    self.mode = AppMode::History;
  }

  pub fn select_next_entry(&mut self) {
    let len = self.session.history().len();
    if len == 0 {
      return;
    }
    let next = match self.list_state.selected() {
      Some(i) if i + 1 < len => i + 1,
      Some(i) => i,
      None => 0,
    };
    self.list_state.select(Some(next));
  }

  pub fn select_prev_entry(&mut self) {
    if self.session.history().is_empty() {
      return;
    }
    let prev = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
    self.list_state.select(Some(prev));
  }

  /// Bring the selected entry back as the current script and refill the
  /// topic input so it can be regenerated or tweaked.
  pub fn load_selected(&mut self) {
    let Some(index) = self.list_state.selected() else { return };
    if self.session.load_entry(index) {
      self.input = self.session.topic.clone();
      self.cursor_position = self.input.chars().count();
      self.input_scroll = 0;
      self.script_scroll = 0;
      self.mode = AppMode::Topic;
      self.info_message = Some("Loaded from history.".to_string());
    }
  }

  pub fn delete_selected(&mut self) {
    let Some(index) = self.list_state.selected() else { return };
    if let Err(e) = self.session.delete_entry(index) {
      self.set_error(e.to_string());
      return;
    }
    let len = self.session.history().len();
    if len == 0 {
      self.list_state.select(None);
      self.mode = AppMode::Topic;
    } else if index >= len {
      self.list_state.select(Some(len - 1));
    }
  }

  // --- Maintenance ---

  pub fn trigger_clear_cache(&mut self) {
    self.cache.clear_cache();
    info!("offline cache clear requested");
    self.info_message = Some("Offline cache cleared.".to_string());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::test_transport::CannedTransport;
  use crate::cache::{Activation, CacheController};
  use crate::history::{HistoryEntry, HistoryStore};
  use crate::prompt::Mode;
  use std::sync::Arc;
  use tempfile::TempDir;

  async fn make_app(dir: &TempDir, entries: usize) -> App {
    let (transport, _) = CannedTransport::json(200, "{}");
    let cache = CacheController::spawn(dir.path().join("cache"), Arc::new(transport), Activation::Immediate);
    let mut history = HistoryStore::open(dir.path().join("history.json"));
    for i in 0..entries {
      history
        .add(HistoryEntry::new(format!("topic-{}", i), Mode::Short, format!("script {}", i)))
        .unwrap();
    }
    let session = Session::new(history, Some("k1".to_string()), Mode::Short);
    App::new(session, cache, &Config::default())
  }

  #[tokio::test]
  async fn open_history_selects_the_first_entry() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 3).await;

    app.open_history();
    assert_eq!(app.mode, AppMode::History);
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[tokio::test]
  async fn open_history_with_no_entries_stays_put() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 0).await;

    app.open_history();
    assert_eq!(app.mode, AppMode::Topic);
    assert!(app.info_message.is_some());
  }

  #[tokio::test]
  async fn selection_clamps_at_both_ends() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 2).await;
    app.open_history();

    app.select_prev_entry();
    assert_eq!(app.list_state.selected(), Some(0));
    app.select_next_entry();
    app.select_next_entry();
    assert_eq!(app.list_state.selected(), Some(1));
  }

  #[tokio::test]
  async fn load_selected_refills_the_topic_input() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 2).await;
    app.open_history();
    app.select_next_entry();

    app.load_selected();
    assert_eq!(app.mode, AppMode::Topic);
    assert_eq!(app.input, "topic-0");
    assert_eq!(app.cursor_position, 7);
    assert_eq!(app.session.current().unwrap().script_text, "script 0");
  }

  #[tokio::test]
  async fn delete_selected_moves_the_selection_up() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 2).await;
    app.open_history();
    app.select_next_entry();

    app.delete_selected();
    assert_eq!(app.session.history().len(), 1);
    assert_eq!(app.list_state.selected(), Some(0));
    assert_eq!(app.mode, AppMode::History);
  }

  #[tokio::test]
  async fn deleting_the_last_entry_returns_to_the_topic_pane() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 1).await;
    app.open_history();

    app.delete_selected();
    assert!(app.session.history().is_empty());
    assert_eq!(app.mode, AppMode::Topic);
    assert_eq!(app.list_state.selected(), None);
  }

  #[tokio::test]
  async fn copy_without_a_script_is_informational() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 0).await;

    app.trigger_copy();
    assert!(app.last_error.is_none());
    assert_eq!(app.info_message.as_deref(), Some("Nothing to copy yet."));
  }

  #[tokio::test]
  async fn reset_clears_the_input_and_messages() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 1).await;
    app.input = "half-typed topic".to_string();
    app.cursor_position = 5;
    app.set_error("boom".to_string());

    app.reset_session();
    assert!(app.input.is_empty());
    assert_eq!(app.cursor_position, 0);
    assert!(app.last_error.is_none());
    assert_eq!(app.session.history().len(), 1);
  }

  #[tokio::test]
  async fn tiny_terminal_renders_without_panicking() {
    let dir = TempDir::new().unwrap();
    let mut app = make_app(&dir, 0).await;
    app.input = "a topic wider than the whole pane".to_string();
    app.cursor_position = app.input.chars().count();

    // Four columns leave the input box no interior at all.
    let backend = ratatui::backend::TestBackend::new(4, 12);
    let mut terminal = ratatui::Terminal::new(backend).unwrap();
    terminal.draw(|frame| crate::ui::ui(frame, &mut app)).unwrap();

    app.open_api_key();
    terminal.draw(|frame| crate::ui::ui(frame, &mut app)).unwrap();
  }
}
