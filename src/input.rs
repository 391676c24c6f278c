use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('k') {
    app.open_api_key();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('r') {
    app.open_history();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('y') {
    app.trigger_copy();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('e') {
    app.trigger_export_text();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('p') {
    app.trigger_export_html();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('n') {
    app.reset_session();
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('x') {
    app.trigger_clear_cache();
    return;
  }

  match app.mode {
    AppMode::Topic => handle_topic_key(app, key),
    AppMode::ApiKey => handle_api_key_key(app, key),
    AppMode::History => handle_history_key(app, key),
  }
}

fn handle_topic_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => {
      app.trigger_generate();
    }
    KeyCode::Tab => {
      app.toggle_script_mode();
    }
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
    KeyCode::Up => {
      app.scroll_script_up();
    }
    KeyCode::Down => {
      app.scroll_script_down();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.input.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
      } else {
        app.should_quit = true;
      }
    }
    _ => {}
  }
}

fn handle_api_key_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => {
      app.commit_api_key();
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.key_input, app.key_cursor);
      app.key_input.insert(byte_idx, c);
      app.key_cursor += 1;
    }
    KeyCode::Backspace => {
      if app.key_cursor > 0 {
        app.key_cursor -= 1;
        let byte_idx = char_to_byte_index(&app.key_input, app.key_cursor);
        app.key_input.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if app.key_cursor < app.key_input.chars().count() {
        let byte_idx = char_to_byte_index(&app.key_input, app.key_cursor);
        app.key_input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      app.key_cursor = app.key_cursor.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.key_cursor < app.key_input.chars().count() {
        app.key_cursor += 1;
      }
    }
    KeyCode::Home => {
      app.key_cursor = 0;
    }
    KeyCode::End => {
      app.key_cursor = app.key_input.chars().count();
    }
    KeyCode::Esc => {
      // Discard edits; the session keeps whatever key it had.
      app.mode = AppMode::Topic;
    }
    _ => {}
  }
}

fn handle_history_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.load_selected();
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.select_next_entry();
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.select_prev_entry();
    }
    KeyCode::Delete | KeyCode::Char('d') => {
      app.delete_selected();
    }
    KeyCode::Esc => {
      app.mode = AppMode::Topic;
    }
    _ => {}
  }
}
