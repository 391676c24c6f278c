//! Prompt assembly: pure string work, no I/O.

use serde::{Deserialize, Serialize};

use crate::constants::constants;

/// Script format selector. Serialized into history entries as
/// `"short"` / `"long"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
  Short,
  Long,
}

impl Mode {
  pub fn label(self) -> &'static str {
    match self {
      Mode::Short => "short",
      Mode::Long => "long",
    }
  }

  /// Label shown in the mode selector and result header.
  pub fn display_label(self) -> &'static str {
    match self {
      Mode::Short => "Short (60-90s)",
      Mode::Long => "Long (3-6 min)",
    }
  }

  pub fn toggle(self) -> Mode {
    match self {
      Mode::Short => Mode::Long,
      Mode::Long => Mode::Short,
    }
  }

  pub fn from_config(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "long" => Mode::Long,
      _ => Mode::Short,
    }
  }

  fn template(self) -> &'static str {
    match self {
      Mode::Short => &constants().short_template,
      Mode::Long => &constants().long_template,
    }
  }

  /// Fixed per-mode duration estimate in seconds.
  pub fn estimated_duration_secs(self) -> u32 {
    match self {
      Mode::Short => constants().short_duration_secs,
      Mode::Long => constants().long_duration_secs,
    }
  }
}

/// Assemble the full prompt: the mode's template, a newline, then the
/// topic verbatim. Infallible; input bounds are checked by the session
/// before this runs.
pub fn build_prompt(mode: Mode, topic: &str) -> String {
  format!("{}\n{}", mode.template(), topic)
}

/// Count whitespace-delimited tokens.
pub fn word_count(text: &str) -> usize {
  text.split_whitespace().count()
}

/// Format a second count as `"45s"` or `"1m 15s"`.
pub fn format_duration(seconds: u32) -> String {
  if seconds < 60 {
    return format!("{}s", seconds);
  }
  format!("{}m {}s", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- build_prompt ---

  #[test]
  fn build_prompt_starts_with_template() {
    let prompt = build_prompt(Mode::Short, "cats");
    assert!(prompt.starts_with(&constants().short_template));
    let prompt = build_prompt(Mode::Long, "cats");
    assert!(prompt.starts_with(&constants().long_template));
  }

  #[test]
  fn build_prompt_ends_with_newline_topic() {
    let prompt = build_prompt(Mode::Short, "cats");
    assert!(prompt.ends_with("\ncats"));
  }

  #[test]
  fn build_prompt_keeps_topic_verbatim() {
    let topic = "5G rollout in Pakistan (2025)";
    let prompt = build_prompt(Mode::Long, topic);
    assert!(prompt.ends_with(&format!("\n{}", topic)));
  }

  // --- word_count ---

  #[test]
  fn word_count_basic() {
    assert_eq!(word_count("Meow script"), 2);
    assert_eq!(word_count("one"), 1);
  }

  #[test]
  fn word_count_collapses_whitespace() {
    assert_eq!(word_count("  a\t b \n c  "), 3);
  }

  #[test]
  fn word_count_empty() {
    assert_eq!(word_count(""), 0);
    assert_eq!(word_count("   "), 0);
  }

  // --- format_duration ---

  #[test]
  fn format_duration_under_a_minute() {
    assert_eq!(format_duration(45), "45s");
    assert_eq!(format_duration(0), "0s");
  }

  #[test]
  fn format_duration_minutes() {
    assert_eq!(format_duration(75), "1m 15s");
    assert_eq!(format_duration(300), "5m 0s");
  }

  // --- Mode ---

  #[test]
  fn mode_durations() {
    assert_eq!(Mode::Short.estimated_duration_secs(), 75);
    assert_eq!(Mode::Long.estimated_duration_secs(), 300);
  }

  #[test]
  fn mode_from_config_defaults_to_short() {
    assert_eq!(Mode::from_config("long"), Mode::Long);
    assert_eq!(Mode::from_config("LONG"), Mode::Long);
    assert_eq!(Mode::from_config("short"), Mode::Short);
    assert_eq!(Mode::from_config("invalid"), Mode::Short);
    assert_eq!(Mode::from_config(""), Mode::Short);
  }

  #[test]
  fn mode_toggle_round_trips() {
    assert_eq!(Mode::Short.toggle(), Mode::Long);
    assert_eq!(Mode::Long.toggle(), Mode::Short);
  }

  #[test]
  fn mode_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Mode::Short).unwrap(), "\"short\"");
    assert_eq!(serde_json::to_string(&Mode::Long).unwrap(), "\"long\"");
  }
}
