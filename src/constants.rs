//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available —
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Completion API
  pub completion_endpoint: String,
  pub completion_host: String,
  pub temperature: f32,
  pub top_k: u32,
  pub top_p: f32,
  pub max_output_tokens: u32,

  // Input / history bounds
  pub topic_max_chars: usize,
  pub history_limit: usize,
  pub history_topic_width: usize,

  // Duration estimates per mode (seconds)
  pub short_duration_secs: u32,
  pub long_duration_secs: u32,

  // Prompt templates
  pub short_template: String,
  pub long_template: String,

  // Offline cache
  pub cache_generation: String,
  pub static_extensions: Vec<String>,
  pub precache_urls: Vec<String>,
  pub precache_concurrency: usize,

  // Export
  pub export_stylesheet_url: String,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn constants_parse() {
    let c = constants();
    assert_eq!(c.history_limit, 20);
    assert_eq!(c.topic_max_chars, 200);
    assert_eq!(c.short_duration_secs, 75);
    assert_eq!(c.long_duration_secs, 300);
  }

  #[test]
  fn templates_end_with_topic_line() {
    let c = constants();
    assert!(c.short_template.ends_with("Topic to cover:"));
    assert!(c.long_template.ends_with("Topic to cover:"));
  }

  #[test]
  fn completion_endpoint_matches_host() {
    let c = constants();
    assert!(c.completion_endpoint.contains(&c.completion_host));
  }
}
