//! Getting a finished script out of the terminal: clipboard, text, HTML.

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::io::Write;
use std::path::PathBuf;

use crate::cache::{CacheHandle, FetchRequest};
use crate::constants::constants;
use crate::session::GenerationResult;
use crate::storage::write_atomic;

/// Copy via OSC 52, which works locally and over ssh alike. Terminals cap
/// the payload, so a very long script may arrive truncated.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
  let mut stdout = std::io::stdout();
  write!(stdout, "\x1b]52;c;{}\x07", STANDARD.encode(text))?;
  stdout.flush()?;
  Ok(())
}

/// Write the script as plain text next to the user's other downloads.
pub fn export_text(result: &GenerationResult) -> Result<PathBuf> {
  let path = export_dir().join(format!("{}-script.txt", slug(&result.topic)));
  write_atomic(&path, result.script_text.as_bytes()).with_context(|| format!("failed to write {}", path.display()))?;
  Ok(path)
}

/// Render the script as a standalone HTML page. The stylesheet comes
/// through the offline cache, so this keeps working without a connection
/// once the asset has been seen.
pub async fn export_html(result: &GenerationResult, cache: &CacheHandle) -> Result<PathBuf> {
  let style = match stylesheet(cache).await {
    Some(css) => format!("<style>\n{}\n</style>", css),
    None => String::new(),
  };
  let page = render_page(result, &style);
  let path = export_dir().join(format!("{}-script.html", slug(&result.topic)));
  write_atomic(&path, page.as_bytes()).with_context(|| format!("failed to write {}", path.display()))?;
  Ok(path)
}

async fn stylesheet(cache: &CacheHandle) -> Option<String> {
  let url = constants().export_stylesheet_url.parse().ok()?;
  let response = cache.fetch(FetchRequest::get(url)).await.ok()?;
  response.is_success().then(|| response.text())
}

fn render_page(result: &GenerationResult, style: &str) -> String {
  let title = escape_html(&result.topic);
  format!(
    "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n{style}\n</head>\n\
     <body>\n<h1>{title}</h1>\n<p>{mode}, {words} words, {duration}</p>\n<pre>{script}</pre>\n</body>\n</html>\n",
    title = title,
    style = style,
    mode = result.mode.display_label(),
    words = result.word_count(),
    duration = result.duration_display(),
    script = escape_html(&result.script_text),
  )
}

fn export_dir() -> PathBuf {
  if let Some(dirs) = directories::UserDirs::new() {
    if let Some(downloads) = dirs.download_dir() {
      return downloads.to_path_buf();
    }
    return dirs.home_dir().to_path_buf();
  }
  PathBuf::from(".")
}

fn slug(topic: &str) -> String {
  let mut out = String::new();
  for c in topic.chars().take(60) {
    if c.is_ascii_alphanumeric() {
      out.push(c.to_ascii_lowercase());
    } else if !out.is_empty() && !out.ends_with('-') {
      out.push('-');
    }
  }
  let trimmed = out.trim_matches('-');
  if trimmed.is_empty() { "script".to_string() } else { trimmed.to_string() }
}

fn escape_html(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      _ => out.push(c),
    }
  }
  out
}
