//! Completion client for the Gemini `generateContent` endpoint.
//!
//! One request per generation: no retry, no streaming. All traffic flows
//! through the cache controller, so the network stays injectable in tests.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheHandle, FetchRequest};
use crate::constants::constants;
use crate::error::ScriptError;

const INVALID_RESPONSE: &str = "Invalid API response format";

// --- Wire types ---

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(rename = "generationConfig")]
  generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
  parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
  text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  top_k: u32,
  top_p: f32,
  max_output_tokens: u32,
}

impl GenerationConfig {
  fn fixed() -> Self {
    let c = constants();
    Self { temperature: c.temperature, top_k: c.top_k, top_p: c.top_p, max_output_tokens: c.max_output_tokens }
  }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
  content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
  #[serde(default)]
  parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
  error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
  message: String,
}

// --- Client ---

fn request_body(prompt: &str) -> Result<Vec<u8>, ScriptError> {
  let request = GenerateContentRequest {
    contents: vec![Content { parts: vec![Part { text: prompt.to_string() }] }],
    generation_config: GenerationConfig::fixed(),
  };
  serde_json::to_vec(&request).map_err(|e| ScriptError::Completion(format!("failed to encode request: {}", e)))
}

/// Extract the generated text, or reject the payload as malformed. The
/// expected path is `candidates[0].content.parts[0].text`; anything
/// missing along it is the same user-facing error.
fn extract_text(body: &[u8]) -> Result<String, ScriptError> {
  let response: GenerateContentResponse =
    serde_json::from_slice(body).map_err(|_| ScriptError::Completion(INVALID_RESPONSE.to_string()))?;
  response
    .candidates
    .into_iter()
    .next()
    .and_then(|candidate| candidate.content)
    .and_then(|content| content.parts.into_iter().next())
    .and_then(|part| part.text)
    .ok_or_else(|| ScriptError::Completion(INVALID_RESPONSE.to_string()))
}

/// Pull a display message out of a non-2xx response: the envelope's
/// `error.message` when present, otherwise a generic status line.
fn error_message(status: u16, body: &[u8]) -> String {
  serde_json::from_slice::<ErrorEnvelope>(body)
    .ok()
    .and_then(|envelope| envelope.error)
    .map(|detail| detail.message)
    .unwrap_or_else(|| format!("API Error: {}", status))
}

/// Run one completion attempt for `prompt`. The key rides as a query
/// parameter; generation parameters are fixed. The key is never logged.
pub async fn complete(cache: &CacheHandle, api_key: &str, prompt: &str) -> Result<String, ScriptError> {
  let url = Url::parse_with_params(&constants().completion_endpoint, [("key", api_key)])
    .map_err(|e| ScriptError::Completion(format!("invalid completion endpoint: {}", e)))?;

  debug!(prompt_chars = prompt.chars().count(), "sending completion request");
  let request = FetchRequest::post_json(url, request_body(prompt)?);
  let response = cache.fetch(request).await.map_err(|e| ScriptError::Completion(format!("{:#}", e)))?;

  if !response.is_success() {
    let message = error_message(response.status, &response.body);
    warn!(status = response.status, "completion request rejected");
    return Err(ScriptError::Completion(message));
  }

  extract_text(&response.body)
}
