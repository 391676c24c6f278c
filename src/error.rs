use thiserror::Error;

/// Errors surfaced by the generation pipeline.
///
/// Every variant maps to a status-line message and leaves the session
/// usable; nothing here aborts the process. The message text is shown to
/// the user verbatim, so variants carry ready-to-display strings.
#[derive(Debug, Error)]
pub enum ScriptError {
  /// Input rejected before any network activity.
  #[error("{0}")]
  Validation(String),

  /// Completion endpoint failure: error envelope, transport error, or a
  /// success payload missing the expected fields.
  #[error("{0}")]
  Completion(String),

  /// History persistence failure. The in-memory log is already mutated
  /// when this is returned; only the write to disk failed.
  #[error("{0}")]
  Storage(String),
}

impl ScriptError {
  /// Short machine-readable kind, used in log fields.
  pub fn kind(&self) -> &'static str {
    match self {
      ScriptError::Validation(_) => "validation",
      ScriptError::Completion(_) => "completion",
      ScriptError::Storage(_) => "storage",
    }
  }
}
