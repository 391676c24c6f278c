//! Filesystem locations and atomic writes shared by the persistence layers.

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Platform data directory for history, cache, and logs.
pub fn data_dir() -> Result<PathBuf> {
  let proj_dirs = ProjectDirs::from("", "", "ysw").ok_or_else(|| anyhow!("no home directory available"))?;
  Ok(proj_dirs.data_dir().to_path_buf())
}

pub fn history_path() -> Result<PathBuf> {
  Ok(data_dir()?.join("history.json"))
}

pub fn cache_root() -> Result<PathBuf> {
  Ok(data_dir()?.join("cache"))
}

pub fn log_dir() -> Result<PathBuf> {
  Ok(data_dir()?.join("logs"))
}

/// Write `data` to `path` atomically: temp file in the same directory,
/// synced, then renamed over the target. Readers either see the old
/// content or the new content, never a partial write.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
  let dir = path.parent().ok_or_else(|| anyhow!("path has no parent: {}", path.display()))?;
  std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
  let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "entry".into());
  let tmp = dir.join(format!(".{}.tmp", file_name));
  {
    let mut file = std::fs::File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    file.write_all(data).with_context(|| format!("failed to write {}", tmp.display()))?;
    file.sync_all().with_context(|| format!("failed to sync {}", tmp.display()))?;
  }
  std::fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
  Ok(())
}
