use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_DIR: &str = "/data/adb/veil";

/// `VEIL_HOME` when set, otherwise the module data directory.
pub fn base_dir() -> anyhow::Result<PathBuf> {
  match std::env::var_os("VEIL_HOME") {
    Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
    _ => Ok(PathBuf::from(DEFAULT_BASE_DIR)),
  }
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}

/// Absolute `profiles_file` values are used as-is.
pub fn profiles_path(base: &Path, profiles_file: &str) -> PathBuf {
  let p = Path::new(profiles_file);
  if p.is_absolute() {
    p.to_path_buf()
  } else {
    base.join(p)
  }
}
