use crate::generators::serial::{MAX_SERIAL_LEN, MIN_SERIAL_LEN};
use crate::generators::{serial, GeneratorContext, MacStrategy};
use crate::store::write_atomic;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub logging: LoggingConfig,
  pub storage: StorageConfig,
  pub generation: GenerationConfig,
  pub cache: CacheConfig,
}

impl Config {
  pub fn generator_context(&self) -> GeneratorContext {
    GeneratorContext {
      manufacturer: self.generation.preferred_manufacturer.clone(),
      serial_length: self.generation.serial_length,
      mac_strategy: self.generation.mac_strategy,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
  /// Relative paths are taken from the base directory.
  #[serde(default = "default_profiles_file")]
  pub profiles_file: String,
}

fn default_profiles_file() -> String {
  "profiles.json".to_string()
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      profiles_file: default_profiles_file(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
  #[serde(default = "default_serial_length")]
  pub serial_length: usize,

  #[serde(default)]
  pub preferred_manufacturer: Option<String>,

  #[serde(default)]
  pub mac_strategy: MacStrategy,
}

fn default_serial_length() -> usize {
  serial::DEFAULT_SERIAL_LEN
}

impl Default for GenerationConfig {
  fn default() -> Self {
    Self {
      serial_length: default_serial_length(),
      preferred_manufacturer: None,
      mac_strategy: MacStrategy::default(),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
  /// Log every hook resolution at debug level.
  #[serde(default)]
  pub log_resolutions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub logging: Option<LoggingConfig>,

  #[serde(default)]
  pub storage: Option<StorageConfig>,

  #[serde(default)]
  pub generation: Option<GenerationConfig>,

  #[serde(default)]
  pub cache: Option<CacheConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(l) = self.logging {
      cfg.logging = l;
    }
    if let Some(s) = self.storage {
      cfg.storage = s;
    }
    if let Some(g) = self.generation {
      cfg.generation = g;
    }
    if let Some(c) = self.cache {
      cfg.cache = c;
    }

    if let Some(reason) = validate_generation_config(&cfg.generation) {
      tracing::warn!(reason = %reason, "generation config invalid; using defaults");
      cfg.generation = GenerationConfig::default();
    }
    if cfg.storage.profiles_file.trim().is_empty() {
      tracing::warn!("storage.profiles_file is empty; using default");
      cfg.storage = StorageConfig::default();
    }

    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.logging.is_none()
      || self.storage.is_none()
      || self.generation.is_none()
      || self.cache.is_none()
  }
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, true)
}

pub fn load_or_default_readonly(path: &Path) -> anyhow::Result<Config> {
  load_impl(path, false)
}

fn load_impl(path: &Path, allow_writes: bool) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  if allow_writes {
    fs::create_dir_all(parent)?;
  }

  if !path.exists() {
    let cfg = Config::default();
    if allow_writes {
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
    } else {
      eprintln!(
        "veil: config missing at {}; using defaults in read-only mode (--dry-run).",
        path.display()
      );
    }
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let cfg = file.clone().normalize();
      if allow_writes && file.needs_upgrade() {
        let ts = std::time::SystemTime::now()
          .duration_since(std::time::UNIX_EPOCH)
          .unwrap_or_default()
          .as_secs();
        let backup = parent.join(format!("config.toml.bak-{ts}"));
        let _ = fs::copy(path, &backup);
        let _ = write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?);
        eprintln!(
          "veil: upgraded config defaults written to {} (backup: {})",
          path.display(),
          backup.display()
        );
      } else if !allow_writes && file.needs_upgrade() {
        eprintln!(
          "veil: config at {} needs upgrade; proceeding without writing in --dry-run mode.",
          path.display()
        );
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      if allow_writes {
        let ts = std::time::SystemTime::now()
          .duration_since(std::time::UNIX_EPOCH)
          .unwrap_or_default()
          .as_secs();
        let backup = parent.join(format!("config.toml.bad-{ts}"));
        let _ = fs::rename(path, &backup);
        write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
        eprintln!(
          "veil: invalid config at {} (backed up to {}): {e}",
          path.display(),
          backup.display()
        );
      } else {
        eprintln!(
          "veil: invalid config at {}; using defaults in read-only mode (--dry-run): {e}",
          path.display()
        );
      }
      Ok(cfg)
    }
  }
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    logging: Some(cfg.logging.clone()),
    storage: Some(cfg.storage.clone()),
    generation: Some(cfg.generation.clone()),
    cache: Some(cfg.cache.clone()),
  }
}

fn validate_generation_config(cfg: &GenerationConfig) -> Option<String> {
  if !(MIN_SERIAL_LEN..=MAX_SERIAL_LEN).contains(&cfg.serial_length) {
    return Some(format!(
      "serial_length must be within {MIN_SERIAL_LEN}..={MAX_SERIAL_LEN}, got {}",
      cfg.serial_length
    ));
  }
  if let Some(m) = cfg.preferred_manufacturer.as_deref() {
    if serial::format_for(m).is_none() {
      return Some(format!("unknown preferred_manufacturer: {m}"));
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_is_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.generation.serial_length, 11);
    assert_eq!(cfg.storage.profiles_file, "profiles.json");
    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("[generation]"));
  }

  #[test]
  fn readonly_load_never_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    load_or_default_readonly(&path).unwrap();
    assert!(!path.exists());
  }

  #[test]
  fn partial_file_is_upgraded_with_backup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[generation]\nserial_length = 14\nmac_strategy = \"vendor\"\n").unwrap();
    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.generation.serial_length, 14);
    assert_eq!(cfg.generation.mac_strategy, MacStrategy::Vendor);
    assert!(fs::read_to_string(&path).unwrap().contains("[cache]"));
    let backups = fs::read_dir(dir.path())
      .unwrap()
      .filter_map(|e| e.ok())
      .filter(|e| e.file_name().to_string_lossy().starts_with("config.toml.bak-"))
      .count();
    assert_eq!(backups, 1);
  }

  #[test]
  fn invalid_generation_values_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[generation]\nserial_length = 40\n").unwrap();
    let cfg = load_or_default_readonly(&path).unwrap();
    assert_eq!(cfg.generation.serial_length, 11);

    fs::write(&path, "[generation]\npreferred_manufacturer = \"Acme\"\n").unwrap();
    let cfg = load_or_default_readonly(&path).unwrap();
    assert_eq!(cfg.generation.preferred_manufacturer, None);
  }

  #[test]
  fn unparseable_file_is_moved_aside() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "this is = = not toml").unwrap();
    let cfg = load_or_create_default(&path).unwrap();
    assert_eq!(cfg.logging.level, "info");
    assert!(toml::from_str::<toml::Value>(&fs::read_to_string(&path).unwrap()).is_ok());
  }

  #[test]
  fn context_follows_generation_section() {
    let mut cfg = Config::default();
    cfg.generation.preferred_manufacturer = Some("Sony".into());
    cfg.generation.serial_length = 9;
    let ctx = cfg.generator_context();
    assert_eq!(ctx.vendor(), Some("Sony"));
    assert_eq!(ctx.serial_length, 9);
  }
}
