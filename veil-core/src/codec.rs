//! Text form of a [`ConfigSnapshot`], shared by the file on disk, the
//! store and the hook-side cache.

use crate::model::ConfigSnapshot;
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub fn encode(snapshot: &ConfigSnapshot) -> Result<String> {
  serde_json::to_string_pretty(snapshot).context("serialize config snapshot")
}

/// Parses a blob as written; no normalization is applied so a round-trip
/// gives back exactly what was encoded.
pub fn decode(blob: &str) -> Result<ConfigSnapshot> {
  if blob.trim().is_empty() {
    return Ok(ConfigSnapshot::default());
  }
  serde_json::from_str(blob).context("parse config snapshot")
}

/// Like [`decode`], but a corrupt blob yields an empty snapshot.
pub fn decode_or_default(blob: &str) -> ConfigSnapshot {
  match decode(blob) {
    Ok(snapshot) => snapshot,
    Err(err) => {
      tracing::warn!(error = ?err, "config snapshot unreadable; continuing with no profiles");
      ConfigSnapshot::default()
    }
  }
}

pub fn digest(blob: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(blob.as_bytes());
  hasher
    .finalize()
    .iter()
    .map(|b| format!("{b:02x}"))
    .collect()
}
