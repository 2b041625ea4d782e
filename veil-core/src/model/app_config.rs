use super::SpoofType;
use crate::types::now_unix_ms;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-package override layered on top of the profile assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
  pub package_name: String,

  #[serde(default = "default_true")]
  pub is_enabled: bool,

  /// Mirror of the profile whose `assigned_apps` holds this package.
  #[serde(default)]
  pub profile_id: Option<String>,

  /// Empty means every type is enabled. A correlated type stands for its
  /// whole group.
  #[serde(default)]
  pub enabled_types: BTreeSet<SpoofType>,

  #[serde(default)]
  pub created_at: u64,

  #[serde(default)]
  pub updated_at: u64,
}

fn default_true() -> bool {
  true
}

impl AppConfig {
  pub fn new(package_name: impl Into<String>) -> Self {
    let now = now_unix_ms();
    Self {
      package_name: package_name.into(),
      is_enabled: true,
      profile_id: None,
      enabled_types: BTreeSet::new(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn allows(&self, ty: SpoofType) -> bool {
    if !self.is_enabled {
      return false;
    }
    if self.enabled_types.is_empty() || self.enabled_types.contains(&ty) {
      return true;
    }
    let group = ty.correlation_group();
    group.is_correlated()
      && self
        .enabled_types
        .iter()
        .any(|t| t.correlation_group() == group)
  }

  pub fn with_enabled(&self, enabled: bool) -> Self {
    Self {
      is_enabled: enabled,
      updated_at: now_unix_ms(),
      ..self.clone()
    }
  }

  /// Correlated types are widened to all members of their group.
  pub fn with_types(&self, types: impl IntoIterator<Item = SpoofType>) -> Self {
    let mut enabled_types = BTreeSet::new();
    for ty in types {
      let group = ty.correlation_group();
      if group.is_correlated() {
        enabled_types.extend(group.members());
      } else {
        enabled_types.insert(ty);
      }
    }
    Self {
      enabled_types,
      updated_at: now_unix_ms(),
      ..self.clone()
    }
  }
}
