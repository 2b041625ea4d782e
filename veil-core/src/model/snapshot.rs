use super::{AppConfig, Profile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const SCHEMA_VERSION: u32 = 1;

/// Everything that gets persisted: profiles in stored order, per-app
/// overrides and the global switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
  #[serde(default = "default_schema")]
  pub schema_version: u32,

  #[serde(default = "default_true")]
  pub module_enabled: bool,

  /// Bumped on every write. Nothing reads it to detect changes.
  #[serde(default)]
  pub config_version: u64,

  #[serde(default)]
  pub profiles: Vec<Profile>,

  #[serde(default)]
  pub app_configs: BTreeMap<String, AppConfig>,
}

fn default_schema() -> u32 {
  SCHEMA_VERSION
}

fn default_true() -> bool {
  true
}

impl Default for ConfigSnapshot {
  fn default() -> Self {
    Self {
      schema_version: SCHEMA_VERSION,
      module_enabled: true,
      config_version: 0,
      profiles: Vec::new(),
      app_configs: BTreeMap::new(),
    }
  }
}

impl ConfigSnapshot {
  pub fn profile(&self, id: &str) -> Option<&Profile> {
    self.profiles.iter().find(|p| p.id == id)
  }

  pub fn profile_by_name(&self, name: &str) -> Option<&Profile> {
    self.profiles.iter().find(|p| p.name == name)
  }

  /// Looks a profile up by id first, then by name.
  pub fn find_profile(&self, id_or_name: &str) -> Option<&Profile> {
    self.profile(id_or_name).or_else(|| self.profile_by_name(id_or_name))
  }

  pub fn default_profile(&self) -> Option<&Profile> {
    self.profiles.iter().find(|p| p.is_default)
  }

  pub fn assigned_profile(&self, package: &str) -> Option<&Profile> {
    self.profiles.iter().find(|p| p.has_app(package))
  }

  pub fn app_config(&self, package: &str) -> Option<&AppConfig> {
    self.app_configs.get(package)
  }

  /// Swaps in `profile` for the entry with the same id. Returns false if
  /// there is no such entry.
  pub fn replace_profile(&mut self, profile: Profile) -> bool {
    match self.profiles.iter_mut().find(|p| p.id == profile.id) {
      Some(slot) => {
        *slot = profile;
        true
      }
      None => false,
    }
  }

  /// Re-establishes the cross-profile invariants: unique ids, each package
  /// in at most one profile, exactly one default, complete identifier
  /// maps and app-config mirrors that agree with `assigned_apps`.
  pub fn normalized(&self) -> Self {
    let mut next = self.clone();

    let mut ids = HashSet::new();
    next.profiles.retain(|p| {
      let fresh = ids.insert(p.id.clone());
      if !fresh {
        tracing::warn!(profile_id = %p.id, "dropping profile with duplicate id");
      }
      fresh
    });

    let mut owners: HashSet<String> = HashSet::new();
    for profile in next.profiles.iter_mut() {
      let dupes: Vec<String> = profile
        .assigned_apps
        .iter()
        .filter(|pkg| owners.contains(pkg.as_str()))
        .cloned()
        .collect();
      for pkg in dupes {
        tracing::warn!(
          package = %pkg,
          profile_id = %profile.id,
          "package already assigned to an earlier profile; removing"
        );
        profile.assigned_apps.remove(&pkg);
      }
      owners.extend(profile.assigned_apps.iter().cloned());
    }

    let mut seen_default = false;
    for profile in next.profiles.iter_mut() {
      if profile.is_default {
        if seen_default {
          tracing::warn!(profile_id = %profile.id, "clearing extra default flag");
          profile.is_default = false;
        }
        seen_default = true;
      }
    }
    if !seen_default {
      if let Some(first) = next.profiles.first_mut() {
        first.is_default = true;
      }
    }

    next.profiles = next.profiles.iter().map(Profile::ensure_complete).collect();

    for (pkg, cfg) in next.app_configs.iter_mut() {
      let owner = next
        .profiles
        .iter()
        .find(|p| p.has_app(pkg))
        .map(|p| p.id.clone());
      if cfg.profile_id != owner {
        cfg.profile_id = owner;
      }
      if cfg.package_name != *pkg {
        cfg.package_name = pkg.clone();
      }
    }

    next
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::SpoofType;

  fn snapshot_with(profiles: Vec<Profile>) -> ConfigSnapshot {
    ConfigSnapshot {
      profiles,
      ..ConfigSnapshot::default()
    }
  }

  #[test]
  fn first_profile_becomes_default_when_none_is() {
    let s = snapshot_with(vec![Profile::blank("a"), Profile::blank("b")]).normalized();
    assert!(s.profiles[0].is_default);
    assert!(!s.profiles[1].is_default);
  }

  #[test]
  fn only_first_default_survives() {
    let s = snapshot_with(vec![
      Profile::blank("a"),
      Profile::blank("b").with_default(true),
      Profile::blank("c").with_default(true),
    ])
    .normalized();
    let defaults: Vec<&str> = s
      .profiles
      .iter()
      .filter(|p| p.is_default)
      .map(|p| p.name.as_str())
      .collect();
    assert_eq!(defaults, vec!["b"]);
  }

  #[test]
  fn duplicate_assignment_keeps_earliest_owner() {
    let s = snapshot_with(vec![
      Profile::blank("a").add_app("com.x"),
      Profile::blank("b").add_app("com.x").add_app("com.y"),
    ])
    .normalized();
    assert_eq!(s.assigned_profile("com.x").unwrap().name, "a");
    assert!(!s.profiles[1].has_app("com.x"));
    assert!(s.profiles[1].has_app("com.y"));
  }

  #[test]
  fn app_config_mirror_follows_assignment() {
    let p = Profile::blank("a").add_app("com.x");
    let id = p.id.clone();
    let mut s = snapshot_with(vec![p]);
    s.app_configs.insert("com.x".into(), AppConfig::new("com.x"));
    let mut stale = AppConfig::new("com.gone");
    stale.profile_id = Some("missing".into());
    s.app_configs.insert("com.gone".into(), stale);

    let s = s.normalized();
    assert_eq!(s.app_config("com.x").unwrap().profile_id.as_deref(), Some(id.as_str()));
    assert_eq!(s.app_config("com.gone").unwrap().profile_id, None);
  }

  #[test]
  fn normalizing_completes_identifier_maps() {
    let mut p = Profile::blank("a");
    p.identifiers.clear();
    let s = snapshot_with(vec![p]).normalized();
    assert_eq!(s.profiles[0].identifiers.len(), SpoofType::ALL.len());
  }

  #[test]
  fn empty_snapshot_stays_empty() {
    let s = ConfigSnapshot::default().normalized();
    assert!(s.profiles.is_empty());
    assert!(s.module_enabled);
  }

  #[test]
  fn find_profile_accepts_id_or_name() {
    let p = Profile::blank("Work");
    let id = p.id.clone();
    let s = snapshot_with(vec![p]);
    assert_eq!(s.find_profile(&id).unwrap().name, "Work");
    assert_eq!(s.find_profile("Work").unwrap().id, id);
    assert!(s.find_profile("nope").is_none());
  }
}
