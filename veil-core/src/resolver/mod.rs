//! Which value, if any, an intercepted call gets for a package.

mod cache;

pub use cache::{FileSnapshotSource, HookCache, PackageEntry, SnapshotSource, StoreSnapshotSource};

use crate::model::{AppConfig, ConfigSnapshot, IdentifierValue, Profile, SpoofType};
use serde::Serialize;
use std::fmt;

/// How a package ended up with its profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSource {
  Assigned,
  Default,
  First,
}

impl fmt::Display for ProfileSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      ProfileSource::Assigned => "assigned",
      ProfileSource::Default => "default",
      ProfileSource::First => "first",
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  ModuleDisabled,
  NoProfile,
  AppDisabled,
  TypeNotSelected,
  ProfileDisabled,
  TypeDisabled,
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      SkipReason::ModuleDisabled => "module disabled",
      SkipReason::NoProfile => "no profile",
      SkipReason::AppDisabled => "app disabled",
      SkipReason::TypeNotSelected => "type not selected for app",
      SkipReason::ProfileDisabled => "profile disabled",
      SkipReason::TypeDisabled => "type disabled",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  /// Substitute this value.
  Value(String),
  /// Spoofing is on but no value is stored; the caller decides.
  UseDefault,
  /// Leave the real value alone.
  NotSpoofed(SkipReason),
}

impl Resolution {
  pub fn value(&self) -> Option<&str> {
    match self {
      Resolution::Value(v) => Some(v),
      _ => None,
    }
  }
}

impl fmt::Display for Resolution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Resolution::Value(v) => f.write_str(v),
      Resolution::UseDefault => f.write_str("<use default>"),
      Resolution::NotSpoofed(reason) => write!(f, "<not spoofed: {reason}>"),
    }
  }
}

/// Assigned profile, else the default, else the first one stored.
pub fn resolve_profile<'a>(
  snapshot: &'a ConfigSnapshot,
  package: &str,
) -> Option<(&'a Profile, ProfileSource)> {
  if let Some(p) = snapshot.assigned_profile(package) {
    return Some((p, ProfileSource::Assigned));
  }
  if let Some(p) = snapshot.default_profile() {
    return Some((p, ProfileSource::Default));
  }
  snapshot.profiles.first().map(|p| (p, ProfileSource::First))
}

/// Per-type decision once the profile is known.
pub fn resolve_in(
  module_enabled: bool,
  app: Option<&AppConfig>,
  profile: Option<&Profile>,
  ty: SpoofType,
) -> Resolution {
  if !module_enabled {
    return Resolution::NotSpoofed(SkipReason::ModuleDisabled);
  }
  if let Some(app) = app {
    if !app.is_enabled {
      return Resolution::NotSpoofed(SkipReason::AppDisabled);
    }
    if !app.allows(ty) {
      return Resolution::NotSpoofed(SkipReason::TypeNotSelected);
    }
  }
  let Some(profile) = profile else {
    return Resolution::NotSpoofed(SkipReason::NoProfile);
  };
  if !profile.is_enabled {
    return Resolution::NotSpoofed(SkipReason::ProfileDisabled);
  }
  match profile.identifier(ty) {
    None => Resolution::UseDefault,
    Some(id) if !id.enabled => Resolution::NotSpoofed(SkipReason::TypeDisabled),
    Some(id) => match &id.value {
      IdentifierValue::Explicit(v) => Resolution::Value(v.clone()),
      IdentifierValue::UseDefault => Resolution::UseDefault,
    },
  }
}

pub fn resolve(snapshot: &ConfigSnapshot, package: &str, ty: SpoofType) -> Resolution {
  let profile = resolve_profile(snapshot, package).map(|(p, _)| p);
  resolve_in(snapshot.module_enabled, snapshot.app_config(package), profile, ty)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::generators::GeneratorContext;
  use crate::model::CorrelationGroup;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  const IMEI: &str = "354230052312345";

  fn bank_scenario() -> ConfigSnapshot {
    let mut rng = StdRng::seed_from_u64(71);
    let ctx = GeneratorContext::default();
    let p1 = Profile::create_new("P1", "", &ctx, &mut rng)
      .unwrap()
      .with_value(SpoofType::Imei, IdentifierValue::explicit(IMEI))
      .add_app("com.bank.app")
      .with_default(false)
      .with_enabled(true);
    let default = Profile::create_default_profile(&ctx, &mut rng).unwrap();
    ConfigSnapshot {
      profiles: vec![p1, default],
      ..ConfigSnapshot::default()
    }
  }

  #[test]
  fn assigned_profile_beats_default() {
    let s = bank_scenario();
    assert_eq!(resolve(&s, "com.bank.app", SpoofType::Imei), Resolution::Value(IMEI.into()));
    let (_, source) = resolve_profile(&s, "com.bank.app").unwrap();
    assert_eq!(source, ProfileSource::Assigned);

    let other = resolve(&s, "com.other", SpoofType::Imei);
    assert_eq!(other.value(), s.profiles[1].value(SpoofType::Imei));
    assert_eq!(resolve_profile(&s, "com.other").unwrap().1, ProfileSource::Default);
  }

  #[test]
  fn falls_back_to_first_then_nothing() {
    let s = ConfigSnapshot {
      profiles: vec![Profile::blank("a"), Profile::blank("b")],
      ..ConfigSnapshot::default()
    };
    let (p, source) = resolve_profile(&s, "com.x").unwrap();
    assert_eq!((p.name.as_str(), source), ("a", ProfileSource::First));

    let empty = ConfigSnapshot::default();
    assert!(resolve_profile(&empty, "com.x").is_none());
    assert_eq!(
      resolve(&empty, "com.x", SpoofType::Imei),
      Resolution::NotSpoofed(SkipReason::NoProfile)
    );
  }

  #[test]
  fn enablement_levels_gate_in_order() {
    let mut s = bank_scenario();
    let pkg = "com.bank.app";

    s.profiles[0] = s.profiles[0].toggle_type(SpoofType::Imei, false);
    assert_eq!(
      resolve(&s, pkg, SpoofType::Imei),
      Resolution::NotSpoofed(SkipReason::TypeDisabled)
    );
    assert!(resolve(&s, pkg, SpoofType::AndroidId).value().is_some());

    s.profiles[0] = s.profiles[0].with_enabled(false);
    assert_eq!(
      resolve(&s, pkg, SpoofType::AndroidId),
      Resolution::NotSpoofed(SkipReason::ProfileDisabled)
    );

    s.app_configs.insert(pkg.into(), AppConfig::new(pkg).with_enabled(false));
    assert_eq!(
      resolve(&s, pkg, SpoofType::AndroidId),
      Resolution::NotSpoofed(SkipReason::AppDisabled)
    );

    s.module_enabled = false;
    assert_eq!(
      resolve(&s, pkg, SpoofType::AndroidId),
      Resolution::NotSpoofed(SkipReason::ModuleDisabled)
    );
  }

  #[test]
  fn app_type_subset_limits_spoofing() {
    let mut s = bank_scenario();
    s.app_configs.insert(
      "com.bank.app".into(),
      AppConfig::new("com.bank.app").with_types([SpoofType::AndroidId]),
    );
    assert!(resolve(&s, "com.bank.app", SpoofType::AndroidId).value().is_some());
    assert_eq!(
      resolve(&s, "com.bank.app", SpoofType::WifiMac),
      Resolution::NotSpoofed(SkipReason::TypeNotSelected)
    );
  }

  #[test]
  fn sim_members_resolve_together_under_a_subset() {
    let mut s = bank_scenario();
    let pkg = "com.bank.app";
    let selected = AppConfig::new(pkg).with_types([SpoofType::Imsi]);
    let mut hand_edited = AppConfig::new(pkg);
    hand_edited.enabled_types.insert(SpoofType::Imsi);
    let unrelated = AppConfig::new(pkg).with_types([SpoofType::Imei]);

    for cfg in [selected, hand_edited] {
      s.app_configs.insert(pkg.into(), cfg);
      let imsi = resolve(&s, pkg, SpoofType::Imsi);
      assert!(imsi.value().is_some());
      for ty in CorrelationGroup::SimCard.members() {
        assert!(resolve(&s, pkg, ty).value().is_some(), "{ty}");
      }
      assert_eq!(
        resolve(&s, pkg, SpoofType::Iccid).value().is_some(),
        imsi.value().is_some()
      );
    }

    s.app_configs.insert(pkg.into(), unrelated);
    for ty in CorrelationGroup::SimCard.members() {
      assert_eq!(
        resolve(&s, pkg, ty),
        Resolution::NotSpoofed(SkipReason::TypeNotSelected)
      );
    }
  }

  #[test]
  fn null_and_missing_values_mean_use_default() {
    let mut p = Profile::blank("a");
    p.identifiers.remove(&SpoofType::WifiMac);
    let s = ConfigSnapshot {
      profiles: vec![p],
      ..ConfigSnapshot::default()
    };
    assert_eq!(resolve(&s, "com.x", SpoofType::Imei), Resolution::UseDefault);
    assert_eq!(resolve(&s, "com.x", SpoofType::WifiMac), Resolution::UseDefault);
  }
}
