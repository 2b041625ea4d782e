use super::{CorrelationGroup, DeviceIdentifier, IdentifierValue, SpoofType};
use crate::correlation::{self, IdentitySet};
use crate::error::GenerateError;
use crate::generators::GeneratorContext;
use crate::types::{now_unix_ms, ProfileId};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_PROFILE_NAME: &str = "Default";

/// A named, independently switchable bundle of identifiers assigned to a
/// set of packages. Every transform returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id: ProfileId,
  pub name: String,

  #[serde(default)]
  pub description: String,

  #[serde(default = "default_true")]
  pub is_enabled: bool,

  #[serde(default)]
  pub is_default: bool,

  #[serde(default)]
  pub identifiers: BTreeMap<SpoofType, DeviceIdentifier>,

  #[serde(default)]
  pub assigned_apps: BTreeSet<String>,

  /// Key of the source record each correlation group was derived from.
  #[serde(default)]
  pub anchors: BTreeMap<CorrelationGroup, String>,

  #[serde(default)]
  pub created_at: u64,

  #[serde(default)]
  pub updated_at: u64,
}

fn default_true() -> bool {
  true
}

impl Profile {
  /// Profile with every type present as `UseDefault` and no anchors.
  pub fn blank(name: impl Into<String>) -> Self {
    let now = now_unix_ms();
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      name: name.into(),
      description: String::new(),
      is_enabled: true,
      is_default: false,
      identifiers: SpoofType::ALL
        .iter()
        .map(|t| (*t, DeviceIdentifier::use_default(*t)))
        .collect(),
      assigned_apps: BTreeSet::new(),
      anchors: BTreeMap::new(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn create_new<R: Rng + ?Sized>(
    name: impl Into<String>,
    description: impl Into<String>,
    ctx: &GeneratorContext,
    rng: &mut R,
  ) -> Result<Self, GenerateError> {
    let identity = correlation::generate_identity(ctx, rng)?;
    let mut profile = Self::blank(name).with_identity(identity);
    profile.description = description.into();
    Ok(profile)
  }

  pub fn create_default_profile<R: Rng + ?Sized>(
    ctx: &GeneratorContext,
    rng: &mut R,
  ) -> Result<Self, GenerateError> {
    let mut profile = Self::create_new(
      DEFAULT_PROFILE_NAME,
      "Used for every app without an explicit assignment",
      ctx,
      rng,
    )?;
    profile.is_default = true;
    Ok(profile)
  }

  pub fn identifier(&self, ty: SpoofType) -> Option<&DeviceIdentifier> {
    self.identifiers.get(&ty)
  }

  pub fn value(&self, ty: SpoofType) -> Option<&str> {
    self.identifier(ty).and_then(|id| id.value.as_explicit())
  }

  pub fn is_type_enabled(&self, ty: SpoofType) -> bool {
    self.identifier(ty).map(|id| id.enabled).unwrap_or(true)
  }

  pub fn is_group_enabled(&self, group: CorrelationGroup) -> bool {
    group.members().all(|t| self.is_type_enabled(t))
  }

  pub fn has_app(&self, package: &str) -> bool {
    self.assigned_apps.contains(package)
  }

  fn touched(mut self) -> Self {
    self.updated_at = now_unix_ms();
    self
  }

  fn current(&self, ty: SpoofType) -> DeviceIdentifier {
    self
      .identifiers
      .get(&ty)
      .cloned()
      .unwrap_or_else(|| DeviceIdentifier::use_default(ty))
  }

  pub fn with_identifier(&self, identifier: DeviceIdentifier) -> Self {
    let mut next = self.clone();
    next.identifiers.insert(identifier.spoof_type, identifier);
    next.touched()
  }

  pub fn with_value(&self, ty: SpoofType, value: IdentifierValue) -> Self {
    self.with_identifier(self.current(ty).with_value(value))
  }

  /// Replaces several values in one step; used for whole-group swaps.
  pub fn with_values<I>(&self, values: I) -> Self
  where
    I: IntoIterator<Item = (SpoofType, String)>,
  {
    let mut next = self.clone();
    for (ty, v) in values {
      let id = next.current(ty).with_value(IdentifierValue::Explicit(v));
      next.identifiers.insert(ty, id);
    }
    next.touched()
  }

  pub fn with_type_enabled(&self, ty: SpoofType, enabled: bool) -> Self {
    self.with_identifier(self.current(ty).with_enabled(enabled))
  }

  pub fn with_group_enabled(&self, group: CorrelationGroup, enabled: bool) -> Self {
    let mut next = self.clone();
    for ty in group.members() {
      let id = next.current(ty).with_enabled(enabled);
      next.identifiers.insert(ty, id);
    }
    next.touched()
  }

  pub fn with_enabled(&self, enabled: bool) -> Self {
    let mut next = self.clone();
    next.is_enabled = enabled;
    next.touched()
  }

  pub fn with_default(&self, is_default: bool) -> Self {
    let mut next = self.clone();
    next.is_default = is_default;
    next.touched()
  }

  pub fn with_name(&self, name: impl Into<String>) -> Self {
    let mut next = self.clone();
    next.name = name.into();
    next.touched()
  }

  pub fn with_description(&self, description: impl Into<String>) -> Self {
    let mut next = self.clone();
    next.description = description.into();
    next.touched()
  }

  pub fn with_anchor(&self, group: CorrelationGroup, key: impl Into<String>) -> Self {
    let mut next = self.clone();
    next.anchors.insert(group, key.into());
    next.touched()
  }

  pub fn add_app(&self, package: impl Into<String>) -> Self {
    let mut next = self.clone();
    next.assigned_apps.insert(package.into());
    next.touched()
  }

  pub fn remove_app(&self, package: &str) -> Self {
    let mut next = self.clone();
    next.assigned_apps.remove(package);
    next.touched()
  }

  /// Adds every missing type as `UseDefault`.
  pub fn ensure_complete(&self) -> Self {
    if SpoofType::ALL.iter().all(|t| self.identifiers.contains_key(t)) {
      return self.clone();
    }
    let mut next = self.clone();
    for ty in SpoofType::ALL {
      next
        .identifiers
        .entry(*ty)
        .or_insert_with(|| DeviceIdentifier::use_default(*ty));
    }
    next.touched()
  }

  pub(crate) fn with_identity(&self, identity: IdentitySet) -> Self {
    let mut next = self.with_values(identity.values);
    next.anchors = identity.anchors;
    next
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn created_profile_has_every_type_and_all_anchors() {
    let mut rng = StdRng::seed_from_u64(1);
    let p = Profile::create_new("P1", "", &GeneratorContext::default(), &mut rng).unwrap();
    for ty in SpoofType::ALL {
      assert!(p.value(*ty).is_some(), "{ty} missing");
    }
    for g in CorrelationGroup::CORRELATED {
      assert!(p.anchors.contains_key(g), "{g} anchor missing");
    }
    assert!(p.is_enabled);
    assert!(!p.is_default);
  }

  #[test]
  fn default_factory_sets_flag() {
    let mut rng = StdRng::seed_from_u64(2);
    let p = Profile::create_default_profile(&GeneratorContext::default(), &mut rng).unwrap();
    assert!(p.is_default);
    assert_eq!(p.name, DEFAULT_PROFILE_NAME);
  }

  #[test]
  fn transforms_leave_the_original_untouched() {
    let p = Profile::blank("a");
    let q = p
      .with_value(SpoofType::Imei, IdentifierValue::explicit("354230052312345"))
      .add_app("com.bank.app");
    assert_eq!(p.value(SpoofType::Imei), None);
    assert!(!p.has_app("com.bank.app"));
    assert_eq!(q.value(SpoofType::Imei), Some("354230052312345"));
    assert!(q.has_app("com.bank.app"));
    assert!(!q.remove_app("com.bank.app").has_app("com.bank.app"));
  }

  #[test]
  fn group_toggle_flips_every_member() {
    let p = Profile::blank("a").with_group_enabled(CorrelationGroup::SimCard, false);
    for ty in CorrelationGroup::SimCard.members() {
      assert!(!p.is_type_enabled(ty));
    }
    assert!(p.is_type_enabled(SpoofType::Imei));
    assert!(!p.is_group_enabled(CorrelationGroup::SimCard));
    assert!(p
      .with_group_enabled(CorrelationGroup::SimCard, true)
      .is_group_enabled(CorrelationGroup::SimCard));
  }

  #[test]
  fn ensure_complete_fills_missing_types_only() {
    let mut p = Profile::blank("a").with_value(SpoofType::Serial, IdentifierValue::explicit("R58ABCDEFGH"));
    p.identifiers.remove(&SpoofType::Locale);
    let q = p.ensure_complete();
    assert_eq!(q.identifiers.len(), SpoofType::ALL.len());
    assert_eq!(q.value(SpoofType::Serial), Some("R58ABCDEFGH"));
    assert_eq!(q.identifier(SpoofType::Locale).unwrap().value, IdentifierValue::UseDefault);
  }
}
