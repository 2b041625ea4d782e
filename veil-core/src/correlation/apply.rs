use super::{SourceRecord, GroupTuple};
use crate::error::GenerateError;
use crate::generators::{self, GeneratorContext};
use crate::model::{CorrelationGroup, IdentifierValue, Profile, SpoofType};
use rand::Rng;
use std::collections::BTreeMap;

/// Sibling group whose country a regenerated group must keep.
fn country_sibling(group: CorrelationGroup) -> Option<CorrelationGroup> {
  match group {
    CorrelationGroup::SimCard => Some(CorrelationGroup::Location),
    CorrelationGroup::Location => Some(CorrelationGroup::SimCard),
    _ => None,
  }
}

impl Profile {
  /// Source record of a group: the stored anchor, or one inferred from the
  /// group's values when the anchor is missing or unknown.
  pub fn current_source(&self, group: CorrelationGroup) -> Option<SourceRecord> {
    if let Some(key) = self.anchors.get(&group) {
      match super::resolve_anchor(group, key) {
        Ok(record) => return Some(record),
        Err(err) => tracing::warn!(profile_id = %self.id, error = %err, "ignoring stored anchor"),
      }
    }
    super::infer_anchor(group, |ty| self.value(ty))
  }

  fn country_pin(&self, group: CorrelationGroup) -> Option<&'static str> {
    country_sibling(group)
      .and_then(|sibling| self.current_source(sibling))
      .and_then(|record| record.country())
  }

  fn group_values(&self, group: CorrelationGroup) -> BTreeMap<SpoofType, String> {
    group
      .members()
      .filter_map(|ty| self.value(ty).map(|v| (ty, v.to_string())))
      .collect()
  }

  /// Context for uncorrelated values: MACs follow the device vendor.
  fn value_context(&self, ctx: &GeneratorContext) -> GeneratorContext {
    match self.current_source(CorrelationGroup::DeviceHardware) {
      Some(SourceRecord::Device(d)) => GeneratorContext {
        manufacturer: Some(d.vendor.to_string()),
        ..ctx.clone()
      },
      _ => ctx.clone(),
    }
  }

  fn with_group_tuple(&self, tuple: GroupTuple) -> Self {
    self.with_values(tuple.values).with_anchor(tuple.group, tuple.anchor)
  }

  /// Fresh value for one type. Correlated members are re-derived from the
  /// group's current record so siblings stay valid; without a usable record
  /// the whole group is regenerated instead.
  pub fn regenerate_type<R: Rng + ?Sized>(
    &self,
    ty: SpoofType,
    ctx: &GeneratorContext,
    rng: &mut R,
  ) -> Result<Self, GenerateError> {
    let group = ty.correlation_group();
    if !group.is_correlated() {
      let value = generators::generate_value(ty, &self.value_context(ctx), rng)?;
      return Ok(self.with_value(ty, IdentifierValue::Explicit(value)));
    }

    match self.current_source(group) {
      Some(record) => {
        let value = super::regenerate_member(record, ty, rng)?;
        let next = self.with_value(ty, IdentifierValue::Explicit(value));
        if self.anchors.get(&group).map(String::as_str) == Some(record.key().as_str()) {
          Ok(next)
        } else {
          Ok(next.with_anchor(group, record.key()))
        }
      }
      None => {
        tracing::info!(
          profile_id = %self.id,
          group = %group,
          "no source record for group; regenerating it whole"
        );
        self.regenerate_group(group, ctx, rng)
      }
    }
  }

  /// Replaces every member of `group` with values from a new source record.
  pub fn regenerate_group<R: Rng + ?Sized>(
    &self,
    group: CorrelationGroup,
    ctx: &GeneratorContext,
    rng: &mut R,
  ) -> Result<Self, GenerateError> {
    if !group.is_correlated() {
      let vctx = self.value_context(ctx);
      let mut values = Vec::new();
      for ty in group.members() {
        values.push((ty, generators::generate_value(ty, &vctx, rng)?));
      }
      return Ok(self.with_values(values));
    }

    let tuple = super::regenerate_group(
      group,
      self.current_source(group),
      &self.group_values(group),
      self.country_pin(group),
      ctx,
      rng,
    )?;
    Ok(self.with_group_tuple(tuple))
  }

  /// New values for every type. SIM and location move to one new country
  /// together and the device moves to a different vendor.
  pub fn regenerate_all<R: Rng + ?Sized>(
    &self,
    ctx: &GeneratorContext,
    rng: &mut R,
  ) -> Result<Self, GenerateError> {
    let previous: BTreeMap<CorrelationGroup, SourceRecord> = CorrelationGroup::CORRELATED
      .iter()
      .filter_map(|g| self.current_source(*g).map(|r| (*g, r)))
      .collect();
    let identity = super::generate_identity_avoiding(ctx, &previous, rng)?;
    Ok(self.with_identity(identity))
  }

  /// Enables or disables a type. Correlated types switch their whole group
  /// so a half-spoofed tuple is never served.
  pub fn toggle_type(&self, ty: SpoofType, enabled: bool) -> Self {
    let group = ty.correlation_group();
    if group.is_correlated() {
      self.with_group_enabled(group, enabled)
    } else {
      self.with_type_enabled(ty, enabled)
    }
  }
}
