//! Correlated identity generation.
//!
//! A correlation group is always derived from one source record: a carrier
//! for `SIM_CARD`, a city for `LOCATION` and a device preset for
//! `DEVICE_HARDWARE`. The record key is stored on the profile as the
//! group's anchor so a single field can later be re-derived from the same
//! record, while a group regeneration moves to a new record and replaces
//! every member at once.

mod apply;
pub mod carrier;
pub mod city;
pub mod hardware;

pub use carrier::{Carrier, SimConfig, SimFields};
pub use city::{City, LocationConfig};
pub use hardware::{HardwareConfig, HardwareFields};

use crate::error::GenerateError;
use crate::generators::build::{self, DevicePreset, DEVICE_PRESETS};
use crate::generators::{self, GeneratorContext};
use crate::model::{CorrelationGroup, SpoofType};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Attempts at drawing a tuple that shares no value with the one it
/// replaces before settling for the last draw.
const MAX_DISTINCT_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceRecord {
  Carrier(&'static Carrier),
  City(&'static City),
  Device(&'static DevicePreset),
}

impl SourceRecord {
  pub fn group(&self) -> CorrelationGroup {
    match self {
      SourceRecord::Carrier(_) => CorrelationGroup::SimCard,
      SourceRecord::City(_) => CorrelationGroup::Location,
      SourceRecord::Device(_) => CorrelationGroup::DeviceHardware,
    }
  }

  pub fn key(&self) -> String {
    match self {
      SourceRecord::Carrier(c) => c.mcc_mnc(),
      SourceRecord::City(c) => c.key.to_string(),
      SourceRecord::Device(d) => d.key.to_string(),
    }
  }

  /// Uppercase ISO country, `None` for device presets.
  pub fn country(&self) -> Option<&'static str> {
    match self {
      SourceRecord::Carrier(c) => Some(c.iso),
      SourceRecord::City(c) => Some(c.country_iso),
      SourceRecord::Device(_) => None,
    }
  }

  pub fn label(&self) -> String {
    match self {
      SourceRecord::Carrier(c) => format!("{} ({})", c.name, c.iso),
      SourceRecord::City(c) => format!("{} ({})", c.name, c.country_iso),
      SourceRecord::Device(d) => format!("{} {}", d.manufacturer, d.model),
    }
  }

  /// True when no field `self` produces can coincide with one produced by
  /// `other`. With a country pin the country-level fields are allowed to
  /// repeat.
  fn distinct_from(&self, other: &SourceRecord, pinned: bool) -> bool {
    match (self, other) {
      (SourceRecord::Carrier(a), SourceRecord::Carrier(b)) => {
        a.mcc_mnc() != b.mcc_mnc() && a.name != b.name && (pinned || a.iso != b.iso)
      }
      (SourceRecord::City(a), SourceRecord::City(b)) => {
        a.key != b.key && (pinned || a.country_iso != b.country_iso)
      }
      (SourceRecord::Device(a), SourceRecord::Device(b)) => {
        a.vendor != b.vendor
          && a.manufacturer != b.manufacturer
          && a.brand != b.brand
          && a.model != b.model
          && a.device != b.device
          && a.product != b.product
          && a.board != b.board
          && a.fingerprint != b.fingerprint
      }
      _ => true,
    }
  }
}

/// Values of one group, all derived from `anchor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTuple {
  pub group: CorrelationGroup,
  pub anchor: String,
  pub values: BTreeMap<SpoofType, String>,
}

/// Every generated value of a new profile plus the anchors it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySet {
  pub values: BTreeMap<SpoofType, String>,
  pub anchors: BTreeMap<CorrelationGroup, String>,
}

/// Constraints for choosing a source record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pick<'a> {
  /// Record must belong to this country.
  pub country: Option<&'a str>,
  /// Record must not share any field with this one.
  pub avoid: Option<SourceRecord>,
  /// Preferred device vendor; ignored when nothing matches.
  pub vendor: Option<&'a str>,
}

fn candidates(group: CorrelationGroup) -> Vec<SourceRecord> {
  match group {
    CorrelationGroup::SimCard => carrier::CARRIERS.iter().map(SourceRecord::Carrier).collect(),
    CorrelationGroup::Location => city::CITIES.iter().map(SourceRecord::City).collect(),
    CorrelationGroup::DeviceHardware => DEVICE_PRESETS.iter().map(SourceRecord::Device).collect(),
    CorrelationGroup::None => Vec::new(),
  }
}

pub fn resolve_anchor(group: CorrelationGroup, key: &str) -> Result<SourceRecord, GenerateError> {
  let found = match group {
    CorrelationGroup::SimCard => carrier::carrier_by_mcc_mnc(key).map(SourceRecord::Carrier),
    CorrelationGroup::Location => city::city_by_key(key).map(SourceRecord::City),
    CorrelationGroup::DeviceHardware => build::preset_by_key(key).map(SourceRecord::Device),
    CorrelationGroup::None => return Err(GenerateError::NotCorrelated(group)),
  };
  found.ok_or_else(|| GenerateError::UnknownAnchor {
    group,
    key: key.to_string(),
  })
}

/// Recovers the source record from values already on a profile, for
/// profiles written before anchors were tracked.
pub fn infer_anchor<'a, F>(group: CorrelationGroup, value_of: F) -> Option<SourceRecord>
where
  F: Fn(SpoofType) -> Option<&'a str>,
{
  match group {
    CorrelationGroup::SimCard => {
      if let Some(c) = value_of(SpoofType::CarrierMccMnc).and_then(carrier::carrier_by_mcc_mnc) {
        return Some(SourceRecord::Carrier(c));
      }
      let imsi = value_of(SpoofType::Imsi)?;
      carrier::CARRIERS
        .iter()
        .filter(|c| imsi.starts_with(&c.mcc_mnc()))
        .max_by_key(|c| c.mnc.len())
        .map(SourceRecord::Carrier)
    }
    CorrelationGroup::Location => {
      let lat: f64 = value_of(SpoofType::Latitude)?.trim().parse().ok()?;
      let lon: f64 = value_of(SpoofType::Longitude)?.trim().parse().ok()?;
      city::city_containing(lat, lon).map(SourceRecord::City)
    }
    CorrelationGroup::DeviceHardware => value_of(SpoofType::BuildModel)
      .and_then(build::preset_by_model)
      .map(SourceRecord::Device),
    CorrelationGroup::None => None,
  }
}

pub fn pick_source<R: Rng + ?Sized>(
  group: CorrelationGroup,
  pick: Pick<'_>,
  rng: &mut R,
) -> Result<SourceRecord, GenerateError> {
  if !group.is_correlated() {
    return Err(GenerateError::NotCorrelated(group));
  }
  let pinned = pick.country.is_some();
  let allowed: Vec<SourceRecord> = candidates(group)
    .into_iter()
    .filter(|r| match (pick.country, r.country()) {
      (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
      _ => true,
    })
    .filter(|r| match &pick.avoid {
      Some(old) => r.distinct_from(old, pinned),
      None => true,
    })
    .collect();

  let preferred: Vec<SourceRecord> = match pick.vendor {
    Some(vendor) => allowed
      .iter()
      .copied()
      .filter(|r| matches!(r, SourceRecord::Device(d) if d.vendor.eq_ignore_ascii_case(vendor.trim())))
      .collect(),
    None => Vec::new(),
  };

  let pool = if preferred.is_empty() { &allowed } else { &preferred };
  pool.choose(rng).copied().ok_or(GenerateError::NoCandidates(group))
}

/// Builds the validated config for `record` and lifts out its values.
pub fn derive_group<R: Rng + ?Sized>(
  record: SourceRecord,
  rng: &mut R,
) -> Result<GroupTuple, GenerateError> {
  let group = record.group();
  let values: BTreeMap<SpoofType, String> = match record {
    SourceRecord::Carrier(c) => {
      let sim = SimConfig::generate(c, rng)?;
      group
        .members()
        .filter_map(|t| sim.value(t).map(|v| (t, v.to_string())))
        .collect()
    }
    SourceRecord::City(c) => {
      let loc = LocationConfig::generate(c, rng)?;
      group.members().filter_map(|t| loc.value(t).map(|v| (t, v))).collect()
    }
    SourceRecord::Device(d) => {
      let hw = HardwareConfig::generate(d, rng)?;
      group
        .members()
        .filter_map(|t| hw.value(t).map(|v| (t, v.to_string())))
        .collect()
    }
  };
  Ok(GroupTuple {
    group,
    anchor: record.key(),
    values,
  })
}

pub fn generate_group<R: Rng + ?Sized>(
  group: CorrelationGroup,
  pick: Pick<'_>,
  rng: &mut R,
) -> Result<GroupTuple, GenerateError> {
  let record = pick_source(group, pick, rng)?;
  derive_group(record, rng)
}

/// Members that may keep their value when the new record is pinned to the
/// same country as the old one.
fn country_level(ty: SpoofType) -> bool {
  matches!(
    ty,
    SpoofType::SimCountryIso | SpoofType::NetworkCountryIso | SpoofType::Timezone | SpoofType::Locale
  )
}

/// New tuple for `group` from a record other than `current`. When
/// `pin_country` is set the record comes from that country; otherwise the
/// country changes too.
pub fn regenerate_group<R: Rng + ?Sized>(
  group: CorrelationGroup,
  current: Option<SourceRecord>,
  old_values: &BTreeMap<SpoofType, String>,
  pin_country: Option<&str>,
  ctx: &GeneratorContext,
  rng: &mut R,
) -> Result<GroupTuple, GenerateError> {
  let pick = Pick {
    country: pin_country,
    avoid: current,
    vendor: ctx.vendor(),
  };
  let mut tuple = generate_group(group, pick, rng)?;
  for _ in 1..MAX_DISTINCT_ATTEMPTS {
    let repeats = tuple.values.iter().any(|(ty, v)| {
      old_values.get(ty) == Some(v) && !(pin_country.is_some() && country_level(*ty))
    });
    if !repeats {
      break;
    }
    tuple = generate_group(group, pick, rng)?;
  }
  Ok(tuple)
}

/// One member re-derived from `record`; the other members are not touched.
pub fn regenerate_member<R: Rng + ?Sized>(
  record: SourceRecord,
  ty: SpoofType,
  rng: &mut R,
) -> Result<String, GenerateError> {
  let group = ty.correlation_group();
  if group != record.group() {
    return Err(GenerateError::NotCorrelated(group));
  }
  let mut tuple = derive_group(record, rng)?;
  tuple
    .values
    .remove(&ty)
    .ok_or(GenerateError::NoCandidates(group))
}

/// Fresh identity for a new profile. SIM and location share one country and
/// MACs follow the device vendor when the vendor strategy is on. Records
/// listed in `previous` are avoided.
pub fn generate_identity_avoiding<R: Rng + ?Sized>(
  ctx: &GeneratorContext,
  previous: &BTreeMap<CorrelationGroup, SourceRecord>,
  rng: &mut R,
) -> Result<IdentitySet, GenerateError> {
  let sim_record = pick_source(
    CorrelationGroup::SimCard,
    Pick {
      avoid: previous.get(&CorrelationGroup::SimCard).copied(),
      ..Pick::default()
    },
    rng,
  )?;
  let country = sim_record.country();
  let city_record = pick_source(
    CorrelationGroup::Location,
    Pick {
      country,
      avoid: previous.get(&CorrelationGroup::Location).copied(),
      ..Pick::default()
    },
    rng,
  )?;
  let device_record = pick_source(
    CorrelationGroup::DeviceHardware,
    Pick {
      avoid: previous.get(&CorrelationGroup::DeviceHardware).copied(),
      vendor: ctx.vendor(),
      ..Pick::default()
    },
    rng,
  )?;

  let mut values = BTreeMap::new();
  let mut anchors = BTreeMap::new();
  for record in [sim_record, city_record, device_record] {
    let tuple = derive_group(record, rng)?;
    anchors.insert(tuple.group, tuple.anchor);
    values.extend(tuple.values);
  }

  let device_ctx = match device_record {
    SourceRecord::Device(d) => GeneratorContext {
      manufacturer: Some(d.vendor.to_string()),
      ..ctx.clone()
    },
    _ => ctx.clone(),
  };
  for ty in CorrelationGroup::None.members() {
    values.insert(ty, generators::generate_value(ty, &device_ctx, rng)?);
  }

  Ok(IdentitySet { values, anchors })
}

pub fn generate_identity<R: Rng + ?Sized>(
  ctx: &GeneratorContext,
  rng: &mut R,
) -> Result<IdentitySet, GenerateError> {
  generate_identity_avoiding(ctx, &BTreeMap::new(), rng)
}

/// Fresh value for any type. Correlated types get a whole new tuple and
/// only the requested member is returned.
pub fn generate_any<R: Rng + ?Sized>(
  ty: SpoofType,
  ctx: &GeneratorContext,
  rng: &mut R,
) -> Result<String, GenerateError> {
  let group = ty.correlation_group();
  if !group.is_correlated() {
    return generators::generate_value(ty, ctx, rng);
  }
  let mut tuple = generate_group(
    group,
    Pick {
      vendor: ctx.vendor(),
      ..Pick::default()
    },
    rng,
  )?;
  tuple.values.remove(&ty).ok_or(GenerateError::NoCandidates(group))
}

/// Rebuilds the validated config for a group from stored values, failing
/// on the first contradiction.
pub fn check_group<'a, F>(
  group: CorrelationGroup,
  record: SourceRecord,
  value_of: F,
) -> Result<(), GenerateError>
where
  F: Fn(SpoofType) -> Option<&'a str>,
{
  let get = |ty: SpoofType| value_of(ty).unwrap_or_default().to_string();
  match (group, record) {
    (CorrelationGroup::SimCard, SourceRecord::Carrier(c)) => {
      SimConfig::new(
        c,
        SimFields {
          imsi: get(SpoofType::Imsi),
          iccid: get(SpoofType::Iccid),
          phone_number: get(SpoofType::PhoneNumber),
          sim_country_iso: get(SpoofType::SimCountryIso),
          network_country_iso: get(SpoofType::NetworkCountryIso),
          sim_operator_name: get(SpoofType::CarrierName),
          network_operator: get(SpoofType::CarrierMccMnc),
        },
      )?;
    }
    (CorrelationGroup::Location, SourceRecord::City(c)) => {
      let coord = |ty| get(ty).trim().parse::<f64>().unwrap_or(f64::NAN);
      LocationConfig::new(
        c,
        coord(SpoofType::Latitude),
        coord(SpoofType::Longitude),
        get(SpoofType::Timezone),
        get(SpoofType::Locale),
      )?;
    }
    (CorrelationGroup::DeviceHardware, SourceRecord::Device(d)) => {
      HardwareConfig::new(
        d,
        HardwareFields {
          imei: get(SpoofType::Imei),
          meid: get(SpoofType::Meid),
          serial: get(SpoofType::Serial),
          build: build::BuildProps {
            fingerprint: get(SpoofType::BuildFingerprint),
            model: get(SpoofType::BuildModel),
            manufacturer: get(SpoofType::BuildManufacturer),
            brand: get(SpoofType::BuildBrand),
            device: get(SpoofType::BuildDevice),
            product: get(SpoofType::BuildProduct),
            board: get(SpoofType::BuildBoard),
          },
        },
      )?;
    }
    _ => return Err(GenerateError::NotCorrelated(group)),
  }
  Ok(())
}
