use crate::error::CorrelationError;
use crate::generators::build::{BuildProps, DevicePreset};
use crate::generators::{imei, serial};
use crate::model::SpoofType;
use crate::validate::is_valid_imei;
use rand::Rng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareFields {
  pub imei: String,
  pub meid: String,
  pub serial: String,
  pub build: BuildProps,
}

/// Device identity where the IMEI TAC, serial format and build tuple all
/// belong to one preset row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareConfig {
  preset: &'static DevicePreset,
  fields: HardwareFields,
}

fn is_meid(s: &str) -> bool {
  s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
}

impl HardwareConfig {
  pub fn new(
    preset: &'static DevicePreset,
    fields: HardwareFields,
  ) -> Result<Self, CorrelationError> {
    if !is_valid_imei(&fields.imei) {
      return Err(CorrelationError::Imei(fields.imei));
    }
    if !imei::vendor_has_tac(preset.vendor, &fields.imei) {
      return Err(CorrelationError::ImeiVendor {
        imei: fields.imei,
        vendor: preset.vendor.to_string(),
      });
    }
    if !is_meid(&fields.meid) {
      return Err(CorrelationError::Mismatch {
        field: "meid",
        value: fields.meid,
        expected: "14 uppercase hex digits".to_string(),
      });
    }
    if !serial::matches_vendor_format(preset.vendor, &fields.serial) {
      return Err(CorrelationError::Serial {
        serial: fields.serial,
        vendor: preset.vendor.to_string(),
      });
    }
    let expected = preset.props();
    for (field, got, want) in [
      ("build_fingerprint", &fields.build.fingerprint, &expected.fingerprint),
      ("build_model", &fields.build.model, &expected.model),
      ("build_manufacturer", &fields.build.manufacturer, &expected.manufacturer),
      ("build_brand", &fields.build.brand, &expected.brand),
      ("build_device", &fields.build.device, &expected.device),
      ("build_product", &fields.build.product, &expected.product),
      ("build_board", &fields.build.board, &expected.board),
    ] {
      if got != want {
        return Err(CorrelationError::Mismatch {
          field,
          value: got.clone(),
          expected: want.clone(),
        });
      }
    }
    Ok(Self { preset, fields })
  }

  pub fn generate<R: Rng + ?Sized>(
    preset: &'static DevicePreset,
    rng: &mut R,
  ) -> Result<Self, CorrelationError> {
    Self::new(
      preset,
      HardwareFields {
        imei: imei::generate_imei(Some(preset.vendor), rng),
        meid: imei::generate_meid(rng),
        serial: serial::generate_serial(Some(preset.vendor), rng),
        build: preset.props(),
      },
    )
  }

  pub fn preset(&self) -> &'static DevicePreset {
    self.preset
  }

  pub fn fields(&self) -> &HardwareFields {
    &self.fields
  }

  pub fn value(&self, ty: SpoofType) -> Option<&str> {
    let f = &self.fields;
    match ty {
      SpoofType::Imei => Some(&f.imei),
      SpoofType::Meid => Some(&f.meid),
      SpoofType::Serial => Some(&f.serial),
      SpoofType::BuildFingerprint => Some(&f.build.fingerprint),
      SpoofType::BuildModel => Some(&f.build.model),
      SpoofType::BuildManufacturer => Some(&f.build.manufacturer),
      SpoofType::BuildBrand => Some(&f.build.brand),
      SpoofType::BuildDevice => Some(&f.build.device),
      SpoofType::BuildProduct => Some(&f.build.product),
      SpoofType::BuildBoard => Some(&f.build.board),
      _ => None,
    }
  }
}
