//! Standalone generators. Each one only promises format validity; values
//! that must agree with each other come from [`crate::correlation`].

pub mod build;
pub mod ids;
pub mod imei;
pub mod mac;
pub mod serial;

pub use build::{BuildProps, DevicePreset, DEVICE_PRESETS};
pub use mac::MacStrategy;

use crate::error::GenerateError;
use crate::model::SpoofType;
use rand::Rng;

/// Knobs taken from the `[generation]` config section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorContext {
  pub manufacturer: Option<String>,
  pub serial_length: usize,
  pub mac_strategy: MacStrategy,
}

impl Default for GeneratorContext {
  fn default() -> Self {
    Self {
      manufacturer: None,
      serial_length: serial::DEFAULT_SERIAL_LEN,
      mac_strategy: MacStrategy::Random,
    }
  }
}

impl GeneratorContext {
  pub fn vendor(&self) -> Option<&str> {
    self.manufacturer.as_deref()
  }
}

/// Fresh value for a type that can be generated on its own.
pub fn generate_value<R: Rng + ?Sized>(
  ty: SpoofType,
  ctx: &GeneratorContext,
  rng: &mut R,
) -> Result<String, GenerateError> {
  let value = match ty {
    SpoofType::Imei => imei::generate_imei(ctx.vendor(), rng),
    SpoofType::Meid => imei::generate_meid(rng),
    SpoofType::Serial => match ctx.vendor().and_then(serial::format_for) {
      Some(_) => serial::generate_serial(ctx.vendor(), rng),
      None => serial::generate_generic_serial(ctx.serial_length, rng)?,
    },
    SpoofType::AndroidId => ids::generate_android_id(rng),
    SpoofType::WifiMac | SpoofType::BluetoothMac => {
      mac::generate_mac(ctx.mac_strategy, ctx.vendor(), rng)
    }
    SpoofType::WifiSsid => ids::generate_ssid(rng),
    SpoofType::WifiBssid => mac::generate_router_bssid(rng),
    SpoofType::AdvertisingId => ids::generate_advertising_id(rng),
    SpoofType::GsfId => ids::generate_gsf_id(rng),
    SpoofType::MediaDrmId => ids::generate_media_drm_id(rng),
    SpoofType::InstanceId => ids::generate_instance_id(rng),
    other => return Err(GenerateError::Correlated(other)),
  };
  Ok(value)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::CorrelationGroup;
  use crate::validate::{is_valid_imei, is_valid_mac};
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn uncorrelated_types_all_generate() {
    let mut rng = StdRng::seed_from_u64(3);
    let ctx = GeneratorContext::default();
    for ty in CorrelationGroup::None.members() {
      let v = generate_value(ty, &ctx, &mut rng).unwrap();
      assert!(!v.is_empty(), "{ty}");
    }
  }

  #[test]
  fn correlated_types_are_refused() {
    let mut rng = StdRng::seed_from_u64(4);
    let err = generate_value(SpoofType::Imsi, &GeneratorContext::default(), &mut rng).unwrap_err();
    assert_eq!(err, GenerateError::Correlated(SpoofType::Imsi));
  }

  #[test]
  fn context_drives_serial_length_and_vendor() {
    let mut rng = StdRng::seed_from_u64(5);
    let ctx = GeneratorContext {
      serial_length: 14,
      ..GeneratorContext::default()
    };
    assert_eq!(generate_value(SpoofType::Serial, &ctx, &mut rng).unwrap().len(), 14);

    let bad = GeneratorContext {
      serial_length: 30,
      ..GeneratorContext::default()
    };
    assert_eq!(
      generate_value(SpoofType::Serial, &bad, &mut rng),
      Err(GenerateError::SerialLength(30))
    );

    let samsung = GeneratorContext {
      manufacturer: Some("Samsung".into()),
      mac_strategy: MacStrategy::Vendor,
      ..GeneratorContext::default()
    };
    let imei = generate_value(SpoofType::Imei, &samsung, &mut rng).unwrap();
    assert!(is_valid_imei(&imei));
    assert!(imei::vendor_has_tac("Samsung", &imei));
    let wifi = generate_value(SpoofType::WifiMac, &samsung, &mut rng).unwrap();
    assert!(is_valid_mac(&wifi));
    assert_eq!(mac::vendor_of(&wifi), Some("Samsung"));
  }
}
