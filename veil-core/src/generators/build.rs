use crate::model::SpoofType;
use rand::seq::SliceRandom;
use rand::Rng;

/// One real device row. Every build property served for a profile comes
/// from the same row so model, board and fingerprint never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePreset {
  pub key: &'static str,
  /// Vendor key shared with the TAC, serial and OUI tables.
  pub vendor: &'static str,
  pub manufacturer: &'static str,
  pub brand: &'static str,
  pub model: &'static str,
  pub device: &'static str,
  pub product: &'static str,
  pub board: &'static str,
  pub fingerprint: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildProps {
  pub fingerprint: String,
  pub model: String,
  pub manufacturer: String,
  pub brand: String,
  pub device: String,
  pub product: String,
  pub board: String,
}

pub const DEVICE_PRESETS: &[DevicePreset] = &[
  DevicePreset {
    key: "samsung-s23",
    vendor: "Samsung",
    manufacturer: "samsung",
    brand: "samsung",
    model: "SM-S911B",
    device: "dm1q",
    product: "dm1qxxx",
    board: "kalama",
    fingerprint: "samsung/dm1qxxx/dm1q:14/UP1A.231005.007/S911BXXS3BWK5:user/release-keys",
  },
  DevicePreset {
    key: "samsung-a54",
    vendor: "Samsung",
    manufacturer: "samsung",
    brand: "samsung",
    model: "SM-A546B",
    device: "a54x",
    product: "a54xnsxx",
    board: "s5e8835",
    fingerprint: "samsung/a54xnsxx/a54x:14/UP1A.231005.007/A546BXXS6BWK3:user/release-keys",
  },
  DevicePreset {
    key: "pixel-8",
    vendor: "Google",
    manufacturer: "Google",
    brand: "google",
    model: "Pixel 8",
    device: "shiba",
    product: "shiba",
    board: "shiba",
    fingerprint: "google/shiba/shiba:14/AP1A.240405.002/11480754:user/release-keys",
  },
  DevicePreset {
    key: "pixel-7",
    vendor: "Google",
    manufacturer: "Google",
    brand: "google",
    model: "Pixel 7",
    device: "panther",
    product: "panther",
    board: "panther",
    fingerprint: "google/panther/panther:14/AP1A.240405.002/11480754:user/release-keys",
  },
  DevicePreset {
    key: "xiaomi-13",
    vendor: "Xiaomi",
    manufacturer: "Xiaomi",
    brand: "Xiaomi",
    model: "2211133G",
    device: "fuxi",
    product: "fuxi_global",
    board: "kalama",
    fingerprint: "Xiaomi/fuxi_global/fuxi:14/UKQ1.230804.001/V816.0.5.0.UMCMIXM:user/release-keys",
  },
  DevicePreset {
    key: "redmi-note-12",
    vendor: "Xiaomi",
    manufacturer: "Xiaomi",
    brand: "Redmi",
    model: "23021RAAEG",
    device: "tapas",
    product: "tapas_global",
    board: "bengal",
    fingerprint: "Redmi/tapas_global/tapas:13/TKQ1.221114.001/V14.0.6.0.TMGMIXM:user/release-keys",
  },
  DevicePreset {
    key: "oneplus-11",
    vendor: "OnePlus",
    manufacturer: "OnePlus",
    brand: "OnePlus",
    model: "CPH2449",
    device: "OP594DL1",
    product: "CPH2449EEA",
    board: "kalama",
    fingerprint: "OnePlus/CPH2449EEA/OP594DL1:14/UKQ1.230924.001/T.R4T2.1613e0e-2:user/release-keys",
  },
  DevicePreset {
    key: "moto-edge-40",
    vendor: "Motorola",
    manufacturer: "motorola",
    brand: "motorola",
    model: "motorola edge 40",
    device: "lyriq",
    product: "lyriq_g",
    board: "mt6891",
    fingerprint: "motorola/lyriq_g/lyriq:14/U1TLS34.44-29-3/4b5d1:user/release-keys",
  },
  DevicePreset {
    key: "xperia-1-v",
    vendor: "Sony",
    manufacturer: "Sony",
    brand: "Sony",
    model: "XQ-DQ54",
    device: "XQ-DQ54",
    product: "XQ-DQ54_EEA",
    board: "kalama",
    fingerprint: "Sony/XQ-DQ54_EEA/XQ-DQ54:14/68.1.A.2.29/068001A002002900521143278:user/release-keys",
  },
  DevicePreset {
    key: "nokia-g60",
    vendor: "Nokia",
    manufacturer: "HMD Global",
    brand: "Nokia",
    model: "Nokia G60 5G",
    device: "PLR_sprout",
    product: "PlasmaRider_00WW",
    board: "holi",
    fingerprint: "Nokia/PlasmaRider_00WW/PLR_sprout:13/TKQ1.220807.001/00WW_2_350:user/release-keys",
  },
];

impl DevicePreset {
  pub fn props(&self) -> BuildProps {
    BuildProps {
      fingerprint: self.fingerprint.to_string(),
      model: self.model.to_string(),
      manufacturer: self.manufacturer.to_string(),
      brand: self.brand.to_string(),
      device: self.device.to_string(),
      product: self.product.to_string(),
      board: self.board.to_string(),
    }
  }

  /// Value of a build property type, `None` for non-build types.
  pub fn field(&self, ty: SpoofType) -> Option<&'static str> {
    match ty {
      SpoofType::BuildFingerprint => Some(self.fingerprint),
      SpoofType::BuildModel => Some(self.model),
      SpoofType::BuildManufacturer => Some(self.manufacturer),
      SpoofType::BuildBrand => Some(self.brand),
      SpoofType::BuildDevice => Some(self.device),
      SpoofType::BuildProduct => Some(self.product),
      SpoofType::BuildBoard => Some(self.board),
      _ => None,
    }
  }
}

pub fn preset_by_key(key: &str) -> Option<&'static DevicePreset> {
  DEVICE_PRESETS.iter().find(|p| p.key == key)
}

pub fn preset_by_model(model: &str) -> Option<&'static DevicePreset> {
  DEVICE_PRESETS.iter().find(|p| p.model == model)
}

/// Picks a preset for the vendor hint, any preset when the hint is unknown.
pub fn pick_preset<R: Rng + ?Sized>(vendor: Option<&str>, rng: &mut R) -> &'static DevicePreset {
  let matching: Vec<&'static DevicePreset> = match vendor {
    Some(v) => DEVICE_PRESETS
      .iter()
      .filter(|p| p.vendor.eq_ignore_ascii_case(v.trim()))
      .collect(),
    None => Vec::new(),
  };
  match matching.choose(rng) {
    Some(p) => *p,
    None => &DEVICE_PRESETS[rng.gen_range(0..DEVICE_PRESETS.len())],
  }
}

pub fn generate_build_props<R: Rng + ?Sized>(vendor: Option<&str>, rng: &mut R) -> BuildProps {
  pick_preset(vendor, rng).props()
}
