use crate::validate::{format_mac, parse_mac};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const GENERIC_VENDOR: &str = "generic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacStrategy {
  /// Random bytes, unicast and locally administered.
  #[default]
  Random,
  /// Real vendor OUI followed by three random bytes.
  Vendor,
}

#[derive(Debug, Clone, Copy)]
pub struct OuiEntry {
  pub vendor: &'static str,
  pub ouis: &'static [[u8; 3]],
}

pub const DEVICE_OUIS: &[OuiEntry] = &[
  OuiEntry {
    vendor: "Samsung",
    ouis: &[[0x00, 0x16, 0x32], [0x5C, 0x0A, 0x5B], [0x8C, 0x71, 0xF8], [0xF0, 0x25, 0xB7]],
  },
  OuiEntry {
    vendor: "Google",
    ouis: &[[0x3C, 0x5A, 0xB4], [0xF4, 0xF5, 0xD8], [0x54, 0x60, 0x09]],
  },
  OuiEntry {
    vendor: "Xiaomi",
    ouis: &[[0x64, 0x09, 0x80], [0x28, 0x6C, 0x07], [0xF8, 0xA4, 0x5F]],
  },
  OuiEntry {
    vendor: "OnePlus",
    ouis: &[[0x94, 0x65, 0x2D], [0xC0, 0xEE, 0xFB]],
  },
  OuiEntry {
    vendor: "Motorola",
    ouis: &[[0x9C, 0xD9, 0x17], [0x40, 0x78, 0x6A]],
  },
  OuiEntry {
    vendor: "Sony",
    ouis: &[[0x30, 0x39, 0x26], [0xAC, 0x9B, 0x0A]],
  },
  OuiEntry {
    vendor: "Nokia",
    ouis: &[[0x00, 0x1B, 0xAF], [0xC8, 0xD1, 0x0B]],
  },
  OuiEntry {
    vendor: GENERIC_VENDOR,
    // Common Wi-Fi chipset vendors (Qualcomm, Broadcom, MediaTek).
    ouis: &[[0x00, 0x03, 0x7F], [0x00, 0x10, 0x18], [0x00, 0x0C, 0xE7]],
  },
];

pub const ROUTER_OUIS: &[OuiEntry] = &[
  OuiEntry {
    vendor: "TP-Link",
    ouis: &[[0x50, 0xC7, 0xBF], [0xEC, 0x08, 0x6B]],
  },
  OuiEntry {
    vendor: "Netgear",
    ouis: &[[0xA0, 0x40, 0xA0], [0x9C, 0x3D, 0xCF]],
  },
  OuiEntry {
    vendor: "AVM",
    ouis: &[[0x3C, 0xA6, 0x2F], [0xC8, 0x0E, 0x14]],
  },
  OuiEntry {
    vendor: "ASUS",
    ouis: &[[0x04, 0xD9, 0xF5], [0x2C, 0xFD, 0xA1]],
  },
  OuiEntry {
    vendor: "Huawei",
    ouis: &[[0x00, 0xE0, 0xFC], [0x48, 0x46, 0xFB]],
  },
];

fn find<'a>(table: &'a [OuiEntry], vendor: &str) -> Option<&'a OuiEntry> {
  table
    .iter()
    .find(|e| e.vendor.eq_ignore_ascii_case(vendor.trim()))
}

fn with_oui<R: Rng + ?Sized>(entry: &OuiEntry, rng: &mut R) -> String {
  let oui = entry.ouis.choose(rng).copied().unwrap_or(entry.ouis[0]);
  let mut bytes = [0u8; 6];
  bytes[..3].copy_from_slice(&oui);
  rng.fill(&mut bytes[3..]);
  format_mac(&bytes)
}

pub fn generate_random_mac<R: Rng + ?Sized>(rng: &mut R) -> String {
  let mut bytes = [0u8; 6];
  rng.fill(&mut bytes[..]);
  bytes[0] = (bytes[0] & 0xFE) | 0x02;
  format_mac(&bytes)
}

/// Unknown or missing vendors fall into the generic chipset bucket.
pub fn generate_vendor_mac<R: Rng + ?Sized>(vendor: Option<&str>, rng: &mut R) -> String {
  let entry = vendor
    .and_then(|v| find(DEVICE_OUIS, v))
    .or_else(|| find(DEVICE_OUIS, GENERIC_VENDOR))
    .unwrap_or(&DEVICE_OUIS[0]);
  with_oui(entry, rng)
}

pub fn generate_mac<R: Rng + ?Sized>(
  strategy: MacStrategy,
  vendor: Option<&str>,
  rng: &mut R,
) -> String {
  match strategy {
    MacStrategy::Random => generate_random_mac(rng),
    MacStrategy::Vendor => generate_vendor_mac(vendor, rng),
  }
}

pub fn generate_router_bssid<R: Rng + ?Sized>(rng: &mut R) -> String {
  let entry = &ROUTER_OUIS[rng.gen_range(0..ROUTER_OUIS.len())];
  with_oui(entry, rng)
}

/// Vendor owning the OUI of `mac`, searching device and router tables.
pub fn vendor_of(mac: &str) -> Option<&'static str> {
  let bytes = parse_mac(mac)?;
  DEVICE_OUIS
    .iter()
    .chain(ROUTER_OUIS.iter())
    .find(|e| e.ouis.iter().any(|o| o[..] == bytes[..3]))
    .map(|e| e.vendor)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::validate::{is_locally_administered, is_unicast, is_valid_mac};
  use proptest::prelude::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  proptest! {
    #[test]
    fn random_macs_are_unicast_and_locally_administered(seed in any::<u64>()) {
      let mut rng = StdRng::seed_from_u64(seed);
      let mac = generate_random_mac(&mut rng);
      prop_assert!(is_valid_mac(&mac));
      prop_assert!(is_unicast(&mac));
      prop_assert!(is_locally_administered(&mac));
    }
  }

  #[test]
  fn vendor_macs_keep_the_vendor_oui() {
    let mut rng = StdRng::seed_from_u64(1);
    for entry in DEVICE_OUIS {
      let mac = generate_vendor_mac(Some(entry.vendor), &mut rng);
      assert_eq!(vendor_of(&mac), Some(entry.vendor), "{mac}");
    }
  }

  #[test]
  fn unknown_vendor_lands_in_generic_bucket() {
    let mut rng = StdRng::seed_from_u64(2);
    let mac = generate_vendor_mac(Some("Acme"), &mut rng);
    assert_eq!(vendor_of(&mac), Some(GENERIC_VENDOR));
    let mac = generate_vendor_mac(None, &mut rng);
    assert_eq!(vendor_of(&mac), Some(GENERIC_VENDOR));
  }

  #[test]
  fn bssid_uses_router_oui() {
    let mut rng = StdRng::seed_from_u64(4);
    let bssid = generate_router_bssid(&mut rng);
    let vendor = vendor_of(&bssid).unwrap();
    assert!(ROUTER_OUIS.iter().any(|e| e.vendor == vendor));
  }
}
