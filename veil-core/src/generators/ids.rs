use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

const HEX_LOWER: &[u8] = b"0123456789abcdef";
const INSTANCE_ID_ALPHABET: &[u8] =
  b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

pub const ANDROID_ID_LEN: usize = 16;
pub const GSF_ID_LEN: usize = 16;
pub const MEDIA_DRM_ID_LEN: usize = 64;
pub const INSTANCE_ID_LEN: usize = 22;

const SSID_FAMILIES: &[&str] = &[
  "NETGEAR",
  "TP-Link_",
  "Linksys",
  "ASUS_",
  "FRITZ!Box 7590 ",
  "Livebox-",
  "HUAWEI-",
  "Vodafone-",
  "MySpectrumWiFi",
  "BTHub6-",
];

pub fn random_hex<R: Rng + ?Sized>(len: usize, rng: &mut R) -> String {
  (0..len)
    .map(|_| char::from(HEX_LOWER[rng.gen_range(0..HEX_LOWER.len())]))
    .collect()
}

pub fn generate_android_id<R: Rng + ?Sized>(rng: &mut R) -> String {
  random_hex(ANDROID_ID_LEN, rng)
}

pub fn generate_gsf_id<R: Rng + ?Sized>(rng: &mut R) -> String {
  random_hex(GSF_ID_LEN, rng)
}

pub fn generate_advertising_id<R: Rng + ?Sized>(rng: &mut R) -> String {
  uuid::Builder::from_random_bytes(rng.gen())
    .into_uuid()
    .to_string()
}

/// Widevine device ids are SHA-256 digests; hash fresh entropy to match.
pub fn generate_media_drm_id<R: Rng + ?Sized>(rng: &mut R) -> String {
  let seed: [u8; 32] = rng.gen();
  Sha256::digest(seed)
    .iter()
    .map(|b| format!("{b:02x}"))
    .collect()
}

pub fn generate_instance_id<R: Rng + ?Sized>(rng: &mut R) -> String {
  (0..INSTANCE_ID_LEN)
    .map(|_| char::from(INSTANCE_ID_ALPHABET[rng.gen_range(0..INSTANCE_ID_ALPHABET.len())]))
    .collect()
}

pub fn generate_ssid<R: Rng + ?Sized>(rng: &mut R) -> String {
  let family = SSID_FAMILIES.choose(rng).copied().unwrap_or("NETGEAR");
  if family.ends_with(['_', '-', ' ']) {
    format!("{family}{}", random_hex(4, rng).to_ascii_uppercase())
  } else {
    format!("{family}{}", rng.gen_range(10..100))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| HEX_LOWER.contains(&b))
  }

  #[test]
  fn id_lengths_and_alphabets() {
    let mut rng = StdRng::seed_from_u64(42);

    let android_id = generate_android_id(&mut rng);
    assert_eq!(android_id.len(), 16);
    assert!(is_lower_hex(&android_id));

    let gsf = generate_gsf_id(&mut rng);
    assert_eq!(gsf.len(), 16);
    assert!(is_lower_hex(&gsf));

    let drm = generate_media_drm_id(&mut rng);
    assert_eq!(drm.len(), 64);
    assert!(is_lower_hex(&drm));

    let iid = generate_instance_id(&mut rng);
    assert_eq!(iid.len(), 22);
    assert!(iid.bytes().all(|b| INSTANCE_ID_ALPHABET.contains(&b)));
  }

  #[test]
  fn advertising_id_is_canonical_v4_uuid() {
    let mut rng = StdRng::seed_from_u64(42);
    let ad = generate_advertising_id(&mut rng);
    let parsed = uuid::Uuid::parse_str(&ad).unwrap();
    assert_eq!(parsed.get_version_num(), 4);
    assert_eq!(ad, parsed.hyphenated().to_string());
  }

  #[test]
  fn ssid_is_not_empty_and_seeded_output_repeats() {
    let a = generate_ssid(&mut StdRng::seed_from_u64(8));
    let b = generate_ssid(&mut StdRng::seed_from_u64(8));
    assert_eq!(a, b);
    assert!(a.len() > 4);
  }
}
