use crate::error::GenerateError;
use rand::seq::SliceRandom;
use rand::Rng;

/// Upper-case alphanumerics without the easily confused I, O and Q.
pub const SERIAL_ALPHABET: &[u8] = b"0123456789ABCDEFGHJKLMNPRSTUVWXYZ";

pub const MIN_SERIAL_LEN: usize = 8;
pub const MAX_SERIAL_LEN: usize = 16;
pub const DEFAULT_SERIAL_LEN: usize = 11;

#[derive(Debug, Clone, Copy)]
pub struct SerialFormat {
  pub vendor: &'static str,
  pub prefixes: &'static [&'static str],
  pub length: usize,
}

pub const SERIAL_FORMATS: &[SerialFormat] = &[
  SerialFormat {
    vendor: "Samsung",
    prefixes: &["R58", "R5C", "RF8", "R3C"],
    length: 11,
  },
  SerialFormat {
    vendor: "Google",
    prefixes: &["9A", "8B", "2C", "1D"],
    length: 14,
  },
  SerialFormat {
    vendor: "Xiaomi",
    prefixes: &["7C", "8F", "9D"],
    length: 8,
  },
  SerialFormat {
    vendor: "OnePlus",
    prefixes: &["3B", "4C", "5A"],
    length: 8,
  },
  SerialFormat {
    vendor: "Motorola",
    prefixes: &["ZY22", "ZY32", "ZL52"],
    length: 10,
  },
  SerialFormat {
    vendor: "Sony",
    prefixes: &["BH9", "CB5", "CV7"],
    length: 10,
  },
  SerialFormat {
    vendor: "Nokia",
    prefixes: &["PL2G", "DRG", "B2N"],
    length: 16,
  },
];

pub fn format_for(vendor: &str) -> Option<&'static SerialFormat> {
  SERIAL_FORMATS
    .iter()
    .find(|f| f.vendor.eq_ignore_ascii_case(vendor.trim()))
}

fn fill<R: Rng + ?Sized>(out: &mut String, len: usize, rng: &mut R) {
  while out.len() < len {
    out.push(char::from(SERIAL_ALPHABET[rng.gen_range(0..SERIAL_ALPHABET.len())]));
  }
}

/// Vendor-formatted serial, or a generic one of [`DEFAULT_SERIAL_LEN`] when
/// the hint is missing or unknown.
pub fn generate_serial<R: Rng + ?Sized>(vendor: Option<&str>, rng: &mut R) -> String {
  match vendor.and_then(format_for) {
    Some(format) => {
      let prefix = format.prefixes.choose(rng).copied().unwrap_or("");
      let mut out = String::with_capacity(format.length);
      out.push_str(prefix);
      fill(&mut out, format.length, rng);
      out
    }
    None => {
      let mut out = String::with_capacity(DEFAULT_SERIAL_LEN);
      fill(&mut out, DEFAULT_SERIAL_LEN, rng);
      out
    }
  }
}

pub fn generate_generic_serial<R: Rng + ?Sized>(
  length: usize,
  rng: &mut R,
) -> Result<String, GenerateError> {
  if !(MIN_SERIAL_LEN..=MAX_SERIAL_LEN).contains(&length) {
    return Err(GenerateError::SerialLength(length));
  }
  let mut out = String::with_capacity(length);
  fill(&mut out, length, rng);
  Ok(out)
}

pub fn is_plausible_serial(s: &str) -> bool {
  (MIN_SERIAL_LEN..=MAX_SERIAL_LEN).contains(&s.len())
    && s.bytes().all(|b| SERIAL_ALPHABET.contains(&b))
}

pub fn matches_vendor_format(vendor: &str, serial: &str) -> bool {
  match format_for(vendor) {
    Some(f) => {
      serial.len() == f.length
        && f.prefixes.iter().any(|p| serial.starts_with(p))
        && is_plausible_serial(serial)
    }
    None => is_plausible_serial(serial),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  #[test]
  fn formats_stay_within_bounds_and_alphabet() {
    for f in SERIAL_FORMATS {
      assert!((MIN_SERIAL_LEN..=MAX_SERIAL_LEN).contains(&f.length), "{}", f.vendor);
      for p in f.prefixes {
        assert!(p.len() < f.length);
        assert!(p.bytes().all(|b| SERIAL_ALPHABET.contains(&b)), "{p}");
      }
    }
  }

  #[test]
  fn vendor_serials_follow_their_format() {
    let mut rng = StdRng::seed_from_u64(5);
    for f in SERIAL_FORMATS {
      for _ in 0..50 {
        let s = generate_serial(Some(f.vendor), &mut rng);
        assert!(matches_vendor_format(f.vendor, &s), "{} {s}", f.vendor);
        assert!(!s.contains(['I', 'O', 'Q']));
      }
    }
  }

  #[test]
  fn unknown_vendor_uses_generic_default_length() {
    let mut rng = StdRng::seed_from_u64(5);
    let s = generate_serial(Some("Acme"), &mut rng);
    assert_eq!(s.len(), DEFAULT_SERIAL_LEN);
    assert!(is_plausible_serial(&s));
  }

  #[test]
  fn generic_length_is_validated() {
    let mut rng = StdRng::seed_from_u64(9);
    assert_eq!(generate_generic_serial(8, &mut rng).unwrap().len(), 8);
    assert_eq!(generate_generic_serial(16, &mut rng).unwrap().len(), 16);
    assert_eq!(
      generate_generic_serial(7, &mut rng),
      Err(GenerateError::SerialLength(7))
    );
    assert_eq!(
      generate_generic_serial(17, &mut rng),
      Err(GenerateError::SerialLength(17))
    );
  }
}
