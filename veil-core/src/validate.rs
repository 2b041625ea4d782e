//! Checksums and bit-field checks shared by the generators and the
//! correlation tuples.

use crate::error::GenerateError;

pub const IMEI_LEN: usize = 15;

fn digits(s: &str) -> Option<Vec<u8>> {
  if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  Some(s.bytes().map(|b| b - b'0').collect())
}

// Doubling is aligned from the right so that a 14-digit payload doubles its
// odd (0-indexed) positions and a complete 15-digit number does the same.
fn luhn_sum(digits: &[u8], double_rightmost: bool) -> u32 {
  digits
    .iter()
    .rev()
    .enumerate()
    .map(|(i, d)| {
      let mut v = u32::from(*d);
      if (i % 2 == 0) == double_rightmost {
        v *= 2;
        if v > 9 {
          v -= 9;
        }
      }
      v
    })
    .sum()
}

pub(crate) fn check_digit_of(payload: &[u8]) -> u8 {
  let sum = luhn_sum(payload, true);
  ((10 - sum % 10) % 10) as u8
}

/// Check digit for a numeric payload that does not yet carry one.
pub fn luhn_check_digit(payload: &str) -> Option<u8> {
  digits(payload).map(|d| check_digit_of(&d))
}

pub fn luhn_validate(number: &str) -> bool {
  match digits(number) {
    Some(d) if d.len() >= 2 => luhn_sum(&d, false) % 10 == 0,
    _ => false,
  }
}

pub fn imei_check_digit(payload: &str) -> Result<u8, GenerateError> {
  if payload.len() != IMEI_LEN - 1 {
    return Err(GenerateError::LuhnPayload {
      expected: IMEI_LEN - 1,
      got: payload.to_string(),
    });
  }
  luhn_check_digit(payload).ok_or_else(|| GenerateError::LuhnPayload {
    expected: IMEI_LEN - 1,
    got: payload.to_string(),
  })
}

pub fn is_valid_imei(s: &str) -> bool {
  s.len() == IMEI_LEN && luhn_validate(s)
}

/// Six 2-hex-digit octets separated consistently by `:` or `-`.
pub fn parse_mac(s: &str) -> Option<[u8; 6]> {
  let sep = if s.contains(':') {
    ':'
  } else if s.contains('-') {
    '-'
  } else {
    return None;
  };

  let mut out = [0u8; 6];
  let mut count = 0;
  for part in s.split(sep) {
    if count == 6 || part.len() != 2 {
      return None;
    }
    out[count] = u8::from_str_radix(part, 16).ok()?;
    count += 1;
  }
  (count == 6).then_some(out)
}

pub fn is_valid_mac(s: &str) -> bool {
  parse_mac(s).is_some()
}

pub fn is_unicast(mac: &str) -> bool {
  parse_mac(mac).map(|b| b[0] & 0x01 == 0).unwrap_or(false)
}

pub fn is_locally_administered(mac: &str) -> bool {
  parse_mac(mac).map(|b| b[0] & 0x02 != 0).unwrap_or(false)
}

pub fn format_mac(bytes: &[u8; 6]) -> String {
  bytes
    .iter()
    .map(|b| format!("{b:02X}"))
    .collect::<Vec<_>>()
    .join(":")
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  #[test]
  fn known_imei_check_digit() {
    assert_eq!(imei_check_digit("49015420323751").unwrap(), 8);
    assert!(is_valid_imei("490154203237518"));
    assert!(!is_valid_imei("490154203237519"));
  }

  #[test]
  fn imei_payload_length_is_enforced() {
    assert!(matches!(
      imei_check_digit("1234"),
      Err(GenerateError::LuhnPayload { expected: 14, .. })
    ));
    assert!(imei_check_digit("4901542032375A").is_err());
  }

  #[test]
  fn validate_rejects_non_numeric_and_short_input() {
    assert!(!luhn_validate(""));
    assert!(!luhn_validate("0"));
    assert!(!luhn_validate("49015420323751x"));
    assert!(!is_valid_imei("4901542032375180"));
  }

  #[test]
  fn mac_syntax_and_bits() {
    assert!(is_valid_mac("02:1A:2b:3C:4d:5E"));
    assert!(is_valid_mac("02-1A-2B-3C-4D-5E"));
    assert!(!is_valid_mac("02:1A-2B:3C:4D:5E"));
    assert!(!is_valid_mac("02:1A:2B:3C:4D"));
    assert!(!is_valid_mac("02:1A:2B:3C:4D:5E:6F"));
    assert!(!is_valid_mac("G2:1A:2B:3C:4D:5E"));

    assert!(is_unicast("02:00:00:00:00:01"));
    assert!(!is_unicast("03:00:00:00:00:01"));
    assert!(is_locally_administered("02:00:00:00:00:01"));
    assert!(!is_locally_administered("00:16:32:00:00:01"));
  }

  proptest! {
    #[test]
    fn appended_check_digit_always_validates(payload in "[0-9]{14}") {
      let d = imei_check_digit(&payload).unwrap();
      let imei = format!("{payload}{d}");
      prop_assert!(is_valid_imei(&imei));
    }

    #[test]
    fn check_digit_is_deterministic(payload in "[0-9]{14}") {
      prop_assert_eq!(imei_check_digit(&payload), imei_check_digit(&payload));
    }

    #[test]
    fn formatted_mac_parses_back(bytes in any::<[u8; 6]>()) {
      prop_assert_eq!(parse_mac(&format_mac(&bytes)), Some(bytes));
    }
  }
}
