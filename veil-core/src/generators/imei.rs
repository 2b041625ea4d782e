use crate::validate::check_digit_of;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct TacEntry {
  pub vendor: &'static str,
  pub tacs: &'static [&'static str],
}

pub const TAC_TABLE: &[TacEntry] = &[
  TacEntry {
    vendor: "Samsung",
    tacs: &["35332811", "35391110", "35875311", "35290611", "35926010", "35457811"],
  },
  TacEntry {
    vendor: "Google",
    tacs: &["35161109", "35396710", "35847631", "35824005", "35309611"],
  },
  TacEntry {
    vendor: "Xiaomi",
    tacs: &["86891303", "86769904", "86446203", "86120705"],
  },
  TacEntry {
    vendor: "OnePlus",
    tacs: &["86882504", "86754104", "86293905"],
  },
  TacEntry {
    vendor: "Motorola",
    tacs: &["35415510", "35823009", "35991218"],
  },
  TacEntry {
    vendor: "Sony",
    tacs: &["35467210", "35280011", "35106711"],
  },
  TacEntry {
    vendor: "Nokia",
    tacs: &["35337911", "35468010", "35209212"],
  },
];

const MEID_REGIONS: &[&str] = &["A0", "A1", "A2", "A3", "A4"];

fn entry_for(vendor: &str) -> Option<&'static TacEntry> {
  TAC_TABLE
    .iter()
    .find(|e| e.vendor.eq_ignore_ascii_case(vendor.trim()))
}

pub fn vendor_has_tac(vendor: &str, imei: &str) -> bool {
  entry_for(vendor)
    .map(|e| e.tacs.iter().any(|tac| imei.starts_with(tac)))
    .unwrap_or(false)
}

fn pick_tac<R: Rng + ?Sized>(vendor: Option<&str>, rng: &mut R) -> &'static str {
  let entry = match vendor.and_then(entry_for) {
    Some(e) => e,
    None => &TAC_TABLE[rng.gen_range(0..TAC_TABLE.len())],
  };
  entry.tacs.choose(rng).copied().unwrap_or(entry.tacs[0])
}

/// 8-digit TAC + 6 random digits + Luhn check digit.
pub fn generate_imei<R: Rng + ?Sized>(vendor: Option<&str>, rng: &mut R) -> String {
  let tac = pick_tac(vendor, rng);
  let mut payload: Vec<u8> = tac.bytes().map(|b| b - b'0').collect();
  for _ in 0..6 {
    payload.push(rng.gen_range(0..10));
  }
  let check = check_digit_of(&payload);
  payload.push(check);
  payload.iter().map(|d| char::from(b'0' + d)).collect()
}

/// 14 uppercase hex digits with a CDMA regional code prefix.
pub fn generate_meid<R: Rng + ?Sized>(rng: &mut R) -> String {
  let region = MEID_REGIONS.choose(rng).copied().unwrap_or("A0");
  let mut out = String::with_capacity(14);
  out.push_str(region);
  for _ in 0..12 {
    out.push_str(&format!("{:X}", rng.gen_range(0..16u8)));
  }
  out
}
