use crate::error::CorrelationError;
use crate::model::SpoofType;
use crate::validate::{check_digit_of, luhn_validate};
use rand::seq::SliceRandom;
use rand::Rng;

pub const IMSI_LEN: usize = 15;
pub const ICCID_LEN: usize = 19;

/// Numbering plan facts for one country.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Country {
  pub iso: &'static str,
  pub calling_code: u16,
  /// Digits after the calling code.
  pub national_len: usize,
  pub mobile_prefixes: &'static [&'static str],
}

pub const COUNTRIES: &[Country] = &[
  Country { iso: "US", calling_code: 1, national_len: 10, mobile_prefixes: &["201", "212", "310", "415", "646", "702", "917"] },
  Country { iso: "GB", calling_code: 44, national_len: 10, mobile_prefixes: &["71", "73", "74", "75", "77", "78", "79"] },
  Country { iso: "DE", calling_code: 49, national_len: 11, mobile_prefixes: &["151", "152", "157", "160", "170", "171", "176"] },
  Country { iso: "FR", calling_code: 33, national_len: 9, mobile_prefixes: &["6", "7"] },
  Country { iso: "IN", calling_code: 91, national_len: 10, mobile_prefixes: &["70", "81", "90", "98", "99"] },
  Country { iso: "JP", calling_code: 81, national_len: 10, mobile_prefixes: &["70", "80", "90"] },
  Country { iso: "BR", calling_code: 55, national_len: 11, mobile_prefixes: &["119", "219", "319"] },
  Country { iso: "CA", calling_code: 1, national_len: 10, mobile_prefixes: &["416", "604", "514", "403"] },
  Country { iso: "AU", calling_code: 61, national_len: 9, mobile_prefixes: &["4"] },
  Country { iso: "ES", calling_code: 34, national_len: 9, mobile_prefixes: &["6", "7"] },
  Country { iso: "IT", calling_code: 39, national_len: 10, mobile_prefixes: &["32", "33", "34", "35", "36", "38"] },
  Country { iso: "MX", calling_code: 52, national_len: 10, mobile_prefixes: &["55", "33", "81"] },
  Country { iso: "KR", calling_code: 82, national_len: 10, mobile_prefixes: &["10"] },
  Country { iso: "NL", calling_code: 31, national_len: 9, mobile_prefixes: &["6"] },
  Country { iso: "SG", calling_code: 65, national_len: 8, mobile_prefixes: &["8", "9"] },
  Country { iso: "SE", calling_code: 46, national_len: 9, mobile_prefixes: &["70", "72", "73", "76"] },
];

pub fn country(iso: &str) -> Option<&'static Country> {
  COUNTRIES.iter().find(|c| c.iso.eq_ignore_ascii_case(iso))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Carrier {
  pub name: &'static str,
  pub mcc: &'static str,
  pub mnc: &'static str,
  pub iso: &'static str,
}

macro_rules! carrier {
  ($name:expr, $mcc:expr, $mnc:expr, $iso:expr) => {
    Carrier { name: $name, mcc: $mcc, mnc: $mnc, iso: $iso }
  };
}

pub const CARRIERS: &[Carrier] = &[
  carrier!("T-Mobile", "310", "260", "US"),
  carrier!("Verizon", "311", "480", "US"),
  carrier!("AT&T", "310", "410", "US"),
  carrier!("Vodafone UK", "234", "15", "GB"),
  carrier!("EE", "234", "30", "GB"),
  carrier!("O2 - UK", "234", "10", "GB"),
  carrier!("Telekom.de", "262", "01", "DE"),
  carrier!("Vodafone.de", "262", "02", "DE"),
  carrier!("o2 - de", "262", "03", "DE"),
  carrier!("Orange F", "208", "01", "FR"),
  carrier!("SFR", "208", "10", "FR"),
  carrier!("Bouygues Telecom", "208", "20", "FR"),
  carrier!("Airtel", "404", "10", "IN"),
  carrier!("Vi India", "404", "20", "IN"),
  carrier!("Jio", "405", "857", "IN"),
  carrier!("NTT DOCOMO", "440", "10", "JP"),
  carrier!("SoftBank", "440", "20", "JP"),
  carrier!("au", "440", "50", "JP"),
  carrier!("Vivo", "724", "06", "BR"),
  carrier!("Claro BR", "724", "05", "BR"),
  carrier!("TIM BR", "724", "04", "BR"),
  carrier!("Rogers", "302", "720", "CA"),
  carrier!("Bell", "302", "610", "CA"),
  carrier!("TELUS", "302", "220", "CA"),
  carrier!("Telstra", "505", "01", "AU"),
  carrier!("Optus", "505", "02", "AU"),
  carrier!("Vodafone AU", "505", "03", "AU"),
  carrier!("Movistar", "214", "07", "ES"),
  carrier!("Vodafone ES", "214", "01", "ES"),
  carrier!("Orange ES", "214", "03", "ES"),
  carrier!("TIM", "222", "01", "IT"),
  carrier!("Vodafone IT", "222", "10", "IT"),
  carrier!("WINDTRE", "222", "88", "IT"),
  carrier!("Telcel", "334", "020", "MX"),
  carrier!("AT&T MX", "334", "050", "MX"),
  carrier!("Movistar MX", "334", "030", "MX"),
  carrier!("SKTelecom", "450", "05", "KR"),
  carrier!("KT", "450", "08", "KR"),
  carrier!("LG U+", "450", "06", "KR"),
  carrier!("KPN", "204", "08", "NL"),
  carrier!("Vodafone NL", "204", "04", "NL"),
  carrier!("Odido", "204", "16", "NL"),
  carrier!("Singtel", "525", "01", "SG"),
  carrier!("StarHub", "525", "05", "SG"),
  carrier!("M1", "525", "03", "SG"),
  carrier!("Telia", "240", "01", "SE"),
  carrier!("Tele2", "240", "07", "SE"),
  carrier!("Telenor SE", "240", "08", "SE"),
];

impl Carrier {
  pub fn mcc_mnc(&self) -> String {
    format!("{}{}", self.mcc, self.mnc)
  }

  pub fn country(&self) -> Option<&'static Country> {
    country(self.iso)
  }

  pub fn calling_code(&self) -> u16 {
    self.country().map(|c| c.calling_code).unwrap_or(0)
  }
}

pub fn carrier_by_mcc_mnc(mcc_mnc: &str) -> Option<&'static Carrier> {
  CARRIERS.iter().find(|c| c.mcc_mnc() == mcc_mnc)
}

pub fn carriers_in(iso: &str) -> impl Iterator<Item = &'static Carrier> + '_ {
  CARRIERS.iter().filter(move |c| c.iso.eq_ignore_ascii_case(iso))
}

/// Raw SIM values before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimFields {
  pub imsi: String,
  pub iccid: String,
  pub phone_number: String,
  pub sim_country_iso: String,
  pub network_country_iso: String,
  pub sim_operator_name: String,
  pub network_operator: String,
}

/// A SIM identity that agrees with its carrier on every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
  carrier: &'static Carrier,
  fields: SimFields,
}

fn push_digits<R: Rng + ?Sized>(out: &mut String, until: usize, rng: &mut R) {
  while out.len() < until {
    out.push(char::from(b'0' + rng.gen_range(0..10u8)));
  }
}

fn all_digits(s: &str) -> bool {
  !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl SimConfig {
  pub fn new(carrier: &'static Carrier, fields: SimFields) -> Result<Self, CorrelationError> {
    let mcc_mnc = carrier.mcc_mnc();
    if fields.imsi.len() != IMSI_LEN || !all_digits(&fields.imsi) || !fields.imsi.starts_with(&mcc_mnc) {
      return Err(CorrelationError::Imsi {
        imsi: fields.imsi,
        mcc_mnc,
      });
    }

    let cc = carrier.calling_code();
    let iccid_prefix = format!("89{cc}");
    if fields.iccid.len() != ICCID_LEN
      || !fields.iccid.starts_with(&iccid_prefix)
      || !luhn_validate(&fields.iccid)
    {
      return Err(CorrelationError::Iccid(fields.iccid, cc));
    }

    let phone_ok = fields
      .phone_number
      .strip_prefix(&format!("+{cc}"))
      .map(all_digits)
      .unwrap_or(false);
    if !phone_ok {
      return Err(CorrelationError::PhonePrefix {
        phone: fields.phone_number,
        country_code: cc,
      });
    }

    for (field, value) in [
      ("sim_country_iso", &fields.sim_country_iso),
      ("network_country_iso", &fields.network_country_iso),
    ] {
      if !value.eq_ignore_ascii_case(carrier.iso) {
        return Err(CorrelationError::Mismatch {
          field,
          value: value.clone(),
          expected: carrier.iso.to_ascii_lowercase(),
        });
      }
    }
    if fields.network_operator != mcc_mnc {
      return Err(CorrelationError::Mismatch {
        field: "network_operator",
        value: fields.network_operator,
        expected: mcc_mnc,
      });
    }
    if fields.sim_operator_name != carrier.name {
      return Err(CorrelationError::Mismatch {
        field: "sim_operator_name",
        value: fields.sim_operator_name,
        expected: carrier.name.to_string(),
      });
    }

    Ok(Self { carrier, fields })
  }

  pub fn generate<R: Rng + ?Sized>(
    carrier: &'static Carrier,
    rng: &mut R,
  ) -> Result<Self, CorrelationError> {
    let mcc_mnc = carrier.mcc_mnc();

    let mut imsi = mcc_mnc.clone();
    push_digits(&mut imsi, IMSI_LEN, rng);

    let cc = carrier.calling_code();
    let mut iccid = format!("89{cc}{}", &carrier.mnc[..2]);
    push_digits(&mut iccid, ICCID_LEN - 1, rng);
    let payload: Vec<u8> = iccid.bytes().map(|b| b - b'0').collect();
    iccid.push(char::from(b'0' + check_digit_of(&payload)));

    let mut phone_number = format!("+{cc}");
    if let Some(country) = carrier.country() {
      let prefix = country.mobile_prefixes.choose(rng).copied().unwrap_or("");
      let mut national = prefix.to_string();
      push_digits(&mut national, country.national_len, rng);
      phone_number.push_str(&national);
    }

    let iso = carrier.iso.to_ascii_lowercase();
    Self::new(
      carrier,
      SimFields {
        imsi,
        iccid,
        phone_number,
        sim_country_iso: iso.clone(),
        network_country_iso: iso,
        sim_operator_name: carrier.name.to_string(),
        network_operator: mcc_mnc,
      },
    )
  }

  pub fn carrier(&self) -> &'static Carrier {
    self.carrier
  }

  pub fn fields(&self) -> &SimFields {
    &self.fields
  }

  pub fn value(&self, ty: SpoofType) -> Option<&str> {
    let f = &self.fields;
    match ty {
      SpoofType::Imsi => Some(&f.imsi),
      SpoofType::Iccid => Some(&f.iccid),
      SpoofType::PhoneNumber => Some(&f.phone_number),
      SpoofType::CarrierName => Some(&f.sim_operator_name),
      SpoofType::CarrierMccMnc => Some(&f.network_operator),
      SpoofType::SimCountryIso => Some(&f.sim_country_iso),
      SpoofType::NetworkCountryIso => Some(&f.network_country_iso),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use std::collections::BTreeMap;

  #[test]
  fn table_covers_sixteen_countries_with_two_carriers_each() {
    assert_eq!(COUNTRIES.len(), 16);
    for c in COUNTRIES {
      assert!(carriers_in(c.iso).count() >= 2, "{}", c.iso);
    }
    for carrier in CARRIERS {
      assert!(carrier.country().is_some(), "{}", carrier.name);
      assert!(matches!(carrier.mnc.len(), 2 | 3));
    }
  }

  #[test]
  fn mcc_mnc_keys_are_unique() {
    let mut seen = BTreeMap::new();
    for c in CARRIERS {
      assert!(seen.insert(c.mcc_mnc(), c.name).is_none(), "{}", c.mcc_mnc());
    }
  }

  #[test]
  fn generated_sims_satisfy_every_rule() {
    let mut rng = StdRng::seed_from_u64(11);
    for carrier in CARRIERS {
      let sim = SimConfig::generate(carrier, &mut rng).unwrap();
      let f = sim.fields();
      assert!(f.imsi.starts_with(&carrier.mcc_mnc()));
      assert_eq!(f.iccid.len(), ICCID_LEN);
      assert!(luhn_validate(&f.iccid));
      assert!(f.phone_number.starts_with(&format!("+{}", carrier.calling_code())));
      let country = carrier.country().unwrap();
      let cc_len = carrier.calling_code().to_string().len();
      assert_eq!(f.phone_number.len(), 1 + cc_len + country.national_len);
      assert_eq!(f.sim_country_iso, carrier.iso.to_ascii_lowercase());
    }
  }

  #[test]
  fn mismatched_imsi_is_rejected() {
    let mut rng = StdRng::seed_from_u64(12);
    let carrier = carrier_by_mcc_mnc("310260").unwrap();
    let mut fields = SimConfig::generate(carrier, &mut rng).unwrap().fields().clone();
    fields.imsi = "234150000000000".into();
    assert!(matches!(
      SimConfig::new(carrier, fields),
      Err(CorrelationError::Imsi { .. })
    ));
  }

  #[test]
  fn foreign_phone_and_country_are_rejected() {
    let mut rng = StdRng::seed_from_u64(13);
    let carrier = carrier_by_mcc_mnc("23415").unwrap();
    let good = SimConfig::generate(carrier, &mut rng).unwrap().fields().clone();

    let mut phone = good.clone();
    phone.phone_number = "+4915112345678".into();
    assert!(matches!(
      SimConfig::new(carrier, phone),
      Err(CorrelationError::PhonePrefix { country_code: 44, .. })
    ));

    let mut iso = good.clone();
    iso.network_country_iso = "de".into();
    assert!(matches!(
      SimConfig::new(carrier, iso),
      Err(CorrelationError::Mismatch { field: "network_country_iso", .. })
    ));

    let mut upper = good;
    upper.sim_country_iso = "GB".into();
    assert!(SimConfig::new(carrier, upper).is_ok());
  }

  #[test]
  fn iccid_with_bad_check_digit_is_rejected() {
    let mut rng = StdRng::seed_from_u64(14);
    let carrier = carrier_by_mcc_mnc("26201").unwrap();
    let mut fields = SimConfig::generate(carrier, &mut rng).unwrap().fields().clone();
    let last = fields.iccid.pop().unwrap();
    let bumped = (last.to_digit(10).unwrap() + 1) % 10;
    fields.iccid.push(char::from_digit(bumped, 10).unwrap());
    assert!(matches!(
      SimConfig::new(carrier, fields),
      Err(CorrelationError::Iccid(_, 49))
    ));
  }
}
