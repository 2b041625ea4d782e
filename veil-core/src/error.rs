use crate::model::{CorrelationGroup, SpoofType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
  #[error("serial length {0} is outside 8..=16")]
  SerialLength(usize),

  #[error("luhn payload must be {expected} numeric digits, got `{got}`")]
  LuhnPayload { expected: usize, got: String },

  #[error("{0} belongs to a correlation group and has no standalone generator")]
  Correlated(SpoofType),

  #[error("{0} is not a correlation group")]
  NotCorrelated(CorrelationGroup),

  #[error("unknown {group} source record `{key}`")]
  UnknownAnchor { group: CorrelationGroup, key: String },

  #[error("no {0} source record left to choose from")]
  NoCandidates(CorrelationGroup),

  #[error(transparent)]
  Correlation(#[from] CorrelationError),
}

/// A derived tuple contradicts its own source record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CorrelationError {
  #[error("IMSI `{imsi}` must be 15 digits starting with `{mcc_mnc}`")]
  Imsi { imsi: String, mcc_mnc: String },

  #[error("ICCID `{0}` must be a 19-digit Luhn-valid number starting with `89{1}`")]
  Iccid(String, u16),

  #[error("phone number `{phone}` must start with `+{country_code}`")]
  PhonePrefix { phone: String, country_code: u16 },

  #[error("{field} `{value}` does not match `{expected}`")]
  Mismatch {
    field: &'static str,
    value: String,
    expected: String,
  },

  #[error("point ({lat}, {lon}) lies outside {city}")]
  OutsideCity { city: String, lat: f64, lon: f64 },

  #[error("IMEI `{0}` is not a Luhn-valid 15-digit number")]
  Imei(String),

  #[error("IMEI `{imei}` does not carry a {vendor} TAC")]
  ImeiVendor { imei: String, vendor: String },

  #[error("serial `{serial}` does not follow the {vendor} format")]
  Serial { serial: String, vendor: String },
}
