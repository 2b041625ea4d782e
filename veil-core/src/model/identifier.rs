use super::SpoofType;
use crate::types::now_unix_ms;
use serde::{Deserialize, Serialize};

/// Stored value of an identifier. `UseDefault` travels as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum IdentifierValue {
  Explicit(String),
  #[default]
  UseDefault,
}

impl IdentifierValue {
  pub fn explicit(value: impl Into<String>) -> Self {
    IdentifierValue::Explicit(value.into())
  }

  pub fn as_explicit(&self) -> Option<&str> {
    match self {
      IdentifierValue::Explicit(v) => Some(v),
      IdentifierValue::UseDefault => None,
    }
  }
}

impl From<Option<String>> for IdentifierValue {
  fn from(v: Option<String>) -> Self {
    match v {
      Some(v) => IdentifierValue::Explicit(v),
      None => IdentifierValue::UseDefault,
    }
  }
}

impl From<IdentifierValue> for Option<String> {
  fn from(v: IdentifierValue) -> Self {
    match v {
      IdentifierValue::Explicit(v) => Some(v),
      IdentifierValue::UseDefault => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentifier {
  #[serde(rename = "type")]
  pub spoof_type: SpoofType,

  #[serde(default)]
  pub value: IdentifierValue,

  #[serde(default = "default_true")]
  pub enabled: bool,

  #[serde(default)]
  pub last_modified: u64,
}

fn default_true() -> bool {
  true
}

impl DeviceIdentifier {
  pub fn new(spoof_type: SpoofType, value: IdentifierValue) -> Self {
    Self {
      spoof_type,
      value,
      enabled: true,
      last_modified: now_unix_ms(),
    }
  }

  pub fn use_default(spoof_type: SpoofType) -> Self {
    Self::new(spoof_type, IdentifierValue::UseDefault)
  }

  pub fn with_value(&self, value: IdentifierValue) -> Self {
    Self {
      value,
      last_modified: now_unix_ms(),
      ..self.clone()
    }
  }

  pub fn with_enabled(&self, enabled: bool) -> Self {
    Self {
      enabled,
      last_modified: now_unix_ms(),
      ..self.clone()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn use_default_is_null_on_the_wire() {
    let id = DeviceIdentifier {
      spoof_type: SpoofType::Imei,
      value: IdentifierValue::UseDefault,
      enabled: false,
      last_modified: 5,
    };
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(
      json,
      r#"{"type":"IMEI","value":null,"enabled":false,"last_modified":5}"#
    );
    let back: DeviceIdentifier = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
  }

  #[test]
  fn missing_fields_take_defaults() {
    let id: DeviceIdentifier = serde_json::from_str(r#"{"type":"SERIAL"}"#).unwrap();
    assert_eq!(id.value, IdentifierValue::UseDefault);
    assert!(id.enabled);
  }

  #[test]
  fn copies_refresh_timestamp() {
    let mut id = DeviceIdentifier::use_default(SpoofType::GsfId);
    id.last_modified = 0;
    let next = id.with_value(IdentifierValue::explicit("abc"));
    assert_eq!(next.value.as_explicit(), Some("abc"));
    assert!(next.last_modified > 0);
    assert_eq!(id.value, IdentifierValue::UseDefault);
  }
}
