use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
  Device,
  Network,
  Advertising,
  System,
  Location,
}

/// Identifier fields that must be derived together from one source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorrelationGroup {
  None,
  SimCard,
  Location,
  DeviceHardware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpoofType {
  Imei,
  Meid,
  Serial,
  AndroidId,
  BuildFingerprint,
  BuildModel,
  BuildManufacturer,
  BuildBrand,
  BuildDevice,
  BuildProduct,
  BuildBoard,
  Imsi,
  Iccid,
  PhoneNumber,
  CarrierName,
  CarrierMccMnc,
  SimCountryIso,
  NetworkCountryIso,
  WifiMac,
  BluetoothMac,
  WifiSsid,
  WifiBssid,
  AdvertisingId,
  GsfId,
  MediaDrmId,
  InstanceId,
  Latitude,
  Longitude,
  Timezone,
  Locale,
}

impl SpoofType {
  pub const ALL: &'static [SpoofType] = &[
    SpoofType::Imei,
    SpoofType::Meid,
    SpoofType::Serial,
    SpoofType::AndroidId,
    SpoofType::BuildFingerprint,
    SpoofType::BuildModel,
    SpoofType::BuildManufacturer,
    SpoofType::BuildBrand,
    SpoofType::BuildDevice,
    SpoofType::BuildProduct,
    SpoofType::BuildBoard,
    SpoofType::Imsi,
    SpoofType::Iccid,
    SpoofType::PhoneNumber,
    SpoofType::CarrierName,
    SpoofType::CarrierMccMnc,
    SpoofType::SimCountryIso,
    SpoofType::NetworkCountryIso,
    SpoofType::WifiMac,
    SpoofType::BluetoothMac,
    SpoofType::WifiSsid,
    SpoofType::WifiBssid,
    SpoofType::AdvertisingId,
    SpoofType::GsfId,
    SpoofType::MediaDrmId,
    SpoofType::InstanceId,
    SpoofType::Latitude,
    SpoofType::Longitude,
    SpoofType::Timezone,
    SpoofType::Locale,
  ];

  pub fn category(self) -> Category {
    use SpoofType::*;
    match self {
      Imei | Meid | Serial | AndroidId => Category::Device,
      BuildFingerprint | BuildModel | BuildManufacturer | BuildBrand | BuildDevice
      | BuildProduct | BuildBoard => Category::System,
      Imsi | Iccid | PhoneNumber | CarrierName | CarrierMccMnc | SimCountryIso
      | NetworkCountryIso | WifiMac | BluetoothMac | WifiSsid | WifiBssid => Category::Network,
      AdvertisingId | GsfId | MediaDrmId | InstanceId => Category::Advertising,
      Latitude | Longitude | Timezone | Locale => Category::Location,
    }
  }

  pub fn correlation_group(self) -> CorrelationGroup {
    use SpoofType::*;
    match self {
      Imei | Meid | Serial | BuildFingerprint | BuildModel | BuildManufacturer | BuildBrand
      | BuildDevice | BuildProduct | BuildBoard => CorrelationGroup::DeviceHardware,
      Imsi | Iccid | PhoneNumber | CarrierName | CarrierMccMnc | SimCountryIso
      | NetworkCountryIso => CorrelationGroup::SimCard,
      Latitude | Longitude | Timezone | Locale => CorrelationGroup::Location,
      AndroidId | WifiMac | BluetoothMac | WifiSsid | WifiBssid | AdvertisingId | GsfId
      | MediaDrmId | InstanceId => CorrelationGroup::None,
    }
  }

  pub fn display_name(self) -> &'static str {
    use SpoofType::*;
    match self {
      Imei => "IMEI",
      Meid => "MEID",
      Serial => "Serial number",
      AndroidId => "Android ID",
      BuildFingerprint => "Build fingerprint",
      BuildModel => "Model",
      BuildManufacturer => "Manufacturer",
      BuildBrand => "Brand",
      BuildDevice => "Device",
      BuildProduct => "Product",
      BuildBoard => "Board",
      Imsi => "IMSI",
      Iccid => "ICCID",
      PhoneNumber => "Phone number",
      CarrierName => "Carrier name",
      CarrierMccMnc => "Carrier MCC/MNC",
      SimCountryIso => "SIM country",
      NetworkCountryIso => "Network country",
      WifiMac => "Wi-Fi MAC",
      BluetoothMac => "Bluetooth MAC",
      WifiSsid => "Wi-Fi SSID",
      WifiBssid => "Wi-Fi BSSID",
      AdvertisingId => "Advertising ID",
      GsfId => "GSF ID",
      MediaDrmId => "Media DRM ID",
      InstanceId => "Instance ID",
      Latitude => "Latitude",
      Longitude => "Longitude",
      Timezone => "Timezone",
      Locale => "Locale",
    }
  }

  /// Wire name, e.g. `CARRIER_MCC_MNC`.
  pub fn as_str(self) -> &'static str {
    use SpoofType::*;
    match self {
      Imei => "IMEI",
      Meid => "MEID",
      Serial => "SERIAL",
      AndroidId => "ANDROID_ID",
      BuildFingerprint => "BUILD_FINGERPRINT",
      BuildModel => "BUILD_MODEL",
      BuildManufacturer => "BUILD_MANUFACTURER",
      BuildBrand => "BUILD_BRAND",
      BuildDevice => "BUILD_DEVICE",
      BuildProduct => "BUILD_PRODUCT",
      BuildBoard => "BUILD_BOARD",
      Imsi => "IMSI",
      Iccid => "ICCID",
      PhoneNumber => "PHONE_NUMBER",
      CarrierName => "CARRIER_NAME",
      CarrierMccMnc => "CARRIER_MCC_MNC",
      SimCountryIso => "SIM_COUNTRY_ISO",
      NetworkCountryIso => "NETWORK_COUNTRY_ISO",
      WifiMac => "WIFI_MAC",
      BluetoothMac => "BLUETOOTH_MAC",
      WifiSsid => "WIFI_SSID",
      WifiBssid => "WIFI_BSSID",
      AdvertisingId => "ADVERTISING_ID",
      GsfId => "GSF_ID",
      MediaDrmId => "MEDIA_DRM_ID",
      InstanceId => "INSTANCE_ID",
      Latitude => "LATITUDE",
      Longitude => "LONGITUDE",
      Timezone => "TIMEZONE",
      Locale => "LOCALE",
    }
  }
}

impl fmt::Display for SpoofType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SpoofType {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().replace('-', "_");
    SpoofType::ALL
      .iter()
      .copied()
      .find(|t| t.as_str().eq_ignore_ascii_case(&wanted))
      .ok_or_else(|| anyhow::anyhow!("unknown identifier type `{s}`"))
  }
}

impl CorrelationGroup {
  pub const CORRELATED: &'static [CorrelationGroup] = &[
    CorrelationGroup::SimCard,
    CorrelationGroup::Location,
    CorrelationGroup::DeviceHardware,
  ];

  pub fn members(self) -> impl Iterator<Item = SpoofType> {
    SpoofType::ALL
      .iter()
      .copied()
      .filter(move |t| t.correlation_group() == self)
  }

  pub fn is_correlated(self) -> bool {
    self != CorrelationGroup::None
  }

  pub fn as_str(self) -> &'static str {
    match self {
      CorrelationGroup::None => "NONE",
      CorrelationGroup::SimCard => "SIM_CARD",
      CorrelationGroup::Location => "LOCATION",
      CorrelationGroup::DeviceHardware => "DEVICE_HARDWARE",
    }
  }
}

impl fmt::Display for CorrelationGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for CorrelationGroup {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().replace('-', "_");
    [
      CorrelationGroup::None,
      CorrelationGroup::SimCard,
      CorrelationGroup::Location,
      CorrelationGroup::DeviceHardware,
    ]
    .into_iter()
    .find(|g| g.as_str().eq_ignore_ascii_case(&wanted))
    .ok_or_else(|| anyhow::anyhow!("unknown correlation group `{s}`"))
  }
}
