mod app_config;
mod identifier;
mod installed_app;
mod profile;
mod snapshot;
mod spoof_type;

pub use app_config::AppConfig;
pub use identifier::{DeviceIdentifier, IdentifierValue};
pub use installed_app::{InstalledApp, PackageRegistry, StaticRegistry};
pub use profile::{Profile, DEFAULT_PROFILE_NAME};
pub use snapshot::{ConfigSnapshot, SCHEMA_VERSION};
pub use spoof_type::{Category, CorrelationGroup, SpoofType};
