use serde::{Deserialize, Serialize};

/// Snapshot of one package from the OS package registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
  pub package_name: String,
  pub label: String,
  pub is_system_app: bool,

  #[serde(default)]
  pub version_name: Option<String>,

  #[serde(default)]
  pub version_code: Option<u64>,

  #[serde(skip)]
  pub icon: Option<Vec<u8>>,
}

impl InstalledApp {
  pub fn new(package_name: impl Into<String>, is_system_app: bool) -> Self {
    let package_name = package_name.into();
    Self {
      label: package_name.clone(),
      package_name,
      is_system_app,
      version_name: None,
      version_code: None,
      icon: None,
    }
  }
}

/// Source of installed packages (package manager, `packages.list`, ...).
pub trait PackageRegistry {
  fn installed_apps(&self) -> anyhow::Result<Vec<InstalledApp>>;
}

pub struct StaticRegistry(pub Vec<InstalledApp>);

impl PackageRegistry for StaticRegistry {
  fn installed_apps(&self) -> anyhow::Result<Vec<InstalledApp>> {
    Ok(self.0.clone())
  }
}
