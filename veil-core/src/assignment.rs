//! Cross-checks profile assignments against the installed package list.

use crate::model::{ConfigSnapshot, InstalledApp};
use crate::resolver::{resolve_profile, ProfileSource};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppRow {
  pub package: String,
  pub label: String,
  pub is_system: bool,
  pub profile: Option<String>,
  pub source: Option<ProfileSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentReport {
  pub rows: Vec<AppRow>,
  /// Assigned packages that are no longer installed.
  pub stale: Vec<String>,
  pub system_assigned: Vec<String>,
  pub unassigned_user_apps: Vec<String>,
}

impl AssignmentReport {
  pub fn is_clean(&self) -> bool {
    self.stale.is_empty() && self.system_assigned.is_empty()
  }
}

pub fn check_assignments(snapshot: &ConfigSnapshot, installed: &[InstalledApp]) -> AssignmentReport {
  let by_name: HashMap<&str, &InstalledApp> = installed
    .iter()
    .map(|a| (a.package_name.as_str(), a))
    .collect();
  let assigned: BTreeSet<&str> = snapshot
    .profiles
    .iter()
    .flat_map(|p| p.assigned_apps.iter().map(String::as_str))
    .collect();

  let mut report = AssignmentReport::default();
  for pkg in &assigned {
    match by_name.get(pkg) {
      None => report.stale.push(pkg.to_string()),
      Some(app) if app.is_system_app => report.system_assigned.push(pkg.to_string()),
      Some(_) => {}
    }
  }

  let mut apps: Vec<&InstalledApp> = installed.iter().collect();
  apps.sort_by(|a, b| a.package_name.cmp(&b.package_name));
  apps.dedup_by(|a, b| a.package_name == b.package_name);
  for app in apps {
    let resolved = resolve_profile(snapshot, &app.package_name);
    if !app.is_system_app && !assigned.contains(app.package_name.as_str()) {
      report.unassigned_user_apps.push(app.package_name.clone());
    }
    report.rows.push(AppRow {
      package: app.package_name.clone(),
      label: app.label.clone(),
      is_system: app.is_system_app,
      profile: resolved.map(|(p, _)| p.name.clone()),
      source: resolved.map(|(_, s)| s),
    });
  }

  if !report.stale.is_empty() {
    tracing::warn!(count = report.stale.len(), "profiles reference packages that are not installed");
  }
  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Profile;

  #[test]
  fn classifies_assignments() {
    let snapshot = ConfigSnapshot {
      profiles: vec![
        Profile::blank("Default").with_default(true),
        Profile::blank("Bank")
          .add_app("com.bank.app")
          .add_app("com.gone")
          .add_app("com.android.phone"),
      ],
      ..ConfigSnapshot::default()
    };
    let installed = vec![
      InstalledApp::new("com.bank.app", false),
      InstalledApp::new("com.game", false),
      InstalledApp::new("com.android.phone", true),
      InstalledApp::new("com.android.settings", true),
    ];
    let report = check_assignments(&snapshot, &installed);

    assert_eq!(report.stale, vec!["com.gone"]);
    assert_eq!(report.system_assigned, vec!["com.android.phone"]);
    assert_eq!(report.unassigned_user_apps, vec!["com.game"]);
    assert!(!report.is_clean());

    let bank = report.rows.iter().find(|r| r.package == "com.bank.app").unwrap();
    assert_eq!(bank.profile.as_deref(), Some("Bank"));
    assert_eq!(bank.source, Some(ProfileSource::Assigned));
    let game = report.rows.iter().find(|r| r.package == "com.game").unwrap();
    assert_eq!(game.source, Some(ProfileSource::Default));
  }

  #[test]
  fn no_profiles_means_no_rows_resolve() {
    let report = check_assignments(&ConfigSnapshot::default(), &[InstalledApp::new("com.a", false)]);
    assert!(report.is_clean());
    assert_eq!(report.rows[0].profile, None);
    assert_eq!(report.unassigned_user_apps, vec!["com.a"]);
  }
}
