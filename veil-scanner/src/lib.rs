//! Lists installed packages next to the profile each one resolves to and
//! flags assignments that point at missing or system packages.

use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use veil_core::assignment::{check_assignments, AssignmentReport};
use veil_core::model::{InstalledApp, PackageRegistry};
use veil_core::resolver::{FileSnapshotSource, SnapshotSource};
use walkdir::WalkDir;

pub const PACKAGES_LIST: &str = "/data/system/packages.list";
pub const APP_DIR: &str = "/data/app";

/// Uids below this belong to the platform.
const FIRST_APPLICATION_UID: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
  List,
  Check,
}

impl ScanMode {
  pub fn from_args(args: &[String]) -> anyhow::Result<Self> {
    if args.iter().any(|a| a == "--list") {
      return Ok(Self::List);
    }
    if args.iter().any(|a| a == "--check") {
      return Ok(Self::Check);
    }
    Err(anyhow::anyhow!("expected `--list` or `--check`"))
  }
}

#[derive(Debug, Clone, Default)]
struct ScanConfig {
  packages_list: Option<PathBuf>,
  app_dir: Option<PathBuf>,
  profiles: Option<PathBuf>,
  json: bool,
}

/// Reads `packages.list`: `<package> <uid> <debuggable> <data dir> ...`.
pub struct PackagesListRegistry {
  path: PathBuf,
}

impl PackagesListRegistry {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl PackageRegistry for PackagesListRegistry {
  fn installed_apps(&self) -> anyhow::Result<Vec<InstalledApp>> {
    let raw = fs::read_to_string(&self.path)
      .with_context(|| format!("read {}", self.path.display()))?;
    Ok(parse_packages_list(&raw))
  }
}

fn parse_packages_list(raw: &str) -> Vec<InstalledApp> {
  let mut apps = Vec::new();
  for (n, line) in raw.lines().enumerate() {
    let mut cols = line.split_whitespace();
    let (Some(pkg), Some(uid)) = (cols.next(), cols.next()) else {
      continue;
    };
    match uid.parse::<u32>() {
      Ok(uid) => apps.push(InstalledApp::new(pkg, uid < FIRST_APPLICATION_UID)),
      Err(_) => tracing::warn!(line = n + 1, "skipping packages.list line with bad uid"),
    }
  }
  apps
}

/// Fallback when `packages.list` is unreadable: every `base.apk` under
/// the app directory is one user package. Install dirs are named
/// `<package>-<suffix>`, optionally nested in a `~~<random>` directory.
pub struct AppDirRegistry {
  root: PathBuf,
}

impl AppDirRegistry {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }
}

impl PackageRegistry for AppDirRegistry {
  fn installed_apps(&self) -> anyhow::Result<Vec<InstalledApp>> {
    if !self.root.is_dir() {
      anyhow::bail!("app directory not found: {}", self.root.display());
    }
    let mut apps: BTreeMap<String, InstalledApp> = BTreeMap::new();
    for entry in WalkDir::new(&self.root)
      .max_depth(3)
      .follow_links(false)
      .into_iter()
      .flatten()
    {
      if !entry.file_type().is_file() || entry.file_name() != "base.apk" {
        continue;
      }
      if let Some(pkg) = package_from_install_dir(entry.path()) {
        apps
          .entry(pkg.clone())
          .or_insert_with(|| InstalledApp::new(pkg, false));
      }
    }
    Ok(apps.into_values().collect())
  }
}

fn package_from_install_dir(apk: &Path) -> Option<String> {
  let dir = apk.parent()?.file_name()?.to_str()?;
  let pkg = dir.split_once('-').map_or(dir, |(p, _)| p);
  if pkg.is_empty() || pkg.starts_with("~~") || !pkg.contains('.') {
    return None;
  }
  Some(pkg.to_string())
}

pub fn run(mode: ScanMode) -> anyhow::Result<()> {
  let args: Vec<String> = std::env::args().collect();
  let cfg = parse_scan_config(&args);

  tracing_subscriber::fmt()
    .with_ansi(false)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();

  let profiles = match cfg.profiles.clone() {
    Some(p) => p,
    None => default_profiles_path()?,
  };
  let snapshot = FileSnapshotSource::new(&profiles).load()?;
  let installed = installed_apps(&cfg)?;
  let report = check_assignments(&snapshot, &installed);

  if cfg.json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_report(mode, &report);
  }

  if mode == ScanMode::Check && !report.is_clean() {
    anyhow::bail!(
      "assignment check failed: stale={} system={}",
      report.stale.len(),
      report.system_assigned.len()
    );
  }
  Ok(())
}

fn default_profiles_path() -> anyhow::Result<PathBuf> {
  let base = veil_core::paths::base_dir()?;
  let cfg = veil_core::config::load_or_default_readonly(&veil_core::paths::config_path(&base))?;
  Ok(veil_core::paths::profiles_path(&base, &cfg.storage.profiles_file))
}

fn installed_apps(cfg: &ScanConfig) -> anyhow::Result<Vec<InstalledApp>> {
  let list = cfg
    .packages_list
    .clone()
    .unwrap_or_else(|| PathBuf::from(PACKAGES_LIST));
  match PackagesListRegistry::new(&list).installed_apps() {
    Ok(apps) => Ok(apps),
    Err(err) => {
      let dir = cfg.app_dir.clone().unwrap_or_else(|| PathBuf::from(APP_DIR));
      tracing::warn!(error = %err, fallback = %dir.display(), "packages.list unavailable");
      AppDirRegistry::new(dir).installed_apps()
    }
  }
}

fn print_report(mode: ScanMode, report: &AssignmentReport) {
  if mode == ScanMode::List {
    for row in &report.rows {
      let profile = match (&row.profile, row.source) {
        (Some(name), Some(source)) => format!("{name} ({source})"),
        _ => "-".to_string(),
      };
      println!(
        "{}{}  {profile}",
        row.package,
        if row.is_system { " [system]" } else { "" }
      );
    }
  }

  for pkg in &report.stale {
    println!("STALE {pkg}: assigned but not installed");
  }
  for pkg in &report.system_assigned {
    println!("SYSTEM {pkg}: system package has an explicit profile");
  }
  println!(
    "Scan complete: packages={} unassigned_user_apps={} stale={} system_assigned={}",
    report.rows.len(),
    report.unassigned_user_apps.len(),
    report.stale.len(),
    report.system_assigned.len()
  );
}

fn parse_scan_config(args: &[String]) -> ScanConfig {
  let mut cfg = ScanConfig::default();
  let mut i = 0;
  while i < args.len() {
    let value = args.get(i + 1).map(PathBuf::from);
    match (args[i].as_str(), value) {
      ("--packages-list", Some(v)) => {
        cfg.packages_list = Some(v);
        i += 2;
        continue;
      }
      ("--app-dir", Some(v)) => {
        cfg.app_dir = Some(v);
        i += 2;
        continue;
      }
      ("--profiles", Some(v)) => {
        cfg.profiles = Some(v);
        i += 2;
        continue;
      }
      ("--json", _) => cfg.json = true,
      _ => {}
    }
    i += 1;
  }
  cfg
}
