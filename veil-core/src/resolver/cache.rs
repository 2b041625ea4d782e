use super::{resolve_in, resolve_profile, ProfileSource, Resolution};
use crate::codec;
use crate::model::{AppConfig, ConfigSnapshot, Profile, SpoofType};
use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Where the hook side gets its configuration from. Implementations must
/// not suspend: the intercepted call is waiting.
pub trait SnapshotSource: Send + Sync {
  fn load(&self) -> Result<Arc<ConfigSnapshot>>;
}

/// Reads the persisted snapshot file. An unchanged file is not parsed
/// again.
pub struct FileSnapshotSource {
  path: PathBuf,
  last: Mutex<Option<(String, Arc<ConfigSnapshot>)>>,
}

impl FileSnapshotSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      last: Mutex::new(None),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl SnapshotSource for FileSnapshotSource {
  fn load(&self) -> Result<Arc<ConfigSnapshot>> {
    let blob = match std::fs::read_to_string(&self.path) {
      Ok(s) => s,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Ok(Arc::new(ConfigSnapshot::default()));
      }
      Err(e) => {
        return Err(e).with_context(|| format!("read snapshot {}", self.path.display()));
      }
    };

    let digest = codec::digest(&blob);
    let mut last = self.last.lock();
    if let Some((seen, snapshot)) = last.as_ref() {
      if *seen == digest {
        return Ok(snapshot.clone());
      }
    }
    let snapshot = Arc::new(
      codec::decode(&blob)
        .with_context(|| format!("decode snapshot {}", self.path.display()))?
        .normalized(),
    );
    *last = Some((digest, snapshot.clone()));
    Ok(snapshot)
  }
}

/// Last snapshot published by an in-process store.
pub struct StoreSnapshotSource {
  rx: watch::Receiver<Arc<ConfigSnapshot>>,
}

impl StoreSnapshotSource {
  pub fn new(rx: watch::Receiver<Arc<ConfigSnapshot>>) -> Self {
    Self { rx }
  }
}

impl SnapshotSource for StoreSnapshotSource {
  fn load(&self) -> Result<Arc<ConfigSnapshot>> {
    Ok(self.rx.borrow().clone())
  }
}

/// What one package resolved to in one cache generation.
#[derive(Debug, Clone)]
pub struct PackageEntry {
  pub module_enabled: bool,
  pub app: Option<AppConfig>,
  pub profile: Option<Profile>,
  pub source: Option<ProfileSource>,
  pub generation: u64,
}

impl PackageEntry {
  fn build(snapshot: &ConfigSnapshot, package: &str, generation: u64) -> Self {
    let resolved = resolve_profile(snapshot, package);
    Self {
      module_enabled: snapshot.module_enabled,
      app: snapshot.app_config(package).cloned(),
      profile: resolved.map(|(p, _)| p.clone()),
      source: resolved.map(|(_, s)| s),
      generation,
    }
  }

  pub fn resolve(&self, ty: SpoofType) -> Resolution {
    resolve_in(self.module_enabled, self.app.as_ref(), self.profile.as_ref(), ty)
  }
}

struct CacheState {
  snapshot: Option<Arc<ConfigSnapshot>>,
  stale: bool,
  generation: u64,
  entries: HashMap<String, Arc<PackageEntry>>,
}

/// Per-process resolution cache for the interception path.
///
/// Each package is resolved once per generation and the answer is shared
/// by every caller until [`HookCache::invalidate`] or
/// [`HookCache::invalidate_all`] drops it. Invalidation only marks state;
/// the reload happens on the next lookup.
pub struct HookCache {
  source: Box<dyn SnapshotSource>,
  state: RwLock<CacheState>,
  log_resolutions: bool,
}

impl HookCache {
  pub fn new(source: impl SnapshotSource + 'static) -> Self {
    Self {
      source: Box::new(source),
      state: RwLock::new(CacheState {
        snapshot: None,
        stale: true,
        generation: 0,
        entries: HashMap::new(),
      }),
      log_resolutions: false,
    }
  }

  pub fn with_logging(mut self, log_resolutions: bool) -> Self {
    self.log_resolutions = log_resolutions;
    self
  }

  pub fn generation(&self) -> u64 {
    self.state.read().generation
  }

  /// Snapshot the entries are resolved from, loading it if needed.
  pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
    {
      let st = self.state.read();
      if let (false, Some(s)) = (st.stale, st.snapshot.as_ref()) {
        return s.clone();
      }
    }
    let mut st = self.state.write();
    self.fresh_snapshot(&mut st)
  }

  fn fresh_snapshot(&self, st: &mut CacheState) -> Arc<ConfigSnapshot> {
    if let (false, Some(s)) = (st.stale, st.snapshot.as_ref()) {
      return s.clone();
    }
    let loaded = match self.source.load() {
      Ok(s) => s,
      Err(err) => {
        tracing::warn!(error = ?err, "config unavailable; serving no profiles");
        Arc::new(ConfigSnapshot::default())
      }
    };
    let changed = st
      .snapshot
      .as_ref()
      .is_some_and(|prev| !Arc::ptr_eq(prev, &loaded));
    if changed {
      st.entries.clear();
    }
    st.snapshot = Some(loaded.clone());
    st.stale = false;
    loaded
  }

  pub fn entry(&self, package: &str) -> Arc<PackageEntry> {
    if let Some(e) = self.state.read().entries.get(package) {
      return e.clone();
    }

    let mut st = self.state.write();
    if let Some(e) = st.entries.get(package) {
      return e.clone();
    }
    let snapshot = self.fresh_snapshot(&mut st);
    let entry = Arc::new(PackageEntry::build(&snapshot, package, st.generation));
    st.entries.insert(package.to_string(), entry.clone());
    tracing::debug!(
      package = %package,
      generation = st.generation,
      profile = entry.profile.as_ref().map(|p| p.name.as_str()).unwrap_or("<none>"),
      "resolved package profile"
    );
    entry
  }

  pub fn resolution(&self, package: &str, ty: SpoofType) -> Resolution {
    self.entry(package).resolve(ty)
  }

  /// Interception contract: `Some` means substitute, `None` means pass the
  /// real value through. `UseDefault` also maps to `None`.
  pub fn resolve(&self, package: &str, ty: SpoofType) -> Option<String> {
    let resolution = self.resolution(package, ty);
    if self.log_resolutions {
      tracing::debug!(package = %package, spoof_type = %ty, resolution = %resolution, "resolve");
    }
    match resolution {
      Resolution::Value(v) => Some(v),
      Resolution::UseDefault | Resolution::NotSpoofed(_) => None,
    }
  }

  /// Drops one package's entry. Other entries survive only if the reload
  /// finds the same snapshot; a changed snapshot drops them too, so every
  /// served entry comes from one snapshot.
  pub fn invalidate(&self, package: &str) {
    let mut st = self.state.write();
    st.entries.remove(package);
    st.stale = true;
    st.generation += 1;
  }

  pub fn invalidate_all(&self) {
    let mut st = self.state.write();
    st.entries.clear();
    st.stale = true;
    st.generation += 1;
  }
}
