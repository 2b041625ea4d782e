//! The owner of the live configuration.
//!
//! All mutations go through [`ProfileStore::commit`]: the new snapshot is
//! built and swapped in under one lock, published to subscribers, pushed to
//! registered hook caches as an invalidation and then written out on a
//! blocking worker. The in-memory snapshot is always the authoritative one;
//! a failed write only leaves the store dirty until the next write or
//! [`ProfileStore::flush`] succeeds.

mod persistence;

pub use persistence::{JsonFilePersistence, MemoryPersistence, Persistence};
pub(crate) use persistence::write_atomic;

use crate::codec;
use crate::generators::GeneratorContext;
use crate::model::{AppConfig, ConfigSnapshot, CorrelationGroup, IdentifierValue, Profile, SpoofType};
use crate::resolver::{HookCache, StoreSnapshotSource};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

struct StoreState {
  snapshot: Arc<ConfigSnapshot>,
  persisted_version: u64,
  rng: StdRng,
}

pub struct ProfileStore {
  state: Mutex<StoreState>,
  tx: watch::Sender<Arc<ConfigSnapshot>>,
  persistence: Arc<dyn Persistence>,
  ctx: GeneratorContext,
  caches: Mutex<Vec<Weak<HookCache>>>,
  persist_lock: tokio::sync::Mutex<()>,
}

fn find_profile_mut<'a>(snapshot: &'a mut ConfigSnapshot, id_or_name: &str) -> Result<&'a mut Profile> {
  let idx = snapshot
    .profiles
    .iter()
    .position(|p| p.id == id_or_name)
    .or_else(|| snapshot.profiles.iter().position(|p| p.name == id_or_name))
    .ok_or_else(|| anyhow::anyhow!("unknown profile: {id_or_name}"))?;
  Ok(&mut snapshot.profiles[idx])
}

fn update_profile<F>(snapshot: &mut ConfigSnapshot, id_or_name: &str, f: F) -> Result<()>
where
  F: FnOnce(&Profile) -> Result<Profile>,
{
  let slot = find_profile_mut(snapshot, id_or_name)?;
  *slot = f(slot)?;
  Ok(())
}

impl ProfileStore {
  /// Loads whatever the persistence layer holds. An unreadable blob is
  /// logged and replaced; an empty configuration gets a default profile.
  pub async fn open(persistence: Arc<dyn Persistence>, ctx: GeneratorContext) -> Result<Self> {
    Self::open_with_rng(persistence, ctx, StdRng::from_entropy()).await
  }

  /// Deterministic variant for tests and reproducible console runs.
  pub async fn open_seeded(
    persistence: Arc<dyn Persistence>,
    ctx: GeneratorContext,
    seed: u64,
  ) -> Result<Self> {
    Self::open_with_rng(persistence, ctx, StdRng::seed_from_u64(seed)).await
  }

  async fn open_with_rng(
    persistence: Arc<dyn Persistence>,
    ctx: GeneratorContext,
    mut rng: StdRng,
  ) -> Result<Self> {
    let loader = persistence.clone();
    let blob = tokio::task::spawn_blocking(move || loader.load())
      .await
      .context("persistence worker failed")??;

    let mut snapshot = match blob.as_deref().map(codec::decode) {
      Some(Ok(snapshot)) => snapshot.normalized(),
      Some(Err(err)) => {
        let mover = persistence.clone();
        let moved = tokio::task::spawn_blocking(move || mover.set_aside())
          .await
          .context("persistence worker failed")?;
        match moved {
          Ok(Some(backup)) => {
            tracing::warn!(error = ?err, backup = %backup, "profiles unreadable; moved aside")
          }
          Ok(None) => tracing::warn!(error = ?err, "profiles unreadable; starting fresh"),
          Err(move_err) => {
            tracing::warn!(error = ?err, move_error = ?move_err, "profiles unreadable and not moved")
          }
        }
        ConfigSnapshot::default()
      }
      None => ConfigSnapshot::default(),
    };
    let persisted_version = snapshot.config_version;
    if snapshot.profiles.is_empty() {
      let profile = Profile::create_default_profile(&ctx, &mut rng)?;
      tracing::info!(profile_id = %profile.id, "no profiles found; created default profile");
      snapshot.profiles.push(profile);
      snapshot.config_version += 1;
    }

    let snapshot = Arc::new(snapshot);
    let (tx, _rx) = watch::channel(snapshot.clone());
    let store = Self {
      state: Mutex::new(StoreState {
        snapshot,
        persisted_version,
        rng,
      }),
      tx,
      persistence,
      ctx,
      caches: Mutex::new(Vec::new()),
      persist_lock: tokio::sync::Mutex::new(()),
    };
    if store.is_dirty() {
      store.persist_logged().await;
    }
    Ok(store)
  }

  pub fn generator_context(&self) -> &GeneratorContext {
    &self.ctx
  }

  /// Last-known-good snapshot. Never waits on I/O.
  pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
    self.state.lock().snapshot.clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<Arc<ConfigSnapshot>> {
    self.tx.subscribe()
  }

  /// Source for a [`HookCache`] living in the same process.
  pub fn hook_source(&self) -> StoreSnapshotSource {
    StoreSnapshotSource::new(self.subscribe())
  }

  /// Caches registered here are invalidated after every commit.
  pub fn register_cache(&self, cache: &Arc<HookCache>) {
    let mut caches = self.caches.lock();
    caches.retain(|c| c.strong_count() > 0);
    caches.push(Arc::downgrade(cache));
  }

  pub fn is_dirty(&self) -> bool {
    let st = self.state.lock();
    st.snapshot.config_version > st.persisted_version
  }

  pub fn profiles(&self) -> Vec<Profile> {
    self.snapshot().profiles.clone()
  }

  pub fn profile(&self, id_or_name: &str) -> Option<Profile> {
    self.snapshot().find_profile(id_or_name).cloned()
  }

  /// Applies `f` to a copy of the current snapshot and makes the result
  /// current. Nothing is changed when `f` fails.
  pub async fn commit<T, F>(&self, op: &'static str, f: F) -> Result<T>
  where
    F: FnOnce(&mut ConfigSnapshot, &GeneratorContext, &mut StdRng) -> Result<T>,
  {
    let (published, out) = {
      let mut st = self.state.lock();
      let mut next = (*st.snapshot).clone();
      let out = f(&mut next, &self.ctx, &mut st.rng)?;
      let mut next = next.normalized();
      next.config_version = st.snapshot.config_version + 1;
      let next = Arc::new(next);
      st.snapshot = next.clone();
      (next, out)
    };

    tracing::info!(op, config_version = published.config_version, "config updated");
    self.tx.send_replace(published);
    self.invalidate_caches();
    self.persist_logged().await;
    Ok(out)
  }

  fn invalidate_caches(&self) {
    let mut caches = self.caches.lock();
    caches.retain(|weak| match weak.upgrade() {
      Some(cache) => {
        cache.invalidate_all();
        true
      }
      None => false,
    });
  }

  async fn persist_logged(&self) {
    if let Err(err) = self.persist().await {
      tracing::warn!(error = ?err, "failed to persist profiles; will retry on next write");
    }
  }

  /// Writes the newest snapshot if it has not been written yet. Writers
  /// queue on one async lock so an older snapshot never lands after a
  /// newer one.
  async fn persist(&self) -> Result<()> {
    let _writer = self.persist_lock.lock().await;
    let (snapshot, persisted) = {
      let st = self.state.lock();
      (st.snapshot.clone(), st.persisted_version)
    };
    if snapshot.config_version <= persisted {
      return Ok(());
    }

    let blob = codec::encode(&snapshot)?;
    let persistence = self.persistence.clone();
    tokio::task::spawn_blocking(move || persistence.save(&blob))
      .await
      .context("persistence worker failed")??;

    let mut st = self.state.lock();
    st.persisted_version = st.persisted_version.max(snapshot.config_version);
    Ok(())
  }

  /// Retries a pending write. Errors are returned, not just logged.
  pub async fn flush(&self) -> Result<()> {
    self.persist().await
  }

  pub async fn create_profile(&self, name: &str, description: &str) -> Result<Profile> {
    let (name, description) = (name.to_string(), description.to_string());
    self
      .commit("create_profile", move |s, ctx, rng| {
        let profile = Profile::create_new(name, description, ctx, rng)?;
        s.profiles.push(profile.clone());
        Ok(profile)
      })
      .await
  }

  /// Removing the last profile leaves a fresh default in its place.
  pub async fn delete_profile(&self, id_or_name: &str) -> Result<()> {
    self
      .commit("delete_profile", |s, ctx, rng| {
        let id = find_profile_mut(s, id_or_name)?.id.clone();
        s.profiles.retain(|p| p.id != id);
        if s.profiles.is_empty() {
          s.profiles.push(Profile::create_default_profile(ctx, rng)?);
        }
        Ok(())
      })
      .await
  }

  pub async fn rename_profile(&self, id_or_name: &str, name: &str) -> Result<()> {
    self
      .commit("rename_profile", |s, _, _| {
        update_profile(s, id_or_name, |p| Ok(p.with_name(name)))
      })
      .await
  }

  pub async fn set_description(&self, id_or_name: &str, description: &str) -> Result<()> {
    self
      .commit("set_description", |s, _, _| {
        update_profile(s, id_or_name, |p| Ok(p.with_description(description)))
      })
      .await
  }

  pub async fn set_default(&self, id_or_name: &str) -> Result<()> {
    self
      .commit("set_default", |s, _, _| {
        let id = find_profile_mut(s, id_or_name)?.id.clone();
        for p in s.profiles.iter_mut() {
          let want = p.id == id;
          if p.is_default != want {
            *p = p.with_default(want);
          }
        }
        Ok(())
      })
      .await
  }

  pub async fn set_profile_enabled(&self, id_or_name: &str, enabled: bool) -> Result<()> {
    self
      .commit("set_profile_enabled", |s, _, _| {
        update_profile(s, id_or_name, |p| Ok(p.with_enabled(enabled)))
      })
      .await
  }

  pub async fn set_value(&self, id_or_name: &str, ty: SpoofType, value: IdentifierValue) -> Result<()> {
    self
      .commit("set_value", |s, _, _| {
        update_profile(s, id_or_name, |p| Ok(p.with_value(ty, value)))
      })
      .await
  }

  pub async fn regenerate(&self, id_or_name: &str, ty: SpoofType) -> Result<Profile> {
    self
      .commit("regenerate", |s, ctx, rng| {
        update_profile(s, id_or_name, |p| Ok(p.regenerate_type(ty, ctx, rng)?))?;
        Ok(find_profile_mut(s, id_or_name)?.clone())
      })
      .await
  }

  pub async fn regenerate_group(&self, id_or_name: &str, group: CorrelationGroup) -> Result<Profile> {
    self
      .commit("regenerate_group", |s, ctx, rng| {
        update_profile(s, id_or_name, |p| Ok(p.regenerate_group(group, ctx, rng)?))?;
        Ok(find_profile_mut(s, id_or_name)?.clone())
      })
      .await
  }

  pub async fn regenerate_all(&self, id_or_name: &str) -> Result<Profile> {
    self
      .commit("regenerate_all", |s, ctx, rng| {
        update_profile(s, id_or_name, |p| Ok(p.regenerate_all(ctx, rng)?))?;
        Ok(find_profile_mut(s, id_or_name)?.clone())
      })
      .await
  }

  /// Correlated types switch together with their group.
  pub async fn set_type_enabled(&self, id_or_name: &str, ty: SpoofType, enabled: bool) -> Result<()> {
    self
      .commit("set_type_enabled", |s, _, _| {
        update_profile(s, id_or_name, |p| Ok(p.toggle_type(ty, enabled)))
      })
      .await
  }

  pub async fn set_group_enabled(
    &self,
    id_or_name: &str,
    group: CorrelationGroup,
    enabled: bool,
  ) -> Result<()> {
    self
      .commit("set_group_enabled", |s, _, _| {
        update_profile(s, id_or_name, |p| Ok(p.with_group_enabled(group, enabled)))
      })
      .await
  }

  /// Moves `package` to the profile; any previous owner loses it.
  pub async fn assign_app(&self, id_or_name: &str, package: &str) -> Result<()> {
    self
      .commit("assign_app", |s, _, _| {
        let id = find_profile_mut(s, id_or_name)?.id.clone();
        for p in s.profiles.iter_mut() {
          if p.id == id {
            if !p.has_app(package) {
              *p = p.add_app(package);
            }
          } else if p.has_app(package) {
            *p = p.remove_app(package);
          }
        }
        Ok(())
      })
      .await
  }

  pub async fn unassign_app(&self, package: &str) -> Result<()> {
    self
      .commit("unassign_app", |s, _, _| {
        for p in s.profiles.iter_mut() {
          if p.has_app(package) {
            *p = p.remove_app(package);
          }
        }
        Ok(())
      })
      .await
  }

  pub async fn set_app_config(&self, config: AppConfig) -> Result<()> {
    self
      .commit("set_app_config", move |s, _, _| {
        s.app_configs.insert(config.package_name.clone(), config);
        Ok(())
      })
      .await
  }

  pub async fn remove_app_config(&self, package: &str) -> Result<()> {
    self
      .commit("remove_app_config", |s, _, _| {
        s.app_configs.remove(package);
        Ok(())
      })
      .await
  }

  pub async fn set_module_enabled(&self, enabled: bool) -> Result<()> {
    self
      .commit("set_module_enabled", |s, _, _| {
        s.module_enabled = enabled;
        Ok(())
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resolver::SkipReason;
  use crate::resolver::Resolution;

  async fn memory_store(seed: u64) -> (ProfileStore, Arc<MemoryPersistence>) {
    let mem = Arc::new(MemoryPersistence::default());
    let store = ProfileStore::open_seeded(mem.clone(), GeneratorContext::default(), seed)
      .await
      .unwrap();
    (store, mem)
  }

  #[tokio::test]
  async fn empty_backend_gets_a_persisted_default() {
    let (store, mem) = memory_store(1).await;
    let profiles = store.profiles();
    assert_eq!(profiles.len(), 1);
    assert!(profiles[0].is_default);
    assert!(!store.is_dirty());
    let saved = codec::decode(&mem.blob().unwrap()).unwrap();
    assert_eq!(saved.profiles[0].id, profiles[0].id);
  }

  #[tokio::test]
  async fn corrupt_backend_recovers_with_default() {
    let mem = Arc::new(MemoryPersistence::with_blob("{ broken"));
    let store = ProfileStore::open_seeded(mem.clone(), GeneratorContext::default(), 2)
      .await
      .unwrap();
    assert_eq!(store.profiles().len(), 1);
    assert!(codec::decode(&mem.blob().unwrap()).is_ok());
    assert_eq!(mem.set_aside_blobs(), vec!["{ broken".to_string()]);
  }

  #[tokio::test]
  async fn opens_with_every_manufacturer_hint() {
    for vendor in ["Sony", "Samsung", "Google", "Nokia"] {
      let ctx = GeneratorContext {
        manufacturer: Some(vendor.to_string()),
        ..GeneratorContext::default()
      };
      for seed in 0..60 {
        let mem = Arc::new(MemoryPersistence::default());
        if let Err(err) = ProfileStore::open_seeded(mem, ctx.clone(), seed).await {
          panic!("{vendor} seed {seed}: {err:#}");
        }
      }
    }
  }

  #[tokio::test]
  async fn corrupt_profiles_file_is_kept_beside_the_new_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.json");
    std::fs::write(&path, "{ broken").unwrap();
    let file = Arc::new(JsonFilePersistence::new(&path));
    let store = ProfileStore::open_seeded(file, GeneratorContext::default(), 4)
      .await
      .unwrap();

    assert_eq!(store.profiles().len(), 1);
    let saved = codec::decode(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved.profiles[0].id, store.profiles()[0].id);
    let kept: Vec<String> = std::fs::read_dir(dir.path())
      .unwrap()
      .filter_map(|e| e.ok())
      .filter(|e| e.file_name().to_string_lossy().starts_with("profiles.json.bad-"))
      .map(|e| std::fs::read_to_string(e.path()).unwrap())
      .collect();
    assert_eq!(kept, vec!["{ broken".to_string()]);
  }

  #[tokio::test]
  async fn bank_app_resolves_to_its_assigned_profile() {
    let (store, _) = memory_store(3).await;
    let p1 = store.create_profile("P1", "").await.unwrap();
    store
      .set_value(&p1.id, SpoofType::Imei, IdentifierValue::explicit("354230052312345"))
      .await
      .unwrap();
    store.assign_app(&p1.id, "com.bank.app").await.unwrap();

    let cache = Arc::new(HookCache::new(store.hook_source()));
    store.register_cache(&cache);
    assert_eq!(
      cache.resolve("com.bank.app", SpoofType::Imei).as_deref(),
      Some("354230052312345")
    );
    let default_imei = store.snapshot().default_profile().unwrap().value(SpoofType::Imei).map(str::to_string);
    assert_eq!(cache.resolve("com.other", SpoofType::Imei), default_imei);
  }

  #[tokio::test]
  async fn commits_invalidate_registered_caches() {
    let (store, _) = memory_store(4).await;
    let cache = Arc::new(HookCache::new(store.hook_source()));
    store.register_cache(&cache);
    let before = cache.resolve("com.a", SpoofType::AndroidId);
    assert!(before.is_some());

    let default_id = store.snapshot().default_profile().unwrap().id.clone();
    store.set_profile_enabled(&default_id, false).await.unwrap();
    assert_eq!(
      cache.resolution("com.a", SpoofType::AndroidId),
      Resolution::NotSpoofed(SkipReason::ProfileDisabled)
    );
  }

  #[tokio::test]
  async fn exactly_one_default_after_any_sequence() {
    let (store, _) = memory_store(5).await;
    let a = store.create_profile("A", "").await.unwrap();
    let b = store.create_profile("B", "").await.unwrap();
    store.set_default(&b.id).await.unwrap();
    store.delete_profile(&b.id).await.unwrap();
    store.set_default(&a.id).await.unwrap();
    store.delete_profile("Default").await.unwrap();
    store.delete_profile(&a.id).await.unwrap();

    let s = store.snapshot();
    assert_eq!(s.profiles.iter().filter(|p| p.is_default).count(), 1);
    assert_eq!(s.profiles.len(), 1);
  }

  #[tokio::test]
  async fn assigning_moves_the_package() {
    let (store, _) = memory_store(6).await;
    let a = store.create_profile("A", "").await.unwrap();
    let b = store.create_profile("B", "").await.unwrap();
    store.assign_app(&a.id, "com.x").await.unwrap();
    store.assign_app(&b.id, "com.x").await.unwrap();

    let s = store.snapshot();
    let owners: Vec<&str> = s
      .profiles
      .iter()
      .filter(|p| p.has_app("com.x"))
      .map(|p| p.name.as_str())
      .collect();
    assert_eq!(owners, vec!["B"]);

    store.unassign_app("com.x").await.unwrap();
    assert!(store.snapshot().assigned_profile("com.x").is_none());
  }

  #[tokio::test]
  async fn failed_write_keeps_model_and_retries() {
    let (store, mem) = memory_store(7).await;
    mem.set_fail_writes(true);
    store.set_module_enabled(false).await.unwrap();
    assert!(!store.snapshot().module_enabled);
    assert!(store.is_dirty());
    assert!(store.flush().await.is_err());

    mem.set_fail_writes(false);
    store.flush().await.unwrap();
    assert!(!store.is_dirty());
    assert!(!codec::decode(&mem.blob().unwrap()).unwrap().module_enabled);
  }

  #[tokio::test]
  async fn failed_mutation_changes_nothing() {
    let (store, _) = memory_store(8).await;
    let before = store.snapshot();
    assert!(store.rename_profile("missing", "x").await.is_err());
    assert_eq!(store.snapshot().config_version, before.config_version);
  }

  #[tokio::test]
  async fn subscribers_see_each_commit() {
    let (store, _) = memory_store(9).await;
    let mut rx = store.subscribe();
    let created = store.create_profile("Watched", "").await.unwrap();
    rx.changed().await.unwrap();
    assert!(rx.borrow().profile(&created.id).is_some());
  }

  #[tokio::test]
  async fn group_ops_are_atomic_on_the_store() {
    let (store, _) = memory_store(10).await;
    let id = store.snapshot().profiles[0].id.clone();
    let before = store.profile(&id).unwrap();
    let after = store.regenerate_group(&id, CorrelationGroup::DeviceHardware).await.unwrap();
    for ty in CorrelationGroup::DeviceHardware.members() {
      assert_ne!(before.value(ty), after.value(ty), "{ty}");
    }
    store.set_type_enabled(&id, SpoofType::Imsi, false).await.unwrap();
    let toggled = store.profile(&id).unwrap();
    assert!(!toggled.is_group_enabled(CorrelationGroup::SimCard));
  }

  #[tokio::test]
  async fn file_backed_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.json");
    let id = {
      let store = ProfileStore::open_seeded(
        Arc::new(JsonFilePersistence::new(&path)),
        GeneratorContext::default(),
        11,
      )
      .await
      .unwrap();
      let p = store.create_profile("Kept", "").await.unwrap();
      store.assign_app(&p.id, "com.kept").await.unwrap();
      p.id
    };
    let reopened = ProfileStore::open(Arc::new(JsonFilePersistence::new(&path)), GeneratorContext::default())
      .await
      .unwrap();
    assert_eq!(reopened.snapshot().assigned_profile("com.kept").unwrap().id, id);
  }
}
