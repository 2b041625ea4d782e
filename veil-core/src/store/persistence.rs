use anyhow::Context;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Where the store keeps its encoded snapshot. Calls happen on a blocking
/// worker, never on the async executor.
pub trait Persistence: Send + Sync + 'static {
  /// `None` when nothing has been saved yet.
  fn load(&self) -> anyhow::Result<Option<String>>;
  fn save(&self, blob: &str) -> anyhow::Result<()>;

  /// Keeps an unreadable blob out of the way of the next save. Returns a
  /// description of where it went, `None` if it was left in place.
  fn set_aside(&self) -> anyhow::Result<Option<String>> {
    Ok(None)
  }
}

pub struct JsonFilePersistence {
  path: PathBuf,
  read_only: bool,
}

impl JsonFilePersistence {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      read_only: false,
    }
  }

  /// Loads normally but never writes; used by `--dry-run`.
  pub fn read_only(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      read_only: true,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Persistence for JsonFilePersistence {
  fn load(&self) -> anyhow::Result<Option<String>> {
    match fs::read_to_string(&self.path) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e).with_context(|| format!("read {}", self.path.display())),
    }
  }

  fn save(&self, blob: &str) -> anyhow::Result<()> {
    if self.read_only {
      tracing::info!(path = %self.path.display(), "dry-run: not writing profiles");
      return Ok(());
    }
    write_atomic(&self.path, blob).with_context(|| format!("write {}", self.path.display()))
  }

  /// Renames the file to `<name>.bad-<unix secs>` next to it.
  fn set_aside(&self) -> anyhow::Result<Option<String>> {
    if self.read_only || !self.path.exists() {
      return Ok(None);
    }
    let ts = std::time::SystemTime::now()
      .duration_since(std::time::UNIX_EPOCH)
      .unwrap_or_default()
      .as_secs();
    let name = self.path.file_name().unwrap_or_default().to_string_lossy();
    let backup = self.path.with_file_name(format!("{name}.bad-{ts}"));
    fs::rename(&self.path, &backup)
      .with_context(|| format!("move {} aside", self.path.display()))?;
    Ok(Some(backup.display().to_string()))
  }
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  fs::create_dir_all(parent)?;

  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));
  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

/// Keeps the blob in memory. Writes can be made to fail for tests of the
/// retry path.
#[derive(Default)]
pub struct MemoryPersistence {
  blob: Mutex<Option<String>>,
  set_aside: Mutex<Vec<String>>,
  fail_writes: AtomicBool,
  writes: AtomicUsize,
}

impl MemoryPersistence {
  pub fn with_blob(blob: impl Into<String>) -> Self {
    Self {
      blob: Mutex::new(Some(blob.into())),
      ..Self::default()
    }
  }

  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  pub fn blob(&self) -> Option<String> {
    self.blob.lock().clone()
  }

  pub fn writes(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }

  /// Blobs moved aside so far, oldest first.
  pub fn set_aside_blobs(&self) -> Vec<String> {
    self.set_aside.lock().clone()
  }
}

impl Persistence for MemoryPersistence {
  fn load(&self) -> anyhow::Result<Option<String>> {
    Ok(self.blob.lock().clone())
  }

  fn save(&self, blob: &str) -> anyhow::Result<()> {
    if self.fail_writes.load(Ordering::SeqCst) {
      anyhow::bail!("simulated write failure");
    }
    *self.blob.lock() = Some(blob.to_string());
    self.writes.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  fn set_aside(&self) -> anyhow::Result<Option<String>> {
    let Some(blob) = self.blob.lock().take() else {
      return Ok(None);
    };
    let mut kept = self.set_aside.lock();
    kept.push(blob);
    Ok(Some(format!("memory slot {}", kept.len() - 1)))
  }
}
