pub mod assignment;
pub mod codec;
pub mod config;
pub mod console;
pub mod correlation;
pub mod error;
pub mod generators;
pub mod logging;
pub mod model;
pub mod paths;
pub mod resolver;
pub mod store;
pub mod types;
pub mod validate;

use anyhow::Context;
use std::sync::Arc;

pub use error::{CorrelationError, GenerateError};
pub use model::{ConfigSnapshot, CorrelationGroup, Profile, SpoofType};
pub use resolver::{HookCache, Resolution};
pub use store::ProfileStore;

pub fn run_console(args: &[String]) -> anyhow::Result<()> {
  let dry_run = args.iter().any(|a| a == "--dry-run");
  let base = paths::base_dir()?;
  let config_path = paths::config_path(&base);
  let cfg = if dry_run {
    config::load_or_default_readonly(&config_path)?
  } else {
    config::load_or_create_default(&config_path)?
  };

  let target = if dry_run {
    logging::LogTarget::StderrOnly
  } else {
    logging::LogTarget::FileAndStderr
  };
  logging::init(&base, &cfg.logging, target)?;

  let profiles = paths::profiles_path(&base, &cfg.storage.profiles_file);
  let persistence: Arc<dyn store::Persistence> = if dry_run {
    Arc::new(store::JsonFilePersistence::read_only(&profiles))
  } else {
    Arc::new(store::JsonFilePersistence::new(&profiles))
  };

  let runtime = tokio::runtime::Builder::new_multi_thread()
    .enable_all()
    .build()
    .context("build tokio runtime")?;
  runtime.block_on(async {
    let store = ProfileStore::open(persistence, cfg.generator_context()).await?;
    console::run_console_command(&cfg, &store, args, dry_run).await
  })
}
