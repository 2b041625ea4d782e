use crate::config::Config;
use crate::correlation::{self, Pick};
use crate::model::{CorrelationGroup, IdentifierValue, Profile, SpoofType};
use crate::resolver::HookCache;
use crate::store::ProfileStore;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

pub async fn run_console_command(
  cfg: &Config,
  store: &ProfileStore,
  args: &[String],
  dry_run: bool,
) -> anyhow::Result<()> {
  let args = strip_global_flags(args);

  if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
    print_help();
    return Ok(());
  }

  if let Some(i) = args.iter().position(|a| a == "--generate") {
    return run_generate(cfg, &args[i + 1..]);
  }

  if let Some(i) = args.iter().position(|a| a == "--resolve") {
    return run_resolve(cfg, store, &args[i + 1..]);
  }

  let result = if let Some(i) = args.iter().position(|a| a == "--profiles") {
    run_profiles(store, &args[i + 1..]).await
  } else if let Some(i) = args.iter().position(|a| a == "--assign") {
    let profile = required(&args[i + 1..], 0, "--assign <profile> <package>")?;
    let package = required(&args[i + 1..], 1, "--assign <profile> <package>")?;
    store.assign_app(profile, package).await?;
    println!("Assigned {package} to {profile}.");
    Ok(())
  } else if let Some(i) = args.iter().position(|a| a == "--unassign") {
    let package = required(&args[i + 1..], 0, "--unassign <package>")?;
    store.unassign_app(package).await?;
    println!("Unassigned {package}.");
    Ok(())
  } else if let Some(i) = args.iter().position(|a| a == "--set") {
    run_set(store, &args[i + 1..]).await
  } else if let Some(i) = args.iter().position(|a| a == "--regenerate") {
    run_regenerate(store, &args[i + 1..]).await
  } else if let Some(i) = args.iter().position(|a| a == "--regenerate-group") {
    let usage = "--regenerate-group <profile> <SIM_CARD|LOCATION|DEVICE_HARDWARE>";
    let profile = required(&args[i + 1..], 0, usage)?;
    let group: CorrelationGroup = required(&args[i + 1..], 1, usage)?.parse()?;
    let updated = store.regenerate_group(profile, group).await?;
    print_group(&updated, group);
    Ok(())
  } else if let Some(i) = args.iter().position(|a| a == "--toggle-group") {
    let usage = "--toggle-group <profile> <GROUP> on|off";
    let profile = required(&args[i + 1..], 0, usage)?;
    let group: CorrelationGroup = required(&args[i + 1..], 1, usage)?.parse()?;
    let enabled = parse_switch(required(&args[i + 1..], 2, usage)?)
      .ok_or_else(|| anyhow::anyhow!("expected `on` or `off` for `{usage}`"))?;
    store.set_group_enabled(profile, group, enabled).await?;
    println!("{group} {} for {profile}.", if enabled { "enabled" } else { "disabled" });
    Ok(())
  } else if let Some(i) = args.iter().position(|a| a == "--module") {
    let enabled = parse_switch(required(&args[i + 1..], 0, "--module on|off")?)
      .ok_or_else(|| anyhow::anyhow!("expected `on` or `off` for `--module`"))?;
    store.set_module_enabled(enabled).await?;
    println!("Module {}.", if enabled { "enabled" } else { "disabled" });
    Ok(())
  } else {
    eprintln!("Unknown command.");
    print_help();
    Ok(())
  };

  if dry_run {
    println!("DRY-RUN: nothing was written.");
  } else if store.is_dirty() {
    store.flush().await?;
  }
  result
}

async fn run_profiles(store: &ProfileStore, tail: &[String]) -> anyhow::Result<()> {
  let sub = tail.first().map(|s| s.as_str()).unwrap_or("list");
  let target = || required(tail, 1, &format!("--profiles {sub} <profile>"));
  match sub {
    "list" => {
      let snapshot = store.snapshot();
      println!(
        "Module: {} (config version {})",
        if snapshot.module_enabled { "on" } else { "off" },
        snapshot.config_version
      );
      for p in &snapshot.profiles {
        println!(
          "{}  {}{}{}  apps={}",
          p.id,
          p.name,
          if p.is_default { " [default]" } else { "" },
          if p.is_enabled { "" } else { " [disabled]" },
          p.assigned_apps.len()
        );
      }
      Ok(())
    }
    "show" => {
      let profile = store
        .profile(target()?)
        .ok_or_else(|| anyhow::anyhow!("unknown profile: {}", tail[1]))?;
      print_profile(&profile);
      Ok(())
    }
    "create" => {
      let name = target()?;
      let description = tail.get(2).map(|s| s.as_str()).unwrap_or("");
      let profile = store.create_profile(name, description).await?;
      println!("Created profile {} ({}).", profile.name, profile.id);
      Ok(())
    }
    "delete" => {
      store.delete_profile(target()?).await?;
      println!("Deleted {}.", tail[1]);
      Ok(())
    }
    "default" => {
      store.set_default(target()?).await?;
      println!("{} is now the default profile.", tail[1]);
      Ok(())
    }
    "enable" | "disable" => {
      let enabled = sub == "enable";
      store.set_profile_enabled(target()?, enabled).await?;
      println!("{} {}d.", tail[1], sub);
      Ok(())
    }
    "rename" => {
      let from = target()?;
      let to = required(tail, 2, "--profiles rename <profile> <new-name>")?;
      store.rename_profile(from, to).await?;
      println!("Renamed {from} to {to}.");
      Ok(())
    }
    _ => {
      eprintln!(
        "Unknown `--profiles` subcommand. Expected: list|show|create|delete|default|enable|disable|rename"
      );
      print_help();
      Ok(())
    }
  }
}

async fn run_set(store: &ProfileStore, tail: &[String]) -> anyhow::Result<()> {
  let usage = "--set <profile> <TYPE> <value|default>";
  let profile = required(tail, 0, usage)?;
  let ty: SpoofType = required(tail, 1, usage)?.parse()?;
  let raw = required(tail, 2, usage)?;
  let value = if raw == "default" {
    IdentifierValue::UseDefault
  } else {
    IdentifierValue::explicit(raw)
  };
  store.set_value(profile, ty, value).await?;
  println!("{ty} set for {profile}.");
  Ok(())
}

async fn run_regenerate(store: &ProfileStore, tail: &[String]) -> anyhow::Result<()> {
  let usage = "--regenerate <profile> <TYPE|all>";
  let profile = required(tail, 0, usage)?;
  let what = required(tail, 1, usage)?;
  if what.eq_ignore_ascii_case("all") {
    let updated = store.regenerate_all(profile).await?;
    print_profile(&updated);
    return Ok(());
  }
  let ty: SpoofType = what.parse()?;
  let updated = store.regenerate(profile, ty).await?;
  println!("{ty} = {}", updated.value(ty).unwrap_or("<use default>"));
  Ok(())
}

fn run_resolve(cfg: &Config, store: &ProfileStore, tail: &[String]) -> anyhow::Result<()> {
  let package = required(tail, 0, "--resolve <package> [TYPE]")?;
  let cache = Arc::new(HookCache::new(store.hook_source()).with_logging(cfg.cache.log_resolutions));
  let entry = cache.entry(package);
  match (&entry.profile, entry.source) {
    (Some(p), Some(source)) => println!("{package} -> {} ({source})", p.name),
    _ => println!("{package} -> no profile"),
  }

  let types: Vec<SpoofType> = match tail.get(1) {
    Some(t) => vec![t.parse()?],
    None => SpoofType::ALL.to_vec(),
  };
  for ty in types {
    println!("  {:<20} {}", ty.as_str(), cache.resolution(package, ty));
  }
  Ok(())
}

/// Prints fresh values without touching the store.
fn run_generate(cfg: &Config, tail: &[String]) -> anyhow::Result<()> {
  let what = required(tail, 0, "--generate <TYPE|GROUP>")?;
  let ctx = cfg.generator_context();
  let mut rng = StdRng::from_entropy();

  if let Ok(group) = what.parse::<CorrelationGroup>() {
    if group.is_correlated() {
      let record = correlation::pick_source(
        group,
        Pick {
          vendor: ctx.vendor(),
          ..Pick::default()
        },
        &mut rng,
      )?;
      let tuple = correlation::derive_group(record, &mut rng)?;
      println!("{group} from {}", record.label());
      for (ty, v) in &tuple.values {
        println!("  {:<20} {v}", ty.as_str());
      }
      return Ok(());
    }
  }

  let ty: SpoofType = what.parse()?;
  println!("{}", correlation::generate_any(ty, &ctx, &mut rng)?);
  Ok(())
}

fn print_profile(p: &Profile) {
  println!("{} ({})", p.name, p.id);
  if !p.description.is_empty() {
    println!("  {}", p.description);
  }
  println!(
    "  default={} enabled={} apps=[{}]",
    p.is_default,
    p.is_enabled,
    p.assigned_apps.iter().cloned().collect::<Vec<_>>().join(", ")
  );
  for (group, key) in &p.anchors {
    println!("  anchor {group} = {key}");
  }
  for ty in SpoofType::ALL {
    let flag = if p.is_type_enabled(*ty) { " " } else { "-" };
    println!(
      "  {flag} {:<20} {}",
      ty.as_str(),
      p.value(*ty).unwrap_or("<use default>")
    );
  }
}

fn print_group(p: &Profile, group: CorrelationGroup) {
  if let Some(key) = p.anchors.get(&group) {
    println!("{group} anchored to {key}");
  }
  for ty in group.members() {
    println!("  {:<20} {}", ty.as_str(), p.value(ty).unwrap_or("<use default>"));
  }
}

fn required<'a>(tail: &'a [String], idx: usize, usage: &str) -> anyhow::Result<&'a str> {
  tail
    .get(idx)
    .map(|s| s.as_str())
    .filter(|s| !s.starts_with("--"))
    .ok_or_else(|| anyhow::anyhow!("expected: {usage}"))
}

fn parse_switch(s: &str) -> Option<bool> {
  match s.trim().to_ascii_lowercase().as_str() {
    "on" | "true" | "1" | "yes" => Some(true),
    "off" | "false" | "0" | "no" => Some(false),
    _ => None,
  }
}

fn strip_global_flags(args: &[String]) -> Vec<String> {
  args
    .iter()
    .skip(1)
    .filter(|a| a.as_str() != "--dry-run")
    .cloned()
    .collect()
}

fn print_help() {
  println!("veil-core v{}", env!("CARGO_PKG_VERSION"));
  println!("Commands:");
  println!("  --dry-run (global; nothing is written)");
  println!("  --profiles list");
  println!("  --profiles show <profile>");
  println!("  --profiles create <name> [description]");
  println!("  --profiles delete <profile>");
  println!("  --profiles default <profile>");
  println!("  --profiles enable|disable <profile>");
  println!("  --profiles rename <profile> <new-name>");
  println!("  --assign <profile> <package>");
  println!("  --unassign <package>");
  println!("  --set <profile> <TYPE> <value|default>");
  println!("  --regenerate <profile> <TYPE|all>");
  println!("  --regenerate-group <profile> <SIM_CARD|LOCATION|DEVICE_HARDWARE>");
  println!("  --toggle-group <profile> <GROUP> on|off");
  println!("  --module on|off");
  println!("  --resolve <package> [TYPE]");
  println!("  --generate <TYPE|GROUP>");
  println!("Profiles can be named by id or by name.");
}
