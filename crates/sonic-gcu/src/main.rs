//! gcu - Generic Configuration Update command line

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sonic_gcu::checkpoint::CheckpointStore;
use sonic_gcu::config::{GcuConfig, StoreBackend, DEFAULT_CONFIG_PATH};
use sonic_gcu::path::{Path, Token};
use sonic_gcu::store::{ConfigStore, JsonFileConfigStore, JsonStateStore, StateStore};
use sonic_gcu::{parse_patch, GenericUpdater, PatchOperation, PlatformInfo, RuleMetadata, Scope};
use sonic_gcu::{ConfigValue, UpdateReport};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// SONiC Generic Configuration Update
#[derive(Parser, Debug)]
#[command(name = "gcu")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short = 'l', long, global = true)]
    log_level: Option<String>,

    /// Plan and validate without writing
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Restrict the update to one scope (localhost, asic0, ...) on multi-ASIC switches
    #[arg(short = 's', long, global = true)]
    scope: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a JSON Patch file
    ApplyPatch { patch: PathBuf },
    /// Replace the running configuration with a full configuration file
    Replace { config_file: PathBuf },
    /// Restore a checkpoint
    Rollback { name: String },
    /// Save the running configuration as a checkpoint
    CreateCheckpoint { name: String },
    /// Delete a checkpoint
    DeleteCheckpoint { name: String },
    /// List checkpoints
    ListCheckpoints,
    /// Show the moves needed to reach a configuration file, unordered
    Diff { config_file: PathBuf },
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_stores(
    config: &GcuConfig,
) -> Result<(BTreeMap<Scope, Box<dyn ConfigStore>>, Box<dyn StateStore>)> {
    let mut stores: BTreeMap<Scope, Box<dyn ConfigStore>> = BTreeMap::new();
    match config.store.backend {
        StoreBackend::Json => {
            let mut state = JsonStateStore::new();
            for scope in config.scopes() {
                let path = config.config_db_path(scope);
                let store = JsonFileConfigStore::open(&path)
                    .with_context(|| format!("opening CONFIG_DB file for {}", scope))?;
                stores.insert(scope, Box::new(store));
                if let Some(state_path) = config.state_db_path(scope) {
                    state = state.with_file(scope, state_path);
                }
            }
            Ok((stores, Box::new(state)))
        }
        #[cfg(feature = "redis")]
        StoreBackend::Redis => {
            use sonic_gcu::store::{RedisConfig, RedisConfigStore, RedisStateStore};
            let mut state = RedisStateStore::new();
            for scope in config.scopes() {
                let (host, port) = config.redis_endpoint(scope);
                let store = RedisConfigStore::connect(&RedisConfig::config_db(host.clone(), port))
                    .with_context(|| format!("connecting to CONFIG_DB for {}", scope))?;
                stores.insert(scope, Box::new(store));
                state = state
                    .connect(scope, &RedisConfig::state_db(host, port))
                    .with_context(|| format!("connecting to STATE_DB for {}", scope))?;
            }
            Ok((stores, Box::new(state)))
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => bail!("gcu was built without the redis feature"),
    }
}

fn build_updater(config: &GcuConfig, dry_run: bool) -> Result<GenericUpdater> {
    let (mut stores, state) = open_stores(config)?;
    let host = stores
        .remove(&Scope::Host)
        .context("no CONFIG_DB for the host scope")?;

    let platform = PlatformInfo::detect(
        &config.validator.version_file,
        host.as_ref(),
        config.validator.chassis,
    )?;
    let rules = match &config.validator.rules_path {
        Some(path) => RuleMetadata::load(path)?,
        None => RuleMetadata::builtin().clone(),
    };

    let mut updater = GenericUpdater::new(host, platform)
        .with_state(state)
        .with_rules(rules)
        .with_node_budget(config.sorter.node_budget)
        .with_multi_asic(config.multi_asic.enabled)
        .with_dry_run(dry_run);
    for (scope, store) in stores {
        updater = updater.with_scope_store(scope, store);
    }
    Ok(updater)
}

/// Prefixes every path of an unscoped patch with `scope`.
fn scoped_patch(ops: Vec<PatchOperation>, scope: Scope) -> Vec<PatchOperation> {
    let prefix = |path: &Path| {
        let mut tokens = vec![Token::Key(scope.to_string())];
        tokens.extend(path.tokens().iter().cloned());
        Path::new(tokens)
    };
    ops.into_iter()
        .map(|op| PatchOperation {
            path: prefix(&op.path),
            from: op.from.as_ref().map(prefix),
            ..op
        })
        .collect()
}

/// Wraps an unscoped configuration as `{scope: config}`.
fn scoped_config(config: ConfigValue, scope: Scope) -> ConfigValue {
    let mut scopes = BTreeMap::new();
    scopes.insert(scope.to_string(), config);
    ConfigValue::Object(scopes)
}

fn read_config_file(path: &std::path::Path) -> Result<ConfigValue> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_report(report: &UpdateReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn run(args: Args, config: GcuConfig) -> Result<()> {
    let scope = args
        .scope
        .as_deref()
        .map(str::parse::<Scope>)
        .transpose()?;
    if scope.is_some() && !config.multi_asic.enabled {
        bail!("--scope is only valid on multi-ASIC switches");
    }
    let checkpoints = CheckpointStore::new(&config.checkpoint.dir);

    match args.command {
        Command::ApplyPatch { patch } => {
            let text = fs::read_to_string(&patch)
                .with_context(|| format!("reading {}", patch.display()))?;
            let mut ops = parse_patch(&text)?;
            if let Some(scope) = scope {
                ops = scoped_patch(ops, scope);
            }
            let mut updater = build_updater(&config, args.dry_run)?;
            print_report(&updater.apply_patch(ops)?)?;
        }
        Command::Replace { config_file } => {
            let mut target = read_config_file(&config_file)?;
            if let Some(scope) = scope {
                target = scoped_config(target, scope);
            }
            let mut updater = build_updater(&config, args.dry_run)?;
            print_report(&updater.replace(target)?)?;
        }
        Command::Rollback { name } => {
            let mut updater = build_updater(&config, args.dry_run)?;
            print_report(&updater.rollback(&checkpoints, &name)?)?;
        }
        Command::CreateCheckpoint { name } => {
            let updater = build_updater(&config, args.dry_run)?;
            updater.create_checkpoint(&checkpoints, &name)?;
            println!("Checkpoint {} created", name);
        }
        Command::DeleteCheckpoint { name } => {
            checkpoints.delete(&name)?;
            println!("Checkpoint {} deleted", name);
        }
        Command::ListCheckpoints => {
            for name in checkpoints.list()? {
                println!("{}", name);
            }
        }
        Command::Diff { config_file } => {
            let mut target = read_config_file(&config_file)?;
            if let Some(scope) = scope {
                target = scoped_config(target, scope);
            }
            let updater = build_updater(&config, true)?;
            for plan in updater.diff(target)? {
                for m in &plan.moves {
                    println!("{} {}", plan.scope, serde_json::to_string(&m.to_operation())?);
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match GcuConfig::load_or_default(&args.config).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("gcu: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_logging(&level, config.logging.json);
    info!(config = %args.config.display(), dry_run = args.dry_run, "Starting gcu");

    match run(args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("gcu: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
