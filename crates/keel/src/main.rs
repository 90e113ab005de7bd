mod cli;
mod core_plugin;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use clap::Parser;
use keel_core::event::{EventResult, sync_typed_handler};
use keel_core::kernel::constants::{
    CONFIG_DIR_NAME, CORE_PLUGIN_NAME, DEFAULT_PLUGINS_DIR, EVENT_DRAIN_INTERVAL_MS, SETTINGS_FILE_NAME,
};
use keel_core::plugin_system::LibraryLoader;
use keel_core::storage::{FileSettings, LocalStorageProvider, MemorySettings};
use keel_core::{HostConfig, PluginEvent, PluginManager, SettingsStore, StaticLoader, StorageProvider};
use log::{debug, error, info};

use crate::cli::{
    BLOCK_OPTION, CLIENT_OPTION, CliArgs, HELP_OPTION1, HELP_OPTION2, HELP_OPTION3, PID_OPTION, VERSION_OPTION,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (host_args, options) = cli::split_arguments(&args);
    let host = match CliArgs::try_parse_from(std::iter::once("keel".to_string()).chain(host_args)) {
        Ok(host) => host,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(2);
        }
    };

    init_logging(host.verbose);

    match run(host, options).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("keel: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_config(host: &CliArgs, provider: &dyn StorageProvider) -> keel_core::Result<HostConfig> {
    let mut config = match &host.config {
        Some(path) => HostConfig::load(provider, path)?,
        None => HostConfig::default(),
    };
    if host.settings_path.is_some() {
        config.settings_path = host.settings_path.clone();
    }
    if host.install_settings_path.is_some() {
        config.install_settings_path = host.install_settings_path.clone();
    }
    config.plugin_paths.extend(host.plugin_paths.iter().cloned());
    Ok(config)
}

fn install_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_default()
}

/// User settings: the configured file, an in-memory store for test runs, or
/// the per-user default
fn user_settings(
    config: &HostConfig,
    provider: &Arc<dyn StorageProvider>,
    test_run: bool,
) -> keel_core::Result<Box<dyn SettingsStore>> {
    if let Some(path) = &config.settings_path {
        return Ok(Box::new(FileSettings::open(provider.clone(), path)?));
    }
    if test_run {
        return Ok(Box::new(MemorySettings::new()));
    }
    match dirs::config_dir() {
        Some(dir) => {
            let path = dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE_NAME);
            Ok(Box::new(FileSettings::open(provider.clone(), path)?))
        }
        None => Ok(Box::new(MemorySettings::new())),
    }
}

fn core_problem(manager: &PluginManager) -> Option<String> {
    match manager.plugin_by_name(CORE_PLUGIN_NAME) {
        None => Some("Could not find Core plugin.".to_string()),
        Some(core) if core.has_error() => Some(core.error_string().to_string()),
        Some(_) => None,
    }
}

async fn run(host: CliArgs, options: Vec<String>) -> keel_core::Result<ExitCode> {
    let provider: Arc<dyn StorageProvider> = Arc::new(LocalStorageProvider::default());
    let mut config = load_config(&host, provider.as_ref())?;
    let install_dir = install_dir();
    if config.plugin_paths.is_empty() {
        config.plugin_paths.push(install_dir.join(DEFAULT_PLUGINS_DIR));
    }
    let test_run = options.iter().any(|o| o == "-test");

    let mut manager = PluginManager::new();
    manager.apply_config(&config);
    manager.set_install_dir(&install_dir);

    let static_loader = StaticLoader::new();
    core_plugin::register(&static_loader);
    manager.add_loader(Box::new(static_loader));
    manager.add_loader(Box::new(LibraryLoader::new()));

    manager.set_settings(user_settings(&config, &provider, test_run)?);
    if let Some(path) = &config.install_settings_path {
        manager.set_global_settings(Box::new(FileSettings::open(provider.clone(), path)?));
    }

    let tests_failed = Arc::new(AtomicUsize::new(0));
    let sink = tests_failed.clone();
    manager
        .events()
        .register_type_handler::<PluginEvent>(sync_typed_handler(move |event: &PluginEvent| {
            if let PluginEvent::TestsFinished { failed } = event {
                sink.store(*failed, Ordering::SeqCst);
            }
            EventResult::Continue
        }))
        .await?;

    manager.set_plugin_paths(config.plugin_paths.clone())?;
    if let Some(reason) = core_problem(&manager) {
        eprintln!("Failed to load core: {}", reason);
        return Ok(ExitCode::FAILURE);
    }

    let found = match manager.parse_options(&options, &cli::app_options()) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("keel: {}\n\n{}", e, cli::usage());
            return Ok(ExitCode::FAILURE);
        }
    };

    if found.contains_key(VERSION_OPTION) {
        let core_version = manager
            .plugin_by_name(CORE_PLUGIN_NAME)
            .map(|core| core.version().to_string())
            .unwrap_or_default();
        print!("{}", cli::version_text(&manager, &core_version, core_plugin::COPYRIGHT));
        return Ok(ExitCode::SUCCESS);
    }
    if [HELP_OPTION1, HELP_OPTION2, HELP_OPTION3].iter().any(|o| found.contains_key(*o)) {
        print!("{}", cli::help_text(&manager));
        return Ok(ExitCode::SUCCESS);
    }
    if found.contains_key(CLIENT_OPTION) {
        let cwd = std::env::current_dir().unwrap_or_default();
        if let Some(pid) = found.get(PID_OPTION) {
            debug!("Arguments addressed to instance {}", pid);
        }
        println!("{}", manager.serialized_arguments(&cwd.to_string_lossy()));
        return Ok(ExitCode::SUCCESS);
    }

    let core_enabled = manager
        .plugin_by_name(CORE_PLUGIN_NAME)
        .is_some_and(|core| core.is_effectively_enabled());
    if !core_enabled {
        eprintln!("Failed to load core: Core plugin is disabled.");
        return Ok(ExitCode::FAILURE);
    }

    manager.check_for_problematic_plugins();
    manager.load_plugins();
    manager.events().process_queue().await?;
    if let Some(reason) = core_problem(&manager) {
        eprintln!("Failed to load core: {}", reason);
        manager.shutdown().await?;
        return Ok(ExitCode::FAILURE);
    }
    for error in manager.all_errors() {
        eprintln!("{}", error);
    }

    manager.run_delayed_initialize().await;
    manager.events().process_queue().await?;
    info!("{}", manager.system_information().trim_end());

    if found.contains_key(BLOCK_OPTION) && !manager.test_run_requested() {
        info!("Running until interrupted");
        let period = Duration::from_millis(EVENT_DRAIN_INTERVAL_MS);
        if let Err(e) = manager.events().process_until(period, tokio::signal::ctrl_c()).await? {
            error!("Cannot wait for interrupt: {}", e);
        }
    }

    manager.shutdown().await?;
    manager.events().process_queue().await?;

    if manager.test_run_requested() {
        let failed = tests_failed.load(Ordering::SeqCst);
        println!("Tests finished: {} failed", failed);
        return Ok(ExitCode::from(failed.min(u8::MAX as usize) as u8));
    }
    Ok(ExitCode::SUCCESS)
}
