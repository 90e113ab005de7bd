/// Application name, used for the lock file name and version banner
pub const APP_NAME: &str = "Keel";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interface identifier a plugin's metadata must carry to be considered
pub const DEFAULT_PLUGIN_IID: &str = "org.keel.Plugin";

/// Name of the plugin the host cannot run without
pub const CORE_PLUGIN_NAME: &str = "Core";

/// Configuration directory name (below the platform config dir)
pub const CONFIG_DIR_NAME: &str = "keel";

/// Default user settings file name
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Default plugins directory, relative to the install directory
pub const DEFAULT_PLUGINS_DIR: &str = "plugins";

/// Settings key listing plugins the user disabled
pub const SETTINGS_IGNORED_PLUGINS: &str = "Plugins/Ignored";

/// Settings key listing disabled-by-default plugins the user enabled
pub const SETTINGS_FORCE_ENABLED_PLUGINS: &str = "Plugins/ForceEnabled";

/// Milliseconds between two delayed-initialization ticks
pub const DELAYED_INITIALIZE_INTERVAL_MS: u64 = 20;

/// Milliseconds between two event queue drains while the host idles
pub const EVENT_DRAIN_INTERVAL_MS: u64 = 100;

/// Column at which options start in help output
pub const OPTION_INDENT: usize = 4;

/// Column at which option descriptions start in help output
pub const DESCRIPTION_INDENT: usize = 34;
