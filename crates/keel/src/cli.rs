//! Host command line.
//!
//! Host flags are GNU-style (`--settings-path`, `-v`) and parsed with clap.
//! Everything else is left for the plugin manager's single-dash options
//! parser, which also knows the application options below.
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{ArgAction, Parser};
use keel_core::PluginManager;
use keel_core::kernel::constants::{DESCRIPTION_INDENT, OPTION_INDENT};
use keel_core::plugin_system::format_option;

pub const HELP_OPTION1: &str = "-h";
pub const HELP_OPTION2: &str = "-help";
pub const HELP_OPTION3: &str = "--help";
pub const VERSION_OPTION: &str = "-version";
pub const CLIENT_OPTION: &str = "-client";
pub const PID_OPTION: &str = "-pid";
pub const BLOCK_OPTION: &str = "-block";

/// Keel: a headless plugin host
#[derive(Parser, Debug, Default, PartialEq)]
#[command(name = "keel", disable_help_flag = true, disable_version_flag = true)]
pub struct CliArgs {
    /// User settings file (enabled and disabled plugins)
    #[arg(long, value_name = "FILE")]
    pub settings_path: Option<PathBuf>,

    /// Installation-wide settings file with the default plugin selection
    #[arg(long, value_name = "FILE")]
    pub install_settings_path: Option<PathBuf>,

    /// Directory to scan for plugin libraries; may be repeated
    #[arg(long = "plugin-path", value_name = "DIR")]
    pub plugin_paths: Vec<PathBuf>,

    /// Host configuration file (JSON, YAML or TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Raise the log level; repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

const FLAGS_WITH_VALUE: [&str; 4] = ["--settings-path", "--install-settings-path", "--plugin-path", "--config"];

fn is_verbose_flag(arg: &str) -> bool {
    arg == "--verbose" || (arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v'))
}

/// Separate host flags from the tokens for the plugin manager.
///
/// Returns the host flags (without the program name) and the remaining
/// tokens in their original order. Everything after `--` belongs to the
/// plugin manager.
pub fn split_arguments(args: &[String]) -> (Vec<String>, Vec<String>) {
    let mut host = Vec::new();
    let mut options = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            options.push(arg.clone());
            options.extend(iter.by_ref().cloned());
            break;
        }
        let flag = arg.split('=').next().unwrap_or_default();
        if FLAGS_WITH_VALUE.contains(&flag) {
            host.push(arg.clone());
            if !arg.contains('=') {
                if let Some(value) = iter.next() {
                    host.push(value.clone());
                }
            }
        } else if is_verbose_flag(arg) {
            host.push(arg.clone());
        } else {
            options.push(arg.clone());
        }
    }
    (host, options)
}

/// Application options, mapped to whether they take an argument
pub fn app_options() -> BTreeMap<String, bool> {
    [
        (HELP_OPTION1, false),
        (HELP_OPTION2, false),
        (HELP_OPTION3, false),
        (VERSION_OPTION, false),
        (CLIENT_OPTION, false),
        (PID_OPTION, true),
        (BLOCK_OPTION, false),
    ]
    .into_iter()
    .map(|(option, takes_argument)| (option.to_string(), takes_argument))
    .collect()
}

pub fn usage() -> String {
    "Usage: keel [HOST FLAGS] [OPTION]... [FILE]...\n".to_string()
}

/// Full help text: host flags, application, manager and plugin options
pub fn help_text(manager: &PluginManager) -> String {
    let mut out = usage();
    let option = |out: &mut String, o: &str, p: &str, d: &str| {
        format_option(out, o, p, d, OPTION_INDENT, DESCRIPTION_INDENT)
    };

    out.push_str("Host flags:\n");
    option(&mut out, "--settings-path", "file", "Use <file> for the user settings");
    option(&mut out, "--install-settings-path", "file", "Use <file> for the installation settings");
    option(&mut out, "--plugin-path", "dir", "Look for plugins in <dir> (may be repeated)");
    option(&mut out, "--config", "file", "Read the host configuration from <file>");
    option(&mut out, "-v, --verbose", "", "Log more (repeat for debug output)");

    out.push_str("Options:\n");
    option(&mut out, HELP_OPTION1, "", "Display this help");
    option(&mut out, VERSION_OPTION, "", "Display program version");
    option(&mut out, CLIENT_OPTION, "", "Print the arguments a running instance would receive and exit");
    option(&mut out, PID_OPTION, "pid", "Address the instance with process id <pid>");
    option(&mut out, BLOCK_OPTION, "", "Keep running until interrupted");
    manager.format_options(&mut out, OPTION_INDENT, DESCRIPTION_INDENT);
    manager.format_plugin_options(&mut out, OPTION_INDENT, DESCRIPTION_INDENT);
    out
}

/// `-version` output
pub fn version_text(manager: &PluginManager, core_version: &str, copyright: &str) -> String {
    let mut out = String::new();
    let _ = write!(out, "\nKeel {}\n\n", core_version);
    manager.format_plugin_versions(&mut out);
    let _ = write!(out, "\n{}\n", copyright);
    out
}
