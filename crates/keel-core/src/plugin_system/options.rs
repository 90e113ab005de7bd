//! Command-line options understood by the plugin manager, and their help text.
//!
//! Options are single-dash words. Each token is matched, in order, against
//! the end-of-options marker, the manager's own options, the application's
//! options and finally the options plugins declare in their metadata. Tokens
//! that match nothing and do not start with `-` are positional arguments.
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::kernel::error::{Error, Result};
use crate::plugin_system::manager::{PluginManager, TestSpec};
use crate::plugin_system::resolver;
use crate::plugin_system::spec::SpecId;

pub const END_OF_OPTIONS: &str = "--";
pub const LOAD_OPTION: &str = "-load";
pub const NO_LOAD_OPTION: &str = "-noload";
pub const TEST_OPTION: &str = "-test";
pub const NO_TEST_OPTION: &str = "-notest";
pub const PROFILE_OPTION: &str = "-profile";
pub const NO_CRASHCHECK_OPTION: &str = "-no-crashcheck";

const ALL: &str = "all";

pub(crate) struct OptionsParser<'a> {
    args: &'a [String],
    app_options: &'a BTreeMap<String, bool>,
    found_app_options: BTreeMap<String, String>,
    manager: &'a mut PluginManager,
    position: usize,
    current: String,
    error: Option<String>,
    dependency_refresh_needed: bool,
}

impl<'a> OptionsParser<'a> {
    pub(crate) fn new(
        args: &'a [String],
        app_options: &'a BTreeMap<String, bool>,
        manager: &'a mut PluginManager,
    ) -> Self {
        Self {
            args,
            app_options,
            found_app_options: BTreeMap::new(),
            manager,
            position: 0,
            current: String::new(),
            error: None,
            dependency_refresh_needed: false,
        }
    }

    pub(crate) fn parse(mut self) -> Result<BTreeMap<String, String>> {
        while self.error.is_none() {
            if !self.next_token() {
                break;
            }
            if self.check_for_end_of_options() {
                break;
            }
            if self.check_for_load_option()
                || self.check_for_no_load_option()
                || self.check_for_profiling_option()
                || self.check_for_no_crashcheck_option()
                || self.check_for_test_options()
                || self.check_for_app_option()
                || self.check_for_plugin_option()
            {
                continue;
            }
            if self.check_for_unknown_option() {
                break;
            }
            self.manager.arguments.push(self.current.clone());
        }

        if self.manager.test_run_requested() {
            self.dependency_refresh_needed = true;
            self.force_disable_all_plugins_except_tested_and_force_enabled();
        }
        if self.dependency_refresh_needed {
            self.manager.enable_dependencies_indirectly();
        }

        match self.error {
            Some(error) => Err(Error::Options(error)),
            None => Ok(self.found_app_options),
        }
    }

    fn next_token(&mut self) -> bool {
        match self.args.get(self.position) {
            Some(arg) => {
                self.current = arg.clone();
                self.position += 1;
                true
            }
            None => {
                self.current.clear();
                false
            }
        }
    }

    /// Advance to the parameter of the current option
    fn next_required_token(&mut self) -> bool {
        let option = self.current.clone();
        if self.next_token() {
            return true;
        }
        self.error = Some(format!("The option {} requires an argument.", option));
        false
    }

    fn plugin_id(&mut self, name: &str) -> Option<SpecId> {
        let id = self.manager.plugin_id(name);
        if id.is_none() {
            self.error = Some(format!("The plugin \"{}\" does not exist.", name));
        }
        id
    }

    fn check_for_end_of_options(&mut self) -> bool {
        if self.current != END_OF_OPTIONS {
            return false;
        }
        while self.next_token() {
            self.manager.arguments.push(self.current.clone());
        }
        true
    }

    fn check_for_load_option(&mut self) -> bool {
        if self.current != LOAD_OPTION {
            return false;
        }
        if self.next_required_token() {
            if self.current == ALL {
                for spec in self.manager.specs.iter_mut() {
                    spec.set_force_enabled(true);
                }
                self.dependency_refresh_needed = true;
            } else {
                let name = self.current.clone();
                if let Some(id) = self.plugin_id(&name) {
                    self.manager.specs[id.0].set_force_enabled(true);
                    self.dependency_refresh_needed = true;
                }
            }
            self.manager.arguments_for_restart.push(LOAD_OPTION.to_string());
            self.manager.arguments_for_restart.push(self.current.clone());
        }
        true
    }

    fn check_for_no_load_option(&mut self) -> bool {
        if self.current != NO_LOAD_OPTION {
            return false;
        }
        if self.next_required_token() {
            if self.current == ALL {
                for spec in self.manager.specs.iter_mut() {
                    spec.set_force_disabled(true);
                }
                self.dependency_refresh_needed = true;
            } else {
                let name = self.current.clone();
                if let Some(id) = self.plugin_id(&name) {
                    self.manager.specs[id.0].set_force_disabled(true);
                    for dependent in self.manager.plugins_requiring_plugin(id) {
                        self.manager.specs[dependent.0].set_force_disabled(true);
                    }
                    self.dependency_refresh_needed = true;
                }
            }
            self.manager.arguments_for_restart.push(NO_LOAD_OPTION.to_string());
            self.manager.arguments_for_restart.push(self.current.clone());
        }
        true
    }

    fn check_for_profiling_option(&mut self) -> bool {
        if self.current != PROFILE_OPTION {
            return false;
        }
        self.manager.start_profiling();
        true
    }

    fn check_for_no_crashcheck_option(&mut self) -> bool {
        if self.current != NO_CRASHCHECK_OPTION {
            return false;
        }
        self.manager.crash_check = false;
        true
    }

    fn check_for_test_options(&mut self) -> bool {
        if self.current == TEST_OPTION {
            if self.next_required_token() {
                if self.current == ALL {
                    let queue = resolver::load_queue(&mut self.manager.specs);
                    self.manager.test_specs = queue
                        .into_iter()
                        .map(|spec| TestSpec {
                            spec,
                            test_functions: Vec::new(),
                        })
                        .collect();
                } else {
                    let mut parts = self.current.split(',').map(str::to_string);
                    let name = parts.next().unwrap_or_default();
                    let test_functions: Vec<String> = parts.collect();
                    if let Some(id) = self.plugin_id(&name) {
                        if self.manager.test_specs.iter().any(|t| t.spec == id) {
                            self.error = Some(format!("The plugin \"{}\" is specified twice for testing.", name));
                        } else {
                            self.manager.test_specs.push(TestSpec {
                                spec: id,
                                test_functions,
                            });
                        }
                    }
                }
            }
            return true;
        }

        if self.current == NO_TEST_OPTION {
            if self.next_required_token() {
                let name = self.current.clone();
                if let Some(id) = self.plugin_id(&name) {
                    let before = self.manager.test_specs.len();
                    self.manager.test_specs.retain(|t| t.spec != id);
                    if self.manager.test_specs.len() == before {
                        self.error = Some(format!("The plugin \"{}\" is not tested.", name));
                    }
                }
            }
            return true;
        }

        false
    }

    fn check_for_app_option(&mut self) -> bool {
        let Some(&takes_argument) = self.app_options.get(&self.current) else {
            return false;
        };
        let option = self.current.clone();
        let mut argument = String::new();
        if takes_argument && self.next_required_token() {
            argument = self.current.clone();
        }
        self.found_app_options.insert(option, argument);
        true
    }

    fn check_for_plugin_option(&mut self) -> bool {
        let Some((id, requires_parameter)) = self.manager.plugin_for_option(&self.current) else {
            return false;
        };
        self.manager.specs[id.0].add_argument(self.current.clone());
        if requires_parameter && self.next_required_token() {
            self.manager.specs[id.0].add_argument(self.current.clone());
        }
        true
    }

    fn check_for_unknown_option(&mut self) -> bool {
        if !self.current.starts_with('-') {
            return false;
        }
        self.error = Some(format!("Unknown option {}", self.current));
        true
    }

    fn force_disable_all_plugins_except_tested_and_force_enabled(&mut self) {
        for test_spec in &self.manager.test_specs {
            self.manager.specs[test_spec.spec.0].set_force_enabled(true);
        }
        for spec in self.manager.specs.iter_mut() {
            if !spec.is_force_enabled() && !spec.is_required() {
                spec.set_force_disabled(true);
            }
        }
    }
}

//--------------------------------------------------
// Help output
//--------------------------------------------------

/// Append one option line: the option at `option_indent`, its description at
/// `description_indent`, or on the next line if the option is too wide.
pub fn format_option(
    out: &mut String,
    option: &str,
    parameter: &str,
    description: &str,
    option_indent: usize,
    description_indent: usize,
) {
    let mut remaining = description_indent as isize - option_indent as isize - option.len() as isize;
    out.push_str(&" ".repeat(option_indent));
    out.push_str(option);
    if !parameter.is_empty() {
        let _ = write!(out, " <{}>", parameter);
        remaining -= 3 + parameter.len() as isize;
    }
    if remaining >= 1 {
        out.push_str(&" ".repeat(remaining as usize));
    } else {
        out.push('\n');
        out.push_str(&" ".repeat(description_indent));
    }
    out.push_str(description);
    out.push('\n');
}

impl PluginManager {
    /// Help text for the options the manager itself understands
    pub fn format_options(&self, out: &mut String, option_indent: usize, description_indent: usize) {
        let mut option = |o: &str, p: &str, d: &str| format_option(out, o, p, d, option_indent, description_indent);
        option(LOAD_OPTION, "plugin", "Load <plugin> and all plugins that it requires");
        option(&format!("{} {}", LOAD_OPTION, ALL), "", "Load all available plugins");
        option(NO_LOAD_OPTION, "plugin", "Do not load <plugin> and all plugins that require it");
        option(
            &format!("{} {}", NO_LOAD_OPTION, ALL),
            "",
            "Do not load any plugin (useful when followed by one or more \"-load\" arguments)",
        );
        option(PROFILE_OPTION, "", "Profile plugin loading");
        option(NO_CRASHCHECK_OPTION, "", "Disable startup check for previously crashed instance");
        option(
            &format!("{} <plugin>[,testfunction[:testdata]]...", TEST_OPTION),
            "",
            "Run plugin's tests (by default a separate settings path is used)",
        );
        option(&format!("{} {}", TEST_OPTION, ALL), "", "Run tests from all plugins");
        option(NO_TEST_OPTION, "plugin", "Exclude all of the plugin's tests from the test run");
    }

    /// Help text for the options plugins declare
    pub fn format_plugin_options(&self, out: &mut String, option_indent: usize, description_indent: usize) {
        for spec in &self.specs {
            let arguments = spec.argument_descriptions();
            if arguments.is_empty() {
                continue;
            }
            let _ = write!(out, "\nPlugin: {}\n", spec.name());
            for argument in arguments {
                format_option(
                    out,
                    &argument.name,
                    &argument.parameter,
                    &argument.description,
                    option_indent,
                    description_indent,
                );
            }
        }
    }

    /// One line per plugin: name, version and description
    pub fn format_plugin_versions(&self, out: &mut String) {
        for spec in &self.specs {
            let _ = writeln!(out, "  {} {} {}", spec.name(), spec.version(), spec.description());
        }
    }
}
