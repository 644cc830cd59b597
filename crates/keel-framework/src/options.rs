//! Option aggregation and command-line ingestion.
//!
//! Every registered plugin contributes [`OptionSpec`]s in two groups:
//! command-line-only and shared (also settable from a configuration file).
//! The [`OptionsAggregator`] merges all contributions with the framework's
//! built-ins (`--plugin`, `--config-file`, plus clap's `--help` and
//! `--version`) into one dynamically assembled `clap::Command`, parses argv,
//! and produces the flat [`OptionMap`] handed to every plugin initializer.
//!
//! The aggregator only produces values; it enforces nothing beyond types and
//! name uniqueness. Interpreting an option is the owning plugin's business.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{OptionsError, OptionsResult};
use crate::plugin::{PluginDescriptor, registry};

/// Option names the framework claims for itself.
const RESERVED: &[&str] = &["plugin", "config-file", "help", "version"];

// ─── Option schema ────────────────────────────────────────────────────────────

/// Value shape of a declared option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Boolean presence flag (`--readonly`).
    Flag,
    /// Free-form string value.
    String,
    /// Signed integer value.
    Integer,
    /// Filesystem path value.
    Path,
}

/// One option a plugin contributes to the merged schema.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Long option name, without the leading dashes. Must be unique across
    /// every registered plugin.
    pub name: &'static str,
    /// Help text shown by `--help`.
    pub help: &'static str,
    /// Value shape.
    pub kind: OptionKind,
}

impl OptionSpec {
    /// A presence flag.
    pub const fn flag(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: OptionKind::Flag,
        }
    }

    /// A string-valued option.
    pub const fn string(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: OptionKind::String,
        }
    }

    /// An integer-valued option.
    pub const fn integer(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: OptionKind::Integer,
        }
    }

    /// A path-valued option.
    pub const fn path(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: OptionKind::Path,
        }
    }
}

/// A plugin's option contributions, split by source group.
#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    /// Options accepted from the command line only.
    pub cli: Vec<OptionSpec>,
    /// Options accepted from the command line and the configuration file.
    pub shared: Vec<OptionSpec>,
}

impl PluginOptions {
    /// Adds a command-line-only option.
    pub fn cli(mut self, spec: OptionSpec) -> Self {
        self.cli.push(spec);
        self
    }

    /// Adds a shared option.
    pub fn shared(mut self, spec: OptionSpec) -> Self {
        self.shared.push(spec);
        self
    }
}

// ─── OptionMap ────────────────────────────────────────────────────────────────

/// Flat `name → value` map of parsed options, handed to every plugin's
/// initializer.
#[derive(Debug, Clone, Default)]
pub struct OptionMap {
    values: HashMap<String, Value>,
}

impl OptionMap {
    /// Whether a value is present for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Raw JSON value for `name`.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Deserializes the value for `name` into `T`. Returns `None` when the
    /// option is absent or has an incompatible shape.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.values
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Flag accessor; an absent flag reads `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.values
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Integer accessor.
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    /// String accessor.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Sets a value, replacing any existing one.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no value is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ─── Aggregator ───────────────────────────────────────────────────────────────

/// Outcome of parsing argv.
#[derive(Debug)]
pub enum Parse {
    /// Parsing succeeded; the run proceeds.
    Ready(ParsedOptions),
    /// `--help` or `--version` was requested and has been printed; the
    /// embedder should exit cleanly without activating anything.
    Exit,
}

/// Everything the facade needs from a successful parse.
#[derive(Debug)]
pub struct ParsedOptions {
    /// Merged option values (command line only at this point; configuration
    /// file defaults are applied afterwards).
    pub values: OptionMap,
    /// Plugins named by `--plugin`, deduplicated, in first-occurrence order.
    pub plugins: Vec<String>,
    /// Value of `--config-file`, when given.
    pub config_file: Option<PathBuf>,
}

#[derive(Debug)]
struct AggregatedSpec {
    spec: OptionSpec,
    plugin: &'static str,
    shared: bool,
}

/// Collects option schemas from plugin descriptors and owns the assembled
/// `clap::Command`.
#[derive(Debug)]
pub struct OptionsAggregator {
    command: Command,
    specs: Vec<AggregatedSpec>,
}

impl OptionsAggregator {
    /// Aggregates the option schema of every plugin registered with the
    /// process-wide registry.
    pub fn from_registry(bin: &str, version: &str) -> OptionsResult<Self> {
        Self::from_descriptors(bin, version, registry::global().descriptors())
    }

    /// Aggregates an explicit descriptor list.
    pub fn from_descriptors(
        bin: &str,
        version: &str,
        descriptors: impl IntoIterator<Item = PluginDescriptor>,
    ) -> OptionsResult<Self> {
        let mut command = Command::new(bin.to_string())
            .version(version.to_string())
            .arg(
                Arg::new("plugin")
                    .long("plugin")
                    .value_name("NAME")
                    .action(ArgAction::Append)
                    .help("Activate the named plugin (repeatable)"),
            )
            .arg(
                Arg::new("config-file")
                    .long("config-file")
                    .value_name("PATH")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Read additional option values from a YAML file"),
            );

        let mut specs = Vec::new();
        let mut owners: HashMap<&'static str, &'static str> = HashMap::new();
        for descriptor in descriptors {
            let contributed = (descriptor.options)();
            let groups = contributed
                .cli
                .into_iter()
                .map(|spec| (spec, false))
                .chain(contributed.shared.into_iter().map(|spec| (spec, true)));
            for (spec, shared) in groups {
                if RESERVED.contains(&spec.name) {
                    return Err(OptionsError::ReservedOption(spec.name));
                }
                if let Some(first) = owners.insert(spec.name, descriptor.name) {
                    return Err(OptionsError::DuplicateOption {
                        option: spec.name,
                        first,
                        second: descriptor.name,
                    });
                }
                command = command.arg(build_arg(&spec));
                specs.push(AggregatedSpec {
                    spec,
                    plugin: descriptor.name,
                    shared,
                });
            }
        }
        Ok(Self { command, specs })
    }

    /// Parses argv against the merged schema.
    ///
    /// Help and version requests short-circuit as [`Parse::Exit`] after
    /// printing through clap; malformed input is [`OptionsError::Usage`].
    pub fn parse<I, S>(&self, argv: I) -> OptionsResult<Parse>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString> + Clone,
    {
        let matches = match self.command.clone().try_get_matches_from(argv) {
            Ok(matches) => matches,
            Err(error)
                if matches!(
                    error.kind(),
                    clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
                ) =>
            {
                let _ = error.print();
                return Ok(Parse::Exit);
            }
            Err(error) => return Err(OptionsError::Usage(error.to_string())),
        };

        let mut values = OptionMap::default();
        for aggregated in &self.specs {
            let name = aggregated.spec.name;
            match aggregated.spec.kind {
                OptionKind::Flag => {
                    if matches.get_flag(name) {
                        values.set(name, Value::Bool(true));
                    }
                }
                OptionKind::String => {
                    if let Some(value) = matches.get_one::<String>(name) {
                        values.set(name, Value::String(value.clone()));
                    }
                }
                OptionKind::Integer => {
                    if let Some(value) = matches.get_one::<i64>(name) {
                        values.set(name, Value::from(*value));
                    }
                }
                OptionKind::Path => {
                    if let Some(value) = matches.get_one::<PathBuf>(name) {
                        values.set(name, Value::String(value.display().to_string()));
                    }
                }
            }
        }

        let mut plugins: Vec<String> = Vec::new();
        if let Some(names) = matches.get_many::<String>("plugin") {
            for name in names {
                // Repeats of the same name dedupe silently.
                if !plugins.contains(name) {
                    plugins.push(name.clone());
                }
            }
        }
        let config_file = matches.get_one::<PathBuf>("config-file").cloned();

        Ok(Parse::Ready(ParsedOptions {
            values,
            plugins,
            config_file,
        }))
    }

    /// Fills `values` with configuration-file defaults.
    ///
    /// Only options declared in the shared group are eligible, and a value
    /// given on the command line always wins. Unknown or command-line-only
    /// keys are dropped with a warning.
    pub fn apply_config_defaults(&self, values: &mut OptionMap, defaults: HashMap<String, Value>) {
        for (name, value) in defaults {
            match self
                .specs
                .iter()
                .find(|aggregated| aggregated.spec.name == name)
            {
                Some(aggregated) if aggregated.shared => {
                    if !values.contains(&name) {
                        values.set(name, value);
                    }
                }
                Some(aggregated) => {
                    warn!(
                        option = %name,
                        plugin = %aggregated.plugin,
                        "config value ignored: option is command-line-only"
                    );
                }
                None => {
                    warn!(option = %name, "config value ignored: unknown option");
                }
            }
        }
    }

    /// Names of every aggregated option, with its owning plugin.
    pub fn option_owners(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.specs
            .iter()
            .map(|aggregated| (aggregated.spec.name, aggregated.plugin))
    }
}

fn build_arg(spec: &OptionSpec) -> Arg {
    let arg = Arg::new(spec.name).long(spec.name).help(spec.help);
    match spec.kind {
        OptionKind::Flag => arg.action(ArgAction::SetTrue),
        OptionKind::String => arg.action(ArgAction::Set).value_name("VALUE"),
        OptionKind::Integer => arg
            .action(ArgAction::Set)
            .value_name("N")
            .value_parser(clap::value_parser!(i64)),
        OptionKind::Path => arg
            .action(ArgAction::Set)
            .value_name("PATH")
            .value_parser(clap::value_parser!(PathBuf)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Plugin, PluginMeta};

    #[derive(Default)]
    struct StoreFixture;

    impl Plugin for StoreFixture {}

    impl PluginMeta for StoreFixture {
        const NAME: &'static str = "opt.store";

        fn options() -> PluginOptions {
            PluginOptions::default()
                .shared(OptionSpec::integer("opt-dbsize", "Database size"))
                .shared(OptionSpec::flag("opt-readonly", "Open read-only"))
                .cli(OptionSpec::string("opt-bootstrap", "One-shot bootstrap key"))
        }
    }

    #[derive(Default)]
    struct NetFixture;

    impl Plugin for NetFixture {}

    impl PluginMeta for NetFixture {
        const NAME: &'static str = "opt.net";

        fn options() -> PluginOptions {
            PluginOptions::default().shared(OptionSpec::string("opt-endpoint", "Listen endpoint"))
        }
    }

    #[derive(Default)]
    struct ClashFixture;

    impl Plugin for ClashFixture {}

    impl PluginMeta for ClashFixture {
        const NAME: &'static str = "opt.clash";

        fn options() -> PluginOptions {
            PluginOptions::default().shared(OptionSpec::string("opt-endpoint", "Mine too"))
        }
    }

    #[derive(Default)]
    struct ReservedFixture;

    impl Plugin for ReservedFixture {}

    impl PluginMeta for ReservedFixture {
        const NAME: &'static str = "opt.reserved";

        fn options() -> PluginOptions {
            PluginOptions::default().cli(OptionSpec::string("plugin", "Shadows the built-in"))
        }
    }

    fn aggregator() -> OptionsAggregator {
        OptionsAggregator::from_descriptors(
            "keel-test",
            "0.0.0",
            [
                PluginDescriptor::of::<StoreFixture>(),
                PluginDescriptor::of::<NetFixture>(),
            ],
        )
        .unwrap()
    }

    fn ready(parse: Parse) -> ParsedOptions {
        match parse {
            Parse::Ready(parsed) => parsed,
            Parse::Exit => panic!("unexpected help/version exit"),
        }
    }

    #[test]
    fn test_values_parse_verbatim() {
        let parsed = ready(
            aggregator()
                .parse([
                    "keel-test",
                    "--plugin",
                    "opt.store",
                    "--opt-dbsize",
                    "10000",
                    "--opt-readonly",
                    "--plugin",
                    "opt.net",
                    "--opt-endpoint",
                    "127.0.0.1:55",
                ])
                .unwrap(),
        );
        assert_eq!(parsed.values.integer("opt-dbsize"), Some(10000));
        assert!(parsed.values.flag("opt-readonly"));
        assert_eq!(parsed.values.string("opt-endpoint"), Some("127.0.0.1:55"));
        assert_eq!(parsed.plugins, vec!["opt.store", "opt.net"]);
    }

    #[test]
    fn test_absent_flag_reads_false() {
        let parsed = ready(aggregator().parse(["keel-test"]).unwrap());
        assert!(!parsed.values.flag("opt-readonly"));
        assert!(!parsed.values.contains("opt-readonly"));
    }

    #[test]
    fn test_repeated_plugin_name_dedupes() {
        let parsed = ready(
            aggregator()
                .parse(["keel-test", "--plugin", "opt.net", "--plugin", "opt.net"])
                .unwrap(),
        );
        assert_eq!(parsed.plugins, vec!["opt.net"]);
    }

    #[test]
    fn test_duplicate_option_across_plugins_is_rejected() {
        let error = OptionsAggregator::from_descriptors(
            "keel-test",
            "0.0.0",
            [
                PluginDescriptor::of::<NetFixture>(),
                PluginDescriptor::of::<ClashFixture>(),
            ],
        )
        .unwrap_err();
        match error {
            OptionsError::DuplicateOption {
                option,
                first,
                second,
            } => {
                assert_eq!(option, "opt-endpoint");
                assert_eq!(first, "opt.net");
                assert_eq!(second, "opt.clash");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reserved_option_is_rejected() {
        let error = OptionsAggregator::from_descriptors(
            "keel-test",
            "0.0.0",
            [PluginDescriptor::of::<ReservedFixture>()],
        )
        .unwrap_err();
        assert!(matches!(error, OptionsError::ReservedOption("plugin")));
    }

    #[test]
    fn test_malformed_input_is_a_usage_error() {
        let error = aggregator()
            .parse(["keel-test", "--no-such-option"])
            .unwrap_err();
        assert!(matches!(error, OptionsError::Usage(_)));
    }

    #[test]
    fn test_help_short_circuits() {
        assert!(matches!(
            aggregator().parse(["keel-test", "--help"]).unwrap(),
            Parse::Exit
        ));
        assert!(matches!(
            aggregator().parse(["keel-test", "--version"]).unwrap(),
            Parse::Exit
        ));
    }

    #[test]
    fn test_config_defaults_fill_only_absent_shared_options() {
        let aggregator = aggregator();
        let mut parsed = ready(
            aggregator
                .parse(["keel-test", "--opt-endpoint", "10.0.0.1:9"])
                .unwrap(),
        );
        let defaults = HashMap::from([
            ("opt-endpoint".to_string(), Value::String("ignored".into())),
            ("opt-dbsize".to_string(), Value::from(512)),
            ("opt-bootstrap".to_string(), Value::String("cli-only".into())),
            ("opt-unknown".to_string(), Value::Bool(true)),
        ]);
        aggregator.apply_config_defaults(&mut parsed.values, defaults);
        // Command line wins; shared defaults fill gaps; the rest is dropped.
        assert_eq!(parsed.values.string("opt-endpoint"), Some("10.0.0.1:9"));
        assert_eq!(parsed.values.integer("opt-dbsize"), Some(512));
        assert!(!parsed.values.contains("opt-bootstrap"));
        assert!(!parsed.values.contains("opt-unknown"));
    }
}
