use std::any::Any;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ahash::HashMap;
use clap::{Parser, ValueEnum};
use dyn_clone::DynClone;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::simulation::error::{ConfigError, ConfigResult};

/// Macro to register an override handler for a specific config key
#[macro_export]
macro_rules! register_override {
    ($key:literal, $func:expr) => {
        inventory::submit! {
            $crate::simulation::config::OverrideHandler {
                key: $key,
                apply: $func,
            }
        }
    };
}

pub struct OverrideHandler {
    pub key: &'static str,
    pub apply: fn(config: &mut Config, value: &str) -> ConfigResult<()>,
}

// Collect all OverrideHandler submitted from anywhere in the crate
inventory::collect!(OverrideHandler);

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineArgs {
    #[arg(long, short)]
    pub config: Option<String>,
    #[arg(long = "set", value_parser = parse_key_val)]
    pub overrides: Vec<(String, String)>,
}

impl CommandLineArgs {
    pub fn new_with_path(path: impl ToString) -> Self {
        CommandLineArgs {
            config: Some(path.to_string()),
            overrides: Vec::new(),
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=');
    match pos {
        Some(pos) => Ok((s[..pos].to_string(), s[pos + 1..].to_string())),
        None => Err(format!("invalid KEY=VALUE: no `=` found in `{}`", s)),
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    // a mutex, so that missing modules can be filled with defaults on first access
    modules: Mutex<HashMap<String, Box<dyn ConfigModule>>>,
    #[serde(skip)]
    context: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            modules: Mutex::new(HashMap::default()),
            context: None,
        }
    }
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Config {
            modules: Mutex::new(self.modules.lock().clone()),
            context: self.context.clone(),
        }
    }
}

impl TryFrom<CommandLineArgs> for Config {
    type Error = ConfigError;

    fn try_from(args: CommandLineArgs) -> ConfigResult<Self> {
        let mut config = match &args.config {
            Some(path) => Config::from_file(Path::new(path))?,
            None => Config::default(),
        };
        config.apply_overrides(&args.overrides)?;
        Ok(config)
    }
}

impl Config {
    pub fn from_file(config_path: &Path) -> ConfigResult<Self> {
        let file = File::open(config_path).map_err(|source| ConfigError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.set_context(Some(config_path.to_path_buf()));
        info!("Loaded config from {config_path:?}");
        Ok(config)
    }

    pub fn set_context(&mut self, context: Option<PathBuf>) {
        self.context = context;
    }

    pub fn context(&self) -> &Option<PathBuf> {
        &self.context
    }

    /// Apply generic key-value overrides to the config, e.g. simulation.end_time=3600
    pub fn apply_overrides(&mut self, overrides: &[(String, String)]) -> ConfigResult<()> {
        info!("Applying overrides: {:?}", overrides);

        for (key, value) in overrides {
            let handler =
                inventory::iter::<OverrideHandler>().find(|h| h.key == key.as_str());
            if let Some(handler) = handler {
                (handler.apply)(self, value)?;
            } else {
                warn!("No override handler found for key: {}", key);
            }
        }
        Ok(())
    }

    pub fn simulation(&self) -> Simulation {
        self.module_or_default("simulation")
    }

    pub fn set_simulation(&mut self, simulation: Simulation) {
        self.set_module("simulation", simulation);
    }

    pub fn travel_time(&self) -> TravelTimeCalculatorConfig {
        self.module_or_default("travel_time")
    }

    pub fn set_travel_time(&mut self, travel_time: TravelTimeCalculatorConfig) {
        self.set_module("travel_time", travel_time);
    }

    pub fn computational_setup(&self) -> ComputationalSetup {
        self.module_or_default("computational_setup")
    }

    pub fn set_computational_setup(&mut self, setup: ComputationalSetup) {
        self.set_module("computational_setup", setup);
    }

    pub fn output(&self) -> Output {
        self.module_or_default("output")
    }

    pub fn set_output(&mut self, output: Output) {
        self.set_module("output", output);
    }

    /// The output directory. Relative paths are resolved against the directory of the config file.
    pub fn output_dir(&self) -> PathBuf {
        let dir = self.output().output_dir;
        match self.context.as_ref().and_then(|c| c.parent()) {
            Some(parent) if dir.is_relative() => parent.join(dir),
            _ => dir,
        }
    }

    fn set_module<T: ConfigModule + 'static>(&mut self, key: &str, module: T) {
        self.modules.lock().insert(key.to_string(), Box::new(module));
    }

    fn module_or_default<T: ConfigModule + Clone + Default + 'static>(&self, key: &str) -> T {
        let mut modules = self.modules.lock();
        if let Some(module) = modules
            .get(key)
            .and_then(|boxed| boxed.as_any().downcast_ref::<T>())
        {
            return module.clone();
        }
        let default = T::default();
        modules.insert(key.to_string(), Box::new(default.clone()));
        default
    }
}

pub fn write_config(config: &Config, output_path: &Path) -> ConfigResult<()> {
    let output_config = output_path.join("output_config.yml");
    let file = File::create(&output_config).map_err(|source| ConfigError::Io {
        path: output_config.clone(),
        source,
    })?;
    serde_yaml::to_writer(BufWriter::new(file), config)?;
    Ok(())
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Simulation {
    #[serde(default)]
    pub start_time: u32,
    /// An end time of 0 lets the simulation run until all agents are done.
    #[serde(default = "default_end_time")]
    pub end_time: u32,
    #[serde(default = "default_to_1")]
    pub time_step_size: u32,
    #[serde(default = "default_sample_size")]
    pub sample_size: f32,
    #[serde(default = "default_stuck_threshold")]
    pub stuck_threshold: u32,
    #[serde(default = "default_main_modes")]
    pub main_modes: Vec<String>,
    /// If a vehicle is not parked on the link where its driver departs, move it there instead of
    /// aborting the simulation.
    #[serde(default)]
    pub teleport_vehicles: bool,
    #[serde(default)]
    pub non_network_legs: NonNetworkLegs,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            start_time: 0,
            end_time: default_end_time(),
            time_step_size: 1,
            sample_size: 1.0,
            stuck_threshold: u32::MAX,
            main_modes: default_main_modes(),
            teleport_vehicles: false,
            non_network_legs: NonNetworkLegs::Error,
            seed: default_seed(),
        }
    }
}

impl Simulation {
    /// The clock would never advance with a step size of 0.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.time_step_size == 0 {
            return Err(ConfigError::NotPositive {
                key: "simulation.time_step_size",
            });
        }
        Ok(())
    }
}

/// What to do with a leg that is not simulated on the network and carries no travel time.
#[derive(PartialEq, Debug, ValueEnum, Clone, Copy, Serialize, Deserialize, Default)]
pub enum NonNetworkLegs {
    #[default]
    Error,
    Tolerate,
}

register_override!("simulation.start_time", |config, value| {
    let mut simulation = config.simulation();
    simulation.start_time = parse_override("simulation.start_time", value)?;
    config.set_simulation(simulation);
    Ok(())
});

register_override!("simulation.end_time", |config, value| {
    let mut simulation = config.simulation();
    simulation.end_time = parse_override("simulation.end_time", value)?;
    config.set_simulation(simulation);
    Ok(())
});

register_override!("simulation.sample_size", |config, value| {
    let mut simulation = config.simulation();
    simulation.sample_size = parse_override("simulation.sample_size", value)?;
    config.set_simulation(simulation);
    Ok(())
});

register_override!("simulation.teleport_vehicles", |config, value| {
    let mut simulation = config.simulation();
    simulation.teleport_vehicles = parse_override("simulation.teleport_vehicles", value)?;
    config.set_simulation(simulation);
    Ok(())
});

register_override!("simulation.seed", |config, value| {
    let mut simulation = config.simulation();
    simulation.seed = parse_override("simulation.seed", value)?;
    config.set_simulation(simulation);
    Ok(())
});

#[derive(PartialEq, Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub enum AggregationPolicy {
    /// Travel times are stored in the bin of the time the link was entered.
    #[default]
    Optimistic,
    /// Travel times are stored in the bin of the time the link was left.
    Pessimistic,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TravelTimeCalculatorConfig {
    #[serde(default = "default_bin_size")]
    pub bin_size: u32,
    #[serde(default = "default_max_time")]
    pub max_time: u32,
    #[serde(default = "default_true")]
    pub calculate_link_travel_times: bool,
    #[serde(default)]
    pub calculate_link_to_link_travel_times: bool,
    #[serde(default)]
    pub filter_modes: bool,
    #[serde(default = "default_main_modes")]
    pub analyzed_modes: Vec<String>,
    #[serde(default)]
    pub aggregation: AggregationPolicy,
}

impl Default for TravelTimeCalculatorConfig {
    fn default() -> Self {
        Self {
            bin_size: default_bin_size(),
            max_time: default_max_time(),
            calculate_link_travel_times: true,
            calculate_link_to_link_travel_times: false,
            filter_modes: false,
            analyzed_modes: default_main_modes(),
            aggregation: AggregationPolicy::Optimistic,
        }
    }
}

impl TravelTimeCalculatorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bin_size == 0 {
            return Err(ConfigError::NotPositive {
                key: "travel_time.bin_size",
            });
        }
        Ok(())
    }
}

register_override!("travel_time.bin_size", |config, value| {
    let mut travel_time = config.travel_time();
    travel_time.bin_size = parse_override("travel_time.bin_size", value)?;
    config.set_travel_time(travel_time);
    Ok(())
});

register_override!(
    "travel_time.calculate_link_to_link_travel_times",
    |config, value| {
        let mut travel_time = config.travel_time();
        travel_time.calculate_link_to_link_travel_times =
            parse_override("travel_time.calculate_link_to_link_travel_times", value)?;
        config.set_travel_time(travel_time);
        Ok(())
    }
);

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ComputationalSetup {
    /// Number of worker threads moving nodes. 1 moves nodes on the simulation thread.
    #[serde(default = "default_to_1")]
    pub threads: u32,
}

impl Default for ComputationalSetup {
    fn default() -> Self {
        Self { threads: 1 }
    }
}

register_override!("computational_setup.threads", |config, value| {
    let mut setup = config.computational_setup();
    setup.threads = parse_override("computational_setup.threads", value)?;
    config.set_computational_setup(setup);
    Ok(())
});

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Output {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub write_events: WriteEvents,
    #[serde(default = "default_to_1")]
    pub iterations: u32,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            output_dir: PathBuf::from("./"),
            logging: Logging::None,
            write_events: WriteEvents::None,
            iterations: 1,
        }
    }
}

register_override!("output.output_dir", |config, value| {
    let mut output = config.output();
    output.output_dir = PathBuf::from(value);
    config.set_output(output);
    Ok(())
});

register_override!("output.iterations", |config, value| {
    let mut output = config.output();
    output.iterations = parse_override("output.iterations", value)?;
    config.set_output(output);
    Ok(())
});

/// Have this extra layer of log level enum, as tracing subscriber has no
/// off/none option by default. At least it can't be parsed
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub enum Logging {
    #[default]
    None,
    Info,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub enum WriteEvents {
    #[default]
    None,
    /// Writes `output_events_<iteration>.xml.gz` into the output directory.
    Xml,
}

#[typetag::serde(tag = "type")]
pub trait ConfigModule: Debug + Send + DynClone {
    fn as_any(&self) -> &dyn Any;
}

#[typetag::serde]
impl ConfigModule for Simulation {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[typetag::serde]
impl ConfigModule for TravelTimeCalculatorConfig {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[typetag::serde]
impl ConfigModule for ComputationalSetup {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[typetag::serde]
impl ConfigModule for Output {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// This is needed to allow cloning of the trait object and thus cloning of the Config.
dyn_clone::clone_trait_object!(ConfigModule);

fn default_end_time() -> u32 {
    86400
}

fn default_to_1() -> u32 {
    1
}

fn default_sample_size() -> f32 {
    1.0
}

fn default_stuck_threshold() -> u32 {
    u32::MAX
}

fn default_main_modes() -> Vec<String> {
    vec!["car".to_string()]
}

fn default_seed() -> u64 {
    42
}

fn default_bin_size() -> u32 {
    900
}

fn default_max_time() -> u32 {
    30 * 3600
}

fn default_true() -> bool {
    true
}
