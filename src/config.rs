use std::env;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::allocator::{AllocationConfig, Sequencing};
use crate::layout::{LayoutKind, YardLayout};
use crate::proposal::ProposalGenerator;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub planner: PlannerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            planner: PlannerConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("YARD_PLANNER_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "Could not parse YARD_PLANNER_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("YARD_PLANNER_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "YARD_PLANNER_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "Could not parse YARD_PLANNER_API_PORT ('{}'): {}. Using {}.",
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Configuration for the allocation engine, the yard layout and proposal generation.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    allocation: AllocationConfig,
    layout: LayoutKind,
    custom_layout: Option<YardLayout>,
    max_proposals: usize,
    seed: Option<u64>,
}

impl PlannerConfig {
    const GROUP_THRESHOLD_VAR: &'static str = "YARD_PLANNER_GROUP_THRESHOLD";
    const ADJACENCY_VAR: &'static str = "YARD_PLANNER_WEIGHT_CLASS_ADJACENCY";
    const SEQUENCING_VAR: &'static str = "YARD_PLANNER_SEQUENCING";
    const PREFER_GENERAL_VAR: &'static str = "YARD_PLANNER_PREFER_GENERAL_SLOTS";
    const STRICT_ZONES_VAR: &'static str = "YARD_PLANNER_STRICT_ZONES";
    const LAYOUT_VAR: &'static str = "YARD_PLANNER_LAYOUT";
    const LAYOUT_FILE_VAR: &'static str = "YARD_PLANNER_LAYOUT_FILE";
    const MAX_PROPOSALS_VAR: &'static str = "YARD_PLANNER_MAX_PROPOSALS";
    const SEED_VAR: &'static str = "YARD_PLANNER_SEED";

    /// Upper bound for `YARD_PLANNER_MAX_PROPOSALS`.
    pub const PROPOSAL_LIMIT: usize = 20;

    fn from_env() -> Self {
        let threshold = load_f64_with_warning(
            Self::GROUP_THRESHOLD_VAR,
            AllocationConfig::DEFAULT_GROUP_COMPLETION_THRESHOLD,
            |value| value > 0.0 && value <= 1.0,
            "must be greater than 0 and at most 1",
            "Adjusted group completion threshold changes how readily carrier groups are split",
        );

        let adjacency = load_u64_with_warning(
            Self::ADJACENCY_VAR,
            u64::from(AllocationConfig::DEFAULT_WEIGHT_CLASS_ADJACENCY),
            |value| value <= 7,
            "must be between 0 and 7",
        ) as u8;

        let sequencing = load_parsed::<Sequencing>(Self::SEQUENCING_VAR).unwrap_or_default();

        let prefer_general_slots = env_string(Self::PREFER_GENERAL_VAR)
            .and_then(|raw| parse_bool(&raw, Self::PREFER_GENERAL_VAR))
            .unwrap_or(false);

        let strict_zones = env_string(Self::STRICT_ZONES_VAR)
            .and_then(|raw| parse_bool(&raw, Self::STRICT_ZONES_VAR))
            .unwrap_or(false);

        let layout = load_parsed::<LayoutKind>(Self::LAYOUT_VAR).unwrap_or_default();
        let custom_layout = env_string(Self::LAYOUT_FILE_VAR).and_then(|path| {
            match load_layout_file(&path) {
                Ok(custom) => {
                    info!(path = %path, zones = custom.zones().len(), "Custom yard layout loaded");
                    Some(custom)
                }
                Err(err) => {
                    warn!(
                        "Could not load {} ('{}'): {}. Using {} layout.",
                        Self::LAYOUT_FILE_VAR,
                        path,
                        err,
                        layout.name()
                    );
                    None
                }
            }
        });

        let max_proposals = load_u64_with_warning(
            Self::MAX_PROPOSALS_VAR,
            ProposalGenerator::DEFAULT_MAX_PROPOSALS as u64,
            |value| (1..=Self::PROPOSAL_LIMIT as u64).contains(&value),
            "must be between 1 and 20",
        ) as usize;

        let seed = env_string(Self::SEED_VAR).and_then(|raw| match raw.parse::<u64>() {
            Ok(seed) => {
                info!(seed, "Deterministic planning enabled");
                Some(seed)
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as number: {}. Using random seeds.",
                    Self::SEED_VAR,
                    raw,
                    err
                );
                None
            }
        });

        let allocation = AllocationConfig::builder()
            .group_completion_threshold(threshold)
            .weight_class_adjacency(adjacency)
            .sequencing(sequencing)
            .prefer_general_slots(prefer_general_slots)
            .strict_zones(strict_zones)
            .build();

        Self {
            allocation,
            layout,
            custom_layout,
            max_proposals,
            seed,
        }
    }

    /// Returns the configured AllocationConfig.
    pub fn allocation_config(&self) -> AllocationConfig {
        self.allocation
    }

    /// Replaces the built-in layout with a custom one.
    pub fn with_custom_layout(mut self, layout: YardLayout) -> Self {
        self.custom_layout = Some(layout);
        self
    }

    /// The custom layout when one was loaded, the built-in kind otherwise.
    pub fn yard_layout(&self) -> YardLayout {
        match &self.custom_layout {
            Some(layout) => layout.clone(),
            None => YardLayout::from_kind(self.layout),
        }
    }

    /// Name reported for the active layout.
    pub fn layout_name(&self) -> &'static str {
        if self.custom_layout.is_some() {
            "custom"
        } else {
            self.layout.name()
        }
    }

    pub fn max_proposals(&self) -> usize {
        self.max_proposals
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// RNG for one request: seeded when a seed is configured, random otherwise.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            allocation: AllocationConfig::default(),
            layout: LayoutKind::default(),
            custom_layout: None,
            max_proposals: ProposalGenerator::DEFAULT_MAX_PROPOSALS,
            seed: None,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn load_layout_file(path: &str) -> crate::error::Result<YardLayout> {
    let raw = fs::read_to_string(path)
        .map_err(|err| crate::error::PlanningError::InvalidLayout(err.to_string()))?;
    YardLayout::from_json(&raw)
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_parsed<T>(var_name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_string(var_name)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("{} ('{}'): {}. Using default value.", var_name, raw, err);
            None
        }
    }
}

fn load_u64_with_warning(
    var_name: &str,
    default: u64,
    validator: impl Fn(u64) -> bool,
    invalid_hint: &str,
) -> u64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if validator(value) => value,
            Ok(_) => {
                warn!(
                    "{} contains invalid value '{}': {}. Using {}.",
                    var_name, raw, invalid_hint, default
                );
                default
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    warn!(
                        "{} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        warn!("{} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
