//! Configuration loading and typed config structures for gitswarm.
//!
//! The configuration lives in `gitswarm-config.yaml` next to the binary's
//! working directory. Every field has a default, so a missing file or an
//! empty document yields a fully usable configuration. All durations are in
//! milliseconds of simulation time.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable overriding [`ServerConfig::work_dir`].
pub const WORK_DIR_ENV: &str = "GITSWARM_WORK_DIR";

/// Environment variable overriding [`ServerConfig::port`].
pub const PORT_ENV: &str = "GITSWARM_PORT";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is out of its usable range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Entity lifecycle and tick timing.
    #[serde(default)]
    pub world: WorldConfig,

    /// Force and friction constants.
    #[serde(default)]
    pub physics: PhysicsConfig,

    /// Event pacing and backpressure.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Observer server and work directory.
    #[serde(default)]
    pub server: ServerConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `GITSWARM_WORK_DIR` overrides `server.work_dir`
    /// - `GITSWARM_PORT` overrides `server.port`
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// and no validation are applied.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// Unparseable port values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(WORK_DIR_ENV) {
            self.server.work_dir = Some(PathBuf::from(dir));
        }
        if let Some(port) = lookup(PORT_ENV).and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Check the values the simulation divides by or iterates on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };
        if self.world.tick_interval_ms == 0 {
            return invalid("world.tick_interval_ms must be at least 1");
        }
        if self.world.max_contribution_size == 0 {
            return invalid("world.max_contribution_size must be at least 1");
        }
        if self.world.author_history_len == 0 {
            return invalid("world.author_history_len must be at least 1");
        }
        if self.world.max_project_size <= 0.0 || self.world.max_author_momentum <= 0.0 {
            return invalid("world.max_project_size and world.max_author_momentum must be positive");
        }
        if !(0.0..=1.0).contains(&self.physics.speed_dynamic_friction) {
            return invalid("physics.speed_dynamic_friction must be within [0, 1]");
        }
        if self.stream.events_speedup_factor <= 0.0 {
            return invalid("stream.events_speedup_factor must be positive");
        }
        if self.stream.events_buffer_chunk_size == 0 {
            return invalid("stream.events_buffer_chunk_size must be at least 1");
        }
        if self.stream.events_buffer_allowance == 0 {
            return invalid("stream.events_buffer_allowance must be at least 1");
        }
        Ok(())
    }
}

/// Entity lifecycle and tick timing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Real milliseconds between ticks; also the integration step.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How long a contribution particle lives.
    #[serde(default = "default_contribution_lifespan_ms")]
    pub contribution_lifespan_ms: u64,

    /// How long an author with zero momentum survives.
    #[serde(default = "default_author_inactivity_timeout_ms")]
    pub author_inactivity_timeout_ms: u64,

    /// Cap on the number of events coalesced into one contribution.
    #[serde(default = "default_max_contribution_size")]
    pub max_contribution_size: u32,

    /// Floor on the momentum a single contribution gives its author.
    #[serde(default = "default_min_momentum_increase")]
    pub min_momentum_increase_per_contribution: f64,

    /// Momentum every author loses per tick.
    #[serde(default = "default_author_momentum_decrease")]
    pub author_momentum_decrease_per_tick: f64,

    /// Upper bound of author momentum.
    #[serde(default = "default_max_author_momentum")]
    pub max_author_momentum: f64,

    /// Upper bound of project size.
    #[serde(default = "default_max_project_size")]
    pub max_project_size: f64,

    /// Size every project loses per tick.
    #[serde(default = "default_project_size_decrease")]
    pub project_size_decrease_per_tick: f64,

    /// Number of recent contributions remembered per author.
    #[serde(default = "default_author_history_len")]
    pub author_history_len: usize,

    /// Distance from the origin at which new projects are placed.
    #[serde(default = "default_project_placement_radius")]
    pub project_placement_radius: f64,

    /// Distance from the origin at which new authors are placed.
    #[serde(default = "default_new_author_radius")]
    pub new_author_radius: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            contribution_lifespan_ms: default_contribution_lifespan_ms(),
            author_inactivity_timeout_ms: default_author_inactivity_timeout_ms(),
            max_contribution_size: default_max_contribution_size(),
            min_momentum_increase_per_contribution: default_min_momentum_increase(),
            author_momentum_decrease_per_tick: default_author_momentum_decrease(),
            max_author_momentum: default_max_author_momentum(),
            max_project_size: default_max_project_size(),
            project_size_decrease_per_tick: default_project_size_decrease(),
            author_history_len: default_author_history_len(),
            project_placement_radius: default_project_placement_radius(),
            new_author_radius: default_new_author_radius(),
        }
    }
}

/// Force and friction constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhysicsConfig {
    /// Pull of every project toward the origin.
    #[serde(default = "default_force_to_center")]
    pub force_to_center: f64,

    /// Pull of an author toward its latest project, per unit of momentum.
    #[serde(default = "default_force_to_project")]
    pub force_to_project: f64,

    /// Radial push on authors inside [`Self::authors_radius`].
    #[serde(default = "default_force_author_away")]
    pub force_author_away: f64,

    /// Authors closer than this to the origin are pushed outward.
    #[serde(default = "default_authors_radius")]
    pub authors_radius: f64,

    /// Repulsion diameter of every author.
    #[serde(default = "default_author_visible_size")]
    pub author_visible_size: f64,

    /// Repulsion diameter of a project at scale 1.
    #[serde(default = "default_project_size_base")]
    pub project_size_base: f64,

    /// Extra clearance kept between bodies.
    #[serde(default = "default_minimum_clearance")]
    pub minimum_clearance: f64,

    /// Repulsion per unit of overlap.
    #[serde(default = "default_repulsion_constant")]
    pub repulsion_constant: f64,

    /// Cap applied to the (negative) repulsion magnitude.
    #[serde(default = "default_max_repulsion")]
    pub max_repulsion: f64,

    /// Speed removed every millisecond, independent of speed.
    #[serde(default = "default_speed_static_friction")]
    pub speed_static_friction: f64,

    /// Fraction of speed removed every tick.
    #[serde(default = "default_speed_dynamic_friction")]
    pub speed_dynamic_friction: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            force_to_center: default_force_to_center(),
            force_to_project: default_force_to_project(),
            force_author_away: default_force_author_away(),
            authors_radius: default_authors_radius(),
            author_visible_size: default_author_visible_size(),
            project_size_base: default_project_size_base(),
            minimum_clearance: default_minimum_clearance(),
            repulsion_constant: default_repulsion_constant(),
            max_repulsion: default_max_repulsion(),
            speed_static_friction: default_speed_static_friction(),
            speed_dynamic_friction: default_speed_dynamic_friction(),
        }
    }
}

/// Event pacing and backpressure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamConfig {
    /// Source milliseconds replayed per simulation millisecond.
    #[serde(default = "default_events_speedup_factor")]
    pub events_speedup_factor: f64,

    /// Events the scheduler keeps requested ahead of consumption.
    #[serde(default = "default_events_buffer_allowance")]
    pub events_buffer_allowance: u64,

    /// Events requested per top-up.
    #[serde(default = "default_events_buffer_chunk_size")]
    pub events_buffer_chunk_size: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            events_speedup_factor: default_events_speedup_factor(),
            events_buffer_allowance: default_events_buffer_allowance(),
            events_buffer_chunk_size: default_events_buffer_chunk_size(),
        }
    }
}

/// Observer server and work directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Work directory holding `config.json`, `events.stream` and `avatars/`.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            work_dir: None,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    20
}

const fn default_contribution_lifespan_ms() -> u64 {
    2000
}

const fn default_author_inactivity_timeout_ms() -> u64 {
    2000
}

const fn default_max_contribution_size() -> u32 {
    100
}

const fn default_min_momentum_increase() -> f64 {
    10.0
}

const fn default_author_momentum_decrease() -> f64 {
    1.0
}

const fn default_max_author_momentum() -> f64 {
    300.0
}

const fn default_max_project_size() -> f64 {
    500.0
}

const fn default_project_size_decrease() -> f64 {
    1.0
}

const fn default_author_history_len() -> usize {
    9
}

const fn default_project_placement_radius() -> f64 {
    500.0
}

const fn default_new_author_radius() -> f64 {
    1500.0
}

const fn default_force_to_center() -> f64 {
    0.005
}

const fn default_force_to_project() -> f64 {
    0.000_05
}

const fn default_force_author_away() -> f64 {
    0.05
}

const fn default_authors_radius() -> f64 {
    1000.0
}

const fn default_author_visible_size() -> f64 {
    200.0
}

const fn default_project_size_base() -> f64 {
    100.0
}

const fn default_minimum_clearance() -> f64 {
    200.0
}

const fn default_repulsion_constant() -> f64 {
    0.001
}

const fn default_max_repulsion() -> f64 {
    0.01
}

const fn default_speed_static_friction() -> f64 {
    0.0
}

const fn default_speed_dynamic_friction() -> f64 {
    0.2
}

/// Ten days of history per second of replay.
const fn default_events_speedup_factor() -> f64 {
    864_000.0
}

const fn default_events_buffer_allowance() -> u64 {
    1000
}

const fn default_events_buffer_chunk_size() -> u64 {
    500
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    4080
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.world.tick_interval_ms, 20);
        assert_eq!(config.world.max_contribution_size, 100);
        assert_eq!(config.stream.events_buffer_allowance, 1000);
        assert_eq!(config.stream.events_buffer_chunk_size, 500);
        assert!((config.stream.events_speedup_factor - 864_000.0).abs() < 1e-6);
        assert_eq!(config.server.port, 4080);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  tick_interval_ms: 40
  contribution_lifespan_ms: 1000
  author_inactivity_timeout_ms: 500
  max_contribution_size: 50
  min_momentum_increase_per_contribution: 5
  author_momentum_decrease_per_tick: 2
  max_author_momentum: 100
  max_project_size: 250
  project_size_decrease_per_tick: 0.5
  author_history_len: 4
  project_placement_radius: 300
  new_author_radius: 900

physics:
  force_to_center: 0.01
  speed_dynamic_friction: 0.1

stream:
  events_speedup_factor: 1000
  events_buffer_allowance: 10
  events_buffer_chunk_size: 5

server:
  host: "127.0.0.1"
  port: 9090
  work_dir: "/srv/swarm"

logging:
  level: "debug"
  json: true
"#;

        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.tick_interval_ms, 40);
        assert_eq!(config.world.author_history_len, 4);
        assert!((config.world.project_size_decrease_per_tick - 0.5).abs() < 1e-12);
        assert!((config.physics.force_to_center - 0.01).abs() < 1e-12);
        // Unset physics keys keep their defaults.
        assert!((config.physics.authors_radius - 1000.0).abs() < 1e-12);
        assert_eq!(config.stream.events_buffer_chunk_size, 5);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.work_dir, Some(PathBuf::from("/srv/swarm")));
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("world:\n  tick_interval_ms: 10\n").unwrap();
        assert_eq!(config.world.tick_interval_ms, 10);
        assert_eq!(config.world.contribution_lifespan_ms, 2000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_empty_yaml() {
        assert_eq!(SimulationConfig::parse("").unwrap(), SimulationConfig::default());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let yaml = include_str!("../../../gitswarm-config.yaml");
        assert_eq!(SimulationConfig::parse(yaml).unwrap(), SimulationConfig::default());
    }

    #[test]
    fn overrides_apply() {
        let env: BTreeMap<&str, &str> =
            [(WORK_DIR_ENV, "/data/work"), (PORT_ENV, "5000")].into_iter().collect();
        let mut config = SimulationConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_owned()));
        assert_eq!(config.server.work_dir, Some(PathBuf::from("/data/work")));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn bad_port_override_is_ignored() {
        let mut config = SimulationConfig::default();
        config.apply_overrides(|key| (key == PORT_ENV).then(|| "not-a-port".to_owned()));
        assert_eq!(config.server.port, 4080);
    }

    #[test]
    fn zero_tick_interval_rejected() {
        let mut config = SimulationConfig::default();
        config.world.tick_interval_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_buffer_allowance_rejected() {
        let mut config = SimulationConfig::default();
        config.stream.events_buffer_allowance = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn friction_out_of_range_rejected() {
        let mut config = SimulationConfig::default();
        config.physics.speed_dynamic_friction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitswarm-config.yaml");
        std::fs::write(&path, "stream:\n  events_buffer_allowance: 42\n").unwrap();
        let config = SimulationConfig::from_file(&path).unwrap();
        assert_eq!(config.stream.events_buffer_allowance, 42);
    }
}
