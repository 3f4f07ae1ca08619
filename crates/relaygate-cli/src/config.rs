//! Relay configuration.
//!
//! Loaded from a TOML file; command-line flags override individual values.
//! The `[[mediators]]`, `[[policies]]` and `[[bridge_routes]]` tables seed a
//! fresh governance state the first time no state file exists.

use std::path::{Path, PathBuf};

use relaygate_types::{Address, ChainId, Selector};
use serde::{Deserialize, Serialize};

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Instance name, used in log output
    pub name: String,
    /// Chain this instance governs
    pub home_chain_id: ChainId,
    /// Borsh snapshot of the governance state
    pub state_path: PathBuf,
    /// Initial holder of the admin role
    pub admin: Address,
    /// Account the guard forwards as
    pub operator: Address,
    pub timelock: TimelockConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub mediators: Vec<MediatorConfig>,
    pub policies: Vec<PolicyConfig>,
    pub bridge_routes: Vec<BridgeRouteConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: "relaygate".to_string(),
            home_chain_id: 1,
            state_path: PathBuf::from("./relaygate-state.bin"),
            admin: Address::repeat_byte(0xad),
            operator: Address::repeat_byte(0x0b),
            timelock: TimelockConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            mediators: Vec::new(),
            policies: Vec::new(),
            bridge_routes: Vec::new(),
        }
    }
}

fn check_path(path: &Path) -> anyhow::Result<()> {
    if path.to_string_lossy().contains("..") {
        anyhow::bail!("Invalid path: directory traversal detected");
    }
    Ok(())
}

impl RelayConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        check_path(path)?;
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: RelayConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        check_path(path)?;
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.home_chain_id == 0 {
            anyhow::bail!("home_chain_id cannot be 0");
        }
        if self.admin.is_zero() {
            anyhow::bail!("admin cannot be the zero address");
        }
        check_path(&self.state_path)?;

        for mediator in &self.mediators {
            if mediator.address.is_zero() {
                anyhow::bail!("mediator for chain {} is the zero address", mediator.chain_id);
            }
        }
        for (i, policy) in self.policies.iter().enumerate() {
            policy
                .selector()
                .map_err(|e| anyhow::anyhow!("policy {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// Timelock the guard forwards to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelockConfig {
    pub address: Address,
    /// Minimum delay between schedule and execute, in seconds
    pub min_delay: u64,
}

impl Default for TimelockConfig {
    fn default() -> Self {
        Self {
            address: Address::repeat_byte(0x71),
            min_delay: 172_800,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive
    pub level: String,
    pub json: bool,
    /// Append logs to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Write the Prometheus text export here after each command
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediatorConfig {
    pub chain_id: ChainId,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub target: Address,
    /// Hex selector (`0xa9059cbb`) or signature (`transfer(address,uint256)`)
    pub selector: String,
    pub chain_id: ChainId,
    #[serde(default = "default_allowed")]
    pub allowed: bool,
}

fn default_allowed() -> bool {
    true
}

impl PolicyConfig {
    pub fn selector(&self) -> anyhow::Result<Selector> {
        parse_selector(&self.selector)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRouteConfig {
    pub entrypoint: Address,
    pub destination_chain: ChainId,
}

/// Accept either a function signature or a hex selector.
pub fn parse_selector(input: &str) -> anyhow::Result<Selector> {
    if input.contains('(') {
        Ok(Selector::from_signature(input)?)
    } else {
        Ok(input.parse()?)
    }
}
