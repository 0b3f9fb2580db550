//! Layered configuration for the deployment tasks.
//!
//! Values are resolved in this order, later layers winning:
//! built-in defaults, `Timelock.toml`, then `TIMELOCK_*` environment variables
//! (`__` separates nested keys, e.g. `TIMELOCK_NETWORKS__SEPOLIA__RPC_URL`).

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "Timelock.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "TIMELOCK_";

/// Name of the built-in local development network.
pub const LOCALHOST_NETWORK: &str = "localhost";

/// Default RPC endpoint of the local development network.
pub const LOCALHOST_RPC_URL: &str = "http://127.0.0.1:8545";

/// The well-known development mnemonic used by local nodes (anvil, hardhat).
pub const DEV_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Default number of accounts derived from a mnemonic.
pub const DEFAULT_MNEMONIC_COUNT: u32 = 10;

/// Default Etherscan v2 API endpoint. The chain is selected with the `chainid` query parameter.
pub const ETHERSCAN_V2_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Network used when none is given on the command line.
    pub default_network: String,
    /// Contract project layout and compiler settings.
    pub project: ProjectConfig,
    /// Known networks, by name.
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl Default for TasksConfig {
    fn default() -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(LOCALHOST_NETWORK.to_string(), NetworkConfig::localhost());

        Self {
            default_network: LOCALHOST_NETWORK.to_string(),
            project: ProjectConfig::default(),
            networks,
        }
    }
}

/// Contract project layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Root of the contract project (where `foundry.toml` lives).
    ///
    /// A relative root is resolved against the directory of the loaded config file.
    pub root: PathBuf,
    /// Artifacts directory, relative to `root`.
    pub out: PathBuf,
    /// Compiler executable.
    pub forge: String,
    /// Extra arguments passed to `forge build`.
    #[serde(default)]
    pub build_args: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            out: PathBuf::from("out"),
            forge: "forge".to_string(),
            build_args: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Absolute or root-relative path of the artifacts directory.
    pub fn out_dir(&self) -> PathBuf {
        self.root.join(&self.out)
    }
}

/// A single network the tasks can run against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Expected chain id. Checked against the node when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Accounts available on this network.
    pub accounts: AccountsConfig,
    /// Block explorer used for source verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer: Option<ExplorerConfig>,
}

impl NetworkConfig {
    /// The built-in local development network.
    pub fn localhost() -> Self {
        Self {
            rpc_url: Url::parse(LOCALHOST_RPC_URL).expect("static url is valid"),
            chain_id: None,
            accounts: AccountsConfig::Mnemonic {
                mnemonic: DEV_MNEMONIC.to_string(),
                count: DEFAULT_MNEMONIC_COUNT,
            },
            explorer: None,
        }
    }
}

/// How the signing accounts of a network are provided.
///
/// `PrivateKeys` is tried first so that keys set over the built-in mnemonic
/// (layers are merged key by key) take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountsConfig {
    /// Raw hex private keys.
    PrivateKeys { private_keys: Vec<String> },
    /// Accounts derived from a BIP-39 mnemonic on the standard Ethereum path.
    Mnemonic {
        mnemonic: String,
        #[serde(default = "default_mnemonic_count")]
        count: u32,
    },
}

fn default_mnemonic_count() -> u32 {
    DEFAULT_MNEMONIC_COUNT
}

/// An Etherscan-compatible block explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// API endpoint.
    #[serde(default = "default_explorer_api_url")]
    pub api_url: Url,
    /// API key.
    pub api_key: String,
    /// Human-facing explorer URL, used to print a link to the verified contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<Url>,
}

fn default_explorer_api_url() -> Url {
    Url::parse(ETHERSCAN_V2_API_URL).expect("static url is valid")
}

impl TasksConfig {
    /// Build the configuration figment for the given file.
    ///
    /// A missing file is not an error: defaults and the environment still apply.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration.
    ///
    /// `path` may point to a file or to a directory containing [`CONFIG_FILENAME`].
    pub fn load(path: &Path) -> Result<Self> {
        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let mut config: Self = Self::figment(&config_path)
            .extract()
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

        if let Some(dir) = config_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            config.project.root = dir.join(&config.project.root);
        }

        tracing::debug!(
            path = %config_path.display(),
            root = %config.project.root.display(),
            networks = ?config.networks.keys().collect::<Vec<_>>(),
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Look up a network by name.
    pub fn network(&self, name: &str) -> Result<&NetworkConfig> {
        self.networks.get(name).with_context(|| {
            format!(
                "Unknown network '{}'. Known networks: {}",
                name,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }
}
