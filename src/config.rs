//! Configuration loading: a JSON config file whose values fall back to environment
//! variables, then to hard-coded defaults — the same layering `x402-rs` uses for its
//! facilitator server, adapted here for a single EIP-1559 adapter instance.

use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::chain::eip155::Eip155AdapterConfig;

/// CLI arguments accepted by binaries embedding this crate.
#[derive(Parser, Debug)]
#[command(name = "chainadapter-core")]
#[command(about = "ChainAdapter core configuration loader")]
pub struct CliArgs {
    /// Path to the JSON configuration file.
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    pub config: PathBuf,
}

/// A transparent wrapper that resolves environment variables during deserialization.
///
/// Supports both literal values and environment variable references:
/// - Literal: `"https://eth.llamarpc.com"`
/// - Simple env var: `"$ETH_RPC_URL"`
/// - Braced env var: `"${ETH_RPC_URL}"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    fn parse_env_var_syntax(s: &str) -> Option<String> {
        if let Some(inner) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            Some(inner.to_string())
        } else if let Some(var_name) = s.strip_prefix('$')
            && !var_name.is_empty()
            && var_name.chars().all(|c| c.is_alphanumeric() || c == '_')
        {
            Some(var_name.to_string())
        } else {
            None
        }
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = if let Some(var_name) = Self::parse_env_var_syntax(&s) {
            std::env::var(&var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "environment variable '{var_name}' not found (referenced as '{s}')"
                ))
            })?
        } else {
            s
        };
        value
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(|e| serde::de::Error::custom(format!("failed to parse value: {e}")))
    }
}

impl<T: Serialize> Serialize for LiteralOrEnv<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// One RPC endpoint entry, in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: LiteralOrEnv<Url>,
}

/// On-disk configuration for one EIP-1559 adapter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eip155Config {
    /// CAIP-2-style chain slug, e.g. `"ethereum"`.
    #[serde(default = "eip155_config_defaults::default_chain_id")]
    pub chain_id: String,
    #[serde(default = "eip155_config_defaults::default_network_id")]
    pub network_id: u64,
    #[serde(default = "eip155_config_defaults::default_native_asset_symbol")]
    pub native_asset_symbol: String,
    #[serde(default = "eip155_config_defaults::default_max_memo_length")]
    pub max_memo_length: usize,
    #[serde(default = "eip155_config_defaults::default_min_confirmations")]
    pub min_confirmations: u64,
    pub endpoints: Vec<EndpointConfig>,
}

mod eip155_config_defaults {
    pub fn default_chain_id() -> String {
        "ethereum".to_string()
    }
    pub fn default_network_id() -> u64 {
        1
    }
    pub fn default_native_asset_symbol() -> String {
        "ETH".to_string()
    }
    pub fn default_max_memo_length() -> usize {
        256
    }
    pub fn default_min_confirmations() -> u64 {
        12
    }
}

impl Eip155Config {
    pub fn endpoint_urls(&self) -> Vec<Url> {
        self.endpoints.iter().map(|e| e.url.clone().into_inner()).collect()
    }

    pub fn adapter_config(&self) -> Eip155AdapterConfig {
        Eip155AdapterConfig {
            chain_id: crate::chain::ChainId::new(self.chain_id.clone()),
            network_id: self.network_id,
            native_asset_symbol: self.native_asset_symbol.clone(),
            max_memo_length: self.max_memo_length,
            min_confirmations: self.min_confirmations,
        }
    }
}

/// Top-level configuration file shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub eip155: Vec<Eip155Config>,
}

/// Errors from loading or parsing a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    /// Loads configuration from the `--config`/`CONFIG`-selected JSON file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        Self::load_from_path(&cli_args.config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_or_env_resolves_literal_value() {
        let json = serde_json::json!("https://eth.llamarpc.com");
        let parsed: LiteralOrEnv<Url> = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.into_inner().as_str(), "https://eth.llamarpc.com/");
    }

    #[test]
    fn literal_or_env_resolves_braced_env_var() {
        unsafe {
            std::env::set_var("CHAINADAPTER_TEST_RPC_URL", "https://example.org/rpc");
        }
        let json = serde_json::json!("${CHAINADAPTER_TEST_RPC_URL}");
        let parsed: LiteralOrEnv<Url> = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.into_inner().as_str(), "https://example.org/rpc");
    }

    #[test]
    fn literal_or_env_errors_on_missing_env_var() {
        let json = serde_json::json!("$CHAINADAPTER_DOES_NOT_EXIST");
        let parsed: Result<LiteralOrEnv<Url>, _> = serde_json::from_value(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn eip155_config_applies_defaults() {
        let json = serde_json::json!({
            "endpoints": [{"url": "https://eth.llamarpc.com"}],
        });
        let config: Eip155Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.chain_id, "ethereum");
        assert_eq!(config.min_confirmations, 12);
        assert_eq!(config.native_asset_symbol, "ETH");
    }
}
