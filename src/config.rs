//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Account secrets are either referenced by env-var name (`secret_env`,
//! preferred) or inlined (`secret`), and are held as `SecretString`.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::pacing::PacingWindow;
use crate::ledger::rpc::DEFAULT_RPC_URL;
use crate::pools;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub shuffle_accounts: bool,
    #[serde(default)]
    pub shuffle_token_pairs: bool,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub ranking: Option<RankingConfig>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Delay windows in seconds, `[min, max]` inclusive.
#[derive(Debug, Deserialize, Clone)]
pub struct PacingConfig {
    pub leg_delay_secs: [u64; 2],
    pub cycle_delay_secs: [u64; 2],
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            leg_delay_secs: [10, 60],
            cycle_delay_secs: [10, 60],
        }
    }
}

impl PacingConfig {
    pub fn leg_window(&self) -> Result<PacingWindow> {
        let [min, max] = self.leg_delay_secs;
        PacingWindow::from_secs(min, max).context("Invalid pacing.leg_delay_secs")
    }

    pub fn cycle_window(&self) -> Result<PacingWindow> {
        let [min, max] = self.cycle_delay_secs;
        PacingWindow::from_secs(min, max).context("Invalid pacing.cycle_delay_secs")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    #[serde(default)]
    pub nickname: Option<String>,
    /// Name of the environment variable holding the secret.
    #[serde(default)]
    pub secret_env: Option<String>,
    /// Inline secret. Prefer `secret_env`.
    #[serde(default)]
    pub secret: Option<SecretString>,
    #[serde(default)]
    pub token_pairs: Vec<TokenPairConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenPairConfig {
    pub pool: String,
    /// Human units of the pool's entry coin; absent means full balance.
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default = "default_swap_round")]
    pub swap_round: u32,
}

fn default_swap_round() -> u32 {
    1
}

impl AccountConfig {
    /// `secret_env` wins over an inline `secret`.
    pub fn resolve_secret(&self) -> Result<SecretString> {
        match (&self.secret_env, &self.secret) {
            (Some(env), _) => Ok(SecretString::new(AppConfig::resolve_env(env)?)),
            (None, Some(secret)) => Ok(secret.clone()),
            (None, None) => bail!("neither secret_env nor secret is set"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that need no secrets and no network.
    pub fn validate(&self) -> Result<()> {
        if self.rpc.url.trim().is_empty() {
            bail!("rpc.url is empty");
        }
        self.pacing.leg_window()?;
        self.pacing.cycle_window()?;

        for (i, account) in self.accounts.iter().enumerate() {
            let label = account
                .nickname
                .clone()
                .unwrap_or_else(|| format!("#{}", i + 1));
            if account.secret_env.is_none() && account.secret.is_none() {
                bail!("Account {label}: set secret_env or secret");
            }
            for pair in &account.token_pairs {
                pools::lookup(&pair.pool).with_context(|| format!("Account {label}"))?;
                if pair.swap_round == 0 {
                    bail!("Account {label}, pool {}: swap_round must be at least 1", pair.pool);
                }
                if matches!(pair.amount, Some(a) if a <= Decimal::ZERO) {
                    bail!("Account {label}, pool {}: amount must be positive", pair.pool);
                }
            }
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
