//! Trading accounts.
//!
//! An `Account` pairs a signer with the token-pair jobs configured for it.
//! Accounts are built once per run and never mutated; selection and
//! overrides produce new values.

pub mod ranking;
pub mod summary;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::{AccountConfig, TokenPairConfig};
use crate::ledger::signer::{Ed25519Signer, Signer};
use crate::pools::{self, Pool};
use crate::types::{short_address, FarmError, SuiAddress};

/// Round trips to run against one pool.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPairJob {
    pub pool: &'static Pool,
    /// Per-swap amount in human units of the entry coin. `None` trades the
    /// whole balance.
    pub amount: Option<Decimal>,
    pub rounds: u32,
}

impl TokenPairJob {
    pub fn new(pool_name: &str, amount: Option<Decimal>, rounds: u32) -> Result<Self, FarmError> {
        let pool = pools::lookup(pool_name)?;
        if rounds == 0 {
            return Err(FarmError::Config(format!("{pool_name}: swap_round must be at least 1")));
        }
        if let Some(a) = amount {
            if a <= Decimal::ZERO {
                return Err(FarmError::Config(format!("{pool_name}: amount must be positive, got {a}")));
            }
        }
        Ok(Self { pool, amount, rounds })
    }

    fn from_config(cfg: &TokenPairConfig) -> Result<Self, FarmError> {
        Self::new(&cfg.pool, cfg.amount, cfg.swap_round)
    }
}

#[derive(Clone)]
pub struct Account {
    pub nickname: Option<String>,
    pub signer: Arc<dyn Signer>,
    pub jobs: Vec<TokenPairJob>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("nickname", &self.nickname)
            .field("address", &self.address())
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl Account {
    pub fn new(nickname: Option<String>, signer: Arc<dyn Signer>, jobs: Vec<TokenPairJob>) -> Self {
        Self { nickname, signer, jobs }
    }

    /// Build from configuration, resolving the secret and every pool name.
    pub fn from_config(cfg: &AccountConfig) -> Result<Self> {
        let label = cfg.nickname.as_deref().unwrap_or("<unnamed>");
        let secret = cfg
            .resolve_secret()
            .with_context(|| format!("Account {label}: no usable secret"))?;
        let signer = Ed25519Signer::from_secret(&secret)
            .with_context(|| format!("Account {label}: invalid secret"))?;
        let jobs = cfg
            .token_pairs
            .iter()
            .map(TokenPairJob::from_config)
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Account {label}: invalid token pair"))?;

        Ok(Self::new(cfg.nickname.clone(), Arc::new(signer), jobs))
    }

    pub fn address(&self) -> SuiAddress {
        self.signer.address()
    }

    /// Nickname, or the abbreviated address.
    pub fn label(&self) -> String {
        match &self.nickname {
            Some(n) if !n.is_empty() => n.clone(),
            _ => short_address(&self.address()),
        }
    }
}

/// Restrict a run to one account, optionally replacing its jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSelection {
    /// 1-based, matching the summary table.
    pub index: usize,
    pub job: Option<TokenPairJob>,
}

pub fn select_accounts(
    accounts: &[Account],
    selection: Option<&AccountSelection>,
) -> Result<Vec<Account>, FarmError> {
    let Some(sel) = selection else {
        return Ok(accounts.to_vec());
    };

    let account = sel
        .index
        .checked_sub(1)
        .and_then(|i| accounts.get(i))
        .ok_or_else(|| {
            FarmError::Config(format!(
                "account index {} out of range (1..={})",
                sel.index,
                accounts.len()
            ))
        })?;

    let mut chosen = account.clone();
    if let Some(job) = &sel.job {
        chosen.jobs = vec![job.clone()];
    }
    Ok(vec![chosen])
}
