//! Ledger integration.
//!
//! Defines the `Ledger` trait the engine talks to, the transaction draft
//! handed across it, and execution results. The JSON-RPC implementation
//! lives in `rpc`, key handling in `signer`.

pub mod rpc;
pub mod signer;
pub mod transaction;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{CoinObject, FarmError, ObjectId, ObjectReference, SuiAddress};
use signer::Signer;
use transaction::{same_type, ProgrammableTransaction};

// ---------------------------------------------------------------------------
// Drafts and results
// ---------------------------------------------------------------------------

/// A programmable transaction plus the gas settings fixed for one
/// submission. Gas payment objects are selected by the ledger.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub sender: SuiAddress,
    pub programmable: ProgrammableTransaction,
    pub gas_budget: Option<u64>,
    pub gas_price: Option<u64>,
}

impl TransactionDraft {
    pub fn new(sender: SuiAddress, programmable: ProgrammableTransaction) -> Self {
        Self {
            sender,
            programmable,
            gas_budget: None,
            gas_price: None,
        }
    }

    pub fn with_gas(mut self, budget: u64, price: u64) -> Self {
        self.gas_budget = Some(budget);
        self.gas_price = Some(price);
        self
    }
}

/// Gas usage reported by a dry run or an execution, in MIST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GasCost {
    pub computation: u64,
    pub storage: u64,
    pub rebate: u64,
}

/// Headroom applied on top of the dry-run net cost (percent).
pub const FEE_HEADROOM_PCT: u64 = 120;

impl GasCost {
    /// Budget for a submission: `(computation + storage − rebate) × 1.2`,
    /// never below the computation cost.
    pub fn budget(&self) -> u64 {
        let net = (self.computation as u128 + self.storage as u128)
            .saturating_sub(self.rebate as u128);
        let padded = net * FEE_HEADROOM_PCT as u128 / 100;
        u64::try_from(padded)
            .unwrap_or(u64::MAX)
            .max(self.computation)
    }

    /// What the sender actually paid: `computation + storage − rebate`.
    /// Negative when the rebate exceeds the charges.
    pub fn net_charge(&self) -> i128 {
        self.computation as i128 + self.storage as i128 - self.rebate as i128
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure(String),
}

/// A per-owner, per-coin balance delta reported after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceChange {
    /// `None` for changes not owned by an address (shared or object-owned).
    pub owner: Option<SuiAddress>,
    pub coin_type: String,
    pub amount: i128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub digest: String,
    pub status: ExecutionStatus,
    pub balance_changes: Vec<BalanceChange>,
    /// Gas charged to the sender. Already folded into the sender's
    /// native-coin balance change.
    pub gas_used: GasCost,
}

impl ExecutionOutcome {
    /// Net change of `coin_type` for `owner`.
    pub fn delta(&self, owner: SuiAddress, coin_type: &str) -> i128 {
        self.balance_changes
            .iter()
            .filter(|c| c.owner == Some(owner) && same_type(&c.coin_type, coin_type))
            .map(|c| c.amount)
            .sum()
    }

    /// Convert a non-success status into `FarmError::LedgerExecution`.
    pub fn into_success(self) -> Result<Self, FarmError> {
        match &self.status {
            ExecutionStatus::Success => Ok(self),
            ExecutionStatus::Failure(reason) => Err(FarmError::LedgerExecution {
                digest: self.digest.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over the chain.
///
/// Every call is a network round trip; callers must not cache coin sets
/// across submissions because each submission changes them.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Spendable fragments of `coin_type` owned by `owner`.
    async fn spendable_coins(
        &self,
        owner: SuiAddress,
        coin_type: &str,
    ) -> Result<Vec<CoinObject>, FarmError>;

    /// Dry-run the draft and report its gas usage. A dry run that would
    /// abort returns `FarmError::LedgerExecution`.
    async fn estimate_fee(&self, tx: &TransactionDraft) -> Result<GasCost, FarmError>;

    /// Current reference gas price in MIST per unit.
    async fn reference_gas_price(&self) -> Result<u64, FarmError>;

    /// Sign and execute. A returned `Ok` may still carry a failure status.
    async fn submit(
        &self,
        tx: &TransactionDraft,
        signer: &dyn Signer,
    ) -> Result<ExecutionOutcome, FarmError>;

    /// Owned objects of exactly `struct_type`.
    async fn owned_objects(
        &self,
        owner: SuiAddress,
        struct_type: &str,
    ) -> Result<Vec<ObjectReference>, FarmError>;

    /// Timestamp of the most recent transaction sent by `owner` that calls
    /// `package::module::function`.
    async fn last_transaction_calling(
        &self,
        owner: SuiAddress,
        package: ObjectId,
        module: &str,
        function: &str,
    ) -> Result<Option<DateTime<Utc>>, FarmError>;
}

/// Dry-run `draft`, fix its gas budget and price, then submit it.
///
/// The estimate is recomputed on every call: coin merges change the cost
/// of otherwise identical transactions.
pub async fn estimate_and_submit(
    ledger: &dyn Ledger,
    draft: TransactionDraft,
    signer: &dyn Signer,
) -> Result<(ExecutionOutcome, u64), FarmError> {
    let gas = ledger.estimate_fee(&draft).await?;
    let price = ledger.reference_gas_price().await?;
    let budget = gas.budget();
    debug!(
        computation = gas.computation,
        storage = gas.storage,
        rebate = gas.rebate,
        budget,
        price,
        "Gas budget fixed"
    );

    let draft = draft.with_gas(budget, price);
    let outcome = ledger.submit(&draft, signer).await?.into_success()?;
    Ok((outcome, budget))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
