//! Yield claim: collect pending rewards and fees for the first liquidity
//! position the account owns in the SUI/USDC pool.

use tracing::debug;

use crate::ledger::signer::Signer;
use crate::ledger::transaction::{nested, parse_type, ProgrammableTransaction, PtbBuilder, TypeTag};
use crate::ledger::{estimate_and_submit, Ledger, TransactionDraft};
use crate::pools::{self, coins, PoolTag, CLOCK, MARKET_CONFIG, TRADE_PACKAGE};
use crate::types::{short_address, FarmError, ObjectReference, SuiAddress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub digest: String,
    pub position: ObjectReference,
    pub gas_budget: u64,
}

/// Move type of liquidity position objects.
pub fn position_type() -> String {
    format!("{TRADE_PACKAGE}::position::Position")
}

pub fn build_claim(
    position: ObjectReference,
    recipient: SuiAddress,
) -> Result<ProgrammableTransaction, FarmError> {
    let pool = pools::by_tag(PoolTag::SuiUsdc);
    let sui = parse_type(coins::SUI.type_tag)?;
    let usdc = parse_type(coins::USDC.type_tag)?;

    let mut tx = PtbBuilder::new();
    let pool_ref = tx.shared_object(pool.shared_ref());
    let lp = tx.owned_object(position);
    let clock = tx.shared_object(CLOCK);
    let market = tx.shared_object(MARKET_CONFIG);
    let recipient = tx.pure(&recipient)?;

    let reward = |tx: &mut PtbBuilder, reward_type: TypeTag| {
        tx.move_call(
            TRADE_PACKAGE,
            "collect",
            "reward",
            vec![sui.clone(), usdc.clone(), reward_type],
            vec![pool_ref, lp, clock, market],
        )
    };
    let reward_sui = reward(&mut tx, sui.clone())?;
    let reward_usdc = reward(&mut tx, usdc.clone())?;
    tx.transfer_objects(vec![nested(reward_sui, 0), nested(reward_usdc, 0)], recipient);

    let fee = tx.move_call(
        TRADE_PACKAGE,
        "collect",
        "fee",
        vec![sui, usdc],
        vec![pool_ref, lp, clock, market],
    )?;
    tx.transfer_objects(vec![nested(fee, 0), nested(fee, 1)], recipient);

    Ok(tx.finish())
}

/// Find the position, build the claim and submit it.
pub async fn claim_pending_yield(
    ledger: &dyn Ledger,
    signer: &dyn Signer,
) -> Result<ClaimReceipt, FarmError> {
    let owner = signer.address();
    let positions = ledger.owned_objects(owner, &position_type()).await?;
    let position = positions
        .into_iter()
        .next()
        .ok_or_else(|| FarmError::PositionNotFound(owner.to_string()))?;

    let draft = TransactionDraft::new(owner, build_claim(position.clone(), owner)?);
    let (outcome, gas_budget) = estimate_and_submit(ledger, draft, signer).await?;

    debug!(
        owner = %short_address(&owner),
        position = %position.object_id(),
        digest = %outcome.digest,
        "Yield claimed"
    );

    Ok(ClaimReceipt {
        digest: outcome.digest,
        position,
        gas_budget,
    })
}
