//! Yield claim against the in-memory ledger.

use secrecy::SecretString;

use flashvol::engine::yield_claim::claim_pending_yield;
use flashvol::ledger::signer::{Ed25519Signer, Signer};
use flashvol::ledger::transaction::command_labels;
use flashvol::types::{parse_object_id, FarmError, ObjectDigest, ObjectReference};

use crate::mock_ledger::{MockLedger, GAS};

fn signer() -> Ed25519Signer {
    Ed25519Signer::from_secret(&SecretString::new(format!("0x{}", "09".repeat(32)))).unwrap()
}

#[tokio::test]
async fn test_claim_submits_one_transaction() {
    let ledger = MockLedger::new();
    let position = ObjectReference::new(parse_object_id("0x5150").unwrap(), 12, ObjectDigest::new([3; 32]));
    ledger.add_position(position.clone());
    let signer = signer();

    let receipt = claim_pending_yield(&ledger, &signer).await.unwrap();
    assert_eq!(receipt.position, position);
    assert_eq!(receipt.gas_budget, GAS.budget());

    let subs = ledger.submissions();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].sender, signer.address());
    assert_eq!(
        command_labels(&subs[0].programmable),
        vec!["collect::reward", "collect::reward", "TransferObjects", "collect::fee", "TransferObjects"]
    );
}

#[tokio::test]
async fn test_claim_without_position_submits_nothing() {
    let ledger = MockLedger::new();
    let signer = signer();

    let err = claim_pending_yield(&ledger, &signer).await.unwrap_err();
    assert!(matches!(err, FarmError::PositionNotFound(_)));
    assert!(ledger.submissions().is_empty());
    assert_eq!(ledger.estimate_count(), 0);
}
