//! End-to-end batch scenarios against the in-memory ledger.

use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use flashvol::account::{Account, TokenPairJob};
use flashvol::config::AppConfig;
use flashvol::engine::batch::{BatchOptions, BatchOrchestrator, BatchReport};
use flashvol::engine::cycle::{CycleOutcome, TradeCycleEngine};
use flashvol::engine::events::{ChannelSink, LegKind, TradeEvent};
use flashvol::engine::pacing::PacingWindow;
use flashvol::ledger::signer::{Ed25519Signer, Signer};
use flashvol::ledger::transaction::{command_labels, Argument, Command};
use flashvol::pools::{self, coins};
use flashvol::types::SuiAddress;

use crate::mock_ledger::{MockLedger, RecordingPacer, GAS, GAS_PRICE};

fn signer(byte: u8) -> Arc<Ed25519Signer> {
    let hex = format!("0x{}", format!("{byte:02x}").repeat(32));
    Arc::new(Ed25519Signer::from_secret(&SecretString::new(hex)).unwrap())
}

fn account(name: &str, byte: u8, jobs: Vec<TokenPairJob>) -> Account {
    Account::new(Some(name.to_string()), signer(byte), jobs)
}

struct Harness {
    ledger: Arc<MockLedger>,
    pacer: Arc<RecordingPacer>,
    events: UnboundedReceiver<TradeEvent>,
    orchestrator: BatchOrchestrator,
}

fn leg_window() -> PacingWindow {
    PacingWindow::from_secs(10, 60).unwrap()
}

fn cycle_window() -> PacingWindow {
    PacingWindow::from_secs(1, 5).unwrap()
}

fn harness(ledger: MockLedger) -> Harness {
    let ledger = Arc::new(ledger);
    let pacer = Arc::new(RecordingPacer::default());
    let (sink, events) = ChannelSink::new();
    let sink = Arc::new(sink);
    let engine = TradeCycleEngine::new(ledger.clone(), pacer.clone(), sink.clone(), leg_window());
    let orchestrator = BatchOrchestrator::new(
        engine,
        pacer.clone(),
        sink,
        BatchOptions {
            shuffle_accounts: false,
            shuffle_token_pairs: false,
            cycle_delay: cycle_window(),
        },
    );
    Harness {
        ledger,
        pacer,
        events,
        orchestrator,
    }
}

fn drain(rx: &mut UnboundedReceiver<TradeEvent>) -> Vec<TradeEvent> {
    let mut out = Vec::new();
    while let Ok(e) = rx.try_recv() {
        out.push(e);
    }
    out
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_reverse_leg_sells_exactly_the_forward_output() {
    let trader = signer(1);
    let ledger = MockLedger::new();
    ledger.fund(trader.address(), coins::SUI, &[5_000_000_000]);
    let mut h = harness(ledger);

    let pool = pools::lookup("SUI_USDC").unwrap();
    let job = TokenPairJob::new("SUI_USDC", Some(dec!(0.001)), 1).unwrap();
    let report = h
        .orchestrator
        .run_batch(&[Account::new(Some("main".into()), trader.clone(), vec![job])])
        .await;

    assert_eq!(
        report,
        BatchReport {
            accounts: 1,
            cycles_completed: 1,
            cycles_failed: 0,
            cycles_skipped: 0
        }
    );

    let subs = h.ledger.submissions();
    assert_eq!(subs.len(), 2);

    let forward = MockLedger::decode_swap(&subs[0].programmable).unwrap();
    assert_eq!(forward.quantity, 1_000_000);
    assert!(forward.a2b);
    assert_eq!(forward.source, coins::SUI);
    assert_eq!(forward.parameter, pool.parameter);

    let reverse = MockLedger::decode_swap(&subs[1].programmable).unwrap();
    assert_eq!(reverse.quantity, 480_000);
    assert!(!reverse.a2b);
    assert_eq!(reverse.source, coins::USDC);
    assert_eq!(reverse.parameter, pool.reverse_parameter);

    // one leg-window pause between the legs, no cycle pause before the first cycle
    assert_eq!(*h.pacer.windows.lock().unwrap(), vec![leg_window()]);

    let legs: Vec<_> = drain(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            TradeEvent::LegCompleted { leg, amount_in, amount_out, .. } => Some((leg, amount_in, amount_out)),
            _ => None,
        })
        .collect();
    assert_eq!(
        legs,
        vec![
            (LegKind::Forward, dec!(0.001), dec!(0.48)),
            (LegKind::Reverse, dec!(0.48), dec!(0.00096)),
        ]
    );
}

#[tokio::test]
async fn test_gas_is_estimated_before_every_submission() {
    let trader = signer(2);
    let ledger = MockLedger::new();
    ledger.fund(trader.address(), coins::USDC, &[3_000_000, 2_000_000]);
    let h = harness(ledger);

    let job = TokenPairJob::new("USDC_USDT", Some(dec!(1)), 2).unwrap();
    h.orchestrator
        .run_batch(&[Account::new(None, trader.clone(), vec![job])])
        .await;

    let subs = h.ledger.submissions();
    assert_eq!(subs.len(), 4);
    assert_eq!(h.ledger.estimate_count(), 4);
    for draft in &subs {
        assert_eq!(draft.gas_budget, Some(GAS.budget()));
        assert_eq!(draft.gas_price, Some(GAS_PRICE));
        assert_eq!(draft.sender, trader.address());
    }

    // entry leg of USDT_USDC spends USDC (B -> A)
    let first = MockLedger::decode_swap(&subs[0].programmable).unwrap();
    assert!(!first.a2b);
    assert_eq!(first.source, coins::USDC);
    assert_eq!(first.quantity, 1_000_000);
    // first leg merged the two USDC fragments before splitting
    assert_eq!(command_labels(&subs[0].programmable)[0], "MergeCoins");

    // leg, cycle, leg
    assert_eq!(
        *h.pacer.windows.lock().unwrap(),
        vec![leg_window(), cycle_window(), leg_window()]
    );
}

#[tokio::test]
async fn test_full_balance_sui_is_capped() {
    let trader = signer(3);
    let ledger = MockLedger::new();
    ledger.fund(trader.address(), coins::SUI, &[4_000_000_000, 6_000_000_000]);
    let h = harness(ledger);

    let job = TokenPairJob::new("SUI_USDC", None, 1).unwrap();
    h.orchestrator
        .run_batch(&[Account::new(None, trader.clone(), vec![job])])
        .await;

    let subs = h.ledger.submissions();
    let forward = MockLedger::decode_swap(&subs[0].programmable).unwrap();
    assert_eq!(forward.quantity, 9_000_000_000);
    // SUI is split from the gas coin, never merged
    assert_eq!(command_labels(&subs[0].programmable)[0], "SplitCoins");
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_insufficient_balance_skips_job_without_submitting() {
    let trader = signer(4);
    let ledger = MockLedger::new();
    ledger.fund(trader.address(), coins::USDC, &[1_000_000]);
    let mut h = harness(ledger);

    let job = TokenPairJob::new("USDC_USDT", Some(dec!(5)), 3).unwrap();
    let report = h
        .orchestrator
        .run_batch(&[Account::new(None, trader.clone(), vec![job])])
        .await;

    assert_eq!(report.cycles_skipped, 3);
    assert_eq!(report.cycles_completed, 0);
    assert!(h.ledger.submissions().is_empty());
    assert_eq!(h.ledger.estimate_count(), 0);
    assert_eq!(h.ledger.balance(trader.address(), coins::USDC), 1_000_000);

    let skipped = drain(&mut h.events).into_iter().find_map(|e| match e {
        TradeEvent::CycleSkipped { rounds_skipped, reason, .. } => Some((rounds_skipped, reason)),
        _ => None,
    });
    let (rounds, reason) = skipped.unwrap();
    assert_eq!(rounds, 3);
    assert!(reason.contains("requested 5000000, available 1000000"));
}

#[tokio::test]
async fn test_forward_failure_does_not_stop_later_jobs() {
    let trader = signer(5);
    let ledger = MockLedger::new();
    ledger.fund(trader.address(), coins::USDC, &[10_000_000]);
    ledger.fund(trader.address(), coins::SUI, &[10_000_000_000]);
    ledger.fail_submission(0);
    let mut h = harness(ledger);

    let jobs = vec![
        TokenPairJob::new("USDC_USDT", Some(dec!(2)), 1).unwrap(),
        TokenPairJob::new("SUI_USDC", Some(dec!(1)), 1).unwrap(),
    ];
    let report = h.orchestrator.run_batch(&[account("main", 5, jobs)]).await;

    assert_eq!(report.cycles_failed, 1);
    assert_eq!(report.cycles_completed, 1);
    // failed forward leg, then both legs of the SUI job
    assert_eq!(h.ledger.submissions().len(), 3);

    let events = drain(&mut h.events);
    let failure = events.iter().find_map(|e| match e {
        TradeEvent::CycleFailed { leg, source, destination, reason, .. } => {
            Some((*leg, *source, *destination, reason.clone()))
        }
        _ => None,
    });
    let (leg, source, destination, reason) = failure.unwrap();
    assert_eq!(leg, Some(LegKind::Forward));
    assert_eq!((source, destination), ("USDC", "USDT"));
    assert!(reason.contains("digest-0"));
    assert!(matches!(events.last(), Some(TradeEvent::BatchFinished { completed: 1, failed: 1, skipped: 0 })));
}

#[tokio::test]
async fn test_reverse_failure_leaves_proceeds_with_account() {
    let trader = signer(6);
    let ledger = MockLedger::new();
    ledger.fund(trader.address(), coins::USDC, &[2_000_000]);
    ledger.fail_submission(1);
    let ledger = Arc::new(ledger);
    let pacer = Arc::new(RecordingPacer::default());
    let (sink, _rx) = ChannelSink::new();
    let engine = TradeCycleEngine::new(ledger.clone(), pacer, Arc::new(sink), PacingWindow::zero());

    let pool = pools::lookup("USDC_USDT").unwrap();
    let outcome = engine
        .run_cycle("acct", trader.as_ref(), pool, Some(dec!(1)))
        .await
        .unwrap();

    match outcome {
        CycleOutcome::ReverseFailed { forward, reason } => {
            assert_eq!(forward.realized, 990_000);
            assert!(reason.contains("MoveAbort"));
        }
        other => panic!("expected ReverseFailed, got {other:?}"),
    }
    assert_eq!(ledger.balance(trader.address(), coins::USDT), 990_000);
    assert_eq!(ledger.balance(trader.address(), coins::USDC), 1_000_000);
}

#[tokio::test]
async fn test_accounts_run_in_order_with_cycle_pauses_between() {
    let a = signer(7);
    let b = signer(8);
    let ledger = MockLedger::new();
    ledger.fund(a.address(), coins::USDC, &[5_000_000]);
    ledger.fund(b.address(), coins::USDC, &[5_000_000]);
    let mut h = harness(ledger);

    let job = || vec![TokenPairJob::new("USDT_USDC", Some(dec!(1)), 1).unwrap()];
    let accounts = [
        Account::new(Some("a".into()), a.clone(), job()),
        Account::new(Some("b".into()), b.clone(), job()),
    ];
    let report = h.orchestrator.run_batch(&accounts).await;
    assert_eq!(report.cycles_completed, 2);

    let senders: Vec<SuiAddress> = h.ledger.submissions().iter().map(|d| d.sender).collect();
    assert_eq!(senders, vec![a.address(), a.address(), b.address(), b.address()]);

    let started: Vec<String> = drain(&mut h.events)
        .into_iter()
        .filter_map(|e| match e {
            TradeEvent::AccountStarted { account, .. } => Some(account),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec!["a", "b"]);
    assert_eq!(
        *h.pacer.windows.lock().unwrap(),
        vec![leg_window(), cycle_window(), leg_window()]
    );
}

#[tokio::test]
async fn test_gas_charged_to_sui_does_not_hide_sui_proceeds() {
    let trader = signer(9);
    let ledger = MockLedger::new().with_gas_charging();
    ledger.fund(trader.address(), coins::SUI, &[1_000_000_000]);
    let ledger = Arc::new(ledger);
    let pacer = Arc::new(RecordingPacer::default());
    let (sink, _rx) = ChannelSink::new();
    let engine = TradeCycleEngine::new(ledger.clone(), pacer, Arc::new(sink), PacingWindow::zero());

    let pool = pools::lookup("SUI_USDC").unwrap();
    let outcome = engine
        .run_cycle("acct", trader.as_ref(), pool, Some(dec!(0.001)))
        .await
        .unwrap();

    // the reverse leg credits 960_000 MIST while paying 2_000_000 in gas
    match outcome {
        CycleOutcome::Completed { forward, reverse } => {
            assert_eq!(forward.source_delta, -1_000_000);
            assert_eq!(forward.realized, 480_000);
            assert_eq!(reverse.requested, 480_000);
            assert_eq!(reverse.realized, 960_000);
            assert_eq!(reverse.destination_delta, 960_000);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    let gas = GAS.net_charge() as u64;
    assert_eq!(
        ledger.balance(trader.address(), coins::SUI),
        1_000_000_000 - 1_000_000 + 960_000 - 2 * gas
    );
    assert_eq!(ledger.balance(trader.address(), coins::USDC), 0);
}

// ---------------------------------------------------------------------------
// Worked example
// ---------------------------------------------------------------------------

/// The trailing `TransferObjects` pair returns the split trade coin, then
/// the proceeds.
fn assert_returns_split_remainder(draft: &flashvol::ledger::TransactionDraft) {
    let ptb = &draft.programmable;
    let split = command_labels(ptb)
        .iter()
        .position(|l| l == "SplitCoins")
        .unwrap() as u16;
    let n = ptb.commands.len();
    match (&ptb.commands[n - 2], &ptb.commands[n - 1]) {
        (Command::TransferObjects(remainder), Command::TransferObjects(proceeds)) => {
            assert_eq!(remainder.objects, vec![Argument::NestedResult(split, 0)]);
            assert_eq!(proceeds.objects.len(), 1);
            assert_ne!(proceeds.objects, remainder.objects);
        }
        _ => panic!("expected two trailing transfers"),
    }
}

#[tokio::test]
async fn test_round_trip_of_half_the_entry_balance() {
    // 1_000_000 of the entry coin held, none of the other side; the
    // forward leg realizes 480_000 and the reverse sells exactly that.
    let trader = signer(10);
    let ledger = MockLedger::new().with_rate("USDC", "USDT", 96, 100);
    ledger.fund(trader.address(), coins::USDC, &[1_000_000]);
    let h = harness(ledger);

    let job = TokenPairJob::new("USDT_USDC", Some(dec!(0.5)), 1).unwrap();
    let report = h
        .orchestrator
        .run_batch(&[Account::new(None, trader.clone(), vec![job])])
        .await;
    assert_eq!(report.cycles_completed, 1);

    let subs = h.ledger.submissions();
    assert_eq!(subs.len(), 2);
    let forward = MockLedger::decode_swap(&subs[0].programmable).unwrap();
    assert_eq!((forward.source, forward.quantity), (coins::USDC, 500_000));
    let reverse = MockLedger::decode_swap(&subs[1].programmable).unwrap();
    assert_eq!((reverse.source, reverse.quantity), (coins::USDT, 480_000));

    let reverse_proceeds = 480_000 * 99 / 100;
    assert_eq!(
        h.ledger.balance(trader.address(), coins::USDC),
        500_000 + reverse_proceeds
    );
    assert_eq!(h.ledger.balance(trader.address(), coins::USDT), 0);

    for draft in &subs {
        assert_returns_split_remainder(draft);
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const CONFIG_WITH_UNKNOWN_POOL: &str = r#"
[[accounts]]
nickname = "main"
secret = "0x0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b0b"

  [[accounts.token_pairs]]
  pool = "SUI_USDC"
  amount = 0.001

  [[accounts.token_pairs]]
  pool = "X_Y"
"#;

/// Config to accounts to batch, the way the binary wires it.
async fn load_and_run(contents: &str, orchestrator: &BatchOrchestrator) -> anyhow::Result<BatchReport> {
    let config = AppConfig::from_toml(contents)?;
    let accounts = config
        .accounts
        .iter()
        .map(Account::from_config)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(orchestrator.run_batch(&accounts).await)
}

#[tokio::test]
async fn test_unknown_pool_in_config_stops_before_the_batch() {
    let trader = signer(11);
    let ledger = MockLedger::new();
    ledger.fund(trader.address(), coins::SUI, &[5_000_000_000]);
    let mut h = harness(ledger);

    let err = load_and_run(CONFIG_WITH_UNKNOWN_POOL, &h.orchestrator)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("X_Y"));

    // account construction refuses the pool on its own as well
    let raw: AppConfig = toml::from_str(CONFIG_WITH_UNKNOWN_POOL).unwrap();
    let err = Account::from_config(&raw.accounts[0]).unwrap_err();
    assert!(format!("{err:#}").contains("Pool not found: X_Y"));

    // the valid SUI_USDC job never ran either
    assert!(drain(&mut h.events).is_empty());
    assert!(h.ledger.submissions().is_empty());
    assert_eq!(h.ledger.estimate_count(), 0);
}
