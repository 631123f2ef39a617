//! Trade outcomes are rendered by the tracing sink alone; the engine
//! itself stays below INFO.

use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::Level;

use flashvol::engine::cycle::TradeCycleEngine;
use flashvol::engine::events::{ChannelSink, EventSink, TracingSink};
use flashvol::engine::pacing::PacingWindow;
use flashvol::ledger::signer::{Ed25519Signer, Signer};
use flashvol::pools::{self, coins};

use crate::mock_ledger::{MockLedger, RecordingPacer};

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One completed cycle, then one whose forward leg fails.
async fn run_two_cycles(sink: Arc<dyn EventSink>) {
    let trader = Ed25519Signer::from_secret(&SecretString::new(format!("0x{}", "0c".repeat(32)))).unwrap();
    let ledger = MockLedger::new();
    ledger.fund(trader.address(), coins::USDC, &[5_000_000]);
    ledger.fail_submission(2);
    let engine = TradeCycleEngine::new(
        Arc::new(ledger),
        Arc::new(RecordingPacer::default()),
        sink,
        PacingWindow::zero(),
    );

    let pool = pools::lookup("USDT_USDC").unwrap();
    for _ in 0..2 {
        engine
            .run_cycle("acct", &trader, pool, Some(dec!(1)))
            .await
            .unwrap();
    }
}

fn capture(logs: &CapturedLogs) -> tracing::subscriber::DefaultGuard {
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::set_default(subscriber)
}

#[tokio::test]
async fn test_engine_is_silent_above_debug() {
    let logs = CapturedLogs::default();
    let _guard = capture(&logs);

    let (sink, _rx) = ChannelSink::new();
    run_two_cycles(Arc::new(sink)).await;

    assert_eq!(logs.text(), "");
}

#[tokio::test]
async fn test_tracing_sink_reports_each_leg_once() {
    let logs = CapturedLogs::default();
    let _guard = capture(&logs);

    run_two_cycles(Arc::new(TracingSink)).await;

    let text = logs.text();
    assert_eq!(text.matches("Swap confirmed").count(), 2);
    assert_eq!(text.matches("Cycle failed").count(), 1);
}
