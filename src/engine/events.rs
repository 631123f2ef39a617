//! Trade event stream.
//!
//! The engine reports progress as `TradeEvent`s instead of printing.
//! `TracingSink` renders them as structured log lines; `ChannelSink`
//! forwards them to another task (tests, or an alternative front end).

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::types::{SuiAddress, SwapDirection};

/// Which leg of a cycle an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    Forward,
    Reverse,
}

impl std::fmt::Display for LegKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegKind::Forward => write!(f, "forward"),
            LegKind::Reverse => write!(f, "reverse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    BatchStarted {
        accounts: usize,
    },
    AccountStarted {
        index: usize,
        account: String,
        address: SuiAddress,
        jobs: usize,
    },
    CycleStarted {
        account: String,
        pool: &'static str,
        round: u32,
        rounds: u32,
    },
    LegCompleted {
        account: String,
        leg: LegKind,
        direction: SwapDirection,
        source: &'static str,
        destination: &'static str,
        amount_in: Decimal,
        amount_out: Decimal,
        digest: String,
    },
    CycleFailed {
        account: String,
        pool: &'static str,
        leg: Option<LegKind>,
        source: &'static str,
        destination: &'static str,
        reason: String,
    },
    CycleSkipped {
        account: String,
        pool: &'static str,
        rounds_skipped: u32,
        reason: String,
    },
    CycleFinished {
        account: String,
        pool: &'static str,
        round: u32,
        completed: bool,
    },
    BatchFinished {
        completed: u32,
        failed: u32,
        skipped: u32,
    },
}

/// Consumer of trade events. Emission never fails the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TradeEvent);
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Default presentation: one structured log line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: TradeEvent) {
        match event {
            TradeEvent::BatchStarted { accounts } => {
                info!(accounts, "Batch started");
            }
            TradeEvent::AccountStarted { index, account, address, jobs } => {
                info!(index, account = %account, address = %address, jobs, "Account started");
            }
            TradeEvent::CycleStarted { account, pool, round, rounds } => {
                info!(account = %account, pool, round = format!("{round}/{rounds}"), "Cycle started");
            }
            TradeEvent::LegCompleted {
                account,
                leg,
                direction,
                source,
                destination,
                amount_in,
                amount_out,
                digest,
            } => {
                info!(
                    account = %account,
                    leg = %leg,
                    direction = %direction,
                    spent = format!("{amount_in} {source}"),
                    received = format!("{amount_out} {destination}"),
                    digest = %digest,
                    "Swap confirmed"
                );
            }
            TradeEvent::CycleFailed { account, pool, leg, source, destination, reason } => {
                warn!(
                    account = %account,
                    pool,
                    leg = leg.map(|l| l.to_string()).unwrap_or_else(|| "sizing".into()),
                    pair = format!("{source}->{destination}"),
                    error = %reason,
                    "Cycle failed"
                );
            }
            TradeEvent::CycleSkipped { account, pool, rounds_skipped, reason } => {
                warn!(account = %account, pool, rounds_skipped, reason = %reason, "Skipping remaining rounds");
            }
            TradeEvent::CycleFinished { account, pool, round, completed } => {
                info!(account = %account, pool, round, completed, "Cycle finished");
            }
            TradeEvent::BatchFinished { completed, failed, skipped } => {
                info!(completed, failed, skipped, "Batch finished");
            }
        }
    }
}

/// Forwards events over an unbounded channel. Events emitted after the
/// receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TradeEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TradeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TradeEvent) {
        let _ = self.tx.send(event);
    }
}
