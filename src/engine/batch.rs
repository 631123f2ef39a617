//! Batch orchestrator: accounts × token-pair jobs × rounds, strictly
//! serial, with per-cycle failure isolation.

use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::debug;

use super::cycle::TradeCycleEngine;
use super::events::{EventSink, TradeEvent};
use super::pacing::{Pacer, PacingWindow};
use crate::account::Account;
use crate::types::FarmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub shuffle_accounts: bool,
    pub shuffle_token_pairs: bool,
    /// Pause before every cycle except the first of the batch.
    pub cycle_delay: PacingWindow,
}

/// Counts of finished work. A cycle whose reverse leg failed counts as
/// failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub accounts: usize,
    pub cycles_completed: u32,
    pub cycles_failed: u32,
    /// Rounds never attempted because the job ran out of balance.
    pub cycles_skipped: u32,
}

pub struct BatchOrchestrator {
    engine: TradeCycleEngine,
    pacer: Arc<dyn Pacer>,
    events: Arc<dyn EventSink>,
    options: BatchOptions,
}

/// A shuffled (or as-is) sequence of references; the input is not touched.
fn ordered<T>(items: &[T], shuffle: bool) -> Vec<&T> {
    let mut out: Vec<&T> = items.iter().collect();
    if shuffle {
        out.shuffle(&mut rand::thread_rng());
    }
    out
}

impl BatchOrchestrator {
    pub fn new(
        engine: TradeCycleEngine,
        pacer: Arc<dyn Pacer>,
        events: Arc<dyn EventSink>,
        options: BatchOptions,
    ) -> Self {
        Self {
            engine,
            pacer,
            events,
            options,
        }
    }

    pub async fn run_batch(&self, accounts: &[Account]) -> BatchReport {
        let mut report = BatchReport {
            accounts: accounts.len(),
            ..BatchReport::default()
        };
        self.events.emit(TradeEvent::BatchStarted { accounts: accounts.len() });

        let mut first_cycle = true;
        let account_order = ordered(accounts, self.options.shuffle_accounts);

        for (i, account) in account_order.into_iter().enumerate() {
            let label = account.label();
            self.events.emit(TradeEvent::AccountStarted {
                index: i + 1,
                account: label.clone(),
                address: account.address(),
                jobs: account.jobs.len(),
            });

            let job_order = ordered(&account.jobs, self.options.shuffle_token_pairs);
            for job in job_order {
                for round in 1..=job.rounds {
                    if !first_cycle {
                        self.pacer.pause(self.options.cycle_delay).await;
                    }
                    first_cycle = false;

                    self.events.emit(TradeEvent::CycleStarted {
                        account: label.clone(),
                        pool: job.pool.name,
                        round,
                        rounds: job.rounds,
                    });

                    match self
                        .engine
                        .run_cycle(&label, account.signer.as_ref(), job.pool, job.amount)
                        .await
                    {
                        Ok(outcome) => {
                            let completed = outcome.is_completed();
                            if completed {
                                report.cycles_completed += 1;
                            } else {
                                report.cycles_failed += 1;
                            }
                            self.events.emit(TradeEvent::CycleFinished {
                                account: label.clone(),
                                pool: job.pool.name,
                                round,
                                completed,
                            });
                        }
                        Err(e @ FarmError::InsufficientBalance { .. }) => {
                            let remaining = job.rounds - round + 1;
                            report.cycles_skipped += remaining;
                            self.events.emit(TradeEvent::CycleSkipped {
                                account: label.clone(),
                                pool: job.pool.name,
                                rounds_skipped: remaining,
                                reason: e.to_string(),
                            });
                            break;
                        }
                        Err(e) => {
                            debug!(account = %label, pool = job.pool.name, round, error = %e, "Cycle aborted before submission");
                            report.cycles_failed += 1;
                            let entry = job.pool.entry_direction;
                            self.events.emit(TradeEvent::CycleFailed {
                                account: label.clone(),
                                pool: job.pool.name,
                                leg: None,
                                source: job.pool.source(entry).symbol,
                                destination: job.pool.destination(entry).symbol,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        debug!(
            accounts = report.accounts,
            completed = report.cycles_completed,
            failed = report.cycles_failed,
            skipped = report.cycles_skipped,
            "Batch complete"
        );
        self.events.emit(TradeEvent::BatchFinished {
            completed: report.cycles_completed,
            failed: report.cycles_failed,
            skipped: report.cycles_skipped,
        });
        report
    }
}
