//! Read-only per-account report: balances, external volume ranking and
//! the time of the last flash swap.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt::Write as _;
use tracing::{debug, warn};

use super::ranking::{VolumeInfo, VolumeRanking};
use super::Account;
use crate::ledger::Ledger;
use crate::pools::coins::{self, CoinType};
use crate::pools::TRADE_PACKAGE;
use crate::types::{short_address, total_balance, FarmError, SuiAddress};

#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    /// 1-based position in the configuration.
    pub index: usize,
    pub nickname: Option<String>,
    pub address: SuiAddress,
    pub sui_balance: Decimal,
    pub usdc_balance: Decimal,
    /// `None` when the ranking service could not answer.
    pub volume: Option<VolumeInfo>,
    pub last_flash_swap: Option<DateTime<Utc>>,
}

async fn balance(ledger: &dyn Ledger, owner: SuiAddress, coin: CoinType) -> Result<Decimal, FarmError> {
    let fragments = ledger.spendable_coins(owner, coin.type_tag).await?;
    Ok(coin.to_human(total_balance(&fragments)))
}

pub async fn summarize(
    ledger: &dyn Ledger,
    ranking: &dyn VolumeRanking,
    accounts: &[Account],
) -> Result<Vec<AccountSummary>, FarmError> {
    let mut rows = Vec::with_capacity(accounts.len());

    for (i, account) in accounts.iter().enumerate() {
        let address = account.address();
        debug!(address = %short_address(&address), "Summarizing account");

        let last_flash_swap = ledger
            .last_transaction_calling(address, TRADE_PACKAGE, "trade", "flash_swap")
            .await?;

        let volume = match ranking.account_volume(address).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(address = %short_address(&address), error = %e, "Volume ranking unavailable");
                None
            }
        };

        rows.push(AccountSummary {
            index: i + 1,
            nickname: account.nickname.clone().filter(|n| !n.is_empty()),
            address,
            sui_balance: balance(ledger, address, coins::SUI).await?,
            usdc_balance: balance(ledger, address, coins::USDC).await?,
            volume,
            last_flash_swap,
        });
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

const HEADERS: [&str; 8] = ["#", "Nickname", "Address", "SUI", "USDC", "Volume", "Rank", "Last swap"];
const WIDTHS: [usize; 8] = [4, 12, 66, 14, 14, 12, 8, 19];

fn cells(row: &AccountSummary) -> [String; 8] {
    let (volume, rank) = match &row.volume {
        Some(v) => (format!("{:.2}", v.value), v.rank.to_string()),
        None => ("n/a".to_string(), "n/a".to_string()),
    };
    [
        row.index.to_string(),
        row.nickname.clone().unwrap_or_else(|| "-".to_string()),
        row.address.to_string(),
        format!("{:.4}", row.sui_balance),
        format!("{:.2}", row.usdc_balance),
        volume,
        rank,
        row.last_flash_swap
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string()),
    ]
}

fn write_line(out: &mut String, values: &[String; 8]) {
    let line: Vec<String> = values
        .iter()
        .zip(WIDTHS)
        .map(|(v, w)| format!("{v:<w$}"))
        .collect();
    let _ = writeln!(out, "{}", line.join(" | ").trim_end());
}

/// Fixed-width text table, one line per account.
pub fn render_table(rows: &[AccountSummary]) -> String {
    let mut out = String::new();
    write_line(&mut out, &HEADERS.map(str::to_string));
    let rule: Vec<String> = WIDTHS.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in rows {
        write_line(&mut out, &cells(row));
    }
    out
}
