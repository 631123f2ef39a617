//! Sui JSON-RPC ledger client.
//!
//! Implements `Ledger` over a fullnode's JSON-RPC endpoint. Transport
//! failures and HTTP 429/5xx responses are retried with exponential
//! backoff; JSON-RPC error objects are not. Resubmitting an execute call
//! re-sends the identical signed bytes, so a retry can never produce a
//! second transaction.
//!
//! Docs: https://docs.sui.io/sui-api-ref

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::signer::Signer;
use super::transaction::{encode_transaction, programmable_transaction, Transaction};
use super::{BalanceChange, ExecutionOutcome, ExecutionStatus, GasCost, Ledger, TransactionDraft};
use crate::pools::coins;
use crate::types::{
    parse_address, parse_digest, parse_object_id, short_address, total_balance, CoinObject,
    FarmError, ObjectId, ObjectReference, SuiAddress,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";

/// Base delay for exponential backoff (ms).
const BASE_BACKOFF_MS: u64 = 500;

/// Page size for paginated queries.
const PAGE_LIMIT: u32 = 50;

/// Pages of history scanned when looking for the last matching call.
const HISTORY_PAGES: usize = 4;

/// Budget used for dry runs before the real budget is known (0.05 SUI).
const DRY_RUN_BUDGET: u64 = 50_000_000;

/// Upper bound on gas payment objects per transaction.
const MAX_GAS_OBJECTS: usize = 256;

// ---------------------------------------------------------------------------
// API response types (JSON-RPC → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    next_cursor: Option<Value>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcCoin {
    coin_object_id: String,
    version: String,
    digest: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcGasUsed {
    computation_cost: String,
    storage_cost: String,
    storage_rebate: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcEffects {
    status: RpcStatus,
    gas_used: RpcGasUsed,
}

#[derive(Debug, Deserialize)]
struct DryRunResponse {
    effects: RpcEffects,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBalanceChange {
    owner: Value,
    coin_type: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    digest: String,
    #[serde(default)]
    effects: Option<RpcEffects>,
    #[serde(default)]
    balance_changes: Vec<RpcBalanceChange>,
}

#[derive(Debug, Deserialize)]
struct OwnedObjectEntry {
    #[serde(default)]
    data: Option<OwnedObjectData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedObjectData {
    object_id: String,
    version: String,
    digest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBlockEntry {
    #[serde(default)]
    timestamp_ms: Option<String>,
    #[serde(default)]
    transaction: Option<Value>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SuiRpcClient {
    http: Client,
    url: String,
    max_retries: u32,
}

impl SuiRpcClient {
    pub fn new(url: &str, timeout: Duration, max_retries: u32) -> Result<Self, FarmError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FarmError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: url.to_string(),
            max_retries,
        })
    }

    /// Issue one JSON-RPC call with retry + exponential backoff.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, FarmError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = BASE_BACKOFF_MS * 2u64.pow(attempt - 1);
                debug!(attempt, delay_ms = delay, method, "Retrying RPC call");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let response = match self.http.post(&self.url).json(&request).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!(attempt, method, error = %e, "RPC request failed");
                    last_error = Some(format!("request error: {e}"));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, attempt, method, error = %body, "Retryable RPC error");
                last_error = Some(format!("HTTP {status}: {body}"));
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(FarmError::Transport(format!("{method}: HTTP {status}: {body}")));
            }

            let body: RpcResponse<T> = response
                .json()
                .await
                .map_err(|e| FarmError::Decode(format!("{method} response: {e}")))?;

            if let Some(err) = body.error {
                return Err(FarmError::Transport(format!(
                    "{method}: RPC error {}: {}",
                    err.code, err.message
                )));
            }
            return body
                .result
                .ok_or_else(|| FarmError::Decode(format!("{method}: empty result")));
        }

        Err(FarmError::Transport(format!(
            "{method} failed after {} retries: {}",
            self.max_retries,
            last_error.unwrap_or_default()
        )))
    }

    /// Wrap a draft into a signable transaction, selecting gas payment from
    /// the sender's SUI coins.
    async fn assemble(
        &self,
        draft: &TransactionDraft,
        budget: u64,
        price: u64,
    ) -> Result<Transaction, FarmError> {
        let gas_coins = self.spendable_coins(draft.sender, coins::SUI.type_tag).await?;
        if gas_coins.is_empty() {
            return Err(FarmError::InsufficientBalance {
                coin: coins::SUI.symbol.to_string(),
                requested: budget as u128,
                available: 0,
            });
        }

        let payment = gas_coins
            .into_iter()
            .take(MAX_GAS_OBJECTS)
            .map(|c| c.object_ref)
            .collect();

        Ok(programmable_transaction(
            draft.sender,
            draft.programmable.clone(),
            payment,
            price,
            budget,
        ))
    }
}

#[async_trait]
impl Ledger for SuiRpcClient {
    async fn spendable_coins(
        &self,
        owner: SuiAddress,
        coin_type: &str,
    ) -> Result<Vec<CoinObject>, FarmError> {
        let mut coins = Vec::new();
        let mut cursor = Value::Null;

        loop {
            let page: Page<RpcCoin> = self
                .call(
                    "suix_getCoins",
                    json!([owner.to_string(), coin_type, cursor, PAGE_LIMIT]),
                )
                .await?;

            for c in page.data {
                coins.push(CoinObject {
                    object_ref: ObjectReference::new(
                        parse_object_id(&c.coin_object_id)?,
                        parse_u64(&c.version, "coin version")?,
                        parse_digest(&c.digest)?,
                    ),
                    balance: parse_u64(&c.balance, "coin balance")?,
                });
            }

            match page.next_cursor {
                Some(next) if page.has_next_page && !next.is_null() => cursor = next,
                _ => break,
            }
        }

        debug!(
            owner = %short_address(&owner),
            coin_type,
            fragments = coins.len(),
            "Fetched spendable coins"
        );
        Ok(coins)
    }

    async fn estimate_fee(&self, tx: &TransactionDraft) -> Result<GasCost, FarmError> {
        let price = match tx.gas_price {
            Some(p) => p,
            None => self.reference_gas_price().await?,
        };

        // The dry-run budget must be covered by the gas coins themselves.
        let sui = self.spendable_coins(tx.sender, coins::SUI.type_tag).await?;
        let available = u64::try_from(total_balance(&sui)).unwrap_or(u64::MAX);
        let budget = tx.gas_budget.unwrap_or(DRY_RUN_BUDGET).min(available);

        let bytes = encode_transaction(&self.assemble(tx, budget, price).await?)?;
        let response: DryRunResponse = self
            .call("sui_dryRunTransactionBlock", json!([BASE64.encode(bytes)]))
            .await?;

        if response.effects.status.status != "success" {
            return Err(FarmError::LedgerExecution {
                digest: "dry-run".to_string(),
                reason: response.effects.status.error.unwrap_or_default(),
            });
        }

        gas_cost(&response.effects.gas_used)
    }

    async fn reference_gas_price(&self) -> Result<u64, FarmError> {
        let value: Value = self.call("suix_getReferenceGasPrice", json!([])).await?;
        match &value {
            Value::String(s) => parse_u64(s, "reference gas price"),
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| FarmError::Decode(format!("reference gas price: {n}"))),
            other => Err(FarmError::Decode(format!("reference gas price: {other}"))),
        }
    }

    async fn submit(
        &self,
        tx: &TransactionDraft,
        signer: &dyn Signer,
    ) -> Result<ExecutionOutcome, FarmError> {
        let (Some(budget), Some(price)) = (tx.gas_budget, tx.gas_price) else {
            return Err(FarmError::InvariantViolation(
                "submission without a fixed gas budget and price".into(),
            ));
        };
        if signer.address() != tx.sender {
            return Err(FarmError::Signer(format!(
                "signer {} does not match sender {}",
                signer.address(),
                tx.sender
            )));
        }

        let transaction = self.assemble(tx, budget, price).await?;
        let bytes = encode_transaction(&transaction)?;
        let signature = signer.sign_transaction(&transaction)?;

        let response: ExecuteResponse = self
            .call(
                "sui_executeTransactionBlock",
                json!([
                    BASE64.encode(&bytes),
                    [signature],
                    { "showEffects": true, "showBalanceChanges": true },
                    "WaitForLocalExecution"
                ]),
            )
            .await?;

        let gas_used = match &response.effects {
            Some(effects) => gas_cost(&effects.gas_used)?,
            None => GasCost::default(),
        };
        let status = match response.effects {
            Some(effects) if effects.status.status == "success" => ExecutionStatus::Success,
            Some(effects) => ExecutionStatus::Failure(effects.status.error.unwrap_or_else(|| {
                format!("status {}", effects.status.status)
            })),
            None => ExecutionStatus::Failure("no effects returned".to_string()),
        };

        let balance_changes = response
            .balance_changes
            .into_iter()
            .map(|c| {
                Ok(BalanceChange {
                    owner: address_owner(&c.owner),
                    coin_type: c.coin_type,
                    amount: c
                        .amount
                        .parse::<i128>()
                        .map_err(|e| FarmError::Decode(format!("balance change {}: {e}", c.amount)))?,
                })
            })
            .collect::<Result<Vec<_>, FarmError>>()?;

        Ok(ExecutionOutcome {
            digest: response.digest,
            status,
            balance_changes,
            gas_used,
        })
    }

    async fn owned_objects(
        &self,
        owner: SuiAddress,
        struct_type: &str,
    ) -> Result<Vec<ObjectReference>, FarmError> {
        let mut refs = Vec::new();
        let mut cursor = Value::Null;

        loop {
            let page: Page<OwnedObjectEntry> = self
                .call(
                    "suix_getOwnedObjects",
                    json!([
                        owner.to_string(),
                        { "filter": { "StructType": struct_type }, "options": { "showType": true } },
                        cursor,
                        PAGE_LIMIT
                    ]),
                )
                .await?;

            for entry in page.data.into_iter().filter_map(|e| e.data) {
                refs.push(ObjectReference::new(
                    parse_object_id(&entry.object_id)?,
                    parse_u64(&entry.version, "object version")?,
                    parse_digest(&entry.digest)?,
                ));
            }

            match page.next_cursor {
                Some(next) if page.has_next_page && !next.is_null() => cursor = next,
                _ => break,
            }
        }

        Ok(refs)
    }

    async fn last_transaction_calling(
        &self,
        owner: SuiAddress,
        package: ObjectId,
        module: &str,
        function: &str,
    ) -> Result<Option<DateTime<Utc>>, FarmError> {
        let mut cursor = Value::Null;

        for _ in 0..HISTORY_PAGES {
            let page: Page<TransactionBlockEntry> = self
                .call(
                    "suix_queryTransactionBlocks",
                    json!([
                        { "filter": { "FromAddress": owner.to_string() }, "options": { "showInput": true } },
                        cursor,
                        PAGE_LIMIT,
                        true
                    ]),
                )
                .await?;

            for entry in &page.data {
                let calls_target = entry
                    .transaction
                    .as_ref()
                    .map(|tx| calls_function(tx, package, module, function))
                    .unwrap_or(false);
                if calls_target {
                    return Ok(entry
                        .timestamp_ms
                        .as_deref()
                        .and_then(|ms| ms.parse::<i64>().ok())
                        .and_then(|ms| Utc.timestamp_millis_opt(ms).single()));
                }
            }

            match page.next_cursor {
                Some(next) if page.has_next_page && !next.is_null() => cursor = next,
                _ => break,
            }
        }

        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_u64(s: &str, what: &str) -> Result<u64, FarmError> {
    s.parse::<u64>()
        .map_err(|e| FarmError::Decode(format!("{what} {s}: {e}")))
}

fn gas_cost(gas: &RpcGasUsed) -> Result<GasCost, FarmError> {
    Ok(GasCost {
        computation: parse_u64(&gas.computation_cost, "computation cost")?,
        storage: parse_u64(&gas.storage_cost, "storage cost")?,
        rebate: parse_u64(&gas.storage_rebate, "storage rebate")?,
    })
}

/// Extract the address from `{"AddressOwner": "0x…"}`.
fn address_owner(owner: &Value) -> Option<SuiAddress> {
    owner
        .get("AddressOwner")
        .and_then(Value::as_str)
        .and_then(|s| parse_address(s).ok())
}

/// Whether a `showInput` transaction block contains a Move call to the
/// given function.
fn calls_function(tx: &Value, package: ObjectId, module: &str, function: &str) -> bool {
    let commands = tx
        .pointer("/data/transaction/transactions")
        .and_then(Value::as_array);
    let Some(commands) = commands else {
        return false;
    };

    commands.iter().filter_map(|c| c.get("MoveCall")).any(|call| {
        let same_package = call
            .get("package")
            .and_then(Value::as_str)
            .and_then(|p| parse_object_id(p).ok())
            == Some(package);
        same_package
            && call.get("module").and_then(Value::as_str) == Some(module)
            && call.get("function").and_then(Value::as_str) == Some(function)
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
