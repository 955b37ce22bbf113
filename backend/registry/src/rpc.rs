//! Soroban RPC client. Polls `getEvents` and decodes supply-chain custody events.
//!
//! ## Resilience
//!
//! * Exponential back-off is applied when the RPC returns an error or rate-limit
//!   response, up to [`MAX_BACKOFF_SECS`] seconds.
//! * Transient network errors (connection reset, timeout) are retried silently.
//!
//! Events are requested with `xdrFormat: "json"`, so topics and data arrive as
//! JSON-encoded `ScVal`s (`{"symbol": "sent"}`, `{"map": [...]}`, ...).

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::errors::{RegistryError, Result};
use crate::events::{CustodyEvent, EventKind, EventSource};

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    pub result: Option<EventsResult>,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct EventsResult {
    #[serde(default)]
    pub events: Vec<RawEvent>,
    pub cursor: Option<String>,
    #[serde(rename = "latestLedger")]
    pub latest_ledger: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct RawEvent {
    #[serde(alias = "topicJson", default)]
    pub topic: Vec<Value>,
    #[serde(alias = "valueJson", default)]
    pub value: Value,
    #[serde(rename = "contractId")]
    pub contract_id: Option<String>,
    #[serde(rename = "txHash")]
    pub tx_hash: Option<String>,
    pub id: Option<String>,
    pub ledger: Option<u64>,
    #[serde(rename = "ledgerClosedAt")]
    pub ledger_closed_at: Option<String>,
    #[serde(rename = "inSuccessfulContractCall")]
    pub in_successful_contract_call: Option<bool>,
}

/// One page of `getEvents` output.
#[derive(Debug)]
pub struct EventsPage {
    pub events: Vec<RawEvent>,
    pub cursor: Option<String>,
    pub latest_ledger: Option<u64>,
}

// ─────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────

/// Fetch a page of events from the RPC.
///
/// * `start_ledger`: the ledger sequence to scan from (inclusive).
/// * `cursor`: optional opaque pagination cursor from a previous response.
/// * `limit`: maximum number of events to return.
pub async fn fetch_events(
    client: &Client,
    rpc_url: &str,
    contract_id: &str,
    start_ledger: u32,
    cursor: Option<&str>,
    limit: u32,
) -> Result<EventsPage> {
    let mut backoff = INITIAL_BACKOFF_SECS;

    loop {
        let params = build_params(contract_id, start_ledger, cursor, limit);

        let response = client
            .post(rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "getEvents",
                "params": params,
            }))
            .send()
            .await;

        let resp = match response {
            Err(e) => {
                warn!("RPC request failed (will retry in {backoff}s): {e}");
                backoff = sleep_backoff(backoff).await;
                continue;
            }
            Ok(resp) => resp,
        };

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate-limited by RPC (will retry in {backoff}s)");
            backoff = sleep_backoff(backoff).await;
            continue;
        }

        let body: RpcResponse = resp.json().await?;

        if let Some(err) = body.error {
            // -32600 / -32601 are hard failures; everything else we retry
            if err.code == -32600 || err.code == -32601 {
                return Err(RegistryError::EventParse(format!(
                    "RPC hard error {}: {}",
                    err.code, err.message
                )));
            }
            warn!(
                "RPC soft error (will retry in {backoff}s): {} {}",
                err.code, err.message
            );
            backoff = sleep_backoff(backoff).await;
            continue;
        }

        let result = body.result.ok_or_else(|| {
            RegistryError::EventParse("Empty result from getEvents".to_string())
        })?;

        debug!(
            events = result.events.len(),
            latest_ledger = ?result.latest_ledger,
            "Fetched events"
        );

        return Ok(EventsPage {
            events: result.events,
            cursor: result.cursor,
            latest_ledger: result.latest_ledger,
        });
    }
}

async fn sleep_backoff(backoff: u64) -> u64 {
    tokio::time::sleep(Duration::from_secs(backoff)).await;
    (backoff * 2).min(MAX_BACKOFF_SECS)
}

fn build_params(contract_id: &str, start_ledger: u32, cursor: Option<&str>, limit: u32) -> Value {
    let mut params = json!({
        "filters": [
            {
                "type": "contract",
                "contractIds": [contract_id]
            }
        ],
        "pagination": {
            "limit": limit
        },
        "xdrFormat": "json"
    });

    if let Some(cur) = cursor {
        params["pagination"]["cursor"] = json!(cur);
    } else {
        params["startLedger"] = json!(start_ledger);
    }

    params
}

// ─────────────────────────────────────────────────────────
// Event decoding
// ─────────────────────────────────────────────────────────

/// Decode raw RPC events into [`CustodyEvent`]s. Events from failed contract
/// calls are dropped.
pub fn decode_events(raw: &[RawEvent]) -> Vec<CustodyEvent> {
    raw.iter()
        .filter(|e| e.in_successful_contract_call != Some(false))
        .filter_map(decode_single)
        .collect()
}

fn decode_single(raw: &RawEvent) -> Option<CustodyEvent> {
    let topic = plain(raw.topic.first()?);
    let topic = topic.as_str()?;
    let kind = EventKind::from_topic(topic);

    let key = raw.topic.get(1).map(plain).and_then(|v| as_text(&v));
    let data = plain(&raw.value);

    let (batch_id, actor, counterparty, detail) = match kind {
        EventKind::UserRegistered => (None, key, None, field(&data, "registration_id")),
        EventKind::BatchCreated => (
            key,
            field(&data, "registration_id"),
            None,
            field(&data, "crop_name"),
        ),
        EventKind::BatchSent => (
            key,
            field(&data, "from"),
            field(&data, "to"),
            field(&data, "transport_method"),
        ),
        EventKind::BatchReceived => (key, field(&data, "by"), field(&data, "from"), None),
        EventKind::BatchCompleted => (key, field(&data, "by"), None, None),
        EventKind::Unknown => (None, None, None, Some(topic.to_string())),
    };

    Some(CustodyEvent {
        event_type: kind.as_str().to_string(),
        batch_id,
        actor,
        counterparty,
        detail,
        source: EventSource::Ledger.as_str().to_string(),
        ledger: raw.ledger.map(|l| l as i64),
        tx_hash: raw.tx_hash.clone(),
        timestamp: raw
            .ledger_closed_at
            .as_deref()
            .and_then(parse_iso_to_unix)
            .unwrap_or(0),
    })
}

/// Collapse a JSON-encoded `ScVal` into plain JSON: scalars lose their type
/// tag, `map` becomes an object keyed by symbol/string, `vec` an array.
/// Also accepts the older `{"type": ..., "value": ...}` shape and
/// string-encoded JSON.
fn plain(value: &Value) -> Value {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(inner @ Value::Object(_)) => plain(&inner),
            _ => value.clone(),
        },
        Value::Object(obj) => {
            if let Some(inner) = obj.get("value").filter(|_| obj.contains_key("type")) {
                return plain(inner);
            }
            if obj.len() != 1 {
                return Value::Object(obj.iter().map(|(k, v)| (k.clone(), plain(v))).collect());
            }
            let Some((tag, inner)) = obj.iter().next() else {
                return value.clone();
            };
            match (tag.as_str(), inner) {
                ("map", Value::Array(entries)) => {
                    let mut out = Map::new();
                    for entry in entries {
                        let key = entry.get("key").map(plain).and_then(|k| as_text(&k));
                        if let (Some(key), Some(val)) = (key, entry.get("val")) {
                            out.insert(key, plain(val));
                        }
                    }
                    Value::Object(out)
                }
                ("vec", Value::Array(items)) => Value::Array(items.iter().map(plain).collect()),
                (
                    "symbol" | "string" | "address" | "bytes" | "u32" | "i32" | "u64" | "i64"
                    | "u128" | "i128" | "bool" | "timepoint" | "duration",
                    scalar,
                ) => scalar.clone(),
                _ => Value::Object(obj.iter().map(|(k, v)| (k.clone(), plain(v))).collect()),
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(plain).collect()),
        other => other.clone(),
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(as_text)
}

/// Parse an ISO-8601 timestamp string into a Unix epoch (seconds).
fn parse_iso_to_unix(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
