/// Axum handlers for the JSON-RPC endpoint

use axum::{extract::State, Json};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use ledger_notes::abi;

use crate::ledger::{LedgerError, MockLedger};
use crate::types::*;

/// Shared application state
pub type AppState = Arc<MockLedger>;

const METHOD_NOT_FOUND: i64 = -32601;

/// Positional parameter `index` of a request
fn param<T: DeserializeOwned>(params: &Value, index: usize) -> Result<T, LedgerError> {
    let value = params
        .get(index)
        .cloned()
        .ok_or_else(|| LedgerError::InvalidParams(format!("missing parameter {}", index)))?;
    serde_json::from_value(value)
        .map_err(|e| LedgerError::InvalidParams(format!("parameter {}: {}", index, e)))
}

fn dispatch(ledger: &MockLedger, method: &str, params: &Value) -> Option<Result<Value, LedgerError>> {
    let result = match method {
        "eth_accounts" => Ok(json!(ledger.accounts())),
        "eth_chainId" => Ok(json!(quantity(ledger.chain_id()))),
        "eth_blockNumber" => Ok(json!(quantity(ledger.block_number()))),
        "eth_getCode" => {
            param::<String>(params, 0).map(|address| json!(abi::to_hex(&ledger.code_at(&address))))
        }
        "eth_call" => param::<CallRequest>(params, 0)
            .and_then(|call| ledger.call(&call))
            .map(|data| json!(abi::to_hex(&data))),
        "eth_sendTransaction" => param::<CallRequest>(params, 0)
            .and_then(|tx| ledger.send_transaction(&tx))
            .map(|hash| json!(hash)),
        "eth_getTransactionReceipt" => {
            param::<String>(params, 0).map(|hash| json!(ledger.receipt(&hash)))
        }
        _ => return None,
    };
    Some(result)
}

/// POST /
/// Single JSON-RPC request; errors are reported in the response body
pub async fn handle_rpc(
    State(ledger): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    log::debug!("➡️  {} {}", request.method, request.params);

    let response = match dispatch(&ledger, &request.method, &request.params) {
        Some(Ok(result)) => RpcResponse::success(request.id, result),
        Some(Err(e)) => {
            log::warn!("❌ {} failed: {}", request.method, e);
            RpcResponse::failure(request.id, e.code(), e.to_string())
        }
        None => RpcResponse::failure(
            request.id,
            METHOD_NOT_FOUND,
            format!("the method {} does not exist/is not available", request.method),
        ),
    };

    Json(response)
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
