use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::{hex, Address, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{prelude::*, req::HttpClient, Error};

#[derive(Serialize, Debug)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize, Debug)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

/// Minimal Ethereum JSON-RPC client for read-only calls.
#[derive(Debug)]
pub struct JsonRpcClient {
    http: HttpClient,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// `http` must point at the RPC endpoint itself.
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            next_id: AtomicU64::new(1),
        }
    }

    /// `eth_call` against the latest block, returning the raw return data.
    pub async fn eth_call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: "eth_call",
            params: json!([{ "to": to, "data": data }, "latest"]),
        };
        let body = serde_json::to_string(&request).map_err(|e| Error::json_parse(e.to_string()))?;
        let text = self.http.post("", body).await?;
        decode_call_result(&text)
    }
}

pub(crate) fn decode_call_result(text: &str) -> Result<Bytes> {
    let response: RpcResponse =
        serde_json::from_str(text).map_err(|e| Error::json_parse(e.to_string()))?;
    if let Some(error) = response.error {
        return Err(Error::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    let result = response.result.ok_or_else(|| Error::Rpc {
        code: 0,
        message: "response carries neither result nor error".into(),
    })?;
    hex::decode(result.trim_start_matches("0x"))
        .map(Bytes::from)
        .map_err(|e| Error::AbiDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_result_hex() {
        let bytes = decode_call_result(r#"{"jsonrpc":"2.0","id":1,"result":"0x0012ff"}"#).unwrap();
        assert_eq!(bytes.as_ref(), &[0x00, 0x12, 0xff]);
    }

    #[test]
    fn test_decode_rpc_error() {
        let err = decode_call_result(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"execution reverted"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Rpc { code: -32000, .. }));
    }

    #[test]
    fn test_decode_empty_response() {
        assert!(matches!(
            decode_call_result(r#"{"jsonrpc":"2.0","id":1}"#),
            Err(Error::Rpc { code: 0, .. })
        ));
    }
}
