//! Stdio JSON-RPC gateway
//!
//! Newline-delimited JSON-RPC 2.0 over stdin/stdout. Three methods:
//! `initialize`, `tools/list`, and `tools/call`; notifications are ignored.
//! Tool results travel as MCP text content. Backend error messages are
//! redacted at construction, so nothing sensitive reaches stdout.

use crate::rpc::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION, SERVER_ERROR,
};
use crate::tools;
use mnemo_core::error::Error;
use mnemo_memory::MemoryManager;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Serve requests from stdin until it closes
pub async fn run_stdio(manager: Arc<MemoryManager>) -> std::io::Result<()> {
    serve(manager, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve requests from an arbitrary transport (stdio in production, buffers
/// in tests)
pub async fn serve<R, W>(manager: Arc<MemoryManager>, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(response) = handle_line(&manager, line).await else {
            continue;
        };

        let mut payload = serde_json::to_vec(&response)
            .unwrap_or_else(|_| br#"{"jsonrpc":"2.0","id":null,"error":{"code":-32000,"message":"response serialization failed"}}"#.to_vec());
        payload.push(b'\n');
        writer.write_all(&payload).await?;
        writer.flush().await?;
    }

    info!("transport closed, gateway exiting");
    Ok(())
}

/// Handle one request line; `None` means nothing goes back (notification or
/// unparseable id-less garbage)
async fn handle_line(manager: &MemoryManager, line: &str) -> Option<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "unparseable request line");
            return Some(JsonRpcResponse::error(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {e}"),
            ));
        }
    };

    if request.is_notification() {
        debug!(method = %request.method, "notification ignored");
        return None;
    }
    let id = request.id.clone().unwrap_or(Value::Null);

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": "mnemo-server",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {
                    "tools": { "listChanged": false },
                },
            }),
        ),

        "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tools::tool_catalog() })),

        "tools/call" => {
            let name = request.params["name"].as_str().unwrap_or_default();
            let arguments = request
                .params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));

            match tools::call_tool(manager, name, &arguments).await {
                Ok(result) => {
                    let text = serde_json::to_string(&result).unwrap_or_default();
                    JsonRpcResponse::success(
                        id,
                        json!({ "content": [{ "type": "text", "text": text }] }),
                    )
                }
                Err(e) => {
                    warn!(tool = name, error = %e, "tool call failed");
                    JsonRpcResponse::error(id, error_code(&e), e.to_string())
                }
            }
        }

        other => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("unknown method: {other}"),
        ),
    };
    Some(response)
}

/// Map the engine taxonomy onto JSON-RPC codes
fn error_code(error: &Error) -> i64 {
    match error {
        Error::Validation { .. } => INVALID_PARAMS,
        _ => SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::config::{EmbeddingProviderKind, MnemoConfig};
    use mnemo_memory::{MemoryVectorStore, MockEmbedder};

    fn manager() -> Arc<MemoryManager> {
        let mut config = MnemoConfig::default();
        config.embedding_provider = EmbeddingProviderKind::Local;
        Arc::new(MemoryManager::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MockEmbedder::default()),
            &config,
        ))
    }

    /// Feed newline-delimited requests through the gateway, collect responses.
    async fn roundtrip(input: &str) -> Vec<Value> {
        let mut output: Vec<u8> = Vec::new();
        serve(manager(), input.as_bytes(), &mut output).await.unwrap();

        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let responses =
            roundtrip(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], "mnemo-server");
    }

    #[tokio::test]
    async fn test_tools_list() {
        let responses =
            roundtrip(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;

        let tools = responses[0]["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 7);
        assert_eq!(tools[0]["name"], "memory_store");
    }

    #[tokio::test]
    async fn test_tool_call_roundtrip() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"memory_store","arguments":{"content":"line protocol works"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"memory_stats","arguments":{}}}"#,
            "\n",
        );
        let responses = roundtrip(input).await;
        assert_eq!(responses.len(), 2);

        let store_text = responses[0]["result"]["content"][0]["text"].as_str().unwrap();
        let stored: Value = serde_json::from_str(store_text).unwrap();
        assert_eq!(stored["layer"], "short-term");

        let stats_text = responses[1]["result"]["content"][0]["text"].as_str().unwrap();
        let stats: Value = serde_json::from_str(stats_text).unwrap();
        assert_eq!(stats["totalMemories"], 1);
    }

    #[tokio::test]
    async fn test_validation_error_maps_to_invalid_params() {
        let responses = roundtrip(
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"memory_search","arguments":{"query":"bad{query}"}}}"#,
        )
        .await;

        assert_eq!(responses[0]["error"]["code"], INVALID_PARAMS);
        assert!(responses[0]["error"]["message"]
            .as_str()
            .unwrap()
            .contains("query"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let responses =
            roundtrip(r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#).await;
        assert_eq!(responses[0]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
            "\n",
        );
        let responses = roundtrip(input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 1);
    }

    #[tokio::test]
    async fn test_parse_error_response() {
        let responses = roundtrip("this is not json\n").await;
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[0]["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let responses = roundtrip("\n\n").await;
        assert!(responses.is_empty());
    }
}
