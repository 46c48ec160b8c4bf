//! The eight memory tools: catalog and dispatch
//!
//! TigerStyle: Thin wrappers around MemoryManager operations.
//!
//! Each tool validates its arguments at the boundary, calls one manager
//! operation, and shapes the result for the wire. Tool discovery is the
//! eighth operation, served by the gateway from [`tool_catalog`].

use crate::validate;
use mnemo_core::constants::LIST_CONTENT_PREVIEW_CHARS;
use mnemo_core::error::{Error, Result};
use mnemo_memory::{MemoryManager, MemoryRecord, ScoredRecord};
use serde_json::{json, Value};

/// Names of every tool the gateway serves, in catalog order
pub const TOOL_NAMES: [&str; 7] = [
    "memory_store",
    "memory_search",
    "memory_recall",
    "memory_consolidate",
    "memory_forget",
    "memory_list",
    "memory_stats",
];

/// Record metadata as exposed on the wire (no content, no vector)
fn record_metadata(record: &MemoryRecord) -> Value {
    json!({
        "timestamp": record.timestamp,
        "importance": record.importance,
        "source": record.source.as_str(),
        "tags": record.tags,
        "accessCount": record.access_count,
        "lastAccessed": record.last_accessed,
        "layer": record.layer.as_str(),
    })
}

fn search_hit_json(hit: &ScoredRecord) -> Value {
    json!({
        "id": hit.record.id.to_string(),
        "content": hit.record.content,
        "relevance": hit.relevance,
        "metadata": record_metadata(&hit.record),
    })
}

fn content_head(content: &str) -> String {
    if content.chars().count() <= LIST_CONTENT_PREVIEW_CHARS {
        return content.to_string();
    }
    let mut head: String = content.chars().take(LIST_CONTENT_PREVIEW_CHARS).collect();
    head.push_str("...");
    head
}

/// Dispatch a `tools/call` by name
pub async fn call_tool(manager: &MemoryManager, name: &str, args: &Value) -> Result<Value> {
    match name {
        "memory_store" => {
            let (content, options) = validate::store_args(args)?;
            let record = manager.store(&content, options).await?;
            Ok(json!({
                "memoryId": record.id.to_string(),
                "timestamp": record.timestamp,
                "layer": record.layer.as_str(),
            }))
        }

        "memory_search" => {
            let (query, options) = validate::search_args(args)?;
            let hits = manager.search(&query, &options).await?;
            Ok(Value::Array(hits.iter().map(search_hit_json).collect()))
        }

        "memory_recall" => {
            let (task, context, limit) = validate::recall_args(args)?;
            let result = manager.recall(&task, context.as_deref(), limit).await?;
            Ok(json!({
                "summary": result.summary,
                "memories": result.memories.iter().map(search_hit_json).collect::<Vec<_>>(),
            }))
        }

        "memory_consolidate" => {
            let options = validate::consolidate_args(args)?;
            let result = manager.consolidate(&options).await?;
            Ok(json!({
                "summary": result.summary,
                "consolidated": result
                    .consolidated
                    .iter()
                    .map(|record| json!({
                        "id": record.id.to_string(),
                        "content": record.content,
                        "metadata": record_metadata(record),
                    }))
                    .collect::<Vec<_>>(),
                "deletedCount": result.deleted.len(),
                "deleted": result.deleted.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            }))
        }

        "memory_forget" => {
            let options = validate::forget_args(args)?;
            let result = manager.forget(&options).await?;
            Ok(json!({
                "deletedCount": result.deleted.len(),
                "deleted": result.deleted.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
                "reason": result.reason,
            }))
        }

        "memory_list" => {
            let (layer, tags, limit) = validate::list_args(args)?;
            let records = manager.list(layer, tags, limit).await?;
            Ok(Value::Array(
                records
                    .iter()
                    .map(|record| {
                        json!({
                            "id": record.id.to_string(),
                            "content": content_head(&record.content),
                            "metadata": record_metadata(record),
                        })
                    })
                    .collect(),
            ))
        }

        "memory_stats" => {
            let stats = manager.stats().await?;
            serde_json::to_value(&stats)
                .map_err(|e| Error::internal(format!("stats serialization failed: {e}")))
        }

        other => Err(Error::validation(
            "name",
            format!("unknown tool '{other}'"),
        )),
    }
}

/// Tool catalog served by `tools/list`
pub fn tool_catalog() -> Value {
    json!([
        {
            "name": "memory_store",
            "description": "Store a memory with importance, tags, and provenance. The retention layer is chosen from importance unless given explicitly.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "Text to remember (at most 10000 characters)"
                    },
                    "importance": {
                        "type": "number",
                        "minimum": 0,
                        "maximum": 1,
                        "description": "How important this memory is (default 0.5)"
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Tags for grouping and filtering; the first tag groups consolidation"
                    },
                    "source": {
                        "type": "string",
                        "enum": ["user", "agent", "system"],
                        "description": "Who produced this memory (default agent)"
                    },
                    "layer": {
                        "type": "string",
                        "enum": ["working", "short-term", "long-term"],
                        "description": "Explicit retention layer override"
                    }
                },
                "required": ["content"]
            }
        },
        {
            "name": "memory_search",
            "description": "Search memories by semantic similarity.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query (at most 1000 characters)"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Maximum results (default 10)"
                    },
                    "layerFilter": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "enum": ["working", "short-term", "long-term"]
                        },
                        "description": "Restrict results to these layers"
                    },
                    "minRelevance": {
                        "type": "number",
                        "minimum": 0,
                        "maximum": 1,
                        "description": "Drop results below this relevance (default 0)"
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Require every listed tag"
                    }
                },
                "required": ["query"]
            }
        },
        {
            "name": "memory_recall",
            "description": "Recall memories relevant to a task, searching every layer, with a count-by-layer summary.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "task": {
                        "type": "string",
                        "description": "What you are trying to do (at most 1000 characters)"
                    },
                    "context": {
                        "type": "string",
                        "description": "Extra context folded into the query (at most 5000 characters)"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 50,
                        "description": "Maximum memories (default 10)"
                    }
                },
                "required": ["task"]
            }
        },
        {
            "name": "memory_consolidate",
            "description": "Fold aged records into consolidated long-term summaries grouped by primary tag.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "olderThan": {
                        "type": "integer",
                        "description": "Candidate cutoff in ms since epoch (default now minus 30 days)"
                    },
                    "targetSize": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 1000,
                        "description": "Records retained un-consolidated (default 50)"
                    },
                    "layer": {
                        "type": "string",
                        "enum": ["working", "short-term", "long-term"],
                        "description": "Tier to consolidate (default short-term)"
                    }
                }
            }
        },
        {
            "name": "memory_forget",
            "description": "Delete memories by id, age, or layer. At least one selector is required.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "memoryId": {
                        "type": "string",
                        "description": "Id of one memory to delete"
                    },
                    "olderThan": {
                        "type": "integer",
                        "description": "Delete memories created before this ms timestamp"
                    },
                    "layer": {
                        "type": "string",
                        "enum": ["working", "short-term", "long-term"],
                        "description": "Delete memories in this layer"
                    },
                    "reason": {
                        "type": "string",
                        "description": "Why these memories are being removed (at most 500 characters)"
                    }
                }
            }
        },
        {
            "name": "memory_list",
            "description": "List stored memories with content previews.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "layer": {
                        "type": "string",
                        "enum": ["working", "short-term", "long-term"],
                        "description": "Restrict to one layer"
                    },
                    "tags": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Require every listed tag"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 1000,
                        "description": "Maximum records (default 100)"
                    }
                }
            }
        },
        {
            "name": "memory_stats",
            "description": "Corpus statistics: totals, per-layer counts, average importance, age range.",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemo_core::config::{EmbeddingProviderKind, MnemoConfig};
    use mnemo_memory::{MemoryVectorStore, MockEmbedder};
    use std::sync::Arc;

    fn manager() -> MemoryManager {
        let mut config = MnemoConfig::default();
        config.embedding_provider = EmbeddingProviderKind::Local;
        MemoryManager::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MockEmbedder::default()),
            &config,
        )
    }

    #[test]
    fn test_catalog_covers_every_tool() {
        let catalog = tool_catalog();
        let names: Vec<&str> = catalog
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, TOOL_NAMES);

        for tool in catalog.as_array().unwrap() {
            assert!(tool["description"].as_str().unwrap().len() > 10);
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
    }

    #[test]
    fn test_content_head_truncates() {
        let short = "short enough";
        assert_eq!(content_head(short), short);

        let long = "y".repeat(LIST_CONTENT_PREVIEW_CHARS + 50);
        let head = content_head(&long);
        assert_eq!(head.chars().count(), LIST_CONTENT_PREVIEW_CHARS + 3);
        assert!(head.ends_with("..."));
    }

    #[tokio::test]
    async fn test_store_then_search_shapes() {
        let manager = manager();

        let stored = call_tool(
            &manager,
            "memory_store",
            &serde_json::json!({ "content": "the sky is blue", "importance": 0.9 }),
        )
        .await
        .unwrap();
        assert_eq!(stored["layer"], "long-term");
        assert!(stored["memoryId"].as_str().is_some());
        assert!(stored["timestamp"].as_i64().is_some());

        let found = call_tool(
            &manager,
            "memory_search",
            &serde_json::json!({ "query": "the sky is blue" }),
        )
        .await
        .unwrap();
        let hits = found.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], stored["memoryId"]);
        assert_eq!(hits[0]["metadata"]["layer"], "long-term");
        assert!(hits[0]["relevance"].as_f64().is_some());
        assert!(hits[0]["metadata"].get("embedding").is_none());
    }

    #[tokio::test]
    async fn test_recall_shape() {
        let manager = manager();
        call_tool(
            &manager,
            "memory_store",
            &serde_json::json!({ "content": "deployment checklist" }),
        )
        .await
        .unwrap();

        let recalled = call_tool(
            &manager,
            "memory_recall",
            &serde_json::json!({ "task": "deploy the service" }),
        )
        .await
        .unwrap();

        assert!(recalled["summary"].as_str().unwrap().starts_with("Recalled"));
        assert!(recalled["memories"].is_array());
    }

    #[tokio::test]
    async fn test_forget_shape() {
        let manager = manager();
        let stored = call_tool(
            &manager,
            "memory_store",
            &serde_json::json!({ "content": "temporary" }),
        )
        .await
        .unwrap();

        let forgotten = call_tool(
            &manager,
            "memory_forget",
            &serde_json::json!({ "memoryId": stored["memoryId"] }),
        )
        .await
        .unwrap();

        assert_eq!(forgotten["deletedCount"], 1);
        assert_eq!(forgotten["deleted"][0], stored["memoryId"]);
        assert_eq!(forgotten["reason"], "Explicit deletion");
    }

    #[tokio::test]
    async fn test_list_and_stats_shapes() {
        let manager = manager();
        call_tool(
            &manager,
            "memory_store",
            &serde_json::json!({ "content": "itemized", "importance": 0.3 }),
        )
        .await
        .unwrap();

        let listed = call_tool(&manager, "memory_list", &serde_json::json!({})).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let stats = call_tool(&manager, "memory_stats", &serde_json::json!({})).await.unwrap();
        assert_eq!(stats["totalMemories"], 1);
        assert_eq!(stats["byLayer"]["working"], 1);
        assert!(stats["avgImportance"].as_f64().is_some());
        assert!(stats["oldestMemory"].as_i64().is_some());
    }

    #[tokio::test]
    async fn test_consolidate_empty_corpus() {
        let manager = manager();
        let result = call_tool(&manager, "memory_consolidate", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result["deletedCount"], 0);
        assert!(result["summary"].as_str().unwrap().contains("Nothing to consolidate"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let manager = manager();
        let err = call_tool(&manager, "memory_transmute", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("memory_transmute"));
    }
}
