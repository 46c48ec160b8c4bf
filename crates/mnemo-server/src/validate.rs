//! Boundary validation for tool arguments
//!
//! TigerStyle: Every bound named, every rejection verbatim to the caller.
//!
//! All tool arguments pass through here before the engine sees them, so the
//! engine can assume contracts hold. Limits are character counts, not
//! bytes; content of exactly the maximum length is accepted.

use mnemo_core::constants::{
    CONSOLIDATION_TARGET_SIZE_DEFAULT, CONSOLIDATION_TARGET_SIZE_MAX, CONTENT_LENGTH_CHARS_MAX,
    CONTEXT_LENGTH_CHARS_MAX, LIST_LIMIT_DEFAULT, LIST_LIMIT_MAX, QUERY_LENGTH_CHARS_MAX,
    REASON_LENGTH_CHARS_MAX, RECALL_LIMIT_MAX, SEARCH_LIMIT_DEFAULT, SEARCH_LIMIT_MAX,
    TAGS_COUNT_MAX, TAG_LENGTH_CHARS_MAX,
};
use mnemo_core::error::{Error, Result};
use mnemo_memory::{
    ConsolidateOptions, ForgetOptions, MemoryLayer, SearchOptions, StoreOptions,
};
use serde_json::Value;

/// Characters rejected in search queries
const QUERY_FORBIDDEN_CHARS: &[char] = &['{', '}', '[', ']', '(', ')', ':'];

fn opt_str<'a>(args: &'a Value, field: &str) -> Result<Option<&'a str>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(Error::validation(field, "must be a string")),
    }
}

fn require_str<'a>(args: &'a Value, field: &str) -> Result<&'a str> {
    opt_str(args, field)?.ok_or_else(|| Error::validation(field, "required"))
}

fn opt_f64(args: &Value, field: &str) -> Result<Option<f64>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::validation(field, "must be a number")),
    }
}

fn opt_i64(args: &Value, field: &str) -> Result<Option<i64>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::validation(field, "must be an integer")),
    }
}

fn check_chars(field: &str, value: &str, max: usize) -> Result<()> {
    let count = value.chars().count();
    if count > max {
        return Err(Error::validation(
            field,
            format!("{count} chars exceeds limit of {max}"),
        ));
    }
    Ok(())
}

fn limit_field(args: &Value, default: usize, max: usize) -> Result<usize> {
    match opt_i64(args, "limit")? {
        None => Ok(default),
        Some(raw) if raw >= 1 && raw as usize <= max => Ok(raw as usize),
        Some(raw) => Err(Error::validation(
            "limit",
            format!("{raw} outside range 1..{max}"),
        )),
    }
}

fn tags_field(args: &Value, field: &str) -> Result<Option<Vec<String>>> {
    let raw = match args.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(Error::validation(field, "must be an array of strings")),
    };

    if raw.len() > TAGS_COUNT_MAX {
        return Err(Error::validation(
            field,
            format!("{} tags exceeds limit of {TAGS_COUNT_MAX}", raw.len()),
        ));
    }

    let mut tags = Vec::with_capacity(raw.len());
    for item in raw {
        let tag = item
            .as_str()
            .ok_or_else(|| Error::validation(field, "must be an array of strings"))?;
        check_chars(field, tag, TAG_LENGTH_CHARS_MAX)?;
        tags.push(tag.to_string());
    }
    Ok(Some(tags))
}

fn layer_field(args: &Value, field: &str) -> Result<Option<MemoryLayer>> {
    opt_str(args, field)?.map(str::parse).transpose()
}

fn unit_interval(field: &str, value: f64) -> Result<f32> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::validation(field, format!("{value} outside [0, 1]")));
    }
    Ok(value as f32)
}

/// Arguments for `memory_store`
pub fn store_args(args: &Value) -> Result<(String, StoreOptions)> {
    let content = require_str(args, "content")?.trim().to_string();
    if content.is_empty() {
        return Err(Error::validation("content", "must not be empty"));
    }
    check_chars("content", &content, CONTENT_LENGTH_CHARS_MAX)?;

    let importance = opt_f64(args, "importance")?
        .map(|v| unit_interval("importance", v))
        .transpose()?;

    let options = StoreOptions {
        importance,
        tags: tags_field(args, "tags")?.unwrap_or_default(),
        source: opt_str(args, "source")?
            .map(str::parse)
            .transpose()?
            .unwrap_or_default(),
        layer: layer_field(args, "layer")?,
    };
    Ok((content, options))
}

/// Arguments for `memory_search`
pub fn search_args(args: &Value) -> Result<(String, SearchOptions)> {
    let query = require_str(args, "query")?.trim().to_string();
    if query.is_empty() {
        return Err(Error::validation("query", "must not be empty"));
    }
    check_chars("query", &query, QUERY_LENGTH_CHARS_MAX)?;
    if query.contains(QUERY_FORBIDDEN_CHARS) {
        return Err(Error::validation(
            "query",
            "must not contain any of {}[]():",
        ));
    }

    let layer_filter = match args.get("layerFilter") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut layers = Vec::with_capacity(items.len());
            for item in items {
                let layer: MemoryLayer = item
                    .as_str()
                    .ok_or_else(|| Error::validation("layerFilter", "must be an array of layers"))?
                    .parse()?;
                layers.push(layer);
            }
            layers
        }
        Some(_) => {
            return Err(Error::validation("layerFilter", "must be an array of layers"));
        }
    };

    let options = SearchOptions {
        limit: limit_field(args, SEARCH_LIMIT_DEFAULT, SEARCH_LIMIT_MAX)?,
        layer_filter,
        tags: tags_field(args, "tags")?,
        min_relevance: opt_f64(args, "minRelevance")?
            .map(|v| unit_interval("minRelevance", v))
            .transpose()?
            .unwrap_or(0.0),
    };
    Ok((query, options))
}

/// Arguments for `memory_recall`
pub fn recall_args(args: &Value) -> Result<(String, Option<String>, usize)> {
    let task = require_str(args, "task")?.trim().to_string();
    if task.is_empty() {
        return Err(Error::validation("task", "must not be empty"));
    }
    check_chars("task", &task, QUERY_LENGTH_CHARS_MAX)?;

    let context = opt_str(args, "context")?.map(str::to_string);
    if let Some(ref context) = context {
        check_chars("context", context, CONTEXT_LENGTH_CHARS_MAX)?;
    }

    let limit = limit_field(args, SEARCH_LIMIT_DEFAULT, RECALL_LIMIT_MAX)?;
    Ok((task, context, limit))
}

/// Arguments for `memory_consolidate`
pub fn consolidate_args(args: &Value) -> Result<ConsolidateOptions> {
    let target_size = match opt_i64(args, "targetSize")? {
        None => CONSOLIDATION_TARGET_SIZE_DEFAULT,
        Some(raw) if raw >= 1 && raw as usize <= CONSOLIDATION_TARGET_SIZE_MAX => raw as usize,
        Some(raw) => {
            return Err(Error::validation(
                "targetSize",
                format!("{raw} outside range 1..{CONSOLIDATION_TARGET_SIZE_MAX}"),
            ));
        }
    };

    Ok(ConsolidateOptions {
        older_than: opt_i64(args, "olderThan")?,
        target_size,
        layer: layer_field(args, "layer")?.unwrap_or(MemoryLayer::ShortTerm),
    })
}

/// Arguments for `memory_forget`
pub fn forget_args(args: &Value) -> Result<ForgetOptions> {
    let options = ForgetOptions {
        memory_id: opt_str(args, "memoryId")?.map(str::parse).transpose()?,
        older_than: opt_i64(args, "olderThan")?,
        layer: layer_field(args, "layer")?,
        reason: opt_str(args, "reason")?.map(str::to_string),
    };

    if options.memory_id.is_none() && options.older_than.is_none() && options.layer.is_none() {
        return Err(Error::validation(
            "memoryId",
            "one of memoryId, olderThan, or layer is required",
        ));
    }
    if let Some(ref reason) = options.reason {
        check_chars("reason", reason, REASON_LENGTH_CHARS_MAX)?;
    }
    Ok(options)
}

/// Arguments for `memory_list`
pub fn list_args(args: &Value) -> Result<(Option<MemoryLayer>, Option<Vec<String>>, usize)> {
    Ok((
        layer_field(args, "layer")?,
        tags_field(args, "tags")?,
        limit_field(args, LIST_LIMIT_DEFAULT, LIST_LIMIT_MAX)?,
    ))
}
