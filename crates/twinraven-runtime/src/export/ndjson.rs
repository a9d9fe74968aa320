use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use twinraven_types::Event;

use crate::error::Result;

/// Streams `events` to `path` as line-delimited JSON: one canonical record
/// per line, fields in alphabetical order, ISO-8601 UTC timestamps, lowercase
/// UUIDs. Never buffers the full event set in memory.
pub fn export_ndjson<I>(events: I, path: &Path) -> Result<usize>
where
    I: IntoIterator<Item = Event>,
{
    let mut count = 0usize;
    super::write_atomically(path, |writer| {
        for event in events {
            serde_json::to_writer(&mut *writer, &record(&event))?;
            writer.write_all(b"\n")?;
            count += 1;
        }
        Ok(())
    })?;
    Ok(count)
}

fn record(event: &Event) -> BTreeMap<&'static str, Value> {
    let mut fields = BTreeMap::new();
    fields.insert("id", Value::String(event.id.0.to_string().to_lowercase()));
    fields.insert("input_hash", Value::String(event.input_hash.to_hex()));
    fields.insert("input_params", event.input_params.clone());
    fields.insert("latency_ms", Value::Number(event.latency_ms.into()));
    fields.insert("outcome", Value::String(event.outcome.as_str().to_string()));
    fields.insert(
        "output_summary",
        event.output_summary.clone().map(Value::String).unwrap_or(Value::Null),
    );
    fields.insert(
        "predecessor",
        event
            .predecessor
            .map(|p| Value::String(p.0.to_string().to_lowercase()))
            .unwrap_or(Value::Null),
    );
    fields.insert("session_id", Value::String(event.session_id.clone()));
    fields.insert(
        "successor",
        event
            .successor
            .map(|s| Value::String(s.0.to_string().to_lowercase()))
            .unwrap_or(Value::Null),
    );
    fields.insert(
        "tags",
        Value::Array(event.tags.iter().cloned().map(Value::String).collect()),
    );
    fields.insert("timestamp", Value::String(event.timestamp.to_rfc3339()));
    fields.insert("tool_id", Value::String(event.tool_id.clone()));
    fields
}
