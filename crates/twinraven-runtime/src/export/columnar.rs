use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use twinraven_types::Event;

use crate::error::Result;

const DEFAULT_BATCH_ROWS: usize = 10_000;

/// One columnar batch: parallel arrays instead of row objects. Nested fields
/// (`input_params`, `tags`) are carried as a native list/JSON column rather
/// than flattened, matching the "typed column, no nested-path expansion"
/// approach a real Parquet writer would take.
#[derive(Debug, Serialize)]
struct Batch {
    ids: Vec<String>,
    session_ids: Vec<String>,
    tool_ids: Vec<String>,
    input_hashes: Vec<String>,
    input_params: Vec<Value>,
    output_summaries: Vec<Option<String>>,
    predecessors: Vec<Option<String>>,
    successors: Vec<Option<String>>,
    /// Microsecond-precision UTC timestamps.
    timestamps_us: Vec<i64>,
    latencies_ms: Vec<i32>,
    outcomes: Vec<String>,
    tags: Vec<Vec<String>>,
}

impl Batch {
    fn with_capacity(cap: usize) -> Self {
        Self {
            ids: Vec::with_capacity(cap),
            session_ids: Vec::with_capacity(cap),
            tool_ids: Vec::with_capacity(cap),
            input_hashes: Vec::with_capacity(cap),
            input_params: Vec::with_capacity(cap),
            output_summaries: Vec::with_capacity(cap),
            predecessors: Vec::with_capacity(cap),
            successors: Vec::with_capacity(cap),
            timestamps_us: Vec::with_capacity(cap),
            latencies_ms: Vec::with_capacity(cap),
            outcomes: Vec::with_capacity(cap),
            tags: Vec::with_capacity(cap),
        }
    }

    fn push(&mut self, event: &Event) {
        self.ids.push(event.id.0.to_string().to_lowercase());
        self.session_ids.push(event.session_id.clone());
        self.tool_ids.push(event.tool_id.clone());
        self.input_hashes.push(event.input_hash.to_hex());
        self.input_params.push(event.input_params.clone());
        self.output_summaries.push(event.output_summary.clone());
        self.predecessors
            .push(event.predecessor.map(|p| p.0.to_string().to_lowercase()));
        self.successors
            .push(event.successor.map(|s| s.0.to_string().to_lowercase()));
        self.timestamps_us
            .push(event.timestamp.timestamp_micros());
        self.latencies_ms.push(event.latency_ms);
        self.outcomes.push(event.outcome.as_str().to_string());
        self.tags.push(event.tags.clone());
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Writes `events` to `path` as a JSON array of row-batches of at most
/// `batch_rows` events each (10 000 by default). A real Parquet writer is the
/// eventual target for this format; this is a typed, batched stand-in that
/// honors the same batching and atomicity contract.
pub fn export_columnar<I>(events: I, path: &Path, batch_rows: Option<usize>) -> Result<usize>
where
    I: IntoIterator<Item = Event>,
{
    let batch_rows = batch_rows.unwrap_or(DEFAULT_BATCH_ROWS).max(1);
    let mut total = 0usize;

    super::write_atomically(path, |writer| {
        writer.write_all(b"[")?;
        let mut batch = Batch::with_capacity(batch_rows);
        let mut first_batch = true;

        for event in events {
            batch.push(&event);
            total += 1;
            if batch.len() >= batch_rows {
                write_batch(&mut *writer, &batch, first_batch)?;
                first_batch = false;
                batch = Batch::with_capacity(batch_rows);
            }
        }
        if batch.len() > 0 {
            write_batch(&mut *writer, &batch, first_batch)?;
        }
        writer.write_all(b"]")?;
        Ok(())
    })?;
    Ok(total)
}

fn write_batch(writer: &mut impl Write, batch: &Batch, first: bool) -> Result<()> {
    if !first {
        writer.write_all(b",")?;
    }
    serde_json::to_writer(writer, batch)?;
    Ok(())
}
