use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use serde_json::Value;
use sha2::{Digest, Sha256};

use twinraven_types::{Event, Outcome};

/// Span-level status, mirrored from an event's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    Error,
    Unset,
}

/// A trace span derived from one `Event`. `session_id` is hashed to a stable
/// 16-byte trace id so every event in a session shares one trace; the event
/// id is truncated to an 8-byte span id. `predecessor` becomes a span link
/// rather than a parent, since TwinRaven's chain links are sibling
/// relationships, not a call-stack nesting.
#[derive(Debug, Clone)]
pub struct Span {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
    pub link: Option<[u8; 8]>,
    pub name: String,
    pub status: SpanStatus,
    pub attributes: BTreeMap<String, Value>,
}

pub fn event_to_span(event: &Event) -> Span {
    Span {
        trace_id: trace_id(&event.session_id),
        span_id: span_id(&event.id.0),
        link: event.predecessor.map(|p| span_id(&p.0)),
        name: event.tool_id.clone(),
        status: match event.outcome {
            Outcome::Success => SpanStatus::Ok,
            Outcome::Failure => SpanStatus::Error,
            Outcome::Partial => SpanStatus::Unset,
        },
        attributes: flatten(&event.input_params, 2),
    }
}

fn trace_id(session_id: &str) -> [u8; 16] {
    let digest = Sha256::digest(session_id.as_bytes());
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

fn span_id(event_id: &uuid::Uuid) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&event_id.as_bytes()[..8]);
    out
}

/// Flattens a JSON object to `attr.nested.key = value` pairs up to `max_depth`
/// levels; anything deeper is serialized as a JSON-string leaf rather than
/// expanded further.
fn flatten(value: &Value, max_depth: usize) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(value, "", max_depth, &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, depth_left: usize, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if depth_left > 0 => {
            for (key, inner) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(inner, &path, depth_left - 1, out);
            }
        }
        other => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), other.clone());
            }
        }
    }
}

/// A bounded in-memory queue of pending spans. On overflow the oldest span is
/// dropped (logged) to make room for the newest — exports favor recency over
/// completeness under sustained backpressure.
pub struct SpanExporter {
    capacity: usize,
    queue: Mutex<VecDeque<Span>>,
}

impl SpanExporter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, span: Span) {
        let mut queue = self.queue.lock().expect("span queue poisoned");
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                tracing::error!(span = %hex(&dropped.span_id), "span queue overflowed, dropping oldest span");
            }
        }
        queue.push_back(span);
    }

    pub fn push_event(&self, event: &Event) {
        self.push(event_to_span(event));
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("span queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every currently queued span, oldest first.
    pub fn drain(&self) -> Vec<Span> {
        let mut queue = self.queue.lock().expect("span queue poisoned");
        queue.drain(..).collect()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
