use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use twinraven_types::{Event, EventId, InputHash, Outcome};

use crate::error::{Error, Result};
use crate::schema::SCHEMA;

/// Append-only store of `Event` rows, backed by SQLite.
///
/// Events are written once by the collector; the only mutation permitted
/// after insert is backfilling `successor` once the next call in a session
/// is observed.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn append(&self, event: &Event) -> Result<()> {
        if self.get_by_id(event.id)?.is_some() {
            return Err(Error::DuplicateEvent(event.id));
        }
        self.insert_row(event)
    }

    pub fn append_batch(&mut self, events: &[Event]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for event in events {
            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM events WHERE id = ?1", [event.id.to_string()], |row| {
                    row.get(0)
                })
                .optional()?;
            if exists.is_some() {
                return Err(Error::DuplicateEvent(event.id));
            }
            insert_row_in(&tx, event)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_row(&self, event: &Event) -> Result<()> {
        insert_row_in(&self.conn, event)
    }

    pub fn update_successor(&self, id: EventId, successor: EventId) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE events SET successor = ?1 WHERE id = ?2",
            params![successor.to_string(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("event {}", id)));
        }
        Ok(())
    }

    pub fn get_by_id(&self, id: EventId) -> Result<Option<Event>> {
        self.conn
            .query_row(
                "SELECT id, session_id, tool_id, input_hash, input_params, output_summary, \
                 predecessor, successor, timestamp, latency_ms, outcome, tags \
                 FROM events WHERE id = ?1",
                [id.to_string()],
                row_to_event,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Returns events for a session in chain order: following `predecessor` ->
    /// `successor` links starting from the event with no predecessor. Any
    /// cycle is broken at the point it is detected, and events left unlinked
    /// (an orphan tail, or a session with no single head) are appended in
    /// timestamp order.
    pub fn get_by_session(&self, session_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, tool_id, input_hash, input_params, output_summary, \
             predecessor, successor, timestamp, latency_ms, outcome, tags \
             FROM events WHERE session_id = ?1 ORDER BY timestamp ASC",
        )?;
        let events: Vec<Event> = stmt
            .query_map([session_id], row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(reconstruct_chain_order(events))
    }

    pub fn get_by_tool(&self, tool_id: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, tool_id, input_hash, input_params, output_summary, \
             predecessor, successor, timestamp, latency_ms, outcome, tags \
             FROM events WHERE tool_id = ?1 ORDER BY timestamp ASC",
        )?;
        let events = stmt
            .query_map([tool_id], row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Every stored event across all sessions, in chain order per session.
    /// Used by orchestration code that hands the full event set to a pure
    /// analytical function (the Miner) which applies its own time/session
    /// filters.
    pub fn all_events(&self) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, tool_id, input_hash, input_params, output_summary, \
             predecessor, successor, timestamp, latency_ms, outcome, tags FROM events \
             ORDER BY timestamp ASC",
        )?;
        let events: Vec<Event> = stmt
            .query_map([], row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    pub fn get_sessions(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT session_id FROM events ORDER BY session_id ASC")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Deletes events with `timestamp < cutoff`. Returns the number removed.
    pub fn prune(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        let removed = self
            .conn
            .execute("DELETE FROM events WHERE timestamp < ?1", [cutoff.to_rfc3339()])?;
        Ok(removed as u64)
    }
}

fn insert_row_in(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (id, session_id, tool_id, input_hash, input_params, \
         output_summary, predecessor, successor, timestamp, latency_ms, outcome, tags) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            event.id.to_string(),
            event.session_id,
            event.tool_id,
            event.input_hash.to_hex(),
            serde_json::to_string(&event.input_params)?,
            event.output_summary,
            event.predecessor.map(|p| p.to_string()),
            event.successor.map(|s| s.to_string()),
            event.timestamp.to_rfc3339(),
            event.latency_ms,
            event.outcome.as_str(),
            serde_json::to_string(&event.tags)?,
        ],
    )?;
    Ok(())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let id: String = row.get(0)?;
    let input_hash: String = row.get(3)?;
    let input_params: String = row.get(4)?;
    let predecessor: Option<String> = row.get(6)?;
    let successor: Option<String> = row.get(7)?;
    let timestamp: String = row.get(8)?;
    let outcome: String = row.get(10)?;
    let tags: String = row.get(11)?;

    let parse_id = |s: &str| -> rusqlite::Result<Uuid> {
        Uuid::parse_str(s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    };

    Ok(Event {
        id: EventId(parse_id(&id)?),
        session_id: row.get(1)?,
        tool_id: row.get(2)?,
        input_hash: InputHash(
            u64::from_str_radix(&input_hash, 16)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?,
        ),
        input_params: serde_json::from_str(&input_params).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        output_summary: row.get(5)?,
        predecessor: predecessor.map(|p| parse_id(&p).map(EventId)).transpose()?,
        successor: successor.map(|s| parse_id(&s).map(EventId)).transpose()?,
        timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e)))?,
        latency_ms: row.get(9)?,
        outcome: Outcome::from_str(&outcome).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                10,
                rusqlite::types::Type::Text,
                Box::<dyn std::error::Error + Send + Sync>::from(e),
            )
        })?,
        tags: serde_json::from_str(&tags).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

fn reconstruct_chain_order(events: Vec<Event>) -> Vec<Event> {
    let mut by_id: HashMap<EventId, Event> = events.into_iter().map(|e| (e.id, e)).collect();
    let heads: Vec<EventId> = by_id
        .values()
        .filter(|e| e.predecessor.map(|p| !by_id.contains_key(&p)).unwrap_or(true))
        .map(|e| e.id)
        .collect();

    let mut ordered = Vec::with_capacity(by_id.len());
    let mut visited: HashSet<EventId> = HashSet::new();

    let mut heads_sorted = heads;
    heads_sorted.sort_by_key(|id| by_id.get(id).map(|e| e.timestamp).unwrap());

    for head in heads_sorted {
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            if !visited.insert(id) {
                break; // cycle: stop walking this chain
            }
            let Some(event) = by_id.remove(&id) else { break };
            let next = event.successor;
            ordered.push(event);
            cursor = next;
        }
    }

    let mut orphans: Vec<Event> = by_id.into_values().collect();
    orphans.sort_by_key(|e| e.timestamp);
    ordered.extend(orphans);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;

    fn event(session: &str, predecessor: Option<EventId>) -> Event {
        Event {
            id: EventId::new(),
            session_id: session.to_string(),
            tool_id: "search".to_string(),
            input_hash: InputHash(1),
            input_params: Value::Null,
            output_summary: None,
            predecessor,
            successor: None,
            timestamp: Utc::now(),
            latency_ms: 5,
            outcome: Outcome::Success,
            tags: vec![],
        }
    }

    #[test]
    fn appends_and_reads_back() {
        let store = EventStore::open_in_memory().unwrap();
        let e = event("s1", None);
        store.append(&e).unwrap();
        let back = store.get_by_id(e.id).unwrap().unwrap();
        assert_eq!(back.id, e.id);
    }

    #[test]
    fn rejects_duplicate_id() {
        let store = EventStore::open_in_memory().unwrap();
        let e = event("s1", None);
        store.append(&e).unwrap();
        assert!(matches!(store.append(&e), Err(Error::DuplicateEvent(_))));
    }

    #[test]
    fn backfills_successor() {
        let store = EventStore::open_in_memory().unwrap();
        let first = event("s1", None);
        let second = event("s1", Some(first.id));
        store.append(&first).unwrap();
        store.append(&second).unwrap();
        store.update_successor(first.id, second.id).unwrap();

        let chain = store.get_by_session("s1").unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].id, first.id);
        assert_eq!(chain[1].id, second.id);
    }

    #[test]
    fn session_list_is_distinct_and_sorted() {
        let store = EventStore::open_in_memory().unwrap();
        store.append(&event("s2", None)).unwrap();
        store.append(&event("s1", None)).unwrap();
        store.append(&event("s1", None)).unwrap();
        assert_eq!(store.get_sessions().unwrap(), vec!["s1", "s2"]);
    }

    #[test]
    fn prune_removes_events_before_cutoff() {
        let store = EventStore::open_in_memory().unwrap();
        let mut old = event("s1", None);
        old.timestamp = Utc::now() - chrono::Duration::days(60);
        store.append(&old).unwrap();
        store.append(&event("s1", None)).unwrap();

        let removed = store.prune(Utc::now() - chrono::Duration::days(30)).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().unwrap(), 1);
    }
}
