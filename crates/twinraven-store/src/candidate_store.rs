use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use twinraven_types::{CandidateChain, EventId};

use crate::error::Result;
use crate::schema::SCHEMA;

/// Stores `CandidateChain`s produced by the Miner. A chain is immutable once
/// saved; re-mining simply appends new rows rather than updating existing ones.
pub struct CandidateStore {
    conn: Connection,
}

impl CandidateStore {
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

    pub fn save(&self, chain: &CandidateChain) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let sample_ids: Vec<String> = chain.sample_event_ids.iter().map(|e| e.to_string()).collect();
        self.conn.execute(
            "INSERT INTO candidate_chains (id, tools, support, confidence, avg_latency_ms, \
             failure_rate, sample_event_ids, discovered_at, mining_config) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id.to_string(),
                serde_json::to_string(&chain.tools)?,
                chain.support,
                chain.confidence,
                chain.avg_latency_ms,
                chain.failure_rate,
                serde_json::to_string(&sample_ids)?,
                chain.discovered_at.to_rfc3339(),
                serde_json::to_string(&chain.mining_config)?,
            ],
        )?;
        Ok(id)
    }

    pub fn save_all(&mut self, chains: &[CandidateChain]) -> Result<Vec<Uuid>> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(chains.len());
        for chain in chains {
            let id = Uuid::new_v4();
            let sample_ids: Vec<String> =
                chain.sample_event_ids.iter().map(|e| e.to_string()).collect();
            tx.execute(
                "INSERT INTO candidate_chains (id, tools, support, confidence, avg_latency_ms, \
                 failure_rate, sample_event_ids, discovered_at, mining_config) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.to_string(),
                    serde_json::to_string(&chain.tools)?,
                    chain.support,
                    chain.confidence,
                    chain.avg_latency_ms,
                    chain.failure_rate,
                    serde_json::to_string(&sample_ids)?,
                    chain.discovered_at.to_rfc3339(),
                    serde_json::to_string(&chain.mining_config)?,
                ],
            )?;
            ids.push(id);
        }
        tx.commit()?;
        Ok(ids)
    }

    pub fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<CandidateChain>> {
        let mut stmt = self.conn.prepare(
            "SELECT tools, support, confidence, avg_latency_ms, failure_rate, \
             sample_event_ids, discovered_at, mining_config FROM candidate_chains \
             WHERE discovered_at >= ?1 ORDER BY discovered_at ASC",
        )?;
        let chains = stmt
            .query_map([since.to_rfc3339()], row_to_chain)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chains)
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM candidate_chains", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_chain(row: &rusqlite::Row<'_>) -> rusqlite::Result<CandidateChain> {
    let tools: String = row.get(0)?;
    let sample_ids: String = row.get(5)?;
    let discovered_at: String = row.get(6)?;
    let mining_config: String = row.get(7)?;

    let sample_event_ids: Vec<String> = serde_json::from_str(&sample_ids).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CandidateChain {
        tools: serde_json::from_str(&tools).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        support: row.get(1)?,
        confidence: row.get(2)?,
        avg_latency_ms: row.get(3)?,
        failure_rate: row.get(4)?,
        sample_event_ids: sample_event_ids
            .into_iter()
            .map(|s| Uuid::parse_str(&s).map(EventId))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?,
        discovered_at: DateTime::parse_from_rfc3339(&discovered_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?,
        mining_config: serde_json::from_str(&mining_config).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinraven_types::MiningConfig;

    fn chain() -> CandidateChain {
        CandidateChain {
            tools: vec!["search".into(), "read".into()],
            support: 0.4,
            confidence: 0.9,
            avg_latency_ms: 200.0,
            failure_rate: 0.0,
            sample_event_ids: vec![EventId::new()],
            discovered_at: Utc::now(),
            mining_config: MiningConfig::default(),
        }
    }

    #[test]
    fn saves_and_lists_chains() {
        let store = CandidateStore::open_in_memory().unwrap();
        store.save(&chain()).unwrap();
        let since = Utc::now() - chrono::Duration::minutes(1);
        let listed = store.list_since(since).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].tools, vec!["search", "read"]);
    }

    #[test]
    fn count_reflects_saved_rows() {
        let mut store = CandidateStore::open_in_memory().unwrap();
        store.save_all(&[chain(), chain()]).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }
}
