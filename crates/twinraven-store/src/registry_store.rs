use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use twinraven_types::{RetirementReason, ToolRecord, ToolVersion, ValidationResult};

use crate::error::Result;
use crate::schema::SCHEMA;

/// Bookkeeping for the `ToolRegistry`: one `tool_records` row per slug, one
/// `tool_versions` row per (slug, version). The versioned definition
/// documents themselves live on disk; this store only tracks their metadata.
pub struct RegistryStore {
    conn: Connection,
}

impl RegistryStore {
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

    pub fn upsert_record(&self, record: &ToolRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tool_records (slug, current_version, definition_path, registered_at, \
             last_used_at, invocation_count, retirement_reason) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(slug) DO UPDATE SET \
             current_version = excluded.current_version, \
             definition_path = excluded.definition_path, \
             last_used_at = excluded.last_used_at, \
             invocation_count = excluded.invocation_count, \
             retirement_reason = excluded.retirement_reason",
            params![
                record.slug,
                record.current_version,
                record.definition_path,
                record.registered_at.to_rfc3339(),
                record.last_used_at.map(|t| t.to_rfc3339()),
                record.invocation_count as i64,
                record.retirement_reason.map(retirement_reason_to_str),
            ],
        )?;
        Ok(())
    }

    pub fn get_record(&self, slug: &str) -> Result<Option<ToolRecord>> {
        self.conn
            .query_row(
                "SELECT slug, current_version, definition_path, registered_at, last_used_at, \
                 invocation_count, retirement_reason FROM tool_records WHERE slug = ?1",
                [slug],
                row_to_record,
            )
            .optional()
            .map_err(crate::error::Error::from)
    }

    pub fn list_records(&self) -> Result<Vec<ToolRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT slug, current_version, definition_path, registered_at, last_used_at, \
             invocation_count, retirement_reason FROM tool_records ORDER BY slug ASC",
        )?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn record_usage(&self, slug: &str, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE tool_records SET last_used_at = ?1, invocation_count = invocation_count + 1 \
             WHERE slug = ?2",
            params![at.to_rfc3339(), slug],
        )?;
        Ok(())
    }

    pub fn set_retirement(&self, slug: &str, reason: RetirementReason) -> Result<()> {
        self.conn.execute(
            "UPDATE tool_records SET retirement_reason = ?1 WHERE slug = ?2",
            params![retirement_reason_to_str(reason), slug],
        )?;
        Ok(())
    }

    pub fn insert_version(&self, version: &ToolVersion) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tool_versions (slug, version, validation, created_at, superseded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                version.slug,
                version.version,
                serde_json::to_string(&version.validation)?,
                version.created_at.to_rfc3339(),
                version.superseded_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn supersede_version(&self, slug: &str, version: u32, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE tool_versions SET superseded_at = ?1 WHERE slug = ?2 AND version = ?3",
            params![at.to_rfc3339(), slug, version],
        )?;
        Ok(())
    }

    pub fn version_history(&self, slug: &str) -> Result<Vec<ToolVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT slug, version, validation, created_at, superseded_at FROM tool_versions \
             WHERE slug = ?1 ORDER BY version ASC",
        )?;
        let versions = stmt
            .query_map([slug], row_to_version)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(versions)
    }
}

fn retirement_reason_to_str(reason: RetirementReason) -> &'static str {
    match reason {
        RetirementReason::Manual => "manual",
        RetirementReason::Unused => "unused",
        RetirementReason::Drift => "drift",
        RetirementReason::FailureSpike => "failure_spike",
        RetirementReason::Superseded => "superseded",
    }
}

fn retirement_reason_from_str(s: &str) -> std::result::Result<RetirementReason, String> {
    match s {
        "manual" => Ok(RetirementReason::Manual),
        "unused" => Ok(RetirementReason::Unused),
        "drift" => Ok(RetirementReason::Drift),
        "failure_spike" => Ok(RetirementReason::FailureSpike),
        "superseded" => Ok(RetirementReason::Superseded),
        other => Err(format!("unknown retirement reason: {}", other)),
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ToolRecord> {
    let registered_at: String = row.get(3)?;
    let last_used_at: Option<String> = row.get(4)?;
    let invocation_count: i64 = row.get(5)?;
    let retirement_reason: Option<String> = row.get(6)?;

    Ok(ToolRecord {
        slug: row.get(0)?,
        current_version: row.get::<_, i64>(1)? as u32,
        definition_path: row.get(2)?,
        registered_at: DateTime::parse_from_rfc3339(&registered_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?,
        last_used_at: last_used_at
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
        invocation_count: invocation_count as u64,
        retirement_reason: retirement_reason
            .map(|s| retirement_reason_from_str(&s))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    Box::<dyn std::error::Error + Send + Sync>::from(e),
                )
            })?,
    })
}

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<ToolVersion> {
    let validation: String = row.get(2)?;
    let created_at: String = row.get(3)?;
    let superseded_at: Option<String> = row.get(4)?;

    Ok(ToolVersion {
        slug: row.get(0)?,
        version: row.get::<_, i64>(1)? as u32,
        validation: serde_json::from_str::<ValidationResult>(&validation).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
            })?,
        superseded_at: superseded_at
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
            })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinraven_types::{EquivalenceScore, SimilarityMethod};

    fn record(slug: &str) -> ToolRecord {
        ToolRecord {
            slug: slug.to_string(),
            current_version: 1,
            definition_path: format!("/tools/{}/1.json", slug),
            registered_at: Utc::now(),
            last_used_at: None,
            invocation_count: 0,
            retirement_reason: None,
        }
    }

    fn validation(slug: &str) -> ValidationResult {
        ValidationResult {
            id: uuid::Uuid::new_v4(),
            tool_slug: slug.to_string(),
            tool_version: 1,
            sessions_replayed: 3,
            equivalence: EquivalenceScore {
                mean: 0.95,
                min: 0.9,
                method: SimilarityMethod::CosineTfidf,
                threshold: 0.8,
            },
            error_parity: true,
            latency_ratio: 1.0,
            pass: true,
            failure_reasons: vec![],
            validated_at: Utc::now(),
        }
    }

    #[test]
    fn upserts_and_reads_back_a_record() {
        let store = RegistryStore::open_in_memory().unwrap();
        store.upsert_record(&record("search-read")).unwrap();
        let back = store.get_record("search-read").unwrap().unwrap();
        assert_eq!(back.current_version, 1);
    }

    #[test]
    fn usage_increments_invocation_count() {
        let store = RegistryStore::open_in_memory().unwrap();
        store.upsert_record(&record("search-read")).unwrap();
        store.record_usage("search-read", Utc::now()).unwrap();
        store.record_usage("search-read", Utc::now()).unwrap();
        let back = store.get_record("search-read").unwrap().unwrap();
        assert_eq!(back.invocation_count, 2);
        assert!(back.last_used_at.is_some());
    }

    #[test]
    fn version_history_orders_by_version() {
        let store = RegistryStore::open_in_memory().unwrap();
        store
            .insert_version(&ToolVersion {
                slug: "search-read".into(),
                version: 1,
                validation: validation("search-read"),
                created_at: Utc::now(),
                superseded_at: None,
            })
            .unwrap();
        store
            .insert_version(&ToolVersion {
                slug: "search-read".into(),
                version: 2,
                validation: validation("search-read"),
                created_at: Utc::now(),
                superseded_at: None,
            })
            .unwrap();
        store.supersede_version("search-read", 1, Utc::now()).unwrap();

        let history = store.version_history("search-read").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].superseded_at.is_some());
        assert!(history[1].superseded_at.is_none());
    }
}
