pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    tool_id TEXT NOT NULL,
    input_hash TEXT NOT NULL,
    input_params TEXT NOT NULL,
    output_summary TEXT,
    predecessor TEXT,
    successor TEXT,
    timestamp TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    outcome TEXT NOT NULL,
    tags TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
CREATE INDEX IF NOT EXISTS idx_events_tool ON events(tool_id);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);

CREATE TABLE IF NOT EXISTS candidate_chains (
    id TEXT PRIMARY KEY,
    tools TEXT NOT NULL,
    support REAL NOT NULL,
    confidence REAL NOT NULL,
    avg_latency_ms REAL NOT NULL,
    failure_rate REAL NOT NULL,
    sample_event_ids TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    mining_config TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_candidates_discovered ON candidate_chains(discovered_at);

CREATE TABLE IF NOT EXISTS tool_records (
    slug TEXT PRIMARY KEY,
    current_version INTEGER NOT NULL,
    definition_path TEXT NOT NULL,
    registered_at TEXT NOT NULL,
    last_used_at TEXT,
    invocation_count INTEGER NOT NULL,
    retirement_reason TEXT
);

CREATE TABLE IF NOT EXISTS tool_versions (
    slug TEXT NOT NULL,
    version INTEGER NOT NULL,
    validation TEXT NOT NULL,
    created_at TEXT NOT NULL,
    superseded_at TEXT,
    PRIMARY KEY (slug, version)
);

CREATE INDEX IF NOT EXISTS idx_tool_versions_slug ON tool_versions(slug);
"#;
