//! SQLite store backend.
//!
//! One database file, six tables:
//! - `projects` — project descriptors, memory fields, aggregate counters
//! - `cache_entries` — tiered analysis cache keyed by (project, hash, level)
//! - `compressed_requests` — the similarity-search corpus of past analyses
//! - `request_patterns` — per-project pattern statistics
//! - `success_memories` — long-lived exploit records
//! - `learning_loops` — append-only test history
//!
//! Counter columns move only through single-statement `UPDATE ... SET x = x + ?`
//! and `INSERT ... ON CONFLICT` forms, so concurrent analyses never lose
//! increments to read-modify-write races.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redtalon_core::{
    CacheEntry, CachedMatch, Category, CompressedRequestRecord, LearningLoop, Outcome, PatternKind,
    PatternRecord, ProjectRecord, ProjectStat, SimilarRequest, Store, StoreError, SuccessMemory,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::vector::{blob_to_embedding, cosine_similarity, embedding_to_blob};

/// The durable SQLite-backed store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// All tables and indexes are created automatically. Pass `":memory:"`
    /// or `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        self.migrate(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id                 TEXT PRIMARY KEY,
                name               TEXT NOT NULL,
                domain             TEXT,
                ai_context_notes   TEXT NOT NULL DEFAULT '',
                learned_patterns   TEXT NOT NULL DEFAULT '[]',
                success_exploits   TEXT NOT NULL DEFAULT '[]',
                requests_analyzed  INTEGER NOT NULL DEFAULT 0,
                tokens_saved       INTEGER NOT NULL DEFAULT 0,
                success_count      INTEGER NOT NULL DEFAULT 0,
                failure_count      INTEGER NOT NULL DEFAULT 0,
                partial_count      INTEGER NOT NULL DEFAULT 0,
                created_at         TEXT NOT NULL,
                updated_at         TEXT NOT NULL
            )
            "#,
            "projects table",
        )
        .await?;

        self.migrate(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                project_id      TEXT NOT NULL,
                request_hash    TEXT NOT NULL,
                cache_level     INTEGER NOT NULL,
                cached_analysis TEXT,
                embedding       BLOB,
                hit_count       INTEGER NOT NULL DEFAULT 0,
                tokens_saved    INTEGER NOT NULL DEFAULT 0,
                expires_at      TEXT,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                PRIMARY KEY (project_id, request_hash, cache_level)
            )
            "#,
            "cache_entries table",
        )
        .await?;

        self.migrate(
            r#"
            CREATE TABLE IF NOT EXISTS compressed_requests (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id      TEXT NOT NULL,
                request_hash    TEXT NOT NULL,
                endpoint        TEXT NOT NULL,
                method          TEXT NOT NULL,
                category        TEXT NOT NULL,
                digest          TEXT NOT NULL,
                embedding       BLOB,
                original_size   INTEGER NOT NULL,
                compressed_size INTEGER NOT NULL,
                created_at      TEXT NOT NULL
            )
            "#,
            "compressed_requests table",
        )
        .await?;

        self.migrate(
            r#"
            CREATE TABLE IF NOT EXISTS request_patterns (
                project_id  TEXT NOT NULL,
                category    TEXT NOT NULL,
                name        TEXT NOT NULL,
                kind        TEXT NOT NULL DEFAULT 'observed',
                confidence  REAL NOT NULL,
                times_seen  INTEGER NOT NULL DEFAULT 1,
                last_seen   TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (project_id, category, name)
            )
            "#,
            "request_patterns table",
        )
        .await?;

        self.migrate(
            r#"
            CREATE TABLE IF NOT EXISTS success_memories (
                id          TEXT NOT NULL,
                project_id  TEXT NOT NULL,
                memory_key  TEXT NOT NULL,
                endpoint    TEXT NOT NULL,
                technique   TEXT NOT NULL,
                result      TEXT NOT NULL,
                confidence  REAL NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                PRIMARY KEY (project_id, memory_key)
            )
            "#,
            "success_memories table",
        )
        .await?;

        self.migrate(
            r#"
            CREATE TABLE IF NOT EXISTS learning_loops (
                id             TEXT PRIMARY KEY,
                project_id     TEXT NOT NULL,
                request_hash   TEXT,
                endpoint       TEXT NOT NULL,
                category       TEXT NOT NULL,
                test_performed TEXT NOT NULL,
                outcome        TEXT NOT NULL,
                notes          TEXT,
                confidence     REAL NOT NULL,
                created_at     TEXT NOT NULL
            )
            "#,
            "learning_loops table",
        )
        .await?;

        self.migrate(
            "CREATE INDEX IF NOT EXISTS idx_cache_entries_expiry ON cache_entries(expires_at)",
            "cache expiry index",
        )
        .await?;
        self.migrate(
            "CREATE INDEX IF NOT EXISTS idx_compressed_requests_endpoint \
             ON compressed_requests(project_id, endpoint, method, created_at DESC)",
            "compressed_requests endpoint index",
        )
        .await?;
        self.migrate(
            "CREATE INDEX IF NOT EXISTS idx_request_patterns_seen \
             ON request_patterns(project_id, times_seen DESC)",
            "request_patterns index",
        )
        .await?;
        self.migrate(
            "CREATE INDEX IF NOT EXISTS idx_learning_loops_project \
             ON learning_loops(project_id, created_at DESC)",
            "learning_loops index",
        )
        .await?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    async fn migrate(&self, sql: &str, what: &str) -> Result<(), StoreError> {
        sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))
    }

    fn row_to_project(row: &SqliteRow) -> Result<ProjectRecord, StoreError> {
        let learned: String = col(row, "learned_patterns")?;
        let exploits: String = col(row, "success_exploits")?;
        let created: String = col(row, "created_at")?;
        let updated: String = col(row, "updated_at")?;

        Ok(ProjectRecord {
            id: col(row, "id")?,
            name: col(row, "name")?,
            domain: col(row, "domain")?,
            ai_context_notes: col(row, "ai_context_notes")?,
            learned_patterns: serde_json::from_str(&learned).unwrap_or_default(),
            success_exploits: serde_json::from_str(&exploits).unwrap_or_default(),
            requests_analyzed: col(row, "requests_analyzed")?,
            tokens_saved: col(row, "tokens_saved")?,
            success_count: col(row, "success_count")?,
            failure_count: col(row, "failure_count")?,
            partial_count: col(row, "partial_count")?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }

    fn row_to_cache_entry(row: &SqliteRow) -> Result<CacheEntry, StoreError> {
        let level: i64 = col(row, "cache_level")?;
        let embedding: Option<Vec<u8>> = row.try_get("embedding").ok();
        let expires: Option<String> = col(row, "expires_at")?;
        let created: String = col(row, "created_at")?;
        let updated: String = col(row, "updated_at")?;

        Ok(CacheEntry {
            project_id: col(row, "project_id")?,
            request_hash: col(row, "request_hash")?,
            cache_level: level as u8,
            cached_analysis: col(row, "cached_analysis")?,
            embedding: embedding.map(|b| blob_to_embedding(&b)),
            hit_count: col(row, "hit_count")?,
            tokens_saved: col(row, "tokens_saved")?,
            expires_at: expires.map(|s| parse_timestamp(&s)),
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }

    fn row_to_pattern(row: &SqliteRow) -> Result<PatternRecord, StoreError> {
        let category: String = col(row, "category")?;
        let kind: String = col(row, "kind")?;
        let last_seen: String = col(row, "last_seen")?;
        let created: String = col(row, "created_at")?;

        Ok(PatternRecord {
            project_id: col(row, "project_id")?,
            category: Category::from_name(&category),
            name: col(row, "name")?,
            kind: PatternKind::from_name(&kind),
            confidence: col(row, "confidence")?,
            times_seen: col(row, "times_seen")?,
            last_seen: parse_timestamp(&last_seen),
            created_at: parse_timestamp(&created),
        })
    }

    fn row_to_success_memory(row: &SqliteRow) -> Result<SuccessMemory, StoreError> {
        let created: String = col(row, "created_at")?;
        let updated: String = col(row, "updated_at")?;

        Ok(SuccessMemory {
            id: col(row, "id")?,
            project_id: col(row, "project_id")?,
            key: col(row, "memory_key")?,
            endpoint: col(row, "endpoint")?,
            technique: col(row, "technique")?,
            result: col(row, "result")?,
            confidence: col(row, "confidence")?,
            created_at: parse_timestamp(&created),
            updated_at: parse_timestamp(&updated),
        })
    }

    fn row_to_learning_loop(row: &SqliteRow) -> Result<LearningLoop, StoreError> {
        let category: String = col(row, "category")?;
        let outcome: String = col(row, "outcome")?;
        let created: String = col(row, "created_at")?;

        Ok(LearningLoop {
            id: col(row, "id")?,
            project_id: col(row, "project_id")?,
            request_hash: col(row, "request_hash")?,
            endpoint: col(row, "endpoint")?,
            category: Category::from_name(&category),
            test_performed: col(row, "test_performed")?,
            outcome: Outcome::from_name(&outcome),
            notes: col(row, "notes")?,
            confidence: col(row, "confidence")?,
            created_at: parse_timestamp(&created),
        })
    }
}

/// Typed column access with a uniform error message.
fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM projects WHERE id = ?1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("project lookup: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_project(r)?)),
            None => Ok(None),
        }
    }

    async fn create_project(&self, project: ProjectRecord) -> Result<(), StoreError> {
        let learned = serde_json::to_string(&project.learned_patterns)
            .map_err(|e| StoreError::Storage(format!("learned_patterns serialization: {e}")))?;
        let exploits = serde_json::to_string(&project.success_exploits)
            .map_err(|e| StoreError::Storage(format!("success_exploits serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                id, name, domain, ai_context_notes, learned_patterns, success_exploits,
                requests_analyzed, tokens_saved, success_count, failure_count, partial_count,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.domain)
        .bind(&project.ai_context_notes)
        .bind(&learned)
        .bind(&exploits)
        .bind(project.requests_analyzed)
        .bind(project.tokens_saved)
        .bind(project.success_count)
        .bind(project.failure_count)
        .bind(project.partial_count)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("project INSERT failed: {e}")))?;

        debug!("Created project {}", project.id);
        Ok(())
    }

    async fn increment_project_stat(
        &self,
        project_id: &str,
        stat: ProjectStat,
        delta: i64,
    ) -> Result<(), StoreError> {
        let column = stat.column();
        let sql = format!(
            "UPDATE projects SET {column} = {column} + ?1, updated_at = ?2 WHERE id = ?3"
        );

        sqlx::query(&sql)
            .bind(delta)
            .bind(Utc::now().to_rfc3339())
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("stat increment failed: {e}")))?;

        Ok(())
    }

    async fn save_project_memory(
        &self,
        project_id: &str,
        notes: &str,
        learned_patterns: &[String],
        success_exploits: &[String],
    ) -> Result<(), StoreError> {
        let learned = serde_json::to_string(learned_patterns)
            .map_err(|e| StoreError::Storage(format!("learned_patterns serialization: {e}")))?;
        let exploits = serde_json::to_string(success_exploits)
            .map_err(|e| StoreError::Storage(format!("success_exploits serialization: {e}")))?;

        sqlx::query(
            r#"
            UPDATE projects
            SET ai_context_notes = ?1, learned_patterns = ?2, success_exploits = ?3,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(notes)
        .bind(&learned)
        .bind(&exploits)
        .bind(Utc::now().to_rfc3339())
        .bind(project_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("memory UPDATE failed: {e}")))?;

        Ok(())
    }

    async fn get_cache_entry(
        &self,
        project_id: &str,
        request_hash: &str,
        level: u8,
    ) -> Result<Option<CacheEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM cache_entries \
             WHERE project_id = ?1 AND request_hash = ?2 AND cache_level = ?3",
        )
        .bind(project_id)
        .bind(request_hash)
        .bind(level as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("cache lookup: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_cache_entry(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert_cache_entry(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let embedding_blob: Option<Vec<u8>> = entry.embedding.as_deref().map(embedding_to_blob);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (
                project_id, request_hash, cache_level, cached_analysis, embedding,
                hit_count, tokens_saved, expires_at, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(project_id, request_hash, cache_level) DO UPDATE SET
                cached_analysis = excluded.cached_analysis,
                embedding = excluded.embedding,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&entry.project_id)
        .bind(&entry.request_hash)
        .bind(entry.cache_level as i64)
        .bind(&entry.cached_analysis)
        .bind(embedding_blob.as_deref())
        .bind(entry.hit_count)
        .bind(entry.tokens_saved)
        .bind(entry.expires_at.map(|t| t.to_rfc3339()))
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("cache INSERT failed: {e}")))?;

        Ok(())
    }

    async fn increment_cache_hit(
        &self,
        project_id: &str,
        request_hash: &str,
        tokens_saved_delta: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE cache_entries
            SET hit_count = hit_count + 1, tokens_saved = tokens_saved + ?1, updated_at = ?2
            WHERE project_id = ?3 AND request_hash = ?4
            "#,
        )
        .bind(tokens_saved_delta)
        .bind(Utc::now().to_rfc3339())
        .bind(project_id)
        .bind(request_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("hit increment failed: {e}")))?;

        Ok(())
    }

    async fn delete_expired_entries(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at < ?1")
                .bind(now.to_rfc3339())
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("expiry sweep failed: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn cache_entries(&self, project_id: &str) -> Result<Vec<CacheEntry>, StoreError> {
        let rows = sqlx::query("SELECT * FROM cache_entries WHERE project_id = ?1")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("cache scan: {e}")))?;

        rows.iter().map(Self::row_to_cache_entry).collect()
    }

    async fn similar_cache_entries(
        &self,
        project_id: &str,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<CachedMatch>, StoreError> {
        let rows = sqlx::query(
            "SELECT request_hash, cached_analysis, embedding FROM cache_entries \
             WHERE project_id = ?1 AND embedding IS NOT NULL AND cached_analysis IS NOT NULL",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("similarity scan: {e}")))?;

        let mut matches = Vec::new();
        for row in &rows {
            let blob: Vec<u8> = col(row, "embedding")?;
            let candidate = blob_to_embedding(&blob);
            let similarity = cosine_similarity(&candidate, embedding);
            if similarity > threshold {
                matches.push(CachedMatch {
                    request_hash: col(row, "request_hash")?,
                    analysis: col(row, "cached_analysis")?,
                    similarity,
                });
            }
        }

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn record_compressed_request(
        &self,
        record: CompressedRequestRecord,
    ) -> Result<(), StoreError> {
        let embedding_blob: Option<Vec<u8>> = record.embedding.as_deref().map(embedding_to_blob);

        sqlx::query(
            r#"
            INSERT INTO compressed_requests (
                project_id, request_hash, endpoint, method, category, digest,
                embedding, original_size, compressed_size, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&record.project_id)
        .bind(&record.request_hash)
        .bind(&record.endpoint)
        .bind(&record.method)
        .bind(record.category.as_str())
        .bind(&record.digest)
        .bind(embedding_blob.as_deref())
        .bind(record.original_size)
        .bind(record.compressed_size)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("compressed request INSERT failed: {e}")))?;

        Ok(())
    }

    async fn find_request_embedding(
        &self,
        project_id: &str,
        endpoint: &str,
        method: &str,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        let row = sqlx::query(
            "SELECT embedding FROM compressed_requests \
             WHERE project_id = ?1 AND endpoint = ?2 AND method = ?3 AND embedding IS NOT NULL \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(project_id)
        .bind(endpoint)
        .bind(method)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("embedding lookup: {e}")))?;

        match row {
            Some(ref r) => {
                let blob: Vec<u8> = col(r, "embedding")?;
                Ok(Some(blob_to_embedding(&blob)))
            }
            None => Ok(None),
        }
    }

    async fn similar_requests(
        &self,
        project_id: &str,
        embedding: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<SimilarRequest>, StoreError> {
        let rows = sqlx::query(
            "SELECT endpoint, method, category, digest, embedding FROM compressed_requests \
             WHERE project_id = ?1 AND embedding IS NOT NULL",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("request similarity scan: {e}")))?;

        let mut matches = Vec::new();
        for row in &rows {
            let blob: Vec<u8> = col(row, "embedding")?;
            let candidate = blob_to_embedding(&blob);
            let similarity = cosine_similarity(&candidate, embedding);
            if similarity > threshold {
                let category: String = col(row, "category")?;
                matches.push(SimilarRequest {
                    endpoint: col(row, "endpoint")?,
                    method: col(row, "method")?,
                    category: Category::from_name(&category),
                    digest: col(row, "digest")?,
                    similarity,
                });
            }
        }

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn observe_pattern(
        &self,
        project_id: &str,
        category: Category,
        name: &str,
        kind: PatternKind,
        initial_confidence: f64,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO request_patterns (
                project_id, category, name, kind, confidence, times_seen, last_seen, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
            ON CONFLICT(project_id, category, name) DO UPDATE SET
                times_seen = times_seen + 1,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(project_id)
        .bind(category.as_str())
        .bind(name)
        .bind(kind.as_str())
        .bind(initial_confidence)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("pattern upsert failed: {e}")))?;

        Ok(())
    }

    async fn patterns_by_names(
        &self,
        project_id: &str,
        category: Category,
        names: &[String],
        limit: usize,
    ) -> Result<Vec<PatternRecord>, StoreError> {
        if names.is_empty() {
            return Ok(vec![]);
        }

        // IN-list binds are built positionally after ?1 and ?2.
        let placeholders: Vec<String> = (0..names.len()).map(|i| format!("?{}", i + 3)).collect();
        let sql = format!(
            "SELECT * FROM request_patterns \
             WHERE project_id = ?1 AND category = ?2 AND name IN ({}) \
             ORDER BY times_seen DESC LIMIT ?{}",
            placeholders.join(", "),
            names.len() + 3
        );

        let mut query = sqlx::query(&sql).bind(project_id).bind(category.as_str());
        for name in names {
            query = query.bind(name);
        }
        query = query.bind(limit as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("pattern lookup: {e}")))?;

        rows.iter().map(Self::row_to_pattern).collect()
    }

    async fn top_patterns(
        &self,
        project_id: &str,
        min_confidence: f64,
        limit: usize,
    ) -> Result<Vec<PatternRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM request_patterns \
             WHERE project_id = ?1 AND confidence > ?2 \
             ORDER BY times_seen DESC LIMIT ?3",
        )
        .bind(project_id)
        .bind(min_confidence)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("top patterns: {e}")))?;

        rows.iter().map(Self::row_to_pattern).collect()
    }

    async fn adjust_pattern_confidence(
        &self,
        project_id: &str,
        name: &str,
        delta: f64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE request_patterns
            SET confidence = MIN(1.0, MAX(0.0, confidence + ?1)), last_seen = ?2
            WHERE project_id = ?3 AND name = ?4
            "#,
        )
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .bind(project_id)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("confidence adjust failed: {e}")))?;

        Ok(())
    }

    async fn prune_patterns(&self, project_id: &str, keep: usize) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM request_patterns
            WHERE project_id = ?1 AND rowid NOT IN (
                SELECT rowid FROM request_patterns
                WHERE project_id = ?1
                ORDER BY times_seen DESC
                LIMIT ?2
            )
            "#,
        )
        .bind(project_id)
        .bind(keep as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("pattern prune failed: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn upsert_success_memory(&self, memory: SuccessMemory) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO success_memories (
                id, project_id, memory_key, endpoint, technique, result, confidence,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(project_id, memory_key) DO UPDATE SET
                endpoint = excluded.endpoint,
                technique = excluded.technique,
                result = excluded.result,
                confidence = excluded.confidence,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&memory.id)
        .bind(&memory.project_id)
        .bind(&memory.key)
        .bind(&memory.endpoint)
        .bind(&memory.technique)
        .bind(&memory.result)
        .bind(memory.confidence)
        .bind(memory.created_at.to_rfc3339())
        .bind(memory.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("success memory upsert failed: {e}")))?;

        Ok(())
    }

    async fn recent_success_memories(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<SuccessMemory>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM success_memories WHERE project_id = ?1 \
             ORDER BY updated_at DESC LIMIT ?2",
        )
        .bind(project_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("success memory scan: {e}")))?;

        rows.iter().map(Self::row_to_success_memory).collect()
    }

    async fn prune_success_memories(
        &self,
        project_id: &str,
        keep: usize,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM success_memories
            WHERE project_id = ?1 AND rowid NOT IN (
                SELECT rowid FROM success_memories
                WHERE project_id = ?1
                ORDER BY updated_at DESC
                LIMIT ?2
            )
            "#,
        )
        .bind(project_id)
        .bind(keep as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("success memory prune failed: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn record_learning_loop(&self, entry: LearningLoop) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO learning_loops (
                id, project_id, request_hash, endpoint, category, test_performed,
                outcome, notes, confidence, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.project_id)
        .bind(&entry.request_hash)
        .bind(&entry.endpoint)
        .bind(entry.category.as_str())
        .bind(&entry.test_performed)
        .bind(entry.outcome.as_str())
        .bind(&entry.notes)
        .bind(entry.confidence)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("learning loop INSERT failed: {e}")))?;

        Ok(())
    }

    async fn recent_learning_loops(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<LearningLoop>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM learning_loops WHERE project_id = ?1 \
             ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(project_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("learning loop scan: {e}")))?;

        rows.iter().map(Self::row_to_learning_loop).collect()
    }
}
