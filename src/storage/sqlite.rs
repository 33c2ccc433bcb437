//! `SQLite` + FTS5 answer store.
//!
//! Records live in a plain `answers` table; question text is mirrored into
//! an FTS5 virtual table for relevance search with `bm25()` ranking.

use crate::models::{AnswerId, AnswerRecord, MessageRef, RefKind, SearchFilter, SearchHit};
use crate::storage::AnswerStore;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::instrument;

/// Helper to acquire the connection lock with poison recovery.
///
/// If the mutex is poisoned by a panic in a previous critical section, the
/// inner value is recovered and a warning is logged; the connection state is
/// still valid.
fn acquire_lock(mutex: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("lorebot_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Builds an FTS5 MATCH expression from free text.
///
/// FTS5 treats `-`, `*`, `"` and `:` as operators, so each whitespace term
/// is quoted (with inner quotes doubled) and terms are OR-ed together.
fn build_fts_query(query: &str) -> String {
    let terms: Vec<_> = query.split_whitespace().collect();
    let mut fts_query = String::with_capacity(terms.iter().map(|t| t.len() + 8).sum());
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            fts_query.push_str(" OR ");
        }
        fts_query.push('"');
        for c in term.chars() {
            if c == '"' {
                fts_query.push_str("\"\"");
            } else {
                fts_query.push(c);
            }
        }
        fts_query.push('"');
    }
    fts_query
}

/// Normalizes a raw `bm25()` score into a positive relevance.
///
/// `SQLite` FTS5 `bm25()` returns negative values where more negative means
/// a better match. Negating and applying a gentle sigmoid maps scores into
/// (0, 1) with higher = better, which keeps the ranking engine's sort key
/// well-behaved.
fn normalize_bm25(score: f64) -> f64 {
    let sigmoid = 1.0 / (1.0 + (-0.5 * -score).exp());
    sigmoid.clamp(0.0, 1.0)
}

/// SQLite-backed answer store.
pub struct SqliteStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    db_path: Option<PathBuf>,
}

struct AnswerRow {
    id: String,
    q_kind: String,
    q_channel: String,
    q_ts: String,
    q_text: String,
    q_raw: String,
    a_kind: String,
    a_channel: String,
    a_ts: String,
    a_text: String,
    a_raw: String,
    returned_count: i64,
    created_at: i64,
}

impl SqliteStore {
    /// Creates a new store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // WAL improves concurrent read behavior; journal_mode returns a
        // string result which execute_batch would choke on, hence pragma_update
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");

        conn.execute(
            "CREATE TABLE IF NOT EXISTS answers (
                id TEXT PRIMARY KEY,
                q_kind TEXT NOT NULL,
                q_channel TEXT NOT NULL,
                q_ts TEXT NOT NULL,
                q_text TEXT NOT NULL,
                q_raw TEXT NOT NULL,
                a_kind TEXT NOT NULL,
                a_channel TEXT NOT NULL,
                a_ts TEXT NOT NULL,
                a_text TEXT NOT NULL,
                a_raw TEXT NOT NULL,
                returned_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_answers_table".to_string(),
            cause: e.to_string(),
        })?;

        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_answers_q_channel ON answers(q_channel)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_answers_created_at ON answers(created_at DESC)",
            [],
        );

        // FTS5 virtual table over question text; joins use answers.id which
        // is already the primary key
        conn.execute(
            "CREATE VIRTUAL TABLE IF NOT EXISTS answers_fts USING fts5(
                id,
                question
            )",
            [],
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_fts_table".to_string(),
            cause: e.to_string(),
        })?;

        Ok(())
    }

    /// Builds the provenance filter clause with numbered parameters.
    fn build_filter_clause(filter: &SearchFilter, start_param: usize) -> (String, Vec<String>, usize) {
        let mut conditions = Vec::new();
        let mut filter_params = Vec::new();
        let mut param_idx = start_param;

        if let Some(ref channel) = filter.channel {
            conditions.push(format!("a.q_channel = ?{param_idx}"));
            param_idx += 1;
            filter_params.push(channel.clone());
        }

        if filter.public_only {
            // Public channel ids begin with C; private groups with G
            conditions.push("a.q_channel LIKE 'C%'".to_string());
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" AND {}", conditions.join(" AND "))
        };

        (clause, filter_params, param_idx)
    }
}

const ROW_COLUMNS: &str = "a.id, a.q_kind, a.q_channel, a.q_ts, a.q_text, a.q_raw, \
     a.a_kind, a.a_channel, a.a_ts, a.a_text, a.a_raw, a.returned_count, a.created_at";

fn row_to_struct(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnswerRow> {
    Ok(AnswerRow {
        id: row.get(0)?,
        q_kind: row.get(1)?,
        q_channel: row.get(2)?,
        q_ts: row.get(3)?,
        q_text: row.get(4)?,
        q_raw: row.get(5)?,
        a_kind: row.get(6)?,
        a_channel: row.get(7)?,
        a_ts: row.get(8)?,
        a_text: row.get(9)?,
        a_raw: row.get(10)?,
        returned_count: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn build_record(row: AnswerRow) -> Result<AnswerRecord> {
    let kind = |s: &str| {
        RefKind::parse(s).ok_or_else(|| Error::OperationFailed {
            operation: "read_answer_row".to_string(),
            cause: format!("unknown ref kind '{s}'"),
        })
    };

    Ok(AnswerRecord {
        id: AnswerId::new(row.id),
        question: MessageRef {
            kind: kind(&row.q_kind)?,
            channel: row.q_channel,
            timestamp: row.q_ts,
            text: row.q_text,
            raw_source: row.q_raw,
        },
        answer: MessageRef {
            kind: kind(&row.a_kind)?,
            channel: row.a_channel,
            timestamp: row.a_ts,
            text: row.a_text,
            raw_source: row.a_raw,
        },
        #[allow(clippy::cast_sign_loss)]
        returned_count: row.returned_count.max(0) as u64,
        #[allow(clippy::cast_sign_loss)]
        created_at: row.created_at.max(0) as u64,
    })
}

impl AnswerStore for SqliteStore {
    #[instrument(skip(self, record), fields(operation = "insert", id = %record.id))]
    fn insert(&self, record: &AnswerRecord) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::OperationFailed {
                operation: "begin_transaction".to_string(),
                cause: e.to_string(),
            })?;

        let result = (|| {
            conn.execute(
                "INSERT INTO answers (id, q_kind, q_channel, q_ts, q_text, q_raw,
                                      a_kind, a_channel, a_ts, a_text, a_raw,
                                      returned_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.id.as_str(),
                    record.question.kind.as_str(),
                    record.question.channel,
                    record.question.timestamp,
                    record.question.text,
                    record.question.raw_source,
                    record.answer.kind.as_str(),
                    record.answer.channel,
                    record.answer.timestamp,
                    record.answer.text,
                    record.answer.raw_source,
                    i64::try_from(record.returned_count).unwrap_or(i64::MAX),
                    i64::try_from(record.created_at).unwrap_or(i64::MAX),
                ],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "insert_answer".to_string(),
                cause: e.to_string(),
            })?;

            conn.execute(
                "INSERT INTO answers_fts (id, question) VALUES (?1, ?2)",
                params![record.id.as_str(), record.question.text],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "insert_answer_fts".to_string(),
                cause: e.to_string(),
            })?;

            Ok(())
        })();

        if result.is_ok() {
            conn.execute("COMMIT", []).map_err(|e| Error::OperationFailed {
                operation: "commit_transaction".to_string(),
                cause: e.to_string(),
            })?;
            metrics::counter!("lorebot_answers_inserted_total").increment(1);
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }

    fn get(&self, id: &AnswerId) -> Result<Option<AnswerRecord>> {
        let conn = acquire_lock(&self.conn);

        let mut stmt = conn
            .prepare(&format!("SELECT {ROW_COLUMNS} FROM answers a WHERE a.id = ?1"))
            .map_err(|e| Error::OperationFailed {
                operation: "prepare_get".to_string(),
                cause: e.to_string(),
            })?;

        let row = stmt
            .query_row(params![id.as_str()], row_to_struct)
            .optional()
            .map_err(|e| Error::OperationFailed {
                operation: "get_answer".to_string(),
                cause: e.to_string(),
            })?;

        row.map(build_record).transpose()
    }

    #[instrument(
        skip(self, query, filter),
        fields(operation = "search", query_length = query.len(), limit = limit)
    )]
    fn search(&self, query: &str, filter: &SearchFilter, limit: usize) -> Result<Vec<SearchHit>> {
        let conn = acquire_lock(&self.conn);

        let fts_query = build_fts_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        // ?1 is the FTS query; filter parameters follow; limit comes last
        let (filter_clause, filter_params, next_param) = Self::build_filter_clause(filter, 2);

        let sql = format!(
            "SELECT {ROW_COLUMNS}, bm25(answers_fts) AS score
             FROM answers_fts
             JOIN answers a ON a.id = answers_fts.id
             WHERE answers_fts MATCH ?1 {filter_clause}
             ORDER BY score
             LIMIT ?{next_param}"
        );

        let mut stmt = conn.prepare(&sql).map_err(|e| Error::OperationFailed {
            operation: "prepare_search".to_string(),
            cause: e.to_string(),
        })?;

        let params: Vec<rusqlite::types::Value> = std::iter::once(fts_query.into())
            .chain(filter_params.into_iter().map(Into::into))
            .chain(std::iter::once(
                i64::try_from(limit).unwrap_or(i64::MAX).into(),
            ))
            .collect();

        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(params),
                |row| {
                    let answer = row_to_struct(row)?;
                    let score: f64 = row.get(13)?;
                    Ok((answer, score))
                },
            )
            .map_err(|e| Error::OperationFailed {
                operation: "execute_search".to_string(),
                cause: e.to_string(),
            })?;

        let mut hits = Vec::new();
        for row in rows {
            let (answer, score) = row.map_err(|e| Error::OperationFailed {
                operation: "read_search_row".to_string(),
                cause: e.to_string(),
            })?;
            hits.push(SearchHit {
                record: build_record(answer)?,
                relevance: normalize_bm25(score),
            });
        }

        metrics::counter!("lorebot_answer_searches_total").increment(1);
        Ok(hits)
    }

    fn bump_returned(&self, ids: &[AnswerId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = acquire_lock(&self.conn);

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "UPDATE answers SET returned_count = returned_count + 1 WHERE id IN ({})",
            placeholders.join(",")
        );

        conn.execute(
            &sql,
            rusqlite::params_from_iter(ids.iter().map(AnswerId::as_str)),
        )
        .map_err(|e| Error::OperationFailed {
            operation: "bump_returned".to_string(),
            cause: e.to_string(),
        })?;

        Ok(())
    }

    #[instrument(skip(self), fields(operation = "delete", id = %id))]
    fn delete(&self, id: &AnswerId) -> Result<bool> {
        let conn = acquire_lock(&self.conn);

        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::OperationFailed {
                operation: "begin_transaction".to_string(),
                cause: e.to_string(),
            })?;

        let result = (|| {
            let deleted = conn
                .execute("DELETE FROM answers WHERE id = ?1", params![id.as_str()])
                .map_err(|e| Error::OperationFailed {
                    operation: "delete_answer".to_string(),
                    cause: e.to_string(),
                })?;

            conn.execute(
                "DELETE FROM answers_fts WHERE id = ?1",
                params![id.as_str()],
            )
            .map_err(|e| Error::OperationFailed {
                operation: "delete_answer_fts".to_string(),
                cause: e.to_string(),
            })?;

            Ok(deleted > 0)
        })();

        if result.is_ok() {
            conn.execute("COMMIT", []).map_err(|e| Error::OperationFailed {
                operation: "commit_transaction".to_string(),
                cause: e.to_string(),
            })?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }

    #[instrument(skip(self), fields(operation = "clear"))]
    fn clear(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        conn.execute("DELETE FROM answers", [])
            .map_err(|e| Error::OperationFailed {
                operation: "clear_answers".to_string(),
                cause: e.to_string(),
            })?;
        conn.execute("DELETE FROM answers_fts", [])
            .map_err(|e| Error::OperationFailed {
                operation: "clear_answers_fts".to_string(),
                cause: e.to_string(),
            })?;

        metrics::counter!("lorebot_answer_store_resets_total").increment(1);
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let conn = acquire_lock(&self.conn);

        conn.query_row("SELECT COUNT(*) FROM answers", [], |row| row.get::<_, i64>(0))
            .map(|n| {
                #[allow(clippy::cast_sign_loss)]
                {
                    n.max(0) as u64
                }
            })
            .map_err(|e| Error::OperationFailed {
                operation: "count_answers".to_string(),
                cause: e.to_string(),
            })
    }
}
