//! SQLite store for imported usage reports.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::error::ImportError;
use crate::models::{
    DailyUsageRecord,
    LoadMode,
    LoadSummary,
    ModelUsageRecord,
    TokenCounts,
    UsageReport,
    WriteCounts,
};


const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS daily_usage (
    date TEXT PRIMARY KEY,
    input_tokens INTEGER NOT NULL,
    output_tokens INTEGER NOT NULL,
    cache_creation_tokens INTEGER NOT NULL,
    cache_read_tokens INTEGER NOT NULL,
    total_tokens INTEGER NOT NULL,
    total_cost REAL NOT NULL,
    models_used TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS model_usage (
    date TEXT NOT NULL REFERENCES daily_usage(date) ON DELETE CASCADE,
    model_name TEXT NOT NULL,
    input_tokens INTEGER NOT NULL,
    output_tokens INTEGER NOT NULL,
    cache_creation_tokens INTEGER NOT NULL,
    cache_read_tokens INTEGER NOT NULL,
    cost REAL NOT NULL,
    PRIMARY KEY (date, model_name)
);

CREATE INDEX IF NOT EXISTS idx_daily_date ON daily_usage(date DESC);
CREATE INDEX IF NOT EXISTS idx_model_date ON model_usage(date DESC);
CREATE INDEX IF NOT EXISTS idx_model_name ON model_usage(model_name);
"#;


/// Per-model totals across every stored day.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub model_name: String,
    pub days: i64,
    /// Input plus output tokens.
    pub tokens: i64,
    pub cost: f64,
}


/// Handle on the usage store.
pub struct UsageStore {
    conn: Connection,
    path: PathBuf,
}


impl UsageStore {
    /// Open (creating if needed) the store at `db_path`.
    ///
    /// Waits up to `lock_timeout` whenever another process holds the write lock.
    pub fn open(db_path: &Path, lock_timeout: Duration) -> Result<Self, ImportError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ImportError::StoreIo {
                path: db_path.to_path_buf(),
                source,
            })?;
        }

        let store_err = |e| ImportError::from_store(db_path, e);

        let conn = Connection::open(db_path).map_err(store_err)?;
        conn.busy_timeout(lock_timeout).map_err(store_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;

        debug!(path = %db_path.display(), "store opened");

        Ok(Self {
            conn,
            path: db_path.to_path_buf(),
        })
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a validated report in a single transaction.
    ///
    /// Any failure rolls back every write made by this call.
    pub fn load(&mut self, report: &UsageReport, mode: LoadMode) -> Result<LoadSummary, ImportError> {
        let path = self.path.clone();
        let store_err = |e| ImportError::from_store(&path, e);

        // IMMEDIATE takes the write lock now instead of at the first write
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_err)?;

        let (daily, models) = match mode {
            LoadMode::FullReplace => replace_all(&tx, report),
            LoadMode::IncrementalMerge => merge(&tx, report),
        }
        .map_err(store_err)?;

        let (daily_total, model_total) = count_rows(&tx).map_err(store_err)?;
        tx.commit().map_err(store_err)?;

        info!(
            mode = mode.as_str(),
            daily_inserted = daily.inserted,
            daily_updated = daily.updated,
            model_inserted = models.inserted,
            model_updated = models.updated,
            "import committed"
        );

        Ok(LoadSummary {
            mode: mode.as_str(),
            daily: WriteCounts { total: daily_total, ..daily },
            models: WriteCounts { total: model_total, ..models },
            stats: report.stats,
        })
    }

    /// All daily records, oldest first.
    #[cfg(test)]
    pub fn daily_usage(&self) -> Result<Vec<DailyUsageRecord>, ImportError> {
        self.query_daily(
            "SELECT date, input_tokens, output_tokens, cache_creation_tokens, cache_read_tokens,
                    total_tokens, total_cost, models_used
             FROM daily_usage ORDER BY date",
            None,
        )
    }

    /// The newest `limit` daily records, newest first.
    pub fn recent_days(&self, limit: usize) -> Result<Vec<DailyUsageRecord>, ImportError> {
        self.query_daily(
            "SELECT date, input_tokens, output_tokens, cache_creation_tokens, cache_read_tokens,
                    total_tokens, total_cost, models_used
             FROM daily_usage ORDER BY date DESC LIMIT ?1",
            Some(limit as i64),
        )
    }

    fn query_daily(&self, sql: &str, limit: Option<i64>) -> Result<Vec<DailyUsageRecord>, ImportError> {
        let store_err = |e| ImportError::from_store(&self.path, e);
        let mut stmt = self.conn.prepare(sql).map_err(store_err)?;

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<DailyUsageRecord> {
            let models_used: String = row.get(7)?;
            Ok(DailyUsageRecord {
                date: row.get(0)?,
                tokens: TokenCounts {
                    input_tokens: row.get(1)?,
                    output_tokens: row.get(2)?,
                    cache_creation_tokens: row.get(3)?,
                    cache_read_tokens: row.get(4)?,
                },
                total_tokens: row.get(5)?,
                total_cost: row.get(6)?,
                models_used: DailyUsageRecord::parse_models_column(&models_used),
            })
        };

        let rows = match limit {
            Some(limit) => stmt.query_map(params![limit], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(store_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    /// All model records ordered by date, then model name.
    #[cfg(test)]
    pub fn model_usage(&self) -> Result<Vec<ModelUsageRecord>, ImportError> {
        let store_err = |e| ImportError::from_store(&self.path, e);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT date, model_name, input_tokens, output_tokens,
                        cache_creation_tokens, cache_read_tokens, cost
                 FROM model_usage ORDER BY date, model_name",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ModelUsageRecord {
                    date: row.get(0)?,
                    model_name: row.get(1)?,
                    tokens: TokenCounts {
                        input_tokens: row.get(2)?,
                        output_tokens: row.get(3)?,
                        cache_creation_tokens: row.get(4)?,
                        cache_read_tokens: row.get(5)?,
                    },
                    cost: row.get(6)?,
                })
            })
            .map_err(store_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    /// Per-model totals, most expensive first.
    pub fn model_summary(&self) -> Result<Vec<ModelSummary>, ImportError> {
        let store_err = |e| ImportError::from_store(&self.path, e);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT model_name, COUNT(*), COALESCE(SUM(input_tokens + output_tokens), 0),
                        COALESCE(SUM(cost), 0.0)
                 FROM model_usage
                 GROUP BY model_name
                 ORDER BY SUM(cost) DESC, model_name",
            )
            .map_err(store_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ModelSummary {
                    model_name: row.get(0)?,
                    days: row.get(1)?,
                    tokens: row.get(2)?,
                    cost: row.get(3)?,
                })
            })
            .map_err(store_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    /// Cache creation and cache read token sums over every stored day.
    pub fn cache_totals(&self) -> Result<(i64, i64), ImportError> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(cache_creation_tokens), 0), COALESCE(SUM(cache_read_tokens), 0)
                 FROM daily_usage",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| ImportError::from_store(&self.path, e))
    }

    /// Row counts of `daily_usage` and `model_usage`.
    pub fn table_counts(&self) -> Result<(i64, i64), ImportError> {
        count_rows(&self.conn).map_err(|e| ImportError::from_store(&self.path, e))
    }
}


/// Discard both tables, then write the whole report.
fn replace_all(tx: &Transaction<'_>, report: &UsageReport) -> rusqlite::Result<(WriteCounts, WriteCounts)> {
    let cleared_models = tx.execute("DELETE FROM model_usage", [])?;
    let cleared_days = tx.execute("DELETE FROM daily_usage", [])?;
    debug!(cleared_days, cleared_models, "cleared existing rows");

    upsert_report(tx, report)
}


/// Upsert the report by key, leaving other rows alone.
fn merge(tx: &Transaction<'_>, report: &UsageReport) -> rusqlite::Result<(WriteCounts, WriteCounts)> {
    upsert_report(tx, report)
}


fn upsert_report(tx: &Transaction<'_>, report: &UsageReport) -> rusqlite::Result<(WriteCounts, WriteCounts)> {
    let mut daily = WriteCounts::default();
    let mut models = WriteCounts::default();

    for entry in &report.entries {
        if upsert_day(tx, &entry.day)? {
            daily.updated += 1;
        } else {
            daily.inserted += 1;
        }

        for model in &entry.models {
            if upsert_model(tx, model)? {
                models.updated += 1;
            } else {
                models.inserted += 1;
            }
        }
    }

    Ok((daily, models))
}


/// Insert or update one day. Returns true when the row already existed.
fn upsert_day(tx: &Transaction<'_>, day: &DailyUsageRecord) -> rusqlite::Result<bool> {
    let existed = tx
        .query_row(
            "SELECT 1 FROM daily_usage WHERE date = ?1",
            params![day.date],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    tx.execute(
        "INSERT INTO daily_usage (
            date, input_tokens, output_tokens, cache_creation_tokens,
            cache_read_tokens, total_tokens, total_cost, models_used
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(date) DO UPDATE SET
            input_tokens = excluded.input_tokens,
            output_tokens = excluded.output_tokens,
            cache_creation_tokens = excluded.cache_creation_tokens,
            cache_read_tokens = excluded.cache_read_tokens,
            total_tokens = excluded.total_tokens,
            total_cost = excluded.total_cost,
            models_used = excluded.models_used",
        params![
            day.date,
            day.tokens.input_tokens,
            day.tokens.output_tokens,
            day.tokens.cache_creation_tokens,
            day.tokens.cache_read_tokens,
            day.total_tokens,
            day.total_cost,
            day.models_column(),
        ],
    )?;

    Ok(existed)
}


/// Insert or update one model breakdown. Returns true when the row already existed.
fn upsert_model(tx: &Transaction<'_>, model: &ModelUsageRecord) -> rusqlite::Result<bool> {
    let existed = tx
        .query_row(
            "SELECT 1 FROM model_usage WHERE date = ?1 AND model_name = ?2",
            params![model.date, model.model_name],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    tx.execute(
        "INSERT INTO model_usage (
            date, model_name, input_tokens, output_tokens,
            cache_creation_tokens, cache_read_tokens, cost
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(date, model_name) DO UPDATE SET
            input_tokens = excluded.input_tokens,
            output_tokens = excluded.output_tokens,
            cache_creation_tokens = excluded.cache_creation_tokens,
            cache_read_tokens = excluded.cache_read_tokens,
            cost = excluded.cost",
        params![
            model.date,
            model.model_name,
            model.tokens.input_tokens,
            model.tokens.output_tokens,
            model.tokens.cache_creation_tokens,
            model.tokens.cache_read_tokens,
            model.cost,
        ],
    )?;

    Ok(existed)
}


fn count_rows(conn: &Connection) -> rusqlite::Result<(i64, i64)> {
    conn.query_row(
        "SELECT (SELECT COUNT(*) FROM daily_usage), (SELECT COUNT(*) FROM model_usage)",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_report_str;
    use tempfile::TempDir;

    const EXAMPLE: &str = r#"{"daily":[{"date":"2025-10-01","totalTokens":1000,"totalCost":0.50,
        "inputTokens":600,"outputTokens":400,"cacheReadTokens":0,"cacheCreationTokens":0,
        "modelsUsed":["claude-opus"],
        "modelBreakdowns":[{"modelName":"claude-opus","inputTokens":600,"outputTokens":400,"cost":0.50}]}]}"#;

    const TWO_DAYS: &str = r#"{"daily":[
        {"date":"2025-10-01","totalTokens":100,"totalCost":1.0,"cacheReadTokens":90,"cacheCreationTokens":10,
         "modelsUsed":["opus","sonnet"],
         "modelBreakdowns":[{"modelName":"opus","cost":0.75},{"modelName":"sonnet","cost":0.25}]},
        {"date":"2025-10-02","totalTokens":200,"totalCost":2.0,
         "modelsUsed":["opus"],
         "modelBreakdowns":[{"modelName":"opus","inputTokens":150,"outputTokens":50,"cost":2.0}]}
    ]}"#;

    fn open_store(dir: &TempDir) -> UsageStore {
        UsageStore::open(&dir.path().join("usage.db"), Duration::from_millis(100)).unwrap()
    }

    fn load_str(store: &mut UsageStore, doc: &str, mode: LoadMode) -> LoadSummary {
        let report = parse_report_str(doc).unwrap();
        store.load(&report, mode).unwrap()
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("usage.db");
        let store = UsageStore::open(&path, Duration::ZERO).unwrap();
        assert!(path.exists());
        assert_eq!(store.table_counts().unwrap(), (0, 0));
    }

    #[test]
    fn test_open_reports_directory_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "plain file").unwrap();

        let err = UsageStore::open(&blocker.join("usage.db"), Duration::ZERO)
            .err()
            .unwrap();
        assert_eq!(err.kind(), "StoreWriteError");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn test_model_names_with_commas_read_back() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let doc = r#"{"daily":[{"date":"2025-10-01","totalTokens":1,"totalCost":0.1,
            "modelsUsed":["vendor/model,v2","claude-opus"]}]}"#;
        load_str(&mut store, doc, LoadMode::FullReplace);

        let days = store.daily_usage().unwrap();
        assert_eq!(days[0].models_used, vec!["vendor/model,v2", "claude-opus"]);
    }

    #[test]
    fn test_replace_example_document() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let summary = load_str(&mut store, EXAMPLE, LoadMode::FullReplace);
        assert_eq!(summary.mode, "replace");
        assert_eq!(summary.daily.inserted, 1);
        assert_eq!(summary.models.inserted, 1);

        let days = store.daily_usage().unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, "2025-10-01");
        assert_eq!(days[0].total_tokens, 1000);
        assert_eq!(days[0].total_cost, 0.50);
        assert_eq!(days[0].models_used, vec!["claude-opus"]);

        let models = store.model_usage().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].date, "2025-10-01");
        assert_eq!(models[0].model_name, "claude-opus");
        assert_eq!(models[0].cost, 0.50);
    }

    #[test]
    fn test_replace_discards_previous_rows() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        load_str(&mut store, TWO_DAYS, LoadMode::FullReplace);
        let summary = load_str(&mut store, EXAMPLE, LoadMode::FullReplace);

        assert_eq!(summary.daily.total, 1);
        assert_eq!(summary.models.total, 1);
        assert_eq!(summary.daily.updated, 0);
        assert_eq!(store.table_counts().unwrap(), (1, 1));
    }

    #[test]
    fn test_replace_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        load_str(&mut store, TWO_DAYS, LoadMode::FullReplace);
        let days_once = store.daily_usage().unwrap();
        let models_once = store.model_usage().unwrap();

        load_str(&mut store, TWO_DAYS, LoadMode::FullReplace);
        assert_eq!(store.daily_usage().unwrap(), days_once);
        assert_eq!(store.model_usage().unwrap(), models_once);
        assert_eq!(store.table_counts().unwrap(), (2, 3));
    }

    #[test]
    fn test_one_row_per_key_with_repeated_dates() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        let doc = r#"{"daily":[
            {"date":"2025-10-01","totalTokens":1,"totalCost":0.1,"modelBreakdowns":[{"modelName":"a","cost":0.1}]},
            {"date":"2025-10-01","totalTokens":2,"totalCost":0.2,"modelBreakdowns":[{"modelName":"a","cost":0.2}]}
        ]}"#;
        let summary = load_str(&mut store, doc, LoadMode::FullReplace);
        assert_eq!(summary.daily.written(), 2);

        let days = store.daily_usage().unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].total_tokens, 2);
        let models = store.model_usage().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].cost, 0.2);
    }

    #[test]
    fn test_append_updates_and_inserts() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        load_str(&mut store, EXAMPLE, LoadMode::FullReplace);

        let update = r#"{"daily":[
            {"date":"2025-10-01","totalTokens":1500,"totalCost":0.75,"modelsUsed":["claude-opus"],
             "modelBreakdowns":[{"modelName":"claude-opus","inputTokens":900,"outputTokens":600,"cost":0.75}]},
            {"date":"2025-10-02","totalTokens":10,"totalCost":0.01,"modelsUsed":["claude-haiku"],
             "modelBreakdowns":[{"modelName":"claude-haiku","cost":0.01}]}
        ]}"#;
        let summary = load_str(&mut store, update, LoadMode::IncrementalMerge);

        assert_eq!(summary.mode, "append");
        assert_eq!(summary.daily.inserted, 1);
        assert_eq!(summary.daily.updated, 1);
        assert_eq!(summary.models.inserted, 1);
        assert_eq!(summary.models.updated, 1);
        assert_eq!(summary.daily.total, 2);

        let days = store.daily_usage().unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2025-10-01");
        assert_eq!(days[0].total_tokens, 1500);
        assert_eq!(days[0].total_cost, 0.75);
        assert_eq!(days[1].date, "2025-10-02");

        let models = store.model_usage().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].tokens.input_tokens, 900);
    }

    #[test]
    fn test_append_leaves_absent_rows_untouched() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        load_str(&mut store, TWO_DAYS, LoadMode::FullReplace);

        // 2025-10-01 no longer lists sonnet, and 2025-10-02 is absent
        let update = r#"{"daily":[
            {"date":"2025-10-01","totalTokens":50,"totalCost":0.5,
             "modelBreakdowns":[{"modelName":"opus","cost":0.5}]}
        ]}"#;
        load_str(&mut store, update, LoadMode::IncrementalMerge);

        assert_eq!(store.table_counts().unwrap(), (2, 3));
        let models = store.model_usage().unwrap();
        let sonnet = models
            .iter()
            .find(|m| m.date == "2025-10-01" && m.model_name == "sonnet")
            .unwrap();
        assert_eq!(sonnet.cost, 0.25);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        load_str(&mut store, EXAMPLE, LoadMode::FullReplace);
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON model_usage
                 WHEN NEW.model_name = 'boom'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let doc = r#"{"daily":[
            {"date":"2025-11-01","totalTokens":1,"totalCost":0.1,"modelBreakdowns":[{"modelName":"ok","cost":0.1}]},
            {"date":"2025-11-02","totalTokens":1,"totalCost":0.1,"modelBreakdowns":[{"modelName":"boom","cost":0.1}]}
        ]}"#;
        let report = parse_report_str(doc).unwrap();

        let err = store.load(&report, LoadMode::FullReplace).unwrap_err();
        assert_eq!(err.kind(), "StoreWriteError");

        // The earlier replace is still intact
        let days = store.daily_usage().unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, "2025-10-01");
        assert_eq!(store.table_counts().unwrap(), (1, 1));
    }

    #[test]
    fn test_locked_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usage.db");
        let mut store = UsageStore::open(&path, Duration::ZERO).unwrap();

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let report = parse_report_str(EXAMPLE).unwrap();
        let err = store.load(&report, LoadMode::FullReplace).unwrap_err();
        assert_eq!(err.kind(), "StoreLockedError");

        holder.execute_batch("ROLLBACK;").unwrap();
        assert!(store.load(&report, LoadMode::FullReplace).is_ok());
    }

    #[test]
    fn test_read_back_queries() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&dir);

        load_str(&mut store, TWO_DAYS, LoadMode::FullReplace);

        let recent = store.recent_days(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].date, "2025-10-02");

        let summary = store.model_summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].model_name, "opus");
        assert_eq!(summary[0].days, 2);
        assert_eq!(summary[0].tokens, 200);
        assert!((summary[0].cost - 2.75).abs() < 1e-9);

        assert_eq!(store.cache_totals().unwrap(), (10, 90));
    }
}
