//! C2 — columnar analytical metadata store adapter.
//!
//! Grounded on `original_source/app/storage/core/vast_core.py` (`VASTCore`),
//! concretized with the `clickhouse` crate (see
//! `examples/other_examples/.../RushObservability-query-api` for the same
//! axum+clickhouse pairing). `clickhouse`, like the original's VAST client,
//! has no native row UPDATE/DELETE by primary key — this adapter emulates
//! both as delete-then-insert, same as `VASTCore.update_record` documents.

use crate::error::TamsError;
use clickhouse::Client;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A predicate compiled into a parameterized `WHERE` clause, mirroring the
/// equality/`IN` filter building in `VASTCore.query_records`.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    clauses: Vec<String>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: &str) -> Self {
        self.clauses.push(format!("{column} = '{}'", escape(value)));
        self
    }

    pub fn eq_uuid(mut self, column: &str, value: uuid::Uuid) -> Self {
        self.clauses.push(format!("{column} = '{value}'"));
        self
    }

    pub fn eq_num<T: std::fmt::Display>(mut self, column: &str, value: T) -> Self {
        self.clauses.push(format!("{column} = {value}"));
        self
    }

    pub fn in_list(mut self, column: &str, values: &[String]) -> Self {
        if values.is_empty() {
            self.clauses.push("1 = 0".to_string());
            return self;
        }
        let quoted: Vec<String> = values.iter().map(|v| format!("'{}'", escape(v))).collect();
        self.clauses.push(format!("{column} IN ({})", quoted.join(", ")));
        self
    }

    pub fn to_where_clause(&self) -> String {
        if self.clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

pub struct TableStats {
    pub row_count: u64,
    pub table_name: String,
}

/// Connects to one of an ordered list of endpoints, walking the list on
/// failure — ported from `VASTCore.connect`'s recursive next-endpoint retry.
pub struct MetadataStore {
    client: Client,
    database: String,
}

impl MetadataStore {
    pub async fn connect(endpoints: &[String], database: &str, user: &str, password: &str) -> Result<Self, TamsError> {
        let mut last_err: Option<String> = None;
        for endpoint in endpoints {
            let client = Client::default()
                .with_url(endpoint)
                .with_user(user)
                .with_password(password)
                .with_database(database);
            match tokio::time::timeout(CONNECT_TIMEOUT, client.query("SELECT 1").fetch_all::<u8>()).await {
                Ok(Ok(_)) => {
                    tracing::info!(endpoint = %endpoint, "connected to metadata store");
                    return Ok(Self {
                        client,
                        database: database.to_string(),
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "metadata endpoint rejected connection, trying next");
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    tracing::warn!(endpoint = %endpoint, "metadata endpoint timed out, trying next");
                    last_err = Some(format!("timeout connecting to {endpoint}"));
                }
            }
        }
        Err(TamsError::StorageUnavailable(format!(
            "exhausted all metadata endpoints: {}",
            last_err.unwrap_or_else(|| "no endpoints configured".to_string())
        )))
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, TamsError> {
        let count: u64 = self
            .client
            .query("SELECT count() FROM system.tables WHERE database = ? AND name = ?")
            .bind(&self.database)
            .bind(table)
            .fetch_one()
            .await
            .map_err(|e| TamsError::StorageError(format!("table_exists('{table}') failed: {e}")))?;
        Ok(count > 0)
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, TamsError> {
        self.client
            .query("SELECT name FROM system.tables WHERE database = ?")
            .bind(&self.database)
            .fetch_all::<String>()
            .await
            .map_err(|e| TamsError::StorageError(format!("list_tables failed: {e}")))
    }

    /// DDL is executed verbatim; callers supply the full `CREATE TABLE`
    /// statement (MergeTree engine, ordering key, etc.) since schemas differ
    /// per entity table.
    pub async fn create_table(&self, ddl: &str) -> Result<(), TamsError> {
        self.client
            .query(ddl)
            .execute()
            .await
            .map_err(|e| TamsError::StorageError(format!("create_table failed: {e}")))
    }

    pub async fn drop_table(&self, table: &str) -> Result<(), TamsError> {
        self.client
            .query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute()
            .await
            .map_err(|e| TamsError::StorageError(format!("drop_table('{table}') failed: {e}")))
    }

    pub async fn get_table_stats(&self, table: &str) -> Result<TableStats, TamsError> {
        let row_count: u64 = self
            .client
            .query("SELECT total_rows FROM system.tables WHERE database = ? AND name = ?")
            .bind(&self.database)
            .bind(table)
            .fetch_one()
            .await
            .map_err(|e| TamsError::StorageError(format!("get_table_stats('{table}') failed: {e}")))?;
        Ok(TableStats {
            row_count,
            table_name: table.to_string(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Column-oriented bulk insert, chunked into `batch_size`-row inserts so
    /// a single oversized request doesn't exceed the engine's insert limits
    /// (§5 "Backpressure"). Returns the total number of rows inserted.
    pub async fn insert_batch<T>(&self, table: &str, rows: &[T], batch_size: usize) -> Result<usize, TamsError>
    where
        T: clickhouse::Row + serde::Serialize,
    {
        let batch_size = batch_size.max(1);
        let mut inserted = 0;
        for chunk in rows.chunks(batch_size) {
            let mut insert = self
                .client
                .insert(table)
                .map_err(|e| TamsError::StorageError(format!("insert_batch('{table}') failed: {e}")))?;
            for row in chunk {
                insert
                    .write(row)
                    .await
                    .map_err(|e| TamsError::StorageError(format!("insert_batch('{table}') failed: {e}")))?;
            }
            insert
                .end()
                .await
                .map_err(|e| TamsError::StorageError(format!("insert_batch('{table}') failed: {e}")))?;
            inserted += chunk.len();
        }
        Ok(inserted)
    }

    /// `update` is emulated as delete-then-insert since the backing store has
    /// no native row UPDATE, per `VASTCore.update_record`'s documented
    /// constraint. Callers provide the delete predicate and the replacement
    /// row insertion themselves via `client()`; this helper only runs the
    /// delete half so both legs share one retry/error path.
    pub async fn delete(&self, table: &str, predicate: &Predicate) -> Result<(), TamsError> {
        let sql = format!(
            "ALTER TABLE {table} DELETE WHERE {}",
            predicate.to_where_clause()
        );
        self.client
            .query(&sql)
            .execute()
            .await
            .map_err(|e| TamsError::StorageError(format!("delete from '{table}' failed: {e}")))
    }

    pub async fn count(&self, table: &str, predicate: &Predicate) -> Result<u64, TamsError> {
        let sql = format!("SELECT count() FROM {table} WHERE {}", predicate.to_where_clause());
        self.client
            .query(&sql)
            .fetch_one()
            .await
            .map_err(|e| TamsError::StorageError(format!("count on '{table}' failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_with_no_clauses_matches_everything() {
        assert_eq!(Predicate::new().to_where_clause(), "1 = 1");
    }

    #[test]
    fn predicate_combines_eq_clauses_with_and() {
        let p = Predicate::new().eq("flow_id", "abc").eq("status", "pending");
        assert_eq!(p.to_where_clause(), "flow_id = 'abc' AND status = 'pending'");
    }

    #[test]
    fn predicate_escapes_single_quotes() {
        let p = Predicate::new().eq("label", "o'brien");
        assert_eq!(p.to_where_clause(), "label = 'o''brien'");
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let p = Predicate::new().in_list("id", &[]);
        assert_eq!(p.to_where_clause(), "1 = 0");
    }

    #[test]
    fn in_list_compiles_to_sql_in_clause() {
        let p = Predicate::new().in_list("id", &["a".to_string(), "b".to_string()]);
        assert_eq!(p.to_where_clause(), "id IN ('a', 'b')");
    }
}
