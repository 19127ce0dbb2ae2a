//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file, in-memory and remote (libSQL server / Turso)
//! databases through the same connection type.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::customers::Customer;
use crate::error::DatabaseError;
use crate::interactions::InteractionRecord;
use crate::pipeline::types::Language;
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Connect to a remote libSQL server.
    pub async fn new_remote(url: &str, auth_token: &str) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to reach libSQL server: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(url = url, "Remote database connected");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Fixed-width UTC timestamps, so text order equals time order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Classify a libsql write error: uniqueness violations get their own variant.
fn write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

/// Map a libsql Row to a Customer.
///
/// Column order matches CUSTOMER_COLUMNS.
fn row_to_customer(row: &libsql::Row) -> Result<Customer, libsql::Error> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    Ok(Customer {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        channel_address: row.get(1)?,
        name: row.get::<String>(2).ok(),
        customer_uid: row.get(3)?,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to an InteractionRecord.
///
/// Column order matches INTERACTION_COLUMNS.
fn row_to_interaction(row: &libsql::Row) -> Result<InteractionRecord, libsql::Error> {
    let id_str: String = row.get(0)?;
    let language_str: String = row.get(3)?;
    let booking_intent: i64 = row.get(4)?;
    let name_prompted: i64 = row.get(7)?;
    let timestamp_str: String = row.get(8)?;

    Ok(InteractionRecord {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        channel_address: row.get(1)?,
        body: row.get(2)?,
        detected_language: Language::from_code(&language_str),
        booking_intent: booking_intent != 0,
        name_extracted: row.get::<String>(5).ok(),
        reply_text: row.get(6)?,
        name_prompted: name_prompted != 0,
        timestamp: parse_datetime(&timestamp_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const CUSTOMER_COLUMNS: &str = "id, channel_address, name, customer_uid, created_at, updated_at";

const INTERACTION_COLUMNS: &str = "id, channel_address, body, detected_language, booking_intent, name_extracted, reply_text, name_prompted, timestamp";

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::init_schema(self.conn()).await
    }

    // ── Customers ───────────────────────────────────────────────────

    async fn get_customer_by_address(
        &self,
        channel_address: &str,
    ) -> Result<Option<Customer>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE channel_address = ?1"),
                params![channel_address],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_customer_by_address: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_customer(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Serialization(format!("customer row: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_customer_by_address: {e}"))),
        }
    }

    async fn insert_customer_if_absent(&self, customer: &Customer) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                "INSERT INTO customers (id, channel_address, name, customer_uid, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(channel_address) DO NOTHING",
                params![
                    customer.id.to_string(),
                    customer.channel_address.clone(),
                    opt_text(customer.name.as_deref()),
                    customer.customer_uid.clone(),
                    format_datetime(&customer.created_at),
                    format_datetime(&customer.updated_at),
                ],
            )
            .await
            .map_err(|e| write_error("insert_customer_if_absent", e))?;

        debug!(
            channel_address = %customer.channel_address,
            inserted = inserted > 0,
            "Customer insert attempted"
        );
        Ok(inserted > 0)
    }

    async fn update_customer_name(
        &self,
        id: Uuid,
        name: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = format_datetime(&updated_at);
        let updated = conn
            .execute(
                "UPDATE customers SET name = ?1, updated_at = ?2 WHERE id = ?3",
                params![name, now, id.to_string()],
            )
            .await
            .map_err(|e| write_error("update_customer_name", e))?;

        if updated == 0 {
            return Err(DatabaseError::NotFound {
                entity: "customer".into(),
                id: id.to_string(),
            });
        }
        debug!(id = %id, "Customer name updated");
        Ok(())
    }

    async fn count_customers(&self) -> Result<usize, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM customers", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_customers: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("count_customers: {e}")))?
            .ok_or_else(|| DatabaseError::Query("count_customers: no result row".into()))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("count_customers: {e}")))?;
        Ok(count as usize)
    }

    // ── Interaction log ─────────────────────────────────────────────

    async fn append_interaction(&self, record: &InteractionRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO message_logs (id, channel_address, body, detected_language, booking_intent,
                name_extracted, reply_text, name_prompted, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id.to_string(),
                record.channel_address.clone(),
                record.body.clone(),
                record.detected_language.code(),
                record.booking_intent as i64,
                opt_text(record.name_extracted.as_deref()),
                record.reply_text.clone(),
                record.name_prompted as i64,
                format_datetime(&record.timestamp),
            ],
        )
        .await
        .map_err(|e| write_error("append_interaction", e))?;

        debug!(id = %record.id, channel_address = %record.channel_address, "Interaction appended");
        Ok(())
    }

    async fn list_interactions(
        &self,
        channel_address: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {INTERACTION_COLUMNS} FROM message_logs WHERE channel_address = ?1
                     ORDER BY timestamp ASC, rowid ASC LIMIT ?2"
                ),
                params![channel_address, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_interactions: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_interactions: {e}")))?
        {
            let record = row_to_interaction(&row)
                .map_err(|e| DatabaseError::Serialization(format!("message_logs row: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
