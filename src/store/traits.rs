//! `Database` trait: the async persistence seam.
//!
//! Two logical tables: `customers` (unique on channel address) and
//! `message_logs` (append-only). Only point lookups, single-row writes and
//! appends are needed; nothing here spans a transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::customers::Customer;
use crate::error::DatabaseError;
use crate::interactions::InteractionRecord;

/// Backend-agnostic database trait covering customers and interaction logs.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Customers ───────────────────────────────────────────────────

    /// Look up the customer for a channel address.
    async fn get_customer_by_address(
        &self,
        channel_address: &str,
    ) -> Result<Option<Customer>, DatabaseError>;

    /// Insert a customer unless one already exists for its address.
    ///
    /// Returns `true` if this call created the row. A `false` means another
    /// writer got there first; callers re-read to adopt that row.
    async fn insert_customer_if_absent(&self, customer: &Customer) -> Result<bool, DatabaseError>;

    /// Overwrite a customer's name (last write wins), stamping `updated_at`.
    async fn update_customer_name(
        &self,
        id: Uuid,
        name: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// Total number of customers.
    async fn count_customers(&self) -> Result<usize, DatabaseError>;

    // ── Interaction log ─────────────────────────────────────────────

    /// Append one interaction record.
    async fn append_interaction(&self, record: &InteractionRecord) -> Result<(), DatabaseError>;

    /// Records for one address, oldest first, up to `limit`.
    async fn list_interactions(
        &self,
        channel_address: &str,
        limit: usize,
    ) -> Result<Vec<InteractionRecord>, DatabaseError>;
}
