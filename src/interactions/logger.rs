//! Interaction logger: best-effort audit trail of each SMS turn.

use std::sync::Arc;

use tracing::{debug, error};

use super::model::InteractionRecord;
use crate::pipeline::types::ClassificationResult;
use crate::store::Database;

/// Appends one `InteractionRecord` per handled message.
///
/// Attempted once per request. A failed append is reported and dropped;
/// it never changes the reply.
pub struct InteractionLogger {
    store: Arc<dyn Database>,
}

impl InteractionLogger {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self { store }
    }

    /// Record a turn. Returns whether the record was written.
    pub async fn record(
        &self,
        channel_address: &str,
        body: &str,
        classification: &ClassificationResult,
        reply_text: &str,
    ) -> bool {
        let record = InteractionRecord::new(channel_address, body, classification, reply_text);

        match self.store.append_interaction(&record).await {
            Ok(()) => {
                debug!(id = %record.id, channel_address = %channel_address, "Interaction logged");
                true
            }
            Err(e) => {
                error!(
                    channel_address = %channel_address,
                    error = %e,
                    "Failed to log interaction"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::customers::Customer;
    use crate::error::DatabaseError;
    use crate::pipeline::types::Language;
    use crate::store::LibSqlBackend;

    /// Store that accepts customers but rejects every log append.
    struct ReadOnlyLogStore;

    #[async_trait]
    impl Database for ReadOnlyLogStore {
        async fn init_schema(&self) -> Result<(), DatabaseError> {
            Ok(())
        }
        async fn get_customer_by_address(&self, _: &str) -> Result<Option<Customer>, DatabaseError> {
            Ok(None)
        }
        async fn insert_customer_if_absent(&self, _: &Customer) -> Result<bool, DatabaseError> {
            Ok(true)
        }
        async fn update_customer_name(
            &self,
            _: Uuid,
            _: &str,
            _: chrono::DateTime<chrono::Utc>,
        ) -> Result<(), DatabaseError> {
            Ok(())
        }
        async fn count_customers(&self) -> Result<usize, DatabaseError> {
            Ok(0)
        }
        async fn append_interaction(&self, _: &InteractionRecord) -> Result<(), DatabaseError> {
            Err(DatabaseError::Query("disk I/O error".into()))
        }
        async fn list_interactions(
            &self,
            _: &str,
            _: usize,
        ) -> Result<Vec<InteractionRecord>, DatabaseError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn record_appends_to_store() {
        let store: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let logger = InteractionLogger::new(Arc::clone(&store));
        let classification = ClassificationResult {
            detected_language: Language::Fr,
            booking_intent: true,
            name_extracted: None,
            name_prompted: true,
        };

        assert!(logger.record("+15551234567", "Bonjour", &classification, "Salut!").await);

        let records = store.list_interactions("+15551234567", 10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, "Bonjour");
        assert_eq!(records[0].reply_text, "Salut!");
        assert!(records[0].name_prompted);
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let logger = InteractionLogger::new(Arc::new(ReadOnlyLogStore));
        let logged = logger
            .record("+15551234567", "hi", &ClassificationResult::default(), "hello")
            .await;
        assert!(!logged);
    }
}
