//! Customer resolver: maps a phone number to one durable customer.
//!
//! Creation relies on the store's unique constraint on `channel_address`:
//! insert-if-absent, then re-read. When two first messages race, the loser's
//! insert is a no-op and it adopts the winner's row, then applies its own
//! name hint (last write wins). No application-level lock is taken.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::model::{Customer, ResolvedCustomer, stored_now};
use crate::error::{DatabaseError, PipelineError};
use crate::pipeline::types::Outcome;
use crate::store::Database;

/// Resolves channel addresses to customers.
pub struct CustomerResolver {
    store: Arc<dyn Database>,
}

impl CustomerResolver {
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self { store }
    }

    /// Find or create the customer for `channel_address`.
    ///
    /// A non-null `name_hint` that differs from the stored name replaces it.
    /// If the store fails, the result is a transient, unpersisted view built
    /// from the hint.
    pub async fn resolve(
        &self,
        channel_address: &str,
        name_hint: Option<&str>,
    ) -> Outcome<ResolvedCustomer> {
        match self.try_resolve(channel_address, name_hint).await {
            Ok(customer) => Outcome::Fresh(ResolvedCustomer::Persisted(customer)),
            Err(e) => {
                warn!(
                    channel_address = %channel_address,
                    error = %e,
                    "Customer resolution failed, continuing with transient customer"
                );
                Outcome::Fallback {
                    value: ResolvedCustomer::transient(channel_address, name_hint),
                    cause: PipelineError::Persistence(e),
                }
            }
        }
    }

    /// Find or create, propagating store errors.
    pub async fn try_resolve(
        &self,
        channel_address: &str,
        name_hint: Option<&str>,
    ) -> Result<Customer, DatabaseError> {
        if let Some(existing) = self.store.get_customer_by_address(channel_address).await? {
            return self.apply_name_hint(existing, name_hint).await;
        }

        let candidate = Customer::new(channel_address, name_hint);
        if self.store.insert_customer_if_absent(&candidate).await? {
            info!(
                channel_address = %channel_address,
                customer_uid = %candidate.customer_uid,
                "New customer created"
            );
            return Ok(candidate);
        }

        // Lost a creation race: adopt the row that won.
        debug!(channel_address = %channel_address, "Customer created concurrently, re-reading");
        let winner = self
            .store
            .get_customer_by_address(channel_address)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "customer".into(),
                id: channel_address.to_string(),
            })?;
        self.apply_name_hint(winner, name_hint).await
    }

    async fn apply_name_hint(
        &self,
        mut customer: Customer,
        name_hint: Option<&str>,
    ) -> Result<Customer, DatabaseError> {
        match name_hint {
            Some(name) if customer.name.as_deref() != Some(name) => {
                let now = stored_now();
                self.store.update_customer_name(customer.id, name, now).await?;
                info!(
                    customer_uid = %customer.customer_uid,
                    "Customer name updated"
                );
                customer.name = Some(name.to_string());
                customer.updated_at = now;
                Ok(customer)
            }
            _ => Ok(customer),
        }
    }
}
