//! Customer identity types.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of every `customer_uid`.
const UID_PREFIX: &str = "cust_";

/// Derive the human-referenceable customer key from a phone number.
///
/// `+1 555-123-4567` and `+15551234567` both become `cust_15551234567`.
/// Identity is the exact address, so the uid is not unique across
/// customers whose addresses differ only in separators.
pub fn customer_uid(channel_address: &str) -> String {
    let digits: String = channel_address
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' '))
        .collect();
    format!("{UID_PREFIX}{digits}")
}

/// Current time at the precision the store keeps (microseconds), so an
/// in-memory `Customer` matches the row it was written to.
pub(crate) fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A durable customer, one per distinct channel address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    /// Phone number, unique across customers.
    pub channel_address: String,
    pub name: Option<String>,
    pub customer_uid: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// A first-contact customer, not yet stored.
    pub fn new(channel_address: &str, name: Option<&str>) -> Self {
        let now = stored_now();
        Self {
            id: Uuid::new_v4(),
            channel_address: channel_address.to_string(),
            name: name.map(String::from),
            customer_uid: customer_uid(channel_address),
            created_at: now,
            updated_at: now,
        }
    }
}

/// What the pipeline knows about the sender for this request.
///
/// `Transient` is used when the store could not be reached: it has no id
/// and nothing was written, but the reply can still use the name hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedCustomer {
    Persisted(Customer),
    Transient {
        channel_address: String,
        name: Option<String>,
        customer_uid: String,
    },
}

impl ResolvedCustomer {
    pub fn transient(channel_address: &str, name: Option<&str>) -> Self {
        Self::Transient {
            channel_address: channel_address.to_string(),
            name: name.map(String::from),
            customer_uid: customer_uid(channel_address),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Persisted(c) => c.name.as_deref(),
            Self::Transient { name, .. } => name.as_deref(),
        }
    }

    pub fn customer_uid(&self) -> &str {
        match self {
            Self::Persisted(c) => &c.customer_uid,
            Self::Transient { customer_uid, .. } => customer_uid,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::Persisted(c) => Some(c.id),
            Self::Transient { .. } => None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_strips_separators() {
        assert_eq!(customer_uid("+1 555-123-4567"), "cust_15551234567");
        assert_eq!(customer_uid("+15551234567"), "cust_15551234567");
    }

    #[test]
    fn uid_is_stable() {
        let addr = "+33 6 12-34-56-78";
        assert_eq!(customer_uid(addr), customer_uid(addr));
        assert_eq!(customer_uid(addr), "cust_33612345678");
    }

    #[test]
    fn uid_keeps_other_characters() {
        // Only '+', '-' and ' ' are separators.
        assert_eq!(customer_uid("(555) 123.4567"), "cust_(555)123.4567");
    }

    #[test]
    fn new_customer_derives_uid() {
        let c = Customer::new("+15550001111", Some("Alice"));
        assert_eq!(c.customer_uid, "cust_15550001111");
        assert_eq!(c.name.as_deref(), Some("Alice"));
        assert_eq!(c.created_at, c.updated_at);
    }

    #[test]
    fn transient_view_has_no_id() {
        let r = ResolvedCustomer::transient("+15550001111", Some("Bob"));
        assert!(r.id().is_none());
        assert!(!r.is_persisted());
        assert_eq!(r.name(), Some("Bob"));
        assert_eq!(r.customer_uid(), "cust_15550001111");
    }
}
