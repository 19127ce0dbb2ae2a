//! Appointment availability.
//!
//! `AvailabilityProvider` is the seam a real calendar backend plugs into.
//! Only `MockCalendar` exists today and the reply path does not consult it.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

/// Opening slots offered by the mock calendar, in day order.
const MOCK_SLOTS: [&str; 6] = ["09:00", "10:00", "11:00", "14:00", "15:00", "16:00"];

/// Answer to an availability query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub available: bool,
    /// Free slots as `HH:MM`.
    pub slots: Vec<String>,
    /// Customer-facing summary.
    pub message: String,
}

impl Availability {
    /// Result to use when the backend could not be queried.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            slots: Vec::new(),
            message: "Unable to check availability at this time.".to_string(),
        }
    }
}

#[async_trait]
pub trait AvailabilityProvider: Send + Sync {
    /// Check a date, optionally narrowed to one start time.
    async fn check_availability(&self, date: NaiveDate, time: Option<NaiveTime>) -> Availability;
}

/// Fixed schedule: the same six slots free every day.
#[derive(Debug, Default, Clone)]
pub struct MockCalendar;

#[async_trait]
impl AvailabilityProvider for MockCalendar {
    async fn check_availability(&self, date: NaiveDate, time: Option<NaiveTime>) -> Availability {
        let slots: Vec<String> = MOCK_SLOTS.iter().map(|s| s.to_string()).collect();
        let available = match time {
            Some(t) => {
                let wanted = t.format("%H:%M").to_string();
                slots.contains(&wanted)
            }
            None => true,
        };
        tracing::debug!(%date, ?time, available, "Mock availability check");

        let message = if available {
            "We have several slots available on that date."
        } else {
            "That time is not available, but we have other slots on that date."
        };
        Availability {
            available,
            slots,
            message: message.to_string(),
        }
    }
}
