//! Inbound transports.

pub mod sms;

pub use sms::{APOLOGY_REPLY, ServiceStatus, sms_routes, twiml_message};
