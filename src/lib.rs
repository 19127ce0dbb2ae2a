//! BookingBuddy: SMS booking intake for small businesses.

pub mod calendar;
pub mod channels;
pub mod config;
pub mod customers;
pub mod error;
pub mod interactions;
pub mod llm;
pub mod pipeline;
pub mod store;
