//! Append-only interaction journal.

pub mod logger;
pub mod model;

pub use logger::InteractionLogger;
pub use model::InteractionRecord;
