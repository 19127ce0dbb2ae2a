//! Customer identity: one durable record per phone number.

pub mod model;
pub mod resolver;

pub use model::{Customer, ResolvedCustomer, customer_uid};
pub use resolver::CustomerResolver;
