//! Domain logic for span querying
//!
//! - `attrkey` - registry of well-known attribute keys
//! - `spans` - filters, query plans, bucketing and aggregation

pub mod attrkey;
pub mod spans;
