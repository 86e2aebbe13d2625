//! Schema and native record model shared by every backend.
//!
//! # Responsibility
//! - Describe storable entities explicitly instead of deriving them from types.
//! - Define the native record representation backends persist.
//!
//! # Invariants
//! - One entity describes exactly one store slot.

pub mod record;
pub mod schema;
