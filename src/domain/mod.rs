//! Domain layer containing business rules and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors)
//! - `entitlement` - Subscriber state, attempt payloads, entitlement rules
//! - `billing` - Provider events, subscription facts, webhook verification
//! - `audit` - Audit action vocabulary and entries

pub mod audit;
pub mod billing;
pub mod entitlement;
pub mod foundation;
