//! Daily surprise box reward engine.
//!
//! The [`rewards`] module holds the decision pipeline (normalization, rule
//! matching, probability gating, box/rarity selection, karma scaling) plus the
//! service and router that wrap it with date validation and the dedup store.

pub mod config;
pub mod error;
pub mod rewards;
pub mod telemetry;
