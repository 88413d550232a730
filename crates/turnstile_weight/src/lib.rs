//! Request weight budgeting.
//!
//! The exchange charges every market data request a weight and rejects requests
//! heavier than a fixed ceiling (200 points). This crate computes that weight
//! locally so oversized requests fail fast or get split before any round-trip.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod budgeter;
mod projection;

pub use budgeter::{DEFAULT_DATA_LIMIT_CHUNK, MAX_WEIGHT, WeightBudgeter, chunk_for_data_limit};
pub use projection::{
    BASE_WEIGHT_PER_RESOURCE, MARKET_PROJECTION_WEIGHTS, MATCH_PROJECTION_WEIGHT,
    ORDER_PROJECTION_WEIGHT, PRICE_PROJECTION_WEIGHTS, RequestKind,
};
