//! Weight budget calculation and request splitting.

use crate::RequestKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use turnstile_error::{ConfigError, TurnstileResult};

/// Maximum weight the exchange accepts for a single request.
pub const MAX_WEIGHT: u32 = 200;

/// Chunk size used when recovering from a data limit rejection.
pub const DEFAULT_DATA_LIMIT_CHUNK: usize = 50;

/// Computes request weights and keeps requests under the ceiling.
///
/// # Examples
///
/// ```
/// use turnstile_weight::{RequestKind, WeightBudgeter};
///
/// let budgeter = WeightBudgeter::default();
/// let cost = budgeter.cost(RequestKind::book(), 10, &["EX_BEST_OFFERS", "EX_TRADED"]);
/// assert_eq!(cost, 60);
/// assert!(budgeter.validate(cost, "get_market_prices").is_ok());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct WeightBudgeter {
    /// Largest weight allowed per request.
    ceiling: u32,
}

impl Default for WeightBudgeter {
    fn default() -> Self {
        Self {
            ceiling: MAX_WEIGHT,
        }
    }
}

impl WeightBudgeter {
    /// Creates a budgeter with a custom ceiling.
    ///
    /// # Errors
    ///
    /// Returns an error if the ceiling is zero; no request could ever be sent.
    pub fn new(ceiling: u32) -> TurnstileResult<Self> {
        if ceiling == 0 {
            return Err(ConfigError::new("Weight ceiling must be greater than zero").into());
        }
        Ok(Self { ceiling })
    }

    /// Total weight of a request for `resource_count` resources.
    ///
    /// Linear in `resource_count` for fixed projections.
    #[instrument(skip(self, projections))]
    pub fn cost<S: AsRef<str>>(
        &self,
        kind: RequestKind,
        resource_count: usize,
        projections: &[S],
    ) -> u32 {
        let per_resource = kind.per_resource_weight(projections);
        let count = u32::try_from(resource_count).unwrap_or(u32::MAX);
        let total = count.saturating_mul(per_resource);

        debug!(
            total,
            per_resource, "Request weight: {} resources × {} points", resource_count, per_resource
        );

        total
    }

    /// Rejects a weight above the ceiling before any network round-trip.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the operation when `cost` exceeds the
    /// ceiling.
    pub fn validate(&self, cost: u32, operation: &str) -> TurnstileResult<()> {
        if cost > self.ceiling {
            warn!(operation, cost, ceiling = self.ceiling, "Request weight over ceiling");
            return Err(ConfigError::new(format!(
                "{} weight ({}) exceeds maximum allowed ({}). \
                 Reduce the number of markets or requested data fields.",
                operation, cost, self.ceiling
            ))
            .into());
        }

        debug!(operation, cost, "Request weight within limits");
        Ok(())
    }

    /// Largest resource count whose request stays within the ceiling.
    pub fn max_resources_for<S: AsRef<str>>(&self, kind: RequestKind, projections: &[S]) -> usize {
        let per_resource = kind.per_resource_weight(projections).max(1);
        let max = (self.ceiling / per_resource) as usize;

        debug!(max, per_resource, "Maximum resources per request");
        max
    }

    /// Partitions `resource_ids` into ordered chunks that each fit the ceiling.
    ///
    /// Concatenating the chunks reproduces the input exactly.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a single resource already exceeds the
    /// ceiling with these projections.
    pub fn split<T: Clone, S: AsRef<str>>(
        &self,
        kind: RequestKind,
        resource_ids: &[T],
        projections: &[S],
    ) -> TurnstileResult<Vec<Vec<T>>> {
        let max = self.max_resources_for(kind, projections);
        if max == 0 {
            return Err(ConfigError::new(format!(
                "A single {} resource weighs more than the ceiling ({})",
                kind, self.ceiling
            ))
            .into());
        }

        let chunks: Vec<Vec<T>> = resource_ids.chunks(max).map(<[T]>::to_vec).collect();

        if chunks.len() > 1 {
            info!(
                resources = resource_ids.len(),
                chunks = chunks.len(),
                max_per_chunk = max,
                "Split request to respect weight limits"
            );
        }

        Ok(chunks)
    }
}

/// Splits ids into fixed-size chunks after the exchange reported too much data.
///
/// A `max_per_request` of zero is treated as one.
pub fn chunk_for_data_limit<T: Clone>(resource_ids: &[T], max_per_request: usize) -> Vec<Vec<T>> {
    let chunks: Vec<Vec<T>> = resource_ids
        .chunks(max_per_request.max(1))
        .map(<[T]>::to_vec)
        .collect();

    if chunks.len() > 1 {
        warn!(
            resources = resource_ids.len(),
            chunks = chunks.len(),
            "Split request to avoid data limit errors"
        );
    }

    chunks
}
