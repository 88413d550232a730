//! Static weight tables for request projections.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Weight charged per resource regardless of projections.
pub const BASE_WEIGHT_PER_RESOURCE: u32 = 1;

/// Market projection weights (catalogue requests), per resource.
pub const MARKET_PROJECTION_WEIGHTS: &[(&str, u32)] = &[
    ("COMPETITION", 1),
    ("EVENT", 1),
    ("EVENT_TYPE", 1),
    ("MARKET_DESCRIPTION", 1),
    ("RUNNER_DESCRIPTION", 1),
    ("RUNNER_METADATA", 2),
    ("MARKET_START_TIME", 1),
];

/// Price projection weights (book requests), per resource.
pub const PRICE_PROJECTION_WEIGHTS: &[(&str, u32)] = &[
    ("EX_BEST_OFFERS", 2),
    ("EX_ALL_OFFERS", 5),
    ("EX_TRADED", 3),
    ("SP_AVAILABLE", 1),
    ("SP_TRADED", 1),
];

/// Extra weight per resource when a book request asks for order projection.
pub const ORDER_PROJECTION_WEIGHT: u32 = 2;

/// Extra weight per resource when a book request asks for match projection.
pub const MATCH_PROJECTION_WEIGHT: u32 = 2;

/// The shape of a weighted request.
///
/// Each kind draws projection weights from its own table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum::Display,
)]
pub enum RequestKind {
    /// Market catalogue listing, priced by market projections
    #[default]
    Catalogue,
    /// Market book (prices), priced by price projections
    Book {
        /// Order projection requested
        order_projection: bool,
        /// Match projection requested
        match_projection: bool,
    },
}

impl RequestKind {
    /// A book request without order or match projection.
    pub fn book() -> Self {
        RequestKind::Book {
            order_projection: false,
            match_projection: false,
        }
    }

    fn table(&self) -> &'static [(&'static str, u32)] {
        match self {
            RequestKind::Catalogue => MARKET_PROJECTION_WEIGHTS,
            RequestKind::Book { .. } => PRICE_PROJECTION_WEIGHTS,
        }
    }

    /// Weight of a single projection name, matched case-insensitively.
    ///
    /// Unknown names cost nothing; the exchange may add projections we do not
    /// know about yet.
    pub fn projection_weight(&self, projection: &str) -> Option<u32> {
        self.table()
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(projection))
            .map(|(_, weight)| *weight)
    }

    /// Weight charged for one resource with the given projections.
    pub fn per_resource_weight<S: AsRef<str>>(&self, projections: &[S]) -> u32 {
        let mut weight = BASE_WEIGHT_PER_RESOURCE;

        for projection in projections {
            let projection = projection.as_ref();
            match self.projection_weight(projection) {
                Some(w) => weight += w,
                None => warn!(kind = %self, projection, "Unknown projection, counting zero weight"),
            }
        }

        if let RequestKind::Book {
            order_projection,
            match_projection,
        } = self
        {
            if *order_projection {
                weight += ORDER_PROJECTION_WEIGHT;
            }
            if *match_projection {
                weight += MATCH_PROJECTION_WEIGHT;
            }
        }

        weight
    }
}
