//! Tests for request weight budgeting.

use turnstile_weight::{MAX_WEIGHT, RequestKind, WeightBudgeter, chunk_for_data_limit};

const CATALOGUE_PROJECTIONS: [&str; 4] = [
    "COMPETITION",
    "EVENT",
    "RUNNER_DESCRIPTION",
    "MARKET_DESCRIPTION",
];
const BOOK_PRICES: [&str; 2] = ["EX_BEST_OFFERS", "EX_TRADED"];

#[test]
fn test_catalogue_cost() {
    let budgeter = WeightBudgeter::default();
    // 1 base + 4 projections at 1 point each
    assert_eq!(budgeter.cost(RequestKind::Catalogue, 10, &CATALOGUE_PROJECTIONS), 50);
    assert_eq!(budgeter.cost(RequestKind::Catalogue, 40, &CATALOGUE_PROJECTIONS), 200);
}

#[test]
fn test_book_cost_with_flags() {
    let budgeter = WeightBudgeter::default();
    let kind = RequestKind::Book {
        order_projection: true,
        match_projection: false,
    };
    // 1 base + 2 + 3 + 2 order
    assert_eq!(budgeter.cost(kind, 3, &BOOK_PRICES), 24);
}

#[test]
fn test_cost_is_linear_in_resource_count() {
    let budgeter = WeightBudgeter::default();
    let kinds = [RequestKind::Catalogue, RequestKind::book()];
    let projections: [&[&str]; 3] = [&[], &CATALOGUE_PROJECTIONS, &BOOK_PRICES];

    for kind in kinds {
        for fields in projections {
            for r in [0usize, 1, 7, 33] {
                assert_eq!(
                    budgeter.cost(kind, 2 * r, fields),
                    2 * budgeter.cost(kind, r, fields),
                    "kind={kind} r={r}"
                );
            }
        }
    }
}

#[test]
fn test_unknown_projection_costs_nothing() {
    let budgeter = WeightBudgeter::default();
    let with_unknown = budgeter.cost(RequestKind::Catalogue, 5, &["EVENT", "NOT_A_PROJECTION"]);
    let without = budgeter.cost(RequestKind::Catalogue, 5, &["EVENT"]);
    assert_eq!(with_unknown, without);
}

#[test]
fn test_projection_names_are_case_insensitive() {
    let budgeter = WeightBudgeter::default();
    assert_eq!(
        budgeter.cost(RequestKind::book(), 4, &["ex_best_offers"]),
        budgeter.cost(RequestKind::book(), 4, &["EX_BEST_OFFERS"]),
    );
}

#[test]
fn test_validate_accepts_ceiling_and_rejects_above() {
    let budgeter = WeightBudgeter::default();
    assert!(budgeter.validate(MAX_WEIGHT, "list_market_catalogue").is_ok());

    let err = budgeter
        .validate(MAX_WEIGHT + 1, "list_market_catalogue")
        .unwrap_err();
    assert!(err.is_config());
    let message = format!("{}", err);
    assert!(message.contains("list_market_catalogue"));
    assert!(message.contains("201"));
}

#[test]
fn test_max_resources_for() {
    let budgeter = WeightBudgeter::default();
    assert_eq!(budgeter.max_resources_for::<&str>(RequestKind::Catalogue, &[]), 200);
    assert_eq!(budgeter.max_resources_for(RequestKind::book(), &BOOK_PRICES), 33);
    assert_eq!(budgeter.max_resources_for(RequestKind::book(), &["EX_ALL_OFFERS"]), 33);
}

#[test]
fn test_split_respects_ceiling_and_order() {
    let budgeter = WeightBudgeter::default();
    let ids: Vec<String> = (0..250).map(|i| format!("1.{}", 100_000 + i)).collect();
    let kind = RequestKind::book();

    let chunks = budgeter.split(kind, &ids, &BOOK_PRICES).unwrap();

    assert_eq!(chunks.len(), 8);
    for chunk in &chunks {
        assert!(!chunk.is_empty());
        assert!(budgeter.cost(kind, chunk.len(), &BOOK_PRICES) <= MAX_WEIGHT);
    }
    let rejoined: Vec<String> = chunks.into_iter().flatten().collect();
    assert_eq!(rejoined, ids);
}

#[test]
fn test_split_empty_input() {
    let budgeter = WeightBudgeter::default();
    let ids: Vec<String> = Vec::new();
    let chunks = budgeter.split(RequestKind::Catalogue, &ids, &["EVENT"]).unwrap();
    assert!(chunks.is_empty());
}

#[test]
fn test_split_fails_when_single_resource_too_heavy() {
    let budgeter = WeightBudgeter::new(3).unwrap();
    let ids = vec!["1.1", "1.2"];
    let result = budgeter.split(RequestKind::book(), &ids, &["EX_ALL_OFFERS"]);
    assert!(result.unwrap_err().is_config());
}

#[test]
fn test_zero_ceiling_rejected() {
    assert!(WeightBudgeter::new(0).is_err());
}

#[test]
fn test_chunk_for_data_limit() {
    let ids: Vec<u32> = (0..120).collect();
    let chunks = chunk_for_data_limit(&ids, 50);
    assert_eq!(
        chunks.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![50, 50, 20]
    );
    assert_eq!(chunks.concat(), ids);
}
