//! Property-based tests for core components using proptest.

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use undetermini_core::cost::COST_PRECISION;
use undetermini_core::{Cost, cartesian_product, default_accuracy, hash_value};

fn reversed_object(entries: &[(String, i64)]) -> Value {
    let mut map = Map::new();
    for (k, v) in entries.iter().rev() {
        map.insert(k.clone(), json!(v));
    }
    Value::Object(map)
}

fn object(entries: &[(String, i64)]) -> Value {
    let mut map = Map::new();
    for (k, v) in entries {
        map.insert(k.clone(), json!(v));
    }
    Value::Object(map)
}

// --- Hashing properties ---

proptest! {
    #[test]
    fn hash_ignores_key_order(
        entries in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..12),
    ) {
        let entries: Vec<(String, i64)> = entries.into_iter().collect();
        let forward = json!({"outer": object(&entries), "n": 1});
        let backward = json!({"n": 1, "outer": reversed_object(&entries)});
        prop_assert_eq!(hash_value(&forward), hash_value(&backward));
    }

    #[test]
    fn hash_is_hex_sha256(s in ".*") {
        let digest = hash_value(&json!(s));
        prop_assert_eq!(digest.len(), 64);
        prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_scalars_hash_differently(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        prop_assert_ne!(hash_value(&json!(a)), hash_value(&json!(b)));
    }
}

// --- Factory combinatorics ---

proptest! {
    #[test]
    fn cartesian_product_size_is_product_of_sizes(
        sizes in prop::collection::vec(0usize..5, 1..5),
    ) {
        let sets: Vec<Vec<usize>> = sizes.iter().map(|&n| (0..n).collect()).collect();
        let product = cartesian_product(&sets);
        prop_assert_eq!(product.len(), sizes.iter().product::<usize>());
        for tuple in &product {
            prop_assert_eq!(tuple.len(), sizes.len());
        }
    }
}

// --- Cost arithmetic ---

proptest! {
    #[test]
    fn repeated_addition_is_exact(steps in 1u64..10_000, cents in 1i64..1_000_000) {
        let unit = Cost::from_scaled(cents as i128);
        let mut total = Cost::ZERO;
        for _ in 0..steps {
            total += unit;
        }
        prop_assert_eq!(total, unit * steps);
    }

    #[test]
    fn display_parse_is_lossless(scaled in -10i128.pow(COST_PRECISION + 6)..10i128.pow(COST_PRECISION + 6)) {
        let cost = Cost::from_scaled(scaled);
        let parsed: Cost = cost.to_string().parse().unwrap();
        prop_assert_eq!(parsed, cost);
    }

    #[test]
    fn mean_of_equal_costs_is_that_cost(scaled in 0i128..1_000_000_000, n in 1usize..200) {
        let cost = Cost::from_scaled(scaled);
        prop_assert_eq!(Cost::mean(&vec![cost; n]), cost);
    }
}

// --- Accuracy ---

proptest! {
    #[test]
    fn accuracy_is_a_percentage(
        a in prop::collection::btree_map("[a-c]", 0i64..3, 0..3),
        b in prop::collection::btree_map("[a-c]", 0i64..3, 0..3),
    ) {
        let a: Vec<(String, i64)> = a.into_iter().collect();
        let b: Vec<(String, i64)> = b.into_iter().collect();
        let score = default_accuracy(&object(&a), &object(&b));
        prop_assert!((0.0..=100.0).contains(&score));
        prop_assert_eq!(default_accuracy(&object(&a), &object(&a)), 100.0);
    }
}
