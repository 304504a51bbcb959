//! Property tests for the pair-set sort/dedup/scan invariants.

use proptest::prelude::*;
use rill::PairSet;

fn arb_pairs() -> impl Strategy<Value = Vec<(u64, u64)>> {
	prop::collection::vec((1u64..200, 1u64..200), 0..300)
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn compact_is_strictly_ascending_with_no_nils(raw in arb_pairs()) {
		let mut pairs = PairSet::new(0);
		for (k, v) in &raw {
			pairs.push(*k, *v);
		}
		pairs.compact();

		let slice = pairs.as_slice();
		for w in slice.windows(2) {
			prop_assert!(w[0] < w[1], "compacted pair set must be strictly ascending");
		}
		prop_assert!(slice.iter().all(|p| !p.is_nil()));
		prop_assert!(pairs.is_compacted());
	}

	#[test]
	fn compact_is_idempotent(raw in arb_pairs()) {
		let mut pairs = PairSet::new(0);
		for (k, v) in &raw {
			pairs.push(*k, *v);
		}
		pairs.compact();
		let once = pairs.as_slice().to_vec();
		pairs.compact();
		prop_assert_eq!(pairs.as_slice().to_vec(), once);
	}

	#[test]
	fn compact_preserves_the_set_of_distinct_pairs(raw in arb_pairs()) {
		let mut pairs = PairSet::new(0);
		for (k, v) in &raw {
			pairs.push(*k, *v);
		}
		pairs.compact();

		let mut expected: Vec<(u64, u64)> = raw;
		expected.sort_unstable();
		expected.dedup();

		let got: Vec<(u64, u64)> = pairs.iter().map(|p| (p.key, p.val)).collect();
		prop_assert_eq!(got, expected);
	}

	#[test]
	fn scan_key_matches_brute_force_filter(raw in arb_pairs(), keys in prop::collection::vec(1u64..200, 0..10)) {
		let mut pairs = PairSet::new(0);
		for (k, v) in &raw {
			pairs.push(*k, *v);
		}

		let mut out = PairSet::new(0);
		pairs.scan_key(&keys, &mut out);
		out.compact();

		let wanted: std::collections::HashSet<u64> = keys.iter().copied().collect();
		let mut expected: Vec<(u64, u64)> = raw.iter().copied().filter(|(k, _)| wanted.contains(k)).collect();
		expected.sort_unstable();
		expected.dedup();

		let got: Vec<(u64, u64)> = out.iter().map(|p| (p.key, p.val)).collect();
		prop_assert_eq!(got, expected);
	}
}
