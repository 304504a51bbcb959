//! K-way merge of stores into a new store.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;
use std::sync::Arc;

use crate::error::RillResult;
use crate::pairs::{Pair, PairSet};
use crate::quant::Quant;
use crate::store::{Column, Store, Writer};

/// Merges `stores` into a new store file at `path`, stamped with the
/// caller-supplied `ts`/`quant` rather than anything read from the
/// inputs. The merged, deduplicated pairs are materialized into a
/// [`PairSet`] and handed to the same [`Writer`] path a direct write
/// uses — one index-building code path instead of two, at the cost of
/// holding the *output* (never the sum of inputs) in memory once.
///
/// Sources are read-only throughout: any I/O failure removes the partial
/// output file (via [`Writer::write`]'s own cleanup) and leaves every
/// input untouched.
pub fn merge(path: &Path, ts: u64, quant: Quant, stores: &[Arc<Store>]) -> RillResult<()> {
	let mut cursors: Vec<_> = stores.iter().map(|s| s.iter(Column::A)).collect();
	let mut heap: BinaryHeap<Reverse<(Pair, usize)>> = BinaryHeap::new();
	for (idx, cursor) in cursors.iter_mut().enumerate() {
		if let Some(pair) = cursor.next() {
			heap.push(Reverse((pair, idx)));
		}
	}

	let mut merged = PairSet::new(0);
	let mut last_emitted: Option<Pair> = None;
	while let Some(Reverse((pair, idx))) = heap.pop() {
		if last_emitted != Some(pair) {
			merged.push_pair(pair);
			last_emitted = Some(pair);
		}
		if let Some(next) = cursors[idx].next() {
			heap.push(Reverse((next, idx)));
		}
	}

	Writer::write(path, ts, quant, &merged)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::quant::Quant;
	use tempfile::tempdir;

	fn store_with(dir: &Path, name: &str, ts: u64, pairs: &[(u64, u64)]) -> Arc<Store> {
		let mut p = PairSet::new(0);
		for &(k, v) in pairs {
			p.push(k, v);
		}
		p.compact();
		let path = dir.join(name);
		Writer::write(&path, ts, Quant::Hour, &p).unwrap();
		Arc::new(Store::open(&path).unwrap().unwrap())
	}

	#[test]
	fn merge_unions_and_dedups() {
		let dir = tempdir().unwrap();
		let s1 = store_with(dir.path(), "a.rill", 1, &[(1, 1), (2, 2)]);
		let s2 = store_with(dir.path(), "b.rill", 2, &[(1, 1), (3, 3)]);

		let out = dir.path().join("merged.rill");
		merge(&out, 99, Quant::Day, &[s1, s2]).unwrap();

		let merged = Store::open(&out).unwrap().unwrap();
		assert_eq!(merged.ts(), 99);
		assert_eq!(merged.quant(), Quant::Day);
		assert_eq!(merged.pairs().as_slice(), &[Pair::new(1, 1), Pair::new(2, 2), Pair::new(3, 3)]);
	}

	#[test]
	fn merge_of_single_store_is_identity() {
		let dir = tempdir().unwrap();
		let s1 = store_with(dir.path(), "a.rill", 1, &[(1, 1), (2, 2), (2, 3)]);
		let original: Vec<Pair> = s1.pairs().as_slice().to_vec();

		let out = dir.path().join("merged.rill");
		merge(&out, 1, Quant::Hour, &[s1]).unwrap();
		let merged = Store::open(&out).unwrap().unwrap();
		assert_eq!(merged.pairs().as_slice(), original.as_slice());
	}

	#[test]
	fn merge_with_no_stores_produces_empty_store() {
		let dir = tempdir().unwrap();
		let out = dir.path().join("empty.rill");
		merge(&out, 1, Quant::Month, &[]).unwrap();
		let merged = Store::open(&out).unwrap().unwrap();
		assert_eq!(merged.pair_count(), 0);
	}
}
