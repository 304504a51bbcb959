//! End-to-end ingest/rotate/query scenarios against a real temp directory.

use std::fs;

use rill::quant::Quant;
use rill::store::Column;
use rill::{Database, Pair, PairSet, Store};
use tempfile::tempdir;

const HOUR: u64 = Quant::Hour.seconds();
const DAY: u64 = Quant::Day.seconds();
const MONTH: u64 = Quant::Month.seconds();

fn regular_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
	fs::read_dir(dir)
		.unwrap()
		.filter_map(|e| e.ok())
		.filter(|e| e.file_type().unwrap().is_file())
		.map(|e| e.path())
		.collect()
}

#[test]
fn single_ingest_single_rotate() {
	let dir = tempdir().unwrap();
	let db = Database::open(dir.path()).unwrap();

	db.ingest(1, 10).unwrap();
	db.ingest(2, 20).unwrap();
	db.ingest(1, 10).unwrap();
	db.rotate(HOUR).unwrap();

	let files = regular_files(dir.path());
	assert_eq!(files.len(), 1, "expected exactly one hourly file, found {files:?}");

	let store = Store::open(&files[0]).unwrap().unwrap();
	let got: Vec<Pair> = store.iter(Column::A).collect();
	assert_eq!(got, vec![Pair::new(1, 10), Pair::new(2, 20)]);
}

#[test]
fn duplicate_collapse() {
	let dir = tempdir().unwrap();
	let db = Database::open(dir.path()).unwrap();

	db.ingest(5, 5).unwrap();
	db.ingest(5, 5).unwrap();
	db.ingest(5, 6).unwrap();
	db.ingest(5, 5).unwrap();
	db.rotate(HOUR).unwrap();

	let files = regular_files(dir.path());
	assert_eq!(files.len(), 1);
	let store = Store::open(&files[0]).unwrap().unwrap();
	assert_eq!(store.pairs().as_slice(), &[Pair::new(5, 5), Pair::new(5, 6)]);
}

#[test]
fn scan_by_key() {
	let dir = tempdir().unwrap();
	let db = Database::open(dir.path()).unwrap();

	for (k, v) in [(1, 10), (1, 11), (2, 20), (3, 30)] {
		db.ingest(k, v).unwrap();
	}
	db.rotate(HOUR).unwrap();

	let mut out = PairSet::new(0);
	db.query_key(&[1, 3], &mut out).unwrap();
	assert_eq!(out.as_slice(), &[Pair::new(1, 10), Pair::new(1, 11), Pair::new(3, 30)]);
}

#[test]
fn scan_by_value() {
	let dir = tempdir().unwrap();
	let db = Database::open(dir.path()).unwrap();

	for (k, v) in [(1, 10), (2, 10), (3, 20)] {
		db.ingest(k, v).unwrap();
	}
	db.rotate(HOUR).unwrap();

	let mut out = PairSet::new(0);
	db.query_val(&[10], &mut out).unwrap();
	assert_eq!(out.as_slice(), &[Pair::new(1, 10), Pair::new(2, 10)]);
}

#[test]
fn daily_merge_unlinks_hourly_sources() {
	let dir = tempdir().unwrap();
	let db = Database::open(dir.path()).unwrap();

	db.ingest(1, 1).unwrap();
	db.rotate(HOUR).unwrap();
	db.ingest(2, 2).unwrap();
	db.rotate(2 * HOUR).unwrap();
	db.ingest(1, 1).unwrap();
	db.rotate(3 * HOUR).unwrap();

	assert_eq!(regular_files(dir.path()).len(), 3, "three hourly files before the day boundary");

	db.rotate(DAY).unwrap();

	let files = regular_files(dir.path());
	assert_eq!(files.len(), 1, "hourly sources must be unlinked after the daily merge, found {files:?}");

	let daily = Store::open(&files[0]).unwrap().unwrap();
	assert_eq!(daily.quant(), Quant::Day);
	assert_eq!(daily.pairs().as_slice(), &[Pair::new(1, 1), Pair::new(2, 2)]);
}

#[test]
fn monthly_expiry_after_full_ring() {
	let dir = tempdir().unwrap();
	let db = Database::open(dir.path()).unwrap();

	let mut ts = 0u64;
	for _ in 0..14 {
		db.ingest(7, 7).unwrap();
		ts += HOUR;
		db.rotate(ts).unwrap();
		ts += DAY - HOUR;
		db.rotate(ts).unwrap();
		ts += MONTH - DAY;
		db.rotate(ts).unwrap();
	}

	// Iteration 0 installed "000000.rill"; iteration 13 wraps the
	// 13-slot monthly ring back to the same slot and must expire it.
	assert!(!dir.path().join("000000.rill").exists(), "oldest monthly file must be unlinked");
	assert!(dir.path().join("000013.rill").exists(), "newest monthly file must be installed");
}

#[test]
fn nil_key_and_nil_value_are_rejected() {
	let dir = tempdir().unwrap();
	let db = Database::open(dir.path()).unwrap();

	assert!(db.ingest(0, 5).is_err());
	assert!(db.ingest(5, 0).is_err());

	db.rotate(HOUR).unwrap();
	assert!(regular_files(dir.path()).is_empty(), "rejected ingests must not have reached the accumulator");
}

#[test]
fn open_skips_corrupt_files_without_aborting() {
	let dir = tempdir().unwrap();
	let db = Database::open(dir.path()).unwrap();
	db.ingest(1, 1).unwrap();
	db.rotate(HOUR).unwrap();
	drop(db);

	fs::write(dir.path().join("000000-00-01.rill"), b"not a real store").unwrap();

	let db = Database::open(dir.path()).unwrap();
	let mut out = PairSet::new(0);
	db.query_key(&[1], &mut out).unwrap();
	assert_eq!(out.as_slice(), &[Pair::new(1, 1)]);
}
