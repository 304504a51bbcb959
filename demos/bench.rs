//! Synthetic ingest/rotate/query workload exercising `rill` end to end.
//! Not part of the crate's public contract.

use std::path::PathBuf;
use std::time::Instant;

use rill::quant::Quant;
use rill::Database;

fn ops_per_sec(total: u64, elapsed: std::time::Duration) -> f64 {
	total as f64 / elapsed.as_secs_f64()
}

fn main() -> rill::RillResult<()> {
	env_logger::init();

	let mut args = std::env::args().skip(1);
	let mut total = 1_000_000u64;
	let mut hours = 6u64;
	let mut dir: Option<PathBuf> = None;

	while let Some(arg) = args.next() {
		match arg.as_str() {
			"--total" => {
				if let Some(v) = args.next().and_then(|s| s.parse::<u64>().ok()) {
					total = v;
				}
			},
			"--hours" => {
				if let Some(v) = args.next().and_then(|s| s.parse::<u64>().ok()) {
					hours = v;
				}
			},
			"--dir" => {
				if let Some(p) = args.next() {
					dir = Some(PathBuf::from(p));
				}
			},
			_ => {},
		}
	}

	let dir = dir.unwrap_or_else(|| std::env::temp_dir().join("rill_bench"));
	if dir.exists() {
		std::fs::remove_dir_all(&dir).ok();
	}

	let db = Database::open(&dir)?;
	let per_hour = (total / hours.max(1)).max(1);

	let start = Instant::now();
	let mut ingested = 0u64;
	let mut now = 0u64;
	for hour in 0..hours {
		for i in 0..per_hour {
			let key = (hour * per_hour + i) % 50_000 + 1;
			let val = i % 10_000 + 1;
			db.ingest(key, val)?;
			ingested += 1;
		}
		now = (hour + 1) * Quant::Hour.seconds();
		db.rotate(now)?;
		log::info!("hour {hour}: rotated at ts={now}, {ingested} pairs ingested so far");
	}

	let elapsed = start.elapsed();
	println!("ingested {ingested} pairs across {hours} hourly rotations in {elapsed:?} ({:.1} ops/s)", ops_per_sec(ingested, elapsed));

	let mut out = rill::PairSet::new(0);
	db.query_key(&[1, 2, 3], &mut out)?;
	println!("query_key([1,2,3]) -> {} pairs", out.len());

	db.close();
	Ok(())
}
