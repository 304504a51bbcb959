//! Database state, ingest/query facade, and the rotation engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{RillError, RillResult};
use crate::merge;
use crate::naming;
use crate::pairs::PairSet;
use crate::quant::{DAYS, HOURS, MONTHS, Quant};
use crate::store::{Store, Writer};

type Slot = RwLock<Option<Arc<Store>>>;

/// An open database: ingest accumulator, spill buffer, and the three
/// hourly/daily/monthly rings.
///
/// `acc`/`dump` are two separate `Mutex`es rather than the C original's
/// single lock guarding a pointer pair — Rust's aliasing rules require
/// every piece of state reachable from more than one thread to sit
/// behind its own synchronization, even state only one caller
/// (`rotate`) is expected to touch. Both are uncontended in the
/// documented single-rotate-caller usage.
pub struct Database {
	dir: PathBuf,
	ts: AtomicU64,
	acc: Mutex<PairSet>,
	dump: Mutex<PairSet>,
	hourly: Vec<Slot>,
	daily: Vec<Slot>,
	monthly: Vec<Slot>,
}

fn new_ring(n: usize) -> Vec<Slot> {
	(0..n).map(|_| RwLock::new(None)).collect()
}

fn bucket(ts: u64, tier_seconds: u64) -> u64 {
	ts / tier_seconds
}

impl Database {
	/// Opens `dir`, creating it if absent, and loads every regular file
	/// that matches the directory-layout naming patterns as a store,
	/// placing it in the ring slot implied by its `(ts, quant)`. Files
	/// that fail to parse are skipped (already logged by
	/// [`Store::open`]); a duplicate `(quant, slot)` is fatal in debug
	/// builds and rejected-and-closed in release.
	pub fn open(dir: &Path) -> RillResult<Database> {
		fs::create_dir_all(dir)?;

		let db = Database {
			dir: dir.to_path_buf(),
			ts: AtomicU64::new(0),
			acc: Mutex::new(PairSet::new(0)),
			dump: Mutex::new(PairSet::new(0)),
			hourly: new_ring(HOURS),
			daily: new_ring(DAYS),
			monthly: new_ring(MONTHS),
		};

		for entry in fs::read_dir(dir)? {
			let entry = entry?;
			if !entry.file_type()?.is_file() {
				continue;
			}
			let Some(name) = entry.file_name().to_str().map(str::to_owned) else { continue };
			if naming::classify(&name).is_none() {
				continue;
			}
			if let Some(store) = Store::open(&entry.path())? {
				db.install_on_open(store);
			}
		}

		Ok(db)
	}

	fn ring_for(&self, quant: Quant) -> &[Slot] {
		match quant {
			Quant::Hour => &self.hourly,
			Quant::Day => &self.daily,
			Quant::Month => &self.monthly,
		}
	}

	fn install_on_open(&self, store: Store) {
		let quant = store.quant();
		let slot = quant.slot(store.ts());
		let ring = self.ring_for(quant);
		let mut guard = ring[slot].write().unwrap();
		if guard.is_some() {
			debug_assert!(false, "duplicate store for {quant:?} slot {slot} in '{}'", self.dir.display());
			log::warn!(
				"{}: duplicate store for {quant:?} slot {slot}, rejecting '{}'",
				self.dir.display(),
				store.path().display()
			);
			return;
		}
		*guard = Some(Arc::new(store));
	}

	/// Releases every live store and both pair sets. A no-op beyond
	/// ordinary `Drop` — kept as an explicit method to mirror the stable
	/// programmatic surface.
	pub fn close(self) {}

	/// Rejects a nil key or nil value; otherwise pushes under the lock.
	/// Never touches disk.
	pub fn ingest(&self, key: u64, val: u64) -> RillResult<()> {
		if key == 0 {
			return Err(RillError::InvalidInput(format!("invalid nil key '{key}'")));
		}
		if val == 0 {
			return Err(RillError::InvalidInput(format!("invalid nil value '{val}'")));
		}
		self.acc.lock().unwrap().push(key, val);
		Ok(())
	}

	/// Compares `db.ts` to `now` at each of the three granularities and
	/// performs the promotion for every one whose bucket index changed,
	/// in order hour -> day -> month. On success `db.ts`
	/// is advanced to `now`; on failure it is left unchanged, though a
	/// tier that already completed its promotion may have left its side
	/// effects in place — safe because hourly retry is idempotent
	/// (`dump` is empty) and daily/monthly retry finds the previous
	/// attempt's files already in place.
	pub fn rotate(&self, now: u64) -> RillResult<()> {
		let old_ts = self.ts.load(Ordering::SeqCst);

		if bucket(now, Quant::Hour.seconds()) != bucket(old_ts, Quant::Hour.seconds()) {
			self.rotate_hourly(now, old_ts)?;
		}
		if bucket(now, Quant::Day.seconds()) != bucket(old_ts, Quant::Day.seconds()) {
			self.rotate_daily(old_ts)?;
		}
		if bucket(now, Quant::Month.seconds()) != bucket(old_ts, Quant::Month.seconds()) {
			self.rotate_monthly(old_ts)?;
		}

		self.ts.store(now, Ordering::SeqCst);
		Ok(())
	}

	/// Swap `acc`/`dump` under the lock (the only suspension point
	/// `ingest` can ever see), then compact, write, and install the
	/// result without holding it. `db.ts` (not yet advanced) is what
	/// gets stamped into the file; the ring slot is addressed by `now`
	/// — the two tiers deliberately use different timestamps, since the
	/// ring slot being installed belongs to the bucket that just opened
	/// while the data being flushed still belongs to the bucket that
	/// just closed.
	fn rotate_hourly(&self, now: u64, old_ts: u64) -> RillResult<()> {
		let mut dump = {
			let mut acc = self.acc.lock().unwrap();
			let mut dump = self.dump.lock().unwrap();
			std::mem::swap(&mut *acc, &mut *dump);
			std::mem::take(&mut *dump)
		};

		dump.compact();
		if !dump.is_empty() {
			let path = naming::store_path(&self.dir, old_ts, Quant::Hour);
			Writer::write(&path, old_ts, Quant::Hour, &dump)?;
			let store = Self::reopen(&path)?;

			let slot = Quant::Hour.slot(now);
			let mut guard = self.hourly[slot].write().unwrap();
			debug_assert!(guard.is_none(), "hourly slot {slot} occupied at rotation");
			if let Some(stale) = guard.take() {
				log::warn!("hourly slot {slot} occupied at rotation, expiring stale occupant");
				Self::unlink(&stale);
			}
			*guard = Some(Arc::new(store));
		}

		Ok(())
	}

	/// Merges every non-null hourly store into a new daily store,
	/// addressed and stamped by `old_ts` (the timestamp being rotated
	/// away, captured before `rotate` advances `db.ts`). A non-empty
	/// target slot is treated as the expiry of its occupant rather than
	/// asserted empty, so a rotation delayed across more than one bucket
	/// boundary degrades gracefully instead of panicking (see DESIGN.md).
	fn rotate_daily(&self, old_ts: u64) -> RillResult<()> {
		let slot = Quant::Day.slot(old_ts);
		self.expire_slot(&self.daily[slot], "daily");

		let sources = Self::collect_ring(&self.hourly);
		if sources.is_empty() {
			return Ok(());
		}

		let path = naming::store_path(&self.dir, old_ts, Quant::Day);
		merge::merge(&path, old_ts, Quant::Day, &sources)?;
		let store = Self::reopen(&path)?;
		*self.daily[slot].write().unwrap() = Some(Arc::new(store));

		Self::clear_ring(&self.hourly);
		Ok(())
	}

	/// Symmetric to [`rotate_daily`](Self::rotate_daily) one tier up.
	fn rotate_monthly(&self, old_ts: u64) -> RillResult<()> {
		let slot = Quant::Month.slot(old_ts);
		self.expire_slot(&self.monthly[slot], "monthly");

		let sources = Self::collect_ring(&self.daily);
		if sources.is_empty() {
			return Ok(());
		}

		let path = naming::store_path(&self.dir, old_ts, Quant::Month);
		merge::merge(&path, old_ts, Quant::Month, &sources)?;
		let store = Self::reopen(&path)?;
		*self.monthly[slot].write().unwrap() = Some(Arc::new(store));

		Self::clear_ring(&self.daily);
		Ok(())
	}

	fn expire_slot(&self, slot: &Slot, tier: &str) {
		if let Some(stale) = slot.write().unwrap().take() {
			log::debug!("expiring {tier} occupant {}", stale.path().display());
			Self::unlink(&stale);
		}
	}

	fn collect_ring(ring: &[Slot]) -> Vec<Arc<Store>> {
		ring.iter().filter_map(|slot| slot.read().unwrap().clone()).collect()
	}

	fn clear_ring(ring: &[Slot]) {
		for slot in ring {
			if let Some(store) = slot.write().unwrap().take() {
				Self::unlink(&store);
			}
		}
	}

	fn unlink(store: &Store) {
		if let Err(err) = fs::remove_file(store.path()) {
			log::warn!("failed to unlink {}: {err}", store.path().display());
		}
	}

	fn reopen(path: &Path) -> RillResult<Store> {
		Store::open(path)?.ok_or_else(|| RillError::Fatal(format!("just-written store '{}' failed to reopen", path.display())))
	}

	/// Fans `scan_key` out across every live store in hourly, daily,
	/// then monthly order (irrelevant for semantics: the output is
	/// compacted afterward), appending into `out`. The accumulator is
	/// deliberately excluded — a pair is visible to queries only after
	/// its hourly rotation materializes it.
	pub fn query_key(&self, keys: &[u64], out: &mut PairSet) -> RillResult<()> {
		if keys.is_empty() {
			return Ok(());
		}
		for ring in [&self.hourly, &self.daily, &self.monthly] {
			for slot in ring {
				if let Some(store) = slot.read().unwrap().as_ref() {
					store.scan_key(keys, out)?;
				}
			}
		}
		out.compact();
		Ok(())
	}

	/// Symmetric to [`query_key`](Self::query_key), filtering by value.
	pub fn query_val(&self, vals: &[u64], out: &mut PairSet) -> RillResult<()> {
		if vals.is_empty() {
			return Ok(());
		}
		for ring in [&self.hourly, &self.daily, &self.monthly] {
			for slot in ring {
				if let Some(store) = slot.read().unwrap().as_ref() {
					store.scan_val(vals, out)?;
				}
			}
		}
		out.compact();
		Ok(())
	}
}
