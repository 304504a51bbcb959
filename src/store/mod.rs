//! Immutable, memory-mapped store file.
//!
//! Layout after a fixed 96-byte header: a column-A `fst::Map` (key ->
//! offset of that key's first pair in the stream), a column-B `fst::Map`
//! (`val‖key` composite -> offset), then the flat pair stream itself,
//! sorted ascending by `(key, val)`. Byte order: anything that
//! participates in an `fst::Map` key is big-endian (so byte-lexicographic
//! order is numeric order); the header itself is little-endian.

mod writer;

pub use writer::Writer;

use fst::{IntoStreamer, Map, Streamer};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{RillError, RillResult};
use crate::pairs::{Pair, PairSet};
use crate::quant::Quant;

pub(crate) const MAGIC: &[u8; 4] = b"RLKV";
pub(crate) const VERSION: u32 = 1;
pub(crate) const HEADER_LEN: usize = 96;
const ENTRY_LEN: usize = 16;

/// Selects which side of a pair drives a scan or iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
	/// Keys: backed directly by the pair stream, already in this order.
	A,
	/// Values: backed by the `val‖key` composite index.
	B,
}

/// An immutable, memory-mapped store file bound to `(ts, quant)`.
pub struct Store {
	path: PathBuf,
	mmap: Mmap,
	ts: u64,
	quant: Quant,
	pair_count: u64,
	a_distinct: u64,
	b_distinct: u64,
	a_index: Map<Vec<u8>>,
	b_index: Map<Vec<u8>>,
	stream_offset: usize,
	stream_len: usize,
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
	u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

/// `(key,val)` composite index keys are 8 bytes of value followed by 8
/// bytes of key, both big-endian, so a prefix scan over the value bytes
/// recovers every pair carrying that value without touching the stream.
fn val_prefix_upper_bound(prefix: &[u8; 8]) -> Option<[u8; 8]> {
	let mut out = *prefix;
	for i in (0..out.len()).rev() {
		if out[i] != u8::MAX {
			out[i] += 1;
			for b in out.iter_mut().skip(i + 1) {
				*b = 0;
			}
			return Some(out);
		}
	}
	None
}

impl Store {
	/// Opens and validates a store file. Corruption (bad magic, bad
	/// version, truncated regions) is reported with `Ok(None)` plus a
	/// `log::warn!` — the caller skips the file rather than aborting.
	pub fn open(path: &Path) -> RillResult<Option<Store>> {
		let file = File::open(path)?;
		let mmap = unsafe { Mmap::map(&file)? };

		if mmap.len() < HEADER_LEN {
			log::warn!("store {}: truncated header", path.display());
			return Ok(None);
		}
		if &mmap[0..4] != MAGIC {
			log::warn!("store {}: bad magic", path.display());
			return Ok(None);
		}
		let version = u32::from_le_bytes(mmap[4..8].try_into().unwrap());
		if version != VERSION {
			log::warn!("store {}: unsupported version {version}", path.display());
			return Ok(None);
		}

		let ts = read_u64(&mmap, 8);
		let quant_tag = read_u64(&mmap, 16);
		let quant = match Quant::from_tag(quant_tag) {
			Some(q) => q,
			None => {
				log::warn!("store {}: unknown quant tag {quant_tag}", path.display());
				return Ok(None);
			},
		};
		let pair_count = read_u64(&mmap, 24);
		let a_distinct = read_u64(&mmap, 32);
		let b_distinct = read_u64(&mmap, 40);
		let a_offset = read_u64(&mmap, 48) as usize;
		let a_len = read_u64(&mmap, 56) as usize;
		let b_offset = read_u64(&mmap, 64) as usize;
		let b_len = read_u64(&mmap, 72) as usize;
		let stream_offset = read_u64(&mmap, 80) as usize;
		let stream_len = read_u64(&mmap, 88) as usize;

		let file_len = mmap.len();
		let in_bounds = |off: usize, len: usize| off.checked_add(len).map_or(false, |end| end <= file_len);
		if !in_bounds(a_offset, a_len) || !in_bounds(b_offset, b_len) || !in_bounds(stream_offset, stream_len) {
			log::warn!("store {}: region extends past end of file", path.display());
			return Ok(None);
		}
		if stream_len % ENTRY_LEN != 0 || (stream_len / ENTRY_LEN) as u64 != pair_count {
			log::warn!("store {}: pair stream length disagrees with header pair count", path.display());
			return Ok(None);
		}

		let a_index = match Map::new(mmap[a_offset..a_offset + a_len].to_vec()) {
			Ok(m) => m,
			Err(err) => {
				log::warn!("store {}: corrupt column-A index: {err}", path.display());
				return Ok(None);
			},
		};
		let b_index = match Map::new(mmap[b_offset..b_offset + b_len].to_vec()) {
			Ok(m) => m,
			Err(err) => {
				log::warn!("store {}: corrupt column-B index: {err}", path.display());
				return Ok(None);
			},
		};

		Ok(Some(Store {
			path: path.to_path_buf(),
			mmap,
			ts,
			quant,
			pair_count,
			a_distinct,
			b_distinct,
			a_index,
			b_index,
			stream_offset,
			stream_len,
		}))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn ts(&self) -> u64 {
		self.ts
	}

	pub fn quant(&self) -> Quant {
		self.quant
	}

	pub fn pair_count(&self) -> u64 {
		self.pair_count
	}

	/// Number of distinct column values: `a_distinct` for [`Column::A`]
	/// (keys), `b_distinct` for [`Column::B`] (values).
	pub fn keys_count(&self, col: Column) -> u64 {
		match col {
			Column::A => self.a_distinct,
			Column::B => self.b_distinct,
		}
	}

	fn stream(&self) -> &[u8] {
		&self.mmap[self.stream_offset..self.stream_offset + self.stream_len]
	}

	/// Every pair in the store, in `(key, val)` order.
	pub fn pairs(&self) -> PairSet {
		self.stream().chunks_exact(ENTRY_LEN).map(decode_entry).collect()
	}

	/// A forward, single-pass cursor over every pair, ordered by `col`.
	pub fn iter(&self, col: Column) -> StoreIter<'_> {
		match col {
			Column::A => StoreIter::Stream { bytes: self.stream(), pos: 0 },
			Column::B => StoreIter::Index { stream: self.b_index.stream() },
		}
	}

	/// Appends every pair whose key is in `keys` to `out`. Does not sort
	/// or dedup `out` (the caller compacts once every source store has
	/// been scanned).
	pub fn scan_key(&self, keys: &[u64], out: &mut PairSet) -> RillResult<()> {
		for &key in keys {
			self.query_key(key, out)?;
		}
		Ok(())
	}

	/// Convenience singleton form of [`scan_key`](Self::scan_key).
	pub fn query_key(&self, key: u64, out: &mut PairSet) -> RillResult<()> {
		let key_be = key.to_be_bytes();
		let mut stream = self.a_index.range().ge(&key_be[..]).into_stream();
		let Some((found, start)) = stream.next() else { return Ok(()) };
		if found != key_be {
			return Ok(());
		}
		let end = match stream.next() {
			Some((_, next_offset)) => next_offset,
			None => self.stream_len as u64,
		};
		self.emit_run(start, end, out)
	}

	/// Symmetric to [`scan_key`](Self::scan_key), filtering by value.
	pub fn scan_val(&self, vals: &[u64], out: &mut PairSet) -> RillResult<()> {
		for &val in vals {
			self.query_val(val, out)?;
		}
		Ok(())
	}

	fn query_val(&self, val: u64, out: &mut PairSet) -> RillResult<()> {
		let prefix = val.to_be_bytes();
		let mut builder = self.b_index.range().ge(&prefix[..]);
		let upper = val_prefix_upper_bound(&prefix);
		if let Some(upper) = upper.as_ref() {
			builder = builder.lt(&upper[..]);
		}
		let mut stream = builder.into_stream();
		while let Some((composite, _offset)) = stream.next() {
			if composite.len() != ENTRY_LEN || composite[0..8] != prefix {
				break;
			}
			let key = u64::from_be_bytes(composite[8..16].try_into().unwrap());
			out.push(key, val);
		}
		Ok(())
	}

	fn emit_run(&self, start: u64, end: u64, out: &mut PairSet) -> RillResult<()> {
		if end < start || end as usize > self.stream_len {
			return Err(RillError::Fatal(format!(
				"store {}: column-A offset [{start}, {end}) out of bounds (stream_len={})",
				self.path.display(),
				self.stream_len
			)));
		}
		let region = &self.stream()[start as usize..end as usize];
		if region.len() % ENTRY_LEN != 0 {
			return Err(RillError::Fatal(format!(
				"store {}: column-A run [{start}, {end}) is not pair-aligned",
				self.path.display()
			)));
		}
		for chunk in region.chunks_exact(ENTRY_LEN) {
			let pair = decode_entry(chunk);
			out.push_pair(pair);
		}
		Ok(())
	}
}

fn decode_entry(entry: &[u8]) -> Pair {
	let key = u64::from_be_bytes(entry[0..8].try_into().unwrap());
	let val = u64::from_be_bytes(entry[8..16].try_into().unwrap());
	Pair::new(key, val)
}

/// Forward cursor returned by [`Store::iter`]. Single-pass, matching the
/// original C `rill_store_begin`/`rill_store_next` pair.
pub enum StoreIter<'a> {
	Stream { bytes: &'a [u8], pos: usize },
	Index { stream: fst::map::Stream<'a> },
}

impl Iterator for StoreIter<'_> {
	type Item = Pair;

	fn next(&mut self) -> Option<Pair> {
		match self {
			StoreIter::Stream { bytes, pos } => {
				if *pos + ENTRY_LEN > bytes.len() {
					return None;
				}
				let pair = decode_entry(&bytes[*pos..*pos + ENTRY_LEN]);
				*pos += ENTRY_LEN;
				Some(pair)
			},
			StoreIter::Index { stream } => {
				let (composite, _offset) = stream.next()?;
				let val = u64::from_be_bytes(composite[0..8].try_into().unwrap());
				let key = u64::from_be_bytes(composite[8..16].try_into().unwrap());
				Some(Pair::new(key, val))
			},
		}
	}
}
