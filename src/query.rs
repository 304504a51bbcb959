//! Standalone, read-only query context: scans a directory once and
//! exposes `query_key`/`query_val` with no ingest or rotate capability,
//! mirroring the original `rill_query` collaborator.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::RillResult;
use crate::naming;
use crate::pairs::PairSet;
use crate::store::Store;

/// Up to this many store files are loaded from a directory; the rest are
/// logged and ignored. Matches the original C implementation's
/// fixed-size `list[1024]`.
pub const MAX_STORES: usize = 1024;

pub struct QueryContext {
	stores: Vec<Arc<Store>>,
}

impl QueryContext {
	pub fn open(dir: &Path) -> RillResult<QueryContext> {
		let mut stores = Vec::new();

		for entry in fs::read_dir(dir)? {
			let entry = entry?;
			if !entry.file_type()?.is_file() {
				continue;
			}
			let Some(name) = entry.file_name().to_str().map(str::to_owned) else { continue };
			if naming::classify(&name).is_none() {
				continue;
			}
			if stores.len() >= MAX_STORES {
				log::warn!("query_open: '{}' has more than {MAX_STORES} store files, ignoring the rest", dir.display());
				break;
			}
			if let Some(store) = Store::open(&entry.path())? {
				stores.push(Arc::new(store));
			}
		}

		Ok(QueryContext { stores })
	}

	pub fn query_key(&self, keys: &[u64], out: &mut PairSet) -> RillResult<()> {
		if keys.is_empty() {
			return Ok(());
		}
		for store in &self.stores {
			store.scan_key(keys, out)?;
		}
		out.compact();
		Ok(())
	}

	pub fn query_val(&self, vals: &[u64], out: &mut PairSet) -> RillResult<()> {
		if vals.is_empty() {
			return Ok(());
		}
		for store in &self.stores {
			store.scan_val(vals, out)?;
		}
		out.compact();
		Ok(())
	}
}
