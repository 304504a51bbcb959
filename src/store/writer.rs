use fst::MapBuilder;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::Path;

use super::{HEADER_LEN, MAGIC, VERSION};
use crate::error::RillResult;
use crate::naming;
use crate::pairs::{Pair, PairSet};
use crate::quant::Quant;

/// Serializes a compacted [`PairSet`] to a new store file.
///
/// Writes under a `.tmp` name, syncs, and renames into place; a reader
/// never observes a partial file. Any failure removes the temporary file
/// and leaves the target path absent.
pub struct Writer;

impl Writer {
	pub fn write(path: &Path, ts: u64, quant: Quant, pairs: &PairSet) -> RillResult<()> {
		debug_assert!(pairs.is_compacted(), "Writer::write requires a compacted pair set");

		let tmp = naming::tmp_path(path);
		match Self::write_tmp(&tmp, ts, quant, pairs) {
			Ok(()) => match fs::rename(&tmp, path) {
				Ok(()) => Ok(()),
				Err(err) => {
					let _ = fs::remove_file(&tmp);
					Err(err.into())
				},
			},
			Err(err) => {
				let _ = fs::remove_file(&tmp);
				Err(err)
			},
		}
	}

	fn write_tmp(tmp: &Path, ts: u64, quant: Quant, pairs: &PairSet) -> RillResult<()> {
		let slice = pairs.as_slice();

		let mut stream = Vec::with_capacity(slice.len() * 16);
		let mut offset_of: HashMap<Pair, u64> = HashMap::with_capacity(slice.len());
		for pair in slice {
			offset_of.insert(*pair, stream.len() as u64);
			stream.extend_from_slice(&pair.key_be());
			stream.extend_from_slice(&pair.val_be());
		}

		let mut a_builder = MapBuilder::memory();
		let mut a_distinct: u64 = 0;
		let mut last_key: Option<u64> = None;
		for (i, pair) in slice.iter().enumerate() {
			if last_key != Some(pair.key) {
				a_builder.insert(pair.key_be(), (i as u64) * 16)?;
				a_distinct += 1;
				last_key = Some(pair.key);
			}
		}
		let a_bytes = a_builder.into_inner()?;

		let mut by_val: Vec<&Pair> = slice.iter().collect();
		by_val.sort_unstable_by_key(|p| (p.val, p.key));
		let mut b_builder = MapBuilder::memory();
		let mut b_distinct: u64 = 0;
		let mut last_val: Option<u64> = None;
		for &pair in &by_val {
			let mut composite = [0u8; 16];
			composite[..8].copy_from_slice(&pair.val_be());
			composite[8..].copy_from_slice(&pair.key_be());
			let offset = *offset_of.get(pair).expect("pair present in stream");
			b_builder.insert(composite, offset)?;
			if last_val != Some(pair.val) {
				b_distinct += 1;
				last_val = Some(pair.val);
			}
		}
		let b_bytes = b_builder.into_inner()?;

		let a_offset = HEADER_LEN as u64;
		let a_len = a_bytes.len() as u64;
		let b_offset = a_offset + a_len;
		let b_len = b_bytes.len() as u64;
		let stream_offset = b_offset + b_len;
		let stream_len = stream.len() as u64;

		let mut header = [0u8; HEADER_LEN];
		header[0..4].copy_from_slice(MAGIC);
		header[4..8].copy_from_slice(&VERSION.to_le_bytes());
		header[8..16].copy_from_slice(&ts.to_le_bytes());
		header[16..24].copy_from_slice(&quant.tag().to_le_bytes());
		header[24..32].copy_from_slice(&(slice.len() as u64).to_le_bytes());
		header[32..40].copy_from_slice(&a_distinct.to_le_bytes());
		header[40..48].copy_from_slice(&b_distinct.to_le_bytes());
		header[48..56].copy_from_slice(&a_offset.to_le_bytes());
		header[56..64].copy_from_slice(&a_len.to_le_bytes());
		header[64..72].copy_from_slice(&b_offset.to_le_bytes());
		header[72..80].copy_from_slice(&b_len.to_le_bytes());
		header[80..88].copy_from_slice(&stream_offset.to_le_bytes());
		header[88..96].copy_from_slice(&stream_len.to_le_bytes());

		let mut file = File::create(tmp)?;
		file.write_all(&header)?;
		file.write_all(&a_bytes)?;
		file.write_all(&b_bytes)?;
		file.write_all(&stream)?;
		file.sync_all()?;
		Ok(())
	}
}
