//! Directory layout: one flat directory per database. Filenames encode the
//! quant and bucket:
//!
//! - Monthly: `<month:06d>.rill`
//! - Daily:   `<month:06d>-<day:02d>.rill`
//! - Hourly:  `<month:06d>-<day:02d>-<hour:02d>.rill`
//!
//! The month component is the *unbounded* absolute month count
//! (`ts / quant_month`); day and hour are the *cyclic* components used only
//! for the filename (`(ts / quant_day) % days`, `(ts / quant_hour) % hours`)
//! — distinct from the ring-slot index, which always wraps modulo the
//! tier's ring size. This module keeps the two separate rather than
//! conflating them.

use std::path::{Path, PathBuf};

use crate::quant::{DAYS, HOURS, Quant};

const EXT: &str = "rill";
const TMP_EXT: &str = "rill.tmp";

fn month_component(ts: u64) -> u64 {
	ts / Quant::Month.seconds()
}

fn day_component(ts: u64) -> u64 {
	(ts / Quant::Day.seconds()) % DAYS as u64
}

fn hour_component(ts: u64) -> u64 {
	(ts / Quant::Hour.seconds()) % HOURS as u64
}

pub fn file_name(ts: u64, quant: Quant) -> String {
	match quant {
		Quant::Month => format!("{:06}.{EXT}", month_component(ts)),
		Quant::Day => format!("{:06}-{:02}.{EXT}", month_component(ts), day_component(ts)),
		Quant::Hour => {
			format!("{:06}-{:02}-{:02}.{EXT}", month_component(ts), day_component(ts), hour_component(ts))
		},
	}
}

pub fn store_path(dir: &Path, ts: u64, quant: Quant) -> PathBuf {
	dir.join(file_name(ts, quant))
}

pub fn tmp_path(final_path: &Path) -> PathBuf {
	final_path.with_extension(TMP_EXT)
}

/// Classifies a filename by the directory-layout patterns above; anything
/// that doesn't match is ignored on open. This is a cheap pre-filter; the
/// store header remains the authoritative source of `(ts, quant)` once the
/// file is actually opened.
pub fn classify(file_name: &str) -> Option<Quant> {
	let stem = file_name.strip_suffix(&format!(".{EXT}"))?;
	let parts: Vec<&str> = stem.split('-').collect();
	match parts.as_slice() {
		[month] => is_digits(month, 6).then_some(Quant::Month),
		[month, day] => (is_digits(month, 6) && is_digits(day, 2)).then_some(Quant::Day),
		[month, day, hour] => {
			(is_digits(month, 6) && is_digits(day, 2) && is_digits(hour, 2)).then_some(Quant::Hour)
		},
		_ => None,
	}
}

fn is_digits(s: &str, len: usize) -> bool {
	s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}
