use std::{fmt, io};

pub type RillResult<T> = Result<T, RillError>;

/// Crate-wide error type.
///
/// Hand-rolled rather than built on `thiserror`, in the style of
/// `StoreError` in the fst and redb store modules this crate is grounded
/// on — no variant here needs anything `thiserror` would buy us.
#[derive(Debug)]
pub enum RillError {
	Io(io::Error),
	Fst(fst::Error),
	/// Caller error: nil key/val, zero segment size, bad layout, etc.
	InvalidInput(String),
	/// An invariant the reader cannot safely route around: an index entry
	/// pointing past the end of the pair stream, a duplicate ring slot in
	/// a debug build, an unknown quant tag.
	Fatal(String),
}

impl fmt::Display for RillError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RillError::Io(err) => write!(f, "io error: {err}"),
			RillError::Fst(err) => write!(f, "fst error: {err}"),
			RillError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
			RillError::Fatal(msg) => write!(f, "fatal: {msg}"),
		}
	}
}

impl std::error::Error for RillError {}

impl From<io::Error> for RillError {
	fn from(err: io::Error) -> Self {
		RillError::Io(err)
	}
}

impl From<fst::Error> for RillError {
	fn from(err: fst::Error) -> Self {
		RillError::Fst(err)
	}
}
