//! This module centralizes the diagnostics a volume writes when it rejects an operation.
//!
//! The reference implementation calls `fprintf(stderr, "fs_op: reason\n")` at each rejection
//! site. This keeps the same one-line-per-rejection convention but routes every message through
//! a single sink so the format stays consistent and so a caller (or a test) can capture it
//! instead of scraping stderr.

/// Where a volume's diagnostics go.
///
/// The default sink writes to standard error, matching the reference implementation. Tests
/// construct a sink backed by a shared buffer instead.
pub struct Diagnostics {
	sink: Box<dyn Fn(&str)>,
}

impl Diagnostics {
	/// Builds a sink that writes each message as a line on standard error.
	pub fn stderr() -> Self {
		Self {
			sink: Box::new(|msg| eprintln!("{msg}")),
		}
	}

	/// Builds a sink from an arbitrary closure.
	pub fn with_sink<F: Fn(&str) + 'static>(f: F) -> Self {
		Self { sink: Box::new(f) }
	}

	/// Logs a single rejection: `op` is the operation name, `reason` is a human-readable cause.
	pub(crate) fn log(&self, op: &str, reason: impl std::fmt::Display) {
		(self.sink)(&format!("{op}: {reason}"));
	}
}

impl Default for Diagnostics {
	fn default() -> Self {
		Self::stderr()
	}
}

impl std::fmt::Debug for Diagnostics {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Diagnostics { .. }")
	}
}
