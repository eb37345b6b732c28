use std::{
	fs::File,
	io::{self, BufReader, Cursor, Read},
};

use tracing::{trace, warn};

/// A readable source of certificate bytes that can be explicitly closed.
///
/// Closing is separate from dropping so that close failures can be observed
/// (and logged) rather than silently lost.
pub trait CertStream: Read + Send {
	fn close(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl CertStream for BufReader<File> {}
impl CertStream for Cursor<Vec<u8>> {}
impl CertStream for Cursor<&'static [u8]> {}

/// Owns a [`CertStream`] and closes it exactly once when dropped.
///
/// A failure to close is logged and swallowed, so it never replaces the
/// outcome of whatever was done with the stream.
pub struct ScopedStream {
	inner: Option<Box<dyn CertStream>>,
	label: String,
}

impl ScopedStream {
	pub fn new(stream: Box<dyn CertStream>, label: impl Into<String>) -> Self {
		Self {
			inner: Some(stream),
			label: label.into(),
		}
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	/// Read everything remaining in the stream.
	pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
		let mut bytes = Vec::new();
		if let Some(stream) = self.inner.as_mut() {
			stream.read_to_end(&mut bytes)?;
		}
		trace!(source = %self.label, len = bytes.len(), "read certificate bytes");
		Ok(bytes)
	}
}

impl std::fmt::Debug for ScopedStream {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScopedStream")
			.field("label", &self.label)
			.field("open", &self.inner.is_some())
			.finish()
	}
}

impl Drop for ScopedStream {
	fn drop(&mut self) {
		if let Some(mut stream) = self.inner.take()
			&& let Err(err) = stream.close()
		{
			warn!(source = %self.label, "failed to close certificate stream: {err}");
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	};

	use super::*;

	struct Tracked {
		data: Cursor<Vec<u8>>,
		closes: Arc<AtomicUsize>,
		fail_close: bool,
		fail_read: bool,
	}

	impl Read for Tracked {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			if self.fail_read {
				return Err(io::Error::other("read failed"));
			}
			self.data.read(buf)
		}
	}

	impl CertStream for Tracked {
		fn close(&mut self) -> io::Result<()> {
			self.closes.fetch_add(1, Ordering::SeqCst);
			if self.fail_close {
				Err(io::Error::other("close failed"))
			} else {
				Ok(())
			}
		}
	}

	fn tracked(fail_close: bool, fail_read: bool) -> (ScopedStream, Arc<AtomicUsize>) {
		let closes = Arc::new(AtomicUsize::new(0));
		let stream = Tracked {
			data: Cursor::new(b"hello".to_vec()),
			closes: closes.clone(),
			fail_close,
			fail_read,
		};
		(ScopedStream::new(Box::new(stream), "test"), closes)
	}

	#[test]
	fn closes_once_on_drop() {
		let (mut stream, closes) = tracked(false, false);
		assert_eq!(stream.read_all().unwrap(), b"hello");
		assert_eq!(closes.load(Ordering::SeqCst), 0);
		drop(stream);
		assert_eq!(closes.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn closes_after_read_failure() {
		let (mut stream, closes) = tracked(false, true);
		assert!(stream.read_all().is_err());
		drop(stream);
		assert_eq!(closes.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn close_failure_is_swallowed() {
		let (mut stream, closes) = tracked(true, false);
		assert_eq!(stream.read_all().unwrap(), b"hello");
		drop(stream);
		assert_eq!(closes.load(Ordering::SeqCst), 1);
	}
}
