//! The Write Stream Wrapper (§4.7), for backends whose writes are really a
//! single request with a streamed body (the reference `vfs-http` backend).
//!
//! The reference implementation here buffers written bytes in memory and
//! fires the request at `close()` rather than streaming the body as it's
//! written — a pragmatic simplification for a `reqwest::blocking` backend,
//! where there is no long-lived async request task to hold open.

use crate::backend::VfsStream;
use crate::error::VfsResult;

/// Wraps a backend's "finish this write" action so it only runs once, at
/// `close()`, and so a caller that forgets to close loses data loudly
/// (logged) rather than silently.
pub struct WriteStreamWrapper {
	buffer: Vec<u8>,
	on_close: Option<Box<dyn FnOnce(Vec<u8>) -> VfsResult<()> + Send>>,
}

impl WriteStreamWrapper {
	pub fn new(on_close: impl FnOnce(Vec<u8>) -> VfsResult<()> + Send + 'static) -> Self {
		Self {
			buffer: Vec::new(),
			on_close: Some(Box::new(on_close)),
		}
	}
}

impl VfsStream for WriteStreamWrapper {
	fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
		self.buffer.extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> VfsResult<()> {
		Ok(())
	}

	fn close(mut self: Box<Self>) -> VfsResult<()> {
		match self.on_close.take() {
			Some(on_close) => on_close(std::mem::take(&mut self.buffer)),
			None => Ok(()),
		}
	}
}

impl Drop for WriteStreamWrapper {
	fn drop(&mut self) {
		if self.on_close.is_some() {
			log::warn!("write stream wrapper dropped without close(); buffered body was discarded");
		}
	}
}

#[cfg(test)]
mod test;
