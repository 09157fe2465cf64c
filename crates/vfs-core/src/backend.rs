//! The Backend Contract (§6): the operations a mounted backend must present,
//! gated by the [`Capabilities`] it advertises.

use crate::entry::{Attributes, Entry};
use crate::error::{Error, VfsResult};
use crate::observer::Sink;
use crate::path::VPath;

bitflags::bitflags! {
	/// Which Backend Contract operations a backend supports. The core never
	/// calls an operation a backend hasn't advertised here.
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
	pub struct Capabilities: u32 {
		const BROWSE = 1 << 0;
		const GET_ENTRY = 1 << 1;
		const OPEN_READ = 1 << 2;
		const OPEN_WRITE = 1 << 3;
		const CREATE_DIRECTORY = 1 << 4;
		const DELETE = 1 << 5;
		const MOVE = 1 << 6;
		const SET_ATTRIBUTE = 1 << 7;
		const OBSERVE = 1 << 8;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
	Open,
	Create,
	CreateNew,
	OpenOrCreate,
	Truncate,
	Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
	Read,
	Write,
	ReadWrite,
}

impl AccessMode {
	#[must_use]
	pub fn wants_read(self) -> bool {
		matches!(self, Self::Read | Self::ReadWrite)
	}

	#[must_use]
	pub fn wants_write(self) -> bool {
		matches!(self, Self::Write | Self::ReadWrite)
	}
}

bitflags::bitflags! {
	/// Sharing permitted with other concurrent openers, advisory only — a
	/// backend that cannot enforce it may ignore it.
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
	pub struct Share: u32 {
		const READ = 1 << 0;
		const WRITE = 1 << 1;
		const DELETE = 1 << 2;
	}
}

/// A handle to an open file. Backends that only support one direction
/// simply inherit the default `NotSupported` implementation for the other.
pub trait VfsStream: Send {
	fn read(&mut self, _buf: &mut [u8]) -> VfsResult<usize> {
		Err(Error::not_supported())
	}

	fn write(&mut self, _buf: &[u8]) -> VfsResult<usize> {
		Err(Error::not_supported())
	}

	fn flush(&mut self) -> VfsResult<()> {
		Ok(())
	}

	/// Called exactly once when the caller is done with the stream. For
	/// streaming-write backends (§4.7) this is where the buffered request
	/// actually completes.
	fn close(self: Box<Self>) -> VfsResult<()> {
		Ok(())
	}
}

/// A live backend subscription, returned by [`Backend::observe`] and
/// [`Backend::observe`]'s caller folded into an Observer Handle's
/// `subscriptions` list (§3, §4.6).
pub trait BackendSubscription: Send {
	fn cancel(&mut self);
}

/// The operations a mounted backend must present; a backend declares which
/// ones it implements via [`Backend::capabilities`] and the core only calls
/// the ones advertised. Default method bodies return `NotSupported` so an
/// implementor need only override what it actually does.
pub trait Backend: Send + Sync {
	fn capabilities(&self) -> Capabilities;

	fn browse(&self, _path: &VPath) -> VfsResult<Vec<Entry>> {
		Err(Error::not_supported())
	}

	fn get_entry(&self, _path: &VPath) -> VfsResult<Option<Entry>> {
		Err(Error::not_supported())
	}

	fn open(
		&self,
		_path: &VPath,
		_mode: OpenMode,
		_access: AccessMode,
		_share: Share,
	) -> VfsResult<Box<dyn VfsStream>> {
		Err(Error::not_supported())
	}

	fn create_directory(&self, _path: &VPath) -> VfsResult<()> {
		Err(Error::not_supported())
	}

	fn delete(&self, _path: &VPath, _recursive: bool) -> VfsResult<()> {
		Err(Error::not_supported())
	}

	fn move_entry(&self, _src: &VPath, _dst: &VPath) -> VfsResult<()> {
		Err(Error::not_supported())
	}

	fn set_attribute(&self, _path: &VPath, _attrs: Attributes) -> VfsResult<()> {
		Err(Error::not_supported())
	}

	/// `filter` and any path delivered to `sink` are backend-relative
	/// (rooted at `""`); the Aggregating Mount Binding performs rebasing
	/// into VFS space.
	fn observe(&self, _filter: &str, _sink: Sink) -> VfsResult<Box<dyn BackendSubscription>> {
		Err(Error::not_supported())
	}
}
