//! [`Entry`]: an immutable snapshot of file or directory metadata, plus the
//! pair decorator used to unify entries reported by more than one Component.

use std::time::SystemTime;

use crate::path::VPathBuf;

bitflags::bitflags! {
	/// Attribute bits a backend may report on an [`Entry`]. Backends that
	/// don't track a given bit simply never set it.
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
	pub struct Attributes: u32 {
		const READ_ONLY = 1 << 0;
		const HIDDEN = 1 << 1;
		const SYSTEM = 1 << 2;
		const SYMLINK = 1 << 3;
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
	File,
	Directory,
	/// A local-disk drive root (Windows `C:\`, etc.), surfaced by `vfs-local`.
	Drive,
	/// A node in the Mount Tree that carries no Binding of its own but has
	/// descendants which do — a purely virtual directory.
	MountPoint,
	/// The unification of a file Entry and a directory Entry reported by
	/// different Components at the same path.
	FileAndDirectory,
}

/// An immutable snapshot of file or directory metadata. Entries never
/// invalidate; a stale entry simply describes a past state.
#[derive(Debug, Clone)]
pub struct Entry {
	path: VPathBuf,
	name: String,
	kind: EntryKind,
	/// Byte length, or `-1` for anything that isn't plainly a file.
	length: i64,
	last_modified: Option<SystemTime>,
	last_access: Option<SystemTime>,
	attributes: Option<Attributes>,
	/// The backend-native path this entry came from, if the backend has one
	/// worth surfacing (e.g. `vfs-local`'s real disk path).
	physical_path: Option<String>,
}

impl Entry {
	#[must_use]
	pub fn new(path: VPathBuf, kind: EntryKind) -> Self {
		let name = path.file_name().map_or_else(String::new, str::to_string);

		Self {
			path,
			name,
			kind,
			length: -1,
			last_modified: None,
			last_access: None,
			attributes: None,
			physical_path: None,
		}
	}

	#[must_use]
	pub fn with_length(mut self, length: i64) -> Self {
		self.length = length;
		self
	}

	#[must_use]
	pub fn with_last_modified(mut self, time: SystemTime) -> Self {
		self.last_modified = Some(time);
		self
	}

	#[must_use]
	pub fn with_last_access(mut self, time: SystemTime) -> Self {
		self.last_access = Some(time);
		self
	}

	#[must_use]
	pub fn with_attributes(mut self, attrs: Attributes) -> Self {
		self.attributes = Some(attrs);
		self
	}

	#[must_use]
	pub fn with_physical_path(mut self, path: impl Into<String>) -> Self {
		self.physical_path = Some(path.into());
		self
	}

	#[must_use]
	pub fn path(&self) -> &VPathBuf {
		&self.path
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn kind(&self) -> EntryKind {
		self.kind
	}

	#[must_use]
	pub fn length(&self) -> i64 {
		self.length
	}

	#[must_use]
	pub fn last_modified(&self) -> Option<SystemTime> {
		self.last_modified
	}

	#[must_use]
	pub fn last_access(&self) -> Option<SystemTime> {
		self.last_access
	}

	#[must_use]
	pub fn attributes(&self) -> Option<Attributes> {
		self.attributes
	}

	#[must_use]
	pub fn physical_path(&self) -> Option<&str> {
		self.physical_path.as_deref()
	}

	#[must_use]
	pub fn is_directory(&self) -> bool {
		matches!(
			self.kind,
			EntryKind::Directory | EntryKind::Drive | EntryKind::MountPoint | EntryKind::FileAndDirectory
		)
	}

	/// Unifies two Entries reported at the same path by different
	/// Components. `self` is the higher-priority (deeper-Component) entry;
	/// scalar fields fall back to `other` only when `self` doesn't have them.
	#[must_use]
	pub fn unify(self, other: Entry) -> Entry {
		let kind = if self.kind != other.kind {
			EntryKind::FileAndDirectory
		} else {
			self.kind
		};

		Entry {
			path: self.path,
			name: self.name,
			kind,
			length: if self.length >= 0 { self.length } else { other.length },
			last_modified: self.last_modified.or(other.last_modified),
			last_access: self.last_access.or(other.last_access),
			attributes: self.attributes.or(other.attributes),
			physical_path: self.physical_path.or(other.physical_path),
		}
	}
}

#[cfg(test)]
mod test;
