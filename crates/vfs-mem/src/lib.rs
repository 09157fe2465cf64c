//! A reference [`Backend`] (§4.8) that stores an entire filesystem in memory:
//! files as `Mutex<FileData>` leaves, directories as `RwLock`-guarded
//! name-sorted maps. Exists so `vfs-core`'s own test suite, and anyone
//! composing a `Vfs`, has a deterministic, filesystem-free backend to mount.

mod node;

use std::sync::Arc;

use parking_lot::Mutex;
use vfs_core::{
	AccessMode, Attributes, Backend, BackendSubscription, Capabilities, Entry, EntryKind, Error, GlobMatcher,
	OpenMode, Share, Sink, VPath, VPathBuf, VfsResult, VfsStream,
};

use self::node::{FileData, Node};

/// An in-memory filesystem, mountable as a `vfs-core` Component.
pub struct MemBackend {
	shared: Arc<Shared>,
}

struct Shared {
	root: Arc<Node>,
	subscribers: Mutex<Vec<Option<Subscriber>>>,
}

struct Subscriber {
	matcher: GlobMatcher,
	sink: Mutex<Sink>,
}

impl Shared {
	fn dispatch(&self, path: &VPath, event_at: impl Fn() -> vfs_core::Event) {
		for sub in self.subscribers.lock().iter().flatten() {
			if sub.matcher.is_match(path) {
				sub.sink.lock().next(event_at());
			}
		}
	}
}

impl MemBackend {
	#[must_use]
	pub fn new() -> Self {
		Self {
			shared: Arc::new(Shared {
				root: Arc::new(Node::new_directory()),
				subscribers: Mutex::new(Vec::new()),
			}),
		}
	}

	fn find(&self, path: &VPath) -> Option<Arc<Node>> {
		let mut cur = Arc::clone(&self.shared.root);

		for seg in path.components() {
			let next = cur.as_directory()?.read().get(seg).cloned()?;
			cur = next;
		}

		Some(cur)
	}

	fn find_parent_and_name<'p>(&self, path: &'p VPath) -> VfsResult<(Arc<Node>, &'p str)> {
		let parent_path = path.parent().ok_or_else(Error::directory_not_found)?;
		let name = path.file_name().ok_or_else(Error::directory_not_found)?;
		let parent = self.find(&parent_path).ok_or_else(Error::directory_not_found)?;

		if parent.as_directory().is_none() {
			return Err(Error::directory_not_found().with_path(parent_path));
		}

		Ok((parent, name))
	}
}

impl Default for MemBackend {
	fn default() -> Self {
		Self::new()
	}
}

fn entry_for(parent: &VPath, name: &str, node: &Node) -> Entry {
	let path = parent.join(name);

	match node {
		Node::Directory(_) => Entry::new(path, EntryKind::Directory),
		Node::File(data) => {
			let data = data.lock();

			Entry::new(path, EntryKind::File)
				.with_length(data.content.len() as i64)
				.with_last_modified(data.modified)
				.with_last_access(data.accessed)
				.with_attributes(data.attributes)
		}
	}
}

impl Backend for MemBackend {
	fn capabilities(&self) -> Capabilities {
		Capabilities::BROWSE
			| Capabilities::GET_ENTRY
			| Capabilities::OPEN_READ
			| Capabilities::OPEN_WRITE
			| Capabilities::CREATE_DIRECTORY
			| Capabilities::DELETE
			| Capabilities::MOVE
			| Capabilities::SET_ATTRIBUTE
			| Capabilities::OBSERVE
	}

	fn browse(&self, path: &VPath) -> VfsResult<Vec<Entry>> {
		let node = self.find(path).ok_or_else(Error::directory_not_found)?;
		let children = node.as_directory().ok_or_else(Error::directory_not_found)?;
		let children = children.read();

		Ok(children.iter().map(|(name, child)| entry_for(path, name, child)).collect())
	}

	fn get_entry(&self, path: &VPath) -> VfsResult<Option<Entry>> {
		if path.is_root() {
			return Ok(Some(Entry::new(VPathBuf::root(), EntryKind::Directory)));
		}

		let Ok((parent, name)) = self.find_parent_and_name(path) else {
			return Ok(None);
		};

		let children = parent.as_directory().expect("checked by find_parent_and_name").read();
		Ok(children.get(name).map(|child| entry_for(&path.parent().unwrap(), name, child)))
	}

	fn open(
		&self,
		path: &VPath,
		mode: OpenMode,
		access: AccessMode,
		_share: Share,
	) -> VfsResult<Box<dyn VfsStream>> {
		let (parent, name) = self.find_parent_and_name(path)?;
		let mut children = parent.as_directory().expect("checked above").write();

		let file = match (children.get(name), mode) {
			(Some(existing), OpenMode::CreateNew) if existing.as_file().is_some() => {
				return Err(Error::new(vfs_core::Kind::AlreadyExists).with_path(path.to_owned_path()));
			}
			(Some(existing), _) if existing.as_directory().is_some() => {
				return Err(Error::directory_not_found().with_path(path.to_owned_path()));
			}
			(Some(existing), OpenMode::Truncate) => {
				existing.as_file().unwrap().lock().content.clear();
				Arc::clone(existing)
			}
			(Some(existing), _) => Arc::clone(existing),
			(None, OpenMode::Open) => return Err(Error::file_not_found().with_path(path.to_owned_path())),
			(None, _) => {
				let fresh = Arc::new(Node::new_file());
				children.insert(name.to_string(), Arc::clone(&fresh));
				fresh
			}
		};

		let pos = if matches!(mode, OpenMode::Append) {
			file.as_file().expect("just resolved a file node").lock().content.len()
		} else {
			0
		};

		Ok(Box::new(FileStream {
			shared: Arc::clone(&self.shared),
			path: path.to_owned_path(),
			file: Arc::clone(file.as_file().expect("just resolved a file node")),
			pos,
			writable: access.wants_write(),
			dirty: false,
		}))
	}

	fn create_directory(&self, path: &VPath) -> VfsResult<()> {
		let (parent, name) = self.find_parent_and_name(path)?;
		let mut children = parent.as_directory().expect("checked above").write();

		if children.contains_key(name) {
			return Err(Error::new(vfs_core::Kind::AlreadyExists).with_path(path.to_owned_path()));
		}

		children.insert(name.to_string(), Arc::new(Node::new_directory()));
		drop(children);

		self.shared.dispatch(path, || vfs_core::Event::Create {
			time: std::time::SystemTime::now(),
			path: path.to_owned_path(),
		});

		Ok(())
	}

	fn delete(&self, path: &VPath, recursive: bool) -> VfsResult<()> {
		let (parent, name) = self.find_parent_and_name(path)?;
		let mut children = parent.as_directory().expect("checked above").write();

		let Some(existing) = children.get(name) else {
			return Err(Error::file_not_found().with_path(path.to_owned_path()));
		};

		if let Some(dir) = existing.as_directory() {
			if !recursive && !dir.read().is_empty() {
				return Err(Error::not_supported().with_path(path.to_owned_path()));
			}
		}

		children.remove(name);
		drop(children);

		self.shared.dispatch(path, || vfs_core::Event::Delete {
			time: std::time::SystemTime::now(),
			path: path.to_owned_path(),
		});

		Ok(())
	}

	fn move_entry(&self, src: &VPath, dst: &VPath) -> VfsResult<()> {
		let (src_parent, src_name) = self.find_parent_and_name(src)?;
		let (dst_parent, dst_name) = self.find_parent_and_name(dst)?;

		// Lock the source first, then the destination; callers never move a
		// path to a descendant of itself, so a fixed order avoids deadlock
		// without needing a canonical lock-ordering scheme.
		let mut src_children = src_parent.as_directory().expect("checked above").write();

		let Some(node) = src_children.remove(src_name) else {
			return Err(Error::file_not_found().with_path(src.to_owned_path()));
		};

		if Arc::ptr_eq(&src_parent, &dst_parent) {
			if src_children.contains_key(dst_name) {
				src_children.insert(src_name.to_string(), node);
				return Err(Error::new(vfs_core::Kind::AlreadyExists).with_path(dst.to_owned_path()));
			}

			src_children.insert(dst_name.to_string(), node);
		} else {
			drop(src_children);
			let mut dst_children = dst_parent.as_directory().expect("checked above").write();

			if dst_children.contains_key(dst_name) {
				return Err(Error::new(vfs_core::Kind::AlreadyExists).with_path(dst.to_owned_path()));
			}

			dst_children.insert(dst_name.to_string(), node);
		}

		self.shared.dispatch(dst, || vfs_core::Event::Rename {
			time: std::time::SystemTime::now(),
			old_path: src.to_owned_path(),
			new_path: dst.to_owned_path(),
		});

		Ok(())
	}

	fn set_attribute(&self, path: &VPath, attrs: Attributes) -> VfsResult<()> {
		let (parent, name) = self.find_parent_and_name(path)?;
		let children = parent.as_directory().expect("checked above").read();

		let Some(existing) = children.get(name) else {
			return Err(Error::file_not_found().with_path(path.to_owned_path()));
		};

		let Some(file) = existing.as_file() else {
			return Err(Error::not_supported().with_path(path.to_owned_path()));
		};

		file.lock().attributes = attrs;
		drop(children);

		self.shared.dispatch(path, || vfs_core::Event::Change {
			time: std::time::SystemTime::now(),
			path: path.to_owned_path(),
		});

		Ok(())
	}

	fn observe(&self, filter: &str, sink: Sink) -> VfsResult<Box<dyn BackendSubscription>> {
		let matcher = vfs_core::compile_glob(filter)?;
		let mut subs = self.shared.subscribers.lock();
		let index = subs.len();
		subs.push(Some(Subscriber {
			matcher,
			sink: Mutex::new(sink),
		}));

		Ok(Box::new(MemSubscription {
			shared: Arc::clone(&self.shared),
			index,
		}))
	}
}

struct FileStream {
	shared: Arc<Shared>,
	path: VPathBuf,
	file: Arc<Mutex<FileData>>,
	pos: usize,
	writable: bool,
	dirty: bool,
}

impl VfsStream for FileStream {
	fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
		let data = self.file.lock();
		let remaining = data.content.len().saturating_sub(self.pos);
		let n = remaining.min(buf.len());
		buf[..n].copy_from_slice(&data.content[self.pos..self.pos + n]);
		self.pos += n;
		Ok(n)
	}

	fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
		if !self.writable {
			return Err(Error::not_supported().with_path(self.path.clone()));
		}

		let mut data = self.file.lock();
		let end = self.pos + buf.len();

		if data.content.len() < end {
			data.content.resize(end, 0);
		}

		data.content[self.pos..end].copy_from_slice(buf);
		data.modified = std::time::SystemTime::now();
		self.pos = end;
		self.dirty = true;
		Ok(buf.len())
	}

	fn close(self: Box<Self>) -> VfsResult<()> {
		if self.dirty {
			self.shared.dispatch(&self.path, || vfs_core::Event::Change {
				time: std::time::SystemTime::now(),
				path: self.path.clone(),
			});
		}

		Ok(())
	}
}

struct MemSubscription {
	shared: Arc<Shared>,
	index: usize,
}

impl BackendSubscription for MemSubscription {
	fn cancel(&mut self) {
		if let Some(slot) = self.shared.subscribers.lock().get_mut(self.index) {
			*slot = None;
		}
	}
}
