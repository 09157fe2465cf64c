//! A reference [`Backend`] (§4.9) over a real directory on local disk.
//!
//! A `LocalBackend` canonicalizes its root once at construction and refuses
//! any path that would resolve outside it. Everything else is a thin layer
//! over `std::fs`; change notification rides on `notify`'s OS-native
//! watchers rather than polling.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use vfs_core::{
	AccessMode, Attributes, Backend, BackendSubscription, Capabilities, Entry, EntryKind, Error, GlobMatcher,
	Kind, OpenMode, Share, Sink, VPath, VPathBuf, VfsResult, VfsStream,
};

enum Root {
	Fixed(PathBuf),
	/// No single root directory; `browse("")` enumerates OS drives instead.
	/// Only meaningful on Windows; constructed nowhere on other platforms.
	#[cfg(windows)]
	Drives,
}

struct Subscriber {
	matcher: GlobMatcher,
	sink: Mutex<Sink>,
}

struct Shared {
	root: Root,
	subscribers: Mutex<Vec<Option<Subscriber>>>,
	watcher: Mutex<Option<RecommendedWatcher>>,
}

impl Shared {
	fn root_path(&self) -> Option<&Path> {
		match &self.root {
			Root::Fixed(p) => Some(p),
			#[cfg(windows)]
			Root::Drives => None,
		}
	}

	fn dispatch(&self, path: &VPath, event: vfs_core::Event) {
		for sub in self.subscribers.lock().iter().flatten() {
			if sub.matcher.is_match(path) {
				sub.sink.lock().next(event.clone());
			}
		}
	}

	fn rebase_os_path(&self, os_path: &Path) -> Option<VPathBuf> {
		let root = self.root_path()?;
		let rel = os_path.strip_prefix(root).ok()?;
		let segments: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
		Some(VPathBuf::from_segments(segments))
	}

	fn handle_fs_event(&self, event: notify::Event) {
		use notify::event::{ModifyKind, RenameMode};

		if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
			if event.paths.len() == 2 {
				let (Some(old), Some(new)) = (
					self.rebase_os_path(&event.paths[0]),
					self.rebase_os_path(&event.paths[1]),
				) else {
					return;
				};

				self.dispatch(
					new.as_path(),
					vfs_core::Event::Rename {
						time: SystemTime::now(),
						old_path: old,
						new_path: new,
					},
				);

				return;
			}
		}

		let build = match event.kind {
			EventKind::Create(_) => |time, path| vfs_core::Event::Create { time, path },
			EventKind::Remove(_) => |time, path| vfs_core::Event::Delete { time, path },
			EventKind::Modify(_) => |time, path| vfs_core::Event::Change { time, path },
			EventKind::Access(_) | EventKind::Other | EventKind::Any => return,
		};

		for os_path in &event.paths {
			let Some(path) = self.rebase_os_path(os_path) else {
				continue;
			};

			self.dispatch(path.as_path(), build(SystemTime::now(), path.clone()));
		}
	}
}

/// A backend mounted over a directory on the local filesystem.
pub struct LocalBackend {
	shared: Arc<Shared>,
}

impl LocalBackend {
	/// Canonicalizes `root` and builds a backend rooted there. Fails if
	/// `root` doesn't exist or isn't a directory.
	pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
		let root = fs::canonicalize(root)?;

		if !root.is_dir() {
			return Err(io::Error::new(io::ErrorKind::InvalidInput, "root is not a directory"));
		}

		Ok(Self {
			shared: Arc::new(Shared {
				root: Root::Fixed(root),
				subscribers: Mutex::new(Vec::new()),
				watcher: Mutex::new(None),
			}),
		})
	}

	/// A backend with no single root directory: `browse("")` lists OS
	/// drives and every further path is resolved against its drive.
	#[cfg(windows)]
	#[must_use]
	pub fn drives() -> Self {
		Self {
			shared: Arc::new(Shared {
				root: Root::Drives,
				subscribers: Mutex::new(Vec::new()),
				watcher: Mutex::new(None),
			}),
		}
	}

	fn resolve(&self, path: &VPath) -> VfsResult<PathBuf> {
		let Some(root) = self.shared.root_path() else {
			return Err(Error::not_supported().with_path(path.to_owned_path()));
		};

		let mut real = root.to_path_buf();

		for seg in path.components() {
			if seg == ".." || seg.contains(std::path::MAIN_SEPARATOR) {
				return Err(Error::new(Kind::PathEscape).with_path(path.to_owned_path()));
			}

			real.push(seg);
		}

		if !real.starts_with(root) {
			return Err(Error::new(Kind::PathEscape).with_path(path.to_owned_path()));
		}

		Ok(real)
	}

	fn ensure_watcher(&self) -> VfsResult<()> {
		let mut guard = self.shared.watcher.lock();

		if guard.is_some() {
			return Ok(());
		}

		let Some(root) = self.shared.root_path() else {
			return Err(Error::not_supported());
		};

		let shared = Arc::clone(&self.shared);

		let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
			Ok(event) => shared.handle_fs_event(event),
			Err(e) => log::warn!("local backend watcher error: {e}"),
		})
		.map_err(notify_to_vfs_error)?;

		watcher.watch(root, RecursiveMode::Recursive).map_err(notify_to_vfs_error)?;
		*guard = Some(watcher);
		Ok(())
	}
}

fn notify_to_vfs_error(e: notify::Error) -> Error {
	Error::new(Kind::Io).with_source(e)
}

#[cfg(windows)]
fn drive_entries() -> Vec<Entry> {
	(b'A'..=b'Z')
		.filter_map(|letter| {
			let root = format!("{}:\\", letter as char);

			if fs::metadata(&root).is_ok() {
				Some(Entry::new(VPathBuf::from(format!("{}:", letter as char)), EntryKind::Drive))
			} else {
				None
			}
		})
		.collect()
}

fn metadata_to_entry(path: VPathBuf, meta: &fs::Metadata) -> Entry {
	let kind = if meta.is_dir() { EntryKind::Directory } else { EntryKind::File };
	let mut attrs = Attributes::empty();

	if meta.permissions().readonly() {
		attrs |= Attributes::READ_ONLY;
	}

	if meta.file_type().is_symlink() {
		attrs |= Attributes::SYMLINK;
	}

	let mut entry = Entry::new(path, kind).with_attributes(attrs);

	if meta.is_file() {
		entry = entry.with_length(meta.len() as i64);
	}

	if let Ok(modified) = meta.modified() {
		entry = entry.with_last_modified(modified);
	}

	if let Ok(accessed) = meta.accessed() {
		entry = entry.with_last_access(accessed);
	}

	entry
}

impl Backend for LocalBackend {
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
		#[cfg(windows)]
		if path.is_root() && matches!(self.shared.root, Root::Drives) {
			return Ok(drive_entries());
		}

		let real = self.resolve(path)?;
		let mut out = Vec::new();

		for entry in fs::read_dir(&real).map_err(Error::from)? {
			let entry = entry.map_err(Error::from)?;
			let meta = entry.metadata().map_err(Error::from)?;
			let name = entry.file_name().to_string_lossy().into_owned();
			out.push(metadata_to_entry(path.join(&name), &meta));
		}

		Ok(out)
	}

	fn get_entry(&self, path: &VPath) -> VfsResult<Option<Entry>> {
		if path.is_root() {
			#[cfg(windows)]
			if matches!(self.shared.root, Root::Drives) {
				return Ok(Some(Entry::new(VPathBuf::root(), EntryKind::Directory)));
			}
		}

		let real = match self.resolve(path) {
			Ok(real) => real,
			Err(e) if e.kind() == Kind::NotSupported => return Err(e),
			Err(_) => return Ok(None),
		};

		match fs::symlink_metadata(&real) {
			Ok(meta) => Ok(Some(metadata_to_entry(path.to_owned_path(), &meta))),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(Error::from(e)),
		}
	}

	fn open(
		&self,
		path: &VPath,
		mode: OpenMode,
		access: AccessMode,
		_share: Share,
	) -> VfsResult<Box<dyn VfsStream>> {
		let real = self.resolve(path)?;
		let mut options = fs::OpenOptions::new();
		options.read(access.wants_read()).write(access.wants_write());

		match mode {
			OpenMode::Open => {}
			OpenMode::Create => {
				options.create(true);
			}
			OpenMode::CreateNew => {
				options.create_new(true);
			}
			OpenMode::OpenOrCreate => {
				options.create(true);
			}
			OpenMode::Truncate => {
				options.create(true).truncate(true);
			}
			OpenMode::Append => {
				options.create(true).append(true);
			}
		}

		let file = options.open(&real).map_err(Error::from)?;
		Ok(Box::new(FileStream { file }))
	}

	fn create_directory(&self, path: &VPath) -> VfsResult<()> {
		let real = self.resolve(path)?;
		fs::create_dir(&real).map_err(Error::from)
	}

	fn delete(&self, path: &VPath, recursive: bool) -> VfsResult<()> {
		let real = self.resolve(path)?;
		let meta = fs::symlink_metadata(&real).map_err(Error::from)?;

		if meta.is_dir() {
			if recursive {
				fs::remove_dir_all(&real).map_err(Error::from)
			} else {
				fs::remove_dir(&real).map_err(Error::from)
			}
		} else {
			fs::remove_file(&real).map_err(Error::from)
		}
	}

	fn move_entry(&self, src: &VPath, dst: &VPath) -> VfsResult<()> {
		let src_real = self.resolve(src)?;
		let dst_real = self.resolve(dst)?;
		fs::rename(&src_real, &dst_real).map_err(Error::from)
	}

	fn set_attribute(&self, path: &VPath, attrs: Attributes) -> VfsResult<()> {
		let real = self.resolve(path)?;
		let mut perms = fs::metadata(&real).map_err(Error::from)?.permissions();
		perms.set_readonly(attrs.contains(Attributes::READ_ONLY));
		fs::set_permissions(&real, perms).map_err(Error::from)
	}

	fn observe(&self, filter: &str, sink: Sink) -> VfsResult<Box<dyn BackendSubscription>> {
		self.ensure_watcher()?;
		let matcher = vfs_core::compile_glob(filter)?;
		let mut subs = self.shared.subscribers.lock();
		let index = subs.len();
		subs.push(Some(Subscriber { matcher, sink: Mutex::new(sink) }));

		Ok(Box::new(LocalSubscription {
			shared: Arc::clone(&self.shared),
			index,
		}))
	}
}

struct FileStream {
	file: fs::File,
}

impl VfsStream for FileStream {
	fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
		use std::io::Read;
		self.file.read(buf).map_err(Error::from)
	}

	fn write(&mut self, buf: &[u8]) -> VfsResult<usize> {
		use std::io::Write;
		self.file.write(buf).map_err(Error::from)
	}

	fn flush(&mut self) -> VfsResult<()> {
		use std::io::Write;
		self.file.flush().map_err(Error::from)
	}

	fn close(self: Box<Self>) -> VfsResult<()> {
		Ok(())
	}
}

struct LocalSubscription {
	shared: Arc<Shared>,
	index: usize,
}

impl BackendSubscription for LocalSubscription {
	fn cancel(&mut self) {
		if let Some(slot) = self.shared.subscribers.lock().get_mut(self.index) {
			*slot = None;
		}
	}
}

#[cfg(test)]
mod test;
