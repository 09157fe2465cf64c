//! VFS Core (§4.4): the public filesystem surface. Owns the Mount Tree and
//! the Observer Tree, routes calls to Bindings, unifies their results, and
//! synthesizes Create/Delete events when mount structure itself changes.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::aggregate;
use crate::backend::{AccessMode, Attributes as BackendAttributes, OpenMode, Share, VfsStream};
use crate::dispose::{Disposable, DisposalChain};
use crate::entry::{Entry, EntryKind};
use crate::error::{Error, VfsResult};
use crate::mount_tree::{Component, MountBinding, MountTree};
use crate::observer::{CollectScope, Event, ObserverHandle, ObserverTree, Sink};
use crate::path::{rebase, VPath, VPathBuf};

/// The composable virtual filesystem: a single uniform surface over an
/// arbitrary set of mounted backends.
pub struct Vfs {
	mount_tree: RwLock<MountTree>,
	observer_tree: ObserverTree,
	disposal: DisposalChain,
}

impl Vfs {
	#[must_use]
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			mount_tree: RwLock::new(MountTree::new()),
			observer_tree: ObserverTree::new(),
			disposal: DisposalChain::new(),
		})
	}

	/// A VFS that, on [`Self::dispose`], drains its registered observers
	/// but remains usable afterwards. Intended for library-global
	/// singletons that must support a "reset" without becoming unusable.
	#[must_use]
	pub fn new_non_disposable() -> Arc<Self> {
		Arc::new(Self {
			mount_tree: RwLock::new(MountTree::new()),
			observer_tree: ObserverTree::new(),
			disposal: DisposalChain::non_disposable(),
		})
	}

	#[must_use]
	pub fn is_disposed(&self) -> bool {
		self.disposal.is_disposed()
	}

	pub fn dispose(&self) -> VfsResult<()> {
		self.disposal.dispose()
	}

	// -- mount / unmount -----------------------------------------------

	pub fn mount(&self, path: &VPath, components: Vec<Component>) -> VfsResult<()> {
		log::debug!("mount({path}): {} component(s)", components.len());
		let new_binding = Arc::new(MountBinding::new(path.to_owned_path(), components));

		let (created_paths, old_binding) = {
			let mut tree = self.mount_tree.write();
			log::trace!("acquired structural lock (write) for mount({path})");
			let created = tree.get_or_create(path);
			let old = tree.set_binding(path, Some(Arc::clone(&new_binding)));
			(created, old)
		};
		log::trace!("released structural lock for mount({path})");

		let added: Vec<&Component> = new_binding
			.components()
			.iter()
			.filter(|c| is_added_component(c, old_binding.as_deref()))
			.collect();

		let removed: Vec<&Component> = old_binding
			.as_deref()
			.map(|old| {
				old.components()
					.iter()
					.filter(|c| is_removed_component(c, &new_binding))
					.collect::<Vec<_>>()
			})
			.unwrap_or_default();

		log::debug!(
			"mount({path}): {} added, {} removed, {} reused",
			added.len(),
			removed.len(),
			new_binding.components().len() - added.len()
		);

		for created in &created_paths {
			self.dispatch(created, |time| Event::Create {
				time,
				path: created.clone(),
			});
		}

		for component in added {
			self.emit_for_component_subtree(path, component, true);
		}

		for component in removed {
			self.emit_for_component_subtree(path, component, false);
		}

		Ok(())
	}

	pub fn unmount(&self, path: &VPath) -> VfsResult<()> {
		log::debug!("unmount({path})");

		let (old_binding, pruned) = {
			let mut tree = self.mount_tree.write();
			let walk = tree.walk(path);

			if !walk.found_exact {
				return Err(Error::directory_not_found().with_path(path.to_owned_path()));
			}

			let old = tree.set_binding(path, None);

			let Some(old) = old else {
				return Err(Error::directory_not_found().with_path(path.to_owned_path()));
			};

			let pruned = tree.prune_empty_ancestors(path);
			(old, pruned)
		};

		for component in old_binding.components() {
			self.emit_for_component_subtree(path, component, false);
		}

		for pruned_path in &pruned {
			self.dispatch(pruned_path, |time| Event::Delete {
				time,
				path: pruned_path.clone(),
			});
		}

		Ok(())
	}

	#[must_use]
	pub fn list_mount_points(&self) -> Vec<Entry> {
		let tree = self.mount_tree.read();

		tree.list_mount_points()
			.into_iter()
			.map(|b| Entry::new(b.mount_path().to_owned_path(), EntryKind::MountPoint))
			.collect()
	}

	// -- read operations -------------------------------------------------

	pub fn browse(&self, path: &VPath) -> VfsResult<Vec<Entry>> {
		let walk = self.mount_tree.read().walk(path);
		let mut lists = Vec::new();
		let mut any_ok = false;
		let mut last_tolerated = None;

		// Deepest binding first so it wins priority when entries collide.
		for binding in walk.bindings.iter().rev() {
			let Ok(relative) = rebase(binding.mount_path(), VPath::new(""), path) else {
				continue;
			};

			match aggregate::browse(binding, &relative) {
				Ok(entries) => {
					any_ok = true;
					lists.push(entries);
				}
				Err(e) if e.is_tolerated_during_fanout() => {
					last_tolerated.get_or_insert(e);
				}
				Err(e) => return Err(e),
			};
		}

		if walk.found_exact {
			let virtual_children: Vec<Entry> = walk
				.child_names
				.iter()
				.map(|name| Entry::new(path.join(name), EntryKind::MountPoint))
				.collect();

			if !virtual_children.is_empty() {
				any_ok = true;
				lists.push(virtual_children);
			}
		}

		if !any_ok {
			return Err(last_tolerated.unwrap_or_else(Error::directory_not_found));
		}

		Ok(aggregate::merge_entry_lists(lists))
	}

	pub fn get_entry(&self, path: &VPath) -> VfsResult<Option<Entry>> {
		let walk = self.mount_tree.read().walk(path);
		let mut found: Vec<Entry> = Vec::new();
		let mut last_tolerated = None;

		for binding in walk.bindings.iter().rev() {
			let Ok(relative) = rebase(binding.mount_path(), VPath::new(""), path) else {
				continue;
			};

			match aggregate::get_entry(binding, &relative) {
				Ok(Some(entry)) => found.push(entry),
				Ok(None) => {}
				Err(e) if e.is_tolerated_during_fanout() => {
					last_tolerated.get_or_insert(e);
				}
				Err(e) => return Err(e),
			};
		}

		if walk.found_exact && !walk.child_names.is_empty() {
			found.push(Entry::new(path.to_owned_path(), EntryKind::MountPoint));
		}

		if found.is_empty() {
			return match last_tolerated {
				Some(e) => Err(e),
				None => Ok(None),
			};
		}

		let mut iter = found.into_iter();
		let mut merged = iter.next().expect("checked non-empty above");

		for entry in iter {
			merged = merged.unify(entry);
		}

		Ok(Some(merged))
	}

	// -- write operations --------------------------------------------------

	pub fn open(
		&self,
		path: &VPath,
		mode: OpenMode,
		access: AccessMode,
		share: Share,
	) -> VfsResult<Box<dyn VfsStream>> {
		self.route_write(path, |binding, relative| aggregate::open(binding, relative, mode, access, share))
	}

	pub fn create_directory(&self, path: &VPath) -> VfsResult<()> {
		self.route_write(path, aggregate::create_directory)
	}

	pub fn delete(&self, path: &VPath, recursive: bool) -> VfsResult<()> {
		self.route_write(path, |binding, relative| aggregate::delete(binding, relative, recursive))
	}

	pub fn set_attribute(&self, path: &VPath, attrs: BackendAttributes) -> VfsResult<()> {
		self.route_write(path, |binding, relative| {
			aggregate::set_attribute(binding, relative, attrs)
		})
	}

	pub fn move_path(&self, src: &VPath, dst: &VPath) -> VfsResult<()> {
		let src_walk = self.mount_tree.read().walk(src);
		let dst_walk = self.mount_tree.read().walk(dst);

		let Some(src_binding) = src_walk.bindings.last() else {
			return Err(Error::file_not_found().with_path(src.to_owned_path()));
		};

		let Some(dst_binding) = dst_walk.bindings.last() else {
			return Err(Error::directory_not_found().with_path(dst.to_owned_path()));
		};

		let src_relative = rebase(src_binding.mount_path(), VPath::new(""), src)?;
		let dst_relative = rebase(dst_binding.mount_path(), VPath::new(""), dst)?;

		aggregate::move_entry(src_binding, &src_relative, dst_binding, &dst_relative)
	}

	/// Shared routing discipline for the write-type operations: walk to
	/// the deepest binding at `path`, try it, and fall back to shallower
	/// bindings on the way up using the same "supported but missing"
	/// tolerance as §4.3.
	fn route_write<T>(
		&self,
		path: &VPath,
		mut op: impl FnMut(&MountBinding, &VPath) -> VfsResult<T>,
	) -> VfsResult<T> {
		let walk = self.mount_tree.read().walk(path);
		let mut not_found = None;
		let mut any_supported = false;

		for binding in walk.bindings.iter().rev() {
			let Ok(relative) = rebase(binding.mount_path(), VPath::new(""), path) else {
				continue;
			};

			match op(binding, &relative) {
				Ok(value) => return Ok(value),
				Err(e) if e.kind() == crate::error::Kind::NotSupported => continue,
				Err(e)
					if matches!(
						e.kind(),
						crate::error::Kind::FileNotFound | crate::error::Kind::DirectoryNotFound
					) =>
				{
					any_supported = true;
					not_found.get_or_insert(e);
				}
				Err(e) => return Err(e),
			}
		}

		match not_found {
			Some(e) => Err(e),
			None if any_supported => Err(Error::file_not_found().with_path(path.to_owned_path())),
			None => Err(Error::not_supported().with_path(path.to_owned_path())),
		}
	}

	// -- observation ---------------------------------------------------

	/// Registers an observer for `filter`. Emits a synthetic [`Event::Start`]
	/// before subscribing to any backend, so no backend event can be
	/// observed ahead of it.
	pub fn observe(self: &Arc<Self>, filter: &str, sink: Sink) -> VfsResult<Arc<ObserverHandle>> {
		let handle = ObserverHandle::compile(filter, sink)?;
		self.observer_tree.insert(Arc::clone(&handle));
		handle.push(Event::Start {
			time: SystemTime::now(),
		});

		let all_bindings = self.mount_tree.read().list_mount_points();

		for binding in &all_bindings {
			let weak_self = Arc::downgrade(self);
			let mount_path = binding.mount_path().to_owned_path();

			let subs = aggregate::observe_components(binding, filter, move |_component| {
				let weak_self = weak_self.clone();
				let mount_path = mount_path.clone();

				Sink::new(
					move |event| {
						if let Some(this) = weak_self.upgrade() {
							this.dispatch_backend_event(&mount_path, event);
						}
					},
					move |_err| {},
					|| {},
				)
			});

			for sub in subs {
				handle.add_subscription(sub);
			}
		}

		self.disposal.add_disposable(Arc::clone(&handle) as Arc<dyn Disposable>);
		Ok(handle)
	}

	/// Translates a backend-relative event into VFS space and dispatches it
	/// to every observer whose stem is an ancestor of (or equal to) the
	/// event path and whose matcher accepts it (§4.4).
	fn dispatch_backend_event(&self, mount_path: &VPath, event: Event) {
		let rebase_one = |p: &VPathBuf| mount_path.join_path(p);

		let (path_for_lookup, translated) = match event {
			Event::Create { time, path } => {
				let p = rebase_one(&path);
				(p.clone(), Event::Create { time, path: p })
			}
			Event::Change { time, path } => {
				let p = rebase_one(&path);
				(p.clone(), Event::Change { time, path: p })
			}
			Event::Delete { time, path } => {
				let p = rebase_one(&path);
				(p.clone(), Event::Delete { time, path: p })
			}
			Event::Rename {
				time,
				old_path,
				new_path,
			} => {
				let np = rebase_one(&new_path);
				let op = rebase_one(&old_path);
				(np.clone(), Event::Rename {
					time,
					old_path: op,
					new_path: np,
				})
			}
			Event::Start { .. } => return,
		};

		self.dispatch(&path_for_lookup, move |_| translated.clone());
	}

	fn dispatch(&self, path: &VPath, event_at: impl Fn(SystemTime) -> Event) {
		let now = SystemTime::now();
		let handles = self.observer_tree.collect(path, CollectScope::ancestors_and_self());

		for handle in handles {
			if handle.matches(path) {
				handle.push(event_at(now));
			}
		}
	}

	fn emit_for_component_subtree(&self, mount_path: &VPath, component: &Component, created: bool) {
		for relative in scan_component_subtree(component) {
			let full_path = mount_path.join_path(&relative);

			if created {
				self.dispatch(&full_path, |time| Event::Create {
					time,
					path: full_path.clone(),
				});
			} else {
				self.dispatch(&full_path, |time| Event::Delete {
					time,
					path: full_path.clone(),
				});
			}
		}
	}
}

impl Default for Vfs {
	fn default() -> Self {
		Self {
			mount_tree: RwLock::new(MountTree::new()),
			observer_tree: ObserverTree::new(),
			disposal: DisposalChain::new(),
		}
	}
}

/// `true` if `component` (from the new Binding) has no equivalent in `old`.
fn is_added_component(component: &Component, old: Option<&MountBinding>) -> bool {
	!old.is_some_and(|old| old.components().iter().any(|c| c.is_equivalent_to(component)))
}

/// `true` if `component` (from the old Binding) has no equivalent in `new`.
fn is_removed_component(component: &Component, new: &MountBinding) -> bool {
	!new.components().iter().any(|c| c.is_equivalent_to(component))
}

/// Recursively enumerates every descendant of a Component's mount root,
/// returning paths relative to the mount (used for synthetic mount/unmount
/// event emission).
fn scan_component_subtree(component: &Component) -> Vec<VPathBuf> {
	let mut out = Vec::new();
	let mut stack = vec![VPathBuf::root()];

	while let Some(relative) = stack.pop() {
		let backend_path = component.path_map().forward(&relative);

		let Ok(entries) = component.backend().browse(&backend_path) else {
			continue;
		};

		for entry in entries {
			let child = relative.join(entry.name());
			out.push(child.clone());

			if entry.is_directory() {
				stack.push(child);
			}
		}
	}

	out
}
