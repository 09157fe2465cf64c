//! The Mount Tree (§4.2) and the data it carries at each node: Mount
//! Bindings, Components, per-mount Options, and the VFS-to-backend
//! [`PathMap`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::backend::{Backend, Capabilities};
use crate::error::VfsResult;
use crate::path::{VPath, VPathBuf};

/// A bijection between a VFS subtree and a backend subtree: in practice a
/// single sub-path prefix prepended/stripped on the backend side, since the
/// VFS side is always exactly the Binding's `mountPath`.
#[derive(Debug, Clone, Default)]
pub struct PathMap {
	backend_base: VPathBuf,
}

impl PathMap {
	#[must_use]
	pub fn new(backend_base: VPathBuf) -> Self {
		Self { backend_base }
	}

	/// Maps a path already relative to the Binding's `mountPath` onto the
	/// backend's own path space.
	#[must_use]
	pub fn forward(&self, relative_to_mount: &VPath) -> VPathBuf {
		self.backend_base.join_path(relative_to_mount)
	}

	/// Maps a backend-relative path back onto the Binding's `mountPath`
	/// subtree, relative to that mount path. Fails if `backend_path` doesn't
	/// fall under this map's backend base.
	pub fn inverse(&self, backend_path: &VPath) -> VfsResult<VPathBuf> {
		crate::path::rebase(self.backend_base.as_path(), VPath::new(""), backend_path)
	}
}

/// Per-Component configuration: the capability mask, an optional backend
/// sub-path, and an escape hatch for backend-specific tokens (HTTP headers,
/// credentials, cancellation tokens) keyed by a static string.
pub struct Options {
	capabilities: Capabilities,
	sub_path: VPathBuf,
	tokens: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			capabilities: Capabilities::all(),
			sub_path: VPathBuf::root(),
			tokens: HashMap::new(),
		}
	}
}

impl Options {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
		self.capabilities = capabilities;
		self
	}

	#[must_use]
	pub fn with_sub_path(mut self, sub_path: impl Into<VPathBuf>) -> Self {
		self.sub_path = sub_path.into();
		self
	}

	#[must_use]
	pub fn with_token<T: Send + Sync + 'static>(mut self, key: &'static str, value: T) -> Self {
		self.tokens.insert(key, Box::new(value));
		self
	}

	#[must_use]
	pub fn capabilities(&self) -> Capabilities {
		self.capabilities
	}

	#[must_use]
	pub fn sub_path(&self) -> &VPath {
		&self.sub_path
	}

	#[must_use]
	pub fn token<T: 'static>(&self, key: &'static str) -> Option<&T> {
		self.tokens.get(key).and_then(|b| b.downcast_ref())
	}
}

/// A single `(backend, options, path-map)` triple within a [`MountBinding`].
/// Components in a Binding are ordered; index 0 has highest priority.
pub struct Component {
	backend: Arc<dyn Backend>,
	options: Options,
	path_map: PathMap,
}

impl Component {
	#[must_use]
	pub fn new(backend: Arc<dyn Backend>, options: Options) -> Self {
		let path_map = PathMap::new(options.sub_path().to_owned_path());

		Self {
			backend,
			options,
			path_map,
		}
	}

	#[must_use]
	pub fn backend(&self) -> &Arc<dyn Backend> {
		&self.backend
	}

	#[must_use]
	pub fn options(&self) -> &Options {
		&self.options
	}

	#[must_use]
	pub fn path_map(&self) -> &PathMap {
		&self.path_map
	}

	/// The backend's own advertised capabilities, masked by this Component's
	/// per-mount `Options` (a per-call capability gate can deny an op the
	/// backend would otherwise perform).
	#[must_use]
	pub fn effective_capabilities(&self) -> Capabilities {
		self.backend.capabilities() & self.options.capabilities()
	}

	#[must_use]
	pub fn supports(&self, cap: Capabilities) -> bool {
		self.effective_capabilities().contains(cap)
	}

	/// Used by `mount()` to classify a new Component set into
	/// added/removed/reused against the previous one.
	#[must_use]
	pub fn is_equivalent_to(&self, other: &Component) -> bool {
		Arc::ptr_eq(&self.backend, &other.backend)
			&& self.options.capabilities() == other.options.capabilities()
			&& self.options.sub_path() == other.options.sub_path()
	}
}

/// The set of Components attached to one Mount Node.
pub struct MountBinding {
	mount_path: VPathBuf,
	components: Vec<Component>,
}

impl MountBinding {
	#[must_use]
	pub fn new(mount_path: VPathBuf, components: Vec<Component>) -> Self {
		Self {
			mount_path,
			components,
		}
	}

	#[must_use]
	pub fn mount_path(&self) -> &VPath {
		&self.mount_path
	}

	#[must_use]
	pub fn components(&self) -> &[Component] {
		&self.components
	}
}

#[derive(Default)]
pub(crate) struct MountNode {
	children: HashMap<String, MountNode>,
	binding: Option<Arc<MountBinding>>,
	last_modified: Option<SystemTime>,
	last_access: Option<SystemTime>,
}

impl MountNode {
	pub(crate) fn binding(&self) -> Option<&Arc<MountBinding>> {
		self.binding.as_ref()
	}

	pub(crate) fn has_children(&self) -> bool {
		!self.children.is_empty()
	}

	pub(crate) fn child_names(&self) -> impl Iterator<Item = &str> {
		self.children.keys().map(String::as_str)
	}

	pub(crate) fn last_modified(&self) -> Option<SystemTime> {
		self.last_modified
	}

	pub(crate) fn last_access(&self) -> Option<SystemTime> {
		self.last_access
	}

	pub(crate) fn touch_modified(&mut self, time: SystemTime) {
		self.last_modified = Some(time);
	}

	pub(crate) fn touch_access(&mut self, time: SystemTime) {
		self.last_access = Some(time);
	}
}

/// The result of walking the tree from root towards a path.
pub(crate) struct WalkResult {
	/// All Bindings encountered along the root-to-path walk, in root-first
	/// order. The last element, if present, is the primary (terminal)
	/// binding; earlier ones are shadowing ancestors.
	pub bindings: Vec<Arc<MountBinding>>,
	/// `true` iff the full path mapped onto an existing node.
	pub found_exact: bool,
	/// Names of the terminal node's children, when `found_exact` — used to
	/// report virtual (binding-less) subdirectories synthesized by deeper
	/// mounts.
	pub child_names: Vec<String>,
}

/// A tree of Mount Nodes keyed by path segment, rooted at `""`. All mutable
/// access is expected to happen under the caller's own structural lock
/// (§5); this type has no internal synchronization of its own.
#[derive(Default)]
pub(crate) struct MountTree {
	root: MountNode,
}

impl MountTree {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	pub(crate) fn walk(&self, path: &VPath) -> WalkResult {
		let mut node = &self.root;
		let mut bindings = Vec::new();

		if let Some(b) = &node.binding {
			bindings.push(Arc::clone(b));
		}

		let mut found_exact = true;

		for seg in path.components() {
			match node.children.get(seg) {
				Some(child) => {
					node = child;

					if let Some(b) = &node.binding {
						bindings.push(Arc::clone(b));
					}
				}
				None => {
					found_exact = false;
					break;
				}
			}
		}

		let child_names = if found_exact {
			node.children.keys().cloned().collect()
		} else {
			Vec::new()
		};

		WalkResult {
			bindings,
			found_exact,
			child_names,
		}
	}

	/// Like [`Self::walk`], but creates missing nodes. Returns the paths of
	/// any nodes that were newly created, root-first, for synthetic mount
	/// event emission.
	pub(crate) fn get_or_create(&mut self, path: &VPath) -> Vec<VPathBuf> {
		let mut node = &mut self.root;
		let mut created = Vec::new();
		let mut built = VPathBuf::root();

		for seg in path.components() {
			built = built.join(seg);

			node = node.children.entry(seg.to_string()).or_insert_with(|| {
				created.push(built.clone());
				MountNode::default()
			});
		}

		created
	}

	/// Replaces the binding at `path`, which must already exist (call
	/// [`Self::get_or_create`] first). Returns the previous binding, if any.
	pub(crate) fn set_binding(
		&mut self,
		path: &VPath,
		binding: Option<Arc<MountBinding>>,
	) -> Option<Arc<MountBinding>> {
		let node = Self::find_mut(&mut self.root, path);
		std::mem::replace(&mut node.binding, binding)
	}

	fn find_mut<'a>(root: &'a mut MountNode, path: &VPath) -> &'a mut MountNode {
		let mut node = root;

		for seg in path.components() {
			node = node.children.entry(seg.to_string()).or_default();
		}

		node
	}

	/// Removes empty, binding-less nodes along `path`, deepest first.
	/// Returns the paths of nodes that were pruned, deepest-first.
	pub(crate) fn prune_empty_ancestors(&mut self, path: &VPath) -> Vec<VPathBuf> {
		let segs: Vec<&str> = path.components().collect();
		let mut pruned = Vec::new();
		Self::prune_recursive(&mut self.root, &segs, &mut pruned, &VPathBuf::root());
		pruned
	}

	fn prune_recursive(
		node: &mut MountNode,
		segs: &[&str],
		pruned: &mut Vec<VPathBuf>,
		built: &VPathBuf,
	) -> bool {
		if let Some((head, tail)) = segs.split_first() {
			let child_path = built.join(head);

			let should_remove = if let Some(child) = node.children.get_mut(*head) {
				Self::prune_recursive(child, tail, pruned, &child_path)
			} else {
				false
			};

			if should_remove {
				node.children.remove(*head);
				pruned.push(child_path);
			}
		}

		node.binding.is_none() && node.children.is_empty()
	}

	/// All Mount Nodes carrying a Binding, for `listMountPoints()`.
	pub(crate) fn list_mount_points(&self) -> Vec<Arc<MountBinding>> {
		let mut out = Vec::new();
		Self::collect_bindings(&self.root, &mut out);
		out
	}

	fn collect_bindings(node: &MountNode, out: &mut Vec<Arc<MountBinding>>) {
		if let Some(b) = &node.binding {
			out.push(Arc::clone(b));
		}

		for child in node.children.values() {
			Self::collect_bindings(child, out);
		}
	}
}
