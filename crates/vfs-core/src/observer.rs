//! The Observer Tree (§4.5): a stem-keyed index of active glob-filtered
//! subscriptions, independent of the Mount Tree so that an observer can be
//! registered before its subtree is ever mounted.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use crate::backend::BackendSubscription;
use crate::error::Error;
use crate::path::{GlobMatcher, VPath, VPathBuf};

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
	fn next() -> Self {
		Self(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for ObserverId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "observer#{}", self.0)
	}
}

/// A change notification. Delivered through a [`Sink`] already scoped to the
/// observer that matched it, so unlike the reference event shapes this
/// doesn't carry its own observer identity back to the callback.
#[derive(Debug, Clone)]
pub enum Event {
	Start { time: SystemTime },
	Create { time: SystemTime, path: VPathBuf },
	Change { time: SystemTime, path: VPathBuf },
	Delete { time: SystemTime, path: VPathBuf },
	Rename {
		time: SystemTime,
		old_path: VPathBuf,
		new_path: VPathBuf,
	},
}

/// A push target: the three callbacks a subscriber supplies. Modeled as a
/// plain struct of closures rather than a channel, since nothing downstream
/// here needs cross-thread buffering beyond what the caller's own closures
/// choose to do.
pub struct Sink {
	on_next: Box<dyn FnMut(Event) + Send>,
	on_error: Box<dyn FnMut(Error) + Send>,
	on_completed: Box<dyn FnMut() + Send>,
}

impl Sink {
	pub fn new(
		on_next: impl FnMut(Event) + Send + 'static,
		on_error: impl FnMut(Error) + Send + 'static,
		on_completed: impl FnMut() + Send + 'static,
	) -> Self {
		Self {
			on_next: Box::new(on_next),
			on_error: Box::new(on_error),
			on_completed: Box::new(on_completed),
		}
	}

	/// A sink that only cares about successful events; errors are logged
	/// and swallowed, completion is ignored.
	pub fn from_next(mut on_next: impl FnMut(Event) + Send + 'static) -> Self {
		Self::new(
			move |e| on_next(e),
			|err| log::warn!("unhandled observer error: {err}"),
			|| {},
		)
	}

	pub fn next(&mut self, event: Event) {
		(self.on_next)(event);
	}

	pub fn error(&mut self, error: Error) {
		(self.on_error)(error);
	}

	pub fn completed(&mut self) {
		(self.on_completed)();
	}
}

impl fmt::Debug for Sink {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Sink").finish_non_exhaustive()
	}
}

/// An active subscription created by [`crate::Vfs::observe`].
///
/// Disposing the handle detaches it from its [`ObserverNode`], cancels every
/// backend subscription it accumulated, and prunes now-empty nodes back up
/// the tree (§4.6).
pub struct ObserverHandle {
	id: ObserverId,
	filter: String,
	stem: VPathBuf,
	matcher: GlobMatcher,
	sink: Mutex<Sink>,
	subscriptions: Mutex<Vec<Box<dyn BackendSubscription>>>,
	disposed: std::sync::atomic::AtomicBool,
}

impl ObserverHandle {
	pub(crate) fn new(filter: &str, matcher: GlobMatcher, sink: Sink) -> Arc<Self> {
		Arc::new(Self {
			id: ObserverId::next(),
			filter: filter.to_string(),
			stem: crate::path::glob_stem(filter),
			matcher,
			sink: Mutex::new(sink),
			subscriptions: Mutex::new(Vec::new()),
			disposed: std::sync::atomic::AtomicBool::new(false),
		})
	}

	/// Compiles `filter` and builds a handle around it.
	pub(crate) fn compile(filter: &str, sink: Sink) -> crate::error::VfsResult<Arc<Self>> {
		let matcher = crate::path::compile_glob(filter)?;
		Ok(Self::new(filter, matcher, sink))
	}

	#[must_use]
	pub fn id(&self) -> ObserverId {
		self.id
	}

	#[must_use]
	pub fn filter(&self) -> &str {
		&self.filter
	}

	#[must_use]
	pub fn stem(&self) -> &VPath {
		&self.stem
	}

	#[must_use]
	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	#[must_use]
	pub fn matches(&self, path: &VPath) -> bool {
		self.matcher.is_match(path)
	}

	pub(crate) fn push(&self, event: Event) {
		if self.is_disposed() {
			return;
		}

		self.sink.lock().next(event);
	}

	pub(crate) fn push_error(&self, error: Error) {
		if self.is_disposed() {
			return;
		}

		self.sink.lock().error(error);
	}

	pub(crate) fn add_subscription(&self, sub: Box<dyn BackendSubscription>) {
		if self.is_disposed() {
			let mut sub = sub;
			sub.cancel();
			return;
		}

		self.subscriptions.lock().push(sub);
	}

	/// Detaches every backend subscription and marks the handle disposed.
	/// Idempotent.
	pub fn dispose(&self) {
		if self.disposed.swap(true, Ordering::AcqRel) {
			return;
		}

		for mut sub in self.subscriptions.lock().drain(..) {
			sub.cancel();
		}

		self.sink.lock().completed();
	}
}

impl Drop for ObserverHandle {
	fn drop(&mut self) {
		self.dispose();
	}
}

impl crate::dispose::Disposable for ObserverHandle {
	fn dispose(&self) -> crate::error::VfsResult<()> {
		ObserverHandle::dispose(self);
		Ok(())
	}

	fn is_disposed(&self) -> bool {
		ObserverHandle::is_disposed(self)
	}
}

/// Which positions relative to a path a [`ObserverTree::collect`] call
/// should gather handles from.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectScope {
	pub ancestors: bool,
	pub this: bool,
	pub descendants: bool,
}

impl CollectScope {
	#[must_use]
	pub fn ancestors_and_self() -> Self {
		Self {
			ancestors: true,
			this: true,
			descendants: false,
		}
	}

	#[must_use]
	pub fn all() -> Self {
		Self {
			ancestors: true,
			this: true,
			descendants: true,
		}
	}
}

#[derive(Default)]
struct ObserverNode {
	children: HashMap<String, ObserverNode>,
	handles: Vec<Arc<ObserverHandle>>,
}

impl ObserverNode {
	fn is_empty(&self) -> bool {
		self.children.is_empty() && self.handles.is_empty()
	}
}

/// The stem-keyed index of active [`ObserverHandle`]s.
#[derive(Default)]
pub struct ObserverTree {
	root: RwLock<ObserverNode>,
}

impl ObserverTree {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts `handle` at the node addressed by its stem, creating
	/// intermediate nodes as needed.
	pub fn insert(&self, handle: Arc<ObserverHandle>) {
		let mut node = self.root.write();
		let mut cur = &mut *node;

		for seg in handle.stem().components() {
			cur = cur.children.entry(seg.to_string()).or_default();
		}

		cur.handles.push(handle);
	}

	/// Removes `handle` and prunes now-empty nodes back up the tree.
	pub fn remove(&self, handle: &Arc<ObserverHandle>) {
		let mut root = self.root.write();
		let path: Vec<String> = handle.stem().components().map(str::to_string).collect();
		Self::remove_recursive(&mut root, &path, handle.id());
	}

	fn remove_recursive(node: &mut ObserverNode, path: &[String], id: ObserverId) -> bool {
		if path.is_empty() {
			node.handles.retain(|h| h.id() != id);
		} else if let Some(child) = node.children.get_mut(&path[0]) {
			let prune_child = Self::remove_recursive(child, &path[1..], id);

			if prune_child {
				node.children.remove(&path[0]);
			}
		}

		node.is_empty()
	}

	/// Gathers every handle at positions selected by `scope` relative to
	/// `path`.
	#[must_use]
	pub fn collect(&self, path: &VPath, scope: CollectScope) -> Vec<Arc<ObserverHandle>> {
		let root = self.root.read();
		let mut out = Vec::new();
		let segs: Vec<&str> = path.components().collect();
		let mut node = &*root;
		let mut depth = 0;

		loop {
			if depth == segs.len() {
				if scope.this {
					out.extend(node.handles.iter().cloned());
				}

				if scope.descendants {
					Self::collect_all(node, &mut out);
				}

				break;
			}

			if scope.ancestors {
				out.extend(node.handles.iter().cloned());
			}

			match node.children.get(segs[depth]) {
				Some(child) => {
					node = child;
					depth += 1;
				}
				None => break,
			}
		}

		out
	}

	fn collect_all(node: &ObserverNode, out: &mut Vec<Arc<ObserverHandle>>) {
		out.extend(node.handles.iter().cloned());

		for child in node.children.values() {
			Self::collect_all(child, out);
		}
	}

	/// `true` if `self` holds no handles and no descendant does either.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.root.read().is_empty()
	}
}
